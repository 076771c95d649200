//! Instruction encoding and the forward-reference fixup tables used by
//! codegen while the parser is still emitting.

use std::fmt;

use crate::symbol::SymbolId;
use crate::MAX_CODE_LENGTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
  Lit,
  Opr,
  Lod,
  Sto,
  Cal,
  Inc,
  Jmp,
  Jpc,
  SioWrite,
  SioRead,
  Lds,
}

impl Op {
  /// The on-disk opcode byte, matching the reference `OLIT..OLDS` ordering
  /// so a dumped code file round-trips with the reference toolchain's.
  /// `SioWrite`/`SioRead` are distinct opcodes on disk (9 and 10), same as
  /// the reference's `OSIO1`/`OSIO2` — `m` (1 or 2) is redundant with the
  /// opcode byte itself, not a disambiguator.
  pub fn code(self) -> i32 {
    match self {
      Op::Lit => 1,
      Op::Opr => 2,
      Op::Lod => 3,
      Op::Sto => 4,
      Op::Cal => 5,
      Op::Inc => 6,
      Op::Jmp => 7,
      Op::Jpc => 8,
      Op::SioWrite => 9,
      Op::SioRead => 10,
      Op::Lds => 11,
    }
  }

  pub fn from_code(op: i32, _m: i64) -> Option<Op> {
    Some(match op {
      1 => Op::Lit,
      2 => Op::Opr,
      3 => Op::Lod,
      4 => Op::Sto,
      5 => Op::Cal,
      6 => Op::Inc,
      7 => Op::Jmp,
      8 => Op::Jpc,
      9 => Op::SioWrite,
      10 => Op::SioRead,
      11 => Op::Lds,
      _ => return None,
    })
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      Op::Lit => "lit",
      Op::Opr => "opr",
      Op::Lod => "lod",
      Op::Sto => "sto",
      Op::Cal => "cal",
      Op::Inc => "inc",
      Op::Jmp => "jmp",
      Op::Jpc => "jpc",
      Op::SioWrite | Op::SioRead => "sio",
      Op::Lds => "lds",
    }
  }
}

impl fmt::Display for Op {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

/// The `m` operand of an `Opr` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OprCode {
  Ret,
  Neg,
  Add,
  Sub,
  Mul,
  Div,
  Odd,
  Mod,
  Eql,
  Neq,
  Lss,
  Leq,
  Gtr,
  Geq,
}

impl OprCode {
  pub fn code(self) -> i64 {
    match self {
      OprCode::Ret => 0,
      OprCode::Neg => 1,
      OprCode::Add => 2,
      OprCode::Sub => 3,
      OprCode::Mul => 4,
      OprCode::Div => 5,
      OprCode::Odd => 6,
      OprCode::Mod => 7,
      OprCode::Eql => 8,
      OprCode::Neq => 9,
      OprCode::Lss => 10,
      OprCode::Leq => 11,
      OprCode::Gtr => 12,
      OprCode::Geq => 13,
    }
  }

  pub fn from_code(m: i64) -> Option<OprCode> {
    Some(match m {
      0 => OprCode::Ret,
      1 => OprCode::Neg,
      2 => OprCode::Add,
      3 => OprCode::Sub,
      4 => OprCode::Mul,
      5 => OprCode::Div,
      6 => OprCode::Odd,
      7 => OprCode::Mod,
      8 => OprCode::Eql,
      9 => OprCode::Neq,
      10 => OprCode::Lss,
      11 => OprCode::Leq,
      12 => OprCode::Gtr,
      13 => OprCode::Geq,
      _ => return None,
    })
  }
}

/// A plain `(op, l, m)` triple — no operand packing, `l`/`m` fit directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
  pub op: Op,
  pub l: u32,
  pub m: i64,
}

impl Instruction {
  pub fn new(op: Op, l: u32, m: i64) -> Self {
    Instruction { op, l, m }
  }
}

#[derive(Debug)]
pub enum CodeError {
  /// More than `MAX_CODE_LENGTH` instructions were emitted.
  BufferFull,
  /// End of parse reached with unresolved forward references; this is an
  /// internal-error backstop, unreachable if the parser's procedure
  /// declaration/call logic is correct.
  UnresolvedReferences,
}

/// The linear instruction buffer, plus the two forward-reference tables
/// the parser uses while a procedure's body hasn't been placed yet.
pub struct CodeBuffer {
  code: Vec<Instruction>,
  /// `Cal` sites emitted against a not-yet-resolved procedure: which
  /// instruction index to patch once that procedure's address is known.
  pending_calls: Vec<(SymbolId, usize)>,
  /// Procedures whose body hasn't been closed yet, most-recently-opened
  /// last, so closing a block patches the innermost still-open one.
  pending_procs: Vec<SymbolId>,
}

impl CodeBuffer {
  pub fn new() -> Self {
    CodeBuffer {
      code: Vec::new(),
      pending_calls: Vec::new(),
      pending_procs: Vec::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.code.len()
  }

  pub fn is_empty(&self) -> bool {
    self.code.is_empty()
  }

  pub fn emit(&mut self, op: Op, l: u32, m: i64) -> Result<usize, CodeError> {
    if self.code.len() >= MAX_CODE_LENGTH {
      return Err(CodeError::BufferFull);
    }
    let at = self.code.len();
    self.code.push(Instruction::new(op, l, m));
    Ok(at)
  }

  pub fn patch(&mut self, at: usize, m: i64) {
    self.code[at].m = m;
  }

  pub fn push_pending_call(&mut self, proc: SymbolId, at: usize) {
    self.pending_calls.push((proc, at));
  }

  pub fn push_pending_proc(&mut self, proc: SymbolId) {
    self.pending_procs.push(proc);
  }

  /// Pops the innermost pending procedure, assigns it `entry` as its
  /// resolved address, and patches (and removes) every pending call that
  /// targeted it.
  pub fn pop_pending_proc(&mut self, entry: usize) -> Option<SymbolId> {
    let proc = self.pending_procs.pop()?;
    let code = &mut self.code;
    self.pending_calls.retain(|&(sym, at)| {
      if sym == proc {
        code[at].m = entry as i64;
        false
      } else {
        true
      }
    });
    Some(proc)
  }

  pub fn finish(self) -> Result<Vec<Instruction>, CodeError> {
    if !self.pending_calls.is_empty() || !self.pending_procs.is_empty() {
      return Err(CodeError::UnresolvedReferences);
    }
    Ok(self.code)
  }
}

impl Default for CodeBuffer {
  fn default() -> Self {
    Self::new()
  }
}

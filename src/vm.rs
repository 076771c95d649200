//! The stack machine: a flat `(op, l, m)` instruction array, a flat `i64`
//! stack, and lexical scoping implemented by walking a static-link chain
//! through 4-cell activation-record headers.
//!
//! `sp`/`bp`/`pc` are plain `i64` registers, not `usize` — they're allowed
//! to go transiently out of the valid range (the reference's `int`
//! registers do too); only an actual stack/code access gets folded back
//! into range, via [`sw`]/[`pw`]'s bitmask wrap. This sidesteps `usize`
//! underflow panics on pathological hand-written `-p` code files without
//! adding a second "trapping" mode the reference doesn't have.

use std::fmt;
use std::io;

use crate::code::{Instruction, Op, OprCode};
use crate::{MAX_CODE_LENGTH, MAX_STACK_HEIGHT};

/// Masks `v` into `0..MAX_STACK_HEIGHT`. Both sizes are powers of two, so
/// this is a bitmask, not a modulo, and wraps silently rather than
/// trapping — the reference VM's `sw`, preserved exactly.
pub fn sw(v: i64) -> usize {
  (v as u64 as usize) & (MAX_STACK_HEIGHT - 1)
}

/// As [`sw`], for code addresses.
pub fn pw(v: i64) -> usize {
  (v as u64 as usize) & (MAX_CODE_LENGTH - 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
  Continue,
  Halted,
}

#[derive(Debug, thiserror::Error)]
pub enum VmError {
  #[error("division by zero")]
  DivideByZero,
  #[error("modulo by zero")]
  ModuloByZero,
  #[error("unknown instruction opcode {op}")]
  UnknownInstruction { op: u8 },
  #[error("stepped a halted machine")]
  Halted,
  #[error("read failed: {0}")]
  Io(#[from] io::Error),
}

/// Abstracts the VM's two I/O points so it can run headless in tests.
/// The reference's `readnum`/`printf` become trait methods; the CLI wires
/// up a real stdin/stdout implementation.
pub trait Io {
  fn write_value(&mut self, value: i64);
  fn read_value(&mut self) -> io::Result<i64>;
}

/// Reads stdin the way the reference's `readnum` prompt loop does:
/// re-prompt on a blank line or anything that isn't an (optionally
/// signed) run of digits, with the last sign encountered winning.
pub struct StdIo;

impl Io for StdIo {
  fn write_value(&mut self, value: i64) {
    println!("Value on top of the stack: {value}");
  }

  /// Mirrors the reference's `readnum`: reprompt on a blank line, a
  /// too-long line, or a sign-prefixed digit run longer than `MAX_DIGIT`
  /// or containing a non-digit, with the last sign seen winning.
  fn read_value(&mut self) -> io::Result<i64> {
    use std::io::Write;
    loop {
      print!("Enter a value to be placed on top of the stack: ");
      io::stdout().flush()?;
      let mut line = String::new();
      if io::stdin().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"));
      }
      let Some(trimmed) = line.strip_suffix('\n') else {
        eprintln!("Input too long, try again");
        continue;
      };
      let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
      if trimmed.is_empty() {
        eprintln!("No input entered, try again");
        continue;
      }

      let mut negative = false;
      let mut i = 0;
      let bytes = trimmed.as_bytes();
      while i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        negative = bytes[i] == b'-';
        i += 1;
      }

      let digits = &trimmed[i..];
      if digits.len() > crate::MAX_DIGIT {
        eprintln!("Input too long, enter a shorter number");
        continue;
      }
      if !digits.bytes().all(|b| b.is_ascii_digit()) {
        eprintln!("Input contains non-numbered characters, try again");
        continue;
      }

      match digits.parse::<i64>() {
        Ok(v) => return Ok(if negative { -v } else { v }),
        Err(_) => {
          eprintln!("Input contains non-numbered characters, try again");
          continue;
        }
      }
    }
  }
}

/// A snapshot of one executed step, formatted the way the reference's
/// `printins(1)` prints a trace line.
pub struct TraceRow {
  pub pc: i64,
  pub instr: Instruction,
  pub bp: i64,
  pub sp: i64,
  pub stack: Vec<i64>,
}

impl fmt::Display for TraceRow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:>5}: {} {} {:<6} | bp={:<6} sp={:<6} | ", self.pc, self.instr.op, self.instr.l, self.instr.m, self.bp, self.sp)?;
    for (i, v) in self.stack.iter().enumerate() {
      if i > 0 {
        write!(f, " ")?;
      }
      write!(f, "{v}")?;
    }
    Ok(())
  }
}

pub struct Vm {
  code: Vec<Instruction>,
  stack: Vec<i64>,
  pc: i64,
  bp: i64,
  sp: i64,
  halted: bool,
  /// Highest `sp` reached so far, purely for `trace_row`'s display window
  /// (the reference's `lastar`).
  last_mark: i64,
  last_pc: i64,
  last_instr: Instruction,
}

impl Vm {
  pub fn new(code: Vec<Instruction>) -> Self {
    Vm {
      code,
      stack: vec![0; MAX_STACK_HEIGHT],
      pc: 0,
      bp: 1,
      sp: 0,
      halted: false,
      last_mark: 0,
      last_pc: 0,
      last_instr: Instruction::new(Op::Jmp, 0, 0),
    }
  }

  /// Restores `sp`/`bp`/`pc`/`halted` to their initial values without
  /// re-allocating the stack or reloading the code, matching the
  /// reference's `reset()`.
  pub fn reset(&mut self) {
    self.stack.iter_mut().for_each(|c| *c = 0);
    self.pc = 0;
    self.bp = 1;
    self.sp = 0;
    self.halted = false;
    self.last_mark = 0;
  }

  pub fn halted(&self) -> bool {
    self.halted
  }

  fn base(&self, mut l: u32, b: i64) -> i64 {
    let mut b1 = b;
    while l > 0 {
      b1 = self.stack[sw(b1 + 1)];
      l -= 1;
    }
    b1
  }

  pub fn step(&mut self, io: &mut impl Io) -> Result<Control, VmError> {
    if self.halted {
      return Err(VmError::Halted);
    }

    let pc_before = self.pc;
    let ins = self.code[pw(self.pc)];
    self.pc += 1;

    match ins.op {
      Op::Lit => {
        self.sp += 1;
        self.stack[sw(self.sp)] = ins.m;
      }
      Op::Opr => self.exec_opr(ins)?,
      Op::Lod => {
        self.sp += 1;
        let addr = self.base(ins.l, self.bp) + ins.m;
        self.stack[sw(self.sp)] = self.stack[sw(addr)];
      }
      Op::Sto => {
        let addr = self.base(ins.l, self.bp) + ins.m;
        self.stack[sw(addr)] = self.stack[sw(self.sp)];
        self.sp -= 1;
      }
      Op::Cal => {
        self.stack[sw(self.sp + 1)] = 0;
        self.stack[sw(self.sp + 2)] = self.base(ins.l, self.bp);
        self.stack[sw(self.sp + 3)] = self.bp;
        self.stack[sw(self.sp + 4)] = self.pc;
        self.bp = self.sp + 1;
        self.pc = ins.m;
        if self.bp <= 0 {
          self.halted = true;
        }
      }
      Op::Inc => {
        self.sp += ins.m;
        self.last_mark = self.last_mark.max(self.sp);
      }
      Op::Jmp => {
        self.pc = ins.m;
      }
      Op::Jpc => {
        let top = self.stack[sw(self.sp)];
        self.sp -= 1;
        if top == 0 {
          self.pc = ins.m;
        }
      }
      Op::SioWrite => {
        io.write_value(self.stack[sw(self.sp)]);
        self.sp -= 1;
      }
      Op::SioRead => {
        let value = io.read_value()?;
        self.sp += 1;
        self.stack[sw(self.sp)] = value;
      }
      Op::Lds => {
        let value = self.stack[sw(self.sp)];
        self.stack[sw(self.sp + ins.m)] = value;
        self.sp -= 1;
      }
    }

    self.last_pc = pc_before;
    self.last_instr = ins;

    Ok(if self.halted { Control::Halted } else { Control::Continue })
  }

  fn exec_opr(&mut self, ins: Instruction) -> Result<(), VmError> {
    let Some(opr) = OprCode::from_code(ins.m) else {
      return Err(VmError::UnknownInstruction { op: ins.m as u8 });
    };
    match opr {
      OprCode::Ret => {
        self.sp = self.bp.wrapping_sub(1);
        self.pc = self.stack[sw(self.sp + 4)];
        self.bp = self.stack[sw(self.sp + 3)];
        if self.sp <= 0 {
          self.halted = true;
        }
      }
      OprCode::Neg => {
        self.stack[sw(self.sp)] = -self.stack[sw(self.sp)];
      }
      OprCode::Add => {
        self.sp -= 1;
        self.stack[sw(self.sp)] += self.stack[sw(self.sp + 1)];
      }
      OprCode::Sub => {
        self.sp -= 1;
        self.stack[sw(self.sp)] -= self.stack[sw(self.sp + 1)];
      }
      OprCode::Mul => {
        self.sp -= 1;
        self.stack[sw(self.sp)] *= self.stack[sw(self.sp + 1)];
      }
      OprCode::Div => {
        self.sp -= 1;
        let divisor = self.stack[sw(self.sp + 1)];
        if divisor == 0 {
          return Err(VmError::DivideByZero);
        }
        self.stack[sw(self.sp)] /= divisor;
      }
      // Not normalized to 0/1, matching the reference exactly: `-3 % 2`
      // is `-1`, and that's fine, since only `Jpc`'s zero/non-zero test
      // ever consumes it.
      OprCode::Odd => {
        self.stack[sw(self.sp)] %= 2;
      }
      OprCode::Mod => {
        self.sp -= 1;
        let divisor = self.stack[sw(self.sp + 1)];
        if divisor == 0 {
          return Err(VmError::ModuloByZero);
        }
        self.stack[sw(self.sp)] %= divisor;
      }
      OprCode::Eql => self.cmp(|a, b| a == b),
      OprCode::Neq => self.cmp(|a, b| a != b),
      OprCode::Lss => self.cmp(|a, b| a < b),
      OprCode::Leq => self.cmp(|a, b| a <= b),
      OprCode::Gtr => self.cmp(|a, b| a > b),
      OprCode::Geq => self.cmp(|a, b| a >= b),
    }
    Ok(())
  }

  fn cmp(&mut self, f: impl Fn(i64, i64) -> bool) {
    self.sp -= 1;
    let a = self.stack[sw(self.sp)];
    let b = self.stack[sw(self.sp + 1)];
    self.stack[sw(self.sp)] = if f(a, b) { 1 } else { 0 };
  }

  pub fn run(&mut self, io: &mut impl Io) -> Result<(), VmError> {
    loop {
      match self.step(io)? {
        Control::Continue => {}
        Control::Halted => return Ok(()),
      }
    }
  }

  pub fn trace_row(&self) -> TraceRow {
    let top = self.last_mark.max(self.sp).max(0);
    let stack = (1..=top).map(|i| self.stack[sw(i)]).collect();
    TraceRow {
      pc: self.last_pc,
      instr: self.last_instr,
      bp: self.bp,
      sp: self.sp,
      stack,
    }
  }
}

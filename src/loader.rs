//! Reading and writing the `op l m` text code-file format produced by
//! `--dump-code`/`-d` and consumed by `--from-code`/`-p`.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::code::{Instruction, Op};
use crate::vm::Vm;
use crate::MAX_CODE_LENGTH;

#[derive(Debug)]
pub enum LoaderError {
  Io(io::Error),
  /// A triple's `op` field wasn't one of the 11 known opcodes, or was
  /// negative — the reference loader's `op > 0 && l >= 0` guard.
  InvalidOpcode { line: usize, op: i64 },
  /// More `op l m` triples than `MAX_CODE_LENGTH` allows.
  TooLarge,
  /// A line held fewer than three whitespace-separated integers.
  Truncated { line: usize },
}

impl fmt::Display for LoaderError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoaderError::Io(e) => write!(f, "{e}"),
      LoaderError::InvalidOpcode { line, op } => write!(f, "line {line}: unknown opcode {op}"),
      LoaderError::TooLarge => write!(f, "code file has more than {MAX_CODE_LENGTH} instructions"),
      LoaderError::Truncated { line } => write!(f, "line {line}: expected three integers \"op l m\""),
    }
  }
}

impl std::error::Error for LoaderError {}

impl From<io::Error> for LoaderError {
  fn from(e: io::Error) -> Self {
    LoaderError::Io(e)
  }
}

/// Parses whitespace-separated `op l m` triples, one per call to
/// `next_triple`, regardless of how they're split across lines — the
/// reference loader reads by token, not by line, so blank lines and
/// multiple triples per line are both fine.
fn parse_triples(text: &str) -> Result<Vec<Instruction>, LoaderError> {
  let mut numbers = text.split_ascii_whitespace();
  let mut code = Vec::new();
  let mut line = 1usize;

  loop {
    let Some(op_tok) = numbers.next() else { break };
    let l_tok = numbers.next().ok_or(LoaderError::Truncated { line })?;
    let m_tok = numbers.next().ok_or(LoaderError::Truncated { line })?;

    let op: i64 = op_tok.parse().map_err(|_| LoaderError::Truncated { line })?;
    let l: i64 = l_tok.parse().map_err(|_| LoaderError::Truncated { line })?;
    let m: i64 = m_tok.parse().map_err(|_| LoaderError::Truncated { line })?;

    if op <= 0 || l < 0 {
      return Err(LoaderError::InvalidOpcode { line, op });
    }
    let decoded = Op::from_code(op as i32, m).ok_or(LoaderError::InvalidOpcode { line, op })?;

    if code.len() >= MAX_CODE_LENGTH {
      return Err(LoaderError::TooLarge);
    }
    code.push(Instruction::new(decoded, l as u32, m));
    line += 1;
  }

  Ok(code)
}

/// Wraps the parser's own output in a fresh [`Vm`]. Never fails: the
/// parser has already validated everything it emitted.
pub fn load_from_buffer(code: Vec<Instruction>) -> Vm {
  Vm::new(code)
}

/// Parses the `op l m` text format from an in-memory string, for callers
/// (the CLI's `-p`) that may have read the code file from stdin rather
/// than from a real path.
pub fn parse_code_text(text: &str) -> Result<Vec<Instruction>, LoaderError> {
  parse_triples(text)
}

pub fn load_from_file(path: &Path) -> Result<Vm, LoaderError> {
  let text = fs::read_to_string(path)?;
  let code = parse_triples(&text)?;
  Ok(Vm::new(code))
}

/// Writes `code` in the same `op l m` text format `load_from_file` reads,
/// one triple per line.
pub fn write_to_file(code: &[Instruction], path: &Path) -> io::Result<()> {
  let mut out = fs::File::create(path)?;
  for ins in code {
    writeln!(out, "{} {} {}", ins.op.code(), ins.l, ins.m)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::code::OprCode;

  #[test]
  fn round_trips_through_a_file() {
    let dir = std::env::temp_dir().join(format!("plzero-loader-test-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("code.txt");

    let code = vec![
      Instruction::new(Op::Jmp, 0, 1),
      Instruction::new(Op::Inc, 0, 4),
      Instruction::new(Op::Lit, 0, 42),
      Instruction::new(Op::SioWrite, 0, 1),
      Instruction::new(Op::Opr, 0, OprCode::Ret.code()),
    ];
    write_to_file(&code, &path).unwrap();
    let _vm = load_from_file(&path).unwrap();

    let reloaded = parse_triples(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reloaded, code);

    fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn rejects_unknown_opcode() {
    let err = parse_triples("99 0 0").unwrap_err();
    assert!(matches!(err, LoaderError::InvalidOpcode { op: 99, .. }));
  }

  #[test]
  fn rejects_negative_level() {
    let err = parse_triples("1 -1 0").unwrap_err();
    assert!(matches!(err, LoaderError::InvalidOpcode { .. }));
  }

  #[test]
  fn rejects_truncated_triple() {
    let err = parse_triples("1 0").unwrap_err();
    assert!(matches!(err, LoaderError::Truncated { .. }));
  }
}

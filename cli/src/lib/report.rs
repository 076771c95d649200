//! Printing lex/parse diagnostics and the verbose listings (`-v`/`-l`)
//! to stdout/stderr.

use plzero::code::Instruction;
use plzero::diagnostics::{render_many, Diagnostic};
use plzero::lexer::TokenBuffer;
use plzero::token::TokenKind;
use plzero::vm::TraceRow;

pub fn print_diagnostics(diags: &[Diagnostic], file: &str, src: &str, color: bool) {
  eprintln!("{}", render_many(diags, file, src, color));
}

/// `-v`'s source listing: the raw input, unmodified, headed the way the
/// reference's `printfile` heads it.
pub fn print_source(src: &str) {
  println!("Source listing");
  println!();
  print!("{src}");
  if !src.ends_with('\n') {
    println!();
  }
  println!();
}

/// `-l`/`-v`'s token dump: a numeric listing (the token kind's
/// declaration-order discriminant) followed by a symbolic one (kind,
/// plus lexeme/value for `ident`/`number`).
pub fn print_tokens(tokens: &TokenBuffer) {
  println!("Lexeme list (numeric)");
  for (i, tok) in tokens.iter().enumerate() {
    if i > 0 {
      print!(" ");
    }
    print!("{}", tok.kind as u32);
  }
  println!();
  println!();

  println!("Lexeme list (symbolic)");
  for tok in tokens.iter() {
    match tok.kind {
      TokenKind::Ident => println!("ident\t{}", tok.text),
      TokenKind::Number => println!("number\t{}", tok.value),
      kind => println!("{kind}"),
    }
  }
  println!();
}

/// `-v`'s instruction listing, matching the reference's
/// `Line\tOP\tL\tM` table.
pub fn print_instructions(code: &[Instruction]) {
  println!("Instruction listing");
  println!();
  println!("Line\tOP\tL\tM");
  for (i, ins) in code.iter().enumerate() {
    println!("{i}\t{}\t{}\t{}", ins.op.mnemonic(), ins.l, ins.m);
  }
  println!();
}

/// `-v`'s per-step execution trace header and rows.
pub fn print_trace_header() {
  println!("pc\top\tl\tm\tbp\tsp\tstack");
}

pub fn print_trace_row(row: &TraceRow) {
  println!("{row}");
}

//! Lex/parse finding collection and rendering.
//!
//! Diagnostics are collected as plain, owned values while lexing/parsing
//! run (so the lexer and parser don't need to borrow the source text for
//! the lifetime of a [`diag::Report`]); [`render`] turns them into
//! `plzero_diag::Report`s against the real source text for printing.

use diag::{Report, Source};
use span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
  Warning,
  Error,
}

/// A single lex- or parse-stage finding.
#[derive(Clone, Debug)]
pub struct Diagnostic {
  pub severity: Severity,
  /// The parser's 1..44 error-catalog index, `None` for lex-stage findings.
  pub code: Option<u32>,
  pub message: String,
  pub span: Span,
  pub line: u32,
  pub col: u32,
}

impl Diagnostic {
  pub fn lex_error(span: Span, line: u32, col: u32, message: impl Into<String>) -> Self {
    Diagnostic {
      severity: Severity::Error,
      code: None,
      message: message.into(),
      span,
      line,
      col,
    }
  }

  pub fn parse_error(code: u32, span: Span, line: u32, col: u32, message: impl Into<String>) -> Self {
    Diagnostic {
      severity: Severity::Error,
      code: Some(code),
      message: message.into(),
      span,
      line,
      col,
    }
  }
}

/// Collects diagnostics from a single compilation pass.
#[derive(Default)]
pub struct DiagnosticSink {
  diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, diag: Diagnostic) {
    self.diagnostics.push(diag);
  }

  pub fn is_empty(&self) -> bool {
    self.diagnostics.is_empty()
  }

  pub fn len(&self) -> usize {
    self.diagnostics.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.diagnostics.iter()
  }

  pub fn into_vec(self) -> Vec<Diagnostic> {
    self.diagnostics
  }
}

/// Renders one diagnostic the way the reference toolchain's `lex:`/`parser:`
/// prefixes do, as a `plzero_diag::Report` pretty-printed against `src`.
pub fn render<'a>(diag: &Diagnostic, file: &'a str, src: &'a str, color: bool) -> String {
  let stage = if diag.code.is_some() { "parser" } else { "lex" };
  let message = match diag.code {
    Some(code) => format!("error {code}: {}", diag.message),
    None => diag.message.clone(),
  };

  let report = Report::error()
    .source(Source::file(file, src))
    .span(diag.span)
    .message(message)
    .color(color)
    .build();

  match report.emit_to_string() {
    Ok(body) => format!("{stage}: {file}:{}:{}: {body}", diag.line, diag.col),
    Err(_) => format!("{stage}: {file}:{}:{}: {}", diag.line, diag.col, diag.message),
  }
}

/// Renders every diagnostic in `sink`, one block per line-prefixed report.
pub fn render_all(sink: &DiagnosticSink, file: &str, src: &str, color: bool) -> String {
  sink.iter().map(|d| render(d, file, src, color)).collect::<Vec<_>>().join("\n")
}

/// As [`render_all`], for a plain slice of diagnostics — what `compile`
/// returns on failure, rather than a live [`DiagnosticSink`].
pub fn render_many(diags: &[Diagnostic], file: &str, src: &str, color: bool) -> String {
  diags.iter().map(|d| render(d, file, src, color)).collect::<Vec<_>>().join("\n")
}

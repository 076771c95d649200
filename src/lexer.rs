//! Byte-at-a-time lexer with one-character lookahead, plus the
//! materialized token buffer and the parser-facing pushback stream.

use span::Span;

use crate::diagnostics::Diagnostic;
use crate::token::{Token, TokenKind};
use crate::{MAX_DIGIT, MAX_IDENT};

/// How many [`Token`]s a single [`TokenBuffer`] block holds before a new
/// block is appended. Mirrors the reference lexer's pooled 256-token list
/// nodes, so lexing a large file doesn't force one big reallocating `Vec`.
const LEXER_CHUNK: usize = 256;

/// How many tokens [`TokenStream::push`] can hold at once. The parser only
/// ever needs one token of lookahead for the `if ... ; else` ambiguity, but
/// the reference keeps a 4-slot stack (`tstk[4]`) and this crate matches it.
const PUSHBACK_CAPACITY: usize = 4;

struct Pos {
  offset: usize,
  line: u32,
  col: u32,
}

pub struct Lexer<'src> {
  src: &'src str,
  bytes: &'src [u8],
  offset: usize,
  ch: Option<u8>,
  line: u32,
  col: u32,
  diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
  pub fn new(src: &'src str) -> Self {
    let bytes = src.as_bytes();
    Lexer {
      src,
      bytes,
      offset: 0,
      ch: bytes.first().copied(),
      line: 1,
      col: 1,
      diagnostics: Vec::new(),
    }
  }

  fn here(&self) -> Pos {
    Pos {
      offset: self.offset,
      line: self.line,
      col: self.col,
    }
  }

  fn bump(&mut self) {
    if let Some(b) = self.ch {
      self.offset += 1;
      if b == b'\n' {
        self.line += 1;
        self.col = 1;
      } else {
        self.col += 1;
      }
    }
    self.ch = self.bytes.get(self.offset).copied();
  }

  fn span_from(&self, start: &Pos) -> Span {
    (start.offset..self.offset).into()
  }

  fn token(&self, kind: TokenKind, text: impl Into<String>, start: &Pos) -> Token {
    Token::new(kind, text, self.span_from(start), start.line, start.col)
  }

  fn error(&mut self, start: &Pos, message: impl Into<String>) -> Token {
    let span = self.span_from(start);
    self.diagnostics.push(Diagnostic::lex_error(span, start.line, start.col, message));
    Token::new(TokenKind::Error, &self.src[span.range()], span, start.line, start.col)
  }

  fn skip_whitespace(&mut self) {
    while let Some(b) = self.ch {
      if b.is_ascii_whitespace() || (b < 0x20 || b == 0x7f) {
        self.bump();
      } else {
        break;
      }
    }
  }

  /// Consumes the body of a `/* ... */` comment. The opening `/*` has
  /// already been consumed by the caller; `ch` is the first byte after it.
  fn skip_block_comment(&mut self) -> Result<(), ()> {
    loop {
      match self.ch {
        None => return Err(()),
        Some(b'*') => {
          self.bump();
          if self.ch == Some(b'/') {
            self.bump();
            return Ok(());
          }
        }
        Some(_) => self.bump(),
      }
    }
  }

  fn lex_ident(&mut self, start: Pos) -> Token {
    let mut text = String::new();
    while let Some(b) = self.ch {
      if b.is_ascii_alphanumeric() {
        text.push(b as char);
        self.bump();
      } else {
        break;
      }
    }

    if text.len() > MAX_IDENT {
      return self.error(&start, format!("max ident is {MAX_IDENT}, identifier too long: '{text}'"));
    }

    match keyword(&text) {
      Some(kind) => self.token(kind, text, &start),
      None => self.token(TokenKind::Ident, text, &start),
    }
  }

  fn lex_number(&mut self, start: Pos) -> Token {
    let mut text = String::new();
    while let Some(b) = self.ch {
      if b.is_ascii_digit() {
        text.push(b as char);
        self.bump();
      } else {
        break;
      }
    }

    if let Some(b) = self.ch {
      if b.is_ascii_alphabetic() {
        // A digit run immediately followed by a letter is always an
        // identifier-starting-with-a-digit error, even if the digit run
        // alone would also have exceeded MAX_DIGIT.
        while let Some(b) = self.ch {
          if b.is_ascii_alphanumeric() {
            text.push(b as char);
            self.bump();
          } else {
            break;
          }
        }
        return self.error(&start, "identifier must not start with a digit");
      }
    }

    if text.len() > MAX_DIGIT {
      return self.error(&start, format!("max number is {MAX_DIGIT} digits, number too long: '{text}'"));
    }

    let value: i64 = text.parse().expect("digit run parses as an integer");
    self.token(TokenKind::Number, text, &start).with_value(value)
  }

  fn lex_symbol(&mut self, start: Pos) -> Token {
    let c1 = self.ch.expect("lex_symbol called with a lookahead byte");
    self.bump();

    if let Some(c2) = self.ch {
      let two = match (c1, c2) {
        (b'<', b'=') => Some(TokenKind::Leq),
        (b'>', b'=') => Some(TokenKind::Geq),
        (b'<', b'>') => Some(TokenKind::Neq),
        (b':', b'=') => Some(TokenKind::Becomes),
        _ => None,
      };
      if let Some(kind) = two {
        self.bump();
        let text = format!("{}{}", c1 as char, c2 as char);
        return self.token(kind, text, &start);
      }
    }

    let one = match c1 {
      b'+' => Some(TokenKind::Plus),
      b'-' => Some(TokenKind::Minus),
      b'*' => Some(TokenKind::Star),
      b'(' => Some(TokenKind::LParen),
      b')' => Some(TokenKind::RParen),
      b'=' => Some(TokenKind::Eq),
      b',' => Some(TokenKind::Comma),
      b'.' => Some(TokenKind::Period),
      b'<' => Some(TokenKind::Less),
      b'>' => Some(TokenKind::Greater),
      b';' => Some(TokenKind::Semicolon),
      _ => None,
    };

    match one {
      Some(kind) => self.token(kind, (c1 as char).to_string(), &start),
      None => self.error(&start, format!("unknown character: '{}'", c1 as char)),
    }
  }

  /// Produces the next token, skipping whitespace and comments first.
  pub fn next_token(&mut self) -> Token {
    loop {
      self.skip_whitespace();
      let start = self.here();

      let Some(b) = self.ch else {
        return self.token(TokenKind::Eof, "", &start);
      };

      if b == b'/' {
        self.bump();
        if self.ch == Some(b'*') {
          self.bump();
          if self.skip_block_comment().is_err() {
            return self.error(&start, "unterminated comment");
          }
          continue;
        }
        return self.token(TokenKind::Slash, "/", &start);
      }

      if b.is_ascii_alphabetic() {
        return self.lex_ident(start);
      }
      if b.is_ascii_digit() {
        return self.lex_number(start);
      }
      return self.lex_symbol(start);
    }
  }

  fn into_diagnostics(self) -> Vec<Diagnostic> {
    self.diagnostics
  }
}

fn keyword(text: &str) -> Option<TokenKind> {
  Some(match text {
    "const" => TokenKind::Const,
    "int" => TokenKind::Int,
    "procedure" => TokenKind::Proc,
    "call" => TokenKind::Call,
    "begin" => TokenKind::Begin,
    "end" => TokenKind::End,
    "if" => TokenKind::If,
    "then" => TokenKind::Then,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "do" => TokenKind::Do,
    "odd" => TokenKind::Odd,
    "read" => TokenKind::Read,
    "write" => TokenKind::Write,
    _ => return None,
  })
}

/// The materialized output of a complete lexing pass: a chain of
/// fixed-capacity token blocks, appended to as lexing proceeds rather than
/// one large growable buffer (see `LEXER_CHUNK`).
pub struct TokenBuffer {
  chunks: Vec<Vec<Token>>,
}

impl TokenBuffer {
  fn new() -> Self {
    TokenBuffer {
      chunks: vec![Vec::with_capacity(LEXER_CHUNK)],
    }
  }

  fn push(&mut self, tok: Token) {
    if self.chunks.last().expect("at least one chunk").len() == LEXER_CHUNK {
      self.chunks.push(Vec::with_capacity(LEXER_CHUNK));
    }
    self.chunks.last_mut().expect("at least one chunk").push(tok);
  }

  fn get(&self, index: usize) -> Option<&Token> {
    let (chunk, offset) = (index / LEXER_CHUNK, index % LEXER_CHUNK);
    self.chunks.get(chunk).and_then(|c| c.get(offset))
  }

  pub fn len(&self) -> usize {
    let full = (self.chunks.len() - 1) * LEXER_CHUNK;
    full + self.chunks.last().map_or(0, |c| c.len())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = &Token> {
    self.chunks.iter().flatten()
  }

  pub fn contains_error(&self) -> bool {
    self.iter().any(|t| t.is(TokenKind::Error))
  }
}

/// Runs the lexer to completion, producing the full token buffer plus any
/// diagnostics raised along the way. Lexing a file is always one complete
/// pass: nothing here is streamed token-by-token into the parser.
pub fn tokenize(src: &str) -> (TokenBuffer, Vec<Diagnostic>) {
  let mut lexer = Lexer::new(src);
  let mut buf = TokenBuffer::new();
  loop {
    let tok = lexer.next_token();
    let is_eof = tok.is(TokenKind::Eof);
    buf.push(tok);
    if is_eof {
      break;
    }
  }
  (buf, lexer.into_diagnostics())
}

/// The parser-facing cursor over a [`TokenBuffer`]: pulls tokens in order,
/// draining an internal LIFO pushback buffer first.
pub struct TokenStream {
  buf: TokenBuffer,
  cursor: usize,
  pushback: Vec<Token>,
}

impl TokenStream {
  pub fn new(buf: TokenBuffer) -> Self {
    TokenStream {
      buf,
      cursor: 0,
      pushback: Vec::with_capacity(PUSHBACK_CAPACITY),
    }
  }

  /// Returns the next token, draining the pushback buffer first.
  pub fn token(&mut self) -> Token {
    if let Some(tok) = self.pushback.pop() {
      return tok;
    }

    let last = self.buf.len() - 1;
    let idx = self.cursor.min(last);
    let tok = self.buf.get(idx).cloned().expect("token buffer is never empty");
    if self.cursor < last {
      self.cursor += 1;
    }
    tok
  }

  /// Pushes a token back for the next `token()` call to return. Used only
  /// for the `if ... ; else` one-token-of-lookahead correction.
  pub fn push(&mut self, tok: Token) {
    assert!(
      self.pushback.len() < PUSHBACK_CAPACITY,
      "internal error: token pushback buffer overflowed"
    );
    self.pushback.push(tok);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(src: &str) -> Vec<TokenKind> {
    let (buf, _) = tokenize(src);
    buf.iter().map(|t| t.kind).collect()
  }

  #[test]
  fn keywords_and_operators() {
    let ks = kinds("const int procedure call begin end if then else while do odd read write := <= >= <> ; , . ( )");
    use TokenKind::*;
    assert_eq!(
      ks,
      vec![
        Const, Int, Proc, Call, Begin, End, If, Then, Else, While, Do, Odd, Read, Write, Becomes, Leq, Geq, Neq,
        Semicolon, Comma, Period, LParen, RParen, Eof
      ]
    );
  }

  #[test]
  fn ident_length_boundary() {
    let (buf, diags) = tokenize("abcdefghijk");
    assert_eq!(buf.iter().next().unwrap().kind, TokenKind::Ident);
    assert!(diags.is_empty());

    let (buf, diags) = tokenize("abcdefghijkl");
    assert_eq!(buf.iter().next().unwrap().kind, TokenKind::Error);
    assert_eq!(diags.len(), 1);
  }

  #[test]
  fn number_length_boundary() {
    let (buf, diags) = tokenize("99999");
    let tok = buf.iter().next().unwrap();
    assert_eq!(tok.kind, TokenKind::Number);
    assert_eq!(tok.value, 99999);
    assert!(diags.is_empty());

    let (_, diags) = tokenize("100000");
    assert_eq!(diags.len(), 1);
  }

  #[test]
  fn digit_prefixed_identifier_is_an_error() {
    let (buf, diags) = tokenize("1abc");
    assert_eq!(buf.iter().next().unwrap().kind, TokenKind::Error);
    assert_eq!(diags.len(), 1);
  }

  #[test]
  fn unterminated_comment_is_an_error() {
    let (buf, diags) = tokenize("write 1 /* oops");
    assert!(buf.contains_error());
    assert_eq!(diags.len(), 1);
  }

  #[test]
  fn nested_comment_markers_do_not_nest() {
    let ks = kinds("/* /* */ write 1. */");
    // The first `*/` closes the comment; the trailing `*/` lexes as two
    // more tokens from source text that is no longer inside the comment.
    assert!(ks.contains(&TokenKind::Write));
  }

  #[test]
  fn unknown_character_is_an_error() {
    let (buf, diags) = tokenize("write 1 $ write 2.");
    assert!(buf.contains_error());
    assert_eq!(diags.len(), 1);
  }

  #[test]
  fn pushback_is_lifo() {
    let (buf, _) = tokenize("a b c.");
    let mut stream = TokenStream::new(buf);
    let a = stream.token();
    let b = stream.token();
    stream.push(b.clone());
    stream.push(a.clone());
    assert_eq!(stream.token().kind, a.kind);
    assert_eq!(stream.token().kind, b.kind);
  }
}

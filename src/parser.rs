//! Single-pass recursive-descent parser fused with code generation. There
//! is no AST: each grammar production emits instructions as it recognizes
//! them, maintaining a per-lexical-level symbol table and the forward-jump
//! / forward-call fixup tables in [`CodeBuffer`].
//!
//! ```text
//! program    = block "." .
//! block      = [ "const" ident "=" number {"," ident "=" number} ";" ]
//!              [ "int"   ident            {"," ident}            ";" ]
//!              { "procedure" ident "(" [paramlist] ")" [ "(" "int" ident ")" ] ";" block ";" }
//!              statement .
//! paramlist  = "int" ident { "," "int" ident } .
//! statement  = ident ":=" expression
//!            | "call" ident "(" [ expression {"," expression} ] ")"
//!            | "begin" statement {";" statement} "end"
//!            | "if" condition "then" statement ["else" statement]
//!            | "while" condition "do" statement
//!            | "read" ident
//!            | "write" expression
//!            | ε .
//! condition  = "odd" expression | expression relop expression .
//! expression = ["+"|"-"] term {("+"|"-") term} .
//! term       = factor {("*"|"/") factor} .
//! factor     = ident | number | "(" expression ")" .
//! ```

use span::Span;

use crate::code::{CodeBuffer, Instruction, Op, OprCode};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::lexer::{tokenize, TokenStream};
use crate::symbol::{DeclError, SymbolId, SymbolKind, SymbolTable};
use crate::token::{Token, TokenKind};
use crate::{FRAME, MAX_LEXI_LEVEL, RA};

/// Signals that the parser has hit `MAX_PARSER_ERROR` (fixed at 1) and
/// must stop; the actual diagnostic has already been recorded in the
/// sink. Callers only ever see this via [`compile`]'s `Err` variant.
#[derive(Debug)]
pub struct ParseAbort;

type PResult<T> = Result<T, ParseAbort>;

pub struct Parser {
  tokens: TokenStream,
  symtab: SymbolTable,
  code: CodeBuffer,
  level: u32,
  /// Parameter count declared so far at each lexical level, used to place
  /// `int` locals after a procedure's own parameters in its frame.
  npargs: [u32; MAX_LEXI_LEVEL as usize + 1],
  cur: Token,
  sink: DiagnosticSink,
}

impl Parser {
  fn new(tokens: TokenStream) -> Self {
    Parser {
      tokens,
      symtab: SymbolTable::new(),
      code: CodeBuffer::new(),
      level: 0,
      npargs: [0; MAX_LEXI_LEVEL as usize + 1],
      cur: Token::new(TokenKind::Eof, "", Span::default(), 0, 0),
      sink: DiagnosticSink::new(),
    }
  }

  fn advance(&mut self) -> PResult<()> {
    self.cur = self.tokens.token();
    Ok(())
  }

  fn fail<T>(&mut self, code: u32, message: impl Into<String>) -> PResult<T> {
    self
      .sink
      .push(Diagnostic::parse_error(code, self.cur.span, self.cur.line, self.cur.col, message));
    Err(ParseAbort)
  }

  fn expect(&mut self, kind: TokenKind, code: u32, message: impl Into<String>) -> PResult<()> {
    if self.cur.kind == kind {
      Ok(())
    } else {
      self.fail(code, message)
    }
  }

  fn emit(&mut self, op: Op, l: u32, m: i64) -> PResult<usize> {
    self.code.emit(op, l, m).map_err(|_| {
      self
        .sink
        .push(Diagnostic::parse_error(0, self.cur.span, self.cur.line, self.cur.col, "internal error: code buffer exceeded maximum length"));
      ParseAbort
    })
  }

  fn emit_opr(&mut self, op: OprCode) -> PResult<usize> {
    self.emit(Op::Opr, 0, op.code())
  }

  fn declare(&mut self, name: &str, kind: SymbolKind) -> PResult<SymbolId> {
    match self.symtab.declare(self.level, name, kind) {
      Ok(id) => Ok(id),
      Err(DeclError::Redeclared) => self.fail(30, format!("'{name}' redeclared at lexi level {}", self.level)),
      Err(DeclError::LevelOverflow) => self.fail(
        35,
        format!("adding symbol '{name}' failed in lexi level {} because it exceeded the max lexi levels supported", self.level),
      ),
    }
  }

  fn factor(&mut self) -> PResult<()> {
    match self.cur.kind {
      TokenKind::Ident => {
        let name = self.cur.text.clone();
        match self.symtab.lookup(self.level, &name) {
          None => return self.fail(11, format!("undeclared identifier '{name}'")),
          Some(sym) => match sym.kind {
            SymbolKind::Const { value } => {
              self.emit(Op::Lit, 0, value)?;
            }
            SymbolKind::Int { addr } => {
              let l = self.level - sym.level;
              self.emit(Op::Lod, l, addr as i64)?;
            }
            SymbolKind::Proc { .. } => {
              return self.fail(36, format!("expression using procedure '{name}' as a variable/constant"));
            }
          },
        }
        self.advance()?;
      }
      TokenKind::Number => {
        self.emit(Op::Lit, 0, self.cur.value)?;
        self.advance()?;
      }
      TokenKind::LParen => {
        self.advance()?;
        self.expression()?;
        self.expect(TokenKind::RParen, 22, "right parenthesis missing")?;
        self.advance()?;
      }
      _ => return self.fail(23, "preceding factor cannot begin with this symbol"),
    }
    Ok(())
  }

  fn term(&mut self) -> PResult<()> {
    self.factor()?;
    loop {
      let op = match self.cur.kind {
        TokenKind::Star => OprCode::Mul,
        TokenKind::Slash => OprCode::Div,
        _ => break,
      };
      self.advance()?;
      self.factor()?;
      self.emit_opr(op)?;
    }
    Ok(())
  }

  fn expression(&mut self) -> PResult<()> {
    let negate = match self.cur.kind {
      TokenKind::Plus => {
        self.advance()?;
        self.term()?;
        false
      }
      TokenKind::Minus => {
        self.advance()?;
        self.term()?;
        true
      }
      _ => {
        self.term()?;
        false
      }
    };
    if negate {
      self.emit_opr(OprCode::Neg)?;
    }

    loop {
      let op = match self.cur.kind {
        TokenKind::Plus => OprCode::Add,
        TokenKind::Minus => OprCode::Sub,
        _ => break,
      };
      self.advance()?;
      self.term()?;
      self.emit_opr(op)?;
    }
    Ok(())
  }

  fn condition(&mut self) -> PResult<()> {
    if self.cur.kind == TokenKind::Odd {
      self.advance()?;
      self.expression()?;
      self.emit_opr(OprCode::Odd)?;
      return Ok(());
    }

    self.expression()?;

    if self.cur.kind == TokenKind::Becomes {
      return self.fail(1, "use = instead of :=");
    }

    let op = match self.cur.kind {
      TokenKind::Less => OprCode::Lss,
      TokenKind::Leq => OprCode::Leq,
      TokenKind::Greater => OprCode::Gtr,
      TokenKind::Geq => OprCode::Geq,
      TokenKind::Neq => OprCode::Neq,
      TokenKind::Eq => OprCode::Eql,
      _ => return self.fail(20, "relational operator expected"),
    };
    self.advance()?;
    self.expression()?;
    self.emit_opr(op)?;
    Ok(())
  }

  /// `call ident "(" [args] ")"`. The existence check happens before the
  /// category check: looking up an undeclared name returns `None` first,
  /// avoiding the reference parser's null-deref-on-undeclared-call bug.
  fn call_proc(&mut self) -> PResult<()> {
    self.advance()?; // past 'call'
    if self.cur.kind != TokenKind::Ident {
      return self.fail(14, "call must be followed by an identifier");
    }
    let name = self.cur.text.clone();

    let sym = match self.symtab.lookup(self.level, &name) {
      None => return self.fail(33, format!("call to an undeclared procedure '{name}'")),
      Some(sym) => sym.clone(),
    };
    if !sym.is_proc() {
      return self.fail(43, format!("calling to a non-procedure '{name}'"));
    }

    self.advance()?; // past the procedure name
    self.expect(TokenKind::LParen, 41, "expected (")?;
    self.advance()?;

    let mut nargs_given = 0u32;
    if self.cur.kind != TokenKind::RParen {
      loop {
        self.expression()?;
        self.emit(Op::Lds, 0, (FRAME + nargs_given as i32) as i64)?;
        nargs_given += 1;

        if self.cur.kind != TokenKind::Comma {
          break;
        }
        self.advance()?;
      }
    }
    self.expect(TokenKind::RParen, 41, "expected )")?;

    let (nargs, addr) = match sym.kind {
      SymbolKind::Proc { nargs, addr } => (nargs, addr),
      _ => unreachable!("checked is_proc above"),
    };
    if nargs != nargs_given {
      return self.fail(
        42,
        format!("calling procedure '{name}' with mismatched number of arguments, expected {nargs}, got {nargs_given}"),
      );
    }

    let l = self.level - sym.level;
    let at = self.emit(Op::Cal, l, addr as i64)?;
    if addr < 0 {
      self.code.push_pending_call(sym.id, at);
    }

    self.advance()?; // past ')'
    Ok(())
  }

  fn statement(&mut self) -> PResult<()> {
    match self.cur.kind {
      TokenKind::Ident => {
        let name = self.cur.text.clone();
        let sym = match self.symtab.lookup(self.level, &name) {
          None => return self.fail(11, format!("undeclared identifier '{name}'")),
          Some(sym) => sym.clone(),
        };
        if !sym.is_int() {
          return self.fail(12, format!("assignment to constant or procedure '{name}' is not allowed"));
        }

        self.advance()?;
        if self.cur.kind == TokenKind::Eq {
          return self.fail(37, "use := instead of =");
        }
        self.expect(TokenKind::Becomes, 13, "assignment operator expected")?;
        self.advance()?;
        self.expression()?;

        let addr = match sym.kind {
          SymbolKind::Int { addr } => addr,
          _ => unreachable!("checked is_int above"),
        };
        self.emit(Op::Sto, self.level - sym.level, addr as i64)?;
      }
      TokenKind::Begin => {
        self.advance()?;
        self.statement()?;
        while self.cur.kind == TokenKind::Semicolon {
          self.advance()?;
          self.statement()?;
        }
        self.expect(TokenKind::End, 34, "end expected at end of begin block")?;
        self.advance()?;
      }
      TokenKind::If => {
        self.advance()?;
        self.condition()?;
        self.expect(TokenKind::Then, 16, "then expected")?;
        let a1 = self.emit(Op::Jpc, 0, 0)?;
        self.advance()?; // past 'then'
        self.statement()?;

        // One token of lookahead to tell "; else" from a plain statement
        // separator: consume the semicolon only if an `else` follows it.
        if self.cur.kind == TokenKind::Semicolon {
          let t1 = self.cur.clone();
          self.advance()?;
          if self.cur.kind != TokenKind::Else {
            let t2 = self.cur.clone();
            self.tokens.push(t2);
            self.tokens.push(t1);
            self.advance()?;
          }
        }

        let a2 = if self.cur.kind == TokenKind::Else {
          Some(self.emit(Op::Jmp, 0, 0)?)
        } else {
          None
        };
        self.code.patch(a1, self.code.len() as i64);

        if self.cur.kind == TokenKind::Else {
          self.advance()?;
          self.statement()?;
          self.code.patch(a2.expect("else branch implies a2 was set"), self.code.len() as i64);
        }
      }
      TokenKind::Call => self.call_proc()?,
      TokenKind::While => {
        let a1 = self.code.len();
        self.advance()?;
        self.condition()?;
        self.expect(TokenKind::Do, 18, "do expected")?;
        let a2 = self.emit(Op::Jpc, 0, 0)?;
        self.advance()?;
        self.statement()?;
        self.emit(Op::Jmp, 0, a1 as i64)?;
        self.code.patch(a2, self.code.len() as i64);
      }
      TokenKind::Read => {
        self.advance()?;
        if self.cur.kind != TokenKind::Ident {
          return self.fail(28, format!("unexpected identifier '{}' after read operator", self.cur.text));
        }
        let name = self.cur.text.clone();
        let sym = match self.symtab.lookup(self.level, &name) {
          None => return self.fail(29, format!("undeclared identifier '{name}' used in read operator")),
          Some(sym) => sym.clone(),
        };
        if !sym.is_int() {
          return self.fail(28, format!("unexpected identifier '{name}' after read operator"));
        }
        self.emit(Op::SioRead, 0, 2)?;
        let addr = match sym.kind {
          SymbolKind::Int { addr } => addr,
          _ => unreachable!("checked is_int above"),
        };
        // Fixed relative to the reference: the `l` operand is the lexical
        // distance from here to the declaration, like every other store,
        // not the declaration's absolute level.
        self.emit(Op::Sto, self.level - sym.level, addr as i64)?;
        self.advance()?;
      }
      TokenKind::Write => {
        self.advance()?;
        self.expression()?;
        self.emit(Op::SioWrite, 0, 1)?;
      }
      // statement = [ ... ] — the empty statement is valid and emits nothing.
      _ => {}
    }
    Ok(())
  }

  fn block(&mut self) -> PResult<()> {
    let mut n_locals = 0u32;

    let preamble = self.emit(Op::Jmp, 0, 0)?;

    if self.cur.kind == TokenKind::Const {
      loop {
        self.advance()?;
        if self.cur.kind != TokenKind::Ident {
          return self.fail(4, "const, int, procedure must be followed by the identifier");
        }
        let name = self.cur.text.clone();
        self.advance()?;
        self.expect(TokenKind::Eq, 26, "equal sign expected in const declaration")?;
        self.advance()?;
        if self.cur.kind != TokenKind::Number {
          return self.fail(27, "expected number in const declaration");
        }
        let value = self.cur.value;
        self.declare(&name, SymbolKind::Const { value })?;
        self.advance()?;
        if self.cur.kind != TokenKind::Comma {
          break;
        }
      }
      self.expect(TokenKind::Semicolon, 5, "semicolon or comma missing")?;
      self.advance()?;
    }

    if self.cur.kind == TokenKind::Int {
      loop {
        self.advance()?;
        if self.cur.kind != TokenKind::Ident {
          return self.fail(4, "const, int, procedure must be followed by the identifier");
        }
        let name = self.cur.text.clone();
        let addr = FRAME + self.npargs[self.level as usize] as i32 + n_locals as i32;
        self.declare(&name, SymbolKind::Int { addr })?;
        n_locals += 1;
        self.advance()?;
        if self.cur.kind != TokenKind::Comma {
          break;
        }
      }
      self.expect(TokenKind::Semicolon, 5, "semicolon or comma missing")?;
      self.advance()?;
    }

    while self.cur.kind == TokenKind::Proc {
      self.advance()?;
      if self.cur.kind != TokenKind::Ident {
        return self.fail(4, "const, int, procedure must be followed by the identifier");
      }
      let proc_name = self.cur.text.clone();
      let proc_id = self.declare(&proc_name, SymbolKind::Proc { nargs: 0, addr: -1 })?;
      self.code.push_pending_proc(proc_id);

      self.level += 1;
      if self.level > MAX_LEXI_LEVEL {
        return self.fail(
          31,
          format!("encountered too much nested procedures, went over max lexical level (current lexi level is {})", self.level),
        );
      }
      self.symtab.reset_level(self.level);

      self.advance()?;
      self.expect(TokenKind::LParen, 5, "semicolon or comma missing")?;
      self.advance()?;

      let mut nparg = 0u32;
      loop {
        if self.cur.kind == TokenKind::RParen {
          break;
        }
        if self.cur.kind != TokenKind::Int {
          return self.fail(38, format!("unknown type declaration in procedure {proc_name}"));
        }
        self.advance()?;
        if self.cur.kind != TokenKind::Ident {
          return self.fail(39, "procedure arguments not an identifier");
        }
        let pname = self.cur.text.clone();
        let addr = FRAME + nparg as i32;
        self.declare(&pname, SymbolKind::Int { addr })?;
        nparg += 1;

        self.advance()?;
        if self.cur.kind == TokenKind::Comma {
          self.advance()?;
          if self.cur.kind == TokenKind::RParen {
            return self.fail(44, format!("procedure {proc_name} cannot end with a ,"));
          }
        }
        if self.cur.kind != TokenKind::RParen && self.cur.kind != TokenKind::Int {
          return self.fail(40, "invalid procedure declaration");
        }
      }
      self.npargs[self.level as usize] = nparg;
      if let Some(sym) = self.symtab.by_id_mut(proc_id) {
        if let SymbolKind::Proc { nargs, .. } = &mut sym.kind {
          *nargs = nparg;
        }
      }

      self.advance()?; // past ')'

      if self.cur.kind == TokenKind::LParen {
        self.advance()?;
        if self.cur.kind != TokenKind::Int {
          return self.fail(38, format!("unknown type declaration in procedure {proc_name}"));
        }
        self.advance()?;
        if self.cur.kind != TokenKind::Ident {
          return self.fail(39, "procedure arguments not an identifier");
        }
        let rname = self.cur.text.clone();
        self.declare(&rname, SymbolKind::Int { addr: RA })?;
        self.advance()?;
        self.expect(TokenKind::RParen, 41, "expected )")?;
        self.advance()?;
      }

      self.expect(TokenKind::Semicolon, 5, "semicolon or comma missing")?;
      self.advance()?;
      self.block()?;
      self.expect(TokenKind::Semicolon, 5, "semicolon or comma missing")?;
      self.advance()?;
    }

    let entry = self.code.len();
    self.code.patch(preamble, entry as i64);
    if let Some(id) = self.code.pop_pending_proc(entry) {
      if let Some(sym) = self.symtab.by_id_mut(id) {
        if let SymbolKind::Proc { addr, .. } = &mut sym.kind {
          *addr = entry as i32;
        }
      }
    }

    self.emit(Op::Inc, 0, (FRAME + self.npargs[self.level as usize] as i32 + n_locals as i32) as i64)?;
    self.statement()?;
    self.emit_opr(OprCode::Ret)?;

    if self.level > 0 {
      self.level -= 1;
    }

    Ok(())
  }

  fn program(&mut self) -> PResult<()> {
    self.advance()?;
    self.block()?;
    self.expect(TokenKind::Period, 9, "period expected")?;
    Ok(())
  }
}

/// Lexes and parses `src`, returning the finished instruction buffer or
/// every diagnostic recorded before compilation stopped (lex errors block
/// parsing entirely; a parse error aborts after the first, per
/// `MAX_PARSER_ERROR = 1`).
pub fn compile(src: &str) -> Result<Vec<Instruction>, Vec<Diagnostic>> {
  let (tokens, lex_diagnostics) = tokenize(src);
  if !lex_diagnostics.is_empty() {
    return Err(lex_diagnostics);
  }

  let mut parser = Parser::new(TokenStream::new(tokens));
  if let Err(ParseAbort) = parser.program() {
    return Err(parser.sink.into_vec());
  }

  parser.code.finish().map_err(|_| {
    vec![Diagnostic::parse_error(
      0,
      Span::default(),
      0,
      0,
      "internal error: pending forward references left unresolved at end of parse",
    )]
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::code::Op;
  use indoc::indoc;

  fn ok(src: &str) -> Vec<Instruction> {
    compile(src).unwrap_or_else(|d| panic!("expected success, got {d:?}"))
  }

  fn err(src: &str) -> Vec<Diagnostic> {
    compile(src).expect_err("expected a diagnostic")
  }

  #[test]
  fn const_and_write() {
    let code = ok("const c=7; write c.");
    assert!(code.iter().any(|i| i.op == Op::Lit && i.m == 7));
    assert!(code.iter().any(|i| i.op == Op::SioWrite));
  }

  #[test]
  fn assignment_requires_becomes_not_eq() {
    let diags = err("int x; begin x = 1 end.");
    assert_eq!(diags[0].code, Some(37));
  }

  #[test]
  fn undeclared_call_reports_missing_symbol_not_a_panic() {
    let diags = err("begin call nope() end.");
    assert_eq!(diags[0].code, Some(33));
  }

  #[test]
  fn calling_a_variable_is_rejected() {
    let diags = err("int x; begin call x() end.");
    assert_eq!(diags[0].code, Some(43));
  }

  #[test]
  fn max_lexi_level_boundary() {
    // Five nested procedures (levels 1..=5) are accepted.
    let src = indoc! {"
      procedure p1();
      procedure p2();
      procedure p3();
      procedure p4();
      procedure p5();
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 0.
    "};
    assert!(compile(src).is_ok());

    let six_deep = indoc! {"
      procedure p1();
      procedure p2();
      procedure p3();
      procedure p4();
      procedure p5();
      procedure p6();
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 1;
      ;
      write 0.
    "};
    let diags = err(six_deep);
    assert_eq!(diags[0].code, Some(31));
  }

  #[test]
  fn read_uses_level_delta_not_absolute_level() {
    // A procedure reading into its own local must use a level delta of 0
    // relative to itself, matching every other store in the same scope.
    let src = "procedure p(); int v; begin read v; call p() end; call p().";
    let code = ok(src);
    let sto_after_read = code
      .windows(2)
      .find(|w| w[0].op == Op::SioRead)
      .map(|w| w[1])
      .expect("read emits SioRead then Sto");
    assert_eq!(sto_after_read.op, Op::Sto);
    assert_eq!(sto_after_read.l, 0);
  }
}

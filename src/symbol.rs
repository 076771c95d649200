//! Per-lexical-level symbol table.

use crate::MAX_LEXI_LEVEL;

pub type SymbolId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
  Const { value: i64 },
  Int { addr: i32 },
  /// `addr == -1` means the procedure has been declared but its body
  /// hasn't been emitted yet (forward reference, resolved by the
  /// parser's pending-call/pending-proc fixup tables).
  Proc { nargs: u32, addr: i32 },
}

#[derive(Clone, Debug)]
pub struct Symbol {
  pub id: SymbolId,
  pub name: String,
  pub kind: SymbolKind,
  pub level: u32,
}

impl Symbol {
  pub fn is_proc(&self) -> bool {
    matches!(self.kind, SymbolKind::Proc { .. })
  }

  pub fn is_int(&self) -> bool {
    matches!(self.kind, SymbolKind::Int { .. })
  }
}

#[derive(Debug)]
pub enum DeclError {
  /// A name already declared in the current level's scope.
  Redeclared,
  /// The declaring level exceeds `MAX_LEXI_LEVEL`.
  LevelOverflow,
}

/// A stack of per-lexical-level scopes, indexed `0..=MAX_LEXI_LEVEL`.
/// Lookup walks from the current level down to 0 so inner declarations
/// shadow outer ones; redeclaration is only rejected within one level.
pub struct SymbolTable {
  scopes: [Vec<Symbol>; MAX_LEXI_LEVEL as usize + 1],
  next_id: SymbolId,
}

impl SymbolTable {
  pub fn new() -> Self {
    SymbolTable {
      scopes: std::array::from_fn(|_| Vec::new()),
      next_id: 0,
    }
  }

  /// Clears the scope at `level`, for reuse when a sibling procedure at
  /// the same level is declared after a previous one's scope has closed.
  pub fn reset_level(&mut self, level: u32) {
    if let Some(scope) = self.scopes.get_mut(level as usize) {
      scope.clear();
    }
  }

  pub fn declare(&mut self, level: u32, name: &str, kind: SymbolKind) -> Result<SymbolId, DeclError> {
    if level > MAX_LEXI_LEVEL {
      return Err(DeclError::LevelOverflow);
    }

    let scope = &self.scopes[level as usize];
    if scope.iter().any(|s| s.name == name) {
      return Err(DeclError::Redeclared);
    }

    let id = self.next_id;
    self.next_id += 1;

    self.scopes[level as usize].push(Symbol {
      id,
      name: name.to_string(),
      kind,
      level,
    });

    Ok(id)
  }

  pub fn lookup(&self, current_level: u32, name: &str) -> Option<&Symbol> {
    for level in (0..=current_level.min(MAX_LEXI_LEVEL)).rev() {
      if let Some(sym) = self.scopes[level as usize].iter().rev().find(|s| s.name == name) {
        return Some(sym);
      }
    }
    None
  }

  /// Mutable lookup, used by the parser to patch a procedure's address
  /// once its body has been placed.
  pub fn lookup_mut(&mut self, current_level: u32, name: &str) -> Option<&mut Symbol> {
    for level in (0..=current_level.min(MAX_LEXI_LEVEL)).rev() {
      if let Some(sym) = self.scopes[level as usize].iter_mut().rev().find(|s| s.name == name) {
        return Some(sym);
      }
    }
    None
  }

  pub fn by_id_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
    self.scopes.iter_mut().flatten().find(|s| s.id == id)
  }
}

impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn redeclaration_in_same_level_errors() {
    let mut tab = SymbolTable::new();
    tab.declare(0, "x", SymbolKind::Int { addr: 4 }).unwrap();
    let err = tab.declare(0, "x", SymbolKind::Int { addr: 5 }).unwrap_err();
    assert!(matches!(err, DeclError::Redeclared));
  }

  #[test]
  fn shadowing_across_levels_is_allowed() {
    let mut tab = SymbolTable::new();
    tab.declare(0, "x", SymbolKind::Int { addr: 4 }).unwrap();
    tab.declare(1, "x", SymbolKind::Int { addr: 5 }).unwrap();

    let inner = tab.lookup(1, "x").unwrap();
    assert_eq!(inner.level, 1);
    let outer = tab.lookup(0, "x").unwrap();
    assert_eq!(outer.level, 0);
  }

  #[test]
  fn level_overflow_is_rejected() {
    let mut tab = SymbolTable::new();
    let err = tab.declare(MAX_LEXI_LEVEL + 1, "x", SymbolKind::Int { addr: 4 }).unwrap_err();
    assert!(matches!(err, DeclError::LevelOverflow));
  }

  #[test]
  fn reset_level_drops_stale_declarations() {
    let mut tab = SymbolTable::new();
    tab.declare(1, "x", SymbolKind::Int { addr: 4 }).unwrap();
    tab.reset_level(1);
    assert!(tab.lookup(1, "x").is_none());
  }
}

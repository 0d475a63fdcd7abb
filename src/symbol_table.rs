use std::fmt;

use fnv::FnvHashMap;
use thiserror::Error;

use crate::chunk::Segment;

/// Storage class of a declared name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Static,
    Field,
    Argument,
    Local,
}

impl Kind {
    pub fn segment(self) -> Segment {
        match self {
            Kind::Static => Segment::Static,
            Kind::Field => Segment::This,
            Kind::Argument => Segment::Argument,
            Kind::Local => Segment::Local,
        }
    }

    fn is_class_scoped(self) -> bool {
        matches!(self, Kind::Static | Kind::Field)
    }

    fn counter(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Static => "static",
            Kind::Field => "field",
            Kind::Argument => "argument",
            Kind::Local => "local",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub type_name: String,
    pub kind: Kind,
    pub index: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("'{0}' is already declared in this scope")]
    AlreadyDefined(String),
    #[error("'{0}' is not declared")]
    Undeclared(String),
    #[error("too many {0} variables")]
    TooManyVariables(Kind),
}

/// Two-level scope store: class scope for statics and fields, subroutine
/// scope for arguments and locals. Subroutine entries shadow class entries.
#[derive(Default)]
pub struct SymbolTable {
    class_scope: FnvHashMap<String, Symbol>,
    subroutine_scope: FnvHashMap<String, Symbol>,
    counts: [u16; 4],
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
        self.counts[Kind::Argument.counter()] = 0;
        self.counts[Kind::Local.counter()] = 0;
    }

    /// Declares `name` in the scope owning `kind` and returns its slot index.
    pub fn define(&mut self, name: &str, type_name: &str, kind: Kind) -> Result<u16, SymbolError> {
        let scope = if kind.is_class_scoped() {
            &mut self.class_scope
        } else {
            &mut self.subroutine_scope
        };
        if scope.contains_key(name) {
            return Err(SymbolError::AlreadyDefined(name.to_string()));
        }
        let index = self.counts[kind.counter()];
        self.counts[kind.counter()] = index
            .checked_add(1)
            .ok_or(SymbolError::TooManyVariables(kind))?;
        scope.insert(
            name.to_string(),
            Symbol {
                type_name: type_name.to_string(),
                kind,
                index,
            },
        );
        Ok(index)
    }

    pub fn var_count(&self, kind: Kind) -> u16 {
        self.counts[kind.counter()]
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    fn resolve(&self, name: &str) -> Result<&Symbol, SymbolError> {
        self.lookup(name)
            .ok_or_else(|| SymbolError::Undeclared(name.to_string()))
    }

    pub fn kind_of(&self, name: &str) -> Result<Kind, SymbolError> {
        self.resolve(name).map(|s| s.kind)
    }

    pub fn type_of(&self, name: &str) -> Result<&str, SymbolError> {
        self.resolve(name).map(|s| s.type_name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Result<u16, SymbolError> {
        self.resolve(name).map(|s| s.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indices_are_contiguous_per_kind() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("a", "int", Kind::Field), Ok(0));
        assert_eq!(table.define("s", "int", Kind::Static), Ok(0));
        assert_eq!(table.define("b", "int", Kind::Field), Ok(1));
        assert_eq!(table.define("c", "Point", Kind::Field), Ok(2));
        assert_eq!(table.define("x", "int", Kind::Argument), Ok(0));
        assert_eq!(table.define("i", "int", Kind::Local), Ok(0));
        assert_eq!(table.define("j", "int", Kind::Local), Ok(1));
        assert_eq!(table.var_count(Kind::Field), 3);
        assert_eq!(table.var_count(Kind::Static), 1);
        assert_eq!(table.var_count(Kind::Local), 2);
    }

    #[test]
    fn start_subroutine_resets_only_subroutine_scope() {
        let mut table = SymbolTable::new();
        table.define("f", "int", Kind::Field).unwrap();
        table.define("s", "int", Kind::Static).unwrap();
        table.define("x", "int", Kind::Argument).unwrap();
        table.define("y", "int", Kind::Local).unwrap();

        table.start_subroutine();
        assert_eq!(table.var_count(Kind::Argument), 0);
        assert_eq!(table.var_count(Kind::Local), 0);
        assert_eq!(table.kind_of("x"), Err(SymbolError::Undeclared("x".to_string())));
        assert_eq!(table.index_of("f"), Ok(0));

        assert_eq!(table.define("g", "int", Kind::Field), Ok(1));
        assert_eq!(table.define("z", "int", Kind::Local), Ok(0));
    }

    #[test]
    fn local_shadows_field() {
        let mut table = SymbolTable::new();
        table.define("x", "int", Kind::Field).unwrap();
        table.define("x", "boolean", Kind::Local).unwrap();
        assert_eq!(table.kind_of("x"), Ok(Kind::Local));
        assert_eq!(table.type_of("x"), Ok("boolean"));

        table.start_subroutine();
        assert_eq!(table.kind_of("x"), Ok(Kind::Field));
        assert_eq!(table.type_of("x"), Ok("int"));
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        table.define("x", "int", Kind::Field).unwrap();
        assert_eq!(
            table.define("x", "int", Kind::Static),
            Err(SymbolError::AlreadyDefined("x".to_string()))
        );
        table.define("a", "int", Kind::Argument).unwrap();
        assert_eq!(
            table.define("a", "int", Kind::Local),
            Err(SymbolError::AlreadyDefined("a".to_string()))
        );
        // failed definitions do not consume an index
        assert_eq!(table.var_count(Kind::Static), 0);
        assert_eq!(table.var_count(Kind::Local), 0);
    }

    #[test]
    fn undeclared_is_distinct_from_index_zero() {
        let mut table = SymbolTable::new();
        table.define("first", "int", Kind::Local).unwrap();
        assert_eq!(table.index_of("first"), Ok(0));
        assert_eq!(
            table.index_of("missing"),
            Err(SymbolError::Undeclared("missing".to_string()))
        );
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn slot_indices_stop_at_the_u16_limit() {
        let mut table = SymbolTable::new();
        for i in 0..u16::MAX {
            assert_eq!(table.define(&format!("v{}", i), "int", Kind::Local), Ok(i));
        }
        assert_eq!(
            table.define("overflow", "int", Kind::Local),
            Err(SymbolError::TooManyVariables(Kind::Local))
        );
        assert!(table.lookup("overflow").is_none());
        assert_eq!(table.var_count(Kind::Local), u16::MAX);
        // other kinds keep their own counters
        assert_eq!(table.define("a", "int", Kind::Argument), Ok(0));
    }

    #[test]
    fn kinds_map_to_segments() {
        assert_eq!(Kind::Static.segment(), Segment::Static);
        assert_eq!(Kind::Field.segment(), Segment::This);
        assert_eq!(Kind::Argument.segment(), Segment::Argument);
        assert_eq!(Kind::Local.segment(), Segment::Local);
    }
}

use std::collections::{BTreeSet, HashMap};

use crate::parser::ast::{NodeId, SyntaxNode};

/// Result of override resolution. `Unknown` means the supertypes could not be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Overriding {
    Yes,
    No,
    Unknown,
}

impl From<Option<bool>> for Overriding {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Overriding::Yes,
            Some(false) => Overriding::No,
            None => Overriding::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Type,
    Method,
    Constructor,
    Variable,
}

/// Resolved identity of a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    kind: SymbolKind,
    annotations: BTreeSet<String>,
    overriding: Overriding,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        let overriding = match kind {
            SymbolKind::Method => Overriding::Unknown,
            _ => Overriding::No,
        };
        Self {
            name: name.into(),
            kind,
            annotations: BTreeSet::new(),
            overriding,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(name, SymbolKind::Variable)
    }

    pub fn method(name: impl Into<String>, overriding: Overriding) -> Self {
        Self::new(name, SymbolKind::Method).with_overriding(overriding)
    }

    pub fn with_annotation(mut self, fully_qualified_name: impl Into<String>) -> Self {
        self.annotations.insert(fully_qualified_name.into());
        self
    }

    pub fn with_overriding(mut self, overriding: Overriding) -> Self {
        self.overriding = overriding;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn annotations(&self) -> impl Iterator<Item = &str> + '_ {
        self.annotations.iter().map(String::as_str)
    }

    pub fn has_annotation(&self, fully_qualified_name: &str) -> bool {
        self.annotations.contains(fully_qualified_name)
    }

    /// Always `No` for anything that is not a method
    pub fn is_overriding(&self) -> Overriding {
        self.overriding
    }
}

/// Read-only view from declarations to their symbols for one syntax unit
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    semantic: bool,
    symbols: HashMap<NodeId, Symbol>,
}

impl SymbolTable {
    /// Table for a unit whose semantic resolution succeeded
    pub fn with_semantic() -> Self {
        Self {
            semantic: true,
            symbols: HashMap::new(),
        }
    }

    /// Table for a unit without semantic information, every lookup yields `None`
    pub fn unavailable() -> Self {
        Self {
            semantic: false,
            symbols: HashMap::new(),
        }
    }

    pub fn insert(&mut self, node: NodeId, symbol: Symbol) {
        if self.semantic {
            self.symbols.insert(node, symbol);
        }
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic
    }

    pub fn resolve(&self, declaration: &SyntaxNode) -> Option<&Symbol> {
        self.get(declaration.id())
    }

    pub fn get(&self, node: NodeId) -> Option<&Symbol> {
        if !self.semantic {
            return None;
        }
        self.symbols.get(&node)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

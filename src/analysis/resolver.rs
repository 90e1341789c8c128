//! Builds a [`SymbolTable`] from a parsed tree without a classpath.
//!
//! Annotation names are resolved through the unit's imports, `java.lang` and its
//! package. An annotation that cannot be resolved with certainty (a simple name
//! that may come from an on-demand import) leaves the whole unit without semantic
//! information, the same way an incomplete classpath would.

use std::collections::HashMap;

use log::debug;

use crate::analysis::symbol_table::{Overriding, Symbol, SymbolKind, SymbolTable};
use crate::parser::ast::{
    MethodDeclaration, Modifier, ModifierList, NodeKind, SyntaxNode, SyntaxTree, TypeDeclaration,
};

const OVERRIDE: &str = "java.lang.Override";

const JAVA_LANG_ANNOTATIONS: &[&str] = &[
    "Override",
    "Deprecated",
    "SuppressWarnings",
    "FunctionalInterface",
    "SafeVarargs",
];

// overridable instance methods of java.lang.Object, (name, parameter types)
const OBJECT_METHODS: &[(&str, &[&str])] = &[
    ("equals", &["Object"]),
    ("hashCode", &[]),
    ("toString", &[]),
    ("clone", &[]),
    ("finalize", &[]),
];

pub struct Resolver<'t> {
    package: Option<&'t str>,
    imports: HashMap<&'t str, &'t str>,
    has_wildcard_imports: bool,
    table: SymbolTable,
    unresolved: Vec<String>,
}

impl<'t> Resolver<'t> {
    pub fn new(tree: &'t SyntaxTree) -> Self {
        let mut resolver = Resolver {
            package: None,
            imports: HashMap::new(),
            has_wildcard_imports: false,
            table: SymbolTable::with_semantic(),
            unresolved: Vec::new(),
        };

        if let Ok(unit) = tree.root().as_compilation_unit() {
            resolver.package = unit.package();
            for import in unit.imports().iter().filter(|i| !i.is_static) {
                if import.is_wildcard {
                    resolver.has_wildcard_imports = true;
                } else {
                    let simple = import.path.rsplit('.').next().unwrap_or(&import.path);
                    resolver.imports.insert(simple, import.path.as_str());
                }
            }
        }

        resolver
    }

    /// Resolves every declaration of the tree
    pub fn resolve(tree: &'t SyntaxTree) -> SymbolTable {
        let mut resolver = Resolver::new(tree);
        let root = tree.root();

        match root.as_compilation_unit() {
            Ok(unit) => {
                for node in unit.types() {
                    resolver.visit_type(node);
                }
            }
            Err(_) => resolver.visit_type(root),
        }

        resolver.finish()
    }

    fn finish(self) -> SymbolTable {
        if self.unresolved.is_empty() {
            debug!("resolved {} symbols", self.table.len());
            self.table
        } else {
            debug!(
                "semantic information unavailable, unresolved annotations: {}",
                self.unresolved.join(", ")
            );
            SymbolTable::unavailable()
        }
    }

    pub fn qualify_annotation(&self, name: &str) -> Option<String> {
        if name.contains('.') {
            return Some(name.to_string());
        }
        if let Some(path) = self.imports.get(name) {
            return Some(path.to_string());
        }
        if JAVA_LANG_ANNOTATIONS.contains(&name) {
            return Some(format!("java.lang.{}", name));
        }
        if self.has_wildcard_imports {
            return None;
        }
        Some(match self.package {
            Some(package) => format!("{}.{}", package, name),
            None => name.to_string(),
        })
    }

    fn symbol_for(&mut self, name: &str, kind: SymbolKind, modifiers: &ModifierList) -> Symbol {
        let mut symbol = Symbol::new(name, kind);
        for annotation in modifiers.annotations() {
            match self.qualify_annotation(&annotation.name) {
                Some(qualified) => symbol = symbol.with_annotation(qualified),
                None => self.unresolved.push(annotation.name.clone()),
            }
        }
        symbol
    }

    fn visit_type(&mut self, node: &SyntaxNode) {
        let Ok(decl) = node.as_type_declaration() else {
            return;
        };
        let Ok(modifiers) = decl.modifiers() else {
            return;
        };

        let symbol = self.symbol_for(decl.name(), SymbolKind::Type, modifiers);
        self.table.insert(node.id(), symbol);

        for member in decl.members() {
            match member.kind() {
                NodeKind::Class | NodeKind::Interface | NodeKind::Enum => self.visit_type(member),
                NodeKind::Variable => self.visit_variable(member),
                NodeKind::Method => self.visit_method(decl, member),
                NodeKind::Constructor => self.visit_constructor(member),
                _ => {}
            }
        }
    }

    fn visit_variable(&mut self, node: &SyntaxNode) {
        let (Ok(decl), Ok(modifiers)) = (node.as_variable(), node.modifiers()) else {
            return;
        };
        let symbol = self.symbol_for(decl.name(), SymbolKind::Variable, modifiers);
        self.table.insert(node.id(), symbol);
    }

    fn visit_constructor(&mut self, node: &SyntaxNode) {
        let (Ok(decl), Ok(modifiers)) = (node.as_method(), node.modifiers()) else {
            return;
        };
        let symbol = self.symbol_for(decl.name(), SymbolKind::Constructor, modifiers);
        self.table.insert(node.id(), symbol);
    }

    fn visit_method(&mut self, owner: &TypeDeclaration, node: &SyntaxNode) {
        let (Ok(decl), Ok(modifiers)) = (node.as_method(), node.modifiers()) else {
            return;
        };
        let symbol = self.symbol_for(decl.name(), SymbolKind::Method, modifiers);
        let overriding = Self::overriding(owner, decl, modifiers, &symbol);
        self.table.insert(node.id(), symbol.with_overriding(overriding));
    }

    fn overriding(
        owner: &TypeDeclaration,
        method: &MethodDeclaration,
        modifiers: &ModifierList,
        symbol: &Symbol,
    ) -> Overriding {
        if symbol.has_annotation(OVERRIDE) {
            return Overriding::Yes;
        }
        if modifiers.has(Modifier::Static) || modifiers.has(Modifier::Private) {
            return Overriding::No;
        }
        if Self::is_object_method(method) {
            return Overriding::Yes;
        }
        if !owner.has_supertypes() {
            return Overriding::No;
        }
        Overriding::Unknown
    }

    fn is_object_method(method: &MethodDeclaration) -> bool {
        OBJECT_METHODS.iter().any(|(name, parameters)| {
            *name == method.name()
                && method.parameters().len() == parameters.len()
                && method
                    .parameters()
                    .iter()
                    .zip(parameters.iter())
                    .all(|(p, expected)| {
                        p.type_name == *expected || p.type_name == format!("java.lang.{}", expected)
                    })
        })
    }
}

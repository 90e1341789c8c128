use std::fmt;

use thiserror::Error;

/// Represents a position in the source code (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

/// Represents a span in the source code, end column is exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceSpan {
    pub fn new(start: SourcePosition, end: SourcePosition) -> Self {
        Self { start, end }
    }

    /// Zero width span, used for nodes without any tokens (an empty modifier list)
    pub fn empty_at(position: SourcePosition) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Span covering `self` up to the end of `other`
    pub fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }

    /// Length in columns when the span sits on a single line
    pub fn len(&self) -> Option<usize> {
        if self.start.line == self.end.line {
            self.end.column.checked_sub(self.start.column)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

/// Identity of a node inside one tree, used as the key for symbol lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Tag of every node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    CompilationUnit,
    Class,
    Interface,
    Enum,
    Method,
    Constructor,
    Variable,
    Initializer,
    Block,
    Modifiers,
    ModifierKeyword,
    Annotation,
}

impl NodeKind {
    pub const COUNT: usize = 12;

    pub const ALL: [NodeKind; Self::COUNT] = [
        NodeKind::CompilationUnit,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Enum,
        NodeKind::Method,
        NodeKind::Constructor,
        NodeKind::Variable,
        NodeKind::Initializer,
        NodeKind::Block,
        NodeKind::Modifiers,
        NodeKind::ModifierKeyword,
        NodeKind::Annotation,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::CompilationUnit => "COMPILATION_UNIT",
            NodeKind::Class => "CLASS",
            NodeKind::Interface => "INTERFACE",
            NodeKind::Enum => "ENUM",
            NodeKind::Method => "METHOD",
            NodeKind::Constructor => "CONSTRUCTOR",
            NodeKind::Variable => "VARIABLE",
            NodeKind::Initializer => "INITIALIZER",
            NodeKind::Block => "BLOCK",
            NodeKind::Modifiers => "MODIFIERS",
            NodeKind::ModifierKeyword => "MODIFIER_KEYWORD",
            NodeKind::Annotation => "ANNOTATION",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of node kinds, a rule's subscription
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeKindSet(u16);

impl NodeKindSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        NodeKind::ALL.into_iter().collect()
    }

    pub fn of(kinds: &[NodeKind]) -> Self {
        kinds.iter().copied().collect()
    }

    pub fn insert(&mut self, kind: NodeKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeKind> + '_ {
        NodeKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }
}

impl FromIterator<NodeKind> for NodeKindSet {
    fn from_iter<I: IntoIterator<Item = NodeKind>>(iter: I) -> Self {
        let mut set = NodeKindSet::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Debug for NodeKindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for NodeKindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(NodeKind::name).collect();
        f.write_str(&names.join(" | "))
    }
}

/// An accessor was called on a node of the wrong kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} node, found {found} at {span}")]
pub struct TypeMismatch {
    pub expected: NodeKindSet,
    pub found: NodeKind,
    pub span: SourceSpan,
}

/// Modifier keywords that may appear in a modifier list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Final,
    Static,
    Abstract,
    Synchronized,
    Transient,
    Volatile,
    Native,
    Strictfp,
    Default,
}

impl Modifier {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let modifier = match keyword {
            "public" => Modifier::Public,
            "protected" => Modifier::Protected,
            "private" => Modifier::Private,
            "final" => Modifier::Final,
            "static" => Modifier::Static,
            "abstract" => Modifier::Abstract,
            "synchronized" => Modifier::Synchronized,
            "transient" => Modifier::Transient,
            "volatile" => Modifier::Volatile,
            "native" => Modifier::Native,
            "strictfp" => Modifier::Strictfp,
            "default" => Modifier::Default,
            _ => return None,
        };
        Some(modifier)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Final => "final",
            Modifier::Static => "static",
            Modifier::Abstract => "abstract",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Native => "native",
            Modifier::Strictfp => "strictfp",
            Modifier::Default => "default",
        }
    }
}

/// A parsed syntax unit, the root is always a `COMPILATION_UNIT` node for parsed sources
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: SyntaxNode,
    node_count: usize,
}

impl SyntaxTree {
    pub fn root(&self) -> &SyntaxNode {
        &self.root
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }
}

/// One node of the tree. Nodes own their children and are never mutated after construction.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    id: NodeId,
    span: SourceSpan,
    data: NodeData,
}

/// Kind specific payload of a node
#[derive(Debug, Clone)]
pub enum NodeData {
    CompilationUnit(CompilationUnit),
    Class(TypeDeclaration),
    Interface(TypeDeclaration),
    Enum(TypeDeclaration),
    Method(MethodDeclaration),
    Constructor(MethodDeclaration),
    Variable(VariableDeclaration),
    Initializer(Initializer),
    Block(Block),
    Modifiers(ModifierList),
    ModifierKeyword(ModifierKeyword),
    Annotation(Annotation),
}

impl SyntaxNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn span(&self) -> SourceSpan {
        self.span
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::CompilationUnit(_) => NodeKind::CompilationUnit,
            NodeData::Class(_) => NodeKind::Class,
            NodeData::Interface(_) => NodeKind::Interface,
            NodeData::Enum(_) => NodeKind::Enum,
            NodeData::Method(_) => NodeKind::Method,
            NodeData::Constructor(_) => NodeKind::Constructor,
            NodeData::Variable(_) => NodeKind::Variable,
            NodeData::Initializer(_) => NodeKind::Initializer,
            NodeData::Block(_) => NodeKind::Block,
            NodeData::Modifiers(_) => NodeKind::Modifiers,
            NodeData::ModifierKeyword(_) => NodeKind::ModifierKeyword,
            NodeData::Annotation(_) => NodeKind::Annotation,
        }
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind() == kind
    }

    /// Direct children in source order
    pub fn children(&self) -> Vec<&SyntaxNode> {
        match &self.data {
            NodeData::CompilationUnit(unit) => unit.types.iter().collect(),
            NodeData::Class(decl) | NodeData::Interface(decl) | NodeData::Enum(decl) => {
                std::iter::once(&*decl.modifiers)
                    .chain(decl.members.iter())
                    .collect()
            }
            NodeData::Method(decl) | NodeData::Constructor(decl) => {
                std::iter::once(&*decl.modifiers)
                    .chain(decl.body.as_deref())
                    .collect()
            }
            NodeData::Variable(decl) => vec![&*decl.modifiers],
            NodeData::Initializer(init) => vec![&*init.body],
            NodeData::Modifiers(list) => list.items.iter().collect(),
            NodeData::Block(_) | NodeData::ModifierKeyword(_) | NodeData::Annotation(_) => {
                Vec::new()
            }
        }
    }

    fn mismatch(&self, expected: &[NodeKind]) -> TypeMismatch {
        TypeMismatch {
            expected: NodeKindSet::of(expected),
            found: self.kind(),
            span: self.span,
        }
    }

    pub fn as_compilation_unit(&self) -> Result<&CompilationUnit, TypeMismatch> {
        match &self.data {
            NodeData::CompilationUnit(unit) => Ok(unit),
            _ => Err(self.mismatch(&[NodeKind::CompilationUnit])),
        }
    }

    /// Class, interface or enum declaration
    pub fn as_type_declaration(&self) -> Result<&TypeDeclaration, TypeMismatch> {
        match &self.data {
            NodeData::Class(decl) | NodeData::Interface(decl) | NodeData::Enum(decl) => Ok(decl),
            _ => Err(self.mismatch(&[NodeKind::Class, NodeKind::Interface, NodeKind::Enum])),
        }
    }

    /// Method or constructor declaration
    pub fn as_method(&self) -> Result<&MethodDeclaration, TypeMismatch> {
        match &self.data {
            NodeData::Method(decl) | NodeData::Constructor(decl) => Ok(decl),
            _ => Err(self.mismatch(&[NodeKind::Method, NodeKind::Constructor])),
        }
    }

    pub fn as_variable(&self) -> Result<&VariableDeclaration, TypeMismatch> {
        match &self.data {
            NodeData::Variable(decl) => Ok(decl),
            _ => Err(self.mismatch(&[NodeKind::Variable])),
        }
    }

    pub fn as_modifiers(&self) -> Result<&ModifierList, TypeMismatch> {
        match &self.data {
            NodeData::Modifiers(list) => Ok(list),
            _ => Err(self.mismatch(&[NodeKind::Modifiers])),
        }
    }

    pub fn as_modifier_keyword(&self) -> Result<&ModifierKeyword, TypeMismatch> {
        match &self.data {
            NodeData::ModifierKeyword(keyword) => Ok(keyword),
            _ => Err(self.mismatch(&[NodeKind::ModifierKeyword])),
        }
    }

    pub fn as_annotation(&self) -> Result<&Annotation, TypeMismatch> {
        match &self.data {
            NodeData::Annotation(annotation) => Ok(annotation),
            _ => Err(self.mismatch(&[NodeKind::Annotation])),
        }
    }

    /// Modifier list of any declaration that carries one
    pub fn modifiers(&self) -> Result<&ModifierList, TypeMismatch> {
        let node = match &self.data {
            NodeData::Class(decl) | NodeData::Interface(decl) | NodeData::Enum(decl) => {
                &decl.modifiers
            }
            NodeData::Method(decl) | NodeData::Constructor(decl) => &decl.modifiers,
            NodeData::Variable(decl) => &decl.modifiers,
            _ => {
                return Err(self.mismatch(&[
                    NodeKind::Class,
                    NodeKind::Interface,
                    NodeKind::Enum,
                    NodeKind::Method,
                    NodeKind::Constructor,
                    NodeKind::Variable,
                ]));
            }
        };
        node.as_modifiers()
    }
}

/// A single-type or on-demand import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub is_static: bool,
    pub is_wildcard: bool,
}

/// The root of a parsed file
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    package: Option<String>,
    imports: Vec<Import>,
    types: Vec<SyntaxNode>,
}

impl CompilationUnit {
    pub fn new(package: Option<String>, imports: Vec<Import>, types: Vec<SyntaxNode>) -> Self {
        Self {
            package,
            imports,
            types,
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn types(&self) -> &[SyntaxNode] {
        &self.types
    }
}

/// Class, interface or enum, the node kind tells which
#[derive(Debug, Clone)]
pub struct TypeDeclaration {
    modifiers: Box<SyntaxNode>,
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    members: Vec<SyntaxNode>,
}

impl TypeDeclaration {
    pub fn new(
        modifiers: SyntaxNode,
        name: impl Into<String>,
        superclass: Option<String>,
        interfaces: Vec<String>,
        members: Vec<SyntaxNode>,
    ) -> Self {
        Self {
            modifiers: Box::new(modifiers),
            name: name.into(),
            superclass,
            interfaces,
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers_node(&self) -> &SyntaxNode {
        &self.modifiers
    }

    pub fn modifiers(&self) -> Result<&ModifierList, TypeMismatch> {
        self.modifiers.as_modifiers()
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    /// `implements` list for classes and enums, `extends` list for interfaces
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn has_supertypes(&self) -> bool {
        self.superclass.is_some() || !self.interfaces.is_empty()
    }

    /// Direct members in declaration order
    pub fn members(&self) -> &[SyntaxNode] {
        &self.members
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub type_name: String,
    pub name: String,
}

/// Method or constructor; constructors have no return type
#[derive(Debug, Clone)]
pub struct MethodDeclaration {
    modifiers: Box<SyntaxNode>,
    name: String,
    return_type: Option<String>,
    parameters: Vec<Parameter>,
    body: Option<Box<SyntaxNode>>,
}

impl MethodDeclaration {
    pub fn new(
        modifiers: SyntaxNode,
        name: impl Into<String>,
        return_type: Option<String>,
        parameters: Vec<Parameter>,
        body: Option<SyntaxNode>,
    ) -> Self {
        Self {
            modifiers: Box::new(modifiers),
            name: name.into(),
            return_type,
            parameters,
            body: body.map(Box::new),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers(&self) -> Result<&ModifierList, TypeMismatch> {
        self.modifiers.as_modifiers()
    }

    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn body(&self) -> Option<&SyntaxNode> {
        self.body.as_deref()
    }
}

/// A field declaration, one node per declarator
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    modifiers: Box<SyntaxNode>,
    type_name: String,
    name: String,
}

impl VariableDeclaration {
    pub fn new(modifiers: SyntaxNode, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            modifiers: Box::new(modifiers),
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn modifiers(&self) -> Result<&ModifierList, TypeMismatch> {
        self.modifiers.as_modifiers()
    }
}

/// `static { ... }` or `{ ... }` inside a type body
#[derive(Debug, Clone)]
pub struct Initializer {
    is_static: bool,
    body: Box<SyntaxNode>,
}

impl Initializer {
    pub fn new(is_static: bool, body: SyntaxNode) -> Self {
        Self {
            is_static,
            body: Box::new(body),
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn body(&self) -> &SyntaxNode {
        &self.body
    }
}

/// Opaque statement block, statements are not modelled
#[derive(Debug, Clone, Default)]
pub struct Block {
    token_count: usize,
}

impl Block {
    pub fn new(token_count: usize) -> Self {
        Self { token_count }
    }

    /// Number of tokens between the braces
    pub fn token_count(&self) -> usize {
        self.token_count
    }
}

/// Ordered modifier keywords and annotations of a declaration
#[derive(Debug, Clone, Default)]
pub struct ModifierList {
    items: Vec<SyntaxNode>,
}

impl ModifierList {
    /// Items must be `MODIFIER_KEYWORD` or `ANNOTATION` nodes
    pub fn new(items: Vec<SyntaxNode>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[SyntaxNode] {
        &self.items
    }

    /// Keywords in source order, with the span of each keyword token
    pub fn keywords(&self) -> impl Iterator<Item = (Modifier, SourceSpan)> + '_ {
        self.items.iter().filter_map(|item| match &item.data {
            NodeData::ModifierKeyword(keyword) => Some((keyword.modifier, item.span)),
            _ => None,
        })
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.items.iter().filter_map(|item| match &item.data {
            NodeData::Annotation(annotation) => Some(annotation),
            _ => None,
        })
    }

    /// Span of the first occurrence of `modifier`
    pub fn get(&self, modifier: Modifier) -> Option<SourceSpan> {
        self.keywords()
            .find(|(m, _)| *m == modifier)
            .map(|(_, span)| span)
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.get(modifier).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierKeyword {
    pub modifier: Modifier,
}

/// Annotation usage, the name is kept as written (simple or qualified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
}

/// Allocates node ids; every node of a tree must come from the same builder
#[derive(Debug, Default)]
pub struct TreeBuilder {
    next_id: u32,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, span: SourceSpan, data: NodeData) -> SyntaxNode {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        SyntaxNode { id, span, data }
    }

    pub fn modifier_keyword(&mut self, modifier: Modifier, span: SourceSpan) -> SyntaxNode {
        self.node(span, NodeData::ModifierKeyword(ModifierKeyword { modifier }))
    }

    pub fn annotation(&mut self, name: impl Into<String>, span: SourceSpan) -> SyntaxNode {
        self.node(span, NodeData::Annotation(Annotation { name: name.into() }))
    }

    pub fn modifiers(&mut self, span: SourceSpan, items: Vec<SyntaxNode>) -> SyntaxNode {
        self.node(span, NodeData::Modifiers(ModifierList::new(items)))
    }

    pub fn finish(self, root: SyntaxNode) -> SyntaxTree {
        SyntaxTree {
            root,
            node_count: self.next_id as usize,
        }
    }
}

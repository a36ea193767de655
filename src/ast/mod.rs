use serde::{Deserialize, Serialize};

use crate::span::SourceSpan;

/// The closed set of grammar node kinds. The grammar is known in advance,
/// so nodes are one struct tagged by kind rather than a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // Statements
    Block,
    If,
    Else,
    While,
    DoWhile,
    For,
    Foreach,
    Switch,
    SwitchLabel,
    Try,
    Catch,
    Finally,
    Throw,
    Return,
    Echo,
    Global,
    Unset,
    Break,
    Continue,
    StaticVariableDeclaration,
    ExpressionStatement,

    // Expressions
    Expression,
    Assignment,
    Ternary,
    MemberPrefix,
    MethodPostfix,
    PropertyPostfix,
    ConstantPostfix,
    IndexPostfix,
    Arguments,
    Allocation,
    Instanceof,
    Clone,
    Closure,
    FunctionCall,
    ArrayLiteral,
    Literal,
    Variable,
    VariableVariable,
    Identifier,
    ClassReference,
    SelfReference,
    ParentReference,
    StaticReference,
    ConstantReference,
}

/// Generic grammar node: kind tag, verbatim image, ordered children and
/// line/column span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    pub image: String,
    pub children: Vec<AstNode>,
    pub span: SourceSpan,
}

impl Default for AstNode {
    fn default() -> Self {
        AstNode::new(NodeKind::Expression, "")
    }
}

impl AstNode {
    pub fn new(kind: NodeKind, image: impl Into<String>) -> Self {
        Self {
            kind,
            image: image.into(),
            children: Vec::new(),
            span: SourceSpan::default(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = span;
        self
    }

    pub fn add_child(&mut self, child: AstNode) {
        self.children.push(child);
    }

    pub fn first_child_of_kind(&self, kind: NodeKind) -> Option<&AstNode> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn children_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &AstNode> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Depth-first search over the whole subtree, this node excluded.
    pub fn find_of_kind(&self, kind: NodeKind) -> Vec<&AstNode> {
        let mut found = Vec::new();
        for child in &self.children {
            child.collect_of_kind(kind, &mut found);
        }
        found
    }

    fn collect_of_kind<'a>(&'a self, kind: NodeKind, found: &mut Vec<&'a AstNode>) {
        if self.kind == kind {
            found.push(self);
        }
        for child in &self.children {
            child.collect_of_kind(kind, found);
        }
    }

    /// Double-dispatch hook for external traversal.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_node(self);
    }
}

pub trait Visitor {
    fn visit_node(&mut self, node: &AstNode) {
        walk_node(self, node);
    }
}

pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &AstNode) {
    for child in &node.children {
        visitor.visit_node(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> AstNode {
        let mut block = AstNode::new(NodeKind::Block, "");
        let mut assign = AstNode::new(NodeKind::Assignment, "=");
        assign.add_child(AstNode::new(NodeKind::Variable, "$a"));
        let mut alloc = AstNode::new(NodeKind::Allocation, "new");
        alloc.add_child(AstNode::new(NodeKind::ClassReference, "foo\\Bar"));
        assign.add_child(alloc);
        block.add_child(AstNode::new(NodeKind::Variable, "$before"));
        block.add_child(assign);
        block
    }

    #[test]
    fn first_child_is_shallow() {
        let t = tree();
        assert_eq!(t.first_child_of_kind(NodeKind::Variable).unwrap().image, "$before");
        assert!(t.first_child_of_kind(NodeKind::Allocation).is_none());
    }

    #[test]
    fn find_of_kind_searches_deep() {
        let t = tree();
        let refs = t.find_of_kind(NodeKind::ClassReference);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].image, "foo\\Bar");
    }

    #[test]
    fn visitor_walks_every_node() {
        struct Counter(usize);
        impl Visitor for Counter {
            fn visit_node(&mut self, node: &AstNode) {
                self.0 += 1;
                walk_node(self, node);
            }
        }
        let mut counter = Counter(0);
        tree().accept(&mut counter);
        assert_eq!(counter.0, 6);
    }
}

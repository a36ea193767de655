use serde::{Deserialize, Serialize};

use crate::span::SourceSpan;

/// One lexed token. Tokens own their verbatim image so captured token lists
/// can reproduce the exact source slice of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub image: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Token {
    pub fn source_span(&self) -> SourceSpan {
        SourceSpan::new(self.start_line, self.start_col, self.end_line, self.end_col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Keywords
    Class,
    Interface,
    Trait,
    Function,
    Namespace,
    Use,
    As,
    Extends,
    Implements,
    Public,
    Protected,
    Private,
    Static,
    Abstract,
    Final,
    Readonly,
    Var,
    Const,
    Global,
    New,
    Clone,
    InstanceOf,
    SelfType,   // self
    ParentType, // parent
    If,
    Else,
    ElseIf,
    While,
    Do,
    For,
    Foreach,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Try,
    Catch,
    Finally,
    Throw,
    Echo,
    Unset,
    True,
    False,
    Null,
    Array,
    LogicalAnd, // and
    LogicalOr,  // or
    LogicalXor, // xor

    // Identifiers & literals
    Identifier,
    Variable, // $name
    Dollar,   // bare $ (variable variables)
    LNumber,
    DNumber,
    StringLiteral,
    InlineHtml,
    Comment,
    DocComment,

    // Symbols
    NsSeparator, // \
    Arrow,       // ->
    DoubleArrow, // =>
    DoubleColon, // ::
    Ellipsis,    // ...
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Dot,
    Pow, // **
    Inc, // ++
    Dec, // --

    Eq, // =
    PlusEq,
    MinusEq,
    MulEq,
    DivEq,
    ModEq,
    ConcatEq,
    PowEq,
    AndEq,
    OrEq,
    XorEq,
    SlEq,
    SrEq,
    CoalesceEq,

    EqEq,
    EqEqEq,
    Bang,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship, // <=>

    Ampersand,
    Pipe,
    Caret,
    BitNot, // ~
    Sl,     // <<
    Sr,     // >>

    AmpAmp,   // &&
    PipePipe, // ||
    Question, // ?
    Coalesce, // ??
    At,       // @

    SemiColon,
    Colon,
    Comma,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    OpenTag,  // <?php
    CloseTag, // ?>

    Eof,

    // Byte the scanner cannot type; the parser rejects it verbatim.
    Error,
}

impl TokenKind {
    /// Visibility/state modifiers legal in type bodies.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
        )
    }

    /// Keywords that double as member or constant names after `->` / `::`.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Class
                | TokenKind::Interface
                | TokenKind::Trait
                | TokenKind::Function
                | TokenKind::Namespace
                | TokenKind::Use
                | TokenKind::As
                | TokenKind::Extends
                | TokenKind::Implements
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::Global
                | TokenKind::New
                | TokenKind::Clone
                | TokenKind::InstanceOf
                | TokenKind::SelfType
                | TokenKind::ParentType
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Return
                | TokenKind::Try
                | TokenKind::Catch
                | TokenKind::Finally
                | TokenKind::Throw
                | TokenKind::Echo
                | TokenKind::Unset
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Array
                | TokenKind::LogicalAnd
                | TokenKind::LogicalOr
                | TokenKind::LogicalXor
        ) || self.is_modifier()
    }

    /// Tokens that can begin a qualified type name.
    pub fn starts_name(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace
        )
    }

    /// Plain or compound assignment operators. Assignment is decided
    /// post-fix: after a left-hand expression has been parsed.
    pub fn is_assign_op(self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::MulEq
                | TokenKind::DivEq
                | TokenKind::ModEq
                | TokenKind::ConcatEq
                | TokenKind::PowEq
                | TokenKind::AndEq
                | TokenKind::OrEq
                | TokenKind::XorEq
                | TokenKind::SlEq
                | TokenKind::SrEq
                | TokenKind::CoalesceEq
        )
    }

    /// Operators that continue an expression stream after an operand.
    pub fn is_binary_op(self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Dot
                | TokenKind::Pow
                | TokenKind::EqEq
                | TokenKind::EqEqEq
                | TokenKind::BangEq
                | TokenKind::BangEqEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
                | TokenKind::Spaceship
                | TokenKind::Ampersand
                | TokenKind::Pipe
                | TokenKind::Caret
                | TokenKind::Sl
                | TokenKind::Sr
                | TokenKind::AmpAmp
                | TokenKind::PipePipe
                | TokenKind::LogicalAnd
                | TokenKind::LogicalOr
                | TokenKind::LogicalXor
                | TokenKind::Coalesce
        )
    }
}

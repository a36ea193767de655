use crate::lexer::token::{Token, TokenKind};
use crate::lexer::Lexer;

/// The tokenizer contract the parser consumes. Single forward pass, no
/// backtracking: `peek` looks at the next kind without consuming, `next`
/// consumes, `prev` reports the kind of the last consumed token.
pub trait TokenStream {
    fn peek(&mut self) -> TokenKind;
    fn next(&mut self) -> Token;
    fn prev(&self) -> TokenKind;
}

/// Lexer-backed stream with a single token of lookahead.
pub struct LexerTokenStream<'src> {
    lexer: Lexer<'src>,
    lookahead: Option<Token>,
    prev: TokenKind,
}

impl<'src> LexerTokenStream<'src> {
    pub fn new(source: &'src [u8]) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: None,
            prev: TokenKind::Eof,
        }
    }

    fn fill(&mut self) {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token());
        }
    }
}

impl<'src> TokenStream for LexerTokenStream<'src> {
    fn peek(&mut self) -> TokenKind {
        self.fill();
        self.lookahead.as_ref().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn next(&mut self) -> Token {
        self.fill();
        let token = self.lookahead.take().unwrap_or_else(|| Token {
            kind: TokenKind::Eof,
            image: String::new(),
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 0,
        });
        if token.kind != TokenKind::Eof {
            self.prev = token.kind;
        }
        token
    }

    fn prev(&self) -> TokenKind {
        self.prev
    }
}

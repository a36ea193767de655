use crate::lexer::token::Token;
use crate::span::SourceSpan;

/// Nested token-capture frames. Every consumed token is appended to all
/// currently open frames, so a parent frame accumulates its children's
/// tokens too; the popped list is the verbatim span of the node under
/// construction.
#[derive(Debug, Default)]
pub struct CaptureStack {
    frames: Vec<Vec<Token>>,
}

impl CaptureStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop(&mut self) -> Vec<Token> {
        self.frames.pop().unwrap_or_default()
    }

    pub fn record(&mut self, token: &Token) {
        for frame in &mut self.frames {
            frame.push(token.clone());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Line/column extent of a captured token list, taken from its first and
/// last tokens.
pub fn span_of(tokens: &[Token]) -> SourceSpan {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => SourceSpan::new(
            first.start_line,
            first.start_col,
            last.end_line,
            last.end_col,
        ),
        _ => SourceSpan::default(),
    }
}

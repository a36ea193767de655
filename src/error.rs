use thiserror::Error;

/// Fatal per-file parse errors. There is no local resynchronization: the
/// first structurally invalid construct aborts the file and the run-level
/// caller moves on to the next file.
///
/// The message shapes of the first three variants are matched literally by
/// downstream tooling and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unexpected token: {image}, line: {line}, col: {col}, file: {file}")]
    UnexpectedToken {
        image: String,
        line: u32,
        col: u32,
        file: String,
    },

    #[error("Unexpected end of token stream in file: {file}.")]
    TokenStreamEnd { file: String },

    #[error("Missing default value on line: {line}, col: {col}, file: {file}")]
    MissingValue { line: u32, col: u32, file: String },

    /// A scope-dependent keyword used where it has no meaning: `self` or
    /// `static` outside of a class scope, `parent` inside a class without a
    /// declared parent, or the nesting guard tripping on pathological input.
    #[error("{message}")]
    InvalidState { message: String },
}

impl ParseError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        ParseError::InvalidState {
            message: message.into(),
        }
    }
}

pub mod ast;
pub mod builder;
pub mod cache;
pub mod capture;
pub mod doc;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod span;
pub mod symbols;
pub mod tokens;

pub use engine::{Config, Engine, SourceModel};
pub use error::ParseError;
pub use span::SourceSpan;

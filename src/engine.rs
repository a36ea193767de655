//! Run orchestration: one engine per analysis run. Files go in one at a
//! time; `finish` seals the run, binds every outstanding reference and
//! hands out the immutable result model.

use log::{debug, info};

use crate::builder::Builder;
use crate::cache::{CacheKey, FileRecord, ParseCache};
use crate::error::ParseError;
use crate::model::{FunctionDecl, FunctionId, Namespace, TypeDecl, TypeId};
use crate::parser::Parser;
use crate::symbols::SymbolTable;
use crate::tokens::LexerTokenStream;

/// Run-wide parser settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Skip doc-comment mining: `@return`/`@var`/`@throws` types and the
    /// legacy `@package` namespace.
    pub ignore_annotations: bool,
    /// Statement/expression nesting bound; exceeding it is a fatal error
    /// for the file.
    pub max_nesting: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_annotations: false,
            max_nesting: 1024,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EngineStats {
    /// Files that went through the tokenizer and parser.
    pub files_parsed: usize,
    /// Files restored from the cache without tokenizing.
    pub cache_hits: usize,
}

pub struct Engine {
    builder: Builder,
    symbols: SymbolTable,
    config: Config,
    cache: Option<Box<dyn ParseCache>>,
    errors: Vec<(String, ParseError)>,
    stats: EngineStats,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            builder: Builder::new(),
            symbols: SymbolTable::new(),
            config,
            cache: None,
            errors: Vec::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn set_cache(&mut self, cache: Box<dyn ParseCache>) {
        self.cache = Some(cache);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse one file's source. A fatal error abandons the file — nothing
    /// it declared after the error point is registered, and no partially
    /// parsed type leaks into the model — but the run continues with the
    /// next file. The error is recorded and also returned.
    pub fn parse_source(&mut self, file: &str, source: &str) -> Result<(), ParseError> {
        let key = CacheKey::new(file, source.as_bytes());
        if let Some(cache) = &self.cache {
            if let Some(record) = cache.restore(&key) {
                debug!("cache hit for {}", file);
                record.replay(&mut self.builder);
                self.stats.cache_hits += 1;
                return Ok(());
            }
        }

        // Import aliases are file-scoped.
        self.symbols.create_scope();
        let stream = LexerTokenStream::new(source.as_bytes());
        let parser = Parser::new(
            stream,
            &mut self.builder,
            &mut self.symbols,
            &self.config,
            file,
        );
        let result = parser.parse();
        self.symbols.destroy_scope();
        self.stats.files_parsed += 1;

        match result {
            Ok(()) => {
                if let Some(cache) = &mut self.cache {
                    let record = FileRecord::capture(&self.builder, file);
                    cache.store(&key, &record);
                }
                Ok(())
            }
            Err(err) => {
                self.errors.push((file.to_string(), err.clone()));
                Err(err)
            }
        }
    }

    pub fn errors(&self) -> &[(String, ParseError)] {
        &self.errors
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Seal the run: bind every reference handed out so far, synthesizing
    /// external placeholders for names no file defined.
    pub fn finish(mut self) -> SourceModel {
        self.builder.finalize();
        info!(
            "run finished: {} types, {} parsed, {} from cache, {} errors",
            self.builder.type_count(),
            self.stats.files_parsed,
            self.stats.cache_hits,
            self.errors.len()
        );
        SourceModel {
            builder: self.builder,
            errors: self.errors,
            stats: self.stats,
        }
    }
}

/// The immutable result of a finished run. Every reference reachable from
/// here is bound.
pub struct SourceModel {
    builder: Builder,
    errors: Vec<(String, ParseError)>,
    stats: EngineStats,
}

impl SourceModel {
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.builder.namespaces()
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.builder.namespace(name)
    }

    pub fn type_decl(&self, id: TypeId) -> &TypeDecl {
        self.builder.type_decl(id)
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDecl {
        self.builder.function(id)
    }

    pub fn type_by_qualified_name(&self, qualified_name: &str) -> Option<&TypeDecl> {
        self.builder
            .lookup_type(qualified_name)
            .map(|id| self.builder.type_decl(id))
    }

    pub fn function_by_qualified_name(&self, qualified_name: &str) -> Option<&FunctionDecl> {
        self.builder
            .lookup_function(qualified_name)
            .map(|id| self.builder.function(id))
    }

    pub fn errors(&self) -> &[(String, ParseError)] {
        &self.errors
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}

//! Parse cache: per-file records keyed by a content fingerprint. A hit
//! replays the file's declarations straight into the registry without
//! tokenizing; cross-file links survive serialization as qualified names
//! and are re-interned on replay.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::ast::AstNode;
use crate::builder::Builder;
use crate::lexer::token::Token;
use crate::model::{
    Callable, Constant, DefaultValue, FunctionDecl, Modifiers, Parameter, Property, TypeDecl,
    TypeKind, TypeRef,
};
use crate::span::SourceSpan;

/// Identity of one source file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub file: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(file: &str, content: &[u8]) -> Self {
        Self {
            file: file.to_string(),
            fingerprint: fingerprint(content),
        }
    }
}

/// Content fingerprint: size plus FNV-1a hash of the bytes.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in content {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{}-{:016x}", content.len(), hash)
}

/// Storage backend contract. `restore` must return a record only when the
/// stored fingerprint matches the key's.
pub trait ParseCache {
    fn restore(&self, key: &CacheKey) -> Option<FileRecord>;
    fn store(&mut self, key: &CacheKey, record: &FileRecord);
}

// ---------------------------------------------------------------------
// Serializable mirror of one file's contribution. References collapse to
// qualified names; ids are never persisted, they are run-scoped.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file: String,
    pub types: Vec<TypeRecord>,
    pub functions: Vec<FunctionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRecord {
    pub kind: TypeKind,
    pub name: String,
    pub namespace_name: String,
    pub modifiers: Modifiers,
    pub doc_comment: Option<String>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub trait_uses: Vec<String>,
    pub methods: Vec<CallableRecord>,
    pub properties: Vec<PropertyRecord>,
    pub constants: Vec<ConstantRecord>,
    pub span: SourceSpan,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub namespace_name: String,
    pub callable: CallableRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableRecord {
    pub name: String,
    pub modifiers: Modifiers,
    pub parameters: Vec<ParameterRecord>,
    pub return_type: Option<String>,
    pub exception_types: Vec<String>,
    pub returns_reference: bool,
    pub body: Option<AstNode>,
    pub static_variables: Vec<(String, Option<DefaultValue>)>,
    pub dependencies: Vec<String>,
    pub doc_comment: Option<String>,
    pub span: SourceSpan,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub position: usize,
    pub type_ref: Option<String>,
    pub is_array: bool,
    pub by_reference: bool,
    pub default: Option<DefaultValue>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    pub modifiers: Modifiers,
    pub type_ref: Option<String>,
    pub default: Option<DefaultValue>,
    pub doc_comment: Option<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantRecord {
    pub name: String,
    pub value: Option<DefaultValue>,
    pub doc_comment: Option<String>,
    pub span: SourceSpan,
}

fn ref_name(reference: &Rc<TypeRef>) -> String {
    reference.qualified_name().to_string()
}

fn callable_record(callable: &Callable) -> CallableRecord {
    CallableRecord {
        name: callable.name.clone(),
        modifiers: callable.modifiers,
        parameters: callable
            .parameters
            .iter()
            .map(|p| ParameterRecord {
                name: p.name.clone(),
                position: p.position,
                type_ref: p.type_ref.as_ref().map(ref_name),
                is_array: p.is_array,
                by_reference: p.by_reference,
                default: p.default.clone(),
                span: p.span,
            })
            .collect(),
        return_type: callable.return_type.as_ref().map(ref_name),
        exception_types: callable.exception_types.iter().map(ref_name).collect(),
        returns_reference: callable.returns_reference,
        body: callable.body.clone(),
        static_variables: callable
            .static_variables
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        dependencies: callable.dependencies.iter().map(ref_name).collect(),
        doc_comment: callable.doc_comment.clone(),
        span: callable.span,
        tokens: callable.tokens.clone(),
    }
}

fn restore_callable(record: &CallableRecord, builder: &mut Builder) -> Callable {
    let mut callable = Callable::new(record.name.clone());
    callable.modifiers = record.modifiers;
    callable.parameters = record
        .parameters
        .iter()
        .map(|p| Parameter {
            name: p.name.clone(),
            position: p.position,
            type_ref: p.type_ref.as_deref().map(|n| builder.build_type_ref(n)),
            is_array: p.is_array,
            by_reference: p.by_reference,
            default: p.default.clone(),
            span: p.span,
        })
        .collect();
    callable.return_type = record
        .return_type
        .as_deref()
        .map(|n| builder.build_type_ref(n));
    callable.exception_types = record
        .exception_types
        .iter()
        .map(|n| builder.build_type_ref(n))
        .collect();
    callable.returns_reference = record.returns_reference;
    callable.body = record.body.clone();
    callable.static_variables = record
        .static_variables
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    callable.dependencies = record
        .dependencies
        .iter()
        .map(|n| builder.build_type_ref(n))
        .collect();
    callable.doc_comment = record.doc_comment.clone();
    callable.span = record.span;
    callable.tokens = record.tokens.clone();
    callable
}

impl FileRecord {
    /// Snapshot everything the given file contributed to the registry.
    pub fn capture(builder: &Builder, file: &str) -> FileRecord {
        let types = builder
            .types_in_file(file)
            .map(|decl| TypeRecord {
                kind: decl.kind,
                name: decl.name.clone(),
                namespace_name: decl.namespace_name.clone(),
                modifiers: decl.modifiers,
                doc_comment: decl.doc_comment.clone(),
                parent: decl.parent.as_ref().map(ref_name),
                interfaces: decl.interfaces.iter().map(ref_name).collect(),
                trait_uses: decl.trait_uses.iter().map(ref_name).collect(),
                methods: decl.methods.iter().map(callable_record).collect(),
                properties: decl
                    .properties
                    .iter()
                    .map(|p| PropertyRecord {
                        name: p.name.clone(),
                        modifiers: p.modifiers,
                        type_ref: p.type_ref.as_ref().map(ref_name),
                        default: p.default.clone(),
                        doc_comment: p.doc_comment.clone(),
                        span: p.span,
                    })
                    .collect(),
                constants: decl
                    .constants
                    .iter()
                    .map(|c| ConstantRecord {
                        name: c.name.clone(),
                        value: c.value.clone(),
                        doc_comment: c.doc_comment.clone(),
                        span: c.span,
                    })
                    .collect(),
                span: decl.span,
                tokens: decl.tokens.clone(),
            })
            .collect();

        let functions = builder
            .functions_in_file(file)
            .map(|decl| FunctionRecord {
                namespace_name: decl.namespace_name.clone(),
                callable: callable_record(&decl.callable),
            })
            .collect();

        FileRecord {
            file: file.to_string(),
            types,
            functions,
        }
    }

    /// Re-register the file's declarations. References come back through
    /// the registry so identity with the rest of the run is preserved.
    pub fn replay(&self, builder: &mut Builder) {
        debug!("replaying cached declarations of {}", self.file);
        for record in &self.types {
            let mut decl = TypeDecl::new(
                record.kind,
                record.namespace_name.clone(),
                record.name.clone(),
            );
            decl.modifiers = record.modifiers;
            decl.doc_comment = record.doc_comment.clone();
            decl.parent = record.parent.as_deref().map(|n| builder.build_type_ref(n));
            decl.interfaces = record
                .interfaces
                .iter()
                .map(|n| builder.build_type_ref(n))
                .collect();
            decl.trait_uses = record
                .trait_uses
                .iter()
                .map(|n| builder.build_type_ref(n))
                .collect();
            decl.methods = record
                .methods
                .iter()
                .map(|m| restore_callable(m, builder))
                .collect();
            decl.properties = record
                .properties
                .iter()
                .map(|p| Property {
                    name: p.name.clone(),
                    modifiers: p.modifiers,
                    type_ref: p.type_ref.as_deref().map(|n| builder.build_type_ref(n)),
                    default: p.default.clone(),
                    doc_comment: p.doc_comment.clone(),
                    span: p.span,
                })
                .collect();
            decl.constants = record
                .constants
                .iter()
                .map(|c| Constant {
                    name: c.name.clone(),
                    value: c.value.clone(),
                    doc_comment: c.doc_comment.clone(),
                    span: c.span,
                })
                .collect();
            decl.span = record.span;
            decl.tokens = record.tokens.clone();
            decl.is_user_defined = true;
            decl.source_file = Some(self.file.clone());
            builder.commit_type(decl);
        }

        for record in &self.functions {
            let decl = FunctionDecl {
                namespace_name: record.namespace_name.clone(),
                source_file: Some(self.file.clone()),
                callable: restore_callable(&record.callable, builder),
            };
            builder.commit_function(decl);
        }
    }
}

// ---------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------

/// In-process cache, useful for repeated parses within one long-lived
/// consumer.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, (String, FileRecord)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParseCache for MemoryCache {
    fn restore(&self, key: &CacheKey) -> Option<FileRecord> {
        let (stored_fingerprint, record) = self.entries.get(&key.file)?;
        if *stored_fingerprint == key.fingerprint {
            Some(record.clone())
        } else {
            None
        }
    }

    fn store(&mut self, key: &CacheKey, record: &FileRecord) {
        self.entries
            .insert(key.file.clone(), (key.fingerprint.clone(), record.clone()));
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FileCacheEntry {
    fingerprint: String,
    record: FileRecord,
}

/// Directory-backed cache, one JSON entry per source file. IO and decode
/// failures degrade to cache misses.
#[derive(Debug)]
pub struct FileCache {
    directory: PathBuf,
}

impl FileCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn entry_path(&self, file: &str) -> PathBuf {
        self.directory
            .join(format!("{}.json", fingerprint(file.as_bytes())))
    }
}

impl ParseCache for FileCache {
    fn restore(&self, key: &CacheKey) -> Option<FileRecord> {
        let path = self.entry_path(&key.file);
        let content = fs::read(&path).ok()?;
        let entry: FileCacheEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("discarding unreadable cache entry {}: {}", path.display(), err);
                return None;
            }
        };
        if entry.fingerprint == key.fingerprint {
            Some(entry.record)
        } else {
            None
        }
    }

    fn store(&mut self, key: &CacheKey, record: &FileRecord) {
        if let Err(err) = fs::create_dir_all(&self.directory) {
            warn!("cannot create cache directory {}: {}", self.directory.display(), err);
            return;
        }
        let entry = FileCacheEntry {
            fingerprint: key.fingerprint.clone(),
            record: record.clone(),
        };
        let path = self.entry_path(&key.file);
        let encoded = match serde_json::to_vec(&entry) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("cannot encode cache entry for {}: {}", key.file, err);
                return;
            }
        };
        if let Err(err) = fs::write(&path, encoded) {
            warn!("cannot write cache entry {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_content() {
        let a = fingerprint(b"<?php class A {}");
        let b = fingerprint(b"<?php class B {}");
        assert_ne!(a, b);
        assert_eq!(a, fingerprint(b"<?php class A {}"));
    }

    #[test]
    fn memory_cache_misses_on_changed_fingerprint() {
        let mut cache = MemoryCache::new();
        let key = CacheKey::new("a.php", b"v1");
        let record = FileRecord {
            file: "a.php".to_string(),
            types: Vec::new(),
            functions: Vec::new(),
        };
        cache.store(&key, &record);

        assert!(cache.restore(&key).is_some());
        let changed = CacheKey::new("a.php", b"v2");
        assert!(cache.restore(&changed).is_none());
    }

    #[test]
    fn replay_restores_links_through_the_registry() {
        let mut builder = Builder::new();
        let record = FileRecord {
            file: "a.php".to_string(),
            types: vec![TypeRecord {
                kind: TypeKind::Class,
                name: "A".to_string(),
                namespace_name: "app".to_string(),
                modifiers: Modifiers::empty(),
                doc_comment: None,
                parent: Some("app\\Base".to_string()),
                interfaces: Vec::new(),
                trait_uses: Vec::new(),
                methods: Vec::new(),
                properties: Vec::new(),
                constants: Vec::new(),
                span: SourceSpan::default(),
                tokens: Vec::new(),
            }],
            functions: Vec::new(),
        };
        record.replay(&mut builder);

        let base = builder.commit_type(TypeDecl::new(TypeKind::Class, "app", "Base"));
        builder.finalize();

        let id = builder.lookup_type("app\\A").unwrap();
        let decl = builder.type_decl(id);
        assert_eq!(decl.parent.as_ref().unwrap().target(), Some(base));
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use php_declgraph::cache::{CacheKey, FileCache, FileRecord, MemoryCache, ParseCache};
use php_declgraph::Engine;

const SOURCE: &str = "<?php
namespace app;

use lib\\Registry;

/**
 * Repository of users.
 */
class UserRepo extends Base
{
    const LIMIT = 100;

    private $registry;

    public function find($id, array $options = array())
    {
        $registry = new Registry();
        return $registry->get($id);
    }
}

function bootstrap()
{
    return new UserRepo();
}
";

fn assert_full_model(model: &php_declgraph::SourceModel) {
    let decl = model.type_by_qualified_name("app\\UserRepo").unwrap();
    assert!(decl.is_user_defined);
    assert_eq!(decl.parent.as_ref().unwrap().qualified_name(), "app\\Base");
    assert_eq!(
        decl.constant("LIMIT").unwrap().value,
        Some(php_declgraph::model::DefaultValue::Int(100))
    );
    assert!(decl.property("$registry").is_some());

    let method = decl.method("find").unwrap();
    assert_eq!(method.parameters.len(), 2);
    assert!(method.parameters[1].is_array);
    assert_eq!(
        method.dependencies[0].qualified_name(),
        "lib\\Registry"
    );
    assert!(method.body.is_some());

    let function = model.function_by_qualified_name("app\\bootstrap").unwrap();
    assert_eq!(
        function.callable.dependencies[0].qualified_name(),
        "app\\UserRepo"
    );
}

/// Engines own their cache box; runs share one store through `Rc`.
#[derive(Clone, Default)]
struct SharedCache(Rc<RefCell<MemoryCache>>);

impl ParseCache for SharedCache {
    fn restore(&self, key: &CacheKey) -> Option<FileRecord> {
        self.0.borrow().restore(key)
    }

    fn store(&mut self, key: &CacheKey, record: &FileRecord) {
        self.0.borrow_mut().store(key, record);
    }
}

#[test]
fn cache_hit_skips_parsing_and_yields_the_same_model() {
    let shared = SharedCache::default();

    // First run populates the cache.
    {
        let mut engine = Engine::new();
        engine.set_cache(Box::new(shared.clone()));
        engine.parse_source("repo.php", SOURCE).unwrap();
        let stats = engine.stats();
        assert_eq!(stats.files_parsed, 1);
        assert_eq!(stats.cache_hits, 0);
        assert_full_model(&engine.finish());
    }
    assert_eq!(shared.0.borrow().len(), 1);

    // Second run over identical content must restore without tokenizing.
    let mut engine = Engine::new();
    engine.set_cache(Box::new(shared));
    engine.parse_source("repo.php", SOURCE).unwrap();
    let stats = engine.stats();
    assert_eq!(stats.files_parsed, 0, "cache hit must not parse");
    assert_eq!(stats.cache_hits, 1);
    assert_full_model(&engine.finish());
}

#[test]
fn changed_content_misses_and_reparses() {
    let mut engine = Engine::new();
    engine.set_cache(Box::new(MemoryCache::new()));
    engine.parse_source("repo.php", SOURCE).unwrap();
    assert_eq!(engine.stats().files_parsed, 1);

    let changed = SOURCE.replace("LIMIT = 100", "LIMIT = 200");
    engine.parse_source("repo.php", &changed).unwrap();
    let stats = engine.stats();
    assert_eq!(stats.files_parsed, 2);
    assert_eq!(stats.cache_hits, 0);

    // Re-declaration merged in place: the latest definition wins.
    let model = engine.finish();
    let decl = model.type_by_qualified_name("app\\UserRepo").unwrap();
    assert_eq!(
        decl.constant("LIMIT").unwrap().value,
        Some(php_declgraph::model::DefaultValue::Int(200))
    );
}

#[test]
fn file_cache_round_trips_between_engines() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut engine = Engine::new();
        engine.set_cache(Box::new(FileCache::new(dir.path())));
        engine.parse_source("repo.php", SOURCE).unwrap();
        assert_eq!(engine.stats().files_parsed, 1);
        assert_full_model(&engine.finish());
    }

    // A brand new engine with the same cache directory restores the file.
    let mut engine = Engine::new();
    engine.set_cache(Box::new(FileCache::new(dir.path())));
    engine.parse_source("repo.php", SOURCE).unwrap();
    let stats = engine.stats();
    assert_eq!(stats.files_parsed, 0);
    assert_eq!(stats.cache_hits, 1);
    assert_full_model(&engine.finish());
}

#[test]
fn file_cache_ignores_corrupt_entries() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut engine = Engine::new();
        engine.set_cache(Box::new(FileCache::new(dir.path())));
        engine.parse_source("repo.php", SOURCE).unwrap();
    }

    // Scribble over every entry.
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        std::fs::write(entry.unwrap().path(), b"not json").unwrap();
    }

    let mut engine = Engine::new();
    engine.set_cache(Box::new(FileCache::new(dir.path())));
    engine.parse_source("repo.php", SOURCE).unwrap();
    let stats = engine.stats();
    assert_eq!(stats.files_parsed, 1, "corrupt entry must degrade to a miss");
    assert_eq!(stats.cache_hits, 0);
}

#[test]
fn replayed_declarations_link_against_later_parses() {
    let dir = tempfile::tempdir().unwrap();
    let base = "<?php namespace app; class Base {}";

    {
        let mut engine = Engine::new();
        engine.set_cache(Box::new(FileCache::new(dir.path())));
        engine.parse_source("repo.php", SOURCE).unwrap();
        engine.parse_source("base.php", base).unwrap();
    }

    let mut engine = Engine::new();
    engine.set_cache(Box::new(FileCache::new(dir.path())));
    engine.parse_source("repo.php", SOURCE).unwrap();
    engine.parse_source("base.php", base).unwrap();
    assert_eq!(engine.stats().cache_hits, 2);

    let model = engine.finish();
    let repo = model.type_by_qualified_name("app\\UserRepo").unwrap();
    let parent_id = repo.parent.as_ref().unwrap().target().unwrap();
    let parent = model.type_decl(parent_id);
    assert_eq!(parent.name, "Base");
    assert!(parent.is_user_defined);
}

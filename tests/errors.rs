use php_declgraph::{Config, Engine, ParseError};

#[test]
fn unexpected_token_reports_image_line_and_column() {
    let mut engine = Engine::new();
    let err = engine
        .parse_source("broken.php", "<?php class {")
        .unwrap_err();

    assert_eq!(
        err,
        ParseError::UnexpectedToken {
            image: "{".to_string(),
            line: 1,
            col: 13,
            file: "broken.php".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "Unexpected token: {, line: 1, col: 13, file: broken.php"
    );
}

#[test]
fn open_block_at_end_of_stream_is_a_distinct_error() {
    let mut engine = Engine::new();
    let err = engine
        .parse_source("truncated.php", "<?php class A {")
        .unwrap_err();

    assert_eq!(
        err,
        ParseError::TokenStreamEnd {
            file: "truncated.php".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "Unexpected end of token stream in file: truncated.php."
    );
}

#[test]
fn default_value_introducer_without_value() {
    let mut engine = Engine::new();
    let err = engine
        .parse_source("missing.php", "<?php function f($a = ) {}")
        .unwrap_err();

    assert_eq!(
        err,
        ParseError::MissingValue {
            line: 1,
            col: 23,
            file: "missing.php".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "Missing default value on line: 1, col: 23, file: missing.php"
    );
}

#[test]
fn self_outside_class_scope_is_invalid_state() {
    let mut engine = Engine::new();
    let err = engine
        .parse_source("free.php", "<?php function f(self $x) {}")
        .unwrap_err();

    match err {
        ParseError::InvalidState { message } => {
            assert!(message.contains("'self'"), "got: {}", message);
            assert!(message.contains("free.php"), "got: {}", message);
        }
        other => panic!("expected invalid state, got {:?}", other),
    }
}

#[test]
fn parent_without_declared_parent_is_invalid_state() {
    let mut engine = Engine::new();
    let err = engine
        .parse_source(
            "orphan.php",
            "<?php
class Orphan
{
    public function make()
    {
        return new parent();
    }
}
",
        )
        .unwrap_err();

    match err {
        ParseError::InvalidState { message } => {
            assert!(message.contains("'parent'"), "got: {}", message);
            assert!(message.contains("Orphan"), "got: {}", message);
        }
        other => panic!("expected invalid state, got {:?}", other),
    }
}

#[test]
fn nesting_guard_trips_on_pathological_input() {
    let mut engine = Engine::with_config(Config {
        max_nesting: 16,
        ..Default::default()
    });
    let source = format!(
        "<?php function deep() {{ $a = {}1{}; }}",
        "(".repeat(64),
        ")".repeat(64)
    );
    let err = engine.parse_source("deep.php", &source).unwrap_err();

    match err {
        ParseError::InvalidState { message } => {
            assert!(
                message.contains("Maximum nesting level of 16 reached"),
                "got: {}",
                message
            );
            assert!(message.contains("deep.php"), "got: {}", message);
        }
        other => panic!("expected invalid state, got {:?}", other),
    }
}

#[test]
fn failed_file_registers_nothing_but_run_continues() {
    let mut engine = Engine::new();
    engine
        .parse_source(
            "bad.php",
            "<?php
class Broken
{
    public function ok() {}
    public function bad( {}
}
",
        )
        .unwrap_err();
    engine
        .parse_source("good.php", "<?php class Fine {}")
        .expect("good file should parse");

    let model = engine.finish();
    // The failed file contributes nothing, not even the half-built type.
    assert!(model.type_by_qualified_name("Broken").is_none());
    assert!(model.type_by_qualified_name("Fine").is_some());

    let errors = model.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "bad.php");
}

#[test]
fn lexically_unknown_bytes_surface_as_unexpected_tokens() {
    let mut engine = Engine::new();
    let err = engine.parse_source("odd.php", "<?php class A ` {}").unwrap_err();
    match err {
        ParseError::UnexpectedToken { image, .. } => {
            assert_eq!(image, "`");
        }
        other => panic!("expected unexpected token, got {:?}", other),
    }
}

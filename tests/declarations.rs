use php_declgraph::model::{DefaultValue, Modifiers, TypeKind};
use php_declgraph::{Engine, SourceModel};

fn build(source: &str) -> SourceModel {
    let mut engine = Engine::new();
    engine
        .parse_source("test.php", source)
        .expect("fixture should parse");
    engine.finish()
}

#[test]
fn class_with_parent_and_interfaces() {
    let model = build(
        "<?php
namespace app;

abstract class Repository extends BaseRepository implements Countable, Stringable
{
}
",
    );

    let decl = model.type_by_qualified_name("app\\Repository").unwrap();
    assert_eq!(decl.kind, TypeKind::Class);
    assert!(decl.modifiers.is_abstract());
    assert!(decl.is_user_defined);
    assert_eq!(
        decl.parent.as_ref().unwrap().qualified_name(),
        "app\\BaseRepository"
    );
    let interfaces: Vec<_> = decl
        .interfaces
        .iter()
        .map(|i| i.qualified_name().to_string())
        .collect();
    assert_eq!(interfaces, vec!["app\\Countable", "app\\Stringable"]);
}

#[test]
fn interface_methods_are_public_abstract() {
    let model = build(
        "<?php
interface Walker
{
    const STEP = 1;

    function walk($distance);
}
",
    );

    let decl = model.type_by_qualified_name("Walker").unwrap();
    assert_eq!(decl.kind, TypeKind::Interface);
    assert!(decl.modifiers.is_abstract());

    let method = decl.method("walk").unwrap();
    assert!(method.modifiers.is_abstract());
    assert!(method.modifiers.is_public());
    assert!(method.body.is_none());

    let constant = decl.constant("STEP").unwrap();
    assert_eq!(constant.value, Some(DefaultValue::Int(1)));
}

#[test]
fn trait_declaration_and_trait_use() {
    let model = build(
        "<?php
namespace app;

trait Loggable
{
    public function log($message) {}
}

class Service
{
    use Loggable, \\vendor\\Greedy;
}
",
    );

    let logger = model.type_by_qualified_name("app\\Loggable").unwrap();
    assert_eq!(logger.kind, TypeKind::Trait);
    assert!(logger.method("log").is_some());

    let service = model.type_by_qualified_name("app\\Service").unwrap();
    let uses: Vec<_> = service
        .trait_uses
        .iter()
        .map(|t| t.qualified_name().to_string())
        .collect();
    assert_eq!(uses, vec!["app\\Loggable", "vendor\\Greedy"]);
}

#[test]
fn member_modifiers_and_defaults() {
    let model = build(
        "<?php
class Config
{
    const MODE = 'fast', LIMIT = 10;

    public static $shared = null;
    private $values = array(1, 2, 3);
    protected $name = 'config', $other;
    var $legacy;
}
",
    );

    let decl = model.type_by_qualified_name("Config").unwrap();

    assert_eq!(
        decl.constant("MODE").unwrap().value,
        Some(DefaultValue::Str("fast".to_string()))
    );
    assert_eq!(
        decl.constant("LIMIT").unwrap().value,
        Some(DefaultValue::Int(10))
    );

    let shared = decl.property("$shared").unwrap();
    assert!(shared.modifiers.is_static());
    assert!(shared.modifiers.is_public());
    assert_eq!(shared.default, Some(DefaultValue::Null));

    let values = decl.property("$values").unwrap();
    assert!(values.modifiers.is_private());
    assert_eq!(values.default, Some(DefaultValue::Array));

    let name = decl.property("$name").unwrap();
    assert!(name.modifiers.is_protected());
    assert_eq!(name.default, Some(DefaultValue::Str("config".to_string())));
    let other = decl.property("$other").unwrap();
    assert!(other.modifiers.is_protected());
    assert!(other.default.is_none());

    // `var` reads as public.
    assert!(decl.property("$legacy").unwrap().modifiers.is_public());
}

#[test]
fn parameters_keep_position_reference_and_defaults() {
    let model = build(
        "<?php
function configure(MyType $first, array &$items, $limit = 42, $mode = 'slow') {}
",
    );

    let function = model.function_by_qualified_name("configure").unwrap();
    let params = &function.callable.parameters;
    assert_eq!(params.len(), 4);
    for (index, param) in params.iter().enumerate() {
        assert_eq!(param.position, index);
    }

    let first = function.callable.parameter("$first").unwrap();
    assert_eq!(first.type_ref.as_ref().unwrap().qualified_name(), "MyType");
    assert!(!first.is_passed_by_reference());

    let items = function.callable.parameter("$items").unwrap();
    assert!(items.is_array);
    assert!(items.is_passed_by_reference());
    assert!(!items.is_default_value_available());

    let limit = function.callable.parameter("$limit").unwrap();
    assert_eq!(limit.default_value(), Some(&DefaultValue::Int(42)));
    let mode = function.callable.parameter("$mode").unwrap();
    assert_eq!(
        mode.default_value(),
        Some(&DefaultValue::Str("slow".to_string()))
    );
}

#[test]
fn variadic_parameters_are_accepted() {
    let model = build(
        "<?php
function bundle($first, MyType ...$rest) {}
function forward(&...$args) {}
",
    );

    let bundle = model.function_by_qualified_name("bundle").unwrap();
    assert_eq!(bundle.callable.parameters.len(), 2);
    let rest = bundle.callable.parameter("$rest").unwrap();
    assert_eq!(rest.position, 1);
    assert_eq!(rest.type_ref.as_ref().unwrap().qualified_name(), "MyType");

    let args = model
        .function_by_qualified_name("forward")
        .unwrap()
        .callable
        .parameter("$args")
        .unwrap();
    assert!(args.is_passed_by_reference());
}

#[test]
fn scalar_hints_never_become_type_references() {
    let model = build(
        "<?php
function compute(int $a, string $b, Helper $c): void {}
",
    );

    let function = model.function_by_qualified_name("compute").unwrap();
    assert!(function.callable.parameter("$a").unwrap().type_ref.is_none());
    assert!(function.callable.parameter("$b").unwrap().type_ref.is_none());
    assert_eq!(
        function
            .callable
            .parameter("$c")
            .unwrap()
            .type_ref
            .as_ref()
            .unwrap()
            .qualified_name(),
        "Helper"
    );
    assert!(function.callable.return_type.is_none());
}

#[test]
fn self_parent_hints_resolve_against_the_class_context() {
    let model = build(
        "<?php
namespace app;

class Node extends BaseNode
{
    public function compare(self $other, parent $ancestor): self
    {
        return $this;
    }
}
",
    );

    let decl = model.type_by_qualified_name("app\\Node").unwrap();
    let method = decl.method("compare").unwrap();
    assert_eq!(
        method.parameters[0].type_ref.as_ref().unwrap().qualified_name(),
        "app\\Node"
    );
    assert_eq!(
        method.parameters[1].type_ref.as_ref().unwrap().qualified_name(),
        "app\\BaseNode"
    );
    assert_eq!(
        method.return_type.as_ref().unwrap().qualified_name(),
        "app\\Node"
    );
}

#[test]
fn class_constant_defaults_resolve_the_class_part() {
    let model = build(
        "<?php
namespace app;

use lib\\Limits;

class Worker
{
    const OWN = 5;

    public function run($max = Limits::HARD, $own = self::OWN, $plain = PHP_EOL) {}
}
",
    );

    let decl = model.type_by_qualified_name("app\\Worker").unwrap();
    let method = decl.method("run").unwrap();
    assert_eq!(
        method.parameters[0].default,
        Some(DefaultValue::ClassConstant("lib\\Limits::HARD".to_string()))
    );
    assert_eq!(
        method.parameters[1].default,
        Some(DefaultValue::ClassConstant("app\\Worker::OWN".to_string()))
    );
    assert_eq!(
        method.parameters[2].default,
        Some(DefaultValue::Constant("PHP_EOL".to_string()))
    );
}

#[test]
fn declarations_record_spans_and_tokens() {
    let source = "<?php
class Span
{
    // boundary marker
    public function inner() {}
}
";
    let model = build(source);
    let decl = model.type_by_qualified_name("Span").unwrap();
    assert_eq!(decl.span.start_line, 2);
    assert_eq!(decl.span.end_line, 6);

    // The capture stream keeps comments, so the declaration's token list
    // reproduces them verbatim.
    assert!(decl
        .tokens
        .iter()
        .any(|t| t.image.contains("boundary marker")));

    let method = decl.method("inner").unwrap();
    assert_eq!(method.span.start_line, 5);
}

#[test]
fn modifier_accumulation_resets_between_members() {
    let model = build(
        "<?php
class Mixed
{
    public static function stat() {}
    private $only_private;
}
",
    );

    let decl = model.type_by_qualified_name("Mixed").unwrap();
    assert!(decl.method("stat").unwrap().modifiers.is_static());
    let prop = decl.property("$only_private").unwrap();
    assert!(prop.modifiers.is_private());
    assert!(!prop.modifiers.is_static());
    assert!(!prop.modifiers.contains(Modifiers::PUBLIC));
}

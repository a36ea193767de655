use php_declgraph::ast::NodeKind;
use php_declgraph::model::DefaultValue;
use php_declgraph::{Engine, SourceModel};

fn build(source: &str) -> SourceModel {
    let mut engine = Engine::new();
    engine
        .parse_source("test.php", source)
        .expect("fixture should parse");
    engine.finish()
}

fn dependency_names(model: &SourceModel, class: &str, method: &str) -> Vec<String> {
    model
        .type_by_qualified_name(class)
        .unwrap()
        .method(method)
        .unwrap()
        .dependencies
        .iter()
        .map(|d| d.qualified_name().to_string())
        .collect()
}

#[test]
fn allocations_instanceof_and_catches_are_dependencies() {
    let model = build(
        "<?php
namespace app;

use lib\\Registry;

class Runner
{
    public function run($input)
    {
        $registry = new Registry();
        if ($input instanceof Validator) {
            try {
                $input->check();
            } catch (CheckError $e) {
                throw $e;
            }
        }
        return Sink::drain($input);
    }
}
",
    );

    let deps = dependency_names(&model, "app\\Runner", "run");
    assert_eq!(
        deps,
        vec![
            "lib\\Registry".to_string(),
            "app\\Validator".to_string(),
            "app\\CheckError".to_string(),
            "app\\Sink".to_string(),
        ]
    );
}

#[test]
fn self_parent_static_references_resolve_in_bodies() {
    let model = build(
        "<?php
namespace app;

class Child extends Base
{
    public function spawn()
    {
        $a = new self();
        $b = new parent();
        $c = new static();
        return self::FLAG;
    }
}
",
    );

    let deps = dependency_names(&model, "app\\Child", "spawn");
    assert_eq!(
        deps,
        vec![
            "app\\Child".to_string(),
            "app\\Base".to_string(),
            "app\\Child".to_string(),
            "app\\Child".to_string(),
        ]
    );
}

#[test]
fn static_statement_disambiguation() {
    let model = build(
        "<?php
namespace app;

class Counter
{
    public function bump()
    {
        static $count = 0, $bare;
        static::reset();
        $count++;
    }
}
",
    );

    let decl = model.type_by_qualified_name("app\\Counter").unwrap();
    let method = decl.method("bump").unwrap();

    assert_eq!(
        method.static_variables.get("$count"),
        Some(&Some(DefaultValue::Int(0)))
    );
    assert_eq!(method.static_variables.get("$bare"), Some(&None));

    // `static::` registered the class itself as a dependency.
    assert_eq!(
        method.dependencies[0].qualified_name(),
        "app\\Counter"
    );
}

#[test]
fn closures_and_variable_variables_parse() {
    let model = build(
        "<?php
function tricky($name)
{
    $fn = function ($x) use (&$name): int {
        return $x + 1;
    };
    $indirect = $$name;
    $$name = static function () {
        return new \\lib\\Lazy();
    };
    return $fn($indirect);
}
",
    );

    let function = model.function_by_qualified_name("tricky").unwrap();
    let body = function.callable.body.as_ref().unwrap();
    assert_eq!(body.find_of_kind(NodeKind::Closure).len(), 2);
    assert!(!body.find_of_kind(NodeKind::VariableVariable).is_empty());

    // Allocations inside closures still count against the enclosing
    // callable.
    assert_eq!(
        function.callable.dependencies[0].qualified_name(),
        "lib\\Lazy"
    );
}

#[test]
fn member_chains_build_left_associative_prefixes() {
    let model = build(
        "<?php
class Chain
{
    public function go($conn)
    {
        return $conn->database('main')->table('users')->count;
    }
}
",
    );

    let decl = model.type_by_qualified_name("Chain").unwrap();
    let body = decl.method("go").unwrap().body.as_ref().unwrap();

    let prefixes = body.find_of_kind(NodeKind::MemberPrefix);
    assert_eq!(prefixes.len(), 3);
    // The outermost prefix ends in the property access.
    let outer = prefixes[0];
    assert_eq!(outer.children[1].kind, NodeKind::PropertyPostfix);
    assert_eq!(outer.children[1].image, "count");
    assert_eq!(
        body.find_of_kind(NodeKind::MethodPostfix)
            .iter()
            .map(|m| m.image.as_str())
            .collect::<Vec<_>>(),
        vec!["database", "table"]
    );
}

#[test]
fn statement_grammar_round_trips_through_capture() {
    let source = "<?php
class Everything
{
    public function all($items, $flag)
    {
        foreach ($items as $key => $value) {
            switch ($key) {
                case 1:
                    continue 2;
                default:
                    break;
            }
        }
        for ($i = 0; $i < 10; $i++) {
            while ($flag) {
                do {
                    $flag = !$flag;
                } while ($flag);
            }
        }
        global $app;
        unset($items[0]);
        echo 'done', \"\\n\";
        return $flag ? 1 : 0;
    }
}
";
    let model = build(source);
    let decl = model.type_by_qualified_name("Everything").unwrap();
    let method = decl.method("all").unwrap();
    let body = method.body.as_ref().unwrap();

    for kind in [
        NodeKind::Foreach,
        NodeKind::Switch,
        NodeKind::For,
        NodeKind::While,
        NodeKind::DoWhile,
        NodeKind::Global,
        NodeKind::Unset,
        NodeKind::Echo,
        NodeKind::Ternary,
    ] {
        assert!(
            !body.find_of_kind(kind).is_empty(),
            "missing node kind {:?}",
            kind
        );
    }

    // The callable's token list reproduces the member's source verbatim:
    // concatenating the images and dropping whitespace must equal the exact
    // source slice from the `function` keyword to the closing brace.
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let begin = source.find("function all").unwrap();
    let class_close = source.rfind('}').unwrap();
    let method_close = source[..class_close].rfind('}').unwrap();
    let captured: String = method.tokens.iter().map(|t| t.image.as_str()).collect();
    assert_eq!(strip(&captured), strip(&source[begin..=method_close]));
    assert_eq!(method.tokens.first().unwrap().image, "function");
    assert_eq!(method.tokens.last().unwrap().image, "}");
}

#[test]
fn echo_inline_html_and_close_tags_inside_bodies() {
    let model = build(
        "<?php
function render($title)
{
    echo $title;
    ?><div class=\"box\"><?php
    echo 'tail';
}
",
    );

    let function = model.function_by_qualified_name("render").unwrap();
    let body = function.callable.body.as_ref().unwrap();
    assert_eq!(body.find_of_kind(NodeKind::Echo).len(), 2);
}

#[test]
fn assignment_is_decided_after_the_left_hand_side() {
    let model = build(
        "<?php
function assign($obj, $arr)
{
    $obj->items[2] = 5;
    $arr[] = $obj;
    $obj->count += 1;
}
",
    );

    let function = model.function_by_qualified_name("assign").unwrap();
    let body = function.callable.body.as_ref().unwrap();
    let assignments = body.find_of_kind(NodeKind::Assignment);
    assert_eq!(assignments.len(), 3);
    assert_eq!(assignments[0].children.len(), 2);
    assert_eq!(assignments[2].image, "+=");
}

#[test]
fn heredoc_bodies_collapse_into_one_literal() {
    let model = build(
        "<?php
function banner($name)
{
    $msg = <<<EOT
Hello there,
glad you made it.
EOT;
    return $msg;
}
",
    );

    let function = model.function_by_qualified_name("banner").unwrap();
    let body = function.callable.body.as_ref().unwrap();
    let assignments = body.find_of_kind(NodeKind::Assignment);
    assert_eq!(assignments.len(), 1);
    let literal = &assignments[0].children[1];
    assert_eq!(literal.kind, NodeKind::Literal);
    assert!(literal.image.starts_with("<<<EOT"));
    assert!(literal.image.ends_with("EOT"));
    assert_eq!(body.find_of_kind(NodeKind::Return).len(), 1);
}

#[test]
fn casts_and_unary_operators_do_not_break_expressions() {
    let model = build(
        "<?php
function casts($raw)
{
    $n = (int) $raw;
    $f = (float) -$raw;
    $a = (array) $raw;
    $ok = !empty($raw) && $n > 0;
    return $ok;
}
",
    );

    let function = model.function_by_qualified_name("casts").unwrap();
    assert_eq!(
        function
            .callable
            .body
            .as_ref()
            .unwrap()
            .find_of_kind(NodeKind::Assignment)
            .len(),
        4
    );
}

//! End-to-end scenarios: each one drives a source string through the
//! whole pipeline the way the CLI would, rather than poking at individual
//! phases.

use vesper::eval::{Environment, Evaluator, Value};
use vesper::pipeline;

fn run(source: &str) -> Result<Value, String> {
    let mut evaluator = Evaluator::new();
    let env = Environment::new();
    pipeline::run("test", source, &mut evaluator, &env).map_err(|d| d.render_all())
}

#[test]
fn factorial_of_five_is_120() {
    let result = run("fact :: fn(n: int) -> int { if n <= 1 { 1 } else { n * fact(n-1) } }\nfact(5)").unwrap();
    assert!(matches!(result, Value::Int(120)), "{result}");
}

#[test]
fn if_expression_evaluates_to_its_chosen_arm() {
    let result = run(r#"if true { "Hello" } else { "See ya" }"#).unwrap();
    assert!(matches!(result, Value::Str(ref s) if s == "Hello"));
}

#[test]
fn array_indexing_composes_to_six() {
    let result = run("xs :: [1, 2, 3]\nxs[1] * xs[2]").unwrap();
    assert!(matches!(result, Value::Int(6)), "{result}");
}

#[test]
fn struct_method_reads_self_field() {
    let result = run(
        r#"Person :: struct { name: string, greet: fn(self) -> string { self.name } }
           p :: Person[name: "Ada"]
           p.greet()"#,
    )
    .unwrap();
    assert!(matches!(result, Value::Str(ref s) if s == "Ada"));
}

#[test]
fn mutating_an_immutable_binding_is_rejected_before_it_runs() {
    let error = run("x :: 1\nx = 2").unwrap_err();
    assert!(error.contains("can't be mutated"), "{error}");
}

#[test]
fn importing_a_module_exposes_its_bindings() {
    let result = run(r#"import "tests/fixtures/greeting.vsp" as m"#).unwrap();
    assert!(matches!(result, Value::UserModule(_)), "{result}");
}

#[test]
fn circular_imports_are_reported_as_a_runtime_error() {
    let source = std::fs::read_to_string("tests/fixtures/cycle_a.vsp").unwrap();
    let mut evaluator = Evaluator::new();
    let env = Environment::new();
    let result = pipeline::run("tests/fixtures/cycle_a.vsp", &source, &mut evaluator, &env).unwrap();
    match result {
        Value::Error(error) => assert!(error.message.contains("circular dependency"), "{}", error.message),
        other => panic!("expected a circular-dependency error, got {other}"),
    }
}

#[test]
fn short_circuit_or_never_evaluates_the_right_hand_side() {
    let result = run("true || (1 / 0 == 0)").unwrap();
    assert!(matches!(result, Value::Bool(true)), "{result}");
}

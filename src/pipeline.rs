//! Wires the phases together: parse, analyze, evaluate.
//! One function, reused both by the CLI entry point and by the evaluator's
//! own module-import machinery (`eval::evaluator::Evaluator::eval_import`),
//! so a top-level file and an imported module are driven identically.

use crate::diagnostics::DiagnosticCollector;
use crate::eval::{Environment, Evaluator, Value};
use crate::parsing::Parser;
use crate::semantic::Analyzer;

/// Parses and analyzes `source`, then evaluates it with `evaluator` in
/// `env`. Returns the whole diagnostic set on the first failing phase (lex
/// errors surface through the parser's own collector); a phase that
/// produces no errors but still recorded warnings lets evaluation proceed.
pub fn run(filename: &str, source: &str, evaluator: &mut Evaluator, env: &Environment) -> Result<Value, DiagnosticCollector> {
    let (program, parse_diagnostics) = Parser::new(filename, source).parse();
    if parse_diagnostics.has_errors() {
        return Err(parse_diagnostics);
    }

    let semantic_diagnostics = Analyzer::analyze(filename, source, &program);
    if semantic_diagnostics.has_errors() {
        let mut combined = parse_diagnostics;
        combined.merge(semantic_diagnostics);
        return Err(combined);
    }

    Ok(evaluator.eval_program(&program, env))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_well_formed_program_end_to_end() {
        let mut evaluator = Evaluator::new();
        let env = Environment::new();
        let result = run("test", "1 + 2", &mut evaluator, &env).expect("should evaluate");
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn surfaces_parse_diagnostics_without_evaluating() {
        let mut evaluator = Evaluator::new();
        let env = Environment::new();
        let diagnostics = run("test", "let = ", &mut evaluator, &env).unwrap_err();
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn surfaces_semantic_diagnostics_without_evaluating() {
        let mut evaluator = Evaluator::new();
        let env = Environment::new();
        let diagnostics = run("test", "x :: 1\nx = 2", &mut evaluator, &env).unwrap_err();
        assert!(diagnostics.has_errors());
    }
}

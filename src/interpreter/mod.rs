mod environment;
mod evaluator;

pub use environment::Environment;
pub use evaluator::Evaluator;

use anyhow::Result;

use crate::{Engine, Lexer, Parser};

pub fn new_engine() -> Box<dyn Engine> {
    Box::new(EngineImpl {
        evaluator: Evaluator::new(),
    })
}

struct EngineImpl {
    evaluator: Evaluator,
}

impl Engine for EngineImpl {
    fn run(&mut self, input: &str) -> Result<String> {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);

        let program = parser.parse_program()?;

        let result = self.evaluator.eval(program)?;

        Ok(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_keeps_bindings_across_lines() {
        let mut engine = new_engine();
        engine.run("let a = 2;").unwrap();
        assert_eq!(engine.run("a + 3").unwrap(), "5");
    }

    #[test]
    fn test_engine_reports_errors() {
        let mut engine = new_engine();
        assert!(engine.run("let = 5;").is_err());
        assert!(engine.run("foobar").is_err());
    }
}

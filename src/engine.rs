use anyhow::Result;

/// A Monkey execution engine: takes source text, returns the display form of
/// the program's value. Implementations keep their own state between calls so
/// the REPL can carry bindings across lines.
pub trait Engine {
    fn run(&mut self, input: &str) -> Result<String>;
}

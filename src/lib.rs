mod ast;
mod builtins;
mod compiler;
mod engine;
mod error;
mod interpreter;
mod lexer;
mod object;
mod parser;
mod token;

pub use ast::{Expression, Program, Statement};
pub use compiler::{Bytecode, Compiler, Instructions, Opcode, VirtualMachine};
pub use engine::Engine;
pub use error::{CompileError, RuntimeError};
pub use interpreter::{Environment, Evaluator};
pub use lexer::Lexer;
pub use object::{BuiltInFunction, Closure, CompiledFunction, Object};
pub use parser::Parser;
pub use token::Token;

/// Engine that walks the AST directly.
pub fn new_interpreter() -> Box<dyn Engine> {
    interpreter::new_engine()
}

/// Engine that compiles to bytecode and runs it on the virtual machine.
pub fn new_compiler() -> Box<dyn Engine> {
    compiler::new_engine()
}

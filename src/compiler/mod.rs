mod code;
mod compiler;
mod symbol_table;
mod vm;

pub use code::{Instructions, Opcode};
pub use compiler::{Bytecode, Compiler};
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};
pub use vm::VirtualMachine;

use anyhow::Result;

use crate::{Engine, Lexer, Parser};

pub fn new_engine() -> Box<dyn Engine> {
    Box::new(EngineImpl {
        compiler: Compiler::new(),
        vm: VirtualMachine::new(),
    })
}

struct EngineImpl {
    compiler: Compiler,
    vm: VirtualMachine,
}

impl Engine for EngineImpl {
    fn run(&mut self, input: &str) -> Result<String> {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);

        let program = parser.parse_program()?;

        let bytecode = self.compiler.compile(program)?;
        let result = self.vm.run(bytecode)?;

        Ok(result.to_string())
    }
}

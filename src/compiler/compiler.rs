use std::rc::Rc;

use crate::{
    ast::{Expression, Program, Statement},
    error::CompileError,
    object::{CompiledFunction, Object},
    token::Token,
};

use super::{
    code::{Instructions, Opcode},
    symbol_table::{Symbol, SymbolScope, SymbolTable},
};

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

/// The artifact handed to the virtual machine: the main instruction stream
/// plus the constant pool it indexes into.
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

#[derive(Debug, Clone)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function emission state. The compiler pushes one of these for every
/// function literal it descends into and pops it when the body is done; the
/// two most recent emissions are tracked for the Pop → ReturnValue rewrite
/// and for stripping the trailing Pop of conditional branches.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            constants: vec![],
            symbol_table: SymbolTable::new_with_builtins(),
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Lower a program into bytecode. The symbol table and constant pool
    /// survive across calls, which is what lets a REPL session refer back to
    /// bindings from earlier lines.
    pub fn compile(&mut self, program: Program) -> Result<Bytecode, CompileError> {
        // unwind anything a failed earlier compile left behind
        while !self.symbol_table.is_global() {
            let table = std::mem::take(&mut self.symbol_table);
            self.symbol_table = table.into_outer().expect("non-global table has an outer");
        }
        self.scopes = vec![CompilationScope::default()];

        for statement in program.statements.into_iter() {
            self.compile_statement(statement)?;
        }

        debug_assert!(self.symbol_table.is_global(), "unbalanced compilation scopes");

        Ok(Bytecode {
            instructions: self.current_scope().instructions.clone(),
            constants: self.constants.clone(),
        })
    }

    fn compile_statement(&mut self, statement: Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, vec![])?;
            }
            Statement::Block(statements) => {
                for statement in statements.into_iter() {
                    self.compile_statement(statement)?;
                }
            }
            Statement::Let { name, value } => {
                let symbol = self.symbol_table.define(&name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, vec![symbol.index])?,
                    _ => self.emit(Opcode::SetLocal, vec![symbol.index])?,
                };
            }
            Statement::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, vec![])?;
            }
        }

        Ok(())
    }

    fn compile_expression(&mut self, expression: Expression) -> Result<(), CompileError> {
        match expression {
            Expression::IntegerLiteral(value) => {
                let index = self.add_constant(Object::Integer(value));
                self.emit(Opcode::Constant, vec![index])?;
            }
            Expression::StringLiteral(value) => {
                let index = self.add_constant(Object::String(value));
                self.emit(Opcode::Constant, vec![index])?;
            }
            Expression::BooleanLiteral(value) => {
                if value {
                    self.emit(Opcode::True, vec![])?;
                } else {
                    self.emit(Opcode::False, vec![])?;
                }
            }
            Expression::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(&name)
                    .ok_or(CompileError::UnresolvedIdentifier(name))?;
                self.load_symbol(&symbol)?;
            }
            Expression::Prefix { operator, right } => {
                self.compile_expression(*right)?;
                match operator {
                    Token::Bang => self.emit(Opcode::Bang, vec![])?,
                    Token::Minus => self.emit(Opcode::Minus, vec![])?,
                    token => {
                        return Err(CompileError::UnknownOperator {
                            operator: token.to_string(),
                            context: "prefix",
                        })
                    }
                };
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                self.compile_expression(*left)?;
                self.compile_expression(*right)?;
                match operator {
                    Token::Plus => self.emit(Opcode::Add, vec![])?,
                    Token::Minus => self.emit(Opcode::Sub, vec![])?,
                    Token::Asterisk => self.emit(Opcode::Mul, vec![])?,
                    Token::Slash => self.emit(Opcode::Div, vec![])?,
                    Token::Gt => self.emit(Opcode::GreaterThan, vec![])?,
                    Token::Lt => self.emit(Opcode::LessThan, vec![])?,
                    Token::Eq => self.emit(Opcode::Equal, vec![])?,
                    Token::NotEq => self.emit(Opcode::NotEqual, vec![])?,
                    token => {
                        return Err(CompileError::UnknownOperator {
                            operator: token.to_string(),
                            context: "infix",
                        })
                    }
                };
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if_expression(condition, consequence, alternative)?,
            Expression::ArrayLiteral(elements) => {
                let count = elements.len();
                for element in elements.into_iter() {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, vec![count])?;
            }
            Expression::HashLiteral(mut pairs) => {
                // deterministic emission regardless of source order
                pairs.sort_by(|(a, _), (b, _)| a.to_string().cmp(&b.to_string()));
                let count = pairs.len() * 2;
                for (key, value) in pairs.into_iter() {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, vec![count])?;
            }
            Expression::Index { left, index } => {
                self.compile_expression(*left)?;
                self.compile_expression(*index)?;
                self.emit(Opcode::Index, vec![])?;
            }
            Expression::FunctionLiteral { parameters, body } => {
                self.compile_function_literal(parameters, body)?;
            }
            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(*function)?;
                let count = arguments.len();
                for argument in arguments.into_iter() {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, vec![count])?;
            }
        }

        Ok(())
    }

    fn compile_if_expression(
        &mut self,
        condition: Box<Expression>,
        consequence: Box<Statement>,
        alternative: Option<Box<Statement>>,
    ) -> Result<(), CompileError> {
        self.compile_expression(*condition)?;

        // operand patched once the consequence length is known
        let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, vec![9999])?;

        self.compile_statement(*consequence)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Opcode::Jump, vec![9999])?;

        let after_consequence = self.current_scope().instructions.len();
        self.change_operand(jump_not_truthy_pos, after_consequence)?;

        match alternative {
            Some(alternative) => {
                self.compile_statement(*alternative)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
            }
            None => {
                self.emit(Opcode::Null, vec![])?;
            }
        }

        let after_alternative = self.current_scope().instructions.len();
        self.change_operand(jump_pos, after_alternative)?;

        Ok(())
    }

    fn compile_function_literal(
        &mut self,
        parameters: Vec<String>,
        body: Box<Statement>,
    ) -> Result<(), CompileError> {
        self.enter_scope();

        let num_parameters = parameters.len();
        for parameter in parameters {
            self.symbol_table.define(&parameter);
        }

        self.compile_statement(*body)?;

        // A body ending in an expression statement returns that expression's
        // value; anything else falls back to an implicit null return.
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return()?;
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, vec![])?;
        }

        let free_symbols = self.symbol_table.free_symbols().to_vec();
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();

        // push every captured value in the enclosing scope, using the
        // capture's original addressing there
        for symbol in free_symbols.iter() {
            self.load_symbol(symbol)?;
        }

        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters,
        };
        let index = self.add_constant(Object::CompiledFunction(Rc::new(function)));
        self.emit(Opcode::Closure, vec![index, free_symbols.len()])?;

        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> Result<(), CompileError> {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, vec![symbol.index])?,
            SymbolScope::Local => self.emit(Opcode::GetLocal, vec![symbol.index])?,
            SymbolScope::BuiltIn => self.emit(Opcode::GetBuiltIn, vec![symbol.index])?,
            SymbolScope::Free => self.emit(Opcode::GetFree, vec![symbol.index])?,
        };
        Ok(())
    }

    fn add_constant(&mut self, object: Object) -> usize {
        self.constants.push(object);
        self.constants.len() - 1
    }

    fn emit(&mut self, opcode: Opcode, operands: Vec<usize>) -> Result<usize, CompileError> {
        let instruction = Instructions::make(opcode, operands)?;
        let position = self.current_scope_mut().instructions.extend(instruction);
        self.set_last_emitted(opcode, position);
        Ok(position)
    }

    fn set_last_emitted(&mut self, opcode: Opcode, position: usize) {
        let scope = self.current_scope_mut();
        scope.previous = scope.last.take();
        scope.last = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.current_scope()
            .last
            .as_ref()
            .is_some_and(|last| last.opcode == opcode)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last.take() {
            scope.instructions.drain_at(last.position);
            scope.last = scope.previous.take();
        }
    }

    /// Both opcodes are a single byte, so the rewrite never shifts earlier
    /// jump targets.
    fn replace_last_pop_with_return(&mut self) -> Result<(), CompileError> {
        let instruction = Instructions::make(Opcode::ReturnValue, vec![])?;
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last.as_mut() {
            scope.instructions.replace_at(last.position, instruction);
            last.opcode = Opcode::ReturnValue;
        }
        Ok(())
    }

    fn change_operand(&mut self, position: usize, operand: usize) -> Result<(), CompileError> {
        self.current_scope_mut()
            .instructions
            .change_u16_operand(position, operand)
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self
            .scopes
            .pop()
            .expect("leave_scope without matching enter_scope");
        let table = std::mem::take(&mut self.symbol_table);
        self.symbol_table = table
            .into_outer()
            .expect("leave_scope without enclosing symbol table");
        scope.instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler always has a scope")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compiler always has a scope")
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

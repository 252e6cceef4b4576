use std::{collections::HashMap, io::Cursor, rc::Rc};

use byteorder::ReadBytesExt;

use crate::{
    builtins::Builtins,
    error::RuntimeError,
    object::{Closure, CompiledFunction, Object},
};

use super::{code::Opcode, compiler::Bytecode};

const STACK_SIZE: usize = 2048;
const GLOBALS_SIZE: usize = 65536;
const FRAMES_SIZE: usize = 1024;

const NULL: Object = Object::Null;
const TRUE: Object = Object::Boolean(true);
const FALSE: Object = Object::Boolean(false);

/// One activation record. The cursor position is the frame's instruction
/// pointer; `base_pointer` marks where the frame's locals begin on the
/// operand stack (arguments first, then slots reserved for lets).
#[derive(Debug, Clone)]
struct Frame {
    closure: Closure,
    instructions: Cursor<Vec<u8>>,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Closure, base_pointer: usize) -> Self {
        let instructions = Cursor::new(closure.function.instructions.inner().clone());
        Self {
            closure,
            instructions,
            base_pointer,
        }
    }

    fn instructions(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.instructions
    }

    fn has_next(&self) -> bool {
        (self.instructions.position() as usize) < self.instructions.get_ref().len()
    }
}

pub struct VirtualMachine {
    constants: Vec<Object>,
    globals: Vec<Object>,

    stack: Vec<Object>,
    frames: Vec<Frame>,
    last_popped_elem: Option<Object>,
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self {
            constants: vec![],
            globals: vec![NULL; GLOBALS_SIZE],
            stack: Vec::with_capacity(STACK_SIZE),
            frames: Vec::with_capacity(FRAMES_SIZE),
            last_popped_elem: None,
        }
    }

    /// Execute a compiled program to completion and return the value of its
    /// final expression statement. Globals survive between runs so a REPL
    /// can build on earlier lines.
    pub fn run(&mut self, bytecode: Bytecode) -> Result<Object, RuntimeError> {
        let main_function = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Closure {
            function: Rc::new(main_function),
            free: vec![],
        };

        self.constants = bytecode.constants;
        self.stack.clear();
        self.frames.clear();
        self.frames.push(Frame::new(main_closure, 0));
        self.last_popped_elem = None;

        while self.current_frame()?.has_next() {
            let opcode = Opcode::try_from(self.read_u8_operand()?)?;
            match opcode {
                Opcode::Constant => {
                    let constant_index = self.read_u16_operand()?;
                    let constant = self.constants[constant_index].clone();
                    self.push(constant)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan
                | Opcode::LessThan => {
                    self.execute_binary_operation(opcode)?;
                }
                Opcode::True => {
                    self.push(TRUE)?;
                }
                Opcode::False => {
                    self.push(FALSE)?;
                }
                Opcode::Minus => {
                    self.execute_minus_operator()?;
                }
                Opcode::Bang => {
                    self.execute_bang_operator()?;
                }
                Opcode::Jump => {
                    let position = self.read_u16_operand()?;
                    self.current_frame_mut()?
                        .instructions()
                        .set_position(position as u64);
                }
                Opcode::JumpNotTruthy => {
                    let position = self.read_u16_operand()?;
                    let condition = self.pop()?;
                    if !self.is_truthy(condition) {
                        self.current_frame_mut()?
                            .instructions()
                            .set_position(position as u64);
                    }
                }
                Opcode::Null => {
                    self.push(NULL)?;
                }
                Opcode::SetGlobal => {
                    let global_index = self.read_u16_operand()?;
                    self.globals[global_index] = self.pop()?;
                }
                Opcode::GetGlobal => {
                    let global_index = self.read_u16_operand()?;
                    let global = self.globals[global_index].clone();
                    self.push(global)?;
                }
                Opcode::SetLocal => {
                    let local_index = self.read_u8_operand()? as usize;
                    let base_pointer = self.current_frame()?.base_pointer;
                    let value = self.pop()?;
                    self.stack[base_pointer + local_index] = value;
                }
                Opcode::GetLocal => {
                    let local_index = self.read_u8_operand()? as usize;
                    let base_pointer = self.current_frame()?.base_pointer;
                    let value = self.stack[base_pointer + local_index].clone();
                    self.push(value)?;
                }
                Opcode::GetBuiltIn => {
                    let builtin_index = self.read_u8_operand()? as usize;
                    let (_, function) = Builtins::get()[builtin_index];
                    self.push(Object::BuiltInFunction(function))?;
                }
                Opcode::GetFree => {
                    let free_index = self.read_u8_operand()? as usize;
                    let value = self.current_frame()?.closure.free[free_index].clone();
                    self.push(value)?;
                }
                Opcode::Array => {
                    let num_elements = self.read_u16_operand()?;
                    let elements = self.pop_many(num_elements)?;
                    self.push(Object::Array(elements))?;
                }
                Opcode::Hash => {
                    let num_elements = self.read_u16_operand()?;
                    let mut pairs = self.pop_many(num_elements)?.into_iter();
                    let mut hash = HashMap::with_capacity(num_elements / 2);
                    while let (Some(key), Some(value)) = (pairs.next(), pairs.next()) {
                        if !key.hashable() {
                            return Err(RuntimeError::NotHashable(key.kind()));
                        }
                        hash.insert(key, value);
                    }
                    self.push(Object::Hash(hash))?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index_expression(left, index)?;
                }
                Opcode::Call => {
                    let num_args = self.read_u8_operand()? as usize;
                    self.execute_call(num_args)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop()?;
                    let frame = self.pop_frame()?;
                    if self.frames.is_empty() {
                        // a bare `return` at the top level ends the program
                        return Ok(return_value);
                    }
                    self.stack.truncate(frame.base_pointer - 1);
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    let frame = self.pop_frame()?;
                    if self.frames.is_empty() {
                        return Ok(NULL);
                    }
                    self.stack.truncate(frame.base_pointer - 1);
                    self.push(NULL)?;
                }
                Opcode::Closure => {
                    let constant_index = self.read_u16_operand()?;
                    let num_free = self.read_u8_operand()? as usize;
                    let free = self.pop_many(num_free)?;
                    match self.constants[constant_index].clone() {
                        Object::CompiledFunction(function) => {
                            self.push(Object::Closure(Closure { function, free }))?;
                        }
                        other => return Err(RuntimeError::NotCallable(other.kind())),
                    }
                }
            }
        }

        Ok(self.last_popped_elem().cloned().unwrap_or(NULL))
    }

    pub fn last_popped_elem(&self) -> Option<&Object> {
        self.last_popped_elem.as_ref()
    }

    fn current_frame(&self) -> Result<&Frame, RuntimeError> {
        self.frames.last().ok_or(RuntimeError::MissingFrame)
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames.last_mut().ok_or(RuntimeError::MissingFrame)
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= FRAMES_SIZE {
            return Err(RuntimeError::FrameOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop_frame(&mut self) -> Result<Frame, RuntimeError> {
        self.frames.pop().ok_or(RuntimeError::MissingFrame)
    }

    fn read_u8_operand(&mut self) -> Result<u8, RuntimeError> {
        self.current_frame_mut()?
            .instructions()
            .read_u8()
            .map_err(|_| RuntimeError::TruncatedInstructions)
    }

    fn read_u16_operand(&mut self) -> Result<usize, RuntimeError> {
        self.current_frame_mut()?
            .instructions()
            .read_u16::<byteorder::BigEndian>()
            .map(|operand| operand as usize)
            .map_err(|_| RuntimeError::TruncatedInstructions)
    }

    fn push(&mut self, object: Object) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(object);
        Ok(())
    }

    fn pop(&mut self) -> Result<Object, RuntimeError> {
        match self.stack.pop() {
            Some(object) => {
                self.last_popped_elem = Some(object.clone());
                Ok(object)
            }
            None => Err(RuntimeError::StackUnderflow),
        }
    }

    /// Take the top `count` values off the stack, preserving their original
    /// push order.
    fn pop_many(&mut self, count: usize) -> Result<Vec<Object>, RuntimeError> {
        let split_at = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(split_at))
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), RuntimeError> {
        let callee_index = self
            .stack
            .len()
            .checked_sub(num_args + 1)
            .ok_or(RuntimeError::StackUnderflow)?;
        match self.stack[callee_index].clone() {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::BuiltInFunction(function) => self.call_builtin(function, num_args),
            other => Err(RuntimeError::NotCallable(other.kind())),
        }
    }

    fn call_closure(&mut self, closure: Closure, num_args: usize) -> Result<(), RuntimeError> {
        if num_args != closure.function.num_parameters {
            return Err(RuntimeError::WrongNumberOfArguments {
                want: closure.function.num_parameters,
                got: num_args,
            });
        }

        // arguments already occupy the first local slots; reserve the rest
        let num_locals = closure.function.num_locals;
        let base_pointer = self.stack.len() - num_args;
        self.push_frame(Frame::new(closure, base_pointer))?;
        for _ in 0..(num_locals - num_args) {
            self.push(NULL)?;
        }

        Ok(())
    }

    fn call_builtin(
        &mut self,
        function: fn(Vec<Object>) -> Result<Object, RuntimeError>,
        num_args: usize,
    ) -> Result<(), RuntimeError> {
        let args = self.pop_many(num_args)?;
        let result = function(args)?;
        self.pop()?;
        self.push(result)?;
        Ok(())
    }

    fn execute_index_expression(
        &mut self,
        left: Object,
        index: Object,
    ) -> Result<(), RuntimeError> {
        match (left, index) {
            (Object::Array(elements), Object::Integer(index)) => {
                let element = usize::try_from(index)
                    .ok()
                    .and_then(|index| elements.get(index).cloned())
                    .unwrap_or(NULL);
                self.push(element)
            }
            (Object::String(value), Object::Integer(index)) => {
                let element = usize::try_from(index)
                    .ok()
                    .and_then(|index| value.chars().nth(index))
                    .map(|char| Object::String(char.to_string()))
                    .unwrap_or(NULL);
                self.push(element)
            }
            (Object::Hash(pairs), index) => {
                if !index.hashable() {
                    return Err(RuntimeError::NotHashable(index.kind()));
                }
                self.push(pairs.get(&index).cloned().unwrap_or(NULL))
            }
            (left, _) => Err(RuntimeError::NotIndexable(left.kind())),
        }
    }

    fn execute_binary_operation(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        if left.kind() != right.kind() {
            return Err(RuntimeError::TypeMismatch {
                operator: opcode.operator().to_string(),
                left: left.kind(),
                right: right.kind(),
            });
        }

        match (left, right) {
            (Object::Integer(left), Object::Integer(right)) => {
                let result = match opcode {
                    Opcode::Add => Object::Integer(left.wrapping_add(right)),
                    Opcode::Sub => Object::Integer(left.wrapping_sub(right)),
                    Opcode::Mul => Object::Integer(left.wrapping_mul(right)),
                    Opcode::Div => {
                        if right == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        Object::Integer(left.wrapping_div(right))
                    }
                    Opcode::Equal => self.native_boolean_to_boolean_object(left == right),
                    Opcode::NotEqual => self.native_boolean_to_boolean_object(left != right),
                    Opcode::GreaterThan => self.native_boolean_to_boolean_object(left > right),
                    Opcode::LessThan => self.native_boolean_to_boolean_object(left < right),
                    opcode => {
                        return Err(RuntimeError::UnknownInfixOperator {
                            operator: opcode.operator().to_string(),
                            left: "INTEGER",
                            right: "INTEGER",
                        })
                    }
                };
                self.push(result)
            }
            (Object::Boolean(left), Object::Boolean(right)) => {
                let result = match opcode {
                    Opcode::Equal => self.native_boolean_to_boolean_object(left == right),
                    Opcode::NotEqual => self.native_boolean_to_boolean_object(left != right),
                    opcode => {
                        return Err(RuntimeError::UnknownInfixOperator {
                            operator: opcode.operator().to_string(),
                            left: "BOOLEAN",
                            right: "BOOLEAN",
                        })
                    }
                };
                self.push(result)
            }
            (Object::String(left), Object::String(right)) => {
                let result = match opcode {
                    Opcode::Add => Object::String(format!("{}{}", left, right)),
                    Opcode::Equal => self.native_boolean_to_boolean_object(left == right),
                    Opcode::NotEqual => self.native_boolean_to_boolean_object(left != right),
                    opcode => {
                        return Err(RuntimeError::UnknownInfixOperator {
                            operator: opcode.operator().to_string(),
                            left: "STRING",
                            right: "STRING",
                        })
                    }
                };
                self.push(result)
            }
            (left, _right) => Err(RuntimeError::UnknownInfixOperator {
                operator: opcode.operator().to_string(),
                left: left.kind(),
                right: left.kind(),
            }),
        }
    }

    fn execute_bang_operator(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop()?;
        match operand {
            Object::Boolean(true) => self.push(FALSE),
            Object::Boolean(false) => self.push(TRUE),
            Object::Null => self.push(TRUE),
            _ => self.push(FALSE),
        }
    }

    fn execute_minus_operator(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop()?;
        match operand {
            Object::Integer(value) => self.push(Object::Integer(value.wrapping_neg())),
            other => Err(RuntimeError::UnknownPrefixOperator {
                operator: "-".to_string(),
                operand: other.kind(),
            }),
        }
    }

    fn is_truthy(&self, object: Object) -> bool {
        match object {
            Object::Null => false,
            Object::Boolean(value) => value,
            _ => true,
        }
    }

    fn native_boolean_to_boolean_object(&self, input: bool) -> Object {
        if input {
            TRUE
        } else {
            FALSE
        }
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Lexer, Parser};

    use super::super::compiler::Compiler;
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        let tests = vec![
            ("1 + 2", Object::Integer(3)),
            ("1 - 2", Object::Integer(-1)),
            ("1 * 2", Object::Integer(2)),
            ("4 / 2", Object::Integer(2)),
            ("50 / 2 * 2 + 10 - 5", Object::Integer(55)),
            ("5 + 5 + 5 + 5 - 10", Object::Integer(10)),
            ("2 * 2 * 2 * 2 * 2", Object::Integer(32)),
            ("5 * 2 + 10", Object::Integer(20)),
            ("5 + 2 * 10", Object::Integer(25)),
            ("5 * (2 + 10)", Object::Integer(60)),
            ("-(5 + 2)", Object::Integer(-7)),
            ("-50 + 100 + -50", Object::Integer(0)),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", Object::Integer(50)),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_boolean_expressions() {
        let tests = vec![
            ("true", Object::Boolean(true)),
            ("false", Object::Boolean(false)),
            ("1 < 2", Object::Boolean(true)),
            ("1 > 2", Object::Boolean(false)),
            ("1 < 1", Object::Boolean(false)),
            ("1 > 1", Object::Boolean(false)),
            ("1 == 1", Object::Boolean(true)),
            ("1 != 1", Object::Boolean(false)),
            ("1 == 2", Object::Boolean(false)),
            ("1 != 2", Object::Boolean(true)),
            ("true == true", Object::Boolean(true)),
            ("false == false", Object::Boolean(true)),
            ("true == false", Object::Boolean(false)),
            ("true != false", Object::Boolean(true)),
            ("false != true", Object::Boolean(true)),
            ("(1 < 2) == true", Object::Boolean(true)),
            ("(1 < 2) == false", Object::Boolean(false)),
            ("(1 > 2) == true", Object::Boolean(false)),
            ("(1 > 2) == false", Object::Boolean(true)),
            ("\"a\" == \"a\"", Object::Boolean(true)),
            ("\"a\" != \"b\"", Object::Boolean(true)),
            ("!true", Object::Boolean(false)),
            ("!false", Object::Boolean(true)),
            ("!5", Object::Boolean(false)),
            ("!!true", Object::Boolean(true)),
            ("!!false", Object::Boolean(false)),
            ("!!5", Object::Boolean(true)),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_conditionals() {
        let tests = vec![
            ("if (true) { 10 }", Object::Integer(10)),
            ("if (true) { 10 } else { 20 }", Object::Integer(10)),
            ("if (false) { 10 } else { 20 }", Object::Integer(20)),
            ("if (1) { 10 }", Object::Integer(10)),
            ("if (1 < 2) { 10 }", Object::Integer(10)),
            ("if (1 < 2) { 10 } else { 20 }", Object::Integer(10)),
            ("if (1 > 2) { 10 } else { 20 }", Object::Integer(20)),
            ("if (1 > 2) { 10 }", Object::Null),
            ("if (false) { 10 }", Object::Null),
            (
                "if ((if (false) { 10 })) { 10 } else { 20 }",
                Object::Integer(20),
            ),
            ("!if (false) { 10 }", Object::Boolean(true)),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_global_let_statements() {
        let tests = vec![
            ("let one = 1; one", Object::Integer(1)),
            ("let one = 1; let two = 2; one + two", Object::Integer(3)),
            (
                "let one = 1; let two = one + one; one + two",
                Object::Integer(3),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_string_expressions() {
        let tests = vec![
            ("\"monkey\"", Object::String(String::from("monkey"))),
            ("\"mon\" + \"key\"", Object::String(String::from("monkey"))),
            (
                "\"mon\" + \"key\" + \"banana\"",
                Object::String(String::from("monkeybanana")),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_array_literals() {
        let tests = vec![
            ("[]", Object::Array(vec![])),
            (
                "[1, 2, 3]",
                Object::Array(vec![
                    Object::Integer(1),
                    Object::Integer(2),
                    Object::Integer(3),
                ]),
            ),
            (
                "[1 + 2, 3 * 4, 5 + 6]",
                Object::Array(vec![
                    Object::Integer(3),
                    Object::Integer(12),
                    Object::Integer(11),
                ]),
            ),
        ];
        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_hash_literals() {
        let tests = vec![
            ("{}", Object::Hash(vec![].into_iter().collect())),
            (
                "{1: 2, 2: 3}",
                Object::Hash(
                    vec![
                        (Object::Integer(1), Object::Integer(2)),
                        (Object::Integer(2), Object::Integer(3)),
                    ]
                    .into_iter()
                    .collect(),
                ),
            ),
            (
                "{1 + 1: 2 * 2, 3 + 3: 4 * 4}",
                Object::Hash(
                    vec![
                        (Object::Integer(2), Object::Integer(4)),
                        (Object::Integer(6), Object::Integer(16)),
                    ]
                    .into_iter()
                    .collect(),
                ),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_index_expressions() {
        let tests = vec![
            ("[1, 2, 3][1]", Object::Integer(2)),
            ("[1, 2, 3][0 + 2]", Object::Integer(3)),
            ("[[1, 2, 3]][0][0]", Object::Integer(1)),
            ("[][0]", Object::Null),
            ("[1, 2, 3][99]", Object::Null),
            ("[1][-1]", Object::Null),
            ("{1: 1, 2: 2}[1]", Object::Integer(1)),
            ("{1: 1, 2: 2}[2]", Object::Integer(2)),
            ("{1: 1}[0]", Object::Null),
            ("{}[0]", Object::Null),
            ("\"hello\"[1]", Object::String("e".to_string())),
            ("\"hello\"[4]", Object::String("o".to_string())),
            ("\"hello\"[5]", Object::Null),
            ("\"hello\"[-1]", Object::Null),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_calling_functions_without_arguments() {
        let tests = vec![
            (
                "let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();",
                Object::Integer(15),
            ),
            (
                "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
                Object::Integer(3),
            ),
            (
                "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c()",
                Object::Integer(3),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_functions_with_return_statement() {
        let tests = vec![
            (
                "let earlyExit = fn() { return 99; 100; }; earlyExit();",
                Object::Integer(99),
            ),
            (
                "let earlyExit = fn() { return 99; return 100; }; earlyExit();",
                Object::Integer(99),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_functions_without_return_value() {
        let tests = vec![
            ("let noReturn = fn() { }; noReturn();", Object::Null),
            ("let noReturn = fn() { }; let noReturnTwo = fn() { noReturn(); }; noReturn(); noReturnTwo();", Object::Null),
            ("let setsOnly = fn() { let a = 1; }; setsOnly();", Object::Null),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_first_class_functions() {
        let tests = vec![
            (
                "let returnsOne = fn() { 1; }; let returnsOneReturner = fn() { returnsOne; }; returnsOneReturner()();",
                Object::Integer(1),
            ),
            (
                "let returnsOneReturner = fn() { let returnsOne = fn() { 1; }; returnsOne; }; returnsOneReturner()();",
                Object::Integer(1),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_calling_functions_with_bindings() {
        let tests = vec![
            (
                "let one = fn() { let one = 1; one }; one();",
                Object::Integer(1),
            ),
            (
                "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
                Object::Integer(3),
            ),
            (
                "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; let threeAndFour = fn() { let three = 3; let four = 4; three + four; }; oneAndTwo() + threeAndFour();",
                Object::Integer(10),
            ),
            (
                "let firstFoobar = fn() { let foobar = 50; foobar; }; let secondFoobar = fn() { let foobar = 100; foobar; }; firstFoobar() + secondFoobar();",
                Object::Integer(150),
            ),
            (
                "let globalSeed = 50; let minusOne = fn() { let num = 1; globalSeed - num; }; let minusTwo = fn() { let num = 2; globalSeed - num; }; minusOne() + minusTwo();",
                Object::Integer(97),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_calling_functions_with_arguments_and_bindings() {
        let tests = vec![
            (
                "let identity = fn(a) { a; }; identity(4);",
                Object::Integer(4),
            ),
            (
                "let sum = fn(a, b) { a + b; }; sum(1, 2);",
                Object::Integer(3),
            ),
            (
                "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);",
                Object::Integer(3),
            ),
            (
                "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
                Object::Integer(10),
            ),
            (
                "let sum = fn(a, b) { let c = a + b; c; }; let outer = fn() { sum(1, 2) + sum(3, 4); }; outer();",
                Object::Integer(10),
            ),
            (
                "let globalNum = 10; let sum = fn(a, b) { let c = a + b; c + globalNum; }; let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; }; outer() + globalNum;",
                Object::Integer(50),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_calling_functions_with_wrong_arguments() {
        let tests = vec![
            ("fn() { 1; }(1);", "wrong number of arguments: want=0, got=1"),
            ("fn(a) { a; }();", "wrong number of arguments: want=1, got=0"),
            (
                "fn(a, b) { a + b; }(1);",
                "wrong number of arguments: want=2, got=1",
            ),
        ];

        for (input, expected) in tests {
            run_vm_error_tests(input, expected);
        }
    }

    #[test]
    fn test_builtin_functions() {
        let tests = vec![
            (r#"len("")"#, Object::Integer(0)),
            (r#"len("four")"#, Object::Integer(4)),
            (r#"len("hello world")"#, Object::Integer(11)),
            (r#"len([1, 2, 3])"#, Object::Integer(3)),
            (r#"len([])"#, Object::Integer(0)),
            (r#"len("hello") + len([1, 2, 3])"#, Object::Integer(8)),
            (r#"first([1, 2, 3])"#, Object::Integer(1)),
            (r#"first([])"#, Object::Null),
            (r#"first("abc")"#, Object::String("a".to_string())),
            (r#"last([1, 2, 3])"#, Object::Integer(3)),
            (r#"last([])"#, Object::Null),
            (r#"last("abc")"#, Object::String("c".to_string())),
            (
                r#"rest([1, 2, 3])"#,
                Object::Array(vec![Object::Integer(2), Object::Integer(3)]),
            ),
            (r#"rest([])"#, Object::Null),
            (r#"rest("abc")"#, Object::String("bc".to_string())),
            (r#"push([], 1)"#, Object::Array(vec![Object::Integer(1)])),
            (
                r#"let arr = [1, 2]; push(arr, 3); arr"#,
                Object::Array(vec![Object::Integer(1), Object::Integer(2)]),
            ),
        ];
        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_builtin_function_errors() {
        let tests = vec![
            ("len(1)", "argument to `len` not supported, got INTEGER"),
            (
                r#"len("one", "two")"#,
                "wrong number of arguments: want=1, got=2",
            ),
            ("first(1)", "argument to `first` not supported, got INTEGER"),
            ("last(1)", "argument to `last` not supported, got INTEGER"),
            ("push(1, 1)", "argument to `push` not supported, got INTEGER"),
        ];

        for (input, expected) in tests {
            run_vm_error_tests(input, expected);
        }
    }

    #[test]
    fn test_closures() {
        let tests = vec![
            (
                "let newClosure = fn(a) { fn() { a; }; }; let closure = newClosure(99); closure();",
                Object::Integer(99),
            ),
            (
                "let newAdder = fn(x) { fn(y) { x + y } }; let addTwo = newAdder(2); addTwo(3);",
                Object::Integer(5),
            ),
            (
                "let newAdder = fn(a, b) { fn(c) { a + b + c }; }; let adder = newAdder(1, 2); adder(8);",
                Object::Integer(11),
            ),
            (
                "let newAdder = fn(a, b) { let c = a + b; fn(d) { c + d }; }; let adder = newAdder(1, 2); adder(8);",
                Object::Integer(11),
            ),
            (
                "let newAdderOuter = fn(a, b) { let c = a + b; fn(d) { let e = d + c; fn(f) { e + f; }; }; }; let newAdderInner = newAdderOuter(1, 2); let adder = newAdderInner(3); adder(8);",
                Object::Integer(14),
            ),
            (
                "let a = 1; let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; }; let newAdderInner = newAdderOuter(2); let adder = newAdderInner(3); adder(8);",
                Object::Integer(14),
            ),
            (
                "let newClosure = fn(a, b) { let one = fn() { a; }; let two = fn() { b; }; fn() { one() + two(); }; }; let closure = newClosure(9, 90); closure();",
                Object::Integer(99),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_recursive_functions() {
        let tests = vec![
            (
                "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; countDown(1);",
                Object::Integer(0),
            ),
            (
                "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; let wrapper = fn() { countDown(1); }; wrapper();",
                Object::Integer(0),
            ),
        ];

        for (input, expected) in tests {
            run_vm_tests(input, expected);
        }
    }

    #[test]
    fn test_fibonacci() {
        let input = r#"
        let fibonacci = fn(x) {
            if (x == 0) {
                0
            } else {
                if (x == 1) {
                    1
                } else {
                    fibonacci(x - 1) + fibonacci(x - 2);
                }
            }
        };
        fibonacci(10);
        "#;

        run_vm_tests(input, Object::Integer(55));
    }

    #[test]
    fn test_runtime_errors() {
        let tests = vec![
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            ("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN"),
            (
                "if (10 > 1) { true + false; }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            (r#""a" - "b""#, "unknown operator: STRING - STRING"),
            ("5 / 0", "division by zero"),
            ("[1, 2][true]", "index operator not supported: ARRAY"),
            ("5[0]", "index operator not supported: INTEGER"),
            ("5(1)", "calling non-function: INTEGER"),
            ("{fn() { 1 }: 2}", "unusable as hash key: CLOSURE"),
            (r#"{"name": "Monkey"}[fn(x) { x }];"#, "unusable as hash key: CLOSURE"),
        ];

        for (input, expected) in tests {
            run_vm_error_tests(input, expected);
        }
    }

    #[test]
    fn test_frame_overflow() {
        run_vm_error_tests("let f = fn() { f(); }; f();", "frame overflow");
    }

    #[test]
    fn test_last_popped_after_let() {
        run_vm_tests("let one = 1;", Object::Integer(1));
    }

    #[test]
    fn test_globals_survive_across_runs() {
        let mut compiler = Compiler::new();
        let mut vm = VirtualMachine::new();

        vm.run(compile_with(&mut compiler, "let x = 40;")).unwrap();
        let result = vm.run(compile_with(&mut compiler, "x + 2")).unwrap();

        assert_eq!(result, Object::Integer(42));
    }

    fn compile_with(compiler: &mut Compiler, input: &str) -> Bytecode {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);
        let program = parser.parse_program().unwrap();
        compiler.compile(program).unwrap()
    }

    fn run_vm_tests(input: &str, expected: Object) {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);
        let program = parser.parse_program().unwrap();

        let mut compiler = Compiler::new();
        let bytecode = compiler.compile(program).unwrap();

        let mut vm = VirtualMachine::new();
        let result = match vm.run(bytecode) {
            Ok(result) => result,
            Err(err) => panic!("vm error for {}: {}", input, err),
        };

        assert_eq!(result, expected, "wrong result for {}", input);
    }

    fn run_vm_error_tests(input: &str, expected: &str) {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);
        let program = parser.parse_program().unwrap();

        let mut compiler = Compiler::new();
        let bytecode = compiler.compile(program).unwrap();

        let mut vm = VirtualMachine::new();
        match vm.run(bytecode) {
            Ok(result) => panic!("no error returned for {}, got {}", input, result),
            Err(err) => assert_eq!(err.to_string(), expected, "wrong error for {}", input),
        }
    }
}

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::{anyhow, Result};

use crate::{
    ast::{Expression, Program, Statement},
    error::RuntimeError,
    object::Object,
    token::Token,
};

use super::environment::Environment;

const TRUE: Object = Object::Boolean(true);
const FALSE: Object = Object::Boolean(false);
const NULL: Object = Object::Null;

/// The tree-walking reference engine. Walks the AST directly, threading an
/// environment chain for bindings and using a `ReturnValue` wrapper object to
/// unwind `return` statements through nested blocks.
pub struct Evaluator {
    env: Rc<RefCell<Environment>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            env: Rc::new(RefCell::new(Environment::new())),
        }
    }

    pub fn eval(&mut self, program: Program) -> Result<Object> {
        let mut result = Object::Null;
        for statement in program.statements {
            result = match self.eval_statement(Box::new(statement))? {
                Object::ReturnValue(value) => return Ok(*value),
                object => object,
            };
        }
        Ok(result)
    }

    fn eval_statement(&mut self, statement: Box<Statement>) -> Result<Object> {
        let object = match *statement {
            Statement::Expression(expression) => self.eval_expression(Box::new(expression))?,
            Statement::Block(statements) => self.eval_block_statement(statements)?,
            Statement::Return(expression) => {
                let value = self.eval_expression(Box::new(expression))?;
                return Ok(Object::ReturnValue(Box::new(value)));
            }
            Statement::Let { name, value } => {
                let value = self.eval_expression(Box::new(value))?;
                self.env.borrow_mut().set(&name, value);
                NULL
            }
        };
        Ok(object)
    }

    fn eval_block_statement(&mut self, statements: Vec<Statement>) -> Result<Object> {
        let mut result = Object::Null;
        for statement in statements {
            result = self.eval_statement(Box::new(statement))?;
            if let Object::ReturnValue(_) = result {
                return Ok(result);
            }
        }
        Ok(result)
    }

    fn eval_expression(&mut self, expression: Box<Expression>) -> Result<Object> {
        let object = match *expression {
            Expression::IntegerLiteral(value) => Object::Integer(value),
            Expression::StringLiteral(value) => Object::String(value),
            Expression::BooleanLiteral(value) => self.native_bool_to_boolean_object(value),
            Expression::Prefix { operator, right } => {
                let right = self.eval_expression(right)?;
                self.eval_prefix_expression(operator, right)?
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                self.eval_infix_expression(left, operator, right)?
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.eval_if_expression(condition, consequence, alternative)?,
            Expression::Identifier(name) => self.eval_identifier_expression(name)?,
            Expression::FunctionLiteral { parameters, body } => Object::Function {
                parameters,
                body,
                env: self.env.clone(),
            },
            Expression::Call {
                function,
                arguments,
            } => self.eval_call_expression(function, arguments)?,
            Expression::ArrayLiteral(elements) => self.eval_array_literal(elements)?,
            Expression::HashLiteral(pairs) => self.eval_hash_literal(pairs)?,
            Expression::Index { left, index } => self.eval_index_expression(left, index)?,
        };
        Ok(object)
    }

    fn eval_hash_literal(&mut self, pairs: Vec<(Expression, Expression)>) -> Result<Object> {
        let mut hash = HashMap::new();
        for (key, value) in pairs {
            let key = self.eval_expression(Box::new(key))?;
            if !key.hashable() {
                return Err(RuntimeError::NotHashable(key.kind()).into());
            }
            let value = self.eval_expression(Box::new(value))?;
            hash.insert(key, value);
        }
        Ok(Object::Hash(hash))
    }

    fn eval_array_literal(&mut self, elements: Vec<Expression>) -> Result<Object> {
        let elements = elements
            .into_iter()
            .map(|e| self.eval_expression(Box::new(e)))
            .collect::<Result<Vec<Object>>>()?;
        Ok(Object::Array(elements))
    }

    fn eval_index_expression(
        &mut self,
        left: Box<Expression>,
        index: Box<Expression>,
    ) -> Result<Object> {
        let left = self.eval_expression(left)?;
        let index = self.eval_expression(index)?;
        match (left, index) {
            (Object::Array(elements), Object::Integer(index)) => Ok(usize::try_from(index)
                .ok()
                .and_then(|index| elements.get(index).cloned())
                .unwrap_or(NULL)),
            (Object::String(value), Object::Integer(index)) => Ok(usize::try_from(index)
                .ok()
                .and_then(|index| value.chars().nth(index))
                .map(|char| Object::String(char.to_string()))
                .unwrap_or(NULL)),
            (Object::Hash(pairs), index) => {
                if !index.hashable() {
                    return Err(RuntimeError::NotHashable(index.kind()).into());
                }
                Ok(pairs.get(&index).cloned().unwrap_or(NULL))
            }
            (left, _) => Err(RuntimeError::NotIndexable(left.kind()).into()),
        }
    }

    fn eval_call_expression(
        &mut self,
        function: Box<Expression>,
        arguments: Vec<Expression>,
    ) -> Result<Object> {
        let function = self.eval_expression(function)?;
        let args = arguments
            .into_iter()
            .map(|arg| self.eval_expression(Box::new(arg)))
            .collect::<Result<Vec<Object>>>()?;
        match function {
            Object::Function {
                parameters,
                body,
                env,
            } => {
                if parameters.len() != args.len() {
                    return Err(RuntimeError::WrongNumberOfArguments {
                        want: parameters.len(),
                        got: args.len(),
                    }
                    .into());
                }
                let mut call_env = Environment::new_enclosed(env);
                parameters.into_iter().zip(args).for_each(|(param, arg)| {
                    call_env.set(&param, arg);
                });
                let old_env = std::mem::replace(&mut self.env, Rc::new(RefCell::new(call_env)));
                let result = self.eval_statement(body);
                self.env = old_env;
                match result? {
                    Object::ReturnValue(value) => Ok(*value),
                    object => Ok(object),
                }
            }
            Object::BuiltInFunction(function) => Ok(function(args)?),
            other => Err(RuntimeError::NotCallable(other.kind()).into()),
        }
    }

    fn eval_prefix_expression(&mut self, operator: Token, right: Object) -> Result<Object> {
        match operator {
            Token::Bang => self.eval_bang_operator_expression(right),
            Token::Minus => self.eval_minus_prefix_operator_expression(right),
            token => Err(RuntimeError::UnknownPrefixOperator {
                operator: token.to_string(),
                operand: right.kind(),
            }
            .into()),
        }
    }

    fn eval_bang_operator_expression(&mut self, right: Object) -> Result<Object> {
        match right {
            Object::Boolean(true) => Ok(FALSE),
            Object::Boolean(false) => Ok(TRUE),
            Object::Null => Ok(TRUE),
            _ => Ok(FALSE),
        }
    }

    fn eval_minus_prefix_operator_expression(&mut self, right: Object) -> Result<Object> {
        match right {
            Object::Integer(value) => Ok(Object::Integer(value.wrapping_neg())),
            other => Err(RuntimeError::UnknownPrefixOperator {
                operator: Token::Minus.to_string(),
                operand: other.kind(),
            }
            .into()),
        }
    }

    fn eval_infix_expression(
        &mut self,
        left: Object,
        operator: Token,
        right: Object,
    ) -> Result<Object> {
        match (left, right) {
            (Object::Integer(left), Object::Integer(right)) => {
                self.eval_integer_infix_expression(left, operator, right)
            }
            (Object::Boolean(left), Object::Boolean(right)) => {
                self.eval_boolean_infix_expression(left, operator, right)
            }
            (Object::String(left), Object::String(right)) => {
                self.eval_string_infix_expression(left, operator, right)
            }
            (left, right) if left.kind() != right.kind() => Err(RuntimeError::TypeMismatch {
                operator: operator.to_string(),
                left: left.kind(),
                right: right.kind(),
            }
            .into()),
            (left, right) => Err(RuntimeError::UnknownInfixOperator {
                operator: operator.to_string(),
                left: left.kind(),
                right: right.kind(),
            }
            .into()),
        }
    }

    fn eval_integer_infix_expression(
        &mut self,
        left: i64,
        operator: Token,
        right: i64,
    ) -> Result<Object> {
        match operator {
            Token::Plus => Ok(Object::Integer(left.wrapping_add(right))),
            Token::Minus => Ok(Object::Integer(left.wrapping_sub(right))),
            Token::Asterisk => Ok(Object::Integer(left.wrapping_mul(right))),
            Token::Slash => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                Ok(Object::Integer(left.wrapping_div(right)))
            }
            Token::Lt => Ok(self.native_bool_to_boolean_object(left < right)),
            Token::Gt => Ok(self.native_bool_to_boolean_object(left > right)),
            Token::Eq => Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => Ok(self.native_bool_to_boolean_object(left != right)),
            token => Err(RuntimeError::UnknownInfixOperator {
                operator: token.to_string(),
                left: "INTEGER",
                right: "INTEGER",
            }
            .into()),
        }
    }

    fn eval_boolean_infix_expression(
        &mut self,
        left: bool,
        operator: Token,
        right: bool,
    ) -> Result<Object> {
        match operator {
            Token::Eq => Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => Ok(self.native_bool_to_boolean_object(left != right)),
            token => Err(RuntimeError::UnknownInfixOperator {
                operator: token.to_string(),
                left: "BOOLEAN",
                right: "BOOLEAN",
            }
            .into()),
        }
    }

    fn eval_string_infix_expression(
        &mut self,
        left: String,
        operator: Token,
        right: String,
    ) -> Result<Object> {
        match operator {
            Token::Plus => Ok(Object::String(format!("{}{}", left, right))),
            Token::Eq => Ok(self.native_bool_to_boolean_object(left == right)),
            Token::NotEq => Ok(self.native_bool_to_boolean_object(left != right)),
            token => Err(RuntimeError::UnknownInfixOperator {
                operator: token.to_string(),
                left: "STRING",
                right: "STRING",
            }
            .into()),
        }
    }

    fn native_bool_to_boolean_object(&mut self, input: bool) -> Object {
        if input {
            TRUE
        } else {
            FALSE
        }
    }

    fn eval_if_expression(
        &mut self,
        condition: Box<Expression>,
        consequence: Box<Statement>,
        alternative: Option<Box<Statement>>,
    ) -> Result<Object> {
        let condition = self.eval_expression(condition)?;
        if self.is_truthy(condition) {
            self.eval_statement(consequence)
        } else if let Some(alternative) = alternative {
            self.eval_statement(alternative)
        } else {
            Ok(NULL)
        }
    }

    fn is_truthy(&mut self, object: Object) -> bool {
        match object {
            Object::Null => false,
            Object::Boolean(value) => value,
            _ => true,
        }
    }

    fn eval_identifier_expression(&mut self, name: String) -> Result<Object> {
        match self.env.borrow().get(&name) {
            Some(value) => Ok(value),
            None => Err(anyhow!("identifier not found: {}", name)),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

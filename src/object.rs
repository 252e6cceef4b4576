use core::fmt;
use std::{
    cell::RefCell,
    collections::HashMap,
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::{
    ast::Statement, compiler::Instructions, error::RuntimeError, interpreter::Environment,
};

pub type BuiltInFunction = fn(Vec<Object>) -> Result<Object, RuntimeError>;

/// A function lowered to bytecode. Lives in the constant pool and is only
/// ever executed through a `Closure`.
#[derive(Debug, PartialEq, Clone)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function together with the values it captured from enclosing
/// scopes. The function body is shared, not copied, between clones.
#[derive(Debug, PartialEq, Clone)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Object {
    Integer(i64),
    String(String),
    Boolean(bool),
    Null,
    Array(Vec<Object>),
    Hash(HashMap<Object, Object>),
    ReturnValue(Box<Object>),
    Function {
        parameters: Vec<String>,
        body: Box<Statement>,
        env: Rc<RefCell<Environment>>,
    },
    BuiltInFunction(BuiltInFunction),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Closure),
}

impl Object {
    pub fn hashable(&self) -> bool {
        matches!(
            self,
            Object::Integer(_) | Object::Boolean(_) | Object::String(_)
        )
    }

    /// Type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::String(_) => "STRING",
            Object::Boolean(_) => "BOOLEAN",
            Object::Null => "NULL",
            Object::Array(_) => "ARRAY",
            Object::Hash(_) => "HASH",
            Object::ReturnValue(_) => "RETURN_VALUE",
            Object::Function { .. } => "FUNCTION",
            Object::BuiltInFunction(_) => "BUILTIN",
            Object::CompiledFunction(_) => "COMPILED_FUNCTION",
            Object::Closure(_) => "CLOSURE",
        }
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Object::Integer(value) => value.hash(state),
            Object::String(value) => value.hash(state),
            Object::Boolean(value) => value.hash(state),
            // guarded by hashable() at every insertion site
            _ => panic!("cannot hash object {:?}", self),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{}", value),
            Object::String(value) => write!(f, "{}", value),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Null => write!(f, "null"),
            Object::Array(values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", values.join(", "))
            }
            Object::Hash(hash) => {
                let pairs = hash
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "{{{}}}", pairs)
            }
            Object::ReturnValue(value) => write!(f, "return {}", value),
            Object::Function {
                parameters,
                body,
                env: _,
            } => write!(f, "fn({}) {{ {} }}", parameters.join(", "), body),
            Object::BuiltInFunction(_) => write!(f, "builtin function"),
            Object::CompiledFunction(function) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(function))
            }
            Object::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(&closure.function)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashable() {
        let cases = vec![
            (Object::Integer(1), true),
            (Object::Boolean(true), true),
            (Object::String("monkey".to_string()), true),
            (Object::Null, false),
            (Object::Array(vec![]), false),
            (Object::Hash(HashMap::new()), false),
        ];

        for (object, expected) in cases {
            assert_eq!(object.hashable(), expected, "wrong answer for {:?}", object);
        }
    }

    #[test]
    fn test_string_hash_key_equality() {
        let mut hash = HashMap::new();
        hash.insert(Object::String("name".to_string()), Object::Integer(1));

        assert_eq!(
            hash.get(&Object::String("name".to_string())),
            Some(&Object::Integer(1))
        );
    }

    #[test]
    fn test_display() {
        let cases = vec![
            (Object::Integer(-7), "-7"),
            (Object::String("monkey".to_string()), "monkey"),
            (Object::Boolean(false), "false"),
            (Object::Null, "null"),
            (
                Object::Array(vec![Object::Integer(1), Object::Integer(2)]),
                "[1, 2]",
            ),
        ];

        for (object, expected) in cases {
            assert_eq!(object.to_string(), expected);
        }
    }
}

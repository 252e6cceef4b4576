use crate::{
    error::RuntimeError,
    object::{BuiltInFunction, Object},
};

pub struct Builtins;

impl Builtins {
    /// The ordered registry. The order is part of the bytecode contract:
    /// the compiler pre-defines these names at their positions here and the
    /// GetBuiltIn opcode addresses them by index.
    pub fn get() -> [(&'static str, BuiltInFunction); 6] {
        [
            ("len", Self::len_fn),
            ("first", Self::first_fn),
            ("last", Self::last_fn),
            ("rest", Self::rest_fn),
            ("push", Self::push_fn),
            ("print", Self::print_fn),
        ]
    }

    fn len_fn(args: Vec<Object>) -> Result<Object, RuntimeError> {
        Self::check_arity(&args, 1)?;

        match &args[0] {
            Object::String(value) => Ok(Object::Integer(value.len() as i64)),
            Object::Array(elements) => Ok(Object::Integer(elements.len() as i64)),
            other => Err(RuntimeError::UnsupportedArgument {
                builtin: "len",
                kind: other.kind(),
            }),
        }
    }

    fn first_fn(args: Vec<Object>) -> Result<Object, RuntimeError> {
        Self::check_arity(&args, 1)?;

        match &args[0] {
            Object::Array(elements) => Ok(elements.first().cloned().unwrap_or(Object::Null)),
            Object::String(value) => Ok(value
                .chars()
                .next()
                .map(|char| Object::String(char.to_string()))
                .unwrap_or(Object::Null)),
            other => Err(RuntimeError::UnsupportedArgument {
                builtin: "first",
                kind: other.kind(),
            }),
        }
    }

    fn last_fn(args: Vec<Object>) -> Result<Object, RuntimeError> {
        Self::check_arity(&args, 1)?;

        match &args[0] {
            Object::Array(elements) => Ok(elements.last().cloned().unwrap_or(Object::Null)),
            Object::String(value) => Ok(value
                .chars()
                .last()
                .map(|char| Object::String(char.to_string()))
                .unwrap_or(Object::Null)),
            other => Err(RuntimeError::UnsupportedArgument {
                builtin: "last",
                kind: other.kind(),
            }),
        }
    }

    fn rest_fn(args: Vec<Object>) -> Result<Object, RuntimeError> {
        Self::check_arity(&args, 1)?;

        match &args[0] {
            Object::Array(elements) => {
                if elements.is_empty() {
                    return Ok(Object::Null);
                }
                Ok(Object::Array(elements[1..].to_vec()))
            }
            Object::String(value) => {
                if value.is_empty() {
                    return Ok(Object::Null);
                }
                Ok(Object::String(value.chars().skip(1).collect()))
            }
            other => Err(RuntimeError::UnsupportedArgument {
                builtin: "rest",
                kind: other.kind(),
            }),
        }
    }

    fn push_fn(args: Vec<Object>) -> Result<Object, RuntimeError> {
        Self::check_arity(&args, 2)?;

        match (&args[0], &args[1]) {
            (Object::Array(elements), value) => {
                let mut elements = elements.clone();
                elements.push(value.clone());
                Ok(Object::Array(elements))
            }
            (other, _) => Err(RuntimeError::UnsupportedArgument {
                builtin: "push",
                kind: other.kind(),
            }),
        }
    }

    fn print_fn(args: Vec<Object>) -> Result<Object, RuntimeError> {
        for arg in args {
            println!("{}", arg);
        }
        Ok(Object::Null)
    }

    fn check_arity(args: &[Object], want: usize) -> Result<(), RuntimeError> {
        if args.len() != want {
            return Err(RuntimeError::WrongNumberOfArguments {
                want,
                got: args.len(),
            });
        }
        Ok(())
    }
}

use thiserror::Error;

/// Errors raised while lowering an AST into bytecode. Each one aborts the
/// compile; there is no recovery or resynchronization.
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("unresolved identifier: {0}")]
    UnresolvedIdentifier(String),

    #[error("unknown {context} operator: {operator}")]
    UnknownOperator {
        operator: String,
        context: &'static str,
    },

    #[error("unsupported node: {0}")]
    UnsupportedNode(String),

    #[error("wrong number of operands for {opcode}: want={want}, got={got}")]
    WrongNumberOfOperands {
        opcode: &'static str,
        want: usize,
        got: usize,
    },

    #[error("operand {0} does not fit its declared width")]
    OperandOutOfRange(usize),

    #[error("unsupported operand width: {0}")]
    UnsupportedOperandWidth(usize),
}

/// Errors raised while the virtual machine executes bytecode, and by the
/// builtin functions shared with the tree-walking evaluator. Execution stops
/// at the first error.
#[derive(Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("frame overflow")]
    FrameOverflow,

    #[error("no active frame")]
    MissingFrame,

    #[error("type mismatch: {left} {operator} {right}")]
    TypeMismatch {
        operator: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown operator: {left} {operator} {right}")]
    UnknownInfixOperator {
        operator: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown operator: {operator}{operand}")]
    UnknownPrefixOperator {
        operator: String,
        operand: &'static str,
    },

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongNumberOfArguments { want: usize, got: usize },

    #[error("argument to `{builtin}` not supported, got {kind}")]
    UnsupportedArgument {
        builtin: &'static str,
        kind: &'static str,
    },

    #[error("calling non-function: {0}")]
    NotCallable(&'static str),

    #[error("unusable as hash key: {0}")]
    NotHashable(&'static str),

    #[error("index operator not supported: {0}")]
    NotIndexable(&'static str),

    #[error("undefined opcode: {0}")]
    OpcodeUndefined(u8),

    #[error("truncated instruction stream")]
    TruncatedInstructions,

    #[error("division by zero")]
    DivisionByZero,
}

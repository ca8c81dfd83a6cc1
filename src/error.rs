use crate::reflect::ValueType;
use thiserror::Error;

/// Misuse of an invocation unit by its caller. These are never coerced away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("passed {actual} argument(s), expected {expected}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("argument {index} is of the wrong type: got {actual}, expected {expected}")]
    ArgumentType { index: usize, expected: ValueType, actual: ValueType },
    #[error("method '{method}' returned {actual}, expected {expected}")]
    ReturnType { method: String, expected: ValueType, actual: ValueType },
}

/// Reasons a listener could not be bound to, or registered on, a func.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("listener has no target entity")]
    MissingTarget,
    #[error("target entity {0} has been destroyed")]
    DeadTarget(crate::host::EntityHandle),
    #[error("anonymous closures cannot be persisted, bind a named method instead")]
    Anonymous,
    #[error("static method '{0}' cannot be registered as a persistent listener")]
    StaticMethod(String),
    #[error("method '{method}' not found on '{type_name}'")]
    MethodNotFound { type_name: String, method: String },
    #[error("method '{method}' takes {actual} parameter(s), expected {expected}")]
    Arity { method: String, expected: usize, actual: usize },
    #[error("method '{method}' parameter {index} is {declared}, cannot bind {requested}")]
    Parameter { method: String, index: usize, declared: ValueType, requested: ValueType },
    #[error("method '{method}' returns {declared}, expected {expected}")]
    ReturnType { method: String, declared: ValueType, expected: ValueType },
    #[error("persistent listener index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },
}

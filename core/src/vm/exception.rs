use std::fmt;

pub const DIVIDE_BY_ZERO_EXCEPTION: &str = "NumberException.DivideByZero";
pub const NUMBER_INVALID_EXCEPTION: &str = "NumberException.Invalid";
pub const ARRAY_INDEX_EXCEPTION: &str = "ArrayIndexException";
pub const DICTIONARY_INDEX_EXCEPTION: &str = "DictionaryIndexException";
pub const DYNAMIC_CONVERSION_EXCEPTION: &str = "DynamicConversionException";
pub const OBJECT_SUBSCRIPT_EXCEPTION: &str = "ObjectSubscriptException";
pub const STACK_OVERFLOW_EXCEPTION: &str = "StackOverflowException";
pub const INVALID_FUNCTION_EXCEPTION: &str = "InvalidFunctionException";
pub const INVALID_VALUE_EXCEPTION: &str = "InvalidValueException";
pub const PANIC_EXCEPTION: &str = "PANIC";

/// Language-level exception raised by an opcode or builtin.
///
/// Travels inside `anyhow::Error`; the dispatch loop downcasts it and runs
/// the handler search. Any other error is fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeonException {
    pub name: String,
    pub info: String,
}

impl NeonException {
    pub fn new(name: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: info.into(),
        }
    }
}

impl fmt::Display for NeonException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.info)
    }
}

impl std::error::Error for NeonException {}

/// True when a handler registered for `handler` catches `raised`: equal
/// names, or `handler` is a dot-separated ancestor of `raised`.
pub fn handler_matches(handler: &str, raised: &str) -> bool {
    match raised.strip_prefix(handler) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

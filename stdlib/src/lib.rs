pub mod array;
pub mod bytes;
pub mod dictionary;
pub mod io;
pub mod math;
pub mod object;
pub mod string;
pub mod sys;

mod range;


use anyhow::Result;
use neonx_core::{module::BuiltinRegistry, vm::NeonException};

pub const BYTES_INDEX_EXCEPTION: &str = "BytesIndexException";
pub const BYTE_OUT_OF_RANGE_EXCEPTION: &str = "ByteOutOfRangeException";
pub const STRING_INDEX_EXCEPTION: &str = "StringIndexException";
pub const VALUE_RANGE_EXCEPTION: &str = "ValueRangeException";

/// Register every builtin module with the given registry
pub fn register_builtins(registry: &mut BuiltinRegistry) -> Result<()> {
    registry.register_module(&array::ArrayModule::new())?;
    registry.register_module(&bytes::BytesModule::new())?;
    registry.register_module(&dictionary::DictionaryModule::new())?;
    registry.register_module(&io::IoModule::new())?;
    registry.register_module(&math::MathModule::new())?;
    registry.register_module(&object::ObjectModule::new())?;
    registry.register_module(&string::StringModule::new())?;
    registry.register_module(&sys::SysModule::new())?;
    Ok(())
}

/// Registry preloaded with the full builtin set.
pub fn default_registry() -> Result<BuiltinRegistry> {
    let mut registry = BuiltinRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

/// Fails the current builtin with a language exception; the engine raises it
/// at the `CALLP` site.
pub(crate) fn raise<T>(name: &str, info: impl Into<String>) -> Result<T> {
    Err(NeonException::new(name, info).into())
}

pub mod module;
pub mod util;
pub mod val;
pub mod vm;

pub use module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
pub use vm::{RunOutcome, Vm, VmContext, VmOptions, decode_module};

//! Bytecode executor
//!
//! Loader, instruction set, the stack machine that runs a loaded module, and
//! the tooling around it (disassembler, assembler).

mod asm;
mod bytecode;
mod context;
mod disasm;
mod exception;
mod opcode;
#[allow(clippy::module_inception)]
mod vm;

pub use asm::*;
pub use bytecode::*;
pub use context::*;
pub use disasm::*;
pub use exception::*;
pub use opcode::*;
pub use vm::{RunOutcome, Vm, VmStats};

#[cfg(test)]
mod vm_test;

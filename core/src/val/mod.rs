//! Runtime values
//!
//! Decimal numbers, the tagged storage cell the interpreter operates on, and
//! the dynamic object model used for duck-typed interop.

mod cell;
mod number;
mod object;

pub use cell::*;
pub use number::*;
pub use object::*;

#[cfg(test)]
mod val_test;

use std::io::Write;

pub(super) use crate::{
    module::BuiltinRegistry,
    val::{Cell, Number, make_string},
    vm::{CaptureBuffer, NeonException, RunOutcome, Vm, VmContext, VmOptions, assemble},
};

pub(super) use anyhow::Result;

fn test_depth(vm: &mut Vm) -> Result<()> {
    let depth = vm.call_depth();
    vm.push(Number::from(depth));
    Ok(())
}

fn test_object(vm: &mut Vm) -> Result<()> {
    let s = vm.pop_string()?;
    vm.push(make_string(s));
    Ok(())
}

fn test_fail(vm: &mut Vm) -> Result<()> {
    let info = vm.pop_string()?;
    Err(NeonException::new("Test.Failure", info).into())
}

fn test_print(vm: &mut Vm) -> Result<()> {
    let s = vm.pop_string()?;
    writeln!(vm.stdout(), "{}", s)?;
    Ok(())
}

pub(super) fn test_registry() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::new();
    registry.register_builtin("test$depth", test_depth);
    registry.register_builtin("test$object", test_object);
    registry.register_builtin("test$fail", test_fail);
    registry.register_builtin("print", test_print);
    registry
}

pub(super) fn vm_for(src: &str, options: VmOptions) -> Vm {
    let module = assemble(src).unwrap();
    Vm::new(module, test_registry(), VmContext::new().with_options(options))
}

/// Runs `src` to completion and returns the engine for inspection.
pub(super) fn run(src: &str) -> Vm {
    let mut vm = vm_for(src, VmOptions::default());
    assert_eq!(vm.run().unwrap(), RunOutcome::Completed);
    vm
}

pub(super) fn outcome(src: &str) -> Result<RunOutcome> {
    vm_for(src, VmOptions::default()).run()
}

pub(super) fn global(vm: &Vm, index: usize) -> Cell {
    vm.global(index).unwrap().borrow().clone()
}

pub(super) fn num(s: &str) -> Number {
    s.parse().unwrap()
}

/// Elements of the array stored in global `index`.
pub(super) fn global_array(vm: &Vm, index: usize) -> Vec<Cell> {
    Cell::array_values(&global(vm, index).into_array().unwrap())
}

mod control_flow;
mod exceptions;
mod functions;
mod host_errors;
mod semantics;

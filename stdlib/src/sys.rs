use std::collections::HashMap;

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::vm::{INVALID_VALUE_EXCEPTION, Vm};
use tracing::debug;

use crate::raise;

/// Reported by `runtime$executorName`.
pub const EXECUTOR_NAME: &str = "neonx";

/// Process and engine control: `sys$exit` and the `runtime$` queries.
#[derive(Debug)]
pub struct SysModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for SysModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SysModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("sys$exit".to_string(), Self::exit);
        functions.insert("runtime$assertionsEnabled".to_string(), Self::assertions_enabled);
        functions.insert("runtime$executorName".to_string(), Self::executor_name);
        functions.insert("runtime$setRecursionLimit".to_string(), Self::set_recursion_limit);

        Self { functions }
    }

    /// 请求退出；引擎在当前指令后停止，由调用方处理退出码
    fn exit(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        match n.to_index() {
            Some(code) if code <= 255 => {
                debug!(target: "neonx::vm", code, "sys.exit requested");
                vm.request_exit(code as i32);
                Ok(())
            }
            _ => raise(INVALID_VALUE_EXCEPTION, format!("sys.exit invalid parameter: {}", n)),
        }
    }

    fn assertions_enabled(vm: &mut Vm) -> Result<()> {
        let enabled = vm.options().assertions_enabled;
        vm.push(enabled);
        Ok(())
    }

    fn executor_name(vm: &mut Vm) -> Result<()> {
        vm.push(EXECUTOR_NAME);
        Ok(())
    }

    fn set_recursion_limit(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        match n.to_index() {
            Some(limit) if limit > 0 => {
                vm.set_recursion_limit(limit);
                Ok(())
            }
            _ => raise(INVALID_VALUE_EXCEPTION, format!("recursion limit must be positive: {}", n)),
        }
    }
}

impl BuiltinModule for SysModule {
    fn name(&self) -> &str {
        "sys"
    }

    fn description(&self) -> &str {
        "Process exit and runtime introspection"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

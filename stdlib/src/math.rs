use std::collections::HashMap;

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::Number;
use neonx_core::vm::Vm;

use crate::{VALUE_RANGE_EXCEPTION, raise};

/// Number and boolean conversions plus the exact-decimal subset of `math`.
#[derive(Debug)]
pub struct MathModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for MathModule {
    fn default() -> Self {
        Self::new()
    }
}

impl MathModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("number__toString".to_string(), Self::number_to_string);
        functions.insert("boolean__toString".to_string(), Self::boolean_to_string);
        functions.insert("odd".to_string(), Self::odd);
        functions.insert("math$odd".to_string(), Self::odd);
        functions.insert("math$abs".to_string(), Self::abs);
        functions.insert("math$ceil".to_string(), Self::ceil);
        functions.insert("math$floor".to_string(), Self::floor);
        functions.insert("math$sign".to_string(), Self::sign);
        functions.insert("math$trunc".to_string(), Self::trunc);

        Self { functions }
    }

    pub(crate) fn number_to_string(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(n.to_string());
        Ok(())
    }

    pub(crate) fn boolean_to_string(vm: &mut Vm) -> Result<()> {
        let b = vm.pop_boolean()?;
        vm.push(if b { "TRUE" } else { "FALSE" });
        Ok(())
    }

    fn odd(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        if !n.is_integer() {
            return raise(VALUE_RANGE_EXCEPTION, "odd() requires integer");
        }
        // rem cannot fail with a non-zero divisor
        let odd = n.rem(&Number::from(2i64)).is_ok_and(|r| !r.is_zero());
        vm.push(odd);
        Ok(())
    }

    fn abs(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(n.abs());
        Ok(())
    }

    fn ceil(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(n.ceil());
        Ok(())
    }

    fn floor(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(n.floor());
        Ok(())
    }

    /// -1, 0 or 1.
    fn sign(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(n.signum());
        Ok(())
    }

    fn trunc(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(n.trunc());
        Ok(())
    }
}

impl BuiltinModule for MathModule {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Number formatting and rounding"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

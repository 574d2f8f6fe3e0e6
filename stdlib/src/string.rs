use std::collections::HashMap;

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::{Cell, CellKind, Number};
use neonx_core::vm::Vm;

use crate::math::MathModule;
use crate::range::{self, pop_bounds};
use crate::{STRING_INDEX_EXCEPTION, VALUE_RANGE_EXCEPTION, raise};

/// String builtins. Lengths and indices count Unicode scalar values.
#[derive(Debug)]
pub struct StringModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for StringModule {
    fn default() -> Self {
        Self::new()
    }
}

impl StringModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("string__append".to_string(), Self::append);
        functions.insert("string__concat".to_string(), Self::concat);
        functions.insert("string__index".to_string(), Self::index);
        functions.insert("string__length".to_string(), Self::length);
        functions.insert("string__substring".to_string(), Self::substring);
        functions.insert("string__toBytes".to_string(), Self::to_bytes);
        functions.insert("chr".to_string(), Self::chr);
        functions.insert("ord".to_string(), Self::ord);
        functions.insert("concat".to_string(), Self::concat);
        // str/strb are the pre-method spellings of the conversions
        functions.insert("str".to_string(), MathModule::number_to_string);
        functions.insert("strb".to_string(), MathModule::boolean_to_string);

        Self { functions }
    }

    fn append(vm: &mut Vm) -> Result<()> {
        let suffix = vm.pop_string()?;
        let target = vm.pop_address()?;
        let mut cell = target.borrow_mut();
        cell.ensure_kind(CellKind::String)?;
        if let Cell::String(s) = &mut *cell {
            s.push_str(&suffix);
        }
        Ok(())
    }

    fn concat(vm: &mut Vm) -> Result<()> {
        let b = vm.pop_string()?;
        let mut a = vm.pop_string()?;
        a.push_str(&b);
        vm.push(a);
        Ok(())
    }

    fn index(vm: &mut Vm) -> Result<()> {
        let index = vm.pop_number()?;
        let s = vm.pop_string()?;
        match index.to_index().and_then(|i| s.chars().nth(i)) {
            Some(c) => {
                vm.push(c.to_string());
                Ok(())
            }
            None => raise(STRING_INDEX_EXCEPTION, index.to_string()),
        }
    }

    fn length(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        vm.push(s.chars().count());
        Ok(())
    }

    fn substring(vm: &mut Vm) -> Result<()> {
        let (first, last) = pop_bounds(vm, STRING_INDEX_EXCEPTION)?;
        let chars: Vec<char> = vm.pop_string()?.chars().collect();
        let span = range::clamp_range(chars.len(), first, last);
        vm.push(chars[span].iter().collect::<String>());
        Ok(())
    }

    fn to_bytes(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        vm.push(s.into_bytes());
        Ok(())
    }

    fn chr(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        match n.to_u32().and_then(char::from_u32) {
            Some(c) => {
                vm.push(c.to_string());
                Ok(())
            }
            None => raise(VALUE_RANGE_EXCEPTION, format!("chr() argument not a valid code point: {}", n)),
        }
    }

    fn ord(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                vm.push(Number::from(c as u32));
                Ok(())
            }
            _ => raise(STRING_INDEX_EXCEPTION, "ord() requires string of length 1"),
        }
    }
}

impl BuiltinModule for StringModule {
    fn name(&self) -> &str {
        "string"
    }

    fn description(&self) -> &str {
        "String methods and character conversions"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

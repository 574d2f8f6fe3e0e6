use std::collections::HashMap;

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::{Cell, CellKind, literal_or_null, quote_string};
use neonx_core::vm::Vm;

/// Dictionary builtins. Keys always come out sorted.
#[derive(Debug)]
pub struct DictionaryModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for DictionaryModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("dictionary__keys".to_string(), Self::keys);
        functions.insert("dictionary__remove".to_string(), Self::remove);
        functions.insert("dictionary__size".to_string(), Self::size);
        functions.insert("dictionary__toString__object".to_string(), Self::object_dictionary_to_string);
        functions.insert("dictionary__toString__string".to_string(), Self::string_dictionary_to_string);

        Self { functions }
    }

    fn keys(vm: &mut Vm) -> Result<()> {
        let dict = vm.pop_dictionary()?;
        let keys = dict.borrow().keys().map(|k| Cell::from(k.as_str())).collect();
        vm.push(Cell::new_array(keys));
        Ok(())
    }

    /// Removing a missing key is not an error.
    fn remove(vm: &mut Vm) -> Result<()> {
        let key = vm.pop_string()?;
        let target = vm.pop_address()?;
        let dict = {
            let mut cell = target.borrow_mut();
            cell.ensure_kind(CellKind::Dictionary)?;
            cell.clone().into_dictionary()?
        };
        dict.borrow_mut().remove(&key);
        Ok(())
    }

    fn size(vm: &mut Vm) -> Result<()> {
        let dict = vm.pop_dictionary()?;
        let len = dict.borrow().len();
        vm.push(len);
        Ok(())
    }

    fn object_dictionary_to_string(vm: &mut Vm) -> Result<()> {
        let dict = vm.pop_dictionary()?;
        let mut parts = Vec::with_capacity(dict.borrow().len());
        for (k, v) in dict.borrow().iter() {
            let value = v.borrow().clone().into_object()?;
            parts.push(format!("{}: {}", quote_string(k), literal_or_null(&value)));
        }
        vm.push(format!("{{{}}}", parts.join(", ")));
        Ok(())
    }

    fn string_dictionary_to_string(vm: &mut Vm) -> Result<()> {
        let dict = vm.pop_dictionary()?;
        let mut parts = Vec::with_capacity(dict.borrow().len());
        for (k, v) in dict.borrow().iter() {
            let value = v.borrow().clone().into_string()?;
            parts.push(format!("{}: {}", quote_string(k), quote_string(&value)));
        }
        vm.push(format!("{{{}}}", parts.join(", ")));
        Ok(())
    }
}

impl BuiltinModule for DictionaryModule {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

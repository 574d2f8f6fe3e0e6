use std::collections::HashMap;

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::{Cell, hex_bytes};
use neonx_core::vm::Vm;

use crate::BYTES_INDEX_EXCEPTION;
use crate::range::{self, pop_bounds};

#[derive(Debug)]
pub struct BytesModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for BytesModule {
    fn default() -> Self {
        Self::new()
    }
}

impl BytesModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("bytes__decodeToString".to_string(), Self::decode_to_string);
        functions.insert("bytes__range".to_string(), Self::range);
        functions.insert("bytes__size".to_string(), Self::size);
        functions.insert("bytes__splice".to_string(), Self::splice);
        functions.insert("bytes__toArray".to_string(), Self::to_array);
        functions.insert("bytes__toString".to_string(), Self::to_string);

        Self { functions }
    }

    /// Invalid UTF-8 sequences decode to U+FFFD.
    fn decode_to_string(vm: &mut Vm) -> Result<()> {
        let bytes = vm.pop_bytes()?;
        vm.push(String::from_utf8_lossy(&bytes).into_owned());
        Ok(())
    }

    fn range(vm: &mut Vm) -> Result<()> {
        let (first, last) = pop_bounds(vm, BYTES_INDEX_EXCEPTION)?;
        let bytes = vm.pop_bytes()?;
        let span = range::clamp_range(bytes.len(), first, last);
        vm.push(bytes[span].to_vec());
        Ok(())
    }

    fn size(vm: &mut Vm) -> Result<()> {
        let bytes = vm.pop_bytes()?;
        vm.push(bytes.len());
        Ok(())
    }

    fn splice(vm: &mut Vm) -> Result<()> {
        let (first, last) = pop_bounds(vm, BYTES_INDEX_EXCEPTION)?;
        let bytes = vm.pop_bytes()?;
        let replacement = vm.pop_bytes()?;
        vm.push(range::splice(&bytes, &replacement, first, last));
        Ok(())
    }

    fn to_array(vm: &mut Vm) -> Result<()> {
        let bytes = vm.pop_bytes()?;
        vm.push(Cell::new_array(bytes.into_iter().map(|b| Cell::from(b as usize)).collect()));
        Ok(())
    }

    fn to_string(vm: &mut Vm) -> Result<()> {
        let bytes = vm.pop_bytes()?;
        vm.push(hex_bytes(&bytes));
        Ok(())
    }
}

impl BuiltinModule for BytesModule {
    fn name(&self) -> &str {
        "bytes"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

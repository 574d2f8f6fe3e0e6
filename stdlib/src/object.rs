//! `object__*` builtins: the bridge between typed cells and dynamic objects.
//!
//! Conversions that the concrete object cannot answer raise
//! `DynamicConversionException` with the target type as info (`"to Number"`).

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::{
    Cell, ObjectRef, make_array, make_boolean, make_bytes, make_dictionary, make_number, make_string,
};
use neonx_core::vm::{DYNAMIC_CONVERSION_EXCEPTION, Vm};

use crate::raise;

#[derive(Debug)]
pub struct ObjectModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for ObjectModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("object__getArray".to_string(), Self::get_array);
        functions.insert("object__getBoolean".to_string(), Self::get_boolean);
        functions.insert("object__getBytes".to_string(), Self::get_bytes);
        functions.insert("object__getDictionary".to_string(), Self::get_dictionary);
        functions.insert("object__getNumber".to_string(), Self::get_number);
        functions.insert("object__getString".to_string(), Self::get_string);
        functions.insert("object__isNull".to_string(), Self::is_null);
        functions.insert("object__makeArray".to_string(), Self::make_array);
        functions.insert("object__makeBoolean".to_string(), Self::make_boolean);
        functions.insert("object__makeBytes".to_string(), Self::make_bytes);
        functions.insert("object__makeDictionary".to_string(), Self::make_dictionary);
        functions.insert("object__makeNull".to_string(), Self::make_null);
        functions.insert("object__makeNumber".to_string(), Self::make_number);
        functions.insert("object__makeString".to_string(), Self::make_string);
        functions.insert("object__subscript".to_string(), Self::subscript);
        functions.insert("object__invokeMethod".to_string(), Self::invoke_method);
        functions.insert("object__setProperty".to_string(), Self::set_property);
        functions.insert("object__toString".to_string(), Self::to_string);

        Self { functions }
    }

    fn get_array(vm: &mut Vm) -> Result<()> {
        let items = match vm.pop_object()?.and_then(|o| o.get_array()) {
            Some(items) => items,
            None => return raise(DYNAMIC_CONVERSION_EXCEPTION, "to Array"),
        };
        vm.push(Cell::new_array(items.into_iter().map(Cell::from).collect()));
        Ok(())
    }

    fn get_boolean(vm: &mut Vm) -> Result<()> {
        match vm.pop_object()?.and_then(|o| o.get_boolean()) {
            Some(b) => {
                vm.push(b);
                Ok(())
            }
            None => raise(DYNAMIC_CONVERSION_EXCEPTION, "to Boolean"),
        }
    }

    fn get_bytes(vm: &mut Vm) -> Result<()> {
        match vm.pop_object()?.and_then(|o| o.get_bytes()) {
            Some(b) => {
                vm.push(b);
                Ok(())
            }
            None => raise(DYNAMIC_CONVERSION_EXCEPTION, "to Bytes"),
        }
    }

    fn get_dictionary(vm: &mut Vm) -> Result<()> {
        let entries = match vm.pop_object()?.and_then(|o| o.get_dictionary()) {
            Some(entries) => entries,
            None => return raise(DYNAMIC_CONVERSION_EXCEPTION, "to Dictionary"),
        };
        let cells: BTreeMap<String, Cell> = entries.into_iter().map(|(k, v)| (k, Cell::from(v))).collect();
        vm.push(Cell::new_dictionary(cells));
        Ok(())
    }

    fn get_number(vm: &mut Vm) -> Result<()> {
        match vm.pop_object()?.and_then(|o| o.get_number()) {
            Some(n) => {
                vm.push(n);
                Ok(())
            }
            None => raise(DYNAMIC_CONVERSION_EXCEPTION, "to Number"),
        }
    }

    fn get_string(vm: &mut Vm) -> Result<()> {
        match vm.pop_object()?.and_then(|o| o.get_string()) {
            Some(s) => {
                vm.push(s);
                Ok(())
            }
            None => raise(DYNAMIC_CONVERSION_EXCEPTION, "to String"),
        }
    }

    fn is_null(vm: &mut Vm) -> Result<()> {
        let object = vm.pop_object()?;
        vm.push(object.is_none());
        Ok(())
    }

    fn make_array(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let items = Cell::array_values(&array)
            .into_iter()
            .map(Cell::into_object)
            .collect::<Result<Vec<_>>>()?;
        vm.push(make_array(items));
        Ok(())
    }

    fn make_boolean(vm: &mut Vm) -> Result<()> {
        let b = vm.pop_boolean()?;
        vm.push(make_boolean(b));
        Ok(())
    }

    fn make_bytes(vm: &mut Vm) -> Result<()> {
        let b = vm.pop_bytes()?;
        vm.push(make_bytes(b));
        Ok(())
    }

    fn make_dictionary(vm: &mut Vm) -> Result<()> {
        let dict = vm.pop_dictionary()?;
        let mut entries = BTreeMap::new();
        for (k, v) in dict.borrow().iter() {
            entries.insert(k.clone(), v.borrow().clone().into_object()?);
        }
        vm.push(make_dictionary(entries));
        Ok(())
    }

    fn make_null(vm: &mut Vm) -> Result<()> {
        vm.push(Cell::Object(None));
        Ok(())
    }

    fn make_number(vm: &mut Vm) -> Result<()> {
        let n = vm.pop_number()?;
        vm.push(make_number(n));
        Ok(())
    }

    fn make_string(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        vm.push(make_string(s));
        Ok(())
    }

    fn subscript(vm: &mut Vm) -> Result<()> {
        let index = vm.pop_object()?;
        let object = vm.pop_object()?;
        let (object, index) = non_null(object, index)?;
        let value = object.subscript(&index)?;
        vm.push(value);
        Ok(())
    }

    /// Stack: object, method name, argument array.
    fn invoke_method(vm: &mut Vm) -> Result<()> {
        let args = vm.pop_array()?;
        let name = vm.pop_string()?;
        let Some(object) = vm.pop_object()? else {
            return raise(DYNAMIC_CONVERSION_EXCEPTION, "object does not support method calls");
        };
        let args = Cell::array_values(&args)
            .into_iter()
            .map(Cell::into_object)
            .collect::<Result<Vec<_>>>()?;
        let result = object.invoke_method(&name, &args)?;
        vm.push(result);
        Ok(())
    }

    /// Stack: value, object, index.
    fn set_property(vm: &mut Vm) -> Result<()> {
        let index = vm.pop_object()?;
        let object = vm.pop_object()?;
        let value = vm.pop_object()?;
        let (object, index) = non_null(object, index)?;
        object.set_property(&index, value)
    }

    fn to_string(vm: &mut Vm) -> Result<()> {
        let object = vm.pop_object()?;
        let s = match object {
            Some(o) => o.to_string(),
            None => "null".to_string(),
        };
        vm.push(s);
        Ok(())
    }
}

fn non_null(object: Option<ObjectRef>, index: Option<ObjectRef>) -> Result<(ObjectRef, ObjectRef)> {
    match (object, index) {
        (None, _) => raise(DYNAMIC_CONVERSION_EXCEPTION, "object is null"),
        (_, None) => raise(DYNAMIC_CONVERSION_EXCEPTION, "index is null"),
        (Some(o), Some(i)) => Ok((o, i)),
    }
}

impl BuiltinModule for ObjectModule {
    fn name(&self) -> &str {
        "object"
    }

    fn description(&self) -> &str {
        "Dynamic object construction, conversion and access"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

use std::collections::HashMap;

use anyhow::Result;
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::{ArrayRef, Cell, CellKind, CellRef, literal_or_null, new_cell_ref, quote_string};
use neonx_core::vm::{ARRAY_INDEX_EXCEPTION, Vm};

use crate::range::{self, pop_bounds};
use crate::{BYTE_OUT_OF_RANGE_EXCEPTION, raise};

#[derive(Debug)]
pub struct ArrayModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for ArrayModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("array__append".to_string(), Self::append);
        functions.insert("array__concat".to_string(), Self::concat);
        functions.insert("array__extend".to_string(), Self::extend);
        functions.insert("array__find".to_string(), Self::find);
        functions.insert("array__remove".to_string(), Self::remove);
        functions.insert("array__resize".to_string(), Self::resize);
        functions.insert("array__reversed".to_string(), Self::reversed);
        functions.insert("array__size".to_string(), Self::size);
        functions.insert("array__slice".to_string(), Self::slice);
        functions.insert("array__splice".to_string(), Self::splice);
        functions.insert("array__toBytes__number".to_string(), Self::to_bytes);
        functions.insert("array__toString__number".to_string(), Self::number_array_to_string);
        functions.insert("array__toString__string".to_string(), Self::string_array_to_string);
        functions.insert("array__toString__object".to_string(), Self::object_array_to_string);

        Self { functions }
    }

    /// 通过地址追加元素，别名可见
    fn append(vm: &mut Vm) -> Result<()> {
        let element = vm.pop()?;
        let target = vm.pop_address()?;
        let array = target_array(&target)?;
        array.borrow_mut().push(new_cell_ref(element));
        Ok(())
    }

    fn concat(vm: &mut Vm) -> Result<()> {
        let b = vm.pop_array()?;
        let a = vm.pop_array()?;
        let mut items = Cell::array_values(&a);
        items.extend(Cell::array_values(&b));
        vm.push(Cell::new_array(items));
        Ok(())
    }

    fn extend(vm: &mut Vm) -> Result<()> {
        // Snapshot first: extending an array with itself is allowed.
        let extra = Cell::array_values(&vm.pop_array()?);
        let target = vm.pop_address()?;
        let array = target_array(&target)?;
        array.borrow_mut().extend(extra.into_iter().map(new_cell_ref));
        Ok(())
    }

    fn find(vm: &mut Vm) -> Result<()> {
        let needle = vm.pop()?;
        let array = vm.pop_array()?;
        let position = array.borrow().iter().position(|c| *c.borrow() == needle);
        match position {
            Some(i) => {
                vm.push(i);
                Ok(())
            }
            None => raise(ARRAY_INDEX_EXCEPTION, "value not found in array"),
        }
    }

    fn remove(vm: &mut Vm) -> Result<()> {
        let index = vm.pop_number()?;
        let target = vm.pop_address()?;
        let array = target_array(&target)?;
        let mut items = array.borrow_mut();
        match index.to_index() {
            Some(i) if i < items.len() => {
                items.remove(i);
                Ok(())
            }
            _ => raise(ARRAY_INDEX_EXCEPTION, index.to_string()),
        }
    }

    fn resize(vm: &mut Vm) -> Result<()> {
        let size = vm.pop_number()?;
        let target = vm.pop_address()?;
        let Some(size) = size.to_index() else {
            return raise(ARRAY_INDEX_EXCEPTION, size.to_string());
        };
        let array = target_array(&target)?;
        array.borrow_mut().resize_with(size, || new_cell_ref(Cell::Empty));
        Ok(())
    }

    fn reversed(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let mut items = Cell::array_values(&array);
        items.reverse();
        vm.push(Cell::new_array(items));
        Ok(())
    }

    fn size(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let len = array.borrow().len();
        vm.push(len);
        Ok(())
    }

    fn slice(vm: &mut Vm) -> Result<()> {
        let (first, last) = pop_bounds(vm, ARRAY_INDEX_EXCEPTION)?;
        let items = Cell::array_values(&vm.pop_array()?);
        let span = range::clamp_range(items.len(), first, last);
        vm.push(Cell::new_array(items[span].to_vec()));
        Ok(())
    }

    /// Stack: replacement, target, then the range bounds.
    fn splice(vm: &mut Vm) -> Result<()> {
        let (first, last) = pop_bounds(vm, ARRAY_INDEX_EXCEPTION)?;
        let items = Cell::array_values(&vm.pop_array()?);
        let replacement = Cell::array_values(&vm.pop_array()?);
        vm.push(Cell::new_array(range::splice(&items, &replacement, first, last)));
        Ok(())
    }

    fn to_bytes(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let mut bytes = Vec::with_capacity(array.borrow().len());
        for cell in Cell::array_values(&array) {
            let n = cell.into_number()?;
            match n.to_index() {
                Some(b) if b < 256 => bytes.push(b as u8),
                _ => return raise(BYTE_OUT_OF_RANGE_EXCEPTION, n.to_string()),
            }
        }
        vm.push(bytes);
        Ok(())
    }

    fn number_array_to_string(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let parts = Cell::array_values(&array)
            .into_iter()
            .map(|c| Ok(c.into_number()?.to_string()))
            .collect::<Result<Vec<_>>>()?;
        vm.push(format!("[{}]", parts.join(", ")));
        Ok(())
    }

    fn string_array_to_string(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let parts = Cell::array_values(&array)
            .into_iter()
            .map(|c| Ok(quote_string(&c.into_string()?)))
            .collect::<Result<Vec<_>>>()?;
        vm.push(format!("[{}]", parts.join(", ")));
        Ok(())
    }

    fn object_array_to_string(vm: &mut Vm) -> Result<()> {
        let array = vm.pop_array()?;
        let parts = Cell::array_values(&array)
            .into_iter()
            .map(|c| Ok(literal_or_null(&c.into_object()?)))
            .collect::<Result<Vec<_>>>()?;
        vm.push(format!("[{}]", parts.join(", ")));
        Ok(())
    }
}

/// Array held by an address target, fixing the tag of an empty cell.
fn target_array(target: &CellRef) -> Result<ArrayRef> {
    let mut cell = target.borrow_mut();
    cell.ensure_kind(CellKind::Array)?;
    cell.clone().into_array()
}

impl BuiltinModule for ArrayModule {
    fn name(&self) -> &str {
        "array"
    }

    fn description(&self) -> &str {
        "Array methods: append, slice, splice, conversions"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

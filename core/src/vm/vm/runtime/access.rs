use std::collections::BTreeMap;

use anyhow::{Result, anyhow, bail, ensure};

use crate::val::{Cell, CellKind, CellRef, Number, Opaque, StandardStream, new_cell_ref};
use crate::vm::vm::Vm;
use crate::vm::{DICTIONARY_INDEX_EXCEPTION, NeonException, Opcode};

use super::helpers::{array_index, array_index_error};

/// Tag fixed by a typed load or store; `None` for the untyped `V` forms.
fn access_kind(op: Opcode) -> Option<CellKind> {
    match op {
        Opcode::LOADB | Opcode::STOREB => Some(CellKind::Boolean),
        Opcode::LOADN | Opcode::STOREN => Some(CellKind::Number),
        Opcode::LOADS | Opcode::STORES => Some(CellKind::String),
        Opcode::LOADY | Opcode::STOREY => Some(CellKind::Bytes),
        Opcode::LOADA | Opcode::STOREA => Some(CellKind::Array),
        Opcode::LOADD | Opcode::STORED => Some(CellKind::Dictionary),
        Opcode::LOADP | Opcode::STOREP => Some(CellKind::Address),
        Opcode::LOADJ | Opcode::STOREJ => Some(CellKind::Object),
        _ => None,
    }
}

impl Vm {
    pub(super) fn op_pushb(&mut self) -> Result<()> {
        let b = self.read_byte_operand()?;
        self.push(b != 0);
        Ok(())
    }

    pub(super) fn op_pushn(&mut self) -> Result<()> {
        let text = self.read_string_operand()?;
        let n: Number = text.parse()?;
        self.push(n);
        Ok(())
    }

    pub(super) fn op_pushs(&mut self) -> Result<()> {
        let s = self.read_string_operand()?;
        self.push(s);
        Ok(())
    }

    pub(super) fn op_pushy(&mut self) -> Result<()> {
        let index = self.read_operand()?;
        let bytes = self
            .module
            .bytestrings
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("string index {} out of range", index))?;
        self.push(bytes);
        Ok(())
    }

    pub(super) fn op_pushi(&mut self) -> Result<()> {
        let n = self.read_operand()?;
        self.push(Number::from(n));
        Ok(())
    }

    pub(super) fn op_pushpg(&mut self) -> Result<()> {
        let index = self.read_operand()?;
        let cell = self
            .globals
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("global {} out of range (module has {})", index, self.globals.len()))?;
        self.push(Cell::address(cell));
        Ok(())
    }

    pub(super) fn op_pushppg(&mut self) -> Result<()> {
        let name = self.read_string_operand()?;
        let cell = self.predefined_global(&name)?;
        self.push(Cell::address(cell));
        Ok(())
    }

    /// Process-level globals, created on first reference.
    fn predefined_global(&mut self, name: &str) -> Result<CellRef> {
        if let Some(cell) = self.predefined.get(name) {
            return Ok(cell.clone());
        }
        let value = match name {
            "sys$args" => Cell::new_array(self.context.args.iter().map(|a| Cell::from(a.as_str())).collect()),
            "io$stdin" | "textio$stdin" => Cell::from(Opaque::Stream(StandardStream::Stdin)),
            "io$stdout" | "textio$stdout" => Cell::from(Opaque::Stream(StandardStream::Stdout)),
            "io$stderr" | "textio$stderr" => Cell::from(Opaque::Stream(StandardStream::Stderr)),
            _ => bail!("unknown predefined global {}", name),
        };
        let cell = new_cell_ref(value);
        self.predefined.insert(name.to_string(), cell.clone());
        Ok(cell)
    }

    pub(super) fn op_pushpl(&mut self) -> Result<()> {
        let index = self.read_operand()?;
        let frame = self.frames.last().ok_or_else(|| anyhow!("local access outside of a function"))?;
        let cell = frame.local(index)?;
        self.push(Cell::address(cell));
        Ok(())
    }

    pub(super) fn op_pushpol(&mut self) -> Result<()> {
        let hops = self.read_operand()?;
        let index = self.read_operand()?;
        let frame = self.frames.last().ok_or_else(|| anyhow!("outer local access outside of a function"))?;
        let cell = frame.outer_at(hops)?.local(index)?;
        self.push(Cell::address(cell));
        Ok(())
    }

    pub(super) fn op_alloc(&mut self) -> Result<()> {
        let n = self.read_operand()?;
        let object = new_cell_ref(Cell::new_array(vec![Cell::Empty; n]));
        self.push(Cell::address(object));
        Ok(())
    }

    pub(super) fn op_load(&mut self, op: Opcode) -> Result<()> {
        let target = self.pop_address()?;
        let value = {
            let mut cell = target.borrow_mut();
            if let Some(kind) = access_kind(op) {
                cell.ensure_kind(kind)?;
            }
            cell.clone()
        };
        self.push(value);
        Ok(())
    }

    pub(super) fn op_store(&mut self, op: Opcode) -> Result<()> {
        let value = self.pop()?;
        let target = self.pop_address()?;
        let value = match access_kind(op) {
            Some(kind) => {
                target.borrow_mut().ensure_kind(kind)?;
                value.with_kind(kind)?
            }
            None => value,
        };
        *target.borrow_mut() = value;
        Ok(())
    }

    pub(super) fn op_resetc(&mut self) -> Result<()> {
        let target = self.pop_address()?;
        *target.borrow_mut() = Cell::Empty;
        Ok(())
    }

    /// Array held by the cell at `target`, fixing an `Empty` cell to an array.
    fn array_at(target: &CellRef) -> Result<crate::val::ArrayRef> {
        let mut cell = target.borrow_mut();
        cell.ensure_kind(CellKind::Array)?;
        cell.clone().into_array()
    }

    fn dictionary_at(target: &CellRef) -> Result<crate::val::DictionaryRef> {
        let mut cell = target.borrow_mut();
        cell.ensure_kind(CellKind::Dictionary)?;
        cell.clone().into_dictionary()
    }

    pub(super) fn op_indexar(&mut self) -> Result<()> {
        let n = self.pop_number()?;
        let target = self.pop_address()?;
        let index = array_index(&n)?;
        let array = Self::array_at(&target)?;
        let element = array.borrow().get(index).cloned().ok_or_else(|| array_index_error(&n))?;
        self.push(Cell::address(element));
        Ok(())
    }

    pub(super) fn op_indexaw(&mut self) -> Result<()> {
        let n = self.pop_number()?;
        let target = self.pop_address()?;
        let index = array_index(&n)?;
        let array = Self::array_at(&target)?;
        let element = {
            let mut items = array.borrow_mut();
            if index >= items.len() {
                items.resize_with(index + 1, || new_cell_ref(Cell::Empty));
            }
            items[index].clone()
        };
        self.push(Cell::address(element));
        Ok(())
    }

    pub(super) fn op_indexav(&mut self) -> Result<()> {
        let n = self.pop_number()?;
        let array = self.pop_array()?;
        let index = array_index(&n)?;
        let value = array
            .borrow()
            .get(index)
            .map(|c| c.borrow().clone())
            .ok_or_else(|| array_index_error(&n))?;
        self.push(value);
        Ok(())
    }

    pub(super) fn op_indexan(&mut self) -> Result<()> {
        let n = self.pop_number()?;
        let array = self.pop_array()?;
        let value = n
            .to_index()
            .and_then(|i| array.borrow().get(i).map(|c| c.borrow().clone()))
            .unwrap_or_default();
        self.push(value);
        Ok(())
    }

    pub(super) fn op_indexdr(&mut self) -> Result<()> {
        let key = self.pop_string()?;
        let target = self.pop_address()?;
        let dictionary = Self::dictionary_at(&target)?;
        let entry = dictionary.borrow().get(&key).cloned();
        match entry {
            Some(cell) => {
                self.push(Cell::address(cell));
                Ok(())
            }
            None => Err(NeonException::new(DICTIONARY_INDEX_EXCEPTION, key).into()),
        }
    }

    pub(super) fn op_indexdw(&mut self) -> Result<()> {
        let key = self.pop_string()?;
        let target = self.pop_address()?;
        let dictionary = Self::dictionary_at(&target)?;
        let entry = dictionary
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| new_cell_ref(Cell::Empty))
            .clone();
        self.push(Cell::address(entry));
        Ok(())
    }

    pub(super) fn op_indexdv(&mut self) -> Result<()> {
        let key = self.pop_string()?;
        let dictionary = self.pop_dictionary()?;
        let value = dictionary.borrow().get(&key).map(|c| c.borrow().clone());
        match value {
            Some(v) => {
                self.push(v);
                Ok(())
            }
            None => Err(NeonException::new(DICTIONARY_INDEX_EXCEPTION, key).into()),
        }
    }

    pub(super) fn op_ina(&mut self) -> Result<()> {
        let array = self.pop_array()?;
        let value = self.pop()?;
        let found = array.borrow().iter().any(|c| *c.borrow() == value);
        self.push(found);
        Ok(())
    }

    pub(super) fn op_ind(&mut self) -> Result<()> {
        let dictionary = self.pop_dictionary()?;
        let key = self.pop_string()?;
        let found = dictionary.borrow().contains_key(&key);
        self.push(found);
        Ok(())
    }

    pub(super) fn op_consa(&mut self) -> Result<()> {
        let n = self.read_operand()?;
        ensure!(self.stack.len() >= n, "CONSA {} with only {} values on the stack", n, self.stack.len());
        let items = self.stack.split_off(self.stack.len() - n);
        self.push(Cell::new_array(items));
        Ok(())
    }

    pub(super) fn op_consd(&mut self) -> Result<()> {
        let n = self.read_operand()?;
        let mut entries = BTreeMap::new();
        for _ in 0..n {
            let value = self.pop()?;
            let key = self.pop_string()?;
            entries.insert(key, value);
        }
        self.push(Cell::new_dictionary(entries));
        Ok(())
    }

    pub(super) fn op_swap(&mut self) -> Result<()> {
        let len = self.stack.len();
        ensure!(len >= 2, "operand stack underflow");
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    /// Removes the value `n` slots below the top.
    pub(super) fn op_dropn(&mut self) -> Result<()> {
        let n = self.read_operand()?;
        let len = self.stack.len();
        ensure!(len > n, "DROPN {} with only {} values on the stack", n, len);
        self.stack.remove(len - 1 - n);
        Ok(())
    }
}

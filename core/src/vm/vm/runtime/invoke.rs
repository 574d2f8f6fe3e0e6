use std::rc::Rc;

use anyhow::{Result, anyhow, bail};

use crate::val::{Cell, Number, Opaque};
use crate::vm::vm::{Frame, Vm};
use crate::vm::{INVALID_FUNCTION_EXCEPTION, NeonException, STACK_OVERFLOW_EXCEPTION};

impl Vm {
    /// Enters function `index`; the return address is the current `ip`.
    pub(super) fn invoke(&mut self, index: usize) -> Result<()> {
        let module = Rc::clone(&self.module);
        let function = module
            .functions
            .get(index)
            .ok_or_else(|| anyhow!("function index {} out of range", index))?;
        let frame = Frame::enter(function, self.frames.last(), self.stack.len())?;
        tracing::trace!(
            target: "neonx::vm::call",
            function = module.function_name(index).unwrap_or("?"),
            depth = self.callstack.len() + 1,
            entry = function.entry,
            "call"
        );
        self.callstack.push(self.ip);
        self.frames.push(Rc::new(frame));
        self.ip = function.entry;
        Ok(())
    }

    fn check_recursion_limit(&self) -> Result<()> {
        if self.callstack.len() >= self.context.options.recursion_limit {
            return Err(NeonException::new(STACK_OVERFLOW_EXCEPTION, "").into());
        }
        Ok(())
    }

    pub(super) fn op_callf(&mut self) -> Result<()> {
        let index = self.read_operand()?;
        self.check_recursion_limit()?;
        self.invoke(index)
    }

    pub(super) fn op_ret(&mut self) -> Result<()> {
        let frame = self.frames.pop().ok_or_else(|| anyhow!("RET outside of a function"))?;
        let ip = self.callstack.pop().ok_or_else(|| anyhow!("call stack underflow"))?;
        tracing::trace!(
            target: "neonx::vm::call",
            depth = self.callstack.len(),
            stack_delta = self.stack.len() as isize - frame.opstack_depth as isize,
            "return"
        );
        self.ip = ip;
        Ok(())
    }

    /// Function pointers are the pair `[module marker, index]`.
    pub(super) fn op_pushfp(&mut self) -> Result<()> {
        let index = self.read_operand()?;
        self.push(Cell::new_array(vec![Cell::from(Opaque::Module), Cell::from(Number::from(index))]));
        Ok(())
    }

    pub(super) fn op_calli(&mut self) -> Result<()> {
        self.check_recursion_limit()?;
        let pointer = Cell::array_values(&self.pop_array()?);
        let [module, index] = pointer.as_slice() else {
            bail!("function pointer must have 2 elements, found {}", pointer.len());
        };
        // The null pointer is `[0, nil]`; anything without a module marker and
        // a positive integral index is not callable.
        let target = match (module, index) {
            (Cell::Opaque(Opaque::Module), Cell::Number(n)) => n.to_index().filter(|&i| i > 0),
            _ => None,
        };
        match target {
            Some(i) => self.invoke(i),
            None => Err(NeonException::new(INVALID_FUNCTION_EXCEPTION, "").into()),
        }
    }

    /// Virtual call: pops `[instance address, interface index]` and looks the
    /// method up in the class descriptor stored in the instance's first slot.
    pub(super) fn op_callv(&mut self) -> Result<()> {
        let slot = self.read_operand()?;
        self.check_recursion_limit()?;
        let pointer = Cell::array_values(&self.pop_array()?);
        let [instance, interface] = pointer.as_slice() else {
            bail!("interface pointer must have 2 elements, found {}", pointer.len());
        };
        let instance = instance
            .clone()
            .into_address()?
            .ok_or_else(|| anyhow!("virtual call through a null instance"))?;
        let interface = interface
            .clone()
            .into_number()?
            .to_index()
            .ok_or_else(|| anyhow!("interface index is not a valid index"))?;

        let fields = instance.borrow().clone().into_array()?;
        let descriptor = fields
            .borrow()
            .first()
            .map(|c| c.borrow().clone())
            .ok_or_else(|| anyhow!("instance has no class descriptor"))?;
        let Opaque::ClassInfo(class) = descriptor.into_opaque()? else {
            bail!("instance slot 0 does not hold a class descriptor");
        };

        let function = self
            .module
            .classes
            .get(class)
            .and_then(|c| c.interfaces.get(interface))
            .and_then(|methods| methods.get(slot))
            .copied()
            .ok_or_else(|| anyhow!("class {} has no method {} in interface {}", class, slot, interface))?;
        self.invoke(function)
    }

    pub(super) fn op_pushci(&mut self) -> Result<()> {
        let name_index = self.read_operand()?;
        let name = self
            .module
            .string(name_index)
            .ok_or_else(|| anyhow!("string index {} out of range", name_index))?;
        if name.contains('.') {
            bail!("class {} lives in another module; cross-module linking is not implemented", name);
        }
        let class = self
            .module
            .classes
            .iter()
            .position(|c| c.name == name_index)
            .ok_or_else(|| anyhow!("unknown class name {}", name))?;
        self.push(Opaque::ClassInfo(class));
        Ok(())
    }

    pub(super) fn op_callp(&mut self) -> Result<()> {
        let name_index = self.read_operand()?;
        let builtin = self.builtin(name_index)?;
        builtin(self)
    }

    /// `EXCEPT` raises with the object payload on the stack, not through the
    /// error path, so the payload keeps its identity.
    pub(super) fn op_except(&mut self, start_ip: usize) -> Result<()> {
        let name = self.read_string_operand()?;
        let payload = self.pop_object()?;
        self.raise(&name, payload, start_ip);
        Ok(())
    }
}

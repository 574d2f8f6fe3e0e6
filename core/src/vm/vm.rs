mod exceptions;
mod frame;
mod runtime;

use std::io::Write;
use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::module::{BuiltinFn, BuiltinRegistry};
use crate::util::fast_map::{FastHashMap, fast_hash_map_new};
use crate::val::{ArrayRef, Cell, CellRef, DictionaryRef, Number, ObjectRef, new_cell_ref};
use crate::vm::{Module, NeonException, VmContext, VmOptions};

pub(crate) use frame::Frame;

/// How a run ended when the host did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The instruction pointer reached the end of the code.
    Completed,
    /// `sys$exit` was called.
    Exit(i32),
    /// No handler matched; `info` is the payload rendered as text.
    Unhandled(NeonException),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStats {
    pub instructions: u64,
    pub max_stack_depth: usize,
    pub max_call_depth: usize,
}

/// Stack machine executing one loaded module.
///
/// Holds all mutable state of a run; builtins receive `&mut Vm` and talk to
/// the program through the operand stack only.
pub struct Vm {
    module: Rc<Module>,
    ip: usize,
    stack: Vec<Cell>,
    /// Return addresses, one per active frame.
    callstack: Vec<usize>,
    frames: Vec<Rc<Frame>>,
    globals: Vec<CellRef>,
    predefined: FastHashMap<String, CellRef>,
    registry: BuiltinRegistry,
    builtin_cache: FastHashMap<usize, BuiltinFn>,
    context: VmContext,
    stats: VmStats,
    halted: Option<RunOutcome>,
}

impl Vm {
    pub fn new(module: Module, registry: BuiltinRegistry, context: VmContext) -> Self {
        let globals = (0..module.global_size).map(|_| new_cell_ref(Cell::Empty)).collect();
        Self {
            module: Rc::new(module),
            ip: 0,
            stack: Vec::new(),
            callstack: Vec::new(),
            frames: Vec::new(),
            globals,
            predefined: fast_hash_map_new(),
            registry,
            builtin_cache: fast_hash_map_new(),
            context,
            stats: VmStats::default(),
            halted: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn options(&self) -> &VmOptions {
        &self.context.options
    }

    pub fn args(&self) -> &[String] {
        &self.context.args
    }

    pub fn stats(&self) -> VmStats {
        self.stats
    }

    pub fn stdout(&mut self) -> &mut dyn Write {
        self.context.stdout()
    }

    pub fn stderr(&mut self) -> &mut dyn Write {
        self.context.stderr()
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.context.options.recursion_limit = limit;
    }

    /// Ends the run after the current instruction with `RunOutcome::Exit`.
    pub fn request_exit(&mut self, code: i32) {
        self.halted = Some(RunOutcome::Exit(code));
    }

    pub fn call_depth(&self) -> usize {
        self.callstack.len()
    }

    pub fn global(&self, index: usize) -> Option<CellRef> {
        self.globals.get(index).cloned()
    }

    // ---- operand stack ----

    #[inline]
    pub fn push(&mut self, cell: impl Into<Cell>) {
        self.stack.push(cell.into());
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Cell> {
        self.stack.pop().ok_or_else(|| anyhow!("operand stack underflow"))
    }

    pub fn peek(&self) -> Result<&Cell> {
        self.stack.last().ok_or_else(|| anyhow!("operand stack underflow"))
    }

    pub fn stack(&self) -> &[Cell] {
        &self.stack
    }

    pub fn pop_boolean(&mut self) -> Result<bool> {
        self.pop()?.into_boolean()
    }

    pub fn pop_number(&mut self) -> Result<Number> {
        self.pop()?.into_number()
    }

    pub fn pop_string(&mut self) -> Result<String> {
        self.pop()?.into_string()
    }

    pub fn pop_bytes(&mut self) -> Result<Vec<u8>> {
        self.pop()?.into_bytes()
    }

    pub fn pop_object(&mut self) -> Result<Option<ObjectRef>> {
        self.pop()?.into_object()
    }

    pub fn pop_array(&mut self) -> Result<ArrayRef> {
        self.pop()?.into_array()
    }

    pub fn pop_dictionary(&mut self) -> Result<DictionaryRef> {
        self.pop()?.into_dictionary()
    }

    /// Pops an address; dereferencing a null address is a host error.
    pub fn pop_address(&mut self) -> Result<CellRef> {
        self.pop()?
            .into_address()?
            .ok_or_else(|| anyhow!("null address dereferenced"))
    }

    fn builtin(&mut self, name_index: usize) -> Result<BuiltinFn> {
        if let Some(f) = self.builtin_cache.get(&name_index) {
            return Ok(*f);
        }
        let name = self
            .module
            .string(name_index)
            .ok_or_else(|| anyhow!("builtin name index {} out of range", name_index))?;
        let f = self
            .registry
            .get_builtin(name)
            .ok_or_else(|| anyhow!("unknown builtin function {}", name))?;
        self.builtin_cache.insert(name_index, f);
        Ok(f)
    }

    fn record_depths(&mut self) {
        let stats = &mut self.stats;
        stats.max_stack_depth = stats.max_stack_depth.max(self.stack.len());
        stats.max_call_depth = stats.max_call_depth.max(self.callstack.len());
    }
}

use std::rc::Rc;

use anyhow::{Result, anyhow, ensure};

use crate::val::{Cell, CellRef, new_cell_ref};
use crate::vm::FunctionInfo;

/// Activation record of one function call.
///
/// `outer` follows lexical nesting, not the call chain: a function nested at
/// depth `d` sees the closest active frame of depth `d - 1`.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) nesting_depth: usize,
    pub(crate) outer: Option<Rc<Frame>>,
    pub(crate) locals: Vec<CellRef>,
    /// Operand stack height below the call's arguments.
    pub(crate) opstack_depth: usize,
}

impl Frame {
    /// Builds the frame for `function` called while `caller` is on top.
    pub(crate) fn enter(function: &FunctionInfo, caller: Option<&Rc<Frame>>, stack_len: usize) -> Result<Frame> {
        let caller_depth = caller.map(|f| f.nesting_depth).unwrap_or(0);
        ensure!(
            function.nesting_depth <= caller_depth + 1,
            "internal nesting error: function at depth {} called from depth {}",
            function.nesting_depth,
            caller_depth
        );

        let mut outer = caller.cloned();
        while let Some(frame) = outer.clone() {
            if frame.nesting_depth < function.nesting_depth {
                break;
            }
            outer = frame.outer.clone();
        }

        let opstack_depth = stack_len.checked_sub(function.param_count).ok_or_else(|| {
            anyhow!(
                "operand stack holds {} values but the callee takes {} parameters",
                stack_len,
                function.param_count
            )
        })?;

        Ok(Frame {
            nesting_depth: function.nesting_depth,
            outer,
            locals: (0..function.local_count).map(|_| new_cell_ref(Cell::Empty)).collect(),
            opstack_depth,
        })
    }

    pub(crate) fn local(&self, index: usize) -> Result<CellRef> {
        self.locals
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("local {} out of range (frame has {})", index, self.locals.len()))
    }

    /// Walks exactly `hops` lexical links.
    pub(crate) fn outer_at(self: &Rc<Self>, hops: usize) -> Result<Rc<Frame>> {
        let mut frame = Rc::clone(self);
        for hop in 0..hops {
            frame = frame
                .outer
                .clone()
                .ok_or_else(|| anyhow!("lexical chain ends after {} of {} hops", hop, hops))?;
        }
        Ok(frame)
    }
}

use std::rc::Rc;

use crate::val::{Cell, Number, ObjectRef};
use crate::vm::vm::{RunOutcome, Vm};
use crate::vm::{NeonException, handler_matches};

impl Vm {
    /// Raises `name` as if thrown at `raise_ip`.
    ///
    /// Searches the handler table at the raise point, then at each return
    /// address on the call stack, most recent first. On a match the call
    /// and frame stacks are cut back to the matching depth and the exception
    /// triple `[name, payload, raise_ip]` is pushed for the handler.
    pub(crate) fn raise(&mut self, name: &str, payload: Option<ObjectRef>, raise_ip: usize) {
        let module = Rc::clone(&self.module);
        let mut tip = raise_ip;
        let mut depth = self.callstack.len();
        loop {
            let handler = module.exceptions.iter().find(|e| {
                e.start <= tip
                    && tip < e.end
                    && module
                        .string(e.handler_name)
                        .is_some_and(|handler| handler_matches(handler, name))
            });
            if let Some(range) = handler {
                tracing::debug!(
                    target: "neonx::vm::exception",
                    exception = name,
                    raise_ip,
                    handler = range.handler,
                    unwound = self.callstack.len() - depth,
                    "exception caught"
                );
                self.callstack.truncate(depth);
                self.frames.truncate(depth);
                self.push(Cell::new_array(vec![
                    Cell::from(name),
                    Cell::Object(payload),
                    Cell::from(Number::from(raise_ip)),
                ]));
                self.ip = range.handler;
                return;
            }
            if depth == 0 {
                break;
            }
            depth -= 1;
            tip = self.callstack[depth];
        }

        let info = payload.map(|p| p.to_string()).unwrap_or_else(|| "null".to_string());
        tracing::debug!(target: "neonx::vm::exception", exception = name, raise_ip, "unhandled exception");
        self.halted = Some(RunOutcome::Unhandled(NeonException::new(name, info)));
    }
}

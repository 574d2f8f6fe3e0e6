use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result, bail};
use neonx_core::module::{BuiltinFn, BuiltinModule, BuiltinRegistry};
use neonx_core::val::{Cell, Opaque, StandardStream};
use neonx_core::vm::Vm;

/// Output builtins. Text goes through the engine's context so embedders and
/// tests can redirect it.
#[derive(Debug)]
pub struct IoModule {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for IoModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IoModule {
    pub fn new() -> Self {
        let mut functions: HashMap<String, BuiltinFn> = HashMap::new();

        functions.insert("print".to_string(), Self::print);
        functions.insert("io$write".to_string(), Self::write);
        functions.insert("textio$writeLine".to_string(), Self::write_line);

        Self { functions }
    }

    fn print(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        writeln!(vm.stdout(), "{}", s).context("print failed")?;
        Ok(())
    }

    fn write(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        let stream = pop_stream(vm)?;
        write!(output(vm, stream)?, "{}", s).context("io.write failed")?;
        Ok(())
    }

    fn write_line(vm: &mut Vm) -> Result<()> {
        let s = vm.pop_string()?;
        let stream = pop_stream(vm)?;
        writeln!(output(vm, stream)?, "{}", s).context("textio.writeLine failed")?;
        Ok(())
    }
}

/// Accepts the stream handle itself or the address of a predefined stream
/// global, as produced by `PUSHPPG`.
fn pop_stream(vm: &mut Vm) -> Result<StandardStream> {
    let cell = match vm.pop()? {
        Cell::Address(Some(target)) => target.borrow().clone(),
        other => other,
    };
    match cell.into_opaque()? {
        Opaque::Stream(stream) => Ok(stream),
        other => bail!("expected a stream handle, found {:?}", other),
    }
}

fn output(vm: &mut Vm, stream: StandardStream) -> Result<&mut dyn Write> {
    match stream {
        StandardStream::Stdout => Ok(vm.stdout()),
        StandardStream::Stderr => Ok(vm.stderr()),
        StandardStream::Stdin => bail!("standard input is not writable"),
    }
}

impl BuiltinModule for IoModule {
    fn name(&self) -> &str {
        "io"
    }

    fn description(&self) -> &str {
        "print and writes to the standard streams"
    }

    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()> {
        for (name, func) in &self.functions {
            registry.register_builtin(name, *func);
        }
        Ok(())
    }
}

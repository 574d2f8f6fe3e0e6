use anyhow::{Result, bail};

use crate::util::fast_map::{FastHashMap, fast_hash_map_new};
use crate::vm::Vm;

/// Host function reached through `CALLP`. Pops its own arguments and pushes
/// its own results; the engine does no arity checking.
pub type BuiltinFn = fn(&mut Vm) -> Result<()>;

/// Builtin function table, filled by [`BuiltinModule`]s.
///
/// Names are the qualified names compiled into `CALLP` operands, e.g.
/// `array__size` or `math$abs`.
#[derive(Debug, Default, Clone)]
pub struct BuiltinRegistry {
    modules: Vec<String>,
    builtins: FastHashMap<String, BuiltinFn>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            builtins: fast_hash_map_new(),
        }
    }

    /// Registers `module` and every function it exports.
    pub fn register_module(&mut self, module: &dyn BuiltinModule) -> Result<()> {
        if self.modules.iter().any(|m| m == module.name()) {
            bail!("builtin module '{}' registered twice", module.name());
        }
        module.register(self)?;
        self.modules.push(module.name().to_string());
        Ok(())
    }

    /// Register a builtin function globally; later registrations replace
    /// earlier ones.
    pub fn register_builtin(&mut self, name: &str, func: BuiltinFn) {
        self.builtins.insert(name.to_string(), func);
    }

    pub fn get_builtin(&self, name: &str) -> Option<BuiltinFn> {
        self.builtins.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn module_names(&self) -> &[String] {
        &self.modules
    }

    /// Registered builtin names, sorted.
    pub fn builtin_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builtins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A group of builtins registered together.
pub trait BuiltinModule {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Register the module's functions with the registry
    fn register(&self, registry: &mut BuiltinRegistry) -> Result<()>;
}

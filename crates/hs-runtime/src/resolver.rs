use std::collections::BTreeMap;
use std::rc::Rc;

use hs_core::{HostScriptError, Pid};
use rhai::{Dynamic, Engine};

use crate::host_object::HostObjects;

/// The host-side execution a script module is bound to.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    pid: Pid,
    script: String,
    objects: HostObjects,
}

impl ExecutionHandle {
    pub fn new(pid: Pid, script: impl Into<String>, objects: HostObjects) -> Self {
        Self {
            pid,
            script: script.into(),
            objects,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn objects(&self) -> &HostObjects {
        &self.objects
    }
}

/// A host module that `require` can hand to scripts.
pub trait HostModule {
    /// Registers the wrapper's script-visible types and methods.
    fn register_api(&self, _engine: &mut Engine) {}

    /// Builds a new wrapper instance bound to `handle`.
    fn construct(&self, handle: &ExecutionHandle) -> Result<Dynamic, HostScriptError>;
}

/// Table of host module constructors, keyed by the id scripts pass to `require`.
#[derive(Clone, Default)]
pub struct ModuleResolver {
    modules: BTreeMap<String, Rc<dyn HostModule>>,
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, id: impl Into<String>, module: impl HostModule + 'static) -> Self {
        self.register(id, module);
        self
    }

    /// Adds or replaces the module registered under `id`.
    pub fn register(&mut self, id: impl Into<String>, module: impl HostModule + 'static) {
        self.modules.insert(id.into(), Rc::new(module));
    }

    pub fn get(&self, id: &str) -> Option<Rc<dyn HostModule>> {
        self.modules.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub(crate) fn register_apis(&self, engine: &mut Engine) {
        for module in self.modules.values() {
            module.register_api(engine);
        }
    }
}

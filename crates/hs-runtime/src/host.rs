use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use hs_compiler::{prepare_source, source_digest, CompiledUnit, SourceLoader};
use hs_core::{HostArg, HostScriptError, HostValue, ObjectId, Pid};
use rhai::{Array, Dynamic};

use crate::convert::{dynamic_to_host_value, host_value_to_dynamic};
use crate::host_object::{EventObject, HostObjects};
use crate::module::{ModuleOptions, RuntimeEnv, ScriptModule};
use crate::registry::ReferenceRegistry;
use crate::resolver::{ExecutionHandle, ModuleResolver};

pub const SHUTDOWN_EVENT: &str = "shutdown";

pub type GcHook = Arc<dyn Fn() + Send + Sync>;

pub struct ScriptHostOptions {
    pub loader: Arc<dyn SourceLoader>,
    pub resolver: ModuleResolver,
    pub gc: Option<GcHook>,
}

/// Script-side state behind the host channel: compiled units, live modules
/// and host objects. Lives on the single consumer thread.
pub struct ScriptHost {
    env: Rc<RuntimeEnv>,
    objects: HostObjects,
    units: HashMap<PathBuf, Rc<CompiledUnit>>,
    modules: BTreeMap<Pid, ScriptModule>,
    next_pid: u32,
    gc: Option<GcHook>,
}

fn module_not_found(pid: Pid) -> HostScriptError {
    HostScriptError::new(
        "HOST_MODULE_NOT_FOUND",
        format!("No script module with pid {}.", pid),
    )
}

fn object_not_found(object: ObjectId) -> HostScriptError {
    HostScriptError::new(
        "HOST_OBJECT_NOT_FOUND",
        format!("No host object {}.", object),
    )
}

impl ScriptHost {
    pub fn new(options: ScriptHostOptions) -> Self {
        Self {
            env: Rc::new(RuntimeEnv::new(
                ReferenceRegistry::shared(),
                options.resolver,
                options.loader,
            )),
            objects: HostObjects::new(),
            units: HashMap::new(),
            modules: BTreeMap::new(),
            next_pid: 1,
            gc: options.gc,
        }
    }

    pub fn registry(&self) -> &Rc<RefCell<ReferenceRegistry>> {
        self.env.registry()
    }

    pub fn objects(&self) -> &HostObjects {
        &self.objects
    }

    pub fn module(&self, pid: Pid) -> Option<&ScriptModule> {
        self.modules.get(&pid)
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.modules.keys().copied().collect()
    }

    /// Compiled unit for `path`, recompiled only when the source changed.
    fn unit_for(&mut self, path: PathBuf) -> Result<Rc<CompiledUnit>, HostScriptError> {
        let source = self.env.loader().read(&path)?;
        let digest = source_digest(prepare_source(&source));
        if let Some(unit) = self.units.get(&path) {
            if unit.digest() == digest {
                return Ok(Rc::clone(unit));
            }
            tracing::debug!(filename = %path.display(), "source changed, recompiling");
        }

        let unit = Rc::new(self.env.compiler().compile(&source, &path)?);
        self.units.insert(path, Rc::clone(&unit));
        Ok(unit)
    }

    pub fn load(&mut self, request: &str, parent: Option<Pid>) -> Result<Pid, HostScriptError> {
        if let Some(parent) = parent {
            if !self.modules.contains_key(&parent) {
                return Err(module_not_found(parent));
            }
        }

        let filename = self.env.loader().resolve(request, None)?;
        let unit = self.unit_for(filename.clone())?;

        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        let handle = ExecutionHandle::new(pid, filename.display().to_string(), self.objects.clone());
        let module = ScriptModule::new(
            ModuleOptions {
                filename,
                parent,
                handle,
                pid,
                unit,
            },
            Rc::clone(&self.env),
        );
        tracing::debug!(%pid, filename = %module.filename().display(), "script module loaded");
        self.modules.insert(pid, module);
        Ok(pid)
    }

    fn script_args(&self, args: &[HostArg]) -> Result<Array, HostScriptError> {
        args.iter()
            .map(|arg| match arg {
                HostArg::Value(value) => Ok(host_value_to_dynamic(value)),
                HostArg::Object(object) => self
                    .objects
                    .get(*object)
                    .map(Dynamic::from)
                    .ok_or_else(|| object_not_found(*object)),
            })
            .collect()
    }

    pub fn run(&mut self, pid: Pid, args: &[HostArg]) -> Result<HostValue, HostScriptError> {
        let module = self.modules.get(&pid).cloned().ok_or_else(|| module_not_found(pid))?;
        let args = self.script_args(args)?;
        let value = module.run(args)?;
        dynamic_to_host_value(value)
    }

    pub fn spawn_object(
        &mut self,
        kind: &str,
        props: BTreeMap<String, HostValue>,
    ) -> ObjectId {
        let object = self.objects.spawn(kind);
        for (key, value) in &props {
            object.set(key, host_value_to_dynamic(value));
        }
        tracing::debug!(object = %object.id(), kind, "host object spawned");
        object.id()
    }

    /// Releases `object` from every owning module, detaches its listeners and
    /// drops it from the object table. Returns how many owners let go of it.
    pub fn despawn(&mut self, object: ObjectId) -> Result<usize, HostScriptError> {
        let target = self.objects.get(object).ok_or_else(|| object_not_found(object))?;
        let handle = target.handle();

        let owners = self.registry().borrow().owners_of(object);
        let mut released = 0;
        for owner in &owners {
            match self.modules.get(owner) {
                Some(module) => {
                    module.remove_reference(&handle);
                }
                None => {
                    self.registry().borrow_mut().release(object, *owner);
                }
            }
            released += 1;
        }

        handle.detach_all_listeners();
        self.objects.remove(object);
        tracing::debug!(%object, released, "host object despawned");
        Ok(released)
    }

    pub fn object(&self, id: ObjectId) -> Option<EventObject> {
        self.objects.get(id)
    }

    /// Delivers `event` to every listener on `object` in attach order; returns
    /// how many callbacks ran.
    pub fn emit(
        &mut self,
        object: ObjectId,
        event: &str,
        args: &[HostArg],
    ) -> Result<usize, HostScriptError> {
        let target = self.objects.get(object).ok_or_else(|| object_not_found(object))?;
        let args = self.script_args(args)?;

        let mut delivered = 0;
        for listener in target.listeners_for(event) {
            let Some(module) = self.modules.get(&listener.owner).cloned() else {
                tracing::warn!(%object, event, owner = %listener.owner, "listener owner is not loaded");
                continue;
            };
            module.dispatch(&listener, args.clone())?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Releases every reference of `pid` and drops the module. Returns the
    /// number of registry entries it gave up.
    pub fn unload(&mut self, pid: Pid) -> Result<usize, HostScriptError> {
        let module = self.modules.remove(&pid).ok_or_else(|| module_not_found(pid))?;
        let released = module.clear_references();
        module.release_script_state();
        tracing::debug!(%pid, released, "script module unloaded");
        if let Some(gc) = &self.gc {
            gc();
        }
        Ok(released)
    }

    /// Emits the shutdown lifecycle event on every module, then unloads them all.
    ///
    /// Every module is unloaded even when a handler fails; the first failure is returned.
    pub fn shutdown(&mut self) -> Result<(), HostScriptError> {
        let mut first_error = None;
        for module in self.modules.values().cloned().collect::<Vec<_>>() {
            if let Err(error) = module.emit_lifecycle(SHUTDOWN_EVENT, Array::new()) {
                tracing::error!(pid = %module.pid(), %error, "shutdown handler failed");
                first_error.get_or_insert(error);
            }
        }

        for pid in self.pids() {
            self.unload(pid)?;
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use hs_compiler::{CompiledUnit, ScriptCompiler, SourceLoader};
use hs_core::{HostScriptError, ObjectId, Pid};
use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map, Position, INT};

use crate::context::{map_eval_error, ExecutionContext};
use crate::host_object::{register_object_api, EventObject, HostObjectHandle, Listener};
use crate::registry::{Release, ReferenceRegistry};
use crate::resolver::{ExecutionHandle, ModuleResolver};

/// Collaborators shared by every module of one host.
pub struct RuntimeEnv {
    registry: Rc<RefCell<ReferenceRegistry>>,
    resolver: ModuleResolver,
    loader: Arc<dyn SourceLoader>,
    compiler: ScriptCompiler,
}

impl RuntimeEnv {
    pub fn new(
        registry: Rc<RefCell<ReferenceRegistry>>,
        resolver: ModuleResolver,
        loader: Arc<dyn SourceLoader>,
    ) -> Self {
        Self {
            registry,
            resolver,
            loader,
            compiler: ScriptCompiler::new(),
        }
    }

    pub fn registry(&self) -> &Rc<RefCell<ReferenceRegistry>> {
        &self.registry
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn loader(&self) -> &dyn SourceLoader {
        self.loader.as_ref()
    }

    pub fn compiler(&self) -> &ScriptCompiler {
        &self.compiler
    }
}

pub struct ModuleOptions {
    pub filename: PathBuf,
    pub parent: Option<Pid>,
    pub handle: ExecutionHandle,
    pub pid: Pid,
    pub unit: Rc<CompiledUnit>,
}

/// Diagnostic entry of a module's local reference mapping.
#[derive(Clone)]
pub struct LocalReference {
    pub handle: HostObjectHandle,
    /// Listener count on the object when the reference was recorded.
    pub listener_count: usize,
}

struct ModuleInner {
    pid: Pid,
    filename: PathBuf,
    parent: Option<Pid>,
    handle: ExecutionHandle,
    unit: Rc<CompiledUnit>,
    env: Rc<RuntimeEnv>,
    exports: RefCell<Map>,
    references: RefCell<BTreeMap<ObjectId, LocalReference>>,
    lifecycle: RefCell<Vec<(String, Listener)>>,
    file_modules: RefCell<HashMap<PathBuf, Map>>,
    loading: RefCell<HashSet<PathBuf>>,
}

/// Long-lived handle for one loaded script.
#[derive(Clone)]
pub struct ScriptModule {
    inner: Rc<ModuleInner>,
}

fn into_eval_error(error: HostScriptError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(error.to_string()),
        Position::NONE,
    ))
}

impl ScriptModule {
    pub fn new(options: ModuleOptions, env: Rc<RuntimeEnv>) -> Self {
        Self {
            inner: Rc::new(ModuleInner {
                pid: options.pid,
                filename: options.filename,
                parent: options.parent,
                handle: options.handle,
                unit: options.unit,
                env,
                exports: RefCell::new(Map::new()),
                references: RefCell::new(BTreeMap::new()),
                lifecycle: RefCell::new(Vec::new()),
                file_modules: RefCell::new(HashMap::new()),
                loading: RefCell::new(HashSet::new()),
            }),
        }
    }

    pub fn pid(&self) -> Pid {
        self.inner.pid
    }

    pub fn filename(&self) -> &Path {
        &self.inner.filename
    }

    pub fn dirname(&self) -> &Path {
        self.inner.unit.dirname()
    }

    pub fn parent(&self) -> Option<Pid> {
        self.inner.parent
    }

    pub fn handle(&self) -> &ExecutionHandle {
        &self.inner.handle
    }

    pub fn unit(&self) -> &Rc<CompiledUnit> {
        &self.inner.unit
    }

    pub fn contents(&self) -> &str {
        self.inner.unit.source()
    }

    pub fn exports(&self) -> Map {
        self.inner.exports.borrow().clone()
    }

    /// Executes the whole unit again in a fresh context, then its default export.
    pub fn run(&self, args: Array) -> Result<Dynamic, HostScriptError> {
        tracing::debug!(pid = %self.pid(), argc = args.len(), "running script module");
        let context =
            ExecutionContext::new(self, Rc::clone(&self.inner.unit), self.exports(), args);
        let outcome = context.execute()?;
        *self.inner.exports.borrow_mut() = outcome.exports;
        Ok(outcome.value)
    }

    /// Host module wrapper for `id`, or the exports of the script file it
    /// names relative to this module's directory.
    pub fn require(&self, id: &str) -> Result<Dynamic, HostScriptError> {
        self.require_from(id, self.dirname())
    }

    /// Like [`ScriptModule::require`], resolving file paths against `base`.
    pub fn require_from(&self, id: &str, base: &Path) -> Result<Dynamic, HostScriptError> {
        if let Some(module) = self.inner.env.resolver().get(id) {
            tracing::debug!(pid = %self.pid(), id, "constructing host module");
            return module.construct(&self.inner.handle);
        }
        self.require_file(id, base).map(Dynamic::from_map)
    }

    fn require_file(&self, request: &str, base: &Path) -> Result<Map, HostScriptError> {
        let env = &self.inner.env;
        let path = env.loader().resolve(request, Some(base)).map_err(|error| {
            HostScriptError::new(
                "REQUIRE_NOT_FOUND",
                format!("require(\"{}\") failed: {}", request, error.message),
            )
        })?;

        if let Some(exports) = self.inner.file_modules.borrow().get(&path) {
            return Ok(exports.clone());
        }
        if !self.inner.loading.borrow_mut().insert(path.clone()) {
            return Err(HostScriptError::new(
                "REQUIRE_CYCLE",
                format!("{} is required while it is still loading", path.display()),
            ));
        }

        let evaluated = env
            .compiler()
            .compile_file(env.loader(), &path)
            .and_then(|unit| {
                ExecutionContext::new(self, Rc::new(unit), Map::new(), Array::new()).evaluate()
            });
        self.inner.loading.borrow_mut().remove(&path);

        let exports = evaluated?;
        self.inner
            .file_modules
            .borrow_mut()
            .insert(path, exports.clone());
        Ok(exports)
    }

    pub fn tracks(&self, object: ObjectId) -> bool {
        self.inner.references.borrow().contains_key(&object)
    }

    pub fn reference_count(&self) -> usize {
        self.inner.references.borrow().len()
    }

    /// Snapshot of the local mapping: object id and its recorded listener count.
    pub fn references(&self) -> Vec<(ObjectId, usize)> {
        self.inner
            .references
            .borrow()
            .iter()
            .map(|(id, reference)| (*id, reference.listener_count))
            .collect()
    }

    pub fn add_reference(&self, handle: HostObjectHandle) {
        let object = handle.object_id();
        let listener_count = handle.listener_count();
        self.inner.references.borrow_mut().insert(
            object,
            LocalReference {
                handle,
                listener_count,
            },
        );
        self.inner
            .env
            .registry()
            .borrow_mut()
            .acquire(object, self.pid());
        tracing::debug!(pid = %self.pid(), %object, listener_count, "reference added");
    }

    /// Releases `handle`. Every listener on the object is detached, whoever attached it.
    ///
    /// Returns `false` without touching anything when this module is not an owner.
    pub fn remove_reference(&self, handle: &HostObjectHandle) -> bool {
        let object = handle.object_id();
        let registry = self.inner.env.registry();
        if !registry.borrow().is_owned_by(object, self.pid()) {
            tracing::warn!(pid = %self.pid(), %object, "untracked reference");
            return false;
        }

        handle.detach_all_listeners();
        self.inner.references.borrow_mut().remove(&object);
        let released = registry.borrow_mut().release(object, self.pid());
        tracing::debug!(pid = %self.pid(), %object, "reference removed");
        released == Release::Released
    }

    pub fn clear_references(&self) -> usize {
        let snapshot = self
            .inner
            .references
            .borrow()
            .values()
            .map(|reference| Rc::clone(&reference.handle))
            .collect::<Vec<_>>();

        snapshot
            .iter()
            .filter(|handle| self.remove_reference(handle))
            .count()
    }

    /// Attaches a script callback and records the reference on first interest.
    pub fn listen(
        &self,
        target: HostObjectHandle,
        event: &str,
        callback: FnPtr,
        unit: Rc<CompiledUnit>,
    ) {
        target.attach_listener(
            event,
            Listener {
                owner: self.pid(),
                callback,
                unit,
            },
        );
        if !self.tracks(target.object_id()) {
            self.add_reference(target);
        }
    }

    /// Drops lifecycle listeners, cached file modules and exports. Script
    /// closures stored there may hold clones of this module.
    pub(crate) fn release_script_state(&self) {
        self.inner.lifecycle.borrow_mut().clear();
        self.inner.file_modules.borrow_mut().clear();
        self.inner.loading.borrow_mut().clear();
        self.inner.exports.borrow_mut().clear();
    }

    pub fn on_lifecycle(&self, event: &str, callback: FnPtr, unit: Rc<CompiledUnit>) {
        self.inner.lifecycle.borrow_mut().push((
            event.to_string(),
            Listener {
                owner: self.pid(),
                callback,
                unit,
            },
        ));
    }

    /// Calls every module-level listener for `event`; returns how many ran.
    pub fn emit_lifecycle(&self, event: &str, args: Array) -> Result<usize, HostScriptError> {
        let listeners = self
            .inner
            .lifecycle
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| listener.clone())
            .collect::<Vec<_>>();

        for listener in &listeners {
            self.dispatch(listener, args.clone())?;
        }
        Ok(listeners.len())
    }

    pub fn dispatch(&self, listener: &Listener, args: Array) -> Result<Dynamic, HostScriptError> {
        let engine = self.build_engine(&listener.unit);
        listener
            .callback
            .call::<Dynamic>(&engine, listener.unit.ast(), args)
            .map_err(|error| map_eval_error(&listener.unit, error))
    }

    /// Engine for code of `unit` running on behalf of this module.
    pub(crate) fn build_engine(&self, unit: &Rc<CompiledUnit>) -> Engine {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);

        let pid = self.pid();
        let script = self.filename().display().to_string();
        let debug_script = script.clone();
        engine.on_print(move |text| tracing::info!(%pid, script = %script, "{}", text));
        engine.on_debug(move |text, _source, position| {
            tracing::debug!(%pid, script = %debug_script, line = ?position.line(), "{}", text)
        });

        register_object_api(&mut engine);
        self.inner.env.resolver().register_apis(&mut engine);

        engine
            .register_type_with_name::<ScriptModule>("ScriptModule")
            .register_get("pid", |module: &mut ScriptModule| module.pid().0 as INT)
            .register_get("filename", |module: &mut ScriptModule| {
                module.filename().display().to_string()
            });

        let module = self.clone();
        let base = unit.dirname().to_path_buf();
        engine.register_fn("require", move |id: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            module.require_from(id, &base).map_err(into_eval_error)
        });

        let module = self.clone();
        let listen_unit = Rc::clone(unit);
        engine.register_fn(
            "on",
            move |target: &mut EventObject, event: &str, callback: FnPtr| {
                module.listen(target.handle(), event, callback, Rc::clone(&listen_unit));
            },
        );

        let module = self.clone();
        engine.register_fn("remove_all_listeners", move |target: &mut EventObject| {
            module.remove_reference(&target.handle())
        });

        let lifecycle_unit = Rc::clone(unit);
        engine.register_fn(
            "on",
            move |owner: &mut ScriptModule, event: &str, callback: FnPtr| {
                owner.on_lifecycle(event, callback, Rc::clone(&lifecycle_unit));
            },
        );

        engine
    }
}

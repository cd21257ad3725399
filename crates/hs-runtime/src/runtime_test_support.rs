use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use hs_compiler::MemorySourceLoader;
use hs_core::{HostArg, HostScriptError, ObjectId, Pid};
use rhai::{Dynamic, Engine, INT};

use crate::{
    ExecutionHandle, GcHook, HostModule, ModuleResolver, ScriptHost, ScriptHostOptions,
    ScriptModule,
};

pub(crate) const ROOT: &str = "/scripts";

#[derive(Clone)]
pub(crate) struct World {
    handle: ExecutionHandle,
}

/// `require("world")`: spawns host objects through the execution handle and
/// counts how many wrappers were constructed.
pub(crate) struct WorldModule {
    constructed: Rc<Cell<usize>>,
}

impl WorldModule {
    pub(crate) fn new() -> (Self, Rc<Cell<usize>>) {
        let constructed = Rc::new(Cell::new(0));
        (
            Self {
                constructed: Rc::clone(&constructed),
            },
            constructed,
        )
    }
}

impl HostModule for WorldModule {
    fn register_api(&self, engine: &mut Engine) {
        engine
            .register_type_with_name::<World>("World")
            .register_get("pid", |world: &mut World| world.handle.pid().0 as INT)
            .register_fn("spawn", |world: &mut World, kind: &str| {
                world.handle.objects().spawn(kind)
            });
    }

    fn construct(&self, handle: &ExecutionHandle) -> Result<Dynamic, HostScriptError> {
        self.constructed.set(self.constructed.get() + 1);
        Ok(Dynamic::from(World {
            handle: handle.clone(),
        }))
    }
}

pub(crate) fn loader(files: &[(&str, &str)]) -> MemorySourceLoader {
    files
        .iter()
        .fold(MemorySourceLoader::new(ROOT), |loader, (path, source)| {
            loader.with_file(path, *source)
        })
}

pub(crate) fn host_with_gc(files: &[(&str, &str)], gc: Option<GcHook>) -> (ScriptHost, Rc<Cell<usize>>) {
    let (world, constructed) = WorldModule::new();
    let host = ScriptHost::new(ScriptHostOptions {
        loader: Arc::new(loader(files)),
        resolver: ModuleResolver::new().with_module("world", world),
        gc,
    });
    (host, constructed)
}

pub(crate) fn host(files: &[(&str, &str)]) -> ScriptHost {
    host_with_gc(files, None).0
}

pub(crate) fn load(host: &mut ScriptHost, request: &str) -> (Pid, ScriptModule) {
    let pid = host.load(request, None).expect("load should pass");
    let module = host.module(pid).cloned().expect("module should be loaded");
    (pid, module)
}

pub(crate) fn spawn(host: &mut ScriptHost, kind: &str) -> ObjectId {
    host.spawn_object(kind, BTreeMap::new())
}

pub(crate) fn object_arg(object: ObjectId) -> HostArg {
    HostArg::Object(object)
}

/// Checks both directions of the local-mapping/registry correspondence.
pub(crate) fn assert_registry_consistent(host: &ScriptHost) {
    let registry = host.registry().borrow();
    for pid in host.pids() {
        let module = host.module(pid).expect("listed module");
        for (object, _) in module.references() {
            assert!(
                registry.is_owned_by(object, pid),
                "{} tracks {} but is not an owner",
                pid,
                object
            );
        }
        for object in registry.objects_owned_by(pid) {
            assert!(
                module.tracks(object),
                "{} owns {} but does not track it",
                pid,
                object
            );
        }
    }
}

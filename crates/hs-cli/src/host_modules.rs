use hs_core::{HostScriptError, ObjectId};
use hs_runtime::{ExecutionHandle, HostModule, ModuleResolver};
use rhai::{Dynamic, Engine, INT};

/// `require("basic")`: output and identity of the running script.
#[derive(Clone)]
pub(crate) struct Basic {
    handle: ExecutionHandle,
}

impl Basic {
    fn print(&self, value: Dynamic) {
        let text = value.to_string();
        tracing::debug!(pid = %self.handle.pid(), script = self.handle.script(), "{}", text);
        println!(
            "TEXT_JSON:{}",
            serde_json::to_string(&text).unwrap_or_else(|_| "\"\"".to_string())
        );
    }
}

pub(crate) struct BasicModule;

impl HostModule for BasicModule {
    fn register_api(&self, engine: &mut Engine) {
        engine
            .register_type_with_name::<Basic>("Basic")
            .register_get("pid", |basic: &mut Basic| basic.handle.pid().0 as INT)
            .register_fn("print", |basic: &mut Basic, value: Dynamic| basic.print(value));
    }

    fn construct(&self, handle: &ExecutionHandle) -> Result<Dynamic, HostScriptError> {
        Ok(Dynamic::from(Basic {
            handle: handle.clone(),
        }))
    }
}

/// `require("objects")`: spawn and look up host objects.
#[derive(Clone)]
pub(crate) struct Objects {
    handle: ExecutionHandle,
}

impl Objects {
    fn find(&self, id: INT) -> Dynamic {
        u64::try_from(id)
            .ok()
            .and_then(|id| self.handle.objects().get(ObjectId(id)))
            .map(Dynamic::from)
            .unwrap_or(Dynamic::UNIT)
    }
}

pub(crate) struct ObjectsModule;

impl HostModule for ObjectsModule {
    fn register_api(&self, engine: &mut Engine) {
        engine
            .register_type_with_name::<Objects>("Objects")
            .register_fn("spawn", |objects: &mut Objects, kind: &str| {
                objects.handle.objects().spawn(kind)
            })
            .register_fn("find", |objects: &mut Objects, id: INT| objects.find(id));
    }

    fn construct(&self, handle: &ExecutionHandle) -> Result<Dynamic, HostScriptError> {
        Ok(Dynamic::from(Objects {
            handle: handle.clone(),
        }))
    }
}

pub(crate) fn builtin_modules() -> ModuleResolver {
    ModuleResolver::new()
        .with_module("basic", BasicModule)
        .with_module("objects", ObjectsModule)
}

#[cfg(test)]
mod host_modules_tests {
    use super::*;
    use hs_core::Pid;
    use hs_runtime::HostObjects;

    #[test]
    fn builtin_table_lists_both_modules() {
        let resolver = builtin_modules();
        assert_eq!(
            resolver.ids(),
            vec!["basic".to_string(), "objects".to_string()]
        );
    }

    #[test]
    fn objects_wrapper_spawns_and_finds_through_the_handle() {
        let objects = HostObjects::new();
        let handle = ExecutionHandle::new(Pid(3), "main.rhai", objects.clone());
        let wrapper = ObjectsModule
            .construct(&handle)
            .expect("construct")
            .cast::<Objects>();

        let lamp = objects.spawn("lamp");
        let found = wrapper.find(lamp.id().0 as INT);
        assert_eq!(
            found.cast::<hs_runtime::EventObject>().kind(),
            "lamp"
        );
        assert!(wrapper.find(99).is_unit());
        assert!(wrapper.find(-1).is_unit());
    }
}

mod context;
mod convert;
mod host;
mod host_object;
mod module;
mod registry;
mod resolver;

pub use context::{ExecutionContext, ExecutionOutcome};
pub use convert::{dynamic_to_host_value, host_value_to_dynamic};
pub use host::{GcHook, ScriptHost, ScriptHostOptions, SHUTDOWN_EVENT};
pub use host_object::{
    EventObject, HostObjectHandle, HostObjects, Listener, ListenerTarget,
};
pub use module::{LocalReference, ModuleOptions, RuntimeEnv, ScriptModule};
pub use registry::{Owner, ReferenceRegistry, Release};
pub use resolver::{ExecutionHandle, HostModule, ModuleResolver};

#[cfg(test)]
mod runtime_test_support;

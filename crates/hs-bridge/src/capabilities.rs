use std::sync::Arc;

use hs_compiler::SourceLoader;
use hs_core::HostScriptError;
use hs_runtime::{GcHook, ModuleResolver};

/// Builds the host module table on the consumer thread.
pub type ModulesFactory = Arc<dyn Fn() -> ModuleResolver + Send + Sync>;

pub type FatalHook = Arc<dyn Fn(&HostScriptError) + Send + Sync>;

/// Default fatal disposition: log and terminate with a non-zero status.
pub fn exit_on_fatal(error: &HostScriptError) {
    tracing::error!(code = %error.code, "fatal error on the host channel: {}", error.message);
    std::process::exit(1);
}

/// Host capability table handed to [`crate::HostBridge::configure`].
#[derive(Clone)]
pub struct Capabilities {
    pub source: Arc<dyn SourceLoader>,
    pub gc: Option<GcHook>,
    pub modules: ModulesFactory,
    pub on_fatal: FatalHook,
}

impl Capabilities {
    pub fn new(source: Arc<dyn SourceLoader>, modules: ModulesFactory) -> Self {
        Self {
            source,
            gc: None,
            modules,
            on_fatal: Arc::new(exit_on_fatal),
        }
    }

    pub fn with_gc(mut self, gc: GcHook) -> Self {
        self.gc = Some(gc);
        self
    }

    pub fn with_fatal_hook(mut self, on_fatal: FatalHook) -> Self {
        self.on_fatal = on_fatal;
        self
    }
}

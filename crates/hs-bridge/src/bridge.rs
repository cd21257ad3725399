use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use hs_core::HostScriptError;
use hs_runtime::{ScriptHost, ScriptHostOptions};

use crate::capabilities::Capabilities;
use crate::channel::{open, HostCall, HostChannel, HostReply, Receiver};

/// Standard handling of every [`HostCall`].
pub fn dispatch_call(host: &mut ScriptHost, call: HostCall) -> Result<HostReply, HostScriptError> {
    match call {
        HostCall::Load { request, parent } => host.load(&request, parent).map(HostReply::Loaded),
        HostCall::Run { pid, args } => host.run(pid, &args).map(HostReply::Value),
        HostCall::LoadAndRun { request, args } => {
            let pid = host.load(&request, None)?;
            let value = host.run(pid, &args)?;
            Ok(HostReply::Ran { pid, value })
        }
        HostCall::Spawn { kind, props } => Ok(HostReply::Spawned(host.spawn_object(&kind, props))),
        HostCall::Emit {
            object,
            event,
            args,
        } => host.emit(object, &event, &args).map(HostReply::Delivered),
        HostCall::Despawn { object } => host.despawn(object).map(HostReply::Despawned),
        HostCall::Unload { pid } => host.unload(pid).map(HostReply::Unloaded),
        HostCall::Shutdown => host.shutdown().map(|_| HostReply::Stopped),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "script consumer panicked".to_string()
}

fn consume<F>(mut receiver: Receiver, capabilities: Capabilities, mut handler: F)
where
    F: FnMut(&mut ScriptHost, HostCall) -> Result<HostReply, HostScriptError>,
{
    let mut host = ScriptHost::new(ScriptHostOptions {
        loader: capabilities.source.clone(),
        resolver: (capabilities.modules)(),
        gc: capabilities.gc.clone(),
    });
    tracing::debug!("script consumer started");

    while let Some(envelope) = receiver.recv_blocking() {
        let name = envelope.call.name();
        let stopping = matches!(envelope.call, HostCall::Shutdown);
        tracing::debug!(call = name, "processing host call");

        let outcome = catch_unwind(AssertUnwindSafe(|| handler(&mut host, envelope.call)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let error = HostScriptError::new("BRIDGE_PANIC", panic_message(payload));
                (capabilities.on_fatal)(&error);
                return;
            }
        };

        match (envelope.reply, result) {
            (Some(reply), result) => {
                if reply.send(result).is_err() {
                    tracing::warn!(call = name, "requester went away before the reply");
                }
            }
            (None, Ok(_)) => {}
            (None, Err(error)) => {
                (capabilities.on_fatal)(&error);
                return;
            }
        }

        if stopping {
            break;
        }
    }
    tracing::debug!("script consumer stopped");
}

/// Boundary between the native host and the script side.
///
/// Configured once, then started once; every call goes through one channel
/// drained by a single consumer thread that owns all script state.
#[derive(Default)]
pub struct HostBridge {
    capabilities: Option<Capabilities>,
    channel: Option<HostChannel>,
    worker: Option<JoinHandle<()>>,
}

impl HostBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, capabilities: Capabilities) -> bool {
        if self.capabilities.is_some() {
            tracing::error!("host bridge is already configured");
            return false;
        }
        self.capabilities = Some(capabilities);
        true
    }

    /// Spawns the consumer; `handler` processes every channel item in order.
    pub fn start<F>(&mut self, handler: F, max_queue_size: usize) -> bool
    where
        F: FnMut(&mut ScriptHost, HostCall) -> Result<HostReply, HostScriptError> + Send + 'static,
    {
        let Some(capabilities) = self.capabilities.clone() else {
            tracing::error!("host bridge started before configure");
            return false;
        };
        if self.channel.is_some() {
            tracing::error!("host bridge is already started");
            return false;
        }

        let (channel, receiver) = match open(max_queue_size) {
            Ok(opened) => opened,
            Err(error) => {
                tracing::error!(%error, "host bridge channel could not be opened");
                return false;
            }
        };
        let spawned = thread::Builder::new()
            .name("hostscript-consumer".to_string())
            .spawn(move || consume(receiver, capabilities, handler));

        match spawned {
            Ok(worker) => {
                tracing::debug!(max_queue_size, "host bridge started");
                self.channel = Some(channel);
                self.worker = Some(worker);
                true
            }
            Err(error) => {
                tracing::error!(%error, "failed to spawn the script consumer");
                false
            }
        }
    }

    pub fn channel(&self) -> Option<HostChannel> {
        self.channel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.channel.is_some()
    }

    /// Sends the shutdown call and waits for the consumer to exit.
    pub fn stop(&mut self) -> Result<(), HostScriptError> {
        let Some(channel) = self.channel.take() else {
            return Ok(());
        };
        let result = channel.request(HostCall::Shutdown).map(|_| ());
        drop(channel);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("script consumer thread panicked");
            }
        }
        result
    }
}

impl Drop for HostBridge {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            tracing::warn!(%error, "host bridge stopped with an error");
        }
    }
}

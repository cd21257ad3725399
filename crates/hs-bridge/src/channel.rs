use std::collections::BTreeMap;

use hs_core::{HostArg, HostScriptError, HostValue, ObjectId, Pid};
use tokio::sync::{mpsc, oneshot, Semaphore};

/// A host→script call carried by the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Load {
        request: String,
        parent: Option<Pid>,
    },
    Run {
        pid: Pid,
        args: Vec<HostArg>,
    },
    LoadAndRun {
        request: String,
        args: Vec<HostArg>,
    },
    Spawn {
        kind: String,
        props: BTreeMap<String, HostValue>,
    },
    Emit {
        object: ObjectId,
        event: String,
        args: Vec<HostArg>,
    },
    Despawn {
        object: ObjectId,
    },
    Unload {
        pid: Pid,
    },
    Shutdown,
}

impl HostCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Run { .. } => "run",
            Self::LoadAndRun { .. } => "load_and_run",
            Self::Spawn { .. } => "spawn",
            Self::Emit { .. } => "emit",
            Self::Despawn { .. } => "despawn",
            Self::Unload { .. } => "unload",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostReply {
    Loaded(Pid),
    Value(HostValue),
    Ran { pid: Pid, value: HostValue },
    Spawned(ObjectId),
    Delivered(usize),
    Despawned(usize),
    Unloaded(usize),
    Stopped,
}

pub(crate) type ReplySender = oneshot::Sender<Result<HostReply, HostScriptError>>;

pub(crate) struct Envelope {
    pub(crate) call: HostCall,
    pub(crate) reply: Option<ReplySender>,
}

#[derive(Clone)]
enum Sender {
    Bounded(mpsc::Sender<Envelope>),
    Unbounded(mpsc::UnboundedSender<Envelope>),
}

pub(crate) enum Receiver {
    Bounded(mpsc::Receiver<Envelope>),
    Unbounded(mpsc::UnboundedReceiver<Envelope>),
}

impl Receiver {
    pub(crate) fn recv_blocking(&mut self) -> Option<Envelope> {
        match self {
            Self::Bounded(receiver) => receiver.blocking_recv(),
            Self::Unbounded(receiver) => receiver.blocking_recv(),
        }
    }
}

/// Largest bounded queue the channel can hold.
pub const MAX_QUEUE_SIZE: usize = Semaphore::MAX_PERMITS;

/// `max_queue_size == 0` means unbounded.
pub(crate) fn open(max_queue_size: usize) -> Result<(HostChannel, Receiver), HostScriptError> {
    if max_queue_size > MAX_QUEUE_SIZE {
        return Err(HostScriptError::new(
            "BRIDGE_QUEUE_SIZE",
            format!(
                "max queue size {} exceeds the limit of {}",
                max_queue_size, MAX_QUEUE_SIZE
            ),
        ));
    }

    if max_queue_size == 0 {
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok((
            HostChannel {
                sender: Sender::Unbounded(sender),
            },
            Receiver::Unbounded(receiver),
        ))
    } else {
        let (sender, receiver) = mpsc::channel(max_queue_size);
        Ok((
            HostChannel {
                sender: Sender::Bounded(sender),
            },
            Receiver::Bounded(receiver),
        ))
    }
}

fn closed() -> HostScriptError {
    HostScriptError::new("BRIDGE_CLOSED", "The script consumer is no longer running.")
}

/// Host-side handle to the serialized channel. Cheap to clone; usable from
/// any host thread, never from inside an async runtime.
#[derive(Clone)]
pub struct HostChannel {
    sender: Sender,
}

impl HostChannel {
    fn send(&self, envelope: Envelope) -> Result<(), HostScriptError> {
        match &self.sender {
            Sender::Bounded(sender) => sender.blocking_send(envelope).map_err(|_| closed()),
            Sender::Unbounded(sender) => sender.send(envelope).map_err(|_| closed()),
        }
    }

    /// Enqueues `call` and blocks until the consumer has processed it.
    pub fn request(&self, call: HostCall) -> Result<HostReply, HostScriptError> {
        let (reply, outcome) = oneshot::channel();
        self.send(Envelope {
            call,
            reply: Some(reply),
        })?;
        outcome.blocking_recv().map_err(|_| closed())?
    }

    /// Enqueues `call` without waiting. An error while processing it is fatal.
    pub fn post(&self, call: HostCall) -> Result<(), HostScriptError> {
        self.send(Envelope { call, reply: None })
    }
}

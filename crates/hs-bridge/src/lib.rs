mod bridge;
mod capabilities;
mod channel;

pub use bridge::{dispatch_call, HostBridge};
pub use capabilities::{exit_on_fatal, Capabilities, FatalHook, ModulesFactory};
pub use channel::{HostCall, HostChannel, HostReply, MAX_QUEUE_SIZE};

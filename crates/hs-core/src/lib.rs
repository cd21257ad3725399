pub mod error;
pub mod types;
pub mod value;

pub use error::HostScriptError;
pub use types::*;
pub use value::*;

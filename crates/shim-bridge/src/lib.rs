//! shim-bridge: run agent actions and compound filters through the ruby
//! compatibility shim.
//!
//! Every call spawns the shim, exchanges exactly one JSON document over
//! stdin/stdout and is bounded by a hard timeout.

pub mod codec;
pub mod compound;
pub mod config;
mod error;
pub mod invoker;
pub mod preflight;
pub mod protocol;
mod shim;

pub use compound::{PARSE_TIMEOUT, ShimRunner};
pub use config::ShimConfig;
pub use error::{ErrorKind, Result, ShimError};
pub use invoker::{DirectSpawner, Invoker, Mode, ProcessSpawner, invoke};
pub use protocol::{ActionReply, CallStack, Request, RequestBody, RequestId, ValidateReply};
pub use shim::Shim;

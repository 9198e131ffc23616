//! Session engine: the global [`context::Context`], per-port
//! interface handling, the session registry and state machines, the A10NSP
//! terminator, the traffic generator/verifier, and the JSON control socket.
//! Everything the daemon binary drives is reached through `Context`.

pub mod a10nsp;
pub mod context;
pub mod ctrl;
pub mod debug;
pub mod error;
pub mod interface;
pub mod registry;
pub mod session;
pub mod traffic;

pub use a10nsp::A10nspTerminator;
pub use context::{Context, GlobalCounters};
pub use error::Error;
pub use interface::{Interface, InterfacePort, LoopbackPort};
pub use registry::Registry;

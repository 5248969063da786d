//! Built-in stages, added by [`ChainBuilder::builtins`](crate::ChainBuilder::builtins)
//! in the order listed.

pub mod instrument;
pub mod logging;
pub mod tracing;

pub use instrument::Instrument;
pub use logging::Logging;
pub use tracing::{current_context, TraceContext};

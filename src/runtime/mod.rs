//! # Runtime
//!
//! Process bootstrap and the controller watch loop.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{init_tracing, initialize, InitializationResult};
pub use watch_loop::{run_watch_loop, InstalledKinds};

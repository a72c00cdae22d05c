//! Infrastructure layer: concrete implementations of the application ports.
//!
//! Nothing outside `commands` and `app` should name these types directly.

pub mod audit;
pub mod clock;
pub mod command_runner;
pub mod registry;
pub mod remote_executor;
pub mod settings;

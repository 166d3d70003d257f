//! Fetch tasks and the registry that tracks them.

pub mod registry;
pub mod task;

pub use registry::FetchRegistry;
pub use task::{FetchMode, FetchTask, Outcome, TaskContext, TaskState};

pub mod project;
pub mod task;
pub(crate) mod timestamp;

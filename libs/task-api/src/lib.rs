//! Client for the task orchestration API.
//!
//! The server owns the whole task life cycle. This crate fetches and drives it:
//! typed requests for projects, tasks, plans and reports, the approval action
//! for plans awaiting review, and [`poll`] sessions that follow one task until
//! it reaches a terminal status.

mod client;
pub mod poll;
pub mod progress;
mod result;
pub mod types;

pub use client::Client;
pub use poll::{start_polling, PollEvent, PollHandle, PollOutcome, StatusSource};
pub use progress::{derive_phase_progress, PhaseProgress};
pub use result::{ClientError, Result};

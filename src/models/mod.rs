//! Domain models for the spy cat agency.
//!
//! # Core Concepts
//!
//! - [`Cat`]: An agent on the payroll. Only the salary changes after hiring.
//! - [`Mission`]: A job with one to three [`Target`]s, optionally assigned to a cat.
//!   A mission is complete once every one of its targets is complete.
//! - [`Target`]: Someone to watch. Owned by exactly one mission and deleted with it.
//!
//! A cat may hold at most one *active* (incomplete) mission at a time.

mod cat;
mod mission;
mod target;

pub use cat::*;
pub use mission::*;
pub use target::*;

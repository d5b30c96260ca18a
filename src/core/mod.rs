//! Core business logic, independent of the HTTP layer.
//!
//! Everything here takes a `&DatabaseConnection` (or no storage at all) and
//! returns the crate [`Result`](crate::errors::Result), so handlers stay thin.

pub mod counts;
pub mod draft;
pub mod export;
pub mod guard;
pub mod key;
pub mod pricing;
pub mod tally;
pub mod user;

//! A normalized GraphQL response cache driven by compiled query plans.
//!
//! A selection tree is compiled once into a [`QueryPlan`]. The plan then drives
//! [`write`], which flattens responses into a [`Snapshot`] of entity records, and
//! [`read`], which rebuilds responses from a snapshot.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]

pub mod configuration;
mod entity;
mod error;
mod json_ext;
mod plan;
mod plan_cache;
mod read;
mod snapshot;
mod spec;
mod store;
#[cfg(test)]
mod test_utils;
mod write;

pub use entity::*;
pub use error::*;
pub use json_ext::*;
pub use plan::*;
pub use plan_cache::*;
pub use read::*;
pub use snapshot::*;
pub use spec::*;
pub use store::*;
pub use write::*;

//! color
//!
//! Boundary to the color-science collaborator.
//!
//! # Modules
//!
//! - `traits`: the [`ColorMath`] trait and [`ColorMathError`]
//! - [`mock`]: deterministic implementation for tests
//!
//! Hosts pass their own implementation to
//! [`TokenRegistry::new`](crate::registry::TokenRegistry::new); nothing in
//! the engine selects the mock on its own.

pub mod mock;
mod traits;

pub use traits::*;

//! rafters-tokens - dependency graph and rule engine for design tokens
//!
//! A design system is a set of named tokens (colors, spacing, type sizes,
//! ...). Some are literals; others are computed from other tokens by
//! declarative rules such as `state(primary, 1.1, hover)` or
//! `calc({spacing-base} * 2)`. This crate tracks which tokens depend on
//! which, rejects cycles when edges are inserted, and recomputes tokens in
//! dependency order when something upstream changes.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, dependency graph, configuration, verification
//! - [`rules`] - Rule language: parser, expression tree, executor, plugins
//! - [`color`] - Color-math collaborator boundary and a deterministic mock
//! - [`registry`] - Token registry: load, update, regenerate
//!
//! # Correctness Invariants
//!
//! 1. The dependency graph is acyclic at all times
//! 2. A batch rejected for a parse or graph error leaves the registry untouched
//! 3. Regeneration touches only the dependents of the changed token
//! 4. Evaluation is deterministic for a given collaborator

pub mod color;
pub mod core;
pub mod registry;
pub mod rules;

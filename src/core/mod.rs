//! core
//!
//! Core domain types, the dependency graph, configuration and
//! verification.
//!
//! # Modules
//!
//! - [`types`] - Strong types: TokenName, Namespace, TokenValue, etc.
//! - [`graph`] - Token dependency graph with insertion-time cycle rejection
//! - [`config`] - Configuration schema and loading
//! - [`verify`] - Fast verification of registry invariants
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - All verification is deterministic

pub mod config;
pub mod graph;
pub mod types;
pub mod verify;

//! Quota manager service library.
//!
//! This crate primarily ships a `quota-manager` binary, but exposes its
//! modules to enable integration testing against the in-memory cluster.

pub mod api;
pub mod audit;
pub mod cluster;
pub mod config;
pub mod context;
pub mod identity;
pub mod reconciler;
pub mod registry;
pub mod state;

//! # qm-id
//!
//! Validated names and request IDs for the quota manager.
//!
//! ## Design Principles
//!
//! - Names that end up in cluster API paths are validated before use
//! - Every name type has a strict `parse` and roundtrips through `Display`
//! - Types are distinct so a username cannot be passed where a project
//!   name is expected
//!
//! ## Name Rules
//!
//! | Type          | Pattern                              | Length |
//! |---------------|--------------------------------------|--------|
//! | `ClusterId`   | `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$`    | 1-63   |
//! | `ProjectName` | `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$`    | 2-63   |
//! | `Username`    | `^[^/%\s]+$`                         | 1-253  |
//! | `LabelKey`    | optional DNS prefix + `/` + name token | 1-317  |

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

#[doc(hidden)]
pub use regex;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;

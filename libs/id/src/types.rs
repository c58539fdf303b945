//! Name and ID definitions.
//!
//! Names are user or operator controlled and validated against the rules
//! the cluster API enforces for the same objects, so invalid input is
//! rejected before any cluster call is made.

use crate::define_name;

// =============================================================================
// Clusters and Projects
// =============================================================================

define_name!(
    ClusterId,
    "cluster id",
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$",
    1,
    63
);

// Project names are Kubernetes namespace names (DNS-1123 labels).
define_name!(
    ProjectName,
    "project name",
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$",
    2,
    63
);

// =============================================================================
// Users
// =============================================================================

define_name!(Username, "username", r"^[^/%\s]+$", 1, 253);

// =============================================================================
// Labels
// =============================================================================

// Optional DNS subdomain prefix, then a name token of at most 63 characters.
define_name!(
    LabelKey,
    "label key",
    r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?$",
    1,
    317
);

// =============================================================================
// Requests
// =============================================================================

/// Identifier attached to every handled request and its log lines.
///
/// Format: `req_{ulid}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(crate::Ulid);

impl RequestId {
    pub const PREFIX: &'static str = "req";

    #[must_use]
    pub fn new() -> Self {
        Self(crate::Ulid::new())
    }

    pub fn parse(s: &str) -> Result<Self, crate::IdError> {
        let ulid = s
            .strip_prefix("req_")
            .and_then(|rest| rest.parse::<crate::Ulid>().ok())
            .ok_or_else(|| crate::IdError::InvalidRequestId(s.to_string()))?;
        Ok(Self(ulid))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", Self::PREFIX, self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = crate::IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Tests
// =============================================================================

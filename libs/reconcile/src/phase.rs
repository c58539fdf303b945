use std::fmt;

/// Stages of a quota write.
///
/// ```text
/// Received -> Validated -> Fetched -> Diffed -> Applying -> Applied
///     \            \           \         \          \
///      `-----------`-----------`---------`----------`--> Rejected | Failed
/// ```
///
/// `Rejected` is reached only before any patch is sent; `Failed` may follow
/// partially applied patches, which are not rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilePhase {
    Received,
    Validated,
    Fetched,
    Diffed,
    Applying,
    Applied,
    Rejected,
    Failed,
}

impl ReconcilePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Fetched => "fetched",
            Self::Diffed => "diffed",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied | Self::Rejected | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal step.
    pub fn can_advance_to(&self, next: ReconcilePhase) -> bool {
        use ReconcilePhase::*;
        match (self, next) {
            (Received, Validated)
            | (Validated, Fetched)
            | (Fetched, Diffed)
            | (Diffed, Applying)
            | (Applying, Applied) => true,
            (Received | Validated | Fetched | Diffed, Rejected) => true,
            (Received | Validated | Fetched | Diffed | Applying, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_happy_path() {
        let path = [
            ReconcilePhase::Received,
            ReconcilePhase::Validated,
            ReconcilePhase::Fetched,
            ReconcilePhase::Diffed,
            ReconcilePhase::Applying,
            ReconcilePhase::Applied,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(ReconcilePhase::Applied.is_terminal());
    }

    #[rstest]
    #[case(ReconcilePhase::Applying, ReconcilePhase::Rejected)]
    #[case(ReconcilePhase::Applied, ReconcilePhase::Failed)]
    #[case(ReconcilePhase::Received, ReconcilePhase::Fetched)]
    #[case(ReconcilePhase::Rejected, ReconcilePhase::Validated)]
    fn test_illegal_steps(#[case] from: ReconcilePhase, #[case] to: ReconcilePhase) {
        assert!(!from.can_advance_to(to));
    }
}

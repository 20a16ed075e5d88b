//! Types reported by the teardown coordinator.

use std::fmt;

use camino::Utf8PathBuf;

use crate::control::AuthorizerPart;

/// A resource the coordinator tried to remove.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TeardownResource {
    /// Gateway target.
    Target {
        /// Owning gateway.
        gateway_id: String,
        /// Target identifier.
        target_id: String,
    },
    /// MCP gateway.
    Gateway {
        /// Gateway identifier.
        gateway_id: String,
    },
    /// Piece of the OAuth authorizer.
    Authorizer(AuthorizerPart),
    /// The checkpoint file itself.
    Checkpoint {
        /// Checkpoint location.
        path: Utf8PathBuf,
    },
}

impl fmt::Display for TeardownResource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target { target_id, .. } => write!(formatter, "target {target_id}"),
            Self::Gateway { gateway_id } => write!(formatter, "gateway {gateway_id}"),
            Self::Authorizer(part) => part.fmt(formatter),
            Self::Checkpoint { path } => write!(formatter, "checkpoint {path}"),
        }
    }
}

/// A deletion that did not succeed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TeardownFailure {
    /// Resource that could not be removed.
    pub resource: TeardownResource,
    /// Error reported for the attempt.
    pub message: String,
}

/// Summary of a teardown pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeardownReport {
    /// Resources removed, in deletion order.
    pub deleted: Vec<TeardownResource>,
    /// Deletions that failed; none of them stopped the pass.
    pub failures: Vec<TeardownFailure>,
    /// Whether a checkpoint file was removed.
    pub checkpoint_removed: bool,
}

impl TeardownReport {
    /// Returns `true` when every attempted deletion succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

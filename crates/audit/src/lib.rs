//! Scoring of membership-inference attacks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod auditor;
mod metrics;

pub use auditor::{AuditSummary, Auditor};
pub use metrics::{ConfusionCounts, MembershipMetrics};

/// Common imports for auditing.
pub mod prelude {
    pub use crate::{AuditSummary, Auditor, ConfusionCounts, MembershipMetrics};
}

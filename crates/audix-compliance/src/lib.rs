//! # Audix Compliance
//!
//! Retention and compliance evaluation over sealed audit events.
//!
//! Features:
//! - [`RetentionEvaluator`] — policy-driven retain/archive/delete
//!   decisions honoring legal holds
//! - [`RetentionPolicy`] — versioned, immutable policy records
//! - [`LegalHold`] / [`HoldScope`] — administrative deletion pins
//! - [`ComplianceEvaluator`] — GDPR/TCPA relevance and legal-basis
//!   validity predicates

pub mod evaluator;
pub mod legal_hold;
pub mod retention;

pub use evaluator::ComplianceEvaluator;
pub use legal_hold::{HoldScope, LegalHold};
pub use retention::{RetentionDecision, RetentionEvaluator, RetentionPolicy};

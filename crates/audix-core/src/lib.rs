//! # Audix Core
//!
//! Core types for the Audix audit log: the immutable event model,
//! deterministic hashing, and hash-chain sealing.
//!
//! ## Key Types
//!
//! - [`Event`] — one audited action at one instant
//! - [`EventBuilder`] — fluent, validating construction with domain factories
//! - [`UnsealedEvent`] / [`SealedEvent`] — the pre-seal/post-seal states
//! - [`ChainBuilder`] — assigns sequence numbers and links hashes
//! - [`Hash`] — SHA-256 digest, hex on the wire
//!
//! ## Quick Start
//!
//! ```rust
//! use audix_core::{ChainBuilder, EventBuilder};
//!
//! let mut chain = ChainBuilder::new();
//!
//! let event = EventBuilder::consent_granted("subject-1", "+15551230000")
//!     .request_id("req-77")
//!     .build()
//!     .expect("valid event");
//!
//! let sealed = chain.seal(event).expect("sealed");
//! assert_eq!(sealed.sequence_num, 1);
//! assert!(sealed.is_sealed());
//! ```

pub mod builder;
pub mod canonical;
pub mod chain;
pub mod error;
pub mod event;
pub mod event_type;
pub mod hash;
pub mod signature;

pub use builder::EventBuilder;
pub use canonical::{canonical_bytes, event_digest, slice_digest};
pub use chain::{ChainBuilder, ChainTail, SealBatchError};
pub use error::{ChainError, ValidationError};
pub use event::{
    flags, redact_metadata, retention_floor_days, Actor, ComplianceMetadata, Correlation,
    ErrorDetail, Event, SealedEvent, ServiceMetadata, Target, UnsealedEvent,
};
pub use event_type::{
    ActorKind, DataClass, EventCategory, EventResult, EventType, LegalBasis, Severity, TargetKind,
};
pub use hash::Hash;
pub use signature::{Signature, SignatureError};

//! Closed enumerations for the event model: event kinds and their
//! categories, severity levels, outcome codes, actor/target kinds,
//! data classifications and legal bases.
//!
//! Every enum carries a stable snake_case wire code used both by the
//! durability format and by the canonical hash form, so variants must
//! never be renamed once released.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Category an event type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Consent,
    DataAccess,
    Call,
    Configuration,
    Security,
    Marketplace,
    Financial,
    Dnc,
    System,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consent => "consent",
            Self::DataAccess => "data_access",
            Self::Call => "call",
            Self::Configuration => "configuration",
            Self::Security => "security",
            Self::Marketplace => "marketplace",
            Self::Financial => "financial",
            Self::Dnc => "dnc",
            Self::System => "system",
        }
    }
}

/// The closed catalog of audited event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Consent lifecycle
    ConsentGranted,
    ConsentRevoked,
    ConsentUpdated,
    ConsentExpired,
    // Data access
    DataAccessed,
    DataExported,
    DataModified,
    DataDeleted,
    // Call lifecycle
    CallInitiated,
    CallRouted,
    CallCompleted,
    CallFailed,
    // Configuration
    ConfigChanged,
    RoutingRuleUpdated,
    // Security / auth
    AuthSuccess,
    AuthFailure,
    AccessDenied,
    PermissionGranted,
    PermissionRevoked,
    // Marketplace
    BidPlaced,
    BidWon,
    BidLost,
    AuctionCreated,
    AuctionClosed,
    // Financial
    PaymentProcessed,
    PaymentFailed,
    TransactionCreated,
    TransactionReversed,
    // Do-not-call registry
    DncChecked,
    DncNumberAdded,
    DncNumberRemoved,
    // System
    ApiCall,
    SystemStartup,
    SystemShutdown,
    ChainRepaired,
    MaintenancePerformed,
}

impl EventType {
    /// Stable wire code. Also the `type` value in the canonical hash form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentGranted => "consent_granted",
            Self::ConsentRevoked => "consent_revoked",
            Self::ConsentUpdated => "consent_updated",
            Self::ConsentExpired => "consent_expired",
            Self::DataAccessed => "data_accessed",
            Self::DataExported => "data_exported",
            Self::DataModified => "data_modified",
            Self::DataDeleted => "data_deleted",
            Self::CallInitiated => "call_initiated",
            Self::CallRouted => "call_routed",
            Self::CallCompleted => "call_completed",
            Self::CallFailed => "call_failed",
            Self::ConfigChanged => "config_changed",
            Self::RoutingRuleUpdated => "routing_rule_updated",
            Self::AuthSuccess => "auth_success",
            Self::AuthFailure => "auth_failure",
            Self::AccessDenied => "access_denied",
            Self::PermissionGranted => "permission_granted",
            Self::PermissionRevoked => "permission_revoked",
            Self::BidPlaced => "bid_placed",
            Self::BidWon => "bid_won",
            Self::BidLost => "bid_lost",
            Self::AuctionCreated => "auction_created",
            Self::AuctionClosed => "auction_closed",
            Self::PaymentProcessed => "payment_processed",
            Self::PaymentFailed => "payment_failed",
            Self::TransactionCreated => "transaction_created",
            Self::TransactionReversed => "transaction_reversed",
            Self::DncChecked => "dnc_checked",
            Self::DncNumberAdded => "dnc_number_added",
            Self::DncNumberRemoved => "dnc_number_removed",
            Self::ApiCall => "api_call",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
            Self::ChainRepaired => "chain_repaired",
            Self::MaintenancePerformed => "maintenance_performed",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Self::ConsentGranted | Self::ConsentRevoked | Self::ConsentUpdated | Self::ConsentExpired => {
                EventCategory::Consent
            }
            Self::DataAccessed | Self::DataExported | Self::DataModified | Self::DataDeleted => {
                EventCategory::DataAccess
            }
            Self::CallInitiated | Self::CallRouted | Self::CallCompleted | Self::CallFailed => {
                EventCategory::Call
            }
            Self::ConfigChanged | Self::RoutingRuleUpdated => EventCategory::Configuration,
            Self::AuthSuccess
            | Self::AuthFailure
            | Self::AccessDenied
            | Self::PermissionGranted
            | Self::PermissionRevoked => EventCategory::Security,
            Self::BidPlaced | Self::BidWon | Self::BidLost | Self::AuctionCreated | Self::AuctionClosed => {
                EventCategory::Marketplace
            }
            Self::PaymentProcessed
            | Self::PaymentFailed
            | Self::TransactionCreated
            | Self::TransactionReversed => EventCategory::Financial,
            Self::DncChecked | Self::DncNumberAdded | Self::DncNumberRemoved => EventCategory::Dnc,
            Self::ApiCall
            | Self::SystemStartup
            | Self::SystemShutdown
            | Self::ChainRepaired
            | Self::MaintenancePerformed => EventCategory::System,
        }
    }

    /// Baseline severity before the outcome is taken into account.
    pub fn base_severity(&self) -> Severity {
        match self {
            Self::AuthFailure | Self::AccessDenied => Severity::Warning,
            Self::CallFailed | Self::PaymentFailed => Severity::Error,
            Self::ChainRepaired => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Per-type retention floor in days.
    ///
    /// Security/auth events: 3 years. Financial events: 8 years.
    /// Deletion records: 10 years. Everything else: 7 years.
    pub fn retention_floor_days(&self) -> u32 {
        match self.category() {
            EventCategory::Security => 1095,
            EventCategory::Financial => 2920,
            _ if *self == Self::DataDeleted => 3650,
            _ => 2555,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| ValidationError::InvalidEventType(s.to_string()))
    }
}

/// Severity of an audited action, ranked low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Numeric rank, 0 (info) through 3 (critical).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Warning => 1,
            Self::Error => 2,
            Self::Critical => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResult {
    Success,
    Failure,
    Partial,
    Pending,
    Timeout,
    Cancelled,
}

impl EventResult {
    /// Stable wire code. Also the `result` value in the canonical hash form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
            Self::Pending => "pending",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Severity the outcome demands at minimum.
    pub fn min_severity(&self) -> Severity {
        match self {
            Self::Failure | Self::Timeout => Severity::Error,
            Self::Partial | Self::Cancelled => Severity::Warning,
            Self::Success | Self::Pending => Severity::Info,
        }
    }
}

impl fmt::Display for EventResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    User,
    System,
    Api,
    Service,
    Admin,
    Guest,
    Bot,
    Scheduler,
}

/// What the audited action was performed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    User,
    Call,
    Bid,
    Auction,
    Account,
    PhoneNumber,
    Consent,
    Transaction,
    Configuration,
    DncEntry,
    System,
}

/// Classification of the data an event touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    PersonalData,
    SensitiveData,
    PhoneNumber,
    Email,
    IpAddress,
    LocationData,
    FinancialData,
    HealthData,
    BiometricData,
    /// Technical/operational records carrying no subject data.
    OperationalData,
}

impl DataClass {
    /// Whether the class places the event under GDPR obligations.
    pub fn gdpr_relevant(&self) -> bool {
        !matches!(self, Self::OperationalData)
    }

    /// Per-class retention floor in days.
    pub fn retention_floor_days(&self) -> u32 {
        match self {
            Self::FinancialData => 3650,
            _ => 2555,
        }
    }
}

/// GDPR Article 6 processing bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalBasis {
    Consent,
    Contract,
    LegalObligation,
    VitalInterests,
    PublicTask,
    LegitimateInterests,
}

impl LegalBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consent => "consent",
            Self::Contract => "contract",
            Self::LegalObligation => "legal_obligation",
            Self::VitalInterests => "vital_interests",
            Self::PublicTask => "public_task",
            Self::LegitimateInterests => "legitimate_interests",
        }
    }
}

//! Luzmo REST API access
//!
//! Typed models of the platform's JSON, credential rotation, and a pooled
//! client whose every call goes through the resilience layer.

pub mod client;
pub mod constants;
pub mod credentials;
pub mod models;
pub mod resilience;

pub use client::LuzmoClient;
pub use credentials::CredentialPool;
pub use models::{
    ColumnDetail, ColumnProperties, CredentialPair, DashboardDocument, DashboardFilter,
    DatasetSchema, HierarchyDetail, HierarchyNode, SchemaColumn,
};
pub use resilience::{
    ApiLogger, CallFailure, CallOutcome, FailureKind, LogLevel, MonitoringConfig,
    OperationContext, ResilienceConfig, RetryConfig, RetryPolicy, RunDeadline,
};

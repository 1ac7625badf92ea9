//! External-service plugin boundary: enrichment/validation calls the
//! engine may make mid-resolution (address verification, ML scoring,
//! third-party lookups), wrapped by [`crate::resilience`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::error::ResolverError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Enrichment,
    Validation,
    MlScoring,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPoint {
    PreMatch,
    PostMatch,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Reject,
    Continue,
    Flag,
}

/// Per-plugin orchestration policy: when it runs, how its failure is
/// handled, and the resilience parameters it runs under.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub execution_point: ExecutionPoint,
    pub on_failure: OnFailure,
    pub timeout: Duration,
    pub retry: crate::resilience::RetryConfig,
    pub cache: bool,
    pub priority: i64,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub correlation_id: String,
    pub cancellation: CancellationToken,
    pub record_snapshot: Record,
}

#[derive(Debug, Clone)]
pub struct ServiceResult {
    pub success: bool,
    pub data: Option<JsonValue>,
    pub error: Option<String>,
    pub timing: Duration,
    pub cached: bool,
    pub metadata: Option<JsonValue>,
}

impl ServiceResult {
    pub fn ok(data: JsonValue, timing: Duration) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timing,
            cached: false,
            metadata: None,
        }
    }

    pub fn failed(error: impl Into<String>, timing: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timing,
            cached: false,
            metadata: None,
        }
    }
}

#[async_trait]
pub trait ExternalServicePlugin: Send + Sync {
    fn name(&self) -> &str;
    fn service_type(&self) -> ServiceType;
    async fn execute(&self, input: &JsonValue, context: &ServiceContext) -> Result<ServiceResult, ResolverError>;

    /// Default health check assumes the service is healthy; plugins that
    /// front a real dependency should override this with a cheap probe.
    async fn health_check(&self) -> Result<bool, ResolverError> {
        Ok(true)
    }
}

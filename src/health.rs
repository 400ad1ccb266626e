//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::database::repository::TransactionStore;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    store: Arc<dyn TransactionStore>,
    check_timeout: Duration,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            store,
            check_timeout: Duration::from_secs(5),
        }
    }

    /// Check every dependency the request path needs
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let started = Instant::now();

        match timeout(self.check_timeout, self.store.ping()).await {
            Ok(Ok(())) => {
                let response_time = started.elapsed().as_millis();
                health_status.checks.insert(
                    "transaction_store".to_string(),
                    ComponentHealth::up(Some(response_time)),
                );
                info!("Transaction store health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "transaction_store".to_string(),
                    ComponentHealth::down(Some(e.to_string())),
                );
                error!("Transaction store health check failed: {}", e);
            }
            Err(_) => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "transaction_store".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Transaction store health check timed out");
            }
        }

        health_status
    }
}

//! Health check runner: HTTP, named-function, and query probes with
//! timeout, retries, and worst-status aggregation

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Aggregated probe status. Ordering matters: the final status of a
/// check run is the worst across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckType {
    Http,
    Function,
    Query,
}

/// Probe configuration attached to a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(rename = "type")]
    pub check_type: HealthCheckType,
    pub endpoint: Option<String>,
    pub function_name: Option<String>,
    pub query: Option<String>,
    pub timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl HealthCheckConfig {
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            check_type: HealthCheckType::Http,
            endpoint: Some(endpoint.into()),
            function_name: None,
            query: None,
            timeout_ms: 5_000,
            retries: 0,
            retry_delay_ms: 0,
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self {
            check_type: HealthCheckType::Function,
            endpoint: None,
            function_name: Some(name.into()),
            query: None,
            timeout_ms: 5_000,
            retries: 0,
            retry_delay_ms: 0,
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            check_type: HealthCheckType::Query,
            endpoint: None,
            function_name: None,
            query: Some(query.into()),
            timeout_ms: 5_000,
            retries: 0,
            retry_delay_ms: 0,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Exactly one probe target must be populated, and the timeout must
    /// be positive.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("health check timeout_ms must be > 0".to_string());
        }
        let expected = match self.check_type {
            HealthCheckType::Http => ("endpoint", self.endpoint.is_some()),
            HealthCheckType::Function => ("function_name", self.function_name.is_some()),
            HealthCheckType::Query => ("query", self.query.is_some()),
        };
        let populated = [
            self.endpoint.is_some(),
            self.function_name.is_some(),
            self.query.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();
        if populated != 1 || !expected.1 {
            return Err(format!(
                "health check of type {:?} requires exactly the {} field",
                self.check_type, expected.0
            ));
        }
        Ok(())
    }
}

/// One recorded probe attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAttempt {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub latency_ms: u64,
}

/// Result of a full check run: ordered attempts, worst status, wall time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: Vec<CheckAttempt>,
    pub total_latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Single-attempt result, used by providers reporting connectivity.
    pub fn single(status: HealthStatus, message: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            status,
            checks: vec![CheckAttempt {
                status,
                message: Some(message.into()),
                latency_ms,
            }],
            total_latency_ms: latency_ms,
            checked_at: Utc::now(),
        }
    }
}

/// What a probe reports back.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl ProbeResponse {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn with_status(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

/// A registered named health function.
pub type HealthProbe =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<ProbeResponse>> + Send + Sync>;

/// Executes parameterized health queries against the embedder's store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> anyhow::Result<ProbeResponse>;
}

/// Runs health checks. Pure with respect to engine state; never mutates
/// schedules.
pub struct HealthCheckRunner {
    http: reqwest::Client,
    functions: RwLock<HashMap<String, HealthProbe>>,
    query_executor: RwLock<Option<Arc<dyn QueryExecutor>>>,
}

impl HealthCheckRunner {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            functions: RwLock::new(HashMap::new()),
            query_executor: RwLock::new(None),
        }
    }

    pub fn register_function(&self, name: impl Into<String>, probe: HealthProbe) {
        self.functions.write().insert(name.into(), probe);
    }

    pub fn set_query_executor(&self, executor: Arc<dyn QueryExecutor>) {
        *self.query_executor.write() = Some(executor);
    }

    /// Run up to `1 + retries` attempts, stopping on the first healthy
    /// result. The aggregated status is the worst across attempts; the
    /// total latency is the elapsed wall time over all of them.
    pub async fn run(&self, config: &HealthCheckConfig) -> HealthCheckResult {
        let started = Instant::now();
        let attempts = config.retries.saturating_add(1);
        let mut checks: Vec<CheckAttempt> = Vec::with_capacity(attempts as usize);

        for attempt in 0..attempts {
            let attempt_start = Instant::now();
            let outcome = tokio::time::timeout(
                Duration::from_millis(config.timeout_ms),
                self.probe(config),
            )
            .await;

            let (status, message) = match outcome {
                Ok(Ok(response)) => (response.status, response.message),
                Ok(Err(e)) => (HealthStatus::Unhealthy, Some(e.to_string())),
                Err(_) => (
                    HealthStatus::Unhealthy,
                    Some(format!("probe timed out after {}ms", config.timeout_ms)),
                ),
            };

            checks.push(CheckAttempt {
                status,
                message,
                latency_ms: attempt_start.elapsed().as_millis() as u64,
            });

            if status == HealthStatus::Healthy {
                break;
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
            }
        }

        let status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Unhealthy);

        HealthCheckResult {
            status,
            checks,
            total_latency_ms: started.elapsed().as_millis() as u64,
            checked_at: Utc::now(),
        }
    }

    async fn probe(&self, config: &HealthCheckConfig) -> anyhow::Result<ProbeResponse> {
        match config.check_type {
            HealthCheckType::Http => {
                let endpoint = config
                    .endpoint
                    .as_deref()
                    .context("http health check requires an endpoint")?;
                let response = self.http.get(endpoint).send().await?;
                let code = response.status();
                if code.is_success() {
                    Ok(ProbeResponse::healthy())
                } else if code.is_server_error() || code.as_u16() == 429 {
                    Ok(ProbeResponse::with_status(
                        HealthStatus::Unhealthy,
                        format!("endpoint returned {}", code),
                    ))
                } else {
                    Ok(ProbeResponse::with_status(
                        HealthStatus::Degraded,
                        format!("endpoint returned {}", code),
                    ))
                }
            }
            HealthCheckType::Function => {
                let name = config
                    .function_name
                    .as_deref()
                    .context("function health check requires a function_name")?;
                let probe = { self.functions.read().get(name).cloned() };
                let probe =
                    probe.with_context(|| format!("health function not registered: {name}"))?;
                probe().await
            }
            HealthCheckType::Query => {
                let query = config
                    .query
                    .as_deref()
                    .context("query health check requires a query")?;
                let executor = { self.query_executor.read().clone() };
                let executor = executor.context("no query executor configured")?;
                executor.execute(query).await
            }
        }
    }
}

impl Default for HealthCheckRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_returning(status: HealthStatus) -> HealthProbe {
        Arc::new(move || {
            Box::pin(async move {
                Ok(ProbeResponse::with_status(status, "stub probe"))
            })
        })
    }

    #[test]
    fn test_worst_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
    }

    #[test]
    fn test_config_validation() {
        assert!(HealthCheckConfig::http("http://localhost/health")
            .validate()
            .is_ok());
        assert!(HealthCheckConfig::function("noop_ok").validate().is_ok());

        let mut bad = HealthCheckConfig::http("http://localhost/health");
        bad.timeout_ms = 0;
        assert!(bad.validate().is_err());

        // two targets populated
        let mut two = HealthCheckConfig::http("http://localhost/health");
        two.function_name = Some("also".to_string());
        assert!(two.validate().is_err());

        // wrong target for the type
        let mut wrong = HealthCheckConfig::function("probe");
        wrong.function_name = None;
        wrong.endpoint = Some("http://localhost".to_string());
        assert!(wrong.validate().is_err());
    }

    #[tokio::test]
    async fn test_function_probe_healthy() {
        let runner = HealthCheckRunner::new();
        runner.register_function("noop_ok", probe_returning(HealthStatus::Healthy));

        let config = HealthCheckConfig::function("noop_ok")
            .with_timeout_ms(1_000)
            .with_retries(1, 10);
        let result = runner.run(&config).await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.checks.len(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_exhausts_retries_and_aggregates_worst() {
        let runner = HealthCheckRunner::new();
        runner.register_function("down", probe_returning(HealthStatus::Unhealthy));

        let config = HealthCheckConfig::function("down")
            .with_timeout_ms(1_000)
            .with_retries(2, 1);
        let result = runner.run(&config).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert_eq!(result.checks.len(), 3);
    }

    #[tokio::test]
    async fn test_degraded_is_not_retried_into_healthy() {
        let runner = HealthCheckRunner::new();
        runner.register_function("flaky", probe_returning(HealthStatus::Degraded));

        let config = HealthCheckConfig::function("flaky").with_retries(1, 1);
        let result = runner.run(&config).await;

        assert_eq!(result.status, HealthStatus::Degraded);
        assert_eq!(result.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_function_is_unhealthy() {
        let runner = HealthCheckRunner::new();
        let config = HealthCheckConfig::function("missing");
        let result = runner.run(&config).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.checks[0]
            .message
            .as_deref()
            .unwrap()
            .contains("missing"));
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unhealthy() {
        let runner = HealthCheckRunner::new();
        runner.register_function(
            "slow",
            Arc::new(|| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(ProbeResponse::healthy())
                })
            }),
        );

        let config = HealthCheckConfig::function("slow").with_timeout_ms(20);
        let result = runner.run(&config).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.checks[0]
            .message
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_query_without_executor_is_unhealthy() {
        let runner = HealthCheckRunner::new();
        let config = HealthCheckConfig::query("select 1");
        let result = runner.run(&config).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_http_probe_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/healthy")
            .with_status(200)
            .create_async()
            .await;
        let broken = server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;
        let forbidden = server
            .mock("GET", "/forbidden")
            .with_status(403)
            .create_async()
            .await;

        let runner = HealthCheckRunner::new();

        let result = runner
            .run(&HealthCheckConfig::http(format!("{}/healthy", server.url())))
            .await;
        assert_eq!(result.status, HealthStatus::Healthy);

        let result = runner
            .run(&HealthCheckConfig::http(format!("{}/broken", server.url())))
            .await;
        assert_eq!(result.status, HealthStatus::Unhealthy);

        let result = runner
            .run(&HealthCheckConfig::http(format!("{}/forbidden", server.url())))
            .await;
        assert_eq!(result.status, HealthStatus::Degraded);

        ok.assert_async().await;
        broken.assert_async().await;
        forbidden.assert_async().await;
    }
}

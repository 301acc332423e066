//! Health aggregation across the external dependencies.
//!
//! Probes run concurrently, each under a short timeout. A probe that fails,
//! times out or answers with a non-success status is recorded as down.
//! Used by the status entry points only; the message path never waits on it.

use futures::future::join_all;
use second_core::health::HealthProbe;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Up,
    Down,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Up => "up",
            ServiceState::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    /// Every core dependency is up
    Healthy,
    /// At least one core dependency is down
    Degraded,
}

impl Composite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Composite::Healthy => "healthy",
            Composite::Degraded => "degraded",
        }
    }
}

/// One snapshot; recomputed on every request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    /// In probe registration order
    pub services: Vec<(String, ServiceState)>,
    pub composite: Composite,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.composite == Composite::Healthy
    }

    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.services
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
    }
}

pub struct HealthAggregator {
    probes: Vec<Arc<dyn HealthProbe>>,
    /// Reported, but never degrade the composite
    informational: Vec<String>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            informational: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(config: &second_config::AppConfig) -> Self {
        Self::new(Duration::from_secs(config.health.timeout_secs))
            .with_informational(config.health.informational.clone())
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_informational(mut self, names: Vec<String>) -> Self {
        self.informational = names;
        self
    }

    /// Add a probe that is reported but never degrades the composite.
    pub fn with_informational_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.informational.push(probe.probe_name().to_string());
        self.probes.push(probe);
        self
    }

    pub async fn check(&self) -> HealthStatus {
        let probes = self.probes.iter().map(|probe| async move {
            let up = tokio::time::timeout(self.timeout, probe.is_up())
                .await
                .unwrap_or(false);
            let state = if up { ServiceState::Up } else { ServiceState::Down };
            (probe.probe_name().to_string(), state)
        });
        let services = join_all(probes).await;

        let core_down = services
            .iter()
            .filter(|(name, _)| !self.informational.contains(name))
            .any(|(_, state)| *state == ServiceState::Down);
        let composite = if core_down {
            Composite::Degraded
        } else {
            Composite::Healthy
        };

        debug!(composite = composite.as_str(), "Health checked");
        HealthStatus {
            services,
            composite,
        }
    }
}

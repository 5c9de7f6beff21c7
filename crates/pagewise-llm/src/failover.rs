//! Failover across interchangeable chat endpoints.

use crate::client::ChatClient;
use crate::error::{LlmError, LlmResult};
use crate::traits::ChatModel;
use crate::types::ChatPrompt;
use async_trait::async_trait;
use pagewise_config::LlmConfig;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tries a list of interchangeable chat backends in random order until one
/// answers. Each backend is tried at most once per call.
#[derive(Clone)]
pub struct FailoverChat {
    endpoints: Vec<Arc<dyn ChatModel>>,
    jitter: Duration,
}

impl FailoverChat {
    /// Create a failover strategy over the given backends.
    pub fn new(endpoints: Vec<Arc<dyn ChatModel>>, jitter: Duration) -> LlmResult<Self> {
        if endpoints.is_empty() {
            return Err(LlmError::InvalidConfig(
                "failover needs at least one endpoint".to_string(),
            ));
        }
        Ok(Self { endpoints, jitter })
    }

    /// Build one [`ChatClient`] per configured endpoint.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        let endpoints = config
            .endpoints
            .iter()
            .map(|endpoint| {
                ChatClient::from_endpoint(endpoint, config)
                    .map(|client| Arc::new(client) as Arc<dyn ChatModel>)
            })
            .collect::<LlmResult<Vec<_>>>()?;

        Self::new(endpoints, config.failover_jitter())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn attempt_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.endpoints.len()).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }

    fn pause(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        self.jitter.mul_f64(rand::random::<f64>())
    }
}

#[async_trait]
impl ChatModel for FailoverChat {
    fn name(&self) -> &str {
        "failover"
    }

    async fn complete(&self, prompt: &ChatPrompt) -> LlmResult<String> {
        let mut last_error = None;

        for index in self.attempt_order() {
            let pause = self.pause();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let endpoint = &self.endpoints[index];
            match endpoint.complete(prompt).await {
                Ok(text) => {
                    debug!("Endpoint {} answered", endpoint.name());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Endpoint {} failed, trying next: {}", endpoint.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(LlmError::AllEndpointsFailed {
            attempts: self.endpoints.len(),
            last: Box::new(last_error.unwrap_or_else(|| {
                LlmError::InvalidConfig("no endpoints configured".to_string())
            })),
        })
    }
}

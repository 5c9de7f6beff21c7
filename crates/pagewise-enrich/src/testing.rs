//! Mock backends for pipeline tests.

use async_trait::async_trait;
use pagewise_core::SparseVector;
use pagewise_llm::{ChatModel, ChatPrompt, DenseEmbedder, LlmError, LlmResult, SparseEmbedder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CURRENT_PAGE_MARKER: &str = "============Current Page============\n";

/// Chat model answering metadata, summary and context prompts with fixed text.
#[derive(Default)]
pub struct ScriptedChat {
    fail_marker: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails every prompt containing `marker`.
    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        })
    }

    /// Sleeps before answering, less for later calls, so answers arrive out of order.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, prompt: &ChatPrompt) -> LlmResult<String> {
        let system = prompt.system.as_deref().unwrap_or_default();
        if let Some(marker) = &self.fail_marker {
            if prompt.user.contains(marker.as_str()) || system.contains(marker.as_str()) {
                return Err(LlmError::ApiError {
                    status: 500,
                    message: "scripted failure".to_string(),
                });
            }
        }

        if system.contains("file metadata") {
            return Ok(r#"{"entity": "广东", "time": "2023"}"#.to_string());
        }
        if prompt.user.starts_with("summary the file") {
            return Ok("  SUMMARY \n".to_string());
        }

        let page = prompt
            .user
            .split_once(CURRENT_PAGE_MARKER)
            .and_then(|(_, rest)| rest.split_once("\n\nPlease provide"))
            .map(|(page, _)| page)
            .unwrap_or_default();
        Ok(format!("context for {}", page))
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &ChatPrompt) -> LlmResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay / (call as u32 + 1)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.answer(prompt)
    }
}

/// Dense embedder returning the same vector for every input.
pub struct FixedDense {
    vector: Vec<f32>,
    short: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FixedDense {
    pub fn new(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            vector,
            short: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Returns one vector fewer than asked for.
    pub fn short(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            vector,
            short: true,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DenseEmbedder for FixedDense {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        let count = if self.short { texts.len() - 1 } else { texts.len() };
        Ok(vec![self.vector.clone(); count])
    }
}

/// Sparse embedder that misbehaves a set number of times before answering.
pub struct FlakySparse {
    failures: usize,
    hang: bool,
    reject: bool,
    calls: AtomicUsize,
}

impl FlakySparse {
    /// Fails with a transient error `failures` times, then answers.
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            hang: false,
            reject: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Hangs `failures` times, then answers.
    pub fn hanging(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            hang: true,
            reject: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Always fails with a non-transient error.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            failures: usize::MAX,
            hang: false,
            reject: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SparseEmbedder for FlakySparse {
    async fn sparse_embed(&self, texts: &[String]) -> LlmResult<Vec<SparseVector>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            if self.reject {
                return Err(LlmError::ApiError {
                    status: 422,
                    message: "bad input".to_string(),
                });
            }
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            return Err(LlmError::Unreachable {
                host: "sparse".to_string(),
            });
        }

        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, _)| [(i as u32, 1.0)].into_iter().collect())
            .collect())
    }
}

//! Per-document concurrency gate shared by every outbound call of a document.

use crate::error::{EnrichError, EnrichResult, Stage};
use pagewise_llm::{ChatModel, ChatPrompt};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Wait for a slot on the gate.
pub(crate) async fn enter(gate: &Semaphore) -> EnrichResult<SemaphorePermit<'_>> {
    gate.acquire().await.map_err(|_| EnrichError::GateClosed)
}

/// Run one chat completion while holding a gate slot. The answer is trimmed.
pub(crate) async fn complete(
    model: &dyn ChatModel,
    prompt: &ChatPrompt,
    gate: &Semaphore,
    stage: Stage,
) -> EnrichResult<String> {
    let _permit = enter(gate).await?;
    let answer = model
        .complete(prompt)
        .await
        .map_err(EnrichError::model(stage))?;
    Ok(answer.trim().to_string())
}

//! File metadata (region and year) extracted by a language model.

use crate::error::{EnrichError, EnrichResult, Stage};
use crate::gate;
use crate::repair::parse_repaired;
use pagewise_core::FileMetadata;
use pagewise_llm::{ChatModel, ChatPrompt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Characters of the first page included in the prompt.
pub const FIRST_PAGE_PROMPT_CHARS: usize = 1000;

const SYSTEM_PROMPT: &str = r#"Generate the file metadata in json format.
{
    "entity": str, province name in file name in Chinese, return "" if not mentioned
    "time": in YYYY format, include every year in the range split by comma if it is a time range, return "" if not mentioned
}"#;

/// Asks a chat model for a document's entity and time.
#[derive(Clone)]
pub struct MetadataExtractor {
    model: Arc<dyn ChatModel>,
}

impl MetadataExtractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn build_prompt(file_name: &str, first_page: &str) -> ChatPrompt {
        let excerpt: String = first_page.chars().take(FIRST_PAGE_PROMPT_CHARS).collect();
        ChatPrompt::new(format!("file_name: {}\nfirst_page:\n{}", file_name, excerpt))
            .with_system(SYSTEM_PROMPT)
    }

    /// Extract metadata with one gated model call.
    pub async fn extract(
        &self,
        file_name: &str,
        first_page: &str,
        gate: &Semaphore,
    ) -> EnrichResult<FileMetadata> {
        let prompt = Self::build_prompt(file_name, first_page);
        let raw = gate::complete(self.model.as_ref(), &prompt, gate, Stage::Metadata).await?;
        let metadata = parse_metadata(&raw)?;
        debug!(
            "Metadata for {}: entity={:?} time={:?}",
            file_name, metadata.entity, metadata.time
        );
        Ok(metadata)
    }
}

/// Parse model output into metadata, repairing the JSON first.
pub fn parse_metadata(raw: &str) -> EnrichResult<FileMetadata> {
    let malformed = |message: String| EnrichError::MalformedOutput {
        stage: Stage::Metadata,
        message,
    };

    let value = parse_repaired(raw).map_err(malformed)?;
    let Value::Object(fields) = value else {
        return Err(malformed(format!("expected a JSON object, got {}", value)));
    };

    Ok(FileMetadata {
        entity: field_to_string(fields.get("entity")),
        time: field_to_string(fields.get("time")),
    })
}

fn field_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| field_to_string(Some(item)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;

    #[test]
    fn test_parse_plain_metadata() {
        let metadata = parse_metadata(r#"{"entity": "广东", "time": "2023"}"#).unwrap();
        assert_eq!(metadata.entity, "广东");
        assert_eq!(metadata.time, "2023");
    }

    #[test]
    fn test_parse_coerces_values() {
        let metadata = parse_metadata(r#"{"entity": null, "time": 2023}"#).unwrap();
        assert_eq!(metadata.entity, "");
        assert_eq!(metadata.time, "2023");

        let metadata = parse_metadata(r#"{"time": [2021, "2022"]}"#).unwrap();
        assert_eq!(metadata.time, "2021,2022");
        assert_eq!(metadata.entity, "");
    }

    #[test]
    fn test_parse_repairs_output() {
        let metadata = parse_metadata("```json\n{'entity': '浙江', 'time': '2020,2021',}\n```").unwrap();
        assert_eq!(metadata.entity, "浙江");
        assert_eq!(metadata.time, "2020,2021");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_metadata("I could not find any metadata.").unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Metadata));

        assert!(parse_metadata("[\"2023\"]").is_err());
    }

    #[test]
    fn test_prompt_truncates_first_page() {
        let page = "页".repeat(FIRST_PAGE_PROMPT_CHARS + 500);
        let prompt = MetadataExtractor::build_prompt("广东省2023年报告.pdf", &page);
        assert!(prompt.user.starts_with("file_name: 广东省2023年报告.pdf"));
        assert_eq!(prompt.user.matches('页').count(), FIRST_PAGE_PROMPT_CHARS);
        assert!(prompt.system.unwrap().contains("\"entity\""));
    }

    #[tokio::test]
    async fn test_extract_through_model() {
        let chat = ScriptedChat::new();
        let extractor = MetadataExtractor::new(chat.clone());
        let gate = Semaphore::new(1);

        let metadata = extractor.extract("a.pdf", "first page", &gate).await.unwrap();
        assert_eq!(metadata.entity, "广东");
        assert_eq!(metadata.time, "2023");
        assert_eq!(chat.calls(), 1);
    }
}

//! Document summary and per-page context synthesis.
//!
//! Every page after the first gets a short retrieval-oriented summary written
//! with knowledge of the whole-document summary and the pages leading up to it.

use crate::error::{EnrichResult, Stage};
use crate::gate;
use crate::lang::detect_language;
use futures_util::future::try_join_all;
use pagewise_core::Language;
use pagewise_llm::{ChatModel, ChatPrompt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Pages sampled for language detection.
pub const LANGUAGE_SAMPLE_PAGES: usize = 5;

/// Pages included in the document summary prompt.
pub const SUMMARY_PAGES: usize = 2;

/// Pages in the context window of a page, the page itself included.
pub const CONTEXT_WINDOW_PAGES: usize = 3;

/// Contextualized pages of one document, ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextualizedDocument {
    pub language: Language,
    pub summary: String,
    pub pages: Vec<String>,
}

/// Produces the document summary and per-page contexts with a chat model.
#[derive(Clone)]
pub struct ContextSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl ContextSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn summary_prompt(file_name: &str, pages: &[String], language: Language) -> ChatPrompt {
        let first_pages = pages
            .iter()
            .take(SUMMARY_PAGES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        ChatPrompt::new(format!(
            "summary the file {} in one sentence in {}:\nFirst two pages:\n{}",
            file_name, language, first_pages
        ))
    }

    pub fn page_prompt(
        summary: &str,
        pages: &[String],
        index: usize,
        language: Language,
    ) -> ChatPrompt {
        let window_start = (index + 1).saturating_sub(CONTEXT_WINDOW_PAGES);
        let window = pages[window_start..=index].join("\n");

        let system = format!(
            "Generate a concise contextual summary for the current page to enhance search retrieval. The summary should:
1. Provide essential background information, key concepts and fitting conditions
2. Highlight relationships with previous content
3. Make the current page self-contained and understandable
4. use {}

Requirements:
- Length: Maximum 100 words
- Style: Clear, factual, and objective
- Focus: Emphasize unique identifiers, technical terms, and critical details
",
            language
        );

        let user = format!(
            "\nFile Summary: {}\n\n============Previous Content============\n{}\n\n============Current Page============\n{}\n\nPlease provide the context below:\n",
            summary, window, pages[index]
        );

        ChatPrompt::new(user).with_system(system)
    }

    /// Summarize the document, then synthesize context for every page after
    /// the first. Page calls run concurrently behind `gate`; any failed call
    /// fails the whole document.
    pub async fn synthesize(
        &self,
        file_name: &str,
        pages: &[String],
        gate: &Semaphore,
    ) -> EnrichResult<ContextualizedDocument> {
        let sample = pages
            .iter()
            .take(LANGUAGE_SAMPLE_PAGES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let language = detect_language(&sample);

        let prompt = Self::summary_prompt(file_name, pages, language);
        let summary = gate::complete(self.model.as_ref(), &prompt, gate, Stage::Summary).await?;
        debug!("Summary for {} ({}): {} chars", file_name, language, summary.len());

        let calls = (1..pages.len()).map(|index| {
            let prompt = Self::page_prompt(&summary, pages, index, language);
            async move { gate::complete(self.model.as_ref(), &prompt, gate, Stage::Context).await }
        });
        let contexts = try_join_all(calls).await?;
        debug!("Synthesized {} page contexts for {}", contexts.len(), file_name);

        Ok(ContextualizedDocument {
            language,
            pages: assemble(&summary, pages, &contexts),
            summary,
        })
    }
}

/// Join summary, contexts and page text. `contexts[i]` belongs to `pages[i + 1]`.
pub fn assemble(summary: &str, pages: &[String], contexts: &[String]) -> Vec<String> {
    let Some(first) = pages.first() else {
        return Vec::new();
    };

    let mut assembled = Vec::with_capacity(pages.len());
    assembled.push(format!("file_summary: {}\n{}", summary, first));
    for (context, page) in contexts.iter().zip(&pages[1..]) {
        assembled.push(format!(
            "file_summary: {}\ncontext: {}\npage_content:\n{}",
            summary, context, page
        ));
    }
    assembled
}

//! Question answering engine: retrieve, prompt, generate, extract.

use crate::config::{Prompts, RetrievalSettings};
use crate::error::Result;
use crate::extraction::AnswerExtractor;
use crate::generation::Generator;
use crate::retrieval::{RetrievedPassage, Retriever};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answer returned when retrieval finds nothing relevant.
pub const NO_RELEVANT_ANSWER: &str = "未找到相关文档";

/// Question category. Batch files label these 选择题 and 问答题.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Multiple-choice; answer letters are extracted from the model output.
    Choice,
    /// Free-text question.
    FreeText,
}

impl QuestionKind {
    /// Parse a category label; unknown labels are treated as free-text.
    pub fn from_category(category: &str) -> Self {
        if category.trim() == "选择题" {
            Self::Choice
        } else {
            Self::FreeText
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Choice => "选择题",
            Self::FreeText => "问答题",
        }
    }
}

/// A resolved answer with its supporting passages.
#[derive(Debug, Clone)]
pub struct QaAnswer {
    /// Raw model output (or the no-result message).
    pub text: String,
    /// Extracted option letters, for choice questions only.
    pub letters: Option<Vec<char>>,
    /// Passages that passed the similarity threshold, best first.
    pub sources: Vec<RetrievedPassage>,
}

impl QaAnswer {
    /// Letters joined for display, e.g. "A,C".
    pub fn letters_display(&self) -> Option<String> {
        self.letters.as_ref().map(|letters| {
            letters
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
    }
}

/// End-to-end question answering over the knowledge base.
pub struct QaEngine {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    extractor: AnswerExtractor,
    prompts: Prompts,
    top_k: usize,
    similarity_threshold: f32,
    context_passages: usize,
}

impl QaEngine {
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<dyn Generator>,
        prompts: Prompts,
        retrieval: &RetrievalSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            extractor: AnswerExtractor::new(),
            prompts,
            top_k: retrieval.top_k,
            similarity_threshold: retrieval.similarity_threshold,
            context_passages: retrieval.context_passages.max(1),
        }
    }

    /// Answer a question. For choice questions, `options` is the option
    /// block placed into the prompt and the answer carries extracted letters.
    #[instrument(skip(self, question, options), fields(kind = kind.category()))]
    pub async fn answer(
        &self,
        question: &str,
        kind: QuestionKind,
        options: &str,
    ) -> Result<QaAnswer> {
        let retrieved = self.retriever.retrieve(question, self.top_k).await?;
        let sources: Vec<RetrievedPassage> = retrieved
            .into_iter()
            .filter(|p| p.score >= self.similarity_threshold)
            .collect();

        // An empty result is a valid answer, not an error.
        if sources.is_empty() {
            info!("No passage above similarity threshold; answering without context");
            let letters = match kind {
                QuestionKind::Choice => Some(self.extractor.extract(NO_RELEVANT_ANSWER)),
                QuestionKind::FreeText => None,
            };
            return Ok(QaAnswer {
                text: NO_RELEVANT_ANSWER.to_string(),
                letters,
                sources,
            });
        }

        let context = sources
            .iter()
            .take(self.context_passages)
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(
            "Using {} of {} passages as context",
            sources.len().min(self.context_passages),
            sources.len()
        );

        let prompt = match kind {
            QuestionKind::Choice => self.prompts.render_choice(&context, question, options),
            QuestionKind::FreeText => self.prompts.render_qa(&context, question),
        };

        let text = self.generator.generate(&self.prompts.system, &prompt).await?;
        let letters = match kind {
            QuestionKind::Choice => Some(self.extractor.extract(&text)),
            QuestionKind::FreeText => None,
        };

        Ok(QaAnswer {
            text,
            letters,
            sources,
        })
    }
}

//! Analysis orchestration: prompt composition over sampled segments.
//!
//! An [`AnalysisEngine`] is built once per uploaded document. It owns the
//! document's segments, its [`SemanticIndex`], and the active
//! [`GenerationProvider`], and shares the installation-wide
//! [`ContextStore`] with every other engine in the process.
//!
//! Each operation records the interaction in the context store *before*
//! building its prompt, so an attempt is logged even when generation fails.
//! Prompts never see the whole document: each operation reads a fixed sample
//! of segments and truncates the joined text.

use std::sync::{Arc, Mutex};

use crate::context_store::{
    ContextStore, FAQS_GENERATED, QUESTIONS_GENERATED, QUESTION_ASKED, SUMMARY_GENERATED,
};
use crate::embedding::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::index::SemanticIndex;
use crate::models::{AnalysisDepth, Faq, ReadingPurpose, Segment};
use crate::parse::{parse_faqs, parse_questions};

/// The context store as shared between sessions.
pub type SharedContext = Arc<Mutex<ContextStore>>;

pub const NO_CONTENT: &str = "No content available.";
pub const INDEX_NOT_READY: &str = "Search index is not ready.";
pub const NOTHING_FOUND: &str = "I couldn't find relevant information in the uploaded text.";

const SUMMARY_CONTEXT_CHARS: usize = 6000;
const QUESTIONS_CONTEXT_CHARS: usize = 4000;
const FAQ_CONTEXT_CHARS: usize = 4000;

pub struct AnalysisEngine {
    segments: Vec<Segment>,
    index: SemanticIndex,
    provider: Box<dyn GenerationProvider>,
    context: SharedContext,
    top_k: usize,
}

impl AnalysisEngine {
    /// Build the semantic index over `segments` and wrap everything up.
    ///
    /// An index build failure is not an error: the engine still works, and
    /// question answering reports that search is unavailable.
    pub async fn build(
        segments: Vec<Segment>,
        embedder: Arc<dyn EmbeddingProvider>,
        provider: Box<dyn GenerationProvider>,
        context: SharedContext,
        top_k: usize,
    ) -> Self {
        let mut index = SemanticIndex::new(embedder);
        index.build(&segments).await;
        tracing::info!(
            segments = segments.len(),
            index_ready = index.is_ready(),
            provider = provider.name(),
            "analysis engine ready"
        );
        Self {
            segments,
            index,
            provider,
            context,
            top_k,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn index_ready(&self) -> bool {
        self.index.is_ready()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Swap the generation provider, keeping the built index.
    pub fn set_provider(&mut self, provider: Box<dyn GenerationProvider>) {
        self.provider = provider;
    }

    /// Structured book summary tailored to the reader's purpose.
    pub async fn generate_summary(&self, goal: ReadingPurpose, depth: AnalysisDepth) -> String {
        let adaptive = self.log(
            SUMMARY_GENERATED,
            None,
            Some(serde_json::json!({ "goal": goal.as_str(), "depth": depth.as_str() })),
        );
        if self.segments.is_empty() {
            return NO_CONTENT.to_string();
        }

        let n = self.segments.len();
        let positions = sample_positions(
            n,
            &[0, 1, n / 2, n / 2 + 1, n.saturating_sub(2), n - 1],
        );
        let context = self.joined_context(&positions, SUMMARY_CONTEXT_CHARS);
        let prompt = summary_prompt(&adaptive, goal, depth, &context);
        self.provider.generate(&prompt).await
    }

    /// Answer `question` from the segments most similar to it.
    pub async fn answer_question(&self, question: &str) -> String {
        let adaptive = self.log(QUESTION_ASKED, Some(question), None);
        if !self.index.is_ready() {
            return INDEX_NOT_READY.to_string();
        }

        let hits = self.index.search(question, self.top_k).await;
        if hits.is_empty() {
            return NOTHING_FOUND.to_string();
        }

        let context: String = hits
            .iter()
            .map(|s| {
                let page = s
                    .page_number
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string());
                format!("[Page {}]: {}\n\n", page, s.text)
            })
            .collect();

        let prompt = format!(
            "{adaptive}\
You are an expert academic tutor. Answer the student's question strictly based on the provided context.\n\
Cite the page numbers provided in the context.\n\n\
Context:\n{context}\n\
Question: {question}\n\n\
Answer (Academic & Citations):\n"
        );
        self.provider.generate(&prompt).await
    }

    /// Up to ten discussion questions.
    pub async fn generate_questions(&self) -> Vec<String> {
        self.log(QUESTIONS_GENERATED, None, None);
        if self.segments.is_empty() {
            return Vec::new();
        }

        let n = self.segments.len();
        let positions = sample_positions(n, &[0, n / 3, 2 * n / 3, n - 1]);
        let context = self.joined_context(&positions, QUESTIONS_CONTEXT_CHARS);
        let prompt = format!(
            "Based on the following text context, generate 5 thought-provoking discussion questions \
that test understanding of the key concepts.\n\
Return ONLY the questions, one per line.\n\n\
Context:\n{context}\n\n\
Questions:\n"
        );
        parse_questions(&self.provider.generate(&prompt).await)
    }

    /// Question/answer pairs a reader would likely ask.
    pub async fn generate_faqs(&self) -> Vec<Faq> {
        self.log(FAQS_GENERATED, None, None);
        if self.segments.is_empty() {
            return Vec::new();
        }

        let n = self.segments.len();
        let positions = sample_positions(n, &[0, n / 2, n - 1]);
        let context = self.joined_context(&positions, FAQ_CONTEXT_CHARS);
        let prompt = format!(
            "Based on the text provided, generate 5 \"Frequently Asked Questions\" (FAQs) that a reader \
would likely ask.\n\
Provide clear, concise answers for each.\n\n\
Strict Output Format:\n\
Q: [Question Text]\n\
A: [Answer Text]\n\n\
Context:\n{context}\n\n\
FAQs:\n"
        );
        parse_faqs(&self.provider.generate(&prompt).await)
    }

    /// Record the interaction and return the adaptive instruction that
    /// reflects it.
    fn log(&self, kind: &str, query: Option<&str>, details: Option<serde_json::Value>) -> String {
        match self.context.lock() {
            Ok(mut store) => {
                store.log_interaction(kind, query, details);
                store.adaptive_instruction()
            }
            Err(_) => {
                tracing::error!("context store lock poisoned; interaction not logged");
                String::new()
            }
        }
    }

    fn joined_context(&self, positions: &[usize], limit: usize) -> String {
        let joined = positions
            .iter()
            .map(|&i| self.segments[i].text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        truncate_chars(&joined, limit).to_string()
    }
}

/// In-range positions, deduplicated, in document order.
fn sample_positions(len: usize, wanted: &[usize]) -> Vec<usize> {
    let mut positions: Vec<usize> = wanted.iter().copied().filter(|&i| i < len).collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

fn depth_guidance(depth: AnalysisDepth) -> &'static str {
    match depth {
        AnalysisDepth::Brief => "Keep every section short: a few sentences or bullets at most.",
        AnalysisDepth::Standard => "Give each section a balanced level of detail.",
        AnalysisDepth::Deep => {
            "Go into depth: explain reasoning, connections between ideas, and notable examples."
        }
    }
}

fn summary_prompt(
    adaptive: &str,
    goal: ReadingPurpose,
    depth: AnalysisDepth,
    context: &str,
) -> String {
    let goal = goal.as_str();
    let guidance = depth_guidance(depth);
    format!(
        "{adaptive}\
You are an expert AI Book Summarizer. Your goal is to help a user with the goal: '{goal}'.\n\
Analysis depth: {depth}. {guidance}\n\n\
Analyze the provided book context and generate a comprehensive response strictly following this structure:\n\n\
## Book Overview\n(A concise high-level summary of what the book is about)\n\n\
## Key Themes\n- Theme 1\n- Theme 2\n\n\
## Chapter-wise / Section Summary\n(Summarize the flow of arguments or chapters found in the text)\n\n\
## Important Concepts Explained Simply\n(Explain complex ideas in simple terms, suitable for '{goal}')\n\n\
## Key Takeaways\n- Takeaway 1\n- Takeaway 2\n\n\
## Use-Cases / Applications\n(Practical applications of the content)\n\n\
## Quick Revision Notes\n(Bullet points for quick review)\n\n\
Tone: Professional, Friendly, Non-judgmental.\n\
Constraint: Do NOT hallucinate. Use only the provided text.\n\n\
Context:\n{context}\n\n\
Summary:\n",
        depth = depth.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{OfflineProvider, OFFLINE_MESSAGE};
    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Echoes the prompt back so tests can inspect what was sent.
    struct EchoProvider;

    #[async_trait]
    impl GenerationProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, prompt: &str) -> String {
            prompt.to_string()
        }
    }

    struct CannedProvider(&'static str);

    #[async_trait]
    impl GenerationProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }
        async fn generate(&self, _prompt: &str) -> String {
            self.0.to_string()
        }
    }

    /// One dimension per segment marker, so a query naming `seg3` lands on
    /// the segment containing `seg3`.
    struct MarkerEmbedder;

    #[async_trait]
    impl EmbeddingProvider for MarkerEmbedder {
        fn model_name(&self) -> &str {
            "marker"
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    (0..10)
                        .map(|i| if t.contains(&format!("seg{}", i)) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment {
                text: format!("seg{} body text", i),
                page_number: Some(i as u32 + 1),
                source_id: "book.pdf".to_string(),
                start_offset: 0,
            })
            .collect()
    }

    fn context(tmp: &TempDir) -> SharedContext {
        Arc::new(Mutex::new(ContextStore::load(
            &tmp.path().join("ctx.json"),
            2,
        )))
    }

    async fn engine(
        n: usize,
        provider: Box<dyn GenerationProvider>,
        ctx: SharedContext,
    ) -> AnalysisEngine {
        AnalysisEngine::build(segments(n), Arc::new(MarkerEmbedder), provider, ctx, 4).await
    }

    fn history_kinds(ctx: &SharedContext) -> Vec<String> {
        ctx.lock()
            .unwrap()
            .record()
            .session_history
            .iter()
            .map(|i| i.kind.clone())
            .collect()
    }

    #[test]
    fn positions_are_deduplicated_and_bounded() {
        assert_eq!(sample_positions(1, &[0, 1, 0, 1, 0, 0]), vec![0]);
        assert_eq!(sample_positions(3, &[0, 1, 1, 2, 1, 2]), vec![0, 1, 2]);
        assert_eq!(sample_positions(10, &[0, 1, 5, 6, 8, 9]), vec![0, 1, 5, 6, 8, 9]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn offline_summary_is_verbatim_and_logged() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let engine = engine(5, Box::new(OfflineProvider), ctx.clone()).await;

        let summary = engine
            .generate_summary(ReadingPurpose::GeneralReading, AnalysisDepth::Standard)
            .await;
        assert_eq!(summary, OFFLINE_MESSAGE);

        let store = ctx.lock().unwrap();
        let entry = &store.record().session_history[0];
        assert_eq!(entry.kind, SUMMARY_GENERATED);
        assert_eq!(entry.details.as_ref().unwrap()["goal"], "General Reading");
    }

    #[tokio::test]
    async fn summary_prompt_samples_ends_and_middle() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(9, Box::new(EchoProvider), context(&tmp)).await;
        let prompt = engine
            .generate_summary(ReadingPurpose::ExamPreparation, AnalysisDepth::Deep)
            .await;

        for included in ["seg0", "seg1", "seg4", "seg5", "seg7", "seg8"] {
            assert!(prompt.contains(included), "missing {}", included);
        }
        for excluded in ["seg2", "seg3", "seg6"] {
            assert!(!prompt.contains(excluded), "unexpected {}", excluded);
        }
        assert!(prompt.starts_with("User Preference: Standard depth. Neutral tone.\n"));
        assert!(prompt.contains("'Exam Preparation'"));
        assert!(prompt.contains("Analysis depth: Deep."));
    }

    #[tokio::test]
    async fn empty_document_has_no_content_but_is_logged() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let engine = engine(0, Box::new(EchoProvider), ctx.clone()).await;
        assert_eq!(
            engine
                .generate_summary(ReadingPurpose::GeneralReading, AnalysisDepth::Brief)
                .await,
            NO_CONTENT
        );
        assert!(engine.generate_questions().await.is_empty());
        assert_eq!(
            history_kinds(&ctx),
            vec![SUMMARY_GENERATED, QUESTIONS_GENERATED]
        );
    }

    #[tokio::test]
    async fn answer_cites_retrieved_pages() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(6, Box::new(EchoProvider), context(&tmp)).await;
        let prompt = engine.answer_question("what happens in seg3?").await;
        assert!(prompt.contains("[Page 4]: seg3 body text"));
        assert!(prompt.contains("Question: what happens in seg3?"));
    }

    #[tokio::test]
    async fn answer_without_index_reports_not_ready_after_logging() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let engine = AnalysisEngine::build(
            segments(3),
            Arc::new(crate::embedding::DisabledProvider),
            Box::new(EchoProvider),
            ctx.clone(),
            4,
        )
        .await;
        assert!(!engine.index_ready());
        assert_eq!(engine.answer_question("explain seg1").await, INDEX_NOT_READY);
        assert_eq!(history_kinds(&ctx), vec![QUESTION_ASKED]);
    }

    #[tokio::test]
    async fn explain_questions_change_later_prompts() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(4, Box::new(EchoProvider), context(&tmp)).await;
        for _ in 0..3 {
            engine.answer_question("explain seg2").await;
        }
        let prompt = engine
            .generate_summary(ReadingPurpose::GeneralReading, AnalysisDepth::Standard)
            .await;
        assert!(prompt.contains("frequently asks for explanations"));
    }

    #[tokio::test]
    async fn questions_and_faqs_are_parsed() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);

        let questions = engine(
            4,
            Box::new(CannedProvider("1. First?\n2. Second?\n\n- Third?")),
            ctx.clone(),
        )
        .await
        .generate_questions()
        .await;
        assert_eq!(questions, vec!["First?", "Second?", "Third?"]);

        let faqs = engine(4, Box::new(CannedProvider("Q: Why?\nA: Because.")), ctx.clone())
            .await
            .generate_faqs()
            .await;
        assert_eq!(faqs, vec![Faq::new("Why?", "Because.")]);

        let fallback = engine(4, Box::new(OfflineProvider), ctx.clone())
            .await
            .generate_faqs()
            .await;
        assert_eq!(fallback[0].question, crate::parse::FAQ_FALLBACK_QUESTION);
    }
}

//! Per-session state and the operations the HTTP API and CLI dispatch to.
//!
//! A [`Session`] belongs to one signed-in (or guest) user. It holds the
//! user's settings, the active document and its [`AnalysisEngine`], the
//! Analysis result set, and the Assistant transcript. Nothing here is
//! process-global; the process-wide pieces (config, embedder, context store)
//! live in [`Services`] and are shared by reference.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::analytics::{self, Insights};
use crate::analyzer::{AnalysisEngine, SharedContext};
use crate::chunk::chunk_pages;
use crate::config::Config;
pub use crate::config::{MAX_SEGMENT_SIZE, MIN_SEGMENT_SIZE};
use crate::context_store::{ContextStore, Interaction, Preferences};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::export::{ExportError, ExportFormat, Report};
use crate::extract::{extract_pages, ExtractError, ExtractedPdf};
use crate::generation::{provider_kind, select_provider, ProviderKind};
use crate::models::{
    AnalysisDepth, AnalysisResults, ChatTurn, Faq, ReadingPurpose, Segment, SessionUser,
};

/// Interactions shown on the profile view.
const PROFILE_HISTORY: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Upload a PDF first.")]
    NoDocument,
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("No text could be extracted from this PDF.")]
    NoText,
    #[error("{0}")]
    InvalidSetting(String),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Process-wide dependencies shared by every session.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub context: SharedContext,
}

impl Services {
    pub fn new(config: Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        Ok(Self::with_embedder(config, embedder))
    }

    /// Like [`Services::new`] with an explicit embedding provider.
    pub fn with_embedder(config: Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let store = ContextStore::load(&config.context.path, config.context.explain_threshold);
        Self {
            config: Arc::new(config),
            embedder,
            context: Arc::new(Mutex::new(store)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub segment_size: usize,
    pub analysis_depth: AnalysisDepth,
    pub reading_purpose: ReadingPurpose,
    pub api_key: Option<String>,
}

/// Partial settings change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub segment_size: Option<usize>,
    pub analysis_depth: Option<AnalysisDepth>,
    pub reading_purpose: Option<ReadingPurpose>,
    /// An empty string removes the credential.
    pub api_key: Option<String>,
}

/// Settings as reported back to clients. The credential is never echoed.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub segment_size: usize,
    pub analysis_depth: AnalysisDepth,
    pub reading_purpose: ReadingPurpose,
    pub has_api_key: bool,
    pub generation: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub page_count: usize,
    pub pages_with_text: Vec<u32>,
    pub segments: usize,
    pub index_ready: bool,
    pub generation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub email: String,
    pub role: &'static str,
    pub user_id: Uuid,
    pub last_active: DateTime<Utc>,
    pub preferences: Preferences,
    pub recent_history: Vec<Interaction>,
}

struct ActiveDocument {
    info: DocumentInfo,
    engine: AnalysisEngine,
}

pub struct Session {
    user: SessionUser,
    settings: SessionSettings,
    document: Option<ActiveDocument>,
    results: AnalysisResults,
    chat: Vec<ChatTurn>,
    services: Services,
}

impl Session {
    pub fn new(user: SessionUser, services: Services) -> Self {
        let settings = SessionSettings {
            segment_size: services.config.chunking.segment_size,
            analysis_depth: AnalysisDepth::default(),
            reading_purpose: ReadingPurpose::default(),
            api_key: services.config.generation.credential(),
        };
        Self {
            user,
            settings,
            document: None,
            results: AnalysisResults::default(),
            chat: Vec::new(),
            services,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn settings_view(&self) -> SettingsView {
        SettingsView {
            segment_size: self.settings.segment_size,
            analysis_depth: self.settings.analysis_depth,
            reading_purpose: self.settings.reading_purpose,
            has_api_key: self.settings.api_key.is_some(),
            generation: match provider_kind(self.settings.api_key.as_deref()) {
                ProviderKind::Gemini => "gemini",
                ProviderKind::Offline => "offline",
            },
        }
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        self.document.as_ref().map(|d| &d.info)
    }

    pub fn results(&self) -> &AnalysisResults {
        &self.results
    }

    pub fn chat(&self) -> &[ChatTurn] {
        &self.chat
    }

    /// Apply a settings change.
    ///
    /// A new segment size takes effect on the next upload. A new credential
    /// replaces the active document's generation provider right away.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<(), SessionError> {
        if let Some(size) = update.segment_size {
            if !(MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&size) {
                return Err(SessionError::InvalidSetting(format!(
                    "segment_size must be between {} and {}",
                    MIN_SEGMENT_SIZE, MAX_SEGMENT_SIZE
                )));
            }
            self.settings.segment_size = size;
        }
        if let Some(depth) = update.analysis_depth {
            self.settings.analysis_depth = depth;
        }
        if let Some(purpose) = update.reading_purpose {
            self.settings.reading_purpose = purpose;
        }
        if let Some(key) = update.api_key {
            let key = key.trim().to_string();
            self.settings.api_key = if key.is_empty() { None } else { Some(key) };

            if let Some(doc) = self.document.as_mut() {
                let provider = select_provider(
                    self.settings.api_key.as_deref(),
                    &self.services.config.generation,
                );
                doc.info.generation = provider.name().to_string();
                doc.engine.set_provider(provider);
            }
        }
        Ok(())
    }

    /// Ingest a PDF and make it the active document.
    ///
    /// Results and transcript of any previous document are discarded. On
    /// failure the previous document stays active.
    pub async fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<DocumentInfo, SessionError> {
        let config = &self.services.config;
        let (extracted, segments) = ingest_blocking(
            bytes.to_vec(),
            name.to_string(),
            self.settings.segment_size,
            config.chunking.overlap,
        )
        .await?;

        let provider = select_provider(self.settings.api_key.as_deref(), &config.generation);
        let engine = AnalysisEngine::build(
            segments,
            self.services.embedder.clone(),
            provider,
            self.services.context.clone(),
            config.retrieval.top_k,
        )
        .await;

        let info = DocumentInfo {
            name: name.to_string(),
            page_count: extracted.page_count,
            pages_with_text: extracted.pages.iter().map(|p| p.number).collect(),
            segments: engine.segments().len(),
            index_ready: engine.index_ready(),
            generation: engine.provider_name().to_string(),
        };
        tracing::info!(
            name,
            pages = info.page_count,
            segments = info.segments,
            "document uploaded"
        );

        self.document = Some(ActiveDocument {
            info: info.clone(),
            engine,
        });
        self.results = AnalysisResults::default();
        self.chat.clear();
        Ok(info)
    }

    pub fn close_document(&mut self) {
        self.document = None;
        self.results = AnalysisResults::default();
        self.chat.clear();
    }

    fn engine(&self) -> Result<&AnalysisEngine, SessionError> {
        self.document
            .as_ref()
            .map(|d| &d.engine)
            .ok_or(SessionError::NoDocument)
    }

    pub async fn summary(&mut self) -> Result<String, SessionError> {
        let summary = self
            .engine()?
            .generate_summary(self.settings.reading_purpose, self.settings.analysis_depth)
            .await;
        self.results.summary = Some(summary.clone());
        Ok(summary)
    }

    pub async fn questions(&mut self) -> Result<Vec<String>, SessionError> {
        let questions = self.engine()?.generate_questions().await;
        self.results.questions = questions.clone();
        Ok(questions)
    }

    pub async fn faqs(&mut self) -> Result<Vec<Faq>, SessionError> {
        let faqs = self.engine()?.generate_faqs().await;
        self.results.faqs = faqs.clone();
        Ok(faqs)
    }

    /// Ask the Assistant; the exchange is appended to the transcript.
    pub async fn ask(&mut self, question: &str) -> Result<ChatTurn, SessionError> {
        let answer = self.engine()?.answer_question(question).await;
        let turn = ChatTurn {
            question: question.to_string(),
            answer,
        };
        self.chat.push(turn.clone());
        Ok(turn)
    }

    pub fn insights(&self) -> Result<Insights, SessionError> {
        let engine = self.engine()?;
        Ok(analytics::insights(
            engine.segments(),
            &self.services.config.analytics,
        ))
    }

    /// Render the report for the active document.
    pub fn export(&self, format: ExportFormat) -> Result<String, SessionError> {
        let doc = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let report = Report::new(
            &doc.info.name,
            &self.results,
            doc.engine.segments(),
            &self.chat,
        )?;
        Ok(report.render(format)?)
    }

    pub fn profile(&self) -> Profile {
        let (user_id, last_active, preferences, recent_history) = match self.services.context.lock()
        {
            Ok(store) => {
                let record = store.record();
                (
                    record.user_id,
                    record.last_active,
                    record.preferences.clone(),
                    store.recent_history(PROFILE_HISTORY),
                )
            }
            Err(_) => {
                tracing::error!("context store lock poisoned");
                (Uuid::nil(), Utc::now(), Preferences::default(), Vec::new())
            }
        };

        Profile {
            email: self.user.email.clone(),
            role: self.user.role.as_str(),
            user_id,
            last_active,
            preferences,
            recent_history,
        }
    }

    /// The last `n` interactions across all sessions, newest first.
    pub fn recent_history(&self, n: usize) -> Vec<Interaction> {
        match self.services.context.lock() {
            Ok(store) => store.recent_history(n),
            Err(_) => {
                tracing::error!("context store lock poisoned");
                Vec::new()
            }
        }
    }

    pub fn update_preferences(
        &self,
        summary_depth: Option<&str>,
        interaction_style: Option<&str>,
    ) -> Result<Preferences, SessionError> {
        let mut store = self
            .services
            .context
            .lock()
            .map_err(|_| anyhow::anyhow!("context store lock poisoned"))?;
        store.update_preferences(summary_depth, interaction_style);
        Ok(store.record().preferences.clone())
    }

    pub fn clear_history(&self) -> Result<String, SessionError> {
        let mut store = self
            .services
            .context
            .lock()
            .map_err(|_| anyhow::anyhow!("context store lock poisoned"))?;
        Ok(store.clear_history())
    }
}

/// Extract and segment on a blocking thread; parsing a large PDF would
/// otherwise stall the runtime.
async fn ingest_blocking(
    bytes: Vec<u8>,
    source_id: String,
    segment_size: usize,
    overlap: usize,
) -> Result<(ExtractedPdf, Vec<Segment>), SessionError> {
    tokio::task::spawn_blocking(move || -> Result<_, SessionError> {
        let extracted = extract_pages(&bytes)?;
        if extracted.pages.is_empty() {
            return Err(SessionError::NoText);
        }
        let segments = chunk_pages(&extracted.pages, &source_id, segment_size, overlap);
        Ok((extracted, segments))
    })
    .await
    .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {}", e)))?
}

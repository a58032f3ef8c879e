//! Persistent interaction history and the adaptive prompt instruction.
//!
//! A single JSON file holds one [`ContextRecord`] per installation. Every
//! logged interaction rewrites the whole file synchronously. The file is not
//! locked; one writer at a time is assumed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SUMMARY_GENERATED: &str = "summary_generated";
pub const QUESTION_ASKED: &str = "question_asked";
pub const QUESTIONS_GENERATED: &str = "questions_generated";
pub const FAQS_GENERATED: &str = "faqs_generated";

const EXPLAIN_NOTE: &str = "Note: User frequently asks for explanations. Prioritize simple clarity.\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_summary_depth")]
    pub summary_depth: String,
    #[serde(default = "default_interaction_style")]
    pub interaction_style: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            summary_depth: default_summary_depth(),
            interaction_style: default_interaction_style(),
        }
    }
}

fn default_summary_depth() -> String {
    "Standard".to_string()
}
fn default_interaction_style() -> String {
    "Neutral".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub user_id: Uuid,
    #[serde(default)]
    pub session_history: Vec<Interaction>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub topics_interested: Vec<String>,
    #[serde(default = "Utc::now")]
    pub last_active: DateTime<Utc>,
}

impl ContextRecord {
    fn fresh(user_id: Uuid) -> Self {
        Self {
            user_id,
            session_history: Vec::new(),
            preferences: Preferences::default(),
            topics_interested: Vec::new(),
            last_active: Utc::now(),
        }
    }
}

pub struct ContextStore {
    path: PathBuf,
    explain_threshold: usize,
    record: ContextRecord,
}

impl ContextStore {
    /// Load the record at `path`.
    ///
    /// A missing file gives a fresh record with a new id. An unreadable or
    /// malformed file is logged and also gives a fresh record, keeping the
    /// stored `user_id` when that field alone is still valid. Nothing is
    /// written until the first change.
    pub fn load(path: &Path, explain_threshold: usize) -> Self {
        let record = match std::fs::read_to_string(path) {
            Ok(content) => parse_record(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ContextRecord::fresh(Uuid::new_v4())
            }
            Err(e) => {
                tracing::error!("Error loading context: {}", e);
                ContextRecord::fresh(Uuid::new_v4())
            }
        };

        Self {
            path: path.to_path_buf(),
            explain_threshold,
            record,
        }
    }

    pub fn record(&self) -> &ContextRecord {
        &self.record
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an interaction and persist.
    pub fn log_interaction(
        &mut self,
        kind: &str,
        query: Option<&str>,
        details: Option<serde_json::Value>,
    ) {
        let now = Utc::now();
        self.record.session_history.push(Interaction {
            timestamp: now,
            kind: kind.to_string(),
            query: query.map(String::from),
            details,
        });
        self.record.last_active = now;
        self.persist();
    }

    /// Prefix for generation prompts derived from preferences and history.
    pub fn adaptive_instruction(&self) -> String {
        let prefs = &self.record.preferences;
        let mut instruction = format!(
            "User Preference: {} depth. {} tone.\n",
            prefs.summary_depth, prefs.interaction_style
        );

        let explanations = self
            .record
            .session_history
            .iter()
            .filter(|i| i.kind == QUESTION_ASKED)
            .filter(|i| {
                i.query
                    .as_deref()
                    .is_some_and(|q| q.to_lowercase().contains("explain"))
            })
            .count();
        if explanations > self.explain_threshold {
            instruction.push_str(EXPLAIN_NOTE);
        }

        instruction
    }

    /// Empty history and topics. The user id and preferences survive.
    pub fn clear_history(&mut self) -> String {
        self.record.session_history.clear();
        self.record.topics_interested.clear();
        self.persist();
        "History cleared.".to_string()
    }

    pub fn update_preferences(&mut self, summary_depth: Option<&str>, interaction_style: Option<&str>) {
        if let Some(depth) = summary_depth {
            self.record.preferences.summary_depth = depth.to_string();
        }
        if let Some(style) = interaction_style {
            self.record.preferences.interaction_style = style.to_string();
        }
        self.persist();
    }

    /// The last `n` interactions, newest first.
    pub fn recent_history(&self, n: usize) -> Vec<Interaction> {
        self.record
            .session_history
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::error!("Error saving context: {:#}", e);
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create context directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&self.record)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write context file: {}", self.path.display()))?;
        Ok(())
    }
}

fn parse_record(content: &str) -> ContextRecord {
    match serde_json::from_str::<ContextRecord>(content) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Error loading context: {}", e);
            let salvaged = serde_json::from_str::<serde_json::Value>(content)
                .ok()
                .and_then(|v| v.get("user_id")?.as_str()?.parse::<Uuid>().ok());
            ContextRecord::fresh(salvaged.unwrap_or_else(Uuid::new_v4))
        }
    }
}

//! Core data models shared by ingestion, analysis, and presentation.
//!
//! Segments are produced once per upload and never mutated; the analysis
//! result set and chat transcript live only as long as the session that owns
//! them.

use serde::{Deserialize, Serialize};

/// Text of one non-empty PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

/// A bounded window of document text carrying its page provenance.
///
/// The unit of retrieval and prompting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub page_number: Option<u32>,
    /// Name of the uploaded file.
    pub source_id: String,
    /// Character offset of this window within its page text.
    pub start_offset: usize,
}

/// A generated question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

impl Faq {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Results of the Analysis view for the active document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResults {
    pub summary: Option<String>,
    pub questions: Vec<String>,
    pub faqs: Vec<Faq>,
}

/// One exchange in the Assistant transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Registered,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Registered => "Registered",
            Role::Guest => "Guest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Registered" => Some(Role::Registered),
            "Guest" => Some(Role::Guest),
            _ => None,
        }
    }
}

/// Descriptor returned by a successful login or guest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub is_authenticated: bool,
}

/// How much detail the summary should go into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisDepth {
    Brief,
    #[default]
    Standard,
    Deep,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDepth::Brief => "Brief",
            AnalysisDepth::Standard => "Standard",
            AnalysisDepth::Deep => "Deep",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "brief" => Some(AnalysisDepth::Brief),
            "standard" => Some(AnalysisDepth::Standard),
            "deep" => Some(AnalysisDepth::Deep),
            _ => None,
        }
    }
}

/// Why the user is reading; steers the summary prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadingPurpose {
    #[default]
    #[serde(rename = "General Reading")]
    GeneralReading,
    #[serde(rename = "Exam Preparation")]
    ExamPreparation,
    #[serde(rename = "Research / Academic")]
    Research,
    #[serde(rename = "Quick Revision")]
    QuickRevision,
}

impl ReadingPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingPurpose::GeneralReading => "General Reading",
            ReadingPurpose::ExamPreparation => "Exam Preparation",
            ReadingPurpose::Research => "Research / Academic",
            ReadingPurpose::QuickRevision => "Quick Revision",
        }
    }

    /// Accepts the display label or a short alias (`general`, `exam`,
    /// `research`, `revision`).
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "general reading" | "general" => Some(ReadingPurpose::GeneralReading),
            "exam preparation" | "exam" => Some(ReadingPurpose::ExamPreparation),
            "research / academic" | "research" | "academic" => Some(ReadingPurpose::Research),
            "quick revision" | "revision" => Some(ReadingPurpose::QuickRevision),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_column_text() {
        for role in [Role::Registered, Role::Guest] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("Admin"), None);
    }

    #[test]
    fn purpose_accepts_aliases() {
        assert_eq!(
            ReadingPurpose::parse("exam"),
            Some(ReadingPurpose::ExamPreparation)
        );
        assert_eq!(
            ReadingPurpose::parse("Research / Academic"),
            Some(ReadingPurpose::Research)
        );
        assert_eq!(ReadingPurpose::parse("skim"), None);
    }

    #[test]
    fn purpose_serializes_as_label() {
        let json = serde_json::to_string(&ReadingPurpose::QuickRevision).unwrap();
        assert_eq!(json, "\"Quick Revision\"");
    }
}

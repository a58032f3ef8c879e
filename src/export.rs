//! Downloadable analysis reports.
//!
//! A report bundles the summary, discussion questions, FAQs, the source
//! segments, and the Assistant transcript of the active document. Three
//! renderings are offered: plain text, JSON, and a self-contained HTML page.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::models::{AnalysisResults, ChatTurn, Faq, Segment};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Generate an analysis before exporting.")]
    NoAnalysis,
    #[error("Unknown export format: '{0}'. Use txt, json, or html.")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Json,
    Html,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self, ExportError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "json" => Ok(ExportFormat::Json),
            "html" => Ok(ExportFormat::Html),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }

    /// Download name stamped with the Unix time of `at`.
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        let ts = at.timestamp();
        match self {
            ExportFormat::Txt => format!("analysis_report_{}.txt", ts),
            ExportFormat::Json => format!("analysis_data_{}.json", ts),
            ExportFormat::Html => format!("analysis_report_{}.html", ts),
        }
    }
}

/// Everything a report serializes, borrowed from the session.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub source: &'a str,
    pub generated_at: DateTime<Utc>,
    pub summary: &'a str,
    pub questions: &'a [String],
    pub faqs: &'a [Faq],
    pub segments: &'a [Segment],
    pub chat: &'a [ChatTurn],
}

impl<'a> Report<'a> {
    /// Assemble a report. Fails until a summary has been generated.
    pub fn new(
        source: &'a str,
        results: &'a AnalysisResults,
        segments: &'a [Segment],
        chat: &'a [ChatTurn],
    ) -> Result<Self, ExportError> {
        let summary = results.summary.as_deref().ok_or(ExportError::NoAnalysis)?;
        Ok(Self {
            source,
            generated_at: Utc::now(),
            summary,
            questions: &results.questions,
            faqs: &results.faqs,
            segments,
            chat,
        })
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        Ok(match format {
            ExportFormat::Txt => self.to_text(),
            ExportFormat::Json => serde_json::to_string_pretty(self)?,
            ExportFormat::Html => self.to_html(),
        })
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("BOOK ANALYSIS REPORT\n");
        out.push_str(&format!("Source: {}\n", self.source));
        out.push_str(&format!("Generated: {}\n", self.generated_at.to_rfc3339()));

        section(&mut out, "SUMMARY");
        out.push_str(self.summary.trim());
        out.push('\n');

        if !self.questions.is_empty() {
            section(&mut out, "DISCUSSION QUESTIONS");
            for (i, q) in self.questions.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, q));
            }
        }

        if !self.faqs.is_empty() {
            section(&mut out, "FREQUENTLY ASKED QUESTIONS");
            for faq in self.faqs {
                out.push_str(&format!("Q: {}\nA: {}\n\n", faq.question, faq.answer));
            }
        }

        if !self.chat.is_empty() {
            section(&mut out, "ASSISTANT TRANSCRIPT");
            for turn in self.chat {
                out.push_str(&format!("You: {}\nAI: {}\n\n", turn.question, turn.answer));
            }
        }

        section(&mut out, "SOURCE SEGMENTS");
        for (i, seg) in self.segments.iter().enumerate() {
            out.push_str(&format!("[{}] {}\n{}\n\n", i + 1, page_label(seg), seg.text));
        }
        out
    }

    fn to_html(&self) -> String {
        let mut body = String::new();
        body.push_str(&format!(
            "<h1>Book Analysis Report</h1>\n<p class=\"meta\">{} &middot; {}</p>\n",
            escape_html(self.source),
            self.generated_at.to_rfc3339()
        ));

        body.push_str("<h2>Summary</h2>\n");
        body.push_str(&paragraphs(self.summary));

        if !self.questions.is_empty() {
            body.push_str("<h2>Discussion Questions</h2>\n<ol>\n");
            for q in self.questions {
                body.push_str(&format!("<li>{}</li>\n", escape_html(q)));
            }
            body.push_str("</ol>\n");
        }

        if !self.faqs.is_empty() {
            body.push_str("<h2>Frequently Asked Questions</h2>\n<dl>\n");
            for faq in self.faqs {
                body.push_str(&format!(
                    "<dt>{}</dt>\n<dd>{}</dd>\n",
                    escape_html(&faq.question),
                    escape_html(&faq.answer)
                ));
            }
            body.push_str("</dl>\n");
        }

        if !self.chat.is_empty() {
            body.push_str("<h2>Assistant Transcript</h2>\n");
            for turn in self.chat {
                body.push_str(&format!(
                    "<div class=\"chat-user\"><strong>You:</strong> {}</div>\n\
                     <div class=\"chat-assistant\"><strong>AI:</strong> {}</div>\n",
                    escape_html(&turn.question),
                    escape_html(&turn.answer)
                ));
            }
        }

        body.push_str("<h2>Source Segments</h2>\n");
        for seg in self.segments {
            body.push_str(&format!(
                "<details><summary>{}</summary><pre>{}</pre></details>\n",
                page_label(seg),
                escape_html(&seg.text)
            ));
        }

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Book Analysis Report</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
            REPORT_CSS, body
        )
    }
}

const REPORT_CSS: &str = "body{font-family:sans-serif;max-width:52rem;margin:2rem auto;line-height:1.5;color:#2c3e50}\
h1{color:#1f4e79}.meta{color:#7f8c8d}dt{font-weight:bold;margin-top:1rem}\
.chat-user{background:#eef5fb;padding:.5rem;margin-top:.75rem}.chat-assistant{background:#f4f6f6;padding:.5rem}\
pre{white-space:pre-wrap}";

fn section(out: &mut String, title: &str) {
    out.push_str(&format!("\n{}\n{}\n", title, "=".repeat(title.len())));
}

fn page_label(seg: &Segment) -> String {
    match seg.page_number {
        Some(p) => format!("Page {}", p),
        None => "Page ?".to_string(),
    }
}

fn paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>\n", escape_html(p).replace('\n', "<br>")))
        .collect()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write a rendered report to `output`, or to stdout when `None`.
pub fn write_report(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, content)?;
            eprintln!("Exported report to {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

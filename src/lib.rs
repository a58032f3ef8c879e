//! # Book Analyzer
//!
//! Upload a PDF, index it semantically, and explore it through an LLM
//! (summaries, question answering, discussion questions, FAQs) alongside
//! lightweight reading statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌───────────────┐
//! │  PDF      │──▶│ Extract +   │──▶│ Semantic      │
//! │  upload   │   │ Segment     │   │ Index         │
//! └───────────┘   └─────────────┘   └──────┬────────┘
//!                                          │
//!        ┌──────────────┐          ┌───────▼────────┐    ┌────────────┐
//!        │ Context Store│◀────────▶│ AnalysisEngine │───▶│ Gemini /   │
//!        │ (JSON file)  │          └───────┬────────┘    │ Offline    │
//!        └──────────────┘                  │             └────────────┘
//!                                  ┌───────▼────────┐
//!        ┌──────────────┐          │    Session     │
//!        │ Auth (SQLite)│─────────▶│  CLI  │  HTTP  │
//!        └──────────────┘          └────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory semantic index |
//! | [`generation`] | Gemini and offline text generation |
//! | [`context_store`] | Interaction history and adaptive instruction |
//! | [`parse`] | Parsers for generated questions and FAQs |
//! | [`analyzer`] | Prompt composition and orchestration |
//! | [`analytics`] | Readability, sentiment arc, keywords |
//! | [`auth`] | Account registration and login |
//! | [`session`] | Per-session state and operations |
//! | [`export`] | Text, JSON, and HTML reports |
//! | [`server`] | JSON HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analytics;
pub mod analyzer;
pub mod auth;
pub mod chunk;
pub mod config;
pub mod context_store;
pub mod db;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod generation;
pub mod index;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod server;
pub mod session;

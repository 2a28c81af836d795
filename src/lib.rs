//! welearn-search - retrieval core of a RAG backend
//!
//! Retrieves slices from a vector index, re-ranks them for relevance and
//! diversity (Maximal Marginal Relevance) and assembles them into
//! document-level results suitable for grounding an LLM answer.

pub mod cache;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod language;
pub mod retrieval;

pub use error::{Result, WelearnError};

//! Filingsum Core Library
//!
//! Chunked, resumable summarization of long regulatory filings with a local
//! language model.

pub mod chunker;
pub mod config;
pub mod document;
pub mod error;
pub mod inference;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod retrieval;
pub mod summarizer;

//! Documents and text extraction
//!
//! A [`Document`] is the cleaned text handed to the pipeline. Turning a raw
//! filing into one is the job of a [`TextExtractor`]; the bundled
//! [`FilingTextExtractor`] strips SGML/HTML markup with regular expressions
//! and picks the most useful section of an annual or quarterly report.

use std::fs;
use std::path::Path;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::error::{FilingError, Result};

/// Bump when chunk boundaries or record contents change for identical inputs
const FINGERPRINT_VERSION: u32 = 2;

/// Sections shorter than this fall back to the Business section
const MIN_SECTION_CHARS: usize = 1000;

/// Cleaned text to summarize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Owning entity, e.g. a ticker symbol
    pub entity: String,
    /// Document category, e.g. a form type
    pub category: String,
    pub text: String,
}

impl Document {
    pub fn new(
        entity: impl Into<String>,
        category: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            category: category.into(),
            text: text.into(),
        }
    }

    /// True when there is nothing but whitespace to summarize
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Hash identifying this text under the given chunking parameters.
    ///
    /// `mode` names what a record entry holds (e.g. independent or cumulative
    /// summaries and their focus); records written in another mode never match.
    pub fn fingerprint(&self, chunker: &Chunker, mode: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_VERSION.to_le_bytes());
        hasher.update((chunker.chunk_size() as u64).to_le_bytes());
        hasher.update((chunker.overlap() as u64).to_le_bytes());
        hasher.update((mode.len() as u64).to_le_bytes());
        hasher.update(mode.as_bytes());
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Result of processing a raw filing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub main_text: String,
    /// Set when the file could not be processed; the text must not be used
    pub error: Option<String>,
}

impl ExtractedText {
    pub fn ok(main_text: impl Into<String>) -> Self {
        Self {
            main_text: main_text.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            main_text: String::new(),
            error: Some(error.into()),
        }
    }

    /// Convert into a document, treating an extraction error as fatal input
    pub fn into_document(self, path: &Path, entity: &str, category: &str) -> Result<Document> {
        match self.error {
            Some(reason) => Err(FilingError::Extraction {
                path: path.to_path_buf(),
                reason,
            }),
            None => Ok(Document::new(entity, category, self.main_text)),
        }
    }
}

/// Turns a raw filing on disk into a single block of readable text
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> ExtractedText;
}

/// Regex-based extractor for EDGAR full-submission text files
#[derive(Debug, Clone)]
pub struct FilingTextExtractor {
    hidden_blocks: Regex,
    tags: Regex,
    whitespace: Regex,
    sections: Vec<(&'static str, Regex)>,
}

impl FilingTextExtractor {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| FilingError::invalid_value("text pattern", e))
        };
        Ok(Self {
            hidden_blocks: compile(r"(?is)<(script|style|head)\b.*?</(script|style|head)\s*>")?,
            tags: compile(r"(?s)<[^>]*>")?,
            whitespace: compile(r"\s+")?,
            sections: vec![
                ("business", compile(r"(?i)item\s+1\.\s*business")?),
                ("risk_factors", compile(r"(?i)item\s+1a\.\s*risk\s*factors")?),
                (
                    "mda",
                    compile(r"(?i)item\s+7\.\s*management['’]s\s+discussion\s+and\s+analysis")?,
                ),
                (
                    "financial_statements",
                    compile(r"(?i)item\s+8\.\s*financial\s+statements")?,
                ),
            ],
        })
    }

    /// Remove markup, decode common entities and collapse whitespace
    pub fn clean_markup(&self, raw: &str) -> String {
        let visible = self.hidden_blocks.replace_all(raw, " ");
        let stripped = self.tags.replace_all(&visible, " ");
        let decoded = decode_entities(&stripped);
        self.whitespace.replace_all(&decoded, " ").trim().to_string()
    }

    /// Pick the Management's Discussion section, then Business, then everything
    pub fn select_section(&self, text: &str) -> String {
        let mut starts: Vec<(&str, usize)> = self
            .sections
            .iter()
            .filter_map(|(name, re)| re.find(text).map(|m| (*name, m.start())))
            .collect();

        if starts.is_empty() {
            warn!("no standard section headers found, using the whole document");
            return text.to_string();
        }
        starts.sort_by_key(|&(_, start)| start);

        let section = |wanted: &str| section_text(text, &starts, wanted);

        match (section("mda"), section("business")) {
            (Some(mda), Some(business)) if mda.chars().count() < MIN_SECTION_CHARS => {
                business.to_string()
            }
            (Some(mda), _) => mda.to_string(),
            (None, Some(business)) if business.chars().count() >= MIN_SECTION_CHARS => {
                business.to_string()
            }
            _ => text.to_string(),
        }
    }
}

impl TextExtractor for FilingTextExtractor {
    fn extract(&self, path: &Path) -> ExtractedText {
        info!(path = %path.display(), "processing filing");
        let raw = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => return ExtractedText::failed(format!("cannot read {}: {}", path.display(), e)),
        };
        debug!(bytes = raw.len(), "read raw filing");

        let text = self.clean_markup(&raw);
        let selected = self.select_section(&text);
        info!(chars = selected.chars().count(), "extracted text for summarization");
        ExtractedText::ok(selected)
    }
}

/// Text from a section header up to the next header (or the end)
fn section_text<'t>(text: &'t str, starts: &[(&str, usize)], wanted: &str) -> Option<&'t str> {
    let pos = starts.iter().position(|&(name, _)| name == wanted)?;
    let begin = starts[pos].1;
    let end = starts.get(pos + 1).map_or(text.len(), |&(_, s)| s);
    Some(text[begin..end].trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&#8217;", "’")
        .replace("&rsquo;", "’")
        .replace("&#8220;", "“")
        .replace("&#8221;", "”")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

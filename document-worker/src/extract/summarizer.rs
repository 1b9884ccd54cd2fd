//! Summarizers turn extracted text into a short summary.

use async_trait::async_trait;

use crate::errors::SummarizeError;

/// Approximate summary length in characters.
pub const DEFAULT_SUMMARY_CHARS: usize = 300;

/// Summary published when the summarizer fails.
pub const FALLBACK_SUMMARY: &str = "Summary unavailable due to processing error.";

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize non-empty text.
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

/// Takes the leading sentences of the text up to a character budget.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_chars: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_CHARS)
    }
}

impl ExtractiveSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    fn sentences(text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            if word.ends_with(['.', '!', '?']) {
                sentences.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            sentences.push(current);
        }
        sentences
    }

    /// Cut an overlong sentence at a word boundary.
    fn shorten(&self, sentence: &str) -> String {
        let mut out = String::new();
        for word in sentence.split_whitespace() {
            let extra = usize::from(!out.is_empty()) + word.chars().count();
            if out.chars().count() + extra > self.max_chars {
                break;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        if out.is_empty() {
            out = sentence.chars().take(self.max_chars).collect();
        }
        format!("{}...", out)
    }

    fn summarize_sync(&self, text: &str) -> String {
        let mut summary = String::new();
        for sentence in Self::sentences(text) {
            let extra = usize::from(!summary.is_empty()) + sentence.chars().count();
            if summary.chars().count() + extra > self.max_chars {
                if summary.is_empty() {
                    return self.shorten(&sentence);
                }
                break;
            }
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(&sentence);
        }
        summary
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        Ok(self.summarize_sync(text))
    }
}

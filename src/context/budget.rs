//! Relevance-ranked context packing and history truncation

use super::models::{ContextSection, Message, SectionSource};
use super::token_estimator::{CharRatioEstimator, TokenEstimator};
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, warn};

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Characters per token for the default estimator
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,

    /// Inserted between packed sections
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Query tokens this short or shorter are ignored
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,

    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
}

fn default_chars_per_token() -> f64 {
    4.0
}

fn default_separator() -> String {
    "\n\n---\n\n".to_string()
}

fn default_min_keyword_len() -> usize {
    3
}

fn default_stop_words() -> Vec<String> {
    [
        "that", "this", "with", "from", "have", "will", "would", "should", "could", "what",
        "when", "where", "which", "want", "need", "make", "create", "build", "please", "into",
        "about", "there", "their", "them", "they", "then", "than", "also", "some", "just",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            separator: default_separator(),
            min_keyword_len: default_min_keyword_len(),
            stop_words: default_stop_words(),
        }
    }
}

/// Packed context with bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    /// Topics of the sections that made it in, in output order
    pub topics: Vec<String>,
    pub estimated_tokens: usize,
    /// Set when the only section was cut to fit
    pub truncated: bool,
}

/// Packs reference documents and history into a token budget
#[derive(Clone)]
pub struct ContextBudgetManager {
    config: ContextConfig,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextBudgetManager {
    pub fn new(config: ContextConfig) -> Self {
        let estimator = Arc::new(CharRatioEstimator::new(config.chars_per_token));
        Self { config, estimator }
    }

    /// Use a different token estimator, e.g. [`super::TiktokenEstimator`]
    pub fn with_estimator(config: ContextConfig, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { config, estimator }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /// Split a markdown document at heading lines
    ///
    /// Text before the first heading is discarded. Lines inside fenced code
    /// blocks never start a section.
    pub fn split_sections(&self, document: &str, source: SectionSource) -> Vec<ContextSection> {
        let mut sections = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;
        let mut in_fence = false;

        for line in document.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
            }

            if !in_fence && is_heading(trimmed) {
                if let Some((header, body)) = current.take() {
                    sections.push(finish_section(header, body, source));
                }
                current = Some((trimmed.trim_end().to_string(), Vec::new()));
            } else if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }

        if let Some((header, body)) = current {
            sections.push(finish_section(header, body, source));
        }

        sections
    }

    /// Lower-cased query keywords used for scoring
    pub fn keywords(&self, query: &str) -> Vec<String> {
        query
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                    .to_lowercase()
            })
            .filter(|word| word.chars().count() > self.config.min_keyword_len)
            .filter(|word| !self.config.stop_words.iter().any(|s| s == word))
            .collect()
    }

    /// Sum of keyword occurrences in header and body
    pub fn score_section(&self, section: &ContextSection, keywords: &[String]) -> usize {
        let haystack = format!("{}\n{}", section.header, section.body).to_lowercase();
        keywords
            .iter()
            .map(|keyword| haystack.matches(keyword.as_str()).count())
            .sum()
    }

    /// Most relevant sections of `document` that fit in `max_tokens`
    pub fn assemble_context(&self, query: &str, document: &str, max_tokens: usize) -> String {
        self.assemble_from_sources(query, document, None, max_tokens)
            .text
    }

    /// Pack sections from a primary and an optional secondary document
    ///
    /// Primary sections win score ties. Packing stops at the first section
    /// that would push the output past `max_tokens`.
    pub fn assemble_from_sources(
        &self,
        query: &str,
        primary: &str,
        secondary: Option<&str>,
        max_tokens: usize,
    ) -> AssembledContext {
        let keywords = self.keywords(query);
        if keywords.is_empty() {
            debug!("No usable keywords in query; context left empty");
            return AssembledContext::default();
        }

        let mut sections = self.split_sections(primary, SectionSource::Primary);
        if let Some(doc) = secondary {
            sections.extend(self.split_sections(doc, SectionSource::Secondary));
        }

        let mut scored: Vec<(usize, ContextSection)> = sections
            .into_iter()
            .map(|section| (self.score_section(&section, &keywords), section))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by_key(|(score, section)| (Reverse(*score), section.source));

        let mut result = AssembledContext::default();
        for (score, section) in scored {
            let text = section.text();
            let candidate = if result.text.is_empty() {
                text.clone()
            } else {
                format!("{}{}{}", result.text, self.config.separator, text)
            };
            let tokens = self.estimator.estimate(&candidate);

            if tokens <= max_tokens {
                debug!("Packed section '{}' (score {})", section.topic, score);
                result.text = candidate;
                result.estimated_tokens = tokens;
                result.topics.push(section.topic);
                continue;
            }

            if result.text.is_empty() {
                let cut = self.truncate_to_tokens(&text, max_tokens);
                if !cut.is_empty() {
                    warn!(
                        "Section '{}' exceeds {} tokens on its own; truncated",
                        section.topic, max_tokens
                    );
                    result.estimated_tokens = self.estimator.estimate(&cut);
                    result.text = cut;
                    result.topics.push(section.topic);
                    result.truncated = true;
                }
            }
            break;
        }

        METRICS
            .context_tokens_used
            .observe(result.estimated_tokens as f64);
        result
    }

    /// Keep the newest messages whose combined estimate, plus
    /// `reserved_tokens`, stays within `budget_tokens`
    ///
    /// The newest message is always kept. Output is chronological.
    pub fn truncate_history(
        &self,
        messages: &[Message],
        reserved_tokens: usize,
        budget_tokens: usize,
    ) -> Vec<Message> {
        let mut kept: Vec<Message> = Vec::new();
        let mut accumulated = 0usize;

        for message in messages.iter().rev() {
            let serialized =
                serde_json::to_string(message).unwrap_or_else(|_| message.content.clone());
            let tokens = self.estimator.estimate(&serialized);

            if !kept.is_empty() && accumulated + tokens + reserved_tokens > budget_tokens {
                break;
            }
            accumulated += tokens;
            kept.push(message.clone());
        }

        let dropped = messages.len() - kept.len();
        if dropped > 0 {
            debug!("Dropped {} of {} history messages", dropped, messages.len());
        }
        METRICS.history_messages_dropped.observe(dropped as f64);

        kept.reverse();
        kept
    }

    /// Longest prefix of `text` within `max_tokens`, cut at a line break
    /// when one falls in the back half
    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(text.len()))
            .collect();

        // Largest char count whose prefix fits
        let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.estimator.estimate(&text[..boundaries[mid]]) <= max_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        let prefix = &text[..boundaries[lo]];
        match prefix.rfind('\n') {
            Some(idx) if idx >= prefix.len() / 2 => prefix[..idx].trim_end().to_string(),
            _ => prefix.to_string(),
        }
    }
}

impl Default for ContextBudgetManager {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .map_or(false, |c| c.is_whitespace())
        && !line[hashes..].trim().is_empty()
}

fn finish_section(header: String, body: Vec<&str>, source: SectionSource) -> ContextSection {
    let body = body.join("\n").trim().to_string();
    ContextSection::new(header, body, source)
}

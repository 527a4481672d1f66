//! Content filtering for outgoing messages

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of running text through a [`ContentFilter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub blocked: bool,
    pub cleaned_text: String,
}

impl FilterVerdict {
    pub fn clean(text: impl Into<String>) -> Self {
        Self {
            blocked: false,
            cleaned_text: text.into(),
        }
    }
}

#[async_trait]
pub trait ContentFilter: Send + Sync {
    async fn filter(&self, text: &str) -> Result<FilterVerdict>;
}

const DEFAULT_BLOCKLIST: &[&str] = &[
    "fuck", "shit", "bitch", "cunt", "dick", "pussy", "whore", "slut", "nigger", "faggot",
    "retard", "nazi", "hitler",
];

/// Case-insensitive substring blocklist.
///
/// Any hit blocks the message; `cleaned_text` masks every hit with `*`.
#[derive(Debug, Clone)]
pub struct WordListFilter {
    words: Vec<String>,
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKLIST.iter().copied())
    }
}

impl WordListFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn with_words<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words.extend(Self::new(extra).words);
        self
    }

    pub fn check(&self, text: &str) -> FilterVerdict {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return FilterVerdict::clean(text);
        }

        // Mask on chars so multi-byte text keeps its boundaries
        let original: Vec<char> = trimmed.chars().collect();
        let lower: Vec<char> = original
            .iter()
            .map(|c| c.to_lowercase().next().unwrap_or(*c))
            .collect();
        let mut masked = vec![false; original.len()];
        let mut blocked = false;

        for word in &self.words {
            let needle: Vec<char> = word.chars().collect();
            if needle.len() > lower.len() {
                continue;
            }
            for start in 0..=(lower.len() - needle.len()) {
                if lower[start..start + needle.len()] == needle[..] {
                    blocked = true;
                    masked[start..start + needle.len()].fill(true);
                }
            }
        }

        if !blocked {
            return FilterVerdict::clean(trimmed);
        }

        let cleaned_text = original
            .iter()
            .zip(&masked)
            .map(|(c, hit)| if *hit { '*' } else { *c })
            .collect();
        FilterVerdict {
            blocked,
            cleaned_text,
        }
    }
}

#[async_trait]
impl ContentFilter for WordListFilter {
    async fn filter(&self, text: &str) -> Result<FilterVerdict> {
        Ok(self.check(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_passes_trimmed() {
        let filter = WordListFilter::default();
        assert_eq!(filter.check("  hello there "), FilterVerdict::clean("hello there"));
    }

    #[test]
    fn test_empty_text_is_clean() {
        let filter = WordListFilter::default();
        assert!(!filter.check("").blocked);
        assert!(!filter.check("   ").blocked);
    }

    #[test]
    fn test_compound_words_are_caught_and_masked() {
        let filter = WordListFilter::new(["darn"]);
        let verdict = filter.check("Oh DARNit, really");
        assert!(verdict.blocked);
        assert_eq!(verdict.cleaned_text, "Oh ****it, really");
    }

    #[test]
    fn test_extra_words_extend_default_list() {
        let filter = WordListFilter::default().with_words(["spoiler"]);
        assert!(filter.check("big SPOILER ahead").blocked);
        assert!(filter.check("you nazi").blocked);
    }
}

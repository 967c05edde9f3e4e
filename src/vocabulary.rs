//! Parsing and validation of the model's vocabulary reply.

use crate::error::VocabularyError;
use crate::prompt::{MAX_VOCABULARY, VOCABULARY_KEY};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// One English term or phrase with its German translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabularyEntry {
    pub english: String,
    pub german: String,
}

impl VocabularyEntry {
    pub fn new(english: impl Into<String>, german: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            german: german.into(),
        }
    }
}

/// Parse `{"vocabulary_lst": [{english: german}, ...]}` into entries.
///
/// Accepts an optional Markdown code fence around the JSON. If the text does
/// not parse as-is, raw newlines are dropped and parsing is retried once.
/// Every list element must be an object with exactly one string value.
pub fn parse_vocabulary(raw: &str) -> Result<Vec<VocabularyEntry>, VocabularyError> {
    let json_str = strip_code_fence(raw);

    let value: Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(first) => {
            debug!("Vocabulary JSON did not parse ({}), retrying without newlines", first);
            let flattened: String = json_str.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();
            serde_json::from_str(&flattened)?
        }
    };

    let object = value.as_object().ok_or(VocabularyError::NotAnObject)?;
    let list = object
        .get(VOCABULARY_KEY)
        .ok_or(VocabularyError::MissingKey)?
        .as_array()
        .ok_or(VocabularyError::NotAList)?;

    let mut entries = list
        .iter()
        .enumerate()
        .map(|(index, item)| parse_entry(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    if entries.len() > MAX_VOCABULARY {
        warn!(
            "Model returned {} entries, keeping the first {}",
            entries.len(),
            MAX_VOCABULARY
        );
        entries.truncate(MAX_VOCABULARY);
    }

    Ok(entries)
}

fn parse_entry(index: usize, item: &Value) -> Result<VocabularyEntry, VocabularyError> {
    let malformed = |reason: &str| VocabularyError::MalformedEntry {
        index,
        reason: reason.to_string(),
    };

    let map = item.as_object().ok_or_else(|| malformed("is not an object"))?;
    if map.len() != 1 {
        return Err(malformed(&format!("has {} keys, expected exactly one", map.len())));
    }

    let (english, german) = map
        .iter()
        .next()
        .ok_or_else(|| malformed("is empty"))?;
    let german = german
        .as_str()
        .ok_or_else(|| malformed("has a non-string translation"))?;

    let english = english.trim();
    if english.is_empty() {
        return Err(malformed("has an empty English term"));
    }

    Ok(VocabularyEntry::new(english, german.trim()))
}

fn strip_code_fence(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

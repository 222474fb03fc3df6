//! Record model shared by every store.
//!
//! A record is identified by its `(author, title)` pair. Content fields are
//! optional strings; an empty string and an absent value are the same thing,
//! so records are normalized before they are persisted or compared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author used when a record is submitted with a blank author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Natural key of a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub author: String,
    pub title: String,
}

impl RecordKey {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
        }
    }

    /// Key with the blank-author rule applied.
    pub fn normalized(&self) -> Self {
        Self {
            author: normalize_author(&self.author),
            title: self.title.clone(),
        }
    }

    /// Identifier of the search document derived from this key.
    ///
    /// The unit separator cannot be typed in either field by a spreadsheet or
    /// form, so distinct keys never collide.
    pub fn document_id(&self) -> String {
        format!("{}\u{1f}{}", self.author, self.title)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.author, self.title)
    }
}

/// Returns [`UNKNOWN_AUTHOR`] for blank authors.
pub fn normalize_author(author: &str) -> String {
    if author.trim().is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        author.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub author: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons: Option<String>,
    /// Public path of the audio asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    /// Public path of the supplementary document asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    /// Milliseconds since the Unix epoch of the last successful write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

impl Record {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.author.clone(), self.title.clone())
    }

    /// Builder-style setter for any known field.
    pub fn with(mut self, field: RecordField, value: impl Into<String>) -> Self {
        field.set(&mut self, value.into());
        self
    }

    /// Turns empty optional fields into `None` and applies the blank-author rule.
    pub fn normalized(mut self) -> Self {
        self.author = normalize_author(&self.author);
        for field in RecordField::OPTIONAL {
            if field.get(&self).is_some_and(str::is_empty) {
                field.clear(&mut self);
            }
        }
        self
    }

    /// Key-sorted JSON form without `lastModified`, used to decide whether two
    /// records carry the same source data.
    pub fn canonical_form(&self) -> serde_json::Value {
        let mut record = self.clone().normalized();
        record.last_modified = None;
        // serde_json::Map is a BTreeMap, so the serialization is key-sorted.
        serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
    }

    /// True when both records hold the same data, ignoring `lastModified`.
    pub fn same_content(&self, other: &Record) -> bool {
        self.canonical_form() == other.canonical_form()
    }
}

/// Every string field a record exposes, under its canonical camelCase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Author,
    Title,
    Text,
    Chords,
    Translation,
    Options,
    Review,
    Lessons,
    AudioPath,
    DocumentPath,
}

impl RecordField {
    pub const ALL: [RecordField; 10] = [
        RecordField::Author,
        RecordField::Title,
        RecordField::Text,
        RecordField::Chords,
        RecordField::Translation,
        RecordField::Options,
        RecordField::Review,
        RecordField::Lessons,
        RecordField::AudioPath,
        RecordField::DocumentPath,
    ];

    pub const OPTIONAL: [RecordField; 8] = [
        RecordField::Text,
        RecordField::Chords,
        RecordField::Translation,
        RecordField::Options,
        RecordField::Review,
        RecordField::Lessons,
        RecordField::AudioPath,
        RecordField::DocumentPath,
    ];

    /// Full-text searchable fields, in index column order.
    pub const SEARCHABLE: [RecordField; 8] = [
        RecordField::Author,
        RecordField::Title,
        RecordField::Text,
        RecordField::Chords,
        RecordField::Translation,
        RecordField::Options,
        RecordField::Review,
        RecordField::Lessons,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RecordField::Author => "author",
            RecordField::Title => "title",
            RecordField::Text => "text",
            RecordField::Chords => "chords",
            RecordField::Translation => "translation",
            RecordField::Options => "options",
            RecordField::Review => "review",
            RecordField::Lessons => "lessons",
            RecordField::AudioPath => "audioPath",
            RecordField::DocumentPath => "documentPath",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Fields produced by the asset manager rather than typed by a user.
    pub fn is_derived(self) -> bool {
        matches!(self, RecordField::AudioPath | RecordField::DocumentPath)
    }

    pub fn get(self, record: &Record) -> Option<&str> {
        match self {
            RecordField::Author => Some(record.author.as_str()),
            RecordField::Title => Some(record.title.as_str()),
            RecordField::Text => record.text.as_deref(),
            RecordField::Chords => record.chords.as_deref(),
            RecordField::Translation => record.translation.as_deref(),
            RecordField::Options => record.options.as_deref(),
            RecordField::Review => record.review.as_deref(),
            RecordField::Lessons => record.lessons.as_deref(),
            RecordField::AudioPath => record.audio_path.as_deref(),
            RecordField::DocumentPath => record.document_path.as_deref(),
        }
    }

    pub fn set(self, record: &mut Record, value: String) {
        match self {
            RecordField::Author => record.author = value,
            RecordField::Title => record.title = value,
            RecordField::Text => record.text = Some(value),
            RecordField::Chords => record.chords = Some(value),
            RecordField::Translation => record.translation = Some(value),
            RecordField::Options => record.options = Some(value),
            RecordField::Review => record.review = Some(value),
            RecordField::Lessons => record.lessons = Some(value),
            RecordField::AudioPath => record.audio_path = Some(value),
            RecordField::DocumentPath => record.document_path = Some(value),
        }
    }

    fn clear(self, record: &mut Record) {
        match self {
            RecordField::Author => record.author.clear(),
            RecordField::Title => record.title.clear(),
            RecordField::Text => record.text = None,
            RecordField::Chords => record.chords = None,
            RecordField::Translation => record.translation = None,
            RecordField::Options => record.options = None,
            RecordField::Review => record.review = None,
            RecordField::Lessons => record.lessons = None,
            RecordField::AudioPath => record.audio_path = None,
            RecordField::DocumentPath => record.document_path = None,
        }
    }
}

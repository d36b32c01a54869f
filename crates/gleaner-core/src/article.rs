//! The harvested record type and its wire encoding.

use crate::error::{HarvestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder account label used whenever the real one cannot be read.
pub const UNKNOWN_ACCOUNT: &str = "unknown";

/// Field separator of the persisted wire encoding (`title|url|date`).
const WIRE_SEPARATOR: char = '|';

/// One harvested item: a title, an absolute URL, and a publication date.
///
/// Articles are only built through [`Article::new`], which enforces the
/// invariants the rest of the system relies on: no empty fields, no wire
/// separator inside a field, and a parseable date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub published: NaiveDate,
}

impl Article {
    /// Builds a validated article from raw rendered text.
    ///
    /// Returns an error when a field is empty, contains the `|` wire
    /// separator, or when the date text matches neither `%Y-%m-%d` nor
    /// `%Y/%m/%d`. Callers treat any of these as a malformed item and
    /// skip it.
    pub fn new(title: &str, url: &str, date_text: &str) -> Result<Self> {
        let title = title.trim();
        let url = url.trim();
        let date_text = date_text.trim();

        if title.is_empty() {
            return Err(HarvestError::invalid_record("empty title"));
        }
        if url.is_empty() {
            return Err(HarvestError::invalid_record("empty url"));
        }
        if date_text.is_empty() {
            return Err(HarvestError::invalid_record("empty date"));
        }
        for (name, value) in [("title", title), ("url", url), ("date", date_text)] {
            if value.contains(WIRE_SEPARATOR) {
                return Err(HarvestError::invalid_record(format!(
                    "{} contains the '{}' separator",
                    name, WIRE_SEPARATOR
                )));
            }
        }

        let published = parse_date(date_text)
            .ok_or_else(|| HarvestError::invalid_record(format!("unparsable date: {date_text}")))?;

        Ok(Self {
            title: title.to_string(),
            url: url.to_string(),
            published,
        })
    }

    /// Encodes the article as the persisted `title|url|YYYY-MM-DD` literal.
    pub fn to_wire(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.title,
            self.url,
            self.published.format("%Y-%m-%d"),
            sep = WIRE_SEPARATOR
        )
    }

    /// Decodes a persisted `title|url|date` literal.
    ///
    /// The field count must be exactly three; extra separators mean the
    /// entry was written by something that did not escape its input, and
    /// guessing a split would silently corrupt the record.
    pub fn from_wire(encoded: &str) -> Result<Self> {
        let fields: Vec<&str> = encoded.split(WIRE_SEPARATOR).collect();
        match fields.as_slice() {
            [title, url, date_text] => Self::new(title, url, date_text),
            _ => Err(HarvestError::invalid_record(format!(
                "expected 3 '|'-separated fields, got {}",
                fields.len()
            ))),
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y/%m/%d"))
        .ok()
}

use chrono::NaiveDate;
use glob::Pattern;
use std::collections::BTreeSet;

use crate::error::HistoryError;
use crate::history_store::Record;

/// Compiled search criteria over the history.
///
/// Empty filename patterns and an empty date set both mean "match all". A
/// missing comment pattern behaves like `*`. Patterns use shell-style
/// wildcards (`*`, `?`, `[seq]`, `[!seq]`) anchored to the whole string.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    filenames: Vec<Pattern>,
    comment: Option<Pattern>,
    dates: BTreeSet<String>,
}

impl RecordFilter {
    pub fn new<F, D>(filenames: F, comment: Option<&str>, dates: D) -> Result<Self, HistoryError>
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let filenames = filenames
            .into_iter()
            .map(|raw| compile(raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let comment = comment.map(compile).transpose()?;
        let dates = dates
            .into_iter()
            .map(|raw| normalize_date(raw.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self {
            filenames,
            comment,
            dates,
        })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.dates.iter().map(String::as_str)
    }

    pub fn matches_date(&self, date: &str) -> bool {
        self.dates.is_empty() || self.dates.contains(date)
    }

    pub fn matches(&self, record: &Record) -> bool {
        let filename_ok = self.filenames.is_empty()
            || self
                .filenames
                .iter()
                .any(|pattern| pattern.matches(&record.filename));
        let comment_ok = self
            .comment
            .as_ref()
            .map_or(true, |pattern| pattern.matches(&record.comment));
        filename_ok && comment_ok
    }
}

fn compile(raw: &str) -> Result<Pattern, HistoryError> {
    Pattern::new(&collapse_stars(raw)).map_err(|source| HistoryError::InvalidPattern {
        pattern: raw.to_string(),
        source,
    })
}

/// Folds every run of `*` outside a `[...]` class into one `*`. A run of
/// stars means the same as one star in fnmatch, while `Pattern` would read
/// `**` as a recursive path wildcard.
fn collapse_stars(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => {
                let mut end = i + 1;
                if chars.get(end) == Some(&'!') {
                    end += 1;
                }
                if chars.get(end) == Some(&']') {
                    end += 1;
                }
                while end < chars.len() && chars[end] != ']' {
                    end += 1;
                }
                if end < chars.len() {
                    out.extend(&chars[i..=end]);
                    i = end;
                } else {
                    out.push('[');
                }
            }
            ch => out.push(ch),
        }
        i += 1;
    }
    out
}

fn normalize_date(raw: &str) -> Result<String, HistoryError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| HistoryError::InvalidDate(trimmed.to_string()))
}

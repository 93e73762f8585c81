use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::HistoryError;
use crate::record_filter::RecordFilter;

/// Placeholder comment written by releases before comments became optional.
pub const LEGACY_NO_COMMENT: &str = "--- NO COMMENT ---";

/// One uploaded image. The upload date is not a field: it is the key of the
/// bucket holding the record. Unknown keys are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub filename: String,
    pub url: String,
    pub delete: String,
    #[serde(default)]
    pub comment: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record seen through a filter, paired with its bucket date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedRecord<'a> {
    pub date: &'a str,
    pub record: &'a Record,
}

type Buckets = BTreeMap<String, Vec<Record>>;

/// Local upload history backed by a single pretty-printed JSON file mapping
/// ISO dates to the records uploaded that day, in upload order.
///
/// The whole file is read on [`HistoryStore::load`] and rewritten after every
/// mutation. Other processes writing the same file concurrently are not
/// coordinated with.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    history: Buckets,
}

impl HistoryStore {
    /// Loads the history at `path`, creating it as `{}` when missing.
    pub fn load(path: PathBuf) -> Result<Self, HistoryError> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| HistoryError::Write {
                    path: path.clone(),
                    source,
                })?;
            }
            fs::write(&path, "{}").map_err(|source| HistoryError::Write {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "initialized empty history");
        }

        let history = read_buckets(&path)?;
        debug!(
            path = %path.display(),
            dates = history.len(),
            "history loaded"
        );
        Ok(Self { path, history })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.history.values().all(Vec::is_empty)
    }

    pub fn contains_date(&self, date: &str) -> bool {
        self.history.get(date).is_some_and(|items| !items.is_empty())
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.history.keys().map(String::as_str)
    }

    /// Appends `record` under today's local date and persists.
    pub fn insert(&mut self, record: Record) -> Result<String, HistoryError> {
        self.insert_on(Local::now().date_naive(), record)
    }

    pub fn insert_on(&mut self, date: NaiveDate, record: Record) -> Result<String, HistoryError> {
        let date_key = date.format("%Y-%m-%d").to_string();
        debug!(date = %date_key, filename = %record.filename, "inserting record");
        self.history.entry(date_key.clone()).or_default().push(record);
        self.save()?;
        Ok(date_key)
    }

    /// Lazily yields matching records, buckets in date order and records in
    /// insertion order.
    pub fn filter<'a>(
        &'a self,
        filter: &'a RecordFilter,
    ) -> impl Iterator<Item = DatedRecord<'a>> + 'a {
        self.history
            .iter()
            .filter(move |(date, _)| filter.matches_date(date))
            .flat_map(move |(date, items)| {
                items
                    .iter()
                    .filter(move |record| filter.matches(record))
                    .map(move |record| DatedRecord {
                        date: date.as_str(),
                        record,
                    })
            })
    }

    /// Removes every record whose delete url is in `urls`, drops buckets left
    /// empty and persists. Returns how many records were removed.
    pub fn delete_by_urls<I, S>(&mut self, urls: I) -> Result<usize, HistoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: HashSet<String> = urls
            .into_iter()
            .map(|url| url.as_ref().to_string())
            .collect();

        let before = self.len();
        for items in self.history.values_mut() {
            items.retain(|record| !targets.contains(&record.delete));
        }
        self.history.retain(|_, items| !items.is_empty());
        let removed = before - self.len();

        debug!(requested = targets.len(), removed, "pruned history");
        self.save()?;
        Ok(removed)
    }

    /// Rewrites the legacy placeholder comment to an empty string and
    /// persists. Returns how many records changed.
    pub fn migrate_legacy_comments(&mut self) -> Result<usize, HistoryError> {
        let mut migrated = 0;
        for record in self.history.values_mut().flatten() {
            if record.comment == LEGACY_NO_COMMENT {
                record.comment.clear();
                migrated += 1;
            }
        }

        debug!(migrated, "migrated legacy comments");
        self.save()?;
        Ok(migrated)
    }

    pub fn save(&self) -> Result<(), HistoryError> {
        let visible: BTreeMap<&str, &[Record]> = self
            .history
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(date, items)| (date.as_str(), items.as_slice()))
            .collect();
        let payload = serde_json::to_string_pretty(&visible).map_err(HistoryError::Serialize)?;
        write_atomic(&self.path, &payload)?;
        debug!(path = %self.path.display(), records = self.len(), "history saved");
        Ok(())
    }
}

fn read_buckets(source: &Path) -> Result<Buckets, HistoryError> {
    let raw_text = fs::read_to_string(source).map_err(|source_err| HistoryError::Read {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    if raw_text.trim().is_empty() {
        return Ok(Buckets::new());
    }

    serde_json::from_str(&raw_text).map_err(|source_err| HistoryError::Corrupted {
        path: source.to_path_buf(),
        source: source_err,
    })
}

fn write_atomic(target: &Path, payload: &str) -> Result<(), HistoryError> {
    let tmp_name = format!(
        "{}.tmp",
        target
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(".sm.ms.history")
    );
    let tmp_path = target.with_file_name(tmp_name);
    let write_err = |source| HistoryError::Write {
        path: target.to_path_buf(),
        source,
    };

    fs::write(&tmp_path, payload).map_err(write_err)?;
    fs::rename(&tmp_path, target).map_err(|source| {
        fs::remove_file(&tmp_path).ok();
        write_err(source)
    })
}

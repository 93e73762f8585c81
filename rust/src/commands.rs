use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::CommandError;
use crate::history_store::{HistoryStore, Record};
use crate::image_host::ImageHost;
use crate::record_filter::RecordFilter;

/// Interactive questions asked while deleting.
pub trait Prompter {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
    fn input(&mut self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Ask before each remote delete.
    pub confirm: bool,
    /// Let the user pick a single record out of the matches.
    pub pick: bool,
}

/// Uploads each image independently. Successful uploads are recorded right
/// away; failures are reported and leave the history untouched.
pub fn upload<H, W>(
    store: &mut HistoryStore,
    host: &H,
    images: &[PathBuf],
    comment: &str,
    out: &mut W,
) -> Result<UploadSummary>
where
    H: ImageHost + ?Sized,
    W: Write,
{
    let mut summary = UploadSummary::default();
    if images.is_empty() {
        writeln!(out, "WARNING: no image to upload")?;
        return Ok(summary);
    }

    for image in images {
        let remote = match host.upload(image) {
            Ok(remote) => remote,
            Err(err) => {
                warn!(image = %image.display(), error = %err, "upload failed");
                writeln!(out, "ERROR: {} upload failed: {}", image.display(), err)?;
                summary.failed += 1;
                continue;
            }
        };

        store
            .insert(Record {
                filename: remote.filename.clone(),
                url: remote.url.clone(),
                delete: remote.delete,
                comment: comment.to_string(),
                extra: Default::default(),
            })
            .with_context(|| format!("failed to record upload of {}", image.display()))?;
        info!(filename = %remote.filename, "uploaded");
        writeln!(
            out,
            "SUCCESS: image {} upload success, url {}",
            remote.filename, remote.url
        )?;
        summary.uploaded += 1;
    }

    Ok(summary)
}

/// Prints matching records with 1-based indices and returns how many matched.
pub fn search<W: Write>(store: &HistoryStore, filter: &RecordFilter, out: &mut W) -> Result<usize> {
    warn_missing_dates(store, filter, out)?;

    let matches: Vec<_> = store.filter(filter).collect();
    if matches.is_empty() {
        writeln!(out, "WARNING: no match found")?;
        return Ok(0);
    }

    writeln!(out, "SUCCESS: {} matches found", matches.len())?;
    for (index, item) in matches.iter().enumerate() {
        writeln!(out, "{}", render_line(index + 1, item.date, item.record))?;
    }
    Ok(matches.len())
}

/// Deletes matching images remotely, then prunes only the ones the service
/// confirmed from the history in a single write.
pub fn delete<H, P, W>(
    store: &mut HistoryStore,
    host: &H,
    filter: &RecordFilter,
    options: DeleteOptions,
    prompter: &mut P,
    out: &mut W,
) -> Result<DeleteSummary>
where
    H: ImageHost + ?Sized,
    P: Prompter + ?Sized,
    W: Write,
{
    warn_missing_dates(store, filter, out)?;

    let mut candidates: Vec<(String, Record)> = store
        .filter(filter)
        .map(|item| (item.date.to_string(), item.record.clone()))
        .collect();
    let mut summary = DeleteSummary::default();
    if candidates.is_empty() {
        writeln!(out, "WARNING: no match found")?;
        return Ok(summary);
    }

    if options.pick {
        for (index, (date, record)) in candidates.iter().enumerate() {
            writeln!(out, "{}", render_line(index + 1, date, record))?;
        }
        let answer = prompter.input("Which would you like to remove? [index/q to quit]")?;
        let chosen = parse_selection(&answer, candidates.len())?;
        candidates = vec![candidates.swap_remove(chosen)];
    }

    let mut deleted_urls = Vec::new();
    for (_, record) in &candidates {
        if options.confirm
            && !prompter.confirm(&format!("delete {}({})", record.filename, record.comment))?
        {
            summary.skipped += 1;
            continue;
        }

        match host.delete(&record.delete) {
            Ok(()) => {
                writeln!(out, "SUCCESS: {} successfully deleted", record.filename)?;
                deleted_urls.push(record.delete.clone());
                summary.deleted += 1;
            }
            Err(err) => {
                warn!(filename = %record.filename, error = %err, "delete failed");
                writeln!(out, "ERROR: {} failed to delete: {}", record.filename, err)?;
                summary.failed += 1;
            }
        }
    }

    if !deleted_urls.is_empty() {
        store.delete_by_urls(&deleted_urls)?;
    }
    Ok(summary)
}

pub fn migrate<W: Write>(store: &mut HistoryStore, out: &mut W) -> Result<usize> {
    let migrated = store.migrate_legacy_comments()?;
    writeln!(
        out,
        "SUCCESS: migrated {} records in {}",
        migrated,
        store.path().display()
    )?;
    Ok(migrated)
}

pub fn clear<H, W>(host: &H, out: &mut W) -> Result<()>
where
    H: ImageHost + ?Sized,
    W: Write,
{
    host.clear().context("failed to clear remote upload history")?;
    writeln!(out, "SUCCESS: remote upload history cleared")?;
    Ok(())
}

fn warn_missing_dates<W: Write>(
    store: &HistoryStore,
    filter: &RecordFilter,
    out: &mut W,
) -> Result<()> {
    for date in filter.dates() {
        if !store.contains_date(date) {
            writeln!(out, "WARNING: no record on {}", date)?;
        }
    }
    Ok(())
}

fn render_line(index: usize, date: &str, record: &Record) -> String {
    format!(
        "[{}]: {} {} {} delete={} comment={:?}",
        index, date, record.filename, record.url, record.delete, record.comment
    )
}

/// Turns a 1-based answer into an index, `q` meaning abort.
fn parse_selection(answer: &str, len: usize) -> Result<usize, CommandError> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("q") {
        return Err(CommandError::Aborted);
    }
    answer
        .parse::<usize>()
        .ok()
        .filter(|index| (1..=len).contains(index))
        .map(|index| index - 1)
        .ok_or_else(|| CommandError::InvalidSelection {
            input: answer.to_string(),
            max: len,
        })
}

#[cfg(test)]
mod tests {
    use super::{delete, migrate, search, upload, DeleteOptions, DeleteSummary, Prompter};
    use crate::error::{CommandError, HostError};
    use crate::history_store::{HistoryStore, Record, LEGACY_NO_COMMENT};
    use crate::image_host::{ImageHost, RemoteImage};
    use crate::record_filter::RecordFilter;
    use anyhow::Result;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_FIXTURE_ID: AtomicU64 = AtomicU64::new(1);

    fn fixture_store() -> (PathBuf, HistoryStore) {
        let mut base = std::env::temp_dir();
        let sequence = NEXT_FIXTURE_ID.fetch_add(1, Ordering::Relaxed);
        base.push(format!(
            "smms_commands_test_{}_{}",
            std::process::id(),
            sequence
        ));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).expect("mkdir fixture");
        let store = HistoryStore::load(base.join("history")).expect("load store");
        (base, store)
    }

    /// Fails every upload whose file name contains `bad` and every delete
    /// url listed in `failing_deletes`.
    #[derive(Default)]
    struct FakeHost {
        failing_deletes: Vec<String>,
        deleted: RefCell<Vec<String>>,
    }

    impl ImageHost for FakeHost {
        fn upload(&self, image: &Path) -> Result<RemoteImage, HostError> {
            let name = image
                .file_name()
                .and_then(|v| v.to_str())
                .unwrap_or_default()
                .to_string();
            if name.contains("bad") {
                return Err(HostError::Rejected {
                    message: "Image upload repeated limit.".to_string(),
                });
            }
            Ok(RemoteImage {
                url: format!("https://x/{name}"),
                delete: format!("https://x/delete/{name}"),
                filename: name,
            })
        }

        fn delete(&self, delete_url: &str) -> Result<(), HostError> {
            if self.failing_deletes.iter().any(|url| url == delete_url) {
                return Err(HostError::MalformedResponse("boom".to_string()));
            }
            self.deleted.borrow_mut().push(delete_url.to_string());
            Ok(())
        }

        fn clear(&self) -> Result<(), HostError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedPrompter {
        confirms: VecDeque<bool>,
        inputs: VecDeque<String>,
        asked: Vec<String>,
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&mut self, prompt: &str) -> Result<bool> {
            self.asked.push(prompt.to_string());
            Ok(self.confirms.pop_front().unwrap_or(false))
        }

        fn input(&mut self, prompt: &str) -> Result<String> {
            self.asked.push(prompt.to_string());
            Ok(self.inputs.pop_front().unwrap_or_default())
        }
    }

    fn seed(store: &mut HistoryStore) {
        let day = NaiveDate::from_ymd_opt(2019, 3, 1).expect("valid date");
        for (name, comment) in [("a.png", "cat"), ("b.png", "dog"), ("c.jpg", "cat")] {
            store
                .insert_on(
                    day,
                    Record {
                        filename: name.to_string(),
                        url: format!("https://x/{name}"),
                        delete: format!("https://x/delete/{name}"),
                        comment: comment.to_string(),
                        extra: Default::default(),
                    },
                )
                .expect("seed");
        }
    }

    fn remaining(store: &HistoryStore) -> Vec<String> {
        store
            .filter(&RecordFilter::all())
            .map(|item| item.record.filename.clone())
            .collect()
    }

    #[test]
    fn upload_records_only_successful_images() {
        let (base, mut store) = fixture_store();
        let host = FakeHost::default();
        let images = vec![
            PathBuf::from("one.png"),
            PathBuf::from("bad.png"),
            PathBuf::from("two.png"),
        ];
        let mut out = Vec::new();

        let summary = upload(&mut store, &host, &images, "holiday", &mut out).expect("upload");
        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(remaining(&store), vec!["one.png", "two.png"]);
        assert!(store
            .filter(&RecordFilter::all())
            .all(|item| item.record.comment == "holiday"));

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("ERROR: bad.png upload failed: Image upload repeated limit."));
        assert!(text.contains("SUCCESS: image two.png upload success, url https://x/two.png"));

        let reloaded = HistoryStore::load(store.path().to_path_buf()).expect("reload");
        assert_eq!(reloaded.len(), 2);

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn upload_without_images_warns() {
        let (base, mut store) = fixture_store();
        let mut out = Vec::new();

        let summary =
            upload(&mut store, &FakeHost::default(), &[], "", &mut out).expect("upload");
        assert_eq!(summary.uploaded, 0);
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "WARNING: no image to upload\n"
        );

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn search_lists_matches_and_warns_for_missing_dates() {
        let (base, mut store) = fixture_store();
        seed(&mut store);
        let filter = RecordFilter::new(["*.png"], Some("c*"), ["2019-03-01", "2019-03-02"])
            .expect("filter");
        let mut out = Vec::new();

        assert_eq!(search(&store, &filter, &mut out).expect("search"), 1);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("WARNING: no record on 2019-03-02"));
        assert!(text.contains("SUCCESS: 1 matches found"));
        assert!(text.contains("[1]: 2019-03-01 a.png https://x/a.png"));

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn search_without_matches_is_not_an_error() {
        let (base, store) = fixture_store();
        let mut out = Vec::new();

        assert_eq!(
            search(&store, &RecordFilter::all(), &mut out).expect("search"),
            0
        );
        assert!(String::from_utf8(out)
            .expect("utf8")
            .contains("WARNING: no match found"));

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn delete_prunes_only_confirmed_remote_deletes() {
        let (base, mut store) = fixture_store();
        seed(&mut store);
        let host = FakeHost {
            failing_deletes: vec!["https://x/delete/c.jpg".to_string()],
            ..FakeHost::default()
        };
        let filter = RecordFilter::new(Vec::<&str>::new(), Some("cat"), Vec::<&str>::new())
            .expect("filter");
        let mut prompter = ScriptedPrompter::default();
        let mut out = Vec::new();

        let summary = delete(
            &mut store,
            &host,
            &filter,
            DeleteOptions::default(),
            &mut prompter,
            &mut out,
        )
        .expect("delete");
        assert_eq!(
            summary,
            DeleteSummary {
                deleted: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(remaining(&store), vec!["b.png", "c.jpg"]);
        assert_eq!(*host.deleted.borrow(), vec!["https://x/delete/a.png"]);
        assert!(prompter.asked.is_empty());

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn delete_skips_declined_records() {
        let (base, mut store) = fixture_store();
        seed(&mut store);
        let host = FakeHost::default();
        let mut prompter = ScriptedPrompter {
            confirms: VecDeque::from([false, true, false]),
            ..ScriptedPrompter::default()
        };
        let mut out = Vec::new();

        let options = DeleteOptions {
            confirm: true,
            pick: false,
        };
        let summary = delete(
            &mut store,
            &host,
            &RecordFilter::all(),
            options,
            &mut prompter,
            &mut out,
        )
        .expect("delete");
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(remaining(&store), vec!["a.png", "c.jpg"]);
        assert_eq!(prompter.asked[1], "delete b.png(dog)");

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn delete_pick_removes_the_chosen_record() {
        let (base, mut store) = fixture_store();
        seed(&mut store);
        let host = FakeHost::default();
        let mut prompter = ScriptedPrompter {
            inputs: VecDeque::from(["3".to_string()]),
            ..ScriptedPrompter::default()
        };
        let mut out = Vec::new();

        let options = DeleteOptions {
            confirm: false,
            pick: true,
        };
        delete(
            &mut store,
            &host,
            &RecordFilter::all(),
            options,
            &mut prompter,
            &mut out,
        )
        .expect("delete");
        assert_eq!(remaining(&store), vec!["a.png", "b.png"]);

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn delete_pick_rejects_bad_input_without_mutation() {
        let (base, mut store) = fixture_store();
        seed(&mut store);
        let host = FakeHost::default();
        let options = DeleteOptions {
            confirm: false,
            pick: true,
        };

        for (answer, aborted) in [("q", true), ("two", false), ("0", false), ("9", false)] {
            let mut prompter = ScriptedPrompter {
                inputs: VecDeque::from([answer.to_string()]),
                ..ScriptedPrompter::default()
            };
            let err = delete(
                &mut store,
                &host,
                &RecordFilter::all(),
                options,
                &mut prompter,
                &mut Vec::<u8>::new(),
            )
            .expect_err("selection error");
            let kind = err.downcast_ref::<CommandError>().expect("command error");
            assert_eq!(matches!(kind, CommandError::Aborted), aborted, "{answer}");
        }
        assert!(host.deleted.borrow().is_empty());
        assert_eq!(store.len(), 3);

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn migrate_reports_rewritten_records() {
        let (base, mut store) = fixture_store();
        let day = NaiveDate::from_ymd_opt(2018, 1, 1).expect("valid date");
        store
            .insert_on(
                day,
                Record {
                    filename: "old.png".to_string(),
                    url: "https://x/old.png".to_string(),
                    delete: "https://x/delete/old.png".to_string(),
                    comment: LEGACY_NO_COMMENT.to_string(),
                    extra: Default::default(),
                },
            )
            .expect("insert");
        let mut out = Vec::new();

        assert_eq!(migrate(&mut store, &mut out).expect("migrate"), 1);
        assert_eq!(migrate(&mut store, &mut out).expect("migrate again"), 0);

        fs::remove_dir_all(base).ok();
    }
}

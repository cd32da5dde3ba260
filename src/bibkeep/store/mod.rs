//! # Storage Layer
//!
//! [`BibStore`] owns everything that has to stay consistent with one
//! bibliography file on disk:
//!
//! - the selected file path (no I/O happens on selection)
//! - the keyword index: keyword → exact record text as persisted
//! - the cached full-file text the index spans point into
//! - the undo/redo history of whole-file snapshots
//! - the file list of the last directory scan
//!
//! ## Update Policy
//!
//! Inserting only new keywords appends to the file. As soon as one record in a
//! batch replaces an existing keyword, the whole cached text is rewritten in
//! one go. Deletes and reformats always rewrite. Every mutation works on a
//! copy of the text and index and commits them only after the file write
//! succeeded, followed by a history snapshot.
//!
//! ## Storage Format
//!
//! ```text
//! @article{nash51,
//!     author = {Nash, John},
//!     year = 1951
//! }
//!
//! % lines starting with the comment marker never open an entry
//! @book{knuth84,
//!     ...
//! }
//! ```
//!
//! CRLF line endings throughout; files with LF endings are read fine and
//! written back with CRLF.
//!
//! `BibStore` methods take `&mut self` and block on file I/O. Sharing it
//! between threads, and running it off the caller's thread, is the job of
//! [`crate::api::BibApi`].

use crate::config::BibConfig;
use crate::error::{BibError, Result};
use crate::extract::{
    extract_all_records, extract_keyword, fields_to_display_record, find_first_record,
    locate_first_record, normalize_value_closures, LINE_SEP,
};
use crate::history::{Snapshot, UndoRedo};
use crate::model::{ActionKind, ClosureStyle, DisplayRow, ReadOutcome, Record};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub mod fs;
pub mod scan;

use scan::{CancelToken, ScanReport, ScannedFile};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    /// Whether the whole file was rewritten instead of appended to.
    pub rewritten: bool,
}

impl InsertReport {
    pub fn total(&self) -> usize {
        self.inserted.len() + self.updated.len()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// Requested keywords that were not in the index.
    pub missing: Vec<String>,
}

impl DeleteReport {
    pub fn not_found_errors(&self) -> Vec<BibError> {
        self.missing
            .iter()
            .map(|k| BibError::KeywordNotFound(k.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReformatReport {
    pub reformatted: usize,
    pub style: ClosureStyle,
}

pub struct BibStore {
    selected: Option<PathBuf>,
    /// The file `text` and `index` currently mirror.
    loaded: Option<PathBuf>,
    index: BTreeMap<String, String>,
    text: String,
    root_dir: Option<PathBuf>,
    dir_files: Vec<ScannedFile>,
    history: UndoRedo,
    file_ext: String,
    closure_style: ClosureStyle,
    comment_marker: char,
}

impl Default for BibStore {
    fn default() -> Self {
        Self::with_config(&BibConfig::default())
    }
}

impl BibStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &BibConfig) -> Self {
        Self {
            selected: None,
            loaded: None,
            index: BTreeMap::new(),
            text: String::new(),
            root_dir: None,
            dir_files: Vec::new(),
            history: UndoRedo::new(config.history_depth),
            file_ext: config.file_ext.clone(),
            closure_style: config.closure_style,
            comment_marker: config.comment_marker,
        }
    }

    // --- Selection ---

    /// Scans `root` for bibliography files and remembers the result for
    /// [`BibStore::select_from_directory_list`].
    pub fn open_directory(&mut self, root: &Path, token: &CancelToken) -> ScanReport {
        let report = scan::scan_directory(root, &self.file_ext, token);
        self.set_directory_listing(root, &report);
        report
    }

    pub fn set_directory_listing(&mut self, root: &Path, report: &ScanReport) {
        self.root_dir = Some(root.to_path_buf());
        self.dir_files = report.files.clone();
    }

    pub fn select_file(&mut self, path: impl Into<PathBuf>) {
        self.selected = Some(path.into());
    }

    /// Selects a file by its `parent/file` name from the last scan.
    pub fn select_from_directory_list(&mut self, name: &str) -> Result<()> {
        let path = self
            .dir_files
            .iter()
            .find(|f| f.display == name)
            .map(|f| f.path.clone())
            .ok_or_else(|| BibError::NotInDirectoryList(name.to_string()))?;
        self.select_file(path);
        Ok(())
    }

    /// Creates `path` (emptying it if it exists) and selects it.
    pub fn create_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        fs::rewrite(&path, "").map_err(|e| BibError::write(&path, e))?;
        info!(path = %path.display(), "created bibliography file");
        self.selected = Some(path);
        self.loaded = None;
        Ok(())
    }

    pub fn is_file_selected(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected_file(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn selected_file_name(&self) -> Option<String> {
        self.selected
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn root_directory(&self) -> Option<&Path> {
        self.root_dir.as_deref()
    }

    // --- Queries ---

    /// Stored text of `keyword`, re-validated before it is handed out.
    pub fn lookup(&self, keyword: &str) -> Option<String> {
        let raw = self.index.get(keyword)?;
        find_first_record(raw).map(|record| record.raw)
    }

    /// Display rows for the indexed records, in file order.
    pub fn rows(&self) -> Vec<DisplayRow> {
        let mut located: Vec<(usize, DisplayRow)> = self
            .index
            .values()
            .filter_map(|raw| {
                let record = find_first_record(raw)?;
                let pos = self.text.find(raw.as_str()).unwrap_or(usize::MAX);
                Some((pos, fields_to_display_record(&record)))
            })
            .collect();
        located.sort_by_key(|(pos, _)| *pos);
        located.into_iter().map(|(_, row)| row).collect()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn history(&self) -> &UndoRedo {
        &self.history
    }

    pub fn closure_style(&self) -> ClosureStyle {
        self.closure_style
    }

    pub fn set_closure_style(&mut self, style: ClosureStyle) {
        self.closure_style = style;
    }

    // --- Reading ---

    pub fn read_into_index(&mut self) -> ReadOutcome {
        let Some(path) = self.selected.clone() else {
            return ReadOutcome::NoFile;
        };
        match self.load(&path) {
            Ok(rows) if rows.is_empty() => ReadOutcome::NoEntriesFound,
            Ok(rows) => ReadOutcome::Rows(rows),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read bibliography");
                ReadOutcome::ReadError(e.to_string())
            }
        }
    }

    fn load(&mut self, path: &Path) -> std::io::Result<Vec<DisplayRow>> {
        self.index.clear();
        self.text.clear();
        self.loaded = None;

        let text = fs::read_normalized(path)?;
        let (index, rows) = index_text(&text, self.comment_marker);
        debug!(path = %path.display(), entries = index.len(), "indexed bibliography");

        self.index = index;
        self.text = text;
        self.loaded = Some(path.to_path_buf());
        if self.history.is_init() {
            self.history
                .save_operation(&self.text, path, ActionKind::Init);
        }
        Ok(rows)
    }

    /// Makes sure `text`/`index` mirror the selected file before a mutation.
    /// A selected file that does not exist yet counts as empty.
    fn ensure_loaded(&mut self) -> Result<PathBuf> {
        let path = self.selected.clone().ok_or(BibError::NoFileSelected)?;
        if self.loaded.as_deref() == Some(path.as_path()) {
            return Ok(path);
        }
        if path.exists() {
            self.load(&path).map_err(|e| BibError::read(&path, e))?;
        } else {
            self.index.clear();
            self.text.clear();
            self.loaded = Some(path.clone());
            if self.history.is_init() {
                self.history.save_operation("", &path, ActionKind::Init);
            }
        }
        Ok(path)
    }

    // --- Mutations ---

    /// Inserts every record found in `text`. Records whose keyword is already
    /// indexed replace the stored version.
    pub fn insert_or_update(&mut self, text: &str) -> Result<InsertReport> {
        let records = extract_all_records(text, self.closure_style);
        if records.is_empty() {
            return Err(BibError::InvalidRecord);
        }
        let path = self.ensure_loaded()?;

        let mut working = self.text.clone();
        let mut index = self.index.clone();
        let mut appended = String::new();
        let mut report = InsertReport::default();

        for record in records {
            let Some(keyword) = extract_keyword(&record) else {
                warn!("skipping entry without a keyword");
                continue;
            };
            match index.get(&keyword) {
                Some(old) if entry_offset(&working, old, self.comment_marker).is_some() => {
                    let replaced = replace_entry(&working, old, &record, self.comment_marker);
                    working = format!("{}{}", replaced.trim(), LINE_SEP);
                    report.rewritten = true;
                    report.updated.push(keyword.clone());
                }
                _ => {
                    let chunk = append_chunk(&working, &record);
                    working.push_str(&chunk);
                    appended.push_str(&chunk);
                    report.inserted.push(keyword.clone());
                }
            }
            index.insert(keyword, record);
        }

        let written = if report.rewritten {
            fs::rewrite(&path, &working)
        } else {
            fs::append(&path, &appended)
        };
        written.map_err(|e| {
            error!(path = %path.display(), error = %e, "insert failed");
            BibError::write(&path, e)
        })?;

        self.text = working;
        self.index = index;
        self.history
            .save_operation(&self.text, &path, ActionKind::Write);
        info!(
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            rewritten = report.rewritten,
            "entries written"
        );
        Ok(report)
    }

    /// Removes the given keywords. Unknown keywords are reported, not fatal.
    pub fn delete_by_keywords<K: AsRef<str>>(&mut self, keywords: &[K]) -> Result<DeleteReport> {
        let path = self.ensure_loaded()?;

        let mut working = self.text.clone();
        let mut index = self.index.clone();
        let mut report = DeleteReport::default();

        for keyword in keywords {
            let keyword = keyword.as_ref();
            match index.remove(keyword) {
                Some(raw) => {
                    if let Some(at) = entry_offset(&working, &raw, self.comment_marker) {
                        let start = if working[..at].ends_with(LINE_SEP) {
                            at - LINE_SEP.len()
                        } else {
                            at
                        };
                        working.replace_range(start..at + raw.len(), "");
                    }
                    report.deleted.push(keyword.to_string());
                }
                None => {
                    warn!(keyword, "cannot delete entry, it is not in the file");
                    report.missing.push(keyword.to_string());
                }
            }
        }

        if report.deleted.is_empty() {
            return Ok(report);
        }

        let working = tidy(&working);
        fs::rewrite(&path, &working).map_err(|e| {
            error!(path = %path.display(), error = %e, "delete failed");
            BibError::write(&path, e)
        })?;

        self.text = working;
        self.index = index;
        self.history
            .save_operation(&self.text, &path, ActionKind::Delete);
        info!(deleted = report.deleted.len(), "entries deleted");
        Ok(report)
    }

    /// Rewrites every indexed record with its values wrapped in `style`.
    pub fn reformat_all(&mut self, style: ClosureStyle) -> Result<ReformatReport> {
        let path = self.ensure_loaded()?;
        if self.index.is_empty() {
            return Err(BibError::NoEntriesFound(path));
        }

        let mut working = self.text.clone();
        let mut index = BTreeMap::new();
        for (keyword, raw) in &self.index {
            let reformatted = normalize_value_closures(raw, style);
            working = replace_entry(&working, raw, &reformatted, self.comment_marker);
            index.insert(keyword.clone(), reformatted);
        }

        let working = tidy(&working);
        fs::rewrite(&path, &working).map_err(|e| {
            error!(path = %path.display(), error = %e, "reformat failed");
            BibError::write(&path, e)
        })?;

        let reformatted = index.len();
        self.text = working;
        self.index = index;
        self.closure_style = style;
        self.history
            .save_operation(&self.text, &path, ActionKind::Reformat);
        info!(reformatted, ?style, "entries reformatted");
        Ok(ReformatReport { reformatted, style })
    }

    // --- History ---

    /// Restores the previous snapshot. Returns the action that was undone.
    pub fn undo(&mut self) -> Result<ActionKind> {
        let action = self.history.undo(restore_snapshot)?;
        self.adopt_current_snapshot();
        info!(%action, "undone");
        Ok(action)
    }

    /// Re-applies the next snapshot. Returns the action that was redone.
    pub fn redo(&mut self) -> Result<ActionKind> {
        let action = self.history.redo(restore_snapshot)?;
        self.adopt_current_snapshot();
        info!(%action, "redone");
        Ok(action)
    }

    pub fn is_undo_possible(&self) -> bool {
        self.history.is_undo_possible()
    }

    pub fn is_redo_possible(&self) -> bool {
        self.history.is_redo_possible()
    }

    fn adopt_current_snapshot(&mut self) {
        let Some(snapshot) = self.history.current() else {
            return;
        };
        let path = snapshot.path.clone();
        let text = snapshot.text.clone();
        let (index, _) = index_text(&text, self.comment_marker);

        self.selected = Some(path.clone());
        self.loaded = Some(path);
        self.text = text;
        self.index = index;
    }
}

fn restore_snapshot(snapshot: &Snapshot) -> Result<()> {
    fs::rewrite(&snapshot.path, &snapshot.text).map_err(|e| {
        error!(path = %snapshot.path.display(), error = %e, "failed to restore snapshot");
        BibError::write(&snapshot.path, e)
    })
}

/// Text to append so `record` lands after `existing`, separated by a blank line.
fn append_chunk(existing: &str, record: &str) -> String {
    if existing.trim().is_empty() {
        format!("{}{}", record, LINE_SEP)
    } else if existing.ends_with(LINE_SEP) {
        format!("{}{}{}", LINE_SEP, record, LINE_SEP)
    } else {
        format!("{}{}{}{}", LINE_SEP, LINE_SEP, record, LINE_SEP)
    }
}

/// Byte offset of the first occurrence of `raw` that does not sit on a
/// comment line.
fn entry_offset(text: &str, raw: &str, comment_marker: char) -> Option<usize> {
    text.match_indices(raw).map(|(at, _)| at).find(|&at| {
        let line_start = text[..at].rfind('\n').map_or(0, |n| n + 1);
        !text[line_start..].starts_with(comment_marker)
    })
}

/// `text` with the first uncommented occurrence of `raw` swapped for `with`.
fn replace_entry(text: &str, raw: &str, with: &str, comment_marker: char) -> String {
    match entry_offset(text, raw, comment_marker) {
        Some(at) => format!("{}{}{}", &text[..at], with, &text[at + raw.len()..]),
        None => text.to_string(),
    }
}

/// Outer blank lines removed, exactly one trailing line separator.
fn tidy(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}{}", trimmed, LINE_SEP)
    }
}

/// Builds the keyword index for `text`. The first record of a keyword wins.
fn index_text(text: &str, comment_marker: char) -> (BTreeMap<String, String>, Vec<DisplayRow>) {
    let mut index = BTreeMap::new();
    let mut rows = Vec::new();

    for record in scan_blocks(text, comment_marker) {
        if let Some(existing) = index.get(&record.keyword) {
            if *existing != record.raw {
                warn!(keyword = %record.keyword, "duplicate keyword, keeping the first entry");
            }
            continue;
        }
        rows.push(fields_to_display_record(&record));
        index.insert(record.keyword.clone(), record.raw);
    }
    (index, rows)
}

/// Splits file text into candidate blocks and validates each.
///
/// A block opens at a line containing `@` (comment lines excluded) and runs
/// through the next such line. Whatever follows a validated record in the
/// block, usually the next header line, starts the next block; a block with
/// no valid record keeps growing until one validates or the text ends.
/// Comment lines carried inside a block are never matched against.
fn scan_blocks(text: &str, comment_marker: char) -> Vec<Record> {
    let is_trigger = |line: &str| !line.starts_with(comment_marker) && line.contains('@');
    let lines: Vec<&str> = text.lines().collect();

    let mut records = Vec::new();
    let mut block = String::new();
    let mut triggered = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;
        triggered |= is_trigger(line);
        if !triggered {
            continue;
        }
        push_line(&mut block, line);
        if line.starts_with(comment_marker) {
            continue;
        }

        while i < lines.len() {
            let candidate = lines[i];
            i += 1;
            push_line(&mut block, candidate);
            if is_trigger(candidate) {
                break;
            }
        }

        if take_record(&mut block, &mut records, comment_marker) {
            triggered = block.lines().any(is_trigger);
        }
    }
    while take_record(&mut block, &mut records, comment_marker) {}
    records
}

fn push_line(block: &mut String, line: &str) {
    block.push_str(line);
    block.push_str(LINE_SEP);
}

/// Moves the first valid record out of `block`, keeping what follows it.
///
/// Matching runs on a copy with comment lines blanked out byte for byte, so
/// the span still addresses `block` and the record's raw text stays an exact
/// slice of the file.
fn take_record(block: &mut String, records: &mut Vec<Record>, comment_marker: char) -> bool {
    let visible = blank_comment_lines(block, comment_marker);
    match locate_first_record(&visible) {
        Some((span, mut record)) => {
            record.raw = block[span.clone()].to_string();
            records.push(record);
            *block = block[span.end..].to_string();
            true
        }
        None => false,
    }
}

fn blank_comment_lines(block: &str, comment_marker: char) -> String {
    block
        .split(LINE_SEP)
        .map(|line| {
            if line.starts_with(comment_marker) {
                " ".repeat(line.len())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(LINE_SEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "% my references\r\n@article{nash51,\r\n    author = {Nash, John},\r\n    year = 1951\r\n}\r\n\r\n@book{knuth84,\r\n    title = {The {TeX}book},\r\n    author = {Knuth, Donald}\r\n}\r\n";

    #[test]
    fn blocks_yield_records_in_file_order() {
        let records = scan_blocks(FILE, '%');
        let keys: Vec<_> = records.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(keys, vec!["nash51", "knuth84"]);
        assert!(FILE.contains(&records[0].raw));
    }

    #[test]
    fn comment_lines_do_not_open_entries() {
        let text = "% @misc{hidden, title = {x}}\r\n@misc{shown, title = {y}}\r\n";
        let keys: Vec<_> = scan_blocks(text, '%')
            .into_iter()
            .map(|r| r.keyword)
            .collect();
        assert_eq!(keys, vec!["shown"]);
    }

    #[test]
    fn comment_between_entries_is_not_indexed() {
        let text = "@misc{a, t = {1}}\r\n% @misc{k, t = {old}}\r\n@misc{k, t = {real}}\r\n";
        let (index, rows) = index_text(text, '%');
        let keys: Vec<_> = rows.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(keys, vec!["a", "k"]);
        assert_eq!(index["k"], "@misc{k, t = {real}}");
    }

    #[test]
    fn comment_inside_entry_keeps_exact_raw_text() {
        let text = "@misc{k,\r\n% @misc{x, t = {no}}\r\n  t = {yes}\r\n}\r\n";
        let records = scan_blocks(text, '%');
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].keyword, "k");
        assert!(text.contains(&records[0].raw));
        assert_eq!(records[0].field("t"), Some("{yes}"));
    }

    #[test]
    fn invalid_block_does_not_swallow_the_next_record() {
        let text = "@article{broken,\r\n  title = {open\r\n@misc{fine,\r\n  title = {ok}\r\n}\r\n";
        let keys: Vec<_> = scan_blocks(text, '%')
            .into_iter()
            .map(|r| r.keyword)
            .collect();
        assert_eq!(keys, vec!["fine"]);
    }

    #[test]
    fn first_duplicate_keyword_wins() {
        let text = "@misc{dup, title = {first}}\r\n@misc{dup, title = {second}}\r\n";
        let (index, rows) = index_text(text, '%');
        assert_eq!(index.len(), 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(index["dup"], "@misc{dup, title = {first}}");
    }

    #[test]
    fn single_line_records_on_consecutive_lines() {
        let text = "@misc{a, t = {1}}\r\n@misc{b, t = {2}}\r\n@misc{c, t = {3}}";
        let keys: Vec<_> = scan_blocks(text, '%')
            .into_iter()
            .map(|r| r.keyword)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn entry_offset_skips_commented_copies() {
        let text = "% @misc{k, t = {1}}\r\n@misc{k, t = {1}}\r\n";
        assert_eq!(entry_offset(text, "@misc{k, t = {1}}", '%'), Some(21));
        assert_eq!(
            replace_entry(text, "@misc{k, t = {1}}", "@misc{k, t = {2}}", '%'),
            "% @misc{k, t = {1}}\r\n@misc{k, t = {2}}\r\n"
        );
        assert_eq!(entry_offset("% @x", "@x", '%'), None);
    }

    #[test]
    fn append_chunk_separates_with_blank_line() {
        assert_eq!(append_chunk("", "@x"), "@x\r\n");
        assert_eq!(append_chunk("a\r\n", "@x"), "\r\n@x\r\n");
        assert_eq!(append_chunk("a", "@x"), "\r\n\r\n@x\r\n");
    }

    #[test]
    fn tidy_trims_and_terminates() {
        assert_eq!(tidy("\r\n\r\na\r\n\r\n\r\n"), "a\r\n");
        assert_eq!(tidy("\r\n \r\n"), "");
    }

    #[test]
    fn selecting_unknown_list_entry_fails() {
        let mut store = BibStore::new();
        assert!(matches!(
            store.select_from_directory_list("x/y.bib"),
            Err(BibError::NotInDirectoryList(_))
        ));
        assert!(!store.is_file_selected());
    }

    #[test]
    fn mutations_need_a_selected_file() {
        let mut store = BibStore::new();
        assert_eq!(store.read_into_index(), ReadOutcome::NoFile);
        assert!(matches!(
            store.insert_or_update("@misc{a, t = {x}}"),
            Err(BibError::NoFileSelected)
        ));
        assert!(matches!(
            store.delete_by_keywords(&["a"]),
            Err(BibError::NoFileSelected)
        ));
    }

    #[test]
    fn insert_rejects_text_without_records() {
        let mut store = BibStore::new();
        store.select_file("unused.bib");
        assert!(matches!(
            store.insert_or_update("just words"),
            Err(BibError::InvalidRecord)
        ));
    }
}

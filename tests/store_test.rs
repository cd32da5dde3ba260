use bibkeep::config::BibConfig;
use bibkeep::error::BibError;
use bibkeep::model::{ActionKind, ClosureStyle, ReadOutcome};
use bibkeep::store::scan::CancelToken;
use bibkeep::store::BibStore;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const NASH: &str = "@article{nash51,\n author = \"Nash, John\",\n year = 1951\n}";
const KNUTH: &str = "@book{knuth84, title = {The {TeX}book}, author = {Knuth, Donald}, year = {1984}}";
const LAMPORT: &str = "@manual{lamport94, title = \"LaTeX\", year = 1994}";

fn setup() -> (TempDir, PathBuf, BibStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refs.bib");
    fs::write(&path, "").unwrap();
    let mut store = BibStore::new();
    store.select_file(&path);
    (dir, path, store)
}

#[test]
fn nash51_into_empty_file() {
    let (_dir, path, mut store) = setup();
    assert_eq!(store.read_into_index(), ReadOutcome::NoEntriesFound);

    let report = store.insert_or_update(NASH).unwrap();
    assert_eq!(report.inserted, vec!["nash51"]);
    assert!(!report.rewritten);

    assert!(store.lookup("nash51").is_some());
    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.trim_end().ends_with("}"));
    assert!(on_disk.contains("@article{nash51,\r\n    author = {Nash, John},\r\n    year = 1951\r\n}"));

    let history = store.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.pointer(), Some(1));
    let actions: Vec<ActionKind> = history.entries().map(|s| s.action).collect();
    assert_eq!(actions, vec![ActionKind::Init, ActionKind::Write]);
}

#[test]
fn quote_style_store_keeps_quotes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refs.bib");
    let config = BibConfig {
        closure_style: ClosureStyle::Quote,
        ..BibConfig::default()
    };
    let mut store = BibStore::with_config(&config);
    store.select_file(&path);

    store.insert_or_update(KNUTH).unwrap();
    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("author = \"Knuth, Donald\""));
    assert!(on_disk.contains("year = \"1984\""));
}

#[test]
fn insert_then_read_back_yields_one_row() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(KNUTH).unwrap();

    let mut fresh = BibStore::new();
    fresh.select_file(&path);
    match fresh.read_into_index() {
        ReadOutcome::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].keyword, "knuth84");
            assert_eq!(rows[0].title, "The {TeX}book");
            assert_eq!(rows[0].year, "1984");
            assert_eq!(rows[0].url, "none");
        }
        other => panic!("expected rows, got {:?}", other),
    }
}

#[test]
fn new_keywords_are_appended_without_rewrite() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(NASH).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let report = store.insert_or_update(KNUTH).unwrap();
    assert!(!report.rewritten);
    let after = fs::read_to_string(&path).unwrap();
    assert!(after.starts_with(&before));
    assert_eq!(store.len(), 2);
}

#[test]
fn existing_keyword_is_replaced_in_place() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(&format!("{}\n{}", NASH, KNUTH)).unwrap();

    let update = "@article{nash51, author = {Nash, John F.}, year = 1950}";
    let report = store.insert_or_update(update).unwrap();
    assert!(report.rewritten);
    assert_eq!(report.updated, vec!["nash51"]);
    assert_eq!(store.len(), 2);

    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("Nash, John F."));
    assert!(!on_disk.contains("year = 1951"));
    assert!(on_disk.find("nash51").unwrap() < on_disk.find("knuth84").unwrap());
    assert!(on_disk.ends_with("}\r\n"));
}

#[test]
fn mixed_batch_is_flushed_by_one_rewrite() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(NASH).unwrap();

    let batch = format!("{}\n@article{{nash51, year = 1952}}", LAMPORT);
    let report = store.insert_or_update(&batch).unwrap();
    assert!(report.rewritten);
    assert_eq!(report.inserted, vec!["lamport94"]);
    assert_eq!(report.updated, vec!["nash51"]);

    let mut fresh = BibStore::new();
    fresh.select_file(&path);
    fresh.read_into_index();
    assert_eq!(fresh.len(), 2);
    assert!(fresh.lookup("nash51").unwrap().contains("1952"));
}

#[test]
fn text_without_entries_is_rejected() {
    let (_dir, path, mut store) = setup();
    assert!(matches!(
        store.insert_or_update("@unknown{x, a = 1}"),
        Err(BibError::InvalidRecord)
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}

#[test]
fn deleting_unknown_keyword_changes_nothing() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(NASH).unwrap();
    let before = fs::read_to_string(&path).unwrap();
    let history_len = store.history().len();

    let report = store.delete_by_keywords(&["missing"]).unwrap();
    assert!(report.deleted.is_empty());
    let errors = report.not_found_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], BibError::KeywordNotFound(k) if k == "missing"));

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(store.len(), 1);
    assert_eq!(store.history().len(), history_len);
}

#[test]
fn delete_skips_missing_and_removes_the_rest() {
    let (_dir, path, mut store) = setup();
    store
        .insert_or_update(&format!("{}\n{}\n{}", NASH, KNUTH, LAMPORT))
        .unwrap();

    let report = store.delete_by_keywords(&["knuth84", "nope"]).unwrap();
    assert_eq!(report.deleted, vec!["knuth84"]);
    assert_eq!(report.missing, vec!["nope"]);

    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(!on_disk.contains("knuth84"));
    assert!(on_disk.contains("nash51"));
    assert!(on_disk.contains("lamport94"));
    assert!(!on_disk.starts_with("\r\n"));
    assert!(on_disk.ends_with("}\r\n"));
    assert_eq!(store.history().current().unwrap().action, ActionKind::Delete);
}

#[test]
fn deleting_everything_leaves_an_empty_file() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(NASH).unwrap();
    store.delete_by_keywords(&["nash51"]).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
    assert!(store.is_empty());
}

#[test]
fn reformat_switches_closures_and_back() {
    let (_dir, path, mut store) = setup();
    store.insert_or_update(KNUTH).unwrap();

    let report = store.reformat_all(ClosureStyle::Quote).unwrap();
    assert_eq!(report.reformatted, 1);
    let quoted = fs::read_to_string(&path).unwrap();
    assert!(quoted.contains("author = \"Knuth, Donald\""));
    assert!(quoted.contains("title = \"The {TeX}book\""));

    store.reformat_all(ClosureStyle::Brace).unwrap();
    let braced = fs::read_to_string(&path).unwrap();
    assert!(braced.contains("author = {Knuth, Donald}"));
    assert!(braced.contains("title = {The {TeX}book}"));
    assert_eq!(store.closure_style(), ClosureStyle::Brace);
}

#[test]
fn reformat_of_empty_file_reports_no_entries() {
    let (_dir, _path, mut store) = setup();
    assert!(matches!(
        store.reformat_all(ClosureStyle::Quote),
        Err(BibError::NoEntriesFound(_))
    ));
}

#[test]
fn undo_and_redo_restore_exact_snapshots() {
    let (_dir, path, mut store) = setup();
    store.read_into_index();
    store.insert_or_update(NASH).unwrap();
    let written = fs::read_to_string(&path).unwrap();

    assert_eq!(store.undo().unwrap(), ActionKind::Write);
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
    assert!(store.lookup("nash51").is_none());
    assert!(store.is_redo_possible());

    assert_eq!(store.redo().unwrap(), ActionKind::Write);
    assert_eq!(fs::read_to_string(&path).unwrap(), written);
    assert!(store.lookup("nash51").is_some());

    assert!(matches!(store.redo(), Err(BibError::NoRedoAvailable)));
}

#[test]
fn mutation_after_undo_drops_redo() {
    let (_dir, _path, mut store) = setup();
    store.insert_or_update(NASH).unwrap();
    store.insert_or_update(KNUTH).unwrap();

    store.undo().unwrap();
    assert!(store.is_redo_possible());
    store.insert_or_update(LAMPORT).unwrap();
    assert!(!store.is_redo_possible());

    let keywords: Vec<&str> = store.keywords().collect();
    assert_eq!(keywords, vec!["lamport94", "nash51"]);
}

#[test]
fn undo_without_history_is_reported() {
    let mut store = BibStore::new();
    assert!(matches!(store.undo(), Err(BibError::NoUndoAvailable)));
}

#[test]
fn mutation_reads_unread_file_first() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refs.bib");
    fs::write(&path, format!("{}\r\n", KNUTH)).unwrap();

    let mut store = BibStore::new();
    store.select_file(&path);
    store.insert_or_update("@article{nash51, year = 1951}").unwrap();

    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("knuth84"));
    assert!(on_disk.contains("nash51"));
    assert_eq!(store.len(), 2);
}

#[test]
fn reading_lf_file_and_writing_crlf() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refs.bib");
    fs::write(&path, "% my refs\n@misc{a,\n  title = {A}\n}\n\n@misc{b,\n  title = {B}\n}\n").unwrap();

    let mut store = BibStore::new();
    store.select_file(&path);
    let rows = store.read_into_index().into_result(Some(path.clone())).unwrap();
    assert_eq!(rows.iter().map(|r| r.keyword.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

    store.delete_by_keywords(&["a"]).unwrap();
    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("% my refs\r\n"));
    assert!(!on_disk.contains("@misc{a"));
    assert_eq!(on_disk.matches('\n').count(), on_disk.matches("\r\n").count());
}

#[test]
fn read_outcomes() {
    let mut store = BibStore::new();
    assert_eq!(store.read_into_index(), ReadOutcome::NoFile);

    let dir = TempDir::new().unwrap();
    store.select_file(dir.path().join("missing.bib"));
    assert!(matches!(store.read_into_index(), ReadOutcome::ReadError(_)));
}

#[test]
fn directory_listing_selection() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("papers");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("games.bib"), NASH).unwrap();
    fs::write(nested.join("notes.txt"), "").unwrap();

    let mut store = BibStore::new();
    let report = store.open_directory(dir.path(), &CancelToken::new());
    assert_eq!(report.display_names(), vec!["papers/games.bib"]);
    assert_eq!(store.root_directory(), Some(dir.path()));

    store.select_from_directory_list("papers/games.bib").unwrap();
    assert_eq!(store.selected_file_name().as_deref(), Some("games.bib"));
    assert!(matches!(store.read_into_index(), ReadOutcome::Rows(rows) if rows.len() == 1));
}

#[test]
fn create_file_truncates_and_selects() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("new.bib");
    fs::write(&path, NASH).unwrap();

    let mut store = BibStore::new();
    store.create_file(&path).unwrap();
    assert!(store.is_file_selected());
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
    assert_eq!(store.read_into_index(), ReadOutcome::NoEntriesFound);
}

#[test]
fn update_leaves_commented_entry_alone() {
    let (_dir, path, mut store) = setup();
    fs::write(
        &path,
        "@misc{a, t = {1}}\r\n% @misc{k, t = {old}}\r\n@misc{k, t = {real}}\r\n",
    )
    .unwrap();
    assert!(matches!(store.read_into_index(), ReadOutcome::Rows(rows) if rows.len() == 2));
    assert_eq!(store.lookup("k").as_deref(), Some("@misc{k, t = {real}}"));

    let report = store.insert_or_update("@misc{k, t = {new}}").unwrap();
    assert_eq!(report.updated, vec!["k"]);

    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("% @misc{k, t = {old}}\r\n"));
    assert!(on_disk.contains("t = {new}"));
    assert!(!on_disk.contains("{real}"));
    assert!(on_disk.starts_with("@misc{a, t = {1}}"));
}

//! # API Facade
//!
//! [`BibApi`] is the single entry point a shell talks to. It owns the store
//! behind one `Arc<parking_lot::Mutex<BibStore>>`, which is the exclusion
//! region for everything that reads and rewrites the file, the index and the
//! history together.
//!
//! ## Units of Work
//!
//! Every operation that touches the disk is submitted to tokio's blocking
//! pool and holds the lock for its whole read-modify-write sequence, snapshot
//! included. The returned future resolves to a typed outcome; the shell
//! reflects it in its own presentation state.
//!
//! Directory scans are the exception: they never touch the store's state
//! while running, so they run outside the lock and hand back a [`ScanHandle`]
//! that can be cancelled. Only the finished listing is stored.
//!
//! Cheap queries (`lookup`, `is_file_selected`, ...) lock briefly on the
//! caller's thread and always see a committed state.
//!
//! The store's closure style is mirrored into a `watch` channel after every
//! unit of work, so running change detectors follow a `reformat`.

use crate::config::BibConfig;
use crate::detector::{Detection, DetectorHandle, TextSource};
use crate::error::{BibError, Result};
use crate::model::{ActionKind, ClosureStyle, DisplayRow, ReadOutcome};
use crate::store::scan::{self, CancelToken, ScanReport};
use crate::store::{BibStore, DeleteReport, InsertReport, ReformatReport};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct BibApi {
    store: Arc<Mutex<BibStore>>,
    style: Arc<watch::Sender<ClosureStyle>>,
    config: BibConfig,
}

impl BibApi {
    pub fn new(config: BibConfig) -> Self {
        let store = BibStore::with_config(&config);
        let (style, _) = watch::channel(store.closure_style());
        Self {
            store: Arc::new(Mutex::new(store)),
            style: Arc::new(style),
            config,
        }
    }

    pub fn config(&self) -> &BibConfig {
        &self.config
    }

    /// Runs `op` on the blocking pool while holding the store lock.
    async fn submit<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut BibStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let style = Arc::clone(&self.style);
        tokio::task::spawn_blocking(move || {
            let mut guard = store.lock();
            let outcome = op(&mut guard);
            let current = guard.closure_style();
            style.send_if_modified(|seen| {
                let changed = *seen != current;
                *seen = current;
                changed
            });
            outcome
        })
        .await
        .map_err(|e| BibError::Worker(e.to_string()))?
    }

    // --- Selection ---

    /// Starts a recursive scan of `root` for bibliography files.
    pub fn open_directory(&self, root: impl Into<PathBuf>) -> ScanHandle {
        let root = root.into();
        let token = CancelToken::new();
        let task = {
            let root = root.clone();
            let token = token.clone();
            let file_ext = self.config.file_ext.clone();
            tokio::task::spawn_blocking(move || scan::scan_directory(&root, &file_ext, &token))
        };
        ScanHandle {
            root,
            token,
            task,
            store: Arc::clone(&self.store),
        }
    }

    pub fn select_file(&self, path: impl Into<PathBuf>) {
        self.store.lock().select_file(path);
    }

    pub fn select_from_directory_list(&self, name: &str) -> Result<()> {
        self.store.lock().select_from_directory_list(name)
    }

    pub async fn create_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.submit(move |store| store.create_file(path)).await
    }

    // --- Queries ---

    pub fn is_file_selected(&self) -> bool {
        self.store.lock().is_file_selected()
    }

    pub fn selected_file(&self) -> Option<PathBuf> {
        self.store.lock().selected_file().map(Path::to_path_buf)
    }

    pub fn selected_file_name(&self) -> Option<String> {
        self.store.lock().selected_file_name()
    }

    pub fn root_directory(&self) -> Option<PathBuf> {
        self.store.lock().root_directory().map(Path::to_path_buf)
    }

    pub fn lookup(&self, keyword: &str) -> Result<String> {
        self.store
            .lock()
            .lookup(keyword)
            .ok_or_else(|| BibError::KeywordNotFound(keyword.to_string()))
    }

    pub fn rows(&self) -> Vec<DisplayRow> {
        self.store.lock().rows()
    }

    pub fn is_undo_possible(&self) -> bool {
        self.store.lock().is_undo_possible()
    }

    pub fn is_redo_possible(&self) -> bool {
        self.store.lock().is_redo_possible()
    }

    /// Read access to the store under the lock, for callers that need
    /// several values from one consistent state.
    pub fn inspect<R>(&self, f: impl FnOnce(&BibStore) -> R) -> R {
        let guard = self.store.lock();
        f(&*guard)
    }

    // --- Units of work ---

    pub async fn read_into_index(&self) -> ReadOutcome {
        match self.submit(|store| Ok(store.read_into_index())).await {
            Ok(outcome) => outcome,
            Err(e) => ReadOutcome::ReadError(e.to_string()),
        }
    }

    pub async fn insert(&self, text: impl Into<String>) -> Result<InsertReport> {
        let text = text.into();
        self.submit(move |store| store.insert_or_update(&text)).await
    }

    pub async fn delete(&self, keywords: Vec<String>) -> Result<DeleteReport> {
        self.submit(move |store| store.delete_by_keywords(&keywords)).await
    }

    pub async fn reformat(&self, style: ClosureStyle) -> Result<ReformatReport> {
        self.submit(move |store| store.reformat_all(style)).await
    }

    pub async fn undo(&self) -> Result<ActionKind> {
        self.submit(BibStore::undo).await
    }

    pub async fn redo(&self) -> Result<ActionKind> {
        self.submit(BibStore::redo).await
    }

    // --- Change detection ---

    /// Starts a change detector on `source`. Detected entries are normalized
    /// in the store's closure style as of each detection.
    pub fn watch(
        &self,
        source: Arc<dyn TextSource>,
    ) -> (DetectorHandle, mpsc::Receiver<Detection>) {
        DetectorHandle::spawn(source, self.config.poll_interval(), self.style.subscribe())
    }
}

/// A directory scan in flight.
pub struct ScanHandle {
    root: PathBuf,
    token: CancelToken,
    task: JoinHandle<ScanReport>,
    store: Arc<Mutex<BibStore>>,
}

impl ScanHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Waits for the scan and stores its listing, partial or not, for
    /// [`BibApi::select_from_directory_list`].
    pub async fn finish(self) -> Result<ScanReport> {
        let report = self
            .task
            .await
            .map_err(|e| BibError::Worker(e.to_string()))?;
        self.store.lock().set_directory_listing(&self.root, &report);
        Ok(report)
    }
}

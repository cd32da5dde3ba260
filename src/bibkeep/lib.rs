//! # Bibkeep Architecture
//!
//! Bibkeep is a **library for keeping BibTeX files tidy** with a terminal
//! launcher on top. It spots entries in arbitrary text (usually whatever was
//! just copied), validates and normalizes them, and keeps one `.bib` file in
//! sync with a keyword index, with bounded undo/redo of whole-file states.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Launcher (main.rs + args.rs + session.rs)                  │
//! │  - Parses arguments, prints rows and outcomes               │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - One mutex around the store = the exclusion region        │
//! │  - Blocking work submitted to tokio, typed outcomes back    │
//! │  - Cancellable directory scans, change detectors            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/, history.rs)                         │
//! │  - BibStore: selected file, keyword index, cached text      │
//! │  - Append vs. full rewrite, snapshots after each write      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Extractor (extract.rs, model.rs)                           │
//! │  - Pure text → Record functions, no I/O                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward, code takes plain arguments and returns plain Rust
//! types. It never writes to stdout/stderr and never exits the process;
//! diagnostics go through `tracing` and the launcher decides where they end up.
//! Confirmation prompts are the shell's business: once called, an operation
//! runs.
//!
//! ## Module Overview
//!
//! - [`api`]: The async facade, entry point for all operations
//! - [`extract`]: Finding, validating and normalizing entries in text
//! - [`store`]: The file-backed keyword index, raw file I/O, directory scans
//! - [`history`]: Bounded undo/redo over whole-file snapshots
//! - [`detector`]: Periodic change detection over a text source
//! - [`clipboard`]: System clipboard access
//! - [`model`]: Core data types (`Record`, `DisplayRow`, `EntryType`, ...)
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod clipboard;
pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod history;
pub mod model;
pub mod store;

//! Raw file I/O for bibliography files.
//!
//! Reads normalize every line ending to CRLF, which is also what every write
//! produces. Full rewrites go through a temporary sibling file and a rename so
//! a failed write never leaves a half-written bibliography behind.

use crate::extract::LINE_SEP;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use uuid::Uuid;

/// Reads `path` with each line terminated by CRLF.
pub fn read_normalized(path: &Path) -> io::Result<String> {
    let content = fs::read_to_string(path)?;
    Ok(normalize_line_endings(&content))
}

pub fn normalize_line_endings(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + content.len() / 32);
    for line in content.lines() {
        out.push_str(line);
        out.push_str(LINE_SEP);
    }
    out
}

/// Appends `chunk` to the end of `path`, creating the file if needed.
pub fn append(path: &Path, chunk: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(chunk.as_bytes())?;
    file.flush()
}

/// Replaces the whole content of `path` with `text`.
pub fn rewrite(path: &Path, text: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".bibkeep-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp_path, text)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

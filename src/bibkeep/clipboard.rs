//! System clipboard access by shelling out to the platform tools.
//!
//! - macOS: `pbpaste` / `pbcopy`
//! - Linux: `xclip`, falling back to `xsel`
//! - Windows: PowerShell `Get-Clipboard` / `clip`

use crate::detector::TextSource;
use crate::error::{BibError, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// The system clipboard as a [`TextSource`] for the change detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl TextSource for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>> {
        read_from_clipboard()
    }
}

/// Current clipboard text, `None` when the clipboard holds no text.
pub fn read_from_clipboard() -> Result<Option<String>> {
    #[cfg(target_os = "macos")]
    {
        run_reader(&mut Command::new("pbpaste"))
    }

    #[cfg(target_os = "linux")]
    {
        run_reader(Command::new("xclip").args(["-selection", "clipboard", "-o"])).or_else(|_| {
            run_reader(Command::new("xsel").args(["--clipboard", "--output"])).map_err(|e| {
                BibError::Clipboard(format!("{}. Install xclip or xsel.", e))
            })
        })
    }

    #[cfg(target_os = "windows")]
    {
        run_reader(Command::new("powershell").args(["-NoProfile", "-Command", "Get-Clipboard"]))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(BibError::Clipboard(
            "Clipboard not supported on this platform".to_string(),
        ))
    }
}

/// Copies text to the system clipboard.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        run_writer(&mut Command::new("pbcopy"), text)
    }

    #[cfg(target_os = "linux")]
    {
        run_writer(Command::new("xclip").args(["-selection", "clipboard"]), text).or_else(|_| {
            run_writer(Command::new("xsel").args(["--clipboard", "--input"]), text).map_err(|e| {
                BibError::Clipboard(format!("{}. Install xclip or xsel.", e))
            })
        })
    }

    #[cfg(target_os = "windows")]
    {
        run_writer(&mut Command::new("clip"), text)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = text;
        Err(BibError::Clipboard(
            "Clipboard not supported on this platform".to_string(),
        ))
    }
}

#[allow(dead_code)]
fn run_reader(cmd: &mut Command) -> Result<Option<String>> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = cmd
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| BibError::Clipboard(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        // xclip/xsel exit non-zero when the selection holds no text
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(Some(text))
}

#[allow(dead_code)]
fn run_writer(cmd: &mut Command, text: &str) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| BibError::Clipboard(format!("Failed to spawn {}: {}", program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| BibError::Clipboard(format!("Failed to write to {}: {}", program, e)))?;
    }

    let status = child
        .wait()
        .map_err(|e| BibError::Clipboard(format!("Failed to wait for {}: {}", program, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(BibError::Clipboard(format!("{} exited with error", program)))
    }
}

//! Interactive confirmation on the terminal.

use henna_core::{Confirm, DetectedFormat};
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// Ask a yes/no question on stdin until it gets an answer.
///
/// An empty answer returns `default`, or asks again when there is none.
pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => eprint!("{} (Y/n): ", prompt),
            Some(false) | None => eprint!("{} (y/N): ", prompt),
        }
        io::stderr().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            // EOF: nobody is there to answer.
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            _ => {}
        }
    }
}

/// Asks before each legacy manifest is migrated. Defaults to no.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, path: &Path, format: DetectedFormat) -> bool {
        let question = format!("Migrate {} from {} format?", path.display(), format);
        prompt_confirm(&question, Some(false)).unwrap_or_else(|e| {
            warn!("Could not read confirmation: {}", e);
            false
        })
    }
}

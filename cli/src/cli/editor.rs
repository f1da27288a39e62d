//! Collects longer text, such as a task description, through the user's editor.
//!
//! Based on the editor prompt of the `dialoguer` crate.
//! Copyright (c) 2017 Armin Ronacher <armin.ronacher@active-4.com>, MIT License.

use std::ffi::OsString;
use std::io::Write;
use std::{env, fs, process};

use anyhow::{anyhow, bail};

pub struct Editor {
    command: OsString,
    suffix: &'static str,
}

impl Editor {
    /// Uses `$VISUAL`, then `$EDITOR`, then whatever the system provides.
    pub fn from_env() -> Self {
        let command = env::var_os("VISUAL")
            .or_else(|| env::var_os("EDITOR"))
            .or_else(|| which::which("editor").ok().map(Into::into))
            .or_else(|| which::which("sensible-editor").ok().map(Into::into))
            .unwrap_or_else(|| if cfg!(windows) { "notepad.exe" } else { "vi" }.into());
        Self {
            command,
            suffix: ".md",
        }
    }

    /// Opens `template` in the editor and returns the saved text with comment
    /// lines removed. `None` means the user left nothing behind.
    pub fn edit(&self, template: &str) -> anyhow::Result<Option<String>> {
        let mut file = tempfile::Builder::new()
            .prefix("conductor-")
            .suffix(self.suffix)
            .tempfile()?;
        file.write_all(template.as_bytes())?;
        file.flush()?;

        let command = self
            .command
            .to_str()
            .ok_or(anyhow!("Editor command is not valid UTF-8"))?;
        let mut parts = shlex::split(command)
            .filter(|parts| !parts.is_empty())
            .ok_or(anyhow!("Cannot parse editor command {command:?}"))?;
        let program = parts.remove(0);
        log::debug!("Launching editor {program} {parts:?}");

        let status = process::Command::new(&program)
            .args(parts)
            .arg(file.path())
            .status()
            .map_err(|err| anyhow!("Failed to launch editor {program}: {err}"))?;
        if !status.success() {
            bail!("Editor {program} exited with {status}");
        }

        Ok(strip_comments(&fs::read_to_string(file.path())?))
    }
}

/// Drops `#` lines and surrounding blank space.
pub fn strip_comments(text: &str) -> Option<String> {
    let kept = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let kept = kept.trim();
    (!kept.is_empty()).then(|| kept.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_lines_are_dropped() {
        let text = "\nAdd a health endpoint\n  # ignored\nwith tests\n\n# trailing help";
        assert_eq!(
            strip_comments(text).as_deref(),
            Some("Add a health endpoint\nwith tests")
        );
    }

    #[test]
    fn only_comments_is_nothing() {
        assert_eq!(strip_comments("\n# describe your task\n\n"), None);
    }
}

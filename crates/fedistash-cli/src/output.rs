//! Output formatting helpers.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use fedistash_store::BackupConflict;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Ask a yes/no question on the terminal. Answers no when stdin is not a
/// terminal, so scripted runs never hang on a prompt.
pub fn confirm(question: &str) -> bool {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return false;
    }

    print!("{} [y/N] ", question);
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

/// Read one line of input after a label, e.g. an authorization code.
pub fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush().context("failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read input")?;
    Ok(line.trim().to_string())
}

/// Backup-conflict policy for saves: ask before destroying an old backup.
pub fn backup_prompt(backup: &Path) -> BackupConflict {
    let question = format!(
        "A backup already exists at {}. Overwrite it?",
        backup.display()
    );
    if confirm(&question) {
        BackupConflict::Overwrite
    } else {
        BackupConflict::Abort
    }
}

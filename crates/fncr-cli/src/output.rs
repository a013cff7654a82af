//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use fncr_core::Outcome;

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

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print an API outcome: the payload on success, the normalized
/// message and status code otherwise.
pub fn outcome<T: Serialize>(outcome: Outcome<T>) -> Result<()> {
    match outcome {
        Outcome::Success { data } => json_pretty(&data),
        Outcome::Error { data, code } => {
            error(&format!("{data} (status {code})"));
            anyhow::bail!("request failed")
        }
        Outcome::Cancelled { data } => {
            error(&data);
            anyhow::bail!("request cancelled")
        }
    }
}

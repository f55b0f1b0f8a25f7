//! Reviewer commands such as `release patch fixed MTOM` or `reject bad feed`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::version::Severity;

/// A reviewer's decision on a pending change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    /// Approve and publish with the given version bump.
    Release {
        /// Requested version bump.
        severity: Severity,
        /// Optional release note.
        note: Option<String>,
    },

    /// Discard the pending change.
    Reject {
        /// Optional reason.
        reason: Option<String>,
    },
}

impl fmt::Display for ReviewCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release { severity, note } => {
                write!(f, "release {severity}")?;
                if let Some(note) = note {
                    write!(f, " {note}")?;
                }
                Ok(())
            }
            Self::Reject { reason } => {
                write!(f, "reject")?;
                if let Some(reason) = reason {
                    write!(f, " {reason}")?;
                }
                Ok(())
            }
        }
    }
}

/// Split off the first whitespace-delimited word.
fn first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim()),
        None => (text, ""),
    }
}

fn optional(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

impl FromStr for ReviewCommand {
    type Err = Error;

    /// Parse the first non-blank line of a comment.
    fn from_str(input: &str) -> Result<Self> {
        let line = input
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| Error::invalid_command(input, "empty command"))?;

        let (keyword, rest) = first_word(line);
        match keyword.to_ascii_lowercase().as_str() {
            "release" => {
                let (severity, note) = first_word(rest);
                if severity.is_empty() {
                    return Err(Error::invalid_command(
                        line,
                        "release requires a severity (patch, minor or major)",
                    ));
                }
                Ok(Self::Release {
                    severity: severity.parse()?,
                    note: optional(note),
                })
            }
            "reject" => Ok(Self::Reject {
                reason: optional(rest),
            }),
            _ => Err(Error::invalid_command(
                line,
                "expected 'release <severity> [note]' or 'reject [reason]'",
            )),
        }
    }
}

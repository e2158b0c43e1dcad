//! Document → plain text.
//!
//! Ebook formats (EPUB, DOCX, HTML, Markdown, …) are handed to `pandoc`,
//! which renders them as plain text without hard wrapping so every
//! paragraph arrives as a single line.

use std::{path::Path, process::Command};

use tracing::debug;

use crate::error::ConversionError;

/// Turns a document on disk into plain text.
pub trait DocumentConverter {
    fn convert(&self, path: &Path) -> Result<String, ConversionError>;
}

/// Converter backed by the `pandoc` executable.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self { program: "pandoc".to_string() }
    }
}

impl PandocConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific pandoc executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl DocumentConverter for PandocConverter {
    fn convert(&self, path: &Path) -> Result<String, ConversionError> {
        debug!(program = %self.program, path = %path.display(), "converting document");
        let output = Command::new(&self.program)
            .arg(path)
            .args(["--to", "plain", "--wrap=none"])
            .output()
            .map_err(|source| ConversionError::Spawn { program: self.program.clone(), source })?;

        if !output.status.success() {
            return Err(ConversionError::Failed {
                path: path.to_path_buf(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ConversionError::NotUtf8 { path: path.to_path_buf() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pandoc_is_spawn_error() {
        let conv = PandocConverter::with_program("/nonexistent/pandoc");
        let err = conv.convert(Path::new("book.epub")).unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }), "got: {err}");
        assert!(err.to_string().contains("/nonexistent/pandoc"));
    }
}

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, warn};

const PDF_TOOL: &str = "pdftotext";
const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("policy document not found at `{0}`")]
    NotFound(PathBuf),
    #[error("pdftotext is not installed or not on PATH; it is required to read `{0}`")]
    ToolMissing(PathBuf),
    #[error("could not extract text from `{path}`: {message}")]
    Extraction { path: PathBuf, message: String },
    #[error("could not read `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// Extracts plain text from policy documents. PDFs go through `pdftotext`.
#[derive(Clone, Debug)]
pub struct DocumentExtractor {
    pdftotext: Option<PathBuf>,
}

impl DocumentExtractor {
    pub fn detect() -> Self {
        let pdftotext = which::which(PDF_TOOL).ok();
        if pdftotext.is_none() {
            warn!(event_name = "document.tool_missing", tool = PDF_TOOL, "pdftotext not found in PATH");
        }
        Self { pdftotext }
    }

    pub fn with_tool(pdftotext: Option<PathBuf>) -> Self {
        Self { pdftotext }
    }

    pub fn pdf_supported(&self) -> bool {
        self.pdftotext.is_some()
    }

    pub async fn extract_text(&self, path: &Path) -> Result<String, DocumentError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }

        let is_pdf = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));

        let text = if is_pdf {
            self.extract_pdf(path).await?
        } else {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DocumentError::Io { path: path.to_path_buf(), source })?
                .trim()
                .to_string()
        };

        debug!(
            event_name = "document.extracted",
            path = %path.display(),
            chars = text.chars().count(),
            "policy document text extracted"
        );
        Ok(text)
    }

    async fn extract_pdf(&self, path: &Path) -> Result<String, DocumentError> {
        let Some(tool) = &self.pdftotext else {
            return Err(DocumentError::ToolMissing(path.to_path_buf()));
        };

        let output = Command::new(tool)
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| DocumentError::Io { path: path.to_path_buf(), source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(event_name = "document.extraction_failed", stderr = %stderr, "pdftotext failed");
            return Err(DocumentError::Extraction { path: path.to_path_buf(), message: stderr });
        }

        Ok(join_pages(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Replaces page breaks with a blank line and trims the result.
pub fn join_pages(raw: &str) -> String {
    raw.split(PAGE_BREAK)
        .map(str::trim_end)
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{join_pages, DocumentError, DocumentExtractor};

    #[test]
    fn pages_are_separated_by_blank_lines() {
        let raw = "Refund Policy\nRefunds within 30 days.\n\u{000C}Page two\n\u{000C}";
        assert_eq!(join_pages(raw), "Refund Policy\nRefunds within 30 days.\n\nPage two");
    }

    #[tokio::test]
    async fn text_files_are_read_and_trimmed() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("policy.txt");
        fs::write(&path, "\n  Refunds are issued within 30 days of purchase.  \n\n").expect("write");

        let text = DocumentExtractor::with_tool(None).extract_text(&path).await.expect("text");
        assert_eq!(text, "Refunds are issued within 30 days of purchase.");
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let result =
            DocumentExtractor::with_tool(None).extract_text(&dir.path().join("absent.pdf")).await;

        assert!(matches!(result, Err(DocumentError::NotFound(_))));
    }

    #[tokio::test]
    async fn pdf_without_tool_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("policy.PDF");
        fs::write(&path, b"%PDF-1.4").expect("write");

        let result = DocumentExtractor::with_tool(None).extract_text(&path).await;
        assert!(matches!(result, Err(DocumentError::ToolMissing(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pdf_text_comes_from_the_external_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        let tool = dir.path().join("fake-pdftotext");
        fs::write(&tool, "#!/bin/sh\nprintf 'First page\\fSecond page\\f'\n").expect("write tool");
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).expect("chmod");
        let pdf = dir.path().join("policy.pdf");
        fs::write(&pdf, b"%PDF-1.4").expect("write pdf");

        let text = DocumentExtractor::with_tool(Some(tool)).extract_text(&pdf).await.expect("text");
        assert_eq!(text, "First page\n\nSecond page");
    }
}

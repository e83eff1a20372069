use std::path::PathBuf;

use tokio::sync::OnceCell;
use tracing::info;

use crate::document::{DocumentError, DocumentExtractor};

/// System prompt with the policy document appended, loaded on first use and cached for the process.
#[derive(Debug)]
pub struct PolicyPrompt {
    system_prompt: String,
    document: Option<PathBuf>,
    extractor: DocumentExtractor,
    text: OnceCell<String>,
}

impl PolicyPrompt {
    pub fn new(
        system_prompt: impl Into<String>,
        document: Option<PathBuf>,
        extractor: DocumentExtractor,
    ) -> Self {
        Self { system_prompt: system_prompt.into(), document, extractor, text: OnceCell::new() }
    }

    /// Prompt without any document.
    pub fn bare(system_prompt: impl Into<String>) -> Self {
        Self::new(system_prompt, None, DocumentExtractor::with_tool(None))
    }

    pub fn is_loaded(&self) -> bool {
        self.text.initialized()
    }

    /// A failed load is not cached; the next call retries.
    pub async fn render(&self) -> Result<String, DocumentError> {
        let Some(path) = &self.document else {
            return Ok(self.system_prompt.clone());
        };

        let text = self
            .text
            .get_or_try_init(|| async {
                let text = self.extractor.extract_text(path).await?;
                info!(
                    event_name = "prompt.document_loaded",
                    path = %path.display(),
                    chars = text.chars().count(),
                    "policy document loaded"
                );
                Ok::<_, DocumentError>(text)
            })
            .await?;

        Ok(format!("{}\n\nPOLICY DOCUMENT:\n{text}", self.system_prompt))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::PolicyPrompt;
    use crate::document::{DocumentError, DocumentExtractor};

    #[tokio::test]
    async fn bare_prompt_needs_no_document() {
        let prompt = PolicyPrompt::bare("Be brief.");
        assert_eq!(prompt.render().await.expect("prompt"), "Be brief.");
        assert!(!prompt.is_loaded());
    }

    #[tokio::test]
    async fn document_is_loaded_once_and_cached() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("policy.txt");
        fs::write(&path, "Refunds within 30 days.").expect("write");
        let prompt =
            PolicyPrompt::new("Be brief.", Some(path.clone()), DocumentExtractor::with_tool(None));

        let first = prompt.render().await.expect("prompt");
        assert_eq!(first, "Be brief.\n\nPOLICY DOCUMENT:\nRefunds within 30 days.");
        assert!(prompt.is_loaded());

        fs::remove_file(&path).expect("remove");
        assert_eq!(prompt.render().await.expect("cached prompt"), first);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("later.txt");
        let prompt = PolicyPrompt::new("Sys", Some(path.clone()), DocumentExtractor::with_tool(None));

        assert!(matches!(prompt.render().await, Err(DocumentError::NotFound(_))));
        assert!(!prompt.is_loaded());

        fs::write(&path, "Now present.").expect("write");
        assert!(prompt.render().await.expect("prompt").ends_with("Now present."));
    }
}

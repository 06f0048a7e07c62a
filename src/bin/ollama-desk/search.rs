use std::path::PathBuf;

use ollama_desk::error::SearchError;
use ollama_desk::prompt::{SearchResult, WebSearch};

/// Serves web-search results saved as a JSON array of
/// `{title, url, snippet}` objects, whatever the query.
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl WebSearch for ResultsFile {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        log::debug!("loading search results for {:?} from {}", query, self.path.display());
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| SearchError(format!("{}: {err}", self.path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|err| SearchError(format!("{}: {err}", self.path.display())))
    }
}

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

use super::{compose, SelectedFile};

/// One hit returned by a web-search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// A web-search backend.
#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Runs `query` through `search` and frames the prompt with the results.
///
/// A failed search is returned as an error; it is never presented to the
/// model as an empty result set.
pub async fn compose_with_search(
    user_prompt: &str,
    files: &[SelectedFile],
    search: &dyn WebSearch,
    query: &str,
) -> Result<String, SearchError> {
    let results = search.search(query).await?;
    log::debug!("web search for {:?} returned {} results", query, results.len());
    Ok(compose(user_prompt, files, Some(&results), Some(query)))
}

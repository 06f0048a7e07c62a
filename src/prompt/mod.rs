//! Prompt composition.
//!
//! Combines the user's prompt with attached files and web-search results.
//! The output depends only on the inputs, so identical inputs always produce
//! the same text.

mod file;
mod search;

use std::fmt::Write;

pub use file::SelectedFile;
pub use search::{compose_with_search, SearchResult, WebSearch};

const DEFAULT_SUMMARY_PROMPT: &str = "Summarize the search results above.";
const IMAGE_PLACEHOLDER: &str = "[Image file: binary content omitted]";

const SEARCH_RESULTS_INSTRUCTIONS: &str = "Answer the question below using ONLY the \
following web search results. If the results do not contain the answer, say so instead \
of guessing.";

const NO_RESULTS_INSTRUCTIONS: &str = "A web search was performed but no results were \
found. Answer the question below from your general knowledge and mention that no search \
results were available.";

/// Builds the final prompt text.
///
/// - without files or search results the prompt is returned unchanged;
/// - files are rendered first as `Files:\n...\nPrompt:\n<prompt>`;
/// - search results, when given, wrap the result of the previous step. An
///   empty result set produces the "no results" framing with the query.
pub fn compose(
    user_prompt: &str,
    files: &[SelectedFile],
    web_search_results: Option<&[SearchResult]>,
    search_query: Option<&str>,
) -> String {
    let question = effective_question(user_prompt, web_search_results, search_query);

    let body = if files.is_empty() {
        question.to_string()
    } else {
        format!("Files:\n{}\nPrompt:\n{}", render_files(files), question)
    };

    match web_search_results {
        Some(results) if !results.is_empty() => frame_with_results(&body, results, search_query),
        Some(_) => frame_without_results(&body, search_query),
        None => body,
    }
}

fn effective_question<'a>(
    user_prompt: &'a str,
    web_search_results: Option<&[SearchResult]>,
    search_query: Option<&'a str>,
) -> &'a str {
    if !user_prompt.trim().is_empty() {
        return user_prompt;
    }
    match web_search_results {
        Some(results) if !results.is_empty() => DEFAULT_SUMMARY_PROMPT,
        Some(_) => search_query.unwrap_or(user_prompt),
        None => user_prompt,
    }
}

fn render_files(files: &[SelectedFile]) -> String {
    files.iter().map(render_file).collect::<Vec<_>>().join("\n")
}

fn render_file(file: &SelectedFile) -> String {
    let mut out = format!("File: {} (path: {})\n", file.name, file.path.display());
    if file.is_image {
        out.push_str(IMAGE_PLACEHOLDER);
        out.push('\n');
        return out;
    }
    let content = file.content();
    let _ = writeln!(out, "```{}", file.extension);
    out.push_str(content);
    if !content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n");
    out
}

fn frame_with_results(body: &str, results: &[SearchResult], query: Option<&str>) -> String {
    let mut out = String::from(SEARCH_RESULTS_INSTRUCTIONS);
    out.push_str("\n\n");
    if let Some(query) = query {
        let _ = writeln!(out, "Search query: {query}\n");
    }
    out.push_str("Web search results:\n");
    for (index, result) in results.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", index + 1, result.title);
        let _ = writeln!(out, "URL: {}", result.url);
        let _ = writeln!(out, "Snippet: {}\n", result.snippet);
    }
    let _ = write!(out, "Question:\n{body}");
    out
}

fn frame_without_results(body: &str, query: Option<&str>) -> String {
    let mut out = String::from(NO_RESULTS_INSTRUCTIONS);
    out.push_str("\n\n");
    if let Some(query) = query {
        let _ = writeln!(out, "Search query: \"{query}\"\n");
    }
    let _ = write!(out, "Question:\n{body}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;

    fn result(n: usize) -> SearchResult {
        SearchResult {
            title: format!("Title {n}"),
            url: format!("https://example.com/{n}"),
            snippet: format!("Snippet {n}"),
        }
    }

    #[test]
    fn plain_prompt_is_unchanged() {
        assert_eq!(compose("Hi", &[], None, None), "Hi");
    }

    #[test]
    fn text_file_is_fenced_with_its_extension() {
        let files = [SelectedFile::with_content("a.txt", "/work/a.txt", "hello")];
        let prompt = compose("Hi", &files, None, None);

        assert_eq!(
            prompt,
            "Files:\nFile: a.txt (path: /work/a.txt)\n```txt\nhello\n```\n\nPrompt:\nHi"
        );
    }

    #[test]
    fn image_files_are_not_inlined() {
        let files = [
            SelectedFile::from_path("/work/diagram.png"),
            SelectedFile::with_content("lib.rs", "/work/lib.rs", "fn main() {}\n"),
        ];
        let prompt = compose("Explain", &files, None, None);

        assert!(prompt.contains("File: diagram.png"));
        assert!(prompt.contains(IMAGE_PLACEHOLDER));
        assert!(!files[0].is_loaded());
        assert!(prompt.contains("```rs\nfn main() {}\n```"));
        assert!(prompt.ends_with("Prompt:\nExplain"));
    }

    #[test]
    fn search_results_frame_the_prompt() {
        let results = [result(1), result(2)];
        let prompt = compose("What is new?", &[], Some(&results), Some("rust news"));

        assert!(prompt.starts_with(SEARCH_RESULTS_INSTRUCTIONS));
        assert!(prompt.contains("ONLY"));
        assert!(prompt.contains("Search query: rust news"));
        assert!(prompt.contains("[1] Title 1\nURL: https://example.com/1\nSnippet: Snippet 1"));
        assert!(prompt.contains("[2] Title 2"));
        assert!(prompt.ends_with("Question:\nWhat is new?"));
    }

    #[test]
    fn empty_prompt_with_results_asks_for_summary() {
        let prompt = compose("", &[], Some(&[result(1)]), Some("q"));
        assert!(prompt.ends_with(DEFAULT_SUMMARY_PROMPT));
    }

    #[test]
    fn empty_results_keep_the_query() {
        let prompt = compose("Tell me about foo", &[], Some(&[]), Some("foo"));
        assert!(prompt.contains("no results were found"));
        assert!(prompt.contains("\"foo\""));
        assert!(prompt.ends_with("Question:\nTell me about foo"));
    }

    #[test]
    fn search_framing_wraps_files() {
        let files = [SelectedFile::with_content("a.txt", "/a.txt", "hello")];
        let prompt = compose("Hi", &files, Some(&[result(1)]), Some("greeting"));

        let results_at = prompt.find("Web search results:").unwrap();
        let files_at = prompt.find("Files:\n").unwrap();
        assert!(results_at < files_at);
        assert!(prompt.ends_with("Prompt:\nHi"));
    }

    #[test]
    fn output_is_deterministic() {
        let results = [result(1), result(2), result(3)];
        let first = compose("Q", &[], Some(&results), Some("x"));
        let second = compose("Q", &[], Some(&results), Some("x"));
        assert_eq!(first, second);
    }

    struct FixedSearch(Result<Vec<SearchResult>, SearchError>);

    #[async_trait::async_trait]
    impl WebSearch for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn compose_with_search_uses_collaborator_results() {
        let search = FixedSearch(Ok(vec![result(7)]));
        let prompt = compose_with_search("Hi", &[], &search, "seven").await.unwrap();
        assert!(prompt.contains("[1] Title 7"));
    }

    #[tokio::test]
    async fn compose_with_search_surfaces_failures() {
        let search = FixedSearch(Err(SearchError("rate limited".into())));
        let err = compose_with_search("Hi", &[], &search, "q").await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}

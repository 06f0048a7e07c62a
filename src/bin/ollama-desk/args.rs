use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ollama-desk",
    about = "Chat with a locally hosted Ollama server",
    allow_hyphen_values = true
)]
pub struct CliArgs {
    #[arg(index = 1)]
    pub prompt: Option<String>,
    #[arg(long, short = 'm')]
    pub model: Option<String>,
    /// Attach a file to the prompt (repeatable)
    #[arg(long = "file", short = 'f')]
    pub files: Vec<PathBuf>,
    /// Send an image with the prompt (uses the chat endpoint)
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// JSON file with pre-fetched web search results
    #[arg(long)]
    pub search_results: Option<PathBuf>,
    #[arg(long)]
    pub search_query: Option<String>,
    /// Write an image found in the answer to this path
    #[arg(long)]
    pub save_image: Option<PathBuf>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub top_p: Option<f32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub list_models: bool,
    /// Check that the server is reachable and exit
    #[arg(long)]
    pub check: bool,
}

impl CliArgs {
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }
}

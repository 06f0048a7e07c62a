#[path = "ollama-desk/app.rs"]
mod app;
#[path = "ollama-desk/args.rs"]
mod args;
#[path = "ollama-desk/config/mod.rs"]
mod config;
#[path = "ollama-desk/logging.rs"]
mod logging;
#[path = "ollama-desk/render.rs"]
mod render;
#[path = "ollama-desk/search.rs"]
mod search;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use ollama_desk::client::{ChannelListener, ClientConfig, OllamaStreamClient};
use ollama_desk::error::RequestError;
use ollama_desk::health::HealthProvider;
use ollama_desk::prompt::{compose, compose_with_search, SelectedFile};
use ollama_desk::request::{GenerationParameters, GenerationRequest, ImageAttachment};
use ollama_desk::{AssembledResponse, ModelCatalogClient};

use crate::args::CliArgs;
use crate::config::{load_config, AppConfig};
use crate::logging::init_logging;
use crate::render::TerminalRenderer;
use crate::search::ResultsFile;

pub async fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let loaded = load_config(args.config.clone())?;
    let _logger = init_logging(&loaded.config.logging, &loaded.paths)?;
    log::info!("using config {}", loaded.paths.config_file.display());

    let client_config = Arc::new(
        loaded
            .config
            .server
            .client_config(args.base_url.as_deref()),
    );

    if args.check {
        return check_server(&client_config).await;
    }
    if args.list_models {
        return list_models(&client_config).await;
    }
    chat(&args, &loaded.config, client_config).await
}

async fn check_server(config: &Arc<ClientConfig>) -> anyhow::Result<()> {
    let catalog = ModelCatalogClient::new(Arc::clone(config));
    catalog
        .health_check()
        .await
        .with_context(|| format!("no connection to {}", config.base_url))?;
    println!("{} is reachable", config.base_url);
    Ok(())
}

async fn list_models(config: &Arc<ClientConfig>) -> anyhow::Result<()> {
    let catalog = ModelCatalogClient::new(Arc::clone(config));
    let catalog = catalog
        .refresh()
        .await
        .with_context(|| format!("could not list models from {}", config.base_url))?;
    if catalog.is_empty() {
        println!("No models installed.");
    }
    for name in &catalog.names {
        println!("{name}");
    }
    Ok(())
}

async fn chat(
    args: &CliArgs,
    config: &AppConfig,
    client_config: Arc<ClientConfig>,
) -> anyhow::Result<()> {
    if args.prompt_text().trim().is_empty() && args.files.is_empty() && args.search_results.is_none()
    {
        bail!("nothing to send: pass a prompt, --file or --search-results");
    }

    let prompt = build_prompt(args).await?;
    let model = resolve_model(args, config, &client_config).await?;
    let request = build_request(args, config, model, prompt)?;

    let client = OllamaStreamClient::new(client_config);
    let (listener, mut events) = ChannelListener::channel();
    let handle = client.send(request, listener);
    let mut renderer = TerminalRenderer::default();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => renderer.apply(event)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !handle.is_cancelled() => {
                log::info!("cancel requested");
                handle.cancel();
            }
        }
    }

    let image = renderer.take_image();
    match handle.result().await {
        Ok(response) => {
            renderer.render_text(&response.text)?;
            println!();
            save_image(args, &response, image)
        }
        Err(RequestError::Cancelled) => {
            eprintln!("\n[cancelled]");
            Ok(())
        }
        Err(err) => {
            if let Some(partial) = err.partial() {
                renderer.render_text(&partial.text)?;
                println!();
            }
            Err(err.into())
        }
    }
}

async fn build_prompt(args: &CliArgs) -> anyhow::Result<String> {
    let files: Vec<SelectedFile> = args.files.iter().map(SelectedFile::from_path).collect();
    let prompt = args.prompt_text();

    let Some(results_path) = &args.search_results else {
        return Ok(compose(prompt, &files, None, None));
    };
    let query = args.search_query.as_deref().unwrap_or(prompt);
    let search = ResultsFile::new(results_path.clone());
    Ok(compose_with_search(prompt, &files, &search, query).await?)
}

async fn resolve_model(
    args: &CliArgs,
    config: &AppConfig,
    client_config: &Arc<ClientConfig>,
) -> anyhow::Result<String> {
    if let Some(model) = args.model.clone().or_else(|| config.generation.model.clone()) {
        return Ok(model);
    }
    let catalog = ModelCatalogClient::new(Arc::clone(client_config));
    let models = catalog
        .fetch_models()
        .await
        .context("no model configured and the server could not be asked for one")?;
    let model = models
        .into_iter()
        .next()
        .context("no model configured and the server has no models installed")?;
    log::info!("no model configured, using {model}");
    Ok(model)
}

fn build_request(
    args: &CliArgs,
    config: &AppConfig,
    model: String,
    prompt: String,
) -> anyhow::Result<GenerationRequest> {
    let generation = &config.generation;
    let parameters = GenerationParameters {
        temperature: args.temperature.unwrap_or(generation.temperature),
        top_p: args.top_p.unwrap_or(generation.top_p),
        max_tokens: args.max_tokens.unwrap_or(generation.max_tokens),
    };
    let mut builder = GenerationRequest::builder(model)
        .prompt(prompt)
        .parameters(parameters);
    if let Some(path) = &args.image {
        let image = ImageAttachment::from_path(path)
            .with_context(|| format!("could not attach {}", path.display()))?;
        builder = builder.image(image);
    }
    Ok(builder.build()?)
}

fn save_image(
    args: &CliArgs,
    response: &AssembledResponse,
    streamed: Option<ollama_desk::image::DecodedImage>,
) -> anyhow::Result<()> {
    let Some(image) = response.embedded_image.clone().or(streamed) else {
        return Ok(());
    };
    match &args.save_image {
        Some(path) => {
            std::fs::write(path, &image.bytes)
                .with_context(|| format!("could not write {}", path.display()))?;
            eprintln!("saved {} image to {}", image.mime.mime_type(), path.display());
        }
        None => eprintln!(
            "[response contains a {} image; pass --save-image to keep it]",
            image.mime.mime_type()
        ),
    }
    Ok(())
}

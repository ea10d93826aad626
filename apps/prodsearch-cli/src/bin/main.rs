use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use prodsearch_core::config::{expand_path, Config, Settings};
use prodsearch_core::{LabelDetector, SearchRequest};
use prodsearch_embed::HashEmbedder;
use prodsearch_search::{ChannelOptions, Providers, SearchOrchestrator};
use prodsearch_testkit::{sample_catalog, MemoryIndex, StaticLabels};

const USAGE: &str = "Usage: prodsearch <search|semantic|image> [--text <query>] [--image <path>] \
[--labels <Name:conf,...>] [--catalog <products.json>] [--region <id>] [--size <n>]";

#[derive(Default)]
struct Args {
    cmd: String,
    text: Option<String>,
    image: Option<PathBuf>,
    labels: Option<String>,
    catalog: Option<String>,
    region: Option<String>,
    size: Option<usize>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut it = env::args().skip(1);
    let mut args = Args { cmd: it.next().ok_or_else(|| anyhow::anyhow!(USAGE))?, ..Args::default() };
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow::anyhow!("{} needs a value\n{}", flag, USAGE));
        match flag.as_str() {
            "--text" => args.text = Some(value()?),
            "--image" => args.image = Some(expand_path(value()?)),
            "--labels" => args.labels = Some(value()?),
            "--catalog" => args.catalog = Some(value()?),
            "--region" => args.region = Some(value()?),
            "--size" => args.size = Some(value()?.parse()?),
            other => anyhow::bail!("Unknown argument: {}\n{}", other, USAGE),
        }
    }
    Ok(args)
}

fn load_catalog(path: Option<&str>) -> anyhow::Result<Vec<Value>> {
    let Some(path) = path else { return Ok(sample_catalog()) };
    let path = expand_path(path);
    let raw = std::fs::read_to_string(&path).map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

fn build(settings: &Settings, args: &Args, config: &Config) -> anyhow::Result<SearchOrchestrator> {
    let catalog_path = args.catalog.clone().or_else(|| config.get::<String>("data.catalog").ok());
    let products = load_catalog(catalog_path.as_deref())?;
    let embedder = HashEmbedder::new(settings.embedding.dimension);
    let index = MemoryIndex::from_catalog(products, &embedder, &settings.index)?;
    info!(products = index.len(), "catalog indexed");

    let labels = match &args.labels {
        Some(spec) => Some(StaticLabels::parse(spec)?),
        None => None,
    };
    let providers = Providers {
        embedding: Arc::new(embedder),
        vision: None,
        language: None,
        labels: labels.map(|l| StaticLabels::new(l) as Arc<dyn LabelDetector>),
        index: Arc::new(index),
    };
    Ok(SearchOrchestrator::new(providers, settings.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let args = parse_args()?;
    let search = build(&settings, &args, &config)?;

    let image = match &args.image {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            Some(bytes)
        }
        None => None,
    };
    let opts = ChannelOptions { size: args.size, ..ChannelOptions::default() };

    let out = match args.cmd.as_str() {
        "search" => {
            let request = SearchRequest {
                text: args.text.clone(),
                image,
                result_size: args.size,
                region_id: args.region.clone(),
                ..SearchRequest::default()
            };
            serde_json::to_value(search.search(&request).await?)?
        }
        "semantic" => {
            let text = args.text.as_deref().ok_or_else(|| anyhow::anyhow!("semantic needs --text\n{}", USAGE))?;
            serde_json::to_value(search.semantic_search(text, &opts).await?)?
        }
        "image" => {
            let bytes = image.ok_or_else(|| anyhow::anyhow!("image needs --image\n{}", USAGE))?;
            serde_json::to_value(search.image_search(&bytes, &opts).await?)?
        }
        other => anyhow::bail!("Unknown command: {}\n{}", other, USAGE),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

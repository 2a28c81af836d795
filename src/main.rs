use std::path::{Path, PathBuf};
use std::sync::Arc;

use welearn_search::cli::{Cli, Commands, ConfigAction, ModeArg, SearchOptions};
use welearn_search::config::{Config, ConfigValidator};
use welearn_search::embedding::FastEmbedder;
use welearn_search::error::{Result, WelearnError};
use welearn_search::index::{QdrantClient, ScoredSlice, SearchMode};
use welearn_search::language::WhatlangDetector;
use welearn_search::retrieval::{
    format_context, SearchError, SearchRequest, SearchService, ServiceSettings, SubjectVectors,
};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Search {
            query,
            mode,
            options,
            context,
        } => {
            cmd_search(cli.config, &query, mode, &options, context)?;
        }
        Commands::MultiSearch { queries, options } => {
            cmd_multi_search(cli.config, &queries, &options)?;
        }
        Commands::Collections { json } => {
            cmd_collections(cli.config, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "welearn_search=debug"
    } else {
        "welearn_search=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_search(
    config_path: Option<PathBuf>,
    query: &str,
    mode: ModeArg,
    options: &SearchOptions,
    context: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let service = build_service(&config)?;
    let request = build_request(query, &config, options);

    let rt = runtime()?;
    let outcome = rt.block_on(service.search_handler(&request, SearchMode::from(mode)));

    match outcome {
        Ok(results) if results.is_empty() => {
            report(&SearchError::NoResults, options.json);
        }
        Ok(results) if context => {
            println!("{}", format_context(&results));
        }
        Ok(results) if options.json => {
            print_json(&results)?;
        }
        Ok(results) => {
            print_results(&results);
        }
        Err(e) => {
            report(&e, options.json);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_multi_search(
    config_path: Option<PathBuf>,
    queries: &[String],
    options: &SearchOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let service = build_service(&config)?;
    let request = build_request("", &config, options);

    let rt = runtime()?;
    let outcome = rt.block_on(service.search_multi_inputs(&request, queries));

    match outcome {
        Ok(outcome) => {
            if options.json {
                print_json(&outcome)?;
                return Ok(());
            }

            if let Some(warning) = outcome.warning() {
                report(&warning, false);
            }

            if outcome.results.is_empty() {
                report(&SearchError::NoResults, false);
            } else {
                print_results(&outcome.results);
            }
        }
        Err(e) => {
            report(&e, options.json);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_collections(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let service = build_service(&config)?;

    let rt = runtime()?;
    let collections = rt
        .block_on(service.list_collections())
        .map_err(|e| WelearnError::Other(e.into()))?;

    if json {
        return print_json(&collections);
    }

    if collections.is_empty() {
        println!("No collections found at {}", config.index.url);
        return Ok(());
    }

    println!("{:<40} {:<6} MODEL", "COLLECTION", "LANG");
    for collection in &collections {
        println!(
            "{:<40} {:<6} {}",
            collection.name, collection.lang, collection.model
        );
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| WelearnError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", Config::default_path()?.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'welearn-search config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}

fn build_service(config: &Config) -> Result<SearchService> {
    let index = QdrantClient::new(&config.index)
        .map_err(|e| WelearnError::Config(format!("Failed to create index client: {}", e)))?;

    let subjects = match &config.subjects.vectors_file {
        Some(path) => {
            let path = expand_path(path)?;
            SubjectVectors::load(&path).map_err(|e| {
                WelearnError::Config(format!("Failed to load subject vectors: {}", e))
            })?
        }
        None => SubjectVectors::empty(),
    };

    let mut embedding = config.embedding.clone();
    if let Some(cache_dir) = &embedding.cache_dir {
        embedding.cache_dir = Some(expand_path(cache_dir)?);
    }

    Ok(SearchService::new(
        Arc::new(FastEmbedder::new(&embedding)),
        Arc::new(index),
        Arc::new(WhatlangDetector::new()),
        Arc::new(subjects),
        ServiceSettings::from_config(config),
    ))
}

fn build_request(query: &str, config: &Config, options: &SearchOptions) -> SearchRequest {
    let mut request = SearchRequest::from_config(query, &config.search);

    if let Some(limit) = options.limit {
        request.nb_results = limit;
    }
    if !options.corpora.is_empty() {
        request = request.with_corpora(options.corpora.clone());
    }
    if !options.sdg.is_empty() {
        request = request.with_sdg_filter(options.sdg.clone());
    }
    if let Some(subject) = &options.subject {
        request = request.with_subject(subject.clone());
    }
    if let Some(factor) = options.influence_factor {
        request = request.with_influence_factor(factor);
    }
    if let Some(factor) = options.relevance_factor {
        request = request.with_relevance_factor(factor);
    }
    if options.no_concatenate {
        request = request.with_concatenate(false);
    }

    request
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| WelearnError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| WelearnError::Json {
        source: e,
        context: "Failed to serialize results".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn print_results(results: &[ScoredSlice]) {
    for (i, slice) in results.iter().enumerate() {
        let payload = slice.payload.as_ref();
        let title = payload
            .and_then(|p| p.document_title.as_deref())
            .unwrap_or("(untitled)");

        println!("{}. [{:.3}] {}", i + 1, slice.score, title);
        if let Some(url) = payload.and_then(|p| p.document_url.as_deref()) {
            println!("   {}", url);
        }
        println!("   {}", preview(slice.content(), 160));
        println!();
    }
}

/// First `max_chars` characters on one line
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

fn report(error: &SearchError, json: bool) {
    let response = error.to_response();
    if json {
        match serde_json::to_string_pretty(&response) {
            Ok(body) => println!("{}", body),
            Err(e) => eprintln!("Failed to serialize error response: {}", e),
        }
    } else {
        eprintln!("[{}] {}", response.code, response.message);
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| WelearnError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| WelearnError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

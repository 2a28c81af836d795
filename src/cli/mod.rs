//! CLI command definitions and parsing
use crate::index::SearchMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "welearn-search",
    version,
    about = "Semantic search with diversity re-ranking over a Qdrant slice index",
    long_about = "Detects the query language, embeds the query with the matching collection's model, \
                  retrieves slices from Qdrant, re-ranks them with Maximal Marginal Relevance and \
                  optionally merges slices of the same document."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/welearn-search/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search slices or documents for one query
    Search {
        /// Search query text
        query: String,

        /// Retrieval granularity
        #[arg(short, long, value_enum, default_value_t = ModeArg::Slices)]
        mode: ModeArg,

        #[command(flatten)]
        options: SearchOptions,

        /// Print the results as LLM grounding context instead of a list
        #[arg(long, conflicts_with = "json")]
        context: bool,
    },

    /// Search several queries concurrently and merge the results
    MultiSearch {
        /// Query texts
        #[arg(required = true)]
        queries: Vec<String>,

        #[command(flatten)]
        options: SearchOptions,
    },

    /// List the collections available in the index
    Collections {
        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options shared by the search commands
#[derive(Args, Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results (defaults to search.nb_results)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Restrict to a corpus (repeatable)
    #[arg(long = "corpus", value_name = "NAME")]
    pub corpora: Vec<String>,

    /// Restrict to an SDG tag, 1-17 (repeatable)
    #[arg(long = "sdg", value_name = "TAG")]
    pub sdg: Vec<u8>,

    /// Subject whose vector steers the query embedding
    #[arg(long)]
    pub subject: Option<String>,

    /// Weight of the subject vector
    #[arg(long, allow_negative_numbers = true)]
    pub influence_factor: Option<f32>,

    /// MMR trade-off between relevance (1.0) and diversity
    #[arg(long, allow_negative_numbers = true)]
    pub relevance_factor: Option<f32>,

    /// Keep slices of the same document separate
    #[arg(long)]
    pub no_concatenate: bool,

    /// Show results in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Individual slices above the similarity floor
    Slices,
    /// One slice per document
    Document,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Slices => SearchMode::BySlices,
            ModeArg::Document => SearchMode::ByDocument,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the default configuration path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_options() {
        let cli = Cli::try_parse_from([
            "welearn-search",
            "search",
            "coral reefs",
            "--mode",
            "document",
            "--sdg",
            "14",
            "--sdg",
            "13",
            "--corpus",
            "ipbes",
            "--relevance-factor",
            "-0.5",
            "--no-concatenate",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                query,
                mode,
                options,
                context,
            } => {
                assert_eq!(query, "coral reefs");
                assert_eq!(SearchMode::from(mode), SearchMode::ByDocument);
                assert_eq!(options.sdg, vec![14, 13]);
                assert_eq!(options.corpora, vec!["ipbes"]);
                assert_eq!(options.relevance_factor, Some(-0.5));
                assert!(options.no_concatenate);
                assert!(!context);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_multi_search_requires_queries() {
        assert!(Cli::try_parse_from(["welearn-search", "multi-search"]).is_err());
    }
}

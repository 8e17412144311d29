use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use ctxbench_core::ToolKind;

#[derive(Parser, Debug)]
#[command(
    name = "ctxbench",
    about = "Compare pattern search and semantic context search by token cost"
)]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Route every query to one backend and write a result file per query.
    Bench {
        #[arg(long, value_enum)]
        backend: Backend,
        #[arg(long, default_value = "queries.json")]
        queries: String,
        /// Defaults to results/<backend>.
        #[arg(long)]
        output: Option<String>,
        /// Tree searched by the pattern backend.
        #[arg(long, default_value = ".")]
        root: String,
    },
    /// Join two result directories into comparison.json.
    Compare {
        #[arg(long, default_value = "results/pattern")]
        pattern_dir: String,
        #[arg(long, default_value = "results/semantic")]
        semantic_dir: String,
        #[arg(long, default_value = "comparison.json")]
        output: String,
        #[arg(long)]
        summary_out: Option<String>,
    },
    /// Upload a local tree to the semantic service.
    Index {
        #[arg(long, default_value = ".")]
        root: String,
        #[arg(long, default_value = crate::config::DEFAULT_GROUP_TAG)]
        tag: String,
        #[arg(long, default_value = crate::config::DEFAULT_SOURCE)]
        source: String,
        #[arg(long, default_value_t = ctxbench_index::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        #[arg(long, default_value_t = 3000)]
        batch_delay_ms: u64,
        #[arg(long, default_value = "ts,js,md,json,txt")]
        extensions: String,
        /// Switches pacing to a sliding window of this many requests.
        #[arg(long)]
        max_requests: Option<usize>,
        #[arg(long, default_value_t = 60_000)]
        interval_ms: u64,
    },
    /// Print the documents the semantic service holds.
    Inspect,
    /// Run the stages listed in a YAML file.
    Run {
        #[arg(long, default_value = "ctxbench.yaml")]
        config: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Pattern,
    Semantic,
}

impl Backend {
    pub fn tool(self) -> ToolKind {
        match self {
            Backend::Pattern => ToolKind::Pattern,
            Backend::Semantic => ToolKind::Semantic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_defaults_output_to_none() {
        let cli = Cli::parse_from(["ctxbench", "bench", "--backend", "semantic"]);
        match cli.command {
            Command::Bench {
                backend,
                queries,
                output,
                ..
            } => {
                assert_eq!(backend, Backend::Semantic);
                assert_eq!(queries, "queries.json");
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["ctxbench", "inspect", "--verbose"]);
        assert!(cli.verbose);
    }
}

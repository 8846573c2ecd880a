use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use repograph::{Commands, Container, ContainerConfig, Router};

#[derive(Parser)]
#[command(name = "repograph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Root holding local clones, laid out as `<root>/<uri>`
    #[arg(long, global = true, default_value = "~/.repograph/repos")]
    repos_dir: String,

    /// Register a repository that may be cloned on demand
    #[arg(long = "repo", global = true, value_name = "URI")]
    repos: Vec<String>,

    /// Remote URL template for background clones; `{uri}` is substituted
    #[arg(long, global = true, default_value = "https://{uri}")]
    clone_url: String,

    /// External code-intelligence endpoint
    #[arg(long, global = true, env = "REPOGRAPH_CODE_INTEL_URL")]
    code_intel_url: Option<String>,

    #[arg(long, global = true, default_value = "2000")]
    code_intel_timeout_ms: u64,

    /// Per-query deadline; pending fields are cancelled when it expires
    #[arg(long, global = true)]
    query_timeout_ms: Option<u64>,

    #[arg(long, global = true, default_value = "30")]
    revision_cache_ttl_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ContainerConfig {
        repos_dir: expand_tilde(&cli.repos_dir),
        repositories: cli.repos,
        clone_url: cli.clone_url,
        code_intel_url: cli.code_intel_url,
        code_intel_timeout: Duration::from_millis(cli.code_intel_timeout_ms),
        query_timeout: cli.query_timeout_ms.map(Duration::from_millis),
        revision_cache_ttl: Duration::from_secs(cli.revision_cache_ttl_secs),
    };

    let container = Container::new(config)?;
    let router = Router::new(&container);
    let output = router.route(cli.command).await?;
    println!("{}", output);

    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn repo_flag_is_repeatable() {
        let cli = Cli::try_parse_from([
            "repograph",
            "--repo",
            "github.com/a/b",
            "--repo",
            "github.com/c/d",
            "schema",
        ])
        .unwrap();
        assert_eq!(cli.repos, vec!["github.com/a/b", "github.com/c/d"]);
        assert_eq!(cli.clone_url, "https://{uri}");
        assert_eq!(cli.code_intel_timeout_ms, 2000);
        assert!(cli.query_timeout_ms.is_none());
    }

    #[test]
    fn query_command_takes_variables_and_operation() {
        let cli = Cli::try_parse_from([
            "repograph",
            "query",
            "{ root { remoteRepositories { uri } } }",
            "--variables",
            "{}",
            "--operation",
            "Q",
        ])
        .unwrap();
        match cli.command {
            Commands::Query {
                variables,
                operation,
                ..
            } => {
                assert_eq!(variables.as_deref(), Some("{}"));
                assert_eq!(operation.as_deref(), Some("Q"));
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn mutation_style_commands_are_absent() {
        assert!(Cli::try_parse_from(["repograph", "index", "."]).is_err());
    }
}

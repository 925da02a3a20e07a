//! RECALL CLI
//!
//! Command-line interface for the RECALL memoization engine.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recall_cache::{Computation, EngineConfig, MemoEngine, TracingReporter, Ttl};
use recall_store::FileStore;

/// Largest Fibonacci index whose value fits in a u64.
const MAX_FIB_INDEX: u64 = 93;

/// RECALL - Two-tier memoization engine
#[derive(Parser)]
#[command(name = "recall")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a Fibonacci number through the engine
    Fib {
        /// Index of the Fibonacci number
        #[arg(value_parser = clap::value_parser!(u64).range(..=MAX_FIB_INDEX))]
        n: u64,
        /// Lifetime of results: "ephemeral" or seconds
        #[arg(short, long, default_value = "ephemeral")]
        ttl: Ttl,
        /// Directory of the durable file store
        #[arg(short, long, env = "RECALL_STORE_DIR")]
        store: Option<PathBuf>,
        /// Number of rounds to run
        #[arg(short, long, default_value = "2")]
        repeat: usize,
    },

    /// List entries in a file store
    Entries {
        /// Directory of the durable file store
        #[arg(short, long, env = "RECALL_STORE_DIR")]
        store: PathBuf,
    },

    /// Remove expired entries from a file store
    Purge {
        /// Directory of the durable file store
        #[arg(short, long, env = "RECALL_STORE_DIR")]
        store: PathBuf,
    },

    /// Remove every entry from a file store
    Clear {
        /// Directory of the durable file store
        #[arg(short, long, env = "RECALL_STORE_DIR")]
        store: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "recall=debug,info"
    } else {
        "recall=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Fib { n, ttl, store, repeat } => cmd_fib(n, ttl, store.as_deref(), repeat),
        Commands::Entries { store } => cmd_entries(&store),
        Commands::Purge { store } => cmd_purge(&store),
        Commands::Clear { store } => cmd_clear(&store),
    }
}

/// Memoized Fibonacci: every index is its own cache entry.
fn fib(engine: &MemoEngine, n: u64, ttl: Ttl) -> Result<u64, Infallible> {
    let computation = Computation::capturing(&n, move || -> Result<u64, Infallible> {
        if n < 2 {
            return Ok(n);
        }
        Ok(fib(engine, n - 1, ttl)? + fib(engine, n - 2, ttl)?)
    })
    .named("fib");

    engine.cache(computation, None, ttl)
}

fn open_store(dir: &Path) -> Result<FileStore> {
    FileStore::open(dir).with_context(|| format!("Failed to open store at {}", dir.display()))
}

/// Run the Fibonacci workload
fn cmd_fib(n: u64, ttl: Ttl, store: Option<&Path>, repeat: usize) -> Result<()> {
    println!("{} fib({}) with ttl {}", "🧮 Computing".cyan().bold(), n, ttl);

    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let mut engine = MemoEngine::with_config(config).with_reporter(Arc::new(TracingReporter));
    if let Some(dir) = store {
        engine = engine.with_durable(Arc::new(open_store(dir)?));
        println!("   {} {}", "Durable store:".dimmed(), dir.display());
    }
    debug!(?engine, "Engine ready");

    for round in 1..=repeat.max(1) {
        let start = Instant::now();
        let value = match fib(&engine, n, ttl) {
            Ok(value) => value,
            Err(never) => match never {},
        };
        let elapsed = start.elapsed();

        let stats = engine.transient_stats();
        println!(
            "\n{} {}",
            format!("Round {}:", round).yellow().bold(),
            value.to_string().green()
        );
        println!("   {} {:?}", "Elapsed:".dimmed(), elapsed);
        println!(
            "   {} {} entries, {} hits",
            "Transient:".dimmed(),
            stats.entries,
            stats.total_hits
        );
    }

    Ok(())
}

/// List stored entries
fn cmd_entries(dir: &Path) -> Result<()> {
    let store = open_store(dir)?;
    let entries = store.entries().context("Failed to read store")?;

    println!("{} {} entries in {}", "📦".cyan(), entries.len(), dir.display());

    let now = Utc::now();
    for entry in entries {
        let status = if entry.is_expired() {
            "expired".red()
        } else {
            let remaining = (entry.expires_at - now).num_seconds();
            format!("{}s left", remaining).green()
        };
        println!(
            "   {} {} ({} bytes)",
            entry.key.as_str().bold(),
            status,
            entry.value.len()
        );
    }

    Ok(())
}

/// Remove expired entries
fn cmd_purge(dir: &Path) -> Result<()> {
    let store = open_store(dir)?;
    let removed = store.cleanup_expired().context("Failed to purge store")?;
    println!("{} Removed {} expired entries", "🧹".cyan(), removed);
    Ok(())
}

/// Remove every entry
fn cmd_clear(dir: &Path) -> Result<()> {
    use recall_store::DurableCache;

    let store = open_store(dir)?;
    store.clear().context("Failed to clear store")?;
    println!("{} Cleared {}", "✅".green(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fib_values() {
        let engine = MemoEngine::new();
        assert_eq!(fib(&engine, 0, Ttl::Ephemeral), Ok(0));
        assert_eq!(fib(&engine, 1, Ttl::Ephemeral), Ok(1));
        assert_eq!(fib(&engine, 10, Ttl::Ephemeral), Ok(55));
        assert_eq!(fib(&engine, MAX_FIB_INDEX, Ttl::Ephemeral), Ok(12_200_160_415_121_876_738));
    }

    #[test]
    fn test_fib_memoizes_each_index() {
        let engine = MemoEngine::new();
        fib(&engine, 30, Ttl::Ephemeral).unwrap();
        let stats = engine.transient_stats();
        assert_eq!(stats.entries, 31);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_cli_parses_ttl() {
        let cli = Cli::try_parse_from(["recall", "fib", "20", "--ttl", "60"]).unwrap();
        match cli.command {
            Commands::Fib { n, ttl, repeat, .. } => {
                assert_eq!(n, 20);
                assert_eq!(ttl, Ttl::Seconds(60));
                assert_eq!(repeat, 2);
            }
            _ => panic!("expected fib"),
        }

        assert!(Cli::try_parse_from(["recall", "fib", "94"]).is_err());
        assert!(Cli::try_parse_from(["recall", "fib", "5", "--ttl", "never"]).is_err());
    }
}

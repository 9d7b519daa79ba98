use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Track progress through the watch order.
#[derive(Parser)]
#[command(name = "holocron", version)]
#[command(about = "Watch-order progress tracker", long_about = None)]
pub struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this database file instead of the platform data dir
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Overall progress
    Status,
    /// List titles in watch order
    List {
        /// Case-insensitive title filter
        #[arg(short, long)]
        query: Option<String>,
        /// Only titles not yet complete
        #[arg(short, long)]
        remaining: bool,
    },
    /// The first title not yet complete
    Next,
    /// Toggle a movie or a whole series
    Check {
        /// Title id, e.g. `andor-2022`
        slug: String,
    },
    /// Toggle one episode of a resolved series
    Episode {
        slug: String,
        season: u32,
        episode: u32,
    },
    /// Show the episode guide of a series
    Episodes { slug: String },
    /// Mark every episode of a series watched (or unwatched)
    MarkAll {
        slug: String,
        #[arg(long)]
        unwatch: bool,
    },
    /// Look up metadata for one title, or every unresolved title
    Resolve {
        slug: Option<String>,
        #[arg(long, conflicts_with = "slug")]
        all: bool,
    },
    /// Re-fetch series metadata that has gone stale
    Refresh,
    /// Write progress as JSON
    Export {
        /// File to write; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace progress with an exported JSON file
    Import { path: PathBuf },
    /// Delete all progress
    Reset {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

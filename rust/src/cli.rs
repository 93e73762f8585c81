use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::HistoryError;
use crate::record_filter::RecordFilter;

/// Command line toolkit for managing images at https://sm.ms
#[derive(Debug, Parser)]
#[command(name = "smms", author, version, about, long_about = None)]
pub struct Cli {
    /// TOML settings file (defaults to <config dir>/smms/config.toml)
    #[arg(long, global = true, env = "SMMS_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Local history file (defaults to ~/.sm.ms.history)
    #[arg(long, global = true, env = "SMMS_HISTORY", value_name = "PATH")]
    pub history: Option<PathBuf>,

    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload images & insert new records into local history
    #[command(visible_alias = "u")]
    Upload {
        /// Image paths, shell-style wildcards supported
        #[arg(required = true)]
        images: Vec<String>,

        /// Comment stored with every uploaded image
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Search for matched records in local history
    #[command(visible_alias = "s")]
    Search(FilterArgs),

    /// Delete images from remote server & clean local history
    #[command(visible_alias = "d")]
    Delete {
        #[command(flatten)]
        filter: FilterArgs,

        /// Delete without confirmation
        #[arg(short, long)]
        yes: bool,

        /// Choose a single record from the matches by index
        #[arg(short, long)]
        pick: bool,
    },

    /// Migrate local history written by releases before 1.0.0
    Migrate,

    /// Clear the upload history kept by the server for this client
    Clear,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Wildcard statements for matching filenames
    pub filenames: Vec<String>,

    /// Wildcard statement for matching comments
    #[arg(short, long)]
    pub comment: Option<String>,

    /// One or more dates like "yyyy-mm-dd" to narrow the search scope
    #[arg(short, long = "date", value_name = "YYYY-MM-DD")]
    pub dates: Vec<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<RecordFilter, HistoryError> {
        RecordFilter::new(&self.filenames, self.comment.as_deref(), &self.dates)
    }
}

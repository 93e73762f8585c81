use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};
use std::io::{self, Write};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::commands::{self, DeleteOptions, Prompter};
use crate::config_store::ConfigStore;
use crate::history_store::HistoryStore;
use crate::image_host::SmmsClient;
use crate::path_utils::{expand_image_patterns, resolve_config_path, resolve_history_path};

struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
    }

    fn input(&mut self, prompt: &str) -> Result<String> {
        Ok(Input::<String>::new().with_prompt(prompt).interact_text()?)
    }
}

/// Runs one command to completion. Every fatal condition comes back as an
/// error; deciding the exit code is left to the binary.
pub fn run(cli: Cli) -> Result<()> {
    let config = ConfigStore::load(resolve_config_path(cli.config))?;
    debug!(config = ?config.path, "configuration loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Upload { images, comment } => {
            let images = expand_image_patterns(images.as_slice())?;
            let comment = comment.unwrap_or_else(|| config.default_comment());
            let mut store = open_history(cli.history, &config)?;
            let host = build_host(&config)?;
            let summary = commands::upload(&mut store, &host, &images, &comment, &mut out)?;
            debug!(?summary, "upload finished");
        }
        Command::Search(filter) => {
            let filter = filter.to_filter()?;
            let store = open_history(cli.history, &config)?;
            commands::search(&store, &filter, &mut out)?;
        }
        Command::Delete { filter, yes, pick } => {
            let filter = filter.to_filter()?;
            let mut store = open_history(cli.history, &config)?;
            let host = build_host(&config)?;
            let options = DeleteOptions {
                confirm: !yes && config.confirm_delete(),
                pick,
            };
            let summary = commands::delete(
                &mut store,
                &host,
                &filter,
                options,
                &mut TerminalPrompter,
                &mut out,
            )?;
            debug!(?summary, "delete finished");
        }
        Command::Migrate => {
            let mut store = open_history(cli.history, &config)?;
            commands::migrate(&mut store, &mut out)?;
        }
        Command::Clear => {
            let host = build_host(&config)?;
            commands::clear(&host, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn open_history(raw: Option<std::path::PathBuf>, config: &ConfigStore) -> Result<HistoryStore> {
    let path = resolve_history_path(raw, config)?;
    Ok(HistoryStore::load(path)?)
}

fn build_host(config: &ConfigStore) -> Result<SmmsClient> {
    SmmsClient::from_config(config).context("failed to build HTTP client")
}

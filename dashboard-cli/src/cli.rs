use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use dashboard_core::{
    Config, Dashboard, DataSource, DatasetController, DatasetId, FetchOutcome, Orchestrator,
    Snapshot, TriggerMode,
    source::{stock_source_from_config, weather_source_from_config},
};
use inquire::{Confirm, CustomType, InquireError, Select, Text};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "dashboard", version, about = "Weather and stock dashboard")]
pub struct Cli {
    /// Use this config file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively edit backend URLs, trigger modes and timeouts.
    Configure,

    /// Print where the config file lives.
    ConfigPath,

    /// Show current weather for a location.
    Weather {
        /// Location name, e.g. "Paris".
        location: String,

        /// Override the configured weather backend for this run.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Show the daily closing prices for a ticker symbol.
    Stock {
        /// Ticker symbol, e.g. "IBM".
        symbol: String,

        /// Override the configured stock backend for this run.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Keep a dataset open and re-query it as you type.
    Watch {
        /// "weather" or "stock".
        dataset: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => Config::config_file_path()?,
        };
        let mut config = Config::load_from(&config_path)?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");

        match self.command {
            Command::Configure => {
                configure(&mut config)?;
                config.save_to(&config_path)?;
                println!("Saved configuration to {}", config_path.display());
            }
            Command::ConfigPath => {
                println!("{}", config_path.display());
            }
            Command::Weather { location, base_url } => {
                if let Some(url) = base_url {
                    config.upsert_base_url(DatasetId::Weather, url);
                }

                let source = weather_source_from_config(&config)?;
                let orch = Orchestrator::new(source, config.request_timeout());
                one_shot(&orch, &location).await?;
                render::weather(&orch.snapshot(), &config.icon_base_url);
            }
            Command::Stock { symbol, base_url } => {
                if let Some(url) = base_url {
                    config.upsert_base_url(DatasetId::Stock, url);
                }

                let source = stock_source_from_config(&config)?;
                let orch = Orchestrator::new(source, config.request_timeout());
                one_shot(&orch, &symbol).await?;
                render::stock(&orch.snapshot());
            }
            Command::Watch { dataset } => {
                let id = DatasetId::try_from(dataset.as_str())?;
                let dash = Dashboard::from_config(&config)?;
                let icon_base_url = config.icon_base_url.clone();

                match id {
                    DatasetId::Weather => {
                        watch(&dash.weather, |snap| render::weather(snap, &icon_base_url)).await?
                    }
                    DatasetId::Stock => watch(&dash.stock, render::stock).await?,
                }
            }
        }

        Ok(())
    }
}

async fn one_shot<S: DataSource>(orch: &Orchestrator<S>, parameter: &str) -> anyhow::Result<()> {
    let dataset = orch.source().dataset();

    match orch.fetch(parameter).await {
        FetchOutcome::Skipped => bail!("The {dataset} query must not be empty."),
        FetchOutcome::Failed(err) => {
            let context = format!("Could not fetch {dataset} data for '{}'", parameter.trim());
            Err(anyhow!(err).context(context))
        }
        _ => Ok(()),
    }
}

async fn watch<S, R>(ctl: &DatasetController<S>, render: R) -> anyhow::Result<()>
where
    S: DataSource,
    R: Fn(&Snapshot<S::Output>),
{
    let dataset = ctl.orchestrator().source().dataset();
    println!("Watching {dataset} ({} mode). Press Esc to quit.", ctl.mode());

    if let Some(task) = ctl.start() {
        task.await?;
        show(ctl, &render);
    }

    loop {
        let draft = ctl.query().draft().to_string();
        let prompt = format!("{dataset} query:");

        let input = match Text::new(&prompt).with_initial_value(&draft).prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err).context("Failed to read query"),
        };

        let task = match ctl.mode() {
            TriggerMode::Live => ctl.edit(input),
            TriggerMode::Submit => {
                ctl.edit(input);
                ctl.submit()
            }
        };

        match task {
            Some(task) => {
                task.await?;
                show(ctl, &render);
            }
            None => println!("(blank query ignored)"),
        }
    }

    Ok(())
}

fn show<S, R>(ctl: &DatasetController<S>, render: &R)
where
    S: DataSource,
    R: Fn(&Snapshot<S::Output>),
{
    println!();
    render(&ctl.snapshot());
    println!("[{}]", chrono::Local::now().format("%H:%M:%S"));
}

fn configure(config: &mut Config) -> anyhow::Result<()> {
    for id in DatasetId::all() {
        let current = config.dataset_config(*id);

        let base_url = Text::new(&format!("{id} backend base URL:"))
            .with_initial_value(&current.base_url)
            .prompt()?;

        let modes = vec![TriggerMode::Submit, TriggerMode::Live];
        let start = modes.iter().position(|m| *m == current.mode).unwrap_or(0);
        let mode = Select::new(&format!("{id} trigger mode:"), modes)
            .with_starting_cursor(start)
            .prompt()?;

        let debounce_ms = match mode {
            TriggerMode::Live => {
                let prompt = format!("{id} debounce (ms):");
                let value = CustomType::<u64>::new(&prompt)
                    .with_default(current.debounce_ms)
                    .prompt()?;
                Some(value)
            }
            TriggerMode::Submit => None,
        };

        let overrides = config.dataset_overrides_mut(*id);
        overrides.base_url = Some(base_url.trim().to_string());
        overrides.mode = Some(mode);
        if debounce_ms.is_some() {
            overrides.debounce_ms = debounce_ms;
        }
    }

    config.timeout_secs = CustomType::<u64>::new("Request timeout (seconds):")
        .with_default(config.timeout_secs)
        .prompt()?;

    config.abort_superseded = Confirm::new("Abort in-flight requests when a newer one starts?")
        .with_default(config.abort_superseded)
        .prompt()?;

    Ok(())
}

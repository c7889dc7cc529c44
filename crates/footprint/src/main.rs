//! `footprint` - CLI for the footprint snapshot service
//!
//! This binary runs the HTTP tag store and offers direct store and report
//! commands for operators.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;

use footprint::cli::{
    Cli, Command, ConfigCommand, OutputFormat, ReportCommand, ServeCommand, TagsCommand,
};
use footprint::{init_logging, Config, Dashboard, ReportState};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, serve_cmd),
        Command::Tags(tags_cmd) => handle_tags(&config, tags_cmd),
        Command::Report(report_cmd) => handle_report(&config, report_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind_address = bind;
    }
    if cmd.demo {
        config.store.demo_enabled = true;
    }
    config.validate()?;

    let addr = config.bind_address()?;
    let store = config.open_store()?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(footprint::server::serve(store, addr))?;
    Ok(())
}

fn handle_tags(config: &Config, cmd: TagsCommand) -> anyhow::Result<()> {
    let store = config.open_store()?;
    match cmd {
        TagsCommand::List { json } => {
            let mut tags = store.list_tags();
            tags.sort();
            if json {
                println!("{}", serde_json::to_string_pretty(&tags)?);
            } else if tags.is_empty() {
                println!("No saved tags in {}", store.path().display());
            } else {
                for tag in tags {
                    println!("{tag}");
                }
            }
        }
        TagsCommand::Show { tag } => match store.load(&tag)? {
            Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
            None => bail!("no snapshot saved under '{tag}'"),
        },
        TagsCommand::Save { tag, file } => {
            let payload = read_json(&file)?;
            store.save(&tag, payload)?;
            println!("Saved {} under '{tag}'", file.display());
        }
        TagsCommand::Delete { tag } => {
            store.delete_tag(&tag)?;
            println!("Deleted '{tag}'");
        }
    }
    Ok(())
}

fn handle_report(config: &Config, cmd: ReportCommand) -> anyhow::Result<()> {
    let payload = match (&cmd.tag, &cmd.file) {
        (_, Some(file)) => read_json(file)?,
        (Some(tag), None) => match config.open_store()?.load(tag)? {
            Some(payload) => payload,
            None => bail!("no snapshot saved under '{tag}'"),
        },
        (None, None) => bail!("either a tag or --file is required"),
    };

    let state = ReportState::from_snapshot(payload).context("snapshot has an unexpected shape")?;
    let top_n = cmd.top.unwrap_or(config.report.top_n);
    let dashboard = Dashboard::compute(&state, top_n);

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
        OutputFormat::Table => print_dashboard(&state, &dashboard),
    }
    Ok(())
}

fn print_dashboard(state: &ReportState, dashboard: &Dashboard) {
    let info = &state.general_info;
    let organisation = if info.organisation_name.is_empty() {
        "(unnamed organisation)"
    } else {
        &info.organisation_name
    };

    println!("{organisation}");
    println!("{}", "=".repeat(organisation.chars().count()));
    if !info.start_date.is_empty() || !info.end_date.is_empty() {
        println!("Period:   {} to {}", info.start_date, info.end_date);
    }
    println!();
    println!("[Totals] (kg CO2e)");
    println!("  Scope 1:  {:>14.2}", dashboard.totals.scope1);
    println!("  Scope 2:  {:>14.2}", dashboard.totals.scope2);
    println!("  Scope 3:  {:>14.2}", dashboard.totals.scope3);
    println!("  Overall:  {:>14.2}", dashboard.totals.overall);

    if !dashboard.by_source.is_empty() {
        println!();
        println!("[Top sources]");
        for source in &dashboard.by_source {
            println!("  {:<32} {:>14.2}", source.name, source.emissions);
        }
    }

    if !dashboard.monthly_trend.is_empty() {
        println!();
        println!("[Monthly trend]");
        for bucket in &dashboard.monthly_trend {
            println!("  {:<32} {:>14.2}", bucket.month, bucket.emissions);
        }
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_address);
                println!();
                println!("[Store]");
                println!("  Store path:         {}", config.store_path().display());
                println!("  Demo enabled:       {}", config.store.demo_enabled);
                match &config.store.demo_seed_path {
                    Some(seed) => println!("  Demo seed:          {}", seed.display()),
                    None => println!("  Demo seed:          (bundled)"),
                }
                println!();
                println!("[Report]");
                println!("  Top sources:        {}", config.report.top_n);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

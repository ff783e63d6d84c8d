use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use filament_cli::{
    cli::{Cli, Commands, RunsCommands},
    commands, config,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level {
        Some(level) => LevelFilter::from(level).to_string(),
        None if cli.verbose => "debug".to_string(),
        None => "info".to_string(),
    };
    let env_filter = format!(
        "filament_cli={0},filament_core={0},filament_sqlite={0},filament_embed={0},filament_pipeline={0}",
        log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    // Load configuration with CLI overrides
    let config = config::CliConfig::load(cli.config, cli.provider, cli.endpoint, cli.model)?;

    match cli.command {
        Commands::Link {
            vault,
            similarity,
            min_links,
            max_links,
            clusters,
            summary_weight,
            batch_size,
            apply,
            delete,
            force,
        } => commands::link::execute(
            &config,
            vault,
            similarity,
            min_links,
            max_links,
            clusters,
            summary_weight,
            batch_size,
            apply,
            delete,
            force,
        ),
        Commands::Tag {
            vault,
            tags_file,
            apply,
            remove,
            batch_size,
            force,
        } => commands::tag::execute(&config, vault, tags_file, apply, remove, batch_size, force),
        Commands::Runs(RunsCommands::List {
            vault,
            tool,
            limit,
            status,
            format,
        }) => commands::runs::list(&config, vault, tool, limit, status, format),
        Commands::Runs(RunsCommands::Prune {
            vault,
            older_than,
            keep_last,
            tool,
            dry_run,
        }) => commands::runs::prune(&config, vault, older_than, keep_last, tool, dry_run),
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use mapping_values::{config::Config, mapping, MappingLookup};
use std::io::{self, Write};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Look up per-video and per-city values in a dashcam mapping CSV"
)]
struct Cli {
    /// JSON or YAML config; a missing file means defaults. Overridden by
    /// MAPPING_PATH, LOG_LEVEL and FOOTAGE_THRESHOLD.
    #[arg(long, env = "MAPPING_CONFIG", default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the record for one segment as JSON.
    Find {
        /// `<video_id>_<start>_<fps>`
        key: String,
    },
    /// Print one cell of the first row matching one or two conditions.
    Value {
        /// Column to read.
        target: String,
        col1: String,
        val1: String,
        /// Optional second column; `unknown` as its value matches null cells.
        #[arg(requires = "val2")]
        col2: Option<String>,
        val2: Option<String>,
    },
    /// Print the seconds of footage for a city.
    Seconds {
        city: String,
        /// `unknown` (any casing) for cities without a state.
        state: String,
    },
    /// Write the mapping without low-footage start/end column pairs to stdout.
    Prune {
        /// Seconds; defaults to `footage_threshold` from the config.
        threshold: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ─── 1) config ───────────────────────────────────────────────────
    let from_file = Config::load_if_exists(&cli.config)?;
    let found = from_file.is_some();
    let config = from_file.unwrap_or_default().with_env_overrides()?;

    // ─── 2) init logging (stderr, stdout carries results) ────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logger_level.as_str()));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    if found {
        info!("loaded config from {}", cli.config);
    } else {
        debug!("no config at {}; using defaults", cli.config);
    }

    // ─── 3) load mapping ─────────────────────────────────────────────
    let table = mapping::load_mapping_csv(&config.mapping)?;
    info!(
        rows = table.num_rows(),
        columns = table.column_names().len(),
        "loaded mapping {}",
        config.mapping.display()
    );
    let lookup = MappingLookup::new(&table);

    // ─── 4) run ──────────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Find { key } => {
            let record = lookup.find_values_with_video_id(&key)?;
            serde_json::to_writer_pretty(&mut out, &record)?;
            writeln!(out)?;
        }
        Command::Value {
            target,
            col1,
            val1,
            col2,
            val2,
        } => {
            let second = col2.as_deref().zip(val2.as_deref());
            let value = lookup.get_value((col1.as_str(), val1.as_str()), second, &target)?;
            serde_json::to_writer(&mut out, &value.flatten())?;
            writeln!(out)?;
        }
        Command::Seconds { city, state } => {
            let total = lookup.calculate_total_seconds_for_city(&city, &state)?;
            writeln!(out, "{}", total)?;
        }
        Command::Prune { threshold } => {
            let threshold = threshold.unwrap_or(config.footage_threshold);
            let pruned = lookup.remove_columns_below_threshold(threshold)?;
            info!(
                dropped = table.column_names().len() - pruned.column_names().len(),
                threshold, "pruned mapping"
            );
            pruned.write_csv(&mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_value_second_condition_is_a_pair() -> Result<()> {
        let cli = Cli::try_parse_from(["mapping-values", "value", "lat", "city", "X"])?;
        assert!(matches!(
            cli.command,
            Command::Value { col2: None, val2: None, .. }
        ));

        let cli = Cli::try_parse_from([
            "mapping-values", "value", "lat", "city", "X", "state", "unknown",
        ])?;
        match cli.command {
            Command::Value { col2, val2, .. } => {
                assert_eq!(col2.as_deref(), Some("state"));
                assert_eq!(val2.as_deref(), Some("unknown"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(Cli::try_parse_from(["mapping-values", "value", "lat", "city", "X", "state"]).is_err());
        Ok(())
    }

    #[test]
    fn test_prune_threshold_is_optional() -> Result<()> {
        let cli = Cli::try_parse_from(["mapping-values", "prune"])?;
        assert!(matches!(cli.command, Command::Prune { threshold: None }));
        let cli = Cli::try_parse_from(["mapping-values", "prune", "600"])?;
        assert!(matches!(cli.command, Command::Prune { threshold: Some(600) }));
        assert!(Cli::try_parse_from(["mapping-values", "prune", "lots"]).is_err());
        assert!(Cli::try_parse_from(["mapping-values", "find"]).is_err());
        Ok(())
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use season_standings::standings::{category_display, season_display, DisplayTable};
use season_standings::{
    list_seasons, load_config, race_output_path, read_standings, run_race, run_season,
    write_default_config, AppConfig, Category, DecisionProvider, KeepSeparateDecisions,
    OrisClient, PromptDecisions, RecordedDecisions, SeasonPaths, DEFAULT_CONFIG_FILE,
};

/// Season standings for orienteering cups
#[derive(Parser, Debug)]
#[command(name = "season-standings")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, env = "SEASON_STANDINGS_CONFIG")]
    config: PathBuf,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one race from ORIS, score it and store its race file
    Race {
        race_id: u32,

        /// Store into this season's results directory
        #[arg(short, long)]
        season: Option<String>,

        /// Store into this directory instead
        #[arg(short, long, conflicts_with = "season")]
        output_dir: Option<PathBuf>,
    },

    /// List seasons, or the races and standings of one season
    List { season: Option<String> },

    /// Recompute the season standings of every category
    Overall {
        season: String,

        /// Never prompt: groups the rules can't settle stay separate
        #[arg(long)]
        batch: bool,

        /// Decision log to replay (and, when interactive, record) manual
        /// decisions in; defaults to the season's decisions.json
        #[arg(long)]
        decisions: Option<PathBuf>,
    },

    /// Print computed standings
    Show {
        season: String,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Write a commented default configuration file
    InitConfig,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("season_standings=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("season_standings=info"))
    };

    // Logs on stderr; stdout carries prompts and tables
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::InitConfig = cli.command {
        write_default_config(&cli.config)?;
        println!("✓ Wrote default configuration to {}", cli.config.display());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Race {
            race_id,
            season,
            output_dir,
        } => run_race_command(&config, race_id, season.as_deref(), output_dir),
        Command::List { season } => run_list(&config, season.as_deref()),
        Command::Overall {
            season,
            batch,
            decisions,
        } => run_overall(&config, &season, batch, decisions),
        Command::Show { season, category } => run_show(&config, &season, category.as_deref()),
        Command::InitConfig => Ok(()),
    }
}

fn run_race_command(
    config: &AppConfig,
    race_id: u32,
    season: Option<&str>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let output = race_output_path(config, race_id, season, output_dir.as_deref());
    let registry = OrisClient::new(&config.registry)?;

    let (metadata, rows) = run_race(config, &registry, race_id, &output)
        .with_context(|| format!("Race {} was not processed", race_id))?;

    println!("🏁 {} ({} results)", metadata.name, rows.len());
    println!("✓ Exported to {}", output.display());
    Ok(())
}

fn run_list(config: &AppConfig, season: Option<&str>) -> Result<()> {
    let Some(season) = season else {
        for season in list_seasons(&config.data_dir)? {
            println!("{}", season);
        }
        return Ok(());
    };

    let paths = SeasonPaths::new(&config.data_dir, season);
    println!("📂 Season {}", paths.season());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let races = paths.list_race_files();
    println!("Races: {}", races.len());
    for (id, path) in &races {
        println!("  {:>6}  {}", id, path.display());
    }

    println!("Standings:");
    for category in &config.categories {
        let path = paths.standings_file(category);
        if !path.exists() {
            println!("  ✗ {:<8} {}", category.code(), category.name());
            continue;
        }

        let summary = read_standings(&path, category.clone())?.summary();
        let leader = match (&summary.leader, summary.leader_points) {
            (Some(name), Some(points)) => format!(", leader {} ({} pts)", name, points),
            _ => String::new(),
        };
        println!(
            "  ✓ {:<8} {} - {} runners, best {} of {} races{}",
            summary.category,
            category.name(),
            summary.runners,
            summary.races_to_count,
            summary.races,
            leader
        );
    }
    Ok(())
}

fn run_overall(
    config: &AppConfig,
    season: &str,
    batch: bool,
    decisions: Option<PathBuf>,
) -> Result<()> {
    let base: Box<dyn DecisionProvider> = if batch {
        Box::new(KeepSeparateDecisions)
    } else {
        Box::new(PromptDecisions::new(io::stdin().lock(), io::stdout()))
    };

    // Batch runs replay earlier answers but never record their own
    let log = decisions.unwrap_or_else(|| SeasonPaths::new(&config.data_dir, season).decisions_file());
    let mut provider = if batch {
        info!("Replaying decisions from {}", log.display());
        RecordedDecisions::replay(&log, base)?
    } else {
        info!("Using decision log {}", log.display());
        RecordedDecisions::open(&log, base)?
    };

    let run = run_season(config, season, &mut provider)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for report in &run.reports {
        println!("✓ {}", report.summary());
    }
    for path in &run.written {
        println!("💾 {}", path.display());
    }
    println!("🎉 {}", run.summary());
    Ok(())
}

fn print_table(table: &DisplayTable) {
    println!(
        "\n🏆 {} ({}) - best {} of {} races",
        table.category_name,
        table.category,
        table.races_to_count,
        table.races.len()
    );

    let name_width = table
        .rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    print!("{:>5}  {:<name_width$}  {:<8}", "#", "Name", "RegNo");
    for race in &table.races {
        print!("  {:>12}", race);
    }
    println!("  {:>8}", "Total");

    for row in &table.rows {
        print!("{:>5}  {:<name_width$}  {:<8}", row.place, row.name, row.reg_no);
        for cell in &row.results {
            print!("  {:>12}", format!("{} {}", cell.place, cell.points));
        }
        println!("  {:>8}", row.best_n);
    }
}

fn run_show(config: &AppConfig, season: &str, category: Option<&str>) -> Result<()> {
    let tables = match category {
        Some(code) => category_display(config, season, &Category::from_code(code))?
            .into_iter()
            .collect(),
        None => season_display(config, season)?,
    };

    if tables.is_empty() {
        println!("No standings computed for season {} yet", season);
        println!("   Run: season-standings overall {}", season);
        return Ok(());
    }

    for table in &tables {
        print_table(table);
    }
    Ok(())
}

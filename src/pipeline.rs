// 🔄 Season Pipeline - race files → collate → reconcile → rank → standings
//
// Each run is independent: everything is recomputed from the race files of
// the season, nothing is cached between runs.

use crate::config::AppConfig;
use crate::decisions::DecisionProvider;
use crate::error::Result as SeasonResult;
use crate::race::{ingest_race, load_known_unregistered, load_season_races, Race, RaceRow};
use crate::ranking::{rank_table, RankedTable};
use crate::reconcile::{reconcile_table, ReconciliationReport};
use crate::registry::{RaceMetadata, RaceRegistry};
use crate::season::collate;
use crate::standings::write_standings;
use crate::storage::SeasonPaths;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// SEASON RUN
// ============================================================================

#[derive(Debug, Clone)]
pub struct SeasonRun {
    pub season: String,
    pub races: Vec<u32>,
    pub reports: Vec<ReconciliationReport>,
    pub tables: Vec<RankedTable>,

    /// Standings files written, one per category
    pub written: Vec<PathBuf>,
}

impl SeasonRun {
    fn empty(season: &str) -> Self {
        SeasonRun {
            season: season.to_string(),
            races: Vec::new(),
            reports: Vec::new(),
            tables: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        let runners: usize = self.tables.iter().map(|t| t.rows.len()).sum();
        let manual: usize = self.reports.iter().map(|r| r.manual_decisions()).sum();
        format!(
            "Season {}: {} races, {} categories, {} runners ranked, {} manual decisions",
            self.season,
            self.races.len(),
            self.tables.len(),
            runners,
            manual
        )
    }
}

/// Collate, reconcile and rank already loaded races. No file access.
pub fn compute_season(
    races: &[Race],
    config: &AppConfig,
    provider: &mut dyn DecisionProvider,
) -> SeasonResult<(Vec<RankedTable>, Vec<ReconciliationReport>)> {
    let current_year = config.current_year();
    let tables = collate(races, &config.categories);

    let mut ranked = Vec::with_capacity(tables.len());
    let mut reports = Vec::with_capacity(tables.len());
    for table in tables {
        let (table, report) = reconcile_table(table, current_year, provider)?;
        ranked.push(rank_table(table));
        reports.push(report);
    }

    Ok((ranked, reports))
}

/// Recompute and write the standings of every configured category
pub fn run_season(
    config: &AppConfig,
    season: &str,
    provider: &mut dyn DecisionProvider,
) -> Result<SeasonRun> {
    let paths = SeasonPaths::new(&config.data_dir, season);
    let races = load_season_races(&paths);
    if races.is_empty() {
        warn!("No event results found for season '{}', nothing to compute", season);
        return Ok(SeasonRun::empty(season));
    }

    info!("Computing season {} from {} races", season, races.len());
    let (tables, reports) = compute_season(&races, config, provider)
        .with_context(|| format!("Failed to compute standings of season {}", season))?;

    let mut written = Vec::with_capacity(tables.len());
    for table in &tables {
        let path = paths.standings_file(&table.category);
        write_standings(&path, table)?;
        info!(
            "Category {}: {} runners, best {} of {} races → {}",
            table.category,
            table.rows.len(),
            table.races_to_count,
            table.races.len(),
            path.display()
        );
        written.push(path);
    }

    let run = SeasonRun {
        season: season.to_string(),
        races: races.iter().map(|r| r.id).collect(),
        reports,
        tables,
        written,
    };
    info!("{}", run.summary());
    Ok(run)
}

// ============================================================================
// SINGLE RACE
// ============================================================================

/// Where a race file goes: the season's results directory, or an explicit
/// directory
pub fn race_output_path(
    config: &AppConfig,
    race_id: u32,
    season: Option<&str>,
    dir: Option<&Path>,
) -> PathBuf {
    match (season, dir) {
        (_, Some(dir)) => dir.join(format!("points_{}.csv", race_id)),
        (Some(season), None) => SeasonPaths::new(&config.data_dir, season).race_file(race_id),
        (None, None) => PathBuf::from(format!("points_{}.csv", race_id)),
    }
}

/// Fetch, ingest and store one race
pub fn run_race(
    config: &AppConfig,
    registry: &dyn RaceRegistry,
    race_id: u32,
    output: &Path,
) -> Result<(RaceMetadata, Vec<RaceRow>)> {
    let known = load_known_unregistered(&config.known_unregistered)?;
    ingest_race(registry, race_id, config, &known, output)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::{KeepSeparateDecisions, ScriptedDecisions};
    use crate::entities::Category;
    use crate::race::{read_race_file, write_race_file};
    use crate::registry::RawRaceRow;
    use crate::standings::read_standings;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            known_unregistered: dir.join("known_unregs.json"),
            reference_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            ..AppConfig::default()
        }
    }

    fn raw(class: &str, place: &str, name: &str, reg_no: &str) -> RawRaceRow {
        RawRaceRow {
            id: Some("1".to_string()),
            class_desc: Some(class.to_string()),
            place: Some(place.to_string()),
            name: Some(name.to_string()),
            reg_no: Some(reg_no.to_string()),
            user_id: None,
            time: None,
        }
    }

    fn store_race(config: &AppConfig, season: &str, id: u32, rows: &[RawRaceRow]) {
        let path = SeasonPaths::new(&config.data_dir, season).race_file(id);
        let rows = crate::race::prepare_race(rows, config, &[]);
        write_race_file(&path, &rows).unwrap();
    }

    struct StaticRegistry;

    impl RaceRegistry for StaticRegistry {
        fn event(&self, _race_id: u32) -> SeasonResult<RaceMetadata> {
            Ok(RaceMetadata {
                name: "Autumn Middle".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 10, 5),
            })
        }

        fn results(&self, _race_id: u32) -> SeasonResult<Vec<RawRaceRow>> {
            Ok(vec![
                raw("H", "1.", "Jan Novák", "ABM8001"),
                raw("ZV", "1.", "Old Runner", "ABM6001"),
                raw("ZV", "2.", "Young Runner", "ABM1201"),
            ])
        }
    }

    #[test]
    fn test_full_season() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());

        store_race(&config, "2024-2025", 102, &[
            raw("H", "1.", "Petr Kos", "ABM8502"),
            raw("H", "2.", "jan novak", "nereg."),
        ]);
        store_race(&config, "2024-2025", 101, &[
            raw("H", "1.", "Jan Novák", "ABM8001"),
            raw("H", "2.", "Petr Kos", "ABM8502"),
            raw("D", "1.", "Eva Malá", "ABZ9051"),
        ]);

        let run = run_season(&config, "2024-2025", &mut KeepSeparateDecisions).unwrap();

        assert_eq!(run.races, vec![101, 102]);
        assert_eq!(run.tables.len(), config.categories.len());

        let men = read_standings(&run.written[0], Category::Men).unwrap();
        assert_eq!(men.races, vec![101, 102]);
        assert_eq!(men.races_to_count, 2);

        // "jan novak" without a registration merged into Jan Novák
        assert_eq!(men.rows.len(), 2);
        let jan = men.rows.iter().find(|r| r.row.name == "Jan Novák").unwrap();
        assert_eq!(jan.best_n, 390);
        let petr = men.rows.iter().find(|r| r.row.name == "Petr Kos").unwrap();
        assert_eq!(petr.best_n, 390);
        assert_eq!((jan.place, petr.place), (1, 1));

        println!("✅ {}", run.summary());
    }

    #[test]
    fn test_empty_season() {
        let dir = TempDir::new().unwrap();
        let run = run_season(&config(dir.path()), "2030-2031", &mut KeepSeparateDecisions).unwrap();
        assert!(run.tables.is_empty());
        assert!(run.written.is_empty());
    }

    #[test]
    fn test_unresolved_group_without_answers_fails() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        store_race(&config, "2024-2025", 1, &[raw("H", "1.", "Jan Novák", "ABM8001")]);
        store_race(&config, "2024-2025", 2, &[raw("H", "1.", "Jan Novák", "XYZ8002")]);

        let err = run_season(&config, "2024-2025", &mut ScriptedDecisions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("jan novak"));
    }

    #[test]
    fn test_run_race_writes_race_file() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let output = race_output_path(&config, 4021, Some("2024-2025"), None);

        let (metadata, rows) = run_race(&config, &StaticRegistry, 4021, &output).unwrap();
        assert_eq!(metadata.name, "Autumn Middle");
        assert_eq!(rows.len(), 3);

        let stored = read_race_file(&output).unwrap();
        assert_eq!(stored, rows);
        assert!(stored.iter().any(|r| r.category == Category::Youth));
        assert!(stored.iter().any(|r| r.category == Category::Veteran));
    }

    #[test]
    fn test_race_output_path() {
        let config = AppConfig {
            data_dir: PathBuf::from("data"),
            ..AppConfig::default()
        };
        assert_eq!(
            race_output_path(&config, 7, Some("2024-2025"), None),
            PathBuf::from("data/2024-2025/results/points_7.csv")
        );
        assert_eq!(
            race_output_path(&config, 7, None, Some(Path::new("out"))),
            PathBuf::from("out/points_7.csv")
        );
        assert_eq!(race_output_path(&config, 7, None, None), PathBuf::from("points_7.csv"));
    }
}

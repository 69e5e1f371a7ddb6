// 🏁 Race Ingestor - one race's results, cleaned and scored
//
// raw registry rows → normalize → split composite category by age → score
//
// The composite youth + veteran bracket is run as one race category but
// ranked as separate season categories, so it is split here using the birth
// year encoded in each runner's registration code.

use crate::config::{AgeCutoffs, AgeSplitConfig, AppConfig};
use crate::entities::{Category, IdentityCode};
use crate::registry::{RaceMetadata, RaceRegistry, RawRaceRow};
use crate::scoring::{points, Placement};
use crate::storage::SeasonPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// RACE ROW
// ============================================================================

/// One runner's result in one race, as stored in `points_<id>.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRow {
    #[serde(rename = "ClassDesc")]
    pub category: Category,

    #[serde(rename = "Place")]
    pub place: Placement,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "RegNo", default)]
    pub reg_no: IdentityCode,

    /// Registry user id
    #[serde(rename = "UserID", default)]
    pub user_id: Option<String>,

    #[serde(rename = "Time", default)]
    pub time: Option<String>,

    #[serde(rename = "Points", default)]
    pub points: u32,
}

impl RaceRow {
    /// Clean a raw registry row: blanks are absent, a missing place means
    /// DISK, a missing registration means "nereg."
    pub fn from_raw(raw: &RawRaceRow) -> Self {
        let place = match non_blank(&raw.place) {
            None => Placement::Disqualified,
            Some(p) => Placement::parse(&p).unwrap_or_else(|e| {
                warn!("{} (runner '{}'), treating as DISK", e, raw.name.as_deref().unwrap_or(""));
                Placement::Disqualified
            }),
        };

        RaceRow {
            category: Category::from_code(&non_blank(&raw.class_desc).unwrap_or_default()),
            place,
            name: non_blank(&raw.name).unwrap_or_default(),
            reg_no: non_blank(&raw.reg_no)
                .map(|code| IdentityCode::new(&code))
                .unwrap_or_default(),
            user_id: non_blank(&raw.user_id),
            time: non_blank(&raw.time),
            points: 0,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// One race of the season
#[derive(Debug, Clone)]
pub struct Race {
    pub id: u32,
    pub rows: Vec<RaceRow>,
}

// ============================================================================
// KNOWN UNREGISTERED RUNNERS
// ============================================================================

/// Runner without a registration whose birth year is known anyway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownUnregistered {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(default)]
    pub yob: Option<i32>,

    #[serde(rename = "RegNo", default)]
    pub reg_no: Option<String>,
}

/// Load the known-unregistered list. A missing file means an empty list.
pub fn load_known_unregistered(path: &Path) -> Result<Vec<KnownUnregistered>> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse known unregistered runners: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "File '{}' not found! Assuming no known unregistered runners.",
                path.display()
            );
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

// ============================================================================
// AGE SPLIT
// ============================================================================

/// Split the composite category into youth, veteran and other.
///
/// Non-composite rows are returned first and untouched, followed by youth,
/// veteran and other rows, each in original relative order. Youth and
/// veteran places are re-sequenced from 1; DISK / MS stay as they are.
pub fn split_composite(
    rows: Vec<RaceRow>,
    split: &AgeSplitConfig,
    cutoffs: AgeCutoffs,
    current_year: i32,
    known: &[KnownUnregistered],
) -> Vec<RaceRow> {
    let (mut composite, mut output): (Vec<RaceRow>, Vec<RaceRow>) =
        rows.into_iter().partition(|row| row.category == split.composite);

    let mut birth_years: Vec<Option<i32>> = composite
        .iter()
        .map(|row| row.reg_no.birth_year_lossy(current_year))
        .collect();

    for unreg in known {
        let matching: Vec<usize> = composite
            .iter()
            .enumerate()
            .filter(|(_, row)| row.name.trim() == unreg.name.trim())
            .map(|(i, _)| i)
            .collect();

        // Only an unambiguous name without a known birth year is enriched
        let [index] = matching.as_slice() else {
            continue;
        };
        if birth_years[*index].is_some() {
            continue;
        }

        debug!("Using known birth year for unregistered runner '{}'", unreg.name);
        if let Some(yob) = unreg.yob {
            birth_years[*index] = Some(yob);
        }
        if let Some(code) = &unreg.reg_no {
            composite[*index].reg_no = IdentityCode::new(code);
        }
    }

    let mut youth = Vec::new();
    let mut veteran = Vec::new();
    let mut other = Vec::new();

    for (mut row, birth_year) in composite.into_iter().zip(birth_years) {
        match birth_year {
            Some(year) if year >= cutoffs.youth_min_year => {
                row.category = split.youth.clone();
                youth.push(row);
            }
            Some(year) if year <= cutoffs.veteran_max_year => {
                row.category = split.veteran.clone();
                veteran.push(row);
            }
            _ => {
                row.category = split.other.clone();
                other.push(row);
            }
        }
    }

    resequence(&mut youth);
    resequence(&mut veteran);

    output.extend(youth);
    output.extend(veteran);
    output.extend(other);
    output
}

/// Renumber classified places 1..k in current order
fn resequence(rows: &mut [RaceRow]) {
    let mut place = 0;
    for row in rows.iter_mut().filter(|row| !row.place.is_sentinel()) {
        place += 1;
        row.place = Placement::Ranked(place);
    }
}

/// Assign points from placements
pub fn assign_points(rows: &mut [RaceRow]) {
    for row in rows {
        row.points = points(&row.place);
    }
}

/// Full ingestion of raw rows: normalize, split, score
pub fn prepare_race(
    raw_rows: &[RawRaceRow],
    config: &AppConfig,
    known: &[KnownUnregistered],
) -> Vec<RaceRow> {
    let rows: Vec<RaceRow> = raw_rows.iter().map(RaceRow::from_raw).collect();

    let mut rows = split_composite(
        rows,
        &config.age_split,
        config.age_cutoffs(),
        config.current_year(),
        known,
    );

    assign_points(&mut rows);
    rows
}

// ============================================================================
// RACE FILES
// ============================================================================

pub fn read_race_file(path: &Path) -> Result<Vec<RaceRow>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open race file {}", path.display()))?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RaceRow = result
            .with_context(|| format!("Failed to deserialize race row in {}", path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn write_race_file(path: &Path, rows: &[RaceRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create race file {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    Ok(())
}

/// Every race of the season, in race-id order.
///
/// Unreadable race files are reported and left out; the rest of the season
/// still aggregates.
pub fn load_season_races(paths: &SeasonPaths) -> Vec<Race> {
    paths
        .list_race_files()
        .into_iter()
        .filter_map(|(id, path)| match read_race_file(&path) {
            Ok(rows) => {
                debug!("Loaded race {} ({} rows)", id, rows.len());
                Some(Race { id, rows })
            }
            Err(e) => {
                warn!("Skipping race {}: {:#}", id, e);
                None
            }
        })
        .collect()
}

/// Fetch one race from the registry, ingest it and write its race file
pub fn ingest_race(
    registry: &dyn RaceRegistry,
    race_id: u32,
    config: &AppConfig,
    known: &[KnownUnregistered],
    output: &Path,
) -> Result<(RaceMetadata, Vec<RaceRow>)> {
    let metadata = registry
        .event(race_id)
        .with_context(|| format!("Failed to load event {} from {}", race_id, registry.name()))?;
    info!("Event's name: {}", metadata.name);
    if let Some(date) = metadata.date {
        info!("Event's date: {}", date);
    }

    let raw_rows = registry
        .results(race_id)
        .with_context(|| format!("Failed to load results of {} from {}", race_id, registry.name()))?;

    let rows = prepare_race(&raw_rows, config, known);
    write_race_file(output, &rows)?;

    info!(
        "Event was processed successfully ({} results) and exported to '{}'",
        rows.len(),
        output.display()
    );

    Ok((metadata, rows))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SeasonError;

    fn raw(class: &str, place: &str, name: &str, reg_no: &str) -> RawRaceRow {
        RawRaceRow {
            id: Some(name.to_string()),
            class_desc: Some(class.to_string()),
            place: Some(place.to_string()),
            name: Some(name.to_string()),
            reg_no: Some(reg_no.to_string()),
            user_id: None,
            time: None,
        }
    }

    fn row(class: &str, place: &str, name: &str, reg_no: &str) -> RaceRow {
        RaceRow::from_raw(&raw(class, place, name, reg_no))
    }

    fn cutoffs() -> AgeCutoffs {
        // Reference year 2025, spring
        AgeCutoffs {
            youth_min_year: 2010,
            veteran_max_year: 1974,
        }
    }

    #[test]
    fn test_normalize_blanks() {
        let row = RaceRow::from_raw(&RawRaceRow {
            id: Some("1".to_string()),
            class_desc: Some("H".to_string()),
            place: Some("  ".to_string()),
            name: Some(" Petr ".to_string()),
            reg_no: None,
            user_id: Some("".to_string()),
            time: None,
        });

        assert_eq!(row.place, Placement::Disqualified);
        assert_eq!(row.reg_no, IdentityCode::unregistered());
        assert_eq!(row.user_id, None);
        assert_eq!(row.name, "Petr");
    }

    #[test]
    fn test_age_split_partitions_and_resequences() {
        let rows = vec![
            row("H", "1.", "Adult", "ABM9001"),
            row("ZV", "1.", "Old Fast", "ABM6001"),
            row("ZV", "2.", "Kid Fast", "ABM1201"),
            row("ZV", "3.", "Middle", "ABM9002"),
            row("ZV", "4.", "Kid Slow", "ABM1102"),
            row("ZV", "5.", "Nobody", "nereg."),
            row("ZV", "DISK", "Kid Out", "ABM1303"),
            row("ZV", "6.", "Old Slow", "ABM5502"),
        ];

        let split = split_composite(rows, &AgeSplitConfig::default(), cutoffs(), 2025, &[]);
        assert_eq!(split.len(), 8);

        let of = |category: Category| -> Vec<(String, Placement)> {
            split
                .iter()
                .filter(|r| r.category == category)
                .map(|r| (r.name.clone(), r.place))
                .collect()
        };

        assert_eq!(of(Category::Men), vec![("Adult".to_string(), Placement::Ranked(1))]);
        assert_eq!(
            of(Category::Youth),
            vec![
                ("Kid Fast".to_string(), Placement::Ranked(1)),
                ("Kid Slow".to_string(), Placement::Ranked(2)),
                ("Kid Out".to_string(), Placement::Disqualified),
            ]
        );
        assert_eq!(
            of(Category::Veteran),
            vec![
                ("Old Fast".to_string(), Placement::Ranked(1)),
                ("Old Slow".to_string(), Placement::Ranked(2)),
            ]
        );
        // Unclassified keeps its original places
        assert_eq!(
            of(Category::Unclassified),
            vec![
                ("Middle".to_string(), Placement::Ranked(3)),
                ("Nobody".to_string(), Placement::Ranked(5)),
            ]
        );
        assert!(split.iter().all(|r| r.category != Category::Composite));
    }

    #[test]
    fn test_sentinel_between_classified_rows() {
        let rows = vec![
            row("ZV", "1.", "A", "ABM1201"),
            row("ZV", "MS", "B", "ABM1202"),
            row("ZV", "3.", "C", "ABM1203"),
        ];

        let split = split_composite(rows, &AgeSplitConfig::default(), cutoffs(), 2025, &[]);
        let places: Vec<Placement> = split.iter().map(|r| r.place).collect();
        assert_eq!(
            places,
            vec![Placement::Ranked(1), Placement::MissingStart, Placement::Ranked(2)]
        );
    }

    #[test]
    fn test_known_unregistered_enrichment() {
        let rows = vec![
            row("ZV", "1.", "Known Kid", "nereg."),
            row("ZV", "2.", "Twin", "nereg."),
            row("ZV", "3.", "Twin", "nereg."),
            row("ZV", "4.", "Registered Veteran", "ABM6001"),
        ];
        let known = vec![
            KnownUnregistered {
                name: "Known Kid".to_string(),
                yob: Some(2013),
                reg_no: Some("ABM1399".to_string()),
            },
            KnownUnregistered {
                name: "Twin".to_string(),
                yob: Some(2013),
                reg_no: None,
            },
            // Birth year already known from the code: not overridden
            KnownUnregistered {
                name: "Registered Veteran".to_string(),
                yob: Some(2014),
                reg_no: None,
            },
        ];

        let split = split_composite(rows, &AgeSplitConfig::default(), cutoffs(), 2025, &known);

        let kid = split.iter().find(|r| r.name == "Known Kid").unwrap();
        assert_eq!(kid.category, Category::Youth);
        assert_eq!(kid.reg_no.as_str(), "ABM1399");

        // Ambiguous name stays unclassified
        assert!(split
            .iter()
            .filter(|r| r.name == "Twin")
            .all(|r| r.category == Category::Unclassified));

        let vet = split.iter().find(|r| r.name == "Registered Veteran").unwrap();
        assert_eq!(vet.category, Category::Veteran);
    }

    #[test]
    fn test_known_name_matches_despite_stray_whitespace() {
        let rows = vec![row("ZV", "1.", "Known Kid", "nereg.")];
        let known = vec![KnownUnregistered {
            name: " Known Kid  ".to_string(),
            yob: Some(2012),
            reg_no: None,
        }];

        let split = split_composite(rows, &AgeSplitConfig::default(), cutoffs(), 2025, &known);
        assert_eq!(split[0].category, Category::Youth);
    }

    #[test]
    fn test_load_known_unregistered_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_unregs.json");
        fs::write(
            &path,
            r#"[
                {"Name": "Eva Malá", "yob": 2012, "RegNo": "ABZ1250"},
                {"Name": "Petr Kos", "yob": null}
            ]"#,
        )
        .unwrap();

        let known = load_known_unregistered(&path).unwrap();
        assert_eq!(
            known,
            vec![
                KnownUnregistered {
                    name: "Eva Malá".to_string(),
                    yob: Some(2012),
                    reg_no: Some("ABZ1250".to_string()),
                },
                KnownUnregistered {
                    name: "Petr Kos".to_string(),
                    yob: None,
                    reg_no: None,
                },
            ]
        );

        let broken = dir.path().join("broken.json");
        fs::write(&broken, r#"[{"yob": 2012}]"#).unwrap();
        let err = load_known_unregistered(&broken).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse known unregistered runners"));

        let missing = load_known_unregistered(&dir.path().join("nope.json")).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_malformed_code_is_unclassified() {
        let rows = vec![row("ZV", "1.", "Odd", "ABMXX01")];
        let split = split_composite(rows, &AgeSplitConfig::default(), cutoffs(), 2025, &[]);
        assert_eq!(split[0].category, Category::Unclassified);
    }

    #[test]
    fn test_prepare_race_scores_after_split() {
        let mut config = AppConfig::default();
        config.reference_date = chrono::NaiveDate::from_ymd_opt(2025, 3, 1);

        let raw_rows = vec![
            raw("ZV", "1.", "Old", "ABM6001"),
            raw("ZV", "2.", "Kid", "ABM1201"),
            raw("H", "", "Out", ""),
        ];

        let rows = prepare_race(&raw_rows, &config, &[]);
        let kid = rows.iter().find(|r| r.name == "Kid").unwrap();
        assert_eq!(kid.place, Placement::Ranked(1));
        assert_eq!(kid.points, 200);

        let out = rows.iter().find(|r| r.name == "Out").unwrap();
        assert_eq!(out.points, 0);
        assert!(out.reg_no.is_unregistered());
    }

    #[test]
    fn test_race_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("points_12.csv");

        let mut rows = vec![
            row("H", "1.", "Jiří Novák", "ABM8001"),
            row("D", "DISK", "Eva", ""),
        ];
        rows[0].time = Some("45:10".to_string());
        rows[0].user_id = Some("1234".to_string());
        assign_points(&mut rows);

        write_race_file(&path, &rows).unwrap();
        let loaded = read_race_file(&path).unwrap();

        assert_eq!(loaded, rows);
        assert_eq!(loaded[0].points, 200);
    }

    #[test]
    fn test_load_season_races_skips_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SeasonPaths::new(dir.path(), "24-25");

        write_race_file(&paths.race_file(2), &[row("H", "1.", "A", "ABM8001")]).unwrap();
        fs::write(paths.race_file(1), "ClassDesc,Place\nH,not-a-place\n").unwrap();

        let races = load_season_races(&paths);
        assert_eq!(races.len(), 1);
        assert_eq!(races[0].id, 2);
    }

    struct FailingRegistry;

    impl RaceRegistry for FailingRegistry {
        fn event(&self, _race_id: u32) -> crate::error::Result<RaceMetadata> {
            Err(SeasonError::Registry("connection refused".to_string()))
        }

        fn results(&self, _race_id: u32) -> crate::error::Result<Vec<RawRaceRow>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_registry_failure_aborts_only_that_race() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("points_5.csv");

        let result = ingest_race(&FailingRegistry, 5, &AppConfig::default(), &[], &output);
        assert!(result.is_err());
        assert!(!output.exists());
    }
}

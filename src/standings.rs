// 📊 Season standings - overall_<category>.csv and its display form
//
// File layout (one row per runner, in rank order):
//   Name,RegNo,<id>-Place,<id>-Points,...,Best<N>-Points,Place
// A race the runner did not take part in has both cells empty.

use crate::config::{AppConfig, DisplayConfig};
use crate::entities::{Category, IdentityCode};
use crate::error::SeasonError;
use crate::ranking::{RankedRow, RankedTable};
use crate::scoring::Placement;
use crate::season::{RaceResult, SeasonRow};
use crate::storage::SeasonPaths;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

const NAME_COLUMN: &str = "Name";
const REG_NO_COLUMN: &str = "RegNo";
const PLACE_COLUMN: &str = "Place";

// ============================================================================
// WRITING
// ============================================================================

pub fn header(table: &RankedTable) -> Vec<String> {
    let mut columns = vec![NAME_COLUMN.to_string(), REG_NO_COLUMN.to_string()];
    for race in &table.races {
        columns.push(format!("{}-Place", race));
        columns.push(format!("{}-Points", race));
    }
    columns.push(format!("Best{}-Points", table.races_to_count));
    columns.push(PLACE_COLUMN.to_string());
    columns
}

fn record(ranked: &RankedRow) -> Vec<String> {
    let mut cells = vec![ranked.row.name.clone(), ranked.row.reg_no.to_string()];
    for result in &ranked.row.results {
        match result {
            Some(r) => {
                cells.push(r.place.to_string());
                cells.push(r.points.to_string());
            }
            None => {
                cells.push(String::new());
                cells.push(String::new());
            }
        }
    }
    cells.push(ranked.best_n.to_string());
    cells.push(ranked.place.to_string());
    cells
}

pub fn write_standings(path: &Path, table: &RankedTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create standings file: {}", path.display()))?;

    writer.write_record(header(table))?;
    for ranked in &table.rows {
        writer.write_record(record(ranked))?;
    }
    writer.flush()?;

    debug!(
        "Wrote {} runners of category {} to {}",
        table.rows.len(),
        table.category,
        path.display()
    );
    Ok(())
}

// ============================================================================
// READING
// ============================================================================

/// Race ids and the best-N count encoded in a header
fn parse_header(columns: &[&str]) -> std::result::Result<(Vec<u32>, usize), String> {
    if columns.len() < 4 || columns.len() % 2 != 0 {
        return Err(format!("unexpected number of columns ({})", columns.len()));
    }
    if columns[0] != NAME_COLUMN || columns[1] != REG_NO_COLUMN {
        return Err("header must start with Name,RegNo".to_string());
    }
    if columns[columns.len() - 1] != PLACE_COLUMN {
        return Err("header must end with Place".to_string());
    }

    let best = columns[columns.len() - 2];
    let races_to_count = best
        .strip_prefix("Best")
        .and_then(|s| s.strip_suffix("-Points"))
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| format!("'{}' is not a Best<N>-Points column", best))?;

    let races = columns[2..columns.len() - 2]
        .chunks(2)
        .map(|pair| {
            let place_id = pair[0].strip_suffix("-Place");
            let points_id = pair[1].strip_suffix("-Points");
            match (place_id, points_id) {
                (Some(a), Some(b)) if a == b => a
                    .parse::<u32>()
                    .map_err(|_| format!("'{}' is not a race id", a)),
                _ => Err(format!("'{}' / '{}' is not a race column pair", pair[0], pair[1])),
            }
        })
        .collect::<std::result::Result<Vec<u32>, String>>()?;

    Ok((races, races_to_count))
}

fn parse_record(record: &csv::StringRecord, races: usize) -> std::result::Result<RankedRow, String> {
    let cell = |i: usize| record.get(i).unwrap_or("").trim();
    let number = |i: usize| -> std::result::Result<u32, String> {
        cell(i)
            .parse::<u32>()
            .map_err(|_| format!("'{}' is not a number", cell(i)))
    };

    let mut results = Vec::with_capacity(races);
    for race in 0..races {
        let place_at = 2 + race * 2;
        let result = match (cell(place_at).is_empty(), cell(place_at + 1).is_empty()) {
            (true, true) => None,
            (false, false) => Some(RaceResult {
                place: Placement::parse(cell(place_at)).map_err(|e| e.to_string())?,
                points: number(place_at + 1)?,
            }),
            _ => return Err(format!("race column {} has only one of place and points", race + 1)),
        };
        results.push(result);
    }

    let best_at = 2 + races * 2;
    Ok(RankedRow {
        row: SeasonRow {
            name: cell(0).to_string(),
            reg_no: IdentityCode::new(cell(1)),
            results,
        },
        best_n: number(best_at)?,
        place: number(best_at + 1)?,
    })
}

pub fn read_standings(path: &Path, category: Category) -> Result<RankedTable> {
    let malformed = |reason: String| SeasonError::MalformedTable {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open standings file: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let columns: Vec<&str> = headers.iter().collect();
    let (races, races_to_count) = parse_header(&columns).map_err(malformed)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
        let row = parse_record(&record, races.len())
            .map_err(|reason| malformed(format!("row {}: {}", line + 1, reason)))?;
        rows.push(row);
    }

    Ok(RankedTable {
        category,
        races,
        races_to_count,
        rows,
    })
}

// ============================================================================
// DISPLAY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayCell {
    pub place: String,
    pub points: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub place: String,
    pub name: String,
    pub reg_no: String,
    pub results: Vec<DisplayCell>,
    pub best_n: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayTable {
    pub category: String,
    pub category_name: String,
    pub races: Vec<u32>,
    pub races_to_count: usize,
    pub rows: Vec<DisplayRow>,
}

/// Group digits by thousands: 12345 → "12 345" with a no-break space
pub fn format_points(points: u32, separator: &str) -> String {
    let digits = points.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(digit);
    }
    out
}

pub fn display_table(table: &RankedTable, display: &DisplayConfig) -> DisplayTable {
    let rows = table
        .rows
        .iter()
        .map(|ranked| DisplayRow {
            place: format!("{}.", ranked.place),
            name: ranked.row.name.clone(),
            reg_no: ranked.row.reg_no.to_string(),
            results: ranked
                .row
                .results
                .iter()
                .map(|result| match result {
                    Some(r) => DisplayCell {
                        place: r.place.to_string(),
                        points: format_points(r.points, &display.thousands_separator),
                    },
                    None => DisplayCell {
                        place: display.placeholder.clone(),
                        points: display.placeholder.clone(),
                    },
                })
                .collect(),
            best_n: format_points(ranked.best_n, &display.thousands_separator),
        })
        .collect();

    DisplayTable {
        category: table.category.code().to_string(),
        category_name: table.category.name().to_string(),
        races: table.races.clone(),
        races_to_count: table.races_to_count,
        rows,
    }
}

/// Display form of one category's standings; `None` when not computed yet
pub fn category_display(
    config: &AppConfig,
    season: &str,
    category: &Category,
) -> Result<Option<DisplayTable>> {
    let path = SeasonPaths::new(&config.data_dir, season).standings_file(category);
    if !path.exists() {
        debug!("No standings for {} in season {}", category, season);
        return Ok(None);
    }

    let table = read_standings(&path, category.clone())?;
    Ok(Some(display_table(&table, &config.display)))
}

/// Display form of every configured category that has standings
pub fn season_display(config: &AppConfig, season: &str) -> Result<Vec<DisplayTable>> {
    let mut tables = Vec::new();
    for category in &config.categories {
        if let Some(table) = category_display(config, season, category)? {
            tables.push(table);
        }
    }
    Ok(tables)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::rank_table;
    use crate::scoring::points;
    use crate::season::SeasonTable;
    use tempfile::TempDir;

    fn result(place: Placement) -> Option<RaceResult> {
        Some(RaceResult {
            place,
            points: points(&place),
        })
    }

    fn ranked() -> RankedTable {
        rank_table(SeasonTable {
            category: Category::Veteran,
            races: vec![4021, 4035, 4102],
            rows: vec![
                SeasonRow {
                    name: "Jan Novák".to_string(),
                    reg_no: IdentityCode::new("ABM6001"),
                    results: vec![result(Placement::Ranked(1)), None, result(Placement::Disqualified)],
                },
                SeasonRow {
                    name: "Karel, st.".to_string(),
                    reg_no: IdentityCode::unregistered(),
                    results: vec![None, result(Placement::Ranked(12)), result(Placement::MissingStart)],
                },
            ],
        })
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(
            header(&ranked()).join(","),
            "Name,RegNo,4021-Place,4021-Points,4035-Place,4035-Points,4102-Place,4102-Points,Best2-Points,Place"
        );
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results").join("overall_V.csv");
        let table = ranked();

        write_standings(&path, &table).unwrap();
        let loaded = read_standings(&path, Category::Veteran).unwrap();

        assert_eq!(loaded, table);
        println!("✅ Round trip of {} rows", loaded.rows.len());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("overall_H.csv");
        fs::write(&path, "Name,RegNo,1-Place,2-Points,Best1-Points,Place\n").unwrap();

        let err = read_standings(&path, Category::Men).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeasonError>(),
            Some(SeasonError::MalformedTable { .. })
        ));
    }

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(0, "\u{a0}"), "0");
        assert_eq!(format_points(999, "\u{a0}"), "999");
        assert_eq!(format_points(1000, "\u{a0}"), "1\u{a0}000");
        assert_eq!(format_points(1234567, " "), "1 234 567");
    }

    #[test]
    fn test_display_table() {
        let shown = display_table(&ranked(), &DisplayConfig::default());

        assert_eq!(shown.category, "V");
        assert_eq!(shown.rows[0].place, "1.");
        assert_eq!(shown.rows[0].results[0].place, "1.");
        assert_eq!(shown.rows[0].results[1].points, "-");
        assert_eq!(shown.rows[0].results[2].place, "DISK");
        assert_eq!(shown.rows[1].best_n, "164");
    }

    #[test]
    fn test_season_display_skips_missing_categories() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let paths = SeasonPaths::new(dir.path(), "2024-2025");
        write_standings(&paths.standings_file(&Category::Veteran), &ranked()).unwrap();

        let tables = season_display(&config, "2024-2025").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].category, "V");

        let none = category_display(&config, "2024-2025", &Category::Men).unwrap();
        assert!(none.is_none());
    }
}

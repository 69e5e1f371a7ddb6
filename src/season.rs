// 📋 Season Collator - fold every race into wide per-category tables
//
// One SeasonTable per category, one row per runner, one (place, points)
// column per race. Matching at fold time is strict: exact registration
// code, or exact name for unregistered runners. Looser matching happens
// in the reconciler.

use crate::entities::{Category, IdentityCode};
use crate::race::{Race, RaceRow};
use crate::scoring::Placement;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// SEASON ROW
// ============================================================================

/// A runner's result in one race. Place and points are always set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaceResult {
    pub place: Placement,
    pub points: u32,
}

impl RaceResult {
    pub fn from_row(row: &RaceRow) -> Self {
        RaceResult {
            place: row.place,
            points: row.points,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRow {
    pub name: String,
    pub reg_no: IdentityCode,

    /// Aligned with `SeasonTable::races`; `None` = did not run
    pub results: Vec<Option<RaceResult>>,
}

impl SeasonRow {
    pub fn appearances(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    /// Points per race, 0 where the runner did not start
    pub fn race_points(&self) -> Vec<u32> {
        self.results
            .iter()
            .map(|r| r.map_or(0, |result| result.points))
            .collect()
    }
}

// ============================================================================
// SEASON TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonTable {
    pub category: Category,

    /// Race ids in column order
    pub races: Vec<u32>,

    pub rows: Vec<SeasonRow>,
}

impl SeasonTable {
    pub fn new(category: Category) -> Self {
        SeasonTable {
            category,
            races: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn race_count(&self) -> usize {
        self.races.len()
    }

    /// Append an empty column for a race
    fn push_race(&mut self, race_id: u32) {
        self.races.push(race_id);
        for row in &mut self.rows {
            row.results.push(None);
        }
    }

    fn add_runner(&mut self, race_row: &RaceRow) {
        let mut results = vec![None; self.races.len()];
        if let Some(last) = results.last_mut() {
            *last = Some(RaceResult::from_row(race_row));
        }

        self.rows.push(SeasonRow {
            name: race_row.name.clone(),
            reg_no: race_row.reg_no.clone(),
            results,
        });
    }
}

// ============================================================================
// FOLDING
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub matched: usize,
    pub added: usize,
    pub skipped: usize,
}

impl FoldStats {
    fn record(&mut self, outcome: FoldOutcome) {
        match outcome {
            FoldOutcome::Matched => self.matched += 1,
            FoldOutcome::Added => self.added += 1,
            FoldOutcome::Skipped => self.skipped += 1,
        }
    }

    fn absorb(&mut self, other: FoldStats) {
        self.matched += other.matched;
        self.added += other.added;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldOutcome {
    Matched,
    Added,
    Skipped,
}

/// Fold one race into the season tables.
///
/// Every table gets exactly one new column, whether or not any runner of
/// its category ran the race.
pub fn fold_race(tables: &mut [SeasonTable], race: &Race) -> FoldStats {
    let mut stats = FoldStats::default();

    for table in tables.iter_mut() {
        table.push_race(race.id);
    }

    // Registered rows first, so a namesake without a registration can't
    // take a registered runner's row for this race
    let registered = race.rows.iter().filter(|r| r.reg_no.is_registered());
    let unregistered = race.rows.iter().filter(|r| !r.reg_no.is_registered());

    for race_row in registered.chain(unregistered) {
        let Some(table) = tables.iter_mut().find(|t| t.category == race_row.category) else {
            warn!(
                "Category '{}' not found in season tables (race {}, runner '{}')",
                race_row.category, race.id, race_row.name
            );
            stats.record(FoldOutcome::Skipped);
            continue;
        };

        stats.record(fold_row(table, race.id, race_row));
    }

    debug!(
        "Race {}: {} matched, {} new, {} skipped",
        race.id, stats.matched, stats.added, stats.skipped
    );
    stats
}

fn fold_row(table: &mut SeasonTable, race_id: u32, race_row: &RaceRow) -> FoldOutcome {
    let column = table.races.len() - 1;
    let result = RaceResult::from_row(race_row);

    if race_row.reg_no.is_registered() {
        return match table.rows.iter().position(|r| r.reg_no == race_row.reg_no) {
            Some(i) if table.rows[i].results[column].is_some() => {
                warn!(
                    "Registration '{}' is listed twice in race {} in category '{}'; keeping the first",
                    race_row.reg_no, race_id, table.category
                );
                FoldOutcome::Skipped
            }
            Some(i) => {
                table.rows[i].results[column] = Some(result);
                FoldOutcome::Matched
            }
            None => {
                table.add_runner(race_row);
                FoldOutcome::Added
            }
        };
    }

    // Unregistered: exact name within the category
    let already_filled = table
        .rows
        .iter()
        .any(|r| r.name == race_row.name && r.results[column].is_some());
    if already_filled {
        warn!(
            "Runner without a registration number named '{}' is already listed in race {} in category '{}'",
            race_row.name, race_id, table.category
        );
        return FoldOutcome::Skipped;
    }

    match table.rows.iter().position(|r| r.name == race_row.name) {
        Some(i) => {
            table.rows[i].results[column] = Some(result);
            FoldOutcome::Matched
        }
        None => {
            table.add_runner(race_row);
            FoldOutcome::Added
        }
    }
}

/// Build the season tables for the given categories from all races, in order
pub fn collate(races: &[Race], categories: &[Category]) -> Vec<SeasonTable> {
    let mut tables: Vec<SeasonTable> = categories.iter().cloned().map(SeasonTable::new).collect();

    let mut total = FoldStats::default();
    for race in races {
        total.absorb(fold_race(&mut tables, race));
    }

    info!(
        "Collated {} races into {} categories: {} runners, {} repeat results, {} rows skipped",
        races.len(),
        tables.len(),
        total.added,
        total.matched,
        total.skipped
    );
    tables
}

// ============================================================================
// TESTS
// ============================================================================

// 🏆 Ranker - best-N season score and final places
//
// Only the best half of the season (plus one race) counts. Rows with equal
// scores share the place of the first of them; the next place skips.

use crate::entities::Category;
use crate::season::{SeasonRow, SeasonTable};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub row: SeasonRow,

    /// Sum of the best `races_to_count` race points
    pub best_n: u32,

    pub place: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedTable {
    pub category: Category,
    pub races: Vec<u32>,
    pub races_to_count: usize,
    pub rows: Vec<RankedRow>,
}

/// Compact per-category numbers for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingSummary {
    pub category: String,
    pub races: usize,
    pub races_to_count: usize,
    pub runners: usize,
    pub leader: Option<String>,
    pub leader_points: Option<u32>,
}

impl RankedTable {
    pub fn summary(&self) -> RankingSummary {
        let leader = self.rows.first();
        RankingSummary {
            category: self.category.code().to_string(),
            races: self.races.len(),
            races_to_count: self.races_to_count,
            runners: self.rows.len(),
            leader: leader.map(|r| r.row.name.clone()),
            leader_points: leader.map(|r| r.best_n),
        }
    }
}

pub fn races_to_count(races: usize) -> usize {
    races / 2 + 1
}

/// Sum of the `n` highest race points; missed races count as 0
pub fn best_n_score(row: &SeasonRow, n: usize) -> u32 {
    let mut points = row.race_points();
    points.sort_unstable_by(|a, b| b.cmp(a));
    points.into_iter().take(n).sum()
}

pub fn rank_table(table: SeasonTable) -> RankedTable {
    let n = races_to_count(table.races.len());

    let mut scored: Vec<(u32, SeasonRow)> = table
        .rows
        .into_iter()
        .map(|row| (best_n_score(&row, n), row))
        .collect();

    // Stable: equal scores keep table order
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut rows = Vec::with_capacity(scored.len());
    let mut previous: Option<(u32, u32)> = None;
    for (index, (best_n, row)) in scored.into_iter().enumerate() {
        let place = match previous {
            Some((score, place)) if score == best_n => place,
            _ => index as u32 + 1,
        };
        previous = Some((best_n, place));
        rows.push(RankedRow { row, best_n, place });
    }

    RankedTable {
        category: table.category,
        races: table.races,
        races_to_count: n,
        rows,
    }
}

// ============================================================================
// TESTS
// ============================================================================

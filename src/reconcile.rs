// 🔗 Identity Reconciler - merge rows that belong to the same runner
//
// Rows of a season table are grouped by normalized name. Each group of two
// or more rows runs through a fixed rule cascade; the first rule that
// applies decides. Groups no rule can settle go to the DecisionProvider.
//
// Cascade:
//   1. SameRaceConflict   - two different results in one race → separate
//   2. UniqueIdentity     - exactly one authoritative code → merge into it
//   3. BirthYearConflict  - birth years all known and differ → separate
//   4. Appearances        - one row ran strictly most races → merge into it
//   5. Manual             - ask the provider

use crate::decisions::{Decision, DecisionProvider};
use crate::entities::{name_key, Category};
use crate::error::{Result, SeasonError};
use crate::season::{RaceResult, SeasonRow, SeasonTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

// ============================================================================
// IDENTITY GROUP
// ============================================================================

/// Rows of one category that share a name key
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityGroup {
    pub key: String,
    pub category: Category,

    /// Race ids, aligned with every member's results
    pub races: Vec<u32>,

    /// Members in table order; decisions refer to them by index
    pub members: Vec<SeasonRow>,
}

impl IdentityGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn result(&self, member: usize, column: usize) -> Option<RaceResult> {
        self.members
            .get(member)
            .and_then(|m| m.results.get(column).copied().flatten())
    }
}

/// Table shown to the operator: one line per member, one column per race
impl fmt::Display for IdentityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Category {}: {} rows named like '{}'",
            self.category,
            self.len(),
            self.key
        )?;

        let name_width = self
            .members
            .iter()
            .map(|m| m.name.chars().count())
            .max()
            .unwrap_or(0)
            .max(4);

        write!(f, "{:>3}  {:<name_width$}  {:<8}", "id", "Name", "RegNo")?;
        for race in &self.races {
            write!(f, "  {:>10}", race)?;
        }
        writeln!(f)?;

        for (id, member) in self.members.iter().enumerate() {
            write!(
                f,
                "{:>3}  {:<name_width$}  {:<8}",
                id,
                member.name,
                member.reg_no.as_str()
            )?;
            for result in &member.results {
                let cell = match result {
                    Some(r) => format!("{} {}", r.place, r.points),
                    None => "-".to_string(),
                };
                write!(f, "  {:>10}", cell)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// RULES
// ============================================================================

/// Outcome of a rule or decision, in group-local indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    KeepSeparate,

    /// Merge `members` (which include `into`); `into` supplies name and code
    Merge { into: usize, members: Vec<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rule {
    SameRaceConflict,
    UniqueIdentity,
    BirthYearConflict,
    Appearances,
    Manual,
}

impl Rule {
    /// Automatic rules in the order they are tried
    pub const CASCADE: [Rule; 4] = [
        Rule::SameRaceConflict,
        Rule::UniqueIdentity,
        Rule::BirthYearConflict,
        Rule::Appearances,
    ];

    /// `None` when the rule does not apply. Manual never applies on its own.
    pub fn apply(&self, group: &IdentityGroup, current_year: i32) -> Option<Resolution> {
        match self {
            Rule::SameRaceConflict => check_same_race_conflict(group),
            Rule::UniqueIdentity => check_unique_identity(group),
            Rule::BirthYearConflict => check_birth_year_conflict(group, current_year),
            Rule::Appearances => check_appearances(group),
            Rule::Manual => None,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rule::SameRaceConflict => "same-race conflict",
            Rule::UniqueIdentity => "unique identity",
            Rule::BirthYearConflict => "birth-year conflict",
            Rule::Appearances => "most appearances",
            Rule::Manual => "manual decision",
        };
        f.write_str(name)
    }
}

fn all_members(group: &IdentityGroup) -> Vec<usize> {
    (0..group.len()).collect()
}

/// Rule 1: some race has two different results within the group
fn check_same_race_conflict(group: &IdentityGroup) -> Option<Resolution> {
    let conflict = (0..group.races.len()).any(|column| {
        let distinct: HashSet<RaceResult> = (0..group.len())
            .filter_map(|member| group.result(member, column))
            .collect();
        distinct.len() >= 2
    });

    conflict.then_some(Resolution::KeepSeparate)
}

/// Rule 2: exactly one member carries an authoritative code
fn check_unique_identity(group: &IdentityGroup) -> Option<Resolution> {
    let authoritative: Vec<usize> = group
        .members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.reg_no.is_authoritative())
        .map(|(i, _)| i)
        .collect();

    match authoritative.as_slice() {
        [only] => Some(Resolution::Merge {
            into: *only,
            members: all_members(group),
        }),
        _ => None,
    }
}

/// Rule 3: every birth year is known and they are not all equal.
/// Malformed codes count as unknown and are not logged again here.
fn check_birth_year_conflict(group: &IdentityGroup, current_year: i32) -> Option<Resolution> {
    let years: Option<Vec<i32>> = group
        .members
        .iter()
        .map(|m| m.reg_no.birth_year(current_year).ok().flatten())
        .collect();

    let years = years?;
    let first = *years.first()?;
    years
        .iter()
        .any(|y| *y != first)
        .then_some(Resolution::KeepSeparate)
}

/// Rule 4: a single member with strictly the most appearances
fn check_appearances(group: &IdentityGroup) -> Option<Resolution> {
    let counts: Vec<usize> = group.members.iter().map(|m| m.appearances()).collect();
    let max = *counts.iter().max()?;

    let leaders: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == max)
        .map(|(i, _)| i)
        .collect();

    match leaders.as_slice() {
        [only] => Some(Resolution::Merge {
            into: *only,
            members: all_members(group),
        }),
        _ => None,
    }
}

/// Turn a provider decision into a resolution, rejecting indices that do
/// not exist in the group
pub fn validate_decision(group: &IdentityGroup, decision: Decision) -> Result<Resolution> {
    let invalid = |reason: String| SeasonError::InvalidDecision {
        group: group.key.clone(),
        reason,
    };

    match decision {
        Decision::KeepSeparate => Ok(Resolution::KeepSeparate),
        Decision::MergeAll { into } => {
            if into >= group.len() {
                return Err(invalid(format!("no member with id {}", into)));
            }
            Ok(Resolution::Merge {
                into,
                members: all_members(group),
            })
        }
        Decision::MergeSubset { members } => {
            if members.len() < 2 {
                return Err(invalid("a subset merge needs at least two ids".to_string()));
            }
            let mut seen = HashSet::new();
            for &id in &members {
                if id >= group.len() {
                    return Err(invalid(format!("no member with id {}", id)));
                }
                if !seen.insert(id) {
                    return Err(invalid(format!("id {} listed twice", id)));
                }
            }
            Ok(Resolution::Merge {
                into: members[0],
                members,
            })
        }
    }
}

// ============================================================================
// MERGING
// ============================================================================

fn describe(result: &RaceResult) -> String {
    format!("{} ({} pts)", result.place, result.points)
}

/// Pointwise union of the given members. Name and code come from `into`;
/// two different results for one race are fatal.
pub fn merge_rows(group: &IdentityGroup, into: usize, members: &[usize]) -> Result<SeasonRow> {
    let authoritative = group.members.get(into).ok_or_else(|| SeasonError::InvalidDecision {
        group: group.key.clone(),
        reason: format!("no member with id {}", into),
    })?;

    let mut results: Vec<Option<RaceResult>> = (0..group.races.len())
        .map(|column| group.result(into, column))
        .collect();

    for &member in members.iter().filter(|m| **m != into) {
        for (column, slot) in results.iter_mut().enumerate() {
            let Some(other) = group.result(member, column) else {
                continue;
            };
            match slot {
                None => *slot = Some(other),
                Some(current) if *current == other => {}
                Some(current) => {
                    return Err(SeasonError::IrreconcilableMerge {
                        category: group.category.to_string(),
                        name: authoritative.name.trim().to_string(),
                        race: group.races[column],
                        left: describe(current),
                        right: describe(&other),
                    });
                }
            }
        }
    }

    Ok(SeasonRow {
        name: authoritative.name.trim().to_string(),
        reg_no: authoritative.reg_no.clone(),
        results,
    })
}

fn trimmed(mut row: SeasonRow) -> SeasonRow {
    let name = row.name.trim();
    if name.len() != row.name.len() {
        row.name = name.to_string();
    }
    row
}

fn apply_resolution(group: IdentityGroup, resolution: &Resolution) -> Result<Vec<SeasonRow>> {
    match resolution {
        Resolution::KeepSeparate => Ok(group.members.into_iter().map(trimmed).collect()),
        Resolution::Merge { into, members } => {
            let merged = merge_rows(&group, *into, members)?;
            let rest = group
                .members
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !members.contains(i))
                .map(|(_, row)| trimmed(row));
            Ok(std::iter::once(merged).chain(rest).collect())
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub category: Category,
    pub rows_before: usize,
    pub rows_after: usize,
    pub singletons: usize,
    pub merged_groups: usize,
    pub separate_groups: usize,

    /// Which rule settled how many groups
    pub by_rule: BTreeMap<Rule, usize>,
}

impl ReconciliationReport {
    fn new(category: Category) -> Self {
        ReconciliationReport {
            category,
            rows_before: 0,
            rows_after: 0,
            singletons: 0,
            merged_groups: 0,
            separate_groups: 0,
            by_rule: BTreeMap::new(),
        }
    }

    fn record(&mut self, rule: Rule, resolution: &Resolution) {
        *self.by_rule.entry(rule).or_insert(0) += 1;
        match resolution {
            Resolution::KeepSeparate => self.separate_groups += 1,
            Resolution::Merge { .. } => self.merged_groups += 1,
        }
    }

    pub fn manual_decisions(&self) -> usize {
        self.by_rule.get(&Rule::Manual).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        format!(
            "Category {}: {} rows → {} rows ({} groups merged, {} kept separate, {} manual)",
            self.category,
            self.rows_before,
            self.rows_after,
            self.merged_groups,
            self.separate_groups,
            self.manual_decisions()
        )
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

fn resolve_group(
    group: &IdentityGroup,
    current_year: i32,
    provider: &mut dyn DecisionProvider,
) -> Result<(Rule, Resolution)> {
    for rule in Rule::CASCADE {
        if let Some(resolution) = rule.apply(group, current_year) {
            debug!("'{}' in {}: {} → {:?}", group.key, group.category, rule, resolution);
            return Ok((rule, resolution));
        }
    }

    let decision = provider.resolve(group)?;
    let resolution = validate_decision(group, decision)?;
    debug!("'{}' in {}: manual → {:?}", group.key, group.category, resolution);
    Ok((Rule::Manual, resolution))
}

/// Reconcile one season table. Groups come out in name-key order, members
/// of a group in table order (a merged row first).
pub fn reconcile_table(
    table: SeasonTable,
    current_year: i32,
    provider: &mut dyn DecisionProvider,
) -> Result<(SeasonTable, ReconciliationReport)> {
    let SeasonTable {
        category,
        races,
        rows,
    } = table;

    let mut report = ReconciliationReport::new(category.clone());
    report.rows_before = rows.len();

    let mut groups: BTreeMap<String, Vec<SeasonRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(name_key(&row.name)).or_default().push(row);
    }

    let mut output = Vec::with_capacity(report.rows_before);
    for (key, members) in groups {
        if members.len() == 1 {
            report.singletons += 1;
            output.extend(members.into_iter().map(trimmed));
            continue;
        }

        let group = IdentityGroup {
            key,
            category: category.clone(),
            races: races.clone(),
            members,
        };
        let (rule, resolution) = resolve_group(&group, current_year, provider)?;
        report.record(rule, &resolution);
        output.extend(apply_resolution(group, &resolution)?);
    }

    report.rows_after = output.len();
    info!("{}", report.summary());

    Ok((
        SeasonTable {
            category,
            races,
            rows: output,
        },
        report,
    ))
}

// ============================================================================
// TESTS
// ============================================================================

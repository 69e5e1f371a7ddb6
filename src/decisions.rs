// 🙋 Decision Providers - how groups the rule cascade can't settle get resolved
//
// The reconciler only sees the DecisionProvider trait. Interactive runs use
// a line prompt; batch runs keep everything separate; a decision log
// replays earlier answers so a season can be recomputed without asking again.

use crate::error::{Result, SeasonError};
use crate::reconcile::IdentityGroup;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ============================================================================
// DECISION
// ============================================================================

/// Operator answer for one identity group. Ids are group-local, 0-based,
/// as shown in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    KeepSeparate,

    /// Merge the whole group into member `into`
    MergeAll { into: usize },

    /// Merge only these members; the first one is authoritative
    MergeSubset { members: Vec<usize> },
}

pub trait DecisionProvider {
    fn resolve(&mut self, group: &IdentityGroup) -> Result<Decision>;
}

impl<P: DecisionProvider + ?Sized> DecisionProvider for Box<P> {
    fn resolve(&mut self, group: &IdentityGroup) -> Result<Decision> {
        (**self).resolve(group)
    }
}

// ============================================================================
// PROMPT
// ============================================================================

const PROMPT: &str = "Enter 's' to keep them separate, an id to merge all rows into it, \
                      or comma-separated ids to merge only those (the first id is kept): ";

/// Line-oriented prompt over any reader/writer pair (stdin/stdout in the CLI)
pub struct PromptDecisions<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptDecisions<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptDecisions { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Parse one answer; the error text is shown before prompting again
pub fn parse_answer(answer: &str, group_size: usize) -> std::result::Result<Decision, String> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("s") {
        return Ok(Decision::KeepSeparate);
    }
    if answer.is_empty() {
        return Err("Please enter an answer.".to_string());
    }

    let ids = answer
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<usize>()
                .map_err(|_| format!("'{}' is not an id.", part))
                .and_then(|id| {
                    if id < group_size {
                        Ok(id)
                    } else {
                        Err(format!("There is no row with id {}.", id))
                    }
                })
        })
        .collect::<std::result::Result<Vec<usize>, String>>()?;

    match ids.as_slice() {
        [into] => Ok(Decision::MergeAll { into: *into }),
        _ => {
            let mut unique = ids.clone();
            unique.sort_unstable();
            unique.dedup();
            if unique.len() != ids.len() {
                return Err("Each id can only be listed once.".to_string());
            }
            Ok(Decision::MergeSubset { members: ids })
        }
    }
}

impl<R: BufRead, W: Write> DecisionProvider for PromptDecisions<R, W> {
    fn resolve(&mut self, group: &IdentityGroup) -> Result<Decision> {
        writeln!(self.output)?;
        write!(self.output, "{}", group)?;

        loop {
            write!(self.output, "{}", PROMPT)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(SeasonError::DecisionAborted(group.key.clone()));
            }

            match parse_answer(&line, group.len()) {
                Ok(decision) => return Ok(decision),
                Err(message) => writeln!(self.output, "{}", message)?,
            }
        }
    }
}

// ============================================================================
// NON-INTERACTIVE PROVIDERS
// ============================================================================

/// Answers from a fixed queue, in order
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    queue: VecDeque<Decision>,
    asked: Vec<String>,
}

impl ScriptedDecisions {
    pub fn new(decisions: Vec<Decision>) -> Self {
        ScriptedDecisions {
            queue: decisions.into(),
            asked: Vec::new(),
        }
    }

    /// Keys of the groups this provider was asked about
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn resolve(&mut self, group: &IdentityGroup) -> Result<Decision> {
        self.asked.push(group.key.clone());
        self.queue
            .pop_front()
            .ok_or_else(|| SeasonError::DecisionAborted(group.key.clone()))
    }
}

/// Batch mode: every unresolved group stays separate
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepSeparateDecisions;

impl DecisionProvider for KeepSeparateDecisions {
    fn resolve(&mut self, group: &IdentityGroup) -> Result<Decision> {
        info!(
            "Keeping {} rows named like '{}' in {} separate (batch mode)",
            group.len(),
            group.key,
            group.category
        );
        Ok(Decision::KeepSeparate)
    }
}

// ============================================================================
// DECISION LOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDecision {
    pub category: String,
    pub group: String,
    pub decision: Decision,
}

/// Fingerprint of everything the operator saw: category, races and every
/// member's name, code and results
pub fn fingerprint(group: &IdentityGroup) -> String {
    let mut hasher = Sha256::new();
    hasher.update(group.category.code().as_bytes());
    for race in &group.races {
        hasher.update(format!("|{}", race).as_bytes());
    }
    for member in &group.members {
        hasher.update(b"\n");
        hasher.update(member.name.as_bytes());
        hasher.update(b"\t");
        hasher.update(member.reg_no.as_str().as_bytes());
        for result in &member.results {
            let cell = match result {
                Some(r) => format!("\t{}:{}", r.place, r.points),
                None => "\t-".to_string(),
            };
            hasher.update(cell.as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Replays decisions from a JSON log and records new ones from `inner`.
/// The log is written after every new decision. A replay-only log passes
/// new groups to `inner` without recording them.
pub struct RecordedDecisions<P: DecisionProvider> {
    path: PathBuf,
    inner: P,
    log: BTreeMap<String, RecordedDecision>,
    replayed: usize,
    record: bool,
}

impl<P: DecisionProvider> RecordedDecisions<P> {
    /// Open a decision log; a missing file starts an empty log
    pub fn open(path: &Path, inner: P) -> anyhow::Result<Self> {
        Self::load(path, inner, true)
    }

    /// Open a decision log that is never written
    pub fn replay(path: &Path, inner: P) -> anyhow::Result<Self> {
        Self::load(path, inner, false)
    }

    fn load(path: &Path, inner: P, record: bool) -> anyhow::Result<Self> {
        use anyhow::Context;

        let log = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read decision log: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse decision log: {}", path.display()))?
        } else {
            debug!("No decision log at {}, starting a new one", path.display());
            BTreeMap::new()
        };

        Ok(RecordedDecisions {
            path: path.to_path_buf(),
            inner,
            log,
            replayed: 0,
            record,
        })
    }

    pub fn replayed(&self) -> usize {
        self.replayed
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.log).map_err(std::io::Error::from)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl<P: DecisionProvider> DecisionProvider for RecordedDecisions<P> {
    fn resolve(&mut self, group: &IdentityGroup) -> Result<Decision> {
        let key = fingerprint(group);

        if let Some(recorded) = self.log.get(&key) {
            debug!("Replaying decision for '{}': {:?}", group.key, recorded.decision);
            self.replayed += 1;
            return Ok(recorded.decision.clone());
        }

        let decision = self.inner.resolve(group)?;
        if !self.record {
            return Ok(decision);
        }

        self.log.insert(
            key,
            RecordedDecision {
                category: group.category.code().to_string(),
                group: group.key.clone(),
                decision: decision.clone(),
            },
        );
        if let Err(e) = self.save() {
            warn!("Failed to write decision log {}: {}", self.path.display(), e);
            return Err(e);
        }
        Ok(decision)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Category, IdentityCode};
    use crate::scoring::{points, Placement};
    use crate::season::{RaceResult, SeasonRow};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn group() -> IdentityGroup {
        let first = Placement::Ranked(1);
        IdentityGroup {
            key: "jan novak".to_string(),
            category: Category::Men,
            races: vec![11, 12],
            members: vec![
                SeasonRow {
                    name: "Jan Novák".to_string(),
                    reg_no: IdentityCode::new("ABM8001"),
                    results: vec![Some(RaceResult { place: first, points: points(&first) }), None],
                },
                SeasonRow {
                    name: "Jan Novak".to_string(),
                    reg_no: IdentityCode::new("XYZ8002"),
                    results: vec![None, None],
                },
                SeasonRow {
                    name: "jan novak".to_string(),
                    reg_no: IdentityCode::unregistered(),
                    results: vec![None, None],
                },
            ],
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("s\n", 3), Ok(Decision::KeepSeparate));
        assert_eq!(parse_answer(" 1 ", 3), Ok(Decision::MergeAll { into: 1 }));
        assert_eq!(
            parse_answer("2, 0", 3),
            Ok(Decision::MergeSubset { members: vec![2, 0] })
        );

        assert!(parse_answer("", 3).is_err());
        assert!(parse_answer("3", 3).is_err());
        assert!(parse_answer("x", 3).is_err());
        assert!(parse_answer("1,1", 3).is_err());
    }

    #[test]
    fn test_prompt_reprompts_on_invalid_input() {
        let input = Cursor::new("9\nfoo\n0,2\n");
        let mut provider = PromptDecisions::new(input, Vec::new());

        let decision = provider.resolve(&group()).unwrap();
        assert_eq!(decision, Decision::MergeSubset { members: vec![0, 2] });

        let shown = String::from_utf8(provider.into_output()).unwrap();
        assert!(shown.contains("ABM8001"));
        assert!(shown.contains("There is no row with id 9."));
        assert!(shown.contains("'foo' is not an id."));
        assert_eq!(shown.matches("Enter 's'").count(), 3);
    }

    #[test]
    fn test_prompt_end_of_input_aborts() {
        let mut provider = PromptDecisions::new(Cursor::new(""), Vec::new());
        let err = provider.resolve(&group()).unwrap_err();
        assert!(matches!(err, SeasonError::DecisionAborted(key) if key == "jan novak"));
    }

    #[test]
    fn test_scripted_runs_out() {
        let mut provider = ScriptedDecisions::new(vec![Decision::KeepSeparate]);
        assert_eq!(provider.resolve(&group()).unwrap(), Decision::KeepSeparate);
        assert!(provider.resolve(&group()).is_err());
        assert_eq!(provider.asked().len(), 2);
        assert_eq!(provider.remaining(), 0);
    }

    #[test]
    fn test_fingerprint_tracks_group_content() {
        let a = group();
        let mut b = group();
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.members[2].reg_no = IdentityCode::new("QQQ8003");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_recorded_decisions_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results").join("decisions.json");

        let scripted = ScriptedDecisions::new(vec![Decision::MergeAll { into: 0 }]);
        let mut recorded = RecordedDecisions::open(&path, scripted).unwrap();
        assert_eq!(recorded.resolve(&group()).unwrap(), Decision::MergeAll { into: 0 });
        assert!(path.exists());

        // Second run: nothing scripted, the log answers
        let mut again = RecordedDecisions::open(&path, ScriptedDecisions::default()).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again.resolve(&group()).unwrap(), Decision::MergeAll { into: 0 });
        assert_eq!(again.replayed(), 1);
        assert!(again.into_inner().asked().is_empty());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"action\": \"merge_all\""));
    }

    #[test]
    fn test_replay_only_log_is_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("decisions.json");

        let mut batch = RecordedDecisions::replay(&path, KeepSeparateDecisions).unwrap();
        assert_eq!(batch.resolve(&group()).unwrap(), Decision::KeepSeparate);
        assert!(batch.is_empty());
        assert!(!path.exists());

        // An answer recorded interactively is replayed in batch mode
        let scripted = ScriptedDecisions::new(vec![Decision::MergeSubset { members: vec![1, 2] }]);
        RecordedDecisions::open(&path, scripted)
            .unwrap()
            .resolve(&group())
            .unwrap();

        let mut batch = RecordedDecisions::replay(&path, KeepSeparateDecisions).unwrap();
        assert_eq!(
            batch.resolve(&group()).unwrap(),
            Decision::MergeSubset { members: vec![1, 2] }
        );
        assert_eq!(batch.replayed(), 1);
    }
}

// 📁 Season storage layout
//
//   <data_dir>/<season>/results/points_<race-id>.csv    one file per race
//   <data_dir>/<season>/results/overall_<category>.csv  season standings
//   <data_dir>/<season>/results/decisions.json          recorded manual decisions

use crate::entities::Category;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const RACE_FILE_PREFIX: &str = "points_";
const STANDINGS_FILE_PREFIX: &str = "overall_";

#[derive(Debug, Clone)]
pub struct SeasonPaths {
    data_dir: PathBuf,
    season: String,
}

impl SeasonPaths {
    pub fn new(data_dir: impl Into<PathBuf>, season: &str) -> Self {
        SeasonPaths {
            data_dir: data_dir.into(),
            season: season.to_string(),
        }
    }

    pub fn season(&self) -> &str {
        &self.season
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join(&self.season).join("results")
    }

    pub fn race_file(&self, race_id: u32) -> PathBuf {
        self.results_dir()
            .join(format!("{}{}.csv", RACE_FILE_PREFIX, race_id))
    }

    pub fn standings_file(&self, category: &Category) -> PathBuf {
        self.results_dir()
            .join(format!("{}{}.csv", STANDINGS_FILE_PREFIX, category.code()))
    }

    pub fn decisions_file(&self) -> PathBuf {
        self.results_dir().join("decisions.json")
    }

    /// All race files of the season as (race id, path), sorted by race id.
    ///
    /// A missing results directory is reported and yields no races.
    pub fn list_race_files(&self) -> Vec<(u32, PathBuf)> {
        let dir = self.results_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "No event results found for season '{}' ({}: {})",
                    self.season,
                    dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut races: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter_map(|path| race_id_from_path(&path).map(|id| (id, path)))
            .collect();

        races.sort_by_key(|(id, _)| *id);
        races
    }
}

/// Race id encoded in a `points_<id>.csv` file name
pub fn race_id_from_path(path: &Path) -> Option<u32> {
    if path.extension()? != "csv" {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(RACE_FILE_PREFIX)?
        .parse()
        .ok()
}

/// Season directories under the data root ("22-23", "23-24", ...), sorted
pub fn list_seasons(data_dir: &Path) -> Result<Vec<String>> {
    let mut seasons: Vec<String> = fs::read_dir(data_dir)
        .with_context(|| format!("Failed to read data directory {}", data_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.contains('-'))
        .collect();

    seasons.sort();
    Ok(seasons)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let paths = SeasonPaths::new("data", "24-25");
        assert_eq!(paths.race_file(7), PathBuf::from("data/24-25/results/points_7.csv"));
        assert_eq!(
            paths.standings_file(&Category::Unclassified),
            PathBuf::from("data/24-25/results/overall_ZV-other.csv")
        );
    }

    #[test]
    fn test_race_id_from_path() {
        assert_eq!(race_id_from_path(Path::new("x/points_8123.csv")), Some(8123));
        assert_eq!(race_id_from_path(Path::new("x/overall_H.csv")), None);
        assert_eq!(race_id_from_path(Path::new("x/points_abc.csv")), None);
        assert_eq!(race_id_from_path(Path::new("x/points_12.txt")), None);
    }

    #[test]
    fn test_missing_results_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SeasonPaths::new(dir.path(), "99-00");
        assert!(paths.list_race_files().is_empty());
    }

    #[test]
    fn test_list_race_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SeasonPaths::new(dir.path(), "24-25");
        fs::create_dir_all(paths.results_dir()).unwrap();

        for name in ["points_30.csv", "points_4.csv", "overall_H.csv", "notes.txt"] {
            fs::write(paths.results_dir().join(name), "").unwrap();
        }

        let ids: Vec<u32> = paths.list_race_files().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![4, 30]);

        let seasons = list_seasons(dir.path()).unwrap();
        assert_eq!(seasons, vec!["24-25".to_string()]);
    }
}

// ⚙️ Configuration - TOML file, every value optional
//
// Lookup order for the file: --config flag, SEASON_STANDINGS_CONFIG,
// ./season-standings.toml. A missing file means defaults.

use crate::entities::Category;
use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "season-standings.toml";

pub const DEFAULT_REGISTRY_URL: &str = "https://oris.orientacnisporty.cz/API/";

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the season directories (`<data_dir>/<season>/results/`)
    pub data_dir: PathBuf,

    /// JSON list of known unregistered runners
    pub known_unregistered: PathBuf,

    /// Categories that receive a season table, in output order
    pub categories: Vec<Category>,

    /// Date the age cutoffs are computed for (default: today)
    pub reference_date: Option<NaiveDate>,

    pub age_split: AgeSplitConfig,
    pub registry: RegistryConfig,
    pub display: DisplayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_dir: PathBuf::from("data"),
            known_unregistered: PathBuf::from("data/known_unregs.json"),
            categories: Category::season_defaults(),
            reference_date: None,
            age_split: AgeSplitConfig::default(),
            registry: RegistryConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn current_year(&self) -> i32 {
        self.reference_date().year()
    }

    pub fn age_cutoffs(&self) -> AgeCutoffs {
        self.age_split.cutoffs(self.reference_date())
    }
}

// ============================================================================
// AGE SPLIT
// ============================================================================

/// How the composite bracket is split into youth / veteran / other
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeSplitConfig {
    pub composite: Category,
    pub youth: Category,
    pub veteran: Category,
    pub other: Category,

    /// Youth: at most this old during the season
    pub youth_age: i32,

    /// Veterans: at least this old during the season
    pub veteran_age: i32,

    /// After this month the season counts as the next calendar year's
    pub rollover_month: u32,
}

impl Default for AgeSplitConfig {
    fn default() -> Self {
        AgeSplitConfig {
            composite: Category::Composite,
            youth: Category::Youth,
            veteran: Category::Veteran,
            other: Category::Unclassified,
            youth_age: 15,
            veteran_age: 51,
            rollover_month: 6,
        }
    }
}

impl AgeSplitConfig {
    pub fn cutoffs(&self, reference: NaiveDate) -> AgeCutoffs {
        let shift = i32::from(reference.month() > self.rollover_month);
        AgeCutoffs {
            youth_min_year: reference.year() - self.youth_age + shift,
            veteran_max_year: reference.year() - self.veteran_age + shift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeCutoffs {
    /// Born in this year or later → youth
    pub youth_min_year: i32,

    /// Born in this year or earlier → veteran
    pub veteran_max_year: i32,
}

// ============================================================================
// REGISTRY / DISPLAY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Shown for races a runner did not take part in
    pub placeholder: String,

    /// Digit group separator for points
    pub thousands_separator: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            placeholder: "-".to_string(),
            thousands_separator: "\u{a0}".to_string(),
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# season-standings configuration
# Every value is optional; the commented values are the defaults.

# data_dir = \"data\"
# known_unregistered = \"data/known_unregs.json\"
# categories = [\"H\", \"D\", \"Z\", \"V\", \"HDD\"]

# Date the age cutoffs are computed for (default: today)
# reference_date = \"2025-01-01\"

[age_split]
# composite = \"ZV\"
# youth = \"Z\"
# veteran = \"V\"
# other = \"ZV-other\"
# youth_age = 15
# veteran_age = 51
# rollover_month = 6

[registry]
# base_url = \"https://oris.orientacnisporty.cz/API/\"
# timeout_secs = 30

[display]
# placeholder = \"-\"
# thousands_separator = \"\\u00a0\"
";

/// Load config from a file path. Returns defaults if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config at {}", path.display())),
    }
}

/// Write the commented default config. Errors if the file already exists.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config to {}", path.display()))
}

// ============================================================================
// TESTS
// ============================================================================

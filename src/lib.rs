// Season Standings - Core Library
// Exposes all modules for use in CLI, API server, and tests
//
// race files → season tables → reconciled identities → ranked standings

pub mod config;
pub mod decisions;     // Decision providers for the manual rule
pub mod entities;      // Categories and runner identity codes
pub mod error;
pub mod pipeline;      // Whole-season driver
pub mod race;          // Race Ingestor
pub mod ranking;       // Ranker
pub mod reconcile;     // Identity Reconciler
pub mod registry;      // ORIS race registry client
pub mod scoring;       // Placement Scorer
pub mod season;        // Season Collator
pub mod standings;     // overall_<category>.csv + display accessor
pub mod storage;

// Re-export commonly used types
pub use config::{load_config, write_default_config, AgeCutoffs, AppConfig, DEFAULT_CONFIG_FILE};
pub use decisions::{
    Decision, DecisionProvider, KeepSeparateDecisions, PromptDecisions, RecordedDecisions,
    ScriptedDecisions,
};
pub use entities::{name_key, Category, IdentityCode, UNREGISTERED};
pub use error::{Result, SeasonError};
pub use pipeline::{compute_season, race_output_path, run_race, run_season, SeasonRun};
pub use race::{prepare_race, split_composite, KnownUnregistered, Race, RaceRow};
pub use ranking::{races_to_count, rank_table, RankedRow, RankedTable, RankingSummary};
pub use reconcile::{reconcile_table, IdentityGroup, ReconciliationReport, Resolution, Rule};
pub use registry::{OrisClient, RaceMetadata, RaceRegistry, RawRaceRow};
pub use scoring::{points, Placement};
pub use season::{collate, RaceResult, SeasonRow, SeasonTable};
pub use standings::{read_standings, season_display, write_standings, DisplayTable};
pub use storage::{list_seasons, SeasonPaths};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

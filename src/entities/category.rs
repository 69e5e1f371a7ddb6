// 🏷️ Category Entity - competition brackets
//
// Categories are codes as written in race results ("H", "D", "ZV", ...).
// Some of them are derived: the composite youth + veteran bracket is split
// by birth year at ingestion time, so a season's category set is a
// configuration value rather than a global constant.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Open men ("H")
    Men,

    /// Open women ("D")
    Women,

    /// Youth bracket derived from the composite category ("Z")
    Youth,

    /// Veteran bracket derived from the composite category ("V")
    Veteran,

    /// Mixed / other ("HDD")
    Mixed,

    /// Composite youth + veteran bracket as recorded in races ("ZV")
    Composite,

    /// Composite runners that fit neither age bracket ("ZV-other")
    Unclassified,

    /// Any other code a race reports
    Other(String),
}

impl Category {
    /// Code as written in result files
    pub fn code(&self) -> &str {
        match self {
            Category::Men => "H",
            Category::Women => "D",
            Category::Youth => "Z",
            Category::Veteran => "V",
            Category::Mixed => "HDD",
            Category::Composite => "ZV",
            Category::Unclassified => "ZV-other",
            Category::Other(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "H" => Category::Men,
            "D" => Category::Women,
            "Z" => Category::Youth,
            "V" => Category::Veteran,
            "HDD" => Category::Mixed,
            "ZV" => Category::Composite,
            "ZV-other" => Category::Unclassified,
            other => Category::Other(other.to_string()),
        }
    }

    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            Category::Men => "Men",
            Category::Women => "Women",
            Category::Youth => "Youth",
            Category::Veteran => "Veterans",
            Category::Mixed => "Mixed",
            Category::Composite => "Youth & Veterans",
            Category::Unclassified => "Youth & Veterans (other)",
            Category::Other(code) => code,
        }
    }

    /// Categories that get a season table unless configured otherwise
    pub fn season_defaults() -> Vec<Category> {
        vec![
            Category::Men,
            Category::Women,
            Category::Youth,
            Category::Veteran,
            Category::Mixed,
        ]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for Category {
    fn from(code: String) -> Self {
        Category::from_code(&code)
    }
}

impl From<&str> for Category {
    fn from(code: &str) -> Self {
        Category::from_code(code)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.code().to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Contractor roster.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A contractor whose H&S plan can be reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contractor {
    pub id: String,
    pub name: String,
    pub safety_rating: String,
}

impl Contractor {
    fn new(id: &str, name: &str, safety_rating: &str) -> Self {
        Self { id: id.to_string(), name: name.to_string(), safety_rating: safety_rating.to_string() }
    }

    /// The fixed reference roster.
    pub fn roster() -> &'static [Self] {
        &ROSTER
    }

    /// Find a contractor by id or by (case-insensitive) name.
    pub fn find(key: &str) -> Option<&'static Self> {
        let key = key.trim();
        ROSTER.iter().find(|c| c.id == key || c.name.eq_ignore_ascii_case(key))
    }
}

impl std::fmt::Display for Contractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (Rating: {})", self.name, self.safety_rating)
    }
}

static ROSTER: Lazy<Vec<Contractor>> = Lazy::new(|| {
    vec![
        Contractor::new("contractor-1", "SafeBuild Construction Ltd.", "A+"),
        Contractor::new("contractor-2", "EnergyPipe Services Inc.", "B"),
        Contractor::new("contractor-3", "InfraSecure Solutions", "A"),
    ]
});

//! Canonical role/location normalization.
//!
//! Every call site that turns free text into a role category or a location
//! goes through here: the classifier (parsing model output) and the job
//! search behind the agent's tools (parsing user queries).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("unrecognised role category '{0}'")]
    UnknownRole(String),

    #[error("unrecognised news category '{0}'")]
    UnknownNewsCategory(String),

    #[error("unrecognised location '{0}'")]
    UnknownLocation(String),
}

/// Executive role type assigned to an accepted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleCategory {
    Cto,
    Cfo,
    Cmo,
    Coo,
    Cpo,
    Chro,
    Ciso,
    Ceo,
    Other,
}

const ROLE_ALIASES: &[(RoleCategory, &[&str])] = &[
    (
        RoleCategory::Cto,
        &[
            "cto",
            "chief technology officer",
            "chief technical officer",
            "vp engineering",
            "vp of engineering",
            "tech director",
            "technology director",
            "head of engineering",
        ],
    ),
    (
        RoleCategory::Cfo,
        &[
            "cfo",
            "chief financial officer",
            "finance director",
            "vp finance",
            "head of finance",
            "fd",
        ],
    ),
    (
        RoleCategory::Cmo,
        &[
            "cmo",
            "chief marketing officer",
            "marketing director",
            "vp marketing",
            "head of marketing",
        ],
    ),
    (
        RoleCategory::Coo,
        &[
            "coo",
            "chief operating officer",
            "operations director",
            "head of operations",
        ],
    ),
    (
        RoleCategory::Cpo,
        &[
            "cpo",
            "chief product officer",
            "vp product",
            "head of product",
            "product director",
        ],
    ),
    (
        RoleCategory::Chro,
        &[
            "chro",
            "chief hr officer",
            "chief human resources officer",
            "chief people officer",
            "hr director",
            "people director",
            "head of people",
        ],
    ),
    (
        RoleCategory::Ciso,
        &[
            "ciso",
            "chief information security officer",
            "security director",
            "head of security",
        ],
    ),
    (
        RoleCategory::Ceo,
        &["ceo", "chief executive officer", "managing director", "md"],
    ),
    (RoleCategory::Other, &["other", "executive"]),
];

/// Engagement-model words that do not change the role itself.
const ROLE_QUALIFIERS: &[&str] = &["fractional", "interim", "part-time", "part time", "portfolio"];

impl RoleCategory {
    pub const ALL: [RoleCategory; 9] = [
        RoleCategory::Cto,
        RoleCategory::Cfo,
        RoleCategory::Cmo,
        RoleCategory::Coo,
        RoleCategory::Cpo,
        RoleCategory::Chro,
        RoleCategory::Ciso,
        RoleCategory::Ceo,
        RoleCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCategory::Cto => "CTO",
            RoleCategory::Cfo => "CFO",
            RoleCategory::Cmo => "CMO",
            RoleCategory::Coo => "COO",
            RoleCategory::Cpo => "CPO",
            RoleCategory::Chro => "CHRO",
            RoleCategory::Ciso => "CISO",
            RoleCategory::Ceo => "CEO",
            RoleCategory::Other => "OTHER",
        }
    }

    /// Finds a role code mentioned anywhere in free text ("any cto roles?").
    /// `Other` is never inferred from a query.
    pub fn find_in(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        for (role, aliases) in ROLE_ALIASES {
            if *role == RoleCategory::Other {
                continue;
            }
            for alias in aliases.iter() {
                // Two-letter aliases ("fd", "md") are too ambiguous inside sentences.
                if alias.len() > 2 && contains_phrase(&lowered, alias) {
                    return Some(*role);
                }
            }
        }
        None
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCategory {
    type Err = NormalizeError;

    /// Accepts codes ("CTO"), titles ("Chief Technology Officer"), and
    /// qualified titles ("Fractional CFO"). Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut text = collapse_whitespace(&s.to_lowercase());
        for qualifier in ROLE_QUALIFIERS {
            if let Some(rest) = text.strip_prefix(qualifier) {
                text = rest.trim().to_string();
            }
        }
        if text.is_empty() {
            return Err(NormalizeError::UnknownRole(s.to_string()));
        }

        for (role, aliases) in ROLE_ALIASES {
            if aliases.contains(&text.as_str()) {
                return Ok(*role);
            }
        }

        Self::find_in(&text).ok_or_else(|| NormalizeError::UnknownRole(s.to_string()))
    }
}

/// Content category assigned to an accepted news article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    Trends,
    Hiring,
    Opinion,
    CaseStudy,
    MarketReport,
    Other,
}

impl NewsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Trends => "trends",
            NewsCategory::Hiring => "hiring",
            NewsCategory::Opinion => "opinion",
            NewsCategory::CaseStudy => "case_study",
            NewsCategory::MarketReport => "market_report",
            NewsCategory::Other => "other",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsCategory {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "trends" | "trend" => Ok(NewsCategory::Trends),
            "hiring" => Ok(NewsCategory::Hiring),
            "opinion" => Ok(NewsCategory::Opinion),
            "case_study" => Ok(NewsCategory::CaseStudy),
            "market_report" => Ok(NewsCategory::MarketReport),
            "other" => Ok(NewsCategory::Other),
            _ => Err(NormalizeError::UnknownNewsCategory(s.to_string())),
        }
    }
}

/// Known locations: (match phrase, canonical name).
const LOCATIONS: &[(&str, &str)] = &[
    ("london", "London"),
    ("manchester", "Manchester"),
    ("birmingham", "Birmingham"),
    ("bristol", "Bristol"),
    ("edinburgh", "Edinburgh"),
    ("glasgow", "Glasgow"),
    ("leeds", "Leeds"),
    ("cambridge", "Cambridge"),
    ("oxford", "Oxford"),
    ("remote", "Remote"),
    ("work from home", "Remote"),
    ("wfh", "Remote"),
    ("united kingdom", "UK"),
    ("uk", "UK"),
];

/// Maps a free-text location to its canonical name, or rejects it.
/// Cities win over country-level matches ("London, UK" -> "London").
pub fn canonical_location(raw: &str) -> Result<&'static str, NormalizeError> {
    find_location_in(raw).ok_or_else(|| NormalizeError::UnknownLocation(raw.to_string()))
}

/// Finds the first known location mentioned in free text.
pub fn find_location_in(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    LOCATIONS
        .iter()
        .find(|(phrase, _)| contains_phrase(&lowered, phrase))
        .map(|(_, canonical)| *canonical)
}

/// Whole-word phrase containment over already lower-cased text.
pub(crate) fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(idx, _)| {
        let before_ok = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[idx + phrase.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

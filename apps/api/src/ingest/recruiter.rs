//! Recruiter filter: flags postings published by staffing agencies
//! rather than direct employers.
//!
//! Pure and offline: no classifier call is ever made from here. Rules are
//! evaluated in order and the first hit wins:
//! 1. dynamic patterns from `known_recruiters` (admin-curated)
//! 2. static denylist of agency name fragments
//! 3. structural name rules (agency suffixes and terms, with carve-outs)
//! 4. description phrases, only for high-noise sources

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ingest::store::ImportStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Exact => "exact",
            PatternType::Contains => "contains",
            PatternType::StartsWith => "starts_with",
            PatternType::EndsWith => "ends_with",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "exact" => Ok(PatternType::Exact),
            "contains" => Ok(PatternType::Contains),
            "starts_with" => Ok(PatternType::StartsWith),
            "ends_with" => Ok(PatternType::EndsWith),
            other => Err(format!("unknown pattern type '{other}'")),
        }
    }
}

/// One active row of `known_recruiters`, loaded once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecruiterPattern {
    pub id: Uuid,
    /// Lower-cased, trimmed.
    pub pattern: String,
    pub pattern_type: PatternType,
}

impl RecruiterPattern {
    pub fn new(id: Uuid, pattern: &str, pattern_type: PatternType) -> Self {
        Self {
            id,
            pattern: pattern.trim().to_lowercase(),
            pattern_type,
        }
    }

    /// `name` must already be normalized.
    pub fn matches(&self, name: &str) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        match self.pattern_type {
            PatternType::Exact => name == self.pattern,
            PatternType::Contains => name.contains(&self.pattern),
            PatternType::StartsWith => name.starts_with(&self.pattern),
            PatternType::EndsWith => name.ends_with(&self.pattern),
        }
    }
}

/// Which rule flagged a posting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RecruiterMatch {
    DynamicPattern {
        pattern_id: Uuid,
        pattern: String,
        pattern_type: PatternType,
    },
    KnownAgency {
        fragment: &'static str,
    },
    AgencySuffix {
        suffix: &'static str,
    },
    AgencyTerm {
        term: &'static str,
    },
    DescriptionPhrases {
        phrases: Vec<&'static str>,
    },
}

impl fmt::Display for RecruiterMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecruiterMatch::DynamicPattern {
                pattern,
                pattern_type,
                ..
            } => write!(f, "known recruiter pattern '{pattern}' ({pattern_type})"),
            RecruiterMatch::KnownAgency { fragment } => write!(f, "known agency '{fragment}'"),
            RecruiterMatch::AgencySuffix { suffix } => write!(f, "agency name suffix '{suffix}'"),
            RecruiterMatch::AgencyTerm { term } => write!(f, "agency name term '{term}'"),
            RecruiterMatch::DescriptionPhrases { phrases } => {
                write!(f, "agency phrases in description: {}", phrases.join(", "))
            }
        }
    }
}

/// Known agency name fragments, matched as substrings of the normalized name.
const KNOWN_AGENCIES: &[&str] = &[
    "hays",
    "michael page",
    "page executive",
    "robert half",
    "robert walters",
    "harvey nash",
    "reed specialist",
    "reed.co.uk",
    "randstad",
    "adecco",
    "manpower",
    "morgan mckinley",
    "hudson rpo",
    "korn ferry",
    "odgers",
    "russell reynolds",
    "spencer stuart",
    "heidrick",
    "egon zehnder",
    "boyden",
    "venn group",
    "oliver james",
    "goodman masson",
    "barclay simpson",
    "sthree",
    "computer futures",
    "huxley",
    "nigel frank",
    "jefferson frank",
    "la fosse",
    "interim partners",
];

/// Last-word suffixes typical of agency names.
const AGENCY_SUFFIXES: &[&str] = &[
    "recruitment",
    "recruiting",
    "recruiters",
    "staffing",
    "talent",
    "search",
    "partners",
];

/// Words that mark an agency anywhere in the name.
const AGENCY_TERMS: &[&str] = &["resourcing", "personnel"];

/// Legal-sector words that exempt suffix and "associates" matches.
const LEGAL_TERMS: &[&str] = &["law", "legal", "solicitor", "solicitors", "barristers", "chambers"];

/// Registration tokens stripped from the end of a name before suffix checks.
const CORPORATE_SUFFIXES: &[&str] = &[
    "ltd", "limited", "llc", "llp", "inc", "plc", "group", "uk", "co", "gmbh",
];

/// Phrases typical of third-party recruiter copy.
const AGENCY_PHRASES: &[&str] = &[
    "our client",
    "my client",
    "confidential client",
    "send your cv",
    "apply with your cv",
    "recruitment agency",
    "employment agency",
    "employment business",
    "recruiting on behalf",
    "exclusive partner",
    "retained search",
];

/// Any single occurrence of these is enough.
const DECISIVE_PHRASES: &[&str] = &["our client", "my client"];

const MIN_PHRASE_HITS: usize = 2;

/// Sources known to carry third-party recruiter posts.
pub fn is_high_noise_source(source: &str) -> bool {
    source.to_lowercase().contains("linkedin")
}

/// Rule engine over one run's pattern set.
#[derive(Debug, Clone, Default)]
pub struct RecruiterFilter {
    patterns: Vec<RecruiterPattern>,
}

impl RecruiterFilter {
    pub fn new(patterns: Vec<RecruiterPattern>) -> Self {
        Self { patterns }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_recruiter(
        &self,
        organization: &str,
        description: Option<&str>,
        source: &str,
    ) -> bool {
        self.check(organization, description, source).is_some()
    }

    /// Returns the first rule that flags the posting, if any.
    pub fn check(
        &self,
        organization: &str,
        description: Option<&str>,
        source: &str,
    ) -> Option<RecruiterMatch> {
        let name = organization.trim().to_lowercase();

        if !name.is_empty() {
            if let Some(pattern) = self.patterns.iter().find(|p| p.matches(&name)) {
                return Some(RecruiterMatch::DynamicPattern {
                    pattern_id: pattern.id,
                    pattern: pattern.pattern.clone(),
                    pattern_type: pattern.pattern_type,
                });
            }

            if let Some(fragment) = KNOWN_AGENCIES.iter().copied().find(|f| name.contains(f)) {
                return Some(RecruiterMatch::KnownAgency { fragment });
            }

            if let Some(hit) = check_name_structure(&name) {
                return Some(hit);
            }
        }

        if is_high_noise_source(source) {
            if let Some(text) = description {
                return check_description(text);
            }
        }

        None
    }
}

fn check_name_structure(name: &str) -> Option<RecruiterMatch> {
    let words = significant_words(name);
    let is_legal = words.iter().any(|w| LEGAL_TERMS.contains(w));

    if !is_legal {
        if let Some(last) = words.last() {
            if let Some(suffix) = AGENCY_SUFFIXES.iter().copied().find(|s| s == last) {
                return Some(RecruiterMatch::AgencySuffix { suffix });
            }
        }
        if words.contains(&"associates") {
            return Some(RecruiterMatch::AgencyTerm { term: "associates" });
        }
    }

    if words.contains(&"consulting") && !name.contains("tech") {
        return Some(RecruiterMatch::AgencyTerm { term: "consulting" });
    }

    if let Some(term) = AGENCY_TERMS.iter().copied().find(|t| words.contains(t)) {
        return Some(RecruiterMatch::AgencyTerm { term });
    }

    if name.starts_with("recruit") {
        return Some(RecruiterMatch::AgencyTerm { term: "recruit" });
    }

    None
}

/// Words of the name with punctuation trimmed and trailing registration
/// tokens ("Ltd", "PLC", ...) removed.
fn significant_words(name: &str) -> Vec<&str> {
    let mut words: Vec<&str> = name
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '&'))
        .filter(|w| !w.is_empty())
        .collect();
    while words.len() > 1 && words.last().is_some_and(|w| CORPORATE_SUFFIXES.contains(w)) {
        words.pop();
    }
    words
}

fn check_description(text: &str) -> Option<RecruiterMatch> {
    let lowered = text.to_lowercase();
    let hits: Vec<&'static str> = AGENCY_PHRASES
        .iter()
        .copied()
        .filter(|p| lowered.contains(p))
        .collect();

    let decisive = hits.iter().any(|h| DECISIVE_PHRASES.contains(h));
    if decisive || hits.len() >= MIN_PHRASE_HITS {
        Some(RecruiterMatch::DescriptionPhrases { phrases: hits })
    } else {
        None
    }
}

/// Bumps the matched dynamic pattern's `jobs_blocked` counter.
///
/// Best-effort: a failed increment is logged and never changes the
/// filtering decision.
pub async fn record_block(store: &dyn ImportStore, hit: &RecruiterMatch) {
    if let RecruiterMatch::DynamicPattern { pattern_id, .. } = hit {
        match store.increment_recruiter_block(*pattern_id).await {
            Ok(()) => debug!(%pattern_id, "Incremented recruiter block count"),
            Err(e) => warn!(%pattern_id, error = %e, "Failed to increment recruiter block count"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::MemoryStore;

    fn filter() -> RecruiterFilter {
        RecruiterFilter::default()
    }

    #[test]
    fn test_known_agencies_flagged() {
        assert!(filter().is_recruiter("Hays", None, "apify_career_site"));
        assert!(filter().is_recruiter("Michael Page UK", None, "apify_career_site"));
    }

    #[test]
    fn test_agency_suffixes_flagged() {
        assert_eq!(
            filter().check("Acme Recruitment", None, "apify_career_site"),
            Some(RecruiterMatch::AgencySuffix {
                suffix: "recruitment"
            })
        );
        assert_eq!(
            filter().check("Talent Partners Ltd", None, "apify_career_site"),
            Some(RecruiterMatch::AgencySuffix { suffix: "partners" })
        );
        assert!(filter().is_recruiter("Northern Executive Search", None, "x"));
    }

    #[test]
    fn test_carve_outs_not_flagged() {
        assert!(!filter().is_recruiter("Acme Consulting Tech", None, "apify_career_site"));
        assert!(!filter().is_recruiter("Smith & Associates Law", None, "apify_career_site"));
        assert!(!filter().is_recruiter("Baker Partners Legal LLP", None, "x"));
    }

    #[test]
    fn test_agency_terms_flagged() {
        assert!(filter().is_recruiter("Jones Associates", None, "x"));
        assert!(filter().is_recruiter("Bright Consulting", None, "x"));
        assert!(filter().is_recruiter("Prime Resourcing Solutions", None, "x"));
        assert!(filter().is_recruiter("RecruitCo", None, "x"));
    }

    #[test]
    fn test_direct_employers_pass() {
        assert!(!filter().is_recruiter("Monzo", None, "apify_career_site"));
        assert!(!filter().is_recruiter("Octopus Energy Ltd", None, "apify_career_site"));
    }

    #[test]
    fn test_dynamic_pattern_modes() {
        let id = Uuid::new_v4();
        let cases = [
            (PatternType::Exact, "acme hire", "Acme Hire", true),
            (PatternType::Exact, "acme hire", "Acme Hire Group", false),
            (PatternType::Contains, "hire", "Big Hire Co", true),
            (PatternType::StartsWith, "talentx", "TalentX Global", true),
            (PatternType::StartsWith, "talentx", "The TalentX", false),
            (PatternType::EndsWith, "people", "Northern People", true),
        ];
        for (pattern_type, pattern, company, expected) in cases {
            let f = RecruiterFilter::new(vec![RecruiterPattern::new(id, pattern, pattern_type)]);
            let hit = f.check(company, None, "apify_career_site");
            assert_eq!(
                matches!(hit, Some(RecruiterMatch::DynamicPattern { .. })),
                expected,
                "{pattern_type} '{pattern}' vs '{company}'"
            );
        }
    }

    #[test]
    fn test_dynamic_pattern_checked_first() {
        let id = Uuid::new_v4();
        let f = RecruiterFilter::new(vec![RecruiterPattern::new(id, "hays", PatternType::Exact)]);
        assert!(matches!(
            f.check("Hays", None, "x"),
            Some(RecruiterMatch::DynamicPattern { pattern_id, .. }) if pattern_id == id
        ));
    }

    #[test]
    fn test_description_phrases_only_for_high_noise_sources() {
        let description = "Confidential client seeks a CFO. Send your CV today.";
        assert!(matches!(
            filter().check("Neutral Co", Some(description), "apify_linkedin"),
            Some(RecruiterMatch::DescriptionPhrases { ref phrases }) if phrases.len() == 2
        ));
        assert!(!filter().is_recruiter("Neutral Co", Some(description), "apify_career_site"));
    }

    #[test]
    fn test_single_our_client_is_decisive() {
        let description = "We are delighted to be working with our client, a Series B fintech.";
        assert!(filter().is_recruiter("Neutral Co", Some(description), "linkedin_jobs"));
    }

    #[test]
    fn test_single_weak_phrase_not_enough() {
        let description = "Please send your CV and a short cover note.";
        assert!(!filter().is_recruiter("Neutral Co", Some(description), "linkedin_jobs"));
    }

    #[tokio::test]
    async fn test_record_block_increments_dynamic_pattern() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();
        let hit = RecruiterMatch::DynamicPattern {
            pattern_id: id,
            pattern: "hays".into(),
            pattern_type: PatternType::Contains,
        };
        record_block(&store, &hit).await;
        record_block(&store, &hit).await;
        assert_eq!(store.block_count(id), 2);
    }

    #[tokio::test]
    async fn test_record_block_failure_is_swallowed() {
        let store = MemoryStore::default();
        store.fail_block_increments();
        let hit = RecruiterMatch::DynamicPattern {
            pattern_id: Uuid::new_v4(),
            pattern: "hays".into(),
            pattern_type: PatternType::Contains,
        };
        // Must not panic or propagate.
        record_block(&store, &hit).await;
    }
}

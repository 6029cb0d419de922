use serde::{Deserialize, Serialize};

use crate::normalize::{NewsCategory, RoleCategory};

/// Which import pipeline a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Job,
    News,
}

impl RecordKind {
    pub fn pipeline_name(&self) -> &'static str {
        match self {
            RecordKind::Job => "jobs",
            RecordKind::News => "news",
        }
    }
}

/// A job or news item exactly as a fetcher produced it. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub title: String,
    /// Employer for jobs, publisher for news.
    pub organization: String,
    pub location: Option<String>,
    /// Full description for jobs, search snippet for news.
    pub description: String,
    pub url: String,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    /// Fetcher tag, e.g. `apify_career_site`, `apify_linkedin`, `serper_news`.
    pub source: String,
    pub external_id: String,
    pub published_date: Option<String>,
    pub image_url: Option<String>,
}

/// Category assigned by the classifier; the closed enum depends on the record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Category {
    Role(RoleCategory),
    News(NewsCategory),
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Role(r) => r.as_str(),
            Category::News(n) => n.as_str(),
        }
    }

    /// The catch-all category for a record kind.
    pub fn other_for(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Job => Category::Role(RoleCategory::Other),
            RecordKind::News => Category::News(NewsCategory::Other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_relevant: bool,
    pub category: Option<Category>,
    /// Confidence (jobs) or relevance (news) in [0, 1].
    pub score: f64,
    pub rationale: String,
}

impl ClassificationResult {
    /// Deterministic rejection substituted when the classifier fails.
    pub fn rejected(rationale: impl Into<String>) -> Self {
        Self {
            is_relevant: false,
            category: None,
            score: 0.0,
            rationale: rationale.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

/// Short-form generated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Job description snippet or news summary.
    pub snippet: String,
    /// Voice-friendly one-liner. Persisted for jobs only.
    pub teaser: String,
    /// Topic keywords (jobs) or tags (news).
    pub keywords: Vec<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
}

/// Long-form sections produced when full content generation is requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongFormContent {
    pub description: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub about_company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttribution {
    pub url: String,
    pub photographer: String,
    pub photographer_url: String,
    pub source_url: String,
}

/// The unit persisted to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub raw: RawRecord,
    pub slug: String,
    pub content_hash: String,
    pub category: Category,
    pub enrichment: Enrichment,
    pub long_form: Option<LongFormContent>,
    pub image: Option<ImageAttribution>,
}

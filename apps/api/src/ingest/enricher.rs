//! Content enrichment: generated snippet, teaser, keywords and optional
//! long-form sections for accepted records.
//!
//! Output caps are enforced here by `enforce_caps` regardless of what the
//! generator returns. When a call fails the orchestrator substitutes
//! `fallback_enrichment`, built only from fields already on the record.

use async_trait::async_trait;
use serde::Deserialize;

use crate::ingest::prompts::{
    FULL_CONTENT_PROMPT_TEMPLATE, FULL_CONTENT_ROLE, JOB_ENRICH_PROMPT_TEMPLATE, JOB_ENRICH_ROLE,
    NEWS_ENRICH_PROMPT_TEMPLATE, NEWS_ENRICH_ROLE,
};
use crate::ingest::text::{clean_text, fill_template, truncate_chars};
use crate::ingest::types::{
    Category, Enrichment, LongFormContent, RawRecord, RecordKind, Sentiment,
};
use crate::llm_client::{prompts::json_system, LlmClient, LlmError};

pub const JOB_SNIPPET_MAX_CHARS: usize = 150;
pub const NEWS_SUMMARY_MAX_CHARS: usize = 600;
pub const FALLBACK_SUMMARY_MAX_CHARS: usize = 200;
pub const MAX_KEYWORDS: usize = 10;
pub const MAX_KEY_INSIGHTS: usize = 5;
const MAX_SECTION_BULLETS: usize = 10;
const ENRICH_DESCRIPTION_CHARS: usize = 2500;
const PAGE_TEXT_CHARS: usize = 8000;
const LONG_FORM_MAX_TOKENS: u32 = 4096;

#[async_trait]
pub trait ContentEnricher: Send + Sync {
    async fn enrich(&self, record: &RawRecord, category: Category)
        -> Result<Enrichment, LlmError>;

    /// Long-form sections from the record plus best-effort scraped page text.
    async fn generate_full_content(
        &self,
        record: &RawRecord,
        category: Category,
        page_text: Option<&str>,
    ) -> Result<LongFormContent, LlmError>;
}

#[derive(Debug, Deserialize)]
struct EnrichReply {
    #[serde(alias = "description_snippet", alias = "summary")]
    snippet: String,
    #[serde(default, alias = "teaser_hook")]
    teaser: String,
    #[serde(default, alias = "topic_keywords", alias = "tags")]
    keywords: Vec<String>,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    sentiment: Option<String>,
}

pub struct LlmEnricher {
    llm: LlmClient,
    long_form_llm: LlmClient,
}

impl LlmEnricher {
    pub fn new(llm: LlmClient) -> Self {
        let long_form_llm = llm.clone().with_max_tokens(LONG_FORM_MAX_TOKENS);
        Self { llm, long_form_llm }
    }
}

#[async_trait]
impl ContentEnricher for LlmEnricher {
    async fn enrich(
        &self,
        record: &RawRecord,
        category: Category,
    ) -> Result<Enrichment, LlmError> {
        let role = match record.kind {
            RecordKind::Job => JOB_ENRICH_ROLE,
            RecordKind::News => NEWS_ENRICH_ROLE,
        };
        let prompt = build_enrich_prompt(record, category);
        let reply: EnrichReply = self.llm.call_json(&prompt, &json_system(role)).await?;

        let sentiment = match record.kind {
            RecordKind::Job => None,
            RecordKind::News => Some(parse_sentiment(reply.sentiment.as_deref())),
        };

        Ok(enforce_caps(
            record.kind,
            Enrichment {
                snippet: reply.snippet,
                teaser: reply.teaser,
                keywords: reply.keywords,
                key_insights: reply.key_insights,
                sentiment,
            },
        ))
    }

    async fn generate_full_content(
        &self,
        record: &RawRecord,
        category: Category,
        page_text: Option<&str>,
    ) -> Result<LongFormContent, LlmError> {
        let description = truncate_chars(&record.description, ENRICH_DESCRIPTION_CHARS);
        let page_text = page_text
            .map(|t| truncate_chars(t, PAGE_TEXT_CHARS))
            .unwrap_or_else(|| "(page unavailable)".to_string());
        let prompt = fill_template(
            FULL_CONTENT_PROMPT_TEMPLATE,
            &[
                ("title", record.title.as_str()),
                ("organization", record.organization.as_str()),
                ("category", category.label()),
                ("location", record.location.as_deref().unwrap_or("UK")),
                ("description", description.as_str()),
                ("page_text", page_text.as_str()),
            ],
        );

        let mut content: LongFormContent = self
            .long_form_llm
            .call_json(&prompt, &json_system(FULL_CONTENT_ROLE))
            .await?;

        content.responsibilities.truncate(MAX_SECTION_BULLETS);
        content.requirements.truncate(MAX_SECTION_BULLETS);
        content.benefits.truncate(MAX_SECTION_BULLETS);
        content.about_company = content.about_company.filter(|a| !a.trim().is_empty());
        Ok(content)
    }
}

pub fn build_enrich_prompt(record: &RawRecord, category: Category) -> String {
    let template = match record.kind {
        RecordKind::Job => JOB_ENRICH_PROMPT_TEMPLATE,
        RecordKind::News => NEWS_ENRICH_PROMPT_TEMPLATE,
    };
    let description = truncate_chars(&record.description, ENRICH_DESCRIPTION_CHARS);
    fill_template(
        template,
        &[
            ("title", record.title.as_str()),
            ("organization", record.organization.as_str()),
            ("category", category.label()),
            ("location", record.location.as_deref().unwrap_or("UK")),
            ("description", description.as_str()),
            ("date", record.published_date.as_deref().unwrap_or("Unknown")),
        ],
    )
}

fn parse_sentiment(raw: Option<&str>) -> Sentiment {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("positive") => Sentiment::Positive,
        Some("negative") => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

/// Applies length caps: snippet (150 chars for jobs, 600 for news), keywords
/// (10, blank and repeated entries dropped), key insights (5).
pub fn enforce_caps(kind: RecordKind, mut enrichment: Enrichment) -> Enrichment {
    let snippet_cap = match kind {
        RecordKind::Job => JOB_SNIPPET_MAX_CHARS,
        RecordKind::News => NEWS_SUMMARY_MAX_CHARS,
    };
    enrichment.snippet = truncate_chars(enrichment.snippet.trim(), snippet_cap);
    enrichment.teaser = enrichment.teaser.trim().to_string();

    let mut keywords: Vec<String> = Vec::with_capacity(MAX_KEYWORDS);
    for keyword in enrichment.keywords.iter().map(|k| k.trim()) {
        if keyword.is_empty() || keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
            continue;
        }
        keywords.push(keyword.to_string());
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    enrichment.keywords = keywords;

    enrichment
        .key_insights
        .retain(|insight| !insight.trim().is_empty());
    enrichment.key_insights.truncate(MAX_KEY_INSIGHTS);
    enrichment
}

/// Template enrichment derived purely from the raw record.
pub fn fallback_enrichment(record: &RawRecord, category: Category) -> Enrichment {
    let description = clean_text(&record.description);
    match record.kind {
        RecordKind::Job => {
            let snippet = if description.is_empty() {
                record.title.clone()
            } else {
                truncate_chars(&description, JOB_SNIPPET_MAX_CHARS)
            };
            Enrichment {
                snippet,
                teaser: format!(
                    "New {} opportunity at {}",
                    category.label(),
                    record.organization
                ),
                keywords: vec!["fractional".to_string(), category.label().to_lowercase()],
                key_insights: Vec::new(),
                sentiment: None,
            }
        }
        RecordKind::News => {
            let snippet = if description.is_empty() {
                record.title.clone()
            } else {
                truncate_chars(&description, FALLBACK_SUMMARY_MAX_CHARS)
            };
            Enrichment {
                snippet,
                teaser: format!("New story from {}: {}", record.organization, record.title),
                keywords: vec!["fractional".to_string(), "executive".to_string()],
                key_insights: Vec::new(),
                sentiment: Some(Sentiment::Neutral),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::{job, news};
    use crate::normalize::{NewsCategory, RoleCategory};

    fn enrichment(snippet: &str, keywords: &[&str]) -> Enrichment {
        Enrichment {
            snippet: snippet.to_string(),
            teaser: " A teaser ".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            key_insights: vec![],
            sentiment: None,
        }
    }

    #[test]
    fn test_job_snippet_truncated_to_cap() {
        let capped = enforce_caps(RecordKind::Job, enrichment(&"a".repeat(200), &[]));
        assert_eq!(capped.snippet.chars().count(), JOB_SNIPPET_MAX_CHARS);
        assert_eq!(capped.teaser, "A teaser");
    }

    #[test]
    fn test_keywords_capped_and_deduplicated() {
        let raw: Vec<String> = (0..15).map(|i| format!("kw{i}")).collect();
        let mut keywords: Vec<&str> = vec!["Fintech", "fintech", "  "];
        keywords.extend(raw.iter().map(|s| s.as_str()));
        let capped = enforce_caps(RecordKind::Job, enrichment("s", &keywords));
        assert_eq!(capped.keywords.len(), MAX_KEYWORDS);
        assert_eq!(capped.keywords[0], "Fintech");
        assert_eq!(capped.keywords[1], "kw0");
    }

    #[test]
    fn test_key_insights_capped() {
        let mut e = enrichment("s", &[]);
        e.key_insights = (0..8).map(|i| format!("insight {i}")).collect();
        let capped = enforce_caps(RecordKind::News, e);
        assert_eq!(capped.key_insights.len(), MAX_KEY_INSIGHTS);
    }

    #[test]
    fn test_job_fallback() {
        let mut record = job("Fractional CFO", "Acme Ltd", Some("London"));
        record.description = "  Lead   finance ".repeat(30);
        let e = fallback_enrichment(&record, Category::Role(RoleCategory::Cfo));
        assert_eq!(e.teaser, "New CFO opportunity at Acme Ltd");
        assert_eq!(e.keywords, vec!["fractional", "cfo"]);
        assert!(e.snippet.chars().count() <= JOB_SNIPPET_MAX_CHARS);
        assert!(e.snippet.starts_with("Lead finance"));
    }

    #[test]
    fn test_news_fallback() {
        let mut record = news("Fractional boom", "FT");
        record.description = "s".repeat(500);
        let e = fallback_enrichment(&record, Category::News(NewsCategory::Trends));
        assert_eq!(e.snippet.chars().count(), FALLBACK_SUMMARY_MAX_CHARS);
        assert_eq!(e.keywords, vec!["fractional", "executive"]);
        assert_eq!(e.sentiment, Some(Sentiment::Neutral));
    }

    #[test]
    fn test_fallback_without_description_uses_title() {
        let mut record = job("Interim COO", "Beta", None);
        record.description = String::new();
        let e = fallback_enrichment(&record, Category::Role(RoleCategory::Coo));
        assert_eq!(e.snippet, "Interim COO");
    }

    #[test]
    fn test_enrich_prompt_fields() {
        let record = news("Fractional boom", "FT");
        let prompt = build_enrich_prompt(&record, Category::News(NewsCategory::CaseStudy));
        assert!(prompt.contains("Category: case_study"));
        assert!(prompt.contains("Date: Unknown"));
    }

    #[test]
    fn test_parse_sentiment_defaults_to_neutral() {
        assert_eq!(parse_sentiment(Some(" Positive ")), Sentiment::Positive);
        assert_eq!(parse_sentiment(Some("mixed")), Sentiment::Neutral);
        assert_eq!(parse_sentiment(None), Sentiment::Neutral);
    }
}

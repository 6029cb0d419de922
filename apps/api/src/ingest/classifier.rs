//! Relevance classification: decides whether a raw record is in scope and
//! assigns a category and score.
//!
//! `LlmClassifier` is the production backend. The orchestrator holds an
//! `Arc<dyn RelevanceClassifier>` and converts any error into a
//! deterministic rejection, so implementations may fail freely.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::ingest::prompts::{
    JOB_CLASSIFY_PROMPT_TEMPLATE, JOB_CLASSIFY_ROLE, NEWS_CLASSIFY_PROMPT_TEMPLATE,
    NEWS_CLASSIFY_ROLE,
};
use crate::ingest::text::{fill_template, truncate_chars};
use crate::ingest::types::{Category, ClassificationResult, RawRecord, RecordKind};
use crate::llm_client::{prompts::json_system, LlmClient, LlmError};
use crate::normalize::{NewsCategory, RoleCategory};

/// Description budget sent to the classifier.
pub const CLASSIFIER_DESCRIPTION_CHARS: usize = 2000;

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(&self, record: &RawRecord) -> Result<ClassificationResult, LlmError>;
}

/// Wire shape of the model's reply. Older prompt variants used
/// `confidence` / `relevance_score` / `reasoning`, which are still accepted.
#[derive(Debug, Deserialize)]
pub struct ClassifierReply {
    pub is_relevant: bool,
    #[serde(default, alias = "role_category")]
    pub category: Option<String>,
    #[serde(default, alias = "confidence", alias = "relevance_score")]
    pub score: f64,
    #[serde(default, alias = "reasoning")]
    pub rationale: String,
}

pub struct LlmClassifier {
    llm: LlmClient,
}

impl LlmClassifier {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl RelevanceClassifier for LlmClassifier {
    async fn classify(&self, record: &RawRecord) -> Result<ClassificationResult, LlmError> {
        let role = match record.kind {
            RecordKind::Job => JOB_CLASSIFY_ROLE,
            RecordKind::News => NEWS_CLASSIFY_ROLE,
        };
        let prompt = build_classify_prompt(record);
        let reply: ClassifierReply = self.llm.call_json(&prompt, &json_system(role)).await?;
        Ok(interpret_reply(record.kind, reply))
    }
}

pub fn build_classify_prompt(record: &RawRecord) -> String {
    let template = match record.kind {
        RecordKind::Job => JOB_CLASSIFY_PROMPT_TEMPLATE,
        RecordKind::News => NEWS_CLASSIFY_PROMPT_TEMPLATE,
    };
    let description = truncate_chars(&record.description, CLASSIFIER_DESCRIPTION_CHARS);
    fill_template(
        template,
        &[
            ("title", record.title.as_str()),
            ("organization", record.organization.as_str()),
            (
                "location",
                record.location.as_deref().unwrap_or("Not specified"),
            ),
            ("description", description.as_str()),
            ("url", record.url.as_str()),
        ],
    )
}

/// Maps a reply onto the closed category enum for the record kind and
/// clamps the score into [0, 1].
pub fn interpret_reply(kind: RecordKind, reply: ClassifierReply) -> ClassificationResult {
    let category = reply
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|label| parse_category(kind, label));

    let score = if reply.score.is_finite() {
        reply.score.clamp(0.0, 1.0)
    } else {
        0.0
    };

    ClassificationResult {
        is_relevant: reply.is_relevant,
        category,
        score,
        rationale: reply.rationale,
    }
}

fn parse_category(kind: RecordKind, label: &str) -> Category {
    let parsed = match kind {
        RecordKind::Job => label.parse::<RoleCategory>().map(Category::Role),
        RecordKind::News => label.parse::<NewsCategory>().map(Category::News),
    };
    parsed.unwrap_or_else(|e| {
        warn!(label, error = %e, "Classifier returned unknown category, using other");
        Category::other_for(kind)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::{job, news};
    use crate::llm_client::parse_json_reply;

    #[test]
    fn test_prompt_truncates_description() {
        let mut record = job("Fractional CTO", "Acme", None);
        record.description = "x".repeat(5000);
        let prompt = build_classify_prompt(&record);
        assert!(prompt.contains(&"x".repeat(CLASSIFIER_DESCRIPTION_CHARS)));
        assert!(!prompt.contains(&"x".repeat(CLASSIFIER_DESCRIPTION_CHARS + 1)));
        assert!(prompt.contains("Location: Not specified"));
    }

    #[test]
    fn test_prompt_keeps_braces_in_record_text() {
        let mut record = job("CTO {description}", "Acme", Some("London"));
        record.description = "Owns the {url} rollout".to_string();
        let prompt = build_classify_prompt(&record);
        assert!(prompt.contains("CTO {description}"));
        assert!(prompt.contains("Owns the {url} rollout"));
        assert!(!prompt.contains("CTO Owns the"));
    }

    #[test]
    fn test_news_prompt_uses_snippet_and_source() {
        let record = news("Fractional CFOs on the rise", "Financial Times");
        let prompt = build_classify_prompt(&record);
        assert!(prompt.contains("Source: Financial Times"));
        assert!(prompt.contains("case_study"));
    }

    #[test]
    fn test_interpret_job_reply_with_alias_category() {
        let reply: ClassifierReply = parse_json_reply(
            r#"{"is_relevant": true, "role_category": "Fractional Chief Technology Officer",
                "confidence": 0.82, "reasoning": "Part-time CTO"}"#,
        )
        .unwrap();
        let result = interpret_reply(RecordKind::Job, reply);
        assert_eq!(result.category, Some(Category::Role(RoleCategory::Cto)));
        assert!((result.score - 0.82).abs() < f64::EPSILON);
        assert_eq!(result.rationale, "Part-time CTO");
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let reply: ClassifierReply = parse_json_reply(
            r#"{"is_relevant": true, "category": "Head of Vibes", "score": 0.9, "rationale": ""}"#,
        )
        .unwrap();
        let result = interpret_reply(RecordKind::Job, reply);
        assert_eq!(result.category, Some(Category::Role(RoleCategory::Other)));

        let reply: ClassifierReply = parse_json_reply(
            r#"{"is_relevant": true, "category": "gossip", "score": 0.9}"#,
        )
        .unwrap();
        let result = interpret_reply(RecordKind::News, reply);
        assert_eq!(result.category, Some(Category::News(NewsCategory::Other)));
    }

    #[test]
    fn test_news_category_and_score_clamped() {
        let reply: ClassifierReply = parse_json_reply(
            r#"{"is_relevant": true, "category": "market report", "relevance_score": 1.7}"#,
        )
        .unwrap();
        let result = interpret_reply(RecordKind::News, reply);
        assert_eq!(result.category, Some(Category::News(NewsCategory::MarketReport)));
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_missing_category_stays_none() {
        let reply: ClassifierReply =
            parse_json_reply(r#"{"is_relevant": false, "score": 0.1}"#).unwrap();
        assert_eq!(interpret_reply(RecordKind::Job, reply).category, None);
    }
}

//! Contextual stock images with attribution (Unsplash).
//!
//! Failures omit the image; they never fail the record.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ingest::types::{Category, ImageAttribution};
use crate::normalize::{contains_phrase, NewsCategory, RoleCategory};

const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const GENERIC_QUERY: &str = "professional business executive";

#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn find_image(&self, category: Category, tags: &[String]) -> Option<ImageAttribution>;
}

fn role_query(role: RoleCategory) -> &'static str {
    match role {
        RoleCategory::Cfo => "finance executive boardroom",
        RoleCategory::Cto => "technology executive modern office",
        RoleCategory::Cmo => "marketing executive creative",
        RoleCategory::Coo => "operations management business",
        RoleCategory::Ceo => "executive leadership boardroom",
        RoleCategory::Chro => "human resources team meeting",
        RoleCategory::Cpo => "product design innovation",
        RoleCategory::Ciso => "cybersecurity technology",
        RoleCategory::Other => "executive leadership business",
    }
}

fn news_query(category: NewsCategory) -> &'static str {
    match category {
        NewsCategory::Trends => "business strategy modern office",
        NewsCategory::Hiring => "executive interview professional",
        NewsCategory::Opinion => "business leader thinking",
        NewsCategory::CaseStudy => "success business team",
        NewsCategory::MarketReport => "financial charts data analysis",
        NewsCategory::Other => GENERIC_QUERY,
    }
}

/// Queries to try, in order. Jobs use their role; news tries a role
/// mentioned in the tags, then the category, then a generic query.
pub fn search_queries(category: Category, tags: &[String]) -> Vec<&'static str> {
    let mut queries = Vec::new();
    match category {
        Category::Role(role) => queries.push(role_query(role)),
        Category::News(news) => {
            let tags_lower: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
            let tagged_role = RoleCategory::ALL.iter().find(|role| {
                **role != RoleCategory::Other
                    && tags_lower
                        .iter()
                        .any(|t| contains_phrase(t, &role.as_str().to_lowercase()))
            });
            if let Some(role) = tagged_role {
                queries.push(role_query(*role));
            }
            queries.push(news_query(news));
            queries.push(GENERIC_QUERY);
        }
    }
    queries.dedup();
    queries
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
    user: PhotoUser,
    links: PhotoLinks,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
    links: PhotoLinks,
}

#[derive(Debug, Deserialize)]
struct PhotoLinks {
    html: String,
}

pub struct UnsplashClient {
    client: reqwest::Client,
    access_key: String,
}

impl UnsplashClient {
    pub fn new(access_key: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, access_key })
    }

    async fn search(&self, query: &str) -> Result<Option<ImageAttribution>, reqwest::Error> {
        let response = self
            .client
            .get(UNSPLASH_SEARCH_URL)
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .query(&[
                ("query", query),
                ("orientation", "landscape"),
                ("per_page", "1"),
                ("content_filter", "high"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), query, "Unsplash search failed");
            return Ok(None);
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results.into_iter().next().map(|photo| ImageAttribution {
            url: photo.urls.regular,
            photographer: photo.user.name,
            photographer_url: photo.user.links.html,
            source_url: photo.links.html,
        }))
    }
}

#[async_trait]
impl ImageSearch for UnsplashClient {
    async fn find_image(&self, category: Category, tags: &[String]) -> Option<ImageAttribution> {
        for query in search_queries(category, tags) {
            match self.search(query).await {
                Ok(Some(image)) => {
                    debug!(query, "Found image");
                    return Some(image);
                }
                Ok(None) => debug!(query, "No image for query"),
                Err(e) => warn!(query, error = %e, "Unsplash request failed"),
            }
        }
        None
    }
}

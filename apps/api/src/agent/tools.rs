//! Typed tool surface for the conversational agent.
//!
//! `ToolCommand` is the closed set of calls the agent may make; the
//! registry publishes each one's schemas so the model-side orchestrator can
//! be configured from `GET /api/v1/tools`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use thiserror::Error;

use crate::agent::market::{
    build_dashboard, count_by_location, count_by_role, featured_articles, location_chart,
    market_counts, role_chart, salary_insights, DEFAULT_FEATURED_ARTICLES,
};
use crate::errors::AppError;
use crate::tscr::fast_path::FastPath;
use crate::tscr::search::FULL_RESULTS_LIMIT;

pub const FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't get that information right now. Please try again in a moment.";

#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArgs { tool: String, reason: String },
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCommand {
    SearchJobs {
        query: String,
    },
    QuickJobTeaser {
        query: String,
    },
    TellMeMore {},
    ShowJobsChart {},
    ShowLocationChart {},
    ShowSalaryInsights {},
    ShowMarketDashboard {},
    GetFeaturedArticles {
        #[serde(default)]
        limit: Option<i64>,
    },
}

impl ToolCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCommand::SearchJobs { .. } => "search_jobs",
            ToolCommand::QuickJobTeaser { .. } => "quick_job_teaser",
            ToolCommand::TellMeMore {} => "tell_me_more",
            ToolCommand::ShowJobsChart {} => "show_jobs_chart",
            ToolCommand::ShowLocationChart {} => "show_location_chart",
            ToolCommand::ShowSalaryInsights {} => "show_salary_insights",
            ToolCommand::ShowMarketDashboard {} => "show_market_dashboard",
            ToolCommand::GetFeaturedArticles { .. } => "get_featured_articles",
        }
    }

    fn validate(&self) -> Result<(), ToolError> {
        match self {
            ToolCommand::SearchJobs { query } | ToolCommand::QuickJobTeaser { query }
                if query.trim().is_empty() =>
            {
                Err(ToolError::InvalidArgs {
                    tool: self.name().to_string(),
                    reason: "query must not be empty".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub output_schema: Value,
}

pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn query_arg(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { "query": { "type": "string", "description": description } },
        "required": ["query"]
    })
}

fn chart_output(point: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "chartData": { "type": "array", "items": point },
            "title": { "type": "string" },
            "subtitle": { "type": "string" }
        }
    })
}

fn job_summary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "slug": { "type": "string" },
            "title": { "type": "string" },
            "company_name": { "type": "string" },
            "location": { "type": ["string", "null"] },
            "role_category": { "type": "string" },
            "description_snippet": { "type": "string" },
            "url": { "type": "string" },
            "salary_min": { "type": ["integer", "null"] },
            "salary_max": { "type": ["integer", "null"] }
        }
    })
}

fn job_list_output() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "jobs": { "type": "array", "items": job_summary_schema() }
        }
    })
}

impl ToolRegistry {
    pub fn standard() -> Self {
        let count_point = json!({
            "type": "object",
            "properties": { "name": { "type": "string" }, "jobs": { "type": "integer" } }
        });

        let specs = vec![
            ToolSpec {
                name: "search_jobs",
                description: "Search active fractional executive jobs by role, location or keyword.",
                input_schema: query_arg("Free-text search, e.g. \"CFO roles in Manchester\""),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "jobs": { "type": "array", "items": job_summary_schema() }
                    }
                }),
            },
            ToolSpec {
                name: "quick_job_teaser",
                description: "Answer instantly with a one-line teaser from the keyword cache while full results load.",
                input_schema: query_arg("What the user asked for"),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "source": { "enum": ["cache", "full_search", "no_results"] },
                        "teasers": { "type": "array" },
                        "jobs": { "type": "array" },
                        "more_available": { "type": "boolean" }
                    }
                }),
            },
            ToolSpec {
                name: "tell_me_more",
                description: "Full results for the last query in this session.",
                input_schema: no_args(),
                output_schema: job_list_output(),
            },
            ToolSpec {
                name: "show_jobs_chart",
                description: "Bar chart of active jobs by role.",
                input_schema: no_args(),
                output_schema: chart_output(count_point.clone()),
            },
            ToolSpec {
                name: "show_location_chart",
                description: "Pie chart of active jobs by location.",
                input_schema: no_args(),
                output_schema: chart_output(count_point),
            },
            ToolSpec {
                name: "show_salary_insights",
                description: "Typical day-rate ranges by executive role.",
                input_schema: no_args(),
                output_schema: chart_output(json!({
                    "type": "object",
                    "properties": {
                        "role": { "type": "string" },
                        "min": { "type": "integer" },
                        "max": { "type": "integer" },
                        "avg": { "type": "integer" }
                    }
                })),
            },
            ToolSpec {
                name: "show_market_dashboard",
                description: "Headline market metrics and the most common roles.",
                input_schema: no_args(),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "metrics": { "type": "object" },
                        "topRoles": { "type": "array" },
                        "title": { "type": "string" },
                        "lastUpdated": { "type": "string", "format": "date-time" }
                    }
                }),
            },
            ToolSpec {
                name: "get_featured_articles",
                description: "Recent articles about fractional executive work, with images.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "limit": { "type": "integer", "minimum": 1, "maximum": 20 } }
                }),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "articles": { "type": "array" }
                    }
                }),
            },
        ];
        Self { specs }
    }

    /// Parses a `{tool, args}` invocation against the registry. `args` may
    /// be null for tools without parameters.
    pub fn parse(&self, tool: &str, args: Value) -> Result<ToolCommand, ToolError> {
        if self.get(tool).is_none() {
            return Err(ToolError::UnknownTool(tool.to_string()));
        }
        let mut object = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ToolError::InvalidArgs {
                    tool: tool.to_string(),
                    reason: format!("expected an object, got {other}"),
                })
            }
        };
        object.insert("tool".to_string(), Value::String(tool.to_string()));

        let command: ToolCommand =
            serde_json::from_value(Value::Object(object)).map_err(|e| ToolError::InvalidArgs {
                tool: tool.to_string(),
                reason: e.to_string(),
            })?;
        command.validate()?;
        Ok(command)
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dispatch
// ────────────────────────────────────────────────────────────────────────────

/// Result of a tool call as returned to the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub tool: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Value,
}

pub async fn dispatch(
    db: &PgPool,
    fast_path: &FastPath,
    session_id: &str,
    command: &ToolCommand,
) -> Result<Value, AppError> {
    let data = match command {
        ToolCommand::SearchJobs { query } => {
            let jobs = fast_path.search().search(query, FULL_RESULTS_LIMIT).await?;
            let first_id = jobs.first().map(|j| j.id);
            fast_path
                .sessions()
                .update(session_id, |ctx| {
                    ctx.last_query = Some(query.clone());
                    ctx.last_job_id = first_id;
                })
                .await;
            json!({ "query": query, "jobs": jobs })
        }
        ToolCommand::QuickJobTeaser { query } => {
            to_json(fast_path.quick_teaser(session_id, query).await?)?
        }
        ToolCommand::TellMeMore {} => to_json(fast_path.tell_me_more(session_id).await?)?,
        ToolCommand::ShowJobsChart {} => to_json(role_chart(count_by_role(db).await?))?,
        ToolCommand::ShowLocationChart {} => to_json(location_chart(count_by_location(db).await?))?,
        ToolCommand::ShowSalaryInsights {} => to_json(salary_insights())?,
        ToolCommand::ShowMarketDashboard {} => {
            let counts = market_counts(db).await?;
            let by_role = count_by_role(db).await?;
            to_json(build_dashboard(counts, by_role))?
        }
        ToolCommand::GetFeaturedArticles { limit } => {
            let articles =
                featured_articles(db, limit.unwrap_or(DEFAULT_FEATURED_ARTICLES)).await?;
            json!({ "title": "Featured Insights", "articles": articles })
        }
    };
    Ok(data)
}

fn to_json<T: Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

/// Runs a tool, turning any failure into the generic fallback reply.
pub async fn invoke(
    db: &PgPool,
    fast_path: &FastPath,
    session_id: &str,
    command: &ToolCommand,
) -> ToolOutcome {
    let tool = command.name();
    match dispatch(db, fast_path, session_id, command).await {
        Ok(data) => {
            tracing::info!(tool, session_id, "Tool call succeeded");
            ToolOutcome {
                tool,
                ok: true,
                message: None,
                data,
            }
        }
        Err(e) => {
            tracing::error!(tool, session_id, error = %e, "Tool call failed");
            ToolOutcome {
                tool,
                ok: false,
                message: Some(FALLBACK_MESSAGE.to_string()),
                data: Value::Null,
            }
        }
    }
}

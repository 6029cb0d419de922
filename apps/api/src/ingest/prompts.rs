// Prompt templates for the import pipeline's classifier and enricher.
// Placeholders in `{braces}` are replaced before sending.

/// Role description for job classification.
pub const JOB_CLASSIFY_ROLE: &str =
    "You are a job classification expert for a fractional executive jobs platform.";

pub const JOB_CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify this job posting.

FRACTIONAL roles are:
- Part-time executive leadership (typically 2-4 days/week)
- Interim executive positions (temporary full-time, 3-12 months)
- Portfolio careers (executive working with multiple clients)
- Fractional or part-time C-suite or VP-level positions

Role categories (choose exactly one):
- CTO (Chief Technology Officer, VP Engineering, Tech Director)
- CFO (Chief Financial Officer, Finance Director, VP Finance)
- CMO (Chief Marketing Officer, Marketing Director, VP Marketing)
- COO (Chief Operating Officer, Operations Director)
- CPO (Chief Product Officer, VP Product, Head of Product)
- CHRO (Chief HR Officer, HR Director, People Director)
- CISO (Chief Information Security Officer, Security Director)
- CEO (Chief Executive Officer, Managing Director)
- OTHER (relevant executive role not fitting above)

Reject: full-time permanent positions (unless explicitly interim), junior or
mid-level roles, non-executive positions, recruitment agency internal roles,
contract developer roles below CTO level. When in doubt, reject.

Return a JSON object with this EXACT schema:
{
  "is_relevant": true,
  "category": "CTO",
  "score": 0.85,
  "rationale": "One or two sentences."
}

"score" is your confidence in [0.0, 1.0].

Title: {title}
Company: {organization}
Location: {location}
Description: {description}
URL: {url}"#;

/// Role description for news classification.
pub const NEWS_CLASSIFY_ROLE: &str =
    "You are a news classifier for a fractional executive platform.";

pub const NEWS_CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify this news article.

RELEVANT articles are about fractional or interim executive hiring, part-time
C-suite trends, portfolio careers, companies hiring fractional leaders, market
data for interim leadership, and the benefits or challenges of fractional work.

NOT relevant: general job market news, full-time executive appointments,
fractional ownership (property, jets), unrelated business news, recruitment
agency marketing.

Categories (choose exactly one):
- trends: industry trends and market analysis
- hiring: specific hiring news or announcements
- opinion: thought leadership and expert opinion
- case_study: success stories and examples
- market_report: data and statistics
- other: relevant but fits none of the above

Return a JSON object with this EXACT schema:
{
  "is_relevant": true,
  "category": "trends",
  "score": 0.8,
  "rationale": "One or two sentences."
}

"score" is the article's relevance in [0.0, 1.0].

Title: {title}
Source: {organization}
Snippet: {description}
URL: {url}"#;

pub const JOB_ENRICH_ROLE: &str =
    "You enrich job listings for a premium fractional executive platform.";

pub const JOB_ENRICH_PROMPT_TEMPLATE: &str = r#"Enrich this fractional executive job listing.

Return a JSON object with this EXACT schema:
{
  "snippet": "At most 150 characters. Action-oriented summary of what makes the role exciting.",
  "teaser": "One voice-friendly sentence, e.g. Exciting Fractional CTO role at a fast-growing fintech in London",
  "keywords": ["5-10 searchable terms: role type, industry, skills, location, company stage"]
}

Title: {title}
Company: {organization}
Role Category: {category}
Location: {location}
Description: {description}"#;

pub const NEWS_ENRICH_ROLE: &str =
    "You enrich news articles for a fractional executive platform.";

pub const NEWS_ENRICH_PROMPT_TEMPLATE: &str = r#"Enrich this news article about fractional executives.

Return a JSON object with this EXACT schema:
{
  "snippet": "2-3 sentence summary focused on what matters to fractional executives.",
  "teaser": "One voice-friendly sentence.",
  "keywords": ["5-10 tags: role types, industries, topics, locations"],
  "key_insights": ["3-5 actionable takeaways"],
  "sentiment": "positive | neutral | negative"
}

Title: {title}
Source: {organization}
Category: {category}
Snippet: {description}
Date: {date}"#;

pub const FULL_CONTENT_ROLE: &str =
    "You write structured, factual job pages for a fractional executive platform. \
    Only use facts present in the listing and page text.";

pub const FULL_CONTENT_PROMPT_TEMPLATE: &str = r#"Write the full job page for this listing.

Return a JSON object with this EXACT schema:
{
  "description": "2-4 paragraph narrative description of the role",
  "responsibilities": ["4-8 bullets"],
  "requirements": ["4-8 bullets"],
  "benefits": ["0-6 bullets, only if stated"],
  "about_company": "2-3 sentences, or null if unknown"
}

Title: {title}
Company: {organization}
Role Category: {category}
Location: {location}
Listing description: {description}

Page text:
{page_text}"#;

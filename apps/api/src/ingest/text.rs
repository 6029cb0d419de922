//! Small text helpers shared by the pipeline stages.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").expect("valid regex"));
static RE_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

const SLUG_MAX_LEN: usize = 80;

/// Truncates to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Replaces `{name}` placeholders in a single pass over `template`.
/// Substituted values are never rescanned, and unknown placeholders stay
/// as written.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Collapses runs of whitespace and trims.
pub fn clean_text(text: &str) -> String {
    RE_WS.replace_all(text, " ").trim().to_string()
}

/// URL slug from a title, with the company appended when the title doesn't
/// already mention it. "Fractional CFO at Tech Corp" -> "fractional-cfo-at-tech-corp".
pub fn generate_slug(title: &str, company: &str) -> String {
    if title.trim().is_empty() {
        return String::new();
    }

    let text = if !company.trim().is_empty()
        && !title.to_lowercase().contains(&company.trim().to_lowercase())
    {
        format!("{title} {company}")
    } else {
        title.to_string()
    };

    let slug = text.to_lowercase();
    let slug = RE_NON_WORD.replace_all(&slug, "");
    let slug = RE_SEPARATORS.replace_all(&slug, "-");
    let slug = RE_HYPHENS.replace_all(&slug, "-");
    let slug = slug.trim_matches('-');

    if slug.chars().count() <= SLUG_MAX_LEN {
        return slug.to_string();
    }

    // Cut at the last word boundary inside the limit.
    let cut = truncate_chars(slug, SLUG_MAX_LEN);
    match cut.rsplit_once('-') {
        Some((head, _)) if !head.is_empty() => head.to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("£100k role", 4), "£100");
        assert_eq!(truncate_chars("short", 150), "short");
    }

    #[test]
    fn test_fill_template_leaves_values_alone() {
        let filled = fill_template(
            "Title: {title}\nBody: {description}\nJSON: {\"score\": 1} {other}",
            &[("title", "CTO {description}"), ("description", "Lead {title}")],
        );
        assert_eq!(
            filled,
            "Title: CTO {description}\nBody: Lead {title}\nJSON: {\"score\": 1} {other}"
        );
    }

    #[test]
    fn test_slug_appends_company() {
        assert_eq!(
            generate_slug("Senior CTO Role - London", "Acme"),
            "senior-cto-role-london-acme"
        );
    }

    #[test]
    fn test_slug_skips_company_already_in_title() {
        assert_eq!(
            generate_slug("Fractional CFO at Tech Corp", "Tech Corp"),
            "fractional-cfo-at-tech-corp"
        );
    }

    #[test]
    fn test_slug_truncates_at_word_boundary() {
        let title = "word ".repeat(40);
        let slug = generate_slug(&title, "");
        assert!(slug.len() <= 80);
        assert!(!slug.ends_with('-'));
        assert!(slug.ends_with("word"));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a \n\t b  "), "a b");
    }
}

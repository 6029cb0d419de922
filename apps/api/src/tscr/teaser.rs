use crate::tscr::keyword_cache::TeaserEntry;

/// Renders a salary figure for speech. Values of 1000 or more are annual
/// salaries (`£150k`), smaller ones day rates (`£900 a day`).
pub fn format_salary(value: i32) -> String {
    if value >= 1000 {
        let thousands = (f64::from(value) / 1000.0).round() as i64;
        format!("£{thousands}k")
    } else {
        format!("£{value} a day")
    }
}

/// One spoken sentence about the best match, plus a count of the rest.
///
/// The stored hook wins; otherwise the sentence is assembled from
/// location and top salary, whichever are present.
pub fn compose_teaser(best: &TeaserEntry, others: usize) -> String {
    let mut text = match (&best.hook, &best.location, best.salary_max) {
        (Some(hook), _, _) => sentence(hook),
        (None, Some(location), Some(salary)) => format!(
            "There's a {} role at {} in {}, paying up to {}.",
            best.title,
            best.company,
            location,
            format_salary(salary)
        ),
        (None, Some(location), None) => {
            format!("There's a {} role at {} in {}.", best.title, best.company, location)
        }
        (None, None, _) => format!("There's a {} role at {}.", best.title, best.company),
    };

    match others {
        0 => {}
        1 => text.push_str(" I found 1 more match as well."),
        n => text.push_str(&format!(" I found {n} more matches as well.")),
    }
    text
}

fn sentence(text: &str) -> String {
    let text = text.trim();
    if text.ends_with(|c| matches!(c, '.' | '!' | '?')) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn entry() -> TeaserEntry {
        TeaserEntry {
            id: Uuid::nil(),
            title: "Fractional CTO".to_string(),
            company: "Acme".to_string(),
            location: None,
            category: "CTO".to_string(),
            hook: None,
            salary_max: None,
        }
    }

    #[test]
    fn test_hook_takes_priority() {
        let e = TeaserEntry {
            hook: Some("Lead the platform rebuild at a Series B fintech".to_string()),
            location: Some("London".to_string()),
            salary_max: Some(150_000),
            ..entry()
        };
        assert_eq!(
            compose_teaser(&e, 0),
            "Lead the platform rebuild at a Series B fintech."
        );
    }

    #[test]
    fn test_location_and_salary() {
        let e = TeaserEntry {
            location: Some("London".to_string()),
            salary_max: Some(150_000),
            ..entry()
        };
        assert_eq!(
            compose_teaser(&e, 2),
            "There's a Fractional CTO role at Acme in London, paying up to £150k. I found 2 more matches as well."
        );
    }

    #[test]
    fn test_location_only_and_generic() {
        let located = TeaserEntry {
            location: Some("Remote".to_string()),
            ..entry()
        };
        assert_eq!(
            compose_teaser(&located, 1),
            "There's a Fractional CTO role at Acme in Remote. I found 1 more match as well."
        );
        // Salary without a location falls through to the generic sentence.
        let unlocated = TeaserEntry {
            salary_max: Some(900),
            ..entry()
        };
        assert_eq!(compose_teaser(&unlocated, 0), "There's a Fractional CTO role at Acme.");
    }

    #[test]
    fn test_format_salary() {
        assert_eq!(format_salary(150_000), "£150k");
        assert_eq!(format_salary(95_500), "£96k");
        assert_eq!(format_salary(1_000), "£1k");
        assert_eq!(format_salary(850), "£850 a day");
    }
}

//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Characters of a review body shown in the moderation table.
const SNIPPET_CHARS: usize = 120;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Cuts long text to a fixed number of characters.
///
/// Usage in templates: `{{ review.body|snippet }}`
#[askama::filter_fn]
pub fn snippet(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(cut(&value.to_string(), SNIPPET_CHARS))
}

fn cut(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}…", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut() {
        assert_eq!(cut(" short ", 10), "short");
        assert_eq!(cut("abcdefghij klm", 10), "abcdefghij…");
        assert_eq!(cut("abcde fghij", 6), "abcde…");
    }
}

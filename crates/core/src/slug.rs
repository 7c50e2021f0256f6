//! URL slug generation.

/// Turn a display name into a URL slug.
///
/// ASCII letters and digits are kept (lower-cased); every run of other
/// characters collapses into a single `-`, and leading/trailing dashes are
/// dropped.
///
/// ```
/// use meridian_core::slug::slugify;
///
/// assert_eq!(slugify("Linen Shirt (Natural)"), "linen-shirt-natural");
/// assert_eq!(slugify("  --Café  Noir-- "), "caf-noir");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Whether a user-supplied slug is already in canonical form.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Wool   Socks / 3-Pack"), "wool-socks-3-pack");
    }

    #[test]
    fn test_slugify_empty_and_symbols_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("summer-sale-2024"));
        assert!(!is_valid_slug("Summer Sale"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug(""));
    }
}

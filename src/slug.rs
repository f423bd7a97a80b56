//! URL slugs for categories, tags, posts and author profiles
//!
//! Lowercase ASCII, words separated by single hyphens. Latin-1 accented
//! letters are folded to their base letter; any other non-ASCII character
//! is dropped.

/// Derive a slug from a title or name.
///
/// Deterministic: the same input always yields the same slug.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.chars().flat_map(fold_to_ascii) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
        }
        // punctuation is removed without splitting words
    }

    slug
}

/// Append `-2`, `-3`, ... until `taken` reports the candidate is free.
pub fn unique_slug<F>(base: &str, mut taken: F) -> Result<String, crate::EngagementError>
where
    F: FnMut(&str) -> Result<bool, crate::EngagementError>,
{
    let base = if base.is_empty() { "item" } else { base };
    if !taken(base)? {
        return Ok(base.to_string());
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn fold_to_ascii(ch: char) -> impl Iterator<Item = char> {
    let folded: &'static str = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        _ => "",
    };
    let keep = if folded.is_empty() && ch.is_ascii() { Some(ch) } else { None };
    folded.chars().chain(keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_title() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust   for  Beginners "), "rust-for-beginners");
    }

    #[test]
    fn test_punctuation_and_hyphens() {
        assert_eq!(slugify("What's new? (2024)"), "whats-new-2024");
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_ascii_folding() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("Straße"), "strasse");
        assert_eq!(slugify("日本 Tech"), "tech");
    }

    #[test]
    fn test_unique_slug_appends_suffix() {
        let existing = ["post", "post-2"];
        let slug = unique_slug("post", |c| Ok(existing.contains(&c))).unwrap();
        assert_eq!(slug, "post-3");

        let fresh = unique_slug("other", |c| Ok(existing.contains(&c))).unwrap();
        assert_eq!(fresh, "other");
    }

    #[test]
    fn test_unique_slug_empty_base() {
        let slug = unique_slug("", |_| Ok(false)).unwrap();
        assert_eq!(slug, "item");
    }
}

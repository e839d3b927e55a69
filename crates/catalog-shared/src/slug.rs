//! URL slugs for courses.
//!
//! A slug is a short random prefix followed by a normalised form of the
//! course name (`x7k2-intro-to-rust`). The prefix is drawn fresh on every
//! call, so a collision is resolved by simply generating again.

use std::future::Future;

use rand::Rng;

use crate::constants::{MAX_SLUG_ATTEMPTS, SLUG_ALPHABET, SLUG_PREFIX_LEN};

/// Random lowercase alphanumeric string of `len` characters.
pub fn random_prefix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Normalise a display name into the hyphenated part of a slug.
///
/// Lowercases, trims, turns whitespace runs into single hyphens, drops
/// anything that is not an ASCII word character or a hyphen, collapses
/// repeated hyphens and strips hyphens from both ends.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for c in lowered.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        }
    }

    // dropping characters can leave hyphens adjacent
    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('-').to_string()
}

/// Build a slug candidate for `text`.
///
/// `None` or an empty string yields a bare random prefix. Anything else
/// yields `<prefix>-<slugified text>`, even if the slugified part is empty.
pub fn generate_slug(text: Option<&str>) -> String {
    match text {
        None | Some("") => random_prefix(SLUG_PREFIX_LEN),
        Some(text) => format!("{}-{}", random_prefix(SLUG_PREFIX_LEN), slugify(text)),
    }
}

/// Generate a slug that `check_exists` reports as free.
///
/// Each collision produces a brand-new candidate. After
/// [`MAX_SLUG_ATTEMPTS`] probes the last candidate is returned without
/// being checked, so the result is best-effort unique. Errors from the
/// probe are propagated.
pub async fn generate_unique_slug<F, Fut, E>(name: &str, mut check_exists: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut slug = generate_slug(Some(name));

    for _ in 0..MAX_SLUG_ATTEMPTS {
        if !check_exists(slug.clone()).await? {
            return Ok(slug);
        }
        slug = generate_slug(Some(name));
    }

    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::convert::Infallible;

    fn assert_shape(slug: &str) {
        let (prefix, rest) = slug.split_at(SLUG_PREFIX_LEN);
        assert!(prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(rest.starts_with('-'), "missing separator in {slug}");
        assert!(rest[1..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_slugify_normalises() {
        assert_eq!(slugify("  Intro to   Rust!  "), "intro-to-rust");
        assert_eq!(slugify("C++ & Go -- Basics"), "c-go-basics");
        assert_eq!(slugify("--Édition spéciale--"), "dition-spciale");
        assert_eq!(slugify("snake_case name"), "snake_case-name");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slug_shape() {
        for input in ["Intro to Rust", "  spaced   out  ", "Ünïcödé 101", "a-b--c", "!!"] {
            assert_shape(&generate_slug(Some(input)));
        }
    }

    #[test]
    fn test_prefix_varies_suffix_stable() {
        let a = generate_slug(Some("Data Structures"));
        let b = generate_slug(Some("Data Structures"));
        assert_eq!(&a[SLUG_PREFIX_LEN..], "-data-structures");
        assert_eq!(&a[SLUG_PREFIX_LEN..], &b[SLUG_PREFIX_LEN..]);

        let prefixes: HashSet<String> = (0..50)
            .map(|_| generate_slug(Some("Data Structures"))[..SLUG_PREFIX_LEN].to_string())
            .collect();
        assert!(prefixes.len() > 1);
    }

    #[test]
    fn test_empty_input_is_bare_prefix() {
        for slug in [generate_slug(None), generate_slug(Some(""))] {
            assert_eq!(slug.len(), SLUG_PREFIX_LEN);
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_unique_slug_first_free_candidate() {
        let mut probes = 0;
        let slug = generate_unique_slug("Algebra", |_| {
            probes += 1;
            async { Ok::<_, Infallible>(false) }
        })
        .await
        .unwrap();

        assert_eq!(probes, 1);
        assert!(slug.ends_with("-algebra"));
    }

    #[tokio::test]
    async fn test_unique_slug_retries_on_collision() {
        let mut seen = Vec::new();
        let slug = generate_unique_slug("Algebra", |candidate| {
            seen.push(candidate);
            let taken = seen.len() < 3;
            async move { Ok::<_, Infallible>(taken) }
        })
        .await
        .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last(), Some(&slug));
    }

    #[tokio::test]
    async fn test_unique_slug_gives_up_after_bound() {
        let mut probes = 0;
        let slug = generate_unique_slug("Algebra", |_| {
            probes += 1;
            async { Ok::<_, Infallible>(true) }
        })
        .await
        .unwrap();

        assert_eq!(probes, MAX_SLUG_ATTEMPTS);
        assert!(slug.ends_with("-algebra"));
    }

    #[tokio::test]
    async fn test_unique_slug_propagates_probe_error() {
        let result = generate_unique_slug("Algebra", |_| async { Err::<bool, _>("db down") }).await;
        assert_eq!(result.unwrap_err(), "db down");
    }
}

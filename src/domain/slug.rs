//! Slug handling for page routing keys.
//!
//! Operator-supplied slugs are sanitised (`sanitize_slug`); slugs derived from
//! titles go through transliteration first (`pinyin` for CJK input, then the
//! `slug` crate), so “关于我们” becomes `guan-yu-wo-men`. Uniqueness is checked
//! through a caller-provided async predicate to keep this module free of I/O.

use std::future::Future;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

pub const MAX_SLUG_LEN: usize = 100;
const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{input}` contains path separators")]
    PathTraversal { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Normalise an operator-supplied slug into `[a-z0-9-]`.
///
/// Whitespace and underscores become dashes, anything else outside the
/// alphabet is dropped, dash runs collapse and the result is capped at
/// [`MAX_SLUG_LEN`] characters.
pub fn sanitize_slug(input: &str) -> Result<String, SlugError> {
    if input.contains("..") || input.contains('/') || input.contains('\\') {
        return Err(SlugError::PathTraversal {
            input: input.to_string(),
        });
    }

    let mut output = String::with_capacity(input.len());
    for ch in input.trim().chars().flat_map(char::to_lowercase) {
        match ch {
            'a'..='z' | '0'..='9' => output.push(ch),
            '-' | '_' => push_dash(&mut output),
            c if c.is_whitespace() => push_dash(&mut output),
            _ => {}
        }
    }

    let slug = clamp_len(output.trim_matches('-'));
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    Ok(slug)
}

/// Derive a base slug from human-readable text such as a page title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = clamp_len(&slugify(&transliterated));

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Find the first candidate (`base`, `base-2`, `base-3`, ...) accepted by `is_unique`.
pub async fn generate_unique_slug_async<F, Fut, E>(
    base: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    if base.is_empty() {
        return Err(SlugError::EmptyInput.into());
    }

    if is_unique(base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base.to_string());
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = with_suffix(base, attempt);
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted {
        base: base.to_string(),
    }))
}

fn with_suffix(base: &str, attempt: usize) -> String {
    let suffix = format!("-{attempt}");
    let keep = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let trimmed = clamp_to(base, keep);
    format!("{}{suffix}", trimmed.trim_end_matches('-'))
}

fn push_dash(buffer: &mut String) {
    if !buffer.ends_with('-') {
        buffer.push('-');
    }
}

fn clamp_len(slug: &str) -> String {
    clamp_to(slug, MAX_SLUG_LEN).trim_end_matches('-').to_string()
}

// Slugs are ASCII after sanitising, but derive_slug may see anything slugify lets through.
fn clamp_to(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize_slug("  About_Us  Page ").unwrap(), "about-us-page");
        assert_eq!(sanitize_slug("--Hello!!--World--").unwrap(), "hello-world");
        assert_eq!(sanitize_slug("Team & Staff").unwrap(), "team-staff");
    }

    #[test]
    fn sanitize_rejects_traversal_and_empty() {
        assert!(matches!(
            sanitize_slug("../etc"),
            Err(SlugError::PathTraversal { .. })
        ));
        assert!(matches!(
            sanitize_slug("a/b"),
            Err(SlugError::PathTraversal { .. })
        ));
        assert_eq!(sanitize_slug("!!!"), Err(SlugError::EmptyInput));
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(150);
        assert_eq!(sanitize_slug(&long).unwrap().len(), MAX_SLUG_LEN);
    }

    #[test]
    fn derive_slug_transliterates_chinese() {
        let slug = derive_slug("关于 我们").expect("slug");
        assert_eq!(slug, "guan-yu-wo-men");
    }

    #[test]
    fn suffix_respects_max_length() {
        let base = "b".repeat(MAX_SLUG_LEN);
        let candidate = with_suffix(&base, 12);
        assert_eq!(candidate.len(), MAX_SLUG_LEN);
        assert!(candidate.ends_with("-12"));
    }

    #[tokio::test]
    async fn unique_slug_appends_counter() {
        use std::sync::Arc;
        use tokio::sync::Mutex;

        let existing = Arc::new(Mutex::new(vec!["about".to_string()]));

        let slug = generate_unique_slug_async("about", |candidate| {
            let existing = existing.clone();
            let candidate = candidate.to_string();
            async move {
                let guard = existing.lock().await;
                Ok::<bool, std::convert::Infallible>(!guard.contains(&candidate))
            }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "about-2");
    }

    #[tokio::test]
    async fn unique_slug_exhausts() {
        let result = generate_unique_slug_async("about", |_| async {
            Ok::<bool, std::convert::Infallible>(false)
        })
        .await;
        assert!(matches!(
            result,
            Err(SlugAsyncError::Slug(SlugError::Exhausted { .. }))
        ));
    }
}

//! Page lifecycle rules: derived status, title and SEO limits, HTML content hygiene.

use time::OffsetDateTime;

use crate::domain::error::DomainError;
use crate::domain::types::{MenuLocation, PageStatus};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_META_TITLE_LEN: usize = 255;
pub const MAX_META_DESCRIPTION_LEN: usize = 500;
pub const UNTITLED: &str = "Untitled";

/// Compute a page's lifecycle status.
///
/// A future `publish_at` wins over the published flag; otherwise the flag decides.
pub fn derive_status(
    is_published: bool,
    publish_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> PageStatus {
    match publish_at {
        Some(at) if at > now => PageStatus::Scheduled,
        _ if is_published => PageStatus::Published,
        _ => PageStatus::Draft,
    }
}

/// Title rule for create and settings updates: required, trimmed, capped.
pub fn require_title(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    Ok(truncate_chars(trimmed, MAX_TITLE_LEN))
}

/// Title rule for saves: blank titles fall back to [`UNTITLED`].
pub fn save_title(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        truncate_chars(trimmed, MAX_TITLE_LEN)
    }
}

/// Trim and cap an optional SEO string; blank becomes `None`.
pub fn seo_text(raw: Option<&str>, max: usize) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| truncate_chars(value, max))
}

/// Resolve the menu location after a settings change.
pub fn resolve_menu_location(
    show_in_menu: bool,
    requested: Option<MenuLocation>,
    current: Option<MenuLocation>,
) -> Option<MenuLocation> {
    match (requested, current) {
        (Some(location), _) => Some(location),
        (None, Some(location)) => Some(location),
        (None, None) if show_in_menu => Some(MenuLocation::About),
        (None, None) => None,
    }
}

/// Strip scripts, event handlers and other unsafe markup from an HTML fragment.
pub fn sanitize_html(fragment: &str) -> String {
    ammonia::clean(fragment)
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    #[test]
    fn status_is_a_pure_function_of_flag_schedule_and_clock() {
        let now = OffsetDateTime::now_utc();
        let past = now - Duration::hours(1);
        let future = now + Duration::hours(1);

        assert_eq!(derive_status(false, None, now), PageStatus::Draft);
        assert_eq!(derive_status(true, None, now), PageStatus::Published);
        assert_eq!(derive_status(true, Some(past), now), PageStatus::Published);
        assert_eq!(derive_status(false, Some(past), now), PageStatus::Draft);
        assert_eq!(derive_status(false, Some(future), now), PageStatus::Scheduled);
        assert_eq!(derive_status(true, Some(future), now), PageStatus::Scheduled);
    }

    #[test]
    fn scheduled_page_becomes_published_once_time_passes() {
        let now = OffsetDateTime::now_utc();
        let at = now + Duration::minutes(5);
        assert_eq!(derive_status(true, Some(at), now), PageStatus::Scheduled);
        assert_eq!(
            derive_status(true, Some(at), now + Duration::minutes(6)),
            PageStatus::Published
        );
    }

    #[test]
    fn titles_are_trimmed_and_capped() {
        assert_eq!(save_title("   "), UNTITLED);
        assert_eq!(save_title(" About "), "About");
        assert_eq!(save_title(&"x".repeat(300)).chars().count(), MAX_TITLE_LEN);
        assert!(require_title("  ").is_err());
    }

    #[test]
    fn seo_text_drops_blank_and_caps() {
        assert_eq!(seo_text(Some("  "), MAX_META_TITLE_LEN), None);
        let long = "d".repeat(600);
        assert_eq!(
            seo_text(Some(&long), MAX_META_DESCRIPTION_LEN)
                .unwrap()
                .len(),
            MAX_META_DESCRIPTION_LEN
        );
    }

    #[test]
    fn menu_location_defaults_to_about_when_shown() {
        assert_eq!(
            resolve_menu_location(true, None, None),
            Some(MenuLocation::About)
        );
        assert_eq!(
            resolve_menu_location(true, None, Some(MenuLocation::Footer)),
            Some(MenuLocation::Footer)
        );
        assert_eq!(resolve_menu_location(false, None, None), None);
        assert_eq!(
            resolve_menu_location(false, Some(MenuLocation::Main), None),
            Some(MenuLocation::Main)
        );
    }

    #[test]
    fn sanitize_html_strips_scripts() {
        let cleaned = sanitize_html("<p>Hello</p><script>alert(1)</script>");
        assert_eq!(cleaned, "<p>Hello</p>");
    }
}

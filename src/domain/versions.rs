//! Version history rules.

/// Note attached to the post-restore snapshot.
pub fn restore_note(restored_from: i32) -> String {
    format!("restored from v{restored_from}")
}

/// Next number in a page's version sequence given the current maximum.
pub fn next_version_number(current_max: Option<i32>) -> i32 {
    current_max.map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_starts_at_one() {
        assert_eq!(next_version_number(None), 1);
        assert_eq!(next_version_number(Some(4)), 5);
    }

    #[test]
    fn restore_note_names_source_version() {
        assert_eq!(restore_note(3), "restored from v3");
    }
}

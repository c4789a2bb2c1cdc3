//! Small text helpers shared by the API and the bot

/// Normalise a messaging handle into the stored subject form
///
/// Trims whitespace, prepends `@` and lowercases, so `Alice`, `@alice` and
/// ` @ALICE ` all name the same subject. Returns an empty string for blank
/// input.
pub fn normalize_subject(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('@');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("@{}", trimmed.to_lowercase())
}

/// Mask a passport number, keeping only its edges visible
pub fn mask_passport(passport_no: &str) -> String {
    let chars: Vec<char> = passport_no.trim().chars().collect();
    let len = chars.len();

    if len <= 2 {
        return "*".repeat(len);
    }
    if len <= 6 {
        return format!("{}{}{}", chars[0], "*".repeat(len - 2), chars[len - 1]);
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[len - 3..].iter().collect();
    format!("{}{}{}", head, "*".repeat(len - 6), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject("alice"), "@alice");
        assert_eq!(normalize_subject(" @Alice "), "@alice");
        assert_eq!(normalize_subject("@@bob"), "@bob");
        assert_eq!(normalize_subject("   "), "");
        assert_eq!(normalize_subject("@"), "");
    }

    #[test]
    fn test_mask_passport() {
        assert_eq!(mask_passport(""), "");
        assert_eq!(mask_passport("AB"), "**");
        assert_eq!(mask_passport("AB123"), "A***3");
        assert_eq!(mask_passport("MP1234567"), "MP1***567");
        assert_eq!(mask_passport("  MP1234567 "), "MP1***567");
    }
}

//! Field-level format checks shared by the checklist builder.

/// Names need at least two words and stay within letters, `ñ`, dots,
/// hyphens and spaces.
pub(super) fn is_valid_person_name(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let charset_ok = trimmed.chars().all(|ch| {
        ch.is_ascii_alphabetic() || ch == 'ñ' || ch == 'Ñ' || ch == '.' || ch == '-' || ch.is_whitespace()
    });
    charset_ok && trimmed.split_whitespace().count() >= 2
}

/// Eleven digits in the local mobile format, `09` first.
pub(super) fn is_valid_contact_number(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() == 11 && trimmed.starts_with("09") && trimmed.chars().all(|ch| ch.is_ascii_digit())
}

pub(super) fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    let mut parts = trimmed.split('@');
    let (Some(user), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !user.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

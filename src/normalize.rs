//! Canonical forms for the free-text answers found in survey exports.

use regex::Regex;
use std::sync::LazyLock;

static INSTAGRAM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?://)?(?:www\.)?instagram\.com/").unwrap());

fn title_case_token(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Title-case every whitespace separated token. Particles such as "bin" or
/// "van" are capitalised like any other token.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .map(title_case_token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical `wa.me/62...` link. Empty input, or input without any digits,
/// yields an empty string.
pub fn normalize_whatsapp(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with("wa.me/") {
        return phone.to_string();
    }

    let mut digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }

    if let Some(rest) = digits.strip_prefix('0') {
        digits = format!("62{}", rest);
    }
    if !digits.starts_with("62") {
        digits = format!("62{}", digits);
    }

    format!("wa.me/{}", digits)
}

/// Bare lowercase handle without `@`, profile URL or trailing slash.
pub fn normalize_instagram(handle: &str) -> String {
    let handle = handle.trim();
    let handle = handle.strip_prefix('@').unwrap_or(handle);
    let handle = INSTAGRAM_URL.replace(handle, "");
    let handle = handle.strip_suffix('/').unwrap_or(handle.as_ref());
    handle.to_lowercase()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn has_mixed_internal_case(token: &str) -> bool {
    let has_lower = token.chars().any(|c| c.is_lowercase());
    has_lower && token.chars().skip(1).any(|c| c.is_uppercase())
}

/// Names that already look curated (parentheses, "McGill"-style casing) are
/// kept verbatim. Everything else is title-cased, except short all-caps
/// acronyms like "ITB" or "UIN".
pub fn normalize_university(name: &str) -> String {
    let name = name.trim();
    if name.contains('(') || name.split_whitespace().any(has_mixed_internal_case) {
        return name.to_string();
    }

    name.split_whitespace()
        .map(|token| {
            let is_acronym = token.chars().count() <= 3
                && token.chars().any(|c| c.is_alphabetic())
                && !token.chars().any(|c| c.is_lowercase());
            if is_acronym {
                token.to_string()
            } else {
                title_case_token(token)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key used to match an imported name against names already in the directory.
pub fn identity_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Key for exact duplicate grouping: lowercase, single spaces, only `[a-z0-9 ]`.
pub fn duplicate_key(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_title_case() {
        assert_eq!(normalize_name("  BUDI   santoso "), "Budi Santoso");
        assert_eq!(normalize_name("ahmad bin yusuf"), "Ahmad Bin Yusuf");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_whatsapp() {
        assert_eq!(normalize_whatsapp("081234567890"), "wa.me/6281234567890");
        assert_eq!(normalize_whatsapp("+62 812-3456-7890"), "wa.me/6281234567890");
        assert_eq!(normalize_whatsapp("81234567890"), "wa.me/6281234567890");
        assert_eq!(normalize_whatsapp("wa.me/6281111"), "wa.me/6281111");
        assert_eq!(normalize_whatsapp(""), "");
        assert_eq!(normalize_whatsapp("-"), "");
    }

    #[test]
    fn test_instagram() {
        assert_eq!(normalize_instagram("@Foo_Bar/"), "foo_bar");
        assert_eq!(normalize_instagram("https://instagram.com/baz/"), "baz");
        assert_eq!(normalize_instagram("https://www.instagram.com/Qux"), "qux");
        assert_eq!(normalize_instagram("instagram.com/plain"), "plain");
        assert_eq!(normalize_instagram("  handle  "), "handle");
    }

    #[test]
    fn test_email() {
        assert_eq!(normalize_email("  Siti.Aminah@Gmail.COM "), "siti.aminah@gmail.com");
    }

    #[test]
    fn test_university() {
        assert_eq!(normalize_university("institut teknologi bandung"), "Institut Teknologi Bandung");
        assert_eq!(normalize_university("UNIVERSITAS GADJAH MADA"), "Universitas Gadjah Mada");
        assert_eq!(normalize_university("ITB"), "ITB");
        assert_eq!(normalize_university("universitas islam negeri UIN jakarta"), "Universitas Islam Negeri UIN Jakarta");
        assert_eq!(normalize_university("Universitas Indonesia (UI)"), "Universitas Indonesia (UI)");
        assert_eq!(normalize_university("McGill University"), "McGill University");
    }

    #[test]
    fn test_duplicate_key() {
        assert_eq!(duplicate_key("  Budi   Santoso "), "budi santoso");
        assert_eq!(duplicate_key("Budi Santoso, S.T."), "budi santoso st");
        assert_eq!(duplicate_key("BUDI\tSANTOSO"), "budi santoso");
    }

    #[test]
    fn test_identity_key() {
        assert_eq!(identity_key(" Budi Santoso "), "budi santoso");
    }
}

//! Masking for contact details shown back in review summaries.

/// `jane@x.com` → `j**e@x.com`; two-character local parts keep only the first.
pub fn mask_email(email: &str) -> String {
    let Some((name, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    let chars: Vec<char> = name.chars().collect();
    let masked = match chars.len() {
        0 => String::new(),
        1 | 2 => format!("{}*", chars[0]),
        n => format!("{}{}{}", chars[0], "*".repeat(n - 2), chars[n - 1]),
    };
    format!("{masked}@{domain}")
}

/// Keeps a leading `+` and first digit plus the last four digits.
pub fn mask_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    let n = cleaned.len();
    if n <= 4 {
        return "*".repeat(n);
    }
    if cleaned.starts_with('+') {
        if n <= 6 {
            return format!("{}{}{}", &cleaned[..2], "*".repeat(n - 4), &cleaned[n - 2..]);
        }
        return format!("{}{}{}", &cleaned[..2], "*".repeat(n - 6), &cleaned[n - 4..]);
    }
    format!("{}{}", "*".repeat(n - 4), &cleaned[n - 4..])
}

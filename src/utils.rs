/// Number of digits a phone number must have, country code included.
pub const PHONE_DIGITS: usize = 11;

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Exactly eleven ASCII digits, no separators.
pub fn is_valid_phone(input: &str) -> bool {
    input.len() == PHONE_DIGITS && input.bytes().all(|b| b.is_ascii_digit())
}

pub fn contact_key(phone: &str, domain: &str) -> String {
    format!("{phone}@{domain}")
}

/// Human-readable form of a stored phone number for headers, grouped the
/// way the number's own country writes it.
pub fn format_phone(phone: &str) -> String {
    if !is_valid_phone(phone) {
        return phone.to_string();
    }
    match phonenumber::parse(None, format!("+{phone}")) {
        Ok(number) => number.format().mode(phonenumber::Mode::International).to_string(),
        Err(_) => format!("+{phone}"),
    }
}

/// `RUST_LOG` wins; otherwise info for everything.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_must_be_eleven_digits() {
        assert!(is_valid_phone("79123456789"));
        assert!(is_valid_phone("00000000000"));
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("7912345678"));
        assert!(!is_valid_phone("791234567890"));
        assert!(!is_valid_phone("7912345678a"));
        assert!(!is_valid_phone("7 912345678"));
        assert!(!is_valid_phone("+7912345678"));
        // eleven chars but not ascii digits
        assert!(!is_valid_phone("７９１２３４５６７８９"));
    }

    #[test]
    fn formats_numbers_per_country() {
        assert_eq!(format_phone("79123456789"), "+7 912 345-67-89");
        assert_eq!(format_phone("14155550123"), "+1 415-555-0123");
        assert_eq!(format_phone("123"), "123");
    }

    #[test]
    fn normalizes_scheme() {
        assert_eq!(normalize_url(" api.green-api.com "), "https://api.green-api.com");
        assert_eq!(normalize_url("http://localhost:1"), "http://localhost:1");
    }

    #[test]
    fn contact_key_appends_domain() {
        assert_eq!(contact_key("79123456789", "c.us"), "79123456789@c.us");
    }
}

//! Input validation for operator-supplied fields.
//!
//! The core never trusts the console layer to pre-validate anything; every
//! service re-checks its inputs here. Each function reports a specific,
//! human-readable reason on rejection.

use std::sync::OnceLock;

use regex::Regex;

/// A rejected input with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidInput(String);

impl InvalidInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Usernames are 8-10 characters, start with a letter or underscore and may
/// contain letters, digits, underscores, apostrophes and periods. Identity is
/// case-insensitive; the stored spelling is whatever was registered.
pub fn validate_username(username: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[A-Za-z_][A-Za-z0-9_'.]{7,9}$");

    if re.is_match(username) {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Username must be 8-10 characters, start with a letter or underscore, \
             and contain only letters, digits, _, ' and .",
        ))
    }
}

/// Password policy: 12-30 characters with at least one lowercase letter, one
/// uppercase letter, one digit and one special character.
pub fn validate_password(password: &str) -> Result<(), InvalidInput> {
    const SPECIALS: &str = "~!@#$%&_-+=`|\\(){}[]:;'<>,.?/";

    if !(12..=30).contains(&password.chars().count()) {
        return Err(InvalidInput::new("Password must be 12-30 characters"));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIALS.contains(c));

    if has_lower && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Password needs at least one lowercase letter, one uppercase letter, \
             one digit and one special character",
        ))
    }
}

/// First/last names: letters, spaces, apostrophes and hyphens.
pub fn validate_name(name: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[A-Za-z\s'\-]{1,50}$");

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(InvalidInput::new("Name is required"));
    }
    if re.is_match(trimmed) {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Name may contain only letters, spaces, apostrophes and hyphens",
        ))
    }
}

/// Street names: letters, digits, spaces and common punctuation.
pub fn validate_street(street: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[A-Za-z0-9\s.\-']{1,100}$");

    let trimmed = street.trim();
    if trimmed.is_empty() {
        return Err(InvalidInput::new("Street is required"));
    }
    if re.is_match(trimmed) {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Street may contain only letters, digits, spaces, periods, hyphens and apostrophes",
        ))
    }
}

/// Dutch zip code: four digits (no leading zero) followed by two uppercase letters.
pub fn validate_zip_code(zip: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[1-9][0-9]{3}[A-Z]{2}$");

    if re.is_match(zip) {
        Ok(())
    } else {
        Err(InvalidInput::new("Zip code must match DDDDXX (e.g. 1234AB)"))
    }
}

/// Mobile phone: eight digits; the +31-6 prefix is implied.
pub fn validate_mobile_phone(phone: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[0-9]{8}$");

    if re.is_match(phone) {
        Ok(())
    } else {
        Err(InvalidInput::new("Phone number must be exactly 8 digits"))
    }
}

/// Driving licence: XXDDDDDDD or XDDDDDDDD.
pub fn validate_driving_licence(licence: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^(?:[A-Z]{2}[0-9]{7}|[A-Z][0-9]{8})$");

    if re.is_match(licence) {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Driving licence must match XXDDDDDDD or XDDDDDDDD",
        ))
    }
}

pub fn validate_email(email: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$");

    if re.is_match(email) {
        Ok(())
    } else {
        Err(InvalidInput::new("Invalid email address"))
    }
}

/// Scooter serial number: 10-17 alphanumeric characters.
pub fn validate_serial_number(serial: &str) -> Result<(), InvalidInput> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[A-Za-z0-9]{10,17}$");

    if re.is_match(serial) {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Serial number must be 10-17 alphanumeric characters",
        ))
    }
}

/// Service cities; travellers register in one of these.
pub const VALID_CITIES: [&str; 10] = [
    "Rotterdam",
    "Amsterdam",
    "Den Haag",
    "Utrecht",
    "Eindhoven",
    "Groningen",
    "Tilburg",
    "Almere",
    "Breda",
    "Nijmegen",
];

pub fn validate_city(city: &str) -> Result<(), InvalidInput> {
    if VALID_CITIES.contains(&city) {
        Ok(())
    } else {
        Err(InvalidInput::new(format!(
            "City must be one of: {}",
            VALID_CITIES.join(", ")
        )))
    }
}

/// State-of-charge target range, both bounds in percent with min < max.
pub fn validate_soc_range(min: i32, max: i32) -> Result<(), InvalidInput> {
    if 0 <= min && min < max && max <= 100 {
        Ok(())
    } else {
        Err(InvalidInput::new(
            "Target SoC range must satisfy 0 <= min < max <= 100",
        ))
    }
}

pub fn validate_percentage(value: i32) -> Result<(), InvalidInput> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        Err(InvalidInput::new("Value must be between 0 and 100"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_within_shape_pass() {
        assert!(validate_username("jdoe1234").is_ok());
        assert!(validate_username("_engineer9").is_ok());
        assert!(validate_username("a.b'c_d12").is_ok());
    }

    #[test]
    fn usernames_outside_shape_fail() {
        assert!(validate_username("short").is_err());
        assert!(validate_username("waytoolongname1").is_err());
        assert!(validate_username("9starts_num").is_err());
        assert!(validate_username("has space1").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn password_policy_requires_all_classes() {
        assert!(validate_password("Aa1!aaaaaaaa").is_ok());
        assert!(validate_password("aa1!aaaaaaaa").is_err()); // no uppercase
        assert!(validate_password("AA1!AAAAAAAA").is_err()); // no lowercase
        assert!(validate_password("Aaa!aaaaaaaa").is_err()); // no digit
        assert!(validate_password("Aa1aaaaaaaaa").is_err()); // no special
        assert!(validate_password("Aa1!aaa").is_err()); // too short
    }

    #[test]
    fn street_allows_digits_names_do_not() {
        assert!(validate_street("2e Middellandstraat 14").is_ok());
        assert!(validate_name("2e Middellandstraat").is_err());
        assert!(validate_street("").is_err());
    }

    #[test]
    fn zip_phone_and_licence_shapes() {
        assert!(validate_zip_code("3011AB").is_ok());
        assert!(validate_zip_code("0123AB").is_err());
        assert!(validate_mobile_phone("12345678").is_ok());
        assert!(validate_mobile_phone("1234567").is_err());
        assert!(validate_driving_licence("AB1234567").is_ok());
        assert!(validate_driving_licence("A12345678").is_ok());
        assert!(validate_driving_licence("ABC123456").is_err());
    }

    #[test]
    fn serial_numbers_are_bounded_alphanumeric() {
        assert!(validate_serial_number("SCOOT12345").is_ok());
        assert!(validate_serial_number("SCOOT123").is_err());
        assert!(validate_serial_number("SCOOT12345-17CHARS").is_err());
    }

    #[test]
    fn soc_range_requires_ordered_bounds() {
        assert!(validate_soc_range(20, 80).is_ok());
        assert!(validate_soc_range(80, 20).is_err());
        assert!(validate_soc_range(-1, 50).is_err());
        assert!(validate_soc_range(0, 101).is_err());
    }
}

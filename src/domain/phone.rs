use thiserror::Error;

pub const COUNTRY_CODE: &str = "254";
const TRUNK_PREFIX: char = '0';
const CANONICAL_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Phone number must be 10 digits (e.g., 0712345678)")]
pub struct InvalidPhoneNumber {
    pub input: String,
}

pub fn normalize(raw: &str) -> Result<String, InvalidPhoneNumber> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let canonical = if let Some(rest) = digits.strip_prefix(TRUNK_PREFIX) {
        format!("{COUNTRY_CODE}{rest}")
    } else if digits.starts_with(COUNTRY_CODE) {
        digits
    } else {
        format!("{COUNTRY_CODE}{digits}")
    };

    if canonical.len() != CANONICAL_LEN {
        return Err(InvalidPhoneNumber {
            input: raw.to_string(),
        });
    }

    Ok(canonical)
}

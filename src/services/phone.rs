//! Phone number normalization for OTP login.
//!
//! The remote API expects E.164 numbers; users type the nine national
//! digits in whatever shape they like.

pub const COUNTRY_CODE: &str = "998";
pub const NATIONAL_DIGITS: usize = 9;

/// Strip every non-digit and keep at most the nine national digits.
#[must_use]
pub fn get_phone_digits(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(NATIONAL_DIGITS)
        .collect()
}

/// Display grouping `XX XXX XX XX`; partial input is grouped as far as it goes.
#[must_use]
pub fn format_phone_number(input: &str) -> String {
    let digits = get_phone_digits(input);
    let mut groups = Vec::with_capacity(4);
    let mut start = 0;
    for len in [2, 3, 2, 2] {
        if start >= digits.len() {
            break;
        }
        let end = (start + len).min(digits.len());
        groups.push(&digits[start..end]);
        start = end;
    }
    groups.join(" ")
}

/// `+998` followed by the national digits.
#[must_use]
pub fn format_full_phone_number(input: &str) -> String {
    format!("+{COUNTRY_CODE}{}", get_phone_digits(input))
}

#[must_use]
pub fn is_complete_phone(input: &str) -> bool {
    get_phone_digits(input).len() == NATIONAL_DIGITS
}

#[cfg(test)]
#[path = "phone_test.rs"]
mod tests;

//! Card and Contact Validation
//!
//! Pure string checks run before anything leaves the client. None of these
//! functions allocate more than the cleaned copy of their input, and none of
//! them log: card numbers must never reach a log line.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Card networks the storefront recognizes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardType {
    Visa,
    Mastercard,
}

impl CardType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "VISA",
            Self::Mastercard => "MASTERCARD",
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Detect the card network from the number prefix.
///
/// `4` is Visa; `51`–`55` and `22`–`27` are Mastercard; anything else is
/// unknown.
pub fn detect_card_type(number: &str) -> Option<CardType> {
    let cleaned = strip_whitespace(number);

    if cleaned.starts_with('4') {
        return Some(CardType::Visa);
    }

    let prefix = cleaned.get(..2).filter(|p| all_digits(p))?.parse::<u8>().ok()?;
    match prefix {
        51..=55 | 22..=27 => Some(CardType::Mastercard),
        _ => None,
    }
}

/// Luhn checksum over an all-digit string
fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

/// 13–19 digits (spaces ignored) passing the Luhn checksum
pub fn validate_card_number(number: &str) -> bool {
    let cleaned = strip_whitespace(number);
    (13..=19).contains(&cleaned.len()) && all_digits(&cleaned) && luhn_valid(&cleaned)
}

/// Regroup a card number into blocks of four separated by single spaces
pub fn format_card_number(raw: &str) -> String {
    let cleaned: Vec<char> = strip_whitespace(raw).chars().collect();
    cleaned
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `MM/YY`, month 1–12, not before the current month
pub fn validate_expiry_date(expiry: &str) -> bool {
    validate_expiry_date_at(expiry, Utc::now().date_naive())
}

/// [`validate_expiry_date`] against an explicit "today"
pub fn validate_expiry_date_at(expiry: &str, today: NaiveDate) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    if month.len() != 2 || year.len() != 2 || !all_digits(month) || !all_digits(year) {
        return false;
    }

    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }

    let current_year = today.year() % 100;
    let current_month = today.month();

    (year, month) >= (current_year, current_month)
}

/// Keep digits only and insert `/` after the month once two digits are typed
pub fn format_expiry_date(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() >= 2 {
        let (month, rest) = digits.split_at(2);
        let year: String = rest.chars().take(2).collect();
        format!("{month}/{year}")
    } else {
        digits
    }
}

/// Exactly 3 or 4 digits
pub fn validate_cvc(cvc: &str) -> bool {
    (3..=4).contains(&cvc.len()) && all_digits(cvc)
}

/// At least 3 characters after trimming, ASCII letters and spaces only
pub fn validate_card_holder(name: &str) -> bool {
    name.trim().chars().count() >= 3
        && name.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

/// Trailing four characters of the cleaned card number
pub fn last_four_digits(number: &str) -> String {
    let cleaned: Vec<char> = strip_whitespace(number).chars().collect();
    let start = cleaned.len().saturating_sub(4);
    cleaned[start..].iter().collect()
}

/// `**** **** **** NNNN`
pub fn mask_card_number(number: &str) -> String {
    format!("**** **** **** {}", last_four_digits(number))
}

/// Trimmed length of at least 3
pub fn validate_name(name: &str) -> bool {
    name.trim().chars().count() >= 3
}

/// `local@domain.tld` with no whitespace and a single `@`
pub fn validate_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // a dot with at least one character on each side
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// At least 10 characters
pub fn validate_phone(phone: &str) -> bool {
    phone.chars().count() >= 10
}

/// Trimmed length of at least 10
pub fn validate_address(address: &str) -> bool {
    address.trim().chars().count() >= 10
}

/// Trimmed length of at least 3
pub fn validate_city(city: &str) -> bool {
    city.trim().chars().count() >= 3
}

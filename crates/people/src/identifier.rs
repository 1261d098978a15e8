use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, ValueObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    NhsNumber,
    NationalInsurance,
    LocalAuthorityRef,
    Other,
}

impl IdentifierKind {
    pub fn label(&self) -> &'static str {
        match self {
            IdentifierKind::NhsNumber => "NHS number",
            IdentifierKind::NationalInsurance => "National Insurance number",
            IdentifierKind::LocalAuthorityRef => "local authority reference",
            IdentifierKind::Other => "identifier",
        }
    }
}

/// A validated, normalised identifier (spaces removed, upper case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonIdentifier {
    pub kind: IdentifierKind,
    pub value: String,
}

impl ValueObject for PersonIdentifier {}

impl PersonIdentifier {
    pub fn new(kind: IdentifierKind, raw: &str) -> DomainResult<Self> {
        let value = normalise_value(raw);
        if value.is_empty() {
            return Err(DomainError::validation(format!("{} is required", kind.label())));
        }

        let valid = match kind {
            IdentifierKind::NhsNumber => nhs_number_is_valid(&value),
            IdentifierKind::NationalInsurance => ni_number_is_valid(&value),
            IdentifierKind::LocalAuthorityRef | IdentifierKind::Other => value.len() <= 64,
        };
        if !valid {
            return Err(DomainError::validation(format!("'{}' is not a valid {}", raw.trim(), kind.label())));
        }
        Ok(Self { kind, value })
    }
}

/// Strip whitespace and hyphens, then upper-case.
pub fn normalise_value(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase()
}

/// Ten digits whose last digit is the modulus-11 check digit of the first nine.
fn nhs_number_is_valid(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 10 || value.len() != 10 {
        return false;
    }
    let sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();
    let check = match 11 - (sum % 11) {
        11 => 0,
        10 => return false,
        n => n,
    };
    check == digits[9]
}

/// Two prefix letters, six digits and a suffix letter A-D (e.g. `QQ123456C`).
fn ni_number_is_valid(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() != 9 {
        return false;
    }
    const NEVER_PREFIX: [char; 6] = ['D', 'F', 'I', 'Q', 'U', 'V'];
    let prefix_ok = chars[..2]
        .iter()
        .all(|c| c.is_ascii_uppercase() && !NEVER_PREFIX.contains(c))
        && chars[1] != 'O';
    let digits_ok = chars[2..8].iter().all(char::is_ascii_digit);
    let suffix_ok = matches!(chars[8], 'A'..='D');
    prefix_ok && digits_ok && suffix_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nhs_numbers_use_the_mod_11_check_digit() {
        let id = PersonIdentifier::new(IdentifierKind::NhsNumber, "943 476 5919").unwrap();
        assert_eq!(id.value, "9434765919");
        assert!(PersonIdentifier::new(IdentifierKind::NhsNumber, "9434765918").is_err());
        assert!(PersonIdentifier::new(IdentifierKind::NhsNumber, "12345").is_err());
    }

    #[test]
    fn ni_numbers_are_format_checked() {
        let id = PersonIdentifier::new(IdentifierKind::NationalInsurance, "ab 12 34 56 c").unwrap();
        assert_eq!(id.value, "AB123456C");
        assert!(PersonIdentifier::new(IdentifierKind::NationalInsurance, "QQ123456C").is_err());
        assert!(PersonIdentifier::new(IdentifierKind::NationalInsurance, "AB123456E").is_err());
        assert!(PersonIdentifier::new(IdentifierKind::NationalInsurance, "AO123456A").is_err());
    }

    #[test]
    fn free_form_identifiers_only_need_a_value() {
        assert!(PersonIdentifier::new(IdentifierKind::LocalAuthorityRef, "la-77/x").is_ok());
        assert!(PersonIdentifier::new(IdentifierKind::Other, "   ").is_err());
    }
}

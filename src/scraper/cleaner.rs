//! Field-level decoders for the detail page rows.
//!
//! Each function takes the text of one row (or cell) and returns a typed
//! value or a [`FieldError`]. None of them touch the DOM, so every rule is
//! testable on plain strings.

use crate::models::{Phone, Product};
use thiserror::Error;
use tracing::warn;

/// Separator the site puts between the website and the contact name.
pub const SITE_CONTACT_SEPARATOR: &str = "\u{a0}\u{a0}\u{a0}";

const POSTAL_CODE_DIGITS: usize = 8;
const POSTAL_CODE_PREFIX: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{field} is missing")]
    Missing { field: &'static str },

    #[error("{field} is malformed: {value:?}")]
    Malformed { field: &'static str, value: String },
}

impl FieldError {
    fn malformed(field: &'static str, value: &str) -> Self {
        Self::Malformed {
            field,
            value: value.to_string(),
        }
    }
}

// ── Labels ────────────────────────────────────────────────────────────────────

/// Case-insensitive prefix test. `None` when `text` does not start with `label`.
fn strip_prefix_ignore_case<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let head = text.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(&text[label.len()..])
    } else {
        None
    }
}

/// Text after `label`, only when the label is a whole word: it must be
/// followed by `:`, whitespace or the end of the text ("Tel:" but not "Telemar").
fn after_label<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let rest = strip_prefix_ignore_case(text, label)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c == ':' || c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

pub fn starts_with_label(text: &str, labels: &[&str]) -> bool {
    let text = text.trim_start();
    labels.iter().any(|label| after_label(text, label).is_some())
}

/// Remove the first matching label plus any `:` and whitespace after it.
/// Text without a known label comes back trimmed but otherwise untouched.
pub fn strip_label<'a>(text: &'a str, labels: &[&str]) -> &'a str {
    let text = text.trim();
    for label in labels {
        if let Some(rest) = after_label(text, label) {
            return rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        }
    }
    text
}

/// Text after the last `": "`, which is where the site puts the value in
/// `Label: value` cells.
pub fn value_after_label(text: &str) -> &str {
    text.rsplit(": ").next().unwrap_or(text).trim()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

// ── Address ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParts {
    pub street: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: Option<String>,
}

/// "CEP: 1234567" → "01234-567" | "12345678" → "12345-678"
///
/// Codes shorter than eight digits get exactly one leading zero:
/// "123456" → "01234-56". Fewer than five digits is malformed.
pub fn normalise_postal_code(raw: &str) -> Result<String, FieldError> {
    let mut digits: String = strip_label(raw, &["CEP"])
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    if digits.len() < POSTAL_CODE_PREFIX || digits.len() > POSTAL_CODE_DIGITS {
        return Err(FieldError::malformed("postal_code", raw));
    }
    if digits.len() < POSTAL_CODE_DIGITS {
        digits.insert(0, '0');
    }

    Ok(format!(
        "{}-{}",
        &digits[..POSTAL_CODE_PREFIX],
        &digits[POSTAL_CODE_PREFIX..]
    ))
}

/// Split "city-state" at the last hyphen so hyphenated city names survive:
/// "Embu-Guaçu-SP" → ("Embu-Guaçu", "SP"). No hyphen means no state.
pub fn split_place(place: &str) -> (String, String) {
    match place.rsplit_once('-') {
        Some((city, state)) => (city.trim().to_string(), state.trim().to_string()),
        None => (place.trim().to_string(), String::new()),
    }
}

/// "Rua X | Centro | Rio de Janeiro-RJ | CEP: 1234567", label already removed.
pub fn split_address(line: &str) -> Result<AddressParts, FieldError> {
    let mut postal_code = None;
    let mut parts = Vec::with_capacity(3);

    for segment in line.split('|').map(str::trim) {
        if starts_with_label(segment, &["CEP"]) {
            // A blank or garbled CEP only costs the postal code, not the record
            postal_code = match normalise_postal_code(segment) {
                Ok(code) => Some(code),
                Err(e) => {
                    warn!("Dropping postal code: {}", e);
                    None
                }
            };
        } else {
            parts.push(segment);
        }
    }

    let [street, district, place] = parts[..] else {
        return Err(FieldError::malformed("address", line));
    };
    let (city, state) = split_place(place);

    Ok(AddressParts {
        street: street.to_string(),
        district: district.to_string(),
        city,
        state,
        postal_code,
    })
}

// ── Contact rows ──────────────────────────────────────────────────────────────

/// "Tel: 1111-2222 | Fax: 3333-4444" → [tel 1111-2222, fax 3333-4444]
pub fn parse_phones(line: &str) -> Result<Vec<Phone>, FieldError> {
    line.split('|')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (kind, number) = entry
                .split_once(':')
                .ok_or_else(|| FieldError::malformed("phones", entry))?;
            Ok(Phone {
                kind: kind.trim().to_lowercase(),
                number: number.trim().to_string(),
            })
        })
        .collect()
}

/// First token is the label; the rest are addresses.
pub fn parse_emails(line: &str) -> Vec<String> {
    line.split_whitespace().skip(1).map(str::to_string).collect()
}

/// "Site: www.x.com\u{a0}\u{a0}\u{a0}Contato: Ana" → (Some(www.x.com), Some(Ana)).
/// A single segment is read as the contact name.
pub fn parse_site_contact(line: &str) -> (Option<String>, Option<String>) {
    let segments: Vec<&str> = line.split(SITE_CONTACT_SEPARATOR).collect();
    match segments[..] {
        [site, contact, ..] => (
            non_empty(value_after_label(site)),
            non_empty(value_after_label(contact)),
        ),
        [only] => (None, non_empty(value_after_label(only))),
        [] => (None, None),
    }
}

pub fn parse_price_range(line: &str) -> Option<String> {
    non_empty(value_after_label(line))
}

pub fn parse_activity_sector(line: &str) -> String {
    strip_label(line, &["Setor de atividade"]).to_string()
}

// ── Section cells ─────────────────────────────────────────────────────────────

/// "001 - Widget" → {001, Widget}. A cell without the separator is all code.
pub fn parse_product(cell: &str) -> Product {
    let cell = cell.trim();
    match cell.split_once(" - ") {
        Some((code, name)) => Product {
            code: code.trim().to_string(),
            name: name.trim().to_string(),
        },
        None => Product {
            code: cell.to_string(),
            name: String::new(),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_postal_code() {
        assert_eq!(normalise_postal_code("1234567").unwrap(), "01234-567");
        assert_eq!(normalise_postal_code("12345678").unwrap(), "12345-678");
        assert_eq!(normalise_postal_code("CEP: 1234567").unwrap(), "01234-567");
        assert_eq!(normalise_postal_code("CEP: 12345-678").unwrap(), "12345-678");
    }

    #[test]
    fn test_normalise_postal_code_pads_one_zero_only() {
        assert_eq!(normalise_postal_code("123456").unwrap(), "01234-56");
        assert_eq!(normalise_postal_code("CEP: 1234567").unwrap(), "01234-567");
    }

    #[test]
    fn test_normalise_postal_code_rejects_garbage() {
        assert!(matches!(
            normalise_postal_code("CEP: "),
            Err(FieldError::Malformed { field: "postal_code", .. })
        ));
        assert!(normalise_postal_code("123456789").is_err());
        assert!(normalise_postal_code("123").is_err());
    }

    #[test]
    fn test_split_address_without_postal_code() {
        let parts = split_address("Rua X | Centro | Rio de Janeiro-RJ").unwrap();
        assert_eq!(parts.street, "Rua X");
        assert_eq!(parts.district, "Centro");
        assert_eq!(parts.city, "Rio de Janeiro");
        assert_eq!(parts.state, "RJ");
        assert_eq!(parts.postal_code, None);
    }

    #[test]
    fn test_split_address_with_postal_code() {
        let parts =
            split_address("Av. Brasil, 100 | Jardim | Embu-Guaçu-SP | CEP: 6900000").unwrap();
        assert_eq!(parts.city, "Embu-Guaçu");
        assert_eq!(parts.state, "SP");
        assert_eq!(parts.postal_code.as_deref(), Some("06900-000"));
    }

    #[test]
    fn test_split_address_blank_postal_code_is_dropped() {
        let parts = split_address("Rua X | Centro | Recife-PE | CEP: ").unwrap();
        assert_eq!(parts.city, "Recife");
        assert_eq!(parts.state, "PE");
        assert_eq!(parts.postal_code, None);
    }

    #[test]
    fn test_split_address_wrong_arity() {
        assert!(matches!(
            split_address("Rua X | Rio de Janeiro-RJ"),
            Err(FieldError::Malformed { field: "address", .. })
        ));
    }

    #[test]
    fn test_split_place_without_hyphen() {
        assert_eq!(split_place("Brasília"), ("Brasília".to_string(), String::new()));
        assert_eq!(split_place("Santos - SP"), ("Santos".to_string(), "SP".to_string()));
    }

    #[test]
    fn test_parse_phones() {
        let phones = parse_phones("Tel: 1111-2222 | Fax: 3333-4444").unwrap();
        assert_eq!(
            phones,
            vec![
                Phone { kind: "tel".into(), number: "1111-2222".into() },
                Phone { kind: "fax".into(), number: "3333-4444".into() },
            ]
        );
    }

    #[test]
    fn test_parse_phones_splits_on_first_colon_only() {
        let phones = parse_phones("Celular: +55 (11) 9:9999").unwrap();
        assert_eq!(phones[0].number, "+55 (11) 9:9999");
        assert!(parse_phones("Tel 1111-2222").is_err());
    }

    #[test]
    fn test_parse_emails_drops_label() {
        assert_eq!(
            parse_emails("E-mail: a@x.com.br b@x.com.br"),
            vec!["a@x.com.br".to_string(), "b@x.com.br".to_string()]
        );
        assert!(parse_emails("E-mail:").is_empty());
    }

    #[test]
    fn test_parse_site_contact() {
        let line = format!("Site: www.x.com.br{SITE_CONTACT_SEPARATOR}Contato: Ana Souza");
        assert_eq!(
            parse_site_contact(&line),
            (Some("www.x.com.br".into()), Some("Ana Souza".into()))
        );
        assert_eq!(
            parse_site_contact("Contato: Ana Souza"),
            (None, Some("Ana Souza".into()))
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(parse_activity_sector("Setor de atividade: Calçados"), "Calçados");
        assert_eq!(
            parse_price_range("Faixa de preço: US$ 1 a 5 milhões").as_deref(),
            Some("US$ 1 a 5 milhões")
        );
        assert!(starts_with_label("  e-mail: a@b.c", &["E-mail"]));
        assert!(!starts_with_label("Tel: 1", &["E-mail"]));
    }

    #[test]
    fn test_labels_need_word_boundary() {
        assert!(starts_with_label("Tel: 1111", &["Tel"]));
        assert!(starts_with_label("Tel 1111", &["Tel"]));
        assert!(starts_with_label("Tel", &["Tel"]));
        assert!(!starts_with_label("Telemar Exportadora Ltda", &["Tel"]));
        assert!(!starts_with_label("Sitel Componentes", &["Site"]));
        assert!(!starts_with_label("Faixas Têxteis SA", &["Faixa"]));
        assert_eq!(strip_label("CEPAL Comércio", &["CEP"]), "CEPAL Comércio");
    }

    #[test]
    fn test_parse_product() {
        assert_eq!(
            parse_product("001 - Widget"),
            Product { code: "001".into(), name: "Widget".into() }
        );
        assert_eq!(
            parse_product("0901 - Café - torrado"),
            Product { code: "0901".into(), name: "Café - torrado".into() }
        );
        assert_eq!(parse_product("0901").name, "");
    }
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {raw:?}")]
pub struct ParseFieldError {
    pub raw: String,
}

impl ParseFieldError {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

const BLANK_MARKERS: [&str; 5] = ["nan", "none", "n/a", "-", "--"];

fn is_blank(value: &str) -> bool {
    value.is_empty()
        || BLANK_MARKERS
            .iter()
            .any(|marker| value.eq_ignore_ascii_case(marker))
}

/// Parses a currency or percent decorated cell such as `$1,234.50`, `12.5%`
/// or `(80.00)`. Blank cells yield `Ok(None)`.
pub fn parse_amount(raw: &str) -> Result<Option<f64>, ParseFieldError> {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        return Ok(None);
    }

    let (negated, body) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '+') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(ParseFieldError::new(raw));
    }

    let value = cleaned
        .parse::<f64>()
        .map_err(|_| ParseFieldError::new(raw))?;
    if !value.is_finite() {
        return Err(ParseFieldError::new(raw));
    }

    Ok(Some(if negated { -value } else { value }))
}

/// Parse-or-zero: blank cells are zero, malformed cells are zero plus the error
/// so the caller can record a warning.
pub fn amount_or_zero(raw: &str) -> (f64, Option<ParseFieldError>) {
    match parse_amount(raw) {
        Ok(value) => (value.unwrap_or(0.0), None),
        Err(err) => (0.0, Some(err)),
    }
}

/// Uppercases a ticker. Blank cells yield `Ok(None)`; anything containing
/// characters that never appear in a ticker is an error.
pub fn normalize_symbol(raw: &str) -> Result<Option<String>, ParseFieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '/' | '='));
    if !valid {
        return Err(ParseFieldError::new(raw));
    }

    Ok(Some(trimmed.to_ascii_uppercase()))
}

/// Broker exports append share counts and percentages to the security name;
/// drop every token carrying a digit or `%`.
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace()
        .filter(|token| !token.chars().any(|c| c.is_ascii_digit() || c == '%'))
        .collect::<Vec<_>>()
        .join(" ")
}

//! Monetary amount parsing and formatting for Brazilian documents.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse an amount written either in Brazilian notation ("R$ 1.234,56")
/// or plain notation ("1234.56").
///
/// Only digits, separators, an optional leading minus, whitespace and the
/// `R$` currency mark are accepted; anything else yields `None`.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim().trim_start_matches("R$").trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, trimmed),
    };

    let cleaned: String = digits
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00a0}')
        .collect();

    if cleaned.is_empty()
        || !cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Whichever separator comes last is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => single_separator(&cleaned, ',')?,
        (None, Some(_)) => single_separator(&cleaned, '.')?,
        (None, None) => cleaned,
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Resolve an amount using only `sep`. Digit groups of three ("1.500",
/// "1,234,567") are thousands; a single other separator is decimal.
fn single_separator(cleaned: &str, sep: char) -> Option<String> {
    let mut groups = cleaned.split(sep);
    let lead = groups.next().unwrap_or_default();
    let grouped = (1..=3).contains(&lead.len()) && lead != "0" && groups.all(|g| g.len() == 3);

    if grouped {
        Some(cleaned.replace(sep, ""))
    } else if cleaned.matches(sep).count() == 1 {
        Some(cleaned.replace(sep, "."))
    } else {
        None
    }
}

/// Format an amount in Brazilian style (R$ 1.234,56).
pub fn format_brl(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
    format!("{}R$ {},{}", sign, formatted, decimal_part)
}

/// Convert a JSON value holding a number or a numeric string.
pub(crate) fn amount_from_value(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(|_| format!("{} is not a representable amount", n))
        }
        Value::String(s) => parse_amount(s).ok_or_else(|| format!("{:?} is not a number", s)),
        other => Err(format!("expected a number, found {}", kind_of(other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serde adapters used by the record types.
pub(crate) mod de {
    use std::collections::BTreeMap;

    use serde::de::Error;

    use super::*;

    pub fn required<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        amount_from_value(&value).map_err(D::Error::custom)
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => amount_from_value(&value).map(Some).map_err(D::Error::custom),
        }
    }

    /// Tax map; `null` entries are treated as absent taxes.
    pub fn tax_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
        let mut taxes = BTreeMap::new();
        for (name, value) in raw {
            if value.is_null() {
                continue;
            }
            let amount = amount_from_value(&value)
                .map_err(|e| D::Error::custom(format!("tax {}: {}", name, e)))?;
            taxes.insert(name.trim().to_uppercase(), amount);
        }
        Ok(taxes)
    }
}

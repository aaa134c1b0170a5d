//! Structured financial record produced by the language model.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amounts;

/// A fiscal document (nota fiscal, boleto, fatura) in structured form.
///
/// Field names on the wire are the Portuguese keys the extraction prompt
/// asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(rename = "tipo_documento", default)]
    pub document_type: Option<String>,

    #[serde(rename = "numero_documento", default, deserialize_with = "identifier")]
    pub document_number: Option<String>,

    #[serde(rename = "serie", default, deserialize_with = "identifier")]
    pub series: Option<String>,

    #[serde(rename = "emitente_nome", default)]
    pub issuer_name: Option<String>,

    /// CNPJ/CPF of the issuer.
    #[serde(rename = "emitente_cnpj", default, deserialize_with = "identifier")]
    pub issuer_tax_id: Option<String>,

    #[serde(rename = "destinatario_nome", default)]
    pub recipient_name: Option<String>,

    /// CNPJ/CPF of the recipient.
    #[serde(rename = "destinatario_cnpj", default, deserialize_with = "identifier")]
    pub recipient_tax_id: Option<String>,

    #[serde(rename = "data_emissao", default)]
    pub issue_date: Option<String>,

    #[serde(rename = "data_vencimento", default)]
    pub due_date: Option<String>,

    #[serde(rename = "forma_pagamento", default)]
    pub payment_method: Option<String>,

    #[serde(
        rename = "valor_total",
        default,
        deserialize_with = "amounts::de::optional"
    )]
    pub total_value: Option<Decimal>,

    #[serde(rename = "descricao", default)]
    pub description: Option<String>,

    /// Tax name (ICMS, PIS, COFINS, IPI, ...) to amount. Absent taxes are
    /// simply not present.
    #[serde(
        rename = "impostos",
        default,
        deserialize_with = "amounts::de::tax_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub taxes: BTreeMap<String, Decimal>,

    #[serde(rename = "itens", default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<LineItem>,
}

/// A single line on the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "descricao")]
    pub description: String,

    #[serde(rename = "quantidade", deserialize_with = "amounts::de::required")]
    pub quantity: Decimal,

    #[serde(rename = "valor_unitario", deserialize_with = "amounts::de::required")]
    pub unit_value: Decimal,

    #[serde(rename = "valor_total", deserialize_with = "amounts::de::required")]
    pub total_value: Decimal,
}

/// Document numbers and tax ids are often emitted as bare JSON numbers.
fn identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected text, found {}", other))),
    }
}

/// Date layouts seen on Brazilian documents and in model output.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Parse a date in any of the accepted layouts.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let raw = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

impl ExtractedRecord {
    /// JSON key names of every field, in prompt order.
    pub const FIELD_NAMES: [&'static str; 14] = [
        "tipo_documento",
        "numero_documento",
        "serie",
        "emitente_nome",
        "emitente_cnpj",
        "destinatario_nome",
        "destinatario_cnpj",
        "data_emissao",
        "data_vencimento",
        "forma_pagamento",
        "valor_total",
        "impostos",
        "itens",
        "descricao",
    ];

    /// Whether the model filled in nothing at all.
    pub fn is_empty(&self) -> bool {
        let texts = [
            &self.document_type,
            &self.document_number,
            &self.series,
            &self.issuer_name,
            &self.issuer_tax_id,
            &self.recipient_name,
            &self.recipient_tax_id,
            &self.issue_date,
            &self.due_date,
            &self.payment_method,
            &self.description,
        ];
        texts
            .iter()
            .all(|field| field.as_deref().is_none_or(|s| s.trim().is_empty()))
            && self.total_value.is_none()
            && self.taxes.is_empty()
            && self.line_items.is_empty()
    }

    /// Sum of all line item totals.
    pub fn line_items_total(&self) -> Decimal {
        self.line_items.iter().map(|item| item.total_value).sum()
    }

    /// Plausibility checks worth showing to a reviewer. None of these stop
    /// the workflow.
    pub fn review_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match self.total_value {
            None => issues.push("Valor total não identificado".to_string()),
            Some(total) if total <= Decimal::ZERO => {
                issues.push(format!("Valor total não positivo ({})", total));
            }
            Some(total) if !self.line_items.is_empty() => {
                let items = self.line_items_total();
                if (items - total).abs() > Decimal::new(1, 2) {
                    issues.push(format!(
                        "Soma dos itens ({}) difere do valor total ({})",
                        amounts::format_brl(items),
                        amounts::format_brl(total)
                    ));
                }
            }
            Some(_) => {}
        }

        if self.issuer_name.is_none() && self.issuer_tax_id.is_none() {
            issues.push("Emitente não identificado".to_string());
        }

        let issued = self.issue_date.as_deref().and_then(parse_date);
        let due = self.due_date.as_deref().and_then(parse_date);
        if let (Some(issued), Some(due)) = (issued, due) {
            if due < issued {
                issues.push(format!(
                    "Vencimento ({}) anterior à emissão ({})",
                    due.format("%d/%m/%Y"),
                    issued.format("%d/%m/%Y")
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn sample() -> ExtractedRecord {
        serde_json::from_str(
            r#"{
                "tipo_documento": "NF-e",
                "numero_documento": "000123",
                "serie": "1",
                "emitente_nome": "Distribuidora Alfa Ltda",
                "emitente_cnpj": "12.345.678/0001-90",
                "data_emissao": "2024-03-01",
                "data_vencimento": "15/03/2024",
                "valor_total": 873.71,
                "impostos": {"icms": 104.85, "PIS": "5,68", "COFINS": null},
                "itens": [
                    {"descricao": "Papel A4", "quantidade": 10, "valor_unitario": 25.5, "valor_total": 255.0},
                    {"descricao": "Toner", "quantidade": 1, "valor_unitario": "618,71", "valor_total": "618,71"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_record() {
        let record = sample();
        assert_eq!(record.total_value, Some(Decimal::from_str("873.71").unwrap()));
        assert_eq!(record.document_type.as_deref(), Some("NF-e"));
        assert_eq!(record.line_items.len(), 2);
        assert_eq!(record.taxes.len(), 2);
        assert_eq!(record.taxes["ICMS"], Decimal::from_str("104.85").unwrap());
        assert_eq!(record.taxes["PIS"], Decimal::from_str("5.68").unwrap());
        assert!(!record.taxes.contains_key("COFINS"));
    }

    #[test]
    fn test_non_numeric_amount_is_rejected() {
        let result: Result<ExtractedRecord, _> =
            serde_json::from_str(r#"{"valor_total": "oitocentos reais"}"#);
        assert!(result.is_err());

        let result: Result<ExtractedRecord, _> =
            serde_json::from_str(r#"{"itens": [{"descricao": "x", "quantidade": true, "valor_unitario": 1, "valor_total": 1}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_review_issues_clean_record() {
        assert_eq!(sample().review_issues(), Vec::<String>::new());
    }

    #[test]
    fn test_review_issues_flags_mismatches() {
        let mut record = sample();
        record.total_value = Some(Decimal::from_str("900.00").unwrap());
        record.due_date = Some("2024-02-01".to_string());

        let issues = record.review_issues();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("R$ 873,71"));
        assert!(issues[1].starts_with("Vencimento"));
    }

    #[test]
    fn test_numeric_identifiers_become_text() {
        let record: ExtractedRecord =
            serde_json::from_str(r#"{"numero_documento": 4512, "serie": 1}"#).unwrap();
        assert_eq!(record.document_number.as_deref(), Some("4512"));
        assert_eq!(record.series.as_deref(), Some("1"));
    }

    #[test]
    fn test_empty_record() {
        let record: ExtractedRecord = serde_json::from_str("{}").unwrap();
        assert!(record.is_empty());
        assert!(!sample().is_empty());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("15/03/2024"), expected);
        assert_eq!(parse_date("15.03.2024"), expected);
        assert_eq!(parse_date("março"), None);
    }
}

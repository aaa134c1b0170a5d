//! Reviewer-facing message texts.
//!
//! Messages are sent with Telegram's legacy Markdown, so the invoice payload
//! goes inside a code block where underscores and asterisks are literal.

use crate::models::Invoice;

/// Sent to the compliance channel when an invoice is created.
pub fn received_for_compliance(invoice: &Invoice) -> String {
    format!(
        "\u{1F4C4} *Fatura #{} recebida para conferência*\n{}",
        invoice.id(),
        code_block(&invoice.payload())
    )
}

/// Sent to the payment channel once compliance approves.
pub fn forwarded_for_payment(invoice: &Invoice) -> String {
    format!(
        "\u{1F4B8} *Fatura #{} aprovada e enviada para autorização de pagamento*\n{}",
        invoice.id(),
        code_block(&invoice.payload())
    )
}

fn code_block(payload: &str) -> String {
    let body = payload.trim();
    let body = if body.is_empty() { "(sem dados extraídos)" } else { body };
    // A fence inside the payload would close the block early
    format!("```\n{}\n```", body.replace("```", "'''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedRecord, TextSource};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn invoice(raw: &str, record: Option<ExtractedRecord>) -> Invoice {
        Invoice::new(7, raw.to_string(), record, TextSource::Embedded)
    }

    #[test]
    fn test_received_message() {
        let record = ExtractedRecord {
            total_value: Some(Decimal::from_str("873.71").unwrap()),
            issuer_name: Some("Alfa_Comercio".to_string()),
            ..Default::default()
        };
        let text = received_for_compliance(&invoice("ignored", Some(record)));

        assert!(text.starts_with("📄 *Fatura #7 recebida para conferência*\n```\n{"));
        assert!(text.contains("873.71"));
        assert!(text.contains("Alfa_Comercio"));
        assert!(text.ends_with("}\n```"));
    }

    #[test]
    fn test_forwarded_message_uses_raw_output() {
        let text = forwarded_for_payment(&invoice("Valor: R$ 10,00", None));
        assert!(text.starts_with("💸 *Fatura #7 aprovada e enviada para autorização de pagamento*"));
        assert!(text.contains("```\nValor: R$ 10,00\n```"));
    }

    #[test]
    fn test_payload_fences_are_neutralized() {
        let text = received_for_compliance(&invoice("```json\n{}\n```", None));
        assert_eq!(text.matches("```").count(), 2);
    }

    #[test]
    fn test_empty_payload() {
        let text = received_for_compliance(&invoice("  ", None));
        assert!(text.contains("(sem dados extraídos)"));
    }
}

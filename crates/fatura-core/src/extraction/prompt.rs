//! Prompts sent to the language model.

use crate::models::ExtractedRecord;

const SYSTEM_PROMPT: &str = "Você é um extrator de dados financeiros. \
Responda apenas com um objeto JSON válido, sem markdown e sem comentários.";

/// Shape and types the model should follow. Kept in sync with
/// `ExtractedRecord::FIELD_NAMES`.
const WORKED_EXAMPLE: &str = r#"{
  "tipo_documento": "NF-e",
  "numero_documento": "000123",
  "serie": "1",
  "emitente_nome": "Distribuidora Alfa Ltda",
  "emitente_cnpj": "12.345.678/0001-90",
  "destinatario_nome": "Comercial Beta S.A.",
  "destinatario_cnpj": "98.765.432/0001-10",
  "data_emissao": "2024-03-01",
  "data_vencimento": "2024-03-31",
  "forma_pagamento": "boleto",
  "valor_total": 873.71,
  "impostos": {"ICMS": 104.85, "PIS": 5.68, "COFINS": 26.21},
  "itens": [
    {"descricao": "Papel A4 500 folhas", "quantidade": 10, "valor_unitario": 25.50, "valor_total": 255.00},
    {"descricao": "Toner preto", "quantidade": 1, "valor_unitario": 618.71, "valor_total": 618.71}
  ],
  "descricao": "Material de escritório"
}"#;

/// A system/user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Keep the first `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt asking for the structured record of `text`.
pub fn build_prompt(text: &str) -> Prompt {
    let fields = ExtractedRecord::FIELD_NAMES
        .iter()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");

    let user = format!(
        "Extraia do documento abaixo os seguintes campos e responda somente com JSON:\n\
         {fields}\n\n\
         Regras:\n\
         - valores numéricos como números JSON com ponto decimal (873.71), sem \"R$\";\n\
         - datas no formato AAAA-MM-DD;\n\
         - use null para campos não encontrados e omita impostos ausentes;\n\
         - \"itens\" é uma lista de objetos com descricao, quantidade, valor_unitario e valor_total.\n\n\
         Exemplo de resposta:\n{WORKED_EXAMPLE}\n\n\
         Texto:\n{text}"
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Stricter prompt asking the model to repair its previous answer.
pub fn build_retry_prompt(previous_raw: &str) -> Prompt {
    let fields = ExtractedRecord::FIELD_NAMES.join(", ");
    let user = format!(
        "A resposta anterior não é um JSON válido no formato pedido. \
         Corrija-a e devolva APENAS o objeto JSON, começando com {{ e terminando com }}, \
         usando somente as chaves: {fields}. Valores numéricos devem ser números.\n\n\
         Resposta anterior:\n{previous_raw}"
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("ab", 10), "ab");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("conferência", 9), "conferênc");
        let long = "ã".repeat(5000);
        assert_eq!(truncate_chars(&long, 3000).chars().count(), 3000);
    }

    #[test]
    fn test_prompt_lists_every_field() {
        let prompt = build_prompt("NOTA FISCAL 123");
        for name in ExtractedRecord::FIELD_NAMES {
            assert!(prompt.user.contains(&format!("- {}", name)), "missing {}", name);
        }
        assert!(prompt.user.ends_with("NOTA FISCAL 123"));
        assert!(prompt.system.contains("JSON"));
    }

    #[test]
    fn test_worked_example_is_a_valid_record() {
        let record: ExtractedRecord = serde_json::from_str(WORKED_EXAMPLE).unwrap();
        assert!(record.review_issues().is_empty());
    }

    #[test]
    fn test_retry_prompt_quotes_previous_answer() {
        let prompt = build_retry_prompt("Aqui está: valor 873,71");
        assert!(prompt.user.contains("Aqui está: valor 873,71"));
        assert!(prompt.user.contains("valor_total"));
    }
}

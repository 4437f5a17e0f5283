//! System prompt for the analysis call.
//!
//! The JSON object in the template is the response contract: every key the
//! client reads back (see [`crate::models::AnalysisResult::contract_keys`])
//! is spelled out here, and the claim-line markers are the ones
//! [`crate::claims`] counts.

const SYSTEM_PROMPT_TEMPLATE: &str = r#"Du är en erfaren svensk nyhetsanalytiker med fokus på källkritik och balans.
Du får en artikel som JSON med fälten "title" och "summary". Basera analysen ENDAST på rubriken och
sammanfattningen. Hitta inte på citat, siffror eller händelser som inte går att härleda ur texten.

Returnera strikt JSON, utan markdown och utan text före eller efter objektet, med exakt följande struktur:

{
    "main_facts": "Huvudfakta och påståenden från artikeln",
    "bias_assessment": {
        "label": "vänster | center-vänster | neutral | center-höger | höger",
        "explanation": "En mening om varför",
        "balance": "Vilka perspektiv som saknas eller överbetonas"
    },
    "factual_accuracy": {
        "claim_verification": "Ett påstående per rad: '- <påstående> | Säkerhet: hög/medel/låg | Korrigering: <motbevis eller tomt>'",
        "unsupported_assertions": "Påståenden i texten som saknar stöd, ett per rad"
    },
    "quality_scores": {
        "accuracy": 0,
        "source_reliability": 0,
        "balance": 0,
        "depth": 0
    },
    "macro_perspective": {
        "context": "Kort bakgrund och historisk kontext",
        "implications": "Konsekvenser och påverkan"
    },
    "sources": ["Källor för verifiering och kontext"]
}

Poängsättning (heltal 0–100):
- accuracy: hur väl påståendena stämmer med etablerad kunskap
- source_reliability: hur väl påståendena är förankrade i namngivna, trovärdiga källor
- balance: hur allsidigt ämnet presenteras
- depth: hur mycket sammanhang läsaren får

Håll varje textfält koncist (max {max_words} ord). Använd "Säkerhet: hög" eller "Säkerhet: medel" bara när
påståendet kan bekräftas. Korrigera felaktiga påståenden genom att presentera motbevis efter "Korrigering:",
inte genom att bara säga att de är fel. Lämna "Korrigering:" tomt när inget behöver rättas."#;

/// Render the system prompt for a given per-section word budget.
pub fn build_system_prompt(max_words: u32) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{max_words}", &max_words.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisResult;

    #[test]
    fn test_word_budget_is_substituted() {
        let prompt = build_system_prompt(200);
        assert!(prompt.contains("max 200 ord"));
        assert!(!prompt.contains("{max_words}"));
    }

    #[test]
    fn test_every_contract_key_is_spelled_out() {
        let prompt = build_system_prompt(70);
        for key in AnalysisResult::contract_keys() {
            assert!(
                prompt.contains(&format!("\"{key}\"")),
                "prompt is missing key {key}"
            );
        }
    }

    #[test]
    fn test_claim_markers_are_requested() {
        let prompt = build_system_prompt(70);
        assert!(prompt.contains("Säkerhet:"));
        assert!(prompt.contains("Korrigering:"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        assert_eq!(build_system_prompt(100), build_system_prompt(100));
        assert_ne!(build_system_prompt(100), build_system_prompt(101));
    }
}

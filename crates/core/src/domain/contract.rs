use crate::domain::error::AnalysisError;
use crate::domain::recommendation::{AnalysisResult, CardRecommendation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_RECOMMENDATIONS: usize = 2;

/// Card list as emitted by the model. Entries stay untyped so that one bad record
/// does not sink the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCardList {
    pub cards: Vec<Value>,
}

impl LlmCardList {
    pub fn from_value(value: Value) -> Result<Self, AnalysisError> {
        let Some(cards) = value.get("cards") else {
            return Err(AnalysisError::malformed("missing cards array"));
        };
        if !cards.is_array() {
            return Err(AnalysisError::malformed("missing cards array"));
        }
        serde_json::from_value::<Self>(value)
            .map_err(|e| AnalysisError::malformed(format!("invalid cards array: {e}")))
    }

    pub fn validate_and_into_result(self) -> Result<AnalysisResult, AnalysisError> {
        if self.cards.is_empty() {
            return Err(AnalysisError::malformed("no cards returned in response"));
        }

        let total = self.cards.len();
        let cards: Vec<CardRecommendation> = self
            .cards
            .iter()
            .filter_map(card_from_value)
            .take(MAX_RECOMMENDATIONS)
            .collect();

        if cards.is_empty() {
            return Err(AnalysisError::malformed("no valid cards in response"));
        }
        tracing::debug!(total, kept = cards.len(), "validated card entries");

        Ok(AnalysisResult { cards })
    }
}

/// Validates a recovered payload into at most two complete recommendations.
pub fn validate_cards(value: Value) -> Result<AnalysisResult, AnalysisError> {
    LlmCardList::from_value(value)?.validate_and_into_result()
}

fn card_from_value(entry: &Value) -> Option<CardRecommendation> {
    Some(CardRecommendation {
        card: required_str(entry, "card")?,
        rate: required_str(entry, "rate")?,
        reason: required_str(entry, "reason")?,
    })
}

fn required_str(entry: &Value, key: &str) -> Option<String> {
    let s = entry.get(key)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(name: &str) -> Value {
        json!({"card": name, "rate": "3x points", "reason": "dining bonus"})
    }

    #[test]
    fn keeps_complete_entries_only() {
        let v = json!({"cards": [{"card": "A"}, {"card": "B", "rate": "2x", "reason": "r"}]});
        let result = validate_cards(v).unwrap();
        assert_eq!(result.cards.len(), 1);
        assert_eq!(result.cards[0].card, "B");
    }

    #[test]
    fn truncates_to_two_in_order() {
        let v = json!({"cards": [card("A"), card("B"), card("C"), card("D"), card("E")]});
        let result = validate_cards(v).unwrap();
        let names: Vec<_> = result.cards.iter().map(|c| c.card.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn blank_or_non_string_fields_count_as_missing() {
        let v = json!({"cards": [
            {"card": "  ", "rate": "2x", "reason": "r"},
            {"card": "A", "rate": 5, "reason": "r"},
            {"card": "B", "rate": "2x", "reason": null},
        ]});
        let err = validate_cards(v).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_missing_or_non_array_cards() {
        assert!(matches!(
            validate_cards(json!({"items": []})),
            Err(AnalysisError::MalformedResponse(_))
        ));
        assert!(matches!(
            validate_cards(json!({"cards": "A"})),
            Err(AnalysisError::MalformedResponse(_))
        ));
        assert!(matches!(
            validate_cards(json!([card("A")])),
            Err(AnalysisError::MalformedResponse(_))
        ));
    }

    #[test]
    fn rejects_empty_cards() {
        let err = validate_cards(json!({"cards": []})).unwrap_err();
        assert_eq!(err, AnalysisError::malformed("no cards returned in response"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let v = json!({"cards": [{"card": " Bilt Mastercard ", "rate": "3x ", "reason": " dining"}]});
        let result = validate_cards(v).unwrap();
        assert_eq!(result.cards[0].card, "Bilt Mastercard");
        assert_eq!(result.cards[0].rate, "3x");
        assert_eq!(result.cards[0].reason, "dining");
    }
}

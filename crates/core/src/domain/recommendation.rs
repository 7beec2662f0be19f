use serde::{Deserialize, Serialize};

/// One recommended card. Every field is a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecommendation {
    pub card: String,
    pub rate: String,
    pub reason: String,
}

/// Top picks for a purchase, best first. Holds one or two cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub cards: Vec<CardRecommendation>,
}

/// Wire body of `POST /api/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
    #[serde(rename = "cardInfo")]
    pub card_info: String,
}

impl AnalysisResult {
    pub const ERROR_CARD_NAME: &'static str = "Analysis Error";

    /// Single placeholder card rendered in place of a real recommendation.
    pub fn error_card(reason: impl Into<String>) -> Self {
        Self {
            cards: vec![CardRecommendation {
                card: Self::ERROR_CARD_NAME.to_string(),
                rate: "N/A".to_string(),
                reason: reason.into(),
            }],
        }
    }

    pub fn is_error_card(&self) -> bool {
        matches!(self.cards.as_slice(), [only] if only.card == Self::ERROR_CARD_NAME)
    }
}

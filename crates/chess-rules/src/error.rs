use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    #[error("Invalid promotion piece: {0}")]
    InvalidPromotion(String),

    #[error("Invalid notation: {0}")]
    InvalidNotation(String),
}

impl RulesError {
    /// Whether the error stems from caller input rather than stored data.
    pub fn is_input_error(&self) -> bool {
        matches!(self, RulesError::InvalidSquare(_) | RulesError::InvalidPromotion(_))
    }
}

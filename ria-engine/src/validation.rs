//! Input validation at the engine boundary (spec §6).

use serde::{Deserialize, Serialize};

/// Minimum word count a proposal must meet before an assessment is created.
pub const MIN_PROPOSAL_WORDS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub input_received: String,
    pub guidance: String,
    pub examples: Vec<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.guidance)
    }
}

impl std::error::Error for ValidationError {}

/// Rejects a proposal under `MIN_PROPOSAL_WORDS` words rather than letting it
/// reach the council with too little to synthesize from.
pub fn validate_proposal(proposal_text: &str) -> Result<(), ValidationError> {
    let word_count = proposal_text.split_whitespace().count();
    if word_count >= MIN_PROPOSAL_WORDS {
        return Ok(());
    }
    Err(ValidationError {
        input_received: format!("{word_count} word(s)"),
        guidance: format!(
            "proposal_text must contain at least {MIN_PROPOSAL_WORDS} words; received {word_count}"
        ),
        examples: vec![
            "Describe the regulatory change, its rationale, the parties it affects, and the proposed implementation timeline.".to_string(),
            "Include the specific policy mechanism, expected compliance obligations, and any transitional provisions.".to_string(),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_proposal_is_rejected_with_guidance() {
        let err = validate_proposal("too short").unwrap_err();
        assert_eq!(err.input_received, "2 word(s)");
        assert!(!err.examples.is_empty());
    }

    #[test]
    fn proposal_at_the_threshold_is_accepted() {
        let text = "word ".repeat(MIN_PROPOSAL_WORDS);
        assert!(validate_proposal(&text).is_ok());
    }
}

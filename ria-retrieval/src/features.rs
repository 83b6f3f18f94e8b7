use ria_contracts::PolicyCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Coarse complexity signal from surface length, used only to pick a
/// retrieval strategy, not to size the context budget (spec §4.5).
fn classify_complexity(text: &str) -> Complexity {
    let word_count = text.split_whitespace().count();
    if word_count < 40 {
        Complexity::Low
    } else if word_count < 200 {
        Complexity::Medium
    } else {
        Complexity::High
    }
}

#[derive(Debug, Clone)]
pub struct QueryFeatures {
    pub query_text: String,
    pub category_tags: Vec<PolicyCategory>,
    pub complexity: Complexity,
}

/// Extracts category tags by case-insensitive substring/synonym scan over
/// the closed category set, plus any categories explicitly given as filters
/// (spec §4.5 step 1).
pub fn extract_features(proposal_text: &str, explicit_categories: &[PolicyCategory]) -> QueryFeatures {
    let mut category_tags = PolicyCategory::match_in_text(proposal_text);
    for category in explicit_categories {
        if !category_tags.contains(category) {
            category_tags.push(*category);
        }
    }
    QueryFeatures {
        query_text: proposal_text.to_string(),
        category_tags,
        complexity: classify_complexity(proposal_text),
    }
}

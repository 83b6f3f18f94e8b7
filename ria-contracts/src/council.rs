use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ModelId;

/// Anonymized Stage-1 response label, e.g. `"Response A"`. Assigned in
/// enumeration order over the council's responses (spec §4.7 Stage 1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseLabel(pub String);

impl ResponseLabel {
    pub fn from_index(index: usize) -> Self {
        let letter = (b'A' + (index % 26) as u8) as char;
        Self(format!("Response {letter}"))
    }
}

impl fmt::Display for ResponseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMethod {
    Borda,
    PositionAvg,
    Consensus,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        AggregationMethod::Borda
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    pub name: String,
    pub focus: String,
}

/// The rotating criteria list used to diversify bootstrap iterations (spec
/// §4.7 Stage 2): accuracy, completeness, clarity, utility, balanced.
pub fn default_criteria() -> Vec<EvaluationCriterion> {
    [
        ("accuracy", "factual correctness and grounding in the supplied context"),
        ("completeness", "coverage of all relevant themes and evidence"),
        ("clarity", "readability and unambiguous structure"),
        ("utility", "actionable value to a policy reviewer"),
        ("balanced", "even-handed treatment of competing interests"),
    ]
    .into_iter()
    .map(|(name, focus)| EvaluationCriterion {
        name: name.to_string(),
        focus: focus.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub iterations: u32,
    pub enabled: bool,
    pub criteria: Vec<EvaluationCriterion>,
    pub aggregation_method: AggregationMethod,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            enabled: true,
            criteria: default_criteria(),
            aggregation_method: AggregationMethod::Borda,
        }
    }
}

/// One bootstrap iteration's parsed ranking from a single evaluator model,
/// or a note that it failed to parse (spec §4.7 Stage 2 parse-error path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IterationRanking {
    Parsed(Vec<ResponseLabel>),
    ParseFailed { raw_response: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilRun {
    pub stage1: HashMap<ModelId, String>,
    pub stage1_labels: HashMap<ModelId, ResponseLabel>,
    pub stage2: HashMap<ModelId, Vec<IterationRanking>>,
    pub stage2_aggregated: HashMap<ModelId, Vec<ResponseLabel>>,
    pub stage3_text: Option<String>,
    pub stage3_structured: Option<crate::report::ReportSections>,
    pub bootstrap_config: Option<BootstrapConfig>,
    pub retry_count: u32,
    pub errors: Vec<String>,
    pub chairman_fallback: bool,
    pub revision_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CouncilRun {
    pub fn new(bootstrap_config: BootstrapConfig) -> Self {
        Self {
            stage1: HashMap::new(),
            stage1_labels: HashMap::new(),
            stage2: HashMap::new(),
            stage2_aggregated: HashMap::new(),
            stage3_text: None,
            stage3_structured: None,
            bootstrap_config: Some(bootstrap_config),
            retry_count: 0,
            errors: Vec::new(),
            chairman_fallback: false,
            revision_feedback: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.stage3_text.is_some()
    }
}

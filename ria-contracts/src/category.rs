//! Closed-set vocabulary: policy categories, domains, and analysis patterns.
//!
//! Encoded as tagged enums rather than free strings so graph construction and
//! traversal stay totally typed, and an unrecognized tag is an ingestion-time
//! parse error rather than a retrieval-time surprise.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ContractError;

/// Closed set of 15 high-level policy tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyCategory {
    Environment,
    Digital,
    Competition,
    Health,
    FundamentalRights,
    Employment,
    EconomicDevelopment,
    Energy,
    Transport,
    Agriculture,
    Education,
    Justice,
    Finance,
    SocialProtection,
    ConsumerProtection,
}

impl PolicyCategory {
    pub const ALL: [PolicyCategory; 15] = [
        PolicyCategory::Environment,
        PolicyCategory::Digital,
        PolicyCategory::Competition,
        PolicyCategory::Health,
        PolicyCategory::FundamentalRights,
        PolicyCategory::Employment,
        PolicyCategory::EconomicDevelopment,
        PolicyCategory::Energy,
        PolicyCategory::Transport,
        PolicyCategory::Agriculture,
        PolicyCategory::Education,
        PolicyCategory::Justice,
        PolicyCategory::Finance,
        PolicyCategory::SocialProtection,
        PolicyCategory::ConsumerProtection,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PolicyCategory::Environment => "Environment",
            PolicyCategory::Digital => "Digital",
            PolicyCategory::Competition => "Competition",
            PolicyCategory::Health => "Health",
            PolicyCategory::FundamentalRights => "Fundamental Rights",
            PolicyCategory::Employment => "Employment",
            PolicyCategory::EconomicDevelopment => "Economic Development",
            PolicyCategory::Energy => "Energy",
            PolicyCategory::Transport => "Transport",
            PolicyCategory::Agriculture => "Agriculture",
            PolicyCategory::Education => "Education",
            PolicyCategory::Justice => "Justice",
            PolicyCategory::Finance => "Finance",
            PolicyCategory::SocialProtection => "Social Protection",
            PolicyCategory::ConsumerProtection => "Consumer Protection",
        }
    }

    /// Exact (case-insensitive) label match only. Use [`match_in_text`] for
    /// substring/synonym scanning over free text.
    pub fn parse(label: &str) -> Result<Self, ContractError> {
        let needle = label.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().to_lowercase() == needle)
            .ok_or_else(|| ContractError::UnknownCategory(label.to_string()))
    }

    /// Scans free text for category labels or known synonyms, case
    /// insensitively, returning every category that matched (in
    /// [`PolicyCategory::ALL`] order, deduplicated).
    pub fn match_in_text(text: &str) -> Vec<PolicyCategory> {
        let lower = text.to_lowercase();
        let mut found = Vec::new();
        for category in PolicyCategory::ALL {
            let label_hit = lower.contains(&category.label().to_lowercase());
            let synonym_hit = CATEGORY_SYNONYMS
                .iter()
                .any(|(syn, cat)| *cat == category && lower.contains(syn));
            if label_hit || synonym_hit {
                found.push(category);
            }
        }
        found
    }
}

impl fmt::Display for PolicyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Synonym table used by the retrieval orchestrator's feature extraction
/// (spec §4.5): "AI" -> Digital, "ecosystem" -> Environment, etc.
static CATEGORY_SYNONYMS: Lazy<Vec<(&'static str, PolicyCategory)>> = Lazy::new(|| {
    vec![
        ("ai", PolicyCategory::Digital),
        ("artificial intelligence", PolicyCategory::Digital),
        ("data protection", PolicyCategory::Digital),
        ("algorithm", PolicyCategory::Digital),
        ("ecosystem", PolicyCategory::Environment),
        ("biodiversity", PolicyCategory::Environment),
        ("climate", PolicyCategory::Environment),
        ("antitrust", PolicyCategory::Competition),
        ("monopoly", PolicyCategory::Competition),
        ("public health", PolicyCategory::Health),
        ("pandemic", PolicyCategory::Health),
        ("human rights", PolicyCategory::FundamentalRights),
        ("privacy", PolicyCategory::FundamentalRights),
        ("labor", PolicyCategory::Employment),
        ("labour", PolicyCategory::Employment),
        ("workforce", PolicyCategory::Employment),
        ("gdp", PolicyCategory::EconomicDevelopment),
        ("growth", PolicyCategory::EconomicDevelopment),
        ("renewable", PolicyCategory::Energy),
        ("grid", PolicyCategory::Energy),
        ("mobility", PolicyCategory::Transport),
        ("logistics", PolicyCategory::Transport),
        ("farming", PolicyCategory::Agriculture),
        ("crop", PolicyCategory::Agriculture),
        ("school", PolicyCategory::Education),
        ("curriculum", PolicyCategory::Education),
        ("judiciary", PolicyCategory::Justice),
        ("courts", PolicyCategory::Justice),
        ("banking", PolicyCategory::Finance),
        ("taxation", PolicyCategory::Finance),
        ("welfare", PolicyCategory::SocialProtection),
        ("pension", PolicyCategory::SocialProtection),
        ("consumer", PolicyCategory::ConsumerProtection),
        ("product safety", PolicyCategory::ConsumerProtection),
    ]
});

/// Closed set of 6 analysis domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    Legal,
    Economic,
    Technological,
    Social,
    Environmental,
    Administrative,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Legal,
        Domain::Economic,
        Domain::Technological,
        Domain::Social,
        Domain::Environmental,
        Domain::Administrative,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::Legal => "legal",
            Domain::Economic => "economic",
            Domain::Technological => "technological",
            Domain::Social => "social",
            Domain::Environmental => "environmental",
            Domain::Administrative => "administrative",
        }
    }

    pub fn parse(label: &str) -> Result<Self, ContractError> {
        let needle = label.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.label() == needle)
            .ok_or_else(|| ContractError::UnknownDomain(label.to_string()))
    }

    /// Domains a policy category is conventionally associated with, used to
    /// seed `Category has_domain Domain` graph edges (spec §4.4).
    pub fn for_category(category: PolicyCategory) -> &'static [Domain] {
        use Domain::*;
        match category {
            PolicyCategory::Environment => &[Environmental, Legal],
            PolicyCategory::Digital => &[Technological, Legal],
            PolicyCategory::Competition => &[Economic, Legal],
            PolicyCategory::Health => &[Social, Administrative],
            PolicyCategory::FundamentalRights => &[Legal, Social],
            PolicyCategory::Employment => &[Social, Economic],
            PolicyCategory::EconomicDevelopment => &[Economic],
            PolicyCategory::Energy => &[Environmental, Economic],
            PolicyCategory::Transport => &[Economic, Environmental],
            PolicyCategory::Agriculture => &[Economic, Environmental],
            PolicyCategory::Education => &[Social, Administrative],
            PolicyCategory::Justice => &[Legal, Administrative],
            PolicyCategory::Finance => &[Economic, Administrative],
            PolicyCategory::SocialProtection => &[Social, Administrative],
            PolicyCategory::ConsumerProtection => &[Legal, Economic],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Closed set of 7 analysis patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnalysisPattern {
    CostBenefit,
    RiskBased,
    MarketFailure,
    Stakeholder,
    ImpactAssessment,
    BaselineComparison,
    Subsidiarity,
}

impl AnalysisPattern {
    pub const ALL: [AnalysisPattern; 7] = [
        AnalysisPattern::CostBenefit,
        AnalysisPattern::RiskBased,
        AnalysisPattern::MarketFailure,
        AnalysisPattern::Stakeholder,
        AnalysisPattern::ImpactAssessment,
        AnalysisPattern::BaselineComparison,
        AnalysisPattern::Subsidiarity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisPattern::CostBenefit => "cost-benefit",
            AnalysisPattern::RiskBased => "risk-based",
            AnalysisPattern::MarketFailure => "market-failure",
            AnalysisPattern::Stakeholder => "stakeholder",
            AnalysisPattern::ImpactAssessment => "impact-assessment",
            AnalysisPattern::BaselineComparison => "baseline-comparison",
            AnalysisPattern::Subsidiarity => "subsidiarity",
        }
    }

    pub fn parse(label: &str) -> Result<Self, ContractError> {
        let needle = label.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.label() == needle)
            .ok_or_else(|| ContractError::UnknownAnalysisPattern(label.to_string()))
    }

    /// Keyword signature table used to infer an analysis pattern for
    /// `kind=analysis` chunks during graph construction (spec §4.4).
    /// Returns every pattern whose signature keywords appear in `text`, in
    /// [`AnalysisPattern::ALL`] order.
    pub fn infer_from_text(text: &str) -> Vec<AnalysisPattern> {
        let lower = text.to_lowercase();
        ANALYSIS_PATTERN_SIGNATURES
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
            .map(|(pattern, _)| *pattern)
            .collect()
    }
}

impl fmt::Display for AnalysisPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

static ANALYSIS_PATTERN_SIGNATURES: Lazy<HashMap<AnalysisPattern, Vec<&'static str>>> =
    Lazy::new(|| {
        use AnalysisPattern::*;
        let mut map = HashMap::new();
        map.insert(CostBenefit, vec!["cost-benefit", "cost benefit", "net present value", "roi"]);
        map.insert(RiskBased, vec!["risk-based", "risk assessment", "risk matrix", "likelihood"]);
        map.insert(MarketFailure, vec!["market failure", "externality", "information asymmetry"]);
        map.insert(Stakeholder, vec!["stakeholder", "consultation", "public comment"]);
        map.insert(ImpactAssessment, vec!["impact assessment", "impact analysis"]);
        map.insert(
            BaselineComparison,
            vec!["baseline", "status quo", "counterfactual"],
        );
        map.insert(Subsidiarity, vec!["subsidiarity", "proportionality", "member state competence"]);
        map
    });

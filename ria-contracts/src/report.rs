//! Chairman-output structured parse (spec §4.8): the fixed section map and
//! the 21-theme impact assessment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactTag {
    Positive,
    Negative,
    None,
    /// The chairman output omitted this theme; handled defensively per
    /// spec §9 open question rather than treated as a parse failure.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionName {
    BackgroundAndProblemDefinition,
    ExecutiveSummary,
    ProposalOverview,
    ImpactThemesAssessment,
    OverallAssessmentSummary,
}

impl SectionName {
    pub const ALL: [SectionName; 5] = [
        SectionName::BackgroundAndProblemDefinition,
        SectionName::ExecutiveSummary,
        SectionName::ProposalOverview,
        SectionName::ImpactThemesAssessment,
        SectionName::OverallAssessmentSummary,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            SectionName::BackgroundAndProblemDefinition => "Background and Problem Definition",
            SectionName::ExecutiveSummary => "Executive Summary",
            SectionName::ProposalOverview => "Proposal Overview",
            SectionName::ImpactThemesAssessment => "21 Belgian Impact Themes Assessment",
            SectionName::OverallAssessmentSummary => "Overall Assessment Summary",
        }
    }
}

pub const THEME_COUNT: usize = 21;

/// Canonical ordered list of the 21 Belgian regulatory impact themes.
pub const THEME_TITLES: [&str; THEME_COUNT] = [
    "Budgetary impact for the federal government",
    "Budgetary impact for other public authorities",
    "Administrative burden for enterprises",
    "Administrative burden for citizens",
    "Impact on small and medium enterprises",
    "Impact on competitiveness",
    "Impact on employment",
    "Impact on the internal market",
    "Impact on consumer interests",
    "Impact on sustainable development",
    "Impact on the environment",
    "Impact on public health",
    "Impact on social protection",
    "Impact on gender equality",
    "Impact on persons with disabilities",
    "Impact on poverty and social exclusion",
    "Impact on fundamental rights",
    "Impact on data protection and privacy",
    "Impact on the judiciary and justice system",
    "Impact on federalism and subsidiarity",
    "Impact on international obligations",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeEntry {
    pub index: usize,
    pub title: String,
    pub impact: ImpactTag,
    pub explanation: String,
    /// Bracketed references back to chunk ids or document names found near
    /// this theme's text (spec §4.8 point 4).
    pub citations: Vec<String>,
}

impl ThemeEntry {
    pub fn missing(index: usize) -> Self {
        Self {
            index,
            title: THEME_TITLES
                .get(index.saturating_sub(1))
                .copied()
                .unwrap_or("unknown theme")
                .to_string(),
            impact: ImpactTag::Unknown,
            explanation: "missing in synthesis".to_string(),
            citations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSections {
    pub background_and_problem_definition: Option<String>,
    pub executive_summary: Option<String>,
    pub proposal_overview: Option<String>,
    pub themes: Vec<ThemeEntry>,
    pub overall_assessment_summary: Option<String>,
    pub missing_theme_count: usize,
}

impl ReportSections {
    /// A completely empty parse: all sections absent, all 21 themes
    /// recorded as missing (spec §4.8: "missing inputs never cause a
    /// crash").
    pub fn all_missing() -> Self {
        let themes = (1..=THEME_COUNT).map(ThemeEntry::missing).collect();
        Self {
            background_and_problem_definition: None,
            executive_summary: None,
            proposal_overview: None,
            themes,
            overall_assessment_summary: None,
            missing_theme_count: THEME_COUNT,
        }
    }
}

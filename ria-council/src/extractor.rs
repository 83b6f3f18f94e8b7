use once_cell::sync::Lazy;
use regex::Regex;
use ria_contracts::{ImpactTag, ReportSections, SectionName, ThemeEntry, THEME_COUNT};

static THEME_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{1,2})\]").unwrap());
static CITATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]\d][^\]]*)\]").unwrap());

/// Parses the chairman's free-text synthesis into the fixed section map and
/// 21-theme impact assessment (spec §4.8). Never panics on malformed or
/// missing input; absent pieces degrade to `None`/`ImpactTag::Unknown`.
pub fn extract(text: &str) -> ReportSections {
    let section_spans = locate_sections(text);

    let mut sections = ReportSections::all_missing();
    for name in SectionName::ALL {
        let Some(body) = section_spans.get(&name) else { continue };
        match name {
            SectionName::BackgroundAndProblemDefinition => sections.background_and_problem_definition = Some(body.trim().to_string()),
            SectionName::ExecutiveSummary => sections.executive_summary = Some(body.trim().to_string()),
            SectionName::ProposalOverview => sections.proposal_overview = Some(body.trim().to_string()),
            SectionName::OverallAssessmentSummary => sections.overall_assessment_summary = Some(body.trim().to_string()),
            SectionName::ImpactThemesAssessment => sections.themes = extract_themes(body),
        }
    }
    sections.missing_theme_count = sections.themes.iter().filter(|t| matches!(t.impact, ImpactTag::Unknown)).count();
    sections
}

/// Finds each of the 5 fixed section headings (case-insensitive) and slices
/// the text between consecutive headings in the order they appear.
fn locate_sections(text: &str) -> std::collections::HashMap<SectionName, String> {
    let lower = text.to_lowercase();
    let mut found: Vec<(usize, SectionName)> = Vec::new();
    for name in SectionName::ALL {
        if let Some(pos) = lower.find(&name.heading().to_lowercase()) {
            found.push((pos, name));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut spans = std::collections::HashMap::new();
    for (i, (pos, name)) in found.iter().enumerate() {
        let content_start = pos + name.heading().len();
        let content_end = found.get(i + 1).map(|(next_pos, _)| *next_pos).unwrap_or(text.len());
        if content_start < content_end {
            spans.insert(*name, text[content_start..content_end].to_string());
        }
    }
    spans
}

fn classify_impact(theme_text: &str) -> ImpactTag {
    let window: String = theme_text.chars().take(160).collect::<String>().to_lowercase();
    if window.contains("no impact") {
        ImpactTag::None
    } else if window.contains("negative impact") {
        ImpactTag::Negative
    } else if window.contains("positive impact") {
        ImpactTag::Positive
    } else {
        ImpactTag::Unknown
    }
}

fn extract_citations(theme_text: &str) -> Vec<String> {
    CITATION_RE.captures_iter(theme_text).map(|c| c[1].trim().to_string()).collect()
}

/// Splits the themes section body on `[N]` markers and validates exactly 21
/// are present; any index missing a marker is recorded as
/// `ImpactTag::Unknown` with explanation `"missing in synthesis"` (spec §4.8
/// point 3).
fn extract_themes(body: &str) -> Vec<ThemeEntry> {
    // (theme index, marker-end offset, marker-start offset) for each valid [N] marker, in order.
    let markers: Vec<(usize, usize, usize)> = THEME_MARKER_RE
        .captures_iter(body)
        .filter_map(|c| {
            let index: usize = c[1].parse().ok()?;
            let whole = c.get(0)?;
            (1..=THEME_COUNT).contains(&index).then_some((index, whole.end(), whole.start()))
        })
        .collect();

    let mut by_index: std::collections::HashMap<usize, String> = std::collections::HashMap::new();
    for (i, (index, end, _start)) in markers.iter().enumerate() {
        let segment_end = markers.get(i + 1).map(|(_, _, next_start)| *next_start).unwrap_or(body.len());
        by_index.entry(*index).or_insert_with(|| body[*end..segment_end].to_string());
    }

    (1..=THEME_COUNT)
        .map(|index| match by_index.get(&index) {
            Some(text) => ThemeEntry {
                index,
                title: ria_contracts::THEME_TITLES[index - 1].to_string(),
                impact: classify_impact(text),
                explanation: text.trim().to_string(),
                citations: extract_citations(text),
            },
            None => ThemeEntry::missing(index),
        })
        .collect()
}

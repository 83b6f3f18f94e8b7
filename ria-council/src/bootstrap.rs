use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use ria_contracts::council::{AggregationMethod, EvaluationCriterion, IterationRanking};
use ria_contracts::{AssessmentId, ModelId, ResponseLabel};
use ria_model_client::{Message, ModelClient, QueryParams};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::permutation::permutation;

static RESPONSE_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Response\s+([A-Za-z])").unwrap());

pub struct Stage2Outcome {
    pub iterations: HashMap<ModelId, Vec<IterationRanking>>,
    pub aggregated: HashMap<ModelId, Vec<ResponseLabel>>,
    pub errors: Vec<String>,
}

fn evaluation_prompt(proposal: &str, criterion: &EvaluationCriterion, shuffled_contents: &[(ResponseLabel, &str)]) -> Vec<Message> {
    let mut body = format!(
        "Proposal:\n{proposal}\n\nEvaluate the following independent assessments on the criterion \
         \"{}\" ({}). Respond with a strict ranking, best first, using only the response labels, \
         nothing else.\n\n",
        criterion.name, criterion.focus
    );
    for (label, content) in shuffled_contents {
        body.push_str(&format!("{label}: {content}\n\n"));
    }
    vec![
        Message::system("You are an impartial evaluator ranking anonymized assessments."),
        Message::user(body),
    ]
}

/// Parses the first occurrence, in reading order, of each `Response X`
/// label. Valid only if it names exactly `expected_len` distinct labels
/// drawn from `0..expected_len`.
fn parse_ranking(text: &str, expected_len: usize) -> Option<Vec<usize>> {
    let mut seen = Vec::new();
    for capture in RESPONSE_LABEL_RE.captures_iter(text) {
        let letter = capture.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
        let position = (letter as u8).checked_sub(b'A')? as usize;
        if position >= expected_len || seen.contains(&position) {
            continue;
        }
        seen.push(position);
    }
    if seen.len() == expected_len {
        Some(seen)
    } else {
        None
    }
}

struct BootstrapPlan {
    iterations: u32,
    randomized: bool,
}

fn plan_for(config: &ria_contracts::council::BootstrapConfig) -> BootstrapPlan {
    if !config.enabled || config.iterations == 0 {
        BootstrapPlan { iterations: 1, randomized: false }
    } else {
        BootstrapPlan { iterations: config.iterations, randomized: true }
    }
}

/// Runs `K` bootstrap ranking iterations and aggregates each evaluator's
/// per-iteration rankings into a consensus ranking (spec §4.7 Stage 2).
pub async fn run_stage2(
    assessment_id: AssessmentId,
    evaluators: &[ModelId],
    stage1_labels: &HashMap<ModelId, ResponseLabel>,
    stage1_responses: &HashMap<ModelId, String>,
    config: &ria_contracts::council::BootstrapConfig,
    proposal: &str,
    client: &dyn ModelClient,
    cancel: CancellationToken,
) -> Stage2Outcome {
    let mut ordered: Vec<(ResponseLabel, &str)> = stage1_labels
        .iter()
        .map(|(model, label)| (label.clone(), stage1_responses[model].as_str()))
        .collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    let n = ordered.len();

    let plan = plan_for(config);
    let mut per_evaluator: HashMap<ModelId, Vec<IterationRanking>> = HashMap::new();

    for i in 0..plan.iterations {
        let criterion = &config.criteria[(i as usize) % config.criteria.len().max(1)];
        let perm = if plan.randomized { permutation(assessment_id, i, n) } else { (0..n).collect() };
        // Relabel by shuffled position, not original index, to anonymize the
        // order responses are re-presented in for this iteration.
        let shuffled: Vec<(ResponseLabel, &str)> =
            perm.iter().enumerate().map(|(pos, &orig_idx)| (ResponseLabel::from_index(pos), ordered[orig_idx].1)).collect();
        let prompt = evaluation_prompt(proposal, criterion, &shuffled);

        let model_strings: Vec<String> = evaluators.iter().map(|m| m.0.clone()).collect();
        let raw = client.query_parallel(&model_strings, &prompt, &QueryParams::default(), cancel.clone()).await;

        for evaluator in evaluators {
            let ranking = match raw.get(&evaluator.0) {
                Some(Ok(response)) => match parse_ranking(&response.content, n) {
                    Some(positions) => {
                        let original_order: Vec<ResponseLabel> =
                            positions.iter().map(|&pos| ordered[perm[pos]].0.clone()).collect();
                        IterationRanking::Parsed(original_order)
                    }
                    None => IterationRanking::ParseFailed { raw_response: response.content.clone() },
                },
                Some(Err(err)) => IterationRanking::ParseFailed { raw_response: err.to_string() },
                None => IterationRanking::ParseFailed { raw_response: "no response".to_string() },
            };
            per_evaluator.entry(evaluator.clone()).or_default().push(ranking);
        }
    }

    let min_valid = ((plan.iterations as f64) / 2.0).ceil() as usize;
    let mut aggregated = HashMap::new();
    let mut errors = Vec::new();

    for (evaluator, rankings) in &per_evaluator {
        let valid: Vec<&Vec<ResponseLabel>> = rankings
            .iter()
            .filter_map(|r| match r {
                IterationRanking::Parsed(order) => Some(order),
                IterationRanking::ParseFailed { .. } => None,
            })
            .collect();
        if valid.len() < min_valid.max(1) {
            warn!(evaluator = %evaluator.0, valid = valid.len(), required = min_valid, "evaluator omitted from stage 3");
            errors.push(format!("{}: insufficient valid bootstrap iterations ({}/{})", evaluator.0, valid.len(), min_valid));
            continue;
        }
        let ranked = aggregate(&valid, n, config.aggregation_method);
        aggregated.insert(evaluator.clone(), ranked);
    }

    Stage2Outcome { iterations: per_evaluator, aggregated, errors }
}

/// Aggregates one evaluator's valid per-iteration rankings into a single
/// consensus ranking, best first (spec §4.7 Stage 2 aggregation).
pub(crate) fn aggregate(valid: &[&Vec<ResponseLabel>], n: usize, method: AggregationMethod) -> Vec<ResponseLabel> {
    let mut score: HashMap<ResponseLabel, f64> = HashMap::new();
    let mut first_place_count: HashMap<ResponseLabel, u32> = HashMap::new();
    let mut worst_rank_count: HashMap<ResponseLabel, u32> = HashMap::new();

    for ranking in valid {
        for (p, label) in ranking.iter().enumerate() {
            let points = match method {
                AggregationMethod::Borda => (n - p) as f64,
                AggregationMethod::PositionAvg => p as f64,
                AggregationMethod::Consensus => ((n - p) * (n - p)) as f64,
            };
            *score.entry(label.clone()).or_insert(0.0) += points;
            if p == 0 {
                *first_place_count.entry(label.clone()).or_insert(0) += 1;
            }
            if p == n.saturating_sub(1) {
                *worst_rank_count.entry(label.clone()).or_insert(0) += 1;
            }
        }
    }
    if method == AggregationMethod::PositionAvg {
        for value in score.values_mut() {
            *value /= valid.len().max(1) as f64;
        }
    }

    let mut labels: Vec<ResponseLabel> = score.keys().cloned().collect();
    labels.sort_by(|a, b| {
        let sa = score[a];
        let sb = score[b];
        let better_first = match method {
            AggregationMethod::PositionAvg => sa.partial_cmp(&sb),
            _ => sb.partial_cmp(&sa),
        }
        .unwrap_or(std::cmp::Ordering::Equal);
        better_first
            .then_with(|| first_place_count.get(b).unwrap_or(&0).cmp(first_place_count.get(a).unwrap_or(&0)))
            .then_with(|| worst_rank_count.get(a).unwrap_or(&0).cmp(worst_rank_count.get(b).unwrap_or(&0)))
            .then_with(|| a.cmp(b))
    });
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ranking_extracts_first_occurrence_order() {
        let text = "Ranking: Response B, then Response A, finally Response C.";
        let parsed = parse_ranking(text, 3).unwrap();
        assert_eq!(parsed, vec![1, 0, 2]);
    }

    #[test]
    fn parse_ranking_rejects_incomplete_set() {
        assert!(parse_ranking("Response A then Response A again", 3).is_none());
    }

    #[test]
    fn borda_matches_spec_worked_example() {
        let r1 = ResponseLabel::from_index(0);
        let r2 = ResponseLabel::from_index(1);
        let r3 = ResponseLabel::from_index(2);
        let iterations = vec![
            vec![r1.clone(), r2.clone(), r3.clone()],
            vec![r2.clone(), r1.clone(), r3.clone()],
            vec![r1.clone(), r3.clone(), r2.clone()],
        ];
        let refs: Vec<&Vec<ResponseLabel>> = iterations.iter().collect();
        let ranked = aggregate(&refs, 3, AggregationMethod::Borda);
        assert_eq!(ranked, vec![r1, r2, r3]);
    }
}

//! LLM-as-judge scoring for generated responses.
//!
//! The judge boundary is deliberately small: one chat call per sample that
//! must come back as strict JSON mapping each requested metric name to an
//! integer grade between 1 and 5. Anything else is a decode failure for
//! that sample only.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error_handler::LlmError;
use crate::service_profiles::LlmServiceProfiles;

const JUDGE_SYSTEM: &str = "You are a strict evaluation judge for a retrieval-augmented \
recommendation assistant. You always answer with a single JSON object and nothing else.";

/// Builds the judge prompt for one sample.
///
/// `profile_json` is the raw user-profile JSON; `response` is the generated
/// answer under evaluation.
pub fn build_judge_prompt(
    metrics: &[String],
    query: &str,
    profile_json: &str,
    response: &str,
) -> String {
    let metric_lines = metrics
        .iter()
        .map(|m| format!("  \"{m}\": <integer 1-5>"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "Rate the assistant response below on each metric from 1 (worst) to 5 (best).\n\
         Respond with exactly this JSON object and no other text:\n\
         {{\n{metric_lines}\n}}\n\n\
         <user profile>\n{profile_json}\n\n\
         <user query>\n{query}\n\n\
         <assistant response>\n{response}\n"
    )
}

/// Parses the judge's reply into `metric -> score`.
///
/// Tolerates surrounding prose and code fences by extracting the outermost
/// `{...}` object, then requires every requested metric to be present with
/// an integer in `1..=5`.
///
/// # Errors
/// Returns [`LlmError::Decode`] on malformed JSON, missing metrics, or
/// out-of-range grades.
pub fn parse_scores(raw: &str, metrics: &[String]) -> Result<BTreeMap<String, u8>, LlmError> {
    let start = raw
        .find('{')
        .ok_or_else(|| LlmError::Decode("judge reply contains no JSON object".into()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| LlmError::Decode("judge reply contains no JSON object".into()))?;
    if end < start {
        return Err(LlmError::Decode("judge reply contains no JSON object".into()));
    }

    let obj: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw[start..=end])
        .map_err(|e| LlmError::Decode(format!("judge reply is not valid JSON: {e}")))?;

    let mut scores = BTreeMap::new();
    for metric in metrics {
        let value = obj
            .get(metric)
            .ok_or_else(|| LlmError::Decode(format!("judge reply missing metric `{metric}`")))?;
        let grade = value
            .as_i64()
            .ok_or_else(|| LlmError::Decode(format!("metric `{metric}` is not an integer")))?;
        if !(1..=5).contains(&grade) {
            return Err(LlmError::Decode(format!(
                "metric `{metric}` grade {grade} outside 1..=5"
            )));
        }
        scores.insert(metric.clone(), grade as u8);
    }
    Ok(scores)
}

/// Runs one judge call for a sample and returns validated scores.
///
/// # Errors
/// Returns provider errors from the chat call or [`LlmError::Decode`] when
/// the reply does not satisfy the score contract.
pub async fn score(
    svc: &LlmServiceProfiles,
    metrics: &[String],
    query: &str,
    profile_json: &str,
    response: &str,
) -> Result<BTreeMap<String, u8>, LlmError> {
    let prompt = build_judge_prompt(metrics, query, profile_json, response);
    let raw = svc.judge(&prompt, Some(JUDGE_SYSTEM)).await?;
    debug!("judge reply: {}", raw.chars().take(240).collect::<String>());
    parse_scores(&raw, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Vec<String> {
        vec!["recommendation_quality".into(), "profile_alignment".into()]
    }

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"recommendation_quality": 4, "profile_alignment": 5}"#;
        let scores = parse_scores(raw, &metrics()).unwrap();
        assert_eq!(scores["recommendation_quality"], 4);
        assert_eq!(scores["profile_alignment"], 5);
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let raw = "Sure, here is my grading:\n```json\n{\"recommendation_quality\": 3, \
                   \"profile_alignment\": 2}\n```\nHope that helps.";
        let scores = parse_scores(raw, &metrics()).unwrap();
        assert_eq!(scores["recommendation_quality"], 3);
    }

    #[test]
    fn rejects_out_of_range_grade() {
        let raw = r#"{"recommendation_quality": 7, "profile_alignment": 5}"#;
        assert!(parse_scores(raw, &metrics()).is_err());
    }

    #[test]
    fn rejects_missing_metric() {
        let raw = r#"{"recommendation_quality": 4}"#;
        assert!(parse_scores(raw, &metrics()).is_err());
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_scores("I'd rate it a solid four.", &metrics()).is_err());
    }

    #[test]
    fn prompt_names_every_metric() {
        let prompt = build_judge_prompt(&metrics(), "q", "{}", "r");
        assert!(prompt.contains("recommendation_quality"));
        assert!(prompt.contains("profile_alignment"));
    }
}

//! LLM feedback and rewrite for a cover letter.
//!
//! The model is asked for `{feedback, improvedContent}` JSON, but its answer is
//! treated as untrusted: anything that does not parse degrades to a usable
//! default instead of failing the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::cover_letters::prompts::build_improvement_prompt;
use crate::cover_letters::repository;
use crate::errors::AppError;
use crate::llm_client::{extract_message_text, prompts::JSON_ONLY_SYSTEM, strip_json_fences, LlmClient};
use crate::models::cover_letter::CoverLetterFeatureRow;

pub const MIN_CONTENT_CHARS: usize = 100;
pub const MAX_CONTENT_CHARS: usize = 2000;

const DEFAULT_SUMMARY: &str = "Analysis complete";
const FEEDBACK_UNAVAILABLE: &str = "The analysis could not be loaded. Please try again.";
const IMPROVED_UNAVAILABLE: &str =
    "An improved version could not be generated. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackItem {
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverLetterFeedback {
    pub strengths: Vec<FeedbackItem>,
    pub improvements: Vec<FeedbackItem>,
    pub summary: String,
}

impl CoverLetterFeedback {
    fn unavailable() -> Self {
        CoverLetterFeedback {
            strengths: Vec::new(),
            improvements: Vec::new(),
            summary: FEEDBACK_UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AiImproveResponse {
    pub feedback: CoverLetterFeedback,
    pub improved_content: String,
}

#[derive(Debug, Deserialize)]
struct RawFeedback {
    #[serde(default)]
    strengths: Vec<RawItem>,
    #[serde(default)]
    improvements: Vec<RawItem>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
}

/// The model's answer split into its two parts, before validation.
#[derive(Debug, PartialEq, Eq)]
struct ModelReply {
    feedback_json: String,
    improved_content: String,
}

pub fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(
            "Cover letter content is required".to_string(),
        ));
    }
    let len = content.chars().count();
    if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&len) {
        return Err(AppError::Validation(format!(
            "Cover letter content must be {MIN_CONTENT_CHARS} to {MAX_CONTENT_CHARS} characters (got {len})"
        )));
    }
    Ok(())
}

/// Validates the letter, loads the evaluation criteria and asks the LLM.
pub async fn improve_cover_letter(
    db: &PgPool,
    llm: &LlmClient,
    content: &str,
) -> Result<AiImproveResponse, AppError> {
    validate_content(content)?;

    let features = repository::list_features(db).await?;
    if features.is_empty() {
        warn!("No cover letter features found; prompting without criteria");
    }

    improve_with_features(llm, content, &features).await
}

pub async fn improve_with_features(
    llm: &LlmClient,
    content: &str,
    features: &[CoverLetterFeatureRow],
) -> Result<AiImproveResponse, AppError> {
    let prompt = build_improvement_prompt(content, features);
    debug!("Cover letter prompt: {} chars, {} criteria", prompt.len(), features.len());

    let body = llm
        .call(&prompt, JSON_ONLY_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let reply = split_reply(&body);
    Ok(AiImproveResponse {
        feedback: parse_feedback(&reply.feedback_json),
        improved_content: finalize_improved(&reply.improved_content),
    })
}

/// Separates feedback JSON from the rewritten letter.
///
/// A body without message text is taken whole as the rewrite. Message text
/// that is not a JSON object is likewise the rewrite, with no feedback.
fn split_reply(body: &str) -> ModelReply {
    let Some(text) = extract_message_text(body) else {
        warn!("LLM reply had no message text; using the raw body");
        return ModelReply {
            feedback_json: String::new(),
            improved_content: body.to_string(),
        };
    };

    let candidate = strip_json_fences(&text);
    if candidate.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<Value>(candidate) {
            return ModelReply {
                feedback_json: parsed
                    .get("feedback")
                    .filter(|f| !f.is_null())
                    .map(Value::to_string)
                    .unwrap_or_default(),
                improved_content: parsed
                    .get("improvedContent")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            };
        }
        warn!("LLM message looked like JSON but did not parse");
    }

    ModelReply {
        feedback_json: String::new(),
        improved_content: text,
    }
}

/// Keeps only items with both a description and a suggestion.
fn parse_feedback(raw: &str) -> CoverLetterFeedback {
    if raw.trim().is_empty() {
        return CoverLetterFeedback::unavailable();
    }
    let parsed: RawFeedback = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Could not parse cover letter feedback: {e}");
            return CoverLetterFeedback::unavailable();
        }
    };

    let keep = |items: Vec<RawItem>| -> Vec<FeedbackItem> {
        items
            .into_iter()
            .filter_map(|item| {
                let description = item.description?.trim().to_string();
                let suggestion = item.suggestion?.trim().to_string();
                (!description.is_empty() && !suggestion.is_empty()).then_some(FeedbackItem {
                    description,
                    suggestion,
                })
            })
            .collect()
    };

    CoverLetterFeedback {
        strengths: keep(parsed.strengths),
        improvements: keep(parsed.improvements),
        summary: parsed
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
    }
}

fn finalize_improved(improved: &str) -> String {
    let trimmed = improved.trim();
    if trimmed.is_empty() {
        IMPROVED_UNAVAILABLE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope(text: &str) -> String {
        json!({
            "output": [{"type": "message", "content": [{"type": "output_text", "text": text}]}]
        })
        .to_string()
    }

    fn letter() -> String {
        "I led the migration of our billing platform to an event-driven design. ".repeat(3)
    }

    #[test]
    fn test_content_length_bounds() {
        assert!(validate_content(&"a".repeat(100)).is_ok());
        assert!(validate_content(&"a".repeat(2000)).is_ok());
        assert!(validate_content(&"a".repeat(99)).is_err());
        assert!(validate_content(&"a".repeat(2001)).is_err());
        assert!(validate_content("   ").is_err());
    }

    #[test]
    fn test_content_length_counts_characters_not_bytes() {
        // 100 three-byte characters
        assert!(validate_content(&"가".repeat(100)).is_ok());
        assert!(validate_content(&"가".repeat(700)).is_ok());
    }

    #[test]
    fn test_split_reply_json_message() {
        let text = json!({
            "feedback": {"strengths": [], "improvements": [], "summary": "ok"},
            "improvedContent": "Better letter"
        })
        .to_string();
        let reply = split_reply(&envelope(&text));

        assert_eq!(reply.improved_content, "Better letter");
        let feedback: Value = serde_json::from_str(&reply.feedback_json).unwrap();
        assert_eq!(feedback["summary"], "ok");
    }

    #[test]
    fn test_split_reply_fenced_json_message() {
        let text = "```json\n{\"feedback\": null, \"improvedContent\": \"Fenced\"}\n```";
        let reply = split_reply(&envelope(text));
        assert_eq!(reply.improved_content, "Fenced");
        assert_eq!(reply.feedback_json, "");
    }

    #[test]
    fn test_split_reply_plain_text_message() {
        let reply = split_reply(&envelope("Just a rewritten letter."));
        assert_eq!(reply.feedback_json, "");
        assert_eq!(reply.improved_content, "Just a rewritten letter.");
    }

    #[test]
    fn test_split_reply_without_envelope_uses_raw_body() {
        let reply = split_reply("upstream returned plain text");
        assert_eq!(reply.improved_content, "upstream returned plain text");
        assert_eq!(reply.feedback_json, "");
    }

    #[test]
    fn test_parse_feedback_drops_incomplete_items() {
        let raw = json!({
            "strengths": [
                {"description": "Clear opening", "suggestion": "Name the company"},
                {"description": "  ", "suggestion": "ignored"},
                {"description": "No suggestion"}
            ],
            "improvements": [
                {"description": "Vague results", "suggestion": "Add numbers"},
                {"suggestion": "no description"}
            ]
        })
        .to_string();

        let feedback = parse_feedback(&raw);
        assert_eq!(feedback.strengths.len(), 1);
        assert_eq!(feedback.strengths[0].description, "Clear opening");
        assert_eq!(feedback.improvements.len(), 1);
        assert_eq!(feedback.summary, DEFAULT_SUMMARY);
    }

    #[test]
    fn test_parse_feedback_fallbacks() {
        assert_eq!(parse_feedback(""), CoverLetterFeedback::unavailable());
        assert_eq!(parse_feedback("{not json"), CoverLetterFeedback::unavailable());
        assert_eq!(parse_feedback("[1, 2]"), CoverLetterFeedback::unavailable());
    }

    #[test]
    fn test_finalize_improved() {
        assert_eq!(finalize_improved("  Better.  \n"), "Better.");
        assert_eq!(finalize_improved("   "), IMPROVED_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_improve_with_features_end_to_end() {
        let server = MockServer::start().await;
        let answer = json!({
            "feedback": {
                "strengths": [{"description": "Strong ownership", "suggestion": "Quantify it"}],
                "improvements": [{"description": "Long sentences", "suggestion": "Split them"}],
                "summary": "Solid draft"
            },
            "improvedContent": "  Improved letter text.  "
        })
        .to_string();
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_string(envelope(&answer)))
            .mount(&server)
            .await;

        let llm = LlmClient::new(server.uri(), "key".to_string()).unwrap();
        let result = improve_with_features(&llm, &letter(), &[]).await.unwrap();

        assert_eq!(result.improved_content, "Improved letter text.");
        assert_eq!(result.feedback.summary, "Solid draft");
        assert_eq!(result.feedback.strengths.len(), 1);
        assert_eq!(result.feedback.improvements[0].suggestion, "Split them");
    }

    #[tokio::test]
    async fn test_improve_with_features_maps_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let llm = LlmClient::new(server.uri(), "key".to_string()).unwrap();
        let err = improve_with_features(&llm, &letter(), &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}

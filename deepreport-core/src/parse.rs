//! Typed parsing of model output with a structured and a heuristic strategy.
//!
//! Model responses are supposed to be JSON but often are not: fenced blocks,
//! trailing commas, prose around the object, or plain numbered lists. Every
//! output type implements [`DualParse`]; [`DualParse::parse`] tries the JSON
//! path first and falls back to line heuristics, reporting which strategy
//! produced the value. Neither strategy panics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("invalid regex"));

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("invalid regex"));

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?？]\s*$").expect("invalid regex"));

/// Numbering or bullet in front of a list line. Digits that belong to the
/// item itself are left alone.
static LIST_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+[.)]\s+|\(\d+\)\s+|\d+、\s*|[-*•]\s+)").expect("invalid regex")
});

/// Why a response could not be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("response contains no JSON object")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing or malformed field: {0}")]
    MissingField(&'static str),

    #[error("nothing usable in response")]
    Empty,

    #[error("no heuristic strategy for this output")]
    NoHeuristic,
}

/// Which strategy produced a parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Structured,
    Heuristic,
}

/// A parsed value tagged with the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub strategy: ParseStrategy,
}

impl<T> Parsed<T> {
    pub fn structured(value: T) -> Self {
        Self {
            value,
            strategy: ParseStrategy::Structured,
        }
    }

    pub fn heuristic(value: T) -> Self {
        Self {
            value,
            strategy: ParseStrategy::Heuristic,
        }
    }

    pub fn is_structured(&self) -> bool {
        self.strategy == ParseStrategy::Structured
    }
}

/// Two ordered strategies for turning model text into `Self`.
pub trait DualParse: Sized {
    /// Build from a parsed JSON value.
    fn structured(value: &Value) -> Result<Self, ParseError>;

    /// Build from free text.
    fn heuristic(_text: &str) -> Result<Self, ParseError> {
        Err(ParseError::NoHeuristic)
    }

    /// Structured first, heuristic second.
    fn parse(text: &str) -> Result<Parsed<Self>, ParseError> {
        match parse_json_value(text).and_then(|v| Self::structured(&v)) {
            Ok(value) => Ok(Parsed::structured(value)),
            Err(structured_err) => {
                debug!(error = %structured_err, "Structured parse failed, trying heuristics");
                Self::heuristic(text).map(Parsed::heuristic)
            }
        }
    }
}

/// The JSON candidate inside a response: the first fenced block if there
/// is one, else the outermost `{...}` span, else the whole text.
pub fn extract_json_block(response: &str) -> &str {
    if let Some(body) = FENCED_BLOCK.captures(response).and_then(|c| c.get(1)) {
        return body.as_str().trim();
    }
    match (response.find('{'), response.rfind('}')) {
        (Some(open), Some(close)) if close > open => &response[open..=close],
        _ => response,
    }
}

/// Parse the JSON object in a response, tolerating trailing commas.
pub fn parse_json_value(response: &str) -> Result<Value, ParseError> {
    let block = extract_json_block(response);
    if !block.trim_start().starts_with('{') && !block.trim_start().starts_with('[') {
        return Err(ParseError::NoJson);
    }
    match serde_json::from_str::<Value>(block) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let relaxed = TRAILING_COMMA.replace_all(block, "$1");
            serde_json::from_str::<Value>(&relaxed)
                .map_err(|_| ParseError::InvalidJson(strict_err.to_string()))
        }
    }
}

/// Strings from an array field, or a single string field.
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        Value::String(_) | Value::Null => Some(Vec::new()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Candidate list items from free text: numbering and bullets stripped,
/// headings, braces, fences and quoted JSON fragments skipped.
pub fn list_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with('#')
                && !line.starts_with("//")
                && !line.starts_with('{')
                && !line.starts_with('}')
                && !line.starts_with('[')
                && !line.starts_with(']')
                && !line.starts_with("```")
        })
        .map(|line| LIST_PREFIX.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty() && !line.contains('"') && !line.ends_with(':'))
        .collect()
}

/// Search queries proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryList {
    pub rationale: Option<String>,
    pub queries: Vec<String>,
}

impl DualParse for QueryList {
    fn structured(value: &Value) -> Result<Self, ParseError> {
        let field = value
            .get("query")
            .or_else(|| value.get("queries"))
            .ok_or(ParseError::MissingField("query"))?;
        let queries = string_list(field).ok_or(ParseError::MissingField("query"))?;
        if queries.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(Self {
            rationale: value
                .get("rationale")
                .and_then(Value::as_str)
                .map(str::to_string),
            queries,
        })
    }

    fn heuristic(text: &str) -> Result<Self, ParseError> {
        let queries = list_lines(text);
        if queries.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(Self {
            rationale: None,
            queries,
        })
    }
}

/// The model's judgement of whether gathered evidence is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionVerdict {
    pub is_sufficient: bool,
    pub knowledge_gap: String,
    pub follow_up_queries: Vec<String>,
}

impl ReflectionVerdict {
    /// Verdict used when reflection fails: stop asking for more.
    pub fn neutral() -> Self {
        Self {
            is_sufficient: true,
            knowledge_gap: String::new(),
            follow_up_queries: Vec::new(),
        }
    }
}

const INSUFFICIENT_MARKERS: &[&str] = &[
    "insufficient",
    "not sufficient",
    "not enough",
    "\"is_sufficient\": false",
    "不充分",
    "不足",
];

const SUFFICIENT_MARKERS: &[&str] = &["sufficient", "enough information", "充分"];

impl DualParse for ReflectionVerdict {
    fn structured(value: &Value) -> Result<Self, ParseError> {
        let is_sufficient = value
            .get("is_sufficient")
            .and_then(as_bool)
            .ok_or(ParseError::MissingField("is_sufficient"))?;
        let follow_up_queries = match value.get("follow_up_queries") {
            Some(field) => string_list(field).ok_or(ParseError::MissingField("follow_up_queries"))?,
            None => Vec::new(),
        };
        Ok(Self {
            is_sufficient,
            knowledge_gap: value
                .get("knowledge_gap")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            follow_up_queries,
        })
    }

    fn heuristic(text: &str) -> Result<Self, ParseError> {
        let lower = text.to_lowercase();
        let is_sufficient = if INSUFFICIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            false
        } else if SUFFICIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            true
        } else {
            return Err(ParseError::Empty);
        };

        let follow_up_queries = if is_sufficient {
            Vec::new()
        } else {
            list_lines(text)
                .into_iter()
                .filter(|line| QUESTION_LINE.is_match(line))
                .collect()
        };

        Ok(Self {
            is_sufficient,
            knowledge_gap: String::new(),
            follow_up_queries,
        })
    }
}

/// One section as proposed by the planning model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    pub name: String,
    pub description: String,
    pub requires_research: bool,
    /// Missing or zero when the model gave no usable target
    pub word_count_target: Option<usize>,
}

/// A report plan as proposed by the planning model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDraft {
    pub title: String,
    pub abstract_text: String,
    pub sections: Vec<SectionDraft>,
}

impl DualParse for PlanDraft {
    fn structured(value: &Value) -> Result<Self, ParseError> {
        let sections = value
            .get("sections")
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingField("sections"))?;

        let sections: Vec<SectionDraft> = sections
            .iter()
            .filter_map(|s| {
                let name = s.get("name").and_then(Value::as_str)?.trim();
                if name.is_empty() {
                    return None;
                }
                Some(SectionDraft {
                    name: name.to_string(),
                    description: s
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                    requires_research: s
                        .get("requires_research")
                        .and_then(as_bool)
                        .unwrap_or(true),
                    word_count_target: s
                        .get("word_count_target")
                        .and_then(Value::as_u64)
                        .map(|n| n as usize)
                        .filter(|n| *n > 0),
                })
            })
            .collect();

        if sections.is_empty() {
            return Err(ParseError::Empty);
        }

        Ok(Self {
            title: value
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            abstract_text: value
                .get("abstract")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_queries_from_fenced_json() {
        let text = "Here you go:\n```json\n{\n  \"rationale\": \"cover both\",\n  \"query\": [\"AI diagnostics 2024\", \"AI hospital adoption\"],\n}\n```";
        let parsed = QueryList::parse(text).unwrap();
        assert!(parsed.is_structured());
        assert_eq!(
            parsed.value.queries,
            vec!["AI diagnostics 2024", "AI hospital adoption"]
        );
        assert_eq!(parsed.value.rationale.as_deref(), Some("cover both"));
    }

    #[test]
    fn test_queries_from_numbered_list() {
        let text = "# Queries\n1. AI diagnostics accuracy\n2) FDA approvals for AI devices\n- \"quoted\": skipped\n• hospital adoption rates";
        let parsed = QueryList::parse(text).unwrap();
        assert_eq!(parsed.strategy, ParseStrategy::Heuristic);
        assert_eq!(
            parsed.value.queries,
            vec![
                "AI diagnostics accuracy",
                "FDA approvals for AI devices",
                "hospital adoption rates"
            ]
        );
    }

    #[test]
    fn test_list_keeps_leading_digits_of_items() {
        let text = "1. 5G rollout in Europe\n2) 2024 EU AI Act obligations\n- 3D printing of organs\n(4) 3.5-inch drives\n5、2030 碳中和目标";
        let parsed = QueryList::parse(text).unwrap();
        assert_eq!(
            parsed.value.queries,
            vec![
                "5G rollout in Europe",
                "2024 EU AI Act obligations",
                "3D printing of organs",
                "3.5-inch drives",
                "2030 碳中和目标",
            ]
        );
    }

    #[test]
    fn test_queries_empty_response() {
        assert_eq!(QueryList::parse("   \n```\n```"), Err(ParseError::Empty));
    }

    #[test]
    fn test_reflection_structured() {
        let text = r#"{"is_sufficient": false, "knowledge_gap": "no cost data", "follow_up_queries": ["AI diagnostics cost savings"]}"#;
        let parsed = ReflectionVerdict::parse(text).unwrap();
        assert!(parsed.is_structured());
        assert!(!parsed.value.is_sufficient);
        assert_eq!(parsed.value.knowledge_gap, "no cost data");
        assert_eq!(parsed.value.follow_up_queries, vec!["AI diagnostics cost savings"]);
    }

    #[test]
    fn test_reflection_string_bool() {
        let parsed = ReflectionVerdict::parse(r#"{"is_sufficient": "true"}"#).unwrap();
        assert!(parsed.value.is_sufficient);
        assert!(parsed.value.follow_up_queries.is_empty());
    }

    #[test]
    fn test_reflection_heuristic() {
        let text = "The summaries are insufficient.\n1. What do AI diagnostics cost?\nSome other remark";
        let parsed = ReflectionVerdict::parse(text).unwrap();
        assert_eq!(parsed.strategy, ParseStrategy::Heuristic);
        assert!(!parsed.value.is_sufficient);
        assert_eq!(parsed.value.follow_up_queries, vec!["What do AI diagnostics cost?"]);

        let parsed = ReflectionVerdict::parse("The information is sufficient.").unwrap();
        assert!(parsed.value.is_sufficient);

        assert!(ReflectionVerdict::parse("lorem ipsum").is_err());
    }

    #[test]
    fn test_plan_structured_defaults() {
        let text = r#"```json
{"title": "AI in Healthcare", "abstract": "Overview", "sections": [
  {"name": "Background", "description": "history", "word_count_target": 2000},
  {"name": "Outlook", "requires_research": false, "word_count_target": 0},
  {"description": "nameless"}
]}
```"#;
        let parsed = PlanDraft::parse(text).unwrap();
        let plan = parsed.value;
        assert_eq!(plan.title, "AI in Healthcare");
        assert_eq!(plan.sections.len(), 2);
        assert!(plan.sections[0].requires_research);
        assert_eq!(plan.sections[0].word_count_target, Some(2000));
        assert!(!plan.sections[1].requires_research);
        assert_eq!(plan.sections[1].word_count_target, None);
    }

    #[test]
    fn test_plan_without_sections_fails() {
        assert_eq!(
            PlanDraft::parse(r#"{"title": "x", "sections": []}"#),
            Err(ParseError::NoHeuristic)
        );
        assert!(PlanDraft::parse("I cannot produce a plan.").is_err());
    }

    #[test]
    fn test_extract_json_block_variants() {
        assert_eq!(extract_json_block("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_block("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_block("noise {\"a\":1} tail"), "{\"a\":1}");
        assert_eq!(extract_json_block("plain"), "plain");
        assert_eq!(extract_json_block("} backwards {"), "} backwards {");
    }
}

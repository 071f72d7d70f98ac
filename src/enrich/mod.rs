// Requirements extraction: prompt an external text generator, then dig a
// JSON object out of whatever it returns.

pub mod replicate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Text-generation capability with no structural guarantee on its output.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// Structured requirements recovered from a posting description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub years: i32,
    pub skills: Vec<String>,
}

pub fn build_prompt(description: &str) -> String {
    format!(
        "Extract the minimum years of experience required and the list of technical skills \
         from the following job description. If not mentioned, guess the years of experience \
         based on the job title. (0 years if nothing is mentioned)\n\n\
         Respond *only* with a JSON object containing exactly two keys: `years` (an integer) \
         and `skills` (an array of strings, less than 3 words).\n\n\
         Job Description:\n{description}"
    )
}

/// Derive {years, skills} from a description via the generator.
pub async fn extract_requirements(
    generator: &dyn TextGenerator,
    description: &str,
) -> Result<Requirements, AppError> {
    let output = generator.generate(&build_prompt(description)).await?;
    parse_requirements(&output)
}

/// Recover the requirements object from raw generated text. Finding no
/// JSON object at all is an extraction failure; a found object with
/// missing keys falls back to years 0 and a sentinel skills list.
pub fn parse_requirements(output: &str) -> Result<Requirements, AppError> {
    let object = find_json_object(output).ok_or_else(|| {
        let snippet: String = output.chars().take(120).collect();
        AppError::Extraction(format!("No JSON object in generated text: {snippet}"))
    })?;

    let years = object
        .get("years")
        .and_then(coerce_years)
        .map(|y| y.clamp(0, i64::from(i32::MAX)) as i32)
        .unwrap_or(0);

    let skills = object
        .get("skills")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| vec!["None".to_string()]);

    Ok(Requirements { years, skills })
}

/// Generators are asked for an integer but routinely hand back floats or
/// quoted numbers; accept all three.
fn coerce_years(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return Some(f as i64);
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}

/// Scan the text for the first balanced brace-delimited span that parses
/// as a JSON object. A non-greedy substring match is not enough here:
/// nested objects and braces inside string values both defeat it.
pub fn find_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let open = from + offset;
        if let Some(close) = balanced_object_end(bytes, open)
            && let Ok(value) = serde_json::from_str::<Value>(&text[open..=close])
            && value.is_object()
        {
            return Some(value);
        }
        from = open + 1;
    }
    None
}

/// Index of the brace closing the object opened at `open`, tracking string
/// and escape state so braces inside values do not count.
fn balanced_object_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_object_amid_prose() {
        let output = "Sure! Here is the JSON you asked for:\n\
                      {\"years\": 3, \"skills\": [\"Rust\", \"SQL\"]}\n\
                      Hope that helps!";
        let req = parse_requirements(output).unwrap();
        assert_eq!(req.years, 3);
        assert_eq!(req.skills, vec!["Rust", "SQL"]);
    }

    #[test]
    fn handles_nested_objects_and_braces_in_strings() {
        let output = r#"noise {"years": 1, "skills": ["a{b}c"], "meta": {"k": "v}"}} trailing"#;
        let req = parse_requirements(output).unwrap();
        assert_eq!(req.years, 1);
        assert_eq!(req.skills, vec!["a{b}c"]);
    }

    #[test]
    fn handles_escaped_quotes_in_strings() {
        let output = r#"{"years": 7, "skills": ["said \"C{\" once"]}"#;
        let req = parse_requirements(output).unwrap();
        assert_eq!(req.years, 7);
        assert_eq!(req.skills, vec![r#"said "C{" once"#]);
    }

    #[test]
    fn skips_unparseable_brace_span_for_later_object() {
        let output = r#"{not json} {"years": 4, "skills": []}"#;
        let req = parse_requirements(output).unwrap();
        assert_eq!(req.years, 4);
        assert!(req.skills.is_empty());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let req = parse_requirements(r#"{"summary": "senior role"}"#).unwrap();
        assert_eq!(req.years, 0);
        assert_eq!(req.skills, vec!["None"]);
    }

    #[test]
    fn negative_years_clamp_to_zero() {
        let req = parse_requirements(r#"{"years": -2, "skills": ["Go"]}"#).unwrap();
        assert_eq!(req.years, 0);
    }

    #[test]
    fn quoted_and_float_years_are_coerced() {
        assert_eq!(
            parse_requirements(r#"{"years": "5", "skills": []}"#).unwrap().years,
            5
        );
        assert_eq!(
            parse_requirements(r#"{"years": 3.7, "skills": []}"#).unwrap().years,
            3
        );
    }

    #[test]
    fn no_json_is_an_extraction_failure() {
        let result = parse_requirements("I could not find any requirements.");
        assert!(matches!(result, Err(AppError::Extraction(_))));
    }

    #[test]
    fn unbalanced_braces_yield_nothing() {
        assert!(find_json_object(r#"{"years": 1"#).is_none());
        assert!(find_json_object("no braces at all").is_none());
    }

    #[test]
    fn prompt_embeds_description_and_contract() {
        let prompt = build_prompt("We need a geologist.");
        assert!(prompt.contains("We need a geologist."));
        assert!(prompt.contains("`years`"));
        assert!(prompt.contains("`skills`"));
    }
}

//! Reasoning provider trait, prompt rendering, and draft parsing.
//!
//! A reasoning provider turns project notes plus retrieved precedent into
//! a structured [`Draft`]. The orchestrator is provider-agnostic: it only
//! sees this trait. Concrete HTTP backends live in the app crate and share
//! the prompt and response handling defined here.
//!
//! # Response contract
//!
//! Providers are asked for a single JSON object:
//!
//! ```json
//! {
//!   "sections": { "project_title": "...", "objectives": ["...", "..."] },
//!   "gaps": [ { "category": "navigation", "description": "...", "severity": "high" } ]
//! }
//! ```
//!
//! List-valued sections are joined with newlines. Output wrapped in code
//! fences is accepted.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::framework::ContentFramework;
use crate::models::{Draft, Gap, GapCategory, RetrievalResult, Severity};

/// Sections every draft is expected to fill.
pub const STANDARD_SECTIONS: [&str; 5] = [
    "project_title",
    "objectives",
    "scope_in",
    "scope_out",
    "navigation",
];

/// Maximum characters of project notes sent to a provider.
pub const MAX_NOTES_CHARS: usize = 4000;
/// Maximum characters of rendered precedent context sent to a provider.
pub const MAX_CONTEXT_CHARS: usize = 2000;

const TRUNCATION_MARKER: &str = "... [TRUNCATED]";

/// A backend that drafts project documentation.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Stable provider label recorded in assessments (e.g. `"groq"`).
    fn name(&self) -> &str;

    /// Produce a draft for `prompt`, informed by retrieved precedent.
    async fn generate(&self, prompt: &str, context: &RetrievalResult) -> Result<Draft>;

    /// Propose a content framework for an accepted draft.
    ///
    /// Backends without a framework stage keep this default and are
    /// treated as a failed slot.
    async fn frame(&self, prompt: &str, context: &RetrievalResult) -> Result<ContentFramework> {
        let _ = (prompt, context);
        bail!("provider '{}' does not produce content frameworks", self.name())
    }
}

/// Truncate `text` to `max_chars` characters, appending a marker when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Build the instruction prompt for a set of discussion notes.
pub fn build_prompt(notes: &str) -> String {
    let gap_categories = [
        GapCategory::Navigation,
        GapCategory::Feature,
        GapCategory::Stakeholder,
        GapCategory::Technical,
        GapCategory::ScopeBoundary,
    ]
    .iter()
    .map(|c| c.as_str())
    .collect::<Vec<_>>()
    .join(", ");

    format!(
        "You are a Virtual Project Manager. Convert these discussion notes into a formal \
         scope document.\n\
         Instructions:\n\
         1. Output ONLY a valid JSON object, no explanations and no code blocks.\n\
         2. Use the shape {{\"sections\": {{...}}, \"gaps\": [...]}}.\n\
         3. Fill the sections: {sections}.\n\
         4. Each gap has \"category\" (one of: {gap_categories}), \"description\", and \
         \"severity\" (low, medium, high).\n\n\
         DISCUSSION NOTES:\n{notes}\n",
        sections = STANDARD_SECTIONS.join(", "),
        gap_categories = gap_categories,
        notes = truncate_chars(notes, MAX_NOTES_CHARS),
    )
}

/// Render retrieved precedent into a reference block for a provider request.
pub fn render_context(context: &RetrievalResult) -> String {
    if context.is_empty() {
        return "REFERENCE EXAMPLES:\n(none found)\n".to_string();
    }
    let body = context
        .hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "REFERENCE EXAMPLES:\n{}\n",
        truncate_chars(&body, MAX_CONTEXT_CHARS)
    )
}

/// Full request text: reference context followed by the instruction prompt.
pub fn compose_request(prompt: &str, context: &RetrievalResult) -> String {
    format!("{}\n{}", render_context(context), prompt)
}

/// Parse a provider's raw text output into a [`Draft`].
pub fn parse_draft(raw: &str) -> Result<Draft> {
    let json_text = extract_json_object(raw)?;
    let value: Value =
        serde_json::from_str(json_text).context("provider output is not valid JSON")?;
    draft_from_value(&value)
}

/// Locate the outermost JSON object, skipping code fences and chatter.
pub(crate) fn extract_json_object(raw: &str) -> Result<&str> {
    let start = raw
        .find('{')
        .ok_or_else(|| anyhow!("provider output contains no JSON object"))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| anyhow!("provider output contains no JSON object"))?;
    if end < start {
        bail!("provider output contains no JSON object");
    }
    Ok(&raw[start..=end])
}

fn draft_from_value(value: &Value) -> Result<Draft> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("draft must be a JSON object"))?;

    let mut sections = BTreeMap::new();
    if let Some(raw_sections) = obj.get("sections") {
        let map = raw_sections
            .as_object()
            .ok_or_else(|| anyhow!("'sections' must be an object"))?;
        for (name, v) in map {
            sections.insert(name.clone(), section_text(v));
        }
    }

    let mut gaps = Vec::new();
    if let Some(raw_gaps) = obj.get("gaps") {
        let arr = raw_gaps
            .as_array()
            .ok_or_else(|| anyhow!("'gaps' must be an array"))?;
        for g in arr {
            gaps.push(gap_from_value(g)?);
        }
    }

    Ok(Draft { sections, gaps })
}

fn section_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(section_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn str_field<'a>(v: &'a Value, name: &str) -> Result<&'a str> {
    v.get(name)
        .and_then(|x| x.as_str())
        .ok_or_else(|| anyhow!("gap is missing string field '{}'", name))
}

fn gap_from_value(v: &Value) -> Result<Gap> {
    let category: GapCategory = str_field(v, "category")?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let severity: Severity = str_field(v, "severity")?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let description = str_field(v, "description")?.trim().to_string();
    if description.is_empty() {
        bail!("gap description must not be empty");
    }
    Ok(Gap {
        category,
        description,
        severity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_with_list_sections() {
        let raw = r#"Here you go:
```json
{
  "sections": {
    "project_title": "Acme Storefront Rebuild",
    "objectives": ["Increase conversion", "Launch by Q3"]
  },
  "gaps": [
    {"category": "Stakeholder", "description": "No sign-off owner", "severity": "High"}
  ]
}
```"#;
        let draft = parse_draft(raw).unwrap();
        assert_eq!(draft.section("project_title"), Some("Acme Storefront Rebuild"));
        assert_eq!(
            draft.section("objectives"),
            Some("Increase conversion\nLaunch by Q3")
        );
        assert_eq!(draft.gaps.len(), 1);
        assert_eq!(draft.gaps[0].category, GapCategory::Stakeholder);
        assert_eq!(draft.gaps[0].severity, Severity::High);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let draft = parse_draft("{}").unwrap();
        assert!(draft.sections.is_empty());
        assert!(draft.gaps.is_empty());
    }

    #[test]
    fn rejects_unknown_gap_category() {
        let raw = r#"{"gaps": [{"category": "budget", "description": "x", "severity": "low"}]}"#;
        assert!(parse_draft(raw).is_err());
    }

    #[test]
    fn rejects_non_json_output() {
        assert!(parse_draft("I cannot help with that.").is_err());
    }

    #[test]
    fn truncation_appends_marker() {
        let long = "x".repeat(MAX_NOTES_CHARS + 10);
        let t = truncate_chars(&long, MAX_NOTES_CHARS);
        assert!(t.ends_with("... [TRUNCATED]"));
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn prompt_names_every_standard_section() {
        let prompt = build_prompt("client wants a booking site");
        for s in STANDARD_SECTIONS {
            assert!(prompt.contains(s));
        }
        assert!(prompt.contains("client wants a booking site"));
    }

    #[test]
    fn empty_context_renders_placeholder() {
        let rendered = render_context(&RetrievalResult::empty());
        assert!(rendered.contains("(none found)"));
    }
}

//! Content framework stage: sitemap, per-page requirements, and CTA strategy.
//!
//! Runs after a scope draft is accepted. Each provider slot proposes a
//! [`ContentFramework`] for the draft; the two proposals are merged the
//! same slot-ordered way drafts are.
//!
//! # Response contract
//!
//! ```json
//! {
//!   "sitemap": [ { "page": "Home", "description": "..." } ],
//!   "page_details": [ { "page": "Home", "requirements": "..." } ],
//!   "cta_strategy": "..."
//! }
//! ```

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::Draft;
use crate::reasoning::{extract_json_object, truncate_chars};

/// Maximum characters of the original notes sent with a framework request.
pub const MAX_FRAMEWORK_NOTES_CHARS: usize = 2000;

const CTA_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SitemapItem {
    pub page: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageDetail {
    pub page: String,
    #[serde(default)]
    pub requirements: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFramework {
    #[serde(default)]
    pub sitemap: Vec<SitemapItem>,
    #[serde(default)]
    pub page_details: Vec<PageDetail>,
    #[serde(default)]
    pub cta_strategy: String,
}

impl ContentFramework {
    /// Plain-text rendering used when comparing against expected documents.
    pub fn to_text(&self) -> String {
        let mut out = Vec::new();
        if !self.sitemap.is_empty() {
            let pages = self
                .sitemap
                .iter()
                .map(|s| format!("{}: {}", s.page, s.description))
                .collect::<Vec<_>>()
                .join("\n");
            out.push(format!("sitemap:\n{}", pages));
        }
        if !self.page_details.is_empty() {
            let details = self
                .page_details
                .iter()
                .map(|d| format!("{}: {}", d.page, d.requirements))
                .collect::<Vec<_>>()
                .join("\n");
            out.push(format!("page_details:\n{}", details));
        }
        if !self.cta_strategy.trim().is_empty() {
            out.push(format!("cta_strategy:\n{}", self.cta_strategy.trim()));
        }
        out.join("\n\n")
    }
}

/// A framework tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFramework {
    pub provider: String,
    pub framework: ContentFramework,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledFramework {
    pub framework: ContentFramework,
    pub providers: Vec<String>,
}

/// Build the framework instruction prompt for an accepted draft.
pub fn build_framework_prompt(draft: &Draft, notes: &str) -> String {
    let scope = serde_json::to_string(&draft.sections).unwrap_or_default();
    format!(
        "Based on this project scope, design a detailed content framework.\n\
         Instructions:\n\
         1. Output ONLY a valid JSON object, no explanations and no code blocks.\n\
         2. Use the shape {{\"sitemap\": [{{\"page\", \"description\"}}], \
         \"page_details\": [{{\"page\", \"requirements\"}}], \"cta_strategy\": \"...\"}}.\n\
         3. Give every sitemap page a page_details entry.\n\n\
         SCOPE DETAILS:\n{scope}\n\n\
         ORIGINAL NOTES:\n{notes}\n",
        scope = scope,
        notes = truncate_chars(notes, MAX_FRAMEWORK_NOTES_CHARS),
    )
}

/// Parse a provider's raw text output into a [`ContentFramework`].
///
/// Items with a blank page name are dropped; strings are trimmed.
pub fn parse_framework(raw: &str) -> Result<ContentFramework> {
    let json_text = extract_json_object(raw)?;
    let parsed: ContentFramework =
        serde_json::from_str(json_text).context("provider output is not a content framework")?;

    Ok(ContentFramework {
        sitemap: parsed
            .sitemap
            .into_iter()
            .map(|s| SitemapItem {
                page: s.page.trim().to_string(),
                description: s.description.trim().to_string(),
            })
            .filter(|s| !s.page.is_empty())
            .collect(),
        page_details: parsed
            .page_details
            .into_iter()
            .map(|d| PageDetail {
                page: d.page.trim().to_string(),
                requirements: d.requirements.trim().to_string(),
            })
            .filter(|d| !d.page.is_empty())
            .collect(),
        cta_strategy: parsed.cta_strategy.trim().to_string(),
    })
}

fn dedupe<T: Clone + Eq + std::hash::Hash>(a: &[T], b: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    a.iter()
        .chain(b)
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

/// Merge two frameworks with A first.
///
/// Items are concatenated and exact duplicates dropped. CTA strategies
/// are joined with `" | "`; B's is skipped when it repeats A's.
pub fn merge_frameworks(a: &ContentFramework, b: &ContentFramework) -> ContentFramework {
    let a_cta = a.cta_strategy.trim();
    let b_cta = b.cta_strategy.trim();
    let cta_strategy = if a_cta.is_empty() {
        b_cta.to_string()
    } else if b_cta.is_empty() || b_cta.eq_ignore_ascii_case(a_cta) {
        a_cta.to_string()
    } else {
        format!("{}{}{}", a_cta, CTA_SEPARATOR, b_cta)
    };

    ContentFramework {
        sitemap: dedupe(&a.sitemap, &b.sitemap),
        page_details: dedupe(&a.page_details, &b.page_details),
        cta_strategy,
    }
}

/// Merge the frameworks of provider slots A and B.
pub fn reconcile_frameworks(
    a: Option<ProviderFramework>,
    b: Option<ProviderFramework>,
) -> crate::Result<ReconciledFramework> {
    match (a, b) {
        (None, None) => Err(Error::unavailable("no provider returned a content framework")),
        (Some(only), None) | (None, Some(only)) => Ok(ReconciledFramework {
            framework: only.framework,
            providers: vec![only.provider],
        }),
        (Some(a), Some(b)) => Ok(ReconciledFramework {
            framework: merge_frameworks(&a.framework, &b.framework),
            providers: vec![a.provider, b.provider],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn page(page: &str, description: &str) -> SitemapItem {
        SitemapItem {
            page: page.into(),
            description: description.into(),
        }
    }

    fn detail(page: &str, requirements: &str) -> PageDetail {
        PageDetail {
            page: page.into(),
            requirements: requirements.into(),
        }
    }

    fn framework(pages: &[(&str, &str)], cta: &str) -> ContentFramework {
        ContentFramework {
            sitemap: pages.iter().map(|(p, d)| page(p, d)).collect(),
            page_details: pages.iter().map(|(p, d)| detail(p, d)).collect(),
            cta_strategy: cta.into(),
        }
    }

    #[test]
    fn parse_accepts_fenced_output_and_drops_blank_pages() {
        let raw = "```json\n{\"sitemap\": [{\"page\": \" Home \", \"description\": \"Landing\"}, \
                   {\"page\": \"\", \"description\": \"orphan\"}], \
                   \"page_details\": [{\"page\": \"Home\", \"requirements\": \"Hero banner\"}], \
                   \"cta_strategy\": \"Book a tasting \"}\n```";
        let f = parse_framework(raw).unwrap();
        assert_eq!(f.sitemap, vec![page("Home", "Landing")]);
        assert_eq!(f.page_details, vec![detail("Home", "Hero banner")]);
        assert_eq!(f.cta_strategy, "Book a tasting");
    }

    #[test]
    fn parse_rejects_wrong_shapes() {
        assert!(parse_framework("no json here").is_err());
        assert!(parse_framework("{\"sitemap\": \"Home\"}").is_err());
        assert_eq!(parse_framework("{}").unwrap(), ContentFramework::default());
    }

    #[test]
    fn merge_concatenates_and_drops_exact_duplicates() {
        let a = framework(&[("Home", "Landing"), ("Menu", "Breads")], "Order online today");
        let b = framework(&[("Home", "Landing"), ("Menu", "Cakes")], "Call the shop");
        let m = merge_frameworks(&a, &b);

        let pages: Vec<_> = m.sitemap.iter().map(|s| s.description.as_str()).collect();
        assert_eq!(pages, vec!["Landing", "Breads", "Cakes"]);
        assert_eq!(m.page_details.len(), 3);
        assert_eq!(m.cta_strategy, "Order online today | Call the shop");
    }

    #[test]
    fn merge_of_identical_frameworks_is_unchanged() {
        let f = framework(&[("Home", "Landing")], "Order online today");
        assert_eq!(merge_frameworks(&f, &f), f);
        assert_eq!(
            merge_frameworks(&ContentFramework::default(), &f).cta_strategy,
            "Order online today"
        );
    }

    #[test]
    fn reconcile_prefers_slot_order_and_needs_one_side() {
        let a = ProviderFramework {
            provider: "groq".into(),
            framework: framework(&[("Home", "A")], "cta from a side"),
        };
        let b = ProviderFramework {
            provider: "gemini".into(),
            framework: framework(&[("Home", "B")], "cta from b side"),
        };

        let only = reconcile_frameworks(None, Some(b.clone())).unwrap();
        assert_eq!(only.framework, b.framework);
        assert_eq!(only.providers, vec!["gemini".to_string()]);

        let both = reconcile_frameworks(Some(a), Some(b)).unwrap();
        assert_eq!(both.framework.sitemap[0].description, "A");
        assert_eq!(both.providers, vec!["groq".to_string(), "gemini".to_string()]);

        let err = reconcile_frameworks(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    }

    #[test]
    fn prompt_carries_scope_and_truncated_notes() {
        let mut d = Draft::default();
        d.sections.insert("project_title".into(), "Harbor Bakery".into());
        let notes = "n".repeat(MAX_FRAMEWORK_NOTES_CHARS + 10);
        let prompt = build_framework_prompt(&d, &notes);
        assert!(prompt.contains("Harbor Bakery"));
        assert!(prompt.contains("[TRUNCATED]"));
        assert!(prompt.contains("cta_strategy"));
    }

    #[test]
    fn text_rendering_lists_every_part() {
        let f = framework(&[("Home", "Landing")], "Book now");
        assert_eq!(
            f.to_text(),
            "sitemap:\nHome: Landing\n\npage_details:\nHome: Landing\n\ncta_strategy:\nBook now"
        );
    }
}

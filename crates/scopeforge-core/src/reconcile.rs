//! Hybrid reconciliation of two provider drafts.
//!
//! # Algorithm
//!
//! 1. Only one draft present: it is the result verbatim.
//! 2. Both present:
//!    - per section name, keep the longer non-empty text (ties go to A);
//!    - gaps are A's gaps followed by B's gaps that do not duplicate one
//!      of A's; a duplicate shares the category and the normalized
//!      description, and raises the kept gap to the higher severity.
//! 3. Neither present: [`Error::ProviderUnavailable`].
//!
//! The result depends only on the slot (A or B) of each draft, never on
//! which provider finished first.
//!
//! Descriptions are compared by exact case-insensitive equality after
//! trimming. Fuzzy matching is deliberately not attempted.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{Draft, Gap, ProviderDraft, ReconciledDraft};

/// Merge the drafts of provider slots A and B.
pub fn reconcile(a: Option<ProviderDraft>, b: Option<ProviderDraft>) -> Result<ReconciledDraft> {
    match (a, b) {
        (None, None) => Err(Error::unavailable("no provider returned a draft")),
        (Some(only), None) | (None, Some(only)) => Ok(ReconciledDraft {
            draft: only.draft,
            providers: vec![only.provider],
        }),
        (Some(a), Some(b)) => Ok(ReconciledDraft {
            draft: merge_drafts(&a.draft, &b.draft),
            providers: vec![a.provider, b.provider],
        }),
    }
}

/// Merge two drafts with A as the preferred side.
pub fn merge_drafts(a: &Draft, b: &Draft) -> Draft {
    Draft {
        sections: merge_sections(&a.sections, &b.sections),
        gaps: merge_gaps(&a.gaps, &b.gaps),
    }
}

fn merge_sections(
    a: &BTreeMap<String, String>,
    b: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out = a.clone();
    for (name, b_text) in b {
        match out.get(name) {
            Some(a_text) if !prefer_b(a_text, b_text) => {}
            _ => {
                out.insert(name.clone(), b_text.clone());
            }
        }
    }
    out
}

/// B wins only when it is non-empty and strictly longer than A.
fn prefer_b(a_text: &str, b_text: &str) -> bool {
    let a_len = a_text.trim().chars().count();
    let b_len = b_text.trim().chars().count();
    b_len > 0 && b_len > a_len
}

fn normalize(description: &str) -> String {
    description.trim().to_lowercase()
}

fn merge_gaps(a: &[Gap], b: &[Gap]) -> Vec<Gap> {
    let mut out: Vec<Gap> = a.to_vec();
    let keys: Vec<String> = a.iter().map(|g| normalize(&g.description)).collect();
    // Each of A's gaps absorbs at most one duplicate from B, so A == B merges to A.
    let mut absorbed = vec![false; a.len()];

    for gap in b {
        let key = normalize(&gap.description);
        let hit = (0..a.len())
            .find(|&i| !absorbed[i] && out[i].category == gap.category && keys[i] == key);
        match hit {
            Some(i) => {
                absorbed[i] = true;
                if gap.severity > out[i].severity {
                    out[i].severity = gap.severity;
                }
            }
            None => {
                let dup_of_added = out[a.len()..].iter_mut().find(|g| {
                    g.category == gap.category && normalize(&g.description) == key
                });
                match dup_of_added {
                    Some(existing) => {
                        if gap.severity > existing.severity {
                            existing.severity = gap.severity;
                        }
                    }
                    None => out.push(gap.clone()),
                }
            }
        }
    }

    out
}

//! Heuristic completeness checks on a draft and its content framework.
//!
//! These checks run beside the maturity score, not inside it. For a
//! draft they flag structural holes (short title, too few objectives,
//! missing scope boundaries or navigation) and measure how much
//! project-management vocabulary it uses. For a framework they flag an
//! empty sitemap, missing page requirements, or a weak CTA, and measure
//! how many common site pages the sitemap names.

use std::collections::HashSet;

use serde::Serialize;

use crate::framework::ContentFramework;
use crate::models::{Draft, Gap, GapCategory, Severity};

/// Vocabulary expected in a professional scope document.
pub const PM_TERMS: [&str; 16] = [
    "objective",
    "scope",
    "deliverable",
    "milestone",
    "stakeholder",
    "risk",
    "kpi",
    "timeline",
    "resource",
    "constraint",
    "assumption",
    "gap analysis",
    "sitemap",
    "navigation",
    "cta",
    "call to action",
];

/// Page names a typical site or app sitemap is expected to draw from.
pub const PAGE_GLOSSARY: [&str; 13] = [
    "home", "products", "services", "dashboard", "contact", "about", "pricing", "login", "signup",
    "mens", "womens", "faq", "shipping",
];

const MIN_CTA_CHARS: usize = 10;
const MIN_TITLE_CHARS: usize = 5;
const MIN_OBJECTIVES: usize = 3;
const PASS_COVERAGE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Pass,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub complete: bool,
    pub issues: Vec<Gap>,
    /// Share of [`PM_TERMS`] found in objectives and scope, rounded to 2 places.
    pub terminology_score: f64,
    pub status: QualityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameworkReport {
    pub complete: bool,
    pub issues: Vec<Gap>,
    /// Share of [`PAGE_GLOSSARY`] named by sitemap pages, rounded to 2 places.
    pub glossary_coverage: f64,
    pub status: QualityStatus,
}

fn lines(draft: &Draft, section: &str) -> Vec<String> {
    draft
        .section(section)
        .unwrap_or("")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Check a draft for structural completeness.
pub fn check_draft(draft: &Draft) -> QualityReport {
    let mut issues = Vec::new();

    let title = draft.section("project_title").unwrap_or("").trim();
    if title.chars().count() < MIN_TITLE_CHARS {
        issues.push(Gap::new(
            GapCategory::ScopeBoundary,
            "Project title is too short or missing",
            Severity::Low,
        ));
    }

    let objectives = lines(draft, "objectives");
    if objectives.len() < MIN_OBJECTIVES {
        issues.push(Gap::new(
            GapCategory::Feature,
            format!("Fewer than {} objectives defined", MIN_OBJECTIVES),
            Severity::Medium,
        ));
    }

    let scope_in = lines(draft, "scope_in");
    if scope_in.is_empty() {
        issues.push(Gap::new(
            GapCategory::ScopeBoundary,
            "In-scope boundary not defined",
            Severity::High,
        ));
    }

    let scope_out = lines(draft, "scope_out");
    if scope_out.is_empty() {
        issues.push(Gap::new(
            GapCategory::ScopeBoundary,
            "Out-of-scope exclusions not defined",
            Severity::Medium,
        ));
    }

    if lines(draft, "navigation").is_empty() {
        issues.push(Gap::new(
            GapCategory::Navigation,
            "Navigation structure is empty",
            Severity::Medium,
        ));
    }

    let all_text = objectives
        .iter()
        .chain(scope_in.iter())
        .chain(scope_out.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let found = PM_TERMS.iter().filter(|t| all_text.contains(*t)).count();
    let coverage = found as f64 / PM_TERMS.len() as f64;
    let terminology_score = (coverage * 100.0).round() / 100.0;

    let complete = issues.is_empty();
    let status = if complete && coverage > PASS_COVERAGE {
        QualityStatus::Pass
    } else {
        QualityStatus::Warning
    };

    QualityReport {
        complete,
        issues,
        terminology_score,
        status,
    }
}

/// Check a content framework for structural completeness.
pub fn check_framework(framework: &ContentFramework) -> FrameworkReport {
    let mut issues = Vec::new();

    if framework.sitemap.is_empty() {
        issues.push(Gap::new(
            GapCategory::Navigation,
            "Sitemap is empty",
            Severity::High,
        ));
    }

    let detailed: HashSet<String> = framework
        .page_details
        .iter()
        .map(|d| d.page.to_lowercase())
        .collect();
    if framework.page_details.is_empty() {
        issues.push(Gap::new(
            GapCategory::Feature,
            "Page requirements are empty",
            Severity::Medium,
        ));
    } else {
        for item in &framework.sitemap {
            if !detailed.contains(&item.page.to_lowercase()) {
                issues.push(Gap::new(
                    GapCategory::Feature,
                    format!("No requirements for page '{}'", item.page),
                    Severity::Low,
                ));
            }
        }
    }

    if framework.cta_strategy.trim().chars().count() < MIN_CTA_CHARS {
        issues.push(Gap::new(
            GapCategory::Feature,
            "Call-to-action strategy is weak or missing",
            Severity::Medium,
        ));
    }

    let pages: HashSet<String> = framework
        .sitemap
        .iter()
        .map(|s| s.page.trim().to_lowercase())
        .collect();
    let named = PAGE_GLOSSARY
        .iter()
        .filter(|g| pages.contains(**g))
        .count();
    let coverage = named as f64 / PAGE_GLOSSARY.len() as f64;

    let complete = issues.is_empty();
    FrameworkReport {
        complete,
        issues,
        glossary_coverage: (coverage * 100.0).round() / 100.0,
        status: if complete {
            QualityStatus::Pass
        } else {
            QualityStatus::Warning
        },
    }
}

//! The six inspection steps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One step of the inspection workflow, in workflow order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    #[default]
    AnalyzeRules,
    PrepareChecklist,
    RiskDetection,
    ReviewPlan,
    CreateReport,
    DraftEmail,
}

impl Step {
    /// All steps in workflow order.
    pub const ALL: [Self; 6] = [
        Self::AnalyzeRules,
        Self::PrepareChecklist,
        Self::RiskDetection,
        Self::ReviewPlan,
        Self::CreateReport,
        Self::DraftEmail,
    ];

    /// Route-style identifier.
    pub fn slug(self) -> &'static str {
        match self {
            Self::AnalyzeRules => "analyze-rules",
            Self::PrepareChecklist => "prepare-checklist",
            Self::RiskDetection => "risk-detection",
            Self::ReviewPlan => "review-plan",
            Self::CreateReport => "create-report",
            Self::DraftEmail => "draft-email",
        }
    }

    /// 1-based position in the workflow.
    pub fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::AnalyzeRules => "Analyze New Safety Rules",
            Self::PrepareChecklist => "Prepare Safety Checklist",
            Self::RiskDetection => "H&S Risk Detection",
            Self::ReviewPlan => "Review Contractor's Plan",
            Self::CreateReport => "Create Violations Report",
            Self::DraftEmail => "Draft Urgent Email",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::AnalyzeRules => "Upload and summarize new safety regulations, ask clarifying questions to understand their impact.",
            Self::PrepareChecklist => "Update existing safety checklists to comply with new regulations using AI assistance.",
            Self::RiskDetection => "Analyze images from worksites to identify potential hazards and unsafe conditions.",
            Self::ReviewPlan => "Assess contractor H&S plans, summarize scope, and check for compliance.",
            Self::CreateReport => "Consolidate findings from inspections into a comprehensive safety violations report.",
            Self::DraftEmail => "Quickly draft urgent communications regarding severe safety violations to stakeholders.",
        }
    }

    /// Resolve a route. Empty and `/` go to the first step.
    pub fn resolve(route: &str) -> Option<Self> {
        let route = route.trim().trim_start_matches('/');
        if route.is_empty() {
            return Some(Self::default());
        }
        Self::ALL.into_iter().find(|s| s.slug() == route)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s).ok_or_else(|| format!("Unknown step: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_route_is_first_step() {
        assert_eq!(Step::resolve(""), Some(Step::AnalyzeRules));
        assert_eq!(Step::resolve("/"), Some(Step::AnalyzeRules));
    }

    #[test]
    fn test_resolve_slugs() {
        for step in Step::ALL {
            assert_eq!(Step::resolve(step.slug()), Some(step));
            assert_eq!(Step::resolve(&format!("/{}", step.slug())), Some(step));
        }
        assert_eq!(Step::resolve("dashboard-ish"), None);
    }

    #[test]
    fn test_numbering_and_display() {
        assert_eq!(Step::AnalyzeRules.number(), 1);
        assert_eq!(Step::DraftEmail.number(), 6);
        assert_eq!(Step::RiskDetection.to_string(), "3. H&S Risk Detection");
    }
}

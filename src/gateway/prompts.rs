//! Prompt templates for the inspection workflow.
//!
//! Pure string functions; nothing here talks to the network.

use once_cell::sync::Lazy;
use regex::Regex;

/// Focus prompt for summarizing a contractor's H&S plan.
pub const PLAN_SUMMARY_FOCUS: &str = "Summarize the key health and safety measures, emergency procedures, and responsibilities outlined in this Health & Safety Plan.";

/// Focus prompt for summarizing a contractor's scope of work.
pub const SCOPE_OF_WORK_FOCUS: &str = "Based on the provided Health &Safety Plan, summarize the contractor's scope of work relevant to on-site safety.";

/// Focus prompt applied to the assembled violation-review document.
pub const PLAN_VIOLATION_FOCUS: &str = "Identify potential safety compliance gaps or violations based on the provided information.";

/// Used in the violation review when no regulation summary exists yet.
pub const NO_REGULATION_SUMMARY: &str =
    "No specific new regulation summary provided by user for this check.";

const PLAN_VIOLATION_TEMPLATE: &str = "Review this Health & Safety Plan summary: [PLAN_SUMMARY] and this Scope of Work summary: [SCOPE_SUMMARY]. Also consider these new regulations: [REGULATION_SUMMARY]. Identify any potential safety compliance gaps or violations in the contractor's plan or scope.";

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(PLAN_SUMMARY|SCOPE_SUMMARY|REGULATION_SUMMARY)\]").expect("placeholder regex is valid")
});

pub fn summarize(text: &str) -> String {
    format!("Summarize the following document:\n\n{text}")
}

pub fn answer_question(document: &str, question: &str) -> String {
    format!("Based on the following document:\n\n{document}\n\nAnswer this question: {question}")
}

pub fn update_checklist(existing_checklist: &str, regulation_summary: &str) -> String {
    format!(
        "Given the following new safety regulation summary:\n\n{regulation_summary}\n\n\
         And this existing safety checklist:\n\n{existing_checklist}\n\n\
         Update the checklist to be compliant with the new regulations. Clearly indicate changes \
         or additions. Output only the updated checklist text."
    )
}

pub fn safety_report(checklist: &str, notes: &str, scope_of_work: &str) -> String {
    format!(
        r"Create a safety violations report based on the following information:

Updated Safety Checklist:
{checklist}

Inspector's Notes (including image analysis):
{notes}

Contractor's Scope of Work Summary:
{scope_of_work}

Please summarize key safety violations, categorize them if possible, and provide a draft report.
Format the report clearly with sections for different findings."
    )
}

pub fn urgent_email(violations_summary: &str, recipient: &str) -> String {
    format!(
        r"Draft an urgent email to the {recipient} regarding severe safety violations found during a worksite inspection.
The email should be formal, concise, and clearly state the urgency.
Include the following bullet points summarizing the violations:
{violations_summary}

Suggest immediate actions if appropriate."
    )
}

pub fn focused_summary(document: &str, focus: &str) -> String {
    format!("{focus}\n\nDocument content:\n{document}")
}

/// Assemble the document reviewed for contractor plan violations.
pub fn plan_violation_review(plan_summary: &str, scope_summary: &str, regulation_summary: &str) -> String {
    let regulation_summary =
        if regulation_summary.trim().is_empty() { NO_REGULATION_SUMMARY } else { regulation_summary };

    // Single pass over the template so placeholder-like text in the inputs stays literal.
    PLACEHOLDER_RE
        .replace_all(PLAN_VIOLATION_TEMPLATE, |caps: &regex::Captures<'_>| match &caps[1] {
            "PLAN_SUMMARY" => plan_summary.to_string(),
            "SCOPE_SUMMARY" => scope_summary.to_string(),
            _ => regulation_summary.to_string(),
        })
        .into_owned()
}

/// Ask for a bulleted list of the most critical violations in a report.
pub fn email_violations_focus(report: &str) -> String {
    format!(
        "From the following safety report, extract a concise bulleted list of the most critical \
         safety violations only:\n\n{report}"
    )
}

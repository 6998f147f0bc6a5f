//! Text and JSON rendering of runs, criteria, and providers.

use std::fmt::Write;

use crucible_core::{CaseStatus, Category, Run, SuiteKind, TestCase};
use crucible_runtime::{CaseUpdate, ProviderRouter};

const PREVIEW_CHARS: usize = 80;

/// One line for a live status transition.
pub fn progress_line(update: &CaseUpdate) -> String {
    let case = &update.case;
    match case.status {
        CaseStatus::Queued => format!("[case {}] queued: {}", case.id, preview(&case.input.to_string())),
        CaseStatus::Running => format!("[case {}] running", case.id),
        CaseStatus::Completed => {
            format!("[case {}] completed ({:.1}% pass)", case.id, case.pass_score)
        }
        CaseStatus::Failed => format!(
            "[case {}] failed: {}",
            case.id,
            case.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub fn render_text(run: &Run) -> String {
    let mut out = String::new();

    for case in run.cases() {
        render_case(&mut out, case);
        out.push('\n');
    }

    let _ = write!(
        out,
        "{} cases: {} completed, {} failed",
        run.len(),
        run.completed_count(),
        run.failed_count()
    );
    if let Some(mean) = run.mean_pass_score() {
        let _ = write!(out, ", mean pass score {:.1}%", mean);
    }
    out.push('\n');
    out
}

fn render_case(out: &mut String, case: &TestCase) {
    let _ = writeln!(out, "Case {} [{}] {:.1}%", case.id, case.status, case.pass_score);
    let _ = writeln!(out, "  Input:  {}", preview(&case.input.to_string()));
    if let Some(text) = &case.generated_text {
        let _ = writeln!(out, "  Output: {}", preview(text));
    }
    for evaluation in &case.evaluations {
        let _ = writeln!(
            out,
            "  - {:<20} {:<5} {}",
            evaluation.criterion.name(),
            evaluation.status.to_string(),
            evaluation.reason.as_deref().unwrap_or("")
        );
    }
}

pub fn render_json(run: &Run) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(run)
}

/// A suite's criteria grouped by category, in evaluation order.
pub fn render_criteria(suite: SuiteKind) -> String {
    let mut out = String::new();
    let mut current: Option<Category> = None;

    let _ = writeln!(out, "Suite '{}':", suite);
    for criterion in suite.criteria() {
        let category = criterion.category();
        if current != Some(category) {
            let _ = writeln!(out, "  {}", category);
            current = Some(category);
        }
        let _ = writeln!(out, "    - {}", criterion);
    }
    out
}

pub fn render_providers(router: &ProviderRouter) -> String {
    router
        .describe()
        .into_iter()
        .map(|(id, description)| format!("{:<14} {}\n", id, description))
        .collect()
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > PREVIEW_CHARS || text.lines().nth(1).is_some() {
        let head: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}

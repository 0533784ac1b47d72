use serde_json::Value;

use super::{Job, JobStatus};

/// Short per-step summary for dashboards, derived from the last log entry of
/// `step` that carries data (e.g. `"12 files, 47 strings"`).
pub fn step_summary(job: &Job, step: &str) -> Option<String> {
    let data = job
        .logs
        .iter()
        .rev()
        .filter(|entry| entry.step == step)
        .find_map(|entry| entry.data.as_ref());
    let field = |name: &str| data.and_then(|d| d.get(name)).filter(|v| !v.is_null());

    match step {
        "clone" => field("repoPath").map(|_| "Cloned".to_string()),
        "scan" => {
            let files = field("filesWithStrings")?;
            let strings = field("totalStrings")?;
            Some(format!("{} files, {} strings", files, strings))
        }
        "setup-i18n" => {
            let locales: Vec<&str> = field("localesAdded")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .collect();
            if locales.is_empty() {
                None
            } else {
                Some(format!("Locales: {}", locales.join(", ")))
            }
        }
        "transform" => {
            let progress = field("completedFiles")
                .and_then(Value::as_u64)
                .zip(field("totalFiles").and_then(Value::as_u64))
                .filter(|(_, total)| *total > 0);
            if let Some((completed, total)) = progress {
                let pct = (completed as f64 / total as f64 * 100.0).round() as u64;
                let strings = field("stringsExtracted")
                    .map(|s| format!(", {} strings", s))
                    .unwrap_or_default();
                return Some(format!("{}/{} files ({}%){}", completed, total, pct, strings));
            }
            if job.status == JobStatus::Completed {
                return Some(format!(
                    "{} files, {} strings",
                    job.stats.files_modified, job.stats.strings_found
                ));
            }
            None
        }
        "translate" => field("languagesCount").map(|n| format!("{} languages", n)),
        "commit-push" => field("branch").map(|b| match b.as_str() {
            Some(branch) => format!("Branch: {}", branch),
            None => format!("Branch: {}", b),
        }),
        "open-pr" => field("prUrl").map(|_| "PR opened".to_string()),
        _ => None,
    }
}

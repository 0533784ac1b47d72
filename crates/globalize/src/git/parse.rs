//! Git output helpers.

use std::process::Output;

use crate::sanitize::redact_credentials_in;

/// Formats a git failure from stderr and stdout, with credentials in any
/// echoed URL redacted.
pub fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    let message = match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    };
    redact_credentials_in(&message)
}

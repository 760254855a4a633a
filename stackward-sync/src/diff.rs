//! Unified diff between the remote and local definitions, for dry runs.

use similar::TextDiff;

use stackward_core::StackRef;

pub fn unified_diff(stack: &StackRef, remote: &str, local: &str) -> String {
    let old_header = format!("remote/{stack}");
    let new_header = format!("local/{stack}");
    TextDiff::from_lines(remote, local)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

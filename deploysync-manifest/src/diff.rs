//! Unified diff rendering for dry runs.

use std::path::Path;

use similar::TextDiff;

/// Render the change from `old` to `new` as a unified diff with `a/` and `b/`
/// headers relative to the repository root. Empty when nothing changed.
pub fn unified_diff(path: &Path, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    let old_header = format!("a/{}", path.display());
    let new_header = format!("b/{}", path.display());
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_has_no_diff() {
        assert!(unified_diff(Path::new("x.yaml"), "a\n", "a\n").is_empty());
    }

    #[test]
    fn changed_line_produces_unified_hunk() {
        let diff = unified_diff(
            Path::new("apps/api.yaml"),
            "name: api\nimage: a:1\n",
            "name: api\nimage: a:2\n",
        );
        assert!(diff.contains("--- a/apps/api.yaml"));
        assert!(diff.contains("+++ b/apps/api.yaml"));
        assert!(diff.contains("-image: a:1"));
        assert!(diff.contains("+image: a:2"));
        assert!(diff.contains("@@"));
    }
}

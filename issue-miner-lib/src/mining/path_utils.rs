//! Path utilities for mapping host identifiers onto file names.

/// Sanitize a string for use as a single path component.
///
/// Removes traversal sequences and characters that are unsafe in file names.
/// The `*` character is preserved because it separates owner and repository
/// in cache namespaces.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let s = s.replace("..", "__");
    s.replace(['/', '\\', ':', '?', '"', '<', '>', '|'], "_")
}

/// Flatten a repository-relative file path into a single component.
///
/// `src/models/train.py` becomes `src*models*train.py`.
#[must_use]
pub fn flatten_repo_path(path: &str) -> String {
    sanitize_path_component(&path.replace(['/', '\\'], "*"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_normal_name() {
        assert_eq!(sanitize_path_component("bindsnet"), "bindsnet");
        assert_eq!(sanitize_path_component("geo-deep-learning"), "geo-deep-learning");
        assert_eq!(sanitize_path_component("my.repo"), "my.repo");
    }

    #[test]
    fn test_sanitize_keeps_namespace_separator() {
        assert_eq!(sanitize_path_component("BindsNET*bindsnet"), "BindsNET*bindsnet");
    }

    #[test]
    fn test_sanitize_path_traversal() {
        assert_eq!(sanitize_path_component(".."), "__");
        assert_eq!(sanitize_path_component("../../etc/passwd"), "______etc_passwd");
    }

    #[test]
    fn test_sanitize_dangerous_chars() {
        assert_eq!(sanitize_path_component("foo:bar"), "foo_bar");
        assert_eq!(sanitize_path_component("foo?bar"), "foo_bar");
        assert_eq!(sanitize_path_component("foo|bar"), "foo_bar");
    }

    #[test]
    fn test_flatten_repo_path() {
        assert_eq!(flatten_repo_path("train.py"), "train.py");
        assert_eq!(flatten_repo_path("src/models/train.py"), "src*models*train.py");
        assert_eq!(flatten_repo_path("../outside.py"), "__*outside.py");
    }
}

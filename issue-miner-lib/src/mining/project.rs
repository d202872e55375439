use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::bail;
use std::sync::Arc;
use url::Url;

/// Web root used to build human-facing issue and pull request links.
const WEB_ROOT: &str = "https://github.com";

/// Separator between owner and repository in cache namespaces and feed names.
const NAMESPACE_SEPARATOR: char = '*';

/// Identity of a hosted project: `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId {
    owner: Arc<str>,
    repo: Arc<str>,
}

impl ProjectId {
    #[must_use]
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: Arc::from(owner),
            repo: Arc::from(repo),
        }
    }

    /// Parse a project name of the form `owner/repo`.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        let Some((owner, repo)) = name.split_once('/') else {
            bail!("invalid project name '{name}': expected 'owner/repo'");
        };

        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            bail!("invalid project name '{name}': expected 'owner/repo'");
        }

        Ok(Self::new(owner, repo))
    }

    /// Extract the project and item number from an API or web URL.
    ///
    /// Accepts `https://api.example.com/repos/{owner}/{repo}/pulls/{n}` as well as
    /// `https://example.com/{owner}/{repo}/pull/{n}`.
    #[must_use]
    pub fn parse_item_url(url: &str) -> Option<(Self, u64)> {
        let url = Url::parse(url).ok()?;
        let mut segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if segments.first() == Some(&"repos") {
            let _ = segments.remove(0);
        }

        let [owner, repo, _kind, number, ..] = segments.as_slice() else {
            return None;
        };

        let number = number.parse().ok()?;
        Some((Self::new(owner, repo), number))
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The on-disk namespace for this project, `owner*repo`.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}{NAMESPACE_SEPARATOR}{}", self.owner, self.repo)
    }

    #[must_use]
    pub fn web_url(&self) -> String {
        format!("{WEB_ROOT}/{}/{}", self.owner, self.repo)
    }

    #[must_use]
    pub fn issue_url(&self, number: u64) -> String {
        format!("{WEB_ROOT}/{}/{}/issues/{number}", self.owner, self.repo)
    }

    #[must_use]
    pub fn pull_url(&self, number: u64) -> String {
        format!("{WEB_ROOT}/{}/{}/pull/{number}", self.owner, self.repo)
    }

    /// Whether two projects are the same, ignoring ASCII case as the host does.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.repo.eq_ignore_ascii_case(&other.repo)
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name() {
        let project = ProjectId::parse("foo/bar").unwrap();
        assert_eq!(project.owner(), "foo");
        assert_eq!(project.repo(), "bar");
        assert_eq!(project.to_string(), "foo/bar");
    }

    #[test]
    fn test_parse_name_rejects_garbage() {
        let _ = ProjectId::parse("foobar").unwrap_err();
        let _ = ProjectId::parse("/bar").unwrap_err();
        let _ = ProjectId::parse("foo/").unwrap_err();
        let _ = ProjectId::parse("a/b/c").unwrap_err();
    }

    #[test]
    fn test_namespace_uses_star_separator() {
        assert_eq!(ProjectId::new("foo", "bar").namespace(), "foo*bar");
    }

    #[test]
    fn test_web_urls() {
        let project = ProjectId::new("foo", "bar");
        assert_eq!(project.web_url(), "https://github.com/foo/bar");
        assert_eq!(project.issue_url(42), "https://github.com/foo/bar/issues/42");
        assert_eq!(project.pull_url(43), "https://github.com/foo/bar/pull/43");
    }

    #[test]
    fn test_parse_api_pull_url() {
        let (project, number) = ProjectId::parse_item_url("https://api.github.com/repos/foo/bar/pulls/43").unwrap();
        assert_eq!(project, ProjectId::new("foo", "bar"));
        assert_eq!(number, 43);
    }

    #[test]
    fn test_parse_web_pull_url() {
        let (project, number) = ProjectId::parse_item_url("https://github.com/foo/bar/pull/7").unwrap();
        assert_eq!(project, ProjectId::new("foo", "bar"));
        assert_eq!(number, 7);
    }

    #[test]
    fn test_parse_item_url_rejects_short_paths() {
        assert!(ProjectId::parse_item_url("https://api.github.com/repos/foo").is_none());
        assert!(ProjectId::parse_item_url("https://api.github.com/repos/foo/bar/pulls/abc").is_none());
        assert!(ProjectId::parse_item_url("not a url").is_none());
    }

    #[test]
    fn test_same_as_ignores_case() {
        assert!(ProjectId::new("Foo", "Bar").same_as(&ProjectId::new("foo", "bar")));
        assert!(!ProjectId::new("foo", "bar").same_as(&ProjectId::new("foo", "baz")));
    }
}

use crate::Result;
use crate::mining::ProjectId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A row type with a fixed header.
pub trait CsvRow: Serialize + DeserializeOwned {
    const HEADERS: &'static [&'static str];
}

/// Dataset label of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display)]
pub enum Category {
    #[serde(rename = "ml")]
    #[strum(serialize = "ml")]
    Ml,

    #[serde(rename = "non-ml")]
    #[strum(serialize = "non-ml")]
    NonMl,
}

/// Pull request numbers, written as a space-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrNumbers(pub Vec<u64>);

impl PrNumbers {
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}

impl Serialize for PrNumbers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.0.iter().map(u64::to_string).collect::<Vec<_>>().join(" ");
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for PrNumbers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']'))
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u64>().map_err(serde::de::Error::custom))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// One row of the bulk repository metadata feed.
///
/// Only owner and repository are required; the remaining fields are refreshed
/// from the host before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRow {
    #[serde(alias = "Owner")]
    pub owner: String,

    #[serde(alias = "Repo", alias = "repo_name", alias = "name")]
    pub repo: String,

    #[serde(default, alias = "Language")]
    pub language: String,

    #[serde(default, alias = "Category")]
    pub category: String,

    #[serde(default, alias = "stars", alias = "Star")]
    pub star_count: Option<u64>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl CsvRow for FeedRow {
    const HEADERS: &'static [&'static str] = &["owner", "repo", "language", "category", "star_count", "created_at", "pushed_at"];
}

/// A repository accepted by the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRow {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "URL")]
    pub url: String,

    #[serde(rename = "Created_at")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "Star")]
    pub stars: u64,

    #[serde(rename = "Last commit")]
    pub pushed_at: DateTime<Utc>,
}

impl CsvRow for RepositoryRow {
    const HEADERS: &'static [&'static str] = &["Name", "URL", "Created_at", "Star", "Last commit"];
}

impl RepositoryRow {
    pub fn project(&self) -> Result<ProjectId> {
        ProjectId::parse(&self.name)
    }
}

/// An issue with the pull requests that cross-reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    #[serde(rename = "Project Name")]
    pub project: String,

    #[serde(rename = "Issue URL")]
    pub issue_url: String,

    #[serde(rename = "Issue Number")]
    pub issue_number: u64,

    #[serde(rename = "PRs")]
    pub pulls: PrNumbers,

    #[serde(rename = "Title")]
    pub title: String,
}

impl CsvRow for LinkRow {
    const HEADERS: &'static [&'static str] = &["Project Name", "Issue URL", "Issue Number", "PRs", "Title"];
}

impl LinkRow {
    #[must_use]
    pub fn new(project: &ProjectId, issue_number: u64, pulls: PrNumbers, title: &str) -> Self {
        Self {
            project: project.to_string(),
            issue_url: project.issue_url(issue_number),
            issue_number,
            pulls,
            title: title.to_string(),
        }
    }

    pub fn project(&self) -> Result<ProjectId> {
        ProjectId::parse(&self.project)
    }
}

/// A closed issue with at least one merged linked pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleRow {
    #[serde(rename = "Project Name")]
    pub project: String,

    #[serde(rename = "Issue URL")]
    pub issue_url: String,

    #[serde(rename = "Issue Number")]
    pub issue_number: u64,

    #[serde(rename = "Closed PRs")]
    pub merged_pulls: PrNumbers,

    #[serde(rename = "Title")]
    pub title: String,
}

impl CsvRow for EligibleRow {
    const HEADERS: &'static [&'static str] = &["Project Name", "Issue URL", "Issue Number", "Closed PRs", "Title"];
}

impl EligibleRow {
    pub fn project(&self) -> Result<ProjectId> {
        ProjectId::parse(&self.project)
    }
}

/// An eligible issue with both classification verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    #[serde(rename = "Project Name")]
    pub project: String,

    #[serde(rename = "Issue URL")]
    pub issue_url: String,

    #[serde(rename = "Issue Number")]
    pub issue_number: u64,

    #[serde(rename = "Closed PRs")]
    pub merged_pulls: PrNumbers,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Framework Import")]
    pub framework_import: bool,

    #[serde(rename = "Matched Module")]
    pub matched_module: String,

    #[serde(rename = "Keyword")]
    pub keyword: String,

    #[serde(rename = "Category")]
    pub category: Category,
}

impl CsvRow for ClassifiedRow {
    const HEADERS: &'static [&'static str] = &[
        "Project Name",
        "Issue URL",
        "Issue Number",
        "Closed PRs",
        "Title",
        "Framework Import",
        "Matched Module",
        "Keyword",
        "Category",
    ];
}

/// An issue drawn into the balanced comparison set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledRow {
    #[serde(rename = "Project Name")]
    pub project: String,

    #[serde(rename = "Issue URL")]
    pub issue_url: String,

    #[serde(rename = "Issue Number")]
    pub issue_number: u64,

    #[serde(rename = "Closed PRs")]
    pub merged_pulls: PrNumbers,

    #[serde(rename = "Category")]
    pub category: Category,
}

impl CsvRow for SampledRow {
    const HEADERS: &'static [&'static str] = &["Project Name", "Issue URL", "Issue Number", "Closed PRs", "Category"];
}

impl SampledRow {
    pub fn project(&self) -> Result<ProjectId> {
        ProjectId::parse(&self.project)
    }
}

/// A final dataset record, in the schema the analysis scripts read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "Project Name")]
    pub project: String,

    #[serde(rename = "Issue URL")]
    pub issue_url: String,

    #[serde(rename = "PR URL")]
    pub pr_url: String,

    #[serde(rename = "Line Change")]
    pub line_change: u64,

    #[serde(rename = "Fix duration (days)")]
    pub fix_duration_days: i64,

    #[serde(rename = "Category")]
    pub category: Category,
}

impl CsvRow for DatasetRow {
    const HEADERS: &'static [&'static str] =
        &["Project Name", "Issue URL", "PR URL", "Line Change", "Fix duration (days)", "Category"];
}

//! Candidate repository selection.

use super::fetch::Fetch;
use super::project::ProjectId;
use super::snapshots::Snapshots;
use super::store::StoreKey;
use super::wire::RepoResource;
use crate::Result;
use crate::artifacts::{FeedRow, RepositoryRow};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use core::fmt::{Display, Formatter};
use ohno::bail;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "    filter";

/// Selection thresholds, anchored to a fixed "as of" date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterCriteria {
    /// Required feed category, compared case-insensitively
    pub category: String,

    /// Required primary language, compared case-insensitively
    pub language: String,

    /// Reference date the age and activity windows count back from
    pub as_of: NaiveDate,

    /// Created no more than this many calendar years before `as_of`
    pub created_within_years: u32,

    /// Pushed to no more than this many calendar years before `as_of`
    pub pushed_within_years: u32,

    /// Minimum number of stars
    pub min_stars: u64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            category: "applied AI".to_string(),
            language: "python".to_string(),
            as_of: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            created_within_years: 5,
            pushed_within_years: 2,
            min_stars: 100,
        }
    }
}

impl FilterCriteria {
    #[must_use]
    pub fn min_created_year(&self) -> i32 {
        self.as_of.year() - self.created_within_years.cast_signed()
    }

    #[must_use]
    pub fn min_pushed_year(&self) -> i32 {
        self.as_of.year() - self.pushed_within_years.cast_signed()
    }

    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            bail!("filter.category must not be empty");
        }

        if self.language.trim().is_empty() {
            bail!("filter.language must not be empty");
        }

        if self.pushed_within_years > self.created_within_years {
            bail!(
                "filter.pushed_within_years ({}) must not exceed filter.created_within_years ({})",
                self.pushed_within_years,
                self.created_within_years
            );
        }

        Ok(())
    }
}

/// Why a feed row was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Category(String),
    Language(String),
    MissingField(&'static str),
    CreatedTooEarly(i32),
    InactiveSince(i32),
    TooFewStars(u64),
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Category(category) => write!(f, "category '{category}' is not selected"),
            Self::Language(language) => write!(f, "language '{language}' is not selected"),
            Self::MissingField(field) => write!(f, "no value for {field}"),
            Self::CreatedTooEarly(year) => write!(f, "created in {year}"),
            Self::InactiveSince(year) => write!(f, "last pushed in {year}"),
            Self::TooFewStars(stars) => write!(f, "only {stars} star(s)"),
        }
    }
}

/// A selected repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub project: ProjectId,
    pub created_at: DateTime<Utc>,
    pub pushed_at: DateTime<Utc>,
    pub stars: u64,
    pub language: String,
    pub category: String,
}

impl Repository {
    #[must_use]
    pub fn to_row(&self) -> RepositoryRow {
        RepositoryRow {
            name: self.project.to_string(),
            url: self.project.web_url(),
            created_at: self.created_at,
            stars: self.stars,
            pushed_at: self.pushed_at,
        }
    }
}

/// Applies [`FilterCriteria`] to feed rows.
#[derive(Debug, Clone)]
pub struct RepositoryFilter {
    criteria: FilterCriteria,
}

impl RepositoryFilter {
    #[must_use]
    pub const fn new(criteria: FilterCriteria) -> Self {
        Self { criteria }
    }

    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// The checks that need nothing but the feed: category and language.
    pub fn prefilter(&self, row: &FeedRow) -> Result<(), Rejection> {
        if !row.category.trim().eq_ignore_ascii_case(self.criteria.category.trim()) {
            return Err(Rejection::Category(row.category.clone()));
        }

        if !row.language.trim().eq_ignore_ascii_case(self.criteria.language.trim()) {
            return Err(Rejection::Language(row.language.clone()));
        }

        Ok(())
    }

    /// Accept or reject a fully populated feed row.
    pub fn evaluate(&self, row: &FeedRow) -> Result<Repository, Rejection> {
        self.prefilter(row)?;

        let created_at = row.created_at.ok_or(Rejection::MissingField("created_at"))?;
        let pushed_at = row.pushed_at.ok_or(Rejection::MissingField("pushed_at"))?;
        let stars = row.star_count.ok_or(Rejection::MissingField("star_count"))?;

        if created_at.year() < self.criteria.min_created_year() {
            return Err(Rejection::CreatedTooEarly(created_at.year()));
        }

        if pushed_at.year() < self.criteria.min_pushed_year() {
            return Err(Rejection::InactiveSince(pushed_at.year()));
        }

        if stars < self.criteria.min_stars {
            return Err(Rejection::TooFewStars(stars));
        }

        Ok(Repository {
            project: ProjectId::new(row.owner.trim(), row.repo.trim()),
            created_at,
            pushed_at,
            stars,
            language: row.language.trim().to_string(),
            category: row.category.trim().to_string(),
        })
    }
}

/// Overlay a repository snapshot's values onto its feed row.
#[must_use]
pub fn refresh_from_snapshot(row: &FeedRow, snapshot: &RepoResource) -> FeedRow {
    FeedRow {
        star_count: snapshot.stargazers_count.or(row.star_count),
        created_at: snapshot.created_at.or(row.created_at),
        pushed_at: snapshot.pushed_at.or(row.pushed_at),
        ..row.clone()
    }
}

/// Outcome of selecting one feed row.
#[derive(Debug)]
pub enum Selection {
    Accepted(Repository),
    Rejected(Rejection),

    /// The repository no longer exists on the host.
    Gone,

    /// The snapshot could not be retrieved; retried on the next run.
    Failed(ohno::AppError),
}

/// Select one feed row, fetching its repository snapshot when `online`.
///
/// Rows failing the feed-only checks never cost a request. When not `online`,
/// only an already stored snapshot is used.
pub async fn select(filter: &RepositoryFilter, snapshots: &Snapshots, row: &FeedRow, online: bool) -> Selection {
    if let Err(rejection) = filter.prefilter(row) {
        return Selection::Rejected(rejection);
    }

    let project = ProjectId::new(row.owner.trim(), row.repo.trim());
    let key = StoreKey::repository(&project);
    let snapshot = snapshots
        .resource_json_if::<RepoResource>(online, &key, &format!("/repos/{}/{}", project.owner(), project.repo()))
        .await;

    match snapshot {
        Fetch::Found(snapshot) => match filter.evaluate(&refresh_from_snapshot(row, &snapshot)) {
            Ok(repository) => Selection::Accepted(repository),
            Err(rejection) => {
                log::debug!(target: LOG_TARGET, "Rejected {project}: {rejection}");
                Selection::Rejected(rejection)
            }
        },
        Fetch::Missing => {
            log::warn!(target: LOG_TARGET, "Skipping {project}: repository not found");
            Selection::Gone
        }
        Fetch::Failed(e) => Selection::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn row(created: i32, pushed: i32, stars: u64) -> FeedRow {
        FeedRow {
            owner: "foo".to_string(),
            repo: "bar".to_string(),
            language: "Python".to_string(),
            category: "Applied AI".to_string(),
            star_count: Some(stars),
            created_at: Some(at(created, 6, 1)),
            pushed_at: Some(at(pushed, 6, 1)),
        }
    }

    fn filter() -> RepositoryFilter {
        RepositoryFilter::new(FilterCriteria::default())
    }

    #[test]
    fn test_default_thresholds() {
        let criteria = FilterCriteria::default();
        assert_eq!(criteria.min_created_year(), 2018);
        assert_eq!(criteria.min_pushed_year(), 2021);
        criteria.validate().unwrap();
    }

    #[test]
    fn test_thresholds_follow_as_of_date() {
        let criteria = FilterCriteria {
            as_of: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            ..FilterCriteria::default()
        };
        assert_eq!(criteria.min_created_year(), 2020);
        assert_eq!(criteria.min_pushed_year(), 2023);
    }

    #[test]
    fn test_accepts_foo_bar() {
        let repository = filter().evaluate(&row(2019, 2022, 500)).unwrap();
        assert_eq!(repository.project, ProjectId::new("foo", "bar"));
        assert_eq!(repository.stars, 500);
        assert_eq!(repository.to_row().url, "https://github.com/foo/bar");
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let _ = filter().evaluate(&row(2018, 2021, 100)).unwrap();
    }

    #[test]
    fn test_rejections() {
        let f = filter();
        assert_eq!(f.evaluate(&row(2017, 2022, 500)), Err(Rejection::CreatedTooEarly(2017)));
        assert_eq!(f.evaluate(&row(2019, 2020, 500)), Err(Rejection::InactiveSince(2020)));
        assert_eq!(f.evaluate(&row(2019, 2022, 99)), Err(Rejection::TooFewStars(99)));

        let mut wrong_language = row(2019, 2022, 500);
        wrong_language.language = "Jupyter Notebook".to_string();
        assert_eq!(f.evaluate(&wrong_language), Err(Rejection::Language("Jupyter Notebook".to_string())));

        let mut wrong_category = row(2019, 2022, 500);
        wrong_category.category = "tool".to_string();
        assert_eq!(f.evaluate(&wrong_category), Err(Rejection::Category("tool".to_string())));

        let mut no_stars = row(2019, 2022, 500);
        no_stars.star_count = None;
        assert_eq!(f.evaluate(&no_stars), Err(Rejection::MissingField("star_count")));
    }

    #[test]
    fn test_accepted_rows_satisfy_thresholds() {
        let f = filter();
        for created in 2014..2024 {
            for pushed in 2018..2024 {
                for stars in [0, 50, 99, 100, 101, 5000] {
                    if let Ok(repository) = f.evaluate(&row(created, pushed, stars)) {
                        assert!(repository.created_at.year() >= 2018);
                        assert!(repository.pushed_at.year() >= 2021);
                        assert!(repository.stars >= 100);
                    }
                }
            }
        }
    }

    #[test]
    fn test_snapshot_overrides_feed() {
        let snapshot = RepoResource {
            created_at: Some(at(2020, 1, 1)),
            pushed_at: Some(at(2022, 12, 1)),
            stargazers_count: Some(1234),
            language: Some("Python".to_string()),
        };
        let refreshed = refresh_from_snapshot(&row(2010, 2010, 1), &snapshot);
        assert_eq!(refreshed.star_count, Some(1234));
        assert_eq!(refreshed.created_at, Some(at(2020, 1, 1)));
        let _ = filter().evaluate(&refreshed).unwrap();
    }

    #[test]
    fn test_validate_rejects_inverted_windows() {
        let criteria = FilterCriteria {
            created_within_years: 1,
            pushed_within_years: 3,
            ..FilterCriteria::default()
        };
        let _ = criteria.validate().unwrap_err();
    }
}

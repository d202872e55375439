//! Per-project balanced sampling of non-ML issues.

use crate::artifacts::{Category, ClassifiedRow, SampledRow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "   sampler";

/// The balanced set plus what went into it.
#[derive(Debug, Default)]
pub struct SampleOutcome {
    /// ML rows followed by their sampled non-ML counterparts, project by project.
    pub rows: Vec<SampledRow>,

    /// Number of ML issues per project, including excluded projects.
    pub ml_counts: BTreeMap<String, usize>,

    /// Projects with fewer non-ML candidates than ML issues.
    pub excluded: Vec<String>,
}

/// Draws, for every project with `k` ML issues, `k` non-ML issues uniformly
/// without replacement from that project's other eligible issues.
///
/// A project that cannot supply `k` candidates contributes nothing at all.
#[derive(Debug)]
pub struct DatasetSampler {
    rng: StdRng,
}

impl DatasetSampler {
    /// A sampler that is reproducible when `seed` is set.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64),
        }
    }

    pub fn sample(&mut self, classified: &[ClassifiedRow]) -> SampleOutcome {
        let mut by_project: BTreeMap<&str, (Vec<&ClassifiedRow>, Vec<&ClassifiedRow>)> = BTreeMap::new();
        for row in classified {
            let (ml, non_ml) = by_project.entry(row.project.as_str()).or_default();
            match row.category {
                Category::Ml => ml.push(row),
                Category::NonMl => non_ml.push(row),
            }
        }

        let mut outcome = SampleOutcome::default();
        for (project, (ml, mut pool)) in by_project {
            let k = ml.len();
            if k == 0 {
                continue;
            }

            let _ = outcome.ml_counts.insert(project.to_string(), k);

            if pool.len() < k {
                log::info!(target: LOG_TARGET, "Excluding {project}: {k} ML issue(s) but only {} non-ML candidate(s)", pool.len());
                outcome.excluded.push(project.to_string());
                continue;
            }

            pool.sort_by_key(|row| row.issue_number);
            let mut picked = rand::seq::index::sample(&mut self.rng, pool.len(), k).into_vec();
            picked.sort_unstable();

            log::debug!(target: LOG_TARGET, "Sampled {k} non-ML issue(s) of {} in {project}", pool.len());
            outcome.rows.extend(ml.into_iter().map(sampled));
            outcome.rows.extend(picked.into_iter().filter_map(|i| pool.get(i).copied()).map(sampled));
        }

        outcome
    }
}

fn sampled(row: &ClassifiedRow) -> SampledRow {
    SampledRow {
        project: row.project.clone(),
        issue_url: row.issue_url.clone(),
        issue_number: row.issue_number,
        merged_pulls: row.merged_pulls.clone(),
        category: row.category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::PrNumbers;
    use std::collections::HashSet;

    fn row(project: &str, number: u64, category: Category) -> ClassifiedRow {
        ClassifiedRow {
            project: project.to_string(),
            issue_url: format!("https://github.com/{project}/issues/{number}"),
            issue_number: number,
            merged_pulls: PrNumbers(vec![number + 1000]),
            title: format!("issue {number}"),
            framework_import: category == Category::Ml,
            matched_module: String::new(),
            keyword: String::new(),
            category,
        }
    }

    fn project_rows(project: &str, ml: u64, non_ml: u64) -> Vec<ClassifiedRow> {
        (0..ml)
            .map(|n| row(project, n + 1, Category::Ml))
            .chain((0..non_ml).map(|n| row(project, n + 100, Category::NonMl)))
            .collect()
    }

    fn count(rows: &[SampledRow], project: &str, category: Category) -> usize {
        rows.iter().filter(|r| r.project == project && r.category == category).count()
    }

    #[test]
    fn test_three_ml_five_candidates() {
        let outcome = DatasetSampler::new(Some(7)).sample(&project_rows("foo/bar", 3, 5));
        assert_eq!(count(&outcome.rows, "foo/bar", Category::Ml), 3);
        assert_eq!(count(&outcome.rows, "foo/bar", Category::NonMl), 3);
        assert!(outcome.excluded.is_empty());

        let distinct: HashSet<u64> = outcome.rows.iter().map(|r| r.issue_number).collect();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn test_three_ml_two_candidates_excludes_project() {
        let outcome = DatasetSampler::new(Some(7)).sample(&project_rows("foo/bar", 3, 2));
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.excluded, vec!["foo/bar"]);
        assert_eq!(outcome.ml_counts.get("foo/bar"), Some(&3));
    }

    #[test]
    fn test_projects_without_ml_issues_contribute_nothing() {
        let outcome = DatasetSampler::new(Some(1)).sample(&project_rows("a/b", 0, 4));
        assert!(outcome.rows.is_empty());
        assert!(outcome.ml_counts.is_empty());
    }

    #[test]
    fn test_every_project_is_balanced() {
        let mut rows = project_rows("a/one", 2, 10);
        rows.extend(project_rows("b/two", 4, 3));
        rows.extend(project_rows("c/three", 1, 1));
        rows.extend(project_rows("d/four", 0, 6));

        let outcome = DatasetSampler::new(None).sample(&rows);
        for project in ["a/one", "b/two", "c/three", "d/four"] {
            assert_eq!(count(&outcome.rows, project, Category::Ml), count(&outcome.rows, project, Category::NonMl));
        }
        assert_eq!(outcome.excluded, vec!["b/two"]);
        assert_eq!(outcome.rows.len(), 6);
    }

    #[test]
    fn test_seed_makes_sampling_reproducible() {
        let rows = project_rows("foo/bar", 3, 40);
        let first = DatasetSampler::new(Some(42)).sample(&rows).rows;
        let second = DatasetSampler::new(Some(42)).sample(&rows).rows;
        assert_eq!(first, second);
    }
}

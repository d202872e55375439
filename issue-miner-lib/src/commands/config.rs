use crate::Result;
use crate::mining::{ClientConfig, CommitOrder, FilterCriteria, RetryPolicy};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Datelike;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the data directory
pub const CONFIG_FILE_NAME: &str = "miner.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Which feed repositories are mined
    #[serde(default)]
    pub filter: FilterCriteria,

    /// How the host's API is called
    #[serde(default)]
    pub api: ApiSettings,

    /// How eligible issues are labeled
    #[serde(default)]
    pub classify: ClassifySettings,

    /// How the comparison set is drawn
    #[serde(default)]
    pub sample: SampleSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    pub base_url: String,
    pub accept: String,
    pub page_size: u8,
    pub max_retries: u32,

    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub max_rate_limit_wait: Duration,

    pub max_concurrent_repositories: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            accept: client.accept,
            page_size: client.page_size,
            max_retries: client.retry.max_retries,
            retry_base_delay: client.retry.base_delay,
            request_timeout: client.retry.timeout,
            max_rate_limit_wait: client.max_rate_limit_wait,
            max_concurrent_repositories: 1,
        }
    }
}

impl ApiSettings {
    /// The explicit client configuration every stage is handed.
    #[must_use]
    pub fn client_config(&self, token: Option<String>) -> ClientConfig {
        ClientConfig {
            token,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            accept: self.accept.clone(),
            page_size: self.page_size,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: self.retry_base_delay,
                timeout: self.request_timeout,
            },
            max_rate_limit_wait: self.max_rate_limit_wait,
            max_in_flight: self.max_concurrent_repositories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifySettings {
    /// Import prefixes that mark a file as ML code
    pub frameworks: Vec<String>,

    /// Extension of the source files that are downloaded and scanned
    pub source_extension: String,

    /// Order in which a pull request's commits are scanned
    pub commit_order: CommitOrder,

    /// Keyword list, relative to the data directory unless absolute
    pub glossary: Utf8PathBuf,

    /// Header of the keyword column when the list is a CSV file
    pub glossary_column: String,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            frameworks: vec!["tensorflow".to_string(), "torch".to_string(), "keras".to_string()],
            source_extension: "py".to_string(),
            commit_order: CommitOrder::default(),
            glossary: Utf8PathBuf::from("google_ml_glossary/Keyword_list.csv"),
            glossary_column: "keyword".to_string(),
        }
    }
}

impl ClassifySettings {
    #[must_use]
    pub fn glossary_path(&self, data_dir: &Utf8Path) -> Utf8PathBuf {
        data_dir.join(&self.glossary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleSettings {
    /// Seed for a reproducible draw; drawn from the OS when absent
    pub seed: Option<u64>,
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `miner.toml` in `data_dir` is used when it exists.
    pub fn load(data_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = data_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to '{output_path}'"))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.filter.validate()?;

        if self.filter.as_of.year() < 1970 + self.filter.created_within_years.cast_signed() {
            return Err(app_err!(
                "filter.as_of ({}) precedes the {}-year age window",
                self.filter.as_of,
                self.filter.created_within_years
            ));
        }

        if !(1..=100).contains(&self.api.page_size) {
            return Err(app_err!("api.page_size must be between 1 and 100, got {}", self.api.page_size));
        }

        if self.api.max_concurrent_repositories == 0 {
            return Err(app_err!("api.max_concurrent_repositories must be at least 1"));
        }

        if self.classify.frameworks.iter().all(|f| f.trim().is_empty()) {
            return Err(app_err!("classify.frameworks must name at least one framework"));
        }

        if self.classify.source_extension.trim_start_matches('.').is_empty() {
            return Err(app_err!("classify.source_extension must not be empty"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text).into_app_err("parsing")?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_file_matches_section_defaults() {
        let config = Config::default();
        assert_eq!(config.filter, FilterCriteria::default());
        assert_eq!(config.api, ApiSettings::default());
        assert_eq!(config.classify, ClassifySettings::default());
        assert_eq!(config.sample, SampleSettings::default());
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = parse(
            r#"
            [filter]
            as_of = "2025-06-30"
            min_stars = 10

            [api]
            max_rate_limit_wait = "15m"

            [classify]
            commit_order = "committed"

            [sample]
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.as_of, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        assert_eq!(config.filter.min_stars, 10);
        assert_eq!(config.filter.language, "python");
        assert_eq!(config.filter.min_created_year(), 2020);
        assert_eq!(config.api.max_rate_limit_wait, Duration::from_secs(15 * 60));
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.classify.commit_order, CommitOrder::Committed);
        assert_eq!(config.sample.seed, Some(7));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let _ = parse("[api]\npage_sise = 50\n").unwrap_err();
        let _ = parse("[filtering]\n").unwrap_err();
    }

    #[test]
    fn test_page_size_range() {
        let _ = parse("[api]\npage_size = 0\n").unwrap_err();
        let _ = parse("[api]\npage_size = 101\n").unwrap_err();
        assert_eq!(parse("[api]\npage_size = 30\n").unwrap().api.page_size, 30);
    }

    #[test]
    fn test_frameworks_must_not_be_empty() {
        let err = parse("[classify]\nframeworks = []\n").unwrap_err();
        assert!(format!("{err}").contains("classify.frameworks"));
    }

    #[test]
    fn test_as_of_before_window() {
        let _ = parse("[filter]\nas_of = \"1972-01-01\"\n").unwrap_err();
    }

    #[test]
    fn test_client_config() {
        let settings = ApiSettings {
            base_url: "http://127.0.0.1:8080/".to_string(),
            max_retries: 1,
            max_concurrent_repositories: 4,
            ..ApiSettings::default()
        };

        let client = settings.client_config(Some("secret".to_string()));
        assert_eq!(client.base_url, "http://127.0.0.1:8080");
        assert_eq!(client.token.as_deref(), Some("secret"));
        assert_eq!(client.retry.max_retries, 1);
        assert_eq!(client.max_in_flight, 4);
    }

    #[test]
    fn test_glossary_path() {
        let settings = ClassifySettings::default();
        assert_eq!(
            settings.glossary_path(Utf8Path::new("data")),
            Utf8PathBuf::from("data/google_ml_glossary/Keyword_list.csv")
        );

        let absolute = ClassifySettings {
            glossary: Utf8PathBuf::from("/srv/keywords.txt"),
            ..ClassifySettings::default()
        };
        assert_eq!(absolute.glossary_path(Utf8Path::new("data")), Utf8PathBuf::from("/srv/keywords.txt"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call mkdtemp")]
    fn test_load_prefers_data_dir_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        assert_eq!(Config::load(&data_dir, None).unwrap(), Config::default());

        fs::write(data_dir.join(CONFIG_FILE_NAME), "[sample]\nseed = 3\n").unwrap();
        assert_eq!(Config::load(&data_dir, None).unwrap().sample.seed, Some(3));

        let _ = Config::load(&data_dir, Some(&data_dir.join("absent.toml"))).unwrap_err();
    }
}

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

const CONFIG_FILE_NAME: &str = "fedweek.toml";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_SOURCE_URL: &str = "https://apps.fedoraproject.org/datagrepper/raw";
const DEFAULT_ROWS_PER_PAGE: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RANKING_LIMIT: usize = 3;
const DEFAULT_WORKERS: usize = 4;

const DEFAULT_CATEGORIES: [(&str, &str); 10] = [
    (
        "Updates to stable",
        "org.fedoraproject.prod.bodhi.update.request.stable",
    ),
    (
        "Updates to testing",
        "org.fedoraproject.prod.bodhi.update.request.testing",
    ),
    ("Builds", "org.fedoraproject.prod.buildsys.build.state.change"),
    ("FAS user created", "org.fedoraproject.prod.fas.user.create"),
    ("Meeting started", "org.fedoraproject.prod.meetbot.meeting.start"),
    (
        "Meeting completed",
        "org.fedoraproject.prod.meetbot.meeting.complete",
    ),
    ("New packages", "org.fedoraproject.prod.pkgdb.package.new"),
    ("Retired packages", "org.fedoraproject.prod.pkgdb.package.retire"),
    ("Posts on the planet", "org.fedoraproject.prod.planet.post.new"),
    ("Edit on the wiki", "org.fedoraproject.prod.wiki.article.edit"),
];

const DEFAULT_RANKING_EXCLUDE: [&str; 1] = ["FAS user created"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub label: String,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub rows_per_page: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub posts_dir: PathBuf,
    pub data_dir: PathBuf,
    pub history_file: PathBuf,
    pub chart_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub enabled: bool,
    pub limit: usize,
    pub blocklist: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviousPeriod {
    /// Query the upstream service again for the prior window.
    Requery,
    /// Read the archived counts of the week ending seven days earlier.
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub workers: usize,
    pub previous: PreviousPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub ranking: RankingConfig,
    pub pipeline: PipelineConfig,
    pub categories: Vec<Category>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            source: SourceConfig {
                url: DEFAULT_SOURCE_URL.to_string(),
                rows_per_page: DEFAULT_ROWS_PER_PAGE,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            output: OutputConfig {
                posts_dir: PathBuf::from("posts"),
                data_dir: PathBuf::from("data"),
                history_file: PathBuf::from("data").join("history.json"),
                chart_file: PathBuf::from("themes")
                    .join("custom")
                    .join("assets")
                    .join("trends.svg"),
            },
            ranking: RankingConfig {
                enabled: true,
                limit: DEFAULT_RANKING_LIMIT,
                blocklist: BTreeSet::new(),
                exclude: DEFAULT_RANKING_EXCLUDE
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            pipeline: PipelineConfig {
                workers: DEFAULT_WORKERS,
                previous: PreviousPeriod::Requery,
            },
            categories: default_categories(),
        }
    }
}

impl Config {
    /// Categories in display order (lexicographic by label).
    pub fn sorted_categories(&self) -> Vec<&Category> {
        let mut cats = self.categories.iter().collect::<Vec<_>>();
        cats.sort_by(|a, b| a.label.cmp(&b.label));
        cats
    }

    pub fn ranked_categories(&self) -> Vec<&Category> {
        self.sorted_categories()
            .into_iter()
            .filter(|c| !self.ranking.exclude.contains(&c.label))
            .collect()
    }

    pub fn posts_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.output.posts_dir)
    }

    pub fn data_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.output.data_dir)
    }

    pub fn history_file(&self, root: &Path) -> PathBuf {
        root.join(&self.output.history_file)
    }

    pub fn chart_file(&self, root: &Path) -> PathBuf {
        root.join(&self.output.chart_file)
    }
}

pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(label, topic)| Category {
            label: label.to_string(),
            topic: topic.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    version: Option<u32>,
    source: Option<RawSourceConfig>,
    output: Option<RawOutputConfig>,
    ranking: Option<RawRankingConfig>,
    pipeline: Option<RawPipelineConfig>,
    categories: Option<Vec<RawCategory>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSourceConfig {
    url: Option<String>,
    rows_per_page: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOutputConfig {
    posts_dir: Option<String>,
    data_dir: Option<String>,
    history_file: Option<String>,
    chart_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRankingConfig {
    enabled: Option<bool>,
    limit: Option<usize>,
    blocklist: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPipelineConfig {
    workers: Option<usize>,
    previous: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    label: Option<String>,
    topic: Option<String>,
}

pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Loads `path` when given, else `<root>/fedweek.toml`; falls back to defaults
/// only when no explicit path was requested and the default file is absent.
pub fn load_config(root: &Path, path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path(root), false),
    };
    if !path.exists() {
        if explicit {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let parsed: RawConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    validate_config(parsed, &path)
}

fn validate_config(raw: RawConfig, path: &Path) -> Result<Config> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != CONFIG_VERSION {
        bail!(
            "{} has unsupported version {version}; expected version = {CONFIG_VERSION}",
            path.display()
        );
    }
    let defaults = Config::default();

    let source = match raw.source {
        None => defaults.source,
        Some(source) => {
            let rows_per_page = source.rows_per_page.unwrap_or(DEFAULT_ROWS_PER_PAGE);
            if rows_per_page == 0 {
                bail!("{} has `[source].rows_per_page = 0`", path.display());
            }
            let timeout_secs = source.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
            if timeout_secs == 0 {
                bail!("{} has `[source].timeout_secs = 0`", path.display());
            }
            SourceConfig {
                url: sanitize_optional(source.url).unwrap_or(defaults.source.url),
                rows_per_page,
                timeout_secs,
            }
        }
    };

    let output = match raw.output {
        None => defaults.output,
        Some(output) => OutputConfig {
            posts_dir: output_path(output.posts_dir, defaults.output.posts_dir, "posts_dir", path)?,
            data_dir: output_path(output.data_dir, defaults.output.data_dir, "data_dir", path)?,
            history_file: output_path(
                output.history_file,
                defaults.output.history_file,
                "history_file",
                path,
            )?,
            chart_file: output_path(
                output.chart_file,
                defaults.output.chart_file,
                "chart_file",
                path,
            )?,
        },
    };

    let categories = match raw.categories {
        None => defaults.categories,
        Some(raw_categories) => validate_categories(raw_categories, path)?,
    };

    let ranking = match raw.ranking {
        None => defaults.ranking,
        Some(ranking) => {
            let limit = ranking.limit.unwrap_or(DEFAULT_RANKING_LIMIT);
            if limit == 0 {
                bail!("{} has `[ranking].limit = 0`", path.display());
            }
            RankingConfig {
                enabled: ranking.enabled.unwrap_or(true),
                limit,
                blocklist: sanitize_names(ranking.blocklist.unwrap_or_default()),
                exclude: match ranking.exclude {
                    Some(exclude) => sanitize_names(exclude),
                    None => defaults.ranking.exclude,
                },
            }
        }
    };

    let pipeline = match raw.pipeline {
        None => defaults.pipeline,
        Some(pipeline) => {
            let previous = match pipeline.previous.as_deref().map(str::trim) {
                None | Some("") | Some("requery") => PreviousPeriod::Requery,
                Some("archive") => PreviousPeriod::Archive,
                Some(other) => bail!(
                    "{} has unsupported `previous = \"{other}\"`; expected `requery` or `archive`",
                    path.display()
                ),
            };
            PipelineConfig {
                workers: pipeline.workers.unwrap_or(DEFAULT_WORKERS).max(1),
                previous,
            }
        }
    };

    Ok(Config {
        version,
        source,
        output,
        ranking,
        pipeline,
        categories,
    })
}

fn validate_categories(raw: Vec<RawCategory>, path: &Path) -> Result<Vec<Category>> {
    if raw.is_empty() {
        bail!("{} has empty `[[categories]]`", path.display());
    }
    let mut seen = BTreeSet::new();
    let mut categories = Vec::with_capacity(raw.len());
    for (idx, cat) in raw.into_iter().enumerate() {
        let label = sanitize_optional(cat.label).ok_or_else(|| {
            anyhow::anyhow!(
                "{} missing `label` for `[[categories]]` at index {idx}",
                path.display()
            )
        })?;
        let topic = sanitize_optional(cat.topic).ok_or_else(|| {
            anyhow::anyhow!(
                "{} missing `topic` for `[[categories]]` at index {idx}",
                path.display()
            )
        })?;
        if !seen.insert(label.clone()) {
            bail!(
                "{} has duplicate category label `{label}` at index {idx}",
                path.display()
            );
        }
        categories.push(Category { label, topic });
    }
    Ok(categories)
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn sanitize_names(names: Vec<String>) -> BTreeSet<String> {
    names
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn output_path(raw: Option<String>, default: PathBuf, key: &str, path: &Path) -> Result<PathBuf> {
    match sanitize_optional(raw) {
        None => Ok(default),
        Some(value) => sanitize_relative_path(&value)
            .with_context(|| format!("{} invalid `[output].{key}`", path.display())),
    }
}

fn sanitize_relative_path(raw: &str) -> Result<PathBuf> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        bail!("output path must be relative");
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => bail!("output path must not contain `..`"),
            Component::RootDir | Component::Prefix(_) => bail!("output path must be relative"),
        }
    }
    if clean.as_os_str().is_empty() {
        bail!("output path is empty");
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(root: &Path, body: &str) {
        std::fs::write(default_config_path(root), body).unwrap();
    }

    #[test]
    fn missing_file_yields_fedora_defaults() {
        let tmp = tempdir().unwrap();
        let cfg = load_config(tmp.path(), None).unwrap();
        assert_eq!(cfg.categories.len(), 10);
        assert_eq!(cfg.ranking.limit, 3);
        assert!(cfg.ranking.exclude.contains("FAS user created"));
        assert_eq!(cfg.pipeline.previous, PreviousPeriod::Requery);
        assert_eq!(cfg.source.url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err = load_config(tmp.path(), Some(&missing)).unwrap_err();
        assert!(format!("{err}").contains("does not exist"));
    }

    #[test]
    fn parses_categories_and_ranking() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[ranking]
limit = 2
blocklist = ["zodbot", "  "]

[pipeline]
workers = 0
previous = "archive"

[[categories]]
label = "Builds"
topic = "org.fedoraproject.prod.buildsys.build.state.change"

[[categories]]
label = "Edit on the wiki"
topic = "org.fedoraproject.prod.wiki.article.edit"
"#,
        );

        let cfg = load_config(tmp.path(), None).unwrap();
        assert_eq!(cfg.categories.len(), 2);
        assert_eq!(cfg.ranking.limit, 2);
        assert_eq!(
            cfg.ranking.blocklist.iter().collect::<Vec<_>>(),
            vec!["zodbot"]
        );
        assert_eq!(cfg.pipeline.workers, 1);
        assert_eq!(cfg.pipeline.previous, PreviousPeriod::Archive);
    }

    #[test]
    fn rejects_invalid_version() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 2");
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(format!("{err}").contains("unsupported version"));
    }

    #[test]
    fn rejects_duplicate_labels() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[[categories]]
label = "Builds"
topic = "a"
[[categories]]
label = "Builds"
topic = "b"
"#,
        );
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(format!("{err}").contains("duplicate category label"));
    }

    #[test]
    fn rejects_category_without_topic() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[[categories]]
label = "Builds"
"#,
        );
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(format!("{err}").contains("missing `topic`"));
    }

    #[test]
    fn rejects_escaping_output_path() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[output]
posts_dir = "../posts"
"#,
        );
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(format!("{err}").contains("invalid `[output].posts_dir`"));
    }

    #[test]
    fn rejects_unknown_previous_mode() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[pipeline]
previous = "guess"
"#,
        );
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(format!("{err}").contains("unsupported `previous"));
    }

    #[test]
    fn display_order_is_lexicographic() {
        let cfg = Config::default();
        let labels = cfg
            .sorted_categories()
            .into_iter()
            .map(|c| c.label.as_str())
            .collect::<Vec<_>>();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
        assert!(
            !cfg.ranked_categories()
                .iter()
                .any(|c| c.label == "FAS user created")
        );
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime settings, resolved once at startup from defaults, an optional
/// TOML file and `JOBS_*` environment variables (in that order).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Declared source priority list: files or directories of `*.json`.
    pub sources: Vec<PathBuf>,
    /// Where partitions and the combined dataset are written.
    pub output_dir: PathBuf,
    /// Upper bound on reader threads. `None` lets rayon decide.
    pub workers: Option<usize>,
    /// Query parameters dropped during URL canonicalization.
    /// A trailing `*` marks a prefix (`utm_*`).
    pub tracking_params: Vec<String>,
    pub keywords: KeywordConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: vec![
                PathBuf::from("output/by_source"),
                PathBuf::from("output/social_media"),
            ],
            output_dir: PathBuf::from("output"),
            workers: None,
            tracking_params: strings(&["utm_*", "ref", "source"]),
            keywords: KeywordConfig::default(),
        }
    }
}

impl Settings {
    /// Layered load. A missing config file is fine; a malformed one is not.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// `env` replaces the process environment when given.
    fn load_with_env(
        config_path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();
        let path = config_path.unwrap_or_else(|| Path::new("jobs.toml"));
        builder = builder.add_source(
            config::File::from(path.to_path_buf())
                .format(config::FileFormat::Toml)
                .required(config_path.is_some()),
        );
        builder = builder.add_source(
            config::Environment::with_prefix("JOBS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sources")
                .with_list_parse_key("tracking_params")
                .try_parsing(true)
                .source(env),
        );
        let settings = builder
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize::<Settings>()
            .context("Failed to parse configuration")?;
        Ok(settings)
    }
}

/// Keyword lists for classification. Every entry is a regex fragment,
/// matched case-insensitively; sets are evaluated in a fixed order by the
/// classifier, not in the order they appear here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub remote: Vec<String>,
    pub freelance: Vec<String>,
    pub fulltime: Vec<String>,
    pub hybrid: Vec<String>,
    /// Wider set behind the `is_remote` flag.
    pub remote_signals: Vec<String>,
    /// Substrings of the `source` field that mark a freelance marketplace.
    pub freelance_platforms: Vec<String>,
    pub egypt: Vec<String>,
    pub uae: Vec<String>,
    pub europe: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        let remote = strings(&[
            r"\bremote\b",
            r"\bwork\s*from\s*home\b",
            r"\bwfh\b",
            r"\bdistributed\b",
            r"\banywhere\b",
            r"\bfully\s*remote\b",
            r"\b100%\s*remote\b",
        ]);
        let mut remote_signals = remote.clone();
        remote_signals.extend(strings(&[
            r"\bremote[-\s]first\b",
            r"\bremote[-\s]friendly\b",
            r"\bworldwide\b",
            r"\btelecommute\b",
            r"\btelework\b",
            r"\blocation[-\s]independent\b",
        ]));

        Self {
            remote,
            freelance: strings(&[
                r"\bfreelance\b",
                r"\bfreelancer\b",
                r"\bcontract\b",
                r"\bcontractor\b",
                r"\bproject[-\s]based\b",
                r"\bgig\b",
                r"\bhourly\b",
                r"\bper\s*project\b",
                r"\bshort[-\s]term\b",
            ]),
            fulltime: strings(&[
                r"\bfull[-\s]?time\b",
                r"\bpermanent\b",
                r"\bemployee\b",
                r"\bsalaried\b",
                r"\bfte\b",
            ]),
            hybrid: strings(&[
                r"\bhybrid\b",
                r"\bflexible\s*(?:work|location)\b",
                r"\b\d+\s*days?\s*(?:in\s*)?office\b",
                r"\bpartially\s*remote\b",
            ]),
            remote_signals,
            freelance_platforms: strings(&[
                "upwork",
                "fiverr",
                "mostaql",
                "khamsat",
                "toptal",
                "freelancer",
                "peopleperhour",
                "guru",
                "99designs",
            ]),
            egypt: strings(&[
                r"\begypt\b",
                r"\bcairo\b",
                r"\balexandria\b",
                r"\bgiza\b",
                r"\bmaadi\b",
                r"\bnasr\s*city\b",
                r"\bnew\s*cairo\b",
                r"\b6th\s*of\s*october\b",
            ]),
            uae: strings(&[
                r"\buae\b",
                r"\bdubai\b",
                r"\babu\s*dhabi\b",
                r"\bsharjah\b",
                r"\bajman\b",
                r"\bunited\s*arab\s*emirates\b",
                r"\bemirati\b",
            ]),
            europe: strings(&[
                r"\beurope\b",
                r"\beu\b",
                r"\bgermany\b",
                r"\buk\b",
                r"\bunited\s*kingdom\b",
                r"\bfrance\b",
                r"\bnetherlands\b",
                r"\bspain\b",
                r"\bitaly\b",
                r"\bberlin\b",
                r"\blondon\b",
                r"\bparis\b",
                r"\bamsterdam\b",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_set() {
        let k = KeywordConfig::default();
        for set in [
            &k.remote,
            &k.freelance,
            &k.fulltime,
            &k.hybrid,
            &k.remote_signals,
            &k.egypt,
            &k.uae,
            &k.europe,
        ] {
            assert!(!set.is_empty());
        }
        assert!(k.remote_signals.len() > k.remote.len());
        assert!(k.remote.iter().all(|p| k.remote_signals.contains(p)));
    }

    #[test]
    fn missing_default_file_is_not_an_error() {
        let settings = Settings::load(None).unwrap();
        assert!(!settings.keywords.freelance_platforms.is_empty());
        assert!(settings.tracking_params.contains(&"utm_*".to_string()));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("tests/fixtures/nope.toml"))).is_err());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let settings = Settings::load(Some(Path::new("tests/fixtures/jobs.toml"))).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("out/jobs"));
        assert_eq!(settings.workers, Some(2));
        assert_eq!(settings.keywords.egypt, vec![r"\bcairo\b".to_string()]);
        // untouched sets keep their defaults
        assert!(!settings.keywords.uae.is_empty());
    }

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn environment_overrides_file() {
        let settings = Settings::load_with_env(
            Some(Path::new("tests/fixtures/jobs.toml")),
            env(&[
                ("JOBS_OUTPUT_DIR", "/tmp/jobs_out"),
                ("JOBS_SOURCES", "feeds/a.json,feeds/b"),
                ("JOBS_WORKERS", "3"),
                ("JOBS_TRACKING_PARAMS", "utm_*,fbclid"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/jobs_out"));
        assert_eq!(
            settings.sources,
            vec![PathBuf::from("feeds/a.json"), PathBuf::from("feeds/b")]
        );
        assert_eq!(settings.workers, Some(3));
        assert_eq!(settings.tracking_params, vec!["utm_*", "fbclid"]);
        // file value survives where env is silent
        assert_eq!(settings.keywords.egypt, vec![r"\bcairo\b".to_string()]);
    }
}

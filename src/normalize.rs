//! Raw producer maps in, fixed-shape postings out.

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};
use url::{form_urlencoded, Url};

use crate::error::RejectReason;
use crate::reader::RawPosting;

/// Link-like fields, in the order they are tried for the identity URL.
pub const LINK_ALIASES: [&str; 5] = ["link", "url", "tweet_link", "reddit_link", "telegram_link"];

/// Keys the pipeline assigns itself; producer values for them are dropped.
const ASSIGNED_KEYS: [&str; 3] = ["category", "region", "is_remote"];

/// A posting after the normalizer boundary. String fields are trimmed and
/// never absent; `url` is the canonical identity key and never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    /// The producer's free-text type hint. Classifier input only.
    #[serde(rename = "type")]
    pub raw_type: String,
    pub url: String,
    /// The link as the producer wrote it (trimmed).
    pub link: String,
    pub source: String,
    pub description: String,
    /// Everything else the producer sent, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalPosting {
    /// Minimal posting, mostly for tests and ad-hoc classification.
    pub fn with_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: String::new(),
            company: String::new(),
            location: String::new(),
            raw_type: String::new(),
            link: url.clone(),
            url,
            source: String::new(),
            description: String::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum TrackingParam {
    Exact(String),
    Prefix(String),
}

impl TrackingParam {
    fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim().to_lowercase();
        match pattern.strip_suffix('*') {
            Some(prefix) => TrackingParam::Prefix(prefix.to_string()),
            None => TrackingParam::Exact(pattern),
        }
    }

    fn matches(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        match self {
            TrackingParam::Exact(name) => key == *name,
            TrackingParam::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

/// Maps raw records to canonical postings. Stateless apart from the
/// tracking-parameter rules, so one instance is shared by every worker.
#[derive(Debug, Clone)]
pub struct Normalizer {
    tracking: Vec<TrackingParam>,
}

impl Normalizer {
    pub fn new(tracking_params: &[String]) -> Self {
        Self {
            tracking: tracking_params
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| TrackingParam::parse(p))
                .collect(),
        }
    }

    /// `source_name` fills `source` when the record has none.
    pub fn normalize(
        &self,
        mut raw: RawPosting,
        source_name: &str,
    ) -> Result<CanonicalPosting, RejectReason> {
        let link = take_link(&mut raw)?;
        let url = self.canonicalize_url(&link);
        if url.is_empty() {
            return Err(RejectReason::EmptyUrl);
        }

        let title = take_text(&mut raw, "title");
        let company = take_text(&mut raw, "company");
        let location = take_text(&mut raw, "location");
        let raw_type = take_text(&mut raw, "type");
        let description = take_text(&mut raw, "description");
        let mut source = take_text(&mut raw, "source");
        if source.is_empty() {
            source = source_name.to_string();
        }
        for key in ASSIGNED_KEYS {
            raw.remove(key);
        }

        Ok(CanonicalPosting {
            title,
            company,
            location,
            raw_type,
            url,
            link,
            source,
            description,
            extra: raw,
        })
    }

    /// Identity form of a link: scheme and host lowercased, tracking
    /// parameters and trailing slashes removed. Idempotent. Links that do
    /// not parse as absolute URLs only get trimmed of trailing slashes.
    pub fn canonicalize_url(&self, link: &str) -> String {
        let trimmed = link.trim();
        let mut url = match Url::parse(trimmed) {
            Ok(u) if u.has_host() => u,
            _ => return trimmed.trim_end_matches('/').to_string(),
        };

        self.strip_tracking(&mut url);
        let path = url.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            let stripped = path.trim_end_matches('/');
            url.set_path(if stripped.is_empty() { "/" } else { stripped });
        }

        let bare_root = url.path() == "/" && url.query().is_none() && url.fragment().is_none();
        let out: String = url.into();
        // The root path always serializes as "/", so drop it textually.
        match out.strip_suffix('/') {
            Some(s) if bare_root => s.to_string(),
            _ => out,
        }
    }

    /// Drops tracking pairs from the raw query. Kept pairs are copied
    /// byte-for-byte; only keys are decoded, for matching.
    fn strip_tracking(&self, url: &mut Url) {
        let Some(query) = url.query() else {
            return;
        };
        let kept = query
            .split('&')
            .filter(|segment| !segment.is_empty())
            .filter(|segment| !self.is_tracking(segment))
            .join("&");
        url.set_query(if kept.is_empty() { None } else { Some(&kept) });
    }

    fn is_tracking(&self, segment: &str) -> bool {
        let raw_key = segment.split('=').next().unwrap_or_default();
        let key: String = form_urlencoded::parse(raw_key.as_bytes())
            .next()
            .map(|(k, _)| k.into_owned())
            .unwrap_or_default();
        self.tracking.iter().any(|t| t.matches(&key))
    }
}

/// First non-empty link alias. `link` and `url` are always removed from the
/// map since the posting carries its own fields of those names, so when a
/// record has both, the producer's `url` is dropped once `link` wins. The
/// other aliases stay as pass-through data.
fn take_link(raw: &mut RawPosting) -> Result<String, RejectReason> {
    let mut present = false;
    let mut chosen: Option<String> = None;
    for alias in LINK_ALIASES {
        let value = if alias == "link" || alias == "url" {
            raw.remove(alias)
        } else {
            raw.get(alias).cloned()
        };
        let Some(text) = value.as_ref().and_then(scalar_text) else {
            continue;
        };
        present = true;
        if chosen.is_none() && !text.is_empty() {
            chosen = Some(text);
        }
    }
    match chosen {
        Some(link) => Ok(link),
        None if present => Err(RejectReason::EmptyUrl),
        None => Err(RejectReason::MissingUrl),
    }
}

fn take_text(raw: &mut RawPosting, key: &str) -> String {
    raw.remove(key)
        .as_ref()
        .and_then(scalar_text)
        .unwrap_or_default()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        compound => Some(compound.to_string()),
    }
}

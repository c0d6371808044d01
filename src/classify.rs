//! Keyword-driven job-type and region tagging.
//!
//! Both tags come from ordered rule lists evaluated first-match-wins, so the
//! tie-break between overlapping signals is the list order and nothing else.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::KeywordConfig;
use crate::error::PipelineError;
use crate::normalize::CanonicalPosting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Remote,
    Freelance,
    FullTime,
    Hybrid,
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Remote,
        Category::Freelance,
        Category::FullTime,
        Category::Hybrid,
        Category::Uncategorized,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Category::Remote => "remote",
            Category::Freelance => "freelance",
            Category::FullTime => "fulltime",
            Category::Hybrid => "hybrid",
            Category::Uncategorized => "uncategorized",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Remote => "🏠",
            Category::Freelance => "💼",
            Category::FullTime => "🏢",
            Category::Hybrid => "🔄",
            Category::Uncategorized => "❓",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Egypt,
    Uae,
    Europe,
    Global,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Egypt, Region::Uae, Region::Europe, Region::Global];

    pub fn slug(&self) -> &'static str {
        match self {
            Region::Egypt => "egypt",
            Region::Uae => "uae",
            Region::Europe => "europe",
            Region::Global => "global",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Region::Egypt => "🇪🇬",
            Region::Uae => "🇦🇪",
            Region::Europe => "🇪🇺",
            Region::Global => "🌍",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Tags assigned to one posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub region: Region,
    pub is_remote: bool,
}

/// A posting together with its tags; the unit written to every output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedPosting {
    #[serde(flatten)]
    pub posting: CanonicalPosting,
    #[serde(flatten)]
    pub tags: Classification,
}

/// One `(predicate, label)` entry. The predicate is a keyword alternation,
/// optionally OR-ed with a list of source-name substrings.
#[derive(Debug, Clone)]
pub struct Rule<L> {
    pub label: L,
    keywords: Option<Regex>,
    platforms: Vec<String>,
}

impl<L: Copy> Rule<L> {
    fn new(label: L, set: &str, patterns: &[String]) -> Result<Self, PipelineError> {
        Ok(Self {
            label,
            keywords: compile_set(set, patterns)?,
            platforms: Vec::new(),
        })
    }

    fn with_platforms(mut self, platforms: &[String]) -> Self {
        self.platforms = platforms
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// `source` must already be lowercased.
    pub fn matches(&self, text: &str, source: &str) -> bool {
        self.keywords.as_ref().is_some_and(|re| re.is_match(text))
            || self.platforms.iter().any(|p| source.contains(p.as_str()))
    }
}

/// Compiled, immutable classifier. Built once from [`KeywordConfig`] and
/// shared by reference; `classify` is pure and total.
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: Vec<Rule<Category>>,
    regions: Vec<Rule<Region>>,
    remote_signals: Option<Regex>,
}

impl Classifier {
    pub fn new(keywords: &KeywordConfig) -> Result<Self, PipelineError> {
        let categories = vec![
            Rule::new(Category::Remote, "remote", &keywords.remote)?,
            Rule::new(Category::Freelance, "freelance", &keywords.freelance)?
                .with_platforms(&keywords.freelance_platforms),
            Rule::new(Category::FullTime, "fulltime", &keywords.fulltime)?,
            Rule::new(Category::Hybrid, "hybrid", &keywords.hybrid)?,
        ];
        let regions = vec![
            Rule::new(Region::Egypt, "egypt", &keywords.egypt)?,
            Rule::new(Region::Uae, "uae", &keywords.uae)?,
            Rule::new(Region::Europe, "europe", &keywords.europe)?,
        ];
        Ok(Self {
            categories,
            regions,
            remote_signals: compile_set("remote_signals", &keywords.remote_signals)?,
        })
    }

    /// Category labels in evaluation order.
    pub fn category_order(&self) -> Vec<Category> {
        self.categories.iter().map(|r| r.label).collect()
    }

    /// Region labels in evaluation order.
    pub fn region_order(&self) -> Vec<Region> {
        self.regions.iter().map(|r| r.label).collect()
    }

    pub fn classify(&self, posting: &CanonicalPosting) -> Classification {
        let text = match_text(posting);
        let source = posting.source.to_lowercase();

        let category = first_match(&self.categories, &text, &source).unwrap_or(Category::Uncategorized);

        // Location only feeds region matching; an empty one defers to the text.
        let region_text = if posting.location.is_empty() {
            text.as_str()
        } else {
            posting.location.as_str()
        };
        let region = first_match(&self.regions, region_text, "").unwrap_or(Region::Global);

        let is_remote = self.remote_signals.as_ref().is_some_and(|re| {
            re.is_match(&text) || re.is_match(&posting.location)
        });

        Classification {
            category,
            region,
            is_remote,
        }
    }

    pub fn tag(&self, posting: CanonicalPosting) -> ClassifiedPosting {
        let tags = self.classify(&posting);
        ClassifiedPosting { posting, tags }
    }
}

fn first_match<L: Copy>(rules: &[Rule<L>], text: &str, source: &str) -> Option<L> {
    rules
        .iter()
        .find(|rule| rule.matches(text, source))
        .map(|rule| rule.label)
}

/// Title, type hint and description, in that order.
fn match_text(posting: &CanonicalPosting) -> String {
    [
        posting.title.as_str(),
        posting.raw_type.as_str(),
        posting.description.as_str(),
    ]
    .iter()
    .filter(|s| !s.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
}

fn compile_set(set: &str, patterns: &[String]) -> Result<Option<Regex>, PipelineError> {
    let parts: Vec<String> = patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("(?:{p})"))
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&parts.join("|"))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| PipelineError::Config(format!("invalid '{set}' keyword pattern: {e}")))
}

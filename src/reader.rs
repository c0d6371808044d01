//! Source discovery and tolerant JSON loading of crawler output.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PipelineError;

/// One crawler record as written by the producer: an open string-keyed map.
pub type RawPosting = Map<String, Value>;

/// One crawler output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File stem, used as the origin when a record carries no `source`.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded { repaired: bool },
    Missing,
    Skipped(PipelineError),
}

/// Result of reading one source unit. Never an `Err`: failures are recorded
/// in `status` and yield no records.
#[derive(Debug)]
pub struct SourceLoad {
    pub unit: SourceUnit,
    pub status: LoadStatus,
    pub records: Vec<RawPosting>,
    /// Array elements that were not objects.
    pub non_objects: usize,
}

/// What a byte source parsed into.
#[derive(Debug, Default)]
pub struct ParsedUnit {
    pub records: Vec<RawPosting>,
    pub non_objects: usize,
    pub repaired: bool,
}

/// Expand the declared source list into units, in declaration order.
/// Directories contribute their `*.json` files sorted by name. Paths under
/// `exclude` are skipped so the pipeline never reads its own output.
pub fn discover_sources(entries: &[PathBuf], exclude: &[PathBuf]) -> Vec<SourceUnit> {
    let mut units = Vec::new();
    for entry in entries {
        if entry.is_dir() {
            let mut files: Vec<PathBuf> = match fs::read_dir(entry) {
                Ok(dir) => dir
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file() && is_json_file(p))
                    .collect(),
                Err(e) => {
                    warn!(source = %entry.display(), error = %e, "Cannot list source directory");
                    continue;
                }
            };
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            units.extend(
                files
                    .into_iter()
                    .filter(|p| !is_excluded(p, exclude))
                    .map(SourceUnit::new),
            );
        } else if !is_excluded(entry, exclude) {
            // Missing paths stay in the list; reading reports them as Missing.
            units.push(SourceUnit::new(entry.clone()));
        }
    }
    units
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    exclude.iter().any(|ex| {
        let ex = fs::canonicalize(ex).unwrap_or_else(|_| ex.clone());
        resolved.starts_with(&ex)
    })
}

/// Lazily read every unit in order.
pub fn read_sources(units: &[SourceUnit]) -> impl Iterator<Item = SourceLoad> + '_ {
    units.iter().map(read_source)
}

pub fn read_source(unit: &SourceUnit) -> SourceLoad {
    let path = &unit.path;
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(source = %path.display(), "Source not found, treating as empty");
            return SourceLoad::empty(unit, LoadStatus::Missing);
        }
        Err(e) => {
            let err = PipelineError::SourceUnreadable {
                path: path.clone(),
                reason: e.to_string(),
            };
            warn!(source = %path.display(), error = %err, "Skipping source");
            return SourceLoad::empty(unit, LoadStatus::Skipped(err));
        }
    };

    load_bytes(unit, &bytes)
}

/// Parse an in-memory byte stream as the content of `unit`. Parse failures
/// become `LoadStatus::Skipped`, like on-disk sources.
pub fn load_bytes(unit: &SourceUnit, bytes: &[u8]) -> SourceLoad {
    let path = &unit.path;
    match parse_source_bytes(path, bytes) {
        Ok(parsed) => {
            debug!(
                source = %path.display(),
                records = parsed.records.len(),
                repaired = parsed.repaired,
                "Loaded source"
            );
            SourceLoad {
                unit: unit.clone(),
                status: LoadStatus::Loaded {
                    repaired: parsed.repaired,
                },
                records: parsed.records,
                non_objects: parsed.non_objects,
            }
        }
        Err(err) => {
            warn!(source = %path.display(), error = %err, "Skipping source");
            SourceLoad::empty(unit, LoadStatus::Skipped(err))
        }
    }
}

impl SourceLoad {
    fn empty(unit: &SourceUnit, status: LoadStatus) -> Self {
        Self {
            unit: unit.clone(),
            status,
            records: Vec::new(),
            non_objects: 0,
        }
    }
}

/// Parse one source's bytes. `label` only names the source in errors.
///
/// Expected content is a single JSON array of objects. A lone object is
/// accepted as a one-record unit and blank content as zero records. If the
/// first parse fails and the text shows two arrays written back to back,
/// the concatenated-array recovery runs exactly once.
pub fn parse_source_bytes(label: &Path, bytes: &[u8]) -> Result<ParsedUnit, PipelineError> {
    let text = std::str::from_utf8(bytes).map_err(|e| PipelineError::SourceUnreadable {
        path: label.to_path_buf(),
        reason: format!("invalid UTF-8: {e}"),
    })?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Ok(ParsedUnit::default());
    }

    let malformed = |e: serde_json::Error| PipelineError::MalformedJson {
        path: label.to_path_buf(),
        reason: e.to_string(),
    };

    let (values, repaired) = match serde_json::from_str::<Value>(text) {
        Ok(value) => (top_level_items(value).map_err(malformed)?, false),
        Err(first) if has_adjacent_arrays(text) => {
            debug!(source = %label.display(), error = %first, "Trying concatenated-array recovery");
            (repair_concatenated_arrays(text).map_err(malformed)?, true)
        }
        Err(first) => return Err(malformed(first)),
    };

    let mut parsed = ParsedUnit {
        repaired,
        ..Default::default()
    };
    for value in values {
        match value {
            Value::Object(map) => parsed.records.push(map),
            _ => parsed.non_objects += 1,
        }
    }
    Ok(parsed)
}

fn top_level_items(value: Value) -> Result<Vec<Value>, serde_json::Error> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(vec![Value::Object(map)]),
        other => Err(serde::de::Error::custom(format!(
            "expected an array of objects, found {}",
            json_kind(&other)
        ))),
    }
}

/// `]` followed by `[`, optionally with whitespace between them.
fn has_adjacent_arrays(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\]\s*\[").unwrap());
    re.is_match(text)
}

/// Concatenated-array recovery.
///
/// Naive incremental writers append a fresh `[...]` to an existing file,
/// leaving `[...][...]`. Reads consecutive top-level arrays and joins their
/// elements into one sequence, which is equivalent to inserting the missing
/// separators. Any number of arrays and any whitespace between them is
/// accepted; anything other than arrays at the top level fails the unit.
pub fn repair_concatenated_arrays(text: &str) -> Result<Vec<Value>, serde_json::Error> {
    let mut items = Vec::new();
    for value in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match value? {
            Value::Array(chunk) => items.extend(chunk),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected concatenated arrays, found {}",
                    json_kind(&other)
                )))
            }
        }
    }
    Ok(items)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ParsedUnit, PipelineError> {
        parse_source_bytes(Path::new("test.json"), text.as_bytes())
    }

    fn titles(parsed: &ParsedUnit) -> Vec<&str> {
        parsed
            .records
            .iter()
            .filter_map(|r| r.get("title").and_then(|t| t.as_str()))
            .collect()
    }

    #[test]
    fn plain_array() {
        let parsed = parse(r#"[{"title":"A","link":"u1"}]"#).unwrap();
        assert_eq!(titles(&parsed), vec!["A"]);
        assert!(!parsed.repaired);
    }

    #[test]
    fn two_arrays_back_to_back() {
        let parsed = parse(r#"[{"title":"A","link":"u1"}][{"title":"B","link":"u2"}]"#).unwrap();
        assert_eq!(titles(&parsed), vec!["A", "B"]);
        assert!(parsed.repaired);
    }

    #[test]
    fn three_arrays_with_newlines() {
        let parsed = parse("[{\"title\":\"A\"}]\n[{\"title\":\"B\"}]\n\n[{\"title\":\"C\"}]\n").unwrap();
        assert_eq!(titles(&parsed), vec!["A", "B", "C"]);
    }

    #[test]
    fn empty_array_chunk_between() {
        let parsed = parse(r#"[{"title":"A"}][][{"title":"B"}]"#).unwrap();
        assert_eq!(titles(&parsed), vec!["A", "B"]);
    }

    #[test]
    fn bracket_pair_inside_string_is_not_a_split() {
        let parsed = parse(r#"[{"title":"a ][ b","link":"u"}]"#).unwrap();
        assert_eq!(titles(&parsed), vec!["a ][ b"]);
        assert!(!parsed.repaired);
    }

    #[test]
    fn truncated_unit_is_malformed() {
        let err = parse(r#"[{"title":"A"}][{"title":"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedJson { .. }));
    }

    #[test]
    fn byte_stream_loads_like_a_file() {
        let unit = SourceUnit::new("stream.json");
        let load = load_bytes(&unit, br#"[{"title":"A"}][{"title":"B"}, 7]"#);
        assert!(matches!(load.status, LoadStatus::Loaded { repaired: true }));
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.non_objects, 1);

        let load = load_bytes(&unit, b"{\"title\":");
        assert!(matches!(
            load.status,
            LoadStatus::Skipped(PipelineError::MalformedJson { .. })
        ));
        assert!(load.records.is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse("not json at all").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedJson { .. }));
    }

    #[test]
    fn scalar_top_level_is_malformed() {
        assert!(parse("42").is_err());
    }

    #[test]
    fn blank_content_yields_nothing() {
        let parsed = parse("  \n").unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn single_object_is_one_record() {
        let parsed = parse(r#"{"title":"Solo","url":"https://a.io/1"}"#).unwrap();
        assert_eq!(titles(&parsed), vec!["Solo"]);
    }

    #[test]
    fn non_objects_are_counted() {
        let parsed = parse(r#"[{"title":"A"}, 3, "x", null]"#).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.non_objects, 3);
    }

    #[test]
    fn invalid_utf8_is_unreadable() {
        let err = parse_source_bytes(Path::new("bad.json"), &[b'[', 0xff, b']']).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable { .. }));
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        let load = read_source(&SourceUnit::new("tests/fixtures/does_not_exist.json"));
        assert!(matches!(load.status, LoadStatus::Missing));
        assert!(load.records.is_empty());
    }

    #[test]
    fn fixture_with_concatenated_writes() {
        let load = read_source(&SourceUnit::new("tests/fixtures/by_source/linkedin.json"));
        assert!(matches!(load.status, LoadStatus::Loaded { repaired: true }));
        assert_eq!(load.records.len(), 3);
    }

    #[test]
    fn discovery_sorts_and_filters() {
        let units = discover_sources(&[PathBuf::from("tests/fixtures/by_source")], &[]);
        let names: Vec<String> = units.iter().map(|u| u.name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"linkedin".to_string()));
        assert!(!names.contains(&"notes".to_string()));
    }

    #[test]
    fn discovery_honours_exclusions() {
        let units = discover_sources(
            &[PathBuf::from("tests/fixtures/by_source")],
            &[PathBuf::from("tests/fixtures/by_source/linkedin.json")],
        );
        assert!(units.iter().all(|u| u.name() != "linkedin"));
    }
}

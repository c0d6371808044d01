use std::collections::HashMap;

use crate::normalize::CanonicalPosting;

/// Streaming first-seen-wins fold keyed by canonical URL.
///
/// A later duplicate never replaces the kept record, but it does fill any
/// of the kept record's blank text fields and add pass-through keys the kept
/// record lacks.
#[derive(Debug, Default)]
pub struct Deduplicator {
    index: HashMap<String, usize>,
    kept: Vec<CanonicalPosting>,
    duplicates: usize,
    enriched: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Kept,
    Duplicate { enriched: bool },
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, posting: CanonicalPosting) -> Outcome {
        match self.index.get(&posting.url) {
            Some(&idx) => {
                self.duplicates += 1;
                let enriched = enrich(&mut self.kept[idx], posting);
                if enriched {
                    self.enriched += 1;
                }
                Outcome::Duplicate { enriched }
            }
            None => {
                self.index.insert(posting.url.clone(), self.kept.len());
                self.kept.push(posting);
                Outcome::Kept
            }
        }
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn enriched(&self) -> usize {
        self.enriched
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    /// Unique postings in first-seen order.
    pub fn into_postings(self) -> Vec<CanonicalPosting> {
        self.kept
    }
}

impl Extend<CanonicalPosting> for Deduplicator {
    fn extend<I: IntoIterator<Item = CanonicalPosting>>(&mut self, iter: I) {
        for posting in iter {
            self.push(posting);
        }
    }
}

/// Convenience wrapper over [`Deduplicator`] for an in-memory sequence.
pub fn deduplicate(postings: impl IntoIterator<Item = CanonicalPosting>) -> Vec<CanonicalPosting> {
    let mut dedup = Deduplicator::new();
    dedup.extend(postings);
    dedup.into_postings()
}

fn enrich(kept: &mut CanonicalPosting, later: CanonicalPosting) -> bool {
    let mut changed = false;
    for (slot, value) in [
        (&mut kept.description, later.description),
        (&mut kept.company, later.company),
        (&mut kept.location, later.location),
        (&mut kept.raw_type, later.raw_type),
    ] {
        if slot.is_empty() && !value.is_empty() {
            *slot = value;
            changed = true;
        }
    }
    for (key, value) in later.extra {
        if value.is_null() {
            continue;
        }
        if !kept.extra.contains_key(&key) {
            kept.extra.insert(key, value);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn posting(url: &str, title: &str, description: &str) -> CanonicalPosting {
        let mut p = CanonicalPosting::with_url(url);
        p.title = title.to_string();
        p.description = description.to_string();
        p
    }

    #[test]
    fn first_seen_wins() {
        let out = deduplicate(vec![
            posting("https://x.com/1", "First", "desc one"),
            posting("https://x.com/1", "Second", "desc two"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "First");
        assert_eq!(out[0].description, "desc one");
    }

    #[test]
    fn later_description_fills_blank() {
        let mut dedup = Deduplicator::new();
        assert_eq!(dedup.push(posting("https://x.com/1", "Tweet", "")), Outcome::Kept);
        assert_eq!(
            dedup.push(posting("https://x.com/1", "Full listing", "Long description")),
            Outcome::Duplicate { enriched: true }
        );
        assert_eq!(dedup.duplicates(), 1);
        assert_eq!(dedup.enriched(), 1);
        let out = dedup.into_postings();
        assert_eq!(out[0].title, "Tweet");
        assert_eq!(out[0].description, "Long description");
    }

    #[test]
    fn blank_title_is_not_filled() {
        let mut dedup = Deduplicator::new();
        dedup.push(posting("https://x.com/1", "", ""));
        let mut later = posting("https://x.com/1", "Designer", "");
        later.company = "Acme".into();
        assert_eq!(dedup.push(later), Outcome::Duplicate { enriched: true });
        let out = dedup.into_postings();
        assert_eq!(out[0].title, "");
        assert_eq!(out[0].company, "Acme");
    }

    #[test]
    fn extra_keys_are_added_not_replaced() {
        let mut first = posting("https://x.com/1", "A", "");
        first.extra.insert("salary".into(), json!("10k"));
        let mut second = posting("https://x.com/1", "A", "");
        second.extra.insert("salary".into(), json!("99k"));
        second.extra.insert("date_posted".into(), json!("2024-02-02"));

        let out = deduplicate(vec![first, second]);
        assert_eq!(out[0].extra["salary"], json!("10k"));
        assert_eq!(out[0].extra["date_posted"], json!("2024-02-02"));
    }

    #[test]
    fn identical_duplicate_is_not_enriched() {
        let mut dedup = Deduplicator::new();
        dedup.push(posting("https://x.com/1", "A", "d"));
        assert_eq!(
            dedup.push(posting("https://x.com/1", "A", "d")),
            Outcome::Duplicate { enriched: false }
        );
    }

    #[test]
    fn preserves_first_seen_order() {
        let out = deduplicate(vec![
            posting("https://x.com/b", "b", ""),
            posting("https://x.com/a", "a", ""),
            posting("https://x.com/b", "b2", ""),
            posting("https://x.com/c", "c", ""),
        ]);
        let titles: Vec<&str> = out.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a", "c"]);
    }

    proptest! {
        #[test]
        fn output_urls_are_unique(ids in proptest::collection::vec(0u8..20, 0..60)) {
            let input: Vec<CanonicalPosting> = ids
                .iter()
                .map(|id| posting(&format!("https://x.com/{id}"), "t", ""))
                .collect();
            let n = input.len();
            let out = deduplicate(input);
            prop_assert!(out.len() <= n);
            let urls: HashSet<&str> = out.iter().map(|p| p.url.as_str()).collect();
            prop_assert_eq!(urls.len(), out.len());
            let distinct: HashSet<u8> = ids.into_iter().collect();
            prop_assert_eq!(out.len(), distinct.len());
        }
    }
}

use std::collections::BTreeMap;

use crate::classify::{Category, ClassifiedPosting, Region};

/// The combined dataset plus category and region views over it.
///
/// Views hold positions into `combined`, so every posting lives in exactly
/// one category view and one region view and nothing can be filtered out.
#[derive(Debug, Default)]
pub struct Partitions {
    combined: Vec<ClassifiedPosting>,
    by_category: BTreeMap<Category, Vec<usize>>,
    by_region: BTreeMap<Region, Vec<usize>>,
}

impl Partitions {
    pub fn new(combined: Vec<ClassifiedPosting>) -> Self {
        let mut by_category: BTreeMap<Category, Vec<usize>> =
            Category::ALL.iter().map(|c| (*c, Vec::new())).collect();
        let mut by_region: BTreeMap<Region, Vec<usize>> =
            Region::ALL.iter().map(|r| (*r, Vec::new())).collect();

        for (idx, posting) in combined.iter().enumerate() {
            by_category.entry(posting.tags.category).or_default().push(idx);
            by_region.entry(posting.tags.region).or_default().push(idx);
        }

        Self {
            combined,
            by_category,
            by_region,
        }
    }

    pub fn combined(&self) -> &[ClassifiedPosting] {
        &self.combined
    }

    pub fn len(&self) -> usize {
        self.combined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }

    /// Postings of one category, in combined order.
    pub fn category(&self, category: Category) -> Vec<&ClassifiedPosting> {
        self.view(self.by_category.get(&category))
    }

    /// Postings of one region, in combined order.
    pub fn region(&self, region: Region) -> Vec<&ClassifiedPosting> {
        self.view(self.by_region.get(&region))
    }

    pub fn category_counts(&self) -> Vec<(Category, usize)> {
        self.by_category.iter().map(|(c, v)| (*c, v.len())).collect()
    }

    pub fn region_counts(&self) -> Vec<(Region, usize)> {
        self.by_region.iter().map(|(r, v)| (*r, v.len())).collect()
    }

    pub fn remote_count(&self) -> usize {
        self.combined.iter().filter(|p| p.tags.is_remote).count()
    }

    fn view(&self, positions: Option<&Vec<usize>>) -> Vec<&ClassifiedPosting> {
        positions
            .map(|ids| ids.iter().map(|&i| &self.combined[i]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::normalize::CanonicalPosting;
    use proptest::prelude::*;

    fn tagged(url: &str, category: Category, region: Region) -> ClassifiedPosting {
        ClassifiedPosting {
            posting: CanonicalPosting::with_url(url),
            tags: Classification {
                category,
                region,
                is_remote: category == Category::Remote,
            },
        }
    }

    #[test]
    fn empty_input_has_every_partition() {
        let parts = Partitions::new(Vec::new());
        assert!(parts.is_empty());
        assert_eq!(parts.category_counts().len(), Category::ALL.len());
        assert_eq!(parts.region_counts().len(), Region::ALL.len());
        assert!(parts.category(Category::Hybrid).is_empty());
    }

    #[test]
    fn views_keep_combined_order() {
        let parts = Partitions::new(vec![
            tagged("u1", Category::Remote, Region::Egypt),
            tagged("u2", Category::FullTime, Region::Egypt),
            tagged("u3", Category::Remote, Region::Global),
        ]);
        let remote: Vec<&str> = parts
            .category(Category::Remote)
            .iter()
            .map(|p| p.posting.url.as_str())
            .collect();
        assert_eq!(remote, vec!["u1", "u3"]);
        assert_eq!(parts.region(Region::Egypt).len(), 2);
        assert_eq!(parts.remote_count(), 2);
    }

    fn any_category() -> impl Strategy<Value = Category> {
        proptest::sample::select(Category::ALL.to_vec())
    }

    fn any_region() -> impl Strategy<Value = Region> {
        proptest::sample::select(Region::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn partitions_cover_combined_exactly(
            tags in proptest::collection::vec((any_category(), any_region()), 0..40)
        ) {
            let postings: Vec<ClassifiedPosting> = tags
                .iter()
                .enumerate()
                .map(|(i, (c, r))| tagged(&format!("https://x.com/{i}"), *c, *r))
                .collect();
            let parts = Partitions::new(postings);

            let mut from_categories: Vec<&str> = Category::ALL
                .iter()
                .flat_map(|c| parts.category(*c))
                .map(|p| p.posting.url.as_str())
                .collect();
            let mut from_regions: Vec<&str> = Region::ALL
                .iter()
                .flat_map(|r| parts.region(*r))
                .map(|p| p.posting.url.as_str())
                .collect();
            let mut combined: Vec<&str> = parts.combined().iter().map(|p| p.posting.url.as_str()).collect();
            from_categories.sort();
            from_regions.sort();
            combined.sort();
            prop_assert_eq!(&from_categories, &combined);
            prop_assert_eq!(&from_regions, &combined);
        }
    }
}

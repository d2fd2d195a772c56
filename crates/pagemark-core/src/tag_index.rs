//! Tag index
//!
//! Partitions bookmarks by tag membership. Membership is not exclusive: a
//! bookmark carrying several tags lands in every matching bucket, and only
//! bookmarks matching none of the known tags land in the untagged bucket.

use std::collections::{HashMap, HashSet};

use crate::models::{Bookmark, BookmarkId, Tag, TagId};

/// Bucket key: a tag, or the reserved "no tag" bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKey {
    Tag(TagId),
    Untagged,
}

/// Bookmarks grouped by tag
#[derive(Debug, Default)]
pub struct TagIndex {
    buckets: HashMap<TagKey, Vec<Bookmark>>,
}

impl TagIndex {
    /// Build the index, preserving the input bookmark order in every bucket
    ///
    /// Every tag gets a bucket, possibly empty. The untagged bucket always exists.
    pub fn build(tags: &[Tag], bookmarks: &[Bookmark]) -> Self {
        let mut buckets = HashMap::with_capacity(tags.len() + 1);
        let mut seen: HashSet<BookmarkId> = HashSet::new();

        for tag in tags {
            let matching: Vec<Bookmark> = bookmarks
                .iter()
                .filter(|b| b.has_tag(tag.id))
                .cloned()
                .collect();
            seen.extend(matching.iter().map(|b| b.id));
            buckets.insert(TagKey::Tag(tag.id), matching);
        }

        let untagged = bookmarks
            .iter()
            .filter(|b| !seen.contains(&b.id))
            .cloned()
            .collect();
        buckets.insert(TagKey::Untagged, untagged);

        Self { buckets }
    }

    /// Bookmarks under a key (empty for unknown tags)
    pub fn get(&self, key: TagKey) -> &[Bookmark] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bookmarks carrying the given tag
    pub fn tagged(&self, tag: TagId) -> &[Bookmark] {
        self.get(TagKey::Tag(tag))
    }

    /// Bookmarks matching no tag
    pub fn untagged(&self) -> &[Bookmark] {
        self.get(TagKey::Untagged)
    }

    /// Number of buckets, counting the untagged one
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn bookmark(id: i64, tags: &[i64]) -> Bookmark {
        let mut b = Bookmark::new(BookmarkId(id), Location::Page { page: id as u32 });
        for t in tags {
            b.add_tag(TagId(*t));
        }
        b
    }

    fn ids(bookmarks: &[Bookmark]) -> Vec<i64> {
        bookmarks.iter().map(|b| b.id.0).collect()
    }

    #[test]
    fn test_multi_tag_bookmark_in_every_bucket() {
        let tags = vec![Tag::new(TagId(1), "a"), Tag::new(TagId(2), "b")];
        let bookmarks = vec![bookmark(10, &[1, 2]), bookmark(11, &[2])];

        let index = TagIndex::build(&tags, &bookmarks);
        assert_eq!(ids(index.tagged(TagId(1))), vec![10]);
        assert_eq!(ids(index.tagged(TagId(2))), vec![10, 11]);
        assert!(index.untagged().is_empty());
    }

    #[test]
    fn test_untagged_bucket() {
        let tags = vec![Tag::new(TagId(1), "a")];
        let bookmarks = vec![bookmark(1, &[]), bookmark(2, &[1]), bookmark(3, &[])];

        let index = TagIndex::build(&tags, &bookmarks);
        assert_eq!(ids(index.untagged()), vec![1, 3]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_unknown_tag_ids_count_as_untagged() {
        // Tag 9 is not in the tag list, so the bookmark matches nothing
        let tags = vec![Tag::new(TagId(1), "a")];
        let bookmarks = vec![bookmark(1, &[9])];

        let index = TagIndex::build(&tags, &bookmarks);
        assert_eq!(ids(index.untagged()), vec![1]);
    }

    #[test]
    fn test_input_order_preserved() {
        let tags = vec![Tag::new(TagId(1), "a")];
        let bookmarks = vec![bookmark(5, &[1]), bookmark(2, &[1]), bookmark(9, &[1])];

        let index = TagIndex::build(&tags, &bookmarks);
        assert_eq!(ids(index.tagged(TagId(1))), vec![5, 2, 9]);
    }

    #[test]
    fn test_empty_tag_has_empty_bucket() {
        let tags = vec![Tag::new(TagId(1), "a")];
        let index = TagIndex::build(&tags, &[]);
        assert!(index.tagged(TagId(1)).is_empty());
        assert!(index.tagged(TagId(42)).is_empty());
    }
}

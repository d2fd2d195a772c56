//! Bookmark command handlers

use anyhow::{bail, Context, Result};

use pagemark_core::{Config, LocalStore, Location, TagId};

use crate::output::Output;
use crate::session::open_store;

/// Bookmark a page
pub fn add_page(config: &Config, page: u32, tags: Vec<String>, output: &Output) -> Result<()> {
    add(config, Location::Page { page }, tags, output)
}

/// Bookmark a verse
pub fn add_verse(
    config: &Config,
    sura: u32,
    ayah: u32,
    page: u32,
    tags: Vec<String>,
    output: &Output,
) -> Result<()> {
    add(config, Location::Verse { page, sura, ayah }, tags, output)
}

fn add(config: &Config, location: Location, tags: Vec<String>, output: &Output) -> Result<()> {
    let pages = config.page_range();
    if !pages.contains(i64::from(location.page())) {
        bail!(
            "Page {} is out of range ({}-{})",
            location.page(),
            pages.first,
            pages.last
        );
    }

    let store = open_store(config)?;
    let tag_ids = resolve_tags(&store, &tags)?;
    let bookmark = store
        .add_bookmark(location, &tag_ids)
        .context("Failed to add bookmark")?;

    output.success(&format!("Added bookmark: {}", bookmark.id));
    output.print_bookmark(&bookmark);
    Ok(())
}

/// Look up tags by name
pub fn resolve_tags(store: &LocalStore, names: &[String]) -> Result<Vec<TagId>> {
    let tags = store.tags()?;
    names
        .iter()
        .map(|name| match tags.iter().find(|t| &t.name == name) {
            Some(tag) => Ok(tag.id),
            None => bail!("Unknown tag '{}'. Create it with `pagemark tag add`", name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tags() {
        let store = LocalStore::new();
        let dua = store.add_tag("dua").unwrap();

        assert_eq!(resolve_tags(&store, &["dua".to_string()]).unwrap(), vec![dua.id]);
        assert!(resolve_tags(&store, &[]).unwrap().is_empty());

        let err = resolve_tags(&store, &["missing".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Unknown tag 'missing'"));
    }
}

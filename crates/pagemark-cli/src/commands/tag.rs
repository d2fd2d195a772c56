//! Tag command handlers

use anyhow::{Context, Result};

use pagemark_core::{BookmarkId, Config, TagIndex};

use crate::commands::bookmark::resolve_tags;
use crate::output::Output;
use crate::session::open_store;

/// List all tags with usage counts
pub fn list(config: &Config, output: &Output) -> Result<()> {
    let store = open_store(config)?;
    let tags = store.tags()?;
    let bookmarks = store.bookmarks()?;

    let index = TagIndex::build(&tags, &bookmarks);
    let counted: Vec<_> = tags
        .into_iter()
        .map(|tag| {
            let count = index.tagged(tag.id).len();
            (tag, count)
        })
        .collect();

    output.print_tags(&counted);
    Ok(())
}

/// Create a tag
pub fn add(config: &Config, name: String, output: &Output) -> Result<()> {
    let store = open_store(config)?;
    let tag = store.add_tag(name).context("Failed to create tag")?;
    output.success(&format!("Created tag: {}", tag.name));
    Ok(())
}

/// Tag an existing bookmark
pub fn apply(config: &Config, bookmark: i64, tag: String, output: &Output) -> Result<()> {
    let store = open_store(config)?;
    let ids = resolve_tags(&store, &[tag.clone()])?;
    for id in ids {
        store
            .tag_bookmark(BookmarkId(bookmark), id)
            .context("Failed to tag bookmark")?;
    }
    output.success(&format!("Tagged bookmark {} with {}", bookmark, tag));
    Ok(())
}

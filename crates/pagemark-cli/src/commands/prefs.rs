//! Preference command handlers

use anyhow::{Context, Result};

use pagemark_core::{Config, SortOrder};

use crate::output::Output;
use crate::session::{open_settings, Session};

/// Change the sort order and show the re-sorted list
pub async fn sort(config: &Config, order: SortOrder, output: &Output) -> Result<()> {
    let mut session = Session::open(config).await?;
    session.next_view().await?;

    session.handle.set_sort_order(order).await?;
    let (view, _) = session.next_view().await?;
    let settings = session.handle.settings().await?;

    output.success(&format!("Sorting by {}", order));
    output.print_view(&view, &settings);
    session.close().await
}

/// Toggle grouping by tag and show the regrouped list
pub async fn toggle_group(config: &Config, output: &Output) -> Result<()> {
    let mut session = Session::open(config).await?;
    session.next_view().await?;

    let grouped = session.handle.toggle_group_by_tags().await?;
    let (view, _) = session.next_view().await?;
    let settings = session.handle.settings().await?;

    output.success(if grouped {
        "Grouping by tag"
    } else {
        "Grouping by kind"
    });
    output.print_view(&view, &settings);
    session.close().await
}

/// Set or clear the last-read page
pub fn last_page(config: &Config, page: Option<i64>, output: &Output) -> Result<()> {
    let settings = open_settings(config)?;
    settings
        .set_last_page(page)
        .context("Failed to save last page")?;

    match page {
        Some(page) => output.success(&format!("Last page set to {}", page)),
        None => output.success("Last page cleared"),
    }
    Ok(())
}

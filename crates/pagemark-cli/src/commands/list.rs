//! Bookmark list command handlers

use anyhow::{bail, Result};

use pagemark_core::{classify_selection, Config, Row, View, ViewSource};

use crate::output::Output;
use crate::session::Session;

/// Show the bookmark list
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let mut session = Session::open(config).await?;
    let (view, _) = session.next_view().await?;
    let settings = session.handle.settings().await?;
    output.print_view(&view, &settings);
    session.close().await
}

/// Delete rows after the configured delay; Ctrl-C during the delay undoes it
pub async fn delete(
    config: &Config,
    numbers: Vec<usize>,
    dry_run: bool,
    output: &Output,
) -> Result<()> {
    let mut session = Session::open(config).await?;
    let (view, _) = session.next_view().await?;
    let settings = session.handle.settings().await?;

    let selected = select_rows(&view, &numbers)?;
    if !classify_selection(&selected).any_selection {
        bail!("Nothing to delete: select bookmark or tag rows");
    }

    if dry_run {
        let predicted = session
            .handle
            .predict_view_after_deletion(selected)
            .await?
            .unwrap_or_default();
        output.print_view(&predicted, &settings);
        return session.close().await;
    }

    let count = selected.len();
    let handle = session.handle.clone();
    handle.schedule_deletion(selected).await?;

    let (predicted, _) = session.next_view().await?;
    output.print_view(&predicted, &settings);
    output.message(&format!(
        "\nDeleting in {:.1}s, press Ctrl-C to undo",
        config.deletion_delay().as_secs_f64()
    ));

    tokio::select! {
        committed = session.view_from(ViewSource::Committed) => {
            committed?;
            output.success(&format!("Deleted {} row(s)", count));
        }
        _ = tokio::signal::ctrl_c() => {
            if handle.cancel_deletion().await? {
                output.message("Deletion cancelled");
            }
        }
    }

    session.close().await
}

/// Rows for 1-based row numbers, as printed by `list`
fn select_rows(view: &View, numbers: &[usize]) -> Result<Vec<Row>> {
    numbers
        .iter()
        .map(|n| match n.checked_sub(1).and_then(|i| view.rows.get(i)) {
            Some(row) => Ok(row.clone()),
            None => bail!("No row {} (the list has {} rows)", n, view.rows.len()),
        })
        .collect()
}

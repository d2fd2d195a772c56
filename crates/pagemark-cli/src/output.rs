//! Printing views, tags and bookmarks as text, JSON (`--json`) or bare ids
//! (`--quiet`)

use std::collections::BTreeMap;

use pagemark_core::{Bookmark, Location, Row, Tag, TagId, View, ViewSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    /// Ids and names only, for scripts
    Quiet,
}

impl OutputFormat {
    /// `--quiet` wins over `--json`
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the bookmark list with row numbers
    pub fn print_view(&self, view: &View, settings: &ViewSettings) {
        match self.format {
            OutputFormat::Human => {
                if view.is_empty() {
                    println!("No bookmarks yet.");
                    return;
                }
                let inline_tags = settings.should_show_inline_tags();
                for (i, row) in view.rows.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, row_label(row, &view.tags, inline_tags));
                }
            }
            OutputFormat::Json => {
                println!("{}", to_json(view));
            }
            OutputFormat::Quiet => {
                for row in &view.rows {
                    if let Row::Bookmark { bookmark, .. } = row {
                        println!("{}", bookmark.id);
                    }
                }
            }
        }
    }

    /// Print tags with the number of bookmarks carrying each
    pub fn print_tags(&self, tags: &[(Tag, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags yet.");
                    return;
                }
                for (tag, count) in tags {
                    println!("{} ({})", tag.name, count);
                }
                println!("\n{} tags", tags.len());
            }
            OutputFormat::Json => {
                let counted: Vec<_> = tags
                    .iter()
                    .map(|(tag, count)| {
                        serde_json::json!({"id": tag.id, "name": tag.name, "count": count})
                    })
                    .collect();
                println!("{}", to_json(&counted));
            }
            OutputFormat::Quiet => {
                for (tag, _) in tags {
                    println!("{}", tag.name);
                }
            }
        }
    }

    /// Print a single bookmark
    pub fn print_bookmark(&self, bookmark: &Bookmark) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", bookmark.id);
                println!("Location: {}", location_label(&bookmark.location));
                println!("Added:    {}", bookmark.added_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => {
                println!("{}", to_json(bookmark));
            }
            OutputFormat::Quiet => {
                println!("{}", bookmark.id);
            }
        }
    }

    /// Confirmation after a change; silent in quiet mode
    pub fn success(&self, text: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", text),
            OutputFormat::Json => println!("{}", serde_json::json!({"ok": true, "message": text})),
            OutputFormat::Quiet => {}
        }
    }

    pub fn message(&self, text: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", text),
            OutputFormat::Json => println!("{}", serde_json::json!({ "message": text })),
            OutputFormat::Quiet => {}
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// One line of the bookmark list
fn row_label(row: &Row, tags: &BTreeMap<TagId, Tag>, inline_tags: bool) -> String {
    match row {
        Row::TagHeader { tag } => format!("[{}]", tag.name),
        Row::UntaggedHeader => "[Untagged]".to_string(),
        Row::PageBookmarksHeader => "── Pages ──".to_string(),
        Row::VerseBookmarksHeader => "── Verses ──".to_string(),
        Row::CurrentPageHeader => "── Continue reading ──".to_string(),
        Row::CurrentPage { page } => format!("Page {}", page),
        Row::Bookmark { bookmark, .. } => {
            let mut label = location_label(&bookmark.location);
            if let Some(ref text) = bookmark.text {
                label.push_str(&format!(" - {}", truncate(text, 50)));
            }
            if inline_tags && !bookmark.tags.is_empty() {
                let names: Vec<&str> = bookmark
                    .tags
                    .iter()
                    .filter_map(|id| tags.get(id).map(|t| t.name.as_str()))
                    .collect();
                label.push_str(&format!(" ({})", names.join(", ")));
            }
            label
        }
    }
}

fn location_label(location: &Location) -> String {
    match location {
        Location::Page { page } => format!("Page {}", page),
        Location::Verse { page, sura, ayah } => format!("{}:{} (page {})", sura, ayah, page),
    }
}

/// Cut `text` to at most `max` characters, ending in "..." when cut
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    kept + "..."
}

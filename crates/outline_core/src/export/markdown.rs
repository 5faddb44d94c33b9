//! Markdown serializer.
//!
//! One line per item at four spaces per depth. Short notes are appended
//! inline in italics; long notes follow as block-quoted paragraphs one
//! level deeper.

use super::markup::{self, spans_to_markdown};
use super::{document_order, item_label, joined_short_notes, ExportArtifact, ExportFormat};
use crate::model::item::{Item, ListType};
use crate::model::project::Project;
use log::info;
use std::fmt::Write;

const INDENT_UNIT: &str = "    ";

/// Renders `project` as a Markdown document.
pub fn export_markdown(project: &Project) -> ExportArtifact {
    let text = render_markdown(project);
    info!(
        "event=export_markdown module=export status=ok project_id={} bytes={}",
        project.id,
        text.len()
    );
    ExportArtifact::new(&project.name, ExportFormat::Markdown, text.into_bytes())
}

/// Renders `project` to Markdown text.
pub fn render_markdown(project: &Project) -> String {
    let mut out = String::new();
    let _ = write!(out, "# {}\n\n", project.name);

    for entry in document_order(project) {
        let indent = INDENT_UNIT.repeat(entry.depth);
        out.push_str(&indent);
        match entry.list_type {
            ListType::Ordered => {
                let _ = write!(out, "{}. ", entry.position + 1);
            }
            ListType::Unordered => out.push_str("- "),
        }
        out.push_str(item_label(entry.item));
        if let Some(notes) = joined_short_notes(entry.item) {
            let _ = write!(out, " _({notes})_");
        }
        out.push('\n');
        push_long_notes(&mut out, entry.item, entry.depth + 1);
    }
    out
}

fn push_long_notes(out: &mut String, item: &Item, depth: usize) {
    let indent = INDENT_UNIT.repeat(depth);
    for note in &item.long_notes {
        if note.text.trim().is_empty() {
            continue;
        }
        let blocks = markup::parse(&note.text);
        if blocks.is_empty() {
            continue;
        }
        out.push('\n');
        for (index, block) in blocks.iter().enumerate() {
            if index > 0 {
                let _ = writeln!(out, "{indent}>");
            }
            for line in spans_to_markdown(block.spans()).split('\n') {
                let _ = writeln!(out, "{indent}> {line}");
            }
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{Note, NoteKind};
    use crate::model::project::ProjectSettings;
    use crate::outline::tree::insert_child;

    fn project_with(lists: Vec<Item>, root_list_type: ListType) -> Project {
        let mut project = Project::new("Plan", ProjectSettings::default());
        project.root_list_type = root_list_type;
        project.lists = lists;
        project
    }

    #[test]
    fn mixed_levels_use_their_parent_list_type() {
        let mut grandchild_owner = Item::new("child", None, ListType::Ordered);
        insert_child(&mut grandchild_owner, Item::new("grandchild", None, ListType::Ordered));
        let mut root = Item::new("root", None, ListType::Unordered);
        insert_child(&mut root, grandchild_owner);

        let text = render_markdown(&project_with(vec![root], ListType::Ordered));
        assert_eq!(
            text,
            "# Plan\n\n1. root\n    - child\n        1. grandchild\n"
        );
    }

    #[test]
    fn ordered_markers_count_within_each_sibling_list() {
        let lists = vec![
            Item::new("a", None, ListType::Ordered),
            Item::new("", None, ListType::Ordered),
            Item::new("c", None, ListType::Ordered),
        ];
        let text = render_markdown(&project_with(lists, ListType::Ordered));
        assert!(text.contains("1. a\n2. Untitled\n3. c\n"));
    }

    #[test]
    fn short_notes_are_inline_and_long_notes_are_quoted_one_level_deeper() {
        let mut item = Item::new("task", None, ListType::Ordered);
        item.short_notes.push(Note::new(NoteKind::Short, "due friday"));
        item.short_notes.push(Note::new(NoteKind::Short, "owner"));
        item.long_notes.push(Note::new(
            NoteKind::Long,
            "<p>Some <strong>bold</strong> and <em>soft</em><br>text</p><blockquote>cited</blockquote>",
        ));
        item.long_notes.push(Note::new(NoteKind::Long, "   "));

        let text = render_markdown(&project_with(vec![item], ListType::Unordered));
        assert_eq!(
            text,
            "# Plan\n\n- task _(due friday, owner)_\n\n    > Some **bold** and *soft*\n    > text\n    >\n    > cited\n\n"
        );
    }

    #[test]
    fn artifact_name_is_sanitized() {
        let mut project = project_with(Vec::new(), ListType::Ordered);
        project.name = "Q3 roadmap!".to_string();
        let artifact = export_markdown(&project);
        assert_eq!(artifact.file_name, "Q3_roadmap_.md");
        assert_eq!(artifact.format, ExportFormat::Markdown);
        assert_eq!(artifact.bytes, b"# Q3 roadmap!\n\n".to_vec());
    }
}

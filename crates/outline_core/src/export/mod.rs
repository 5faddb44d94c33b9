//! Export pipeline: Markdown, DOCX and JSON serializers.
//!
//! # Responsibility
//! - Turn one project into a deliverable artifact (bytes + file name).
//! - Derive list markers purely from tree shape and each node's
//!   `children_type`.
//!
//! # Invariants
//! - Serializers only read the project; callers pass a snapshot copy.
//! - Children are emitted in array order; a node's `children_type` governs
//!   the markers of its children, the project's `root_list_type` governs
//!   the roots.
//! - Ordered levels cycle decimal, lower-letter, lower-roman; bullet levels
//!   cycle three glyphs. Both repeat every three levels.

pub mod docx;
pub mod json;
pub mod markdown;
pub mod markup;

use crate::model::item::{Item, ListType};
use crate::model::project::Project;
use std::error::Error;
use std::fmt::{Display, Formatter};

const BULLET_GLYPHS: [&str; 3] = ["\u{2022}", "\u{25E6}", "\u{25AA}"];
const ORDERED_FORMATS: [NumberFormat; 3] = [
    NumberFormat::Decimal,
    NumberFormat::LowerLetter,
    NumberFormat::LowerRoman,
];
const FALLBACK_FILE_STEM: &str = "outline";

/// Target format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Docx,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Docx => "docx",
            Self::Json => "json",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Json => "application/json",
        }
    }
}

/// Finished export, ready for the file-delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    fn new(file_stem: &str, format: ExportFormat, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("{}.{}", sanitize_file_stem(file_stem), format.extension()),
            format,
            bytes,
        }
    }
}

/// Errors raised while generating an artifact.
#[derive(Debug)]
pub enum ExportError {
    /// XML part could not be written.
    Xml(quick_xml::Error),
    /// Document package could not be assembled.
    Package(zip::result::ZipError),
    /// In-memory write failed.
    Io(std::io::Error),
    /// JSON archive could not be encoded.
    Json(serde_json::Error),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(err) => write!(f, "failed to write document xml: {err}"),
            Self::Package(err) => write!(f, "failed to package document: {err}"),
            Self::Io(err) => write!(f, "failed to write export buffer: {err}"),
            Self::Json(err) => write!(f, "failed to encode json archive: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(err) => Some(err),
            Self::Package(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<quick_xml::Error> for ExportError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Xml(value)
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Package(value)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Exports `project` in the requested format.
pub fn export_project(project: &Project, format: ExportFormat) -> Result<ExportArtifact, ExportError> {
    match format {
        ExportFormat::Markdown => Ok(markdown::export_markdown(project)),
        ExportFormat::Docx => docx::export_docx(project),
        ExportFormat::Json => json::export_project_json(project),
    }
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if sanitized.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        sanitized
    }
}

/// Marker numbering format of one list level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Bullet,
    Decimal,
    LowerLetter,
    LowerRoman,
}

impl NumberFormat {
    /// Numbering format for an ordered list at `depth`.
    pub fn ordered_at(depth: usize) -> Self {
        ORDERED_FORMATS[depth % ORDERED_FORMATS.len()]
    }

    /// WordprocessingML `w:numFmt` value.
    pub fn word_name(self) -> &'static str {
        match self {
            Self::Bullet => "bullet",
            Self::Decimal => "decimal",
            Self::LowerLetter => "lowerLetter",
            Self::LowerRoman => "lowerRoman",
        }
    }
}

/// Bullet glyph for an unordered list at `depth`.
pub fn bullet_glyph(depth: usize) -> &'static str {
    BULLET_GLYPHS[depth % BULLET_GLYPHS.len()]
}

/// One item in document order together with its list context.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry<'a> {
    pub item: &'a Item,
    /// Nesting level; roots are 0.
    pub depth: usize,
    /// Zero-based index within the sibling list.
    pub position: usize,
    /// Marker style of the sibling list this item belongs to.
    pub list_type: ListType,
    /// Owner of the sibling list; `None` for roots.
    pub parent: Option<&'a Item>,
}

/// Flattens the forest into pre-order entries without recursion.
pub(crate) fn document_order(project: &Project) -> Vec<Entry<'_>> {
    let mut entries = Vec::new();
    let mut stack: Vec<Entry<'_>> = project
        .lists
        .iter()
        .enumerate()
        .rev()
        .map(|(position, item)| Entry {
            item,
            depth: 0,
            position,
            list_type: project.root_list_type,
            parent: None,
        })
        .collect();

    while let Some(entry) = stack.pop() {
        let item = entry.item;
        stack.extend(item.children.iter().enumerate().rev().map(|(position, child)| Entry {
            item: child,
            depth: entry.depth + 1,
            position,
            list_type: item.children_type,
            parent: Some(item),
        }));
        entries.push(entry);
    }
    entries
}

/// Joins short notes into their inline form, `None` when there are none.
pub(crate) fn joined_short_notes(item: &Item) -> Option<String> {
    if item.short_notes.is_empty() {
        return None;
    }
    let texts: Vec<&str> = item.short_notes.iter().map(|note| note.text.as_str()).collect();
    Some(texts.join(", "))
}

/// Display text of an item; empty text renders as `Untitled`.
pub(crate) fn item_label(item: &Item) -> &str {
    if item.text.is_empty() {
        "Untitled"
    } else {
        item.text.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::ProjectSettings;
    use crate::outline::tree::insert_child;

    #[test]
    fn sanitize_replaces_everything_but_ascii_alphanumerics() {
        assert_eq!(sanitize_file_stem("My Plan: v2/ü"), "My_Plan__v2__");
        assert_eq!(sanitize_file_stem(""), "outline");
    }

    #[test]
    fn marker_styles_cycle_every_three_levels() {
        assert_eq!(NumberFormat::ordered_at(0), NumberFormat::Decimal);
        assert_eq!(NumberFormat::ordered_at(1), NumberFormat::LowerLetter);
        assert_eq!(NumberFormat::ordered_at(2), NumberFormat::LowerRoman);
        assert_eq!(NumberFormat::ordered_at(3), NumberFormat::Decimal);
        assert_eq!(bullet_glyph(0), bullet_glyph(3));
        assert_ne!(bullet_glyph(0), bullet_glyph(1));
    }

    #[test]
    fn document_order_is_pre_order_with_parent_list_types() {
        let mut project = Project::new("Order", ProjectSettings::default());
        let mut first = Item::new("first", None, ListType::Unordered);
        insert_child(&mut first, Item::new("child", None, ListType::Ordered));
        project.lists.push(first);
        project.lists.push(Item::new("second", None, ListType::Ordered));

        let entries = document_order(&project);
        let texts: Vec<&str> = entries.iter().map(|e| e.item.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "child", "second"]);
        assert_eq!(entries[1].depth, 1);
        assert_eq!(entries[1].list_type, ListType::Unordered);
        assert_eq!(entries[2].position, 1);
        assert_eq!(entries[2].list_type, ListType::Ordered);
    }
}

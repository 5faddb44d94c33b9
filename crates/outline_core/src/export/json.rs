//! JSON archive: the one export format with a matching importer.
//!
//! # Responsibility
//! - Encode projects as a self-describing archive with explicit defaults.
//! - Validate incoming archives, separating fatal errors from warnings.
//! - Decode archives into fully defaulted projects.
//!
//! # Invariants
//! - Export followed by import yields an equal forest; empty note and
//!   child arrays are omitted on export and restored as empty on import.
//! - Imported items get `parent_id` re-derived from the nesting.
//! - Archive conversion walks items with an explicit stack.

use super::{ExportArtifact, ExportError, ExportFormat};
use crate::model::id::{new_id, ItemId, NoteId, ProjectId};
use crate::model::item::{Item, ListType, Note};
use crate::model::project::{Project, ProjectSettings, FONT_SIZE_RANGE, INDENT_SIZE_RANGE};
use crate::outline::tree::{dedupe_ids, relink_parents};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

/// Archive format written by this version.
pub const FORMAT_VERSION: &str = "1.0";
/// Value of the archive `application` field.
pub const APPLICATION_TAG: &str = "Scaffold";
/// Archives older than this produce a staleness warning.
pub const STALE_AFTER_DAYS: i64 = 180;
const REQUIRED_PROJECT_FIELDS: [&str; 4] = ["id", "name", "createdAt", "updatedAt"];

/// Top-level archive document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    pub format_version: String,
    pub exported_at: DateTime<Utc>,
    pub application: String,
    pub projects: Vec<ArchivedProject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedProject {
    #[serde(default = "new_id")]
    pub id: ProjectId,
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub root_list_type: ListType,
    #[serde(default)]
    pub settings: ArchivedSettings,
    #[serde(default)]
    pub items: Vec<ArchivedItem>,
}

/// Settings as archived; missing fields fall back to the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchivedSettings {
    pub font_size: Option<u32>,
    pub indent_size: Option<u32>,
    pub default_list_type: Option<ListType>,
    pub show_indent_guides: Option<bool>,
}

impl From<ProjectSettings> for ArchivedSettings {
    fn from(value: ProjectSettings) -> Self {
        Self {
            font_size: Some(value.font_size),
            indent_size: Some(value.indent_size),
            default_list_type: Some(value.default_list_type),
            show_indent_guides: Some(value.show_indent_guides),
        }
    }
}

impl From<ArchivedSettings> for ProjectSettings {
    fn from(value: ArchivedSettings) -> Self {
        let defaults = ProjectSettings::default();
        Self {
            font_size: value.font_size.unwrap_or(defaults.font_size),
            indent_size: value.indent_size.unwrap_or(defaults.indent_size),
            default_list_type: value.default_list_type.unwrap_or(defaults.default_list_type),
            show_indent_guides: value.show_indent_guides.unwrap_or(defaults.show_indent_guides),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedItem {
    #[serde(default = "new_id")]
    pub id: ItemId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub children_type: ListType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_notes: Vec<ArchivedNote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_notes: Vec<ArchivedNote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ArchivedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedNote {
    #[serde(default = "new_id")]
    pub id: NoteId,
    #[serde(default)]
    pub text: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Written for long notes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

impl ArchivedNote {
    fn short(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            text: note.text.clone(),
            created_at: note.created_at,
            collapsed: None,
        }
    }

    fn long(note: &Note) -> Self {
        Self {
            collapsed: Some(note.collapsed),
            ..Self::short(note)
        }
    }

    fn into_note(self) -> Note {
        Note {
            id: self.id,
            text: self.text,
            created_at: self.created_at,
            collapsed: self.collapsed.unwrap_or(false),
        }
    }
}

impl ArchivedItem {
    fn with_children(item: &Item, children: Vec<ArchivedItem>) -> Self {
        Self {
            id: item.id.clone(),
            text: item.text.clone(),
            collapsed: item.collapsed,
            children_type: item.children_type,
            short_notes: item.short_notes.iter().map(ArchivedNote::short).collect(),
            long_notes: item.long_notes.iter().map(ArchivedNote::long).collect(),
            children,
        }
    }

    /// Splits off the children so the caller can convert them separately.
    fn into_item_parts(self) -> (Item, Vec<ArchivedItem>) {
        let item = Item {
            id: self.id,
            text: self.text,
            collapsed: self.collapsed,
            short_notes: self.short_notes.into_iter().map(ArchivedNote::into_note).collect(),
            long_notes: self.long_notes.into_iter().map(ArchivedNote::into_note).collect(),
            children: Vec::new(),
            children_type: self.children_type,
            parent_id: None,
        };
        (item, self.children)
    }
}

impl From<&Project> for ArchivedProject {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            created_at: project.created_at,
            updated_at: project.updated_at,
            root_list_type: project.root_list_type,
            settings: project.settings.into(),
            items: archive_items(&project.lists),
        }
    }
}

impl ArchivedProject {
    fn into_project(self) -> Project {
        let mut lists = restore_items(self.items);
        let renamed = dedupe_ids(&mut lists);
        if renamed > 0 {
            warn!(
                "event=import_archive module=export status=repaired reason=duplicate_ids project_id={} renamed={}",
                self.id, renamed
            );
        }
        relink_parents(&mut lists);
        Project {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
            root_list_type: self.root_list_type,
            settings: self.settings.into(),
            lists,
        }
    }
}

fn archive_items(forest: &[Item]) -> Vec<ArchivedItem> {
    struct Frame<'a> {
        source: &'a [Item],
        next: usize,
        built: Vec<ArchivedItem>,
    }

    let mut stack = vec![Frame {
        source: forest,
        next: 0,
        built: Vec::with_capacity(forest.len()),
    }];
    loop {
        let Some(frame) = stack.last_mut() else {
            return Vec::new();
        };
        if let Some(item) = frame.source.get(frame.next) {
            stack.push(Frame {
                source: &item.children,
                next: 0,
                built: Vec::with_capacity(item.children.len()),
            });
            continue;
        }
        let Some(done) = stack.pop() else {
            return Vec::new();
        };
        let Some(parent) = stack.last_mut() else {
            return done.built;
        };
        if let Some(item) = parent.source.get(parent.next) {
            parent.built.push(ArchivedItem::with_children(item, done.built));
        }
        parent.next += 1;
    }
}

fn restore_items(items: Vec<ArchivedItem>) -> Vec<Item> {
    struct Frame {
        head: Option<Item>,
        rest: std::vec::IntoIter<ArchivedItem>,
        built: Vec<Item>,
    }

    let mut stack = vec![Frame {
        head: None,
        built: Vec::with_capacity(items.len()),
        rest: items.into_iter(),
    }];
    loop {
        let Some(frame) = stack.last_mut() else {
            return Vec::new();
        };
        if let Some(next) = frame.rest.next() {
            let (item, children) = next.into_item_parts();
            stack.push(Frame {
                head: Some(item),
                built: Vec::with_capacity(children.len()),
                rest: children.into_iter(),
            });
            continue;
        }
        let Some(done) = stack.pop() else {
            return Vec::new();
        };
        let Some(mut item) = done.head else {
            return done.built;
        };
        item.children = done.built;
        if let Some(parent) = stack.last_mut() {
            parent.built.push(item);
        }
    }
}

/// Builds an archive of `projects` stamped with `now`.
pub fn build_archive(projects: &[Project], now: DateTime<Utc>) -> Archive {
    Archive {
        format_version: FORMAT_VERSION.to_string(),
        exported_at: now,
        application: APPLICATION_TAG.to_string(),
        projects: projects.iter().map(ArchivedProject::from).collect(),
    }
}

/// Exports one project as `{name}_outline.json`.
pub fn export_project_json(project: &Project) -> Result<ExportArtifact, ExportError> {
    let archive = build_archive(std::slice::from_ref(project), Utc::now());
    let bytes = serde_json::to_vec_pretty(&archive)?;
    info!(
        "event=export_json module=export status=ok scope=project project_id={} bytes={}",
        project.id,
        bytes.len()
    );
    Ok(ExportArtifact::new(
        &format!("{}_outline", project.name),
        ExportFormat::Json,
        bytes,
    ))
}

/// Exports every project as `outline_maker_backup_{date}.json`.
pub fn export_all_json(projects: &[Project], now: DateTime<Utc>) -> Result<ExportArtifact, ExportError> {
    let archive = build_archive(projects, now);
    let bytes = serde_json::to_vec_pretty(&archive)?;
    info!(
        "event=export_json module=export status=ok scope=all projects={} bytes={}",
        projects.len(),
        bytes.len()
    );
    Ok(ExportArtifact {
        file_name: format!("outline_maker_backup_{}.json", now.format("%Y-%m-%d")),
        format: ExportFormat::Json,
        bytes,
    })
}

/// Errors that abort an import.
#[derive(Debug)]
pub enum ImportError {
    /// Payload is not JSON, or a field has the wrong shape.
    Parse(serde_json::Error),
    /// Payload is JSON but fails structural validation.
    Validation(Vec<String>),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid archive json: {err}"),
            Self::Validation(errors) => write!(f, "import validation failed: {}", errors.join(", ")),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Validation(_) => None,
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Outcome of [`validate_archive`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ArchiveValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Successfully decoded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedArchive {
    pub projects: Vec<Project>,
    pub warnings: Vec<String>,
}

/// Checks archive structure without decoding it.
///
/// Missing required fields, a foreign application tag, a non-list
/// `projects` and out-of-range numeric settings are errors. A version
/// mismatch or a stale/unreadable `exportedAt` is only a warning.
pub fn validate_archive(value: &Value, now: DateTime<Utc>) -> ArchiveValidation {
    let mut report = ArchiveValidation::default();
    let Some(root) = value.as_object() else {
        report.errors.push("archive must be a JSON object".to_string());
        return report;
    };

    match root.get("formatVersion") {
        None => report.errors.push("missing formatVersion".to_string()),
        Some(Value::String(version)) if version == FORMAT_VERSION => {}
        Some(Value::String(version)) => report.warnings.push(format!(
            "format version {version} differs from {FORMAT_VERSION}"
        )),
        Some(_) => report.errors.push("formatVersion must be a string".to_string()),
    }

    match root.get("application") {
        None => report.errors.push("missing application tag".to_string()),
        Some(Value::String(tag)) if tag == APPLICATION_TAG => {}
        Some(_) => report
            .errors
            .push(format!("application identifier must be {APPLICATION_TAG}")),
    }

    if let Some(exported_at) = root.get("exportedAt") {
        let parsed = exported_at
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
        match parsed {
            Some(at) => {
                let age = now.signed_duration_since(at.with_timezone(&Utc));
                if age > Duration::days(STALE_AFTER_DAYS) {
                    report
                        .warnings
                        .push(format!("archive was exported {} days ago", age.num_days()));
                }
            }
            None => report.warnings.push("exportedAt is not a valid timestamp".to_string()),
        }
    }

    match root.get("projects") {
        None => report.errors.push("missing projects".to_string()),
        Some(Value::Array(projects)) => {
            for (index, project) in projects.iter().enumerate() {
                validate_project(index, project, &mut report.errors);
            }
        }
        Some(_) => report.errors.push("projects must be a list".to_string()),
    }
    report
}

/// Per-project rules; projects are numbered from 1 in messages.
fn validate_project(index: usize, value: &Value, errors: &mut Vec<String>) {
    let number = index + 1;
    let Some(project) = value.as_object() else {
        errors.push(format!("project {number}: must be an object"));
        return;
    };
    for field in REQUIRED_PROJECT_FIELDS {
        let present = project
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|text| !text.is_empty());
        if !present {
            errors.push(format!("project {number}: missing {field}"));
        }
    }
    for field in ["createdAt", "updatedAt"] {
        if project.get(field).is_some_and(|value| !is_timestamp(value)) {
            errors.push(format!("project {number}: {field} is not a valid timestamp"));
        }
    }
    if project.get("rootListType").is_some_and(|value| !is_list_type(value)) {
        errors.push(format!("project {number}: rootListType must be ordered or unordered"));
    }
    match project.get("items") {
        Some(Value::Array(items)) => validate_items(number, items, errors),
        Some(_) => errors.push(format!("project {number}: items must be a list")),
        None => {}
    }
    let Some(settings) = project.get("settings") else {
        return;
    };
    let Some(settings) = settings.as_object() else {
        errors.push(format!("project {number}: settings must be an object"));
        return;
    };
    check_bound(number, "fontSize", settings.get("fontSize"), FONT_SIZE_RANGE, errors);
    check_bound(number, "indentSize", settings.get("indentSize"), INDENT_SIZE_RANGE, errors);
    if settings
        .get("defaultListType")
        .is_some_and(|value| !is_list_type(value))
    {
        errors.push(format!("project {number}: defaultListType must be ordered or unordered"));
    }
}

/// Walks the item forest; each rule is reported at most once per project.
fn validate_items(number: usize, items: &[Value], errors: &mut Vec<String>) {
    let mut bad_list_type = false;
    let mut bad_note_time = false;
    let mut bad_children = false;
    let mut stack: Vec<&Value> = items.iter().collect();
    while let Some(item) = stack.pop() {
        let Some(item) = item.as_object() else {
            continue;
        };
        bad_list_type |= item
            .get("childrenType")
            .is_some_and(|value| !is_list_type(value));
        for kind in ["shortNotes", "longNotes"] {
            if let Some(Value::Array(notes)) = item.get(kind) {
                bad_note_time |= notes
                    .iter()
                    .filter_map(|note| note.get("createdAt"))
                    .any(|value| !is_timestamp(value));
            }
        }
        match item.get("children") {
            Some(Value::Array(children)) => stack.extend(children),
            Some(_) => bad_children = true,
            None => {}
        }
    }
    if bad_list_type {
        errors.push(format!("project {number}: childrenType must be ordered or unordered"));
    }
    if bad_note_time {
        errors.push(format!("project {number}: note createdAt is not a valid timestamp"));
    }
    if bad_children {
        errors.push(format!("project {number}: children must be a list"));
    }
}

fn is_timestamp(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|raw| DateTime::parse_from_rfc3339(raw).is_ok())
}

fn is_list_type(value: &Value) -> bool {
    value.as_str().and_then(ListType::parse).is_some()
}

fn check_bound(
    number: usize,
    field: &str,
    value: Option<&Value>,
    range: RangeInclusive<u32>,
    errors: &mut Vec<String>,
) {
    let Some(value) = value else {
        return;
    };
    let in_range = value
        .as_u64()
        .and_then(|number| u32::try_from(number).ok())
        .is_some_and(|number| range.contains(&number));
    if !in_range {
        errors.push(format!(
            "project {number}: {field} must be a number between {} and {}",
            range.start(),
            range.end()
        ));
    }
}

/// Decodes `payload`, validating against the current time.
pub fn import_archive(payload: &str) -> Result<ImportedArchive, ImportError> {
    import_archive_at(payload, Utc::now())
}

/// Decodes `payload`, validating staleness against `now`.
pub fn import_archive_at(payload: &str, now: DateTime<Utc>) -> Result<ImportedArchive, ImportError> {
    let mut value: Value = serde_json::from_str(payload)?;
    let report = validate_archive(&value, now);
    if !report.is_valid() {
        warn!(
            "event=import_archive module=export status=rejected errors={}",
            report.errors.len()
        );
        return Err(ImportError::Validation(report.errors));
    }

    let projects_value = value
        .get_mut("projects")
        .map(Value::take)
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let archived: Vec<ArchivedProject> = serde_json::from_value(projects_value)?;
    let projects: Vec<Project> = archived.into_iter().map(ArchivedProject::into_project).collect();

    for warning in &report.warnings {
        warn!("event=import_archive module=export status=warning detail={warning}");
    }
    info!(
        "event=import_archive module=export status=ok projects={} warnings={}",
        projects.len(),
        report.warnings.len()
    );
    Ok(ImportedArchive {
        projects,
        warnings: report.warnings,
    })
}

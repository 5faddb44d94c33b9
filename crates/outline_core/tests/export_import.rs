use outline_core::db::open_db_in_memory;
use outline_core::service::outline_store::OutlineStore;
use outline_core::{ExportFormat, ImportError, ListType, NoteKind, SqliteKeyValueRepository};
use std::io::{Cursor, Read};

fn sample_store(conn: &rusqlite::Connection) -> OutlineStore<SqliteKeyValueRepository<'_>> {
    let repo = SqliteKeyValueRepository::try_new(conn).unwrap();
    let mut store = OutlineStore::load(repo).unwrap();
    let project_id = store.current_project_id().unwrap().to_string();
    store.rename_project(&project_id, "Launch plan");

    let root = store.add_root_item().unwrap();
    store.update_item_text(&root, "Prepare");
    store.add_note(&root, NoteKind::Short, "owner: ops");
    store.toggle_children_type(&root);
    let child = store.add_child_item(&root).unwrap();
    store.update_item_text(&child, "Checklist");
    store.add_note(
        &child,
        NoteKind::Long,
        "<p>Run the <strong>dry run</strong></p><blockquote>ship it</blockquote>",
    );
    let grandchild = store.add_child_item(&child).unwrap();
    store.update_item_text(&grandchild, "Sign-off");
    store
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

#[test]
fn markdown_export_of_mixed_levels() {
    let conn = open_db_in_memory().unwrap();
    let store = sample_store(&conn);
    let artifact = store.export_current(ExportFormat::Markdown).unwrap().unwrap();
    assert_eq!(artifact.file_name, "Launch_plan.md");

    let text = String::from_utf8(artifact.bytes).unwrap();
    let expected = concat!(
        "# Launch plan\n\n",
        "1. Prepare _(owner: ops)_\n",
        "    - Checklist\n",
        "\n",
        "        > Run the **dry run**\n",
        "        >\n",
        "        > ship it\n",
        "\n",
        "        1. Sign-off\n",
    );
    assert_eq!(text, expected);
}

#[test]
fn docx_export_binds_items_to_numbering_levels() {
    let conn = open_db_in_memory().unwrap();
    let store = sample_store(&conn);
    let artifact = store.export_current(ExportFormat::Docx).unwrap().unwrap();
    assert_eq!(artifact.file_name, "Launch_plan.docx");
    assert_eq!(&artifact.bytes[..2], b"PK");

    let numbering = read_part(&artifact.bytes, "word/numbering.xml");
    assert_eq!(numbering.matches("<w:lvl ").count(), 6);

    let document = read_part(&artifact.bytes, "word/document.xml");
    assert!(document.contains("Launch plan"));
    assert!(document.contains(r#"<w:ilvl w:val="2"/>"#));
    assert!(document.contains(r#"<w:t xml:space="preserve"> (owner: ops)</w:t>"#));
    assert!(document.contains("dry run"));
    assert!(document.contains(r#"<w:pStyle w:val="BlockQuotation"/>"#));
}

#[test]
fn json_archive_round_trips_through_the_store() {
    let conn = open_db_in_memory().unwrap();
    let mut store = sample_store(&conn);
    let original = store.current_project().unwrap().clone();
    let artifact = store.export_current(ExportFormat::Json).unwrap().unwrap();
    assert_eq!(artifact.file_name, "Launch_plan_outline.json");

    let payload = String::from_utf8(artifact.bytes).unwrap();
    let report = store.import_archive(&payload).unwrap();
    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.reassigned_ids, 1, "colliding project id is replaced");
    assert!(report.warnings.is_empty());

    let imported = store
        .projects()
        .iter()
        .find(|project| project.id == report.imported[0])
        .unwrap();
    assert_ne!(imported.id, original.id);
    assert_eq!(imported.name, original.name);
    assert_eq!(imported.lists, original.lists);
    assert_eq!(store.current_project_id(), Some(original.id.as_str()));
}

#[test]
fn backup_covers_every_project_and_imports_into_a_fresh_store() {
    let conn = open_db_in_memory().unwrap();
    let mut store = sample_store(&conn);
    store.create_project("Second");
    store.set_default_list_type(ListType::Unordered);
    store.add_root_item();
    let backup = store.export_all_json().unwrap();
    assert!(backup.file_name.starts_with("outline_maker_backup_"));

    let fresh_conn = open_db_in_memory().unwrap();
    let mut fresh = OutlineStore::load(SqliteKeyValueRepository::try_new(&fresh_conn).unwrap()).unwrap();
    let payload = String::from_utf8(backup.bytes).unwrap();
    let report = fresh.import_archive(&payload).unwrap();
    assert_eq!(report.imported.len(), 2);
    assert_eq!(report.reassigned_ids, 0);
    assert_eq!(fresh.projects().len(), 3);
    assert_eq!(fresh.projects()[2].lists[0].children_type, ListType::Unordered);
}

#[test]
fn invalid_archives_leave_the_store_untouched() {
    let conn = open_db_in_memory().unwrap();
    let mut store = sample_store(&conn);
    let before = store.projects().to_vec();

    let err = store
        .import_archive(r#"{"formatVersion":"1.0","application":"Scaffold","projects":"nope"}"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation(_)));
    assert_eq!(err.to_string(), "import validation failed: projects must be a list");

    let err = store.import_archive("{not json").unwrap_err();
    assert!(matches!(err, ImportError::Parse(_)));
    assert_eq!(store.projects(), before.as_slice());
}

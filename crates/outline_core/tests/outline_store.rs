use outline_core::db::open_db_in_memory;
use outline_core::service::outline_store::{OutlineStore, DEFAULT_PROJECT_NAME, NEW_ITEM_TEXT};
use outline_core::{
    Direction, Item, KeyValueRepository, ListType, NoteKind, SqliteKeyValueRepository, MAX_HISTORY,
};
use rusqlite::Connection;

fn open_store(conn: &Connection) -> OutlineStore<SqliteKeyValueRepository<'_>> {
    let repo = SqliteKeyValueRepository::try_new(conn).unwrap();
    OutlineStore::load(repo).unwrap()
}

fn root_texts<R: KeyValueRepository>(store: &OutlineStore<R>) -> Vec<String> {
    store
        .current_project()
        .unwrap()
        .lists
        .iter()
        .map(|item| item.text.clone())
        .collect()
}

fn lists<R: KeyValueRepository>(store: &OutlineStore<R>) -> Vec<Item> {
    store.current_project().unwrap().lists.clone()
}

#[test]
fn new_items_use_defaults_and_children_link_to_parents() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    assert_eq!(store.current_project().unwrap().name, DEFAULT_PROJECT_NAME);

    store.set_default_list_type(ListType::Unordered);
    let parent = store.add_root_item().unwrap();
    store.toggle_item_collapsed(&parent);
    let child = store.add_child_item(&parent).unwrap();

    let parent_item = store.find_item(&parent).unwrap();
    assert_eq!(parent_item.text, NEW_ITEM_TEXT);
    assert_eq!(parent_item.children_type, ListType::Unordered);
    assert!(!parent_item.collapsed, "adding a child expands the parent");
    assert_eq!(store.find_item(&child).unwrap().parent_id.as_deref(), Some(parent.as_str()));
}

#[test]
fn undo_restores_pre_mutation_state_and_redo_reapplies() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let a = store.add_root_item().unwrap();
    let b = store.add_root_item().unwrap();
    store.update_item_text(&a, "alpha");
    store.update_item_text(&b, "beta");
    let before_indent = lists(&store);

    assert!(store.indent_item(&b));
    assert_eq!(root_texts(&store), vec!["alpha"]);
    let after_indent = lists(&store);

    assert!(store.undo());
    assert_eq!(lists(&store), before_indent);
    assert!(store.can_redo());

    assert!(store.redo());
    assert_eq!(lists(&store), after_indent);
    assert_eq!(
        store.find_item(&b).unwrap().parent_id.as_deref(),
        Some(a.as_str())
    );
}

#[test]
fn structural_edits_round_trip_through_history() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let a = store.add_root_item().unwrap();
    let b = store.add_root_item().unwrap();
    let c = store.add_child_item(&b).unwrap();
    store.update_item_text(&a, "a");
    store.update_item_text(&b, "b");
    store.update_item_text(&c, "c");
    let baseline = lists(&store);

    assert!(store.move_item(&b, Direction::Up));
    assert!(store.outdent_item(&c));
    assert!(store.toggle_children_type(&a));
    assert!(store.toggle_root_list_type());
    assert!(store.delete_item(&a));
    assert_eq!(root_texts(&store), vec!["b", "c"]);

    for _ in 0..5 {
        assert!(store.undo());
    }
    assert_eq!(lists(&store), baseline);
    assert_eq!(store.current_project().unwrap().root_list_type, ListType::Ordered);
}

#[test]
fn a_new_edit_clears_redo() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let a = store.add_root_item().unwrap();
    store.update_item_text(&a, "one");
    store.undo();
    assert!(store.can_redo());

    store.update_item_text(&a, "two");
    assert!(!store.can_redo());
    assert!(!store.redo());
}

#[test]
fn history_is_capped() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let item = store.add_root_item().unwrap();
    for round in 0..(MAX_HISTORY + 10) {
        store.update_item_text(&item, &format!("edit {round}"));
    }
    assert_eq!(store.history().undo_len(), MAX_HISTORY);

    let mut undone = 0;
    while store.undo() {
        undone += 1;
    }
    assert_eq!(undone, MAX_HISTORY);
    assert_eq!(store.find_item(&item).unwrap().text, "edit 9");
}

#[test]
fn notes_are_recorded_but_collapse_is_not() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let item = store.add_root_item().unwrap();
    let short = store.add_note(&item, NoteKind::Short, "inline").unwrap();
    let long = store.add_note(&item, NoteKind::Long, "<b>body</b>").unwrap();

    let stored = store.find_item(&item).unwrap();
    assert!(!stored.short_notes[0].collapsed);
    assert!(stored.long_notes[0].collapsed);

    let depth = store.history().undo_len();
    assert!(store.toggle_note_collapse(&item, &long));
    assert!(!store.find_item(&item).unwrap().long_notes[0].collapsed);
    assert_eq!(store.history().undo_len(), depth);
    assert!(!store.toggle_note_collapse(&item, &short), "short notes never collapse");

    assert!(store.update_note(&item, NoteKind::Short, &short, "changed"));
    assert!(store.delete_note(&item, NoteKind::Long, &long));
    assert!(store.find_item(&item).unwrap().long_notes.is_empty());

    assert!(store.undo());
    assert_eq!(store.find_item(&item).unwrap().long_notes.len(), 1);
    assert!(store.undo());
    assert_eq!(store.find_item(&item).unwrap().short_notes[0].text, "inline");
}

#[test]
fn switching_projects_clears_history_and_restores_settings() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let first = store.current_project_id().unwrap().to_string();
    store.add_root_item();
    assert!(store.set_font_size(20));

    let second = store.create_project("  Second  ");
    assert_eq!(store.current_project().unwrap().name, "Second");
    assert_eq!(store.current_project().unwrap().settings.font_size, 20);
    assert!(!store.can_undo());
    assert!(store.set_font_size(30));

    assert!(store.select_project(&first));
    assert!(!store.can_undo());
    assert_eq!(store.settings().font_size, 20);
    assert!(!store.select_project("missing"));

    assert!(store.rename_project(&second, "Renamed"));
    assert!(!store.rename_project(&second, "   "));
    assert!(store.delete_project(&first));
    assert_eq!(store.current_project_id(), Some(second.as_str()));
    assert_eq!(store.settings().font_size, 30);
    assert_eq!(store.current_project().unwrap().name, "Renamed");
}

#[test]
fn settings_are_bounded() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    assert!(!store.set_font_size(9));
    assert!(!store.set_font_size(51));
    assert!(store.set_font_size(50));
    assert!(!store.set_indent_size(4));
    assert!(!store.set_indent_size(101));
    assert!(store.set_indent_size(5));
    store.set_show_indent_guides(false);

    let settings = store.settings();
    assert_eq!((settings.font_size, settings.indent_size), (50, 5));
    assert!(!settings.show_indent_guides);
    assert_eq!(store.current_project().unwrap().settings, settings);
    assert!(!store.can_undo());
}

#[test]
fn navigation_queries_follow_document_order() {
    let conn = open_db_in_memory().unwrap();
    let mut store = open_store(&conn);
    let a = store.add_root_item().unwrap();
    let a1 = store.add_child_item(&a).unwrap();
    let b = store.add_root_item().unwrap();

    assert_eq!(store.next_item(&a, true).unwrap().id, a1);
    assert_eq!(store.next_item(&a, false).unwrap().id, b);
    assert_eq!(store.next_item(&a1, false).unwrap().id, b);
    assert!(store.next_item(&b, true).is_none());
    assert_eq!(store.next_sibling(&b).unwrap().id, a);
    assert!(store.next_sibling(&a1).is_none());
}

#[test]
fn state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outline.db");
    let (project_id, item_id) = {
        let conn = outline_core::open_db(&path).unwrap();
        let mut store = open_store(&conn);
        let item_id = store.add_root_item().unwrap();
        store.update_item_text(&item_id, "persisted");
        store.add_child_item(&item_id).unwrap();
        store.set_indent_size(48);
        (store.current_project_id().unwrap().to_string(), item_id)
    };

    let conn = outline_core::open_db(&path).unwrap();
    let store = open_store(&conn);
    assert_eq!(store.current_project_id(), Some(project_id.as_str()));
    assert_eq!(store.settings().indent_size, 48);
    let item = store.find_item(&item_id).unwrap();
    assert_eq!(item.text, "persisted");
    assert_eq!(item.children[0].parent_id.as_deref(), Some(item_id.as_str()));
    assert!(!store.can_undo(), "history is not persisted");
}

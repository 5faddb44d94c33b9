//! Structural forest operations.
//!
//! Nodes are located as index paths (`[root_index, child_index, ...]`) by an
//! iterative pre-order walk, then addressed through the path. Parent linkage
//! therefore comes from ownership, never from comparing container values.

use crate::model::id::{new_id, ItemId, NoteId};
use crate::model::item::Item;
use std::collections::HashSet;

/// Direction for sibling reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Returns the index path of the first pre-order node with `id`.
pub fn locate(forest: &[Item], id: &str) -> Option<Vec<usize>> {
    let mut stack: Vec<(&[Item], usize)> = vec![(forest, 0)];
    let mut path: Vec<usize> = Vec::new();

    while let Some(frame) = stack.last_mut() {
        let (siblings, next) = (frame.0, frame.1);
        if next >= siblings.len() {
            stack.pop();
            path.pop();
            continue;
        }
        frame.1 += 1;

        let item = &siblings[next];
        if item.id == id {
            path.push(next);
            return Some(path);
        }
        if !item.children.is_empty() {
            path.push(next);
            stack.push((item.children.as_slice(), 0));
        }
    }
    None
}

/// Resolves an index path to a node.
pub fn item_at<'a>(forest: &'a [Item], path: &[usize]) -> Option<&'a Item> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get(*first)?;
    for index in rest {
        node = node.children.get(*index)?;
    }
    Some(node)
}

fn item_at_mut<'a>(forest: &'a mut [Item], path: &[usize]) -> Option<&'a mut Item> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get_mut(*first)?;
    for index in rest {
        node = node.children.get_mut(*index)?;
    }
    Some(node)
}

/// Resolves the children list addressed by `parent_path` (empty = forest).
fn siblings_mut<'a>(forest: &'a mut Vec<Item>, parent_path: &[usize]) -> Option<&'a mut Vec<Item>> {
    if parent_path.is_empty() {
        return Some(forest);
    }
    item_at_mut(forest, parent_path).map(|parent| &mut parent.children)
}

/// Finds the first node with `id`, depth-first pre-order.
pub fn find<'a>(forest: &'a [Item], id: &str) -> Option<&'a Item> {
    let path = locate(forest, id)?;
    item_at(forest, &path)
}

/// Mutable variant of [`find`].
pub fn find_mut<'a>(forest: &'a mut [Item], id: &str) -> Option<&'a mut Item> {
    let path = locate(forest, id)?;
    item_at_mut(forest, &path)
}

/// Appends `item` as a root of the forest.
pub fn insert_root(forest: &mut Vec<Item>, mut item: Item) {
    item.parent_id = None;
    forest.push(item);
}

/// Appends `item` as the last child of `parent` and expands `parent`.
pub fn insert_child(parent: &mut Item, mut item: Item) {
    item.parent_id = Some(parent.id.clone());
    parent.children.push(item);
    parent.collapsed = false;
}

/// Removes the node with `id` together with its whole subtree.
pub fn remove(forest: &mut Vec<Item>, id: &str) -> Option<Item> {
    let path = locate(forest, id)?;
    let (&index, parent_path) = path.split_last()?;
    let siblings = siblings_mut(forest, parent_path)?;
    Some(siblings.remove(index))
}

/// Swaps the node with its previous or next sibling.
///
/// Returns `false` when the node is missing or already at the list boundary.
pub fn reorder(forest: &mut Vec<Item>, id: &str, direction: Direction) -> bool {
    let Some(path) = locate(forest, id) else {
        return false;
    };
    let Some((&index, parent_path)) = path.split_last() else {
        return false;
    };
    let Some(siblings) = siblings_mut(forest, parent_path) else {
        return false;
    };

    match direction {
        Direction::Up if index > 0 => siblings.swap(index, index - 1),
        Direction::Down if index + 1 < siblings.len() => siblings.swap(index, index + 1),
        _ => return false,
    }
    true
}

/// Moves the node under its previous sibling, as that sibling's last child.
///
/// Returns `false` when the node is missing or first in its list.
pub fn indent(forest: &mut Vec<Item>, id: &str) -> bool {
    let Some(path) = locate(forest, id) else {
        return false;
    };
    let Some((&index, parent_path)) = path.split_last() else {
        return false;
    };
    if index == 0 {
        return false;
    }
    let Some(siblings) = siblings_mut(forest, parent_path) else {
        return false;
    };

    let mut item = siblings.remove(index);
    let new_parent = &mut siblings[index - 1];
    item.parent_id = Some(new_parent.id.clone());
    new_parent.children.push(item);
    true
}

/// Moves the node out of its parent, directly after that parent.
///
/// Returns `false` when the node is missing or already a root.
pub fn outdent(forest: &mut Vec<Item>, id: &str) -> bool {
    let Some(path) = locate(forest, id) else {
        return false;
    };
    if path.len() < 2 {
        return false;
    }
    let index = path[path.len() - 1];
    let parent_index = path[path.len() - 2];
    let grand_path = &path[..path.len() - 2];

    let grandparent_id: Option<ItemId> = if grand_path.is_empty() {
        None
    } else {
        match item_at(forest, grand_path) {
            Some(grandparent) => Some(grandparent.id.clone()),
            None => return false,
        }
    };
    let Some(siblings) = siblings_mut(forest, grand_path) else {
        return false;
    };

    let mut item = siblings[parent_index].children.remove(index);
    item.parent_id = grandparent_id;
    siblings.insert(parent_index + 1, item);
    true
}

/// Rewrites every `parent_id` from the actual nesting.
pub fn relink_parents(forest: &mut [Item]) {
    let mut stack: Vec<&mut Item> = Vec::new();
    for root in forest.iter_mut() {
        root.parent_id = None;
        stack.push(root);
    }
    while let Some(item) = stack.pop() {
        let parent_id = item.id.clone();
        for child in item.children.iter_mut() {
            child.parent_id = Some(parent_id.clone());
            stack.push(child);
        }
    }
}

/// Gives every repeated item or note id in the forest a fresh id.
///
/// The first occurrence in pre-order keeps its id. Returns how many ids were
/// replaced. Parent links are not touched; call [`relink_parents`] afterwards.
pub fn dedupe_ids(forest: &mut [Item]) -> usize {
    let mut item_ids: HashSet<ItemId> = HashSet::new();
    let mut note_ids: HashSet<NoteId> = HashSet::new();
    let mut replaced = 0;
    let mut stack: Vec<&mut Item> = forest.iter_mut().rev().collect();
    while let Some(item) = stack.pop() {
        if !item_ids.insert(item.id.clone()) {
            item.id = new_id();
            item_ids.insert(item.id.clone());
            replaced += 1;
        }
        for note in item.short_notes.iter_mut().chain(item.long_notes.iter_mut()) {
            if !note_ids.insert(note.id.clone()) {
                note.id = new_id();
                note_ids.insert(note.id.clone());
                replaced += 1;
            }
        }
        stack.extend(item.children.iter_mut().rev());
    }
    replaced
}

/// Deepest nesting level in the forest; roots are level 0.
///
/// Returns 0 for an empty forest.
pub fn max_depth(forest: &[Item]) -> usize {
    let mut deepest = 0;
    let mut stack: Vec<(&Item, usize)> = forest.iter().map(|item| (item, 0)).collect();
    while let Some((item, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        stack.extend(item.children.iter().map(|child| (child, depth + 1)));
    }
    deepest
}

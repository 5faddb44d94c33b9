//! Read-only traversal queries used for "tab to next field" navigation.
//!
//! Two queries intentionally differ: sibling cycling wraps to the first
//! sibling, document-order succession never wraps.

use crate::model::item::Item;
use crate::outline::tree::{item_at, locate};

fn siblings_at<'a>(forest: &'a [Item], parent_path: &[usize]) -> Option<&'a [Item]> {
    if parent_path.is_empty() {
        return Some(forest);
    }
    item_at(forest, parent_path).map(|parent| parent.children.as_slice())
}

/// Returns the next sibling of `id`, wrapping to the first sibling at the
/// end of the list. An only child has no next sibling.
pub fn next_sibling<'a>(forest: &'a [Item], id: &str) -> Option<&'a Item> {
    let path = locate(forest, id)?;
    let (&index, parent_path) = path.split_last()?;
    let siblings = siblings_at(forest, parent_path)?;
    if siblings.len() < 2 {
        return None;
    }
    siblings.get((index + 1) % siblings.len())
}

/// Returns the item following `id` in document order.
///
/// When `enter_children` is set and the item is expanded with children, the
/// first child is returned. Otherwise the walk skips the item's subtree: the
/// next sibling, else the next sibling of the nearest ancestor that has one,
/// else `None`.
pub fn next_item<'a>(forest: &'a [Item], id: &str, enter_children: bool) -> Option<&'a Item> {
    let path = locate(forest, id)?;
    if enter_children {
        let current = item_at(forest, &path)?;
        if !current.collapsed {
            if let Some(first_child) = current.children.first() {
                return Some(first_child);
            }
        }
    }

    for depth in (1..=path.len()).rev() {
        let index = path[depth - 1];
        let siblings = siblings_at(forest, &path[..depth - 1])?;
        if let Some(next) = siblings.get(index + 1) {
            return Some(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{next_item, next_sibling};
    use crate::model::item::{Item, ListType};
    use crate::outline::tree::relink_parents;

    fn node(id: &str, children: Vec<Item>) -> Item {
        let mut item = Item::new(id, None, ListType::Ordered);
        item.id = id.to_string();
        item.children = children;
        item
    }

    fn sample() -> Vec<Item> {
        let mut forest = vec![
            node("a", vec![node("a1", vec![node("a1x", vec![])]), node("a2", vec![])]),
            node("b", vec![node("b1", vec![])]),
        ];
        relink_parents(&mut forest);
        forest
    }

    fn id_of(item: Option<&Item>) -> Option<&str> {
        item.map(|item| item.id.as_str())
    }

    #[test]
    fn next_sibling_wraps_to_first() {
        let forest = sample();
        assert_eq!(id_of(next_sibling(&forest, "a")), Some("b"));
        assert_eq!(id_of(next_sibling(&forest, "b")), Some("a"));
        assert_eq!(id_of(next_sibling(&forest, "a2")), Some("a1"));
        assert_eq!(id_of(next_sibling(&forest, "b1")), None);
        assert_eq!(id_of(next_sibling(&forest, "missing")), None);
    }

    #[test]
    fn next_item_climbs_to_ancestor_siblings_without_wrapping() {
        let forest = sample();
        assert_eq!(id_of(next_item(&forest, "a1x", false)), Some("a2"));
        assert_eq!(id_of(next_item(&forest, "a2", false)), Some("b"));
        assert_eq!(id_of(next_item(&forest, "a", false)), Some("b"));
        assert_eq!(id_of(next_item(&forest, "b1", false)), None);
        assert_eq!(id_of(next_item(&forest, "b", false)), None);
    }

    #[test]
    fn next_item_enters_expanded_children_on_request() {
        let mut forest = sample();
        assert_eq!(id_of(next_item(&forest, "a", true)), Some("a1"));
        assert_eq!(id_of(next_item(&forest, "b", true)), Some("b1"));
        assert_eq!(id_of(next_item(&forest, "a2", true)), Some("b"));

        forest[0].collapsed = true;
        assert_eq!(id_of(next_item(&forest, "a", true)), Some("b"));
    }
}

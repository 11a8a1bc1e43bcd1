use std::sync::{Mutex, RwLock};

use crate::error::{RbacError, Result};
use crate::item::{Assignment, Edge, Item, ItemKind, Rule};

use super::Store;

#[derive(Debug, Default, Clone)]
struct Tables {
    items: Vec<Item>,
    rules: Vec<Rule>,
    edges: Vec<Edge>,
    assignments: Vec<Assignment>,
}

impl Tables {
    fn drop_item_refs(&mut self, names: &[String]) {
        self.edges
            .retain(|e| !names.contains(&e.parent) && !names.contains(&e.child));
        self.assignments.retain(|a| !names.contains(&a.item_name));
    }
}

/// In-process store. Tables are plain vectors so iteration order matches
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    hierarchy_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    fn get_item(&self, name: &str) -> Result<Option<Item>> {
        Ok(self.read().items.iter().find(|i| i.name == name).cloned())
    }

    fn get_items_by_kind(&self, kind: ItemKind) -> Result<Vec<Item>> {
        Ok(self
            .read()
            .items
            .iter()
            .filter(|i| i.kind == kind)
            .cloned()
            .collect())
    }

    fn get_all_items(&self) -> Result<Vec<Item>> {
        Ok(self.read().items.clone())
    }

    fn get_direct_children(&self, parent: &str) -> Result<Vec<(String, bool)>> {
        Ok(self
            .read()
            .edges
            .iter()
            .filter(|e| e.parent == parent)
            .map(|e| (e.child.clone(), e.allow))
            .collect())
    }

    fn get_all_edges(&self) -> Result<Vec<Edge>> {
        Ok(self.read().edges.clone())
    }

    fn has_edge(&self, parent: &str, child: &str) -> Result<bool> {
        Ok(self
            .read()
            .edges
            .iter()
            .any(|e| e.parent == parent && e.child == child))
    }

    fn get_user_assignments(&self, user_id: &str) -> Result<Vec<Assignment>> {
        Ok(self
            .read()
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get_assignment(&self, user_id: &str, item_name: &str) -> Result<Option<Assignment>> {
        Ok(self
            .read()
            .assignments
            .iter()
            .find(|a| a.user_id == user_id && a.item_name == item_name)
            .cloned())
    }

    fn get_user_ids_by_item(&self, item_name: &str) -> Result<Vec<String>> {
        Ok(self
            .read()
            .assignments
            .iter()
            .filter(|a| a.item_name == item_name)
            .map(|a| a.user_id.clone())
            .collect())
    }

    fn get_rule(&self, name: &str) -> Result<Option<Rule>> {
        Ok(self.read().rules.iter().find(|r| r.name == name).cloned())
    }

    fn get_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.read().rules.clone())
    }

    fn insert_item(&self, item: &Item) -> Result<()> {
        let mut t = self.write();
        if t.items.iter().any(|i| i.name == item.name) {
            return Err(RbacError::DuplicateItem {
                name: item.name.clone(),
            });
        }
        t.items.push(item.clone());
        Ok(())
    }

    fn update_item(&self, name: &str, item: &Item) -> Result<bool> {
        let mut t = self.write();
        if item.name != name && t.items.iter().any(|i| i.name == item.name) {
            return Err(RbacError::DuplicateItem {
                name: item.name.clone(),
            });
        }
        let Some(slot) = t.items.iter_mut().find(|i| i.name == name) else {
            return Ok(false);
        };
        *slot = item.clone();
        if item.name != name {
            for edge in t.edges.iter_mut() {
                if edge.parent == name {
                    edge.parent = item.name.clone();
                }
                if edge.child == name {
                    edge.child = item.name.clone();
                }
            }
            for a in t.assignments.iter_mut().filter(|a| a.item_name == name) {
                a.item_name = item.name.clone();
            }
        }
        Ok(true)
    }

    fn delete_item(&self, name: &str) -> Result<bool> {
        let mut t = self.write();
        let before = t.items.len();
        t.items.retain(|i| i.name != name);
        let removed = t.items.len() != before;
        t.drop_item_refs(&[name.to_string()]);
        Ok(removed)
    }

    fn delete_items_of_kind(&self, kind: ItemKind) -> Result<usize> {
        let mut t = self.write();
        let names: Vec<String> = t
            .items
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.name.clone())
            .collect();
        t.items.retain(|i| i.kind != kind);
        t.drop_item_refs(&names);
        Ok(names.len())
    }

    fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let mut t = self.write();
        if t.rules.iter().any(|r| r.name == rule.name) {
            return Err(RbacError::DuplicateRule {
                name: rule.name.clone(),
            });
        }
        t.rules.push(rule.clone());
        Ok(())
    }

    fn update_rule(&self, name: &str, rule: &Rule) -> Result<bool> {
        let mut t = self.write();
        if rule.name != name && t.rules.iter().any(|r| r.name == rule.name) {
            return Err(RbacError::DuplicateRule {
                name: rule.name.clone(),
            });
        }
        let Some(slot) = t.rules.iter_mut().find(|r| r.name == name) else {
            return Ok(false);
        };
        *slot = rule.clone();
        if rule.name != name {
            for item in t.items.iter_mut() {
                if item.rule_name.as_deref() == Some(name) {
                    item.rule_name = Some(rule.name.clone());
                }
            }
        }
        Ok(true)
    }

    fn delete_rule(&self, name: &str) -> Result<bool> {
        let mut t = self.write();
        let before = t.rules.len();
        t.rules.retain(|r| r.name != name);
        for item in t.items.iter_mut() {
            if item.rule_name.as_deref() == Some(name) {
                item.rule_name = None;
            }
        }
        Ok(t.rules.len() != before)
    }

    fn delete_all_rules(&self) -> Result<()> {
        let mut t = self.write();
        t.rules.clear();
        for item in t.items.iter_mut() {
            item.rule_name = None;
        }
        Ok(())
    }

    fn insert_edge(&self, edge: &Edge) -> Result<()> {
        let mut t = self.write();
        if t
            .edges
            .iter()
            .any(|e| e.parent == edge.parent && e.child == edge.child)
        {
            return Err(RbacError::DuplicateEdge {
                parent: edge.parent.clone(),
                child: edge.child.clone(),
            });
        }
        t.edges.push(edge.clone());
        Ok(())
    }

    fn delete_edge(&self, parent: &str, child: &str) -> Result<bool> {
        let mut t = self.write();
        let before = t.edges.len();
        t.edges.retain(|e| !(e.parent == parent && e.child == child));
        Ok(t.edges.len() != before)
    }

    fn delete_edges_of(&self, parent: &str) -> Result<bool> {
        let mut t = self.write();
        let before = t.edges.len();
        t.edges.retain(|e| e.parent != parent);
        Ok(t.edges.len() != before)
    }

    fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        self.write().assignments.push(assignment.clone());
        Ok(())
    }

    fn delete_assignment(&self, user_id: &str, item_name: &str) -> Result<bool> {
        let mut t = self.write();
        let before = t.assignments.len();
        t.assignments
            .retain(|a| !(a.user_id == user_id && a.item_name == item_name));
        Ok(t.assignments.len() != before)
    }

    fn delete_all_assignments_of(&self, user_id: &str) -> Result<bool> {
        let mut t = self.write();
        let before = t.assignments.len();
        t.assignments.retain(|a| a.user_id != user_id);
        Ok(t.assignments.len() != before)
    }

    fn delete_all_assignments(&self) -> Result<()> {
        self.write().assignments.clear();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.write() = Tables::default();
        Ok(())
    }

    fn hierarchy_lock(&self) -> &Mutex<()> {
        &self.hierarchy_lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_item(&Item::role("editor")).unwrap();
        store.insert_item(&Item::permission("publish")).unwrap();
        store.insert_edge(&Edge::new("editor", "publish", true)).unwrap();
        store.insert_assignment(&Assignment::new("42", "editor")).unwrap();
        store
    }

    #[test]
    fn rename_cascades_to_edges_and_assignments() {
        let store = seeded();
        let mut renamed = Item::role("author");
        renamed.description = Some("was editor".into());
        assert!(store.update_item("editor", &renamed).unwrap());

        assert!(store.get_item("editor").unwrap().is_none());
        assert!(store.has_edge("author", "publish").unwrap());
        assert!(store.get_assignment("42", "author").unwrap().is_some());
    }

    #[test]
    fn delete_cascades() {
        let store = seeded();
        assert!(store.delete_item("editor").unwrap());
        assert!(store.get_all_edges().unwrap().is_empty());
        assert!(store.get_user_assignments("42").unwrap().is_empty());
        assert!(!store.delete_item("editor").unwrap());
    }

    #[test]
    fn duplicate_names_rejected_across_kinds() {
        let store = seeded();
        let err = store.insert_item(&Item::permission("editor")).unwrap_err();
        assert!(matches!(err, RbacError::DuplicateItem { .. }));
    }

    #[test]
    fn deleting_rule_clears_references() {
        let store = MemoryStore::new();
        store.insert_rule(&Rule::new("is_author", "match_params")).unwrap();
        store
            .insert_item(&Item::permission("edit_post").with_rule("is_author"))
            .unwrap();
        assert!(store.delete_rule("is_author").unwrap());
        assert_eq!(store.get_item("edit_post").unwrap().unwrap().rule_name, None);
    }

    #[test]
    fn children_keep_insertion_order() {
        let store = seeded();
        store.insert_item(&Item::permission("archive")).unwrap();
        store.insert_edge(&Edge::new("editor", "archive", false)).unwrap();
        assert_eq!(
            store.get_direct_children("editor").unwrap(),
            vec![("publish".to_string(), true), ("archive".to_string(), false)]
        );
    }
}

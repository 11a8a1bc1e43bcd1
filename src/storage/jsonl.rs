use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RbacError, Result};
use crate::item::{Assignment, Edge, Item, ItemKind, Rule};

use super::Store;

/// The four tables, one JSONL file each.
#[derive(Debug, Clone, Copy)]
enum Table {
    Items,
    Rules,
    Edges,
    Assignments,
}

impl Table {
    fn file_name(self) -> &'static str {
        match self {
            Table::Items => "items.jsonl",
            Table::Rules => "rules.jsonl",
            Table::Edges => "edges.jsonl",
            Table::Assignments => "assignments.jsonl",
        }
    }

    const ALL: [Table; 4] = [Table::Items, Table::Rules, Table::Edges, Table::Assignments];
}

/// JSONL-based store. Inserts append; updates and deletes rewrite the file.
pub struct JsonlStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    hierarchy_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
            hierarchy_lock: Mutex::new(()),
        }
    }

    /// Create the root directory and empty table files.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        for table in Table::ALL {
            let path = self.path(table);
            if !path.exists() {
                fs::File::create(&path)?;
            }
        }
        Ok(())
    }

    fn path(&self, table: Table) -> PathBuf {
        self.root.join(table.file_name())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read all records from a JSONL file, skipping malformed lines.
    fn read_jsonl_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "skipping malformed line {} in {}: {}",
                        line_num + 1,
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(records)
    }

    /// Append a record to a JSONL file, creating parent dirs if needed.
    fn append_jsonl_file<T: Serialize>(path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Replace a JSONL file's contents via a temp file and rename.
    fn rewrite_jsonl_file<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("jsonl.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            for record in records {
                let json = serde_json::to_string(record)?;
                writeln!(file, "{}", json)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path).map_err(|e| RbacError::Storage {
            reason: format!("failed to replace {}: {}", path.display(), e),
        })
    }

    fn load<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>> {
        Self::read_jsonl_file(&self.path(table))
    }

    fn save<T: Serialize>(&self, table: Table, records: &[T]) -> Result<()> {
        Self::rewrite_jsonl_file(&self.path(table), records)
    }

    fn append<T: Serialize>(&self, table: Table, record: &T) -> Result<()> {
        Self::append_jsonl_file(&self.path(table), record)
    }

    /// Drop edges and assignments naming any of `names`.
    fn drop_item_refs(&self, names: &[String]) -> Result<()> {
        let edges: Vec<Edge> = self.load(Table::Edges)?;
        let kept: Vec<&Edge> = edges
            .iter()
            .filter(|e| !names.contains(&e.parent) && !names.contains(&e.child))
            .collect();
        if kept.len() != edges.len() {
            self.save(Table::Edges, &kept)?;
        }

        let assignments: Vec<Assignment> = self.load(Table::Assignments)?;
        let kept: Vec<&Assignment> = assignments
            .iter()
            .filter(|a| !names.contains(&a.item_name))
            .collect();
        if kept.len() != assignments.len() {
            self.save(Table::Assignments, &kept)?;
        }
        Ok(())
    }

    /// Remove records matching `predicate`; returns how many went.
    fn delete_where<T, F>(&self, table: Table, predicate: F) -> Result<usize>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let records: Vec<T> = self.load(table)?;
        let before = records.len();
        let kept: Vec<T> = records.into_iter().filter(|r| !predicate(r)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.save(table, &kept)?;
        }
        Ok(removed)
    }
}

impl Store for JsonlStore {
    fn get_item(&self, name: &str) -> Result<Option<Item>> {
        let items: Vec<Item> = self.load(Table::Items)?;
        Ok(items.into_iter().find(|i| i.name == name))
    }

    fn get_items_by_kind(&self, kind: ItemKind) -> Result<Vec<Item>> {
        let items: Vec<Item> = self.load(Table::Items)?;
        Ok(items.into_iter().filter(|i| i.kind == kind).collect())
    }

    fn get_all_items(&self) -> Result<Vec<Item>> {
        self.load(Table::Items)
    }

    fn get_direct_children(&self, parent: &str) -> Result<Vec<(String, bool)>> {
        let edges: Vec<Edge> = self.load(Table::Edges)?;
        Ok(edges
            .into_iter()
            .filter(|e| e.parent == parent)
            .map(|e| (e.child, e.allow))
            .collect())
    }

    fn get_all_edges(&self) -> Result<Vec<Edge>> {
        self.load(Table::Edges)
    }

    fn has_edge(&self, parent: &str, child: &str) -> Result<bool> {
        let edges: Vec<Edge> = self.load(Table::Edges)?;
        Ok(edges.iter().any(|e| e.parent == parent && e.child == child))
    }

    fn get_user_assignments(&self, user_id: &str) -> Result<Vec<Assignment>> {
        let all: Vec<Assignment> = self.load(Table::Assignments)?;
        Ok(all.into_iter().filter(|a| a.user_id == user_id).collect())
    }

    fn get_assignment(&self, user_id: &str, item_name: &str) -> Result<Option<Assignment>> {
        let all: Vec<Assignment> = self.load(Table::Assignments)?;
        Ok(all
            .into_iter()
            .find(|a| a.user_id == user_id && a.item_name == item_name))
    }

    fn get_user_ids_by_item(&self, item_name: &str) -> Result<Vec<String>> {
        let all: Vec<Assignment> = self.load(Table::Assignments)?;
        Ok(all
            .into_iter()
            .filter(|a| a.item_name == item_name)
            .map(|a| a.user_id)
            .collect())
    }

    fn get_rule(&self, name: &str) -> Result<Option<Rule>> {
        let rules: Vec<Rule> = self.load(Table::Rules)?;
        Ok(rules.into_iter().find(|r| r.name == name))
    }

    fn get_rules(&self) -> Result<Vec<Rule>> {
        self.load(Table::Rules)
    }

    fn insert_item(&self, item: &Item) -> Result<()> {
        let _guard = self.lock();
        if self.get_item(&item.name)?.is_some() {
            return Err(RbacError::DuplicateItem {
                name: item.name.clone(),
            });
        }
        self.append(Table::Items, item)
    }

    fn update_item(&self, name: &str, item: &Item) -> Result<bool> {
        let _guard = self.lock();
        let mut items: Vec<Item> = self.load(Table::Items)?;
        if item.name != name && items.iter().any(|i| i.name == item.name) {
            return Err(RbacError::DuplicateItem {
                name: item.name.clone(),
            });
        }
        let Some(slot) = items.iter_mut().find(|i| i.name == name) else {
            return Ok(false);
        };
        *slot = item.clone();
        self.save(Table::Items, &items)?;

        if item.name != name {
            let mut edges: Vec<Edge> = self.load(Table::Edges)?;
            for edge in edges.iter_mut() {
                if edge.parent == name {
                    edge.parent = item.name.clone();
                }
                if edge.child == name {
                    edge.child = item.name.clone();
                }
            }
            self.save(Table::Edges, &edges)?;

            let mut assignments: Vec<Assignment> = self.load(Table::Assignments)?;
            for a in assignments.iter_mut().filter(|a| a.item_name == name) {
                a.item_name = item.name.clone();
            }
            self.save(Table::Assignments, &assignments)?;
        }
        Ok(true)
    }

    fn delete_item(&self, name: &str) -> Result<bool> {
        let _guard = self.lock();
        let removed = self.delete_where(Table::Items, |i: &Item| i.name == name)?;
        self.drop_item_refs(&[name.to_string()])?;
        Ok(removed > 0)
    }

    fn delete_items_of_kind(&self, kind: ItemKind) -> Result<usize> {
        let _guard = self.lock();
        let names: Vec<String> = self
            .get_items_by_kind(kind)?
            .into_iter()
            .map(|i| i.name)
            .collect();
        if names.is_empty() {
            return Ok(0);
        }
        self.delete_where(Table::Items, |i: &Item| i.kind == kind)?;
        self.drop_item_refs(&names)?;
        Ok(names.len())
    }

    fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let _guard = self.lock();
        if self.get_rule(&rule.name)?.is_some() {
            return Err(RbacError::DuplicateRule {
                name: rule.name.clone(),
            });
        }
        self.append(Table::Rules, rule)
    }

    fn update_rule(&self, name: &str, rule: &Rule) -> Result<bool> {
        let _guard = self.lock();
        let mut rules: Vec<Rule> = self.load(Table::Rules)?;
        if rule.name != name && rules.iter().any(|r| r.name == rule.name) {
            return Err(RbacError::DuplicateRule {
                name: rule.name.clone(),
            });
        }
        let Some(slot) = rules.iter_mut().find(|r| r.name == name) else {
            return Ok(false);
        };
        *slot = rule.clone();
        self.save(Table::Rules, &rules)?;

        if rule.name != name {
            let mut items: Vec<Item> = self.load(Table::Items)?;
            for item in items.iter_mut() {
                if item.rule_name.as_deref() == Some(name) {
                    item.rule_name = Some(rule.name.clone());
                }
            }
            self.save(Table::Items, &items)?;
        }
        Ok(true)
    }

    fn delete_rule(&self, name: &str) -> Result<bool> {
        let _guard = self.lock();
        let removed = self.delete_where(Table::Rules, |r: &Rule| r.name == name)?;
        let mut items: Vec<Item> = self.load(Table::Items)?;
        let mut touched = false;
        for item in items.iter_mut() {
            if item.rule_name.as_deref() == Some(name) {
                item.rule_name = None;
                touched = true;
            }
        }
        if touched {
            self.save(Table::Items, &items)?;
        }
        Ok(removed > 0)
    }

    fn delete_all_rules(&self) -> Result<()> {
        let _guard = self.lock();
        self.save::<Rule>(Table::Rules, &[])?;
        let mut items: Vec<Item> = self.load(Table::Items)?;
        for item in items.iter_mut() {
            item.rule_name = None;
        }
        self.save(Table::Items, &items)
    }

    fn insert_edge(&self, edge: &Edge) -> Result<()> {
        let _guard = self.lock();
        if self.has_edge(&edge.parent, &edge.child)? {
            return Err(RbacError::DuplicateEdge {
                parent: edge.parent.clone(),
                child: edge.child.clone(),
            });
        }
        self.append(Table::Edges, edge)
    }

    fn delete_edge(&self, parent: &str, child: &str) -> Result<bool> {
        let _guard = self.lock();
        let removed = self.delete_where(Table::Edges, |e: &Edge| {
            e.parent == parent && e.child == child
        })?;
        Ok(removed > 0)
    }

    fn delete_edges_of(&self, parent: &str) -> Result<bool> {
        let _guard = self.lock();
        let removed = self.delete_where(Table::Edges, |e: &Edge| e.parent == parent)?;
        Ok(removed > 0)
    }

    fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        let _guard = self.lock();
        self.append(Table::Assignments, assignment)
    }

    fn delete_assignment(&self, user_id: &str, item_name: &str) -> Result<bool> {
        let _guard = self.lock();
        let removed = self.delete_where(Table::Assignments, |a: &Assignment| {
            a.user_id == user_id && a.item_name == item_name
        })?;
        Ok(removed > 0)
    }

    fn delete_all_assignments_of(&self, user_id: &str) -> Result<bool> {
        let _guard = self.lock();
        let removed =
            self.delete_where(Table::Assignments, |a: &Assignment| a.user_id == user_id)?;
        Ok(removed > 0)
    }

    fn delete_all_assignments(&self) -> Result<()> {
        let _guard = self.lock();
        self.save::<Assignment>(Table::Assignments, &[])
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock();
        for table in Table::ALL {
            let path = self.path(table);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn hierarchy_lock(&self) -> &Mutex<()> {
        &self.hierarchy_lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> JsonlStore {
        let store = JsonlStore::new(tmp.path().join("data"));
        store.init().unwrap();
        store
    }

    #[test]
    fn test_init_creates_table_files() {
        let tmp = TempDir::new().unwrap();
        let _store = store(&tmp);
        for name in ["items.jsonl", "rules.jsonl", "edges.jsonl", "assignments.jsonl"] {
            assert!(tmp.path().join("data").join(name).exists());
        }
    }

    #[test]
    fn test_save_and_load_item() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store
            .insert_item(&Item::role("editor").with_description("edits posts"))
            .unwrap();

        let loaded = store.get_item("editor").unwrap().unwrap();
        assert_eq!(loaded.kind, ItemKind::Role);
        assert_eq!(loaded.description.as_deref(), Some("edits posts"));
        assert!(store.get_item("missing").unwrap().is_none());
    }

    #[test]
    fn test_rename_cascades() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.insert_item(&Item::role("editor")).unwrap();
        store.insert_item(&Item::permission("publish")).unwrap();
        store.insert_edge(&Edge::new("editor", "publish", true)).unwrap();
        store.insert_assignment(&Assignment::new("7", "editor")).unwrap();

        assert!(store.update_item("editor", &Item::role("writer")).unwrap());

        assert_eq!(
            store.get_direct_children("writer").unwrap(),
            vec![("publish".to_string(), true)]
        );
        assert_eq!(store.get_user_ids_by_item("writer").unwrap(), vec!["7"]);
    }

    #[test]
    fn test_delete_kind_cascades() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.insert_item(&Item::role("editor")).unwrap();
        store.insert_item(&Item::permission("publish")).unwrap();
        store.insert_edge(&Edge::new("editor", "publish", true)).unwrap();
        store.insert_assignment(&Assignment::new("7", "publish")).unwrap();

        assert_eq!(store.delete_items_of_kind(ItemKind::Permission).unwrap(), 1);
        assert!(store.get_all_edges().unwrap().is_empty());
        assert!(store.get_user_assignments("7").unwrap().is_empty());
        assert!(store.get_item("editor").unwrap().is_some());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.insert_item(&Item::permission("read")).unwrap();
        let path = tmp.path().join("data").join("items.jsonl");
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{not json\n");
        std::fs::write(&path, contents).unwrap();

        assert_eq!(store.get_all_items().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.insert_edge(&Edge::new("a", "b", true)).unwrap();
        let err = store.insert_edge(&Edge::new("a", "b", false)).unwrap_err();
        assert!(matches!(err, RbacError::DuplicateEdge { .. }));
    }
}

pub mod jsonl;
pub mod memory;

use std::sync::Mutex;

use crate::error::Result;
use crate::item::{Assignment, Edge, Item, ItemKind, Rule};

/// Backend holding items, rules, edges and assignments.
///
/// Implementations cascade natively: renaming or deleting an item rewrites
/// or removes every edge and assignment naming it, and renaming or deleting
/// a rule rewrites or clears every `rule_name` pointing at it.
pub trait Store: Send + Sync {
    /// Fetch one item by name.
    fn get_item(&self, name: &str) -> Result<Option<Item>>;

    /// All items of one kind, in storage order.
    fn get_items_by_kind(&self, kind: ItemKind) -> Result<Vec<Item>>;

    /// Every item, in storage order.
    fn get_all_items(&self) -> Result<Vec<Item>>;

    /// Direct children of a parent as (child, allow), in insertion order.
    fn get_direct_children(&self, parent: &str) -> Result<Vec<(String, bool)>>;

    /// Every parent -> child edge.
    fn get_all_edges(&self) -> Result<Vec<Edge>>;

    /// Whether a direct edge exists.
    fn has_edge(&self, parent: &str, child: &str) -> Result<bool>;

    /// A user's direct assignments, in insertion order.
    fn get_user_assignments(&self, user_id: &str) -> Result<Vec<Assignment>>;

    /// One assignment, if the user holds the item directly.
    fn get_assignment(&self, user_id: &str, item_name: &str) -> Result<Option<Assignment>>;

    /// Users holding the item directly.
    fn get_user_ids_by_item(&self, item_name: &str) -> Result<Vec<String>>;

    fn get_rule(&self, name: &str) -> Result<Option<Rule>>;

    fn get_rules(&self) -> Result<Vec<Rule>>;

    /// Insert a new item. Fails with `DuplicateItem` if the name is taken.
    fn insert_item(&self, item: &Item) -> Result<()>;

    /// Replace the item stored under `name`; a rename cascades.
    fn update_item(&self, name: &str, item: &Item) -> Result<bool>;

    /// Delete an item with its edges and assignments.
    fn delete_item(&self, name: &str) -> Result<bool>;

    /// Delete every item of one kind with their edges and assignments.
    fn delete_items_of_kind(&self, kind: ItemKind) -> Result<usize>;

    fn insert_rule(&self, rule: &Rule) -> Result<()>;

    /// Replace the rule stored under `name`; a rename cascades to items.
    fn update_rule(&self, name: &str, rule: &Rule) -> Result<bool>;

    /// Delete a rule and clear item references to it.
    fn delete_rule(&self, name: &str) -> Result<bool>;

    fn delete_all_rules(&self) -> Result<()>;

    fn insert_edge(&self, edge: &Edge) -> Result<()>;

    fn delete_edge(&self, parent: &str, child: &str) -> Result<bool>;

    /// Delete all outgoing edges of a parent.
    fn delete_edges_of(&self, parent: &str) -> Result<bool>;

    fn insert_assignment(&self, assignment: &Assignment) -> Result<()>;

    fn delete_assignment(&self, user_id: &str, item_name: &str) -> Result<bool>;

    fn delete_all_assignments_of(&self, user_id: &str) -> Result<bool>;

    fn delete_all_assignments(&self) -> Result<()>;

    /// Remove everything.
    fn clear(&self) -> Result<()>;

    /// Serializes hierarchy validation and edge insertion. Every manager
    /// writing through this store holds it across the loop check and the
    /// insert.
    fn hierarchy_lock(&self) -> &Mutex<()>;
}

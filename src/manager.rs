use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::access::{AccessChecker, Resolution, SnapshotSource, StoreSource};
use crate::cache::{CacheBackend, CacheState, CacheStats, GraphCache};
use crate::config::EngineConfig;
use crate::error::{RbacError, Result};
use crate::hierarchy::{self, children_closure, ChildrenList, Closure};
use crate::item::{is_empty_user_id, Assignment, Assignments, ChildItem, Edge, Item, ItemKind, Params, Rule};
use crate::rule::{execute_item_rule, RuleExecutor, RuleRegistry, UnsetRule};
use crate::storage::Store;

/// The authorization manager: access checks, hierarchy mutation,
/// assignments and item/rule management over an injected store and cache.
pub struct Manager {
    store: Arc<dyn Store>,
    cache: Arc<GraphCache>,
    rules: Arc<dyn RuleExecutor>,
    config: EngineConfig,
}

impl Manager {
    /// A manager with built-in rules and no cache backend.
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self {
            store,
            cache: Arc::new(GraphCache::disabled()),
            rules: Arc::new(RuleRegistry::with_builtins()),
            config,
        }
    }

    /// Use `backend` for the graph snapshot, unless caching is disabled in config.
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        if self.config.cache.enabled {
            self.cache = Arc::new(GraphCache::new(backend, self.config.cache.key.clone()));
        }
        self
    }

    /// Share one snapshot holder with other managers over the same store,
    /// unless caching is disabled in config.
    pub fn with_cache(mut self, cache: Arc<GraphCache>) -> Self {
        if self.config.cache.enabled {
            self.cache = cache;
        }
        self
    }

    pub fn with_rules(mut self, rules: Arc<dyn RuleExecutor>) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    // -----------------------------------------------------------------------
    // Access checks
    // -----------------------------------------------------------------------

    /// Whether `user_id` holds `target`, directly or through the hierarchy.
    pub fn check_access(&self, user_id: &str, target: &str, params: &Params) -> Result<bool> {
        Ok(self
            .explain_access(user_id, target, params)?
            .is_some_and(|r| r.granted()))
    }

    /// The raw walk result behind `check_access`. `None` when the user has
    /// no assignments or the target does not exist.
    pub fn explain_access(
        &self,
        user_id: &str,
        target: &str,
        params: &Params,
    ) -> Result<Option<Resolution>> {
        let assignments = self.effective_assignments(user_id)?;
        if assignments.is_empty() {
            return Ok(None);
        }

        if self.config.cache.auto_warm {
            self.cache.load_if_cold(self.store.as_ref())?;
        }

        let checker = AccessChecker::new(self.rules.as_ref(), self.config.max_depth);
        let resolution = match self.cache.snapshot()? {
            Some(snapshot) => {
                let Some(item) = snapshot.items.get(target) else {
                    return Ok(None);
                };
                trace_check(item);
                checker.resolve(
                    &SnapshotSource::new(&snapshot),
                    user_id,
                    item,
                    params,
                    &assignments,
                )?
            }
            None => {
                let Some(item) = self.store.get_item(target)? else {
                    return Ok(None);
                };
                trace_check(&item);
                checker.resolve(
                    &StoreSource::new(self.store.as_ref()),
                    user_id,
                    &item,
                    params,
                    &assignments,
                )?
            }
        };
        Ok(Some(resolution))
    }

    /// The set a check starts from: stored assignments, or the configured
    /// default roles that exist when the user id is empty.
    pub fn effective_assignments(&self, user_id: &str) -> Result<Assignments> {
        let mut assignments = Assignments::new();
        if is_empty_user_id(user_id) {
            for role in &self.config.default_roles {
                if self.store.get_item(role)?.is_some() {
                    assignments.insert(role.clone(), true);
                }
            }
            return Ok(assignments);
        }
        for a in self.store.get_user_assignments(user_id)? {
            assignments.insert(a.item_name, true);
        }
        Ok(assignments)
    }

    /// Run the rule attached to `item`. An item without a rule passes.
    pub fn execute_rule(&self, user_id: &str, item: &Item, params: &Params) -> Result<bool> {
        execute_item_rule(
            self.rules.as_ref(),
            |name| self.get_rule(name),
            user_id,
            item,
            params,
            UnsetRule::Grant,
        )
    }

    // -----------------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------------

    /// Add `child` under `parent`. Rejects self-reference, a permission
    /// parenting a role, and loops before anything is written.
    pub fn add_child(&self, parent: &str, child: &str, allow: bool) -> Result<()> {
        let parent_item = self.require_item(parent)?;
        let child_item = self.require_item(child)?;

        {
            let _guard = self
                .store
                .hierarchy_lock()
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            hierarchy::validate_child(
                self.store.as_ref(),
                &parent_item,
                &child_item,
                self.config.max_depth,
            )?;
            self.store.insert_edge(&Edge::new(parent, child, allow))?;
        }
        tracing::debug!(parent, child, allow, "child added");
        self.cache.invalidate()
    }

    /// Whether `add_child(parent, child)` would be accepted.
    pub fn can_add_child(&self, parent: &str, child: &str) -> Result<bool> {
        let parent_item = self.require_item(parent)?;
        let child_item = self.require_item(child)?;
        match hierarchy::validate_child(
            self.store.as_ref(),
            &parent_item,
            &child_item,
            self.config.max_depth,
        ) {
            Ok(()) => Ok(true),
            Err(e) if e.is_invalid_operation() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn remove_child(&self, parent: &str, child: &str) -> Result<bool> {
        let removed = self.store.delete_edge(parent, child)?;
        self.cache.invalidate()?;
        Ok(removed)
    }

    /// Remove every outgoing edge of `parent`.
    pub fn remove_children(&self, parent: &str) -> Result<bool> {
        let removed = self.store.delete_edges_of(parent)?;
        self.cache.invalidate()?;
        Ok(removed)
    }

    /// Direct edge only, not transitive.
    pub fn has_child(&self, parent: &str, child: &str) -> Result<bool> {
        self.store.has_edge(parent, child)
    }

    /// Direct children with their edge flags.
    pub fn get_children(&self, name: &str) -> Result<Vec<ChildItem>> {
        let mut children = Vec::new();
        for (child, allow) in self.store.get_direct_children(name)? {
            if let Some(item) = self.store.get_item(&child)? {
                children.push(ChildItem { item, allow });
            }
        }
        Ok(children)
    }

    /// Descendants of `root` with their effective allow flags.
    pub fn children_closure(&self, root: &str) -> Result<Closure> {
        let list = ChildrenList::load(self.store.as_ref())?;
        let mut result = Closure::new();
        children_closure(root, &list, &mut result, self.config.max_depth)?;
        Ok(result)
    }

    /// The role itself plus every role below it reached with allow set.
    pub fn get_child_roles(&self, role_name: &str) -> Result<BTreeMap<String, Item>> {
        let role = self.get_role(role_name)?.ok_or_else(|| RbacError::RoleNotFound {
            name: role_name.to_string(),
        })?;
        let closure = self.children_closure(role_name)?;

        let mut roles = BTreeMap::new();
        for item in self.get_roles()? {
            if closure.get(&item.name) == Some(true) {
                roles.insert(item.name.clone(), item);
            }
        }
        roles.insert(role.name.clone(), role);
        Ok(roles)
    }

    /// Permissions anywhere below `role_name`.
    pub fn get_permissions_by_role(&self, role_name: &str) -> Result<BTreeMap<String, Item>> {
        let closure = self.children_closure(role_name)?;
        if closure.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .store
            .get_items_by_kind(ItemKind::Permission)?
            .into_iter()
            .filter(|p| closure.contains(&p.name))
            .map(|p| (p.name.clone(), p))
            .collect())
    }

    /// Permissions inherited through the user's assignments, with the flag
    /// each was first reached with.
    pub fn get_permissions_by_user(&self, user_id: &str) -> Result<BTreeMap<String, ChildItem>> {
        if is_empty_user_id(user_id) {
            return Ok(BTreeMap::new());
        }
        let list = ChildrenList::load(self.store.as_ref())?;
        let mut closure = Closure::new();
        for a in self.store.get_user_assignments(user_id)? {
            children_closure(&a.item_name, &list, &mut closure, self.config.max_depth)?;
        }
        if closure.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .store
            .get_items_by_kind(ItemKind::Permission)?
            .into_iter()
            .filter_map(|item| {
                let allow = closure.get(&item.name)?;
                Some((item.name.clone(), ChildItem { item, allow }))
            })
            .collect())
    }

    /// Roles assigned to the user plus the default roles.
    pub fn get_roles_by_user(&self, user_id: &str) -> Result<BTreeMap<String, Item>> {
        if is_empty_user_id(user_id) {
            return Ok(BTreeMap::new());
        }
        let mut roles = BTreeMap::new();
        for a in self.store.get_user_assignments(user_id)? {
            if let Some(item) = self.store.get_item(&a.item_name)? {
                if item.kind.is_role_like() {
                    roles.insert(item.name.clone(), item);
                }
            }
        }
        roles.extend(self.default_role_instances()?);
        Ok(roles)
    }

    /// Users holding `item_name` directly.
    pub fn get_user_ids_by_role(&self, item_name: &str) -> Result<Vec<String>> {
        if item_name.is_empty() {
            return Ok(Vec::new());
        }
        self.store.get_user_ids_by_item(item_name)
    }

    // -----------------------------------------------------------------------
    // Assignments
    // -----------------------------------------------------------------------

    /// Assign `item_name` to `user_id`. Assigning twice returns the
    /// existing assignment.
    pub fn assign(&self, item_name: &str, user_id: &str) -> Result<Assignment> {
        if is_empty_user_id(user_id) {
            return Err(RbacError::InvalidInput {
                reason: "cannot assign to an empty user id".into(),
            });
        }
        self.require_item(item_name)?;
        if let Some(existing) = self.store.get_assignment(user_id, item_name)? {
            return Ok(existing);
        }
        let assignment = Assignment::new(user_id, item_name);
        self.store.insert_assignment(&assignment)?;
        tracing::debug!(user_id, item_name, "assigned");
        Ok(assignment)
    }

    /// Returns false when nothing was assigned or the user id is empty.
    pub fn revoke(&self, item_name: &str, user_id: &str) -> Result<bool> {
        if is_empty_user_id(user_id) {
            return Ok(false);
        }
        self.store.delete_assignment(user_id, item_name)
    }

    pub fn revoke_all(&self, user_id: &str) -> Result<bool> {
        if is_empty_user_id(user_id) {
            return Ok(false);
        }
        self.store.delete_all_assignments_of(user_id)
    }

    pub fn get_assignment(&self, item_name: &str, user_id: &str) -> Result<Option<Assignment>> {
        if is_empty_user_id(user_id) {
            return Ok(None);
        }
        self.store.get_assignment(user_id, item_name)
    }

    pub fn get_assignments(&self, user_id: &str) -> Result<Vec<Assignment>> {
        if is_empty_user_id(user_id) {
            return Ok(Vec::new());
        }
        self.store.get_user_assignments(user_id)
    }

    pub fn remove_all_assignments(&self) -> Result<()> {
        self.store.delete_all_assignments()
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Add an item. A `rule_name` naming a missing rule creates it when
    /// the executor has a predicate of that kind.
    pub fn add_item(&self, item: Item) -> Result<()> {
        self.ensure_rule(&item)?;
        self.store.insert_item(&item)?;
        tracing::debug!(name = %item.name, kind = %item.kind, "item added");
        self.cache.invalidate()
    }

    /// Replace the item stored as `name`. Renames cascade to edges and
    /// assignments.
    pub fn update_item(&self, name: &str, mut item: Item) -> Result<bool> {
        self.ensure_rule(&item)?;
        item.updated_at = Utc::now();
        let updated = self.store.update_item(name, &item)?;
        tracing::debug!(name, new_name = %item.name, updated, "item updated");
        self.cache.invalidate()?;
        Ok(updated)
    }

    pub fn remove_item(&self, name: &str) -> Result<bool> {
        let removed = self.store.delete_item(name)?;
        tracing::debug!(name, removed, "item removed");
        self.cache.invalidate()?;
        Ok(removed)
    }

    pub fn get_item(&self, name: &str) -> Result<Option<Item>> {
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(snapshot) = self.cache.snapshot()? {
            return Ok(snapshot.items.get(name).cloned());
        }
        self.store.get_item(name)
    }

    pub fn get_permission(&self, name: &str) -> Result<Option<Item>> {
        Ok(self
            .get_item(name)?
            .filter(|i| i.kind == ItemKind::Permission))
    }

    /// Roles and custom roles.
    pub fn get_role(&self, name: &str) -> Result<Option<Item>> {
        Ok(self.get_item(name)?.filter(|i| i.kind.is_role_like()))
    }

    pub fn get_custom_role(&self, name: &str) -> Result<Option<Item>> {
        Ok(self
            .get_item(name)?
            .filter(|i| i.kind == ItemKind::CustomRole))
    }

    /// Roles followed by custom roles.
    pub fn get_roles(&self) -> Result<Vec<Item>> {
        let mut roles = self.store.get_items_by_kind(ItemKind::Role)?;
        roles.extend(self.store.get_items_by_kind(ItemKind::CustomRole)?);
        Ok(roles)
    }

    pub fn get_custom_roles(&self) -> Result<Vec<Item>> {
        self.store.get_items_by_kind(ItemKind::CustomRole)
    }

    pub fn get_permissions(&self) -> Result<Vec<Item>> {
        self.store.get_items_by_kind(ItemKind::Permission)
    }

    /// Configured default roles, stored version where one exists.
    pub fn default_role_instances(&self) -> Result<BTreeMap<String, Item>> {
        let mut roles = BTreeMap::new();
        for name in &self.config.default_roles {
            let item = self
                .store
                .get_item(name)?
                .unwrap_or_else(|| Item::role(name.clone()));
            roles.insert(name.clone(), item);
        }
        Ok(roles)
    }

    pub fn remove_all_permissions(&self) -> Result<()> {
        self.remove_all_of(ItemKind::Permission)
    }

    /// Removes roles and custom roles.
    pub fn remove_all_roles(&self) -> Result<()> {
        self.remove_all_of(ItemKind::Role)?;
        self.remove_all_of(ItemKind::CustomRole)
    }

    fn remove_all_of(&self, kind: ItemKind) -> Result<()> {
        let removed = self.store.delete_items_of_kind(kind)?;
        tracing::debug!(%kind, removed, "items removed");
        self.cache.invalidate()
    }

    /// Wipe items, rules, edges and assignments.
    pub fn remove_all(&self) -> Result<()> {
        self.store.clear()?;
        tracing::debug!("all authorization data removed");
        self.cache.invalidate()
    }

    fn require_item(&self, name: &str) -> Result<Item> {
        self.store
            .get_item(name)?
            .ok_or_else(|| RbacError::ItemNotFound {
                name: name.to_string(),
            })
    }

    fn ensure_rule(&self, item: &Item) -> Result<()> {
        let Some(rule_name) = item.rule_name.as_deref() else {
            return Ok(());
        };
        if self.store.get_rule(rule_name)?.is_some() {
            return Ok(());
        }
        if !self.rules.supports(rule_name) {
            return Err(RbacError::RuleNotFound {
                name: rule_name.to_string(),
            });
        }
        self.add_rule(Rule::new(rule_name, rule_name))
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    pub fn add_rule(&self, rule: Rule) -> Result<()> {
        self.store.insert_rule(&rule)?;
        tracing::debug!(name = %rule.name, kind = %rule.kind, "rule added");
        self.cache.invalidate()
    }

    /// Replace the rule stored as `name`. Renames cascade to items.
    pub fn update_rule(&self, name: &str, mut rule: Rule) -> Result<bool> {
        rule.updated_at = Utc::now();
        let updated = self.store.update_rule(name, &rule)?;
        self.cache.invalidate()?;
        Ok(updated)
    }

    /// Remove a rule; items referencing it lose the reference.
    pub fn remove_rule(&self, name: &str) -> Result<bool> {
        let removed = self.store.delete_rule(name)?;
        self.cache.invalidate()?;
        Ok(removed)
    }

    pub fn remove_all_rules(&self) -> Result<()> {
        self.store.delete_all_rules()?;
        self.cache.invalidate()
    }

    pub fn get_rule(&self, name: &str) -> Result<Option<Rule>> {
        if let Some(snapshot) = self.cache.snapshot()? {
            return Ok(snapshot.rules.get(name).cloned());
        }
        self.store.get_rule(name)
    }

    pub fn get_rules(&self) -> Result<Vec<Rule>> {
        if let Some(snapshot) = self.cache.snapshot()? {
            let mut rules: Vec<Rule> = snapshot.rules.values().cloned().collect();
            rules.sort_by(|a, b| a.name.cmp(&b.name));
            return Ok(rules);
        }
        self.store.get_rules()
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    /// Warm the graph cache now.
    pub fn load_cache(&self) -> Result<()> {
        self.cache.load_if_cold(self.store.as_ref())
    }

    pub fn invalidate_cache(&self) -> Result<()> {
        self.cache.invalidate()
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Cache state including snapshots written by other instances.
    pub fn shared_cache_state(&self) -> Result<CacheState> {
        self.cache.shared_state()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn trace_check(item: &Item) {
    if item.kind.is_role_like() {
        tracing::trace!("Checking role: {}", item.name);
    } else {
        tracing::trace!("Checking permission: {}", item.name);
    }
}

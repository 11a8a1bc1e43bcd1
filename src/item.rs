use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters passed to rules during an access check.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Reserved parameter carrying the allow flag inherited from the parent edge.
pub const ALLOW_PARAM: &str = "allow";

/// The three kinds of authorization item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Permission,
    Role,
    CustomRole,
}

impl ItemKind {
    /// Roles and custom roles behave identically in the hierarchy.
    pub fn is_role_like(&self) -> bool {
        matches!(self, ItemKind::Role | ItemKind::CustomRole)
    }

    /// A permission may never have a role or custom role below it.
    pub fn can_parent(&self, child: ItemKind) -> bool {
        !(*self == ItemKind::Permission && child.is_role_like())
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Permission => write!(f, "permission"),
            ItemKind::Role => write!(f, "role"),
            ItemKind::CustomRole => write!(f, "custom_role"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "permission" => Ok(ItemKind::Permission),
            "role" => Ok(ItemKind::Role),
            "custom_role" => Ok(ItemKind::CustomRole),
            _ => Err(format!("unknown item kind: {s}")),
        }
    }
}

/// A named node in the authorization graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique across all kinds.
    pub name: String,

    pub kind: ItemKind,

    #[serde(default)]
    pub description: Option<String>,

    /// Name of the rule that may veto this item.
    #[serde(default)]
    pub rule_name: Option<String>,

    /// Opaque payload owned by the embedding application.
    #[serde(default)]
    pub data: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            kind,
            description: None,
            rule_name: None,
            data: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn permission(name: impl Into<String>) -> Self {
        Self::new(name, ItemKind::Permission)
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(name, ItemKind::Role)
    }

    pub fn custom_role(name: impl Into<String>) -> Self {
        Self::new(name, ItemKind::CustomRole)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A named executable predicate. `kind` selects the implementation,
/// `data` is that implementation's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            kind: kind.into(),
            data: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A directed parent -> child relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub parent: String,
    pub child: String,
    #[serde(default = "default_allow")]
    pub allow: bool,
}

fn default_allow() -> bool {
    true
}

impl Edge {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, allow: bool) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            allow,
        }
    }
}

/// A direct grant of an item to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub user_id: String,
    pub item_name: String,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(user_id: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            item_name: item_name.into(),
            created_at: Utc::now(),
        }
    }
}

/// An item reached through an edge, with that edge's allow flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildItem {
    pub item: Item,
    pub allow: bool,
}

/// Insertion-ordered (name, allow) pairs. Traversal visits entries in the
/// order they were added and the first matching branch wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignments {
    entries: Vec<(String, bool)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, allow: bool) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = allow,
            None => self.entries.push((name, allow)),
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, allow)| *allow)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), *a))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl FromIterator<(String, bool)> for Assignments {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        let mut out = Assignments::new();
        for (name, allow) in iter {
            out.insert(name, allow);
        }
        out
    }
}

/// An empty or unset user id. Reads return nothing and revokes are no-ops.
pub fn is_empty_user_id(user_id: &str) -> bool {
    user_id.is_empty()
}

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    #[error("item not found: {name}")]
    ItemNotFound { name: String },

    #[error("role not found: {name}")]
    RoleNotFound { name: String },

    #[error("rule not found: {name}")]
    RuleNotFound { name: String },

    #[error("no predicate registered for rule kind '{kind}' (rule {rule})")]
    UnknownRuleKind { rule: String, kind: String },

    #[error("cannot add '{name}' as a child of itself")]
    SelfReference { name: String },

    #[error("cannot add role '{child}' as a child of permission '{parent}'")]
    PermissionParent { parent: String, child: String },

    #[error("cannot add '{child}' as a child of '{parent}': a loop has been detected")]
    LoopDetected { parent: String, child: String },

    #[error("hierarchy deeper than {max_depth} levels below '{name}': cycle suspected")]
    DepthExceeded { name: String, max_depth: usize },

    #[error("item already exists: {name}")]
    DuplicateItem { name: String },

    #[error("rule already exists: {name}")]
    DuplicateRule { name: String },

    #[error("'{child}' is already a child of '{parent}'")]
    DuplicateEdge { parent: String, child: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RbacError {
    /// True for the errors `add_child` raises before touching the store.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            RbacError::SelfReference { .. }
                | RbacError::PermissionParent { .. }
                | RbacError::LoopDetected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RbacError>;

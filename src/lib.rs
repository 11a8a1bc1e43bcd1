//! Hierarchical role-based access control.
//!
//! Items (permissions, roles, custom roles) form a directed acyclic graph
//! whose edges carry an allow flag. Users are assigned items directly and
//! inherit everything below them. A [`Manager`] answers access checks by
//! walking the graph, either through a warm [`cache::GraphSnapshot`] or
//! directly against the [`storage::Store`].

pub mod access;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod item;
pub mod manager;
pub mod rule;
pub mod storage;

pub use access::Resolution;
pub use error::{RbacError, Result};
pub use item::{Assignment, Assignments, ChildItem, Edge, Item, ItemKind, Params, Rule};
pub use manager::Manager;
pub use rule::{RuleExecutor, RuleRegistry};

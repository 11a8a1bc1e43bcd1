use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RbacError, Result};
use crate::item::{Item, Params, Rule, ALLOW_PARAM};

/// Kind name of the built-in parameter matching rule.
pub const MATCH_PARAMS: &str = "match_params";

/// Everything a rule predicate gets to look at.
pub struct RuleContext<'a> {
    pub user_id: &'a str,
    pub rule: &'a Rule,
    pub item: &'a Item,
    pub params: &'a Params,
}

/// Executes stored rules.
pub trait RuleExecutor: Send + Sync {
    /// Whether a predicate exists for this rule kind.
    fn supports(&self, kind: &str) -> bool;

    /// Evaluate `rule` for `user_id` on `item`.
    fn execute(&self, user_id: &str, rule: &Rule, item: &Item, params: &Params) -> Result<bool>;
}

type Predicate = Arc<dyn Fn(&RuleContext<'_>) -> bool + Send + Sync>;

/// Predicates keyed by rule kind.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    predicates: HashMap<String, Predicate>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.predicates.keys().collect();
        kinds.sort();
        f.debug_struct("RuleRegistry").field("kinds", &kinds).finish()
    }
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `match_params` kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(MATCH_PARAMS, match_params);
        registry
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(kind.into(), Arc::new(predicate));
        self
    }
}

impl RuleExecutor for RuleRegistry {
    fn supports(&self, kind: &str) -> bool {
        self.predicates.contains_key(kind)
    }

    fn execute(&self, user_id: &str, rule: &Rule, item: &Item, params: &Params) -> Result<bool> {
        let predicate =
            self.predicates
                .get(&rule.kind)
                .ok_or_else(|| RbacError::UnknownRuleKind {
                    rule: rule.name.clone(),
                    kind: rule.kind.clone(),
                })?;
        Ok(predicate(&RuleContext {
            user_id,
            rule,
            item,
            params,
        }))
    }
}

/// Passes when every key in the rule's data object has the same value in
/// params. The placeholder `$user` matches the user id.
fn match_params(ctx: &RuleContext<'_>) -> bool {
    let Some(expected) = ctx.rule.data.as_object() else {
        return true;
    };
    expected.iter().all(|(key, want)| {
        let got = ctx.params.get(key);
        match want.as_str() {
            Some("$user") => got.and_then(value_as_id).as_deref() == Some(ctx.user_id),
            _ => got == Some(want),
        }
    })
}

fn value_as_id(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// How an item without a rule resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsetRule {
    /// Always passes.
    Grant,
    /// Passes with the `allow` flag inherited from the parent edge, or
    /// true when there is none.
    InheritAllow,
}

/// Run the rule attached to `item`, if any. A `rule_name` that resolves to
/// no stored rule is a configuration error, never a deny.
pub fn execute_item_rule(
    executor: &dyn RuleExecutor,
    lookup: impl FnOnce(&str) -> Result<Option<Rule>>,
    user_id: &str,
    item: &Item,
    params: &Params,
    unset: UnsetRule,
) -> Result<bool> {
    let Some(rule_name) = item.rule_name.as_deref() else {
        return Ok(match unset {
            UnsetRule::Grant => true,
            UnsetRule::InheritAllow => params
                .get(ALLOW_PARAM)
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        });
    };
    let rule = lookup(rule_name)?.ok_or_else(|| RbacError::RuleNotFound {
        name: rule_name.to_string(),
    })?;
    executor.execute(user_id, &rule, item, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: serde_json::Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn match_params_compares_values() {
        let registry = RuleRegistry::with_builtins();
        let rule = Rule::new("draft_only", MATCH_PARAMS).with_data(json!({"status": "draft"}));
        let item = Item::permission("edit");

        assert!(registry
            .execute("1", &rule, &item, &params(json!({"status": "draft"})))
            .unwrap());
        assert!(!registry
            .execute("1", &rule, &item, &params(json!({"status": "live"})))
            .unwrap());
        assert!(!registry.execute("1", &rule, &item, &Params::new()).unwrap());
    }

    #[test]
    fn match_params_user_placeholder() {
        let registry = RuleRegistry::with_builtins();
        let rule = Rule::new("is_author", MATCH_PARAMS).with_data(json!({"author_id": "$user"}));
        let item = Item::permission("update_post");

        assert!(registry
            .execute("42", &rule, &item, &params(json!({"author_id": 42})))
            .unwrap());
        assert!(!registry
            .execute("43", &rule, &item, &params(json!({"author_id": "42"})))
            .unwrap());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = RuleRegistry::new();
        let rule = Rule::new("r", "nope");
        let err = registry
            .execute("1", &rule, &Item::permission("p"), &Params::new())
            .unwrap_err();
        assert!(matches!(err, RbacError::UnknownRuleKind { .. }));
    }

    #[test]
    fn unset_rule_modes_differ_on_inherited_deny() {
        let registry = RuleRegistry::new();
        let item = Item::permission("p");
        let denied = params(json!({"allow": false}));

        let grant = execute_item_rule(&registry, |_| Ok(None), "1", &item, &denied, UnsetRule::Grant);
        let inherit = execute_item_rule(
            &registry,
            |_| Ok(None),
            "1",
            &item,
            &denied,
            UnsetRule::InheritAllow,
        );
        assert!(grant.unwrap());
        assert!(!inherit.unwrap());
    }

    #[test]
    fn missing_rule_is_fatal() {
        let registry = RuleRegistry::with_builtins();
        let item = Item::permission("p").with_rule("gone");
        let err = execute_item_rule(
            &registry,
            |_| Ok(None),
            "1",
            &item,
            &Params::new(),
            UnsetRule::InheritAllow,
        )
        .unwrap_err();
        assert!(matches!(err, RbacError::RuleNotFound { name } if name == "gone"));
    }
}

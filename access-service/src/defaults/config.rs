//! Compiled-in configuration defaults, the last-resort layer of resolution.

use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::BTreeMap;

use crate::models::{ConfigKey, ConfigValue, RbacModule};

/// Immutable key -> value table.
#[derive(Debug, Clone, Default)]
pub struct DefaultTable {
    values: BTreeMap<ConfigKey, ConfigValue>,
}

impl DefaultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by tests and by the built-in table. Panics on a malformed key.
    pub fn with(mut self, key: &str, value: ConfigValue) -> Self {
        let key = ConfigKey::parse(key).unwrap_or_else(|e| panic!("default key: {e}"));
        self.values.insert(key, value);
        self
    }

    pub fn get(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigKey, &ConfigValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

static BUILTIN: Lazy<DefaultTable> = Lazy::new(build_builtin);

/// The table shipped with the service.
pub fn builtin() -> &'static DefaultTable {
    &BUILTIN
}

fn build_builtin() -> DefaultTable {
    let mut table = DefaultTable::new()
        .with(
            "project.stages",
            json!([
                "lead",
                "discovery",
                "proposal",
                "in_progress",
                "review",
                "delivered",
                "archived"
            ]),
        )
        .with("project.priorities", json!(["low", "medium", "high", "urgent"]))
        .with(
            "task.statuses",
            json!(["backlog", "todo", "in_progress", "blocked", "done"]),
        )
        .with(
            "crm.deal_stages",
            json!(["new", "qualified", "proposal_sent", "negotiation", "won", "lost"]),
        )
        .with(
            "roadmap.statuses",
            json!(["planned", "in_progress", "shipped", "cancelled"]),
        )
        .with(
            "profitability.thresholds",
            json!({
                "marginWarning": 0.2,
                "marginCritical": 0.05,
                "overrunWarning": 0.1,
                "targetHourlyRate": 75
            }),
        )
        .with(
            "ui.layout.sidebar",
            json!([
                "projects",
                "tasks",
                "crm",
                "roadmap",
                "product",
                "notes",
                "documents",
                "profitability"
            ]),
        )
        .with(
            "plans.definitions",
            json!([
                { "id": "free", "label": "Free", "seats": 1, "projects": 3, "modules": ["projects", "tasks", "notes"] },
                { "id": "pro", "label": "Pro", "seats": 3, "projects": 25, "modules": "all" },
                { "id": "team", "label": "Team", "seats": 25, "projects": null, "modules": "all" }
            ]),
        );

    for module in RbacModule::ALL {
        table = table.with(&module.feature_flag_key(), json!(true));
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_flag_for_every_module() {
        let table = builtin();
        for module in RbacModule::ALL {
            let key = ConfigKey::parse(&module.feature_flag_key()).unwrap();
            assert_eq!(table.get(&key), Some(&json!(true)));
        }
    }

    #[test]
    fn builtin_stages_are_ordered() {
        let key = ConfigKey::parse("project.stages").unwrap();
        let stages = builtin().get(&key).unwrap().as_array().unwrap();
        assert_eq!(stages.first().unwrap(), "lead");
        assert_eq!(stages.last().unwrap(), "archived");
    }
}

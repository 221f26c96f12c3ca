use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::QcError;
use crate::report::ResolvedSection;

pub const REQUIRED_PLUGINS: [&str; 2] = ["coverageAnalysis", "variantCaller"];

const COMPLETED_STATE: &str = "Completed";

/// Plugin name → entry key within the `pluginresults` section.
#[derive(Debug, Clone)]
pub struct PluginIndex {
    by_name: BTreeMap<String, String>,
}

impl PluginIndex {
    pub fn result<'a>(
        &self,
        section: &'a ResolvedSection,
        plugin: &str,
    ) -> Result<&'a Value, QcError> {
        let key = self
            .by_name
            .get(plugin)
            .ok_or_else(|| QcError::PluginsMissing(plugin.to_string()))?;
        section
            .get(key)
            .ok_or_else(|| QcError::Shape(format!("pluginresults entry {key} is unresolved")))
    }
}

/// Scans the plugin results in index order, failing fast on the first plugin
/// that has not reached the terminal Completed state, then checks that every
/// required plugin was seen at all.
pub fn validate(section: &ResolvedSection) -> Result<PluginIndex, QcError> {
    if !section.failures.is_empty() {
        return Err(QcError::Shape(format!(
            "pluginresults has unresolved entries: {}",
            section.failures.join("; ")
        )));
    }

    let mut by_name = BTreeMap::new();
    for entry in section.iter() {
        let plugin = entry
            .value
            .get("pluginName")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QcError::Shape(format!("pluginresults entry {} has no pluginName", entry.key))
            })?;
        let state = entry
            .value
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QcError::Shape(format!("pluginresults entry {} has no state", entry.key))
            })?;
        by_name.insert(plugin.to_string(), entry.key.clone());
        if state != COMPLETED_STATE {
            return Err(QcError::PluginNotReady {
                plugin: plugin.to_string(),
                state: state.to_string(),
            });
        }
    }

    let missing: Vec<&str> = REQUIRED_PLUGINS
        .iter()
        .copied()
        .filter(|name| !by_name.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(QcError::PluginsMissing(missing.join(", ")));
    }

    Ok(PluginIndex { by_name })
}

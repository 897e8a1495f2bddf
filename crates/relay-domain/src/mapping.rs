use serde::{Deserialize, Serialize};

use crate::record::{OutputRecord, SensorMessage};

/// One remapping rule: take `field` from the `group` object in the sensor
/// payload and write it to `slot` in the output record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappingRule {
    pub group: String,
    pub field: String,
    pub slot: String,
}

/// Static remapping table, loaded once at startup and immutable thereafter.
///
/// Rules apply in declaration order; on a slot collision the later rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    rules: Vec<MappingRule>,
}

impl FieldMapping {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Mapping table of the reference deployment.
    pub fn default_table() -> Self {
        Self::new(default_rules())
    }
}

/// Default rules, also used as the configuration fallback.
pub fn default_rules() -> Vec<MappingRule> {
    let table = [
        ("SI7021", "Temperature", "field1"),
        ("SI7021", "Humidity", "field2"),
        ("BH1750", "LightLevel", "field3"),
    ];

    table
        .into_iter()
        .map(|(group, field, slot)| MappingRule {
            group: group.to_string(),
            field: field.to_string(),
            slot: slot.to_string(),
        })
        .collect()
}

/// Apply the mapping table to a decoded sensor message.
///
/// Missing groups and missing fields are skipped silently; a `null` value is
/// treated as absent and never propagated into the record. Values are copied
/// without coercion.
pub fn map_fields(message: &SensorMessage, mapping: &FieldMapping) -> OutputRecord {
    let mut record = OutputRecord::default();

    for rule in mapping.rules() {
        let Some(group) = message.get(&rule.group).and_then(|v| v.as_object()) else {
            continue;
        };
        match group.get(&rule.field) {
            None | Some(serde_json::Value::Null) => continue,
            Some(value) => {
                record.slots.insert(rule.slot.clone(), value.clone());
            }
        }
    }

    record
}

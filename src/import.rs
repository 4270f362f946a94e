//! Graph persistence: the typed JSON form, versioned snapshots and the
//! loosely-typed `equity_data` mapping produced by older editors and
//! extraction tools.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ChartError, Result};
use crate::format::parse_percentage;
use crate::model::{Entity, EntityMetadata, EntityType, OwnershipGraph, is_valid_percentage};

pub const SCHEMA_VERSION: u32 = 1;

static RESERVED_CHARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// "35.5持股", "12占": a number directly before a holding verb.
static HOLDING_AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*[持占]").unwrap());

/// Serializes the graph as pretty-printed JSON.
pub fn graph_to_json(graph: &OwnershipGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(graph)?)
}

/// Parses a graph (bare or wrapped in a [`Snapshot`]) and validates it.
pub fn graph_from_json(text: &str) -> Result<OwnershipGraph> {
    let value: Value = serde_json::from_str(text)?;
    let graph = if value.get("schema_version").is_some() && value.get("graph").is_some() {
        Snapshot::from_value(value)?.graph
    } else {
        serde_json::from_value(value)?
    };
    graph.validate()?;
    Ok(graph)
}

/// Versioned envelope written by editors that persist a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub graph: OwnershipGraph,
}

impl Snapshot {
    pub fn new(graph: OwnershipGraph) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: None,
            workspace: None,
            graph,
        }
    }

    pub fn with_workspace(mut self, name: &str) -> Self {
        self.workspace = Some(sanitize_workspace_name(name));
        self
    }

    pub fn with_saved_at(mut self, timestamp: impl Into<String>) -> Self {
        self.saved_at = Some(timestamp.into());
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let snapshot = Self::from_value(value)?;
        snapshot.graph.validate()?;
        Ok(snapshot)
    }

    fn from_value(value: Value) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_value(value)?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(ChartError::UnsupportedSchema(snapshot.schema_version));
        }
        Ok(snapshot)
    }
}

/// Makes `name` safe as a single path component.
pub fn sanitize_workspace_name(name: &str) -> String {
    let replaced = RESERVED_CHARS_RE.replace_all(name.trim(), "_");
    let cleaned: String = replaced
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "workspace".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses a legacy `equity_data` document and normalizes it.
pub fn graph_from_legacy_json(text: &str) -> Result<OwnershipGraph> {
    let value: Value = serde_json::from_str(text)?;
    normalize_legacy(&value)
}

/// Normalizes the nested `equity_data` mapping into a validated graph.
///
/// Entities referenced only by relationships are created with a type
/// inferred from where they appear. A repeated relationship keeps its last
/// percentage.
pub fn normalize_legacy(data: &Value) -> Result<OwnershipGraph> {
    let mut builder = LegacyBuilder::default();

    let core = string_field(data, &["core_company", "main_company"]);
    let controller = string_field(data, &["actual_controller", "controller"]);

    for item in array_field(data, "all_entities") {
        builder.entity_from(item, EntityType::Company);
    }
    let top_level: Vec<String> = array_field(data, "top_level_entities")
        .filter_map(|item| builder.entity_from(item, EntityType::TopEntity))
        .collect();
    let mut shareholders = Vec::new();
    for item in array_field(data, "shareholders") {
        if let Some(name) = builder.entity_from(item, EntityType::TopEntity) {
            shareholders.push((name, percentage_field(item)));
        }
    }
    if let Some(core) = core.as_deref() {
        builder.ensure(core, EntityType::CoreCompany);
    }
    if let Some(controller) = controller.as_deref() {
        builder.ensure(controller, EntityType::ActualController);
    }
    let mut subsidiaries = Vec::new();
    for item in array_field(data, "subsidiaries") {
        if let Some(name) = builder.entity_from(item, EntityType::Subsidiary) {
            subsidiaries.push((name, percentage_field(item)));
        }
    }

    let mut graph = builder.graph;
    if let Some(core) = core.as_deref() {
        graph.set_core_company(core)?;
        for (name, percentage) in &shareholders {
            if name != core {
                graph.set_shareholding(name, core, percentage.unwrap_or(0.0))?;
            }
        }
        for (name, percentage) in &subsidiaries {
            if name != core {
                graph.set_shareholding(core, name, percentage.unwrap_or(0.0))?;
            }
        }
    }
    if let Some(controller) = controller.as_deref() {
        graph.set_actual_controller(Some(controller))?;
    }
    let roots = if top_level.is_empty() {
        shareholders.iter().map(|(name, _)| name.clone()).collect()
    } else {
        top_level
    };
    for name in &roots {
        graph.add_top_level(name)?;
    }

    for rel in array_field(data, "entity_relationships") {
        let (Some(from), Some(to)) = (
            string_field(rel, &["from", "parent"]),
            string_field(rel, &["to", "child"]),
        ) else {
            warn!(relationship = %rel, "skipping shareholding without both endpoints");
            continue;
        };
        ensure_in(&mut graph, &from, EntityType::Company)?;
        ensure_in(&mut graph, &to, EntityType::Company)?;
        let percentage = percentage_field(rel)
            .or_else(|| string_field(rel, &["description"]).and_then(|d| description_percentage(&d)))
            .unwrap_or(0.0);
        graph.set_shareholding(&from, &to, percentage)?;
    }

    for rel in array_field(data, "control_relationships") {
        let (Some(from), Some(to)) = (
            string_field(rel, &["from", "controller", "parent"]),
            string_field(rel, &["to", "controlled_entity", "controlled", "child"]),
        ) else {
            warn!(relationship = %rel, "skipping control relationship without both endpoints");
            continue;
        };
        ensure_in(&mut graph, &from, EntityType::Company)?;
        ensure_in(&mut graph, &to, EntityType::Company)?;
        let label = string_field(rel, &["description", "label"]);
        graph.add_control(&from, &to, label)?;
    }

    graph.validate()?;
    debug!(
        entities = graph.entities.len(),
        shareholdings = graph.shareholdings.len(),
        controls = graph.controls.len(),
        "normalized legacy equity data"
    );
    Ok(graph)
}

#[derive(Default)]
struct LegacyBuilder {
    graph: OwnershipGraph,
}

impl LegacyBuilder {
    /// Adds the entity described by `item` (a bare name or an object) unless
    /// it exists already. Returns its name.
    fn entity_from(&mut self, item: &Value, default_type: EntityType) -> Option<String> {
        let name = match item {
            Value::String(name) => name.trim().to_string(),
            Value::Object(map) => map_string(map, &["name"])?,
            _ => return None,
        };
        if name.is_empty() {
            return None;
        }
        if self.graph.contains(&name) {
            return Some(name);
        }
        let entity_type = match item.get("type").and_then(Value::as_str) {
            Some(token) => EntityType::from_token(token).unwrap_or_else(|| {
                warn!(entity = %name, token, "unknown entity type, using company");
                EntityType::Company
            }),
            None => default_type,
        };
        let metadata = match item {
            Value::Object(map) => metadata_from(map),
            _ => EntityMetadata::default(),
        };
        self.graph
            .add_entity(Entity::new(name.clone(), entity_type).with_metadata(metadata))
            .ok()?;
        Some(name)
    }

    fn ensure(&mut self, name: &str, entity_type: EntityType) {
        if !name.trim().is_empty() && !self.graph.contains(name) {
            // Name is non-empty and new, so the insert cannot fail.
            let _ = self.graph.add_entity(Entity::new(name, entity_type));
        }
    }
}

fn ensure_in(graph: &mut OwnershipGraph, name: &str, entity_type: EntityType) -> Result<()> {
    if !graph.contains(name) {
        graph.add_entity(Entity::new(name, entity_type))?;
    }
    Ok(())
}

fn metadata_from(map: &Map<String, Value>) -> EntityMetadata {
    EntityMetadata {
        english_name: map_string(map, &["english_name"]),
        registered_capital: map_string(map, &["registered_capital", "registration_capital"]),
        legal_representative: map_string(map, &["legal_representative"]),
        establishment_date: map_string(map, &["establishment_date", "established_date"]),
        registration_status: map_string(map, &["registration_status", "status"]),
    }
}

fn map_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    value.as_object().and_then(|map| map_string(map, keys))
}

fn array_field<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Number, or a string such as `"12.34%"`.
fn percentage_field(value: &Value) -> Option<f64> {
    match value.get("percentage")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_percentage(s),
        _ => None,
    }
}

/// Holding percentage written into free text, e.g. "持股35.5%" or "35.5持股".
fn description_percentage(description: &str) -> Option<f64> {
    parse_percentage(description)
        .or_else(|| {
            HOLDING_AMOUNT_RE
                .captures(description)
                .and_then(|caps| caps[1].parse().ok())
        })
        .filter(|value| is_valid_percentage(*value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use serde_json::json;

    fn acme() -> OwnershipGraph {
        let mut graph = OwnershipGraph::new();
        graph
            .add_entity(Entity::new("Alice", EntityType::Individual))
            .unwrap();
        graph
            .add_entity(Entity::new("Acme Co", EntityType::CoreCompany))
            .unwrap();
        graph.set_core_company("Acme Co").unwrap();
        graph.add_top_level("Alice").unwrap();
        graph.set_shareholding("Alice", "Acme Co", 33.333333).unwrap();
        graph
    }

    #[test]
    fn json_round_trip_keeps_precision() {
        let graph = acme();
        let text = graph_to_json(&graph).unwrap();
        let back = graph_from_json(&text).unwrap();
        assert_eq!(back, graph);
        assert_eq!(back.shareholdings[0].percentage, 33.333333);
    }

    #[test]
    fn import_rejects_dangling_edges() {
        let text = r#"{
            "core_company": "Acme Co",
            "entities": [{ "name": "Acme Co", "type": "core_company" }],
            "shareholdings": [{ "from": "Ghost", "to": "Acme Co", "percentage": 5 }]
        }"#;
        let err = graph_from_json(text).unwrap_err();
        assert!(matches!(
            err,
            ChartError::Validation(ValidationError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn malformed_json_is_import_error() {
        assert!(matches!(graph_from_json("{"), Err(ChartError::Import(_))));
    }

    #[test]
    fn snapshot_round_trip() {
        let snapshot = Snapshot::new(acme())
            .with_workspace("Q3: review?")
            .with_saved_at("2024-07-01T09:30:00Z");
        let text = snapshot.to_json().unwrap();
        assert_eq!(Snapshot::from_json(&text).unwrap(), snapshot);
        assert_eq!(graph_from_json(&text).unwrap(), snapshot.graph);
        assert_eq!(snapshot.workspace.as_deref(), Some("Q3_ review_"));
    }

    #[test]
    fn snapshot_version_checked() {
        let mut value = serde_json::to_value(Snapshot::new(acme())).unwrap();
        value["schema_version"] = json!(7);
        let err = Snapshot::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ChartError::UnsupportedSchema(7)));
    }

    #[test]
    fn workspace_names_sanitized() {
        assert_eq!(sanitize_workspace_name("a/b\\c*d"), "a_b_c_d");
        assert_eq!(sanitize_workspace_name("report. . "), "report");
        assert_eq!(sanitize_workspace_name("..."), "workspace");
        assert_eq!(sanitize_workspace_name("  "), "workspace");
        assert_eq!(sanitize_workspace_name("泉州 项目"), "泉州 项目");
    }

    #[test]
    fn legacy_mapping_normalizes() {
        let data = json!({
            "core_company": "福建南方路面机械股份有限公司",
            "actual_controller": "方庆熙",
            "all_entities": [
                "方庆熙",
                { "name": "福建南方路面机械股份有限公司", "type": "company",
                  "english_name": "Fujian South Highway Machinery",
                  "registration_capital": "10000万元" }
            ],
            "shareholders": [
                { "name": "泉州市志成投资有限公司", "type": "company", "percentage": "25.5%" }
            ],
            "subsidiaries": [
                { "name": "南方路面(香港)有限公司", "percentage": 100 }
            ],
            "entity_relationships": [
                { "parent": "方庆熙", "child": "泉州市志成投资有限公司", "percentage": 80 },
                { "from": "方庆熙", "to": "泉州市志成投资有限公司", "percentage": "90%" }
            ],
            "control_relationships": [
                { "controller": "方庆熙", "controlled_entity": "福建南方路面机械股份有限公司",
                  "description": "实际控制" }
            ]
        });
        let graph = normalize_legacy(&data).unwrap();
        assert_eq!(graph.core_company.as_deref(), Some("福建南方路面机械股份有限公司"));
        assert_eq!(graph.actual_controller.as_deref(), Some("方庆熙"));
        assert_eq!(graph.top_level, vec!["泉州市志成投资有限公司".to_string()]);
        assert_eq!(
            graph.entity("南方路面(香港)有限公司").unwrap().entity_type,
            EntityType::Subsidiary
        );
        let core = graph.entity("福建南方路面机械股份有限公司").unwrap();
        assert_eq!(
            core.metadata.registered_capital.as_deref(),
            Some("10000万元")
        );

        let holding = |from: &str, to: &str| {
            graph
                .shareholdings
                .iter()
                .find(|e| e.from == from && e.to == to)
                .map(|e| e.percentage)
        };
        assert_eq!(
            holding("泉州市志成投资有限公司", "福建南方路面机械股份有限公司"),
            Some(25.5)
        );
        assert_eq!(holding("方庆熙", "泉州市志成投资有限公司"), Some(90.0));
        assert_eq!(graph.controls.len(), 1);
        assert_eq!(graph.controls[0].label.as_deref(), Some("实际控制"));
    }

    #[test]
    fn legacy_relationship_endpoints_become_entities() {
        let data = json!({
            "main_company": "Acme Co",
            "entity_relationships": [{ "from": "Holdco", "to": "Acme Co", "percentage": 51 }],
            "control_relationships": [{ "parent": "Zhang", "child": "Holdco" }]
        });
        let graph = normalize_legacy(&data).unwrap();
        assert!(graph.contains("Holdco"));
        assert!(graph.contains("Zhang"));
        assert_eq!(graph.controls[0].label, None);
    }

    #[test]
    fn legacy_without_core_company_fails() {
        let data = json!({ "all_entities": ["A", "B"] });
        assert!(matches!(
            normalize_legacy(&data),
            Err(ChartError::Validation(ValidationError::MissingCoreCompany))
        ));
    }

    #[test]
    fn legacy_invalid_percentage_fails() {
        let data = json!({
            "core_company": "Acme Co",
            "entity_relationships": [{ "from": "A", "to": "Acme Co", "percentage": 140 }]
        });
        assert!(matches!(
            normalize_legacy(&data),
            Err(ChartError::Validation(ValidationError::InvalidPercentage { .. }))
        ));
    }

    #[test]
    fn json_round_trip_is_exact_for_arbitrary_percentages() {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut graph = acme();
        for _ in 0..5000 {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let percentage = (state >> 11) as f64 / (1u64 << 53) as f64 * 100.0;
            graph.set_shareholding("Alice", "Acme Co", percentage).unwrap();
            let back = graph_from_json(&graph_to_json(&graph).unwrap()).unwrap();
            assert_eq!(
                back.shareholdings[0].percentage.to_bits(),
                percentage.to_bits(),
                "{percentage}"
            );
        }
    }

    #[test]
    fn legacy_holdings_without_percentage_keep_their_edge() {
        let data = json!({
            "core_company": "Acme Co",
            "shareholders": ["Alice", { "name": "Bob" }, { "name": "Carol", "percentage": "40%" }],
            "subsidiaries": [{ "name": "Acme Sub", "percentage": "n/a" }]
        });
        let graph = normalize_legacy(&data).unwrap();
        let holdings: Vec<(&str, &str, f64)> = graph
            .shareholdings
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str(), e.percentage))
            .collect();
        assert_eq!(
            holdings,
            vec![
                ("Alice", "Acme Co", 0.0),
                ("Bob", "Acme Co", 0.0),
                ("Carol", "Acme Co", 40.0),
                ("Acme Co", "Acme Sub", 0.0),
            ]
        );
    }

    #[test]
    fn legacy_percentage_read_from_description() {
        let data = json!({
            "core_company": "Acme Co",
            "entity_relationships": [
                { "parent": "Holdco", "child": "Acme Co", "description": "持股35.5%" },
                { "parent": "Zhang", "child": "Holdco", "description": "12.5持股" },
                { "parent": "Li", "child": "Holdco", "description": "成立于2019年" },
                { "parent": "Wang", "child": "Acme Co", "percentage": 8, "description": "持股20%" }
            ]
        });
        let graph = normalize_legacy(&data).unwrap();
        let holding = |from: &str| {
            graph
                .shareholdings
                .iter()
                .find(|e| e.from == from)
                .map(|e| e.percentage)
        };
        assert_eq!(holding("Holdco"), Some(35.5));
        assert_eq!(holding("Zhang"), Some(12.5));
        assert_eq!(holding("Li"), Some(0.0));
        assert_eq!(holding("Wang"), Some(8.0));
    }
}

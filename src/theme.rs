use serde::{Deserialize, Serialize};

use crate::model::{Entity, EntityType, OwnershipGraph};

/// Visual category of an entity. Both generators key their styling on this,
/// so a given entity looks the same in the flowchart and the network view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleClass {
    CoreCompany,
    ActualController,
    TopEntity,
    Subsidiary,
    Individual,
    Institution,
    Company,
}

impl StyleClass {
    pub const ALL: [StyleClass; 7] = [
        StyleClass::CoreCompany,
        StyleClass::ActualController,
        StyleClass::TopEntity,
        StyleClass::Subsidiary,
        StyleClass::Individual,
        StyleClass::Institution,
        StyleClass::Company,
    ];

    /// Class name used in Mermaid `classDef` and as the network node group.
    pub fn token(self) -> &'static str {
        match self {
            StyleClass::CoreCompany => "coreCompany",
            StyleClass::ActualController => "actualController",
            StyleClass::TopEntity => "topEntity",
            StyleClass::Subsidiary => "subsidiary",
            StyleClass::Individual => "individual",
            StyleClass::Institution => "institution",
            StyleClass::Company => "company",
        }
    }

    /// Graph designations win over the declared type: the core company and
    /// the actual controller keep their emphasis whatever they are typed as.
    pub fn for_entity(graph: &OwnershipGraph, entity: &Entity) -> Self {
        if graph.is_core(&entity.name) {
            return StyleClass::CoreCompany;
        }
        if graph.is_actual_controller(&entity.name) {
            return StyleClass::ActualController;
        }
        match entity.entity_type {
            EntityType::CoreCompany => StyleClass::CoreCompany,
            EntityType::ActualController => StyleClass::ActualController,
            EntityType::TopEntity => StyleClass::TopEntity,
            EntityType::Subsidiary => StyleClass::Subsidiary,
            EntityType::Individual => StyleClass::Individual,
            EntityType::Institution => StyleClass::Institution,
            EntityType::Company => StyleClass::Company,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeClass {
    Ownership,
    /// Ownership edge on the actual controller's chain.
    ControllingOwnership,
    Control,
}

impl EdgeClass {
    pub fn is_dashed(self) -> bool {
        matches!(self, EdgeClass::Control)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub fill: String,
    pub stroke: String,
    pub text: String,
    pub stroke_width: f32,
    pub radius: f32,
    pub highlight_fill: String,
    pub highlight_stroke: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub color: String,
    pub highlight: String,
    pub width: f32,
    /// Dash and gap lengths; empty for a solid line.
    pub dashes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub edge_label_background: String,
    pub edge_label_text: String,
    pub core_company: NodeStyle,
    pub actual_controller: NodeStyle,
    pub top_entity: NodeStyle,
    pub subsidiary: NodeStyle,
    pub individual: NodeStyle,
    pub institution: NodeStyle,
    pub company: NodeStyle,
    pub ownership: EdgeStyle,
    pub controlling_ownership: EdgeStyle,
    pub control: EdgeStyle,
}

fn node(
    fill: &str,
    stroke: &str,
    text: &str,
    stroke_width: f32,
    radius: f32,
    highlight: (&str, &str),
) -> NodeStyle {
    NodeStyle {
        fill: fill.to_string(),
        stroke: stroke.to_string(),
        text: text.to_string(),
        stroke_width,
        radius,
        highlight_fill: highlight.0.to_string(),
        highlight_stroke: highlight.1.to_string(),
    }
}

fn edge(color: &str, highlight: &str, width: f32, dashes: &[u32]) -> EdgeStyle {
    EdgeStyle {
        color: color.to_string(),
        highlight: highlight.to_string(),
        width,
        dashes: dashes.to_vec(),
    }
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"Microsoft YaHei\", \"PingFang SC\", Arial, sans-serif".to_string(),
            font_size: 12.0,
            background: "#FFFFFF".to_string(),
            edge_label_background: "rgba(255, 255, 255, 0.95)".to_string(),
            edge_label_text: "#000000".to_string(),
            core_company: node("#fff8e1", "#ff9100", "#000000", 2.0, 6.0, ("#ffecb3", "#ff6f00")),
            actual_controller: node("#0d47a1", "#0d47a1", "#ffffff", 2.0, 4.0, ("#1565c0", "#0d47a1")),
            top_entity: node("#f3f4f6", "#5a6772", "#000000", 2.0, 4.0, ("#e5e7eb", "#374151")),
            subsidiary: node("#ffffff", "#1e88e5", "#000000", 1.5, 4.0, ("#e3f2fd", "#1565c0")),
            individual: node("#e8f5e9", "#4caf50", "#000000", 1.5, 4.0, ("#c8e6c9", "#388e3c")),
            institution: node("#f5f5f5", "#757575", "#000000", 1.5, 4.0, ("#eeeeee", "#616161")),
            company: node("#ffffff", "#1976d2", "#000000", 1.5, 4.0, ("#e3f2fd", "#1565c0")),
            ownership: edge("#1976d2", "#0d47a1", 2.0, &[]),
            controlling_ownership: edge("#0d47a1", "#002171", 3.0, &[]),
            control: edge("#d32f2f", "#b71c1c", 1.5, &[5, 5]),
        }
    }

    /// Grey-scale variant for print; control edges stay dashed.
    pub fn monochrome() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            background: "#FFFFFF".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
            edge_label_text: "#111111".to_string(),
            core_company: node("#e0e0e0", "#212121", "#000000", 2.5, 6.0, ("#d6d6d6", "#000000")),
            actual_controller: node("#424242", "#212121", "#ffffff", 2.0, 4.0, ("#616161", "#000000")),
            top_entity: node("#f5f5f5", "#424242", "#000000", 2.0, 4.0, ("#eeeeee", "#212121")),
            subsidiary: node("#ffffff", "#616161", "#000000", 1.5, 4.0, ("#f5f5f5", "#424242")),
            individual: node("#fafafa", "#757575", "#000000", 1.5, 12.0, ("#f0f0f0", "#424242")),
            institution: node("#eeeeee", "#9e9e9e", "#000000", 1.5, 0.0, ("#e0e0e0", "#616161")),
            company: node("#ffffff", "#757575", "#000000", 1.5, 4.0, ("#f5f5f5", "#424242")),
            ownership: edge("#424242", "#000000", 2.0, &[]),
            controlling_ownership: edge("#000000", "#000000", 3.0, &[]),
            control: edge("#757575", "#424242", 1.5, &[5, 5]),
        }
    }

    pub fn node_style(&self, class: StyleClass) -> &NodeStyle {
        match class {
            StyleClass::CoreCompany => &self.core_company,
            StyleClass::ActualController => &self.actual_controller,
            StyleClass::TopEntity => &self.top_entity,
            StyleClass::Subsidiary => &self.subsidiary,
            StyleClass::Individual => &self.individual,
            StyleClass::Institution => &self.institution,
            StyleClass::Company => &self.company,
        }
    }

    pub fn edge_style(&self, class: EdgeClass) -> &EdgeStyle {
        match class {
            EdgeClass::Ownership => &self.ownership,
            EdgeClass::ControllingOwnership => &self.controlling_ownership,
            EdgeClass::Control => &self.control,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn designations_override_declared_type() {
        let mut graph = OwnershipGraph::new();
        graph
            .add_entity(Entity::new("Holdco", EntityType::Company))
            .unwrap();
        graph
            .add_entity(Entity::new("Zhang Wei", EntityType::Individual))
            .unwrap();
        graph.set_core_company("Holdco").unwrap();
        graph.set_actual_controller(Some("Zhang Wei")).unwrap();
        assert_eq!(
            StyleClass::for_entity(&graph, &graph.entities[0]),
            StyleClass::CoreCompany
        );
        assert_eq!(
            StyleClass::for_entity(&graph, &graph.entities[1]),
            StyleClass::ActualController
        );
    }

    #[test]
    fn control_is_the_only_dashed_class() {
        let theme = Theme::classic();
        assert!(theme.edge_style(EdgeClass::Control).dashes.len() == 2);
        assert!(theme.edge_style(EdgeClass::Ownership).dashes.is_empty());
        assert_ne!(
            theme.edge_style(EdgeClass::Control).color,
            theme.edge_style(EdgeClass::Ownership).color
        );
        assert!(EdgeClass::Control.is_dashed());
        assert!(!EdgeClass::ControllingOwnership.is_dashed());
    }

    #[test]
    fn tokens_are_distinct() {
        let mut tokens: Vec<&str> = StyleClass::ALL.iter().map(|c| c.token()).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), StyleClass::ALL.len());
    }
}

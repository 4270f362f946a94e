//! Payload for a hierarchical, physics-free vis-network view.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, Direction, LayoutConfig};
use crate::error::{ChartError, ValidationError};
use crate::format::{display_lines, ownership_label};
use crate::levels::{LevelAssignment, order_levels};
use crate::mermaid::control_label;
use crate::model::OwnershipGraph;
use crate::theme::{EdgeClass, StyleClass, Theme};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPayload {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    pub layout_options: LayoutOptions,
}

impl NetworkPayload {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Entity name -> level, as carried by the nodes.
    pub fn levels(&self) -> BTreeMap<String, usize> {
        self.nodes
            .iter()
            .map(|node| (node.id.clone(), node.level))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNode {
    pub id: String,
    pub label: String,
    /// Untruncated name shown on hover.
    pub title: String,
    pub level: usize,
    pub group: StyleClass,
    pub shape: String,
    pub x: f32,
    pub y: f32,
    pub fixed: bool,
    pub width_constraint: WidthConstraint,
    pub height_constraint: HeightConstraint,
    pub color: NodeColor,
    pub font: NodeFont,
    pub border_width: f32,
    pub is_core: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidthConstraint {
    pub minimum: f32,
    pub maximum: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightConstraint {
    pub minimum: f32,
    pub valign: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPair {
    pub background: String,
    pub border: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeColor {
    pub background: String,
    pub border: String,
    pub highlight: ColorPair,
    pub hover: ColorPair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFont {
    pub color: String,
    pub size: f32,
    pub face: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: EdgeClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub arrows: Arrows,
    pub color: EdgeColor,
    pub width: f32,
    pub dashes: Dashes,
    pub smooth: Toggle,
    pub font: EdgeFont,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrows {
    pub to: ArrowHead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowHead {
    pub enabled: bool,
    pub scale_factor: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeColor {
    pub color: String,
    pub highlight: String,
    pub hover: String,
}

/// `false` for a solid line, otherwise a dash/gap pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dashes {
    Solid(bool),
    Pattern(Vec<u32>),
}

impl Dashes {
    pub fn is_dashed(&self) -> bool {
        matches!(self, Dashes::Pattern(pattern) if !pattern.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFont {
    pub size: f32,
    pub color: String,
    pub align: String,
    pub background: String,
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    pub layout: HierarchicalLayout,
    pub physics: Physics,
    pub edges: EdgeDefaults,
    pub interaction: Interaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalLayout {
    pub hierarchical: Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchical {
    pub enabled: bool,
    pub direction: Direction,
    pub sort_method: String,
    pub level_separation: f32,
    pub node_spacing: f32,
    pub tree_spacing: f32,
    pub block_shifting: bool,
    pub edge_minimization: bool,
    pub parent_centralization: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Physics {
    pub enabled: bool,
    pub stabilization: Toggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefaults {
    pub smooth: Toggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub drag_nodes: bool,
    pub hover: bool,
    pub navigation_buttons: bool,
    pub keyboard: bool,
}

fn layout_options(layout: &LayoutConfig) -> LayoutOptions {
    LayoutOptions {
        layout: HierarchicalLayout {
            hierarchical: Hierarchical {
                enabled: true,
                direction: layout.direction,
                sort_method: "directed".to_string(),
                level_separation: layout.level_separation,
                node_spacing: layout.node_spacing,
                tree_spacing: layout.tree_spacing,
                block_shifting: true,
                edge_minimization: true,
                parent_centralization: true,
            },
        },
        physics: Physics {
            enabled: false,
            stabilization: Toggle { enabled: false },
        },
        edges: EdgeDefaults {
            smooth: Toggle { enabled: false },
        },
        interaction: Interaction {
            drag_nodes: true,
            hover: true,
            navigation_buttons: true,
            keyboard: true,
        },
    }
}

/// Position hint for slot `slot` of `count` on `level`; levels run along the
/// layout direction, slots are centred across it.
pub(crate) fn position_hint(
    layout: &LayoutConfig,
    level: usize,
    slot: usize,
    count: usize,
) -> (f32, f32) {
    let across = (slot as f32 - (count.saturating_sub(1)) as f32 / 2.0) * layout.node_spacing;
    let along = level as f32 * layout.level_separation;
    match layout.direction {
        Direction::UpDown => (across, along),
        Direction::DownUp => (across, -along),
        Direction::LeftRight => (along, across),
        Direction::RightLeft => (-along, across),
    }
}

fn node_title(lines: &[String], name: &str) -> String {
    if lines.len() == 1 && lines[0] == name {
        return name.to_string();
    }
    let mut parts = vec![name.to_string()];
    parts.extend(lines.iter().filter(|line| line.as_str() != name).cloned());
    parts.join("\n")
}

/// Builds the node/edge payload for `graph` using the shared `levels`.
pub fn generate_network(
    graph: &OwnershipGraph,
    levels: &LevelAssignment,
    config: &Config,
) -> Result<NetworkPayload, ChartError> {
    graph.validate()?;
    let theme: &Theme = &config.theme;
    let layout = &config.layout;
    let labels = &config.labels;

    for entity in &graph.entities {
        if levels.get(&entity.name).is_none() {
            return Err(ValidationError::UnknownEntity {
                name: entity.name.clone(),
                context: "level assignment",
            }
            .into());
        }
    }

    let ordered = order_levels(graph, levels, layout.ordering_passes);
    let mut nodes = Vec::with_capacity(graph.entities.len());
    for (level, names) in ordered.iter().enumerate() {
        for (slot, name) in names.iter().enumerate() {
            let Some(entity) = graph.entity(name) else {
                continue;
            };
            let class = StyleClass::for_entity(graph, entity);
            let style = theme.node_style(class);
            let lines = display_lines(entity, labels.show_metadata, labels.max_line_chars);
            let full = display_lines(entity, labels.show_metadata, 0);
            let (x, y) = position_hint(layout, level, slot, names.len());
            nodes.push(NetworkNode {
                id: entity.name.clone(),
                label: lines.join("\n"),
                title: node_title(&full, &entity.name),
                level,
                group: class,
                shape: "box".to_string(),
                x,
                y,
                fixed: false,
                width_constraint: WidthConstraint {
                    minimum: layout.node_width,
                    maximum: layout.node_width,
                },
                height_constraint: HeightConstraint {
                    minimum: layout.node_height,
                    valign: "middle".to_string(),
                },
                color: NodeColor {
                    background: style.fill.clone(),
                    border: style.stroke.clone(),
                    highlight: ColorPair {
                        background: style.highlight_fill.clone(),
                        border: style.highlight_stroke.clone(),
                    },
                    hover: ColorPair {
                        background: style.highlight_fill.clone(),
                        border: style.highlight_stroke.clone(),
                    },
                },
                font: NodeFont {
                    color: style.text.clone(),
                    size: layout.node_font_size,
                    face: theme.font_family.clone(),
                },
                border_width: style.stroke_width,
                is_core: graph.is_core(&entity.name),
            });
        }
    }

    let mut edges = Vec::with_capacity(graph.shareholdings.len() + graph.controls.len());
    let edge_font = EdgeFont {
        size: layout.edge_font_size,
        color: theme.edge_label_text.clone(),
        align: "horizontal".to_string(),
        background: theme.edge_label_background.clone(),
        stroke_width: 0.0,
    };
    let mut push_edge = |from: &str, to: &str, label: Option<String>, kind: EdgeClass, percentage: Option<f64>| {
        let style = theme.edge_style(kind);
        let dashes = if style.dashes.is_empty() {
            Dashes::Solid(false)
        } else {
            Dashes::Pattern(style.dashes.clone())
        };
        edges.push(NetworkEdge {
            id: format!("e{}", edges.len() + 1),
            from: from.to_string(),
            to: to.to_string(),
            label,
            kind,
            percentage,
            arrows: Arrows {
                to: ArrowHead {
                    enabled: true,
                    scale_factor: layout.arrow_scale,
                },
            },
            color: EdgeColor {
                color: style.color.clone(),
                highlight: style.highlight.clone(),
                hover: style.highlight.clone(),
            },
            width: style.width,
            dashes,
            smooth: Toggle { enabled: false },
            font: edge_font.clone(),
        });
    };

    for edge in &graph.shareholdings {
        let kind = if edge.actual_control {
            EdgeClass::ControllingOwnership
        } else {
            EdgeClass::Ownership
        };
        push_edge(
            edge.from.as_str(),
            edge.to.as_str(),
            ownership_label(edge.percentage, labels.zero_percentage),
            kind,
            Some(edge.percentage),
        );
    }
    for edge in &graph.controls {
        push_edge(
            edge.from.as_str(),
            edge.to.as_str(),
            Some(control_label(edge.label.as_deref(), config)),
            EdgeClass::Control,
            None,
        );
    }

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        levels = ordered.len(),
        "generated network payload"
    );
    Ok(NetworkPayload {
        nodes,
        edges,
        layout_options: layout_options(layout),
    })
}

use crate::format::ZeroPercentage;
use crate::theme::{EdgeStyle, NodeStyle, Theme};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Flow direction of the hierarchical layout, in vis-network notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "UD")]
    UpDown,
    #[serde(rename = "DU")]
    DownUp,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "UD" | "TD" | "TB" => Some(Self::UpDown),
            "DU" | "BT" => Some(Self::DownUp),
            "LR" => Some(Self::LeftRight),
            "RL" => Some(Self::RightLeft),
            _ => None,
        }
    }

    /// Mermaid flowchart header token.
    pub fn mermaid_token(self) -> &'static str {
        match self {
            Direction::UpDown => "TD",
            Direction::DownUp => "BT",
            Direction::LeftRight => "LR",
            Direction::RightLeft => "RL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub level_separation: f32,
    pub node_spacing: f32,
    pub tree_spacing: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub node_font_size: f32,
    pub edge_font_size: f32,
    /// Arrowhead scale; kept small so percentage labels stay readable.
    pub arrow_scale: f32,
    pub ordering_passes: usize,
    /// Cap on level relaxation rounds. `None` uses entity count + 1.
    pub max_level_iterations: Option<usize>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::UpDown,
            level_separation: 150.0,
            node_spacing: 200.0,
            tree_spacing: 200.0,
            node_width: 100.0,
            node_height: 57.0,
            node_font_size: 12.0,
            edge_font_size: 12.0,
            arrow_scale: 0.6,
            ordering_passes: 4,
            max_level_iterations: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    pub control_label: String,
    pub max_line_chars: usize,
    pub max_control_label_chars: usize,
    pub show_metadata: bool,
    pub zero_percentage: ZeroPercentage,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            control_label: "control".to_string(),
            max_line_chars: 40,
            max_control_label_chars: 30,
            show_metadata: true,
            zero_percentage: ZeroPercentage::Omit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub labels: LabelConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutOverrides>,
    labels: Option<LabelOverrides>,
    render: Option<RenderOverrides>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    edge_label_background: Option<String>,
    edge_label_text: Option<String>,
    core_company: Option<NodeStyle>,
    actual_controller: Option<NodeStyle>,
    top_entity: Option<NodeStyle>,
    subsidiary: Option<NodeStyle>,
    individual: Option<NodeStyle>,
    institution: Option<NodeStyle>,
    company: Option<NodeStyle>,
    ownership_edge: Option<EdgeStyle>,
    controlling_ownership_edge: Option<EdgeStyle>,
    control_edge: Option<EdgeStyle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOverrides {
    direction: Option<String>,
    level_separation: Option<f32>,
    node_spacing: Option<f32>,
    tree_spacing: Option<f32>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    node_font_size: Option<f32>,
    edge_font_size: Option<f32>,
    arrow_scale: Option<f32>,
    ordering_passes: Option<usize>,
    max_level_iterations: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelOverrides {
    control_label: Option<String>,
    max_line_chars: Option<usize>,
    max_control_label_chars: Option<usize>,
    show_metadata: Option<bool>,
    zero_percentage: Option<ZeroPercentage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOverrides {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses a JSON5 config document and overlays it on the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "classic" | "default" => config.theme = Theme::classic(),
            "monochrome" | "print" => config.theme = Theme::monochrome(),
            other => anyhow::bail!("unknown theme: {other}"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        let theme = &mut config.theme;
        if let Some(v) = vars.font_family {
            theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            theme.font_size = v;
        }
        if let Some(v) = vars.background {
            theme.background = v;
        }
        if let Some(v) = vars.edge_label_background {
            theme.edge_label_background = v;
        }
        if let Some(v) = vars.edge_label_text {
            theme.edge_label_text = v;
        }
        if let Some(v) = vars.core_company {
            theme.core_company = v;
        }
        if let Some(v) = vars.actual_controller {
            theme.actual_controller = v;
        }
        if let Some(v) = vars.top_entity {
            theme.top_entity = v;
        }
        if let Some(v) = vars.subsidiary {
            theme.subsidiary = v;
        }
        if let Some(v) = vars.individual {
            theme.individual = v;
        }
        if let Some(v) = vars.institution {
            theme.institution = v;
        }
        if let Some(v) = vars.company {
            theme.company = v;
        }
        if let Some(v) = vars.ownership_edge {
            theme.ownership = v;
        }
        if let Some(v) = vars.controlling_ownership_edge {
            theme.controlling_ownership = v;
        }
        if let Some(v) = vars.control_edge {
            theme.control = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(token) = layout.direction.as_deref() {
            config.layout.direction = Direction::from_token(token)
                .ok_or_else(|| anyhow::anyhow!("unknown layout direction: {token}"))?;
        }
        if let Some(v) = layout.level_separation {
            config.layout.level_separation = v;
        }
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.tree_spacing {
            config.layout.tree_spacing = v;
        }
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.node_font_size {
            config.layout.node_font_size = v;
        }
        if let Some(v) = layout.edge_font_size {
            config.layout.edge_font_size = v;
        }
        if let Some(v) = layout.arrow_scale {
            config.layout.arrow_scale = v;
        }
        if let Some(v) = layout.ordering_passes {
            config.layout.ordering_passes = v;
        }
        if layout.max_level_iterations.is_some() {
            config.layout.max_level_iterations = layout.max_level_iterations;
        }
    }

    if let Some(labels) = parsed.labels {
        if let Some(v) = labels.control_label {
            config.labels.control_label = v;
        }
        if let Some(v) = labels.max_line_chars {
            config.labels.max_line_chars = v;
        }
        if let Some(v) = labels.max_control_label_chars {
            config.labels.max_control_label_chars = v;
        }
        if let Some(v) = labels.show_metadata {
            config.labels.show_metadata = v;
        }
        if let Some(v) = labels.zero_percentage {
            config.labels.zero_percentage = v;
        }
    }

    config.render.background = config.theme.background.clone();
    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
    }

    Ok(config)
}

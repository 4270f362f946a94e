//! Mermaid flowchart text for an ownership graph.
//!
//! Every label goes through [`escape_label`]; nothing else in this module
//! writes user text into the output.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::config::{Config, Direction};
use crate::error::{ChartError, EscapeError, ValidationError};
use crate::format::{display_lines, ownership_label, truncate_label};
use crate::levels::LevelAssignment;
use crate::model::OwnershipGraph;
use crate::theme::{EdgeClass, EdgeStyle, NodeStyle, StyleClass, Theme};

/// Characters with syntactic meaning in Mermaid flowcharts, written as
/// numeric entity codes (`#34;` renders as `"`).
const ENTITY_CODES: [(char, &str); 14] = [
    ('#', "#35;"),
    ('"', "#34;"),
    ('&', "#38;"),
    ('<', "#60;"),
    ('>', "#62;"),
    ('|', "#124;"),
    ('[', "#91;"),
    (']', "#93;"),
    ('{', "#123;"),
    ('}', "#125;"),
    ('(', "#40;"),
    (')', "#41;"),
    (';', "#59;"),
    ('`', "#96;"),
];

const LINE_BREAK: &str = "<br/>";

/// Escapes one label for use inside `["..."]` or `-->|...|`.
///
/// Line breaks become `<br/>`, tabs become spaces; any other control
/// character cannot be represented and is an error.
pub fn escape_label(label: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(label.len());
    let mut chars = label.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(LINE_BREAK);
            }
            '\n' | '\u{2028}' | '\u{2029}' => out.push_str(LINE_BREAK),
            '\t' => out.push(' '),
            c if c.is_control() || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                return Err(EscapeError {
                    label: label.to_string(),
                    code: c as u32,
                });
            }
            c => match ENTITY_CODES.iter().find(|(special, _)| *special == c) {
                Some((_, code)) => out.push_str(code),
                None => out.push(c),
            },
        }
    }
    Ok(out)
}

/// Inverse of [`escape_label`] for the codes it emits.
pub fn unescape_label(escaped: &str) -> String {
    let mut out = escaped.replace(LINE_BREAK, "\n");
    for (special, code) in ENTITY_CODES.iter().rev() {
        out = out.replace(code, &special.to_string());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MermaidDiagram {
    pub text: String,
    /// Entity name -> Mermaid node id.
    pub node_ids: BTreeMap<String, String>,
    pub levels: BTreeMap<String, usize>,
}

impl MermaidDiagram {
    pub fn node_id(&self, name: &str) -> Option<&str> {
        self.node_ids.get(name).map(String::as_str)
    }
}

/// Line-oriented statement builder. Labels are escaped on the way in.
struct MermaidBuilder {
    lines: Vec<String>,
    edge_count: usize,
}

impl MermaidBuilder {
    fn new(direction: Direction) -> Self {
        Self {
            lines: vec![format!("graph {}", direction.mermaid_token())],
            edge_count: 0,
        }
    }

    fn statement(&mut self, text: String) {
        self.lines.push(format!("    {text}"));
    }

    fn class_def(&mut self, class: StyleClass, style: &NodeStyle) {
        self.statement(format!(
            "classDef {} fill:{},stroke:{},stroke-width:{}px,color:{},rx:{},ry:{};",
            class.token(),
            style.fill,
            style.stroke,
            style.stroke_width,
            style.text,
            style.radius,
            style.radius
        ));
    }

    fn comment(&mut self, text: &str) {
        self.statement(format!("%% {text}"));
    }

    fn node(&mut self, id: &str, lines: &[String]) -> Result<(), EscapeError> {
        let escaped = lines
            .iter()
            .map(|line| escape_label(line))
            .collect::<Result<Vec<_>, _>>()?;
        self.statement(format!("{id}[\"{}\"]", escaped.join(LINE_BREAK)));
        Ok(())
    }

    /// Returns the edge's `linkStyle` index.
    fn edge(
        &mut self,
        from: &str,
        to: &str,
        label: Option<&str>,
        dashed: bool,
    ) -> Result<usize, EscapeError> {
        let arrow = if dashed { "-.->" } else { "-->" };
        let statement = match label {
            Some(label) => format!("{from} {arrow}|{}| {to}", escape_label(label)?),
            None => format!("{from} {arrow} {to}"),
        };
        self.statement(statement);
        self.edge_count += 1;
        Ok(self.edge_count - 1)
    }

    fn class_assign(&mut self, ids: &[&str], class: StyleClass) {
        if !ids.is_empty() {
            self.statement(format!("class {} {};", ids.join(","), class.token()));
        }
    }

    fn link_style(&mut self, indices: &[usize], style: &EdgeStyle) {
        if indices.is_empty() {
            return;
        }
        let list: Vec<String> = indices.iter().map(usize::to_string).collect();
        let mut text = format!(
            "linkStyle {} stroke:{},stroke-width:{}px",
            list.join(","),
            style.color,
            style.width
        );
        if !style.dashes.is_empty() {
            let dashes: Vec<String> = style.dashes.iter().map(u32::to_string).collect();
            text.push_str(&format!(",stroke-dasharray:{}", dashes.join(" ")));
        }
        text.push(';');
        self.statement(text);
    }

    fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Builds the flowchart description for `graph` using the shared `levels`.
pub fn generate_mermaid(
    graph: &OwnershipGraph,
    levels: &LevelAssignment,
    config: &Config,
) -> Result<MermaidDiagram, ChartError> {
    graph.validate()?;
    let theme: &Theme = &config.theme;
    let labels = &config.labels;

    let mut node_ids: BTreeMap<String, String> = BTreeMap::new();
    let mut id_of: HashMap<&str, String> = HashMap::new();
    for (idx, entity) in graph.entities.iter().enumerate() {
        if levels.get(&entity.name).is_none() {
            return Err(ValidationError::UnknownEntity {
                name: entity.name.clone(),
                context: "level assignment",
            }
            .into());
        }
        let id = format!("E{}", idx + 1);
        node_ids.insert(entity.name.clone(), id.clone());
        id_of.insert(entity.name.as_str(), id);
    }

    let mut builder = MermaidBuilder::new(config.layout.direction);
    for class in StyleClass::ALL {
        builder.class_def(class, theme.node_style(class));
    }

    let mut by_class: BTreeMap<StyleClass, Vec<&str>> = BTreeMap::new();
    for (level, names) in levels.by_level(graph).iter().enumerate() {
        if names.is_empty() {
            continue;
        }
        builder.comment(&format!("level {level}"));
        for name in names {
            let Some(entity) = graph.entity(name) else {
                continue;
            };
            let id = id_of[name.as_str()].as_str();
            let lines = display_lines(entity, labels.show_metadata, labels.max_line_chars);
            builder.node(id, &lines)?;
            by_class
                .entry(StyleClass::for_entity(graph, entity))
                .or_default()
                .push(id);
        }
    }

    let mut by_edge_class: HashMap<EdgeClass, Vec<usize>> = HashMap::new();
    for edge in &graph.shareholdings {
        let class = if edge.actual_control {
            EdgeClass::ControllingOwnership
        } else {
            EdgeClass::Ownership
        };
        let label = ownership_label(edge.percentage, labels.zero_percentage);
        let index = builder.edge(
            &id_of[edge.from.as_str()],
            &id_of[edge.to.as_str()],
            label.as_deref(),
            false,
        )?;
        by_edge_class.entry(class).or_default().push(index);
    }
    for edge in &graph.controls {
        let label = control_label(edge.label.as_deref(), config);
        let index = builder.edge(
            &id_of[edge.from.as_str()],
            &id_of[edge.to.as_str()],
            Some(&label),
            true,
        )?;
        by_edge_class
            .entry(EdgeClass::Control)
            .or_default()
            .push(index);
    }

    for class in StyleClass::ALL {
        if let Some(ids) = by_class.get(&class) {
            builder.class_assign(ids, class);
        }
    }
    for class in [
        EdgeClass::Ownership,
        EdgeClass::ControllingOwnership,
        EdgeClass::Control,
    ] {
        if let Some(indices) = by_edge_class.get(&class) {
            builder.link_style(indices, theme.edge_style(class));
        }
    }

    let text = builder.finish();
    debug!(
        nodes = node_ids.len(),
        edges = graph.shareholdings.len() + graph.controls.len(),
        bytes = text.len(),
        "generated mermaid text"
    );
    Ok(MermaidDiagram {
        text,
        node_ids,
        levels: levels.levels.clone(),
    })
}

/// Label shown on a control edge; overlong descriptions fall back to the
/// configured default.
pub(crate) fn control_label(label: Option<&str>, config: &Config) -> String {
    let labels = &config.labels;
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(text) if text.chars().count() <= labels.max_control_label_chars => text.to_string(),
        Some(_) | None => truncate_label(&labels.control_label, labels.max_line_chars),
    }
}

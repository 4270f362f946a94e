//! Static SVG/PNG preview of the layered network payload.

use crate::config::Config;
use crate::network::{NetworkEdge, NetworkNode, NetworkPayload};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const MARGIN: f32 = 40.0;
const LINE_HEIGHT: f32 = 1.3;

type Rect = (f32, f32, f32, f32);

pub fn render_svg(payload: &NetworkPayload, config: &Config) -> String {
    let layout = &config.layout;
    let theme = &config.theme;
    let half_w = layout.node_width / 2.0;
    let half_h = layout.node_height / 2.0;

    let (min_x, min_y, max_x, max_y) = payload.nodes.iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(x0, y0, x1, y1), node| {
            (
                x0.min(node.x - half_w),
                y0.min(node.y - half_h),
                x1.max(node.x + half_w),
                y1.max(node.y + half_h),
            )
        },
    );
    let (min_x, min_y, max_x, max_y) = if payload.nodes.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (min_x, min_y, max_x, max_y)
    };
    let width = (max_x - min_x + MARGIN * 2.0).max(200.0);
    let height = (max_y - min_y + MARGIN * 2.0).max(200.0);
    let shift = (MARGIN - min_x, MARGIN - min_y);

    let centers: HashMap<&str, (f32, f32)> = payload
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), (node.x + shift.0, node.y + shift.1)))
        .collect();

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&config.render.background)
    ));

    let mut marker_ids: HashMap<&str, String> = HashMap::new();
    svg.push_str("<defs>");
    for edge in &payload.edges {
        let color = edge.color.color.as_str();
        if marker_ids.contains_key(color) {
            continue;
        }
        let id = format!("arrow-{}", marker_ids.len());
        let size = 10.0 * layout.arrow_scale;
        svg.push_str(&format!(
            "<marker id=\"{id}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"{size:.2}\" markerHeight=\"{size:.2}\" markerUnits=\"userSpaceOnUse\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
            escape_xml(color)
        ));
        marker_ids.insert(color, id);
    }
    svg.push_str("</defs>");

    let mut segments: Vec<Option<((f32, f32), (f32, f32))>> = Vec::with_capacity(payload.edges.len());
    for edge in &payload.edges {
        let (Some(&from), Some(&to)) = (
            centers.get(edge.from.as_str()),
            centers.get(edge.to.as_str()),
        ) else {
            segments.push(None);
            continue;
        };
        let start = clip_to_box(from, to, half_w, half_h);
        let end = clip_to_box(to, from, half_w, half_h);
        segments.push(Some((start, end)));

        let dash = match &edge.dashes {
            crate::network::Dashes::Pattern(pattern) if !pattern.is_empty() => {
                let parts: Vec<String> = pattern.iter().map(u32::to_string).collect();
                format!(" stroke-dasharray=\"{}\"", parts.join(" "))
            }
            _ => String::new(),
        };
        let marker = marker_ids
            .get(edge.color.color.as_str())
            .map(|id| format!(" marker-end=\"url(#{id})\""))
            .unwrap_or_default();
        svg.push_str(&format!(
            "<path d=\"M {:.2} {:.2} L {:.2} {:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{dash}{marker}/>",
            start.0,
            start.1,
            end.0,
            end.1,
            escape_xml(&edge.color.color),
            edge.width
        ));
    }

    let node_rects: Vec<Rect> = centers
        .values()
        .map(|(x, y)| (x - half_w, y - half_h, layout.node_width, layout.node_height))
        .collect();
    let label_positions =
        compute_edge_label_positions(&payload.edges, &segments, &node_rects, layout.edge_font_size);
    for (idx, edge) in payload.edges.iter().enumerate() {
        let (Some(label), Some((x, y, w, h))) = (edge.label.as_deref(), label_positions.get(&idx).copied()) else {
            continue;
        };
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"3\" ry=\"3\" fill=\"{}\"/>",
            x - w / 2.0,
            y - h / 2.0,
            escape_xml(&edge.font.background)
        ));
        svg.push_str(&text_block_svg(
            x,
            y,
            &[label],
            &edge.font.color,
            edge.font.size,
            &theme.font_family,
        ));
    }

    for node in &payload.nodes {
        let Some(&(cx, cy)) = centers.get(node.id.as_str()) else {
            continue;
        };
        svg.push_str(&node_svg(node, cx, cy, half_w, half_h, &theme.font_family));
    }

    svg.push_str("</svg>");
    svg
}

fn node_svg(node: &NetworkNode, cx: f32, cy: f32, half_w: f32, half_h: f32, font_family: &str) -> String {
    let mut out = format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"><title>{}</title></rect>",
        cx - half_w,
        cy - half_h,
        half_w * 2.0,
        half_h * 2.0,
        escape_xml(&node.color.background),
        escape_xml(&node.color.border),
        node.border_width,
        escape_xml(&node.title)
    );
    let lines: Vec<&str> = node.label.lines().collect();
    out.push_str(&text_block_svg(cx, cy, &lines, &node.font.color, node.font.size, font_family));
    out
}

fn text_block_svg(x: f32, y: f32, lines: &[&str], fill: &str, font_size: f32, font_family: &str) -> String {
    let total_height = lines.len() as f32 * font_size * LINE_HEIGHT;
    let start_y = y - total_height / 2.0 + font_size;
    let mut text = format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">",
        escape_xml(font_family),
        font_size,
        escape_xml(fill)
    );
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { font_size * LINE_HEIGHT };
        text.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    text.push_str("</text>");
    text
}

/// Point where the segment from `center` towards `other` leaves the box.
fn clip_to_box(center: (f32, f32), other: (f32, f32), half_w: f32, half_h: f32) -> (f32, f32) {
    let dx = other.0 - center.0;
    let dy = other.1 - center.1;
    if dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON {
        return center;
    }
    let tx = if dx.abs() < f32::EPSILON { f32::MAX } else { half_w / dx.abs() };
    let ty = if dy.abs() < f32::EPSILON { f32::MAX } else { half_h / dy.abs() };
    let t = tx.min(ty).min(1.0);
    (center.0 + dx * t, center.1 + dy * t)
}

fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|c| if c.is_ascii() { font_size * 0.6 } else { font_size })
        .sum()
}

/// Places each label at its edge midpoint, sliding along the edge when it
/// would overlap a node or an earlier label. Returns centre and size.
fn compute_edge_label_positions(
    edges: &[NetworkEdge],
    segments: &[Option<((f32, f32), (f32, f32))>],
    node_rects: &[Rect],
    font_size: f32,
) -> HashMap<usize, Rect> {
    let mut occupied: Vec<Rect> = node_rects.to_vec();
    let mut positions = HashMap::new();

    for (idx, edge) in edges.iter().enumerate() {
        let (Some(label), Some(Some((start, end)))) = (edge.label.as_deref(), segments.get(idx)) else {
            continue;
        };
        let w = estimate_text_width(label, font_size) + 8.0;
        let h = font_size * LINE_HEIGHT + 4.0;
        let mut placed = None;
        for t in [0.5, 0.4, 0.6, 0.3, 0.7, 0.2] {
            let x = start.0 + (end.0 - start.0) * t;
            let y = start.1 + (end.1 - start.1) * t;
            let rect = (x - w / 2.0, y - h / 2.0, w, h);
            if !collides(&rect, &occupied) {
                occupied.push(rect);
                placed = Some((x, y, w, h));
                break;
            }
        }
        let placed = placed.unwrap_or((
            (start.0 + end.0) / 2.0,
            (start.1 + end.1) / 2.0,
            w,
            h,
        ));
        positions.insert(idx, placed);
    }

    positions
}

fn collides(rect: &Rect, occupied: &[Rect]) -> bool {
    occupied.iter().any(|(x, y, w, h)| {
        rect.0 < x + w && rect.0 + rect.2 > *x && rect.1 < y + h && rect.1 + rect.3 > *y
    })
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = config.theme.font_family.clone();
    opt.default_size = usvg::Size::from_wh(config.render.width, config.render.height)
        .or_else(|| usvg::Size::from_wh(800.0, 600.0))
        .ok_or_else(|| anyhow::anyhow!("invalid render size"))?;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

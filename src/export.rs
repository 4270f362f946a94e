//! Standalone exports of the network payload.
//!
//! The HTML page embeds exactly the text produced by [`payload_to_json`], so
//! the page, the downloaded JSON and the in-memory payload never diverge.

use crate::error::Result;
use crate::network::NetworkPayload;

pub const VIS_NETWORK_SCRIPT: &str =
    "https://unpkg.com/vis-network@9.1.6/dist/vis-network.min.js";

const DATA_ELEMENT_ID: &str = "equity-chart-data";

/// Page-side inverse of [`escape_script_text`].
const UNESCAPE_SCRIPT_TEXT: &str = "const json = raw.replace(/<\\\\\\//g, '</');\n";

#[derive(Debug, Clone)]
pub struct HtmlOptions {
    pub title: String,
    /// CSS height of the chart container.
    pub height: String,
    pub script_src: String,
    pub background: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            title: "Equity Structure".to_string(),
            height: "800px".to_string(),
            script_src: VIS_NETWORK_SCRIPT.to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

pub fn payload_to_json(payload: &NetworkPayload) -> Result<String> {
    Ok(serde_json::to_string_pretty(payload)?)
}

pub fn payload_from_json(text: &str) -> Result<NetworkPayload> {
    Ok(serde_json::from_str(text)?)
}

/// Self-contained page rendering `payload` with vis-network.
pub fn payload_to_html(payload: &NetworkPayload, options: &HtmlOptions) -> Result<String> {
    let json = payload_to_json(payload)?;
    let mut html = String::with_capacity(json.len() + 4096);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str(&format!("<title>{}</title>\n", escape_html(&options.title)));
    html.push_str(&format!(
        "<script type=\"text/javascript\" src=\"{}\"></script>\n",
        escape_html(&options.script_src)
    ));
    html.push_str("<style>\n");
    html.push_str("* { margin: 0; padding: 0; box-sizing: border-box; }\n");
    html.push_str(&format!(
        "body {{ font-family: -apple-system, 'Segoe UI', 'Microsoft YaHei', sans-serif; background: {}; }}\n",
        escape_html(&options.background)
    ));
    html.push_str("header { display: flex; gap: 8px; align-items: center; padding: 8px 12px; border-bottom: 1px solid #e0e0e0; }\n");
    html.push_str("header h1 { font-size: 16px; font-weight: 600; flex: 1; }\n");
    html.push_str("button { padding: 4px 10px; border: 1px solid #bdbdbd; border-radius: 4px; background: #fff; cursor: pointer; }\n");
    html.push_str(&format!(
        "#network-container {{ width: 100%; height: {}; }}\n",
        escape_html(&options.height)
    ));
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(&format!(
        "<header><h1>{}</h1><button id=\"fit\">Fit</button><button id=\"download\">Download JSON</button></header>\n",
        escape_html(&options.title)
    ));
    html.push_str("<div id=\"network-container\"></div>\n");
    html.push_str(&format!(
        "<script type=\"application/json\" id=\"{DATA_ELEMENT_ID}\">{}</script>\n",
        escape_script_text(&json)
    ));
    html.push_str("<script type=\"text/javascript\">\n");
    html.push_str(&format!(
        "const raw = document.getElementById('{DATA_ELEMENT_ID}').textContent;\n"
    ));
    html.push_str(UNESCAPE_SCRIPT_TEXT);
    html.push_str("const data = JSON.parse(json);\n");
    html.push_str("const network = new vis.Network(\n");
    html.push_str("  document.getElementById('network-container'),\n");
    html.push_str("  { nodes: new vis.DataSet(data.nodes), edges: new vis.DataSet(data.edges) },\n");
    html.push_str("  data.layoutOptions\n);\n");
    html.push_str("network.once('afterDrawing', () => network.fit());\n");
    html.push_str("document.getElementById('fit').onclick = () => network.fit({ animation: true });\n");
    html.push_str("document.getElementById('download').onclick = () => {\n");
    html.push_str("  const blob = new Blob([json], { type: 'application/json' });\n");
    html.push_str("  const link = document.createElement('a');\n");
    html.push_str("  link.href = URL.createObjectURL(blob);\n");
    html.push_str("  link.download = 'equity-chart.json';\n");
    html.push_str("  link.click();\n");
    html.push_str("  URL.revokeObjectURL(link.href);\n");
    html.push_str("};\n");
    html.push_str("</script>\n</body>\n</html>\n");
    Ok(html)
}

/// Recovers the JSON document embedded by [`payload_to_html`].
pub fn embedded_payload_json(html: &str) -> Option<String> {
    let open = format!("<script type=\"application/json\" id=\"{DATA_ELEMENT_ID}\">");
    let start = html.find(&open)? + open.len();
    let end = start + html[start..].find("</script>")?;
    Some(html[start..end].replace("<\\/", "</"))
}

/// `</` inside a script element would end it early; `<\/` parses to the same
/// JSON string.
fn escape_script_text(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

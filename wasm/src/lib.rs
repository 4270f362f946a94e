use equity_chart::config::Direction;
use equity_chart::format::ZeroPercentage;
use equity_chart::import::{graph_from_json, normalize_legacy};
use equity_chart::theme::Theme;
use equity_chart::{Config, generate_charts};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartOptions {
    theme: Option<String>,
    font_family: Option<String>,
    direction: Option<String>,
    control_label: Option<String>,
    zero_percentage: Option<ZeroPercentage>,
    show_metadata: Option<bool>,
}

fn build_config(options: ChartOptions) -> Result<Config, String> {
    let mut config = Config::default();
    if options.theme.as_deref() == Some("monochrome") {
        config.theme = Theme::monochrome();
    }
    if let Some(font_family) = options.font_family {
        config.theme.font_family = font_family;
    }
    if let Some(token) = options.direction {
        config.layout.direction =
            Direction::from_token(&token).ok_or_else(|| format!("unknown direction: {token}"))?;
    }
    if let Some(label) = options.control_label {
        config.labels.control_label = label;
    }
    if let Some(policy) = options.zero_percentage {
        config.labels.zero_percentage = policy;
    }
    if let Some(show) = options.show_metadata {
        config.labels.show_metadata = show;
    }
    Ok(config)
}

fn parse_options(options_json: Option<String>) -> Result<Config, JsValue> {
    let options = match options_json {
        Some(raw) => serde_json::from_str::<ChartOptions>(&raw)
            .map_err(|error| JsValue::from_str(&error.to_string()))?,
        None => ChartOptions::default(),
    };
    build_config(options).map_err(|error| JsValue::from_str(&error))
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Mermaid text and network payload for one graph, as
/// `{ "mermaid": "...", "network": {...}, "warnings": [...] }`.
#[wasm_bindgen]
pub fn render_equity_charts(graph_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let config = parse_options(options_json)?;
    let graph = graph_from_json(graph_json).map_err(to_js)?;
    let charts = generate_charts(&graph, &config).map_err(to_js)?;
    let out = serde_json::json!({
        "mermaid": charts.mermaid.text,
        "network": charts.network,
        "warnings": charts.levels.warnings,
    });
    Ok(out.to_string())
}

#[wasm_bindgen]
pub fn render_mermaid_text(graph_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let config = parse_options(options_json)?;
    let graph = graph_from_json(graph_json).map_err(to_js)?;
    equity_chart::mermaid_text(&graph, &config).map_err(to_js)
}

/// Converts a legacy `equity_data` mapping to the typed graph JSON.
#[wasm_bindgen]
pub fn normalize_equity_data(legacy_json: &str) -> Result<String, JsValue> {
    let value: serde_json::Value = serde_json::from_str(legacy_json).map_err(to_js)?;
    let graph = normalize_legacy(&value).map_err(to_js)?;
    serde_json::to_string(&graph).map_err(to_js)
}

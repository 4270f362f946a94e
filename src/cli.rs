use crate::config::load_config;
use crate::export::{HtmlOptions, payload_to_html, payload_to_json};
use crate::import::{graph_from_json, graph_from_legacy_json};
use crate::mermaid::generate_mermaid;
use crate::model::OwnershipGraph;
use crate::network::generate_network;
use crate::render::{render_svg, write_output_svg};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "eqchart",
    version,
    about = "Equity structure charts: Mermaid text, vis-network payloads, HTML and SVG"
)]
pub struct Args {
    /// Input graph JSON (or snapshot), or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Text formats and SVG default to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "mermaid")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Input is a legacy `equity_data` mapping
    #[arg(long = "legacy")]
    pub legacy: bool,

    /// Page title for HTML output
    #[arg(long = "title")]
    pub title: Option<String>,

    /// Width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mermaid,
    Network,
    Html,
    Svg,
    Png,
    Levels,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }

    let input = read_input(args.input.as_deref())?;
    let graph = parse_graph(&input, args.legacy)?;
    let levels = crate::levels_for(&graph, &config);
    for warning in &levels.warnings {
        warn!(%warning, "levels are best effort");
    }
    debug!(
        entities = graph.entities.len(),
        format = ?args.output_format,
        "rendering"
    );

    match args.output_format {
        OutputFormat::Mermaid => {
            let diagram = generate_mermaid(&graph, &levels, &config)?;
            write_text(&diagram.text, args.output.as_deref())?;
        }
        OutputFormat::Network => {
            let payload = generate_network(&graph, &levels, &config)?;
            write_text(&payload_to_json(&payload)?, args.output.as_deref())?;
        }
        OutputFormat::Html => {
            let payload = generate_network(&graph, &levels, &config)?;
            let options = HtmlOptions {
                title: page_title(args.title.as_deref(), &graph),
                background: config.theme.background.clone(),
                ..HtmlOptions::default()
            };
            write_text(&payload_to_html(&payload, &options)?, args.output.as_deref())?;
        }
        OutputFormat::Svg => {
            let payload = generate_network(&graph, &levels, &config)?;
            write_output_svg(&render_svg(&payload, &config), args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let payload = generate_network(&graph, &levels, &config)?;
            write_png(&render_svg(&payload, &config), &output, &config)?;
        }
        OutputFormat::Levels => {
            let json = serde_json::to_string_pretty(&levels)?;
            write_text(&json, args.output.as_deref())?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_graph(input: &str, legacy: bool) -> Result<OwnershipGraph> {
    let graph = if legacy {
        graph_from_legacy_json(input)?
    } else {
        graph_from_json(input)?
    };
    Ok(graph)
}

fn page_title(title: Option<&str>, graph: &OwnershipGraph) -> String {
    match (title, graph.core_company.as_deref()) {
        (Some(title), _) => title.to_string(),
        (None, Some(core)) => format!("{core} - Equity Structure"),
        (None, None) => HtmlOptions::default().title,
    }
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &crate::config::Config) -> Result<()> {
    crate::render::write_output_png(svg, output, config)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &crate::config::Config) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_flags() {
        let args = Args::try_parse_from([
            "eqchart", "-i", "graph.json", "-e", "html", "--title", "Acme", "--legacy",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Html);
        assert!(args.legacy);
        assert_eq!(args.title.as_deref(), Some("Acme"));
        assert!(args.width.is_none());
    }

    #[test]
    fn defaults_to_mermaid() {
        let args = Args::try_parse_from(["eqchart"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Mermaid);
    }

    #[test]
    fn png_needs_output_path() {
        assert!(ensure_output(&None, "png").is_err());
    }

    #[test]
    fn title_falls_back_to_core_company() {
        let mut graph = OwnershipGraph::new();
        assert_eq!(page_title(None, &graph), "Equity Structure");
        graph.core_company = Some("Acme Co".to_string());
        assert_eq!(page_title(None, &graph), "Acme Co - Equity Structure");
        assert_eq!(page_title(Some("Board pack"), &graph), "Board pack");
    }

    #[test]
    fn legacy_flag_switches_parser() {
        let legacy = r#"{ "core_company": "Acme Co", "shareholders": [{ "name": "Alice", "percentage": "60%" }] }"#;
        let graph = parse_graph(legacy, true).unwrap();
        assert_eq!(graph.shareholdings.len(), 1);
        assert!(parse_graph(legacy, false).is_err());
    }
}

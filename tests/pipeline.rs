use std::collections::BTreeMap;
use std::path::Path;

use equity_chart::export::{HtmlOptions, embedded_payload_json, payload_to_html, payload_to_json};
use equity_chart::import::{graph_from_json, graph_from_legacy_json, graph_to_json};
use equity_chart::mermaid::unescape_label;
use equity_chart::render::render_svg;
use equity_chart::theme::EdgeClass;
use equity_chart::{
    Config, Entity, EntityType, OwnershipGraph, assign_levels, generate_charts, generate_mermaid,
    generate_network,
};

fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixture(name: &str) -> OwnershipGraph {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture read failed");
    graph_from_json(&text).expect("fixture should import")
}

/// Statement line for `id` in the Mermaid text.
fn node_line<'a>(text: &'a str, id: &str) -> &'a str {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with(&format!("{id}[\"")))
        .unwrap_or_else(|| panic!("no node statement for {id}"))
}

#[test]
fn render_all_fixtures() {
    let config = Config::default();
    for name in ["acme.json", "cross_holding.json", "special_names.json"] {
        let graph = load_fixture(name);
        let charts = generate_charts(&graph, &config).expect("generation failed");

        assert!(charts.mermaid.text.starts_with("graph TD\n"), "{name}: header");
        assert_eq!(charts.mermaid.levels, charts.network.levels(), "{name}: levels differ");
        assert_eq!(charts.network.nodes.len(), graph.entities.len(), "{name}: nodes");
        assert_eq!(
            charts.network.edges.len(),
            graph.shareholdings.len() + graph.controls.len(),
            "{name}: edges"
        );

        let svg = render_svg(&charts.network, &config);
        assert!(svg.contains("<svg"), "{name}: missing <svg tag");
        assert!(svg.contains("</svg>"), "{name}: missing </svg tag");
    }
}

#[test]
fn acme_scenario() {
    let mut graph = OwnershipGraph::new();
    for (name, ty) in [
        ("Acme Co", EntityType::CoreCompany),
        ("Alice", EntityType::Individual),
        ("Acme Sub", EntityType::Subsidiary),
    ] {
        graph.add_entity(Entity::new(name, ty)).unwrap();
    }
    graph.set_core_company("Acme Co").unwrap();
    graph.add_top_level("Alice").unwrap();
    graph.set_shareholding("Alice", "Acme Co", 60.0).unwrap();
    graph.set_shareholding("Acme Co", "Acme Sub", 100.0).unwrap();

    let levels = assign_levels(&graph);
    assert_eq!(levels.get("Alice"), Some(0));
    assert_eq!(levels.get("Acme Co"), Some(1));
    assert_eq!(levels.get("Acme Sub"), Some(2));

    let diagram = generate_mermaid(&graph, &levels, &Config::default()).unwrap();
    let id = |name: &str| diagram.node_id(name).unwrap().to_string();
    assert!(diagram
        .text
        .contains(&format!("{} -->|60%| {}", id("Alice"), id("Acme Co"))));
    assert!(diagram
        .text
        .contains(&format!("{} -->|100%| {}", id("Acme Co"), id("Acme Sub"))));
}

#[test]
fn cross_holding_terminates_with_warning() {
    let graph = load_fixture("cross_holding.json");
    let charts = generate_charts(&graph, &Config::default()).unwrap();
    assert_eq!(charts.levels.get("X"), Some(0));
    assert_eq!(charts.levels.get("Y"), Some(1));
    assert_eq!(charts.levels.get("Z"), Some(2));
    assert!(charts.levels.has_cycles());
    assert_eq!(
        charts.levels.warnings[0].broken_edges,
        vec![("Y".to_string(), "X".to_string())]
    );
    assert!(charts.mermaid.text.contains("|33.33%|"));
}

#[test]
fn control_edge_dashed_in_both_outputs() {
    let graph = load_fixture("acme.json");
    let charts = generate_charts(&graph, &Config::default()).unwrap();

    let controller = charts.mermaid.node_id("Controller1").unwrap();
    let core = charts.mermaid.node_id("Acme Co").unwrap();
    assert!(charts
        .mermaid
        .text
        .contains(&format!("{controller} -.->|control| {core}")));
    assert!(charts.mermaid.text.contains("stroke-dasharray:5 5"));

    let control = charts
        .network
        .edges
        .iter()
        .find(|edge| edge.kind == EdgeClass::Control)
        .unwrap();
    assert_eq!(control.label.as_deref(), Some("control"));
    assert!(control.dashes.is_dashed());
    let ownership = charts
        .network
        .edges
        .iter()
        .find(|edge| edge.kind == EdgeClass::Ownership)
        .unwrap();
    assert!(!ownership.dashes.is_dashed());
    assert_ne!(ownership.color.color, control.color.color);
}

#[test]
fn metadata_lines_reach_both_outputs() {
    let graph = load_fixture("acme.json");
    let charts = generate_charts(&graph, &Config::default()).unwrap();
    let core = charts.mermaid.node_id("Acme Co").unwrap();
    assert_eq!(
        node_line(&charts.mermaid.text, core),
        format!(
            "{core}[\"Acme Company Limited<br/>Acme Co<br/>Cap: RMB50M<br/>Established: June.2012\"]"
        )
    );
    assert_eq!(
        charts.network.node("Acme Co").unwrap().label,
        "Acme Company Limited\nAcme Co\nCap: RMB50M\nEstablished: June.2012"
    );
}

#[test]
fn special_names_keep_statements_intact() {
    let graph = load_fixture("special_names.json");
    let charts = generate_charts(&graph, &Config::default()).unwrap();
    let text = &charts.mermaid.text;

    for entity in &graph.entities {
        let id = charts.mermaid.node_id(&entity.name).unwrap();
        let line = node_line(text, id);
        assert_eq!(line.matches('"').count(), 2, "{line}");
        let inner = &line[id.len() + 2..line.len() - 2];
        assert!(!inner.contains(['[', ']', '|', '{', '}']), "{line}");
        assert_eq!(unescape_label(inner), entity.name);
    }
    assert!(text.contains("|voting #91;proxy#93; #124; #34;agreement#34;|"));
    assert!(text.contains("|12.35%|"));
    assert!(text.lines().all(|line| !line.contains('\n')));
}

#[test]
fn zero_percentage_policy_is_configurable() {
    let graph = load_fixture("special_names.json");
    let omit = generate_charts(&graph, &Config::default()).unwrap();
    let zero_edge = omit
        .network
        .edges
        .iter()
        .find(|edge| edge.percentage == Some(0.0))
        .unwrap();
    assert_eq!(zero_edge.label, None);

    let mut config = Config::default();
    config.labels.zero_percentage = equity_chart::format::ZeroPercentage::Show;
    let show = generate_charts(&graph, &config).unwrap();
    let zero_edge = show
        .network
        .edges
        .iter()
        .find(|edge| edge.percentage == Some(0.0))
        .unwrap();
    assert_eq!(zero_edge.label.as_deref(), Some("0%"));
    assert!(show.mermaid.text.contains("|0%|"));
}

#[test]
fn generators_are_idempotent() {
    let graph = load_fixture("acme.json");
    let levels = assign_levels(&graph);
    let config = Config::default();
    let first = generate_mermaid(&graph, &levels, &config).unwrap();
    let second = generate_mermaid(&graph, &levels, &config).unwrap();
    assert_eq!(first.text, second.text);

    let a = payload_to_json(&generate_network(&graph, &levels, &config).unwrap()).unwrap();
    let b = payload_to_json(&generate_network(&graph, &levels, &config).unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn json_round_trip() {
    for name in ["acme.json", "cross_holding.json", "special_names.json"] {
        let graph = load_fixture(name);
        let text = graph_to_json(&graph).unwrap();
        assert_eq!(graph_from_json(&text).unwrap(), graph, "{name}");
    }
}

#[test]
fn html_export_reproduces_payload() {
    let graph = load_fixture("special_names.json");
    let charts = generate_charts(&graph, &Config::default()).unwrap();
    let json = payload_to_json(&charts.network).unwrap();
    let html = payload_to_html(&charts.network, &HtmlOptions::default()).unwrap();
    assert_eq!(embedded_payload_json(&html).unwrap(), json);
    assert!(!html.contains("<script>alert(1)</script>"));
}

#[test]
fn legacy_fixture_normalizes_and_renders() {
    let text = std::fs::read_to_string(fixture_path("legacy_equity_data.json")).unwrap();
    let graph = graph_from_legacy_json(&text).unwrap();
    assert_eq!(graph.entities.len(), 4);
    assert_eq!(graph.shareholdings.len(), 4);
    assert_eq!(graph.controls.len(), 1);
    assert_eq!(
        graph.top_level,
        vec!["方庆熙".to_string(), "泉州市志成投资有限公司".to_string()]
    );

    let charts = generate_charts(&graph, &Config::default()).unwrap();
    assert_eq!(charts.levels.get("方庆熙"), Some(0));
    assert_eq!(charts.levels.get("泉州市志成投资有限公司"), Some(1));
    assert_eq!(charts.levels.get("福建南方路面机械股份有限公司"), Some(2));
    assert_eq!(charts.levels.get("南方路面(香港)有限公司"), Some(3));
    assert!(charts.mermaid.text.contains("|32.15%|"));
    assert!(charts.mermaid.text.contains("Cap: RMB120M"));
    assert!(charts.mermaid.text.contains("Established: May.1997"));
}

/// Deterministic pseudo-random layered graphs with some back edges.
fn synthetic_graph(seed: u64, size: usize) -> OwnershipGraph {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };
    let mut graph = OwnershipGraph::new();
    for idx in 0..size {
        graph
            .add_entity(Entity::new(format!("N{idx}"), EntityType::Company))
            .unwrap();
    }
    graph.set_core_company("N0").unwrap();
    for idx in 1..size {
        let parent = next() % idx;
        graph
            .set_shareholding(&format!("N{parent}"), &format!("N{idx}"), (next() % 100) as f64)
            .unwrap();
        if next() % 5 == 0 {
            let back = next() % idx;
            graph
                .add_control(&format!("N{idx}"), &format!("N{back}"), None)
                .unwrap();
        }
    }
    graph
}

#[test]
fn levels_respect_every_unbroken_edge() {
    for seed in 1..=20 {
        let graph = synthetic_graph(seed, 40);
        let levels = assign_levels(&graph);
        assert_eq!(levels.levels.len(), graph.entities.len());
        let broken: Vec<(String, String)> = levels
            .warnings
            .iter()
            .flat_map(|w| w.broken_edges.iter().cloned())
            .collect();
        for (from, to) in graph.parent_links() {
            if broken.contains(&(from.to_string(), to.to_string())) {
                continue;
            }
            assert!(
                levels.get(to).unwrap() > levels.get(from).unwrap(),
                "seed {seed}: {from} -> {to}"
            );
        }
        assert!(levels.warnings.iter().all(|w| !w.iteration_cap_reached));
    }
}

#[test]
fn cross_renderer_levels_agree_on_synthetic_graphs() {
    let config = Config::default();
    for seed in 1..=10 {
        let graph = synthetic_graph(seed, 30);
        let charts = generate_charts(&graph, &config).unwrap();
        let expected: BTreeMap<String, usize> = charts.levels.levels.clone();
        assert_eq!(charts.mermaid.levels, expected);
        assert_eq!(charts.network.levels(), expected);
    }
}

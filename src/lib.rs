//! Equity and ownership structure charts.
//!
//! A graph snapshot is levelled once with [`levels::assign_levels`]; the
//! Mermaid text and the vis-network payload are both generated from that
//! single assignment.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod import;
pub mod levels;
pub mod mermaid;
pub mod model;
pub mod network;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use error::{ChartError, EscapeError, Result, ValidationError};
pub use levels::{CycleWarning, LevelAssignment, assign_levels};
pub use mermaid::{MermaidDiagram, escape_label, generate_mermaid};
pub use model::{ControlEdge, Entity, EntityMetadata, EntityType, OwnershipGraph, ShareholdingEdge};
pub use network::{NetworkPayload, generate_network};

/// Both renderings of one snapshot, plus the levels they share.
#[derive(Debug, Clone)]
pub struct Charts {
    pub levels: LevelAssignment,
    pub mermaid: MermaidDiagram,
    pub network: NetworkPayload,
}

/// Levels for `graph` honouring the configured relaxation cap.
pub fn levels_for(graph: &OwnershipGraph, config: &Config) -> LevelAssignment {
    levels::assign_levels_capped(graph, config.layout.max_level_iterations)
}

pub fn generate_charts(graph: &OwnershipGraph, config: &Config) -> Result<Charts> {
    graph.validate()?;
    let levels = levels_for(graph, config);
    let mermaid = generate_mermaid(graph, &levels, config)?;
    let network = generate_network(graph, &levels, config)?;
    Ok(Charts {
        levels,
        mermaid,
        network,
    })
}

pub fn mermaid_text(graph: &OwnershipGraph, config: &Config) -> Result<String> {
    graph.validate()?;
    let levels = levels_for(graph, config);
    Ok(generate_mermaid(graph, &levels, config)?.text)
}

pub fn network_payload(graph: &OwnershipGraph, config: &Config) -> Result<NetworkPayload> {
    graph.validate()?;
    let levels = levels_for(graph, config);
    generate_network(graph, &levels, config)
}

//! Graphviz DOT export of the dependency graph.
//!
//! This text is the whole contract with an external rasterizer: steps are
//! white boxes, assumptions are ellipses colored by scope, and each edge
//! kind has its own stroke.
//!
//! ```text
//! dot -Tpng proof.dot -o proof.png
//! ```

use crate::types::{DependencyGraph, EdgeKind, StyleHint};

/// DOT export configuration.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Graph direction: "TB" (top-bottom), "LR" (left-right), etc.
    pub rankdir: String,
    /// Font name for labels.
    pub font_name: String,
    /// Font size for labels.
    pub font_size: u32,
    /// Fill color of global assumptions.
    pub global_color: String,
    /// Fill color of local assumptions.
    pub local_color: String,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            rankdir: "TB".to_string(),
            font_name: "Helvetica".to_string(),
            font_size: 11,
            global_color: "#ADD8E6".to_string(),
            local_color: "#FFFF99".to_string(),
        }
    }
}

impl DotConfig {
    /// Create a left-to-right layout.
    pub fn left_to_right() -> Self {
        Self {
            rankdir: "LR".to_string(),
            ..Default::default()
        }
    }
}

impl DependencyGraph {
    /// Export to DOT with the default configuration.
    pub fn to_dot(&self) -> String {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Export to DOT with custom configuration.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> String {
        let mut dot = String::new();

        dot.push_str("digraph ProofDependencies {\n");
        dot.push_str(&format!("    rankdir={};\n", config.rankdir));
        dot.push_str(&format!(
            "    node [fontname=\"{}\", fontsize={}, style=filled];\n",
            config.font_name, config.font_size
        ));
        dot.push_str(&format!(
            "    edge [fontname=\"{}\", fontsize={}];\n",
            config.font_name,
            config.font_size.saturating_sub(2)
        ));
        dot.push('\n');

        for node in &self.nodes {
            let (shape, color) = match node.style_hint {
                StyleHint::Step => ("box", "white"),
                StyleHint::GlobalAssumption => ("ellipse", config.global_color.as_str()),
                StyleHint::LocalAssumption => ("ellipse", config.local_color.as_str()),
            };
            dot.push_str(&format!(
                "    \"{}\" [label=\"{}\", shape={}, fillcolor=\"{}\"];\n",
                node.id,
                escape_dot_string(&node.label),
                shape,
                color
            ));
        }

        dot.push('\n');

        for edge in &self.edges {
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\" [{}];\n",
                edge.source,
                edge.target,
                edge_kind_to_dot_style(edge.kind)
            ));
        }

        dot.push_str("}\n");
        dot
    }
}

fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn edge_kind_to_dot_style(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Sequential => "color=\"#808080\", style=dotted",
        EdgeKind::UsesAssumption => "color=\"#1E90FF\"",
        EdgeKind::ExplicitReference => "color=\"#DC143C\", style=bold, penwidth=2",
    }
}

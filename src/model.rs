//! Ecosystem graph model
//!
//! The typed boundary between the host application's data and the physics
//! core. Graphs are read from JSON or YAML and validated once here, so the
//! simulation, orbital force and particle engine can assume well-formed
//! input.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcoError, EcoResult};

/// Default node colors by kind (RGBA, normalized 0.0-1.0)
pub mod colors {
    /// Root tokens: Gold (#F5B041)
    pub const ROOT: [f32; 4] = [0.961, 0.690, 0.255, 1.0];

    /// Branch tokens: Blue (#4A90D9)
    pub const BRANCH: [f32; 4] = [0.290, 0.565, 0.851, 1.0];

    /// Leaf tokens: Green (#50C878)
    pub const LEAF: [f32; 4] = [0.314, 0.784, 0.471, 1.0];

    /// Links without an explicit color: pale cyan (#64B4FF)
    pub const LINK: [f32; 4] = [0.392, 0.706, 1.0, 1.0];
}

/// Position of a token in the ecosystem hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Branch,
    Leaf,
}

impl NodeKind {
    /// Every kind, in hierarchy order
    pub const ALL: [NodeKind; 3] = [NodeKind::Root, NodeKind::Branch, NodeKind::Leaf];

    /// Default color for this kind
    pub fn color(&self) -> [f32; 4] {
        match self {
            NodeKind::Root => colors::ROOT,
            NodeKind::Branch => colors::BRANCH,
            NodeKind::Leaf => colors::LEAF,
        }
    }

    /// Whether nodes of this kind can anchor an orbit
    pub fn is_anchor(&self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Branch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Branch => "branch",
            NodeKind::Leaf => "leaf",
        }
    }
}

/// A token in the ecosystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Unique identifier
    pub id: String,

    /// Human-readable name for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Hierarchy level
    pub kind: NodeKind,

    /// Rendered size; also feeds the orbit radius
    pub size: f32,

    /// Success metric in [0, 1]
    #[serde(default = "default_success")]
    pub success: f32,

    /// Optional RGBA override of the kind color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 4]>,
}

fn default_success() -> f32 {
    0.5
}

impl Token {
    /// Create a token with default success and color
    pub fn new(id: impl Into<String>, kind: NodeKind, size: f32) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            size,
            success: default_success(),
            color: None,
        }
    }

    /// Label shown for this token (name if present, otherwise id)
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Effective color (override or kind default)
    pub fn display_color(&self) -> [f32; 4] {
        self.color.unwrap_or_else(|| self.kind.color())
    }
}

/// A value-flow link between two tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLink {
    /// Source token id
    pub source: String,

    /// Target token id
    pub target: String,

    /// Flow value: tightens orbits and drives particle count and opacity
    #[serde(default)]
    pub value: f32,

    /// Optional RGBA color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 4]>,
}

impl TokenLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>, value: f32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
            color: None,
        }
    }
}

/// A complete ecosystem: tokens plus value-flow links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcosystemGraph {
    pub nodes: Vec<Token>,
    pub links: Vec<TokenLink>,
}

impl EcosystemGraph {
    /// Read a graph from a `.json`, `.yaml` or `.yml` file
    ///
    /// The graph is validated before it is returned.
    pub fn from_path(path: &Path) -> EcoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let graph: EcosystemGraph = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            _ => serde_json::from_str(&text)?,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Check the invariants every downstream component relies on
    pub fn validate(&self) -> EcoResult<()> {
        let mut ids = HashSet::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(EcoError::Validation("token with empty id".to_string()));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(EcoError::Validation(format!(
                    "duplicate token id '{}'",
                    node.id
                )));
            }
            if !node.size.is_finite() || node.size <= 0.0 {
                return Err(EcoError::Validation(format!(
                    "token '{}' has non-positive size {}",
                    node.id, node.size
                )));
            }
            if !(0.0..=1.0).contains(&node.success) {
                return Err(EcoError::Validation(format!(
                    "token '{}' has success {} outside [0, 1]",
                    node.id, node.success
                )));
            }
        }

        for (i, link) in self.links.iter().enumerate() {
            for end in [&link.source, &link.target] {
                if !ids.contains(end.as_str()) {
                    return Err(EcoError::Validation(format!(
                        "link {i} references unknown token '{end}'"
                    )));
                }
            }
            if !link.value.is_finite() || link.value < 0.0 {
                return Err(EcoError::Validation(format!(
                    "link {i} ({} -> {}) has invalid value {}",
                    link.source, link.target, link.value
                )));
            }
        }

        Ok(())
    }

    /// Number of tokens of the given kind
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }

    /// Build a deterministic demo ecosystem
    ///
    /// Each root gets `branches` branch tokens and each branch gets `leaves`
    /// leaf tokens. Every third leaf link carries zero value so that plain,
    /// particle-free links are represented too.
    pub fn sample(roots: usize, branches: usize, leaves: usize) -> Self {
        let mut graph = EcosystemGraph::default();

        for r in 0..roots {
            let root_id = format!("root-{r}");
            let mut root = Token::new(&root_id, NodeKind::Root, 12.0);
            root.success = 1.0;
            graph.nodes.push(root);

            for b in 0..branches {
                let branch_id = format!("{root_id}/branch-{b}");
                let mut branch = Token::new(&branch_id, NodeKind::Branch, 6.0 + (b % 3) as f32);
                branch.success = 0.4 + 0.1 * (b % 5) as f32;
                graph.nodes.push(branch);
                graph.links.push(TokenLink::new(
                    &root_id,
                    &branch_id,
                    1.0 + (b % 4) as f32,
                ));

                for l in 0..leaves {
                    let leaf_id = format!("{branch_id}/leaf-{l}");
                    let mut leaf = Token::new(&leaf_id, NodeKind::Leaf, 2.0 + (l % 2) as f32);
                    leaf.success = 0.2 + 0.15 * (l % 4) as f32;
                    graph.nodes.push(leaf);
                    graph.links.push(TokenLink::new(
                        &branch_id,
                        &leaf_id,
                        0.5 * (l % 3) as f32,
                    ));
                }
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_graph() -> EcosystemGraph {
        EcosystemGraph {
            nodes: vec![
                Token::new("sol", NodeKind::Root, 10.0),
                Token::new("terra", NodeKind::Branch, 4.0),
            ],
            links: vec![TokenLink::new("sol", "terra", 2.0)],
        }
    }

    #[test]
    fn valid_graph_passes() {
        assert!(two_node_graph().validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut graph = two_node_graph();
        graph.nodes.push(Token::new("sol", NodeKind::Leaf, 1.0));
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate token id 'sol'"));
    }

    #[test]
    fn rejects_non_positive_size() {
        let mut graph = two_node_graph();
        graph.nodes[1].size = 0.0;
        assert!(matches!(graph.validate(), Err(EcoError::Validation(_))));
    }

    #[test]
    fn rejects_success_out_of_range() {
        let mut graph = two_node_graph();
        graph.nodes[0].success = 1.5;
        assert!(graph.validate().is_err());
    }

    #[test]
    fn rejects_dangling_link() {
        let mut graph = two_node_graph();
        graph.links.push(TokenLink::new("terra", "luna", 1.0));
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("unknown token 'luna'"));
    }

    #[test]
    fn rejects_negative_link_value() {
        let mut graph = two_node_graph();
        graph.links[0].value = -1.0;
        assert!(graph.validate().is_err());
    }

    #[test]
    fn parses_json_with_defaults() {
        let json = r#"{
            "nodes": [
                {"id": "a", "kind": "root", "size": 8},
                {"id": "b", "kind": "leaf", "size": 2, "success": 0.9}
            ],
            "links": [{"source": "a", "target": "b"}]
        }"#;
        let graph: EcosystemGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.nodes[0].success, 0.5);
        assert_eq!(graph.nodes[1].kind, NodeKind::Leaf);
        assert_eq!(graph.links[0].value, 0.0);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn parses_yaml() {
        let yaml = "nodes:\n  - {id: a, kind: root, size: 8}\n  - {id: b, kind: branch, size: 3}\nlinks:\n  - {source: a, target: b, value: 4}\n";
        let graph: EcosystemGraph = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(graph.links[0].value, 4.0);
        assert_eq!(graph.count_kind(NodeKind::Branch), 1);
    }

    #[test]
    fn sample_is_valid_and_sized() {
        let graph = EcosystemGraph::sample(1, 3, 4);
        assert!(graph.validate().is_ok());
        assert_eq!(graph.count_kind(NodeKind::Root), 1);
        assert_eq!(graph.count_kind(NodeKind::Branch), 3);
        assert_eq!(graph.count_kind(NodeKind::Leaf), 12);
        assert_eq!(graph.links.len(), 15);
        assert!(graph.links.iter().any(|l| l.value == 0.0));
    }

    #[test]
    fn label_falls_back_to_id() {
        let mut token = Token::new("eth", NodeKind::Root, 5.0);
        assert_eq!(token.label(), "eth");
        token.name = Some("Ether".to_string());
        assert_eq!(token.label(), "Ether");
    }
}

//! Portable graph serialization: JSON node/edge lists and GraphML.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{InteractionEdge, Layer, NodeKind, RegulatoryGraph};
use crate::error::{RegnetError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExport {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: String,
    pub target: String,
    #[serde(rename = "interaction")]
    pub layer: Layer,
}

/// Sorted node/edge list; identical graphs always export identically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub directed: bool,
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

impl RegulatoryGraph {
    pub fn to_export(&self) -> GraphExport {
        GraphExport {
            directed: true,
            nodes: self
                .nodes()
                .into_iter()
                .map(|(id, kind)| NodeExport { id, kind })
                .collect(),
            edges: self
                .edges()
                .into_iter()
                .map(|e| EdgeExport {
                    source: e.source,
                    target: e.target,
                    layer: e.layer,
                })
                .collect(),
        }
    }

    /// Rebuild a graph from an export, rejecting kind conflicts
    pub fn from_export(export: &GraphExport) -> Result<Self> {
        let mut graph = RegulatoryGraph::new();
        for node in &export.nodes {
            graph.add_node(&node.id, node.kind)?;
        }
        for edge in &export.edges {
            graph.add_edge(&InteractionEdge::new(&edge.source, &edge.target, edge.layer))?;
        }
        Ok(graph)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_export())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let export: GraphExport = serde_json::from_slice(&bytes)?;
        Self::from_export(&export)
    }

    pub fn to_graphml(&self) -> Result<String> {
        let export = self.to_export();
        let mut doc = GraphmlDocument::new(true);
        doc.key("type", "node", "string");
        doc.key("interaction", "edge", "string");
        for node in &export.nodes {
            doc.nodes.push((node.id.clone(), vec![("type", node.kind.as_str().to_string())]));
        }
        for edge in &export.edges {
            doc.edges.push((
                edge.source.clone(),
                edge.target.clone(),
                vec![("interaction", edge.layer.as_str().to_string())],
            ));
        }
        doc.render()
    }

    pub fn write_graphml(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_graphml()?)?;
        Ok(())
    }
}

fn xml_err<E: std::fmt::Display>(e: E) -> RegnetError {
    RegnetError::Persistence(format!("GraphML: {}", e))
}

type Attrs = Vec<(&'static str, String)>;

/// Minimal GraphML writer shared by the regulatory and PPI graphs
pub(crate) struct GraphmlDocument {
    directed: bool,
    keys: Vec<(&'static str, &'static str, &'static str)>,
    pub(crate) nodes: Vec<(String, Attrs)>,
    pub(crate) edges: Vec<(String, String, Attrs)>,
}

impl GraphmlDocument {
    pub(crate) fn new(directed: bool) -> Self {
        Self {
            directed,
            keys: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Declare an attribute: id, domain ("node" | "edge"), GraphML type
    pub(crate) fn key(&mut self, id: &'static str, domain: &'static str, attr_type: &'static str) {
        self.keys.push((id, domain, attr_type));
    }

    fn write_data(writer: &mut Writer<Vec<u8>>, attrs: &Attrs) -> Result<()> {
        for (key, value) in attrs {
            writer
                .write_event(Event::Start(BytesStart::new("data").with_attributes([("key", *key)])))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("data")))
                .map_err(xml_err)?;
        }
        Ok(())
    }

    pub(crate) fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(
                BytesStart::new("graphml")
                    .with_attributes([("xmlns", "http://graphml.graphdrawing.org/xmlns")]),
            ))
            .map_err(xml_err)?;

        for (id, domain, attr_type) in &self.keys {
            writer
                .write_event(Event::Empty(BytesStart::new("key").with_attributes([
                    ("id", *id),
                    ("for", *domain),
                    ("attr.name", *id),
                    ("attr.type", *attr_type),
                ])))
                .map_err(xml_err)?;
        }

        let edgedefault = if self.directed { "directed" } else { "undirected" };
        writer
            .write_event(Event::Start(
                BytesStart::new("graph").with_attributes([("id", "G"), ("edgedefault", edgedefault)]),
            ))
            .map_err(xml_err)?;

        for (id, attrs) in &self.nodes {
            writer
                .write_event(Event::Start(
                    BytesStart::new("node").with_attributes([("id", id.as_str())]),
                ))
                .map_err(xml_err)?;
            Self::write_data(&mut writer, attrs)?;
            writer
                .write_event(Event::End(BytesEnd::new("node")))
                .map_err(xml_err)?;
        }

        for (source, target, attrs) in &self.edges {
            writer
                .write_event(Event::Start(BytesStart::new("edge").with_attributes([
                    ("source", source.as_str()),
                    ("target", target.as_str()),
                ])))
                .map_err(xml_err)?;
            Self::write_data(&mut writer, attrs)?;
            writer
                .write_event(Event::End(BytesEnd::new("edge")))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("graph")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("graphml")))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner()).map_err(xml_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_graph() -> RegulatoryGraph {
        let mut graph = RegulatoryGraph::new();
        for edge in [
            InteractionEdge::new("circB", "m1", Layer::UpstreamToMid),
            InteractionEdge::new("circA", "m1", Layer::UpstreamToMid),
            InteractionEdge::new("m1", "G1", Layer::MidToDownstream),
        ] {
            graph.add_edge(&edge).unwrap();
        }
        graph
    }

    #[test]
    fn test_export_is_sorted() {
        let export = sample_graph().to_export();
        let ids: Vec<&str> = export.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["G1", "circA", "circB", "m1"]);
        assert_eq!(export.edges[0].source, "circA");
        assert_eq!(export.edges[2].layer, Layer::MidToDownstream);
    }

    #[test]
    fn test_json_uses_type_labels() {
        let json = serde_json::to_string(&sample_graph().to_export()).unwrap();
        assert!(json.contains(r#""type":"circRNA""#));
        assert!(json.contains(r#""interaction":"miRNA→mRNA""#));
    }

    #[test]
    fn test_json_file_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("network.json");
        let graph = sample_graph();
        graph.write_json(&path).unwrap();

        let reloaded = RegulatoryGraph::read_json(&path).unwrap();
        assert_eq!(reloaded.edges(), graph.edges());
        assert_eq!(reloaded.nodes(), graph.nodes());
    }

    #[test]
    fn test_export_independent_of_insertion_order() {
        let mut reversed = RegulatoryGraph::new();
        for edge in sample_graph().edges().into_iter().rev() {
            reversed.add_edge(&edge).unwrap();
        }
        assert_eq!(reversed.to_graphml().unwrap(), sample_graph().to_graphml().unwrap());
    }

    #[test]
    fn test_graphml_contents() {
        let xml = sample_graph().to_graphml().unwrap();
        assert!(xml.contains(r#"edgedefault="directed""#));
        assert!(xml.contains(r#"<node id="circA">"#));
        assert!(xml.contains(r#"<edge source="m1" target="G1">"#));
        assert!(xml.contains(r#"<data key="type">mRNA</data>"#));
    }
}

//! Serialization tests against the gateway's wire shapes

use serde_json::{json, Value};

/// Node as the gateway returns it
fn gateway_node_fixture() -> Value {
    json!({
        "id": "6f1c2d1e-0000-4000-8000-000000000001",
        "type": "source",
        "title": "Attention Is All You Need",
        "contentPath": "6f1c2d1e-0000-4000-8000-000000000001.md",
        "metadata": {
            "x": 120.5,
            "y": 40,
            "url": "https://arxiv.org/abs/1706.03762",
            "tags": ["ml", "transformers"],
            "summary": null
        },
        "createdAt": "2025-11-29T08:00:00Z",
        "updatedAt": "2025-11-30T10:23:00Z"
    })
}

fn gateway_edge_fixture() -> Value {
    json!({
        "id": "edge-1",
        "source": "doc-1",
        "target": "src-1",
        "label": "cites"
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{Edge, EdgeId, EdgeStatus, GraphSnapshot, Node, NodeId, NodeType, PropertyValue};

    #[test]
    fn node_id_serializes_as_string() {
        let id = NodeId::from_string("doc-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"doc-1\"");
    }

    #[test]
    fn node_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&NodeType::Concept).unwrap(), "\"concept\"");
        let t: NodeType = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(t, NodeType::Image);
    }

    #[test]
    fn node_deserializes_from_gateway_shape() {
        let node: Node = serde_json::from_value(gateway_node_fixture()).unwrap();
        assert_eq!(node.node_type, NodeType::Source);
        assert_eq!(node.title, "Attention Is All You Need");
        assert_eq!(node.content_path, "6f1c2d1e-0000-4000-8000-000000000001.md");
        assert_eq!(node.metadata.get("summary"), Some(&PropertyValue::Null));
        assert_eq!(node.position_hint(), Some((120.5, 40.0)));
    }

    #[test]
    fn node_roundtrips_camel_case_fields() {
        let node: Node = serde_json::from_value(gateway_node_fixture()).unwrap();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "source");
        assert!(json.get("contentPath").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("node_type").is_none());
    }

    #[test]
    fn node_without_optional_fields_uses_defaults() {
        let node: Node = serde_json::from_value(json!({
            "id": "n",
            "title": "bare",
            "createdAt": "2025-11-29T08:00:00Z",
            "updatedAt": "2025-11-29T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(node.node_type, NodeType::Document);
        assert!(node.content_path.is_empty());
        assert!(node.metadata.is_empty());
        assert_eq!(node.position_hint(), None);
    }

    #[test]
    fn non_numeric_position_hint_is_ignored() {
        let node = Node::new("n", NodeType::Concept, "c")
            .with_metadata("x", PropertyValue::String("left".into()))
            .with_metadata("y", PropertyValue::Int(3));
        assert_eq!(node.position_hint(), None);
    }

    #[test]
    fn zero_is_a_valid_position_hint() {
        let node = Node::new("n", NodeType::Concept, "c").with_position_hint(0.0, 0.0);
        assert_eq!(node.position_hint(), Some((0.0, 0.0)));
    }

    #[test]
    fn edge_label_is_optional() {
        let edge: Edge = serde_json::from_value(gateway_edge_fixture()).unwrap();
        assert_eq!(edge.label.as_deref(), Some("cites"));

        let unlabeled = Edge::new(EdgeId::from("e"), "a".into(), "b".into());
        let json = serde_json::to_value(&unlabeled).unwrap();
        assert!(json.get("label").is_none());
    }

    #[test]
    fn provisional_edge_ids_are_marked() {
        assert!(EdgeId::provisional().is_provisional());
        assert!(!EdgeId::generate().is_provisional());
    }

    #[test]
    fn failed_status_carries_reason() {
        let json = serde_json::to_value(EdgeStatus::Failed("timeout".into())).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
    }

    #[test]
    fn snapshot_deserializes_payload() {
        let snapshot: GraphSnapshot = serde_json::from_value(json!({
            "nodes": [gateway_node_fixture()],
            "edges": []
        }))
        .unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(snapshot.edges.is_empty());
    }
}

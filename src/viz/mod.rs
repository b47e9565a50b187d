//! Graph-file to chart-format conversion.
//!
//! Pure projections of a constructed graph file into the node/link/category
//! payload the frontend charts consume. Caps keep pathological graphs
//! renderable: 500 nodes, 1000 links.

use serde_json::{json, Value};
use std::collections::HashMap;

const NODE_CAP: usize = 500;
const LINK_CAP: usize = 1000;

/// Dispatch on the two graph file formats; anything else renders empty.
pub fn prepare_graph_visualization(graph: &Value) -> Value {
    match graph {
        Value::Array(items) => convert_relationship_list(items),
        Value::Object(map) if map.contains_key("nodes") => convert_standard_format(graph),
        _ => empty_visualization(),
    }
}

pub fn empty_visualization() -> Value {
    json!({"nodes": [], "links": [], "categories": [], "stats": {}})
}

fn hsl_palette(categories: &[String]) -> Vec<Value> {
    let count = categories.len().max(1);
    categories
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "name": name,
                "itemStyle": {"color": format!("hsl({}, 70%, 60%)", i * 360 / count)}
            })
        })
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Best-effort readable identifier for a relationship-list node when
/// `properties.name` is missing.
fn fallback_node_id(node: &Value) -> Option<String> {
    let props = node.get("properties").and_then(Value::as_object);
    let name = props.and_then(|p| {
        ["name", "summary", "caption", "schema_type"]
            .iter()
            .find_map(|key| match p.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::String(_)) | Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
    });
    let label = node
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or("entity");

    if let Some(name) = name {
        return Some(name);
    }
    let chunk_id = props.and_then(|p| p.get("chunk id")).and_then(Value::as_str);
    Some(match chunk_id {
        Some(id) => format!("{}_{}", label, id),
        None => label.to_string(),
    })
}

/// Convert a relationship-list graph (`[{start_node, end_node, relation}]`).
fn convert_relationship_list(items: &[Value]) -> Value {
    let mut nodes_by_id: HashMap<String, Value> = HashMap::new();
    let mut node_order: Vec<String> = Vec::new();
    let mut links = Vec::new();

    for item in items {
        let Some(obj) = item.as_object() else { continue };
        let relation = obj
            .get("relation")
            .and_then(Value::as_str)
            .unwrap_or("related_to");

        let mut endpoint_ids = [None, None];
        for (slot, key) in ["start_node", "end_node"].iter().enumerate() {
            let Some(node) = obj.get(*key).filter(|n| !n.is_null()) else {
                continue;
            };
            let Some(id) = fallback_node_id(node) else { continue };
            if !nodes_by_id.contains_key(&id) {
                let category = node
                    .get("properties")
                    .and_then(|p| p.get("schema_type"))
                    .and_then(Value::as_str)
                    .or_else(|| node.get("label").and_then(Value::as_str))
                    .unwrap_or("entity");
                nodes_by_id.insert(
                    id.clone(),
                    json!({
                        "id": id,
                        "name": truncate(&id, 30),
                        "category": category,
                        "symbolSize": 25,
                        "properties": node.get("properties").cloned().unwrap_or(json!({}))
                    }),
                );
                node_order.push(id.clone());
            }
            endpoint_ids[slot] = Some(id);
        }

        if let [Some(source), Some(target)] = endpoint_ids {
            links.push(json!({
                "source": source,
                "target": target,
                "name": relation,
                "value": 1
            }));
        }
    }

    let mut categories: Vec<String> = Vec::new();
    for id in &node_order {
        let cat = nodes_by_id[id]["category"].as_str().unwrap_or("entity");
        if !categories.iter().any(|c| c == cat) {
            categories.push(cat.to_string());
        }
    }

    let nodes: Vec<Value> = node_order.iter().map(|id| nodes_by_id[id].clone()).collect();
    capped_payload(nodes, links, hsl_palette(&categories))
}

/// Convert a standard `{nodes: [], edges: []}` graph.
fn convert_standard_format(graph: &Value) -> Value {
    let empty = Vec::new();
    let raw_nodes = graph
        .get("nodes")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let raw_edges = graph
        .get("edges")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut categories: Vec<String> = Vec::new();
    for node in raw_nodes {
        let t = node.get("type").and_then(Value::as_str).unwrap_or("entity");
        if !categories.iter().any(|c| c == t) {
            categories.push(t.to_string());
        }
    }

    let nodes: Vec<Value> = raw_nodes
        .iter()
        .map(|node| {
            let id = node.get("id").and_then(Value::as_str).unwrap_or("");
            let name = node.get("name").and_then(Value::as_str).unwrap_or(id);
            let attributes = node
                .get("attributes")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            json!({
                "id": id,
                "name": truncate(name, 30),
                "category": node.get("type").and_then(Value::as_str).unwrap_or("entity"),
                "value": attributes.len(),
                "symbolSize": (attributes.len() * 3 + 15).clamp(15, 40),
                "attributes": attributes
            })
        })
        .collect();

    let links: Vec<Value> = raw_edges
        .iter()
        .map(|edge| {
            json!({
                "source": edge.get("source").and_then(Value::as_str).unwrap_or(""),
                "target": edge.get("target").and_then(Value::as_str).unwrap_or(""),
                "name": edge.get("relation").and_then(Value::as_str).unwrap_or("related_to"),
                "value": edge.get("weight").cloned().unwrap_or(json!(1))
            })
        })
        .collect();

    capped_payload(nodes, links, hsl_palette(&categories))
}

fn capped_payload(nodes: Vec<Value>, links: Vec<Value>, categories: Vec<Value>) -> Value {
    let total_nodes = nodes.len();
    let total_links = links.len();
    let shown_nodes: Vec<Value> = nodes.into_iter().take(NODE_CAP).collect();
    let shown_links: Vec<Value> = links.into_iter().take(LINK_CAP).collect();
    let displayed_nodes = shown_nodes.len();
    let displayed_links = shown_links.len();

    json!({
        "nodes": shown_nodes,
        "links": shown_links,
        "categories": categories,
        "stats": {
            "total_nodes": total_nodes,
            "total_edges": total_links,
            "displayed_nodes": displayed_nodes,
            "displayed_edges": displayed_links
        }
    })
}

/// Placeholder payload served when a dataset has no constructed graph yet.
pub fn sample_visualization() -> Value {
    json!({
        "nodes": [
            {"id": "node1", "name": "Example Entity 1", "category": "person", "value": 5, "symbolSize": 25},
            {"id": "node2", "name": "Example Entity 2", "category": "location", "value": 3, "symbolSize": 20}
        ],
        "links": [
            {"source": "node1", "target": "node2", "name": "located_in", "value": 1}
        ],
        "categories": [
            {"name": "person", "itemStyle": {"color": "#ff6b6b"}},
            {"name": "location", "itemStyle": {"color": "#4ecdc4"}}
        ],
        "stats": {"total_nodes": 2, "total_edges": 1, "displayed_nodes": 2, "displayed_edges": 1}
    })
}

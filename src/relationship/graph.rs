//! On-demand knowledge graph view over a relationship set (spec §4.5.3).

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use super::types::{GraphNode, KnowledgeGraph, MemoryRelationship};

/// Build node/edge views from a flat edge list. `top_k` controls how many
/// of the highest-centrality nodes populate `central_nodes`.
pub fn build(edges: &[MemoryRelationship], top_k: usize) -> KnowledgeGraph {
    let mut neighbors: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();
    for edge in edges {
        neighbors.entry(edge.source_id).or_default().insert(edge.target_id);
        neighbors.entry(edge.target_id).or_default().insert(edge.source_id);
    }

    let max_degree = neighbors.values().map(|n| n.len()).max().unwrap_or(0).max(1) as f32;

    let mut nodes: Vec<GraphNode> = neighbors
        .iter()
        .map(|(id, adj)| {
            let degree = adj.len();
            let clustering_coefficient = clustering_coefficient(adj, &neighbors);
            GraphNode {
                memory_id: *id,
                degree,
                clustering_coefficient,
                centrality: degree as f32 / max_degree,
            }
        })
        .collect();

    nodes.sort_by(|a, b| {
        b.centrality
            .partial_cmp(&a.centrality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let central_nodes = nodes.iter().take(top_k).map(|n| n.memory_id).collect();

    KnowledgeGraph {
        nodes,
        edges: edges.to_vec(),
        central_nodes,
    }
}

/// Fraction of a node's neighbor pairs that are themselves connected.
fn clustering_coefficient(adj: &BTreeSet<Uuid>, neighbors: &BTreeMap<Uuid, BTreeSet<Uuid>>) -> f32 {
    if adj.len() < 2 {
        return 0.0;
    }
    let pairs: Vec<(&Uuid, &Uuid)> = adj
        .iter()
        .enumerate()
        .flat_map(|(i, a)| adj.iter().skip(i + 1).map(move |b| (a, b)))
        .collect();
    let connected = pairs
        .iter()
        .filter(|(a, b)| neighbors.get(*a).is_some_and(|n| n.contains(*b)))
        .count();
    connected as f32 / pairs.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::types::RelationshipType;

    fn edge(a: Uuid, b: Uuid) -> MemoryRelationship {
        MemoryRelationship::new(a, b, RelationshipType::Contextual, 0.8, 0.6, "test")
    }

    #[test]
    fn triangle_has_clustering_coefficient_one() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let edges = vec![edge(a, b), edge(b, c), edge(a, c)];
        let graph = build(&edges, 10);
        for node in &graph.nodes {
            assert!((node.clustering_coefficient - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn central_nodes_ranked_by_degree() {
        let hub = Uuid::new_v4();
        let leaves: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let edges: Vec<MemoryRelationship> = leaves.iter().map(|l| edge(hub, *l)).collect();
        let graph = build(&edges, 1);
        assert_eq!(graph.central_nodes[0], hub);
    }
}

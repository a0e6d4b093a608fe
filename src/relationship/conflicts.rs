//! Conflict derivation from content similarity plus edge type (spec §4.5.4).

use std::collections::BTreeSet;

use super::types::{ConflictResolution, ConflictSeverity, MemoryConflict, MemoryRelationship, RelationshipType};
use crate::item::MemoryItem;
use crate::layer::lexical::tokenize;

fn content_similarity(a: &MemoryItem, b: &MemoryItem) -> f32 {
    let a_tokens: BTreeSet<String> = tokenize(&a.content).into_iter().collect();
    let b_tokens: BTreeSet<String> = tokenize(&b.content).into_iter().collect();
    let union = a_tokens.union(&b_tokens).count().max(1);
    let intersection = a_tokens.intersection(&b_tokens).count();
    intersection as f32 / union as f32
}

/// Evaluate one pair for a conflict, given any relationship edges already
/// detected between them.
pub fn evaluate(a: &MemoryItem, b: &MemoryItem, edges: &[MemoryRelationship]) -> Option<MemoryConflict> {
    let similarity = content_similarity(a, b);
    let has_contradiction_edge = edges.iter().any(|e| e.kind == RelationshipType::Contradiction);

    if has_contradiction_edge && similarity >= 0.3 {
        return Some(MemoryConflict {
            memory_a: a.id,
            memory_b: b.id,
            severity: ConflictSeverity::Contradiction,
            confidence: 0.8,
            suggested_resolutions: vec![ConflictResolution::Contextualize, ConflictResolution::Coexist],
        });
    }

    if similarity > 0.9 {
        return Some(MemoryConflict {
            memory_a: a.id,
            memory_b: b.id,
            severity: ConflictSeverity::Duplication,
            confidence: 0.9,
            suggested_resolutions: vec![ConflictResolution::Merge, ConflictResolution::Prioritize],
        });
    }

    let differing_category = a.metadata.category != b.metadata.category;
    let priority_gap = (a.metadata.priority as i16 - b.metadata.priority as i16).unsigned_abs();
    if similarity > 0.8 && (differing_category || priority_gap > 3) {
        return Some(MemoryConflict {
            memory_a: a.id,
            memory_b: b.id,
            severity: ConflictSeverity::Inconsistency,
            confidence: 0.6,
            suggested_resolutions: vec![ConflictResolution::Prioritize],
        });
    }

    None
}

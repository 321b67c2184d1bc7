#![forbid(unsafe_code)]

use super::{LinkedRow, MovableItem};
use crate::ids::Id;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityViolation {
    #[error("item {id} belongs to parent {actual}, expected {expected}")]
    ParentMismatch { id: Id, expected: Id, actual: Id },
    #[error("duplicate item id {0}")]
    DuplicateId(Id),
    #[error("duplicate position {0}")]
    DuplicatePosition(i64),
    #[error("negative position {position} on item {id}")]
    NegativePosition { id: Id, position: i64 },
    #[error("chain has {0} heads")]
    MultipleHeads(usize),
    #[error("chain has no head")]
    NoHead,
    #[error("chain revisits item {0}")]
    Cycle(Id),
    #[error("item {id} points at {missing}, which is not in the chain")]
    DanglingPointer { id: Id, missing: Id },
    #[error("{from}.next={to} but {to}.prev does not point back")]
    AsymmetricLink { from: Id, to: Id },
    #[error("{0} items are unreachable from the head")]
    Disconnected(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// Smallest position is not zero.
    NotZeroBased { first: i64 },
    /// Positions skip from `after` to `next`.
    Gap { after: i64, next: i64 },
    /// Item at `index` has a smaller position than its predecessor.
    OutOfOrder { index: usize, position: i64 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub warnings: Vec<IntegrityWarning>,
    pub violation: Option<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.violation.is_none()
    }

    pub fn into_result(self) -> Result<Vec<IntegrityWarning>, IntegrityViolation> {
        match self.violation {
            Some(violation) => Err(violation),
            None => Ok(self.warnings),
        }
    }
}

/// Classifies anomalies in a chain view. Fatal findings stop at the first one;
/// warnings are only collected for chains without a fatal finding.
pub fn check(parent_id: Id, items: &[MovableItem]) -> IntegrityReport {
    let mut ids = HashSet::with_capacity(items.len());
    let mut positions = HashSet::with_capacity(items.len());
    for item in items {
        if item.parent_id != parent_id {
            return fatal(IntegrityViolation::ParentMismatch {
                id: item.id,
                expected: parent_id,
                actual: item.parent_id,
            });
        }
        if !ids.insert(item.id) {
            return fatal(IntegrityViolation::DuplicateId(item.id));
        }
        if item.position < 0 {
            return fatal(IntegrityViolation::NegativePosition {
                id: item.id,
                position: item.position,
            });
        }
        if !positions.insert(item.position) {
            return fatal(IntegrityViolation::DuplicatePosition(item.position));
        }
    }

    let mut warnings = Vec::new();
    for (index, pair) in items.windows(2).enumerate() {
        if pair[1].position < pair[0].position {
            warnings.push(IntegrityWarning::OutOfOrder {
                index: index + 1,
                position: pair[1].position,
            });
        }
    }

    let mut sorted: Vec<i64> = items.iter().map(|item| item.position).collect();
    sorted.sort_unstable();
    match sorted.first().copied() {
        Some(first) if first != 0 => warnings.push(IntegrityWarning::NotZeroBased { first }),
        _ => {}
    }
    for pair in sorted.windows(2) {
        if pair[1] - pair[0] > 1 {
            warnings.push(IntegrityWarning::Gap {
                after: pair[0],
                next: pair[1],
            });
        }
    }

    IntegrityReport {
        warnings,
        violation: None,
    }
}

fn fatal(violation: IntegrityViolation) -> IntegrityReport {
    IntegrityReport {
        warnings: Vec::new(),
        violation: Some(violation),
    }
}

/// Walks a chain from its single head. Every row must be visited exactly once
/// and every `next` must be mirrored by the successor's `prev`.
pub fn order_chain(rows: &[LinkedRow]) -> Result<Vec<LinkedRow>, IntegrityViolation> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_id: HashMap<Id, LinkedRow> = HashMap::with_capacity(rows.len());
    for row in rows {
        if by_id.insert(row.id, *row).is_some() {
            return Err(IntegrityViolation::DuplicateId(row.id));
        }
    }

    let heads: Vec<&LinkedRow> = rows.iter().filter(|row| row.prev_id.is_none()).collect();
    let head = match heads.as_slice() {
        [] => return Err(IntegrityViolation::NoHead),
        [head] => **head,
        many => return Err(IntegrityViolation::MultipleHeads(many.len())),
    };

    let mut ordered = Vec::with_capacity(rows.len());
    let mut seen = HashSet::with_capacity(rows.len());
    let mut current = head;
    loop {
        if !seen.insert(current.id) {
            return Err(IntegrityViolation::Cycle(current.id));
        }
        ordered.push(current);
        let Some(next_id) = current.next_id else {
            break;
        };
        let Some(next) = by_id.get(&next_id).copied() else {
            return Err(IntegrityViolation::DanglingPointer {
                id: current.id,
                missing: next_id,
            });
        };
        if next.prev_id != Some(current.id) {
            if seen.contains(&next.id) {
                return Err(IntegrityViolation::Cycle(next.id));
            }
            return Err(IntegrityViolation::AsymmetricLink {
                from: current.id,
                to: next.id,
            });
        }
        current = next;
    }

    if ordered.len() != rows.len() {
        return Err(IntegrityViolation::Disconnected(rows.len() - ordered.len()));
    }
    Ok(ordered)
}

/// Projects an ordered chain into item views with zero-based positions.
pub fn to_items(parent_id: Id, ordered: &[LinkedRow]) -> Vec<MovableItem> {
    ordered
        .iter()
        .enumerate()
        .map(|(index, row)| MovableItem {
            id: row.id,
            parent_id,
            prev_id: row.prev_id,
            next_id: row.next_id,
            position: index as i64,
        })
        .collect()
}

/// Best-effort order for a damaged chain: segments reachable from each head in
/// id order, then any rows no walk reached, also in id order.
pub fn salvage_order(rows: &[LinkedRow]) -> Vec<Id> {
    let by_id: HashMap<Id, LinkedRow> = rows.iter().map(|row| (row.id, *row)).collect();
    let mut heads: Vec<Id> = rows
        .iter()
        .filter(|row| row.prev_id.is_none_or(|prev| !by_id.contains_key(&prev)))
        .map(|row| row.id)
        .collect();
    heads.sort();

    let mut seen = HashSet::with_capacity(rows.len());
    let mut order = Vec::with_capacity(rows.len());
    for head in heads {
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                break;
            }
            order.push(id);
            cursor = by_id.get(&id).and_then(|row| row.next_id);
            if cursor.is_some_and(|next| !by_id.contains_key(&next)) {
                break;
            }
        }
    }

    let mut rest: Vec<Id> = rows
        .iter()
        .map(|row| row.id)
        .filter(|id| !seen.contains(id))
        .collect();
    rest.sort();
    rest.dedup();
    order.extend(rest);
    order
}

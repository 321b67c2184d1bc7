#![forbid(unsafe_code)]

use super::{IntegrityWarning, LinkedRow, ListKind, MovableItem, Placement, check};
use crate::error::CoreError;
use crate::ids::Id;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendPlan {
    pub kind: ListKind,
    /// Current tail, which becomes the new row's predecessor.
    pub prev_id: Option<Id>,
    pub position: i64,
    pub warnings: Vec<IntegrityWarning>,
}

/// Plans an append of `new_id` after the current tail.
pub fn append_plan(
    parent_id: Id,
    kind: ListKind,
    new_id: Id,
    current: &[MovableItem],
) -> Result<AppendPlan, CoreError> {
    if new_id.is_zero() {
        return Err(CoreError::InvalidId("new item id must not be zero"));
    }
    if current.iter().any(|item| item.id == new_id) {
        return Err(CoreError::Duplicate(new_id));
    }
    let warnings = check(parent_id, current).into_result()?;

    let tail = current.iter().max_by_key(|item| item.position);
    Ok(AppendPlan {
        kind,
        prev_id: tail.map(|item| item.id),
        position: tail.map_or(0, |item| item.position + 1),
        warnings,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertPlan {
    pub index: usize,
    pub prev_id: Option<Id>,
    pub next_id: Option<Id>,
}

/// Plans placing `new_id` at `position` (clamped to `0..=order.len()`). Only
/// the new row and its two neighbours need writing.
pub fn insert_plan(new_id: Id, position: i64, order: &[Id]) -> Result<InsertPlan, CoreError> {
    if new_id.is_zero() {
        return Err(CoreError::InvalidId("new item id must not be zero"));
    }
    if order.contains(&new_id) {
        return Err(CoreError::Duplicate(new_id));
    }
    let index = position.clamp(0, order.len() as i64) as usize;
    Ok(InsertPlan {
        index,
        prev_id: index.checked_sub(1).map(|i| order[i]),
        next_id: order.get(index).copied(),
    })
}

/// Final index of an item moved next to a target within one chain, after the
/// item has been taken out of its old slot.
pub fn resolve_move_index(current: usize, target: usize, placement: Placement) -> usize {
    if current < target {
        match placement {
            Placement::After => target,
            Placement::Before => target - 1,
        }
    } else {
        match placement {
            Placement::After => target + 1,
            Placement::Before => target,
        }
    }
}

pub fn relative_move_index(
    order: &[Id],
    item_id: Id,
    target_id: Id,
    placement: Placement,
) -> Result<usize, CoreError> {
    if item_id == target_id {
        return Err(CoreError::InvalidArgument(
            "item cannot be moved relative to itself",
        ));
    }
    let current = index_of(order, item_id).ok_or(CoreError::NotFound("item not in chain"))?;
    let target = index_of(order, target_id).ok_or(CoreError::NotFound("target not in chain"))?;
    Ok(resolve_move_index(current, target, placement))
}

/// New order after moving `item_id` to `index` (clamped to the last slot).
pub fn plan_index_move(order: &[Id], item_id: Id, index: i64) -> Result<Vec<Id>, CoreError> {
    let current = index_of(order, item_id).ok_or(CoreError::NotFound("item not in chain"))?;
    let mut next: Vec<Id> = order.to_vec();
    next.remove(current);
    let index = index.clamp(0, next.len() as i64) as usize;
    next.insert(index, item_id);
    Ok(next)
}

pub fn plan_relative_move(
    order: &[Id],
    item_id: Id,
    target_id: Id,
    placement: Placement,
) -> Result<Vec<Id>, CoreError> {
    let index = relative_move_index(order, item_id, target_id, placement)?;
    plan_index_move(order, item_id, index as i64)
}

/// Destination order for an item arriving from another chain. A target that
/// is not part of `dest_order` appends at the tail.
pub fn plan_splice(
    dest_order: &[Id],
    item_id: Id,
    target_id: Option<Id>,
    placement: Placement,
) -> Result<Vec<Id>, CoreError> {
    if dest_order.contains(&item_id) {
        return Err(CoreError::Duplicate(item_id));
    }
    let mut next = dest_order.to_vec();
    let index = match target_id.and_then(|target| index_of(dest_order, target)) {
        Some(target) => match placement {
            Placement::Before => target,
            Placement::After => target + 1,
        },
        None => next.len(),
    };
    next.insert(index, item_id);
    Ok(next)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkUpdate {
    pub id: Id,
    pub prev_id: Option<Id>,
    pub next_id: Option<Id>,
}

/// Pointers for every row of `order`, head and tail unlinked.
pub fn chain_links(order: &[Id]) -> Vec<LinkUpdate> {
    order
        .iter()
        .enumerate()
        .map(|(index, id)| LinkUpdate {
            id: *id,
            prev_id: index.checked_sub(1).map(|i| order[i]),
            next_id: order.get(index + 1).copied(),
        })
        .collect()
}

/// Pointer writes needed to turn `current` into `new_order`: rows whose links
/// already match are skipped, rows absent from `current` are always written.
pub fn diff_links(current: &[LinkedRow], new_order: &[Id]) -> Vec<LinkUpdate> {
    let existing: HashMap<Id, &LinkedRow> = current.iter().map(|row| (row.id, row)).collect();
    chain_links(new_order)
        .into_iter()
        .filter(|update| match existing.get(&update.id) {
            Some(row) => row.prev_id != update.prev_id || row.next_id != update.next_id,
            None => true,
        })
        .collect()
}

fn index_of(order: &[Id], id: Id) -> Option<usize> {
    order.iter().position(|candidate| *candidate == id)
}

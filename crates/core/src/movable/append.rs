#![forbid(unsafe_code)]

use super::{AppendPlan, ListKind, MovableItem, append_plan};
use crate::error::CoreError;
use crate::ids::Id;

/// Optimistic append: fetch the chain, plan, insert the new row with
/// `prev = tail`, then compare-and-set the old tail's `next` from NULL to the
/// new id. A failed CAS means another writer appended first; the caller rolls
/// back and retries.
///
/// `cas_tail(tail, new_id)` must return `true` only when it changed exactly
/// one row whose `next` was NULL.
pub fn append_at_end_tx<E, F, I, C>(
    parent_id: Id,
    kind: ListKind,
    new_id: Id,
    fetch: F,
    insert: I,
    cas_tail: C,
) -> Result<AppendPlan, E>
where
    E: From<CoreError>,
    F: FnOnce() -> Result<Vec<MovableItem>, E>,
    I: FnOnce(&AppendPlan) -> Result<(), E>,
    C: FnOnce(Id, Id) -> Result<bool, E>,
{
    let current = fetch()?;
    let plan = append_plan(parent_id, kind, new_id, &current)?;
    insert(&plan)?;
    if let Some(tail) = plan.prev_id {
        if !cas_tail(tail, new_id)? {
            return Err(CoreError::ConcurrentTailAdvance { tail }.into());
        }
    }
    Ok(plan)
}

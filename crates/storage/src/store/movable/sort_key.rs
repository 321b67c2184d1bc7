#![forbid(unsafe_code)]

use super::{MovableRepository, StoreError, reorder_with};
use crate::store::Db;
use rusqlite::{Transaction, params};
use wb_core::movable::{
    ListKind, MovableItem, Placement, PositionUpdate, Scope, dense_keys, key_between,
    relative_move_index,
};
use wb_core::{CoreError, Id};

/// Ordered list kept by a REAL sort-key column. A single move writes one row;
/// when no key fits between the neighbours the whole list is rewritten
/// `0, 1, 2, ..`.
#[derive(Clone, Debug)]
pub struct SortKeyRepository<'a> {
    db: Db<'a>,
    kind: ListKind,
    table: &'static str,
    parent_column: &'static str,
    key_column: &'static str,
}

impl<'a> SortKeyRepository<'a> {
    pub fn new(
        db: Db<'a>,
        kind: ListKind,
        table: &'static str,
        parent_column: &'static str,
        key_column: &'static str,
    ) -> Self {
        Self {
            db,
            kind,
            table,
            parent_column,
            key_column,
        }
    }

    pub fn with_tx<'t>(&self, tx: &'t Transaction<'_>) -> SortKeyRepository<'t> {
        SortKeyRepository {
            db: self.db.rebind(tx),
            kind: self.kind,
            table: self.table,
            parent_column: self.parent_column,
            key_column: self.key_column,
        }
    }

    /// `(id, key)` pairs in list order. Equal keys fall back to id order.
    pub fn keyed(&self, parent_id: Id) -> Result<Vec<(Id, f64)>, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT id, {key} FROM {table} WHERE {parent} = ?1 ORDER BY {key} ASC, id ASC",
            key = self.key_column,
            table = self.table,
            parent = self.parent_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![parent_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((row.get::<_, Id>(0)?, row.get::<_, f64>(1)?));
        }
        Ok(out)
    }

    pub fn order(&self, parent_id: Id) -> Result<Vec<Id>, StoreError> {
        let keyed = self.keyed(parent_id)?;
        Ok(keyed.into_iter().map(|(id, _)| id).collect())
    }

    /// Key for a row about to be appended.
    pub fn append_key(&self, parent_id: Id) -> Result<f64, StoreError> {
        let last = self.keyed(parent_id)?.last().map(|(_, key)| *key);
        Ok(key_between(last, None).unwrap_or_default())
    }

    pub fn move_relative(
        &self,
        parent_id: Id,
        item_id: Id,
        target_id: Id,
        placement: Placement,
    ) -> Result<(), StoreError> {
        let order = self.order(parent_id)?;
        let index = relative_move_index(&order, item_id, target_id, placement)?;
        self.place(parent_id, item_id, index as i64)
    }

    /// Rewrites every key as `0..n` following `ordered_ids`, which must name
    /// each member exactly once.
    pub fn rewrite(&self, parent_id: Id, ordered_ids: &[Id]) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let mut members = self.order(parent_id)?;
        let mut requested = ordered_ids.to_vec();
        members.sort();
        requested.sort();
        if members != requested {
            return Err(StoreError::InvalidArgument(
                "ordered ids must name every list member exactly once",
            ));
        }
        let sql = format!(
            "UPDATE {} SET {} = ?1 WHERE id = ?2 AND {} = ?3",
            self.table, self.key_column, self.parent_column
        );
        let mut stmt = conn.prepare(&sql)?;
        for (id, key) in ordered_ids.iter().zip(dense_keys(ordered_ids.len())) {
            self.db.check_cancel()?;
            stmt.execute(params![key, id, parent_id])?;
        }
        Ok(())
    }

    fn place(&self, parent_id: Id, item_id: Id, index: i64) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let keyed = self.keyed(parent_id)?;
        if !keyed.iter().any(|(id, _)| *id == item_id) {
            return Err(StoreError::NotFound(self.kind.as_str()));
        }
        let others: Vec<(Id, f64)> = keyed.into_iter().filter(|(id, _)| *id != item_id).collect();
        let index = index.clamp(0, others.len() as i64) as usize;
        let prev = index.checked_sub(1).map(|i| others[i].1);
        let next = others.get(index).map(|(_, key)| *key);

        match key_between(prev, next) {
            Some(key) => {
                let sql = format!(
                    "UPDATE {} SET {} = ?1 WHERE id = ?2 AND {} = ?3",
                    self.table, self.key_column, self.parent_column
                );
                conn.execute(&sql, params![key, item_id, parent_id])?;
                Ok(())
            }
            None => {
                let mut order: Vec<Id> = others.iter().map(|(id, _)| *id).collect();
                order.insert(index, item_id);
                self.rewrite(parent_id, &order)
            }
        }
    }
}

impl MovableRepository for SortKeyRepository<'_> {
    fn kind(&self) -> ListKind {
        self.kind
    }

    fn items_by_parent(&self, scope: Scope) -> Result<Vec<MovableItem>, StoreError> {
        let order = self.order(scope.parent_id)?;
        Ok(order
            .iter()
            .enumerate()
            .map(|(index, id)| MovableItem {
                id: *id,
                parent_id: scope.parent_id,
                prev_id: index.checked_sub(1).map(|i| order[i]),
                next_id: order.get(index + 1).copied(),
                position: index as i64,
            })
            .collect())
    }

    fn update_position(&self, scope: Scope, item_id: Id, position: i64) -> Result<(), StoreError> {
        self.place(scope.parent_id, item_id, position)
    }

    fn update_positions(
        &self,
        scope: Scope,
        updates: &[PositionUpdate],
    ) -> Result<(), StoreError> {
        let order = self.order(scope.parent_id)?;
        let next = reorder_with(&order, updates)?;
        self.rewrite(scope.parent_id, &next)
    }

    /// Sort keys need no stitching; only membership is checked.
    fn remove(&self, scope: Scope, item_id: Id) -> Result<(), StoreError> {
        self.db.writer()?;
        if !self.order(scope.parent_id)?.contains(&item_id) {
            return Err(CoreError::NotFound("list item").into());
        }
        Ok(())
    }
}

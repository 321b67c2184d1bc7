#![forbid(unsafe_code)]

use super::{MovableRepository, StoreError, reorder_with};
use crate::store::Db;
use rusqlite::{Connection, OptionalExtension, Transaction, params_from_iter};
use wb_core::movable::{
    AppendPlan, IntegrityReport, LinkUpdate, LinkedRow, ListKind, MovableConfig, MovableItem,
    ParentScope, Placement, PositionUpdate, Scope, append_at_end_tx, check, diff_links,
    insert_plan, order_chain, plan_index_move, plan_relative_move, plan_splice, to_items,
};
use wb_core::{CoreError, Id};

/// `prev_id` / `next_id` chains over one table. Every statement is narrowed
/// by the scope predicate, so a row is never rewritten through a chain it is
/// not part of.
#[derive(Clone, Debug)]
pub struct LinkedRepository<'a> {
    db: Db<'a>,
    config: MovableConfig,
}

impl<'a> LinkedRepository<'a> {
    pub fn new(db: Db<'a>, config: MovableConfig) -> Self {
        Self { db, config }
    }

    pub fn with_tx<'t>(&self, tx: &'t Transaction<'_>) -> LinkedRepository<'t> {
        LinkedRepository {
            db: self.db.rebind(tx),
            config: self.config,
        }
    }

    pub fn config(&self) -> &MovableConfig {
        &self.config
    }

    pub fn parent_exists(&self, scope: Scope) -> Result<bool, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT 1 FROM {} WHERE id = ?1",
            self.config.scope.parent_table()
        );
        let parent = conn
            .query_row(&sql, [scope.parent_id], |row| row.get::<_, i64>(0))
            .optional()?
            .is_some();
        if !parent {
            return Ok(false);
        }
        match (self.config.scope.container(), scope.nested_id) {
            (Some(container), Some(nested)) => {
                let sql = format!(
                    "SELECT {container} FROM {} WHERE {} = ?1 AND {} = ?2",
                    self.config.table,
                    self.config.id_column,
                    self.config.scope.parent_column()
                );
                let holds_chain = conn
                    .query_row(&sql, [nested, scope.parent_id], |row| row.get::<_, bool>(0))
                    .optional()?;
                match holds_chain {
                    Some(true) => Ok(true),
                    Some(false) => Err(StoreError::InvalidArgument(
                        "nested parent cannot hold items",
                    )),
                    None => Ok(false),
                }
            }
            _ => Ok(true),
        }
    }

    /// Scope of a row, read from its own parent columns. Join-table rows are
    /// listed under several parents and always need an explicit scope.
    pub fn scope_of(&self, item_id: Id) -> Result<Scope, StoreError> {
        if matches!(self.config.scope, ParentScope::JoinTable { .. }) {
            return Err(StoreError::InvalidArgument(
                "join-table rows need an explicit parent",
            ));
        }
        let conn = self.db.reader()?;
        let nested = self.config.scope.nested_column();
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} = ?1{}",
            self.config.scope.parent_column(),
            nested.unwrap_or("NULL"),
            self.config.table,
            self.config.id_column,
            self.filter_clause()
        );
        conn.query_row(&sql, [item_id], |row| {
            let parent_id: Id = row.get(0)?;
            Ok(Scope::nested(parent_id, row.get(1)?))
        })
        .optional()?
        .ok_or(StoreError::NotFound(self.config.kind.as_str()))
    }

    pub fn contains(&self, scope: Scope, item_id: Id) -> Result<bool, StoreError> {
        let conn = self.db.reader()?;
        let (predicate, mut params) = self.scope_predicate(scope);
        params.push(Some(item_id));
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} AND {} = ?{}",
            self.config.table,
            predicate,
            self.config.id_column,
            params.len()
        );
        Ok(conn
            .query_row(
                &sql,
                params_from_iter(params.iter()),
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }

    /// Raw pointer rows of a scope, unordered.
    pub fn rows(&self, scope: Scope) -> Result<Vec<LinkedRow>, StoreError> {
        let conn = self.db.reader()?;
        let (predicate, params) = self.scope_predicate(scope);
        let sql = format!(
            "SELECT {}, {}, {} FROM {} WHERE {} ORDER BY {}",
            self.config.id_column,
            self.config.prev_column,
            self.config.next_column,
            self.config.table,
            predicate,
            self.config.id_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(LinkedRow {
                id: row.get(0)?,
                prev_id: row.get(1)?,
                next_id: row.get(2)?,
            });
        }
        Ok(out)
    }

    pub fn ordered_rows(&self, scope: Scope) -> Result<Vec<LinkedRow>, StoreError> {
        let rows = self.rows(scope)?;
        Ok(order_chain(&rows).map_err(CoreError::from)?)
    }

    pub fn order(&self, scope: Scope) -> Result<Vec<Id>, StoreError> {
        Ok(self.ordered_rows(scope)?.iter().map(|row| row.id).collect())
    }

    /// Head-to-tail chain under an existing parent; an empty chain is not an
    /// error, a missing parent is.
    pub fn list_under(&self, scope: Scope) -> Result<Vec<MovableItem>, StoreError> {
        if !self.parent_exists(scope)? {
            return Err(StoreError::ParentNotFound(self.config.kind.as_str()));
        }
        let ordered = self.ordered_rows(scope)?;
        Ok(to_items(scope.effective_parent(), &ordered))
    }

    /// Links an already inserted, unlinked row at the tail. The old tail's
    /// `next` is compare-and-set from NULL.
    pub fn append(&self, scope: Scope, new_id: Id) -> Result<AppendPlan, StoreError> {
        let conn = self.db.writer()?;
        self.ensure_unlinked(scope, new_id)?;
        append_at_end_tx::<StoreError, _, _, _>(
            scope.effective_parent(),
            self.config.kind,
            new_id,
            || {
                let ordered = self.ordered_rows_without(scope, new_id)?;
                Ok(to_items(scope.effective_parent(), &ordered))
            },
            |plan| {
                self.write_links(
                    scope,
                    &[LinkUpdate {
                        id: new_id,
                        prev_id: plan.prev_id,
                        next_id: None,
                    }],
                )
            },
            |tail, id| {
                let (predicate, mut params) = self.scope_predicate(scope);
                params.push(Some(id));
                params.push(Some(tail));
                let sql = format!(
                    "UPDATE {} SET {} = ?{} WHERE {} AND {} = ?{} AND {} IS NULL",
                    self.config.table,
                    self.config.next_column,
                    params.len() - 1,
                    predicate,
                    self.config.id_column,
                    params.len(),
                    self.config.next_column
                );
                let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
                Ok(changed == 1)
            },
        )
    }

    /// Links an already inserted, unlinked row at `position`. Only the new
    /// row and its neighbours are written. Returns the resolved index.
    pub fn insert_at(&self, scope: Scope, new_id: Id, position: i64) -> Result<usize, StoreError> {
        self.db.writer()?;
        self.ensure_unlinked(scope, new_id)?;
        let order: Vec<Id> = self
            .ordered_rows_without(scope, new_id)?
            .iter()
            .map(|row| row.id)
            .collect();
        let plan = insert_plan(new_id, position, &order)?;

        self.write_links(
            scope,
            &[LinkUpdate {
                id: new_id,
                prev_id: plan.prev_id,
                next_id: plan.next_id,
            }],
        )?;
        if let Some(prev) = plan.prev_id {
            self.set_pointer(scope, prev, self.config.next_column, Some(new_id))?;
        }
        if let Some(next) = plan.next_id {
            self.set_pointer(scope, next, self.config.prev_column, Some(new_id))?;
        }
        Ok(plan.index)
    }

    pub fn move_before(&self, scope: Scope, item_id: Id, target_id: Id) -> Result<(), StoreError> {
        self.move_relative(scope, item_id, target_id, Placement::Before)
    }

    pub fn move_after(&self, scope: Scope, item_id: Id, target_id: Id) -> Result<(), StoreError> {
        self.move_relative(scope, item_id, target_id, Placement::After)
    }

    pub fn move_relative(
        &self,
        scope: Scope,
        item_id: Id,
        target_id: Id,
        placement: Placement,
    ) -> Result<(), StoreError> {
        self.db.writer()?;
        let rows = self.ordered_rows(scope)?;
        let order: Vec<Id> = rows.iter().map(|row| row.id).collect();
        let next = plan_relative_move(&order, item_id, target_id, placement)?;
        self.write_links(scope, &diff_links(&rows, &next))
    }

    pub fn move_to_index(&self, scope: Scope, item_id: Id, index: i64) -> Result<(), StoreError> {
        self.db.writer()?;
        let rows = self.ordered_rows(scope)?;
        let order: Vec<Id> = rows.iter().map(|row| row.id).collect();
        let next = plan_index_move(&order, item_id, index)?;
        self.write_links(scope, &diff_links(&rows, &next))
    }

    /// Stitches the neighbours together and nulls the item's own pointers.
    /// The row itself stays.
    pub fn remove(&self, scope: Scope, item_id: Id) -> Result<(), StoreError> {
        self.db.writer()?;
        let row = self.link_row(scope, item_id)?;
        if let Some(prev) = row.prev_id {
            self.set_pointer(scope, prev, self.config.next_column, row.next_id)?;
        }
        if let Some(next) = row.next_id {
            self.set_pointer(scope, next, self.config.prev_column, row.prev_id)?;
        }
        self.write_links(
            scope,
            &[LinkUpdate {
                id: item_id,
                prev_id: None,
                next_id: None,
            }],
        )
    }

    /// `remove`, then `delete` on the same transaction.
    pub fn safe_delete<F>(&self, scope: Scope, item_id: Id, delete: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Connection) -> Result<(), StoreError>,
    {
        self.remove(scope, item_id)?;
        delete(self.db.writer()?)
    }

    /// Rewrites pointers so the chain follows `ordered_ids`, which must name
    /// every member exactly once. Returns the number of rows written.
    pub fn rebuild_chain(&self, scope: Scope, ordered_ids: &[Id]) -> Result<usize, StoreError> {
        self.db.writer()?;
        let rows = self.rows(scope)?;
        let mut members: Vec<Id> = rows.iter().map(|row| row.id).collect();
        let mut requested = ordered_ids.to_vec();
        members.sort();
        requested.sort();
        if members != requested {
            return Err(StoreError::InvalidArgument(
                "ordered ids must name every chain member exactly once",
            ));
        }
        let updates = diff_links(&rows, ordered_ids);
        self.write_links(scope, &updates)?;
        Ok(updates.len())
    }

    /// Relinks a damaged chain in a best-effort order. A healthy chain is left
    /// alone. Returns the number of rows written.
    pub fn repair_chain(&self, scope: Scope) -> Result<usize, StoreError> {
        self.db.writer()?;
        let rows = self.rows(scope)?;
        if order_chain(&rows).is_ok() {
            return Ok(0);
        }
        let order = wb_core::movable::salvage_order(&rows);
        let updates = diff_links(&rows, &order);
        self.write_links(scope, &updates)?;
        Ok(updates.len())
    }

    pub fn check_integrity(&self, scope: Scope) -> Result<IntegrityReport, StoreError> {
        let rows = self.rows(scope)?;
        let parent = scope.effective_parent();
        Ok(match order_chain(&rows) {
            Ok(ordered) => check(parent, &to_items(parent, &ordered)),
            Err(violation) => IntegrityReport {
                warnings: Vec::new(),
                violation: Some(violation),
            },
        })
    }

    /// Moves an item into another scope of the same table: unlink from the
    /// source chain, reassign the parent columns, splice into the destination.
    /// A `target_id` outside the destination chain appends at its tail.
    pub fn move_to_scope(
        &self,
        from: Scope,
        to: Scope,
        item_id: Id,
        target_id: Option<Id>,
        placement: Placement,
    ) -> Result<(), StoreError> {
        if target_id == Some(item_id) {
            return Err(StoreError::InvalidArgument(
                "item cannot be moved relative to itself",
            ));
        }
        if from == to {
            return match target_id {
                Some(target) if self.contains(to, target)? => {
                    self.move_relative(to, item_id, target, placement)
                }
                _ => self.move_to_index(to, item_id, i64::MAX),
            };
        }
        self.check_integrity(from)?
            .into_result()
            .map_err(CoreError::from)?;
        self.check_integrity(to)?
            .into_result()
            .map_err(CoreError::from)?;

        self.remove(from, item_id)?;
        self.reassign_parent(from, to, item_id)?;
        self.splice(to, item_id, target_id, placement)
    }

    /// Links an unlinked row that already carries `scope`'s parent columns.
    pub fn splice(
        &self,
        scope: Scope,
        item_id: Id,
        target_id: Option<Id>,
        placement: Placement,
    ) -> Result<(), StoreError> {
        self.db.writer()?;
        let rows = self.ordered_rows_without(scope, item_id)?;
        let order: Vec<Id> = rows.iter().map(|row| row.id).collect();
        let next = plan_splice(&order, item_id, target_id, placement)?;
        self.write_links(scope, &diff_links(&rows, &next))
    }

    fn reassign_parent(&self, from: Scope, to: Scope, item_id: Id) -> Result<(), StoreError> {
        if matches!(self.config.scope, ParentScope::JoinTable { .. }) {
            return Err(StoreError::InvalidArgument(
                "join-table rows cannot change parent",
            ));
        }
        let conn = self.db.writer()?;
        let (predicate, mut params) = self.scope_predicate(from);
        params.push(Some(item_id));
        let id_slot = params.len();
        params.push(Some(to.parent_id));
        let mut assigns = format!("{} = ?{}", self.config.scope.parent_column(), params.len());
        if let Some(nested) = self.config.scope.nested_column() {
            params.push(to.nested_id);
            assigns.push_str(&format!(", {nested} = ?{}", params.len()));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} AND {} = ?{}",
            self.config.table, assigns, predicate, self.config.id_column, id_slot
        );
        let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
        if changed != 1 {
            return Err(StoreError::NotFound(self.config.kind.as_str()));
        }
        Ok(())
    }

    fn ordered_rows_without(
        &self,
        scope: Scope,
        item_id: Id,
    ) -> Result<Vec<LinkedRow>, StoreError> {
        let rows: Vec<LinkedRow> = self
            .rows(scope)?
            .into_iter()
            .filter(|row| row.id != item_id)
            .collect();
        Ok(order_chain(&rows).map_err(CoreError::from)?)
    }

    fn ensure_unlinked(&self, scope: Scope, item_id: Id) -> Result<(), StoreError> {
        let row = self.link_row(scope, item_id)?;
        if row.prev_id.is_some() || row.next_id.is_some() {
            return Err(CoreError::Duplicate(item_id).into());
        }
        Ok(())
    }

    fn link_row(&self, scope: Scope, item_id: Id) -> Result<LinkedRow, StoreError> {
        let conn = self.db.reader()?;
        let (predicate, mut params) = self.scope_predicate(scope);
        params.push(Some(item_id));
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} AND {} = ?{}",
            self.config.prev_column,
            self.config.next_column,
            self.config.table,
            predicate,
            self.config.id_column,
            params.len()
        );
        conn.query_row(&sql, params_from_iter(params.iter()), |row| {
            Ok(LinkedRow {
                id: item_id,
                prev_id: row.get(0)?,
                next_id: row.get(1)?,
            })
        })
        .optional()?
        .ok_or(StoreError::NotFound(self.config.kind.as_str()))
    }

    fn set_pointer(
        &self,
        scope: Scope,
        item_id: Id,
        column: &str,
        value: Option<Id>,
    ) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let (predicate, mut params) = self.scope_predicate(scope);
        params.push(value);
        params.push(Some(item_id));
        let sql = format!(
            "UPDATE {} SET {} = ?{} WHERE {} AND {} = ?{}",
            self.config.table,
            column,
            params.len() - 1,
            predicate,
            self.config.id_column,
            params.len()
        );
        if conn.execute(&sql, params_from_iter(params.iter()))? != 1 {
            return Err(StoreError::NotFound(self.config.kind.as_str()));
        }
        Ok(())
    }

    fn write_links(&self, scope: Scope, updates: &[LinkUpdate]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let conn = self.db.writer()?;
        let (predicate, scope_params) = self.scope_predicate(scope);
        let base = scope_params.len();
        let sql = format!(
            "UPDATE {} SET {} = ?{}, {} = ?{} WHERE {} AND {} = ?{}",
            self.config.table,
            self.config.prev_column,
            base + 1,
            self.config.next_column,
            base + 2,
            predicate,
            self.config.id_column,
            base + 3
        );
        let mut stmt = conn.prepare(&sql)?;
        for update in updates {
            self.db.check_cancel()?;
            let mut params = scope_params.clone();
            params.push(update.prev_id);
            params.push(update.next_id);
            params.push(Some(update.id));
            if stmt.execute(params_from_iter(params.iter()))? != 1 {
                return Err(StoreError::NotFound(self.config.kind.as_str()));
            }
        }
        Ok(())
    }

    /// `WHERE` fragment selecting the scope, with its positional parameters
    /// starting at `?1`.
    fn scope_predicate(&self, scope: Scope) -> (String, Vec<Option<Id>>) {
        let mut sql = format!("{} = ?1", self.config.scope.parent_column());
        let mut params = vec![Some(scope.parent_id)];
        if let Some(nested) = self.config.scope.nested_column() {
            sql.push_str(&format!(" AND {nested} IS ?2"));
            params.push(scope.nested_id);
        }
        sql.push_str(&self.filter_clause());
        (sql, params)
    }

    fn filter_clause(&self) -> String {
        match self.config.filter {
            Some(filter) => format!(" AND ({filter})"),
            None => String::new(),
        }
    }
}

impl MovableRepository for LinkedRepository<'_> {
    fn kind(&self) -> ListKind {
        self.config.kind
    }

    fn items_by_parent(&self, scope: Scope) -> Result<Vec<MovableItem>, StoreError> {
        self.list_under(scope)
    }

    fn update_position(&self, scope: Scope, item_id: Id, position: i64) -> Result<(), StoreError> {
        self.move_to_index(scope, item_id, position)
    }

    fn update_positions(
        &self,
        scope: Scope,
        updates: &[PositionUpdate],
    ) -> Result<(), StoreError> {
        self.db.writer()?;
        let rows = self.ordered_rows(scope)?;
        let order: Vec<Id> = rows.iter().map(|row| row.id).collect();
        let next = reorder_with(&order, updates)?;
        self.write_links(scope, &diff_links(&rows, &next))
    }

    fn remove(&self, scope: Scope, item_id: Id) -> Result<(), StoreError> {
        LinkedRepository::remove(self, scope, item_id)
    }
}

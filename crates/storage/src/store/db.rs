#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::{Connection, Transaction};
use wb_core::CancelToken;

/// Database handle a service is bound to. Built from a plain connection it
/// only serves reads; built from a transaction it serves reads and writes.
#[derive(Clone, Debug)]
pub struct Db<'a> {
    conn: &'a Connection,
    in_tx: bool,
    cancel: Option<CancelToken>,
}

impl<'a> Db<'a> {
    pub fn conn(conn: &'a Connection) -> Self {
        Self {
            conn,
            in_tx: false,
            cancel: None,
        }
    }

    pub fn tx(tx: &'a Transaction<'_>) -> Self {
        Self {
            conn: tx,
            in_tx: true,
            cancel: None,
        }
    }

    /// Same cancellation token, new transaction.
    pub fn rebind<'t>(&self, tx: &'t Transaction<'_>) -> Db<'t> {
        Db {
            conn: tx,
            in_tx: true,
            cancel: self.cancel.clone(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn in_tx(&self) -> bool {
        self.in_tx
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub fn reader(&self) -> Result<&'a Connection, StoreError> {
        self.check_cancel()?;
        Ok(self.conn)
    }

    pub fn writer(&self) -> Result<&'a Connection, StoreError> {
        self.check_cancel()?;
        if !self.in_tx {
            return Err(StoreError::InvalidArgument(
                "mutation requires a transaction",
            ));
        }
        Ok(self.conn)
    }

    pub(crate) fn check_cancel(&self) -> Result<(), StoreError> {
        match &self.cancel {
            Some(token) if token.is_canceled() => Err(StoreError::Canceled),
            _ => Ok(()),
        }
    }
}

/// `new`, `with_tx` and `with_cancel` for a service whose only state is a
/// `db: Db<'a>` field.
macro_rules! bound_service {
    ($name:ident) => {
        impl<'a> $name<'a> {
            pub fn new(db: $crate::store::Db<'a>) -> Self {
                Self { db }
            }

            /// A copy of this service bound to `tx`; `self` is left untouched.
            pub fn with_tx<'t>(&self, tx: &'t ::rusqlite::Transaction<'_>) -> $name<'t> {
                $name {
                    db: self.db.rebind(tx),
                }
            }

            pub fn with_cancel(&self, cancel: ::wb_core::CancelToken) -> Self {
                Self {
                    db: self.db.clone().with_cancel(cancel),
                }
            }

            pub fn db(&self) -> &$crate::store::Db<'a> {
                &self.db
            }
        }
    };
}

pub(crate) use bound_service;

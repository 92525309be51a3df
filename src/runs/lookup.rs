use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::error::LookupError;
use super::identifier::{resolve, IdentifierKind};
use super::projection::{extract, project};
use crate::store::RunStore;

/// Signal a caller can use to abandon an in-flight lookup
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending half of a [`Cancellation`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    /// A signal that never fires
    pub fn none() -> Self {
        Self::default()
    }

    pub fn pair() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx: Some(rx) })
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the handle cancels. Pends forever if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

/// Resolves an identifier, queries the store with a single-field projection and
/// returns that field's value.
pub struct LookupService {
    store: Arc<dyn RunStore>,
}

impl LookupService {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub async fn lookup(
        &self,
        kind: IdentifierKind,
        value: &str,
        field: &str,
    ) -> Result<Value, LookupError> {
        self.lookup_with_cancel(kind, value, field, &Cancellation::none())
            .await
    }

    /// Same as [`lookup`](Self::lookup), but gives up as soon as `cancel` fires.
    /// The pending store call is dropped, not awaited.
    pub async fn lookup_with_cancel(
        &self,
        kind: IdentifierKind,
        value: &str,
        field: &str,
        cancel: &Cancellation,
    ) -> Result<Value, LookupError> {
        let filter = resolve(kind, value)?;
        let projection = project(field);

        if cancel.is_cancelled() {
            return Err(LookupError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LookupError::Cancelled),
            result = self.store.find_one(&filter, &projection) => result,
        };

        let document = match result {
            Ok(document) => document,
            Err(e) => {
                warn!(kind = %kind, value = %value, filter = %filter, "run store query failed: {}", e);
                return Err(LookupError::StoreUnavailable(e));
            }
        };

        let found = document.is_some();
        let outcome = match document {
            Some(document) => extract(document, field).map_err(LookupError::from),
            None => Err(LookupError::NotFound),
        };

        debug!(
            kind = %kind,
            value = %value,
            filter = %filter,
            field = %field,
            found,
            field_present = outcome.is_ok(),
            "run lookup"
        );

        outcome
    }
}

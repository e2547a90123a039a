//! Initialize-once holder for the loaded model.
//!
//! The fast path is a lock-free `OnceLock` read. Only when the cell is empty
//! does a caller take the mutex, re-check, and run the loader. A failed load
//! leaves the cell empty so the next request retries.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use crate::common::error::GradeResult;
use crate::common::time;

type Loader<M> = Box<dyn Fn() -> GradeResult<Arc<M>> + Send + Sync>;

pub struct LazyModel<M: ?Sized> {
    cell: OnceLock<Arc<M>>,
    init_lock: Mutex<()>,
    loader: Loader<M>,
}

impl<M: ?Sized + Send + Sync> LazyModel<M> {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> GradeResult<Arc<M>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
            loader: Box::new(loader),
        }
    }

    /// Return the shared handle, loading it on first use.
    pub fn get(&self) -> GradeResult<Arc<M>> {
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        // A panic inside a previous loader leaves nothing cached, so the
        // poisoned guard is still safe to reuse.
        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        let start = Instant::now();
        tracing::info!(ev = "model_load_start");
        let model = match (self.loader)() {
            Ok(model) => model,
            Err(err) => {
                tracing::error!(ev = "model_load_failed", code = err.code() as u32, error = %err);
                return Err(err);
            }
        };
        tracing::info!(ev = "model_loaded", dur_ms = time::elapsed_ms(start));

        Ok(Arc::clone(self.cell.get_or_init(|| model)))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<M: ?Sized> std::fmt::Debug for LazyModel<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyModel")
            .field("loaded", &self.cell.get().is_some())
            .finish()
    }
}

/*!
 * Completion Dispatcher
 * Routes native completions back to the continuation that issued them
 */

use super::pool::SlotPool;
use super::slot::{Completed, Detached};
use crate::core::{ErrnoTable, PoolError};
use crate::monitoring::{report_completion, CompletionReport};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

/// Single entry point for completions reported by the native layer
///
/// No retries happen here; a negative result is delivered as an error and
/// retry policy belongs to the composite operations.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    errnos: Arc<ErrnoTable>,
    slow_threshold: Duration,
}

impl Dispatcher {
    pub fn new(errnos: Arc<ErrnoTable>, slow_threshold: Duration) -> Self {
        Self {
            errnos,
            slow_threshold,
        }
    }

    pub fn errnos(&self) -> &ErrnoTable {
        &self.errnos
    }

    /// Deliver `result` for the slot at `id`
    ///
    /// The slot is released and cleared before the continuation runs, and
    /// the pool borrow is dropped, so the continuation may issue new
    /// operations (and reuse this very slot) right away.
    pub fn on_completion(
        &self,
        pool: &RefCell<SlotPool>,
        id: u32,
        result: i64,
    ) -> Result<(), PoolError> {
        let Detached {
            continuation,
            outputs,
            op,
            issued_at,
        } = {
            let mut pool = pool.borrow_mut();
            pool.release(id)?.detach()
        };

        let continuation = continuation.ok_or(PoolError::MissingContinuation(id))?;
        let op_name = op.map(|op| op.name()).unwrap_or("unknown");
        let elapsed = issued_at.map(|t| t.elapsed()).unwrap_or_default();

        report_completion(
            CompletionReport {
                id,
                op: op_name,
                result,
                elapsed,
            },
            self.slow_threshold,
        );

        if result < 0 {
            continuation(Err(self.errnos.result_error(result)));
        } else {
            continuation(Ok(Completed { result, outputs }));
        }

        Ok(())
    }
}

//! Run context injection for concurrent simulations
//!
//! A parameter sweep runs many independent simulations on a worker pool. This
//! module keeps the identity of the run executing on the current thread in
//! thread-local storage so every log entry emitted while it runs can be
//! attributed to it.

use std::cell::RefCell;

use tracing::{Span, info_span};
use uuid::Uuid;

/// Run context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContextData {
    /// Human-readable label of the run (graph name, coupling probability)
    pub label: String,
    /// Position of the task in its sweep, if it belongs to one
    pub task_index: Option<usize>,
    /// Unique id of this execution
    pub instance_id: Uuid,
}

thread_local! {
    static RUN_CONTEXT: RefCell<Option<RunContextData>> = const { RefCell::new(None) };
}

/// RAII guard for run context
///
/// When this guard is created, it sets the run context for the current thread.
/// When it's dropped, it restores the previous context (if any).
///
/// # Example
///
/// ```ignore
/// use sandpile_logging::context::RunContextGuard;
///
/// let _guard = RunContextGuard::new("BA_5");
///
/// // Spans opened in this scope carry label = "BA_5"
/// tracing::info!("Starting run");
/// ```
pub struct RunContextGuard {
    previous: Option<RunContextData>,
}

impl RunContextGuard {
    /// Set a standalone run context for the current scope
    pub fn new(label: impl Into<String>) -> Self {
        Self::install(RunContextData {
            label: label.into(),
            task_index: None,
            instance_id: Uuid::new_v4(),
        })
    }

    /// Set the context of a sweep task for the current scope
    pub fn for_task(label: impl Into<String>, task_index: usize) -> Self {
        Self::install(RunContextData {
            label: label.into(),
            task_index: Some(task_index),
            instance_id: Uuid::new_v4(),
        })
    }

    fn install(data: RunContextData) -> Self {
        let previous = RUN_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// Get the current run context (if any)
    pub fn current() -> Option<RunContextData> {
        RUN_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current run label (if set)
    pub fn current_label() -> Option<String> {
        Self::current().map(|ctx| ctx.label)
    }
}

impl Drop for RunContextGuard {
    fn drop(&mut self) {
        RUN_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Open a span carrying the current run context as fields
///
/// Formatting layers only print declared span fields, so this is how the
/// label, task index and instance id reach every line logged inside a run.
/// Without an active [`RunContextGuard`] the span only carries `kind`.
pub fn run_span(kind: &'static str) -> Span {
    match RunContextGuard::current() {
        Some(ctx) => info_span!(
            "run",
            kind,
            label = %ctx.label,
            task_index = ctx.task_index,
            instance_id = %ctx.instance_id,
        ),
        None => info_span!("run", kind),
    }
}

/// Convenience macro to run a block inside a run context
///
/// # Example
///
/// ```ignore
/// with_run_context!("ER_0-002", {
///     tracing::info!("Processing");
/// });
/// ```
#[macro_export]
macro_rules! with_run_context {
    ($label:expr, $body:block) => {{
        let _guard = $crate::context::RunContextGuard::new($label);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_context_guard() {
        assert!(RunContextGuard::current().is_none());

        {
            let _guard = RunContextGuard::new("ring-4");
            let ctx = RunContextGuard::current().unwrap();
            assert_eq!(ctx.label, "ring-4");
            assert_eq!(ctx.task_index, None);
        }

        assert!(RunContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        {
            let _outer = RunContextGuard::new("outer");
            assert_eq!(RunContextGuard::current_label(), Some("outer".to_string()));

            {
                let _inner = RunContextGuard::for_task("p=0.10", 3);
                let ctx = RunContextGuard::current().unwrap();
                assert_eq!(ctx.label, "p=0.10");
                assert_eq!(ctx.task_index, Some(3));
            }

            // Should restore to outer after inner's guard drops
            assert_eq!(RunContextGuard::current_label(), Some("outer".to_string()));
        }

        assert!(RunContextGuard::current_label().is_none());
    }

    #[test]
    fn test_macro_scopes_context() {
        let label = with_run_context!("macro-run", { RunContextGuard::current_label() });
        assert_eq!(label, Some("macro-run".to_string()));
        assert!(RunContextGuard::current().is_none());
    }

    #[test]
    fn test_instance_ids_unique() {
        let a = {
            let _guard = RunContextGuard::new("a");
            RunContextGuard::current().unwrap().instance_id
        };
        let b = {
            let _guard = RunContextGuard::new("a");
            RunContextGuard::current().unwrap().instance_id
        };
        assert_ne!(a, b);
    }
}

//! Custom tracing layers for sandpile simulations

use tracing::{Subscriber, span};
use tracing_subscriber::{
    fmt::MakeWriter,
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::config::JsonlConfig;
use crate::context::{RunContextData, RunContextGuard};

/// Layer that attaches the active run context to new spans
///
/// When a [`RunContextGuard`] is active on the thread that opens a span, the
/// span receives a [`RunContextExtension`] that later layers can read.
pub struct RunContextLayer;

impl RunContextLayer {
    /// Create a new run context layer
    pub fn new() -> Self {
        Self
    }
}

impl Default for RunContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct RunContextExtension {
    pub data: RunContextData,
}

impl<S> Layer<S> for RunContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(run_ctx) = RunContextGuard::current() {
                span.extensions_mut()
                    .insert(RunContextExtension { data: run_ctx });
            }
        }
    }
}

/// Create a JSONL formatting layer writing to `writer`
///
/// Used for both console (stderr) and file output so the two stay
/// field-compatible.
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .flatten_event(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
        .boxed()
}

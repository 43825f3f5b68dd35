//! The core error taxonomy shared across the alert engine.

use thiserror::Error;

use crate::{models::condition_data::AlertId, source::SourceId};

/// Errors surfaced by the alert engine's local contracts.
///
/// All of these are local to the call that produced them: the operation is a
/// no-op, the caller's state is untouched, and nothing propagates further up
/// the graph. Evaluation-time absence of feed data is deliberately *not* an
/// error; it is the unsatisfied state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlertError {
    /// An index access outside the current bounds of the alert list model.
    #[error("index {index} is out of range for a model of {count} alerts")]
    OutOfRange {
        /// The requested index.
        index: usize,
        /// The number of alerts in the model at the time of the call.
        count: usize,
    },

    /// A read of an [`crate::source::AlertSource`] after its invalidation
    /// event. This is a wiring bug: every holder of a source reference must
    /// drop it synchronously when invalidation fires.
    #[error("source '{id}' was accessed after its invalidation event")]
    InvalidSourceAccess {
        /// The identifier of the invalidated source.
        id: SourceId,
    },

    /// An attempt to insert an alert whose identifier already exists in the
    /// model. The insert is rejected and the original entry retained.
    #[error("an alert with identifier {id} already exists in the model")]
    DuplicateIdentifier {
        /// The identifier that collided.
        id: AlertId,
    },
}

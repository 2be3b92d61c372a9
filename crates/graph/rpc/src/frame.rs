use chaingraph_types::{FetchStep, NodeError};
use serde::{Deserialize, Serialize};

/// JSON-RPC error code carrying a [`NodeError`] as error data.
pub const NODE_ERROR_CODE: i32 = -32_050;

/// Wire form of a [`FetchStep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FetchFrame<T> {
    /// A batch of results.
    Batch(Vec<T>),
    /// The terminal frame, with the error of a failed fetch.
    Done(Option<NodeError>),
}

impl<T> From<FetchStep<T>> for FetchFrame<T> {
    fn from(step: FetchStep<T>) -> Self {
        match step {
            FetchStep::Yielded(batch) => Self::Batch(batch),
            FetchStep::Done(result) => Self::Done(result),
        }
    }
}

impl<T> From<FetchFrame<T>> for FetchStep<T> {
    fn from(frame: FetchFrame<T>) -> Self {
        match frame {
            FetchFrame::Batch(batch) => Self::Yielded(batch),
            FetchFrame::Done(result) => Self::Done(result),
        }
    }
}

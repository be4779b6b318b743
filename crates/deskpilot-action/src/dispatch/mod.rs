//! Action dispatch: the queue between client connections and the
//! automation worker.

mod job;
mod queue;

pub use job::{ActionResult, Job, ResultHandle};
pub use queue::ActionDispatchQueue;

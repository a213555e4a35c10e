//! The `worker` module offloads CPU-heavy payload transforms from the
//! connection path onto a fixed pool of worker threads.

pub mod pool;
pub mod transform;

pub use pool::{TransformResult, TransformWorkerPool};
pub use transform::{Rot13Sort, SumAll, Transform};

pub mod error;
pub mod result;
pub mod retryable;

pub use error::{ErrorClass, ResilienceError};
pub use result::{ResilienceResult, ResultExt};
pub use retryable::Retryable;

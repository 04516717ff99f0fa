//! Built-in callback plugins.

mod log;
mod null;
mod progress;

pub use self::log::LogCallback;
pub use null::NullCallback;
pub use progress::{ProgressCallback, ProgressConfig};

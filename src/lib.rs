pub mod agent;
pub mod checks;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod item_key;
pub mod util;

pub use checks::{Check, CheckRegistry, MetricKey};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};

pub mod config;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod templates;
pub mod transitions;
pub mod watch;

pub use config::EngineConfig;
pub use error::EngineError;
pub use lifecycle::{Engine, Outcome};

pub mod config;
pub mod error;
pub mod model;
pub mod server;
pub mod storage;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{LinearModel, Model, ModelRegistry};
pub use server::build_router;

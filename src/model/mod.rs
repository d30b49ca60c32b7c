mod linear;
mod loader;
mod registry;
mod types;

pub use linear::{LinearEstimator, LinearModel};
pub use loader::{ArtifactFormat, MODEL_BASENAME, load_estimator};
pub use registry::{Model, ModelRegistry};
pub use types::{ModelList, ModelStatus};

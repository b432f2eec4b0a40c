pub mod acmg;
pub mod annotation;
pub mod config;
pub mod variant;

pub use acmg::*;
pub use annotation::*;
pub use config::{AnnotationConfig, Config, SourceConfig};
pub use variant::*;

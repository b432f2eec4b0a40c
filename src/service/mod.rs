pub mod acmg;
pub mod cache;
pub mod cache_keys;
pub mod coordinator;
pub mod in_silico;
pub mod normalizer;

pub use acmg::AcmgEvaluator;
pub use cache::AnnotationCache;
pub use coordinator::AnnotationCoordinator;
pub use normalizer::{Normalizer, ValidationReport};

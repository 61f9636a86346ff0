//! Image utilities shared by the pipeline and the remover

pub mod preprocessing;
pub mod resize;
pub mod validation;

pub use preprocessing::ImagePreprocessor;
pub use resize::Resizer;
pub use validation::{InputValidator, ACCEPTED_EXTENSIONS};

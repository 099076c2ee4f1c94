pub mod error;
pub mod field_types;
pub mod validation;

pub use error::{FieldsError, Result};
pub use field_types::{Field, FieldType};
pub use validation::FieldValidator;

pub mod definitions;
pub mod entity;
pub mod error;

pub use entity::{Entity, EntityDefinition, GenericEntity};
pub use error::{EntitiesError, Result};

// Re-export field types from the fields crate
pub use fields::{Field, FieldType};

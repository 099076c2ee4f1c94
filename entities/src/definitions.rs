use crate::EntityDefinition;
use fields::{Field, FieldType};

/// Entity definition for orders
pub fn orders() -> EntityDefinition {
    EntityDefinition {
        id: "orders".to_string(),
        name: "Order".to_string(),
        description: Some("A published order listing with a delivery address".to_string()),
        fields: vec![
            Field::new("title", FieldType::Text, "Title")
                .required(true)
                .with_max_length(50),
            Field::new("slug", FieldType::Text, "Slug")
                .with_description("URL-safe form of the title, set at create time"),
            Field::new("description", FieldType::LongText, "Description")
                .required(true)
                .with_max_length(500),
            Field::new("phone", FieldType::Text, "Phone number").with_max_length(20),
            Field::new("email", FieldType::Text, "Email").email(),
            Field::new("address", FieldType::Text, "Address").required(true),
            Field::new("latitude", FieldType::Float, "Latitude"),
            Field::new("longitude", FieldType::Float, "Longitude"),
            Field::new("formatted_address", FieldType::Text, "Formatted address"),
            Field::new("total_amount", FieldType::Float, "Total amount")
                .required(true)
                .with_min_value(0.0),
            Field::new("owner", FieldType::EntityReference, "Owner")
                .with_target_entity("users")
                .required(true),
            // Owner id for non-admin creators, NULL for admins. SQLite UNIQUE
            // admits any number of NULLs, so the index enforces at most one
            // order per non-admin principal.
            Field::new("owner_unique", FieldType::Text, "Owner uniqueness key")
                .unique(true)
                .hidden(),
        ],
    }
}

/// Entity definition for foods
pub fn foods() -> EntityDefinition {
    EntityDefinition {
        id: "foods".to_string(),
        name: "Food".to_string(),
        description: Some("A food item offered under an order".to_string()),
        fields: vec![
            Field::new("title", FieldType::Text, "Food title").required(true),
            Field::new("description", FieldType::LongText, "Description").required(true),
            Field::new("price", FieldType::Float, "Price")
                .required(true)
                .with_min_value(0.0),
            Field::new("quantity", FieldType::Integer, "Quantity")
                .required(true)
                .with_min_value(1.0),
            Field::new("photo", FieldType::Text, "Photo").with_default("no-photo.jpg"),
            Field::new("order_id", FieldType::EntityReference, "Order")
                .with_target_entity("orders")
                .required(true),
            Field::new("owner", FieldType::EntityReference, "Owner")
                .with_target_entity("users")
                .required(true),
        ],
    }
}

/// Entity definition for users
pub fn users() -> EntityDefinition {
    EntityDefinition {
        id: "users".to_string(),
        name: "User".to_string(),
        description: Some("An account that can authenticate against the API".to_string()),
        fields: vec![
            Field::new("name", FieldType::Text, "Name").required(true),
            Field::new("email", FieldType::Text, "Email")
                .required(true)
                .unique(true)
                .email(),
            Field::new("role", FieldType::Text, "Role")
                .required(true)
                .with_default("user"),
            Field::new("password_hash", FieldType::Text, "Password hash")
                .required(true)
                .hidden(),
            Field::new("reset_token_hash", FieldType::Text, "Reset token hash").hidden(),
            Field::new(
                "reset_token_expires_at",
                FieldType::Timestamp,
                "Reset token expiry",
            )
            .hidden(),
        ],
    }
}

/// All entity definitions, in table-creation order
pub fn all() -> Vec<EntityDefinition> {
    vec![users(), orders(), foods()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_definitions_are_valid() {
        for definition in all() {
            for field in &definition.fields {
                assert!(
                    field.validate().is_ok(),
                    "field '{}' of '{}' failed validation",
                    field.id,
                    definition.id
                );
            }
        }
    }

    #[test]
    fn test_orders_definition() {
        let def = orders();

        assert_eq!(def.table_name(), "orders");
        assert!(def.field("title").is_some_and(|f| f.required));
        assert!(def.field("description").is_some_and(|f| f.max_length == Some(500)));
        assert!(def.field("owner_unique").is_some_and(|f| f.unique && f.hidden));
        assert!(!def.is_queryable("owner_unique"));
        assert!(def.is_queryable("total_amount"));
    }

    #[test]
    fn test_foods_definition() {
        let def = foods();

        assert!(def
            .field("order_id")
            .is_some_and(|f| f.target_entity.as_deref() == Some("orders")));
        assert!(def.field("quantity").is_some_and(|f| f.min_value == Some(1.0)));
        assert!(def
            .field("photo")
            .is_some_and(|f| f.default_value.as_deref() == Some("no-photo.jpg")));
    }

    #[test]
    fn test_users_definition_hides_credentials() {
        let def = users();

        assert!(!def.is_queryable("password_hash"));
        assert!(!def.is_queryable("reset_token_hash"));
        assert!(!def.is_queryable("reset_token_expires_at"));
        assert!(def.is_queryable("email"));
        assert!(def.field("email").is_some_and(|f| f.unique));
    }
}

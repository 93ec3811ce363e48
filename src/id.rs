use uuid::Uuid;

/// New random (v4) identifier in its hyphenated text form.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

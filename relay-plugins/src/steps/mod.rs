pub mod add_route;
pub mod broadcast;
pub mod sign;
pub mod validate_schema;
pub mod validate_sign;

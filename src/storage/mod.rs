pub mod metadata;
pub mod object_store;
pub mod quota;

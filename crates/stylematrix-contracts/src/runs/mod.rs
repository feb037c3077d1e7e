pub mod manifest;
pub mod summary;

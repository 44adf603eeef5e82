pub mod summary;
pub mod trim;

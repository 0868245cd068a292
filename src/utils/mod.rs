pub mod file_types;
pub mod format;
pub mod test_helpers;

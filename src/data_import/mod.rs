// =====================================================
// DATA IMPORT MODULE
// Upload -> parse -> map -> batched transactional INSERT
// =====================================================

pub mod executor;
pub mod file_parser;
pub mod mapper;
pub mod models;
pub mod sink;
pub mod uploads;

pub use executor::{build_insert_batches, execute_import, run_import};
pub use sink::MetadataSink;
pub use uploads::{StoredUpload, UploadStore};

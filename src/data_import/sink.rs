use async_trait::async_trait;

use crate::data_import::models::{ImportRecord, MappingTemplate, SaveMappingRequest};
use crate::error::CoreResult;

/// Destination for import history and saved column mappings.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn record_import(&self, record: ImportRecord) -> CoreResult<i64>;

    async fn save_mapping_template(
        &self,
        connection_id: &str,
        request: &SaveMappingRequest,
    ) -> CoreResult<i64>;

    /// Newest first.
    async fn list_mapping_templates(
        &self,
        connection_id: &str,
        table_name: &str,
    ) -> CoreResult<Vec<MappingTemplate>>;
}

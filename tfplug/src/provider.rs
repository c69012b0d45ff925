//! Provider, resource and data source traits
//!
//! The gRPC service never holds resource instances. It asks the configured
//! [`Provider`] for a fresh [`Resource`] or [`DataSource`] by type name for
//! every call, so implementations can capture the configured API client at
//! construction time.

use crate::request::{
    ConfigureRequest, ConfigureResponse, CreateRequest, CreateResponse, DataSourceSchemaResponse,
    DeleteRequest, DeleteResponse, ImportStateRequest, ImportStateResponse, ReadDataSourceRequest,
    ReadDataSourceResponse, ReadRequest, ReadResponse, ResourceSchemaResponse, SchemaRequest,
    UpdateRequest, UpdateResponse, ValidateRequest, ValidateResponse,
};
use crate::schema::Attribute;
use crate::types::{Diagnostics, State};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ProviderSchema {
    pub description: String,
    pub attributes: HashMap<String, Attribute>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    pub version: i64,
    pub description: String,
    pub attributes: HashMap<String, Attribute>,
}

#[derive(Debug, Clone, Default)]
pub struct DataSourceSchema {
    pub version: i64,
    pub description: String,
    pub attributes: HashMap<String, Attribute>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Schema of the `provider` block
    fn schema(&self) -> ProviderSchema;

    async fn configure(&mut self, request: ConfigureRequest) -> ConfigureResponse;

    async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>>;

    async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>>;

    /// Schemas must be available before `configure` is called
    async fn resource_schemas(&self) -> HashMap<String, ResourceSchema>;

    async fn data_source_schemas(&self) -> HashMap<String, DataSourceSchema>;
}

#[async_trait]
pub trait Resource: Send + Sync {
    async fn schema(&self, request: SchemaRequest) -> ResourceSchemaResponse;

    /// Cross-attribute checks beyond what attribute validators express.
    /// Values may still be unknown here.
    async fn validate(&self, _request: ValidateRequest) -> ValidateResponse {
        ValidateResponse {
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse;

    /// `state: None` in the response means the remote object is gone
    async fn read(&self, request: ReadRequest) -> ReadResponse;

    async fn update(&self, request: UpdateRequest) -> UpdateResponse;

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse;

    /// Imported IDs land in `id`; the follow-up read fills in the rest
    async fn import_state(&self, request: ImportStateRequest) -> ImportStateResponse {
        let mut state = State::new();
        state.set_string("id", request.id);
        ImportStateResponse {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn schema(&self, request: SchemaRequest) -> DataSourceSchemaResponse;

    async fn validate(&self, _request: ValidateRequest) -> ValidateResponse {
        ValidateResponse {
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

//! TCR registry instance lookup

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_attribute, publish_list, result_output_file_attribute};
use crate::api::tcr::{InstanceQuery, Registry};
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct InstanceItem {
    id: String,
    name: String,
    instance_type: String,
    status: String,
    public_domain: String,
    internal_end_point: String,
    create_time: String,
    tags: HashMap<String, String>,
}

impl From<&Registry> for InstanceItem {
    fn from(r: &Registry) -> Self {
        Self {
            id: r.registry_id.clone(),
            name: r.registry_name.clone(),
            instance_type: r.registry_type.clone(),
            status: r.status.clone(),
            public_domain: r.public_domain.clone(),
            internal_end_point: r.internal_endpoint.clone(),
            create_time: r.created_at.clone(),
            tags: r
                .tag_specification
                .iter()
                .flat_map(|spec| spec.tags.iter())
                .map(|t| (t.key.clone(), t.value.clone()))
                .collect(),
        }
    }
}

pub struct TcrInstancesDataSource {
    provider_data: TencentCloudProviderData,
}

impl TcrInstancesDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        SchemaBuilder::new()
            .description("Use this data source to query TCR instances")
            .attribute("id", id_attribute())
            .attribute("name", AttributeBuilder::string("name").optional())
            .attribute("instance_id", AttributeBuilder::string("instance_id").optional())
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "instance_list",
                AttributeBuilder::object_list(
                    "instance_list",
                    [
                        ("id", AttributeType::String),
                        ("name", AttributeType::String),
                        ("instance_type", AttributeType::String),
                        ("status", AttributeType::String),
                        ("public_domain", AttributeType::String),
                        ("internal_end_point", AttributeType::String),
                        ("create_time", AttributeType::String),
                        ("tags", AttributeType::map_of(AttributeType::String)),
                    ],
                )
                .computed(),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for TcrInstancesDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);
        let query = InstanceQuery {
            id: state.get_string("instance_id"),
            name: state.get_string("name"),
        };

        match self
            .provider_data
            .client
            .tcr()
            .describe_instances(&request.context, &query)
            .await
        {
            Ok(registries) => {
                let items: Vec<InstanceItem> = registries.iter().map(InstanceItem::from).collect();
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                publish_list(&mut state, "instance_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe TCR instances", e),
        }

        ReadDataSourceResponse {
            state,
            diagnostics: diags,
        }
    }
}

//! CDN acceleration domain lookup

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::validator::StringOneOfValidator;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_attribute, publish_list, result_output_file_attribute};
use crate::api::cdn::{DomainConfig, DomainQuery};
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct DomainItem {
    id: String,
    domain: String,
    cname: String,
    status: String,
    create_time: String,
    update_time: String,
    service_type: String,
    area: String,
    project_id: i64,
    origin_list: Vec<String>,
    origin_type: String,
    server_name: Option<String>,
    origin_pull_protocol: Option<String>,
    backup_origin_list: Vec<String>,
    backup_origin_type: Option<String>,
    tags: HashMap<String, String>,
}

impl From<&DomainConfig> for DomainItem {
    fn from(d: &DomainConfig) -> Self {
        Self {
            id: d.resource_id.clone(),
            domain: d.domain.clone(),
            cname: d.cname.clone(),
            status: d.status.clone(),
            create_time: d.create_time.clone(),
            update_time: d.update_time.clone(),
            service_type: d.service_type.clone(),
            area: d.area.clone(),
            project_id: d.project_id,
            origin_list: d.origin.origins.clone(),
            origin_type: d.origin.origin_type.clone(),
            server_name: d.origin.server_name.clone(),
            origin_pull_protocol: d.origin.origin_pull_protocol.clone(),
            backup_origin_list: d.origin.backup_origins.clone(),
            backup_origin_type: d.origin.backup_origin_type.clone(),
            tags: d
                .tag
                .iter()
                .map(|t| (t.tag_key.clone(), t.tag_value.clone()))
                .collect(),
        }
    }
}

pub struct CdnDomainsDataSource {
    provider_data: TencentCloudProviderData,
}

impl CdnDomainsDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        let strings = AttributeType::list_of(AttributeType::String);
        SchemaBuilder::new()
            .description("Use this data source to query CDN acceleration domains")
            .attribute("id", id_attribute())
            .attribute("domain", AttributeBuilder::string("domain").optional())
            .attribute(
                "service_type",
                AttributeBuilder::string("service_type")
                    .optional()
                    .validator(StringOneOfValidator::new(&["web", "download", "media"])),
            )
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "domain_list",
                AttributeBuilder::object_list(
                    "domain_list",
                    [
                        ("id", AttributeType::String),
                        ("domain", AttributeType::String),
                        ("cname", AttributeType::String),
                        ("status", AttributeType::String),
                        ("create_time", AttributeType::String),
                        ("update_time", AttributeType::String),
                        ("service_type", AttributeType::String),
                        ("area", AttributeType::String),
                        ("project_id", AttributeType::Number),
                        ("origin_list", strings.clone()),
                        ("origin_type", AttributeType::String),
                        ("server_name", AttributeType::String),
                        ("origin_pull_protocol", AttributeType::String),
                        ("backup_origin_list", strings),
                        ("backup_origin_type", AttributeType::String),
                        ("tags", AttributeType::map_of(AttributeType::String)),
                    ],
                )
                .computed(),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for CdnDomainsDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);
        let query = DomainQuery {
            domain: state.get_string("domain"),
            service_type: state.get_string("service_type"),
        };

        match self
            .provider_data
            .client
            .cdn()
            .describe_domains(&request.context, &query)
            .await
        {
            Ok(domains) => {
                let items: Vec<DomainItem> = domains.iter().map(DomainItem::from).collect();
                let ids: Vec<&str> = items.iter().map(|i| i.domain.as_str()).collect();
                publish_list(&mut state, "domain_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe CDN domains", e),
        }

        ReadDataSourceResponse {
            state,
            diagnostics: diags,
        }
    }
}

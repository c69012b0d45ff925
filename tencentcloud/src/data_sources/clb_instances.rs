//! CLB instance lookup

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::validator::StringOneOfValidator;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_attribute, non_empty, publish_list, result_output_file_attribute};
use crate::api::clb::{LoadBalancer, LoadBalancerFilter};
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct ClbItem {
    clb_id: String,
    clb_name: String,
    network_type: String,
    project_id: i64,
    vpc_id: Option<String>,
    subnet_id: Option<String>,
    clb_vips: Vec<String>,
    security_groups: Vec<String>,
    status: i64,
    create_time: String,
    target_region_info_region: Option<String>,
    target_region_info_vpc_id: Option<String>,
    tags: HashMap<String, String>,
}

impl From<&LoadBalancer> for ClbItem {
    fn from(lb: &LoadBalancer) -> Self {
        Self {
            clb_id: lb.load_balancer_id.clone(),
            clb_name: lb.load_balancer_name.clone(),
            network_type: lb.load_balancer_type.clone(),
            project_id: lb.project_id,
            vpc_id: non_empty(&lb.vpc_id),
            subnet_id: non_empty(&lb.subnet_id),
            clb_vips: lb.load_balancer_vips.clone(),
            security_groups: lb.secure_groups.clone(),
            status: lb.status,
            create_time: lb.create_time.clone(),
            target_region_info_region: lb.target_region_info.as_ref().map(|t| t.region.clone()),
            target_region_info_vpc_id: lb.target_region_info.as_ref().map(|t| t.vpc_id.clone()),
            tags: lb
                .tags
                .iter()
                .map(|t| (t.tag_key.clone(), t.tag_value.clone()))
                .collect(),
        }
    }
}

pub struct ClbInstancesDataSource {
    provider_data: TencentCloudProviderData,
}

impl ClbInstancesDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        let strings = AttributeType::list_of(AttributeType::String);
        SchemaBuilder::new()
            .description("Use this data source to query CLB instances")
            .attribute("id", id_attribute())
            .attribute(
                "clb_id",
                AttributeBuilder::string("clb_id").optional().description("ID of the CLB"),
            )
            .attribute(
                "clb_name",
                AttributeBuilder::string("clb_name").optional().description("Name of the CLB"),
            )
            .attribute(
                "network_type",
                AttributeBuilder::string("network_type")
                    .optional()
                    .validator(StringOneOfValidator::new(&["OPEN", "INTERNAL"])),
            )
            .attribute(
                "project_id",
                AttributeBuilder::number("project_id").optional(),
            )
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "clb_list",
                AttributeBuilder::object_list(
                    "clb_list",
                    [
                        ("clb_id", AttributeType::String),
                        ("clb_name", AttributeType::String),
                        ("network_type", AttributeType::String),
                        ("project_id", AttributeType::Number),
                        ("vpc_id", AttributeType::String),
                        ("subnet_id", AttributeType::String),
                        ("clb_vips", strings.clone()),
                        ("security_groups", strings),
                        ("status", AttributeType::Number),
                        ("create_time", AttributeType::String),
                        ("target_region_info_region", AttributeType::String),
                        ("target_region_info_vpc_id", AttributeType::String),
                        ("tags", AttributeType::map_of(AttributeType::String)),
                    ],
                )
                .computed()
                .description("CLB instances matching the filters"),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for ClbInstancesDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);

        let filter = LoadBalancerFilter {
            ids: state.get_string("clb_id").into_iter().collect(),
            name: state.get_string("clb_name"),
            network_type: state.get_string("network_type"),
            project_id: state.get_i64("project_id"),
        };

        match self
            .provider_data
            .client
            .clb()
            .describe_load_balancers(&request.context, &filter)
            .await
        {
            Ok(load_balancers) => {
                let items: Vec<ClbItem> = load_balancers.iter().map(ClbItem::from).collect();
                let ids: Vec<&str> = items.iter().map(|i| i.clb_id.as_str()).collect();
                tracing::debug!("[tencentcloud_clb_instances.read] found {} instances", items.len());
                publish_list(&mut state, "clb_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe CLB instances", e),
        }

        ReadDataSourceResponse {
            state,
            diagnostics: diags,
        }
    }
}

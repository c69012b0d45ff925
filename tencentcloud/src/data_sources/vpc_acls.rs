//! VPC network ACL lookup

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_filter_attribute, publish_list, result_output_file_attribute};
use crate::api::vpc::{AclQuery, AclSubnet, NetworkAcl};
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct SubnetItem {
    vpc_id: String,
    subnet_id: String,
    subnet_name: String,
    cidr_block: String,
    create_time: String,
}

impl From<&AclSubnet> for SubnetItem {
    fn from(s: &AclSubnet) -> Self {
        Self {
            vpc_id: s.vpc_id.clone(),
            subnet_id: s.subnet_id.clone(),
            subnet_name: s.subnet_name.clone(),
            cidr_block: s.cidr_block.clone(),
            create_time: s.created_time.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AclItem {
    id: String,
    vpc_id: String,
    name: String,
    ingress: Vec<String>,
    egress: Vec<String>,
    create_time: String,
    subnets: Vec<SubnetItem>,
}

impl From<&NetworkAcl> for AclItem {
    fn from(acl: &NetworkAcl) -> Self {
        Self {
            id: acl.network_acl_id.clone(),
            vpc_id: acl.vpc_id.clone(),
            name: acl.network_acl_name.clone(),
            ingress: acl.ingress_entries.iter().map(ToString::to_string).collect(),
            egress: acl.egress_entries.iter().map(ToString::to_string).collect(),
            create_time: acl.created_time.clone(),
            subnets: acl.subnet_set.iter().map(SubnetItem::from).collect(),
        }
    }
}

pub struct VpcAclsDataSource {
    provider_data: TencentCloudProviderData,
}

impl VpcAclsDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        let strings = AttributeType::list_of(AttributeType::String);
        let subnet = AttributeType::object([
            ("vpc_id", AttributeType::String),
            ("subnet_id", AttributeType::String),
            ("subnet_name", AttributeType::String),
            ("cidr_block", AttributeType::String),
            ("create_time", AttributeType::String),
        ]);
        SchemaBuilder::new()
            .description("Use this data source to query VPC network ACLs")
            .attribute("id", id_filter_attribute("network ACL"))
            .attribute(
                "vpc_id",
                AttributeBuilder::string("vpc_id")
                    .optional()
                    .description("Only ACLs in this VPC"),
            )
            .attribute("name", AttributeBuilder::string("name").optional())
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "acl_list",
                AttributeBuilder::object_list(
                    "acl_list",
                    [
                        ("id", AttributeType::String),
                        ("vpc_id", AttributeType::String),
                        ("name", AttributeType::String),
                        ("ingress", strings.clone()),
                        ("egress", strings),
                        ("create_time", AttributeType::String),
                        ("subnets", AttributeType::list_of(subnet)),
                    ],
                )
                .computed(),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for VpcAclsDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);
        let query = AclQuery {
            id: state.get_string("id"),
            vpc_id: state.get_string("vpc_id"),
            name: state.get_string("name"),
        };

        match self
            .provider_data
            .client
            .vpc()
            .describe_network_acls(&request.context, &query)
            .await
        {
            Ok(acls) => {
                let items: Vec<AclItem> = acls.iter().map(AclItem::from).collect();
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                publish_list(&mut state, "acl_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe network ACLs", e),
        }

        ReadDataSourceResponse {
            state,
            diagnostics: diags,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::resources::test_support::provider_data;
    use mockito::Matcher;
    use tfplug::{Config, Context};

    #[tokio::test]
    async fn rules_are_rendered_in_config_form() {
        let mut server = mockito::Server::new_async().await;
        let describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeNetworkAcls")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Filters": [{"Name": "vpc-id", "Values": ["vpc-1"]}]
            })))
            .with_body(
                r#"{"Response":{"TotalCount":1,"NetworkAclSet":[{"VpcId":"vpc-1","NetworkAclId":"acl-1",
                    "NetworkAclName":"edge","CreatedTime":"2024-01-01 00:00:00",
                    "IngressEntries":[{"Action":"accept","CidrBlock":"10.0.0.0/16","Port":"80","Protocol":"tcp"}],
                    "EgressEntries":[],
                    "SubnetSet":[{"VpcId":"vpc-1","SubnetId":"subnet-1","SubnetName":"a","CidrBlock":"10.0.1.0/24"}]}],
                    "RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let mut config = Config::new();
        config.set_string("vpc_id", "vpc-1");

        let data_source = VpcAclsDataSource::new(provider_data(&server.url()));
        let response = data_source
            .read(ReadDataSourceRequest {
                context: Context::new(),
                config,
            })
            .await;

        assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
        let list = response.state.get_object_list("acl_list").unwrap();
        assert_eq!(
            list[0].get_string_list("ingress"),
            Some(vec!["ACCEPT#10.0.0.0/16#80#TCP".to_string()])
        );
        assert_eq!(list[0].get_string_list("egress"), Some(vec![]));
        let subnets = list[0].get_object_list("subnets").unwrap();
        assert_eq!(subnets[0].get_string("subnet_id").as_deref(), Some("subnet-1"));
        describe.assert_async().await;
    }
}

//! TDMQ cluster lookup

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_attribute, non_empty, publish_list, result_output_file_attribute};
use crate::api::tdmq::{Cluster, ClusterQuery};
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct ClusterItem {
    id: String,
    cluster_name: String,
    remark: Option<String>,
    status: i64,
    version: String,
    public_end_point: Option<String>,
    vpc_end_point: Option<String>,
    namespace_num: i64,
    topic_num: i64,
    create_time: String,
    tags: HashMap<String, String>,
}

impl From<&Cluster> for ClusterItem {
    fn from(c: &Cluster) -> Self {
        Self {
            id: c.cluster_id.clone(),
            cluster_name: c.cluster_name.clone(),
            remark: non_empty(&c.remark),
            status: c.status,
            version: c.version.clone(),
            public_end_point: non_empty(&c.public_end_point),
            vpc_end_point: non_empty(&c.vpc_end_point),
            namespace_num: c.namespace_num,
            topic_num: c.topic_num,
            create_time: c.create_time.clone(),
            tags: c
                .tags
                .iter()
                .map(|t| (t.tag_key.clone(), t.tag_value.clone()))
                .collect(),
        }
    }
}

pub struct TdmqInstancesDataSource {
    provider_data: TencentCloudProviderData,
}

impl TdmqInstancesDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        SchemaBuilder::new()
            .description("Use this data source to query TDMQ clusters")
            .attribute("id", id_attribute())
            .attribute("cluster_id", AttributeBuilder::string("cluster_id").optional())
            .attribute("cluster_name", AttributeBuilder::string("cluster_name").optional())
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "instance_list",
                AttributeBuilder::object_list(
                    "instance_list",
                    [
                        ("id", AttributeType::String),
                        ("cluster_name", AttributeType::String),
                        ("remark", AttributeType::String),
                        ("status", AttributeType::Number),
                        ("version", AttributeType::String),
                        ("public_end_point", AttributeType::String),
                        ("vpc_end_point", AttributeType::String),
                        ("namespace_num", AttributeType::Number),
                        ("topic_num", AttributeType::Number),
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
impl DataSource for TdmqInstancesDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);
        let query = ClusterQuery {
            id: state.get_string("cluster_id"),
            name: state.get_string("cluster_name"),
        };

        match self
            .provider_data
            .client
            .tdmq()
            .describe_clusters(&request.context, &query)
            .await
        {
            Ok(clusters) => {
                let items: Vec<ClusterItem> = clusters.iter().map(ClusterItem::from).collect();
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                publish_list(&mut state, "instance_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe TDMQ clusters", e),
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
    async fn name_filter_and_output_file() {
        let mut server = mockito::Server::new_async().await;
        let describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeClusters")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Filters": [{"Name": "ClusterName", "Values": ["pulsar"]}]
            })))
            .with_body(
                r#"{"Response":{"TotalCount":2,"ClusterSet":[
                    {"ClusterId":"pulsar-1","ClusterName":"pulsar","Status":1,"Tags":null},
                    {"ClusterId":"pulsar-2","ClusterName":"pulsar","Remark":"b","Status":1}],
                    "RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.json");
        let mut config = Config::new();
        config.set_string("cluster_name", "pulsar");
        config.set_string("result_output_file", path.to_string_lossy());

        let data_source = TdmqInstancesDataSource::new(provider_data(&server.url()));
        let response = data_source
            .read(ReadDataSourceRequest {
                context: Context::new(),
                config,
            })
            .await;

        assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
        let list = response.state.get_object_list("instance_list").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].get("remark"), Some(&tfplug::Dynamic::Null));
        assert_eq!(list[1].get_string("remark").as_deref(), Some("b"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[1]["id"], "pulsar-2");
        describe.assert_async().await;
    }
}

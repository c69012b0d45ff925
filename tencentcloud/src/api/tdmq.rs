//! TDMQ (Pulsar) cluster API (2020-02-17)

use serde::{Deserialize, Serialize};

use tfplug::Context;

use super::client::{Client, Product};
use super::error::ApiError;
use super::retry::OperationClass;

pub const TDMQ: Product = Product {
    service: "tdmq",
    version: "2020-02-17",
};

const PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TdmqTag {
    pub tag_key: String,
    #[serde(default)]
    pub tag_value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Cluster {
    pub cluster_id: String,
    pub cluster_name: String,
    pub remark: String,
    pub status: i64,
    pub version: String,
    pub public_end_point: String,
    pub vpc_end_point: String,
    pub namespace_num: i64,
    pub topic_num: i64,
    pub create_time: String,
    #[serde(deserialize_with = "super::null_default")]
    pub tags: Vec<TdmqTag>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateClusterRequest {
    pub cluster_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_cluster_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TdmqTag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateClusterResponse {
    cluster_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Filter<'a> {
    name: &'a str,
    values: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeClustersRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_id_list: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<Filter<'a>>,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeClustersResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default, deserialize_with = "super::null_default")]
    cluster_set: Vec<Cluster>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyClusterRequest<'a> {
    cluster_id: &'a str,
    cluster_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remark: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteClusterRequest<'a> {
    cluster_id: &'a str,
}

#[derive(Deserialize)]
struct Empty {}

/// Filters for [`TdmqService::describe_clusters`]
#[derive(Debug, Clone, Default)]
pub struct ClusterQuery {
    pub id: Option<String>,
    pub name: Option<String>,
}

pub struct TdmqService<'a> {
    client: &'a Client,
}

impl<'a> TdmqService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_cluster(
        &self,
        ctx: &Context,
        request: &CreateClusterRequest,
    ) -> Result<String, ApiError> {
        let response: CreateClusterResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TDMQ, "CreateCluster", request)
            .await?;
        Ok(response.cluster_id)
    }

    pub async fn describe_clusters(
        &self,
        ctx: &Context,
        query: &ClusterQuery,
    ) -> Result<Vec<Cluster>, ApiError> {
        let mut result = Vec::new();
        let mut offset = 0;

        loop {
            let mut filters = Vec::new();
            if let Some(name) = query.name.as_deref() {
                filters.push(Filter {
                    name: "ClusterName",
                    values: [name],
                });
            }
            let request = DescribeClustersRequest {
                cluster_id_list: query.id.as_deref().map(|id| [id]),
                filters,
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeClustersResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, TDMQ, "DescribeClusters", &request)
                .await?;

            let page_len = response.cluster_set.len() as u64;
            result.extend(response.cluster_set);
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                break;
            }
        }
        Ok(result)
    }

    pub async fn describe_cluster_by_id(
        &self,
        ctx: &Context,
        cluster_id: &str,
    ) -> Result<Option<Cluster>, ApiError> {
        let query = ClusterQuery {
            id: Some(cluster_id.to_string()),
            name: None,
        };
        match self.describe_clusters(ctx, &query).await {
            Ok(list) => Ok(list.into_iter().find(|c| c.cluster_id == cluster_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_cluster(
        &self,
        ctx: &Context,
        cluster_id: &str,
        cluster_name: &str,
        remark: Option<&str>,
    ) -> Result<(), ApiError> {
        let request = ModifyClusterRequest {
            cluster_id,
            cluster_name,
            remark,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TDMQ, "ModifyCluster", &request)
            .await?;
        Ok(())
    }

    pub async fn delete_cluster(&self, ctx: &Context, cluster_id: &str) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(
                ctx,
                OperationClass::Write,
                TDMQ,
                "DeleteCluster",
                &DeleteClusterRequest { cluster_id },
            )
            .await?;
        Ok(())
    }
}

//! Tencent Container Registry API (2019-09-24)

use serde::{Deserialize, Serialize};

use tfplug::Context;

use super::client::{Client, Product};
use super::error::ApiError;
use super::ids::NamespaceId;
use super::retry::OperationClass;

pub const TCR: Product = Product {
    service: "tcr",
    version: "2019-09-24",
};

const PAGE_SIZE: u64 = 100;

pub const STATUS_RUNNING: &str = "Running";
pub const PENDING_STATUSES: &[&str] = &["Pending", "Creating", "Deploying", "Modifying"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TcrTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TagSpecification {
    pub resource_type: String,
    #[serde(deserialize_with = "super::null_default")]
    pub tags: Vec<TcrTag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Registry {
    pub registry_id: String,
    pub registry_name: String,
    pub registry_type: String,
    pub status: String,
    pub public_domain: String,
    pub internal_endpoint: String,
    pub created_at: String,
    pub region_name: String,
    pub tag_specification: Option<TagSpecification>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Namespace {
    pub name: String,
    pub creation_time: String,
    pub public: bool,
    pub namespace_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Filter<'a> {
    name: &'a str,
    values: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesRequest<'a> {
    /// The API spells this parameter in lower case
    #[serde(rename = "Registryids", skip_serializing_if = "Option::is_none")]
    registry_ids: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<Filter<'a>>,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default, deserialize_with = "super::null_default")]
    registries: Vec<Registry>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInstanceRequest {
    pub registry_name: String,
    pub registry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_specification: Option<TagSpecification>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInstanceResponse {
    registry_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyInstanceRequest<'a> {
    registry_id: &'a str,
    registry_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteInstanceRequest<'a> {
    registry_id: &'a str,
    delete_bucket: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NamespaceRequest<'a> {
    registry_id: &'a str,
    namespace_name: &'a str,
    is_public: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteNamespaceRequest<'a> {
    registry_id: &'a str,
    namespace_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNamespacesRequest<'a> {
    registry_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_name: Option<&'a str>,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNamespacesResponse {
    #[serde(default, deserialize_with = "super::null_default")]
    namespace_list: Vec<Namespace>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Deserialize)]
struct Empty {}

/// Filters for [`TcrService::describe_instances`]
#[derive(Debug, Clone, Default)]
pub struct InstanceQuery {
    pub id: Option<String>,
    pub name: Option<String>,
}

pub struct TcrService<'a> {
    client: &'a Client,
}

impl<'a> TcrService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_instance(
        &self,
        ctx: &Context,
        request: &CreateInstanceRequest,
    ) -> Result<String, ApiError> {
        let response: CreateInstanceResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TCR, "CreateInstance", request)
            .await?;
        Ok(response.registry_id)
    }

    pub async fn describe_instances(
        &self,
        ctx: &Context,
        query: &InstanceQuery,
    ) -> Result<Vec<Registry>, ApiError> {
        let mut result = Vec::new();
        let mut offset = 0;

        loop {
            let mut filters = Vec::new();
            if let Some(name) = query.name.as_deref() {
                filters.push(Filter {
                    name: "RegistryName",
                    values: [name],
                });
            }
            let request = DescribeInstancesRequest {
                registry_ids: query.id.as_deref().map(|id| [id]),
                filters,
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeInstancesResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, TCR, "DescribeInstances", &request)
                .await?;

            let page_len = response.registries.len() as u64;
            result.extend(response.registries);
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                break;
            }
        }
        Ok(result)
    }

    pub async fn describe_instance_by_id(
        &self,
        ctx: &Context,
        registry_id: &str,
    ) -> Result<Option<Registry>, ApiError> {
        let query = InstanceQuery {
            id: Some(registry_id.to_string()),
            name: None,
        };
        match self.describe_instances(ctx, &query).await {
            Ok(list) => Ok(list.into_iter().find(|r| r.registry_id == registry_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_instance(
        &self,
        ctx: &Context,
        registry_id: &str,
        registry_type: &str,
    ) -> Result<(), ApiError> {
        let request = ModifyInstanceRequest {
            registry_id,
            registry_type,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TCR, "ModifyInstance", &request)
            .await?;
        Ok(())
    }

    pub async fn delete_instance(
        &self,
        ctx: &Context,
        registry_id: &str,
        delete_bucket: bool,
    ) -> Result<(), ApiError> {
        let request = DeleteInstanceRequest {
            registry_id,
            delete_bucket,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TCR, "DeleteInstance", &request)
            .await?;
        Ok(())
    }

    pub async fn create_namespace(
        &self,
        ctx: &Context,
        id: &NamespaceId,
        is_public: bool,
    ) -> Result<(), ApiError> {
        let request = NamespaceRequest {
            registry_id: &id.registry_id,
            namespace_name: &id.namespace,
            is_public,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TCR, "CreateNamespace", &request)
            .await?;
        Ok(())
    }

    pub async fn describe_namespace_by_id(
        &self,
        ctx: &Context,
        id: &NamespaceId,
    ) -> Result<Option<Namespace>, ApiError> {
        let mut offset = 0;
        loop {
            let request = DescribeNamespacesRequest {
                registry_id: &id.registry_id,
                namespace_name: Some(&id.namespace),
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeNamespacesResponse = match self
                .client
                .call_with_retry(ctx, OperationClass::Read, TCR, "DescribeNamespaces", &request)
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };

            let page_len = response.namespace_list.len() as u64;
            if let Some(ns) = response
                .namespace_list
                .into_iter()
                .find(|ns| ns.name == id.namespace)
            {
                return Ok(Some(ns));
            }
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                return Ok(None);
            }
        }
    }

    pub async fn modify_namespace(
        &self,
        ctx: &Context,
        id: &NamespaceId,
        is_public: bool,
    ) -> Result<(), ApiError> {
        let request = NamespaceRequest {
            registry_id: &id.registry_id,
            namespace_name: &id.namespace,
            is_public,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TCR, "ModifyNamespace", &request)
            .await?;
        Ok(())
    }

    pub async fn delete_namespace(&self, ctx: &Context, id: &NamespaceId) -> Result<(), ApiError> {
        let request = DeleteNamespaceRequest {
            registry_id: &id.registry_id,
            namespace_name: &id.namespace,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TCR, "DeleteNamespace", &request)
            .await?;
        Ok(())
    }
}

//! CDN API (2018-06-06)

use serde::{Deserialize, Serialize};

use tfplug::Context;

use super::client::{Client, Product};
use super::error::ApiError;
use super::retry::OperationClass;

pub const CDN: Product = Product {
    service: "cdn",
    version: "2018-06-06",
};

const PAGE_SIZE: u64 = 100;

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";
pub const STATUS_PROCESSING: &str = "processing";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Origin {
    #[serde(deserialize_with = "super::null_default")]
    pub origins: Vec<String>,
    pub origin_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_pull_protocol: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "super::null_default")]
    pub backup_origins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_origin_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CdnTag {
    pub tag_key: String,
    #[serde(default)]
    pub tag_value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DomainConfig {
    pub resource_id: String,
    pub domain: String,
    pub cname: String,
    pub status: String,
    pub project_id: i64,
    pub service_type: String,
    pub create_time: String,
    pub update_time: String,
    pub area: String,
    pub origin: Origin,
    #[serde(deserialize_with = "super::null_default")]
    pub tag: Vec<CdnTag>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddCdnDomainRequest {
    pub domain: String,
    pub service_type: String,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<CdnTag>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateDomainConfigRequest {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
}

impl UpdateDomainConfigRequest {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.origin.is_none()
            && self.area.is_none()
            && self.service_type.is_none()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DomainFilter<'a> {
    name: &'a str,
    value: Vec<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    fuzzy: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainsConfigRequest<'a> {
    offset: u64,
    limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a [DomainFilter<'a>]>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainsConfigResponse {
    #[serde(default, deserialize_with = "super::null_default")]
    domains: Vec<DomainConfig>,
    #[serde(default)]
    total_number: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DomainRequest<'a> {
    domain: &'a str,
}

#[derive(Deserialize)]
struct Empty {}

/// Filters for [`CdnService::describe_domains`]
#[derive(Debug, Clone, Default)]
pub struct DomainQuery {
    pub domain: Option<String>,
    pub service_type: Option<String>,
}

pub struct CdnService<'a> {
    client: &'a Client,
}

impl<'a> CdnService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn add_domain(&self, ctx: &Context, request: &AddCdnDomainRequest) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CDN, "AddCdnDomain", request)
            .await?;
        Ok(())
    }

    pub async fn describe_domains(
        &self,
        ctx: &Context,
        query: &DomainQuery,
    ) -> Result<Vec<DomainConfig>, ApiError> {
        let mut filters = Vec::new();
        if let Some(domain) = query.domain.as_deref() {
            filters.push(DomainFilter {
                name: "domain",
                value: vec![domain],
                fuzzy: false,
            });
        }
        if let Some(service_type) = query.service_type.as_deref() {
            filters.push(DomainFilter {
                name: "serviceType",
                value: vec![service_type],
                fuzzy: false,
            });
        }

        let mut result = Vec::new();
        let mut offset = 0;
        loop {
            let request = DescribeDomainsConfigRequest {
                offset,
                limit: PAGE_SIZE,
                filters: (!filters.is_empty()).then_some(filters.as_slice()),
            };
            let response: DescribeDomainsConfigResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, CDN, "DescribeDomainsConfig", &request)
                .await?;

            let page_len = response.domains.len() as u64;
            result.extend(response.domains);
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_number {
                break;
            }
        }
        Ok(result)
    }

    pub async fn describe_domain_by_name(
        &self,
        ctx: &Context,
        domain: &str,
    ) -> Result<Option<DomainConfig>, ApiError> {
        let query = DomainQuery {
            domain: Some(domain.to_string()),
            service_type: None,
        };
        match self.describe_domains(ctx, &query).await {
            Ok(domains) => Ok(domains.into_iter().find(|d| d.domain == domain)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update_domain_config(
        &self,
        ctx: &Context,
        request: &UpdateDomainConfigRequest,
    ) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CDN, "UpdateDomainConfig", request)
            .await?;
        Ok(())
    }

    pub async fn stop_domain(&self, ctx: &Context, domain: &str) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CDN, "StopCdnDomain", &DomainRequest { domain })
            .await?;
        Ok(())
    }

    pub async fn delete_domain(&self, ctx: &Context, domain: &str) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CDN, "DeleteCdnDomain", &DomainRequest { domain })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Matcher;

    #[tokio::test]
    async fn describe_domain_sends_domain_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeDomainsConfig")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Filters": [{"Name": "domain", "Value": ["www.example.com"]}]
            })))
            .with_body(
                r#"{"Response":{"Domains":[{"Domain":"www.example.com","Status":"online",
                    "ServiceType":"web","Cname":"www.example.com.cdn.dnsv1.com",
                    "Origin":{"Origins":["1.1.1.1"],"OriginType":"ip"},"Tag":null}],
                    "TotalNumber":1,"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let domain = client
            .cdn()
            .describe_domain_by_name(&Context::new(), "www.example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(domain.status, STATUS_ONLINE);
        assert_eq!(domain.origin.origins, vec!["1.1.1.1".to_string()]);
        assert!(domain.tag.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_domain_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(
                r#"{"Response":{"Error":{"Code":"ResourceNotFound.CdnHostNotExists","Message":"no"},"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let domain = client
            .cdn()
            .describe_domain_by_name(&Context::new(), "gone.example.com")
            .await
            .unwrap();
        assert!(domain.is_none());
    }

    #[test]
    fn update_request_omits_unchanged_fields() {
        let request = UpdateDomainConfigRequest {
            domain: "www.example.com".into(),
            area: Some("global".into()),
            ..Default::default()
        };
        assert!(!request.is_empty());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"Domain": "www.example.com", "Area": "global"})
        );
    }
}

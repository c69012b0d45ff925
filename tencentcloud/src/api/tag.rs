//! Tag service: resource tag attachment and the standalone tag key/value API

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use tfplug::Context;

use super::client::{Client, Product};
use super::error::ApiError;
use super::retry::OperationClass;

pub const TAG: Product = Product {
    service: "tag",
    version: "2018-08-13",
};

const PAGE_SIZE: u64 = 100;

/// `qcs::<service>:<region>:uin/:<resource_type>/<id>`
pub fn build_resource_name(service: &str, resource_type: &str, region: &str, id: &str) -> String {
    format!(
        "qcs::{}:{}:uin/:{}/{}",
        service, region, resource_type, id
    )
}

/// Split a tag change into keys to write and keys to remove. The two sets
/// never overlap.
pub fn diff_tags(
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> (HashMap<String, String>, Vec<String>) {
    let replace = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut delete: Vec<String> = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();
    delete.sort();
    (replace, delete)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub tag_key: String,
    #[serde(default)]
    pub tag_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TagKeyObject {
    tag_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyResourceTagsRequest<'a> {
    resource: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    replace_tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delete_tags: Vec<TagKeyObject>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResourceTagsByResourceIdsRequest<'a> {
    service_type: &'a str,
    resource_prefix: &'a str,
    resource_ids: Vec<&'a str>,
    resource_region: &'a str,
    offset: u64,
    limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceTag {
    tag_key: String,
    #[serde(default)]
    tag_value: String,
    #[serde(default)]
    resource_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResourceTagsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    tags: Vec<ResourceTag>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TagPairRequest<'a> {
    tag_key: &'a str,
    tag_value: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTagsRequest<'a> {
    tag_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_value: Option<&'a str>,
    offset: u64,
    limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTagsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Empty {}

pub struct TagService<'a> {
    client: &'a Client,
}

impl<'a> TagService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Apply a diff produced by [`diff_tags`]; no call when both sides are empty
    pub async fn modify_tags(
        &self,
        ctx: &Context,
        resource_name: &str,
        replace: &HashMap<String, String>,
        delete: &[String],
    ) -> Result<(), ApiError> {
        if replace.is_empty() && delete.is_empty() {
            return Ok(());
        }

        // sorted so the request body is deterministic
        let replace: BTreeMap<_, _> = replace.iter().collect();
        let request = ModifyResourceTagsRequest {
            resource: resource_name,
            replace_tags: replace
                .into_iter()
                .map(|(k, v)| Tag {
                    tag_key: k.clone(),
                    tag_value: v.clone(),
                })
                .collect(),
            delete_tags: delete
                .iter()
                .map(|k| TagKeyObject { tag_key: k.clone() })
                .collect(),
        };

        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TAG, "ModifyResourceTags", &request)
            .await?;
        Ok(())
    }

    pub async fn describe_resource_tags(
        &self,
        ctx: &Context,
        service: &str,
        resource_type: &str,
        region: &str,
        id: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        let mut tags = HashMap::new();
        let mut offset = 0;

        loop {
            let request = DescribeResourceTagsByResourceIdsRequest {
                service_type: service,
                resource_prefix: resource_type,
                resource_ids: vec![id],
                resource_region: region,
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeResourceTagsResponse = self
                .client
                .call_with_retry(
                    ctx,
                    OperationClass::Read,
                    TAG,
                    "DescribeResourceTagsByResourceIds",
                    &request,
                )
                .await?;

            let page_len = response.tags.len() as u64;
            for tag in response.tags {
                if tag.resource_id.is_empty() || tag.resource_id == id {
                    tags.insert(tag.tag_key, tag.tag_value);
                }
            }

            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                break;
            }
        }

        Ok(tags)
    }

    pub async fn create_tag(&self, ctx: &Context, key: &str, value: &str) -> Result<(), ApiError> {
        let request = TagPairRequest {
            tag_key: key,
            tag_value: value,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TAG, "CreateTag", &request)
            .await?;
        Ok(())
    }

    /// The tag with exactly this key and value, if it exists
    pub async fn describe_tag(
        &self,
        ctx: &Context,
        key: &str,
        value: &str,
    ) -> Result<Option<Tag>, ApiError> {
        let mut offset = 0;
        loop {
            let request = DescribeTagsRequest {
                tag_key: key,
                tag_value: Some(value),
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeTagsResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, TAG, "DescribeTags", &request)
                .await?;

            let page_len = response.tags.len() as u64;
            if let Some(tag) = response
                .tags
                .into_iter()
                .find(|t| t.tag_key == key && t.tag_value == value)
            {
                return Ok(Some(tag));
            }

            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                return Ok(None);
            }
        }
    }

    pub async fn delete_tag(&self, ctx: &Context, key: &str, value: &str) -> Result<(), ApiError> {
        let request = TagPairRequest {
            tag_key: key,
            tag_value: value,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, TAG, "DeleteTag", &request)
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
    use std::collections::HashSet;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resource_name_layout() {
        assert_eq!(
            build_resource_name("clb", "clb", "ap-guangzhou", "lb-123"),
            "qcs::clb:ap-guangzhou:uin/:clb/lb-123"
        );
    }

    #[test]
    fn diff_tags_partitions_changes() {
        let old = map(&[("env", "dev"), ("team", "infra"), ("keep", "1")]);
        let new = map(&[("env", "prod"), ("owner", "ops"), ("keep", "1")]);

        let (replace, delete) = diff_tags(&old, &new);

        assert_eq!(replace, map(&[("env", "prod"), ("owner", "ops")]));
        assert_eq!(delete, vec!["team".to_string()]);

        let replaced: HashSet<_> = replace.keys().collect();
        assert!(delete.iter().all(|k| !replaced.contains(k)));
    }

    #[test]
    fn diff_tags_of_equal_maps_is_empty() {
        let tags = map(&[("env", "dev")]);
        let (replace, delete) = diff_tags(&tags, &tags);
        assert!(replace.is_empty());
        assert!(delete.is_empty());

        let (replace, delete) = diff_tags(&tags, &HashMap::new());
        assert!(replace.is_empty());
        assert_eq!(delete, vec!["env".to_string()]);
    }

    #[tokio::test]
    async fn modify_tags_skips_empty_diff() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;

        let client = create_test_client(&server.url());
        client
            .tag()
            .modify_tags(&Context::new(), "qcs::clb:ap-guangzhou:uin/:clb/lb-1", &HashMap::new(), &[])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn modify_tags_sends_replace_and_delete() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "ModifyResourceTags")
            .match_body(Matcher::Json(serde_json::json!({
                "Resource": "qcs::clb:ap-guangzhou:uin/:clb/lb-1",
                "ReplaceTags": [{"TagKey": "env", "TagValue": "prod"}],
                "DeleteTags": [{"TagKey": "team"}]
            })))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client
            .tag()
            .modify_tags(
                &Context::new(),
                "qcs::clb:ap-guangzhou:uin/:clb/lb-1",
                &map(&[("env", "prod")]),
                &["team".to_string()],
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn describe_resource_tags_collects_pairs() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeResourceTagsByResourceIds")
            .with_body(
                r#"{"Response":{"TotalCount":2,"Tags":[
                    {"TagKey":"env","TagValue":"prod","ResourceId":"lb-1"},
                    {"TagKey":"team","TagValue":"infra","ResourceId":"lb-1"}
                ],"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let tags = client
            .tag()
            .describe_resource_tags(&Context::new(), "clb", "clb", "ap-guangzhou", "lb-1")
            .await
            .unwrap();
        assert_eq!(tags, map(&[("env", "prod"), ("team", "infra")]));
    }

    #[tokio::test]
    async fn describe_tag_matches_exact_pair() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTags")
            .with_body(
                r#"{"Response":{"TotalCount":1,"Tags":[{"TagKey":"env","TagValue":"prod"}],"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let found = client.tag().describe_tag(&Context::new(), "env", "prod").await.unwrap();
        assert_eq!(found.map(|t| t.tag_value), Some("prod".to_string()));

        let missing = client.tag().describe_tag(&Context::new(), "env", "dev").await.unwrap();
        assert!(missing.is_none());
    }
}

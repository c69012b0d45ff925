//! Cloud Load Balancer API (2018-03-17)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tfplug::Context;

use super::client::{Client, Product};
use super::error::ApiError;
use super::ids::{ListenerId, ListenerRuleId, RedirectionId};
use super::retry::OperationClass;
use super::state_change::StateChangeConf;

pub const CLB: Product = Product {
    service: "clb",
    version: "2018-03-17",
};

const PAGE_SIZE: u64 = 100;
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

const TASK_SUCCESS: &str = "0";
const TASK_FAILED: i64 = 1;
const TASK_RUNNING: &str = "2";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TagInfo {
    pub tag_key: String,
    #[serde(default)]
    pub tag_value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TargetRegionInfo {
    pub region: String,
    pub vpc_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadBalancer {
    pub load_balancer_id: String,
    pub load_balancer_name: String,
    pub load_balancer_type: String,
    pub forward: i64,
    #[serde(deserialize_with = "super::null_default")]
    pub load_balancer_vips: Vec<String>,
    pub status: i64,
    pub vpc_id: String,
    pub subnet_id: String,
    pub project_id: i64,
    #[serde(deserialize_with = "super::null_default")]
    pub secure_groups: Vec<String>,
    #[serde(deserialize_with = "super::null_default")]
    pub tags: Vec<TagInfo>,
    pub target_region_info: Option<TargetRegionInfo>,
    pub address_ip_version: String,
    pub create_time: String,
}

/// Filters for [`ClbService::describe_load_balancers`]
#[derive(Debug, Clone, Default)]
pub struct LoadBalancerFilter {
    pub ids: Vec<String>,
    pub name: Option<String>,
    pub network_type: Option<String>,
    pub project_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeLoadBalancersRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancer_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancer_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancer_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    /// Only layer-7 balancers; classic CLBs are out of scope
    forward: i64,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeLoadBalancersResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    load_balancer_set: Vec<LoadBalancer>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLoadBalancerRequest {
    pub load_balancer_type: String,
    pub forward: i64,
    pub load_balancer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateLoadBalancerResponse {
    #[serde(default)]
    load_balancer_ids: Vec<String>,
    request_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyLoadBalancerAttributesRequest {
    pub load_balancer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_region_info: Option<TargetRegionInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SetLoadBalancerSecurityGroupsRequest<'a> {
    load_balancer_id: &'a str,
    security_groups: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteLoadBalancerRequest<'a> {
    load_balancer_ids: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTaskStatusRequest<'a> {
    task_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTaskStatusResponse {
    status: i64,
}

/// Response of any call that only starts an async task
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskResponse {
    request_id: String,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthCheck {
    pub health_switch: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_out: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_num: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub un_health_num: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_check_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_check_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_check_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Certificate {
    #[serde(rename = "SSLMode", default)]
    pub ssl_mode: String,
    #[serde(rename = "CertId", default)]
    pub cert_id: String,
    #[serde(rename = "CertCaId", default, skip_serializing_if = "String::is_empty")]
    pub cert_ca_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuleOutput {
    pub location_id: String,
    pub domain: String,
    pub url: String,
    pub session_expire_time: i64,
    pub health_check: Option<HealthCheck>,
    pub certificate: Option<Certificate>,
    pub scheduler: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Listener {
    pub listener_id: String,
    pub protocol: String,
    pub port: i64,
    pub listener_name: String,
    pub certificate: Option<Certificate>,
    pub health_check: Option<HealthCheck>,
    pub scheduler: String,
    pub session_expire_time: i64,
    #[serde(deserialize_with = "super::null_default")]
    pub rules: Vec<RuleOutput>,
    pub create_time: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeListenersRequest<'a> {
    load_balancer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    listener_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeListenersResponse {
    #[serde(default)]
    listeners: Vec<Listener>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateListenerRequest {
    pub load_balancer_id: String,
    pub ports: Vec<i64>,
    pub protocol: String,
    pub listener_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expire_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateListenerResponse {
    #[serde(default)]
    listener_ids: Vec<String>,
    request_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyListenerRequest {
    pub load_balancer_id: String,
    pub listener_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expire_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
}

impl ModifyListenerRequest {
    pub fn is_empty(&self) -> bool {
        self.listener_name.is_none()
            && self.session_expire_time.is_none()
            && self.health_check.is_none()
            && self.certificate.is_none()
            && self.scheduler.is_none()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteListenerRequest<'a> {
    load_balancer_id: &'a str,
    listener_id: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleInput {
    pub domain: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expire_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateRuleRequest<'a> {
    load_balancer_id: &'a str,
    listener_id: &'a str,
    rules: [&'a RuleInput; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateRuleResponse {
    #[serde(default)]
    location_ids: Vec<String>,
    request_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyRuleRequest {
    pub load_balancer_id: String,
    pub listener_id: String,
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expire_time: Option<i64>,
}

impl ModifyRuleRequest {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.health_check.is_none()
            && self.scheduler.is_none()
            && self.session_expire_time.is_none()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteRuleRequest<'a> {
    load_balancer_id: &'a str,
    listener_id: &'a str,
    location_ids: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RewriteLocationMap<'a> {
    source_location_id: &'a str,
    target_location_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RewriteRequest<'a> {
    load_balancer_id: &'a str,
    source_listener_id: &'a str,
    target_listener_id: &'a str,
    rewrite_infos: [RewriteLocationMap<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRewriteRequest<'a> {
    load_balancer_id: &'a str,
    source_listener_ids: [&'a str; 1],
    source_location_ids: [&'a str; 1],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RewriteTarget {
    target_listener_id: String,
    target_location_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RewriteRule {
    location_id: String,
    rewrite_target: Option<RewriteTarget>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRewriteResponse {
    #[serde(default)]
    rewrite_set: Vec<RewriteRule>,
}

pub struct ClbService<'a> {
    client: &'a Client,
}

impl<'a> ClbService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Wait for an async CLB task. The task id is the request id of the call
    /// that started it.
    pub async fn wait_for_task(&self, ctx: &Context, task_id: &str) -> Result<(), ApiError> {
        let client = self.client;
        StateChangeConf::new(
            &[TASK_RUNNING],
            &[TASK_SUCCESS],
            client.policy(OperationClass::Write).timeout,
        )
        .with_poll_interval(TASK_POLL_INTERVAL)
        .wait_for_state(ctx, || async move {
            let response: DescribeTaskStatusResponse = client
                .call(CLB, "DescribeTaskStatus", &DescribeTaskStatusRequest { task_id })
                .await?;
            if response.status == TASK_FAILED {
                return Err(ApiError::TaskFailed(format!("clb task {} failed", task_id)));
            }
            Ok(Some(((), response.status.to_string())))
        })
        .await
    }

    async fn write_task<Req: Serialize + Sync>(
        &self,
        ctx: &Context,
        action: &str,
        request: &Req,
    ) -> Result<(), ApiError> {
        let response: TaskResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CLB, action, request)
            .await?;
        self.wait_for_task(ctx, &response.request_id).await
    }

    pub async fn describe_load_balancers(
        &self,
        ctx: &Context,
        filter: &LoadBalancerFilter,
    ) -> Result<Vec<LoadBalancer>, ApiError> {
        let mut result = Vec::new();
        let mut offset = 0;

        loop {
            let request = DescribeLoadBalancersRequest {
                load_balancer_ids: (!filter.ids.is_empty()).then_some(filter.ids.as_slice()),
                load_balancer_name: filter.name.as_deref(),
                load_balancer_type: filter.network_type.as_deref(),
                project_id: filter.project_id,
                forward: 1,
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeLoadBalancersResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, CLB, "DescribeLoadBalancers", &request)
                .await?;

            let page_len = response.load_balancer_set.len() as u64;
            result.extend(response.load_balancer_set);
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                break;
            }
        }

        Ok(result)
    }

    pub async fn describe_load_balancer_by_id(
        &self,
        ctx: &Context,
        clb_id: &str,
    ) -> Result<Option<LoadBalancer>, ApiError> {
        let filter = LoadBalancerFilter {
            ids: vec![clb_id.to_string()],
            ..Default::default()
        };
        match self.describe_load_balancers(ctx, &filter).await {
            Ok(list) => Ok(list.into_iter().find(|lb| lb.load_balancer_id == clb_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates the load balancer and waits for the create task
    pub async fn create_load_balancer(
        &self,
        ctx: &Context,
        request: &CreateLoadBalancerRequest,
    ) -> Result<String, ApiError> {
        let response: CreateLoadBalancerResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CLB, "CreateLoadBalancer", request)
            .await?;
        let id = response
            .load_balancer_ids
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Parse("CreateLoadBalancer returned no id".to_string()))?;
        self.wait_for_task(ctx, &response.request_id).await?;
        Ok(id)
    }

    pub async fn modify_load_balancer_attributes(
        &self,
        ctx: &Context,
        request: &ModifyLoadBalancerAttributesRequest,
    ) -> Result<(), ApiError> {
        self.write_task(ctx, "ModifyLoadBalancerAttributes", request)
            .await
    }

    pub async fn set_security_groups(
        &self,
        ctx: &Context,
        clb_id: &str,
        security_groups: &[String],
    ) -> Result<(), ApiError> {
        let request = SetLoadBalancerSecurityGroupsRequest {
            load_balancer_id: clb_id,
            security_groups,
        };
        let _: Empty = self
            .client
            .call_with_retry(
                ctx,
                OperationClass::Write,
                CLB,
                "SetLoadBalancerSecurityGroups",
                &request,
            )
            .await?;
        Ok(())
    }

    pub async fn delete_load_balancer(&self, ctx: &Context, clb_id: &str) -> Result<(), ApiError> {
        let request = DeleteLoadBalancerRequest {
            load_balancer_ids: [clb_id],
        };
        self.write_task(ctx, "DeleteLoadBalancer", &request).await
    }

    pub async fn describe_listeners(
        &self,
        ctx: &Context,
        clb_id: &str,
        listener_ids: &[String],
        protocol: Option<&str>,
        port: Option<i64>,
    ) -> Result<Vec<Listener>, ApiError> {
        let request = DescribeListenersRequest {
            load_balancer_id: clb_id,
            listener_ids: (!listener_ids.is_empty()).then_some(listener_ids),
            protocol,
            port,
        };
        let response: DescribeListenersResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Read, CLB, "DescribeListeners", &request)
            .await?;
        Ok(response.listeners)
    }

    pub async fn describe_listener_by_id(
        &self,
        ctx: &Context,
        id: &ListenerId,
    ) -> Result<Option<Listener>, ApiError> {
        let ids = [id.listener_id.clone()];
        match self.describe_listeners(ctx, &id.clb_id, &ids, None, None).await {
            Ok(listeners) => Ok(listeners
                .into_iter()
                .find(|l| l.listener_id == id.listener_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_listener(
        &self,
        ctx: &Context,
        request: &CreateListenerRequest,
    ) -> Result<String, ApiError> {
        let response: CreateListenerResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CLB, "CreateListener", request)
            .await?;
        let id = response
            .listener_ids
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Parse("CreateListener returned no id".to_string()))?;
        self.wait_for_task(ctx, &response.request_id).await?;
        Ok(id)
    }

    pub async fn modify_listener(
        &self,
        ctx: &Context,
        request: &ModifyListenerRequest,
    ) -> Result<(), ApiError> {
        self.write_task(ctx, "ModifyListener", request).await
    }

    pub async fn delete_listener(&self, ctx: &Context, id: &ListenerId) -> Result<(), ApiError> {
        let request = DeleteListenerRequest {
            load_balancer_id: &id.clb_id,
            listener_id: &id.listener_id,
        };
        self.write_task(ctx, "DeleteListener", &request).await
    }

    /// Rules are only listed as part of their listener
    pub async fn describe_rule_by_id(
        &self,
        ctx: &Context,
        id: &ListenerRuleId,
    ) -> Result<Option<RuleOutput>, ApiError> {
        let listener_id = ListenerId {
            clb_id: id.clb_id.clone(),
            listener_id: id.listener_id.clone(),
        };
        let listener = match self.describe_listener_by_id(ctx, &listener_id).await? {
            Some(listener) => listener,
            None => return Ok(None),
        };
        Ok(listener
            .rules
            .into_iter()
            .find(|r| r.location_id == id.location_id))
    }

    pub async fn create_rule(
        &self,
        ctx: &Context,
        clb_id: &str,
        listener_id: &str,
        rule: &RuleInput,
    ) -> Result<String, ApiError> {
        let request = CreateRuleRequest {
            load_balancer_id: clb_id,
            listener_id,
            rules: [rule],
        };
        let response: CreateRuleResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, CLB, "CreateRule", &request)
            .await?;
        let location_id = response
            .location_ids
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Parse("CreateRule returned no location id".to_string()))?;
        self.wait_for_task(ctx, &response.request_id).await?;
        Ok(location_id)
    }

    pub async fn modify_rule(&self, ctx: &Context, request: &ModifyRuleRequest) -> Result<(), ApiError> {
        self.write_task(ctx, "ModifyRule", request).await
    }

    pub async fn delete_rule(&self, ctx: &Context, id: &ListenerRuleId) -> Result<(), ApiError> {
        let request = DeleteRuleRequest {
            load_balancer_id: &id.clb_id,
            listener_id: &id.listener_id,
            location_ids: [&id.location_id],
        };
        self.write_task(ctx, "DeleteRule", &request).await
    }

    fn rewrite_request(id: &RedirectionId) -> RewriteRequest<'_> {
        RewriteRequest {
            load_balancer_id: &id.clb_id,
            source_listener_id: &id.source_listener_id,
            target_listener_id: &id.target_listener_id,
            rewrite_infos: [RewriteLocationMap {
                source_location_id: &id.source_location_id,
                target_location_id: &id.target_location_id,
            }],
        }
    }

    pub async fn create_redirection(&self, ctx: &Context, id: &RedirectionId) -> Result<(), ApiError> {
        self.write_task(ctx, "ManualRewrite", &Self::rewrite_request(id))
            .await
    }

    /// True when the source rule still redirects to the recorded target
    pub async fn describe_redirection(
        &self,
        ctx: &Context,
        id: &RedirectionId,
    ) -> Result<bool, ApiError> {
        let request = DescribeRewriteRequest {
            load_balancer_id: &id.clb_id,
            source_listener_ids: [&id.source_listener_id],
            source_location_ids: [&id.source_location_id],
        };
        let response: DescribeRewriteResponse = match self
            .client
            .call_with_retry(ctx, OperationClass::Read, CLB, "DescribeRewrite", &request)
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        Ok(response.rewrite_set.iter().any(|rule| {
            rule.location_id == id.source_location_id
                && rule.rewrite_target.as_ref().is_some_and(|t| {
                    t.target_listener_id == id.target_listener_id
                        && t.target_location_id == id.target_location_id
                })
        }))
    }

    pub async fn delete_redirection(&self, ctx: &Context, id: &RedirectionId) -> Result<(), ApiError> {
        self.write_task(ctx, "DeleteRewrite", &Self::rewrite_request(id))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Matcher;

    async fn mock_task_success(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTaskStatus")
            .with_body(r#"{"Response":{"Status":0,"RequestId":"poll"}}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn create_load_balancer_waits_for_task() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_header("x-tc-action", "CreateLoadBalancer")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "LoadBalancerType": "OPEN",
                "LoadBalancerName": "tf-clb",
                "Forward": 1
            })))
            .with_body(r#"{"Response":{"LoadBalancerIds":["lb-123"],"RequestId":"task-1"}}"#)
            .create_async()
            .await;
        let task = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTaskStatus")
            .match_body(Matcher::Json(serde_json::json!({"TaskId": "task-1"})))
            .with_body(r#"{"Response":{"Status":0,"RequestId":"poll"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let id = client
            .clb()
            .create_load_balancer(
                &Context::new(),
                &CreateLoadBalancerRequest {
                    load_balancer_type: "OPEN".into(),
                    forward: 1,
                    load_balancer_name: "tf-clb".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(id, "lb-123");
        create.assert_async().await;
        task.assert_async().await;
    }

    #[tokio::test]
    async fn failed_task_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _task = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTaskStatus")
            .with_body(r#"{"Response":{"Status":1,"RequestId":"poll"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result = client.clb().wait_for_task(&Context::new(), "task-9").await;
        assert!(matches!(result, Err(ApiError::TaskFailed(_))));
    }

    #[tokio::test]
    async fn describe_by_id_maps_not_found_to_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeLoadBalancers")
            .with_body(r#"{"Response":{"TotalCount":0,"LoadBalancerSet":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let found = client
            .clb()
            .describe_load_balancer_by_id(&Context::new(), "lb-gone")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn describe_load_balancers_paginates() {
        let mut server = mockito::Server::new_async().await;
        let page: Vec<serde_json::Value> = (0..100)
            .map(|i| serde_json::json!({"LoadBalancerId": format!("lb-{}", i)}))
            .collect();
        let first = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(serde_json::json!({"Offset": 0, "Limit": 100})))
            .with_body(
                serde_json::json!({"Response": {"TotalCount": 101, "LoadBalancerSet": page, "RequestId": "r1"}})
                    .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(serde_json::json!({"Offset": 100})))
            .with_body(
                r#"{"Response":{"TotalCount":101,"LoadBalancerSet":[{"LoadBalancerId":"lb-last"}],"RequestId":"r2"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let all = client
            .clb()
            .describe_load_balancers(&Context::new(), &LoadBalancerFilter::default())
            .await
            .unwrap();

        assert_eq!(all.len(), 101);
        assert_eq!(all[100].load_balancer_id, "lb-last");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn rule_is_found_through_its_listener() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeListeners")
            .with_body(
                r#"{"Response":{"Listeners":[{"ListenerId":"lbl-1","Protocol":"HTTP","Port":80,
                    "Rules":[{"LocationId":"loc-1","Domain":"a.com","Url":"/"}]}],"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let clb = client.clb();
        let ctx = Context::new();

        let rule = clb
            .describe_rule_by_id(&ctx, &ListenerRuleId::parse("lb-1#lbl-1#loc-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rule.domain, "a.com");

        let missing = clb
            .describe_rule_by_id(&ctx, &ListenerRuleId::parse("lb-1#lbl-1#loc-2").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn redirection_matches_target() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeRewrite")
            .with_body(
                r#"{"Response":{"RewriteSet":[{"LocationId":"loc-src",
                    "RewriteTarget":{"TargetListenerId":"lbl-dst","TargetLocationId":"loc-dst"}}],"RequestId":"r"}}"#,
            )
            .create_async()
            .await;
        let _task = mock_task_success(&mut server).await;

        let client = create_test_client(&server.url());
        let id = RedirectionId::parse("lb-1#lbl-src#loc-src#lbl-dst#loc-dst").unwrap();
        assert!(client.clb().describe_redirection(&Context::new(), &id).await.unwrap());

        let other = RedirectionId::parse("lb-1#lbl-src#loc-src#lbl-dst#loc-other").unwrap();
        assert!(!client.clb().describe_redirection(&Context::new(), &other).await.unwrap());
    }
}

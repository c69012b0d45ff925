//! CDN acceleration domain

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::schema::AttributeType;
use tfplug::validator::StringOneOfValidator;
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed, set_tags, state_tags, sync_tags, TagTarget};
use crate::api::cdn::{
    AddCdnDomainRequest, CdnTag, DomainConfig, Origin, UpdateDomainConfigRequest,
    STATUS_OFFLINE, STATUS_ONLINE, STATUS_PROCESSING,
};
use crate::api::retry::OperationClass;
use crate::api::state_change::StateChangeConf;
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_cdn_domain";
const TAGS: TagTarget = TagTarget {
    service: "cdn",
    resource_type: "domain",
};
const SERVICE_TYPES: &[&str] = &["web", "download", "media"];
const AREAS: &[&str] = &["mainland", "overseas", "global"];
const ORIGIN_TYPES: &[&str] = &["domain", "cos", "ip", "ipv6", "ip_ipv6"];
const PULL_PROTOCOLS: &[&str] = &["http", "https", "follow"];

const ORIGIN_ATTRIBUTES: &[&str] = &[
    "origin_list",
    "origin_type",
    "server_name",
    "origin_pull_protocol",
    "backup_origin_list",
    "backup_origin_type",
];

pub struct CdnDomainResource {
    provider_data: TencentCloudProviderData,
}

impl CdnDomainResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a CDN acceleration domain")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("The acceleration domain"),
            )
            .attribute(
                "domain",
                AttributeBuilder::string("domain")
                    .required()
                    .force_new()
                    .description("Name of the acceleration domain"),
            )
            .attribute(
                "service_type",
                AttributeBuilder::string("service_type")
                    .required()
                    .validator(StringOneOfValidator::new(SERVICE_TYPES))
                    .description("Service type: web, download or media"),
            )
            .attribute(
                "area",
                AttributeBuilder::string("area")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::new(AREAS))
                    .description("Acceleration region: mainland, overseas or global"),
            )
            .attribute(
                "project_id",
                AttributeBuilder::number("project_id")
                    .optional()
                    .computed()
                    .description("Project the domain belongs to"),
            )
            .attribute(
                "origin_list",
                AttributeBuilder::list("origin_list", AttributeType::String)
                    .required()
                    .description("Master origin servers"),
            )
            .attribute(
                "origin_type",
                AttributeBuilder::string("origin_type")
                    .required()
                    .validator(StringOneOfValidator::new(ORIGIN_TYPES))
                    .description("Type of the master origin"),
            )
            .attribute(
                "server_name",
                AttributeBuilder::string("server_name")
                    .optional()
                    .computed()
                    .description("Host header sent when pulling from the origin"),
            )
            .attribute(
                "origin_pull_protocol",
                AttributeBuilder::string("origin_pull_protocol")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::new(PULL_PROTOCOLS))
                    .description("Protocol used to pull from the origin: http, https or follow"),
            )
            .attribute(
                "backup_origin_list",
                AttributeBuilder::list("backup_origin_list", AttributeType::String)
                    .optional()
                    .description("Backup origin servers"),
            )
            .attribute(
                "backup_origin_type",
                AttributeBuilder::string("backup_origin_type")
                    .optional()
                    .description("Type of the backup origin"),
            )
            .attribute(
                "tags",
                AttributeBuilder::map("tags", AttributeType::String).optional(),
            )
            .attribute(
                "cname",
                AttributeBuilder::string("cname")
                    .computed()
                    .use_state_for_unknown()
                    .description("CNAME to point the domain at"),
            )
            .attribute(
                "status",
                AttributeBuilder::string("status")
                    .computed()
                    .description("online, offline or processing"),
            )
            .attribute(
                "create_time",
                AttributeBuilder::string("create_time")
                    .computed()
                    .use_state_for_unknown(),
            )
            .build_resource(0)
    }

    async fn wait_for_status(
        &self,
        ctx: &Context,
        domain: &str,
        pending: &[&str],
        target: &[&str],
    ) -> Result<(), ApiError> {
        let client = &self.provider_data.client;
        StateChangeConf::new(pending, target, client.policy(OperationClass::Write).timeout)
            .wait_for_state(ctx, || async move {
                let config = client.cdn().describe_domain_by_name(ctx, domain).await?;
                Ok(config.map(|c| ((), c.status)))
            })
            .await
    }

    async fn read_state(
        &self,
        ctx: &Context,
        domain: &str,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let config = match self
            .provider_data
            .client
            .cdn()
            .describe_domain_by_name(ctx, domain)
            .await?
        {
            Some(config) => config,
            None => return Ok(None),
        };
        flatten_domain(&config, &mut state);
        Ok(Some(state))
    }
}

fn origin(planned: &State) -> Origin {
    Origin {
        origins: planned.get_string_list("origin_list").unwrap_or_default(),
        origin_type: planned.get_string("origin_type").unwrap_or_default(),
        server_name: planned.get_string("server_name"),
        origin_pull_protocol: planned.get_string("origin_pull_protocol"),
        backup_origins: planned.get_string_list("backup_origin_list").unwrap_or_default(),
        backup_origin_type: planned.get_string("backup_origin_type"),
    }
}

fn flatten_domain(config: &DomainConfig, state: &mut State) {
    state.set_string("id", config.domain.clone());
    state.set_string("domain", config.domain.clone());
    state.set_string("service_type", config.service_type.clone());
    state.set_string("area", config.area.clone());
    state.set_i64("project_id", config.project_id);
    state.set_string("cname", config.cname.clone());
    state.set_string("status", config.status.clone());
    state.set_string("create_time", config.create_time.clone());

    let origin = &config.origin;
    state.set_string_list("origin_list", origin.origins.iter().cloned());
    state.set_string("origin_type", origin.origin_type.clone());
    match &origin.server_name {
        Some(name) => state.set_string("server_name", name.clone()),
        None => state.set_null("server_name"),
    }
    match &origin.origin_pull_protocol {
        Some(protocol) => state.set_string("origin_pull_protocol", protocol.clone()),
        None => state.set_null("origin_pull_protocol"),
    }
    if origin.backup_origins.is_empty() {
        state.set_null("backup_origin_list");
    } else {
        state.set_string_list("backup_origin_list", origin.backup_origins.iter().cloned());
    }
    match &origin.backup_origin_type {
        Some(kind) if !kind.is_empty() => state.set_string("backup_origin_type", kind.clone()),
        _ => state.set_null("backup_origin_type"),
    }

    let tags: HashMap<String, String> = config
        .tag
        .iter()
        .map(|t| (t.tag_key.clone(), t.tag_value.clone()))
        .collect();
    set_tags(state, tags);
}

#[async_trait]
impl Resource for CdnDomainResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let mut state = request.planned_state;

        let domain = state.get_string("domain").unwrap_or_default();
        let add = AddCdnDomainRequest {
            domain: domain.clone(),
            service_type: state.get_string("service_type").unwrap_or_default(),
            origin: origin(&state),
            project_id: state.get_i64("project_id"),
            area: state.get_string("area"),
            tag: state_tags(&state)
                .into_iter()
                .map(|(tag_key, tag_value)| CdnTag { tag_key, tag_value })
                .collect(),
        };

        if let Err(e) = self.provider_data.client.cdn().add_domain(ctx, &add).await {
            api_error(&mut diags, "Failed to add CDN domain", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }
        tracing::info!("[{}.create] added domain {}", TYPE_NAME, domain);
        state.set_string("id", domain.clone());

        if let Err(e) = self
            .wait_for_status(ctx, &domain, &[STATUS_PROCESSING], &[STATUS_ONLINE])
            .await
        {
            api_error(&mut diags, "CDN domain did not come online", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }

        match self.read_state(ctx, &domain, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("CDN domain not found after creation", Some(domain));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CDN domain", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let domain = request.current_state.get_string("id").unwrap_or_default();

        match self
            .read_state(&request.context, &domain, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResponse {
                state: Some(state),
                diagnostics: diags,
            },
            Ok(None) => {
                tracing::warn!("[{}.read] domain {} not found, removing from state", TYPE_NAME, domain);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CDN domain", e);
                ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                }
            }
        }
    }

    async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let planned = request.planned_state;
        let prior = request.current_state;
        let client = &self.provider_data.client;
        let domain = prior.get_string("id").unwrap_or_default();

        let origin_changed = ORIGIN_ATTRIBUTES
            .iter()
            .any(|attribute| changed(&planned, &prior, attribute));
        let update = UpdateDomainConfigRequest {
            domain: domain.clone(),
            project_id: changed(&planned, &prior, "project_id")
                .then(|| planned.get_i64("project_id"))
                .flatten(),
            origin: origin_changed.then(|| origin(&planned)),
            area: changed(&planned, &prior, "area")
                .then(|| planned.get_string("area"))
                .flatten(),
            service_type: changed(&planned, &prior, "service_type")
                .then(|| planned.get_string("service_type"))
                .flatten(),
        };

        if !update.is_empty() {
            let result = match client.cdn().update_domain_config(ctx, &update).await {
                // a stopped domain stays offline after the change is applied
                Ok(()) => {
                    self.wait_for_status(
                        ctx,
                        &domain,
                        &[STATUS_PROCESSING],
                        &[STATUS_ONLINE, STATUS_OFFLINE],
                    )
                    .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                api_error(&mut diags, "Failed to update CDN domain", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        if changed(&planned, &prior, "tags") {
            if let Err(e) = sync_tags(
                client,
                ctx,
                TAGS,
                &domain,
                &state_tags(&prior),
                &state_tags(&planned),
            )
            .await
            {
                api_error(&mut diags, "Failed to modify CDN domain tags", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &domain, planned.clone()).await {
            Ok(Some(state)) => UpdateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("CDN domain not found after update", Some(domain));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CDN domain", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    /// Domains must be offline before the API accepts a delete
    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let cdn = self.provider_data.client.cdn();
        let domain = request.current_state.get_string("id").unwrap_or_default();

        let result: Result<(), ApiError> = async {
            let config = match cdn.describe_domain_by_name(ctx, &domain).await? {
                Some(config) => config,
                None => return Ok(()),
            };
            if config.status != STATUS_OFFLINE {
                cdn.stop_domain(ctx, &domain).await?;
                self.wait_for_status(
                    ctx,
                    &domain,
                    &[STATUS_ONLINE, STATUS_PROCESSING],
                    &[STATUS_OFFLINE],
                )
                .await?;
            }
            cdn.delete_domain(ctx, &domain).await
        }
        .await;

        match result {
            Ok(()) => tracing::info!("[{}.delete] deleted domain {}", TYPE_NAME, domain),
            Err(e) if e.is_not_found() => {}
            Err(e) => api_error(&mut diags, "Failed to delete CDN domain", e),
        }
        DeleteResponse { diagnostics: diags }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::resources::test_support::provider_data;
    use mockito::Matcher;

    fn domain_body(status: &str) -> String {
        serde_json::json!({
            "Response": {
                "TotalNumber": 1,
                "Domains": [{
                    "ResourceId": "cdn-1",
                    "Domain": "www.example.com",
                    "Cname": "www.example.com.cdn.dnsv1.com",
                    "Status": status,
                    "ProjectId": 0,
                    "ServiceType": "web",
                    "Area": "mainland",
                    "CreateTime": "2024-01-01 00:00:00",
                    "Origin": {
                        "Origins": ["origin.example.com"],
                        "OriginType": "domain",
                        "OriginPullProtocol": "http"
                    },
                    "Tag": [{"TagKey": "env", "TagValue": "dev"}]
                }]
            }
        })
        .to_string()
    }

    fn planned() -> State {
        let mut state = State::new();
        state.set("id", tfplug::Dynamic::Unknown);
        state.set_string("domain", "www.example.com");
        state.set_string("service_type", "web");
        state.set_string_list("origin_list", ["origin.example.com"]);
        state.set_string("origin_type", "domain");
        state.set_string_map("tags", [("env", "dev")]);
        state
    }

    #[tokio::test]
    async fn create_waits_until_online() {
        let mut server = mockito::Server::new_async().await;
        let add = server
            .mock("POST", "/")
            .match_header("x-tc-action", "AddCdnDomain")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Domain": "www.example.com",
                "ServiceType": "web",
                "Origin": {"Origins": ["origin.example.com"], "OriginType": "domain"},
                "Tag": [{"TagKey": "env", "TagValue": "dev"}]
            })))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;
        let describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeDomainsConfig")
            .with_body(domain_body("online"))
            .expect_at_least(2)
            .create_async()
            .await;

        let resource = CdnDomainResource::new(provider_data(&server.url()));
        let response = resource
            .create(CreateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned(),
            })
            .await;

        assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
        let state = response.state;
        assert_eq!(state.get_string("id").as_deref(), Some("www.example.com"));
        assert_eq!(
            state.get_string("cname").as_deref(),
            Some("www.example.com.cdn.dnsv1.com")
        );
        assert_eq!(state.get_string("area").as_deref(), Some("mainland"));
        assert_eq!(state.get_string("origin_pull_protocol").as_deref(), Some("http"));
        assert_eq!(
            state.get_string_map("tags"),
            Some(HashMap::from([("env".to_string(), "dev".to_string())]))
        );
        add.assert_async().await;
        describe.assert_async().await;
    }

    #[tokio::test]
    async fn delete_of_offline_domain_skips_stop() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeDomainsConfig")
            .with_body(domain_body("offline"))
            .create_async()
            .await;
        let stop = server
            .mock("POST", "/")
            .match_header("x-tc-action", "StopCdnDomain")
            .expect(0)
            .create_async()
            .await;
        let delete = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DeleteCdnDomain")
            .match_body(Matcher::Json(serde_json::json!({"Domain": "www.example.com"})))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;

        let mut current = planned();
        current.set_string("id", "www.example.com");

        let resource = CdnDomainResource::new(provider_data(&server.url()));
        let response = resource
            .delete(DeleteRequest {
                context: Context::new(),
                current_state: current,
            })
            .await;

        assert!(!response.diagnostics.has_errors());
        stop.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn update_of_offline_domain_settles_offline() {
        let mut server = mockito::Server::new_async().await;
        let update = server
            .mock("POST", "/")
            .match_header("x-tc-action", "UpdateDomainConfig")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Domain": "www.example.com",
                "Area": "overseas"
            })))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeDomainsConfig")
            .with_body(domain_body("offline"))
            .create_async()
            .await;

        let mut prior = planned();
        prior.set_string("id", "www.example.com");
        prior.set_string("area", "mainland");
        let mut planned = prior.clone();
        planned.set_string("area", "overseas");

        let resource = CdnDomainResource::new(provider_data(&server.url()));
        let response = resource
            .update(UpdateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned,
                current_state: prior,
            })
            .await;

        assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
        assert_eq!(response.state.get_string("status").as_deref(), Some("offline"));
        update.assert_async().await;
    }

    #[tokio::test]
    async fn read_of_deleted_domain_clears_state() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeDomainsConfig")
            .with_body(r#"{"Response":{"TotalNumber":0,"Domains":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let mut current = planned();
        current.set_string("id", "www.example.com");

        let resource = CdnDomainResource::new(provider_data(&server.url()));
        let response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: current,
            })
            .await;

        assert!(response.state.is_none());
        assert!(!response.diagnostics.has_errors());
    }
}

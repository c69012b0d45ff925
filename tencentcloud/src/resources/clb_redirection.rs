//! Manual rewrite from one CLB listener rule to another

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::{AttributeBuilder, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State};

use super::api_error;
use crate::api::ids::{check_listener_id, check_location_id, RedirectionId};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_clb_redirection";

pub struct ClbRedirectionResource {
    provider_data: TencentCloudProviderData,
}

impl ClbRedirectionResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        let mut builder = SchemaBuilder::new()
            .description("Provides a redirection between two CLB listener rules")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID in the form clb_id#source_listener_id#source_listener_rule_id#target_listener_id#target_listener_rule_id"),
            );
        let fields = [
            ("clb_id", "ID of the CLB"),
            ("source_listener_id", "Listener the traffic comes from"),
            ("source_listener_rule_id", "Rule the traffic comes from"),
            ("target_listener_id", "Listener the traffic is sent to"),
            ("target_listener_rule_id", "Rule the traffic is sent to"),
        ];
        for (name, description) in fields {
            builder = builder.attribute(
                name,
                AttributeBuilder::string(name)
                    .required()
                    .force_new()
                    .description(description),
            );
        }
        builder.build_resource(0)
    }
}

fn redirection_from_plan(planned: &State) -> Result<RedirectionId, ApiError> {
    let id = RedirectionId {
        clb_id: planned.get_string("clb_id").unwrap_or_default(),
        source_listener_id: planned.get_string("source_listener_id").unwrap_or_default(),
        source_location_id: planned
            .get_string("source_listener_rule_id")
            .unwrap_or_default(),
        target_listener_id: planned.get_string("target_listener_id").unwrap_or_default(),
        target_location_id: planned
            .get_string("target_listener_rule_id")
            .unwrap_or_default(),
    };
    check_ids(&id)?;
    Ok(id)
}

fn check_ids(id: &RedirectionId) -> Result<(), ApiError> {
    check_listener_id(&id.source_listener_id)?;
    check_listener_id(&id.target_listener_id)?;
    check_location_id(&id.source_location_id)?;
    check_location_id(&id.target_location_id)
}

fn set_fields(state: &mut State, id: &RedirectionId) {
    state.set_string("id", id.to_string());
    state.set_string("clb_id", id.clb_id.clone());
    state.set_string("source_listener_id", id.source_listener_id.clone());
    state.set_string("source_listener_rule_id", id.source_location_id.clone());
    state.set_string("target_listener_id", id.target_listener_id.clone());
    state.set_string("target_listener_rule_id", id.target_location_id.clone());
}

#[async_trait]
impl Resource for ClbRedirectionResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let mut state = request.planned_state;

        let id = match redirection_from_plan(&state) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid CLB redirection", Some(e.to_string()));
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        };

        let _guard = self.provider_data.clb_actions.acquire().await;
        if let Err(e) = self
            .provider_data
            .client
            .clb()
            .create_redirection(&request.context, &id)
            .await
        {
            api_error(&mut diags, "Failed to create CLB redirection", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }
        tracing::info!("[{}.create] created redirection {}", TYPE_NAME, id);

        set_fields(&mut state, &id);
        CreateResponse {
            state,
            diagnostics: diags,
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let raw = request.current_state.get_string("id").unwrap_or_default();
        let id = match RedirectionId::parse(&raw) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid CLB redirection id", Some(e.to_string()));
                return ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                };
            }
        };

        match self
            .provider_data
            .client
            .clb()
            .describe_redirection(&request.context, &id)
            .await
        {
            Ok(true) => {
                let mut state = request.current_state;
                set_fields(&mut state, &id);
                ReadResponse {
                    state: Some(state),
                    diagnostics: diags,
                }
            }
            Ok(false) => {
                tracing::warn!(
                    "[{}.read] redirection {} not found, removing from state",
                    TYPE_NAME,
                    id
                );
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB redirection", e);
                ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                }
            }
        }
    }

    /// Every argument forces replacement, so there is nothing to send
    async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        UpdateResponse {
            state: request.planned_state,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        let raw = request.current_state.get_string("id").unwrap_or_default();
        match RedirectionId::parse(&raw) {
            Ok(id) => {
                let _guard = self.provider_data.clb_actions.acquire().await;
                match self
                    .provider_data
                    .client
                    .clb()
                    .delete_redirection(&request.context, &id)
                    .await
                {
                    Ok(()) => tracing::info!("[{}.delete] deleted redirection {}", TYPE_NAME, id),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => api_error(&mut diags, "Failed to delete CLB redirection", e),
                }
            }
            Err(e) => diags.add_error("Invalid CLB redirection id", Some(e.to_string())),
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
    use tfplug::Context;

    fn planned() -> State {
        let mut state = State::new();
        state.set("id", tfplug::Dynamic::Unknown);
        state.set_string("clb_id", "lb-1");
        state.set_string("source_listener_id", "lbl-src");
        state.set_string("source_listener_rule_id", "loc-src");
        state.set_string("target_listener_id", "lbl-dst");
        state.set_string("target_listener_rule_id", "loc-dst");
        state
    }

    #[test]
    fn every_argument_forces_replacement() {
        let schema = ClbRedirectionResource::schema_static();
        for name in [
            "clb_id",
            "source_listener_id",
            "source_listener_rule_id",
            "target_listener_id",
            "target_listener_rule_id",
        ] {
            let attribute = &schema.attributes[name];
            assert!(attribute.required, "{}", name);
            assert!(!attribute.plan_modifiers.is_empty(), "{}", name);
        }
    }

    #[tokio::test]
    async fn create_sends_manual_rewrite() {
        let mut server = mockito::Server::new_async().await;
        let rewrite = server
            .mock("POST", "/")
            .match_header("x-tc-action", "ManualRewrite")
            .match_body(Matcher::Json(serde_json::json!({
                "LoadBalancerId": "lb-1",
                "SourceListenerId": "lbl-src",
                "TargetListenerId": "lbl-dst",
                "RewriteInfos": [{"SourceLocationId": "loc-src", "TargetLocationId": "loc-dst"}]
            })))
            .with_body(r#"{"Response":{"RequestId":"task-1"}}"#)
            .create_async()
            .await;
        let _task = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTaskStatus")
            .with_body(r#"{"Response":{"Status":0,"RequestId":"poll"}}"#)
            .create_async()
            .await;

        let resource = ClbRedirectionResource::new(provider_data(&server.url()));
        let response = resource
            .create(CreateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned(),
            })
            .await;

        assert!(!response.diagnostics.has_errors());
        assert_eq!(
            response.state.get_string("id").as_deref(),
            Some("lb-1#lbl-src#loc-src#lbl-dst#loc-dst")
        );
        rewrite.assert_async().await;
    }

    #[tokio::test]
    async fn create_rejects_rule_id_without_prefix() {
        let mut server = mockito::Server::new_async().await;
        let any = server.mock("POST", "/").expect(0).create_async().await;

        let mut state = planned();
        state.set_string("target_listener_rule_id", "dst");

        let resource = ClbRedirectionResource::new(provider_data(&server.url()));
        let response = resource
            .create(CreateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: state,
            })
            .await;

        assert!(response.diagnostics.has_errors());
        assert!(response.state.get("id").is_some_and(|v| v.is_unknown()));
        any.assert_async().await;
    }

    #[tokio::test]
    async fn read_of_removed_redirection_clears_state() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeRewrite")
            .with_body(r#"{"Response":{"RewriteSet":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let mut state = planned();
        state.set_string("id", "lb-1#lbl-src#loc-src#lbl-dst#loc-dst");

        let resource = ClbRedirectionResource::new(provider_data(&server.url()));
        let response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: state,
            })
            .await;

        assert!(response.state.is_none());
    }
}

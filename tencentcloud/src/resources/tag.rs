//! Standalone tag key/value pair

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::validator::StringLengthValidator;
use tfplug::{AttributeBuilder, Diagnostics, Resource, ResourceSchema, SchemaBuilder};

use super::api_error;
use crate::api::ids::TagId;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_tag";

pub struct TagResource {
    provider_data: TencentCloudProviderData,
}

impl TagResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a tag key and value that resources can be bound to")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID in the form tag_key#tag_value"),
            )
            .attribute(
                "tag_key",
                AttributeBuilder::string("tag_key")
                    .required()
                    .force_new()
                    .validator(Box::new(StringLengthValidator {
                        min: Some(1),
                        max: Some(127),
                    })),
            )
            .attribute(
                "tag_value",
                AttributeBuilder::string("tag_value")
                    .required()
                    .force_new()
                    .validator(Box::new(StringLengthValidator {
                        min: Some(1),
                        max: Some(255),
                    })),
            )
            .build_resource(0)
    }
}

#[async_trait]
impl Resource for TagResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let mut state = request.planned_state;
        let id = TagId {
            key: state.get_string("tag_key").unwrap_or_default(),
            value: state.get_string("tag_value").unwrap_or_default(),
        };

        match self
            .provider_data
            .client
            .tag()
            .create_tag(&request.context, &id.key, &id.value)
            .await
        {
            Ok(()) => {
                tracing::info!("[{}.create] created tag {}", TYPE_NAME, id);
                state.set_string("id", id.to_string());
            }
            Err(e) => api_error(&mut diags, "Failed to create tag", e),
        }
        CreateResponse {
            state,
            diagnostics: diags,
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let raw = request.current_state.get_string("id").unwrap_or_default();
        let id = match TagId::parse(&raw) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid tag id", Some(e.to_string()));
                return ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                };
            }
        };

        match self
            .provider_data
            .client
            .tag()
            .describe_tag(&request.context, &id.key, &id.value)
            .await
        {
            Ok(Some(tag)) => {
                let mut state = request.current_state;
                state.set_string("tag_key", tag.tag_key);
                state.set_string("tag_value", tag.tag_value);
                ReadResponse {
                    state: Some(state),
                    diagnostics: diags,
                }
            }
            Ok(None) => {
                tracing::warn!("[{}.read] tag {} not found, removing from state", TYPE_NAME, id);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read tag", e);
                ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                }
            }
        }
    }

    /// Both arguments force replacement
    async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        UpdateResponse {
            state: request.planned_state,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        let raw = request.current_state.get_string("id").unwrap_or_default();
        match TagId::parse(&raw) {
            Ok(id) => match self
                .provider_data
                .client
                .tag()
                .delete_tag(&request.context, &id.key, &id.value)
                .await
            {
                Ok(()) => tracing::info!("[{}.delete] deleted tag {}", TYPE_NAME, id),
                Err(e) if e.is_not_found() => {}
                Err(e) => api_error(&mut diags, "Failed to delete tag", e),
            },
            Err(e) => diags.add_error("Invalid tag id", Some(e.to_string())),
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
    use tfplug::{Context, State};

    #[tokio::test]
    async fn create_sets_composite_id() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_header("x-tc-action", "CreateTag")
            .match_body(Matcher::Json(serde_json::json!({"TagKey": "env", "TagValue": "prod"})))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;

        let mut planned = State::new();
        planned.set("id", tfplug::Dynamic::Unknown);
        planned.set_string("tag_key", "env");
        planned.set_string("tag_value", "prod");

        let resource = TagResource::new(provider_data(&server.url()));
        let response = resource
            .create(CreateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned,
            })
            .await;

        assert!(!response.diagnostics.has_errors());
        assert_eq!(response.state.get_string("id").as_deref(), Some("env#prod"));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn deleted_tag_reads_as_none() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTags")
            .with_body(r#"{"Response":{"TotalCount":0,"Tags":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let mut current = State::new();
        current.set_string("id", "env#prod");

        let resource = TagResource::new(provider_data(&server.url()));
        let response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: current,
            })
            .await;

        assert!(response.state.is_none());
        assert!(!response.diagnostics.has_errors());
    }

    #[tokio::test]
    async fn id_without_value_is_broken() {
        let server = mockito::Server::new_async().await;
        let mut current = State::new();
        current.set_string("id", "env");

        let resource = TagResource::new(provider_data(&server.url()));
        let response = resource
            .delete(DeleteRequest {
                context: Context::new(),
                current_state: current,
            })
            .await;

        let detail = response.diagnostics.errors[0].detail.as_deref().unwrap_or_default();
        assert_eq!(detail, "tencentcloud_tag id is broken, id is env");
    }
}

//! Namespace inside a TCR registry instance

use async_trait::async_trait;
use tfplug::defaults::StaticDefault;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed, reject_immutable};
use crate::api::ids::NamespaceId;
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_tcr_namespace";

pub struct TcrNamespaceResource {
    provider_data: TencentCloudProviderData,
}

impl TcrNamespaceResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a namespace in a TCR instance")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID in the form instance_id#name"),
            )
            .attribute(
                "instance_id",
                AttributeBuilder::string("instance_id")
                    .required()
                    .force_new()
                    .description("ID of the TCR instance"),
            )
            .attribute(
                "name",
                AttributeBuilder::string("name")
                    .required()
                    .description("Name of the namespace"),
            )
            .attribute(
                "is_public",
                AttributeBuilder::bool("is_public")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .description("Whether anonymous users may pull from the namespace"),
            )
            .build_resource(0)
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &NamespaceId,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let namespace = match self
            .provider_data
            .client
            .tcr()
            .describe_namespace_by_id(ctx, id)
            .await?
        {
            Some(namespace) => namespace,
            None => return Ok(None),
        };
        state.set_string("id", id.to_string());
        state.set_string("instance_id", id.registry_id.clone());
        state.set_string("name", namespace.name);
        state.set_bool("is_public", namespace.public);
        Ok(Some(state))
    }
}

fn namespace_id(state: &State) -> Result<NamespaceId, ApiError> {
    NamespaceId::parse(&state.get_string("id").unwrap_or_default())
}

#[async_trait]
impl Resource for TcrNamespaceResource {
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

        let id = NamespaceId {
            registry_id: state.get_string("instance_id").unwrap_or_default(),
            namespace: state.get_string("name").unwrap_or_default(),
        };
        let is_public = state.get_bool("is_public").unwrap_or(false);

        if let Err(e) = self
            .provider_data
            .client
            .tcr()
            .create_namespace(ctx, &id, is_public)
            .await
        {
            api_error(&mut diags, "Failed to create TCR namespace", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }
        tracing::info!("[{}.create] created namespace {}", TYPE_NAME, id);
        state.set_string("id", id.to_string());

        match self.read_state(ctx, &id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("TCR namespace not found after creation", Some(id.to_string()));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TCR namespace", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let id = match namespace_id(&request.current_state) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid TCR namespace id", Some(e.to_string()));
                return ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                };
            }
        };

        match self
            .read_state(&request.context, &id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResponse {
                state: Some(state),
                diagnostics: diags,
            },
            Ok(None) => {
                tracing::warn!("[{}.read] namespace {} not found, removing from state", TYPE_NAME, id);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TCR namespace", e);
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

        if reject_immutable(&planned, &prior, &["name"], &mut diags) {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }
        let id = match namespace_id(&prior) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid TCR namespace id", Some(e.to_string()));
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        };

        if changed(&planned, &prior, "is_public") {
            let is_public = planned.get_bool("is_public").unwrap_or(false);
            if let Err(e) = self
                .provider_data
                .client
                .tcr()
                .modify_namespace(ctx, &id, is_public)
                .await
            {
                api_error(&mut diags, "Failed to modify TCR namespace", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &id, planned.clone()).await {
            Ok(Some(state)) => UpdateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("TCR namespace not found after update", Some(id.to_string()));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TCR namespace", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        match namespace_id(&request.current_state) {
            Ok(id) => match self
                .provider_data
                .client
                .tcr()
                .delete_namespace(&request.context, &id)
                .await
            {
                Ok(()) => tracing::info!("[{}.delete] deleted namespace {}", TYPE_NAME, id),
                Err(e) if e.is_not_found() => {}
                Err(e) => api_error(&mut diags, "Failed to delete TCR namespace", e),
            },
            Err(e) => diags.add_error("Invalid TCR namespace id", Some(e.to_string())),
        }
        DeleteResponse { diagnostics: diags }
    }
}

//! TCR registry instance

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::defaults::StaticDefault;
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
use crate::api::retry::OperationClass;
use crate::api::state_change::StateChangeConf;
use crate::api::tcr::{
    CreateInstanceRequest, Registry, TagSpecification, TcrTag, PENDING_STATUSES, STATUS_RUNNING,
};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_tcr_instance";
const TAGS: TagTarget = TagTarget {
    service: "tcr",
    resource_type: "instance",
};
const INSTANCE_TYPES: &[&str] = &["basic", "standard", "premium"];

pub struct TcrInstanceResource {
    provider_data: TencentCloudProviderData,
}

impl TcrInstanceResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a TCR registry instance")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "name",
                AttributeBuilder::string("name")
                    .required()
                    .force_new()
                    .description("Name of the registry instance"),
            )
            .attribute(
                "instance_type",
                AttributeBuilder::string("instance_type")
                    .required()
                    .validator(StringOneOfValidator::new(INSTANCE_TYPES))
                    .description("Edition of the instance: basic, standard or premium"),
            )
            .attribute(
                "delete_bucket",
                AttributeBuilder::bool("delete_bucket")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .description("Delete the COS bucket holding the images when the instance is destroyed"),
            )
            .attribute(
                "tags",
                AttributeBuilder::map("tags", AttributeType::String).optional(),
            )
            .attribute(
                "status",
                AttributeBuilder::string("status").computed(),
            )
            .attribute(
                "public_domain",
                AttributeBuilder::string("public_domain")
                    .computed()
                    .use_state_for_unknown()
                    .description("Public address for image pushes and pulls"),
            )
            .attribute(
                "internal_end_point",
                AttributeBuilder::string("internal_end_point")
                    .computed()
                    .use_state_for_unknown()
                    .description("Private address inside the VPC"),
            )
            .build_resource(0)
    }

    async fn read_state(
        &self,
        ctx: &Context,
        registry_id: &str,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let registry = match self
            .provider_data
            .client
            .tcr()
            .describe_instance_by_id(ctx, registry_id)
            .await?
        {
            Some(registry) => registry,
            None => return Ok(None),
        };
        flatten_registry(&registry, &mut state);
        Ok(Some(state))
    }
}

/// `delete_bucket` only exists in state, so the base state keeps it
fn flatten_registry(registry: &Registry, state: &mut State) {
    state.set_string("id", registry.registry_id.clone());
    state.set_string("name", registry.registry_name.clone());
    state.set_string("instance_type", registry.registry_type.clone());
    state.set_string("status", registry.status.clone());
    state.set_string("public_domain", registry.public_domain.clone());
    state.set_string("internal_end_point", registry.internal_endpoint.clone());
    if state.get("delete_bucket").map_or(true, |v| !v.is_known() || v.is_null()) {
        state.set_bool("delete_bucket", false);
    }

    let tags: HashMap<String, String> = registry
        .tag_specification
        .iter()
        .flat_map(|spec| spec.tags.iter())
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect();
    set_tags(state, tags);
}

#[async_trait]
impl Resource for TcrInstanceResource {
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
        let client = &self.provider_data.client;

        let tags = state_tags(&state);
        let create = CreateInstanceRequest {
            registry_name: state.get_string("name").unwrap_or_default(),
            registry_type: state.get_string("instance_type").unwrap_or_default(),
            tag_specification: (!tags.is_empty()).then(|| TagSpecification {
                resource_type: TAGS.resource_type.to_string(),
                tags: tags
                    .into_iter()
                    .map(|(key, value)| TcrTag { key, value })
                    .collect(),
            }),
        };

        let registry_id = match client.tcr().create_instance(ctx, &create).await {
            Ok(id) => id,
            Err(e) => {
                api_error(&mut diags, "Failed to create TCR instance", e);
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        };
        tracing::info!("[{}.create] created instance {}", TYPE_NAME, registry_id);
        state.set_string("id", registry_id.clone());

        let id = registry_id.as_str();
        let wait = StateChangeConf::new(
            PENDING_STATUSES,
            &[STATUS_RUNNING],
            client.policy(OperationClass::Write).timeout,
        )
        .wait_for_state(ctx, || async move {
            let registry = client.tcr().describe_instance_by_id(ctx, id).await?;
            Ok(registry.map(|r| ((), r.status)))
        })
        .await;
        if let Err(e) = wait {
            api_error(&mut diags, "TCR instance did not reach Running", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }

        match self.read_state(ctx, &registry_id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("TCR instance not found after creation", Some(registry_id));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TCR instance", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let registry_id = request.current_state.get_string("id").unwrap_or_default();

        match self
            .read_state(&request.context, &registry_id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResponse {
                state: Some(state),
                diagnostics: diags,
            },
            Ok(None) => {
                tracing::warn!(
                    "[{}.read] instance {} not found, removing from state",
                    TYPE_NAME,
                    registry_id
                );
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TCR instance", e);
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
        let registry_id = prior.get_string("id").unwrap_or_default();

        if changed(&planned, &prior, "instance_type") {
            let instance_type = planned.get_string("instance_type").unwrap_or_default();
            if let Err(e) = client
                .tcr()
                .modify_instance(ctx, &registry_id, &instance_type)
                .await
            {
                api_error(&mut diags, "Failed to modify TCR instance", e);
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
                &registry_id,
                &state_tags(&prior),
                &state_tags(&planned),
            )
            .await
            {
                api_error(&mut diags, "Failed to modify TCR instance tags", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &registry_id, planned.clone()).await {
            Ok(Some(state)) => UpdateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("TCR instance not found after update", Some(registry_id));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TCR instance", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let client = &self.provider_data.client;
        let registry_id = request.current_state.get_string("id").unwrap_or_default();
        let delete_bucket = request
            .current_state
            .get_bool("delete_bucket")
            .unwrap_or(false);

        let id = registry_id.as_str();
        let result: Result<(), ApiError> = async {
            client.tcr().delete_instance(ctx, id, delete_bucket).await?;
            StateChangeConf::new(&[], &[], client.policy(OperationClass::Write).timeout)
                .wait_for_absence(ctx, || async move {
                    let registry = client.tcr().describe_instance_by_id(ctx, id).await?;
                    Ok(registry.map(|r| r.status))
                })
                .await
        }
        .await;

        match result {
            Ok(()) => tracing::info!("[{}.delete] deleted instance {}", TYPE_NAME, registry_id),
            Err(e) if e.is_not_found() => {}
            Err(e) => api_error(&mut diags, "Failed to delete TCR instance", e),
        }
        DeleteResponse { diagnostics: diags }
    }
}

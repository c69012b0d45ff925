//! VPC network ACL with its ingress and egress entries

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse, ValidateRequest,
    ValidateResponse,
};
use tfplug::schema::AttributeType;
use tfplug::validator::StringLengthValidator;
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed};
use crate::api::vpc::{AclRule, NetworkAcl};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_vpc_acl";

pub struct VpcAclResource {
    provider_data: TencentCloudProviderData,
}

impl VpcAclResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a network ACL of a VPC")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "vpc_id",
                AttributeBuilder::string("vpc_id")
                    .required()
                    .force_new()
                    .description("VPC the ACL belongs to"),
            )
            .attribute(
                "name",
                AttributeBuilder::string("name")
                    .required()
                    .validator(Box::new(StringLengthValidator {
                        min: Some(1),
                        max: Some(60),
                    }))
                    .description("Name of the ACL"),
            )
            .attribute(
                "ingress",
                AttributeBuilder::list("ingress", AttributeType::String)
                    .optional()
                    .description("Inbound rules, each as ACTION#CIDR_IP#PORT#PROTOCOL"),
            )
            .attribute(
                "egress",
                AttributeBuilder::list("egress", AttributeType::String)
                    .optional()
                    .description("Outbound rules, each as ACTION#CIDR_IP#PORT#PROTOCOL"),
            )
            .attribute(
                "create_time",
                AttributeBuilder::string("create_time")
                    .computed()
                    .use_state_for_unknown(),
            )
            .build_resource(0)
    }

    async fn read_state(
        &self,
        ctx: &Context,
        acl_id: &str,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let acl = match self
            .provider_data
            .client
            .vpc()
            .describe_network_acl_by_id(ctx, acl_id)
            .await?
        {
            Some(acl) => acl,
            None => return Ok(None),
        };
        flatten_acl(&acl, &mut state);
        Ok(Some(state))
    }
}

/// Parses every rule of `attribute`, reporting each broken one
fn parse_rules(state: &State, attribute: &str, diags: &mut Diagnostics) -> Vec<AclRule> {
    let mut rules = Vec::new();
    for raw in state.get_string_list(attribute).unwrap_or_default() {
        match AclRule::parse(&raw) {
            Ok(rule) => rules.push(rule),
            Err(e) => diags.add_attribute_error(attribute, "Invalid ACL rule", Some(e.to_string())),
        }
    }
    rules
}

/// Writes `rules` back to `attribute`. A configured string that names the
/// same rule the API returned is kept as written, so case never drifts.
fn set_rules(state: &mut State, attribute: &str, rules: &[AclRule]) {
    let configured = state.get_string_list(attribute);
    if rules.is_empty() && configured.is_none() {
        state.set_null(attribute);
        return;
    }

    let configured = configured.unwrap_or_default();
    let rendered: Vec<String> = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let canonical = rule.to_string();
            match configured.get(i) {
                Some(raw) if same_rule(raw, &canonical) => raw.clone(),
                _ => canonical,
            }
        })
        .collect();
    state.set_string_list(attribute, rendered);
}

fn same_rule(raw: &str, canonical: &str) -> bool {
    AclRule::parse(raw).is_ok_and(|rule| rule.to_string() == canonical)
}

fn flatten_acl(acl: &NetworkAcl, state: &mut State) {
    state.set_string("id", acl.network_acl_id.clone());
    state.set_string("vpc_id", acl.vpc_id.clone());
    state.set_string("name", acl.network_acl_name.clone());
    state.set_string("create_time", acl.created_time.clone());
    set_rules(state, "ingress", &acl.ingress_entries);
    set_rules(state, "egress", &acl.egress_entries);
}

#[async_trait]
impl Resource for VpcAclResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn validate(&self, request: ValidateRequest) -> ValidateResponse {
        let mut diags = Diagnostics::new();
        let config = State::from(request.config);
        parse_rules(&config, "ingress", &mut diags);
        parse_rules(&config, "egress", &mut diags);
        ValidateResponse { diagnostics: diags }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let mut state = request.planned_state;
        let vpc = self.provider_data.client.vpc();

        let ingress = parse_rules(&state, "ingress", &mut diags);
        let egress = parse_rules(&state, "egress", &mut diags);
        if diags.has_errors() {
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }

        let vpc_id = state.get_string("vpc_id").unwrap_or_default();
        let name = state.get_string("name").unwrap_or_default();
        let acl_id = match vpc.create_network_acl(ctx, &vpc_id, &name).await {
            Ok(id) => id,
            Err(e) => {
                api_error(&mut diags, "Failed to create network ACL", e);
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        };
        tracing::info!("[{}.create] created network acl {}", TYPE_NAME, acl_id);
        state.set_string("id", acl_id.clone());

        if !ingress.is_empty() || !egress.is_empty() {
            if let Err(e) = vpc
                .modify_network_acl_entries(ctx, &acl_id, &ingress, &egress)
                .await
            {
                api_error(&mut diags, "Failed to set network ACL entries", e);
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &acl_id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("Network ACL not found after creation", Some(acl_id));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read network ACL", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let acl_id = request.current_state.get_string("id").unwrap_or_default();

        match self
            .read_state(&request.context, &acl_id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResponse {
                state: Some(state),
                diagnostics: diags,
            },
            Ok(None) => {
                tracing::warn!("[{}.read] network acl {} not found, removing from state", TYPE_NAME, acl_id);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read network ACL", e);
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
        let vpc = self.provider_data.client.vpc();
        let acl_id = prior.get_string("id").unwrap_or_default();

        let entries_changed =
            changed(&planned, &prior, "ingress") || changed(&planned, &prior, "egress");
        let ingress = parse_rules(&planned, "ingress", &mut diags);
        let egress = parse_rules(&planned, "egress", &mut diags);
        if diags.has_errors() {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }

        if changed(&planned, &prior, "name") {
            let name = planned.get_string("name").unwrap_or_default();
            if let Err(e) = vpc.modify_network_acl_name(ctx, &acl_id, &name).await {
                api_error(&mut diags, "Failed to rename network ACL", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        if entries_changed {
            if let Err(e) = vpc
                .modify_network_acl_entries(ctx, &acl_id, &ingress, &egress)
                .await
            {
                api_error(&mut diags, "Failed to modify network ACL entries", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &acl_id, planned.clone()).await {
            Ok(Some(state)) => UpdateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("Network ACL not found after update", Some(acl_id));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read network ACL", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        let acl_id = request.current_state.get_string("id").unwrap_or_default();
        match self
            .provider_data
            .client
            .vpc()
            .delete_network_acl(&request.context, &acl_id)
            .await
        {
            Ok(()) => tracing::info!("[{}.delete] deleted network acl {}", TYPE_NAME, acl_id),
            Err(e) if e.is_not_found() => {}
            Err(e) => api_error(&mut diags, "Failed to delete network ACL", e),
        }
        DeleteResponse { diagnostics: diags }
    }
}

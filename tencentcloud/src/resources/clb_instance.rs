//! CLB instance resource

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse, ValidateRequest,
    ValidateResponse,
};
use tfplug::schema::AttributeType;
use tfplug::validator::{StringLengthValidator, StringOneOfValidator};
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed, read_tags, reject_immutable, set_tags, state_tags, sync_tags, TagTarget};
use crate::api::clb::{
    CreateLoadBalancerRequest, LoadBalancer, ModifyLoadBalancerAttributesRequest,
    TargetRegionInfo,
};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_clb_instance";
const TAGS: TagTarget = TagTarget {
    service: "clb",
    resource_type: "clb",
};
const NETWORK_TYPES: &[&str] = &["OPEN", "INTERNAL"];

pub struct ClbInstanceResource {
    provider_data: TencentCloudProviderData,
}

impl ClbInstanceResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a CLB (Cloud Load Balancer) instance")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID of the CLB instance"),
            )
            .attribute(
                "network_type",
                AttributeBuilder::string("network_type")
                    .required()
                    .validator(StringOneOfValidator::new(NETWORK_TYPES))
                    .description("Type of CLB instance: OPEN or INTERNAL"),
            )
            .attribute(
                "clb_name",
                AttributeBuilder::string("clb_name")
                    .required()
                    .validator(Box::new(StringLengthValidator {
                        min: Some(1),
                        max: Some(60),
                    }))
                    .description("Name of the CLB, 1 to 60 characters"),
            )
            .attribute(
                "project_id",
                AttributeBuilder::number("project_id")
                    .optional()
                    .computed()
                    .force_new()
                    .description("ID of the project the CLB belongs to"),
            )
            .attribute(
                "vpc_id",
                AttributeBuilder::string("vpc_id")
                    .optional()
                    .computed()
                    .description("VPC of the CLB; required for INTERNAL instances"),
            )
            .attribute(
                "subnet_id",
                AttributeBuilder::string("subnet_id")
                    .optional()
                    .computed()
                    .description("Subnet of an INTERNAL CLB"),
            )
            .attribute(
                "security_groups",
                AttributeBuilder::list("security_groups", AttributeType::String)
                    .optional()
                    .description("Security groups bound to an OPEN CLB"),
            )
            .attribute(
                "target_region_info_region",
                AttributeBuilder::string("target_region_info_region")
                    .optional()
                    .description("Region of the backend target, for cross-region binding"),
            )
            .attribute(
                "target_region_info_vpc_id",
                AttributeBuilder::string("target_region_info_vpc_id")
                    .optional()
                    .description("VPC of the backend target, for cross-region binding"),
            )
            .attribute(
                "clb_vips",
                AttributeBuilder::list("clb_vips", AttributeType::String)
                    .computed()
                    .description("Virtual service addresses of the CLB"),
            )
            .attribute(
                "tags",
                AttributeBuilder::map("tags", AttributeType::String)
                    .optional()
                    .description("Tags of the CLB instance"),
            )
            .build_resource(0)
    }

    async fn read_state(&self, ctx: &Context, id: &str, mut state: State) -> Result<Option<State>, ApiError> {
        let client = &self.provider_data.client;
        let lb = match client.clb().describe_load_balancer_by_id(ctx, id).await? {
            Some(lb) => lb,
            None => return Ok(None),
        };
        let tags = read_tags(client, ctx, TAGS, id).await?;

        flatten_load_balancer(&lb, &mut state);
        set_tags(&mut state, tags);
        Ok(Some(state))
    }

    fn target_region(planned: &State, diags: &mut Diagnostics) -> Option<TargetRegionInfo> {
        let region = planned.get_string("target_region_info_region");
        let vpc_id = planned.get_string("target_region_info_vpc_id");
        match (region, vpc_id) {
            (Some(region), Some(vpc_id)) => Some(TargetRegionInfo { region, vpc_id }),
            (None, None) => None,
            _ => {
                diags.add_error(
                    "Incomplete target region",
                    Some("target_region_info_region and target_region_info_vpc_id must be set together"),
                );
                None
            }
        }
    }

    /// Runs against configuration, where an unset attribute is null and a
    /// value pending on another resource is unknown
    fn check_network(config: &State, diags: &mut Diagnostics) {
        let network_type = config.get_string("network_type");
        if network_type.as_deref() == Some("INTERNAL")
            && config.get("vpc_id").map_or(true, |v| v.is_null())
        {
            diags.add_attribute_error(
                "vpc_id",
                "vpc_id is required for an INTERNAL CLB",
                None::<String>,
            );
        }
        if network_type.as_deref() == Some("INTERNAL")
            && config
                .get_string_list("security_groups")
                .is_some_and(|groups| !groups.is_empty())
        {
            diags.add_attribute_error(
                "security_groups",
                "security_groups can only be set on an OPEN CLB",
                None::<String>,
            );
        }
    }
}

fn flatten_load_balancer(lb: &LoadBalancer, state: &mut State) {
    state.set_string("id", lb.load_balancer_id.clone());
    state.set_string("network_type", lb.load_balancer_type.clone());
    state.set_string("clb_name", lb.load_balancer_name.clone());
    state.set_i64("project_id", lb.project_id);
    state.set_string("vpc_id", lb.vpc_id.clone());
    state.set_string("subnet_id", lb.subnet_id.clone());
    state.set_string_list("clb_vips", lb.load_balancer_vips.clone());

    // groups the platform binds on its own stay out of an unset attribute
    let configured_groups = state.get("security_groups").is_some_and(|v| !v.is_null());
    if configured_groups {
        state.set_string_list("security_groups", lb.secure_groups.clone());
    }

    // the API reports the CLB's own region when nothing was configured
    let configured_region = state
        .get("target_region_info_region")
        .is_some_and(|v| !v.is_null());
    if let Some(info) = lb.target_region_info.as_ref().filter(|_| configured_region) {
        state.set_string("target_region_info_region", info.region.clone());
        state.set_string("target_region_info_vpc_id", info.vpc_id.clone());
    }
}

#[async_trait]
impl Resource for ClbInstanceResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn validate(&self, request: ValidateRequest) -> ValidateResponse {
        let mut diagnostics = Diagnostics::new();
        let state = State::from(request.config);
        Self::check_network(&state, &mut diagnostics);
        Self::target_region(&state, &mut diagnostics);
        ValidateResponse { diagnostics }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let planned = request.planned_state;

        Self::check_network(&State::from(request.config), &mut diags);
        let target_region = Self::target_region(&planned, &mut diags);
        if diags.has_errors() {
            return CreateResponse {
                state: planned,
                diagnostics: diags,
            };
        }

        let client = &self.provider_data.client;
        let create = CreateLoadBalancerRequest {
            load_balancer_type: planned.get_string("network_type").unwrap_or_default(),
            forward: 1,
            load_balancer_name: planned.get_string("clb_name").unwrap_or_default(),
            vpc_id: planned.get_string("vpc_id"),
            subnet_id: planned.get_string("subnet_id"),
            project_id: planned.get_i64("project_id"),
            tags: Vec::new(),
        };

        let id = match client.clb().create_load_balancer(ctx, &create).await {
            Ok(id) => id,
            Err(e) => {
                api_error(&mut diags, "Failed to create CLB instance", e);
                return CreateResponse {
                    state: planned,
                    diagnostics: diags,
                };
            }
        };
        tracing::info!("[{}.create] created CLB instance {}", TYPE_NAME, id);

        let mut state = planned;
        state.set_string("id", id.clone());

        if let Some(info) = target_region {
            let modify = ModifyLoadBalancerAttributesRequest {
                load_balancer_id: id.clone(),
                load_balancer_name: None,
                target_region_info: Some(info),
            };
            if let Err(e) = client.clb().modify_load_balancer_attributes(ctx, &modify).await {
                api_error(&mut diags, "Failed to set CLB target region", e);
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        }

        if let Some(groups) = state.get_string_list("security_groups") {
            if !groups.is_empty() {
                if let Err(e) = client.clb().set_security_groups(ctx, &id, &groups).await {
                    api_error(&mut diags, "Failed to bind CLB security groups", e);
                    return CreateResponse {
                        state,
                        diagnostics: diags,
                    };
                }
            }
        }

        let tags = state_tags(&state);
        if let Err(e) = sync_tags(client, ctx, TAGS, &id, &Default::default(), &tags).await {
            api_error(&mut diags, "Failed to tag CLB instance", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }

        match self.read_state(ctx, &id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error(
                    "CLB instance not found after creation",
                    Some(format!("instance {} disappeared", id)),
                );
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB instance", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let id = match request.current_state.get_string("id") {
            Some(id) => id,
            None => {
                return ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
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
                tracing::warn!("[{}.read] CLB instance {} not found, removing from state", TYPE_NAME, id);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB instance", e);
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

        if reject_immutable(&planned, &prior, &["network_type", "vpc_id", "subnet_id"], &mut diags) {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }
        Self::check_network(&State::from(request.config), &mut diags);
        let target_region = Self::target_region(&planned, &mut diags);
        if diags.has_errors() {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }

        let client = &self.provider_data.client;
        let id = prior.get_string("id").unwrap_or_default();

        let region_changed = changed(&planned, &prior, "target_region_info_region")
            || changed(&planned, &prior, "target_region_info_vpc_id");
        let name_changed = changed(&planned, &prior, "clb_name");
        if name_changed || (region_changed && target_region.is_some()) {
            let modify = ModifyLoadBalancerAttributesRequest {
                load_balancer_id: id.clone(),
                load_balancer_name: name_changed
                    .then(|| planned.get_string("clb_name"))
                    .flatten(),
                target_region_info: target_region.filter(|_| region_changed),
            };
            if let Err(e) = client.clb().modify_load_balancer_attributes(ctx, &modify).await {
                api_error(&mut diags, "Failed to modify CLB instance", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        if changed(&planned, &prior, "security_groups") {
            let groups = planned.get_string_list("security_groups").unwrap_or_default();
            if let Err(e) = client.clb().set_security_groups(ctx, &id, &groups).await {
                api_error(&mut diags, "Failed to update CLB security groups", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        if changed(&planned, &prior, "tags") {
            if let Err(e) = sync_tags(client, ctx, TAGS, &id, &state_tags(&prior), &state_tags(&planned)).await {
                api_error(&mut diags, "Failed to update CLB tags", e);
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
                diags.add_error("CLB instance not found after update", Some(id));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB instance", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        if let Some(id) = request.current_state.get_string("id") {
            match self
                .provider_data
                .client
                .clb()
                .delete_load_balancer(&request.context, &id)
                .await
            {
                Ok(()) => tracing::info!("[{}.delete] deleted CLB instance {}", TYPE_NAME, id),
                Err(e) if e.is_not_found() => {}
                Err(e) => api_error(&mut diags, "Failed to delete CLB instance", e),
            }
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

    const DESCRIBE_BODY: &str = r#"{"Response":{"TotalCount":1,"LoadBalancerSet":[{
        "LoadBalancerId":"lb-1","LoadBalancerName":"tf-clb","LoadBalancerType":"OPEN",
        "Forward":1,"LoadBalancerVips":["1.2.3.4"],"Status":1,"VpcId":"vpc-1",
        "SubnetId":"","ProjectId":0,"SecureGroups":null}],"RequestId":"r"}}"#;

    fn planned() -> State {
        let mut state = State::new();
        state.set("id", tfplug::Dynamic::Unknown);
        state.set_string("network_type", "OPEN");
        state.set_string("clb_name", "tf-clb");
        state.set("project_id", tfplug::Dynamic::Unknown);
        state.set("vpc_id", tfplug::Dynamic::Unknown);
        state.set("subnet_id", tfplug::Dynamic::Unknown);
        state.set_null("security_groups");
        state.set_null("tags");
        state
    }

    #[test]
    fn schema_marks_project_id_force_new() {
        let schema = ClbInstanceResource::schema_static();
        assert!(schema.attributes["network_type"].required);
        assert!(!schema.attributes["project_id"].plan_modifiers.is_empty());
        assert!(schema.attributes["clb_vips"].computed);
    }

    #[tokio::test]
    async fn create_reads_back_instance() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_header("x-tc-action", "CreateLoadBalancer")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "LoadBalancerType": "OPEN",
                "LoadBalancerName": "tf-clb",
                "Forward": 1
            })))
            .with_body(r#"{"Response":{"LoadBalancerIds":["lb-1"],"RequestId":"task-1"}}"#)
            .create_async()
            .await;
        let _task = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeTaskStatus")
            .with_body(r#"{"Response":{"Status":0,"RequestId":"r"}}"#)
            .create_async()
            .await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeLoadBalancers")
            .with_body(DESCRIBE_BODY)
            .create_async()
            .await;
        let _tags = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeResourceTagsByResourceIds")
            .with_body(r#"{"Response":{"TotalCount":0,"Tags":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let resource = ClbInstanceResource::new(provider_data(&server.url()));
        let response = resource
            .create(CreateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned(),
            })
            .await;

        assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics);
        assert_eq!(response.state.get_string("id").as_deref(), Some("lb-1"));
        assert_eq!(response.state.get_string("clb_name").as_deref(), Some("tf-clb"));
        assert_eq!(response.state.get_string("vpc_id").as_deref(), Some("vpc-1"));
        assert_eq!(
            response.state.get_string_list("clb_vips"),
            Some(vec!["1.2.3.4".to_string()])
        );
        create.assert_async().await;
    }

    #[test]
    fn unconfigured_security_groups_stay_null() {
        let lb: LoadBalancer = serde_json::from_value(serde_json::json!({
            "LoadBalancerId": "lb-1",
            "LoadBalancerName": "tf-clb",
            "LoadBalancerType": "OPEN",
            "SecureGroups": ["sg-default"]
        }))
        .unwrap();

        let mut unset = planned();
        flatten_load_balancer(&lb, &mut unset);
        assert_eq!(unset.get("security_groups"), Some(&tfplug::Dynamic::Null));

        let mut configured = planned();
        configured.set_string_list("security_groups", ["sg-1"]);
        flatten_load_balancer(&lb, &mut configured);
        assert_eq!(
            configured.get_string_list("security_groups"),
            Some(vec!["sg-default".to_string()])
        );
    }

    #[tokio::test]
    async fn update_of_network_type_is_rejected_without_api_calls() {
        let mut server = mockito::Server::new_async().await;
        let any = server
            .mock("POST", "/")
            .expect(0)
            .create_async()
            .await;

        let mut prior = planned();
        prior.set_string("id", "lb-1");
        prior.set_string("vpc_id", "vpc-1");
        let mut planned = prior.clone();
        planned.set_string("network_type", "INTERNAL");

        let resource = ClbInstanceResource::new(provider_data(&server.url()));
        let response = resource
            .update(UpdateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned,
                current_state: prior,
            })
            .await;

        assert!(response.diagnostics.has_errors());
        assert_eq!(
            response.diagnostics.errors[0].attribute.as_deref(),
            Some("network_type")
        );
        assert_eq!(response.state.get_string("network_type").as_deref(), Some("OPEN"));
        any.assert_async().await;
    }

    #[tokio::test]
    async fn read_of_deleted_instance_clears_state() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeLoadBalancers")
            .with_body(r#"{"Response":{"TotalCount":0,"LoadBalancerSet":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let mut current = planned();
        current.set_string("id", "lb-gone");

        let resource = ClbInstanceResource::new(provider_data(&server.url()));
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
    async fn internal_instance_requires_vpc() {
        let server = mockito::Server::new_async().await;
        let mut planned = planned();
        planned.set_string("network_type", "INTERNAL");
        let mut config = tfplug::Config::new();
        config.set_string("network_type", "INTERNAL");
        config.set_string("clb_name", "tf-clb");
        config.set_null("vpc_id");

        let resource = ClbInstanceResource::new(provider_data(&server.url()));
        let response = resource
            .create(CreateRequest {
                context: Context::new(),
                config,
                planned_state: planned,
            })
            .await;

        assert!(response.diagnostics.has_errors());
        assert!(response.state.get_string("id").is_none());
    }
}

//! Forwarding rule of an HTTP/HTTPS CLB listener

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed, reject_immutable};
use crate::api::clb::{HealthCheck, ModifyRuleRequest, RuleInput, RuleOutput};
use crate::api::ids::{check_listener_id, check_location_id, ListenerRuleId};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_clb_listener_rule";
const SCHEDULERS: &[&str] = &["WRR", "LEAST_CONN", "IP_HASH"];
const HTTP_METHODS: &[&str] = &["HEAD", "GET"];

const HEALTH_CHECK_NUMBERS: &[&str] = &[
    "health_check_interval_time",
    "health_check_health_num",
    "health_check_unhealth_num",
    "health_check_http_code",
];
const HEALTH_CHECK_STRINGS: &[&str] = &[
    "health_check_http_path",
    "health_check_http_domain",
    "health_check_http_method",
];

pub struct ClbListenerRuleResource {
    provider_data: TencentCloudProviderData,
}

impl ClbListenerRuleResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        let mut builder = SchemaBuilder::new()
            .description("Provides a forwarding rule of an HTTP or HTTPS CLB listener")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID of the rule, in the form clb_id#listener_id#location_id"),
            )
            .attribute(
                "clb_id",
                AttributeBuilder::string("clb_id")
                    .required()
                    .force_new()
                    .description("ID of the CLB"),
            )
            .attribute(
                "listener_id",
                AttributeBuilder::string("listener_id")
                    .required()
                    .force_new()
                    .description("ID of the listener, starting with lbl-"),
            )
            .attribute(
                "location_id",
                AttributeBuilder::string("location_id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID of the rule, starting with loc-"),
            )
            .attribute(
                "domain",
                AttributeBuilder::string("domain")
                    .required()
                    .description("Domain the rule matches"),
            )
            .attribute(
                "url",
                AttributeBuilder::string("url")
                    .required()
                    .description("URL path the rule matches"),
            )
            .attribute(
                "health_check_switch",
                AttributeBuilder::bool("health_check_switch")
                    .optional()
                    .computed()
                    .description("Whether health checks are enabled"),
            )
            .attribute(
                "health_check_http_method",
                AttributeBuilder::string("health_check_http_method")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::new(HTTP_METHODS))
                    .description("HTTP method of the health check, HEAD or GET"),
            )
            .attribute(
                "health_check_http_path",
                AttributeBuilder::string("health_check_http_path")
                    .optional()
                    .computed()
                    .description("Path requested by the health check"),
            )
            .attribute(
                "health_check_http_domain",
                AttributeBuilder::string("health_check_http_domain")
                    .optional()
                    .computed()
                    .description("Host requested by the health check"),
            )
            .attribute(
                "session_expire_time",
                AttributeBuilder::number("session_expire_time")
                    .optional()
                    .computed()
                    .validator(Box::new(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(3600.0),
                    }))
                    .description("Session persistence time in seconds, 0 to disable"),
            )
            .attribute(
                "scheduler",
                AttributeBuilder::string("scheduler")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::new(SCHEDULERS))
                    .description("Balancing method: WRR, LEAST_CONN or IP_HASH"),
            );

        for name in HEALTH_CHECK_NUMBERS {
            builder = builder.attribute(
                name,
                AttributeBuilder::number(name).optional().computed(),
            );
        }

        builder.build_resource(0)
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &ListenerRuleId,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let rule = match self
            .provider_data
            .client
            .clb()
            .describe_rule_by_id(ctx, id)
            .await?
        {
            Some(rule) => rule,
            None => return Ok(None),
        };

        state.set_string("id", id.to_string());
        state.set_string("clb_id", id.clb_id.clone());
        state.set_string("listener_id", id.listener_id.clone());
        flatten_rule(&rule, &mut state);
        Ok(Some(state))
    }
}

fn health_check(planned: &State) -> Option<HealthCheck> {
    let switch = planned.get_bool("health_check_switch");
    let health_check = HealthCheck {
        health_switch: i64::from(switch.unwrap_or(true)),
        interval_time: planned.get_i64("health_check_interval_time"),
        health_num: planned.get_i64("health_check_health_num"),
        un_health_num: planned.get_i64("health_check_unhealth_num"),
        http_code: planned.get_i64("health_check_http_code"),
        http_check_path: planned.get_string("health_check_http_path"),
        http_check_domain: planned.get_string("health_check_http_domain"),
        http_check_method: planned.get_string("health_check_http_method"),
        ..Default::default()
    };
    let any_detail = HEALTH_CHECK_NUMBERS
        .iter()
        .chain(HEALTH_CHECK_STRINGS)
        .any(|attribute| planned.get(attribute).is_some_and(|v| v.is_known() && !v.is_null()));
    (switch.is_some() || any_detail).then_some(health_check)
}

fn flatten_rule(rule: &RuleOutput, state: &mut State) {
    state.set_string("location_id", rule.location_id.clone());
    state.set_string("domain", rule.domain.clone());
    state.set_string("url", rule.url.clone());
    state.set_i64("session_expire_time", rule.session_expire_time);
    state.set_string("scheduler", rule.scheduler.clone());

    if let Some(hc) = &rule.health_check {
        state.set_bool("health_check_switch", hc.health_switch == 1);
        let numbers = [
            ("health_check_interval_time", hc.interval_time),
            ("health_check_health_num", hc.health_num),
            ("health_check_unhealth_num", hc.un_health_num),
            ("health_check_http_code", hc.http_code),
        ];
        for (attribute, value) in numbers {
            match value {
                Some(value) => state.set_i64(attribute, value),
                None => state.set_null(attribute),
            }
        }
        let strings = [
            ("health_check_http_path", &hc.http_check_path),
            ("health_check_http_domain", &hc.http_check_domain),
            ("health_check_http_method", &hc.http_check_method),
        ];
        for (attribute, value) in strings {
            match value {
                Some(value) => state.set_string(attribute, value.clone()),
                None => state.set_null(attribute),
            }
        }
    }
}

fn rule_id(state: &State) -> Result<ListenerRuleId, ApiError> {
    let raw = state.get_string("id").unwrap_or_default();
    let id = ListenerRuleId::parse(&raw)?;
    check_listener_id(&id.listener_id)?;
    check_location_id(&id.location_id)?;
    Ok(id)
}

#[async_trait]
impl Resource for ClbListenerRuleResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let planned = request.planned_state;

        let clb_id = planned.get_string("clb_id").unwrap_or_default();
        let listener_id = planned.get_string("listener_id").unwrap_or_default();
        if let Err(e) = check_listener_id(&listener_id) {
            diags.add_attribute_error("listener_id", "Invalid listener id", Some(e.to_string()));
            return CreateResponse {
                state: planned,
                diagnostics: diags,
            };
        }

        let rule = RuleInput {
            domain: planned.get_string("domain").unwrap_or_default(),
            url: planned.get_string("url").unwrap_or_default(),
            session_expire_time: planned.get_i64("session_expire_time"),
            health_check: health_check(&planned),
            scheduler: planned.get_string("scheduler"),
        };

        let location_id = match self
            .provider_data
            .client
            .clb()
            .create_rule(ctx, &clb_id, &listener_id, &rule)
            .await
        {
            Ok(location_id) => location_id,
            Err(e) => {
                api_error(&mut diags, "Failed to create CLB listener rule", e);
                return CreateResponse {
                    state: planned,
                    diagnostics: diags,
                };
            }
        };
        let id = ListenerRuleId {
            clb_id,
            listener_id,
            location_id,
        };
        tracing::info!("[{}.create] created rule {}", TYPE_NAME, id);

        let mut state = planned;
        state.set_string("id", id.to_string());

        match self.read_state(ctx, &id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("CLB listener rule not found after creation", Some(id.to_string()));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB listener rule", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let id = match rule_id(&request.current_state) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid CLB listener rule id", Some(e.to_string()));
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
                tracing::warn!("[{}.read] rule {} not found, removing from state", TYPE_NAME, id);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB listener rule", e);
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

        if reject_immutable(&planned, &prior, &["domain"], &mut diags) {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }
        let id = match rule_id(&prior) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid CLB listener rule id", Some(e.to_string()));
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        };

        let health_changed = std::iter::once(&"health_check_switch")
            .chain(HEALTH_CHECK_NUMBERS)
            .chain(HEALTH_CHECK_STRINGS)
            .any(|attribute| changed(&planned, &prior, attribute));

        let modify = ModifyRuleRequest {
            load_balancer_id: id.clb_id.clone(),
            listener_id: id.listener_id.clone(),
            location_id: id.location_id.clone(),
            url: changed(&planned, &prior, "url")
                .then(|| planned.get_string("url"))
                .flatten(),
            health_check: health_changed.then(|| health_check(&planned)).flatten(),
            scheduler: changed(&planned, &prior, "scheduler")
                .then(|| planned.get_string("scheduler"))
                .flatten(),
            session_expire_time: changed(&planned, &prior, "session_expire_time")
                .then(|| planned.get_i64("session_expire_time"))
                .flatten(),
        };

        if !modify.is_empty() {
            if let Err(e) = self.provider_data.client.clb().modify_rule(ctx, &modify).await {
                api_error(&mut diags, "Failed to modify CLB listener rule", e);
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
                diags.add_error("CLB listener rule not found after update", Some(id.to_string()));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB listener rule", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        match rule_id(&request.current_state) {
            Ok(id) => match self
                .provider_data
                .client
                .clb()
                .delete_rule(&request.context, &id)
                .await
            {
                Ok(()) => tracing::info!("[{}.delete] deleted rule {}", TYPE_NAME, id),
                Err(e) if e.is_not_found() => {}
                Err(e) => api_error(&mut diags, "Failed to delete CLB listener rule", e),
            },
            Err(e) => diags.add_error("Invalid CLB listener rule id", Some(e.to_string())),
        }
        DeleteResponse { diagnostics: diags }
    }
}

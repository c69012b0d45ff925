//! CLB listener resource

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse, ValidateRequest,
    ValidateResponse,
};
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed, reject_immutable};
use crate::api::clb::{Certificate, CreateListenerRequest, HealthCheck, Listener, ModifyListenerRequest};
use crate::api::ids::{check_listener_id, ListenerId};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_clb_listener";
const PROTOCOLS: &[&str] = &["TCP", "UDP", "HTTP", "HTTPS", "TCP_SSL"];
const SCHEDULERS: &[&str] = &["WRR", "LEAST_CONN"];
const SSL_MODES: &[&str] = &["UNIDIRECTIONAL", "MUTUAL"];

/// Attributes only layer-4 listeners carry; HTTP(S) keeps them on rules
const LAYER4_ATTRIBUTES: &[&str] = &[
    "health_check_switch",
    "health_check_time_out",
    "health_check_interval_time",
    "health_check_health_num",
    "health_check_unhealth_num",
    "scheduler",
    "session_expire_time",
];

const CERTIFICATE_ATTRIBUTES: &[&str] = &[
    "certificate_ssl_mode",
    "certificate_id",
    "certificate_ca_id",
];

fn is_layer7(protocol: &str) -> bool {
    protocol == "HTTP" || protocol == "HTTPS"
}

fn uses_certificate(protocol: &str) -> bool {
    protocol == "HTTPS" || protocol == "TCP_SSL"
}

fn is_set(state: &State, attribute: &str) -> bool {
    state.get(attribute).is_some_and(|v| !v.is_null())
}

pub struct ClbListenerResource {
    provider_data: TencentCloudProviderData,
}

impl ClbListenerResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        let mut builder = SchemaBuilder::new()
            .description("Provides a CLB listener")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID of the listener, in the form clb_id#listener_id"),
            )
            .attribute(
                "clb_id",
                AttributeBuilder::string("clb_id")
                    .required()
                    .force_new()
                    .description("ID of the CLB the listener belongs to"),
            )
            .attribute(
                "listener_id",
                AttributeBuilder::string("listener_id")
                    .computed()
                    .use_state_for_unknown()
                    .description("ID of the listener"),
            )
            .attribute(
                "listener_name",
                AttributeBuilder::string("listener_name")
                    .required()
                    .description("Name of the listener"),
            )
            .attribute(
                "port",
                AttributeBuilder::number("port")
                    .required()
                    .validator(Box::new(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(65535.0),
                    }))
                    .description("Port of the listener"),
            )
            .attribute(
                "protocol",
                AttributeBuilder::string("protocol")
                    .required()
                    .validator(StringOneOfValidator::new(PROTOCOLS))
                    .description("Protocol: TCP, UDP, HTTP, HTTPS or TCP_SSL"),
            )
            .attribute(
                "health_check_switch",
                AttributeBuilder::bool("health_check_switch")
                    .optional()
                    .computed()
                    .description("Whether health checks are enabled; layer-4 listeners only"),
            )
            .attribute(
                "scheduler",
                AttributeBuilder::string("scheduler")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::new(SCHEDULERS))
                    .description("Balancing method, WRR or LEAST_CONN; layer-4 listeners only"),
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
                "certificate_ssl_mode",
                AttributeBuilder::string("certificate_ssl_mode")
                    .optional()
                    .validator(StringOneOfValidator::new(SSL_MODES))
                    .description("SSL mode for HTTPS and TCP_SSL listeners"),
            )
            .attribute(
                "certificate_id",
                AttributeBuilder::string("certificate_id")
                    .optional()
                    .description("Server certificate for HTTPS and TCP_SSL listeners"),
            )
            .attribute(
                "certificate_ca_id",
                AttributeBuilder::string("certificate_ca_id")
                    .optional()
                    .description("Client CA certificate, required for MUTUAL mode"),
            );

        for (name, description) in [
            ("health_check_time_out", "Health check response timeout in seconds"),
            ("health_check_interval_time", "Interval between health checks in seconds"),
            ("health_check_health_num", "Successes before a backend is marked healthy"),
            ("health_check_unhealth_num", "Failures before a backend is marked unhealthy"),
        ] {
            builder = builder.attribute(
                name,
                AttributeBuilder::number(name)
                    .optional()
                    .computed()
                    .description(description),
            );
        }

        builder.build_resource(0)
    }

    /// Cross-attribute rules, checked on configuration
    fn check_protocol(config: &State, diags: &mut Diagnostics) {
        let protocol = match config.get_string("protocol") {
            Some(protocol) => protocol,
            None => return,
        };

        if is_layer7(&protocol) {
            for attribute in LAYER4_ATTRIBUTES {
                if is_set(config, attribute) {
                    diags.add_attribute_error(
                        attribute,
                        format!("{} can not be set on a {} listener", attribute, protocol),
                        Some("Configure it on tencentcloud_clb_listener_rule instead"),
                    );
                }
            }
        }

        if uses_certificate(&protocol) {
            for attribute in ["certificate_ssl_mode", "certificate_id"] {
                if !is_set(config, attribute) {
                    diags.add_attribute_error(
                        attribute,
                        format!("{} is required for a {} listener", attribute, protocol),
                        None::<String>,
                    );
                }
            }
            if config.get_string("certificate_ssl_mode").as_deref() == Some("MUTUAL")
                && !is_set(config, "certificate_ca_id")
            {
                diags.add_attribute_error(
                    "certificate_ca_id",
                    "certificate_ca_id is required when certificate_ssl_mode is MUTUAL",
                    None::<String>,
                );
            }
        } else {
            for attribute in CERTIFICATE_ATTRIBUTES {
                if is_set(config, attribute) {
                    diags.add_attribute_error(
                        attribute,
                        format!("{} can only be set on HTTPS or TCP_SSL listeners", attribute),
                        None::<String>,
                    );
                }
            }
        }
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &ListenerId,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let listener = match self
            .provider_data
            .client
            .clb()
            .describe_listener_by_id(ctx, id)
            .await?
        {
            Some(listener) => listener,
            None => return Ok(None),
        };

        state.set_string("id", id.to_string());
        state.set_string("clb_id", id.clb_id.clone());
        flatten_listener(&listener, &mut state);
        Ok(Some(state))
    }
}

fn health_check(planned: &State) -> Option<HealthCheck> {
    let switch = planned.get_bool("health_check_switch");
    let health_check = HealthCheck {
        health_switch: i64::from(switch.unwrap_or(true)),
        time_out: planned.get_i64("health_check_time_out"),
        interval_time: planned.get_i64("health_check_interval_time"),
        health_num: planned.get_i64("health_check_health_num"),
        un_health_num: planned.get_i64("health_check_unhealth_num"),
        ..Default::default()
    };
    let any_detail = health_check.time_out.is_some()
        || health_check.interval_time.is_some()
        || health_check.health_num.is_some()
        || health_check.un_health_num.is_some();
    (switch.is_some() || any_detail).then_some(health_check)
}

fn certificate(planned: &State) -> Option<Certificate> {
    let ssl_mode = planned.get_string("certificate_ssl_mode")?;
    Some(Certificate {
        ssl_mode,
        cert_id: planned.get_string("certificate_id").unwrap_or_default(),
        cert_ca_id: planned.get_string("certificate_ca_id").unwrap_or_default(),
    })
}

fn flatten_listener(listener: &Listener, state: &mut State) {
    state.set_string("listener_id", listener.listener_id.clone());
    state.set_string("listener_name", listener.listener_name.clone());
    state.set_string("protocol", listener.protocol.clone());
    state.set_i64("port", listener.port);

    if is_layer7(&listener.protocol) {
        for attribute in LAYER4_ATTRIBUTES {
            state.set_null(attribute);
        }
    } else {
        state.set_string("scheduler", listener.scheduler.clone());
        state.set_i64("session_expire_time", listener.session_expire_time);
        if let Some(hc) = &listener.health_check {
            state.set_bool("health_check_switch", hc.health_switch == 1);
            let numbers = [
                ("health_check_time_out", hc.time_out),
                ("health_check_interval_time", hc.interval_time),
                ("health_check_health_num", hc.health_num),
                ("health_check_unhealth_num", hc.un_health_num),
            ];
            for (attribute, value) in numbers {
                match value {
                    Some(value) => state.set_i64(attribute, value),
                    None => state.set_null(attribute),
                }
            }
        }
    }

    match &listener.certificate {
        Some(cert) if !cert.ssl_mode.is_empty() => {
            state.set_string("certificate_ssl_mode", cert.ssl_mode.clone());
            state.set_string("certificate_id", cert.cert_id.clone());
            if cert.cert_ca_id.is_empty() {
                state.set_null("certificate_ca_id");
            } else {
                state.set_string("certificate_ca_id", cert.cert_ca_id.clone());
            }
        }
        _ => {
            for attribute in CERTIFICATE_ATTRIBUTES {
                state.set_null(attribute);
            }
        }
    }
}

/// The state's id, checked for the two-part form and the listener prefix
fn listener_id(state: &State) -> Result<ListenerId, ApiError> {
    let raw = state.get_string("id").unwrap_or_default();
    let id = ListenerId::parse(&raw)?;
    check_listener_id(&id.listener_id)?;
    Ok(id)
}

#[async_trait]
impl Resource for ClbListenerResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn validate(&self, request: ValidateRequest) -> ValidateResponse {
        let mut diagnostics = Diagnostics::new();
        Self::check_protocol(&State::from(request.config), &mut diagnostics);
        ValidateResponse { diagnostics }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let planned = request.planned_state;

        Self::check_protocol(&State::from(request.config), &mut diags);
        if diags.has_errors() {
            return CreateResponse {
                state: planned,
                diagnostics: diags,
            };
        }

        let clb_id = planned.get_string("clb_id").unwrap_or_default();
        let protocol = planned.get_string("protocol").unwrap_or_default();
        let layer4 = !is_layer7(&protocol);
        let create = CreateListenerRequest {
            load_balancer_id: clb_id.clone(),
            ports: planned.get_i64("port").into_iter().collect(),
            protocol,
            listener_names: planned.get_string("listener_name").into_iter().collect(),
            health_check: health_check(&planned).filter(|_| layer4),
            certificate: certificate(&planned),
            session_expire_time: planned.get_i64("session_expire_time").filter(|_| layer4),
            scheduler: planned.get_string("scheduler").filter(|_| layer4),
        };

        let listener_id = match self.provider_data.client.clb().create_listener(ctx, &create).await {
            Ok(listener_id) => listener_id,
            Err(e) => {
                api_error(&mut diags, "Failed to create CLB listener", e);
                return CreateResponse {
                    state: planned,
                    diagnostics: diags,
                };
            }
        };
        let id = ListenerId {
            clb_id,
            listener_id,
        };
        tracing::info!("[{}.create] created listener {}", TYPE_NAME, id);

        let mut state = planned;
        state.set_string("id", id.to_string());

        match self.read_state(ctx, &id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("CLB listener not found after creation", Some(id.to_string()));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB listener", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let id = match listener_id(&request.current_state) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid CLB listener id", Some(e.to_string()));
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
                tracing::warn!("[{}.read] listener {} not found, removing from state", TYPE_NAME, id);
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB listener", e);
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

        if reject_immutable(&planned, &prior, &["port", "protocol"], &mut diags) {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }
        Self::check_protocol(&State::from(request.config), &mut diags);
        let id = match listener_id(&prior) {
            Ok(id) => id,
            Err(e) => {
                diags.add_error("Invalid CLB listener id", Some(e.to_string()));
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        };
        if diags.has_errors() {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }

        let protocol = prior.get_string("protocol").unwrap_or_default();
        let layer4 = !is_layer7(&protocol);
        let health_changed = [
            "health_check_switch",
            "health_check_time_out",
            "health_check_interval_time",
            "health_check_health_num",
            "health_check_unhealth_num",
        ]
        .iter()
        .any(|attribute| changed(&planned, &prior, attribute));
        let certificate_changed = CERTIFICATE_ATTRIBUTES
            .iter()
            .any(|attribute| changed(&planned, &prior, attribute));

        let modify = ModifyListenerRequest {
            load_balancer_id: id.clb_id.clone(),
            listener_id: id.listener_id.clone(),
            listener_name: changed(&planned, &prior, "listener_name")
                .then(|| planned.get_string("listener_name"))
                .flatten(),
            session_expire_time: (layer4 && changed(&planned, &prior, "session_expire_time"))
                .then(|| planned.get_i64("session_expire_time"))
                .flatten(),
            health_check: (layer4 && health_changed)
                .then(|| health_check(&planned))
                .flatten(),
            certificate: certificate_changed.then(|| certificate(&planned)).flatten(),
            scheduler: (layer4 && changed(&planned, &prior, "scheduler"))
                .then(|| planned.get_string("scheduler"))
                .flatten(),
        };

        if !modify.is_empty() {
            if let Err(e) = self.provider_data.client.clb().modify_listener(ctx, &modify).await {
                api_error(&mut diags, "Failed to modify CLB listener", e);
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
                diags.add_error("CLB listener not found after update", Some(id.to_string()));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read CLB listener", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        match listener_id(&request.current_state) {
            Ok(id) => match self
                .provider_data
                .client
                .clb()
                .delete_listener(&request.context, &id)
                .await
            {
                Ok(()) => tracing::info!("[{}.delete] deleted listener {}", TYPE_NAME, id),
                Err(e) if e.is_not_found() => {}
                Err(e) => api_error(&mut diags, "Failed to delete CLB listener", e),
            },
            Err(e) => diags.add_error("Invalid CLB listener id", Some(e.to_string())),
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

    fn tcp_state() -> State {
        let mut state = State::new();
        state.set_string("id", "lb-1#lbl-1");
        state.set_string("clb_id", "lb-1");
        state.set_string("listener_id", "lbl-1");
        state.set_string("listener_name", "tcp");
        state.set_i64("port", 80);
        state.set_string("protocol", "TCP");
        state.set_bool("health_check_switch", true);
        state.set_string("scheduler", "WRR");
        state.set_i64("session_expire_time", 0);
        state
    }

    #[test]
    fn https_listener_requires_certificate() {
        let mut config = State::new();
        config.set_string("protocol", "HTTPS");
        config.set_string("scheduler", "WRR");

        let mut diags = Diagnostics::new();
        ClbListenerResource::check_protocol(&config, &mut diags);

        let attributes: Vec<_> = diags
            .errors
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attributes.contains(&"scheduler"));
        assert!(attributes.contains(&"certificate_ssl_mode"));
        assert!(attributes.contains(&"certificate_id"));
    }

    #[tokio::test]
    async fn read_rejects_broken_id() {
        let server = mockito::Server::new_async().await;
        let mut state = tcp_state();
        state.set_string("id", "lb-1");

        let resource = ClbListenerResource::new(provider_data(&server.url()));
        let response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: state,
            })
            .await;

        assert!(response.diagnostics.has_errors());
        assert!(response.diagnostics.errors[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("id is broken"));
    }

    #[tokio::test]
    async fn read_rejects_listener_without_prefix() {
        let server = mockito::Server::new_async().await;
        let mut state = tcp_state();
        state.set_string("id", "lb-1#listener-1");

        let resource = ClbListenerResource::new(provider_data(&server.url()));
        let response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: state,
            })
            .await;

        assert!(response.diagnostics.errors[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("lbl-"));
    }

    #[tokio::test]
    async fn port_change_is_rejected_before_any_call() {
        let mut server = mockito::Server::new_async().await;
        let any = server.mock("POST", "/").expect(0).create_async().await;

        let prior = tcp_state();
        let mut planned = prior.clone();
        planned.set_i64("port", 8080);

        let resource = ClbListenerResource::new(provider_data(&server.url()));
        let response = resource
            .update(UpdateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned,
                current_state: prior,
            })
            .await;

        assert_eq!(response.diagnostics.errors[0].attribute.as_deref(), Some("port"));
        assert_eq!(response.state.get_i64("port"), Some(80));
        any.assert_async().await;
    }

    #[tokio::test]
    async fn rename_sends_only_listener_name() {
        let mut server = mockito::Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_header("x-tc-action", "ModifyListener")
            .match_body(Matcher::Json(serde_json::json!({
                "LoadBalancerId": "lb-1",
                "ListenerId": "lbl-1",
                "ListenerName": "renamed"
            })))
            .with_body(r#"{"Response":{"RequestId":"task-1"}}"#)
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
            .match_header("x-tc-action", "DescribeListeners")
            .with_body(
                r#"{"Response":{"Listeners":[{"ListenerId":"lbl-1","Protocol":"TCP","Port":80,
                    "ListenerName":"renamed","Scheduler":"WRR","SessionExpireTime":0,
                    "HealthCheck":{"HealthSwitch":1,"TimeOut":2,"IntervalTime":5,"HealthNum":3,"UnHealthNum":3}}],
                    "RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let prior = tcp_state();
        let mut planned = prior.clone();
        planned.set_string("listener_name", "renamed");
        let mut config = tfplug::Config::new();
        config.set_string("protocol", "TCP");

        let resource = ClbListenerResource::new(provider_data(&server.url()));
        let response = resource
            .update(UpdateRequest {
                context: Context::new(),
                config,
                planned_state: planned,
                current_state: prior,
            })
            .await;

        assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics);
        assert_eq!(response.state.get_string("listener_name").as_deref(), Some("renamed"));
        assert_eq!(response.state.get_i64("health_check_interval_time"), Some(5));
        modify.assert_async().await;
    }
}

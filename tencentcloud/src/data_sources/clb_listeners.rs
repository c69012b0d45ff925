//! Listeners of one CLB instance

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::validator::StringOneOfValidator;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_attribute, non_empty, publish_list, result_output_file_attribute};
use crate::api::clb::Listener;
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct ListenerItem {
    clb_id: String,
    listener_id: String,
    listener_name: String,
    protocol: String,
    port: i64,
    scheduler: Option<String>,
    session_expire_time: i64,
    health_check_switch: Option<bool>,
    health_check_time_out: Option<i64>,
    health_check_interval_time: Option<i64>,
    health_check_health_num: Option<i64>,
    health_check_unhealth_num: Option<i64>,
    certificate_ssl_mode: Option<String>,
    certificate_id: Option<String>,
    certificate_ca_id: Option<String>,
}

impl ListenerItem {
    fn new(clb_id: &str, listener: &Listener) -> Self {
        let hc = listener.health_check.as_ref();
        let cert = listener.certificate.as_ref();
        Self {
            clb_id: clb_id.to_string(),
            listener_id: listener.listener_id.clone(),
            listener_name: listener.listener_name.clone(),
            protocol: listener.protocol.clone(),
            port: listener.port,
            scheduler: non_empty(&listener.scheduler),
            session_expire_time: listener.session_expire_time,
            health_check_switch: hc.map(|h| h.health_switch == 1),
            health_check_time_out: hc.and_then(|h| h.time_out),
            health_check_interval_time: hc.and_then(|h| h.interval_time),
            health_check_health_num: hc.and_then(|h| h.health_num),
            health_check_unhealth_num: hc.and_then(|h| h.un_health_num),
            certificate_ssl_mode: cert.and_then(|c| non_empty(&c.ssl_mode)),
            certificate_id: cert.and_then(|c| non_empty(&c.cert_id)),
            certificate_ca_id: cert.and_then(|c| non_empty(&c.cert_ca_id)),
        }
    }
}

pub struct ClbListenersDataSource {
    provider_data: TencentCloudProviderData,
}

impl ClbListenersDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        SchemaBuilder::new()
            .description("Use this data source to query the listeners of a CLB instance")
            .attribute("id", id_attribute())
            .attribute(
                "clb_id",
                AttributeBuilder::string("clb_id")
                    .required()
                    .description("ID of the CLB the listeners belong to"),
            )
            .attribute("listener_id", AttributeBuilder::string("listener_id").optional())
            .attribute(
                "protocol",
                AttributeBuilder::string("protocol")
                    .optional()
                    .validator(StringOneOfValidator::new(&["TCP", "UDP", "HTTP", "HTTPS", "TCP_SSL"])),
            )
            .attribute(
                "port",
                AttributeBuilder::number("port")
                    .optional()
                    .description("Only listeners on this port"),
            )
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "listener_list",
                AttributeBuilder::object_list(
                    "listener_list",
                    [
                        ("clb_id", AttributeType::String),
                        ("listener_id", AttributeType::String),
                        ("listener_name", AttributeType::String),
                        ("protocol", AttributeType::String),
                        ("port", AttributeType::Number),
                        ("scheduler", AttributeType::String),
                        ("session_expire_time", AttributeType::Number),
                        ("health_check_switch", AttributeType::Bool),
                        ("health_check_time_out", AttributeType::Number),
                        ("health_check_interval_time", AttributeType::Number),
                        ("health_check_health_num", AttributeType::Number),
                        ("health_check_unhealth_num", AttributeType::Number),
                        ("certificate_ssl_mode", AttributeType::String),
                        ("certificate_id", AttributeType::String),
                        ("certificate_ca_id", AttributeType::String),
                    ],
                )
                .computed(),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for ClbListenersDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);

        let clb_id = state.get_string("clb_id").unwrap_or_default();
        let listener_ids: Vec<String> = state.get_string("listener_id").into_iter().collect();
        let protocol = state.get_string("protocol");
        let port = state.get_i64("port");

        match self
            .provider_data
            .client
            .clb()
            .describe_listeners(
                &request.context,
                &clb_id,
                &listener_ids,
                protocol.as_deref(),
                port,
            )
            .await
        {
            Ok(listeners) => {
                let items: Vec<ListenerItem> = listeners
                    .iter()
                    .map(|l| ListenerItem::new(&clb_id, l))
                    .collect();
                let ids: Vec<&str> = items.iter().map(|i| i.listener_id.as_str()).collect();
                publish_list(&mut state, "listener_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe CLB listeners", e),
        }

        ReadDataSourceResponse {
            state,
            diagnostics: diags,
        }
    }
}

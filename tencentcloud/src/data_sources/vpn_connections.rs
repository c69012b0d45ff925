//! VPN connection lookup
//!
//! The pre-shared key is never published.

use async_trait::async_trait;
use serde::Serialize;
use tfplug::request::{
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse, SchemaRequest,
};
use tfplug::schema::AttributeType;
use tfplug::{AttributeBuilder, DataSource, DataSourceSchema, Diagnostics, SchemaBuilder, State};

use super::{id_filter_attribute, non_empty, publish_list, result_output_file_attribute};
use crate::api::vpc::{SecurityPolicyDatabase, VpnConnection, VpnConnectionQuery};
use crate::provider_data::TencentCloudProviderData;
use crate::resources::api_error;

#[derive(Debug, Serialize)]
struct PolicyItem {
    local_cidr_block: String,
    remote_cidr_block: Vec<String>,
}

impl From<&SecurityPolicyDatabase> for PolicyItem {
    fn from(p: &SecurityPolicyDatabase) -> Self {
        Self {
            local_cidr_block: p.local_cidr_block.clone(),
            remote_cidr_block: p.remote_cidr_block.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ConnectionItem {
    id: String,
    name: String,
    vpc_id: String,
    vpn_gateway_id: String,
    customer_gateway_id: String,
    state: String,
    net_status: String,
    vpn_proto: String,
    encrypt_proto: String,
    route_type: String,
    create_time: String,
    security_group_policy: Vec<PolicyItem>,
    ike_proto_encry_algorithm: Option<String>,
    ike_proto_authen_algorithm: Option<String>,
    ike_exchange_mode: Option<String>,
    ike_dh_group_name: Option<String>,
    ike_sa_lifetime_seconds: Option<i64>,
    ipsec_encrypt_algorithm: Option<String>,
    ipsec_integrity_algorithm: Option<String>,
    ipsec_sa_lifetime_seconds: Option<i64>,
    ipsec_pfs_dh_group: Option<String>,
}

impl From<&VpnConnection> for ConnectionItem {
    fn from(c: &VpnConnection) -> Self {
        let ike = c.ike_options.as_ref();
        let ipsec = c.ipsec_options.as_ref();
        Self {
            id: c.vpn_connection_id.clone(),
            name: c.vpn_connection_name.clone(),
            vpc_id: c.vpc_id.clone(),
            vpn_gateway_id: c.vpn_gateway_id.clone(),
            customer_gateway_id: c.customer_gateway_id.clone(),
            state: c.state.clone(),
            net_status: c.net_status.clone(),
            vpn_proto: c.vpn_proto.clone(),
            encrypt_proto: c.encrypt_proto.clone(),
            route_type: c.route_type.clone(),
            create_time: c.created_time.clone(),
            security_group_policy: c
                .security_policy_database_set
                .iter()
                .map(PolicyItem::from)
                .collect(),
            ike_proto_encry_algorithm: ike.and_then(|o| non_empty(&o.encrypt_algorithm)),
            ike_proto_authen_algorithm: ike.and_then(|o| non_empty(&o.authen_algorithm)),
            ike_exchange_mode: ike.and_then(|o| non_empty(&o.exchange_mode)),
            ike_dh_group_name: ike.and_then(|o| non_empty(&o.dh_group_name)),
            ike_sa_lifetime_seconds: ike.and_then(|o| o.sa_lifetime_seconds),
            ipsec_encrypt_algorithm: ipsec.and_then(|o| non_empty(&o.encrypt_algorithm)),
            ipsec_integrity_algorithm: ipsec.and_then(|o| non_empty(&o.integrity_algorithm)),
            ipsec_sa_lifetime_seconds: ipsec.and_then(|o| o.sa_lifetime_seconds),
            ipsec_pfs_dh_group: ipsec.and_then(|o| non_empty(&o.pfs_dh_group)),
        }
    }
}

pub struct VpnConnectionsDataSource {
    provider_data: TencentCloudProviderData,
}

impl VpnConnectionsDataSource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> DataSourceSchema {
        let policy = AttributeType::object([
            ("local_cidr_block", AttributeType::String),
            ("remote_cidr_block", AttributeType::list_of(AttributeType::String)),
        ]);
        SchemaBuilder::new()
            .description("Use this data source to query VPN connections")
            .attribute("id", id_filter_attribute("VPN connection"))
            .attribute("name", AttributeBuilder::string("name").optional())
            .attribute("vpc_id", AttributeBuilder::string("vpc_id").optional())
            .attribute("vpn_gateway_id", AttributeBuilder::string("vpn_gateway_id").optional())
            .attribute(
                "customer_gateway_id",
                AttributeBuilder::string("customer_gateway_id").optional(),
            )
            .attribute("result_output_file", result_output_file_attribute())
            .attribute(
                "connection_list",
                AttributeBuilder::object_list(
                    "connection_list",
                    [
                        ("id", AttributeType::String),
                        ("name", AttributeType::String),
                        ("vpc_id", AttributeType::String),
                        ("vpn_gateway_id", AttributeType::String),
                        ("customer_gateway_id", AttributeType::String),
                        ("state", AttributeType::String),
                        ("net_status", AttributeType::String),
                        ("vpn_proto", AttributeType::String),
                        ("encrypt_proto", AttributeType::String),
                        ("route_type", AttributeType::String),
                        ("create_time", AttributeType::String),
                        ("security_group_policy", AttributeType::list_of(policy)),
                        ("ike_proto_encry_algorithm", AttributeType::String),
                        ("ike_proto_authen_algorithm", AttributeType::String),
                        ("ike_exchange_mode", AttributeType::String),
                        ("ike_dh_group_name", AttributeType::String),
                        ("ike_sa_lifetime_seconds", AttributeType::Number),
                        ("ipsec_encrypt_algorithm", AttributeType::String),
                        ("ipsec_integrity_algorithm", AttributeType::String),
                        ("ipsec_sa_lifetime_seconds", AttributeType::Number),
                        ("ipsec_pfs_dh_group", AttributeType::String),
                    ],
                )
                .computed(),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for VpnConnectionsDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diags = Diagnostics::new();
        let mut state = State::from(request.config);
        let query = VpnConnectionQuery {
            id: state.get_string("id"),
            name: state.get_string("name"),
            vpc_id: state.get_string("vpc_id"),
            vpn_gateway_id: state.get_string("vpn_gateway_id"),
            customer_gateway_id: state.get_string("customer_gateway_id"),
        };

        match self
            .provider_data
            .client
            .vpc()
            .describe_vpn_connections(&request.context, &query)
            .await
        {
            Ok(connections) => {
                let items: Vec<ConnectionItem> =
                    connections.iter().map(ConnectionItem::from).collect();
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                publish_list(&mut state, "connection_list", &ids, &items, &mut diags);
            }
            Err(e) => api_error(&mut diags, "Failed to describe VPN connections", e),
        }

        ReadDataSourceResponse {
            state,
            diagnostics: diags,
        }
    }
}

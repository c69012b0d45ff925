//! IPsec VPN connection between a VPN gateway and a customer gateway

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::defaults::StaticDefault;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::schema::AttributeType;
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Dynamic, Resource, ResourceSchema, SchemaBuilder,
    State,
};

use super::{
    api_error, changed, read_tags, reject_immutable, set_tags, state_tags, sync_tags, TagTarget,
};
use crate::api::retry::OperationClass;
use crate::api::state_change::StateChangeConf;
use crate::api::vpc::{
    CreateVpnConnectionRequest, IkeOptions, IpsecOptions, ModifyVpnConnectionAttributeRequest,
    SecurityPolicyDatabase, VpcTag, VpnConnection, VPN_STATE_AVAILABLE, VPN_STATE_PENDING,
    VPN_STATE_UPDATING,
};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_vpn_connection";
const TAGS: TagTarget = TagTarget {
    service: "vpc",
    resource_type: "vpnx",
};

const ENCRYPT_ALGORITHMS: &[&str] = &["3DES-CBC", "AES-CBC-128", "AES-CBC-192", "AES-CBC-256", "DES-CBC"];
const AUTHEN_ALGORITHMS: &[&str] = &["MD5", "SHA", "SHA1", "SHA-256"];
const EXCHANGE_MODES: &[&str] = &["MAIN", "AGGRESSIVE"];
const DH_GROUPS: &[&str] = &["GROUP1", "GROUP2", "GROUP5", "GROUP14", "GROUP24"];
const PFS_GROUPS: &[&str] = &["NULL", "DH-GROUP1", "DH-GROUP2", "DH-GROUP5", "DH-GROUP14", "DH-GROUP24"];

const IKE_ATTRIBUTES: &[&str] = &[
    "ike_proto_encry_algorithm",
    "ike_proto_authen_algorithm",
    "ike_exchange_mode",
    "ike_dh_group_name",
    "ike_sa_lifetime_seconds",
];
const IPSEC_ATTRIBUTES: &[&str] = &[
    "ipsec_encrypt_algorithm",
    "ipsec_integrity_algorithm",
    "ipsec_sa_lifetime_seconds",
    "ipsec_pfs_dh_group",
];

pub struct VpnConnectionResource {
    provider_data: TencentCloudProviderData,
}

impl VpnConnectionResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        let string_option = |name: &str, allowed: &'static [&'static str], default: &str| {
            AttributeBuilder::string(name)
                .optional()
                .computed()
                .validator(StringOneOfValidator::new(allowed))
                .default(StaticDefault::string(default))
        };
        let lifetime = |name: &str, min: f64, max: f64, default: f64| {
            AttributeBuilder::number(name)
                .optional()
                .computed()
                .validator(Box::new(NumberRangeValidator {
                    min: Some(min),
                    max: Some(max),
                }))
                .default(StaticDefault::number(default))
        };

        SchemaBuilder::new()
            .description("Provides an IPsec VPN connection")
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
                    .description("Name of the VPN connection"),
            )
            .attribute(
                "vpc_id",
                AttributeBuilder::string("vpc_id")
                    .required()
                    .description("VPC of the VPN gateway"),
            )
            .attribute(
                "vpn_gateway_id",
                AttributeBuilder::string("vpn_gateway_id")
                    .required()
                    .description("VPN gateway the connection terminates on"),
            )
            .attribute(
                "customer_gateway_id",
                AttributeBuilder::string("customer_gateway_id")
                    .required()
                    .description("Customer gateway on the remote side"),
            )
            .attribute(
                "pre_share_key",
                AttributeBuilder::string("pre_share_key")
                    .required()
                    .sensitive()
                    .description("Pre-shared key of the IKE negotiation"),
            )
            .attribute(
                "security_group_policy",
                AttributeBuilder::object_list(
                    "security_group_policy",
                    [
                        ("local_cidr_block", AttributeType::String),
                        (
                            "remote_cidr_block",
                            AttributeType::list_of(AttributeType::String),
                        ),
                    ],
                )
                .required()
                .description("SPD policies: a local CIDR and the remote CIDRs it may reach"),
            )
            .attribute(
                "ike_proto_encry_algorithm",
                string_option("ike_proto_encry_algorithm", ENCRYPT_ALGORITHMS, "3DES-CBC"),
            )
            .attribute(
                "ike_proto_authen_algorithm",
                string_option("ike_proto_authen_algorithm", AUTHEN_ALGORITHMS, "MD5"),
            )
            .attribute(
                "ike_exchange_mode",
                string_option("ike_exchange_mode", EXCHANGE_MODES, "MAIN"),
            )
            .attribute(
                "ike_dh_group_name",
                string_option("ike_dh_group_name", DH_GROUPS, "GROUP1"),
            )
            .attribute(
                "ike_sa_lifetime_seconds",
                lifetime("ike_sa_lifetime_seconds", 60.0, 604800.0, 86400.0),
            )
            .attribute(
                "ipsec_encrypt_algorithm",
                string_option("ipsec_encrypt_algorithm", ENCRYPT_ALGORITHMS, "3DES-CBC"),
            )
            .attribute(
                "ipsec_integrity_algorithm",
                string_option("ipsec_integrity_algorithm", AUTHEN_ALGORITHMS, "MD5"),
            )
            .attribute(
                "ipsec_sa_lifetime_seconds",
                lifetime("ipsec_sa_lifetime_seconds", 180.0, 604800.0, 3600.0),
            )
            .attribute(
                "ipsec_pfs_dh_group",
                string_option("ipsec_pfs_dh_group", PFS_GROUPS, "NULL"),
            )
            .attribute(
                "tags",
                AttributeBuilder::map("tags", AttributeType::String).optional(),
            )
            .attribute("state", AttributeBuilder::string("state").computed())
            .attribute("net_status", AttributeBuilder::string("net_status").computed())
            .attribute(
                "vpn_proto",
                AttributeBuilder::string("vpn_proto")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "encrypt_proto",
                AttributeBuilder::string("encrypt_proto")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "route_type",
                AttributeBuilder::string("route_type")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "create_time",
                AttributeBuilder::string("create_time")
                    .computed()
                    .use_state_for_unknown(),
            )
            .build_resource(0)
    }

    async fn wait_for_available(&self, ctx: &Context, connection_id: &str) -> Result<(), ApiError> {
        let client = &self.provider_data.client;
        StateChangeConf::new(
            &[VPN_STATE_PENDING, VPN_STATE_UPDATING],
            &[VPN_STATE_AVAILABLE],
            client.policy(OperationClass::Write).timeout,
        )
        .wait_for_state(ctx, || async move {
            let connection = client
                .vpc()
                .describe_vpn_connection_by_id(ctx, connection_id)
                .await?;
            Ok(connection.map(|c| ((), c.state)))
        })
        .await
    }

    /// The API never returns the pre-shared key, so the base state keeps it
    async fn read_state(
        &self,
        ctx: &Context,
        connection_id: &str,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let client = &self.provider_data.client;
        let connection = match client
            .vpc()
            .describe_vpn_connection_by_id(ctx, connection_id)
            .await?
        {
            Some(connection) => connection,
            None => return Ok(None),
        };
        let tags = read_tags(client, ctx, TAGS, connection_id).await?;

        flatten_connection(&connection, &mut state);
        set_tags(&mut state, tags);
        Ok(Some(state))
    }
}

fn security_policies(planned: &State) -> Vec<SecurityPolicyDatabase> {
    planned
        .get_object_list("security_group_policy")
        .unwrap_or_default()
        .into_iter()
        .map(|policy| SecurityPolicyDatabase {
            local_cidr_block: policy.get_string("local_cidr_block").unwrap_or_default(),
            remote_cidr_block: policy.get_string_list("remote_cidr_block").unwrap_or_default(),
        })
        .collect()
}

fn ike_options(planned: &State) -> IkeOptions {
    IkeOptions {
        encrypt_algorithm: planned.get_string("ike_proto_encry_algorithm").unwrap_or_default(),
        authen_algorithm: planned.get_string("ike_proto_authen_algorithm").unwrap_or_default(),
        exchange_mode: planned.get_string("ike_exchange_mode").unwrap_or_default(),
        dh_group_name: planned.get_string("ike_dh_group_name").unwrap_or_default(),
        sa_lifetime_seconds: planned.get_i64("ike_sa_lifetime_seconds"),
    }
}

fn ipsec_options(planned: &State) -> IpsecOptions {
    IpsecOptions {
        encrypt_algorithm: planned.get_string("ipsec_encrypt_algorithm").unwrap_or_default(),
        integrity_algorithm: planned.get_string("ipsec_integrity_algorithm").unwrap_or_default(),
        sa_lifetime_seconds: planned.get_i64("ipsec_sa_lifetime_seconds"),
        pfs_dh_group: planned.get_string("ipsec_pfs_dh_group").unwrap_or_default(),
    }
}

fn flatten_connection(connection: &VpnConnection, state: &mut State) {
    state.set_string("id", connection.vpn_connection_id.clone());
    state.set_string("name", connection.vpn_connection_name.clone());
    state.set_string("vpc_id", connection.vpc_id.clone());
    state.set_string("vpn_gateway_id", connection.vpn_gateway_id.clone());
    state.set_string("customer_gateway_id", connection.customer_gateway_id.clone());
    state.set_string("state", connection.state.clone());
    state.set_string("net_status", connection.net_status.clone());
    state.set_string("vpn_proto", connection.vpn_proto.clone());
    state.set_string("encrypt_proto", connection.encrypt_proto.clone());
    state.set_string("route_type", connection.route_type.clone());
    state.set_string("create_time", connection.created_time.clone());

    let policies = connection
        .security_policy_database_set
        .iter()
        .map(|policy| {
            Dynamic::Map(HashMap::from([
                (
                    "local_cidr_block".to_string(),
                    Dynamic::String(policy.local_cidr_block.clone()),
                ),
                (
                    "remote_cidr_block".to_string(),
                    Dynamic::string_list(policy.remote_cidr_block.iter().cloned()),
                ),
            ]))
        })
        .collect();
    state.set("security_group_policy", Dynamic::List(policies));

    if let Some(ike) = &connection.ike_options {
        state.set_string("ike_proto_encry_algorithm", ike.encrypt_algorithm.clone());
        state.set_string("ike_proto_authen_algorithm", ike.authen_algorithm.clone());
        state.set_string("ike_exchange_mode", ike.exchange_mode.clone());
        state.set_string("ike_dh_group_name", ike.dh_group_name.clone());
        if let Some(seconds) = ike.sa_lifetime_seconds {
            state.set_i64("ike_sa_lifetime_seconds", seconds);
        }
    }
    if let Some(ipsec) = &connection.ipsec_options {
        state.set_string("ipsec_encrypt_algorithm", ipsec.encrypt_algorithm.clone());
        state.set_string("ipsec_integrity_algorithm", ipsec.integrity_algorithm.clone());
        state.set_string("ipsec_pfs_dh_group", ipsec.pfs_dh_group.clone());
        if let Some(seconds) = ipsec.sa_lifetime_seconds {
            state.set_i64("ipsec_sa_lifetime_seconds", seconds);
        }
    }
}

#[async_trait]
impl Resource for VpnConnectionResource {
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

        let create = CreateVpnConnectionRequest {
            vpc_id: state.get_string("vpc_id").unwrap_or_default(),
            vpn_gateway_id: state.get_string("vpn_gateway_id").unwrap_or_default(),
            customer_gateway_id: state.get_string("customer_gateway_id").unwrap_or_default(),
            vpn_connection_name: state.get_string("name").unwrap_or_default(),
            pre_share_key: state.get_string("pre_share_key").unwrap_or_default(),
            security_policy_databases: security_policies(&state),
            ike_options: Some(ike_options(&state)),
            ipsec_options: Some(ipsec_options(&state)),
            tags: state_tags(&state)
                .into_iter()
                .map(|(key, value)| VpcTag { key, value })
                .collect(),
        };

        let connection_id = match self
            .provider_data
            .client
            .vpc()
            .create_vpn_connection(ctx, &create)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                api_error(&mut diags, "Failed to create VPN connection", e);
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        };
        tracing::info!("[{}.create] created vpn connection {}", TYPE_NAME, connection_id);
        state.set_string("id", connection_id.clone());

        if let Err(e) = self.wait_for_available(ctx, &connection_id).await {
            api_error(&mut diags, "VPN connection did not become available", e);
            return CreateResponse {
                state,
                diagnostics: diags,
            };
        }

        match self.read_state(ctx, &connection_id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("VPN connection not found after creation", Some(connection_id));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read VPN connection", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let connection_id = request.current_state.get_string("id").unwrap_or_default();

        match self
            .read_state(&request.context, &connection_id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResponse {
                state: Some(state),
                diagnostics: diags,
            },
            Ok(None) => {
                tracing::warn!(
                    "[{}.read] vpn connection {} not found, removing from state",
                    TYPE_NAME,
                    connection_id
                );
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read VPN connection", e);
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

        if reject_immutable(
            &planned,
            &prior,
            &["vpc_id", "vpn_gateway_id", "customer_gateway_id"],
            &mut diags,
        ) {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }
        let connection_id = prior.get_string("id").unwrap_or_default();

        let any_changed = |attributes: &[&str]| {
            attributes
                .iter()
                .any(|attribute| changed(&planned, &prior, attribute))
        };
        let modify = ModifyVpnConnectionAttributeRequest {
            vpn_connection_id: connection_id.clone(),
            vpn_connection_name: changed(&planned, &prior, "name")
                .then(|| planned.get_string("name"))
                .flatten(),
            pre_share_key: changed(&planned, &prior, "pre_share_key")
                .then(|| planned.get_string("pre_share_key"))
                .flatten(),
            security_policy_databases: changed(&planned, &prior, "security_group_policy")
                .then(|| security_policies(&planned)),
            ike_options: any_changed(IKE_ATTRIBUTES).then(|| ike_options(&planned)),
            ipsec_options: any_changed(IPSEC_ATTRIBUTES).then(|| ipsec_options(&planned)),
        };

        if !modify.is_empty() {
            let result = match client.vpc().modify_vpn_connection(ctx, &modify).await {
                Ok(()) => self.wait_for_available(ctx, &connection_id).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                api_error(&mut diags, "Failed to modify VPN connection", e);
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
                &connection_id,
                &state_tags(&prior),
                &state_tags(&planned),
            )
            .await
            {
                api_error(&mut diags, "Failed to modify VPN connection tags", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &connection_id, planned.clone()).await {
            Ok(Some(state)) => UpdateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("VPN connection not found after update", Some(connection_id));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read VPN connection", e);
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
        let connection_id = request.current_state.get_string("id").unwrap_or_default();
        let gateway_id = request
            .current_state
            .get_string("vpn_gateway_id")
            .unwrap_or_default();

        let id = connection_id.as_str();
        let result: Result<(), ApiError> = async {
            client.vpc().delete_vpn_connection(ctx, &gateway_id, id).await?;
            StateChangeConf::new(&[], &[], client.policy(OperationClass::Write).timeout)
                .wait_for_absence(ctx, || async move {
                    let connection = client.vpc().describe_vpn_connection_by_id(ctx, id).await?;
                    Ok(connection.map(|c| c.state))
                })
                .await
        }
        .await;

        match result {
            Ok(()) => tracing::info!("[{}.delete] deleted vpn connection {}", TYPE_NAME, connection_id),
            Err(e) if e.is_not_found() => {}
            Err(e) => api_error(&mut diags, "Failed to delete VPN connection", e),
        }
        DeleteResponse { diagnostics: diags }
    }
}

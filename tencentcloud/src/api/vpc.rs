//! VPC API (2017-03-12): network ACLs and VPN connections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use tfplug::Context;

use super::client::{Client, Product};
use super::error::ApiError;
use super::ids::FIELD_SEPARATOR;
use super::retry::OperationClass;

pub const VPC: Product = Product {
    service: "vpc",
    version: "2017-03-12",
};

const PAGE_SIZE: u64 = 100;

pub const VPN_STATE_AVAILABLE: &str = "AVAILABLE";
pub const VPN_STATE_PENDING: &str = "PENDING";
pub const VPN_STATE_UPDATING: &str = "UPDATING";

const ACL_ACTIONS: &[&str] = &["ACCEPT", "DROP"];
const ACL_PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP", "ALL"];

/// One ACL entry, written in configuration as `ACTION#CIDR#PORT#PROTOCOL`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclRule {
    pub action: String,
    pub cidr_block: String,
    pub port: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl AclRule {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let invalid = |reason: &str| {
            ApiError::Validation(format!("invalid acl rule {:?}: {}", raw, reason))
        };

        let parts: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
        if parts.len() != 4 {
            return Err(invalid("expected ACTION#CIDR#PORT#PROTOCOL"));
        }
        let action = parts[0].to_ascii_uppercase();
        let cidr = parts[1];
        let port = parts[2].to_ascii_uppercase();
        let protocol = parts[3].to_ascii_uppercase();

        if !ACL_ACTIONS.contains(&action.as_str()) {
            return Err(invalid("action must be ACCEPT or DROP"));
        }
        if !ACL_PROTOCOLS.contains(&protocol.as_str()) {
            return Err(invalid("protocol must be one of TCP, UDP, ICMP, ALL"));
        }
        if !is_ip_or_cidr(cidr) {
            return Err(invalid("cidr is not a valid IP address or CIDR block"));
        }
        if protocol == "ICMP" || protocol == "ALL" {
            if port != "ALL" {
                return Err(invalid("port must be ALL when protocol is ICMP or ALL"));
            }
        } else if port != "ALL" && !is_port_or_range(&port) {
            return Err(invalid("port must be ALL, a port or a range like 80-90"));
        }

        Ok(Self {
            action,
            cidr_block: cidr.to_string(),
            port,
            protocol,
            description: String::new(),
        })
    }
}

impl fmt::Display for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.action.to_ascii_uppercase(),
            self.cidr_block,
            self.port.to_ascii_uppercase(),
            self.protocol.to_ascii_uppercase(),
            sep = FIELD_SEPARATOR
        )
    }
}

fn is_ip_or_cidr(value: &str) -> bool {
    match value.split_once('/') {
        None => value.parse::<IpAddr>().is_ok(),
        Some((ip, prefix)) => match (ip.parse::<IpAddr>(), prefix.parse::<u8>()) {
            (Ok(IpAddr::V4(_)), Ok(p)) => p <= 32,
            (Ok(IpAddr::V6(_)), Ok(p)) => p <= 128,
            _ => false,
        },
    }
}

fn is_port_or_range(value: &str) -> bool {
    let valid = |p: &str| p.parse::<u16>().is_ok_and(|n| n > 0);
    match value.split_once('-') {
        None => valid(value),
        Some((from, to)) => {
            valid(from) && valid(to) && from.parse::<u16>().ok() < to.parse::<u16>().ok()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclSubnet {
    pub vpc_id: String,
    pub subnet_id: String,
    pub subnet_name: String,
    pub cidr_block: String,
    pub created_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkAcl {
    pub vpc_id: String,
    pub network_acl_id: String,
    pub network_acl_name: String,
    pub created_time: String,
    #[serde(deserialize_with = "super::null_default")]
    pub subnet_set: Vec<AclSubnet>,
    #[serde(deserialize_with = "super::null_default")]
    pub ingress_entries: Vec<AclRule>,
    #[serde(deserialize_with = "super::null_default")]
    pub egress_entries: Vec<AclRule>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Filter<'a> {
    name: &'a str,
    values: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNetworkAclsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    network_acl_ids: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<Filter<'a>>,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNetworkAclsResponse {
    #[serde(default, deserialize_with = "super::null_default")]
    network_acl_set: Vec<NetworkAcl>,
    #[serde(default)]
    total_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateNetworkAclRequest<'a> {
    vpc_id: &'a str,
    network_acl_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateNetworkAclResponse {
    network_acl: NetworkAcl,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyNetworkAclAttributeRequest<'a> {
    network_acl_id: &'a str,
    network_acl_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkAclEntrySet<'a> {
    ingress: &'a [AclRule],
    egress: &'a [AclRule],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyNetworkAclEntriesRequest<'a> {
    network_acl_id: &'a str,
    network_acl_entry_set: NetworkAclEntrySet<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkAclIdRequest<'a> {
    network_acl_id: &'a str,
}

/// Filters for [`VpcService::describe_network_acls`]
#[derive(Debug, Clone, Default)]
pub struct AclQuery {
    pub id: Option<String>,
    pub vpc_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct VpcTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityPolicyDatabase {
    pub local_cidr_block: String,
    #[serde(deserialize_with = "super::null_default")]
    pub remote_cidr_block: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IkeOptions {
    #[serde(rename = "PropoEncryAlgorithm", skip_serializing_if = "String::is_empty")]
    pub encrypt_algorithm: String,
    #[serde(rename = "PropoAuthenAlgorithm", skip_serializing_if = "String::is_empty")]
    pub authen_algorithm: String,
    #[serde(rename = "ExchangeMode", skip_serializing_if = "String::is_empty")]
    pub exchange_mode: String,
    #[serde(rename = "DhGroupName", skip_serializing_if = "String::is_empty")]
    pub dh_group_name: String,
    #[serde(rename = "IKESaLifetimeSeconds", skip_serializing_if = "Option::is_none")]
    pub sa_lifetime_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IpsecOptions {
    #[serde(rename = "EncryptAlgorithm", skip_serializing_if = "String::is_empty")]
    pub encrypt_algorithm: String,
    /// The API drops the trailing "m"
    #[serde(rename = "IntegrityAlgorith", skip_serializing_if = "String::is_empty")]
    pub integrity_algorithm: String,
    #[serde(rename = "IPSECSaLifetimeSeconds", skip_serializing_if = "Option::is_none")]
    pub sa_lifetime_seconds: Option<i64>,
    #[serde(rename = "PfsDhGroup", skip_serializing_if = "String::is_empty")]
    pub pfs_dh_group: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VpnConnection {
    pub vpn_connection_id: String,
    pub vpn_connection_name: String,
    pub vpc_id: String,
    pub vpn_gateway_id: String,
    pub customer_gateway_id: String,
    pub pre_share_key: String,
    pub vpn_proto: String,
    pub encrypt_proto: String,
    pub route_type: String,
    pub created_time: String,
    pub state: String,
    pub net_status: String,
    #[serde(deserialize_with = "super::null_default")]
    pub security_policy_database_set: Vec<SecurityPolicyDatabase>,
    #[serde(rename = "IKEOptionsSpecification")]
    pub ike_options: Option<IkeOptions>,
    #[serde(rename = "IPSECOptionsSpecification")]
    pub ipsec_options: Option<IpsecOptions>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpnConnectionRequest {
    pub vpc_id: String,
    pub vpn_gateway_id: String,
    pub customer_gateway_id: String,
    pub vpn_connection_name: String,
    pub pre_share_key: String,
    pub security_policy_databases: Vec<SecurityPolicyDatabase>,
    #[serde(rename = "IKEOptionsSpecification", skip_serializing_if = "Option::is_none")]
    pub ike_options: Option<IkeOptions>,
    #[serde(rename = "IPSECOptionsSpecification", skip_serializing_if = "Option::is_none")]
    pub ipsec_options: Option<IpsecOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<VpcTag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateVpnConnectionResponse {
    vpn_connection: VpnConnection,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyVpnConnectionAttributeRequest {
    pub vpn_connection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_connection_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_share_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_policy_databases: Option<Vec<SecurityPolicyDatabase>>,
    #[serde(rename = "IKEOptionsSpecification", skip_serializing_if = "Option::is_none")]
    pub ike_options: Option<IkeOptions>,
    #[serde(rename = "IPSECOptionsSpecification", skip_serializing_if = "Option::is_none")]
    pub ipsec_options: Option<IpsecOptions>,
}

impl ModifyVpnConnectionAttributeRequest {
    pub fn is_empty(&self) -> bool {
        self.vpn_connection_name.is_none()
            && self.pre_share_key.is_none()
            && self.security_policy_databases.is_none()
            && self.ike_options.is_none()
            && self.ipsec_options.is_none()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpnConnectionsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    vpn_connection_ids: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<Filter<'a>>,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpnConnectionsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default, deserialize_with = "super::null_default")]
    vpn_connection_set: Vec<VpnConnection>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteVpnConnectionRequest<'a> {
    vpn_gateway_id: &'a str,
    vpn_connection_id: &'a str,
}

#[derive(Deserialize)]
struct Empty {}

/// Filters for [`VpcService::describe_vpn_connections`]
#[derive(Debug, Clone, Default)]
pub struct VpnConnectionQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    pub vpc_id: Option<String>,
    pub vpn_gateway_id: Option<String>,
    pub customer_gateway_id: Option<String>,
}

pub struct VpcService<'a> {
    client: &'a Client,
}

impl<'a> VpcService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_network_acl(
        &self,
        ctx: &Context,
        vpc_id: &str,
        name: &str,
    ) -> Result<String, ApiError> {
        let request = CreateNetworkAclRequest {
            vpc_id,
            network_acl_name: name,
        };
        let response: CreateNetworkAclResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, VPC, "CreateNetworkAcl", &request)
            .await?;
        Ok(response.network_acl.network_acl_id)
    }

    pub async fn describe_network_acls(
        &self,
        ctx: &Context,
        query: &AclQuery,
    ) -> Result<Vec<NetworkAcl>, ApiError> {
        let mut result = Vec::new();
        let mut offset = 0;

        loop {
            let mut filters = Vec::new();
            if let Some(vpc_id) = query.vpc_id.as_deref() {
                filters.push(Filter {
                    name: "vpc-id",
                    values: [vpc_id],
                });
            }
            if let Some(name) = query.name.as_deref() {
                filters.push(Filter {
                    name: "network-acl-name",
                    values: [name],
                });
            }
            let request = DescribeNetworkAclsRequest {
                network_acl_ids: query.id.as_deref().map(|id| [id]),
                filters,
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeNetworkAclsResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, VPC, "DescribeNetworkAcls", &request)
                .await?;

            let page_len = response.network_acl_set.len() as u64;
            result.extend(response.network_acl_set);
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                break;
            }
        }
        Ok(result)
    }

    pub async fn describe_network_acl_by_id(
        &self,
        ctx: &Context,
        acl_id: &str,
    ) -> Result<Option<NetworkAcl>, ApiError> {
        let query = AclQuery {
            id: Some(acl_id.to_string()),
            ..Default::default()
        };
        match self.describe_network_acls(ctx, &query).await {
            Ok(list) => Ok(list.into_iter().find(|acl| acl.network_acl_id == acl_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_network_acl_name(
        &self,
        ctx: &Context,
        acl_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        let request = ModifyNetworkAclAttributeRequest {
            network_acl_id: acl_id,
            network_acl_name: name,
        };
        let _: Empty = self
            .client
            .call_with_retry(
                ctx,
                OperationClass::Write,
                VPC,
                "ModifyNetworkAclAttribute",
                &request,
            )
            .await?;
        Ok(())
    }

    /// Replaces the full ingress and egress entry lists
    pub async fn modify_network_acl_entries(
        &self,
        ctx: &Context,
        acl_id: &str,
        ingress: &[AclRule],
        egress: &[AclRule],
    ) -> Result<(), ApiError> {
        let request = ModifyNetworkAclEntriesRequest {
            network_acl_id: acl_id,
            network_acl_entry_set: NetworkAclEntrySet { ingress, egress },
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, VPC, "ModifyNetworkAclEntries", &request)
            .await?;
        Ok(())
    }

    pub async fn delete_network_acl(&self, ctx: &Context, acl_id: &str) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(
                ctx,
                OperationClass::Write,
                VPC,
                "DeleteNetworkAcl",
                &NetworkAclIdRequest {
                    network_acl_id: acl_id,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn create_vpn_connection(
        &self,
        ctx: &Context,
        request: &CreateVpnConnectionRequest,
    ) -> Result<String, ApiError> {
        let response: CreateVpnConnectionResponse = self
            .client
            .call_with_retry(ctx, OperationClass::Write, VPC, "CreateVpnConnection", request)
            .await?;
        Ok(response.vpn_connection.vpn_connection_id)
    }

    pub async fn describe_vpn_connections(
        &self,
        ctx: &Context,
        query: &VpnConnectionQuery,
    ) -> Result<Vec<VpnConnection>, ApiError> {
        let mut result = Vec::new();
        let mut offset = 0;

        loop {
            let mut filters = Vec::new();
            let named = [
                ("vpn-connection-name", &query.name),
                ("vpc-id", &query.vpc_id),
                ("vpn-gateway-id", &query.vpn_gateway_id),
                ("customer-gateway-id", &query.customer_gateway_id),
            ];
            for (name, value) in named {
                if let Some(value) = value.as_deref() {
                    filters.push(Filter {
                        name,
                        values: [value],
                    });
                }
            }
            let request = DescribeVpnConnectionsRequest {
                vpn_connection_ids: query.id.as_deref().map(|id| [id]),
                filters,
                offset,
                limit: PAGE_SIZE,
            };
            let response: DescribeVpnConnectionsResponse = self
                .client
                .call_with_retry(ctx, OperationClass::Read, VPC, "DescribeVpnConnections", &request)
                .await?;

            let page_len = response.vpn_connection_set.len() as u64;
            result.extend(response.vpn_connection_set);
            offset += page_len;
            if page_len < PAGE_SIZE || offset >= response.total_count {
                break;
            }
        }
        Ok(result)
    }

    pub async fn describe_vpn_connection_by_id(
        &self,
        ctx: &Context,
        connection_id: &str,
    ) -> Result<Option<VpnConnection>, ApiError> {
        let query = VpnConnectionQuery {
            id: Some(connection_id.to_string()),
            ..Default::default()
        };
        match self.describe_vpn_connections(ctx, &query).await {
            Ok(list) => Ok(list
                .into_iter()
                .find(|c| c.vpn_connection_id == connection_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_vpn_connection(
        &self,
        ctx: &Context,
        request: &ModifyVpnConnectionAttributeRequest,
    ) -> Result<(), ApiError> {
        let _: Empty = self
            .client
            .call_with_retry(
                ctx,
                OperationClass::Write,
                VPC,
                "ModifyVpnConnectionAttribute",
                request,
            )
            .await?;
        Ok(())
    }

    pub async fn delete_vpn_connection(
        &self,
        ctx: &Context,
        vpn_gateway_id: &str,
        connection_id: &str,
    ) -> Result<(), ApiError> {
        let request = DeleteVpnConnectionRequest {
            vpn_gateway_id,
            vpn_connection_id: connection_id,
        };
        let _: Empty = self
            .client
            .call_with_retry(ctx, OperationClass::Write, VPC, "DeleteVpnConnection", &request)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Matcher;

    #[test]
    fn acl_rule_parses_and_formats() {
        let rule = AclRule::parse("accept#192.168.1.0/24#80-90#tcp").unwrap();
        assert_eq!(rule.action, "ACCEPT");
        assert_eq!(rule.cidr_block, "192.168.1.0/24");
        assert_eq!(rule.port, "80-90");
        assert_eq!(rule.protocol, "TCP");
        assert_eq!(rule.to_string(), "ACCEPT#192.168.1.0/24#80-90#TCP");

        let icmp = AclRule::parse("DROP#10.0.0.1#ALL#ICMP").unwrap();
        assert_eq!(icmp.port, "ALL");
    }

    #[test]
    fn acl_rule_rejects_malformed_input() {
        for raw in [
            "ACCEPT#192.168.1.0/24#80",
            "ALLOW#192.168.1.0/24#80#TCP",
            "ACCEPT#192.168.1.0/33#80#TCP",
            "ACCEPT#not-an-ip#80#TCP",
            "ACCEPT#10.0.0.0/8#80#GRE",
            "ACCEPT#10.0.0.0/8#80#ICMP",
            "ACCEPT#10.0.0.0/8#90-80#TCP",
            "ACCEPT#10.0.0.0/8#0#UDP",
        ] {
            let err = AclRule::parse(raw).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{}", raw);
        }
    }

    #[tokio::test]
    async fn acl_entries_are_sent_as_entry_set() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "ModifyNetworkAclEntries")
            .match_body(Matcher::Json(serde_json::json!({
                "NetworkAclId": "acl-1",
                "NetworkAclEntrySet": {
                    "Ingress": [{"Action": "ACCEPT", "CidrBlock": "10.0.0.0/8", "Port": "80", "Protocol": "TCP"}],
                    "Egress": []
                }
            })))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let ingress = vec![AclRule::parse("ACCEPT#10.0.0.0/8#80#TCP").unwrap()];
        client
            .vpc()
            .modify_network_acl_entries(&Context::new(), "acl-1", &ingress, &[])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn vpn_connection_filters_are_named() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeVpnConnections")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Filters": [{"Name": "vpc-id", "Values": ["vpc-1"]}]
            })))
            .with_body(
                r#"{"Response":{"TotalCount":1,"VpnConnectionSet":[{"VpnConnectionId":"vpnx-1",
                    "State":"AVAILABLE","SecurityPolicyDatabaseSet":[{"LocalCidrBlock":"10.0.0.0/16",
                    "RemoteCidrBlock":["192.168.0.0/24"]}],
                    "IKEOptionsSpecification":{"PropoEncryAlgorithm":"AES-CBC-128","IKESaLifetimeSeconds":86400}}],
                    "RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let list = client
            .vpc()
            .describe_vpn_connections(
                &Context::new(),
                &VpnConnectionQuery {
                    vpc_id: Some("vpc-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].state, VPN_STATE_AVAILABLE);
        let ike = list[0].ike_options.as_ref().unwrap();
        assert_eq!(ike.encrypt_algorithm, "AES-CBC-128");
        assert_eq!(ike.sa_lifetime_seconds, Some(86400));
        mock.assert_async().await;
    }
}

pub mod api;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::OnceLock;
use tfplug::request::{ConfigureRequest, ConfigureResponse};
use tfplug::validator::StringOneOfValidator;
use tfplug::{
    AttributeBuilder, Config, DataSource, DataSourceSchema, Diagnostics, Provider, ProviderSchema,
    Resource, ResourceSchema, SchemaBuilder, TfplugError,
};

use api::{Client, ClientConfig, Credential};
use provider_data::TencentCloudProviderData;

pub struct TencentCloudProvider {
    provider_data: Option<TencentCloudProviderData>,
}

impl Default for TencentCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TencentCloudProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }
}

/// Provider block value, falling back to the environment
fn setting(config: &Config, attribute: &str, env: &str) -> Option<String> {
    config
        .get_string(attribute)
        .or_else(|| std::env::var(env).ok())
        .filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl Provider for TencentCloudProvider {
    fn schema(&self) -> ProviderSchema {
        SchemaBuilder::new()
            .description("Terraform provider for Tencent Cloud")
            .attribute(
                "secret_id",
                AttributeBuilder::string("secret_id")
                    .optional()
                    .description("API secret ID, or TENCENTCLOUD_SECRET_ID"),
            )
            .attribute(
                "secret_key",
                AttributeBuilder::string("secret_key")
                    .optional()
                    .sensitive()
                    .description("API secret key, or TENCENTCLOUD_SECRET_KEY"),
            )
            .attribute(
                "security_token",
                AttributeBuilder::string("security_token")
                    .optional()
                    .sensitive()
                    .description("Temporary credential token, or TENCENTCLOUD_SECURITY_TOKEN"),
            )
            .attribute(
                "region",
                AttributeBuilder::string("region")
                    .optional()
                    .description("Region such as ap-guangzhou, or TENCENTCLOUD_REGION"),
            )
            .attribute(
                "protocol",
                AttributeBuilder::string("protocol")
                    .optional()
                    .validator(StringOneOfValidator::new(&["HTTPS", "HTTP"]))
                    .description("HTTPS (default) or HTTP, or TENCENTCLOUD_PROTOCOL"),
            )
            .attribute(
                "domain",
                AttributeBuilder::string("domain")
                    .optional()
                    .description("Root API domain, or TENCENTCLOUD_DOMAIN"),
            )
            .attribute(
                "endpoint",
                AttributeBuilder::string("endpoint")
                    .optional()
                    .description("Send every API call to this URL, or TENCENTCLOUD_ENDPOINT"),
            )
            .build_provider()
    }

    async fn configure(&mut self, request: ConfigureRequest) -> ConfigureResponse {
        let config = &request.config;
        let mut diags = Diagnostics::new();

        let secret_id = setting(config, "secret_id", "TENCENTCLOUD_SECRET_ID");
        let secret_key = setting(config, "secret_key", "TENCENTCLOUD_SECRET_KEY");
        let region = setting(config, "region", "TENCENTCLOUD_REGION");

        for (value, message) in [
            (
                &secret_id,
                "secret_id is required (set in provider config or TENCENTCLOUD_SECRET_ID env var)",
            ),
            (
                &secret_key,
                "secret_key is required (set in provider config or TENCENTCLOUD_SECRET_KEY env var)",
            ),
            (
                &region,
                "region is required (set in provider config or TENCENTCLOUD_REGION env var)",
            ),
        ] {
            if value.is_none() {
                diags.add_error(message, None::<String>);
            }
        }

        let (Some(secret_id), Some(secret_key), Some(region)) = (secret_id, secret_key, region)
        else {
            return ConfigureResponse { diagnostics: diags };
        };

        let credential = Credential {
            secret_id,
            secret_key,
            token: setting(config, "security_token", "TENCENTCLOUD_SECURITY_TOKEN"),
        };
        let mut client_config = ClientConfig::new(credential, region);
        if let Some(protocol) = setting(config, "protocol", "TENCENTCLOUD_PROTOCOL") {
            client_config.protocol = protocol;
        }
        if let Some(domain) = setting(config, "domain", "TENCENTCLOUD_DOMAIN") {
            client_config.domain = domain;
        }
        if let Some(endpoint) = setting(config, "endpoint", "TENCENTCLOUD_ENDPOINT") {
            client_config = client_config.with_endpoint(endpoint);
        }

        match Client::new(client_config) {
            Ok(client) => {
                tracing::info!(region = %client.region(), "configured tencentcloud provider");
                self.provider_data = Some(TencentCloudProviderData::new(client));
            }
            Err(e) => diags.add_error(format!("Failed to create API client: {}", e), None::<String>),
        }

        ConfigureResponse { diagnostics: diags }
    }

    async fn create_resource(&self, name: &str) -> tfplug::Result<Box<dyn Resource>> {
        let data = self
            .provider_data
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)?;

        use resources::*;
        Ok(match name {
            "tencentcloud_clb_instance" => Box::new(ClbInstanceResource::new(data)),
            "tencentcloud_clb_listener" => Box::new(ClbListenerResource::new(data)),
            "tencentcloud_clb_listener_rule" => Box::new(ClbListenerRuleResource::new(data)),
            "tencentcloud_clb_redirection" => Box::new(ClbRedirectionResource::new(data)),
            "tencentcloud_cdn_domain" => Box::new(CdnDomainResource::new(data)),
            "tencentcloud_tcr_instance" => Box::new(TcrInstanceResource::new(data)),
            "tencentcloud_tcr_namespace" => Box::new(TcrNamespaceResource::new(data)),
            "tencentcloud_tdmq_instance" => Box::new(TdmqInstanceResource::new(data)),
            "tencentcloud_vpc_acl" => Box::new(VpcAclResource::new(data)),
            "tencentcloud_vpn_connection" => Box::new(VpnConnectionResource::new(data)),
            "tencentcloud_tag" => Box::new(TagResource::new(data)),
            _ => return Err(TfplugError::ResourceNotFound(name.to_string())),
        })
    }

    async fn create_data_source(&self, name: &str) -> tfplug::Result<Box<dyn DataSource>> {
        let data = self
            .provider_data
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)?;

        use data_sources::*;
        Ok(match name {
            "tencentcloud_clb_instances" => Box::new(ClbInstancesDataSource::new(data)),
            "tencentcloud_clb_listeners" => Box::new(ClbListenersDataSource::new(data)),
            "tencentcloud_cdn_domains" => Box::new(CdnDomainsDataSource::new(data)),
            "tencentcloud_tcr_instances" => Box::new(TcrInstancesDataSource::new(data)),
            "tencentcloud_tdmq_instances" => Box::new(TdmqInstancesDataSource::new(data)),
            "tencentcloud_vpc_acls" => Box::new(VpcAclsDataSource::new(data)),
            "tencentcloud_vpn_connections" => Box::new(VpnConnectionsDataSource::new(data)),
            _ => return Err(TfplugError::DataSourceNotFound(name.to_string())),
        })
    }

    async fn resource_schemas(&self) -> HashMap<String, ResourceSchema> {
        static SCHEMAS: OnceLock<HashMap<String, ResourceSchema>> = OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                use resources::*;
                [
                    ("tencentcloud_clb_instance", ClbInstanceResource::schema_static()),
                    ("tencentcloud_clb_listener", ClbListenerResource::schema_static()),
                    ("tencentcloud_clb_listener_rule", ClbListenerRuleResource::schema_static()),
                    ("tencentcloud_clb_redirection", ClbRedirectionResource::schema_static()),
                    ("tencentcloud_cdn_domain", CdnDomainResource::schema_static()),
                    ("tencentcloud_tcr_instance", TcrInstanceResource::schema_static()),
                    ("tencentcloud_tcr_namespace", TcrNamespaceResource::schema_static()),
                    ("tencentcloud_tdmq_instance", TdmqInstanceResource::schema_static()),
                    ("tencentcloud_vpc_acl", VpcAclResource::schema_static()),
                    ("tencentcloud_vpn_connection", VpnConnectionResource::schema_static()),
                    ("tencentcloud_tag", TagResource::schema_static()),
                ]
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect()
            })
            .clone()
    }

    async fn data_source_schemas(&self) -> HashMap<String, DataSourceSchema> {
        static SCHEMAS: OnceLock<HashMap<String, DataSourceSchema>> = OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                use data_sources::*;
                [
                    ("tencentcloud_clb_instances", ClbInstancesDataSource::schema_static()),
                    ("tencentcloud_clb_listeners", ClbListenersDataSource::schema_static()),
                    ("tencentcloud_cdn_domains", CdnDomainsDataSource::schema_static()),
                    ("tencentcloud_tcr_instances", TcrInstancesDataSource::schema_static()),
                    ("tencentcloud_tdmq_instances", TdmqInstancesDataSource::schema_static()),
                    ("tencentcloud_vpc_acls", VpcAclsDataSource::schema_static()),
                    ("tencentcloud_vpn_connections", VpnConnectionsDataSource::schema_static()),
                ]
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect()
            })
            .clone()
    }
}

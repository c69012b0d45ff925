//! gRPC service implementation
//!
//! Translates Terraform Plugin Protocol v6 calls into calls on a
//! [`Provider`]. Resources and data sources are created through the
//! provider's factory methods for every call, so no per-resource state is
//! held here.

use crate::context::Context;
use crate::planning::{conform_to_schema, plan_resource_change};
use crate::proto::{self, attribute_path, diagnostic, provider_server, schema, StringKind};
use crate::provider::{Provider, ResourceSchema};
use crate::request::{
    ConfigureRequest, CreateRequest, DeleteRequest, ImportStateRequest, ReadDataSourceRequest,
    ReadRequest, UpdateRequest, ValidateRequest,
};
use crate::schema::Attribute;
use crate::types::{decode_json, decode_msgpack, encode_msgpack, Config, Diagnostics, Dynamic, State};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type RpcResult<T> = std::result::Result<Response<T>, Status>;

pub struct GrpcService<P: Provider> {
    provider: Arc<RwLock<P>>,
    root: Context,
}

impl<P: Provider + 'static> GrpcService<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            root: Context::new(),
        }
    }

    /// Wraps the service for registration with a tonic server
    pub fn into_server(self) -> provider_server::ProviderServer<Self> {
        provider_server::ProviderServer::new(self)
    }

    async fn resource_schema(&self, type_name: &str) -> std::result::Result<ResourceSchema, Status> {
        let provider = self.provider.read().await;
        provider
            .resource_schemas()
            .await
            .remove(type_name)
            .ok_or_else(|| Status::not_found(format!("Unknown resource type: {}", type_name)))
    }

    async fn data_source_attributes(
        &self,
        type_name: &str,
    ) -> std::result::Result<HashMap<String, Attribute>, Status> {
        let provider = self.provider.read().await;
        provider
            .data_source_schemas()
            .await
            .remove(type_name)
            .map(|schema| schema.attributes)
            .ok_or_else(|| Status::not_found(format!("Unknown data source type: {}", type_name)))
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> provider_server::Provider for GrpcService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> RpcResult<proto::get_metadata::Response> {
        let provider = self.provider.read().await;

        let mut resources: Vec<String> = provider.resource_schemas().await.into_keys().collect();
        resources.sort();
        let mut data_sources: Vec<String> =
            provider.data_source_schemas().await.into_keys().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> RpcResult<proto::get_provider_schema::Response> {
        let provider = self.provider.read().await;
        let provider_schema = provider.schema();

        let resource_schemas = provider
            .resource_schemas()
            .await
            .into_iter()
            .map(|(name, s)| (name, to_proto_schema(s.version, &s.description, &s.attributes)))
            .collect();
        let data_source_schemas = provider
            .data_source_schemas()
            .await
            .into_iter()
            .map(|(name, s)| (name, to_proto_schema(s.version, &s.description, &s.attributes)))
            .collect();

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(to_proto_schema(
                0,
                &provider_schema.description,
                &provider_schema.attributes,
            )),
            resource_schemas,
            data_source_schemas,
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> RpcResult<proto::validate_provider_config::Response> {
        let req = request.into_inner();
        let config = decode_value(&req.config)?;
        let schema = self.provider.read().await.schema();

        let diagnostics = validate_config(&schema.attributes, &config);
        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: convert_diagnostics(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> RpcResult<proto::validate_resource_config::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;
        let config = decode_value(&req.config)?;

        let mut diagnostics = validate_config(&schema.attributes, &config);

        // resources can only be built once the provider is configured
        let provider = self.provider.read().await;
        if let Ok(resource) = provider.create_resource(&req.type_name).await {
            let response = resource
                .validate(ValidateRequest {
                    context: self.root.child(),
                    config: Config::from_dynamic(config),
                })
                .await;
            diagnostics.extend(response.diagnostics);
        }

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: convert_diagnostics(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> RpcResult<proto::validate_data_resource_config::Response> {
        let req = request.into_inner();
        let attributes = self.data_source_attributes(&req.type_name).await?;
        let config = decode_value(&req.config)?;

        let mut diagnostics = validate_config(&attributes, &config);

        let provider = self.provider.read().await;
        if let Ok(data_source) = provider.create_data_source(&req.type_name).await {
            let response = data_source
                .validate(ValidateRequest {
                    context: self.root.child(),
                    config: Config::from_dynamic(config),
                })
                .await;
            diagnostics.extend(response.diagnostics);
        }

        Ok(Response::new(
            proto::validate_data_resource_config::Response {
                diagnostics: convert_diagnostics(diagnostics),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> RpcResult<proto::upgrade_resource_state::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;

        let raw = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        let state = decode_json(&raw).map_err(Status::from)?;
        let upgraded = conform_to_schema(&schema.attributes, state);

        tracing::debug!(
            type_name = %req.type_name,
            version = req.version,
            "upgrading resource state"
        );

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> RpcResult<proto::configure_provider::Response> {
        let req = request.into_inner();
        let config = decode_value(&req.config)?;

        tracing::debug!(
            terraform_version = %req.terraform_version,
            "configuring provider"
        );

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(ConfigureRequest {
                context: self.root.child(),
                config: Config::from_dynamic(config),
            })
            .await;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> RpcResult<proto::read_resource::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;
        let current = decode_value(&req.current_state)?;

        if current.is_null() {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_value(&Dynamic::Null)?),
                diagnostics: vec![],
                private: req.private,
            }));
        }

        let provider = self.provider.read().await;
        let resource = match provider.create_resource(&req.type_name).await {
            Ok(resource) => resource,
            Err(e) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: req.current_state,
                    diagnostics: error_diagnostics("Failed to create resource", e),
                    private: req.private,
                }))
            }
        };

        let response = resource
            .read(ReadRequest {
                context: self.root.child(),
                current_state: State::from_dynamic(current),
            })
            .await;

        let new_state = match response.state {
            Some(state) => finalize_state(&schema.attributes, state.into_dynamic()),
            None => {
                tracing::debug!(type_name = %req.type_name, "resource no longer exists");
                Dynamic::Null
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_value(&new_state)?),
            diagnostics: convert_diagnostics(response.diagnostics),
            private: req.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> RpcResult<proto::plan_resource_change::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;

        let prior = decode_value(&req.prior_state)?;
        let proposed = decode_value(&req.proposed_new_state)?;
        let config = decode_value(&req.config)?;

        let plan = plan_resource_change(&schema.attributes, &prior, &proposed, &config);

        if !plan.requires_replace.is_empty() {
            tracing::debug!(
                type_name = %req.type_name,
                attributes = ?plan.requires_replace,
                "plan requires replacement"
            );
        }

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_value(&plan.planned_state)?),
            requires_replace: plan
                .requires_replace
                .iter()
                .map(|name| attr_path(name))
                .collect(),
            planned_private: req.prior_private,
            diagnostics: convert_diagnostics(plan.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> RpcResult<proto::apply_resource_change::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;

        let prior = decode_value(&req.prior_state)?;
        let planned = decode_value(&req.planned_state)?;
        let config = Config::from_dynamic(decode_value(&req.config)?);

        let provider = self.provider.read().await;
        let resource = match provider.create_resource(&req.type_name).await {
            Ok(resource) => resource,
            Err(e) => {
                return Ok(Response::new(proto::apply_resource_change::Response {
                    new_state: req.prior_state,
                    private: req.planned_private,
                    diagnostics: error_diagnostics("Failed to create resource", e),
                    legacy_type_system: false,
                }))
            }
        };

        let context = self.root.child();
        let (new_state, diagnostics) = if planned.is_null() {
            let response = resource
                .delete(DeleteRequest {
                    context,
                    current_state: State::from_dynamic(prior.clone()),
                })
                .await;
            let state = if response.diagnostics.has_errors() {
                prior
            } else {
                Dynamic::Null
            };
            (state, response.diagnostics)
        } else if prior.is_null() {
            let response = resource
                .create(CreateRequest {
                    context,
                    config,
                    planned_state: State::from_dynamic(planned),
                })
                .await;
            // a failed create that never got an id leaves nothing to track
            let state = if response.diagnostics.has_errors()
                && response.state.get_string("id").is_none()
            {
                Dynamic::Null
            } else {
                response.state.into_dynamic()
            };
            (state, response.diagnostics)
        } else {
            let response = resource
                .update(UpdateRequest {
                    context,
                    config,
                    planned_state: State::from_dynamic(planned),
                    current_state: State::from_dynamic(prior),
                })
                .await;
            (response.state.into_dynamic(), response.diagnostics)
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_value(&finalize_state(&schema.attributes, new_state))?),
            private: req.planned_private,
            diagnostics: convert_diagnostics(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> RpcResult<proto::import_resource_state::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;

        let provider = self.provider.read().await;
        let resource = match provider.create_resource(&req.type_name).await {
            Ok(resource) => resource,
            Err(e) => {
                return Ok(Response::new(proto::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: error_diagnostics("Failed to create resource", e),
                }))
            }
        };

        let response = resource
            .import_state(ImportStateRequest {
                context: self.root.child(),
                type_name: req.type_name.clone(),
                id: req.id,
            })
            .await;

        let mut imported_resources = Vec::new();
        if let Some(state) = response.state {
            let state = finalize_state(&schema.attributes, state.into_dynamic());
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: req.type_name,
                state: Some(encode_value(&state)?),
                private: vec![],
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> RpcResult<proto::read_data_source::Response> {
        let req = request.into_inner();
        let attributes = self.data_source_attributes(&req.type_name).await?;
        let config = decode_value(&req.config)?;

        let provider = self.provider.read().await;
        let data_source = match provider.create_data_source(&req.type_name).await {
            Ok(data_source) => data_source,
            Err(e) => {
                return Ok(Response::new(proto::read_data_source::Response {
                    state: None,
                    diagnostics: error_diagnostics("Failed to create data source", e),
                }))
            }
        };

        let response = data_source
            .read(ReadDataSourceRequest {
                context: self.root.child(),
                config: Config::from_dynamic(config),
            })
            .await;

        let state = finalize_state(&attributes, response.state.into_dynamic());
        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_value(&state)?),
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> RpcResult<proto::stop_provider::Response> {
        tracing::info!("stop requested, cancelling in-flight operations");
        self.root.cancel();
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn to_proto_schema(
    version: i64,
    description: &str,
    attributes: &HashMap<String, Attribute>,
) -> proto::Schema {
    let mut attrs: Vec<&Attribute> = attributes.values().collect();
    attrs.sort_by(|a, b| a.name.cmp(&b.name));

    proto::Schema {
        version,
        block: Some(schema::Block {
            version,
            attributes: attrs
                .into_iter()
                .map(|attr| schema::Attribute {
                    name: attr.name.clone(),
                    r#type: attr.r#type.encode(),
                    description: attr.description.clone(),
                    required: attr.required,
                    optional: attr.optional,
                    computed: attr.computed,
                    sensitive: attr.sensitive,
                    description_kind: StringKind::Plain as i32,
                    deprecated: attr.deprecated,
                    write_only: false,
                })
                .collect(),
            description: description.to_string(),
            description_kind: StringKind::Plain as i32,
            deprecated: false,
        }),
    }
}

/// Schema-level checks shared by provider, resource and data source
/// configuration: required attributes, unknown attributes, type mismatches
/// and attribute validators
fn validate_config(attributes: &HashMap<String, Attribute>, config: &Dynamic) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let empty = HashMap::new();
    let values = config.as_map().unwrap_or(&empty);
    let null = Dynamic::Null;

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();

    for name in names {
        let attr = &attributes[name];
        let value = values.get(name).unwrap_or(&null);

        if attr.required && value.is_null() {
            diagnostics.add_attribute_error(
                name,
                format!("Missing required argument: {}", name),
                Some(format!("The argument \"{}\" is required, but no definition was found", name)),
            );
            continue;
        }

        if !attr.r#type.accepts(value) {
            diagnostics.add_attribute_error(
                name,
                format!("Incorrect attribute value type: {}", name),
                Some(format!(
                    "Expected {}, got {}",
                    attr.r#type.to_json(),
                    value.type_name()
                )),
            );
            continue;
        }

        if attr.deprecated && !value.is_null() {
            diagnostics.add_warning(
                format!("Argument is deprecated: {}", name),
                None::<String>,
            );
        }

        for validator in &attr.validators {
            validator.validate(value, name, &mut diagnostics);
        }
    }

    let mut unexpected: Vec<&String> = values
        .keys()
        .filter(|name| !attributes.contains_key(*name))
        .collect();
    unexpected.sort();
    for name in unexpected {
        diagnostics.add_attribute_error(
            name,
            format!("Unsupported argument: {}", name),
            Some(format!("An argument named \"{}\" is not expected here", name)),
        );
    }

    diagnostics
}

/// Final shape of any state handed back to Terraform
fn finalize_state(attributes: &HashMap<String, Attribute>, value: Dynamic) -> Dynamic {
    conform_to_schema(attributes, value).unknowns_to_null()
}

fn decode_value(value: &Option<proto::DynamicValue>) -> std::result::Result<Dynamic, Status> {
    let decoded = match value {
        Some(v) if !v.msgpack.is_empty() => decode_msgpack(&v.msgpack),
        Some(v) if !v.json.is_empty() => decode_json(&v.json),
        _ => Ok(Dynamic::Null),
    };
    decoded.map_err(Status::from)
}

fn encode_value(value: &Dynamic) -> std::result::Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: encode_msgpack(value).map_err(Status::from)?,
        json: vec![],
    })
}

fn attr_path(name: &str) -> proto::AttributePath {
    proto::AttributePath {
        steps: vec![attribute_path::Step {
            selector: Some(attribute_path::step::Selector::AttributeName(
                name.to_string(),
            )),
        }],
    }
}

fn error_diagnostics(summary: &str, err: impl std::fmt::Display) -> Vec<proto::Diagnostic> {
    let mut diags = Diagnostics::new();
    diags.add_error(summary, Some(err.to_string()));
    convert_diagnostics(diags)
}

fn convert_diagnostics(diags: Diagnostics) -> Vec<proto::Diagnostic> {
    let errors = diags
        .errors
        .into_iter()
        .map(|d| (diagnostic::Severity::Error, d));
    let warnings = diags
        .warnings
        .into_iter()
        .map(|d| (diagnostic::Severity::Warning, d));

    errors
        .chain(warnings)
        .map(|(severity, d)| proto::Diagnostic {
            severity: severity as i32,
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.as_deref().map(attr_path),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::provider::{DataSource, DataSourceSchema, ProviderSchema, Resource};
    use crate::request::{
        ConfigureResponse, CreateResponse, DataSourceSchemaResponse, DeleteResponse,
        ReadDataSourceResponse, ReadResponse, ResourceSchemaResponse, SchemaRequest,
        UpdateResponse,
    };
    use crate::schema::{AttributeBuilder, SchemaBuilder};
    use crate::validator::StringOneOfValidator;
    use crate::Result;
    use async_trait::async_trait;
    use provider_server::Provider as _;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestProvider {
        configured: bool,
        gone: Arc<AtomicBool>,
    }

    fn bucket_schema() -> ResourceSchema {
        SchemaBuilder::new()
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "name",
                AttributeBuilder::string("name").required().force_new(),
            )
            .attribute(
                "acl",
                AttributeBuilder::string("acl")
                    .optional()
                    .validator(StringOneOfValidator::new(&["private", "public-read"])),
            )
            .attribute("endpoint", AttributeBuilder::string("endpoint").computed())
            .build_resource(0)
    }

    #[async_trait]
    impl Provider for TestProvider {
        fn schema(&self) -> ProviderSchema {
            SchemaBuilder::new()
                .attribute("region", AttributeBuilder::string("region").optional())
                .build_provider()
        }

        async fn configure(&mut self, _request: ConfigureRequest) -> ConfigureResponse {
            self.configured = true;
            ConfigureResponse {
                diagnostics: Diagnostics::new(),
            }
        }

        async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>> {
            if !self.configured {
                return Err("Provider not configured".into());
            }
            match name {
                "test_bucket" => Ok(Box::new(TestBucket {
                    gone: self.gone.clone(),
                })),
                _ => Err(format!("Unknown resource: {}", name).into()),
            }
        }

        async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>> {
            match name {
                "test_buckets" => Ok(Box::new(TestBuckets)),
                _ => Err(format!("Unknown data source: {}", name).into()),
            }
        }

        async fn resource_schemas(&self) -> HashMap<String, ResourceSchema> {
            HashMap::from([("test_bucket".to_string(), bucket_schema())])
        }

        async fn data_source_schemas(&self) -> HashMap<String, DataSourceSchema> {
            let schema = SchemaBuilder::new()
                .attribute("id", AttributeBuilder::string("id").computed())
                .attribute(
                    "names",
                    AttributeBuilder::list("names", crate::schema::AttributeType::String)
                        .computed(),
                )
                .build_data_source(0);
            HashMap::from([("test_buckets".to_string(), schema)])
        }
    }

    struct TestBucket {
        gone: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Resource for TestBucket {
        async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
            ResourceSchemaResponse {
                schema: bucket_schema(),
                diagnostics: Diagnostics::new(),
            }
        }

        async fn create(&self, request: CreateRequest) -> CreateResponse {
            let mut state = request.planned_state;
            state.set_string("id", "bucket-1");
            CreateResponse {
                state,
                diagnostics: Diagnostics::new(),
            }
        }

        async fn read(&self, request: ReadRequest) -> ReadResponse {
            if self.gone.load(Ordering::SeqCst) {
                return ReadResponse {
                    state: None,
                    diagnostics: Diagnostics::new(),
                };
            }
            let mut state = request.current_state;
            state.set_string("endpoint", "bucket-1.example.com");
            ReadResponse {
                state: Some(state),
                diagnostics: Diagnostics::new(),
            }
        }

        async fn update(&self, request: UpdateRequest) -> UpdateResponse {
            UpdateResponse {
                state: request.planned_state,
                diagnostics: Diagnostics::new(),
            }
        }

        async fn delete(&self, _request: DeleteRequest) -> DeleteResponse {
            DeleteResponse {
                diagnostics: Diagnostics::new(),
            }
        }
    }

    struct TestBuckets;

    #[async_trait]
    impl DataSource for TestBuckets {
        async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: DataSourceSchema::default(),
                diagnostics: Diagnostics::new(),
            }
        }

        async fn read(&self, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
            let mut state = State::new();
            state.set_string("id", "all");
            state.set_string_list("names", ["a", "b"]);
            ReadDataSourceResponse {
                state,
                diagnostics: Diagnostics::new(),
            }
        }
    }

    fn service() -> (GrpcService<TestProvider>, Arc<AtomicBool>) {
        let gone = Arc::new(AtomicBool::new(false));
        let provider = TestProvider {
            configured: false,
            gone: gone.clone(),
        };
        (GrpcService::new(provider), gone)
    }

    fn value(pairs: &[(&str, Dynamic)]) -> Option<proto::DynamicValue> {
        let map = Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        Some(encode_value(&map).unwrap())
    }

    fn decode(value: Option<proto::DynamicValue>) -> Dynamic {
        decode_value(&value).unwrap()
    }

    async fn configure(service: &GrpcService<TestProvider>) {
        service
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.9.0".to_string(),
                config: value(&[]),
                client_capabilities: None,
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn metadata_and_schema_list_every_type() {
        let (service, _) = service();

        let metadata = service
            .get_metadata(Request::new(proto::get_metadata::Request {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(metadata.resources[0].type_name, "test_bucket");
        assert_eq!(metadata.data_sources[0].type_name, "test_buckets");

        let schema = service
            .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();
        let block = schema.resource_schemas["test_bucket"].block.clone().unwrap();
        let names: Vec<_> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["acl", "endpoint", "id", "name"]);
        assert!(schema.provider.is_some());
    }

    #[tokio::test]
    async fn validation_reports_missing_unknown_and_invalid_attributes() {
        let (service, _) = service();

        let response = service
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_bucket".to_string(),
                config: value(&[
                    ("acl", Dynamic::from("world-writable")),
                    ("colour", Dynamic::from("red")),
                ]),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        let summaries: Vec<_> = response
            .diagnostics
            .iter()
            .map(|d| d.summary.as_str())
            .collect();
        assert_eq!(response.diagnostics.len(), 3);
        assert!(summaries.iter().any(|s| s.contains("Missing required argument: name")));
        assert!(summaries.iter().any(|s| s.contains("Unsupported argument: colour")));
        assert!(summaries.iter().any(|s| s.contains("acl must be one of")));
    }

    #[tokio::test]
    async fn validation_accepts_unknown_values() {
        let (service, _) = service();

        let response = service
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_bucket".to_string(),
                config: value(&[("name", Dynamic::Unknown)]),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn create_lifecycle_returns_normalized_state() {
        let (service, _) = service();
        configure(&service).await;

        let config = value(&[("name", Dynamic::from("logs"))]);
        let plan = service
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_bucket".to_string(),
                prior_state: None,
                proposed_new_state: config.clone(),
                config: config.clone(),
                prior_private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        let planned = decode(plan.planned_state.clone());
        assert!(planned.as_map().unwrap()["id"].is_unknown());

        let applied = service
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_bucket".to_string(),
                prior_state: None,
                planned_state: plan.planned_state,
                config,
                planned_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        let state = decode(applied.new_state);
        let state = state.as_map().unwrap();
        assert_eq!(state["id"], Dynamic::from("bucket-1"));
        assert!(state["acl"].is_null());
        // unknown endpoint left by the plan is nulled, never sent back unknown
        assert!(state["endpoint"].is_null());
    }

    #[tokio::test]
    async fn plan_reports_replacement_for_force_new_change() {
        let (service, _) = service();
        let prior = value(&[
            ("id", Dynamic::from("bucket-1")),
            ("name", Dynamic::from("logs")),
            ("acl", Dynamic::Null),
            ("endpoint", Dynamic::from("bucket-1.example.com")),
        ]);
        let config = value(&[("name", Dynamic::from("archive"))]);
        let proposed = value(&[
            ("id", Dynamic::from("bucket-1")),
            ("name", Dynamic::from("archive")),
            ("acl", Dynamic::Null),
            ("endpoint", Dynamic::from("bucket-1.example.com")),
        ]);

        let plan = service
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_bucket".to_string(),
                prior_state: prior,
                proposed_new_state: proposed,
                config,
                prior_private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(plan.requires_replace, vec![attr_path("name")]);
    }

    #[tokio::test]
    async fn read_of_deleted_resource_returns_null_state() {
        let (service, gone) = service();
        configure(&service).await;
        gone.store(true, Ordering::SeqCst);

        let response = service
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_bucket".to_string(),
                current_state: value(&[("id", Dynamic::from("bucket-1"))]),
                private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(decode(response.new_state).is_null());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn import_passes_id_through() {
        let (service, _) = service();
        configure(&service).await;

        let response = service
            .import_resource_state(Request::new(proto::import_resource_state::Request {
                type_name: "test_bucket".to_string(),
                id: "bucket-9".to_string(),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.imported_resources.len(), 1);
        let state = decode(response.imported_resources[0].state.clone());
        assert_eq!(state.as_map().unwrap()["id"], Dynamic::from("bucket-9"));
        assert!(state.as_map().unwrap()["name"].is_null());
    }

    #[tokio::test]
    async fn unconfigured_provider_surfaces_diagnostic() {
        let (service, _) = service();

        let response = service
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_bucket".to_string(),
                prior_state: None,
                planned_state: value(&[("name", Dynamic::from("logs"))]),
                config: value(&[("name", Dynamic::from("logs"))]),
                planned_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("not configured"));
    }

    #[tokio::test]
    async fn unknown_resource_type_is_not_found() {
        let (service, _) = service();

        let result = service
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_missing".to_string(),
                current_state: None,
                private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await;

        let status = result.unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert!(status.message().contains("test_missing"));
    }

    #[tokio::test]
    async fn data_source_read_and_upgrade_state() {
        let (service, _) = service();

        let read = service
            .read_data_source(Request::new(proto::read_data_source::Request {
                type_name: "test_buckets".to_string(),
                config: value(&[]),
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        let state = decode(read.state);
        assert_eq!(
            state.as_map().unwrap()["names"],
            Dynamic::string_list(["a", "b"])
        );

        let upgraded = service
            .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
                type_name: "test_bucket".to_string(),
                version: 0,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"bucket-1","name":"logs","removed":"x"}"#.to_vec(),
                    flatmap: HashMap::new(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();
        let state = decode(upgraded.upgraded_state);
        let state = state.as_map().unwrap();
        assert_eq!(state.len(), 4);
        assert!(!state.contains_key("removed"));
    }

    #[tokio::test]
    async fn stop_provider_cancels_request_contexts() {
        let (service, _) = service();
        let in_flight = service.root.child();

        service
            .stop_provider(Request::new(proto::stop_provider::Request {}))
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), in_flight.cancelled())
            .await
            .unwrap();
    }
}

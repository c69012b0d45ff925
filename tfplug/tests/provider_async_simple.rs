//! Factory-style provider API exercised from outside the crate

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tokio::time::sleep;

use tfplug::context::Context;
use tfplug::request::{
    ConfigureRequest, ConfigureResponse, CreateRequest, CreateResponse, DataSourceSchemaResponse,
    DeleteRequest, DeleteResponse, ImportStateRequest, ReadDataSourceRequest,
    ReadDataSourceResponse, ReadRequest, ReadResponse, ResourceSchemaResponse, SchemaRequest,
    UpdateRequest, UpdateResponse,
};
use tfplug::types::{Config, Diagnostics, State};
use tfplug::{
    AttributeBuilder, DataSource, DataSourceSchema, Provider, ProviderSchema, Resource,
    ResourceSchema, Result, SchemaBuilder,
};

struct SimpleProvider;

#[async_trait]
impl Provider for SimpleProvider {
    fn schema(&self) -> ProviderSchema {
        SchemaBuilder::new()
            .attribute("region", AttributeBuilder::string("region").optional())
            .build_provider()
    }

    async fn configure(&mut self, _request: ConfigureRequest) -> ConfigureResponse {
        sleep(Duration::from_millis(1)).await;
        ConfigureResponse {
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>> {
        match name {
            "simple" => Ok(Box::new(SimpleResource)),
            "slow" => Ok(Box::new(SlowResource)),
            _ => Err(format!("Unknown resource: {}", name).into()),
        }
    }

    async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>> {
        match name {
            "simple" => Ok(Box::new(SimpleDataSource)),
            _ => Err(format!("Unknown data source: {}", name).into()),
        }
    }

    async fn resource_schemas(&self) -> HashMap<String, ResourceSchema> {
        HashMap::from([
            ("simple".to_string(), simple_schema()),
            ("slow".to_string(), simple_schema()),
        ])
    }

    async fn data_source_schemas(&self) -> HashMap<String, DataSourceSchema> {
        HashMap::from([("simple".to_string(), DataSourceSchema::default())])
    }
}

fn simple_schema() -> ResourceSchema {
    SchemaBuilder::new()
        .attribute("id", AttributeBuilder::string("id").computed())
        .build_resource(0)
}

struct SimpleResource;

#[async_trait]
impl Resource for SimpleResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: simple_schema(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, _request: CreateRequest) -> CreateResponse {
        sleep(Duration::from_millis(1)).await;
        let mut state = State::new();
        state.set_string("id", "simple-1");
        CreateResponse {
            state,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        ReadResponse {
            state: Some(request.current_state),
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

/// Waits on the remote side for a long time unless its context is cancelled
struct SlowResource;

#[async_trait]
impl Resource for SlowResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: simple_schema(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diagnostics = Diagnostics::new();
        tokio::select! {
            _ = sleep(Duration::from_millis(100)) => {}
            _ = request.context.cancelled() => {
                diagnostics.add_error("Operation cancelled", None::<String>);
            }
        }
        CreateResponse {
            state: State::new(),
            diagnostics,
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        ReadResponse {
            state: Some(request.current_state),
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

struct SimpleDataSource;

#[async_trait]
impl DataSource for SimpleDataSource {
    async fn schema(&self, _request: SchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: DataSourceSchema::default(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        ReadDataSourceResponse {
            state: State::new(),
            diagnostics: Diagnostics::new(),
        }
    }
}

fn create_request(context: Context) -> CreateRequest {
    CreateRequest {
        context,
        config: Config::new(),
        planned_state: State::new(),
    }
}

#[tokio::test]
async fn test_async_trait_methods_work() {
    let mut provider = SimpleProvider;

    let config_resp = provider
        .configure(ConfigureRequest {
            context: Context::new(),
            config: Config::new(),
        })
        .await;
    assert_eq!(config_resp.diagnostics.errors.len(), 0);

    let resource = provider.create_resource("simple").await.unwrap();
    let data_source = provider.create_data_source("simple").await.unwrap();

    let create_resp = resource.create(create_request(Context::new())).await;
    assert_eq!(create_resp.diagnostics.errors.len(), 0);
    assert_eq!(create_resp.state.get_string("id"), Some("simple-1".to_string()));

    let read_resp = data_source
        .read(ReadDataSourceRequest {
            context: Context::new(),
            config: Config::new(),
        })
        .await;
    assert!(read_resp.diagnostics.errors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_async_operations() {
    let provider = Arc::new(SimpleProvider);
    let start = Instant::now();

    let mut handles = vec![];
    for _ in 0..5 {
        let provider_clone = provider.clone();
        handles.push(task::spawn(async move {
            let resource = provider_clone.create_resource("slow").await.unwrap();
            resource.create(create_request(Context::new())).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.diagnostics.errors.is_empty());
    }

    // serialized execution would take 5 * 100ms
    let elapsed = start.elapsed();
    assert!(
        elapsed.as_millis() < 300,
        "Concurrent operations took too long: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_cancelled_context_stops_slow_operation() {
    let provider = SimpleProvider;
    let resource = provider.create_resource("slow").await.unwrap();

    let root = Context::new();
    let ctx = root.child();
    root.cancel();

    let started = Instant::now();
    let response = resource.create(create_request(ctx)).await;

    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(response.diagnostics.errors[0].summary, "Operation cancelled");
}

#[tokio::test]
async fn test_default_import_passes_id_through() {
    let provider = SimpleProvider;
    let resource = provider.create_resource("simple").await.unwrap();

    let response = resource
        .import_state(ImportStateRequest {
            context: Context::new(),
            type_name: "simple".to_string(),
            id: "simple-42".to_string(),
        })
        .await;

    let state = response.state.unwrap();
    assert_eq!(state.get_string("id"), Some("simple-42".to_string()));
}

#[tokio::test]
async fn test_async_error_handling() {
    let provider = SimpleProvider;

    let result = provider.create_resource("unknown").await;
    assert!(result
        .err()
        .unwrap()
        .to_string()
        .contains("Unknown resource"));

    let result = provider.create_data_source("unknown").await;
    assert!(result
        .err()
        .unwrap()
        .to_string()
        .contains("Unknown data source"));
}

//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust, implementing the
//! Terraform Plugin Protocol v6.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod request;

// Helper modules
pub mod defaults;
pub mod plan_modifier;
pub mod planning;
pub mod validator;

// Protocol
pub mod grpc;
pub mod proto;
pub mod server;

pub use context::Context;
pub use error::{Result, TfplugError};
pub use provider::{DataSource, DataSourceSchema, Provider, ProviderSchema, Resource, ResourceSchema};
pub use schema::{AttributeBuilder, AttributeType, SchemaBuilder};
pub use server::{serve, serve_default, ServerConfig};
pub use types::{Config, Diagnostics, Dynamic, State};

/// Generates a `main` that serves the given provider
#[macro_export]
macro_rules! serve_provider {
    ($provider:expr) => {
        #[tokio::main]
        async fn main() -> $crate::Result<()> {
            $crate::serve($provider, $crate::ServerConfig::default()).await
        }
    };
    ($provider:expr, $config:expr) => {
        #[tokio::main]
        async fn main() -> $crate::Result<()> {
            $crate::serve($provider, $config).await
        }
    };
}

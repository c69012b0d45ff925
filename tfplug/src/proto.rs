//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! The protobuf code is generated at build time by tonic_build from
//! `proto/tfplugin6.proto` and included here.
//!
//! # Type Naming
//!
//! - Top-level messages become structs (e.g., `DynamicValue`, `Schema`)
//! - RPC methods have nested `Request` and `Response` types in snake_case modules
//!   (e.g., `get_provider_schema::Request`, `read_resource::Response`)
//! - Nested messages are in sub-modules (e.g., `diagnostic::Severity`)
//! - The gRPC service trait is available as `provider_server::Provider`
//!
//! Some protobuf types have the same names as tfplug framework types.
//! Always use the `proto::` prefix when referring to protobuf types.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_types_accessible() {
        let _ = DynamicValue::default();
        let _ = Diagnostic::default();
        let _ = AttributePath::default();
        let _ = ServerCapabilities::default();
        let _ = ClientCapabilities::default();
    }

    #[test]
    fn nested_types_accessible() {
        let _ = diagnostic::Severity::Invalid;
        let _ = attribute_path::step::Selector::AttributeName("test".to_string());
        let _ = schema::Block::default();
    }

    #[test]
    fn request_response_types() {
        let _ = get_provider_schema::Request::default();
        let _ = get_provider_schema::Response::default();
        let _ = import_resource_state::ImportedResource::default();
        let _ = read_resource::Response::default();
    }
}

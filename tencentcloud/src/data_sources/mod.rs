//! Data source implementations
//!
//! Every data source turns its filter arguments into a describe query, maps
//! the result into a list of flat items and publishes that list under one
//! computed attribute. The `id` is a digest of the returned IDs so it stays
//! stable while the result set does.

pub mod cdn_domains;
pub mod clb_instances;
pub mod clb_listeners;
pub mod tcr_instances;
pub mod tdmq_instances;
pub mod vpc_acls;
pub mod vpn_connections;

pub use cdn_domains::CdnDomainsDataSource;
pub use clb_instances::ClbInstancesDataSource;
pub use clb_listeners::ClbListenersDataSource;
pub use tcr_instances::TcrInstancesDataSource;
pub use tdmq_instances::TdmqInstancesDataSource;
pub use vpc_acls::VpcAclsDataSource;
pub use vpn_connections::VpnConnectionsDataSource;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tfplug::{AttributeBuilder, Diagnostics, Dynamic, State};

pub(crate) const RESULT_OUTPUT_FILE: &str = "result_output_file";

pub(crate) fn id_attribute() -> AttributeBuilder {
    AttributeBuilder::string("id")
        .computed()
        .description("Digest of the IDs in the result")
}

pub(crate) fn result_output_file_attribute() -> AttributeBuilder {
    AttributeBuilder::string(RESULT_OUTPUT_FILE)
        .optional()
        .description("Used to save results as pretty JSON")
}

/// Hex SHA-256 over the IDs in result order
pub(crate) fn data_resource_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

pub(crate) fn write_result_output_file<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    items: &T,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, items)?;
    writer.flush()
}

/// Optional `id` that doubles as a filter; the digest is only used when
/// it is left unset
pub(crate) fn id_filter_attribute(what: &str) -> AttributeBuilder {
    AttributeBuilder::string("id")
        .optional()
        .computed()
        .description(&format!("ID of the {} to look up", what))
}

/// Writes `items` under `attribute`, sets the digest id unless the
/// configuration pinned one and honours `result_output_file`
pub(crate) fn publish_list<T: Serialize>(
    state: &mut State,
    attribute: &str,
    ids: &[&str],
    items: &[T],
    diags: &mut Diagnostics,
) {
    let value = match serde_json::to_value(items).and_then(serde_json::from_value::<Dynamic>) {
        Ok(value) => value,
        Err(e) => {
            diags.add_error("Failed to convert result list", Some(e.to_string()));
            return;
        }
    };
    if state.get_string("id").is_none() {
        state.set("id", data_resource_id(ids.iter().copied()));
    }
    state.set(attribute, value);

    if let Some(path) = state.get_string(RESULT_OUTPUT_FILE).filter(|p| !p.is_empty()) {
        if let Err(e) = write_result_output_file(&path, items) {
            diags.add_attribute_error(
                RESULT_OUTPUT_FILE,
                "Failed to write result output file",
                Some(format!("{}: {}", path, e)),
            );
        }
    }
}

/// Empty strings from the API become null
pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

//! Resource implementations

pub mod cdn_domain;
pub mod clb_instance;
pub mod clb_listener;
pub mod clb_listener_rule;
pub mod clb_redirection;
pub mod tag;
pub mod tcr_instance;
pub mod tcr_namespace;
pub mod tdmq_instance;
pub mod vpc_acl;
pub mod vpn_connection;

pub use cdn_domain::CdnDomainResource;
pub use clb_instance::ClbInstanceResource;
pub use clb_listener::ClbListenerResource;
pub use clb_listener_rule::ClbListenerRuleResource;
pub use clb_redirection::ClbRedirectionResource;
pub use tag::TagResource;
pub use tcr_instance::TcrInstanceResource;
pub use tcr_namespace::TcrNamespaceResource;
pub use tdmq_instance::TdmqInstanceResource;
pub use vpc_acl::VpcAclResource;
pub use vpn_connection::VpnConnectionResource;

use std::collections::HashMap;

use tfplug::plan_modifier::values_equal;
use tfplug::{Context, Diagnostics, Dynamic, State};

use crate::api::tag::{build_resource_name, diff_tags};
use crate::api::{ApiError, Client};

/// Where a resource's tags live in the tag service
#[derive(Debug, Clone, Copy)]
pub(crate) struct TagTarget {
    pub service: &'static str,
    pub resource_type: &'static str,
}

/// True when `attribute` differs between the prior and the planned state.
/// Planned values that are still unknown were not set by the user and never
/// count as a change.
pub(crate) fn changed(planned: &State, prior: &State, attribute: &str) -> bool {
    let planned = planned.get(attribute).unwrap_or(&Dynamic::Null);
    if planned.is_unknown() {
        return false;
    }
    let prior = prior.get(attribute).unwrap_or(&Dynamic::Null);
    !values_equal(planned, prior)
}

/// Adds an error for every attribute in `attributes` the plan tries to change.
/// Returns true when the update has to stop.
pub(crate) fn reject_immutable(
    planned: &State,
    prior: &State,
    attributes: &[&str],
    diags: &mut Diagnostics,
) -> bool {
    let mut rejected = false;
    for attribute in attributes {
        if changed(planned, prior, attribute) {
            diags.add_attribute_error(
                attribute,
                format!("`{}` is not allowed to be modified", attribute),
                Some("Revert the change or recreate the resource"),
            );
            rejected = true;
        }
    }
    rejected
}

pub(crate) fn state_tags(state: &State) -> HashMap<String, String> {
    state.get_string_map("tags").unwrap_or_default()
}

pub(crate) fn api_error(diags: &mut Diagnostics, summary: &str, err: ApiError) {
    diags.add_error(summary, Some(format!("API error: {}", err)));
}

/// Applies the difference between two tag maps to a resource
pub(crate) async fn sync_tags(
    client: &Client,
    ctx: &Context,
    target: TagTarget,
    id: &str,
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> Result<(), ApiError> {
    let (replace, delete) = diff_tags(old, new);
    if replace.is_empty() && delete.is_empty() {
        return Ok(());
    }
    let resource_name =
        build_resource_name(target.service, target.resource_type, client.region(), id);
    client
        .tag()
        .modify_tags(ctx, &resource_name, &replace, &delete)
        .await
}

pub(crate) async fn read_tags(
    client: &Client,
    ctx: &Context,
    target: TagTarget,
    id: &str,
) -> Result<HashMap<String, String>, ApiError> {
    client
        .tag()
        .describe_resource_tags(ctx, target.service, target.resource_type, client.region(), id)
        .await
}

/// Writes the tags map, leaving it null when the resource has none and none
/// were configured
pub(crate) fn set_tags(state: &mut State, tags: HashMap<String, String>) {
    let configured = state.get("tags").is_some_and(|v| !v.is_null());
    if tags.is_empty() && !configured {
        state.set_null("tags");
    } else {
        state.set_string_map("tags", tags);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::api::test_helpers::create_test_client;
    use crate::provider_data::TencentCloudProviderData;

    pub fn provider_data(url: &str) -> TencentCloudProviderData {
        TencentCloudProviderData::new(create_test_client(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_planned_value_is_not_a_change() {
        let mut prior = State::new();
        prior.set_string("vpc_id", "vpc-1");
        let mut planned = State::new();
        planned.set("vpc_id", Dynamic::Unknown);

        assert!(!changed(&planned, &prior, "vpc_id"));

        planned.set_string("vpc_id", "vpc-2");
        assert!(changed(&planned, &prior, "vpc_id"));
    }

    #[test]
    fn reject_immutable_reports_each_attribute() {
        let mut prior = State::new();
        prior.set_i64("port", 80);
        prior.set_string("protocol", "TCP");
        let mut planned = prior.clone();
        planned.set_i64("port", 81);
        planned.set_string("protocol", "UDP");

        let mut diags = Diagnostics::new();
        assert!(reject_immutable(&planned, &prior, &["port", "protocol"], &mut diags));
        assert_eq!(diags.errors.len(), 2);
        assert_eq!(diags.errors[0].attribute.as_deref(), Some("port"));
    }

    #[test]
    fn empty_tags_stay_null_unless_configured() {
        let mut state = State::new();
        set_tags(&mut state, HashMap::new());
        assert_eq!(state.get("tags"), Some(&Dynamic::Null));

        state.set_string_map("tags", [("env", "dev")]);
        set_tags(&mut state, HashMap::new());
        assert_eq!(state.get_string_map("tags"), Some(HashMap::new()));
    }
}

//! Plan computation for `PlanResourceChange`
//!
//! Terraform proposes a new state built from configuration merged with the
//! prior state. The provider decides which computed attributes are known
//! ahead of apply, fills defaults, runs attribute plan modifiers and reports
//! which attributes force replacement.

use crate::defaults::DefaultRequest;
use crate::plan_modifier::{values_equal, PlanModifyRequest};
use crate::schema::Attribute;
use crate::types::{Diagnostics, Dynamic};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub planned_state: Dynamic,
    pub requires_replace: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Computes the planned state of a resource
///
/// `prior` is null on create and `proposed` is null on destroy.
pub fn plan_resource_change(
    attributes: &HashMap<String, Attribute>,
    prior: &Dynamic,
    proposed: &Dynamic,
    config: &Dynamic,
) -> PlannedChange {
    if proposed.is_null() {
        return PlannedChange {
            planned_state: Dynamic::Null,
            requires_replace: Vec::new(),
            diagnostics: Diagnostics::new(),
        };
    }

    let empty = HashMap::new();
    let prior_values = prior.as_map().unwrap_or(&empty);
    let proposed_values = proposed.as_map().unwrap_or(&empty);
    let config_values = config.as_map().unwrap_or(&empty);
    let creating = prior.is_null();

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();

    let value_of = |map: &HashMap<String, Dynamic>, name: &str| {
        map.get(name).cloned().unwrap_or(Dynamic::Null)
    };

    let mut planned: HashMap<String, Dynamic> = HashMap::new();
    for name in &names {
        let attr = &attributes[*name];
        let config_value = value_of(config_values, name);
        let mut value = value_of(proposed_values, name);

        if attr.computed && config_value.is_null() {
            value = match &attr.default {
                Some(default) => {
                    default
                        .default_value(DefaultRequest {
                            attribute_path: name.to_string(),
                        })
                        .value
                }
                None if creating => Dynamic::Unknown,
                None => value_of(prior_values, name),
            };
        }
        planned.insert(name.to_string(), value);
    }

    if !creating {
        let changed = names.iter().any(|name| {
            let attr = &attributes[*name];
            (attr.required || attr.optional)
                && !values_equal(&planned[*name], &value_of(prior_values, name))
        });

        if changed {
            for name in &names {
                let attr = &attributes[*name];
                if attr.computed
                    && attr.default.is_none()
                    && value_of(config_values, name).is_null()
                {
                    planned.insert(name.to_string(), Dynamic::Unknown);
                }
            }
        }
    }

    let mut requires_replace = Vec::new();
    let mut diagnostics = Diagnostics::new();

    if !creating {
        for name in &names {
            let attr = &attributes[*name];
            for modifier in &attr.plan_modifiers {
                let response = modifier.modify_plan(PlanModifyRequest {
                    state: value_of(prior_values, name),
                    plan: planned[*name].clone(),
                    config: value_of(config_values, name),
                    attribute_path: name.to_string(),
                });
                planned.insert(name.to_string(), response.plan_value);
                if response.requires_replace && !requires_replace.contains(*name) {
                    requires_replace.push(name.to_string());
                }
                diagnostics.extend(response.diagnostics);
            }
        }
    }

    PlannedChange {
        planned_state: Dynamic::Map(planned),
        requires_replace,
        diagnostics,
    }
}

/// Shapes a state value to the schema: every attribute present, attributes
/// the schema does not know dropped. Null stays null.
pub fn conform_to_schema(attributes: &HashMap<String, Attribute>, value: Dynamic) -> Dynamic {
    let mut values = match value {
        Dynamic::Map(values) => values,
        _ => return Dynamic::Null,
    };

    let conformed = attributes
        .keys()
        .map(|name| {
            let value = values.remove(name).unwrap_or(Dynamic::Null);
            (name.clone(), value)
        })
        .collect();
    Dynamic::Map(conformed)
}

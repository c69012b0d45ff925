use crate::types::{Diagnostics, Dynamic};

#[derive(Debug, Clone)]
pub struct PlanModifyRequest {
    pub state: Dynamic,
    pub plan: Dynamic,
    pub config: Dynamic,
    pub attribute_path: String,
}

#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Diagnostics,
}

/// Trait for modifying terraform plan behavior
///
/// Plan modifiers run on updates, after defaults have been applied, and can:
/// - Modify the planned value
/// - Mark an attribute as requiring replacement
/// - Add warnings or errors to the plan
pub trait PlanModifier: Send + Sync {
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse;
}

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        // an unset computed attribute going unknown is recomputation, not a change
        let recomputed = request.plan.is_unknown() && request.config.is_null();
        let requires_replace = !recomputed && !values_equal(&request.state, &request.plan);

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// Uses the prior state value when the planned value is unknown
///
/// Suits computed attributes that never change after creation, such as
/// generated identifiers and creation timestamps.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = match (&request.plan, &request.state) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan,
            (Dynamic::Unknown, state) => state.clone(),
            _ => request.plan,
        };

        PlanModifyResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Diagnostics::new(),
        }
    }
}

pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    pub fn new(predicate: F, description: impl Into<String>) -> Self {
        Self {
            predicate,
            description: description.into(),
        }
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let mut diagnostics = Diagnostics::new();
        let requires_replace = (self.predicate)(&request);

        if requires_replace {
            diagnostics.add_warning(
                format!(
                    "Attribute '{}' requires resource replacement",
                    request.attribute_path
                ),
                Some(&self.description),
            );
        }

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics,
        }
    }
}

/// Structural equality with a tolerance for float noise. Unknown never
/// equals anything, itself included.
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(state: Dynamic, plan: Dynamic, config: Dynamic) -> PlanModifyRequest {
        PlanModifyRequest {
            state,
            plan,
            config,
            attribute_path: "network_type".to_string(),
        }
    }

    #[test]
    fn requires_replace_if_changed_does_not_trigger_on_same_value() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("OPEN"),
            Dynamic::from("OPEN"),
            Dynamic::from("OPEN"),
        ));

        assert!(!response.requires_replace);
        assert_eq!(response.diagnostics.errors.len(), 0);
    }

    #[test]
    fn requires_replace_if_changed_triggers_on_different_value() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("OPEN"),
            Dynamic::from("INTERNAL"),
            Dynamic::from("INTERNAL"),
        ));

        assert!(response.requires_replace);
        assert_eq!(response.plan_value, Dynamic::from("INTERNAL"));
    }

    #[test]
    fn requires_replace_if_changed_triggers_when_value_is_first_set() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::Null,
            Dynamic::from("vpc-123"),
            Dynamic::from("vpc-123"),
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_null_to_null() {
        let response =
            RequiresReplaceIfChanged.modify_plan(request(Dynamic::Null, Dynamic::Null, Dynamic::Null));

        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_recomputed_values() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("vpc-123"),
            Dynamic::Unknown,
            Dynamic::Null,
        ));

        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_triggers_on_configured_unknown() {
        // config references an attribute of a resource not created yet
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("vpc-123"),
            Dynamic::Unknown,
            Dynamic::Unknown,
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_copies_prior_value() {
        let response = UseStateForUnknown.modify_plan(request(
            Dynamic::from("lb-abc"),
            Dynamic::Unknown,
            Dynamic::Null,
        ));

        assert_eq!(response.plan_value, Dynamic::from("lb-abc"));
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_leaves_null_plan_alone() {
        let response = UseStateForUnknown.modify_plan(request(
            Dynamic::from("lb-abc"),
            Dynamic::Null,
            Dynamic::Null,
        ));

        assert_eq!(response.plan_value, Dynamic::Null);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_without_prior_state() {
        let response =
            UseStateForUnknown.modify_plan(request(Dynamic::Null, Dynamic::Unknown, Dynamic::Null));

        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn requires_replace_if_uses_predicate_and_warns() {
        let modifier = RequiresReplaceIf::new(
            |req: &PlanModifyRequest| {
                req.state.as_i64().unwrap_or(0) > req.plan.as_i64().unwrap_or(0)
            },
            "Shrinking the bandwidth requires a new connection",
        );

        let shrink = modifier.modify_plan(request(
            Dynamic::Number(100.0),
            Dynamic::Number(10.0),
            Dynamic::Number(10.0),
        ));
        assert!(shrink.requires_replace);
        assert_eq!(shrink.diagnostics.warnings.len(), 1);

        let grow = modifier.modify_plan(request(
            Dynamic::Number(10.0),
            Dynamic::Number(100.0),
            Dynamic::Number(100.0),
        ));
        assert!(!grow.requires_replace);
        assert!(grow.diagnostics.warnings.is_empty());
    }

    #[test]
    fn values_equal_compares_nested_structures() {
        let a = Dynamic::Map(HashMap::from([(
            "rules".to_string(),
            Dynamic::string_list(["a", "b"]),
        )]));
        let b = a.clone();
        let c = Dynamic::Map(HashMap::from([(
            "rules".to_string(),
            Dynamic::string_list(["b", "a"]),
        )]));

        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &c));
        assert!(!values_equal(&Dynamic::Unknown, &Dynamic::Unknown));
    }
}

//! Composite resource IDs
//!
//! Terraform stores a single string per resource. Resources addressed by more
//! than one vendor ID keep typed structs internally and join the parts with
//! [`FIELD_SEPARATOR`] only when writing `id` into state.

use std::fmt;

use super::error::ApiError;

pub const FIELD_SEPARATOR: &str = "#";

fn split_id<'a>(id: &'a str, parts: usize, kind: &str) -> Result<Vec<&'a str>, ApiError> {
    let segments: Vec<&str> = id.split(FIELD_SEPARATOR).collect();
    if segments.len() != parts || segments.iter().any(|s| s.is_empty()) {
        return Err(ApiError::InvalidId(format!(
            "{} id is broken, id is {}",
            kind, id
        )));
    }
    Ok(segments)
}

/// Listener IDs look like `lbl-xxxxxxxx`
pub fn check_listener_id(listener_id: &str) -> Result<(), ApiError> {
    if listener_id.starts_with("lbl-") {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "listener id is not valid: {}, it must start with 'lbl-'",
            listener_id
        )))
    }
}

/// Rule location IDs look like `loc-xxxxxxxx`
pub fn check_location_id(location_id: &str) -> Result<(), ApiError> {
    if location_id.starts_with("loc-") {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "rule id is not valid: {}, it must start with 'loc-'",
            location_id
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerId {
    pub clb_id: String,
    pub listener_id: String,
}

impl ListenerId {
    pub fn parse(id: &str) -> Result<Self, ApiError> {
        let parts = split_id(id, 2, "tencentcloud_clb_listener")?;
        Ok(Self {
            clb_id: parts[0].to_string(),
            listener_id: parts[1].to_string(),
        })
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.clb_id, FIELD_SEPARATOR, self.listener_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRuleId {
    pub clb_id: String,
    pub listener_id: String,
    pub location_id: String,
}

impl ListenerRuleId {
    pub fn parse(id: &str) -> Result<Self, ApiError> {
        let parts = split_id(id, 3, "tencentcloud_clb_listener_rule")?;
        Ok(Self {
            clb_id: parts[0].to_string(),
            listener_id: parts[1].to_string(),
            location_id: parts[2].to_string(),
        })
    }
}

impl fmt::Display for ListenerRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.clb_id,
            self.listener_id,
            self.location_id,
            sep = FIELD_SEPARATOR
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionId {
    pub clb_id: String,
    pub source_listener_id: String,
    pub source_location_id: String,
    pub target_listener_id: String,
    pub target_location_id: String,
}

impl RedirectionId {
    pub fn parse(id: &str) -> Result<Self, ApiError> {
        let parts = split_id(id, 5, "tencentcloud_clb_redirection")?;
        Ok(Self {
            clb_id: parts[0].to_string(),
            source_listener_id: parts[1].to_string(),
            source_location_id: parts[2].to_string(),
            target_listener_id: parts[3].to_string(),
            target_location_id: parts[4].to_string(),
        })
    }
}

impl fmt::Display for RedirectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.clb_id,
            self.source_listener_id,
            self.source_location_id,
            self.target_listener_id,
            self.target_location_id,
            sep = FIELD_SEPARATOR
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceId {
    pub registry_id: String,
    pub namespace: String,
}

impl NamespaceId {
    pub fn parse(id: &str) -> Result<Self, ApiError> {
        let parts = split_id(id, 2, "tencentcloud_tcr_namespace")?;
        Ok(Self {
            registry_id: parts[0].to_string(),
            namespace: parts[1].to_string(),
        })
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.registry_id, FIELD_SEPARATOR, self.namespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagId {
    pub key: String,
    pub value: String,
}

impl TagId {
    pub fn parse(id: &str) -> Result<Self, ApiError> {
        let parts = split_id(id, 2, "tencentcloud_tag")?;
        Ok(Self {
            key: parts[0].to_string(),
            value: parts[1].to_string(),
        })
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, FIELD_SEPARATOR, self.value)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn listener_id_requires_two_segments() {
        let id = ListenerId::parse("lb-abc#lbl-123").unwrap();
        assert_eq!(id.clb_id, "lb-abc");
        assert_eq!(id.listener_id, "lbl-123");
        assert_eq!(id.to_string(), "lb-abc#lbl-123");

        for broken in ["lb-abc", "lb-abc#lbl-1#extra", "#lbl-1", "lb-abc#", ""] {
            let err = ListenerId::parse(broken).unwrap_err();
            assert!(matches!(err, ApiError::InvalidId(_)));
            assert!(err.to_string().contains("id is broken"), "{}", broken);
        }
    }

    #[test]
    fn rule_id_has_three_segments() {
        let id = ListenerRuleId::parse("lb-abc#lbl-1#loc-2").unwrap();
        assert_eq!(id.location_id, "loc-2");
        assert_eq!(id.to_string(), "lb-abc#lbl-1#loc-2");
        assert!(ListenerRuleId::parse("lb-abc#lbl-1").is_err());
    }

    #[test]
    fn redirection_id_has_five_segments() {
        let raw = "lb-abc#lbl-src#loc-src#lbl-dst#loc-dst";
        let id = RedirectionId::parse(raw).unwrap();
        assert_eq!(id.source_location_id, "loc-src");
        assert_eq!(id.target_listener_id, "lbl-dst");
        assert_eq!(id.to_string(), raw);

        let err = RedirectionId::parse("lb-abc#lbl-src#loc-src#lbl-dst").unwrap_err();
        assert_eq!(
            err.to_string(),
            "tencentcloud_clb_redirection id is broken, id is lb-abc#lbl-src#loc-src#lbl-dst"
        );
    }

    #[test]
    fn namespace_and_tag_ids() {
        let ns = NamespaceId::parse("tcr-123#team").unwrap();
        assert_eq!(ns.registry_id, "tcr-123");
        assert_eq!(ns.namespace, "team");

        let tag = TagId::parse("env#prod").unwrap();
        assert_eq!(tag.key, "env");
        assert_eq!(tag.to_string(), "env#prod");
        assert!(TagId::parse("env").is_err());
    }

    #[test]
    fn listener_and_location_prefixes() {
        assert!(check_listener_id("lbl-abc").is_ok());
        assert!(matches!(
            check_listener_id("loc-abc"),
            Err(ApiError::Validation(_))
        ));
        assert!(check_location_id("loc-abc").is_ok());
        assert!(check_location_id("lbl-abc").is_err());
    }
}

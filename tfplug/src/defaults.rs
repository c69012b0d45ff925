//! Default value providers for attributes
//!
//! Defaults are evaluated during planning for optional+computed attributes
//! whose configuration value is null.
//!
//! ```no_run
//! use tfplug::schema::AttributeBuilder;
//! use tfplug::defaults::StaticDefault;
//!
//! let protocol = AttributeBuilder::string("protocol")
//!     .optional()
//!     .computed()
//!     .default(StaticDefault::string("HTTPS"))
//!     .build();
//! ```

use crate::types::Dynamic;

pub struct DefaultRequest {
    pub attribute_path: String,
}

pub struct DefaultResponse {
    pub value: Dynamic,
}

/// Supplies a value for an attribute the configuration left unset
pub trait AttributeDefault: Send + Sync {
    fn description(&self) -> String;

    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn AttributeDefault> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn AttributeDefault> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn AttributeDefault> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn AttributeDefault> {
        Self::create(Dynamic::Bool(value))
    }
}

impl AttributeDefault for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: self.value.clone(),
        }
    }
}

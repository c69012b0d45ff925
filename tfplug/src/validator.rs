use crate::types::{Diagnostics, Dynamic};

/// Attribute-level check run during `ValidateResourceConfig`. Null and
/// unknown values are skipped by every built-in validator.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_string() {
            let len = s.chars().count();
            if let Some(min) = self.min {
                if len < min {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must have minimum length of {}", attribute_path, min),
                        Some(format!("Got length {}", len)),
                    );
                }
            }
            if let Some(max) = self.max {
                if len > max {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must have maximum length of {}", attribute_path, max),
                        Some(format!("Got length {}", len)),
                    );
                }
            }
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl Validator for StringPatternValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_string() {
            if !self.pattern.is_match(s) {
                diagnostics.add_attribute_error(
                    attribute_path,
                    format!("{} must match {}", attribute_path, self.description),
                    Some(format!("Value '{}' does not match pattern", s)),
                );
            }
        }
    }
}

pub struct StringOneOfValidator {
    pub allowed: Vec<&'static str>,
}

impl StringOneOfValidator {
    pub fn new(allowed: &[&'static str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.to_vec(),
        })
    }
}

impl Validator for StringOneOfValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_string() {
            if !self.allowed.contains(&s.as_str()) {
                diagnostics.add_attribute_error(
                    attribute_path,
                    format!(
                        "{} must be one of: {}",
                        attribute_path,
                        self.allowed.join(", ")
                    ),
                    Some(format!("Got '{}'", s)),
                );
            }
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Some(n) = value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must be at least {}", attribute_path, min),
                        Some(format!("Got {}", n)),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must be at most {}", attribute_path, max),
                        Some(format!("Got {}", n)),
                    );
                }
            }
        }
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Dynamic::List(items) = value {
            if let Some(min) = self.min {
                if items.len() < min {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must have at least {} items", attribute_path, min),
                        Some(format!("Got {} items", items.len())),
                    );
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must have at most {} items", attribute_path, max),
                        Some(format!("Got {} items", items.len())),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Diagnostics, Dynamic};

    #[test]
    fn string_length_validator_accepts_valid_length() {
        let validator = StringLengthValidator {
            min: Some(1),
            max: Some(60),
        };

        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::from("tf-clb"), "clb_name", &mut diags);

        assert_eq!(diags.errors.len(), 0);
    }

    #[test]
    fn string_length_validator_rejects_too_long() {
        let validator = StringLengthValidator {
            min: None,
            max: Some(5),
        };

        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::from("hello world"), "clb_name", &mut diags);

        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].summary.contains("maximum length"));
        assert_eq!(diags.errors[0].attribute.as_deref(), Some("clb_name"));
    }

    #[test]
    fn string_pattern_validator_rejects_non_matching() {
        let validator = StringPatternValidator {
            pattern: regex::Regex::new(r"^lbl-[a-z0-9]+$").unwrap(),
            description: "a listener id".to_string(),
        };

        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::from("lbl-abc123"), "listener_id", &mut diags);
        assert!(diags.errors.is_empty());

        validator.validate(&Dynamic::from("loc-abc123"), "listener_id", &mut diags);
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].summary.contains("a listener id"));
    }

    #[test]
    fn one_of_validator_lists_allowed_values() {
        let validator = StringOneOfValidator::new(&["OPEN", "INTERNAL"]);

        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::from("OPEN"), "network_type", &mut diags);
        assert!(diags.errors.is_empty());

        validator.validate(&Dynamic::from("PUBLIC"), "network_type", &mut diags);
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].summary.contains("OPEN, INTERNAL"));
    }

    #[test]
    fn validators_skip_unknown_values() {
        let validator = StringOneOfValidator::new(&["TCP"]);
        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::Unknown, "protocol", &mut diags);
        validator.validate(&Dynamic::Null, "protocol", &mut diags);
        assert!(diags.errors.is_empty());
    }

    #[test]
    fn number_range_validator_rejects_out_of_range_port() {
        let validator = NumberRangeValidator {
            min: Some(1.0),
            max: Some(65535.0),
        };

        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::Number(80.0), "port", &mut diags);
        assert!(diags.errors.is_empty());

        validator.validate(&Dynamic::Number(70000.0), "port", &mut diags);
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].summary.contains("at most"));
    }

    #[test]
    fn list_length_validator_rejects_too_many_items() {
        let validator = ListLengthValidator {
            min: None,
            max: Some(1),
        };

        let mut diags = Diagnostics::new();
        let list = Dynamic::string_list(["sg-1", "sg-2"]);
        validator.validate(&list, "security_groups", &mut diags);

        assert_eq!(diags.errors.len(), 1);
    }
}

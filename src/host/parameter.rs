//! Build parameter declarations

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::client::ParameterDefinition;

static DEFINITION_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)ParameterDefinition$").unwrap());

/// A configurable build parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    kind: String,
    description: String,
    default_value: Option<serde_json::Value>,
}

impl Parameter {
    pub(crate) fn new(definition: &ParameterDefinition) -> Self {
        let kind = DEFINITION_TYPE
            .captures(&definition.kind)
            .map_or(definition.kind.as_str(), |caps| {
                caps.get(1).map_or("", |m| m.as_str())
            })
            .to_lowercase();

        Self {
            name: definition.name.clone(),
            kind,
            description: definition.description.clone().unwrap_or_default(),
            default_value: definition
                .default_parameter_value
                .as_ref()
                .map(|v| v.value.clone()),
        }
    }

    /// Parameter name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `string`, `boolean`, `choice`, ...
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Help text
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Default value, if declared
    #[must_use]
    pub fn default_value(&self) -> Option<&serde_json::Value> {
        self.default_value.as_ref()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ParameterValue;

    fn definition(kind: &str, default: Option<serde_json::Value>) -> ParameterDefinition {
        ParameterDefinition {
            name: "FLAG".to_string(),
            kind: kind.to_string(),
            description: None,
            default_parameter_value: default.map(|value| ParameterValue { name: None, value }),
        }
    }

    #[test]
    fn test_kind_from_definition_type() {
        let param = Parameter::new(&definition("BooleanParameterDefinition", Some(true.into())));
        assert_eq!(param.kind(), "boolean");
        assert_eq!(param.default_value(), Some(&serde_json::Value::Bool(true)));
        assert_eq!(param.description(), "");
        assert_eq!(param.to_string(), "FLAG");
    }

    #[test]
    fn test_unconventional_type_is_kept() {
        let param = Parameter::new(&definition("GitParameter", None));
        assert_eq!(param.kind(), "gitparameter");
        assert_eq!(param.default_value(), None);
    }
}

// src/package/params.rs

//! Parameter definitions, diffs and validation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Package;

/// Declared value type of a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Map,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Map => "map",
        }
    }

    /// Check that a raw string value parses as this type
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        let ok = match self {
            ParameterType::String => true,
            ParameterType::Integer => value.parse::<i64>().is_ok(),
            ParameterType::Number => value.parse::<f64>().is_ok(),
            ParameterType::Boolean => matches!(
                value,
                "1" | "t" | "T" | "true" | "TRUE" | "True" | "0" | "f" | "F" | "false" | "FALSE"
                    | "False"
            ),
            ParameterType::Array => {
                matches!(
                    serde_json::from_str::<serde_json::Value>(value),
                    Ok(serde_json::Value::Array(_))
                )
            }
            ParameterType::Map => {
                matches!(
                    serde_json::from_str::<serde_json::Value>(value),
                    Ok(serde_json::Value::Object(_))
                )
            }
        };

        if ok {
            Ok(())
        } else {
            Err(format!("type is {:?} but format of {:?} is invalid", self.as_str(), value))
        }
    }
}

/// A value an instance may set on its package version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub default: Option<String>,
    /// Plan to run when the value of this parameter changes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trigger: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub immutable: bool,
    #[serde(default)]
    pub value_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl Parameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn with_trigger(mut self, plan: &str) -> Self {
        self.trigger = plan.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn with_type(mut self, value_type: ParameterType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Validate a value the instance sets for this parameter
    ///
    /// An empty value is only rejected for required parameters without a default.
    pub fn validate_value(&self, value: &str) -> Result<()> {
        if value.is_empty() {
            if self.required && self.default.is_none() {
                return Err(Error::InvalidParameter(format!(
                    "parameter {:?} is required but has no value set",
                    self.name
                )));
            }
            return Ok(());
        }

        self.value_type.check(value).map_err(|reason| {
            Error::InvalidParameter(format!(
                "parameter {:?} has an invalid value {:?}: {}",
                self.name, value, reason
            ))
        })?;

        if let Some(allowed) = &self.enum_values
            && !allowed.iter().any(|v| v == value)
        {
            return Err(Error::InvalidParameter(format!(
                "parameter {:?} has an invalid value {:?}: only allowed values are {:?}",
                self.name, value, allowed
            )));
        }

        Ok(())
    }
}

/// Split a parameter diff into changed-or-added and removed entries
///
/// Values are compared as exact strings; removed entries carry their old value.
pub fn rich_parameter_diff(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let removed = old
        .iter()
        .filter(|(key, _)| !new.contains_key(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let changed = new
        .iter()
        .filter(|(key, val)| old.get(*key) != Some(*val))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    (changed, removed)
}

/// All parameters added, removed or changed between two value maps
pub fn parameter_diff(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let (mut changed, removed) = rich_parameter_diff(old, new);
    changed.extend(removed);
    changed
}

/// Definitions for the diffed parameters, in parameter-name order
///
/// Names without a definition in the package are skipped.
pub fn parameter_definitions<'a>(
    diff: &BTreeMap<String, String>,
    package: &'a Package,
) -> Vec<&'a Parameter> {
    diff.keys().filter_map(|name| package.parameter(name)).collect()
}

/// Validate every parameter value an instance provides
///
/// Required parameters without a default must be present.
pub fn validate_parameters(package: &Package, values: &BTreeMap<String, String>) -> Result<()> {
    for param in &package.parameters {
        match values.get(&param.name) {
            Some(value) => param.validate_value(value)?,
            None if param.required && param.default.is_none() => {
                return Err(Error::InvalidParameter(format!(
                    "parameter {:?} is required but has no value set",
                    param.name
                )));
            }
            None => {}
        }
    }
    Ok(())
}

/// Reject a value change of an immutable parameter within one package version
pub fn check_immutable_parameters(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
    package: &Package,
) -> Result<()> {
    let (changed, _) = rich_parameter_diff(old, new);
    for param in parameter_definitions(&changed, package) {
        if param.immutable {
            return Err(Error::ImmutableParameter {
                name: param.name.clone(),
                old: old.get(&param.name).cloned().unwrap_or_default(),
                new: new.get(&param.name).cloned().unwrap_or_default(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_rich_diff_separates_removed() {
        let old = values(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = values(&[("a", "1"), ("b", "20"), ("d", "4")]);

        let (changed, removed) = rich_parameter_diff(&old, &new);
        assert_eq!(changed, values(&[("b", "20"), ("d", "4")]));
        assert_eq!(removed, values(&[("c", "3")]));
    }

    #[test]
    fn test_diff_uses_exact_strings() {
        let old = values(&[("replicas", "3")]);
        let new = values(&[("replicas", "03")]);
        assert_eq!(parameter_diff(&old, &new), values(&[("replicas", "03")]));

        assert!(parameter_diff(&old, &old.clone()).is_empty());
    }

    #[test]
    fn test_definitions_skip_unknown_names() {
        let pkg = Package::new("kafka", "1.0.0")
            .with_parameter(Parameter::new("BROKERS"))
            .with_parameter(Parameter::new("ZK_URI"));
        let diff = values(&[("BROKERS", "3"), ("UNDECLARED", "x")]);

        let defs = parameter_definitions(&diff, &pkg);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "BROKERS");
    }

    #[test]
    fn test_validate_value_types() {
        let int = Parameter::new("replicas").with_type(ParameterType::Integer);
        assert!(int.validate_value("3").is_ok());
        assert!(int.validate_value("three").is_err());

        let boolean = Parameter::new("tls").with_type(ParameterType::Boolean);
        assert!(boolean.validate_value("true").is_ok());
        assert!(boolean.validate_value("yes").is_err());

        let array = Parameter::new("zones").with_type(ParameterType::Array);
        assert!(array.validate_value(r#"["a","b"]"#).is_ok());
        assert!(array.validate_value(r#"{"a":1}"#).is_err());

        let map = Parameter::new("labels").with_type(ParameterType::Map);
        assert!(map.validate_value(r#"{"team":"data"}"#).is_ok());
    }

    #[test]
    fn test_validate_enum_and_required() {
        let mode = Parameter::new("mode").with_enum(&["fast", "safe"]);
        assert!(mode.validate_value("safe").is_ok());
        assert!(mode.validate_value("reckless").is_err());

        let pkg = Package::new("db", "1.0.0")
            .with_parameter(Parameter::new("PASSWORD").required())
            .with_parameter(Parameter::new("PORT").required().with_default("5432"));

        assert!(validate_parameters(&pkg, &values(&[])).is_err());
        assert!(validate_parameters(&pkg, &values(&[("PASSWORD", "s3cret")])).is_ok());
    }

    #[test]
    fn test_immutable_parameter_change_rejected() {
        let pkg = Package::new("db", "1.0.0")
            .with_parameter(Parameter::new("STORAGE_CLASS").immutable())
            .with_parameter(Parameter::new("REPLICAS"));

        let old = values(&[("STORAGE_CLASS", "fast"), ("REPLICAS", "1")]);
        let scaled = values(&[("STORAGE_CLASS", "fast"), ("REPLICAS", "3")]);
        let moved = values(&[("STORAGE_CLASS", "slow"), ("REPLICAS", "1")]);

        assert!(check_immutable_parameters(&old, &scaled, &pkg).is_ok());
        match check_immutable_parameters(&old, &moved, &pkg) {
            Err(Error::ImmutableParameter { name, old, new }) => {
                assert_eq!(name, "STORAGE_CLASS");
                assert_eq!(old, "fast");
                assert_eq!(new, "slow");
            }
            other => panic!("expected ImmutableParameter, got {:?}", other),
        }
    }
}

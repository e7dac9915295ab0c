//! Parameter validation.
//!
//! The validator runs once per parameter during the prepare phase, before
//! any hook touches the request. The first violation aborts the whole call
//! with [`InvokeError::Validation`] naming the offending parameter; no
//! later phase runs.

use serde_json::Value;

use courier_types::InvokeError;

use crate::descriptor::ParameterDescriptor;

/// A declarative constraint on an argument value.
///
/// Constraints other than [`Constraint::Required`] pass when the value is
/// absent or JSON null; pairing a constraint with a value of the wrong JSON
/// type (e.g. a length bound against a number) is a violation, not a skip.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The argument must be present and not JSON null.
    Required,
    /// Minimum number of characters in a string value.
    MinLength(usize),
    /// Maximum number of characters in a string value.
    MaxLength(usize),
    /// Inclusive numeric bounds.
    Range { min: f64, max: f64 },
    /// The string value must be one of the listed alternatives.
    OneOf(Vec<String>),
}

/// A constraint applied to one field of a JSON object argument.
///
/// Enforced only when property-level checks are enabled for the call.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyConstraint {
    property: String,
    constraint: Constraint,
}

impl PropertyConstraint {
    pub fn new(property: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            property: property.into(),
            constraint,
        }
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    #[must_use]
    pub const fn constraint(&self) -> &Constraint {
        &self.constraint
    }
}

/// Validate one argument against its parameter descriptor.
///
/// Parameter-level constraints are checked in declared order, then - when
/// `check_properties` is set - property-level constraints against the
/// fields of an object argument.
pub fn validate(
    param: &ParameterDescriptor,
    value: Option<&Value>,
    check_properties: bool,
) -> Result<(), InvokeError> {
    let violation = |reason: String| InvokeError::Validation {
        parameter: param.name().to_string(),
        reason,
    };

    for constraint in param.constraints() {
        check(constraint, value).map_err(&violation)?;
    }

    if !check_properties || param.property_constraints().is_empty() {
        return Ok(());
    }

    let fields = match value {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(violation(format!(
                "property constraints require an object, got {}",
                json_type(other)
            )));
        }
    };

    for pc in param.property_constraints() {
        check(pc.constraint(), fields.get(pc.property()))
            .map_err(|reason| violation(format!("property `{}`: {reason}", pc.property())))?;
    }

    Ok(())
}

fn check(constraint: &Constraint, value: Option<&Value>) -> Result<(), String> {
    let value = match value {
        None | Some(Value::Null) => {
            return if matches!(constraint, Constraint::Required) {
                Err("value is required".to_string())
            } else {
                Ok(())
            };
        }
        Some(value) => value,
    };

    match constraint {
        Constraint::Required => Ok(()),
        Constraint::MinLength(min) => match value.as_str() {
            Some(s) if s.chars().count() >= *min => Ok(()),
            Some(s) => Err(format!(
                "length {} is below the minimum of {min}",
                s.chars().count()
            )),
            None => Err(format!("expected a string, got {}", json_type(value))),
        },
        Constraint::MaxLength(max) => match value.as_str() {
            Some(s) if s.chars().count() <= *max => Ok(()),
            Some(s) => Err(format!(
                "length {} exceeds the maximum of {max}",
                s.chars().count()
            )),
            None => Err(format!("expected a string, got {}", json_type(value))),
        },
        Constraint::Range { min, max } => match value.as_f64() {
            Some(n) if n >= *min && n <= *max => Ok(()),
            Some(n) => Err(format!("{n} is outside the range [{min}, {max}]")),
            None => Err(format!("expected a number, got {}", json_type(value))),
        },
        Constraint::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
            Some(s) => Err(format!("`{s}` is not one of {allowed:?}")),
            None => Err(format!("expected a string, got {}", json_type(value))),
        },
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

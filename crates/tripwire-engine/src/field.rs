//! Field binding: consumers read configured values, producers publish results
//!
//! A [`Field`] is a named slot on a node made of an optional [`Consumer`] and
//! an optional [`Producer`]. Consumers hold a raw string (a literal, or text
//! with `{{path}}` placeholders) that is resolved against the walk's
//! [`Variables`] on demand. Producers only carry the variable name their node
//! publishes under.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FieldValueError;
use crate::events::{EventKey, TypeCatalog};
use crate::expression;
use crate::value::{Value, ValueKind, Variables};

/// `{{path}}` placeholders; the path may contain dots and surrounding spaces
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([^{}]+)\}\}").expect("variable pattern is a valid regex")
});

/// Declared type of a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Boolean,
    Long,
    Double,
    /// One of the declared options
    Enum,
    /// A type name resolved through the [`TypeCatalog`]
    Class,
}

impl FieldKind {
    fn label(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Long => "long",
            Self::Double => "double",
            Self::Enum => "enum",
            Self::Class => "class",
        }
    }
}

/// Presentation hint for numeric fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Millisecond,
    Second,
    Minute,
    Percent,
}

/// A selectable value for a consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    pub label: String,
    pub value: String,
    /// Kind of value the node produces when this option is chosen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produce_type: Option<ValueKind>,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            produce_type: None,
        }
    }
}

/// Read side of a field
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    #[serde(skip)]
    field: String,
    #[serde(rename = "type")]
    kind: FieldKind,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(skip)]
    value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<FieldOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<Unit>,
}

impl Consumer {
    /// A required consumer of the given kind with no default
    pub fn new(kind: FieldKind) -> Self {
        Self {
            field: String::new(),
            kind,
            required: true,
            default_value: None,
            value: None,
            options: Vec::new(),
            unit: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn long() -> Self {
        Self::new(FieldKind::Long)
    }

    pub fn double() -> Self {
        Self::new(FieldKind::Double)
    }

    pub fn enumeration() -> Self {
        Self::new(FieldKind::Enum)
    }

    pub fn class() -> Self {
        Self::new(FieldKind::Class)
    }

    pub fn not_required(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn option(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(FieldOption::new(label, value));
        self
    }

    pub fn option_producing(
        mut self,
        label: impl Into<String>,
        value: impl Into<String>,
        produce_type: ValueKind,
    ) -> Self {
        self.options.push(FieldOption {
            produce_type: Some(produce_type),
            ..FieldOption::new(label, value)
        });
        self
    }

    /// Add one option per name, label and value identical
    pub fn options<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.add_options(names);
        self
    }

    /// In-place form of [`Consumer::options`]
    pub fn add_options<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.options.push(FieldOption::new(name.as_ref(), name.as_ref()));
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn unit_hint(&self) -> Option<Unit> {
        self.unit
    }

    pub fn option_list(&self) -> &[FieldOption] {
        &self.options
    }

    /// Bind a configured value, replacing the default
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// The configured value only, without the default
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The configured value, falling back to the default
    pub fn raw(&self) -> Option<&str> {
        self.value.as_deref().or(self.default_value.as_deref())
    }

    /// Whether the consumer has something to resolve
    pub fn is_bound(&self) -> bool {
        self.raw().is_some()
    }

    fn require_raw(&self) -> Result<&str, FieldValueError> {
        self.raw().ok_or_else(|| FieldValueError::Unbound {
            field: self.field.clone(),
        })
    }

    fn malformed(&self, value: &str) -> FieldValueError {
        FieldValueError::Malformed {
            field: self.field.clone(),
            value: value.to_string(),
            expected: self.kind.label().to_string(),
        }
    }

    /// Resolve `{{path}}` placeholders against the variable context
    ///
    /// Literal spans are kept in order. A placeholder that does not resolve
    /// becomes an empty segment; that never fails.
    pub fn as_string(&self, variables: &Variables) -> String {
        let Some(raw) = self.raw() else {
            log::debug!("Field '{}' has no value, resolving to empty", self.field);
            return String::new();
        };

        if !VARIABLE_PATTERN.is_match(raw) {
            return raw.to_string();
        }

        let mut result = String::with_capacity(raw.len());
        let mut last_end = 0;

        for captures in VARIABLE_PATTERN.captures_iter(raw) {
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            log::debug!("Resolving variable: {}", path.as_str());

            result.push_str(&raw[last_end..whole.start()]);
            match variables.resolve(path.as_str()) {
                Some(value) => result.push_str(&value.to_string()),
                None => log::debug!(
                    "Variable not found: '{}' in field '{}'",
                    path.as_str().trim(),
                    self.field
                ),
            }
            last_end = whole.end();
        }

        result.push_str(&raw[last_end..]);
        result
    }

    /// Parse the value as `true`/`false` (case-insensitive)
    pub fn as_boolean(&self) -> Result<bool, FieldValueError> {
        let raw = self.require_raw()?;
        match raw.trim() {
            s if s.eq_ignore_ascii_case("true") => Ok(true),
            s if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.malformed(raw)),
        }
    }

    /// Parse the value as a signed 64-bit integer
    pub fn as_long(&self) -> Result<i64, FieldValueError> {
        let raw = self.require_raw()?;
        raw.trim().parse::<i64>().map_err(|_| self.malformed(raw))
    }

    /// Evaluate the value as an arithmetic expression
    pub fn as_double(&self, variables: &Variables) -> Result<f64, FieldValueError> {
        let raw = self.require_raw()?;
        expression::evaluate_number(raw, variables).map_err(|source| FieldValueError::Expression {
            field: self.field.clone(),
            source,
        })
    }

    /// Evaluate the value with the expression evaluator, keeping its kind
    pub fn evaluate(&self, expected: ValueKind, variables: &Variables) -> Result<Value, FieldValueError> {
        let raw = self.require_raw()?;
        expression::evaluate(expected, raw, variables).map_err(|source| FieldValueError::Expression {
            field: self.field.clone(),
            source,
        })
    }

    /// Parse the value as an enum, checking it against declared options
    pub fn as_enum<T: FromStr>(&self) -> Result<T, FieldValueError> {
        let raw = self.require_raw()?;
        self.check_option(raw)?;
        raw.trim().parse::<T>().map_err(|_| self.malformed(raw))
    }

    /// Resolve the value as a registered event type name
    pub fn as_class(&self, catalog: &TypeCatalog) -> Result<EventKey, FieldValueError> {
        let raw = self.require_raw()?;
        catalog
            .get(raw.trim())
            .ok_or_else(|| FieldValueError::UnknownType {
                field: self.field.clone(),
                value: raw.to_string(),
            })
    }

    fn check_option(&self, raw: &str) -> Result<(), FieldValueError> {
        if self.options.is_empty() || self.options.iter().any(|o| o.value == raw.trim()) {
            Ok(())
        } else {
            Err(FieldValueError::NotAnOption {
                field: self.field.clone(),
                value: raw.to_string(),
            })
        }
    }

    /// Check a bound literal against the declared kind
    ///
    /// Values containing placeholders are only checkable at evaluation time
    /// and pass here.
    pub fn validate(&self) -> Result<(), FieldValueError> {
        let Some(raw) = self.raw() else {
            return Ok(());
        };
        if VARIABLE_PATTERN.is_match(raw) {
            return Ok(());
        }

        match self.kind {
            FieldKind::String | FieldKind::Class => Ok(()),
            FieldKind::Boolean => self.as_boolean().map(|_| ()),
            FieldKind::Long => self.as_long().map(|_| ()),
            FieldKind::Double => self.as_double(&Variables::new()).map(|_| ()),
            FieldKind::Enum => self.check_option(raw),
        }
    }
}

/// Write side of a field
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Producer {
    #[serde(skip_serializing_if = "Option::is_none")]
    produce_type: Option<ValueKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variable_name: Option<String>,
}

impl Producer {
    /// A producer with no variable name; it publishes nothing until configured
    pub fn new() -> Self {
        Self::default()
    }

    /// A producer with a default variable name
    pub fn named(variable_name: impl Into<String>) -> Self {
        Self {
            produce_type: None,
            variable_name: Some(variable_name.into()),
        }
    }

    pub fn produce_type(mut self, kind: ValueKind) -> Self {
        self.produce_type = Some(kind);
        self
    }

    pub fn variable_name(&self) -> Option<&str> {
        self.variable_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn set_variable_name(&mut self, name: impl Into<String>) {
        self.variable_name = Some(name.into());
    }

    /// Publish `value` under the configured name; returns whether it was written
    pub fn publish(&self, variables: &mut Variables, value: impl Into<Value>) -> bool {
        match self.variable_name() {
            Some(name) => {
                variables.insert(name, value);
                true
            }
            None => false,
        }
    }
}

/// A named slot on a node
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    consumer: Option<Consumer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    producer: Option<Producer>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consumer: None,
            producer: None,
        }
    }

    /// Attach the read side
    pub fn consume(mut self, mut consumer: Consumer) -> Self {
        consumer.field = self.name.clone();
        self.consumer = Some(consumer);
        self
    }

    /// Attach the write side
    pub fn produce(mut self, producer: Producer) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn consumer(&self) -> Option<&Consumer> {
        self.consumer.as_ref()
    }

    pub fn consumer_mut(&mut self) -> Option<&mut Consumer> {
        self.consumer.as_mut()
    }

    pub fn producer(&self) -> Option<&Producer> {
        self.producer.as_ref()
    }

    pub fn producer_mut(&mut self) -> Option<&mut Producer> {
        self.producer.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StructuredValue;

    #[derive(Debug)]
    struct Player {
        name: &'static str,
    }

    impl StructuredValue for Player {
        fn get_field(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| Value::from(self.name))
        }
    }

    fn bound(kind: FieldKind, value: &str) -> Consumer {
        let field = Field::new("test").consume(Consumer::new(kind));
        let mut consumer = field.consumer().cloned().unwrap();
        consumer.set_value(Some(value.to_string()));
        consumer
    }

    #[test]
    fn test_interpolation_keeps_literal_spans() {
        let mut vars = Variables::new();
        vars.insert("a", 1.0);
        vars.insert("b", 2.0);

        let consumer = bound(FieldKind::String, "{{a}} + {{ b}}");
        assert_eq!(consumer.as_string(&vars), "1 + 2");

        let consumer = bound(FieldKind::String, "sum: [{{a}}|{{b}}] done");
        assert_eq!(consumer.as_string(&vars), "sum: [1|2] done");
    }

    #[test]
    fn test_interpolation_dotted_path() {
        let mut vars = Variables::new();
        vars.insert("player", Value::structured(Player { name: "sharlotte" }));

        let consumer = bound(FieldKind::String, "hi {{player.name}}!");
        assert_eq!(consumer.as_string(&vars), "hi sharlotte!");

        // Missing nested field resolves to an empty segment
        let consumer = bound(FieldKind::String, "hi {{player.rank}}!");
        assert_eq!(consumer.as_string(&vars), "hi !");
    }

    #[test]
    fn test_plain_value_is_verbatim() {
        let consumer = bound(FieldKind::String, "no placeholders { here }");
        assert_eq!(consumer.as_string(&Variables::new()), "no placeholders { here }");
    }

    #[test]
    fn test_default_value_used_until_bound() {
        let field = Field::new("message").consume(Consumer::string().default_value("Hello"));
        let mut consumer = field.consumer().cloned().unwrap();
        assert_eq!(consumer.as_string(&Variables::new()), "Hello");

        consumer.set_value(Some("Bye".to_string()));
        assert_eq!(consumer.as_string(&Variables::new()), "Bye");
    }

    #[test]
    fn test_typed_parsing_errors_name_field() {
        let err = bound(FieldKind::Long, "ten").as_long().unwrap_err();
        assert_eq!(
            err,
            FieldValueError::Malformed {
                field: "test".to_string(),
                value: "ten".to_string(),
                expected: "long".to_string(),
            }
        );
        assert!(bound(FieldKind::Boolean, "yes").as_boolean().is_err());
        assert!(bound(FieldKind::Boolean, "TRUE").as_boolean().unwrap());
        assert_eq!(bound(FieldKind::Long, " 42 ").as_long().unwrap(), 42);
    }

    #[test]
    fn test_enum_checks_options() {
        #[derive(Debug, PartialEq)]
        enum Mode {
            Fast,
            Slow,
        }
        impl FromStr for Mode {
            type Err = ();
            fn from_str(s: &str) -> Result<Self, ()> {
                match s {
                    "Fast" => Ok(Mode::Fast),
                    "Slow" => Ok(Mode::Slow),
                    _ => Err(()),
                }
            }
        }

        let field = Field::new("mode").consume(Consumer::enumeration().options(&["Fast", "Slow"]));
        let mut consumer = field.consumer().cloned().unwrap();
        consumer.set_value(Some("Slow".to_string()));
        assert_eq!(consumer.as_enum::<Mode>().unwrap(), Mode::Slow);

        consumer.set_value(Some("Medium".to_string()));
        assert!(matches!(
            consumer.as_enum::<Mode>(),
            Err(FieldValueError::NotAnOption { .. })
        ));
        assert!(consumer.validate().is_err());
    }

    #[test]
    fn test_as_double_evaluates_expressions() {
        let mut vars = Variables::new();
        vars.insert("base", 4.0);
        let consumer = bound(FieldKind::Double, "{{base}} * 2 + 1");
        assert_eq!(consumer.as_double(&vars).unwrap(), 9.0);

        let consumer = bound(FieldKind::Double, "{{nothing}} * 2");
        assert!(matches!(
            consumer.as_double(&vars),
            Err(FieldValueError::Expression { .. })
        ));
    }

    #[test]
    fn test_validate_skips_placeholders() {
        assert!(bound(FieldKind::Long, "{{count}}").validate().is_ok());
        assert!(bound(FieldKind::Long, "12").validate().is_ok());
        assert!(bound(FieldKind::Long, "1.5").validate().is_err());
        assert!(bound(FieldKind::Double, "1.5 * 2").validate().is_ok());
    }

    #[test]
    fn test_producer_without_name_publishes_nothing() {
        let mut vars = Variables::new();
        assert!(!Producer::new().publish(&mut vars, 1.0));
        assert!(vars.is_empty());

        let mut producer = Producer::new();
        producer.set_variable_name("r");
        assert!(producer.publish(&mut vars, 0.25));
        assert_eq!(vars.get("r"), Some(&Value::Number(0.25)));
    }
}

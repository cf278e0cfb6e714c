//! # `x-kubernetes-validations` Rules
//!
//! Each rule is a CEL expression evaluated with `self` bound to the value
//! at the schema node that declares it. A rule passes when it evaluates to
//! `true`. Transition rules (those that read `oldSelf`) only apply to
//! updates and are skipped; kval only ever validates creation.
//!
//! Programs are compiled once per bundle. A rule that fails to compile is
//! reported as an internal error on every object that reaches it.
//!
//! A failing rule reports the string its `messageExpression` produces. When
//! that expression does not compile, fails, or yields anything but a
//! non-empty single-line string, the static `message` is used instead.

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::{Context, Program, Value as CelValue};
use kval_core::{ErrorList, ErrorType, FieldError, Path};
use serde_json::Value;
use tracing::debug;

use crate::structural::{AdditionalProperties, Structural, ValidationRule};
use crate::validator::type_name;

const OLD_SELF: &str = "oldSelf";

/// A rule together with its compiled program (or why it failed to
/// compile).
struct CompiledRule {
    rule: ValidationRule,
    program: Result<Program, String>,
    message: Option<Program>,
}

impl std::fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRule")
            .field("rule", &self.rule.rule)
            .field("compiled", &self.program.is_ok())
            .finish()
    }
}

/// Rule tree mirroring the structural schema, holding only branches that
/// contain rules.
#[derive(Debug, Default)]
pub(crate) struct RuleSet {
    rules: Vec<CompiledRule>,
    properties: Vec<(String, RuleSet)>,
    items: Option<Box<RuleSet>>,
    additional: Option<Box<RuleSet>>,
}

impl RuleSet {
    pub(crate) fn compile(schema: &Structural) -> Self {
        let rules = schema
            .extensions
            .validations
            .iter()
            .filter(|rule| {
                let transition = rule.rule.contains(OLD_SELF);
                if transition {
                    debug!(rule = %rule.rule, "skipping transition rule");
                }
                !transition
            })
            .map(|rule| CompiledRule {
                program: Program::compile(&rule.rule).map_err(|e| e.to_string()),
                message: rule.message_expression.as_deref().and_then(compile_message),
                rule: rule.clone(),
            })
            .collect();

        let properties = schema
            .properties
            .iter()
            .map(|(name, child)| (name.clone(), Self::compile(child)))
            .filter(|(_, set)| !set.is_empty())
            .collect();
        let items = schema
            .items
            .as_deref()
            .map(Self::compile)
            .filter(|set| !set.is_empty())
            .map(Box::new);
        let additional = match &schema.additional_properties {
            Some(AdditionalProperties::Schema(child)) => Some(Self::compile(child))
                .filter(|set| !set.is_empty())
                .map(Box::new),
            _ => None,
        };

        Self {
            rules,
            properties,
            items,
            additional,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rules.is_empty()
            && self.properties.is_empty()
            && self.items.is_none()
            && self.additional.is_none()
    }

    pub(crate) fn evaluate(&self, value: &Value, path: &Path, errors: &mut ErrorList) {
        if value.is_null() {
            return;
        }
        if !self.rules.is_empty() {
            let bound = json_to_cel(value);
            for compiled in &self.rules {
                if let Some(error) = evaluate_rule(compiled, &bound, value, path) {
                    errors.push(error);
                }
            }
        }

        match value {
            Value::Object(members) => {
                for (name, child) in &self.properties {
                    if let Some(member) = members.get(name) {
                        child.evaluate(member, &path.child(name.clone()), errors);
                    }
                }
                if let Some(additional) = &self.additional {
                    for (name, member) in members {
                        if !self.properties.iter().any(|(declared, _)| declared == name) {
                            additional.evaluate(member, &path.key(name.clone()), errors);
                        }
                    }
                }
            }
            Value::Array(elements) => {
                if let Some(items) = &self.items {
                    for (i, element) in elements.iter().enumerate() {
                        items.evaluate(element, &path.index(i), errors);
                    }
                }
            }
            _ => {}
        }
    }
}

fn compile_message(expression: &str) -> Option<Program> {
    Program::compile(expression)
        .map_err(|e| debug!(%expression, error = %e, "messageExpression does not compile"))
        .ok()
}

/// The message `messageExpression` produces, if it produces a usable one.
fn expression_message(compiled: &CompiledRule, context: &Context) -> Option<String> {
    match compiled.message.as_ref()?.execute(context) {
        Ok(CelValue::String(message)) if !message.trim().is_empty() && !message.contains('\n') => {
            Some(message.to_string())
        }
        Ok(other) => {
            debug!(rule = %compiled.rule.rule, result = ?other, "messageExpression did not yield a message");
            None
        }
        Err(e) => {
            debug!(rule = %compiled.rule.rule, error = %e, "messageExpression failed");
            None
        }
    }
}

fn evaluate_rule(compiled: &CompiledRule, bound: &CelValue, value: &Value, path: &Path) -> Option<FieldError> {
    let rule = &compiled.rule;
    let program = match &compiled.program {
        Ok(program) => program,
        Err(reason) => {
            return Some(FieldError::internal(
                path.clone(),
                format!("rule compile error: {reason}"),
            ))
        }
    };

    let mut context = Context::default();
    if let Err(e) = context.add_variable("self", bound.clone()) {
        return Some(FieldError::internal(path.clone(), e.to_string()));
    }
    let outcome = program.execute(&context);

    let at = match &rule.field_path {
        Some(relative) => path.join_relative(relative),
        None => path.clone(),
    };
    match outcome {
        Ok(CelValue::Bool(true)) => None,
        Ok(CelValue::Bool(false)) => {
            let detail = expression_message(compiled, &context)
                .or_else(|| rule.message.clone())
                .unwrap_or_else(|| format!("failed rule: {}", rule.rule));
            Some(FieldError::new(
                reason_type(rule.reason.as_deref()),
                at,
                Some(Value::from(type_name(value))),
                detail,
            ))
        }
        Ok(other) => Some(FieldError::invalid(
            at,
            type_name(value),
            format!("rule {:?} evaluated to non-boolean {other:?}", rule.rule),
        )),
        Err(e) => Some(FieldError::invalid(
            at,
            type_name(value),
            format!("rule {:?} failed to evaluate: {e}", rule.rule),
        )),
    }
}

/// `reason` on a rule selects the reported error type.
fn reason_type(reason: Option<&str>) -> ErrorType {
    match reason {
        Some("FieldValueRequired") => ErrorType::Required,
        Some("FieldValueDuplicate") => ErrorType::Duplicate,
        Some("FieldValueForbidden") => ErrorType::Forbidden,
        _ => ErrorType::Invalid,
    }
}

pub(crate) fn json_to_cel(value: &Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => CelValue::Int(i),
            (None, Some(u)) => CelValue::UInt(u),
            _ => CelValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => CelValue::String(Arc::new(s.clone())),
        Value::Array(items) => CelValue::List(items.iter().map(json_to_cel).collect::<Vec<_>>().into()),
        Value::Object(members) => {
            let map: HashMap<String, CelValue> = members
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cel(v)))
                .collect();
            CelValue::Map(map.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(schema: Value, value: Value) -> ErrorList {
        let structural = Structural::from_value(&schema).unwrap();
        let mut errors = ErrorList::new();
        RuleSet::compile(&structural).evaluate(&value, &Path::root(), &mut errors);
        errors
    }

    fn spec_schema(rules: Value) -> Value {
        json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "object",
                    "properties": {
                        "min": { "type": "integer" },
                        "max": { "type": "integer" }
                    },
                    "x-kubernetes-validations": rules
                }
            }
        })
    }

    #[test]
    fn passing_rule_reports_nothing() {
        let errors = run(
            spec_schema(json!([{ "rule": "self.min <= self.max" }])),
            json!({ "spec": { "min": 1, "max": 2 } }),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn failing_rule_uses_message_and_node_path() {
        let errors = run(
            spec_schema(json!([{ "rule": "self.min <= self.max", "message": "min must not exceed max" }])),
            json!({ "spec": { "min": 3, "max": 2 } }),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.errors()[0].to_string(),
            "spec: Invalid value: \"object\": min must not exceed max"
        );
    }

    #[test]
    fn failing_rule_without_message_names_the_rule() {
        let errors = run(
            spec_schema(json!([{ "rule": "self.min <= self.max", "fieldPath": ".max", "reason": "FieldValueForbidden" }])),
            json!({ "spec": { "min": 3, "max": 2 } }),
        );
        let error = &errors.errors()[0];
        assert_eq!(error.field.to_string(), "spec.max");
        assert_eq!(error.error_type, ErrorType::Forbidden);
        assert_eq!(error.detail, "failed rule: self.min <= self.max");
    }

    #[test]
    fn message_expression_is_evaluated_against_self() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "replicas": { "type": "integer" }
            },
            "x-kubernetes-validations": [{
                "rule": "self.replicas < 3",
                "message": "too many replicas",
                "messageExpression": "'too many replicas for ' + self.name"
            }]
        });
        let errors = run(schema, json!({ "name": "web", "replicas": 5 }));
        assert_eq!(errors.errors()[0].detail, "too many replicas for web");
    }

    #[test]
    fn unusable_message_expression_falls_back_to_message() {
        for expression in ["self.max", "self.missing + 'x'", "'unterminated", "''"] {
            let errors = run(
                spec_schema(json!([{
                    "rule": "self.min <= self.max",
                    "message": "min must not exceed max",
                    "messageExpression": expression
                }])),
                json!({ "spec": { "min": 3, "max": 2 } }),
            );
            assert_eq!(errors.errors()[0].detail, "min must not exceed max", "{expression}");
        }
    }

    #[test]
    fn transition_rules_are_skipped() {
        let errors = run(
            spec_schema(json!([{ "rule": "self.min == oldSelf.min" }])),
            json!({ "spec": { "min": 3, "max": 2 } }),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn rules_apply_to_every_list_item() {
        let errors = run(
            json!({
                "type": "array",
                "items": {
                    "type": "string",
                    "x-kubernetes-validations": [{ "rule": "self.startsWith('a')", "message": "must start with a" }]
                }
            }),
            json!(["abc", "bcd", "axe", "zed"]),
        );
        let paths: Vec<String> = errors.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(paths, vec!["[1]", "[3]"]);
    }

    #[test]
    fn broken_rule_is_reported() {
        let errors = run(spec_schema(json!([{ "rule": "self.min <=" }])), json!({ "spec": {} }));
        assert_eq!(errors.errors()[0].error_type, ErrorType::Internal);
    }

    #[test]
    fn absent_nodes_are_not_evaluated() {
        let errors = run(
            spec_schema(json!([{ "rule": "self.min <= self.max" }])),
            json!({ "other": true }),
        );
        assert!(errors.is_empty());
    }
}

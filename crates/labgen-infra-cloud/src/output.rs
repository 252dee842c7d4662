//! Deferred values
//!
//! Resource inputs are either literal JSON or references to outputs of other
//! resources that only exist once the provisioning engine has applied them.
//! The serialized form is what the engine consumes:
//!
//! ```text
//! "Basic"                                                  literal
//! {"$output": {"resource": "crlabgen", "attribute": "loginServer"}}
//! {"$interpolate": ["https://", {"$output": {...}}]}
//! {"$secret": <input>}                                     secret-bearing slot
//! ```
//!
//! Secret outputs can only be turned into a [`SecretInput`]; there is no
//! conversion into a plain [`Input`] or an interpolation [`Fragment`].

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Placeholder printed wherever a secret value would appear
pub const REDACTED: &str = "[secret]";

const OUTPUT_KEY: &str = "$output";
const INTERPOLATE_KEY: &str = "$interpolate";
const SECRET_KEY: &str = "$secret";

/// Reference to a single output attribute of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    /// Logical name of the producing resource
    pub resource: String,

    /// Attribute name as reported by the provider (e.g. "loginServer")
    pub attribute: String,
}

impl OutputRef {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// Output that may flow into any input slot
#[derive(Debug)]
pub enum Plain {}

/// Output that may only flow into secret-bearing slots
#[derive(Debug)]
pub enum Secret {}

/// Typed handle to a resource output
pub struct Output<K = Plain> {
    reference: OutputRef,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Output<K> {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            reference: OutputRef::new(resource, attribute),
            _kind: PhantomData,
        }
    }

    pub fn reference(&self) -> &OutputRef {
        &self.reference
    }
}

impl<K> Clone for Output<K> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> fmt::Debug for Output<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Output").field(&self.reference).finish()
    }
}

/// Value of a plain input slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Input {
    #[serde(rename = "$output")]
    Output(OutputRef),

    #[serde(rename = "$interpolate")]
    Interpolate(Vec<Fragment>),

    #[serde(untagged)]
    Literal(Value),
}

impl Input {
    pub fn literal(value: impl Into<Value>) -> Self {
        Input::Literal(value.into())
    }

    pub fn interpolate(parts: impl IntoIterator<Item = Fragment>) -> Self {
        Input::Interpolate(parts.into_iter().collect())
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Literal(Value::String(value))
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Literal(Value::Bool(value))
    }
}

impl From<Output<Plain>> for Input {
    fn from(output: Output<Plain>) -> Self {
        Input::Output(output.reference)
    }
}

impl From<&Output<Plain>> for Input {
    fn from(output: &Output<Plain>) -> Self {
        Input::Output(output.reference.clone())
    }
}

/// One piece of an interpolated string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Fragment {
    #[serde(rename = "$output")]
    Output(OutputRef),

    #[serde(untagged)]
    Text(String),
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Fragment::Text(text.to_string())
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Fragment::Text(text)
    }
}

impl From<&String> for Fragment {
    fn from(text: &String) -> Self {
        Fragment::Text(text.clone())
    }
}

impl From<&Output<Plain>> for Fragment {
    fn from(output: &Output<Plain>) -> Self {
        Fragment::Output(output.reference.clone())
    }
}

impl From<Output<Plain>> for Fragment {
    fn from(output: Output<Plain>) -> Self {
        Fragment::Output(output.reference)
    }
}

/// Build an interpolated [`Input`] from text and plain outputs
///
/// ```ignore
/// let url = interpolate!("https://", registry.login_server());
/// ```
#[macro_export]
macro_rules! interpolate {
    ($($part:expr),+ $(,)?) => {
        $crate::Input::interpolate([$($crate::Fragment::from($part)),+])
    };
}

/// Value of a secret-bearing input slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretInput {
    #[serde(rename = "$secret")]
    inner: Input,
}

impl SecretInput {
    pub fn inner(&self) -> &Input {
        &self.inner
    }
}

impl From<Input> for SecretInput {
    fn from(inner: Input) -> Self {
        Self { inner }
    }
}

impl<K> From<Output<K>> for SecretInput {
    fn from(output: Output<K>) -> Self {
        Self {
            inner: Input::Output(output.reference),
        }
    }
}

impl<K> From<&Output<K>> for SecretInput {
    fn from(output: &Output<K>) -> Self {
        Self {
            inner: Input::Output(output.reference.clone()),
        }
    }
}

/// Source of already-known output values
pub trait OutputLookup {
    fn output(&self, reference: &OutputRef) -> Option<&Value>;
}

/// Node of a serialized input tree
enum Node<'a> {
    Output(OutputRef),
    Interpolate(&'a [Value]),
    Secret(&'a Value),
    Other,
}

fn classify(value: &Value) -> Node<'_> {
    let Some(map) = value.as_object() else {
        return Node::Other;
    };
    if map.len() != 1 {
        return Node::Other;
    }
    if let Some(reference) = map.get(OUTPUT_KEY)
        && let Ok(reference) = serde_json::from_value::<OutputRef>(reference.clone())
    {
        return Node::Output(reference);
    }
    if let Some(Value::Array(parts)) = map.get(INTERPOLATE_KEY) {
        return Node::Interpolate(parts);
    }
    if let Some(inner) = map.get(SECRET_KEY) {
        return Node::Secret(inner);
    }
    Node::Other
}

/// Collect every output reference in a serialized input tree
pub fn references(value: &Value) -> Vec<OutputRef> {
    let mut found = Vec::new();
    collect_references(value, false, &mut |reference, _| found.push(reference));
    found
}

/// Collect output references that sit outside any secret-bearing slot
pub fn plain_references(value: &Value) -> Vec<OutputRef> {
    let mut found = Vec::new();
    collect_references(value, false, &mut |reference, in_secret| {
        if !in_secret {
            found.push(reference);
        }
    });
    found
}

fn collect_references(value: &Value, in_secret: bool, visit: &mut dyn FnMut(OutputRef, bool)) {
    match classify(value) {
        Node::Output(reference) => visit(reference, in_secret),
        Node::Interpolate(parts) => {
            for part in parts {
                collect_references(part, in_secret, visit);
            }
        }
        Node::Secret(inner) => collect_references(inner, true, visit),
        Node::Other => match value {
            Value::Array(items) => {
                for item in items {
                    collect_references(item, in_secret, visit);
                }
            }
            Value::Object(map) => {
                for item in map.values() {
                    collect_references(item, in_secret, visit);
                }
            }
            _ => {}
        },
    }
}

/// Replace every deferred value in a serialized input tree
///
/// Secret-bearing slots are checked for availability and then replaced by
/// [`REDACTED`]. A `null` or empty-string output counts as unavailable.
pub fn resolve(value: &Value, outputs: &dyn OutputLookup) -> Result<Value> {
    match classify(value) {
        Node::Output(reference) => lookup(&reference, outputs).cloned(),
        Node::Interpolate(parts) => {
            let mut text = String::new();
            for part in parts {
                match classify(part) {
                    Node::Output(reference) => match lookup(&reference, outputs)? {
                        Value::String(s) => text.push_str(s),
                        Value::Number(n) => text.push_str(&n.to_string()),
                        Value::Bool(b) => text.push_str(&b.to_string()),
                        _ => {
                            return Err(CloudError::NotInterpolable {
                                resource: reference.resource,
                                attribute: reference.attribute,
                            });
                        }
                    },
                    _ => match part {
                        Value::String(s) => text.push_str(s),
                        other => text.push_str(&other.to_string()),
                    },
                }
            }
            Ok(Value::String(text))
        }
        Node::Secret(inner) => {
            resolve(inner, outputs)?;
            Ok(Value::String(REDACTED.to_string()))
        }
        Node::Other => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| resolve(item, outputs))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::new();
                for (key, item) in map {
                    resolved.insert(key.clone(), resolve(item, outputs)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        },
    }
}

fn lookup<'a>(reference: &OutputRef, outputs: &'a dyn OutputLookup) -> Result<&'a Value> {
    match outputs.output(reference) {
        Some(Value::Null) | None => Err(unavailable(reference)),
        Some(Value::String(s)) if s.is_empty() => Err(unavailable(reference)),
        Some(value) => Ok(value),
    }
}

fn unavailable(reference: &OutputRef) -> CloudError {
    CloudError::OutputUnavailable {
        resource: reference.resource.clone(),
        attribute: reference.attribute.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct Outputs(HashMap<OutputRef, Value>);

    impl OutputLookup for Outputs {
        fn output(&self, reference: &OutputRef) -> Option<&Value> {
            self.0.get(reference)
        }
    }

    fn outputs(entries: &[(&str, &str, Value)]) -> Outputs {
        Outputs(
            entries
                .iter()
                .map(|(r, a, v)| (OutputRef::new(*r, *a), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_input_serialization() {
        let login: Output = Output::new("crlabgen", "loginServer");

        assert_eq!(serde_json::to_value(Input::from("Basic")).unwrap(), json!("Basic"));
        assert_eq!(serde_json::to_value(Input::from(true)).unwrap(), json!(true));
        assert_eq!(
            serde_json::to_value(Input::from(&login)).unwrap(),
            json!({"$output": {"resource": "crlabgen", "attribute": "loginServer"}})
        );
        assert_eq!(
            serde_json::to_value(interpolate!("https://", &login)).unwrap(),
            json!({"$interpolate": [
                "https://",
                {"$output": {"resource": "crlabgen", "attribute": "loginServer"}}
            ]})
        );
    }

    #[test]
    fn test_secret_input_serialization() {
        let password: Output<Secret> = Output::new("creds", "password");
        let value = serde_json::to_value(SecretInput::from(&password)).unwrap();
        assert_eq!(
            value,
            json!({"$secret": {"$output": {"resource": "creds", "attribute": "password"}}})
        );
    }

    #[test]
    fn test_references_and_plain_references() {
        let value = json!({
            "server": {"$output": {"resource": "crlabgen", "attribute": "loginServer"}},
            "password": {"$secret": {"$output": {"resource": "creds", "attribute": "password"}}},
            "list": [{"$interpolate": ["a", {"$output": {"resource": "ai", "attribute": "key"}}]}]
        });

        let mut all = references(&value);
        all.sort();
        assert_eq!(
            all,
            vec![
                OutputRef::new("ai", "key"),
                OutputRef::new("creds", "password"),
                OutputRef::new("crlabgen", "loginServer"),
            ]
        );

        let mut plain = plain_references(&value);
        plain.sort();
        assert_eq!(
            plain,
            vec![
                OutputRef::new("ai", "key"),
                OutputRef::new("crlabgen", "loginServer"),
            ]
        );
    }

    #[test]
    fn test_resolve_interpolation() {
        let login: Output = Output::new("crlabgen", "loginServer");
        let input = serde_json::to_value(interpolate!(&login, "/lab-gen-app:", "latest")).unwrap();
        let known = outputs(&[("crlabgen", "loginServer", json!("crlabgen.azurecr.io"))]);

        let resolved = resolve(&input, &known).unwrap();
        assert_eq!(resolved, json!("crlabgen.azurecr.io/lab-gen-app:latest"));
    }

    #[test]
    fn test_resolve_secret_is_redacted() {
        let value = json!({"$secret": {"$output": {"resource": "creds", "attribute": "password"}}});
        let known = outputs(&[("creds", "password", json!("hunter2"))]);

        let resolved = resolve(&value, &known).unwrap();
        assert_eq!(resolved, json!(REDACTED));
    }

    #[test]
    fn test_resolve_missing_output() {
        let value = json!({"$output": {"resource": "app", "attribute": "defaultHostName"}});
        let result = resolve(&value, &outputs(&[]));
        assert!(matches!(
            result,
            Err(CloudError::OutputUnavailable { ref resource, .. }) if resource == "app"
        ));
    }

    #[test]
    fn test_resolve_empty_secret_is_unavailable() {
        let value = json!({"$secret": {"$output": {"resource": "creds", "attribute": "password"}}});
        let known = outputs(&[("creds", "password", json!(""))]);
        assert!(resolve(&value, &known).is_err());
    }

    #[test]
    fn test_resolve_object_output_not_interpolable() {
        let value = json!({"$interpolate": [
            "x",
            {"$output": {"resource": "r", "attribute": "sku"}}
        ]});
        let known = outputs(&[("r", "sku", json!({"name": "Basic"}))]);
        assert!(matches!(
            resolve(&value, &known),
            Err(CloudError::NotInterpolable { .. })
        ));
    }
}

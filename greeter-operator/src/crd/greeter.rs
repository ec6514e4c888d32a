//! Greeter Custom Resource Definition.
//!
//! Defines a greeting to be computed by the operator.

use super::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};

/// Greeter is the Schema for the greeters API.
///
/// The spec names the subject and an optional greeting prefix. The operator
/// writes the resulting sentence to the status subresource.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "hello.sklrsn.in",
    version = "v1",
    kind = "Greeter",
    plural = "greeters",
    namespaced,
    status = "GreeterStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Subject", "type":"string", "jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GreeterSpec {
    /// Name of the person to greet.
    #[schemars(length(min = 1))]
    pub name: String,

    /// Greeting prefix. Falls back to "Hello" when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Greeter status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GreeterStatus {
    /// Conditions representing the current state, keyed by type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,

    /// Name of the Greeter resource.
    #[serde(default)]
    pub name: String,

    /// Computed greeting.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Conditions as a list map keyed by `type`, so the API server rejects
/// repeated types.
fn conditions_schema(generator: &mut SchemaGenerator) -> Schema {
    let mut schema = generator.subschema_for::<Vec<Condition>>().into_object();
    schema
        .extensions
        .insert("x-kubernetes-list-type".into(), serde_json::json!("map"));
    schema
        .extensions
        .insert("x-kubernetes-list-map-keys".into(), serde_json::json!(["type"]));
    Schema::Object(schema)
}

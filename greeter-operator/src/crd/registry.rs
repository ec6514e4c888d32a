//! Registry of the resource kinds served by this operator.
//!
//! The registry is assembled once at process start with explicit
//! [`SchemeBuilder::register`] calls and is read-only afterwards.

use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt, Resource};
use std::collections::BTreeMap;

/// Identifier of a resource kind, formatted as `group/version/Kind`.
pub type KindId = String;

/// Schema descriptor for one registered kind.
#[derive(Debug, Clone)]
pub struct KindDescriptor {
    /// Kind identifier.
    pub id: KindId,
    /// Fully qualified CRD name (`plural.group`).
    pub crd_name: String,
    /// The generated CustomResourceDefinition.
    pub crd: CustomResourceDefinition,
}

/// Immutable mapping from kind identifier to schema descriptor.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    kinds: BTreeMap<KindId, KindDescriptor>,
}

/// Builder collecting kind registrations.
#[derive(Debug, Default)]
pub struct SchemeBuilder {
    kinds: BTreeMap<KindId, KindDescriptor>,
    duplicate: Option<KindId>,
}

/// Kind identifier of a custom resource type.
pub fn kind_id<K>() -> KindId
where
    K: Resource<DynamicType = ()>,
{
    format!("{}/{}/{}", K::group(&()), K::version(&()), K::kind(&()))
}

impl SchemeBuilder {
    /// Register a custom resource type.
    pub fn register<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()> + CustomResourceExt,
    {
        let id = kind_id::<K>();
        if self.kinds.contains_key(&id) {
            self.duplicate.get_or_insert(id);
            return self;
        }

        let descriptor = KindDescriptor {
            id: id.clone(),
            crd_name: K::crd_name().to_string(),
            crd: K::crd(),
        };
        self.kinds.insert(id, descriptor);
        self
    }

    /// Finish registration.
    ///
    /// Fails if any kind was registered more than once.
    pub fn build(self) -> OperatorResult<Scheme> {
        if let Some(id) = self.duplicate {
            return Err(OperatorError::DuplicateKind(id));
        }
        Ok(Scheme { kinds: self.kinds })
    }
}

impl Scheme {
    /// Start a new registration.
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::default()
    }

    /// Look up a kind by identifier.
    pub fn get(&self, id: &str) -> Option<&KindDescriptor> {
        self.kinds.get(id)
    }

    /// Registered kind identifiers, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Registered CRDs, sorted by kind identifier.
    pub fn crds(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.values()
    }

    /// Render all registered CRDs as a multi-document YAML manifest.
    pub fn to_yaml(&self) -> OperatorResult<String> {
        let mut out = String::new();
        for descriptor in self.kinds.values() {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&descriptor.crd)?);
        }
        Ok(out)
    }

    /// Install every registered CRD with server-side apply.
    pub async fn install(&self, client: &Client, field_manager: &str) -> OperatorResult<()> {
        let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
        let params = PatchParams::apply(field_manager).force();

        for descriptor in self.kinds.values() {
            tracing::info!(crd = %descriptor.crd_name, "Installing CRD...");
            crds.patch(&descriptor.crd_name, &params, &Patch::Apply(&descriptor.crd))
                .await?;
        }

        tracing::info!("All CRDs installed");
        Ok(())
    }
}

/// The scheme of kinds reconciled by this operator.
pub fn scheme() -> OperatorResult<Scheme> {
    Scheme::builder().register::<super::Greeter>().build()
}

//! In-memory rewrites applied to a decoded object before admission.

use kval_core::{GroupVersionKind, CORE_GROUP};

use crate::meta::{ObjectMetaAccess, Unstructured};

pub const DEFAULT_NAMESPACE: &str = "default";

/// Default the namespace of namespaced kinds and move legacy core objects
/// (`apiVersion: v1`) into the explicit `core` group, which admission
/// requires. Returns the GVK the object now carries.
pub fn normalize(
    obj: &mut Unstructured,
    gvk: &GroupVersionKind,
    namespaced: bool,
) -> GroupVersionKind {
    if namespaced && obj.namespace().is_empty() {
        obj.set_namespace(DEFAULT_NAMESPACE);
    }
    let mut gvk = gvk.clone();
    if obj.api_version() == "v1" {
        gvk.group = CORE_GROUP.to_string();
        obj.set_api_version(&format!("{CORE_GROUP}/v1"));
    }
    gvk
}

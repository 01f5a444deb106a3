//! Metadata Accessor.
//!
//! Pure lookups over component and method declarations. Absence is always
//! `None`/`false`, never an error.

use crate::component::{Component, MethodDef};
use crate::listener::ListenerMetadata;
use crate::scene::SceneAction;

/// Read access to listener and scene declarations.
pub trait MetadataAccessor: Send + Sync {
    /// Is this component a carrier of update listeners?
    fn is_update_component(&self, component: &Component) -> bool;

    /// Is this component a scene?
    fn is_scene_component(&self, component: &Component) -> bool;

    /// The listener entries of a method. `None` when it declares none.
    fn listener_metadata<'a>(&self, method: &'a MethodDef) -> Option<&'a [ListenerMetadata]>;

    /// The scene slug of a component. An empty slug counts as absent.
    fn scene_slug<'a>(&self, component: &'a Component) -> Option<&'a str>;

    /// The lifecycle action of a scene method.
    fn scene_action(&self, method: &MethodDef) -> Option<SceneAction>;

    /// The explicit step index of a scene method.
    fn scene_step(&self, method: &MethodDef) -> Option<i64>;
}

/// Reads what components declared through their builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredMetadata;

impl MetadataAccessor for DeclaredMetadata {
    fn is_update_component(&self, component: &Component) -> bool {
        component.update_marker()
    }

    fn is_scene_component(&self, component: &Component) -> bool {
        component.scene_marker().is_some()
    }

    fn listener_metadata<'a>(&self, method: &'a MethodDef) -> Option<&'a [ListenerMetadata]> {
        let listeners = method.listeners();
        (!listeners.is_empty()).then_some(listeners)
    }

    fn scene_slug<'a>(&self, component: &'a Component) -> Option<&'a str> {
        component.scene_marker().filter(|slug| !slug.is_empty())
    }

    fn scene_action(&self, method: &MethodDef) -> Option<SceneAction> {
        method.scene_action()
    }

    fn scene_step(&self, method: &MethodDef) -> Option<i64> {
        method.step()
    }
}

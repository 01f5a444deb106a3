//! Component declarations.
//!
//! A component is an application object whose methods are listeners or
//! scene steps. Instead of annotations read back at runtime, components
//! declare their methods with a typed builder; the declarations are the
//! metadata the [`MetadataAccessor`](crate::MetadataAccessor) reads.
//!
//! ```rust,ignore
//! struct Ping;
//!
//! impl Ping {
//!     async fn pong(self: Arc<Self>) -> &'static str {
//!         "pong"
//!     }
//! }
//!
//! let component = Component::builder("ping", Ping)
//!     .update()
//!     .method(method("pong", Ping::pong).hears("ping"))
//!     .build();
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use courier_core::{BoxedMiddleware, UpdateKind};

use crate::handler::{Handler, HandlerInvoker, InvocableHandler, Method};
use crate::hear::HearConditions;
use crate::listener::ListenerMetadata;
use crate::scene::SceneAction;

// ============================================================================
// Method declarations
// ============================================================================

type Binder<S> = Arc<dyn Fn(Arc<S>) -> InvocableHandler + Send + Sync>;

/// A method declaration awaiting its component instance.
pub struct MethodDecl<S> {
    name: String,
    listeners: Vec<ListenerMetadata>,
    scene_action: Option<SceneAction>,
    step: Option<i64>,
    bind: Binder<S>,
}

/// Declares a method taking the component instance as its first parameter.
pub fn method<S, M, T>(name: impl Into<String>, f: M) -> MethodDecl<S>
where
    S: Send + Sync + 'static,
    M: Method<S, T>,
    T: 'static,
{
    MethodDecl::new(
        name.into(),
        Arc::new(move |instance: Arc<S>| {
            HandlerInvoker::create::<S, M, T>(instance, f.clone())
        }),
    )
}

/// Declares a method that does not use the component instance.
pub fn handler<S, H, T>(name: impl Into<String>, h: H) -> MethodDecl<S>
where
    S: Send + Sync + 'static,
    H: Handler<T>,
    T: 'static,
{
    MethodDecl::new(
        name.into(),
        Arc::new(move |_instance: Arc<S>| {
            HandlerInvoker::from_handler::<H, T>(h.clone())
        }),
    )
}

impl<S> MethodDecl<S> {
    fn new(name: String, bind: Binder<S>) -> Self {
        Self {
            name,
            listeners: Vec::new(),
            scene_action: None,
            step: None,
            bind,
        }
    }

    /// Adds a listener entry.
    pub fn listener(mut self, metadata: ListenerMetadata) -> Self {
        self.listeners.push(metadata);
        self
    }

    /// Runs for every update reaching the listener's position.
    pub fn uses(self) -> Self {
        self.listener(ListenerMetadata::Use)
    }

    /// Runs for updates of `kind`.
    pub fn on(self, kind: impl Into<UpdateKind>) -> Self {
        self.listener(ListenerMetadata::on(kind))
    }

    /// Runs `middlewares` and then the method for updates of `kind`.
    pub fn on_with(self, kind: impl Into<UpdateKind>, middlewares: Vec<BoxedMiddleware>) -> Self {
        self.listener(ListenerMetadata::On {
            update: Some(kind.into()),
            middlewares,
        })
    }

    /// Runs when the message text matches `conditions`.
    pub fn hears(self, conditions: impl Into<HearConditions>) -> Self {
        self.listener(ListenerMetadata::hears(conditions))
    }

    /// Runs when no text pattern matched.
    pub fn hear_fallback(self) -> Self {
        self.listener(ListenerMetadata::HearFallback)
    }

    /// Marks the method as the scene's enter callback.
    pub fn enter(mut self) -> Self {
        self.scene_action = Some(SceneAction::Enter);
        self
    }

    /// Marks the method as the scene's leave callback.
    pub fn leave(mut self) -> Self {
        self.scene_action = Some(SceneAction::Leave);
        self
    }

    /// Gives the scene step an explicit index.
    pub fn step(mut self, index: i64) -> Self {
        self.step = Some(index);
        self
    }
}

/// A method declaration bound to its instance.
#[derive(Clone)]
pub struct MethodDef {
    name: String,
    listeners: Vec<ListenerMetadata>,
    scene_action: Option<SceneAction>,
    step: Option<i64>,
    bind: Arc<dyn Fn() -> InvocableHandler + Send + Sync>,
}

impl MethodDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listeners(&self) -> &[ListenerMetadata] {
        &self.listeners
    }

    pub fn scene_action(&self) -> Option<SceneAction> {
        self.scene_action
    }

    pub fn step(&self) -> Option<i64> {
        self.step
    }

    /// Creates a fresh invoker for this method.
    pub fn invoker(&self) -> InvocableHandler {
        (self.bind)()
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("listeners", &self.listeners)
            .field("scene_action", &self.scene_action)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Components
// ============================================================================

/// A declared component: a name, its markers and its methods.
#[derive(Clone)]
pub struct Component {
    name: String,
    update: bool,
    scene: Option<String>,
    methods: Vec<MethodDef>,
}

impl Component {
    /// Starts declaring a component around `instance`.
    pub fn builder<S: Send + Sync + 'static>(
        name: impl Into<String>,
        instance: S,
    ) -> ComponentBuilder<S> {
        Self::from_arc(name, Arc::new(instance))
    }

    /// Starts declaring a component around a shared instance.
    pub fn from_arc<S: Send + Sync + 'static>(
        name: impl Into<String>,
        instance: Arc<S>,
    ) -> ComponentBuilder<S> {
        ComponentBuilder {
            component: Component {
                name: name.into(),
                update: false,
                scene: None,
                methods: Vec::new(),
            },
            instance,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub(crate) fn update_marker(&self) -> bool {
        self.update
    }

    pub(crate) fn scene_marker(&self) -> Option<&str> {
        self.scene.as_deref()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("update", &self.update)
            .field("scene", &self.scene)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builder returned by [`Component::builder`].
pub struct ComponentBuilder<S> {
    component: Component,
    instance: Arc<S>,
}

impl<S: Send + Sync + 'static> ComponentBuilder<S> {
    /// Marks the component as carrying update listeners.
    pub fn update(mut self) -> Self {
        self.component.update = true;
        self
    }

    /// Marks the component as the scene `slug`.
    pub fn scene(mut self, slug: impl Into<String>) -> Self {
        self.component.scene = Some(slug.into());
        self
    }

    /// Adds a method.
    ///
    /// Method names are unique per component: redeclaring a name replaces the
    /// earlier declaration in its original position.
    pub fn method(mut self, decl: MethodDecl<S>) -> Self {
        let instance = self.instance.clone();
        let bind = decl.bind;
        let def = MethodDef {
            name: decl.name,
            listeners: decl.listeners,
            scene_action: decl.scene_action,
            step: decl.step,
            bind: Arc::new(move || bind(instance.clone())),
        };

        let methods = &mut self.component.methods;
        match methods.iter_mut().find(|m| m.name == def.name) {
            Some(existing) => {
                debug!(
                    component = %self.component.name,
                    method = %def.name,
                    "method redeclared, replacing earlier declaration"
                );
                *existing = def;
            }
            None => methods.push(def),
        }
        self
    }

    pub fn build(self) -> Component {
        self.component
    }
}

impl<S: Send + Sync + 'static> From<ComponentBuilder<S>> for Component {
    fn from(builder: ComponentBuilder<S>) -> Self {
        builder.build()
    }
}

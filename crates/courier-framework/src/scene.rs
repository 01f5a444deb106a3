//! Multi-step conversation scenes.
//!
//! A scene is a small state machine scoped to one chat/sender session:
//!
//! ```text
//!   enter(slug) ──▶ enter handler ──▶ step 0 ──next()──▶ step 1 ──next()──▶ ... ──▶ leave handler
//! ```
//!
//! - [`SceneBuilder`] turns a scene component into a [`StepScene`].
//! - [`SceneManager`] holds the scenes and provides the two middlewares that
//!   install the [`SceneContext`] and route updates into the active scene.
//! - [`SceneContext`] is what handlers use to move between steps.
//!
//! Scene progress lives in the session under [`SCENE_SESSION_KEY`], so the
//! session middleware must run before the scene middlewares.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, trace, warn};

use courier_core::{BoxError, BoxedMiddleware, Context, Next, middleware_fn};

use crate::component::Component;
use crate::context::HandlerContext;
use crate::error::{BuildError, ExtractError, ExtractResult, SceneError};
use crate::extractor::FromContext;
use crate::handler::InvocableHandler;
use crate::metadata::MetadataAccessor;
use crate::session::Session;

/// Session key holding scene progress.
pub const SCENE_SESSION_KEY: &str = "__scene";

/// Lifecycle marker of a scene method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneAction {
    Enter,
    Leave,
}

impl fmt::Display for SceneAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enter => "enter",
            Self::Leave => "leave",
        })
    }
}

// ============================================================================
// StepScene
// ============================================================================

/// One step of a scene.
#[derive(Clone)]
pub struct SceneStep {
    index: i64,
    method: String,
    handler: InvocableHandler,
}

impl SceneStep {
    pub fn new(index: i64, method: impl Into<String>, handler: InvocableHandler) -> Self {
        Self {
            index,
            method: method.into(),
            handler,
        }
    }

    /// The effective step index the step was sorted by.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// The name of the declaring method.
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// A built scene. Immutable once built.
#[derive(Clone)]
pub struct StepScene {
    slug: String,
    enter_handler: Option<InvocableHandler>,
    leave_handler: Option<InvocableHandler>,
    steps: Vec<SceneStep>,
}

impl StepScene {
    pub fn new(
        slug: impl Into<String>,
        enter_handler: Option<InvocableHandler>,
        leave_handler: Option<InvocableHandler>,
        steps: Vec<SceneStep>,
    ) -> Self {
        Self {
            slug: slug.into(),
            enter_handler,
            leave_handler,
            steps,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn has_enter_handler(&self) -> bool {
        self.enter_handler.is_some()
    }

    pub fn has_leave_handler(&self) -> bool {
        self.leave_handler.is_some()
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[SceneStep] {
        &self.steps
    }

    /// Step method names in execution order.
    pub fn step_methods(&self) -> Vec<&str> {
        self.steps.iter().map(SceneStep::method).collect()
    }
}

impl fmt::Debug for StepScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepScene")
            .field("slug", &self.slug)
            .field("enter_handler", &self.has_enter_handler())
            .field("leave_handler", &self.has_leave_handler())
            .field("steps", &self.step_methods())
            .finish()
    }
}

// ============================================================================
// SceneBuilder
// ============================================================================

/// Builds [`StepScene`]s from scene components.
pub struct SceneBuilder<'a> {
    accessor: &'a dyn MetadataAccessor,
    strict: bool,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(accessor: &'a dyn MetadataAccessor) -> Self {
        Self {
            accessor,
            strict: false,
        }
    }

    /// Rejects duplicate enter/leave callbacks instead of keeping the last.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Builds the scene declared by `component`.
    ///
    /// Returns `Ok(None)` when the component has no slug. Methods marked
    /// enter/leave become callbacks; every other method is a step, indexed
    /// explicitly or by a counter starting at 0 that only implicit steps
    /// advance. Steps are sorted ascending by index; equal indices keep
    /// declaration order.
    pub fn build(&self, component: &Component) -> Result<Option<StepScene>, BuildError> {
        let Some(slug) = self.accessor.scene_slug(component) else {
            debug!(component = %component.name(), "scene component without slug skipped");
            return Ok(None);
        };

        let mut enter: Option<(&str, InvocableHandler)> = None;
        let mut leave: Option<(&str, InvocableHandler)> = None;
        let mut steps = Vec::new();
        let mut next_implicit = 0_i64;

        for method in component.methods() {
            if let Some(action) = self.accessor.scene_action(method) {
                let slot = match action {
                    SceneAction::Enter => &mut enter,
                    SceneAction::Leave => &mut leave,
                };
                if let Some((first, _)) = slot.as_ref() {
                    if self.strict {
                        return Err(BuildError::DuplicateSceneAction {
                            scene: slug.to_string(),
                            action,
                            first: first.to_string(),
                            second: method.name().to_string(),
                        });
                    }
                    warn!(
                        scene = %slug,
                        %action,
                        replaced = %first,
                        by = %method.name(),
                        "duplicate scene callback, keeping the last one"
                    );
                }
                *slot = Some((method.name(), method.invoker()));
                continue;
            }

            let index = self.accessor.scene_step(method).unwrap_or_else(|| {
                let index = next_implicit;
                next_implicit += 1;
                index
            });
            steps.push(SceneStep::new(index, method.name(), method.invoker()));
        }

        steps.sort_by_key(SceneStep::index);

        let scene = StepScene::new(
            slug,
            enter.map(|(_, handler)| handler),
            leave.map(|(_, handler)| handler),
            steps,
        );
        debug!(scene = ?scene, "scene built");
        Ok(Some(scene))
    }
}

// ============================================================================
// SceneManager
// ============================================================================

/// Scene progress as stored in the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneProgress {
    pub current: String,
    pub step: usize,
    #[serde(default)]
    pub state: Map<String, Value>,
}

/// The collection of registered scenes.
#[derive(Default)]
pub struct SceneManager {
    scenes: RwLock<Vec<Arc<StepScene>>>,
}

impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers scenes. A slug registered twice keeps the later scene.
    pub fn add_scenes(&self, scenes: impl IntoIterator<Item = StepScene>) {
        let mut registered = self.scenes.write();
        for scene in scenes {
            let scene = Arc::new(scene);
            match registered.iter_mut().find(|s| s.slug() == scene.slug()) {
                Some(existing) => {
                    warn!(scene = %scene.slug(), "scene registered twice, replacing");
                    *existing = scene;
                }
                None => registered.push(scene),
            }
        }
    }

    pub fn scene(&self, slug: &str) -> Option<Arc<StepScene>> {
        self.scenes.read().iter().find(|s| s.slug() == slug).cloned()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.read().len()
    }

    /// Registered slugs in registration order.
    pub fn slugs(&self) -> Vec<String> {
        self.scenes
            .read()
            .iter()
            .map(|s| s.slug().to_string())
            .collect()
    }

    /// Installs a [`SceneContext`] for the update, then continues.
    pub fn middleware(self: &Arc<Self>) -> BoxedMiddleware {
        let manager = Arc::clone(self);
        middleware_fn(move |ctx: Arc<Context>, next: Next| {
            let scene = SceneContext::new(manager.clone(), &ctx);
            ctx.set_state(scene);
            next.run()
        })
    }

    /// Routes updates of a chat inside a scene to its current step.
    ///
    /// Updates outside any scene continue down the chain; updates inside one
    /// stop here.
    pub fn middleware_intercept(self: &Arc<Self>) -> BoxedMiddleware {
        let manager = Arc::clone(self);
        middleware_fn(move |ctx: Arc<Context>, next: Next| {
            let manager = manager.clone();
            async move {
                let Some(scene) = ctx.get_state::<SceneContext>() else {
                    return next.run().await;
                };
                let Some(progress) = scene.progress() else {
                    return next.run().await;
                };
                if manager.scene(&progress.current).is_none() {
                    warn!(scene = %progress.current, "active scene is not registered, resetting");
                    scene.reset();
                    return next.run().await;
                }
                scene.reenter().await
            }
        })
    }
}

impl fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneManager")
            .field("scenes", &self.slugs())
            .finish()
    }
}

// ============================================================================
// SceneContext
// ============================================================================

struct SceneInner {
    manager: Arc<SceneManager>,
    ctx: Weak<Context>,
    session: Option<Session>,
    first_time: AtomicBool,
    leaving: AtomicBool,
}

/// Per-update handle for scene transitions.
///
/// ```rust,ignore
/// async fn ask_name(ctx: Arc<Context>, scene: SceneContext, text: Option<Text>) -> Result<(), BoxError> {
///     if scene.first_time() {
///         ctx.send("What is your name?").await?;
///         return Ok(());
///     }
///     scene.set_state("name", json!(text.map(|t| t.0)))?;
///     scene.next().await
/// }
/// ```
///
/// Step and callback results are not delivered; steps talk to the chat
/// through the context.
#[derive(Clone)]
pub struct SceneContext {
    inner: Arc<SceneInner>,
}

impl SceneContext {
    fn new(manager: Arc<SceneManager>, ctx: &Arc<Context>) -> Self {
        Self {
            inner: Arc::new(SceneInner {
                manager,
                ctx: Arc::downgrade(ctx),
                session: ctx.get_state::<Session>(),
                first_time: AtomicBool::new(false),
                leaving: AtomicBool::new(false),
            }),
        }
    }

    fn session(&self) -> Result<&Session, SceneError> {
        self.inner
            .session
            .as_ref()
            .ok_or(SceneError::SessionUnavailable)
    }

    fn ctx(&self) -> Result<Arc<Context>, SceneError> {
        self.inner.ctx.upgrade().ok_or(SceneError::ContextGone)
    }

    /// The stored progress, if a scene is active.
    pub fn progress(&self) -> Option<SceneProgress> {
        self.inner
            .session
            .as_ref()?
            .get_as::<SceneProgress>(SCENE_SESSION_KEY)
    }

    fn save(&self, progress: &SceneProgress) -> Result<(), SceneError> {
        let value = json!({
            "current": progress.current,
            "step": progress.step,
            "state": progress.state,
        });
        self.session()?.set(SCENE_SESSION_KEY, value);
        Ok(())
    }

    fn reset(&self) {
        if let Some(session) = &self.inner.session {
            session.remove(SCENE_SESSION_KEY);
        }
    }

    /// The slug of the active scene.
    pub fn current(&self) -> Option<String> {
        self.progress().map(|p| p.current)
    }

    /// The active step's position.
    pub fn step_id(&self) -> Option<usize> {
        self.progress().map(|p| p.step)
    }

    /// `true` while running a step that was just entered.
    pub fn first_time(&self) -> bool {
        self.inner.first_time.load(Ordering::SeqCst)
    }

    /// `true` once the scene was left during this update.
    pub fn is_leaving(&self) -> bool {
        self.inner.leaving.load(Ordering::SeqCst)
    }

    /// Reads a value of the scene's state.
    pub fn state(&self, key: &str) -> Option<Value> {
        self.progress()?.state.get(key).cloned()
    }

    /// Reads a value of the scene's state as `T`.
    pub fn state_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.state(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Writes a value of the scene's state.
    pub fn set_state(&self, key: impl Into<String>, value: Value) -> Result<(), SceneError> {
        let mut progress = self.progress().ok_or(SceneError::NotInScene)?;
        progress.state.insert(key.into(), value);
        self.save(&progress)
    }

    /// Enters the scene `slug` and runs its enter handler and first step.
    ///
    /// An active different scene is left first.
    pub async fn enter(&self, slug: &str) -> Result<(), BoxError> {
        self.session()?;
        let scene = self
            .inner
            .manager
            .scene(slug)
            .ok_or_else(|| SceneError::UnknownScene(slug.to_string()))?;

        if let Some(current) = self.current() {
            if current != slug {
                self.leave().await?;
            }
        }

        self.inner.leaving.store(false, Ordering::SeqCst);
        self.save(&SceneProgress {
            current: slug.to_string(),
            step: 0,
            state: Map::new(),
        })?;
        debug!(scene = %slug, "scene entered");

        if let Some(enter) = &scene.enter_handler {
            self.inner.first_time.store(true, Ordering::SeqCst);
            enter(self.ctx()?, Next::noop()).await?;
            if self.is_leaving() {
                return Ok(());
            }
        }
        self.go(0).await
    }

    /// Runs the current step again, as for a follow-up update.
    pub async fn reenter(&self) -> Result<(), BoxError> {
        let progress = self.progress().ok_or(SceneError::NotInScene)?;
        let scene = self
            .inner
            .manager
            .scene(&progress.current)
            .ok_or_else(|| SceneError::UnknownScene(progress.current.clone()))?;

        self.inner.first_time.store(false, Ordering::SeqCst);
        self.run_step(&scene, progress.step).await
    }

    /// Moves to the next step; past the last step the scene is left.
    pub async fn next(&self) -> Result<(), BoxError> {
        let step = self.step_id().ok_or(SceneError::NotInScene)?;
        self.go(step + 1).await
    }

    /// Moves to the previous step. At the first step, re-runs it.
    pub async fn previous(&self) -> Result<(), BoxError> {
        let step = self.step_id().ok_or(SceneError::NotInScene)?;
        self.go(step.saturating_sub(1)).await
    }

    /// Moves to step `step`; past the last step the scene is left.
    pub async fn go(&self, step: usize) -> Result<(), BoxError> {
        let mut progress = self.progress().ok_or(SceneError::NotInScene)?;
        let scene = self
            .inner
            .manager
            .scene(&progress.current)
            .ok_or_else(|| SceneError::UnknownScene(progress.current.clone()))?;

        if step >= scene.steps.len() {
            return self.leave().await;
        }

        progress.step = step;
        self.save(&progress)?;
        self.inner.first_time.store(true, Ordering::SeqCst);
        self.run_step(&scene, step).await
    }

    /// Leaves the active scene, running its leave handler.
    pub async fn leave(&self) -> Result<(), BoxError> {
        let progress = self.progress().ok_or(SceneError::NotInScene)?;
        self.inner.leaving.store(true, Ordering::SeqCst);

        let leave = self
            .inner
            .manager
            .scene(&progress.current)
            .and_then(|scene| scene.leave_handler.clone());
        if let Some(leave) = leave {
            leave(self.ctx()?, Next::noop()).await?;
        }

        self.reset();
        debug!(scene = %progress.current, "scene left");
        Ok(())
    }

    async fn run_step(&self, scene: &StepScene, step: usize) -> Result<(), BoxError> {
        let Some(handler) = scene.steps.get(step).map(|s| s.handler.clone()) else {
            return self.leave().await;
        };
        trace!(scene = %scene.slug, step, "running scene step");
        handler(self.ctx()?, Next::noop()).await?;
        Ok(())
    }
}

impl FromContext for SceneContext {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.get_state::<SceneContext>()
            .ok_or(ExtractError::StateMissing("scene"))
    }
}

impl fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneContext")
            .field("progress", &self.progress())
            .field("first_time", &self.first_time())
            .finish()
    }
}

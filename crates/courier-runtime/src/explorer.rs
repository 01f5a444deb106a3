//! Pipeline composition.
//!
//! [`ListenersExplorer`] discovers the components of the included modules and
//! builds the one middleware pipeline attached to the client's update stream:
//!
//! ```text
//! before.. ─▶ session ─▶ scene ─▶ scene.intercept ─▶ listeners.. ─▶ hear ─▶ after..
//! ```
//!
//! Listeners of update components are registered in discovery order. Scene
//! components are built into scenes afterwards; they take part in dispatch
//! through the scene middlewares. The session, scene and hear stages can be
//! turned off individually.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use courier_core::Composer;
use courier_framework::{
    HearManager, ListenerRegistrar, MetadataAccessor, RegistrationSummary, SceneBuilder,
    SceneManager, SessionManager,
};

use crate::container::ModulesContainer;
use crate::error::{RuntimeError, RuntimeResult};
use crate::options::TelegramModuleOptions;

/// Lifecycle phase of a [`ListenersExplorer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerState {
    Uninitialized,
    /// Building started. A build that failed stays here.
    Building,
    Attached,
}

/// Builds the listener pipeline and attaches it to the client.
pub struct ListenersExplorer {
    options: TelegramModuleOptions,
    container: Arc<ModulesContainer>,
    accessor: Arc<dyn MetadataAccessor>,
    session: Arc<SessionManager>,
    scenes: Arc<SceneManager>,
    hear: Arc<HearManager>,
    state: Mutex<ExplorerState>,
    entries: Mutex<Vec<String>>,
}

impl ListenersExplorer {
    pub fn new(
        options: TelegramModuleOptions,
        container: Arc<ModulesContainer>,
        accessor: Arc<dyn MetadataAccessor>,
        session: Arc<SessionManager>,
        scenes: Arc<SceneManager>,
        hear: Arc<HearManager>,
    ) -> Self {
        Self {
            options,
            container,
            accessor,
            session,
            scenes,
            hear,
            state: Mutex::new(ExplorerState::Uninitialized),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ExplorerState {
        *self.state.lock()
    }

    /// Labels of the attached pipeline entries, in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Builds the pipeline and attaches it. Runs once; any later call fails
    /// with [`RuntimeError::AlreadyInitialized`].
    pub fn on_module_init(&self) -> RuntimeResult<()> {
        {
            let mut state = self.state.lock();
            if *state != ExplorerState::Uninitialized {
                return Err(RuntimeError::AlreadyInitialized);
            }
            *state = ExplorerState::Building;
        }

        let config = &self.options.config;
        let client = self
            .container
            .client(&config.client_name)
            .ok_or_else(|| RuntimeError::ClientNotFound(config.client_name.clone()))?;

        let mut composer = Composer::new();

        for (i, mw) in self.options.middlewares_before.iter().enumerate() {
            composer.push(format!("before[{i}]"), mw.clone());
        }

        if config.use_session_manager {
            composer.push("session", self.session.middleware());
        }

        if config.use_scene_manager {
            composer.push("scene", self.scenes.middleware());
            composer.push("scene.intercept", self.scenes.middleware_intercept());
        }

        let summary = self.explore(&mut composer)?;

        if config.use_hear_manager {
            composer.push("hear", self.hear.middleware());
        }

        for (i, mw) in self.options.middlewares_after.iter().enumerate() {
            composer.push(format!("after[{i}]"), mw.clone());
        }

        let labels: Vec<String> = composer.labels().into_iter().map(str::to_owned).collect();
        client.updates().attach(composer.compose())?;

        *self.entries.lock() = labels;
        *self.state.lock() = ExplorerState::Attached;

        info!(
            client = %config.client_name,
            entries = self.entries.lock().len(),
            listeners = summary.total(),
            scenes = self.scenes.scene_count(),
            "listener pipeline attached"
        );
        Ok(())
    }

    fn explore(&self, composer: &mut Composer) -> RuntimeResult<RegistrationSummary> {
        let config = &self.options.config;
        let components: Vec<_> = self.container.components(&config.include).collect();

        let registrar =
            ListenerRegistrar::new(self.accessor.as_ref(), self.hear.clone(), self.options.reply_mode());
        let mut summary = RegistrationSummary::default();
        for component in components
            .iter()
            .filter(|c| self.accessor.is_update_component(c))
        {
            summary.merge(registrar.register_component(composer, component));
        }

        if !config.use_scene_manager {
            debug!("scene manager disabled, scene components not registered");
            return Ok(summary);
        }

        let builder = SceneBuilder::new(self.accessor.as_ref()).strict(config.strict_scenes);
        let mut scenes = Vec::new();
        for component in components
            .iter()
            .filter(|c| self.accessor.is_scene_component(c))
        {
            if let Some(scene) = builder.build(component)? {
                scenes.push(scene);
            }
        }
        self.scenes.add_scenes(scenes);

        Ok(summary)
    }
}

impl fmt::Debug for ListenersExplorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenersExplorer")
            .field("options", &self.options)
            .field("state", &self.state())
            .field("entries", &self.entries())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use courier_core::testing::RecordingClient;
    use courier_core::{Context, Next, UpdateKind, middleware_fn};
    use courier_framework::{
        BuildError, Component, DeclaredMetadata, MemoryStorage, handler,
    };

    use super::*;
    use crate::config::TelegramConfig;
    use crate::container::Module;

    fn explorer(options: TelegramModuleOptions, modules: Vec<Module>) -> ListenersExplorer {
        explorer_with_scenes(options, modules, Arc::new(SceneManager::new()))
    }

    fn explorer_with_scenes(
        options: TelegramModuleOptions,
        modules: Vec<Module>,
        scenes: Arc<SceneManager>,
    ) -> ListenersExplorer {
        let mut container = ModulesContainer::new();
        container.provide_client(RecordingClient::new());
        for module in modules {
            container.add_module(module);
        }
        ListenersExplorer::new(
            options,
            Arc::new(container),
            Arc::new(DeclaredMetadata),
            Arc::new(SessionManager::new(Arc::new(MemoryStorage::new()))),
            scenes,
            Arc::new(HearManager::new()),
        )
    }

    fn listeners() -> Module {
        Module::new("bot").component(
            Component::builder("echo", ())
                .update()
                .method(handler("log", || async {}).uses())
                .method(handler("text", || async {}).on(UpdateKind::Message))
                .build(),
        )
    }

    fn scene(slug: &str) -> Component {
        Component::builder(slug.to_string(), ())
            .scene(slug.to_string())
            .method(handler("start", || async {}).enter())
            .method(handler("ask", || async {}))
            .build()
    }

    #[test]
    fn test_pipeline_order() {
        let noop = middleware_fn(|_ctx: Arc<Context>, next: Next| next.run());
        let options = TelegramModuleOptions::default()
            .use_before(noop.clone())
            .use_after(noop);
        let explorer = explorer(options, vec![listeners()]);

        explorer.on_module_init().unwrap();

        assert_eq!(
            explorer.entries(),
            vec![
                "before[0]",
                "session",
                "scene",
                "scene.intercept",
                "echo.log:use",
                "echo.text:on",
                "hear",
                "after[0]",
            ]
        );
        assert_eq!(explorer.state(), ExplorerState::Attached);
    }

    #[test]
    fn test_disabled_managers_are_left_out() {
        let options = TelegramModuleOptions::new(TelegramConfig {
            use_session_manager: false,
            use_scene_manager: false,
            use_hear_manager: false,
            ..Default::default()
        });
        let explorer = explorer(options, vec![listeners()]);

        explorer.on_module_init().unwrap();

        assert_eq!(explorer.entries(), vec!["echo.log:use", "echo.text:on"]);
    }

    #[test]
    fn test_disabled_scene_manager_ignores_scene_components() {
        let options = TelegramModuleOptions::new(TelegramConfig {
            use_scene_manager: false,
            ..Default::default()
        });
        let scenes = Arc::new(SceneManager::new());
        let module = listeners().component(scene("survey")).component(scene("signup"));
        let explorer = explorer_with_scenes(options, vec![module], scenes.clone());

        explorer.on_module_init().unwrap();

        assert_eq!(
            explorer.entries(),
            vec!["session", "echo.log:use", "echo.text:on", "hear"]
        );
        assert!(!explorer.entries().iter().any(|e| e.starts_with("scene")));
        assert_eq!(scenes.scene_count(), 0);
    }

    #[test]
    fn test_same_declarations_give_same_pipeline() {
        let build = || {
            let scenes = Arc::new(SceneManager::new());
            let module = listeners().component(scene("survey"));
            let explorer =
                explorer_with_scenes(TelegramModuleOptions::default(), vec![module], scenes.clone());
            explorer.on_module_init().unwrap();
            (explorer.entries(), scenes.scene_count())
        };

        let first = build();
        let second = build();

        assert_eq!(first, second);
        assert_eq!(
            first.0,
            vec!["session", "scene", "scene.intercept", "echo.log:use", "echo.text:on", "hear"]
        );
        assert_eq!(first.1, 1);
    }

    #[test]
    fn test_second_init_fails() {
        let explorer = explorer(TelegramModuleOptions::default(), vec![listeners()]);

        explorer.on_module_init().unwrap();
        assert!(matches!(
            explorer.on_module_init(),
            Err(RuntimeError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_missing_client() {
        let options = TelegramModuleOptions::new(TelegramConfig {
            client_name: "support".into(),
            ..Default::default()
        });
        let explorer = explorer(options, vec![listeners()]);

        assert!(matches!(
            explorer.on_module_init(),
            Err(RuntimeError::ClientNotFound(name)) if name == "support"
        ));
        assert_eq!(explorer.state(), ExplorerState::Building);
    }

    #[test]
    fn test_strict_scene_failure_keeps_building_state() {
        let scene = Component::builder("dup", ())
            .scene("dup")
            .method(handler("a", || async {}).enter())
            .method(handler("b", || async {}).enter())
            .build();
        let options = TelegramModuleOptions::new(TelegramConfig {
            strict_scenes: true,
            ..Default::default()
        });
        let explorer = explorer(options, vec![Module::new("scenes").component(scene)]);

        assert!(matches!(
            explorer.on_module_init(),
            Err(RuntimeError::Build(BuildError::DuplicateSceneAction { .. }))
        ));
        assert_eq!(explorer.state(), ExplorerState::Building);
        assert!(explorer.entries().is_empty());
    }
}

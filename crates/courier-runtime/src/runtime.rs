//! Runtime orchestration.
//!
//! [`CourierRuntime`] owns the configuration, the module container and the
//! session/scene/hear managers. `init` builds and attaches the listener
//! pipeline; `serve` feeds it updates from any stream.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let mut runtime = CourierRuntime::builder()
//!     .config_file("config/courier.toml")
//!     .build()?;
//!
//! runtime.register_client(client.clone());
//! runtime.register_module(Module::new("greeting").component(greeter));
//! runtime.run(updates).await?;
//! ```

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::signal;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, error, info, span, warn};

use courier_core::{BoxedClient, BoxedMiddleware, MiddlewareResult, Update, UpdatesError};
use courier_framework::{
    DeclaredMetadata, HearManager, MemoryStorage, MetadataAccessor, SceneManager, SessionManager,
    SessionStorage,
};

use crate::config::{ConfigLoader, ConfigResult, CourierConfig, validate_config};
use crate::container::{Module, ModulesContainer};
use crate::error::RuntimeResult;
use crate::explorer::{ExplorerState, ListenersExplorer};
use crate::logging;
use crate::options::TelegramModuleOptions;

/// The Courier runtime.
pub struct CourierRuntime {
    config: CourierConfig,
    options: TelegramModuleOptions,
    container: ModulesContainer,
    accessor: Arc<dyn MetadataAccessor>,
    session: Arc<SessionManager>,
    scenes: Arc<SceneManager>,
    hear: Arc<HearManager>,
    explorer: Option<ListenersExplorer>,
    client: Option<BoxedClient>,
    shutdown: CancellationToken,
}

impl CourierRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory, or from defaults if there is none.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                CourierConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging.
    pub fn from_config(config: &CourierConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            client = %config.telegram.client_name,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            options: TelegramModuleOptions::new(config.telegram.clone()),
            container: ModulesContainer::new(),
            accessor: Arc::new(DeclaredMetadata),
            session: Arc::new(SessionManager::new(Arc::new(MemoryStorage::new()))),
            scenes: Arc::new(SceneManager::new()),
            hear: Arc::new(HearManager::new()),
            explorer: None,
            client: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a chat client under its own name.
    pub fn register_client(&mut self, client: BoxedClient) -> &mut Self {
        if !self.registration_closed("client") {
            self.container.provide_client(client);
        }
        self
    }

    /// Registers a module of components.
    pub fn register_module(&mut self, module: Module) -> &mut Self {
        if !self.registration_closed("module") {
            self.container.add_module(module);
        }
        self
    }

    /// Adds a middleware in front of the session middleware.
    pub fn use_before(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        if !self.registration_closed("middleware") {
            self.options.middlewares_before.push(middleware);
        }
        self
    }

    /// Adds a middleware after the hear middleware.
    pub fn use_after(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        if !self.registration_closed("middleware") {
            self.options.middlewares_after.push(middleware);
        }
        self
    }

    /// Replaces the in-memory session storage.
    pub fn with_session_storage(&mut self, storage: Arc<dyn SessionStorage>) -> &mut Self {
        if !self.registration_closed("session storage") {
            self.session = Arc::new(SessionManager::new(storage));
        }
        self
    }

    /// Replaces the session manager, e.g. to change the session key.
    pub fn with_session_manager(&mut self, session: SessionManager) -> &mut Self {
        if !self.registration_closed("session manager") {
            self.session = Arc::new(session);
        }
        self
    }

    /// Replaces the metadata accessor.
    pub fn with_metadata_accessor(&mut self, accessor: Arc<dyn MetadataAccessor>) -> &mut Self {
        if !self.registration_closed("metadata accessor") {
            self.accessor = accessor;
        }
        self
    }

    /// Returns `true` (and warns) once `init` ran.
    fn registration_closed(&self, what: &str) -> bool {
        let closed = self.explorer.is_some();
        if closed {
            warn!(what, "registered after init, ignored");
        }
        closed
    }

    pub fn scenes(&self) -> &Arc<SceneManager> {
        &self.scenes
    }

    pub fn hear(&self) -> &Arc<HearManager> {
        &self.hear
    }

    /// The pipeline composer, once `init` ran.
    pub fn explorer(&self) -> Option<&ListenersExplorer> {
        self.explorer.as_ref()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Builds the listener pipeline and attaches it to the client.
    ///
    /// Runs once; a second call fails with
    /// [`RuntimeError::AlreadyInitialized`](crate::RuntimeError::AlreadyInitialized).
    pub fn init(&mut self) -> RuntimeResult<()> {
        if let Some(explorer) = &self.explorer {
            return explorer.on_module_init();
        }

        let container = Arc::new(std::mem::take(&mut self.container));
        let explorer = ListenersExplorer::new(
            self.options.clone(),
            container.clone(),
            self.accessor.clone(),
            self.session.clone(),
            self.scenes.clone(),
            self.hear.clone(),
        );
        let result = explorer.on_module_init();
        self.explorer = Some(explorer);
        result?;

        self.client = container.client(&self.config.telegram.client_name);
        debug!(entries = ?self.explorer.as_ref().map(ListenersExplorer::entries), "Runtime ready");
        Ok(())
    }

    /// Returns `true` once the pipeline is attached.
    pub fn is_initialized(&self) -> bool {
        self.explorer
            .as_ref()
            .is_some_and(|e| e.state() == ExplorerState::Attached)
    }

    /// Runs one update through the pipeline.
    pub async fn dispatch(&self, update: Update) -> MiddlewareResult {
        let client = self.client.clone().ok_or_else(|| UpdatesError::NotAttached {
            client: self.config.telegram.client_name.clone(),
        })?;
        client.updates().dispatch(client.clone(), update).await
    }

    /// Serves updates until the stream ends or [`shutdown`](Self::shutdown)
    /// is called.
    ///
    /// Each update is handled in its own task. Failures of the pipeline are
    /// logged here and do not stop serving. In-flight updates are awaited
    /// before returning.
    pub async fn serve<S>(&self, updates: S) -> RuntimeResult<()>
    where
        S: Stream<Item = Update> + Send,
    {
        let client = self.client.clone().ok_or_else(|| UpdatesError::NotAttached {
            client: self.config.telegram.client_name.clone(),
        })?;

        info!(client = %self.config.telegram.client_name, "Serving updates");

        let mut tasks = JoinSet::new();
        let mut updates = std::pin::pin!(updates);
        loop {
            let update = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting updates");
                    break;
                }
                update = updates.next() => match update {
                    Some(update) => update,
                    None => break,
                },
            };

            let client = client.clone();
            let span = span!(Level::INFO, "update", update_id = update.update_id);
            tasks.spawn(
                async move {
                    if let Err(err) = client.updates().dispatch(client.clone(), update).await {
                        error!(error = %err, "Update handling failed");
                    }
                }
                .instrument(span),
            );

            // reap finished tasks so the set stays small
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        info!("Stopped serving updates");
        Ok(())
    }

    /// Initializes and serves until the stream ends, Ctrl+C or SIGTERM.
    pub async fn run<S>(&mut self, updates: S) -> RuntimeResult<()>
    where
        S: Stream<Item = Update> + Send,
    {
        self.init()?;

        info!("Courier runtime is now running. Press Ctrl+C to stop.");

        let token = self.shutdown.clone();
        let watcher = tokio::spawn(async move {
            wait_for_shutdown().await;
            token.cancel();
        });

        let result = self.serve(updates).await;
        watcher.abort();
        result
    }

    /// Stops [`serve`](Self::serve) from accepting further updates.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// A token that is cancelled on shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Default for CourierRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("options", &self.options)
            .field("container", &self.container)
            .field("explorer", &self.explorer)
            .finish_non_exhaustive()
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "Update task panicked");
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(err) => warn!(error = %err, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => error!(error = %err, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`CourierRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = CourierRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads, validates and builds.
    pub fn build(self) -> ConfigResult<CourierRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(CourierRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_test::assert_ok;

    use courier_core::testing::RecordingClient;
    use courier_core::{BoxError, Context, Next, UpdateKind};
    use courier_framework::{
        Component, HearConditions, HearMatch, SceneContext, SenderId, Session, Text, handler,
    };

    use super::*;
    use crate::config::TelegramConfig;
    use crate::error::RuntimeError;

    fn runtime(telegram: TelegramConfig) -> (CourierRuntime, Arc<RecordingClient>) {
        let client = RecordingClient::new();
        let mut runtime = CourierRuntime::from_config(&CourierConfig {
            telegram,
            ..Default::default()
        });
        runtime.register_client(client.clone());
        (runtime, client)
    }

    fn message(id: i64, text: &str) -> Update {
        Update::message(id, 5, 6, 100 + id, text)
    }

    fn ping() -> Module {
        Module::new("ping").component(
            Component::builder("ping", ())
                .update()
                .method(handler("pong", || async { "pong" }).uses())
                .build(),
        )
    }

    #[tokio::test]
    async fn test_use_listener_replies_to_message() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(ping());
        assert_ok!(runtime.init());

        runtime.dispatch(message(1, "ping")).await.unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "pong");
        assert_eq!(sent[0].reply_to_message_id, Some(101));
    }

    #[tokio::test]
    async fn test_not_reply_message_sends_plain_message() {
        let (mut runtime, client) = runtime(TelegramConfig {
            not_reply_message: true,
            ..Default::default()
        });
        runtime.register_module(ping());
        runtime.init().unwrap();

        runtime.dispatch(message(1, "ping")).await.unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].is_reply());
    }

    #[tokio::test]
    async fn test_on_listener_filters_update_kind() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(Module::new("bot").component(
            Component::builder("kinds", ())
                .update()
                .method(handler("text", || async { "message" }).on(UpdateKind::Message))
                .method(handler("query", || async { "query" }).on(UpdateKind::CallbackQuery))
                .build(),
        ));
        runtime.init().unwrap();

        runtime.dispatch(message(1, "hi")).await.unwrap();
        // the result of a non-message update is not delivered
        runtime
            .dispatch(Update::new(2, UpdateKind::CallbackQuery).with_chat(5))
            .await
            .unwrap();

        assert_eq!(client.texts(), vec!["message"]);
    }

    #[tokio::test]
    async fn test_hears_and_fallback() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(Module::new("bot").component(
            Component::builder("greeter", ())
                .update()
                .method(
                    handler("greet", |m: HearMatch| async move {
                        format!("hello {}", m.group(0).unwrap_or_default())
                    })
                    .hears(HearConditions::regex(r"^hi (\w+)$").unwrap()),
                )
                .method(handler("unknown", || async { "?" }).hear_fallback())
                .build(),
        ));
        runtime.init().unwrap();

        runtime.dispatch(message(1, "hi bob")).await.unwrap();
        runtime.dispatch(message(2, "what")).await.unwrap();

        assert_eq!(client.texts(), vec!["hello bob", "?"]);
    }

    #[tokio::test]
    async fn test_failed_extraction_continues_chain() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(Module::new("bot").component(
            Component::builder("bot", ())
                .update()
                .method(handler("sender", |_: SenderId| async { "sender" }).uses())
                .method(handler("after", || async { "after" }).uses())
                .build(),
        ));
        runtime.init().unwrap();

        let anonymous = Update {
            sender_id: None,
            ..message(1, "hi")
        };
        runtime.dispatch(anonymous).await.unwrap();

        assert_eq!(client.texts(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let component = |name: &'static str, log: Arc<Mutex<Vec<&'static str>>>| {
            Component::builder(name, ())
                .update()
                .method(
                    handler("log", move |next: Next| {
                        let log = log.clone();
                        async move {
                            log.lock().push(name);
                            next.run().await
                        }
                    })
                    .uses(),
                )
                .build()
        };

        let (mut runtime, _client) = runtime(TelegramConfig::default());
        runtime
            .register_module(Module::new("first").component(component("a", log.clone())))
            .register_module(
                Module::new("second")
                    .component(component("b", log.clone()))
                    .component(component("c", log.clone())),
            );
        runtime.init().unwrap();

        runtime.dispatch(message(1, "hi")).await.unwrap();

        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_session_persists_between_updates() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(Module::new("bot").component(
            Component::builder("counter", ())
                .update()
                .method(
                    handler("count", |session: Session| async move {
                        let count = session.get_as::<u64>("count").unwrap_or(0) + 1;
                        session.set("count", json!(count));
                        format!("count {count}")
                    })
                    .uses(),
                )
                .build(),
        ));
        runtime.init().unwrap();

        for id in 1..=3 {
            runtime.dispatch(message(id, "tick")).await.unwrap();
        }

        assert_eq!(client.texts(), vec!["count 1", "count 2", "count 3"]);
    }

    async fn start_survey(scene: SceneContext) -> Result<(), BoxError> {
        scene.enter("survey").await
    }

    async fn ask_name(
        ctx: Arc<Context>,
        scene: SceneContext,
        text: Option<Text>,
    ) -> Result<(), BoxError> {
        if scene.first_time() {
            ctx.send("name?").await?;
            return Ok(());
        }
        scene.set_state("name", json!(text.map(|t| t.0)))?;
        scene.next().await
    }

    async fn ask_age(ctx: Arc<Context>, scene: SceneContext) -> Result<(), BoxError> {
        if scene.first_time() {
            ctx.send("age?").await?;
            return Ok(());
        }
        scene.next().await
    }

    async fn goodbye(ctx: Arc<Context>, scene: SceneContext) -> Result<(), BoxError> {
        let name = scene.state_as::<String>("name").unwrap_or_default();
        ctx.send(&format!("bye {name}")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_scene_intercepts_until_left() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(
            Module::new("survey")
                .component(
                    Component::builder("starter", ())
                        .update()
                        .method(handler("start", start_survey).hears("survey"))
                        .method(handler("echo", |text: Text| async move { text.0 }).hear_fallback())
                        .build(),
                )
                .component(
                    Component::builder("survey", ())
                        .scene("survey")
                        .method(handler("ask_name", ask_name))
                        .method(handler("ask_age", ask_age))
                        .method(handler("goodbye", goodbye).leave())
                        .build(),
                ),
        );
        runtime.init().unwrap();
        assert_eq!(runtime.scenes().slugs(), vec!["survey"]);

        for (id, text) in ["survey", "bob", "30", "hello"].into_iter().enumerate() {
            runtime.dispatch(message(id as i64, text)).await.unwrap();
        }

        assert_eq!(client.texts(), vec!["name?", "age?", "bye bob", "hello"]);
    }

    #[tokio::test]
    async fn test_second_init_fails() {
        let (mut runtime, _client) = runtime(TelegramConfig::default());
        runtime.register_module(ping());

        runtime.init().unwrap();
        assert!(runtime.is_initialized());
        assert!(matches!(runtime.init(), Err(RuntimeError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn test_dispatch_before_init_fails() {
        let (runtime, _client) = runtime(TelegramConfig::default());

        let err = runtime.dispatch(message(1, "ping")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpdatesError>(),
            Some(UpdatesError::NotAttached { .. })
        ));
    }

    #[tokio::test]
    async fn test_init_without_client_fails() {
        let mut runtime = CourierRuntime::from_config(&CourierConfig::default());
        runtime.register_module(ping());

        assert!(matches!(
            runtime.init(),
            Err(RuntimeError::ClientNotFound(name)) if name == "telegram"
        ));
        assert!(!runtime.is_initialized());
    }

    #[tokio::test]
    async fn test_serve_handles_every_update() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(ping());
        runtime.init().unwrap();

        let updates = stream::iter((1..=5).map(|id| message(id, "ping")));
        runtime.serve(updates).await.unwrap();

        assert_eq!(client.sent().len(), 5);
    }

    #[tokio::test]
    async fn test_serve_survives_panicking_update() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(Module::new("fragile").component(
            Component::builder("fragile", ())
                .update()
                .method(
                    handler("pong", |text: Text| async move {
                        if text.0 == "boom" {
                            panic!("handler exploded");
                        }
                        "pong"
                    })
                    .uses(),
                )
                .build(),
        ));
        runtime.init().unwrap();

        let updates = stream::iter(vec![message(1, "ping"), message(2, "boom"), message(3, "ping")]);
        assert_ok!(runtime.serve(updates).await);

        assert_eq!(client.texts(), vec!["pong", "pong"]);
    }

    #[tokio::test]
    async fn test_registration_after_init_is_ignored() {
        let (mut runtime, _client) = runtime(TelegramConfig::default());
        runtime.register_module(ping());
        runtime.init().unwrap();

        let session = runtime.session.clone();
        runtime
            .use_before(courier_core::passthrough())
            .use_after(courier_core::passthrough())
            .with_session_storage(Arc::new(MemoryStorage::new()))
            .register_module(ping());

        assert!(runtime.options.middlewares_before.is_empty());
        assert!(runtime.options.middlewares_after.is_empty());
        assert!(Arc::ptr_eq(&session, &runtime.session));
        assert_eq!(runtime.container.module_count(), 0);
    }

    #[tokio::test]
    async fn test_serve_stops_after_shutdown() {
        let (mut runtime, client) = runtime(TelegramConfig::default());
        runtime.register_module(ping());
        runtime.init().unwrap();

        runtime.shutdown();
        runtime
            .serve(stream::iter(vec![message(1, "ping")]))
            .await
            .unwrap();

        assert!(client.sent().is_empty());
    }
}

//! Options of the listener pipeline.

use courier_core::BoxedMiddleware;
use courier_framework::ReplyMode;

use crate::config::TelegramConfig;

/// [`TelegramConfig`] plus the middlewares that can only be given in code.
#[derive(Clone, Default)]
pub struct TelegramModuleOptions {
    pub config: TelegramConfig,
    /// Installed first, before the session middleware.
    pub middlewares_before: Vec<BoxedMiddleware>,
    /// Installed last, after the hear middleware.
    pub middlewares_after: Vec<BoxedMiddleware>,
}

impl TelegramModuleOptions {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn use_before(mut self, middleware: BoxedMiddleware) -> Self {
        self.middlewares_before.push(middleware);
        self
    }

    pub fn use_after(mut self, middleware: BoxedMiddleware) -> Self {
        self.middlewares_after.push(middleware);
        self
    }

    pub fn reply_mode(&self) -> ReplyMode {
        self.config.reply_mode()
    }
}

impl From<TelegramConfig> for TelegramModuleOptions {
    fn from(config: TelegramConfig) -> Self {
        Self::new(config)
    }
}

impl std::fmt::Debug for TelegramModuleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramModuleOptions")
            .field("config", &self.config)
            .field("middlewares_before", &self.middlewares_before.len())
            .field("middlewares_after", &self.middlewares_after.len())
            .finish()
    }
}

//! Echo Bot Example
//!
//! A console bot built from Courier components. Every line typed on stdin is
//! delivered as a text message; everything the bot sends is printed.
//!
//! # Listeners
//!
//! ```text
//! log      (use)            logs every update, then continues
//! ping     (hears /ping)    replies "Pong!"
//! echo     (hears /echo ..) replies with the text after the command
//! count    (hears /count)   counts messages in the session
//! signup   (hears /signup)  enters the "signup" scene
//! unknown  (fallback)       everything else
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --chat 42
//! ```

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use courier::core::{ApiResult, SendOptions, Updates};
use courier::prelude::*;
use futures::{Stream, stream};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

// ============================================================================
// Console client
// ============================================================================

/// A [`Client`] that prints outgoing messages to stdout.
struct ConsoleClient {
    updates: Updates,
    next_message_id: AtomicI64,
}

impl ConsoleClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            updates: Updates::new("telegram"),
            next_message_id: AtomicI64::new(1),
        })
    }
}

#[async_trait]
impl Client for ConsoleClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, chat_id: i64, text: &str, options: SendOptions) -> ApiResult<i64> {
        match options.reply_to_message_id {
            Some(id) => println!("[chat {chat_id}] bot (re #{id}): {text}"),
            None => println!("[chat {chat_id}] bot: {text}"),
        }
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    fn updates(&self) -> &Updates {
        &self.updates
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Turns stdin lines into message updates for `chat`.
fn stdin_updates(chat: i64) -> impl Stream<Item = Update> + Send {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    stream::unfold((lines, 1_i64), move |(mut lines, id)| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((Update::message(id, chat, chat, id, line), (lines, id + 1))),
            Ok(None) => None,
            Err(e) => {
                error!("Failed to read stdin: {:?}", e);
                None
            }
        }
    })
}

// ============================================================================
// Components
// ============================================================================

async fn log_update(update: Update, next: Next) -> MiddlewareResult {
    info!(
        "[{}] {:?}: {}",
        update.kind,
        update.sender_id,
        update.text().unwrap_or_default()
    );
    next.run().await
}

async fn count(session: Session) -> String {
    let count = session.get_as::<u64>("count").unwrap_or(0) + 1;
    session.set("count", json!(count));
    format!("You have sent {count} counted messages")
}

async fn start_signup(scene: SceneContext) -> Result<(), BoxError> {
    scene.enter("signup").await
}

fn commands() -> Result<Component> {
    Ok(Component::builder("commands", ())
        .update()
        .method(handler("log", log_update).uses())
        .method(handler("ping", || async { "Pong!" }).hears("/ping"))
        .method(
            handler("echo", |m: HearMatch| async move {
                m.group(0).unwrap_or_default().to_string()
            })
            .hears(HearConditions::regex(r"^/echo (.+)$")?),
        )
        .method(handler("count", count).hears("/count"))
        .method(handler("signup", start_signup).hears("/signup"))
        .method(handler("unknown", |text: Text| async move {
            format!("Unknown command: {}. Try /ping, /echo, /count or /signup", text.0)
        }).hear_fallback())
        .build())
}

struct Signup;

impl Signup {
    async fn welcome(self: Arc<Self>, ctx: Arc<Context>) -> Result<(), BoxError> {
        ctx.send("Let's sign you up. Send /cancel at any time.").await?;
        Ok(())
    }

    async fn ask_name(
        self: Arc<Self>,
        ctx: Arc<Context>,
        scene: SceneContext,
        text: Option<Text>,
    ) -> Result<(), BoxError> {
        if scene.first_time() {
            ctx.send("What is your name?").await?;
            return Ok(());
        }
        match text.as_ref().map(|t| t.0.trim()) {
            Some("/cancel") => scene.leave().await,
            Some(name) if !name.is_empty() => {
                scene.set_state("name", json!(name))?;
                scene.next().await
            }
            _ => {
                ctx.send("Please send your name.").await?;
                Ok(())
            }
        }
    }

    async fn ask_age(
        self: Arc<Self>,
        ctx: Arc<Context>,
        scene: SceneContext,
        text: Option<Text>,
    ) -> Result<(), BoxError> {
        if scene.first_time() {
            ctx.send("How old are you?").await?;
            return Ok(());
        }
        let text = text.map(|t| t.0).unwrap_or_default();
        if text.trim() == "/cancel" {
            return scene.leave().await;
        }
        match text.trim().parse::<u32>() {
            Ok(age) => {
                scene.set_state("age", json!(age))?;
                scene.next().await
            }
            Err(_) => {
                ctx.send("Please send a number.").await?;
                Ok(())
            }
        }
    }

    async fn summary(self: Arc<Self>, ctx: Arc<Context>, scene: SceneContext) -> Result<(), BoxError> {
        match (
            scene.state_as::<String>("name"),
            scene.state_as::<u32>("age"),
        ) {
            (Some(name), Some(age)) => ctx.send(&format!("Signed up {name}, {age}.")).await?,
            _ => ctx.send("Signup cancelled.").await?,
        };
        Ok(())
    }
}

fn signup() -> Component {
    Component::builder("signup", Signup)
        .scene("signup")
        .method(method("welcome", Signup::welcome).enter())
        .method(method("ask_name", Signup::ask_name))
        .method(method("ask_age", Signup::ask_age))
        .method(method("summary", Signup::summary).leave())
        .build()
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Debug, Parser)]
#[command(about = "Console echo bot")]
struct Args {
    /// Configuration file to load.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat id the console lines are sent from.
    #[arg(long, default_value_t = 1)]
    chat: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = CourierRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let mut runtime = builder.build()?;

    runtime.register_client(ConsoleClient::new());
    runtime.register_module(
        Module::new("echo")
            .component(commands()?)
            .component(signup()),
    );

    runtime.run(stdin_updates(args.chat)).await?;

    Ok(())
}

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::ingest::App;
use crate::model::{Chat, Message, User};
use crate::platform::ReplyOpts;

/// Splits inbound text into an optional `/`-prefixed command token and the
/// argument text with leading spaces stripped. A bare `/` does not count as
/// a command.
pub fn parse_command(text: &str) -> (Option<&str>, &str) {
    let rest = match text.strip_prefix('/') {
        Some(rest) => rest,
        None => return (None, text),
    };
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    if end == 0 {
        return (None, text);
    }
    let args = rest[end..].trim_start_matches(' ');
    (Some(&rest[..end]), args)
}

/// Everything a command handler may touch for one inbound event: the
/// transaction in flight, the canonical records and the shared services.
/// Replies are buffered here and flushed to the platform once the event's
/// transaction commits, so a rolled-back event sends nothing.
pub struct CommandContext<'a> {
    pub conn: &'a Connection,
    pub app: &'a App,
    pub msg: &'a Message,
    pub author: &'a User,
    pub chat: &'a Chat,
    replies: Vec<(String, ReplyOpts)>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        conn: &'a Connection,
        app: &'a App,
        msg: &'a Message,
        author: &'a User,
        chat: &'a Chat,
    ) -> Self {
        Self {
            conn,
            app,
            msg,
            author,
            chat,
            replies: Vec::new(),
        }
    }

    pub fn reply(&mut self, text: &str) {
        self.reply_with(text, ReplyOpts::default());
    }

    pub fn reply_with(&mut self, text: &str, opts: ReplyOpts) {
        self.replies.push((text.to_string(), opts));
    }

    pub fn into_replies(self) -> Vec<(String, ReplyOpts)> {
        self.replies
    }
}

pub type Handler = fn(&mut CommandContext<'_>, &str) -> Result<()>;

/// Command-name to handler routing with aliases and an optional default.
/// Built once at startup and passed by reference (no global command table).
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Handler>,
    default: Option<Handler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a command name (without the slash).
    /// Several names may share one handler.
    pub fn register(&mut self, name: &str, handler: Handler) {
        self.commands.insert(name.to_string(), handler);
    }

    /// Handler for unrecognized commands and plain text.
    pub fn register_default(&mut self, handler: Handler) {
        self.default = Some(handler);
    }

    /// Parses and routes one inbound text. Handlers run to completion on
    /// the caller's thread; an unknown command with no default is dropped.
    pub fn dispatch(&self, ctx: &mut CommandContext<'_>, text: &str) -> Result<()> {
        let (command, args) = parse_command(text);
        let handler = match command {
            Some(name) => self.commands.get(name).or(self.default.as_ref()),
            None => self.default.as_ref(),
        };
        match handler {
            Some(handler) => handler(ctx, args),
            None => Ok(()),
        }
    }
}

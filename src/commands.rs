use anyhow::Result;
use chrono::FixedOffset;

use crate::dispatch::{CommandContext, CommandRegistry};
use crate::link::{self, IssueOutcome};
use crate::platform::ReplyOpts;
use crate::store::{chats, groups, messages, users};

/// Display separator for chat name paths; the stored separator never leaks.
const CHAT_SEP: &str = "/";

const TIME_FORMAT: &str = "%d %B %Y - %H:%M:%S (UTC+3)";

pub fn build_commands() -> CommandRegistry {
    let mut commands = CommandRegistry::new();
    commands.register("start", greet);
    commands.register("help", greet);
    commands.register("list", list_messages);
    commands.register("chats", list_chats);
    commands.register("link", link_accounts);
    commands.register("unlink", unlink_accounts);
    commands.register_default(fallback);
    commands
}

fn greet(ctx: &mut CommandContext<'_>, _args: &str) -> Result<()> {
    ctx.reply(concat!(
        "Hi, I'm FunnelBot!\n",
        "I listen to others, and then I retell everything to you.\n\n",
        "Commands:\n",
        "/list - messages visible to your linked accounts\n",
        "/chats - chats visible to your linked accounts\n",
        "/link - link another account to this one\n",
        "/unlink all - detach this account from the others\n",
        "/help - this message",
    ));
    Ok(())
}

fn list_messages(ctx: &mut CommandContext<'_>, _args: &str) -> Result<()> {
    let group = groups::by_id(ctx.conn, ctx.author.group_id)?;
    let visible = messages::for_chats(ctx.conn, &group.chats)?;

    let tz = FixedOffset::east_opt(3 * 3600).unwrap();
    let mut out = String::from("List of all messages\n");
    for msg in &visible {
        let date = msg.timestamp.with_timezone(&tz).format(TIME_FORMAT);
        out.push_str(&format!("{}) {}:\n{}\n\n", msg.id, date, msg.text));
    }
    ctx.reply(out.trim_end());
    Ok(())
}

fn list_chats(ctx: &mut CommandContext<'_>, _args: &str) -> Result<()> {
    let group = groups::by_id(ctx.conn, ctx.author.group_id)?;
    let visible = chats::by_ids(ctx.conn, &group.chats)?;

    let mut out = String::from("List of accessible chats\n");
    for (i, chat) in visible.iter().enumerate() {
        out.push_str(&format!("{} {}\n", i + 1, chat.display_name(CHAT_SEP)));
    }
    ctx.reply(out.trim_end());
    Ok(())
}

fn link_accounts(ctx: &mut CommandContext<'_>, args: &str) -> Result<()> {
    let secret = args.trim();
    if secret.is_empty() {
        issue_secret(ctx)
    } else {
        redeem_secret(ctx, secret)
    }
}

fn issue_secret(ctx: &mut CommandContext<'_>) -> Result<()> {
    let outcome = ctx.app.secrets.lock().unwrap().issue(ctx.author.id);
    match outcome {
        IssueOutcome::AlreadyPending => {
            ctx.reply(
                "You already have a pending link secret. \
                 Wait for it to expire before requesting a new one.",
            );
        }
        IssueOutcome::Issued(secret) => {
            let ttl = ctx.app.config.linking.secret_ttl_secs;
            ctx.reply(&format!(
                "To link another account, send this command from it within {ttl} seconds:"
            ));
            ctx.reply_with(
                &format!("/link {secret}"),
                ReplyOpts {
                    mention: false,
                    raw: true,
                },
            );
        }
    }
    Ok(())
}

fn redeem_secret(ctx: &mut CommandContext<'_>, secret: &str) -> Result<()> {
    let requester_id = ctx.app.secrets.lock().unwrap().requester(secret);
    let requester_id = match requester_id {
        None => {
            ctx.reply("This link secret is outdated or invalid.");
            return Ok(());
        }
        Some(id) if id == ctx.author.id => {
            ctx.reply("You cannot link an account to itself.");
            return Ok(());
        }
        Some(id) => id,
    };

    let requester = users::by_id(ctx.conn, requester_id)?;
    if requester.group_id == ctx.author.group_id {
        ctx.reply("These accounts are already linked.");
        return Ok(());
    }

    link::merge_groups(ctx.conn, &requester, ctx.author)?;
    ctx.app.secrets.lock().unwrap().consume(secret);
    ctx.reply("Accounts linked! Messages and chats visible to either account are now shared.");
    Ok(())
}

fn unlink_accounts(ctx: &mut CommandContext<'_>, args: &str) -> Result<()> {
    match args.trim() {
        "all" => {
            link::split_group(ctx.conn, ctx.author)?;
            ctx.reply("Done! This account no longer shares visibility with the others.");
        }
        "" => ctx.reply("Specify what to unlink: /unlink all"),
        other => ctx.reply(&format!("Unsupported option: {other}")),
    }
    Ok(())
}

fn fallback(ctx: &mut CommandContext<'_>, _args: &str) -> Result<()> {
    ctx.reply("I didn't catch that. Send /help for the list of commands.");
    Ok(())
}

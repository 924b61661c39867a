//! Reaction-driven workflows: quote curation and reaction roles.
//!
//! Quote flow: a 💬 reaction nominates a message; the bot posts a vote
//! message that collects 👍 reactions; the state machine in paddock-core
//! decides scolds and the commit. The pending store is mutated under its
//! mutex and the nomination is removed there before the slow commit work,
//! so replayed or concurrent events find nothing pending.

use std::collections::HashSet;

use serenity::model::channel::{Message, Reaction, ReactionType};
use serenity::model::id::{ChannelId, MessageId, RoleId, UserId};
use serenity::prelude::*;
use tracing::{debug, error, info};

use paddock_core::{format_quote, validate_nomination, Nomination};
use paddock_db::{MemberRepository, NewQuote, QuoteRepository};

use super::bot::Bot;
use crate::state::AppState;

pub(super) const NOMINATE_EMOJI: &str = "💬";
pub(super) const APPROVE_EMOJI: &str = "👍";
const COMMIT_EMOJI: char = '✅';

fn emoji_is(emoji: &ReactionType, unicode: &str) -> bool {
    matches!(emoji, ReactionType::Unicode(s) if s == unicode)
}

pub(super) async fn handle_reaction_add(bot: &Bot, ctx: &Context, reaction: &Reaction) {
    let Some(user_id) = reaction.user_id else {
        return;
    };
    if Some(user_id.get()) == bot.state.bot_user_id() {
        return;
    }

    if handle_reaction_role(bot, ctx, reaction, user_id, true).await {
        return;
    }

    if !bot.state.config.settings.quotes.enabled {
        return;
    }

    if emoji_is(&reaction.emoji, NOMINATE_EMOJI) {
        handle_nomination(bot, ctx, reaction, user_id).await;
    } else if emoji_is(&reaction.emoji, APPROVE_EMOJI) {
        handle_vote(bot, ctx, reaction).await;
    }
}

pub(super) async fn handle_reaction_remove(bot: &Bot, ctx: &Context, reaction: &Reaction) {
    let Some(user_id) = reaction.user_id else {
        return;
    };
    if Some(user_id.get()) == bot.state.bot_user_id() {
        return;
    }
    handle_reaction_role(bot, ctx, reaction, user_id, false).await;
}

/// Grant or revoke a configured reaction role. Returns true when the
/// reaction matched a configured pair.
async fn handle_reaction_role(
    bot: &Bot,
    ctx: &Context,
    reaction: &Reaction,
    user_id: UserId,
    grant: bool,
) -> bool {
    let Some(guild_id) = reaction.guild_id else {
        return false;
    };

    for mapping in &bot.state.config.settings.reaction_roles {
        if mapping.message_id != reaction.message_id.get()
            || !emoji_is(&reaction.emoji, &mapping.emoji)
        {
            continue;
        }

        let role_id = RoleId::new(mapping.role_id);
        let result = if grant {
            ctx.http
                .add_member_role(guild_id, user_id, role_id, Some("paddock reaction role"))
                .await
        } else {
            ctx.http
                .remove_member_role(guild_id, user_id, role_id, Some("paddock reaction role"))
                .await
        };
        match result {
            Ok(()) => info!(
                "{} role {} for user {}",
                if grant { "Granted" } else { "Revoked" },
                mapping.role_id,
                user_id
            ),
            Err(e) => error!("Reaction role update failed: {}", e),
        }
        return true;
    }
    false
}

async fn handle_nomination(bot: &Bot, ctx: &Context, reaction: &Reaction, nominator_id: UserId) {
    let message = match reaction.message(&ctx.http).await {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to fetch nominated message: {}", e);
            return;
        }
    };

    if let Err(rejection) = validate_nomination(&message.content, message.author.bot) {
        debug!("Nomination of message {} rejected: {:?}", message.id, rejection);
        return;
    }

    // Duplicate nominations for the same source message are dropped,
    // whether still pending or already committed.
    {
        let pending = bot.state.pending_quotes.lock().await;
        if pending.contains(message.id.get()) {
            debug!("Message {} already nominated", message.id);
            return;
        }
    }
    match QuoteRepository::exists(bot.state.pool(), &message.id.to_string()).await {
        Ok(false) => {}
        Ok(true) => {
            debug!("Message {} already quoted", message.id);
            return;
        }
        Err(e) => {
            error!("Failed to check for existing quote: {}", e);
            return;
        }
    }

    let nominator_name = match reaction.user(&ctx.http).await {
        Ok(user) => user.global_name.unwrap_or(user.name),
        Err(_) => "someone".to_string(),
    };
    let subject_name = display_name_for(&bot.state, &message).await;

    let vote_text = format!(
        "💬 {nominator_name} nominated a quote by **{subject_name}** — react {APPROVE_EMOJI} here to approve."
    );
    let vote_message = match reaction.channel_id.say(&ctx.http, vote_text).await {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to post vote message: {}", e);
            return;
        }
    };

    let nomination = Nomination::new(
        message.id.get(),
        reaction.channel_id.get(),
        nominator_id.get(),
        message.author.id.get(),
        vote_message.id.get(),
    );
    {
        let mut pending = bot.state.pending_quotes.lock().await;
        pending.insert(nomination);
    }
    bot.state.persist_pending_quotes().await;
    info!(
        "Quote nomination opened for message {} by {}",
        message.id, nominator_name
    );
}

async fn handle_vote(bot: &Bot, ctx: &Context, reaction: &Reaction) {
    // Fast path out if this 👍 is not on a vote message we track.
    {
        let mut pending = bot.state.pending_quotes.lock().await;
        if pending
            .get_mut_by_vote_message(reaction.message_id.get())
            .is_none()
        {
            return;
        }
    }

    let approvers = match approving_reactors(ctx, reaction).await {
        Some(set) => set,
        None => return,
    };

    // Tally under the lock; a committing nomination is removed right here
    // so a concurrent or replayed event cannot commit it twice.
    let (nomination, update) = {
        let mut pending = bot.state.pending_quotes.lock().await;
        let Some(nomination) = pending.get_mut_by_vote_message(reaction.message_id.get()) else {
            return;
        };
        let update = nomination.tally(&approvers);
        let snapshot = nomination.clone();
        if update.committed {
            pending.remove(snapshot.message_id);
        }
        (snapshot, update)
    };
    bot.state.persist_pending_quotes().await;

    if update.scold_nominator {
        let _ = reaction
            .channel_id
            .say(
                &ctx.http,
                format!(
                    "<@{}> nominating it was enough — someone else has to approve.",
                    nomination.nominator_id
                ),
            )
            .await;
    }
    if update.scold_subject {
        let _ = reaction
            .channel_id
            .say(
                &ctx.http,
                format!(
                    "<@{}> you can't approve a quote of yourself.",
                    nomination.subject_id
                ),
            )
            .await;
    }

    if update.committed {
        commit_quote(bot, ctx, &nomination).await;
    }
}

/// The current 👍 reactors on the vote message, bots excluded.
async fn approving_reactors(ctx: &Context, reaction: &Reaction) -> Option<HashSet<u64>> {
    let message = match reaction.message(&ctx.http).await {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to fetch vote message: {}", e);
            return None;
        }
    };
    let users = match message
        .reaction_users(
            &ctx.http,
            ReactionType::Unicode(APPROVE_EMOJI.to_string()),
            None,
            None,
        )
        .await
    {
        Ok(users) => users,
        Err(e) => {
            error!("Failed to list vote reactions: {}", e);
            return None;
        }
    };
    Some(
        users
            .into_iter()
            .filter(|u| !u.bot)
            .map(|u| u.id.get())
            .collect(),
    )
}

async fn commit_quote(bot: &Bot, ctx: &Context, nomination: &Nomination) {
    let candidate = match ctx
        .http
        .get_message(
            ChannelId::new(nomination.channel_id),
            MessageId::new(nomination.message_id),
        )
        .await
    {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to fetch quoted message for commit: {}", e);
            return;
        }
    };

    let context = candidate.referenced_message.as_deref().and_then(|replied| {
        if replied.content.trim().is_empty() {
            None
        } else {
            Some((
                replied
                    .author
                    .global_name
                    .clone()
                    .unwrap_or_else(|| replied.author.name.clone()),
                replied.content.clone(),
            ))
        }
    });

    let message_id = candidate.id.to_string();
    let member_discord_id = candidate.author.id.to_string();
    let new_quote = NewQuote {
        message_id: &message_id,
        member_discord_id: &member_discord_id,
        text: &candidate.content,
        context_text: context.as_ref().map(|(_, text)| text.as_str()),
        context_author: context.as_ref().map(|(author, _)| author.as_str()),
    };
    match QuoteRepository::insert(bot.state.pool(), &new_quote).await {
        Ok(true) => {}
        Ok(false) => {
            debug!("Quote for message {} already committed", candidate.id);
            return;
        }
        Err(e) => {
            error!("Failed to persist quote: {}", e);
            return;
        }
    }

    if let Err(e) = candidate.react(&ctx.http, COMMIT_EMOJI).await {
        error!("Failed to acknowledge committed quote: {}", e);
    }

    let subject_name = display_name_for(&bot.state, &candidate).await;
    let finalized = format_quote(
        &candidate.content,
        &subject_name,
        context
            .as_ref()
            .map(|(author, text)| (author.as_str(), text.as_str())),
    );
    if let Err(e) = super::send::say(&ctx.http, candidate.channel_id, &finalized).await {
        error!("Failed to post finalized quote: {}", e);
    }
    info!("Quote committed for message {}", candidate.id);
}

/// League display name for a message author, falling back to their
/// Discord name when they are not a registered member.
async fn display_name_for(state: &AppState, message: &Message) -> String {
    if let Ok(Some(member)) =
        MemberRepository::get_by_discord_id(state.db.pool(), &message.author.id.to_string()).await
    {
        return member.display_name;
    }
    message
        .author
        .global_name
        .clone()
        .unwrap_or_else(|| message.author.name.clone())
}

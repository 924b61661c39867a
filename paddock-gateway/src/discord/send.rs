//! Small helpers around serenity's builder types for replying to
//! interactions and posting to channels.

use serenity::builder::{
    CreateAttachment, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage,
};
use serenity::http::Http;
use serenity::model::application::CommandInteraction;
use serenity::model::id::ChannelId;

pub const EMBED_COLOR: u32 = 0xE1_06_00;

/// Reply to a slash command with plain text.
pub async fn respond_text(
    http: &Http,
    command: &CommandInteraction,
    text: &str,
) -> serenity::Result<()> {
    command
        .create_response(
            http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await
}

/// Reply to a slash command with an ephemeral message (errors, admin
/// feedback).
pub async fn respond_ephemeral(
    http: &Http,
    command: &CommandInteraction,
    text: &str,
) -> serenity::Result<()> {
    command
        .create_response(
            http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await
}

/// Reply with a titled embed.
pub async fn respond_embed(
    http: &Http,
    command: &CommandInteraction,
    title: &str,
    description: &str,
) -> serenity::Result<()> {
    let embed = CreateEmbed::new()
        .title(title)
        .description(description)
        .color(EMBED_COLOR);
    command
        .create_response(
            http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await
}

/// Reply with a rendered PNG attachment.
pub async fn respond_png(
    http: &Http,
    command: &CommandInteraction,
    filename: &str,
    bytes: Vec<u8>,
) -> serenity::Result<()> {
    command
        .create_response(
            http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .add_file(CreateAttachment::bytes(bytes, filename.to_string())),
            ),
        )
        .await
}

/// Acknowledge now, answer later, for commands that go out to the racing
/// service.
pub async fn defer(http: &Http, command: &CommandInteraction) -> serenity::Result<()> {
    command
        .create_response(http, CreateInteractionResponse::Defer(
            CreateInteractionResponseMessage::new(),
        ))
        .await
}

/// Follow up a deferred command with text.
pub async fn followup_text(
    http: &Http,
    command: &CommandInteraction,
    text: &str,
) -> serenity::Result<()> {
    command
        .create_followup(http, CreateInteractionResponseFollowup::new().content(text))
        .await
        .map(|_| ())
}

/// Post plain text to a channel.
pub async fn say(http: &Http, channel_id: ChannelId, text: &str) -> serenity::Result<()> {
    channel_id.say(http, text).await.map(|_| ())
}

/// Post a PNG with a caption to a channel (the weekly report).
pub async fn send_png(
    http: &Http,
    channel_id: ChannelId,
    filename: &str,
    bytes: Vec<u8>,
    caption: &str,
) -> serenity::Result<()> {
    let message = CreateMessage::new()
        .content(caption)
        .add_file(CreateAttachment::bytes(bytes, filename.to_string()));
    channel_id.send_message(http, message).await.map(|_| ())
}

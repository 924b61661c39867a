//! Discord bot event handler.
//!
//! Registers the slash commands on ready, then delegates: command and
//! autocomplete interactions to the command layer, reaction events to the
//! quote/role workflows.

use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{Command, CommandOptionType, Interaction};
use serenity::model::channel::Reaction;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info};

use super::reactions;
use crate::state::AppState;

pub struct Bot {
    pub(super) state: Arc<AppState>,
}

impl Bot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn season_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::String,
        "season",
        "Season like 2024s2 (default: all time)",
    )
    .required(false)
}

fn member_option(name: &str, description: &str, required: bool) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, name.to_string(), description.to_string())
        .required(required)
}

fn command_definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("stats")
            .description("A driver's stats summary")
            .add_option(member_option("member", "League member display name", true))
            .add_option(season_option()),
        CreateCommand::new("h2h")
            .description("Head-to-head driver comparison")
            .add_option(member_option("first", "First driver", true))
            .add_option(member_option("second", "Second driver", true))
            .add_option(season_option()),
        CreateCommand::new("standings")
            .description("Championship standings with projections")
            .add_option(season_option()),
        CreateCommand::new("compass")
            .description("Consistency vs competitiveness scatter for the whole league")
            .add_option(season_option()),
        CreateCommand::new("cpi")
            .description("Rolling corners-per-incident trend for a driver")
            .add_option(member_option("member", "League member display name", true)),
        CreateCommand::new("quote")
            .description("A random quote from the archive")
            .add_option(member_option("member", "Only quotes by this member", false)),
        CreateCommand::new("nextraces")
            .description("Upcoming sessions for a series")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "series", "Series name")
                    .required(true)
                    .set_autocomplete(true),
            ),
        CreateCommand::new("specials").description("Upcoming special events"),
        CreateCommand::new("member")
            .description("Manage league members (admin)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "add", "Register a member")
                    .add_sub_option(
                        CreateCommandOption::new(CommandOptionType::User, "user", "Discord user")
                            .required(true),
                    )
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "name",
                            "Display name",
                        )
                        .required(true),
                    )
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::Integer,
                            "iracing_id",
                            "iRacing customer id",
                        )
                        .required(true),
                    )
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "timezone",
                        "IANA timezone (default UTC)",
                    ))
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "color",
                        "Hex color tag for charts",
                    )),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "edit", "Edit a member")
                    .add_sub_option(
                        CreateCommandOption::new(CommandOptionType::User, "user", "Discord user")
                            .required(true),
                    )
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "name",
                        "New display name",
                    ))
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "iracing_id",
                        "New iRacing customer id",
                    ))
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "timezone",
                        "New IANA timezone",
                    ))
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "color",
                        "New hex color tag",
                    )),
            ),
    ]
}

#[async_trait]
impl EventHandler for Bot {
    /// Bot is ready — remember our own id and register slash commands.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        self.state.set_bot_user_id(ready.user.id.get());

        if let Err(e) = Command::set_global_commands(&ctx.http, command_definitions()).await {
            error!("Failed to register slash commands: {}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.handle_command(&ctx, &command).await,
            Interaction::Autocomplete(command) => self.handle_autocomplete(&ctx, &command).await,
            _ => {}
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        reactions::handle_reaction_add(self, &ctx, &reaction).await;
    }

    async fn reaction_remove(&self, ctx: Context, reaction: Reaction) {
        reactions::handle_reaction_remove(self, &ctx, &reaction).await;
    }
}

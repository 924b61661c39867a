//! Slash command handlers.
//!
//! Each handler parses its options, calls the aggregator or a repository,
//! and replies. User-input problems (bad season strings, unknown members)
//! become short replies; iRacing failures map per kind; serenity delivery
//! errors are logged and answered with a generic line when possible.

use chrono::Utc;
use serenity::builder::{CreateAutocompleteResponse, CreateInteractionResponse};
use serenity::model::application::{
    CommandDataOption, CommandDataOptionValue, CommandInteraction,
};
use serenity::prelude::*;
use tracing::{error, warn};

use paddock_core::stats::{self, CpiCurve};
use paddock_core::{Season, format_quote};
use paddock_db::{
    Member, MemberRepository, QuoteRepository, SeriesRepository, SpecialEventRepository,
};

use super::bot::Bot;
use super::chart_image;
use super::send;
use crate::iracing::IracingError;
use crate::reports;

/// Log-and-forget wrapper for reply delivery; a failed reply is a Discord
/// delivery error, not a command failure.
fn log_delivery(result: serenity::Result<()>) {
    if let Err(e) = result {
        error!("Discord delivery error: {}", e);
    }
}

impl Bot {
    pub(super) async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        match command.data.name.as_str() {
            "stats" => self.handle_stats(ctx, command).await,
            "h2h" => self.handle_h2h(ctx, command).await,
            "standings" => self.handle_standings(ctx, command).await,
            "compass" => self.handle_compass(ctx, command).await,
            "cpi" => self.handle_cpi(ctx, command).await,
            "quote" => self.handle_quote(ctx, command).await,
            "nextraces" => self.handle_nextraces(ctx, command).await,
            "specials" => self.handle_specials(ctx, command).await,
            "member" => self.handle_member(ctx, command).await,
            other => warn!("Unknown command: {}", other),
        }
    }

    /// Handle `/stats`: one driver's summary embed.
    async fn handle_stats(&self, ctx: &Context, command: &CommandInteraction) {
        let season = match parse_season_option(command) {
            Ok(season) => season,
            Err(message) => {
                log_delivery(send::respond_ephemeral(&ctx.http, command, &message).await);
                return;
            }
        };

        let Some(name) = option_str(command, "member") else {
            log_delivery(send::respond_ephemeral(&ctx.http, command, "Give me a member name.").await);
            return;
        };
        let Some(member) = self.resolve_member(ctx, command, name).await else {
            return;
        };

        let samples =
            match reports::member_samples(self.state.pool(), member.iracing_id, season).await {
                Ok(samples) => samples,
                Err(e) => {
                    error!("Failed to load samples: {}", e);
                    log_delivery(
                        send::respond_ephemeral(&ctx.http, command, "Database error.").await,
                    );
                    return;
                }
            };

        let window = season_label(season);
        let totals = stats::head_to_head(&samples);
        if totals.races == 0 {
            log_delivery(
                send::respond_text(
                    &ctx.http,
                    command,
                    &format!("No cached races for **{}** ({window}).", member.display_name),
                )
                .await,
            );
            return;
        }

        let description = format!(
            "Races: **{}**\nLaps: **{}**\nIncidents: **{}**\nLaps per incident: **{}**\nAvg championship points: **{:.1}** over {} weeks",
            totals.races,
            totals.laps,
            totals.incidents,
            reports::format_lpi(totals.laps_per_incident()),
            totals.avg_champ_points,
            totals.weeks_raced,
        );
        let title = format!("{} — {window}", member.display_name);
        log_delivery(send::respond_embed(&ctx.http, command, &title, &description).await);
    }

    /// Handle `/h2h`: two-driver comparison table.
    async fn handle_h2h(&self, ctx: &Context, command: &CommandInteraction) {
        let season = match parse_season_option(command) {
            Ok(season) => season,
            Err(message) => {
                log_delivery(send::respond_ephemeral(&ctx.http, command, &message).await);
                return;
            }
        };
        let (Some(first), Some(second)) =
            (option_str(command, "first"), option_str(command, "second"))
        else {
            log_delivery(
                send::respond_ephemeral(&ctx.http, command, "Give me two member names.").await,
            );
            return;
        };

        let Some(member_a) = self.resolve_member(ctx, command, first).await else {
            return;
        };
        let Some(member_b) = self.resolve_member(ctx, command, second).await else {
            return;
        };

        let members = vec![member_a, member_b];
        let totals = match reports::member_totals(self.state.pool(), &members, season).await {
            Ok(totals) => totals,
            Err(e) => {
                error!("Failed to aggregate comparison: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };

        let (headers, rows) = reports::comparison_table(&totals);
        match chart_image::render_table_png(&headers, &rows) {
            Some(png) => {
                log_delivery(send::respond_png(&ctx.http, command, "h2h.png", png).await)
            }
            None => {
                log_delivery(
                    send::respond_text(&ctx.http, command, &reports::table_text(&headers, &rows)).await,
                )
            }
        }
    }

    /// Handle `/standings`: the championship report.
    async fn handle_standings(&self, ctx: &Context, command: &CommandInteraction) {
        let now = Utc::now();
        let season = match parse_season_option(command) {
            Ok(season) => season.unwrap_or_else(|| Season::current(now)),
            Err(message) => {
                log_delivery(send::respond_ephemeral(&ctx.http, command, &message).await);
                return;
            }
        };

        let weeks_counted = self.state.config.settings.reports.weeks_counted;
        let report = match reports::build_standings(
            self.state.pool(),
            season,
            weeks_counted,
            !season.is_current(now),
        )
        .await
        {
            Ok(report) => report,
            Err(e) => {
                error!("Failed to build standings: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };

        let Some(report) = report else {
            log_delivery(
                send::respond_text(&ctx.http, command, &format!("Nobody has raced in {season} yet."))
                    .await,
            );
            return;
        };

        let (headers, rows) = reports::standings_table(&report);
        match chart_image::render_table_png(&headers, &rows) {
            Some(png) => {
                log_delivery(send::respond_png(&ctx.http, command, "standings.png", png).await)
            }
            None => {
                log_delivery(
                    send::respond_text(&ctx.http, command, &reports::table_text(&headers, &rows)).await,
                )
            }
        }
    }

    /// Handle `/compass`: the consistency/competitiveness scatter.
    async fn handle_compass(&self, ctx: &Context, command: &CommandInteraction) {
        let season = match parse_season_option(command) {
            Ok(season) => season,
            Err(message) => {
                log_delivery(send::respond_ephemeral(&ctx.http, command, &message).await);
                return;
            }
        };

        let members = match MemberRepository::list_all(self.state.pool()).await {
            Ok(members) => members,
            Err(e) => {
                error!("Failed to list members: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };
        let totals = match reports::member_totals(self.state.pool(), &members, season).await {
            Ok(totals) => totals,
            Err(e) => {
                error!("Failed to aggregate compass data: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };

        let points = stats::compass_points(
            totals
                .iter()
                .map(|(member, t)| (member.display_name.as_str(), t)),
        );
        if points.is_empty() {
            log_delivery(
                send::respond_text(
                    &ctx.http,
                    command,
                    "Nothing to plot — no incidents on the board yet.",
                )
                .await,
            );
            return;
        }

        // Configured member colors win over the default palette.
        let colors: Vec<Option<String>> = points
            .iter()
            .map(|p| {
                members
                    .iter()
                    .find(|m| m.display_name == p.label)
                    .and_then(|m| m.color_tag.clone())
            })
            .collect();

        let title = format!("League compass — {}", season_label(season));
        match chart_image::render_compass_png(&title, &points, &colors) {
            Some(png) => {
                log_delivery(send::respond_png(&ctx.http, command, "compass.png", png).await)
            }
            None => {
                log_delivery(
                    send::respond_ephemeral(&ctx.http, command, "Chart rendering failed.").await,
                )
            }
        }
    }

    /// Handle `/cpi`: rolling corners-per-incident trend.
    async fn handle_cpi(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(name) = option_str(command, "member") else {
            log_delivery(send::respond_ephemeral(&ctx.http, command, "Give me a member name.").await);
            return;
        };
        let Some(member) = self.resolve_member(ctx, command, name).await else {
            return;
        };

        let samples = match reports::member_samples(self.state.pool(), member.iracing_id, None).await
        {
            Ok(samples) => samples,
            Err(e) => {
                error!("Failed to load samples: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };

        let min_corners = self.state.config.settings.stats.min_cpi_corners;
        let curve = match CpiCurve::new(samples, min_corners) {
            Ok(curve) => curve,
            Err(e) => {
                // Insufficient data is a user-facing outcome, not a fault.
                log_delivery(
                    send::respond_text(
                        &ctx.http,
                        command,
                        &format!("{} — {e}.", member.display_name),
                    )
                    .await,
                );
                return;
            }
        };

        let points: Vec<_> = curve.collect();
        let title = format!("{} — corners per incident", member.display_name);
        match chart_image::render_cpi_png(&title, &points) {
            Some(png) => log_delivery(send::respond_png(&ctx.http, command, "cpi.png", png).await),
            None => {
                log_delivery(
                    send::respond_text(
                        &ctx.http,
                        command,
                        &format!(
                            "{} has no incidents on record — nothing to plot.",
                            member.display_name
                        ),
                    )
                    .await,
                )
            }
        }
    }

    /// Handle `/quote`: a random committed quote.
    async fn handle_quote(&self, ctx: &Context, command: &CommandInteraction) {
        let member_filter = match option_str(command, "member") {
            Some(name) => match self.resolve_member(ctx, command, name).await {
                Some(member) => Some(member),
                None => return,
            },
            None => None,
        };

        let quote = match QuoteRepository::random(
            self.state.pool(),
            member_filter.as_ref().map(|m| m.discord_id.as_str()),
        )
        .await
        {
            Ok(quote) => quote,
            Err(e) => {
                error!("Failed to pick quote: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };

        let Some(quote) = quote else {
            let reply = match &member_filter {
                Some(member) => format!("No quotes from **{}** yet.", member.display_name),
                None => "No quotes yet — nominate one with 💬.".to_string(),
            };
            log_delivery(send::respond_text(&ctx.http, command, &reply).await);
            return;
        };

        let speaker = match member_filter {
            Some(member) => member.display_name,
            None => self
                .member_display_name(&quote.member_discord_id)
                .await
                .unwrap_or_else(|| format!("<@{}>", quote.member_discord_id)),
        };
        let text = format_quote(
            &quote.text,
            &speaker,
            quote
                .context_author
                .as_deref()
                .zip(quote.context_text.as_deref()),
        );
        log_delivery(send::respond_text(&ctx.http, command, &text).await);
    }

    /// Handle `/nextraces`: race-guide lookup, series picked via
    /// autocomplete.
    async fn handle_nextraces(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(fragment) = option_str(command, "series") else {
            log_delivery(send::respond_ephemeral(&ctx.http, command, "Give me a series name.").await);
            return;
        };

        let Some(iracing) = &self.state.iracing else {
            log_delivery(
                send::respond_ephemeral(&ctx.http, command, "iRacing access is not configured.")
                    .await,
            );
            return;
        };

        let matches = match SeriesRepository::search(self.state.pool(), fragment).await {
            Ok(matches) => matches,
            Err(e) => {
                error!("Series search failed: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };
        let Some(series) = matches.into_iter().next() else {
            log_delivery(
                send::respond_text(&ctx.http, command, &format!("No series matches '{fragment}'."))
                    .await,
            );
            return;
        };

        // The race guide is an outbound call; acknowledge first.
        log_delivery(send::defer(&ctx.http, command).await);

        let guide = match iracing.race_guide().await {
            Ok(guide) => guide,
            Err(e) => {
                log_delivery(
                    send::followup_text(&ctx.http, command, &iracing_error_reply(&e)).await,
                );
                return;
            }
        };

        let mut lines: Vec<String> = guide
            .sessions
            .iter()
            .filter(|s| s.series_id == series.series_id)
            .take(3)
            .map(|s| {
                format!(
                    "<t:{}:R> — {} entries so far",
                    s.start_time.timestamp(),
                    s.entry_count
                )
            })
            .collect();
        if lines.is_empty() {
            lines.push("no sessions in the near-term guide".to_string());
        }
        let reply = format!("**{}**\n{}", series.name, lines.join("\n"));
        log_delivery(send::followup_text(&ctx.http, command, &reply).await);
    }

    /// Handle `/specials`: upcoming special events.
    async fn handle_specials(&self, ctx: &Context, command: &CommandInteraction) {
        let today = Utc::now().date_naive();
        let events = match SpecialEventRepository::list_upcoming(self.state.pool(), today).await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to list special events: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                return;
            }
        };

        if events.is_empty() {
            log_delivery(
                send::respond_text(&ctx.http, command, "No special events on the calendar.").await,
            );
            return;
        }

        let lines: Vec<String> = events
            .iter()
            .map(|e| {
                let notes = e
                    .notes
                    .as_deref()
                    .map(|n| format!(" — {n}"))
                    .unwrap_or_default();
                format!("**{}**: {} to {}{notes}", e.name, e.starts_on, e.ends_on)
            })
            .collect();
        log_delivery(send::respond_text(&ctx.http, command, &lines.join("\n")).await);
    }

    /// Handle `/member add|edit`: admin member management.
    async fn handle_member(&self, ctx: &Context, command: &CommandInteraction) {
        if !self.is_admin(command) {
            log_delivery(
                send::respond_ephemeral(&ctx.http, command, "Admins only.").await,
            );
            return;
        }

        let Some((sub, options)) = subcommand(command) else {
            log_delivery(send::respond_ephemeral(&ctx.http, command, "Unknown subcommand.").await);
            return;
        };

        let reply = match sub {
            "add" => self.member_add(options).await,
            "edit" => self.member_edit(options).await,
            _ => "Unknown subcommand.".to_string(),
        };
        log_delivery(send::respond_ephemeral(&ctx.http, command, &reply).await);
    }

    async fn member_add(&self, options: &[CommandDataOption]) -> String {
        let (Some(user_id), Some(name), Some(iracing_id)) = (
            sub_user(options, "user"),
            sub_str(options, "name"),
            sub_i64(options, "iracing_id"),
        ) else {
            return "Need user, name, and iracing_id.".to_string();
        };
        let timezone = sub_str(options, "timezone").unwrap_or("UTC");
        let color = sub_str(options, "color");

        // Verify the customer id against the service when we can.
        if let Some(iracing) = &self.state.iracing {
            match iracing.member_profile(iracing_id).await {
                Ok(_) => {}
                Err(IracingError::NotFound(_)) => {
                    return format!("iRacing has no member with customer id {iracing_id}.");
                }
                Err(e) => return iracing_error_reply(&e),
            }
        }

        match MemberRepository::create(
            self.state.pool(),
            &user_id.to_string(),
            name,
            iracing_id,
            timezone,
            color,
        )
        .await
        {
            Ok(member) => format!(
                "Registered **{}** (iRacing {}).",
                member.display_name, member.iracing_id
            ),
            Err(e) => {
                error!("Member create failed: {}", e);
                "Could not register — duplicate Discord user or iRacing id?".to_string()
            }
        }
    }

    async fn member_edit(&self, options: &[CommandDataOption]) -> String {
        let Some(user_id) = sub_user(options, "user") else {
            return "Need the user to edit.".to_string();
        };

        match MemberRepository::update(
            self.state.pool(),
            &user_id.to_string(),
            sub_str(options, "name"),
            sub_i64(options, "iracing_id"),
            sub_str(options, "timezone"),
            sub_str(options, "color"),
        )
        .await
        {
            Ok(member) => format!("Updated **{}**.", member.display_name),
            Err(paddock_db::DbError::MemberNotFound(_)) => {
                "That user is not a registered member.".to_string()
            }
            Err(e) => {
                error!("Member update failed: {}", e);
                "Update failed.".to_string()
            }
        }
    }

    /// Series-name autocomplete for `/nextraces`.
    pub(super) async fn handle_autocomplete(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(focused) = command.data.autocomplete() else {
            return;
        };
        if focused.name != "series" {
            return;
        }

        let matches = SeriesRepository::search(self.state.pool(), focused.value)
            .await
            .unwrap_or_default();

        let mut response = CreateAutocompleteResponse::new();
        for series in matches.into_iter().take(25) {
            response = response.add_string_choice(series.name.clone(), series.name);
        }
        if let Err(e) = command
            .create_response(&ctx.http, CreateInteractionResponse::Autocomplete(response))
            .await
        {
            error!("Autocomplete response failed: {}", e);
        }
    }

    /// Resolve a member by display name, replying "not found" on a miss.
    async fn resolve_member(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        name: &str,
    ) -> Option<Member> {
        match MemberRepository::get_by_name(self.state.pool(), name).await {
            Ok(Some(member)) => Some(member),
            Ok(None) => {
                log_delivery(
                    send::respond_text(
                        &ctx.http,
                        command,
                        &format!("No league member called **{name}**."),
                    )
                    .await,
                );
                None
            }
            Err(e) => {
                error!("Member lookup failed: {}", e);
                log_delivery(send::respond_ephemeral(&ctx.http, command, "Database error.").await);
                None
            }
        }
    }

    async fn member_display_name(&self, discord_id: &str) -> Option<String> {
        MemberRepository::get_by_discord_id(self.state.pool(), discord_id)
            .await
            .ok()
            .flatten()
            .map(|m| m.display_name)
    }

    fn is_admin(&self, command: &CommandInteraction) -> bool {
        let Some(member) = &command.member else {
            return false;
        };
        if member.permissions.is_some_and(|p| p.manage_guild()) {
            return true;
        }
        match self.state.config.settings.admin_role_id {
            Some(role_id) => member.roles.iter().any(|r| r.get() == role_id),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Option plumbing
// ---------------------------------------------------------------------------

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
}

fn subcommand(command: &CommandInteraction) -> Option<(&str, &[CommandDataOption])> {
    command.data.options.first().and_then(|o| match &o.value {
        CommandDataOptionValue::SubCommand(options) => Some((o.name.as_str(), options.as_slice())),
        _ => None,
    })
}

fn sub_str<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
}

fn sub_i64(options: &[CommandDataOption], name: &str) -> Option<i64> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_i64())
}

fn sub_user(options: &[CommandDataOption], name: &str) -> Option<serenity::model::id::UserId> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::User(user_id) => Some(*user_id),
            _ => None,
        })
}

/// Parse the optional `season` option, mapping range errors to the user.
fn parse_season_option(command: &CommandInteraction) -> Result<Option<Season>, String> {
    match option_str(command, "season") {
        None => Ok(None),
        Some(raw) => Season::parse_validated(raw, Utc::now())
            .map(Some)
            .map_err(|e| e.to_string()),
    }
}

fn season_label(season: Option<Season>) -> String {
    match season {
        Some(season) => season.to_string(),
        None => "all time".to_string(),
    }
}

fn iracing_error_reply(err: &IracingError) -> String {
    match err {
        IracingError::Auth => {
            "Couldn't sign in to iRacing — the bot credentials need a look.".to_string()
        }
        IracingError::Maintenance => {
            "iRacing is down for maintenance, try again later.".to_string()
        }
        IracingError::NotFound(_) => "iRacing doesn't know that one.".to_string(),
        other => {
            error!("iRacing request failed: {}", other);
            "The iRacing request failed.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_labels() {
        assert_eq!(season_label(None), "all time");
        assert_eq!(
            season_label(Some(Season {
                year: 2024,
                quarter: 2
            })),
            "2024s2"
        );
    }

    #[test]
    fn iracing_errors_map_per_kind() {
        assert!(iracing_error_reply(&IracingError::Maintenance).contains("maintenance"));
        assert!(iracing_error_reply(&IracingError::Auth).contains("credentials"));
        assert!(
            iracing_error_reply(&IracingError::NotFound("member 1".to_string()))
                .contains("doesn't know")
        );
    }
}

//! Quote nomination and the reaction-vote state machine.
//!
//! A nomination moves from awaiting votes to committed exactly once. The
//! nominator and the quoted member can react all they like; the threshold
//! always demands at least one approver who is neither, so nobody pushes
//! their own quote over the line. This includes the self-quote case, where
//! nominator and subject are the same account and count once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Prefix that marks bot commands; command messages are not quotable.
pub const COMMAND_PREFIX: char = '!';

/// A quote nomination awaiting approval votes.
///
/// The two `*_approved` flags record that an interested party's own
/// reaction has been seen, which doubles as the "already scolded" marker;
/// each role gets the scolding reply at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nomination {
    /// The message being quoted.
    pub message_id: u64,
    pub channel_id: u64,
    pub nominator_id: u64,
    /// Author of the quoted message.
    pub subject_id: u64,
    /// The bot's "react to approve" message where votes are collected.
    pub vote_message_id: u64,
    #[serde(default)]
    pub nominator_approved: bool,
    #[serde(default)]
    pub subject_approved: bool,
}

/// Why a message cannot be nominated. Rejected messages never become
/// pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NominationRejection {
    BotAuthor,
    EmptyMessage,
    BareLink,
    CommandMessage,
}

/// Front-door validation of a nomination candidate.
pub fn validate_nomination(content: &str, author_is_bot: bool) -> Result<(), NominationRejection> {
    if author_is_bot {
        return Err(NominationRejection::BotAuthor);
    }
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(NominationRejection::EmptyMessage);
    }
    if is_bare_link(trimmed) {
        return Err(NominationRejection::BareLink);
    }
    if trimmed.starts_with(COMMAND_PREFIX) {
        return Err(NominationRejection::CommandMessage);
    }
    Ok(())
}

fn is_bare_link(trimmed: &str) -> bool {
    !trimmed.contains(char::is_whitespace)
        && (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
}

/// Result of re-tallying the approving reactions after a reaction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteUpdate {
    /// Threshold reached: persist the quote and drop the nomination.
    pub committed: bool,
    pub scold_nominator: bool,
    pub scold_subject: bool,
}

impl Nomination {
    pub fn new(
        message_id: u64,
        channel_id: u64,
        nominator_id: u64,
        subject_id: u64,
        vote_message_id: u64,
    ) -> Self {
        Self {
            message_id,
            channel_id,
            nominator_id,
            subject_id,
            vote_message_id,
            nominator_approved: false,
            subject_approved: false,
        }
    }

    /// Approving votes needed before the quote commits: one outside vote,
    /// plus one per interested party whose own reaction is in the set. A
    /// self-quote's author is one interested party, not two.
    pub fn required_votes(&self, approvers: &HashSet<u64>) -> usize {
        let mut required = 1;
        if approvers.contains(&self.nominator_id) {
            required += 1;
        }
        if self.subject_id != self.nominator_id && approvers.contains(&self.subject_id) {
            required += 1;
        }
        required
    }

    /// Re-tally after a reaction event.
    ///
    /// `approvers` is the full current set of approving reactors (the bot
    /// already excluded). Mutates the scold flags so each interested party
    /// is scolded at most once over the nomination's lifetime; when the
    /// threshold is reached no scold is emitted, only the commit.
    pub fn tally(&mut self, approvers: &HashSet<u64>) -> VoteUpdate {
        if approvers.len() >= self.required_votes(approvers) {
            return VoteUpdate {
                committed: true,
                scold_nominator: false,
                scold_subject: false,
            };
        }

        let nominator_in = approvers.contains(&self.nominator_id);
        let subject_in =
            self.subject_id != self.nominator_id && approvers.contains(&self.subject_id);
        let update = VoteUpdate {
            committed: false,
            scold_nominator: nominator_in && !self.nominator_approved,
            scold_subject: subject_in && !self.subject_approved,
        };
        self.nominator_approved |= nominator_in;
        self.subject_approved |= subject_in;
        update
    }
}

/// Render the finalized quote text, with reply context when the quoted
/// message was itself a reply.
pub fn format_quote(
    text: &str,
    subject_name: &str,
    context: Option<(&str, &str)>,
) -> String {
    match context {
        Some((context_author, context_text)) => format!(
            "> {context_author}: {context_text}\n\"{text}\" — {subject_name}"
        ),
        None => format!("\"{text}\" — {subject_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOMINATOR: u64 = 10;
    const SUBJECT: u64 = 20;
    const THIRD: u64 = 30;
    const FOURTH: u64 = 40;

    fn nomination() -> Nomination {
        Nomination::new(1, 2, NOMINATOR, SUBJECT, 3)
    }

    fn approvers(ids: &[u64]) -> HashSet<u64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn rejects_bot_author() {
        assert_eq!(
            validate_nomination("great line", true),
            Err(NominationRejection::BotAuthor)
        );
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(
            validate_nomination("", false),
            Err(NominationRejection::EmptyMessage)
        );
        assert_eq!(
            validate_nomination("   \n", false),
            Err(NominationRejection::EmptyMessage)
        );
    }

    #[test]
    fn rejects_bare_link() {
        assert_eq!(
            validate_nomination("https://example.com/clip", false),
            Err(NominationRejection::BareLink)
        );
    }

    #[test]
    fn accepts_link_with_commentary() {
        assert!(validate_nomination("watch this https://example.com/clip", false).is_ok());
    }

    #[test]
    fn rejects_command_message() {
        assert_eq!(
            validate_nomination("!stats", false),
            Err(NominationRejection::CommandMessage)
        );
    }

    #[test]
    fn nominator_alone_does_not_commit() {
        let mut nom = nomination();
        let update = nom.tally(&approvers(&[NOMINATOR]));
        assert!(!update.committed);
        assert!(update.scold_nominator);
        assert!(!update.scold_subject);
    }

    #[test]
    fn scold_is_sent_once_per_role() {
        let mut nom = nomination();
        assert!(nom.tally(&approvers(&[NOMINATOR])).scold_nominator);
        // Replayed reaction event: same set, no second scold.
        assert!(!nom.tally(&approvers(&[NOMINATOR])).scold_nominator);

        let update = nom.tally(&approvers(&[NOMINATOR, SUBJECT]));
        assert!(update.scold_subject);
        assert!(!update.scold_nominator);
        assert!(!nom.tally(&approvers(&[NOMINATOR, SUBJECT])).scold_subject);
    }

    #[test]
    fn uninvolved_third_reactor_commits() {
        let mut nom = nomination();
        assert!(!nom.tally(&approvers(&[NOMINATOR])).committed);
        assert!(nom.tally(&approvers(&[NOMINATOR, THIRD])).committed);
    }

    #[test]
    fn single_outside_approval_commits() {
        let mut nom = nomination();
        assert!(nom.tally(&approvers(&[THIRD])).committed);
    }

    #[test]
    fn subject_and_nominator_together_do_not_commit() {
        let mut nom = nomination();
        let update = nom.tally(&approvers(&[NOMINATOR, SUBJECT]));
        assert!(!update.committed);
        // Two interested parties need a third, outside voice.
        assert!(nom.tally(&approvers(&[NOMINATOR, SUBJECT, THIRD])).committed);
    }

    #[test]
    fn self_quote_counts_its_author_once() {
        let mut nom = Nomination::new(1, 2, NOMINATOR, NOMINATOR, 3);
        assert_eq!(nom.required_votes(&approvers(&[NOMINATOR])), 2);
        assert!(!nom.tally(&approvers(&[NOMINATOR])).committed);
        assert!(nom.tally(&approvers(&[NOMINATOR, FOURTH])).committed);
    }

    #[test]
    fn self_quote_scolds_only_the_nominator_role() {
        let mut nom = Nomination::new(1, 2, NOMINATOR, NOMINATOR, 3);
        let update = nom.tally(&approvers(&[NOMINATOR]));
        assert!(update.scold_nominator);
        assert!(!update.scold_subject);
    }

    #[test]
    fn commit_emits_no_scold() {
        let mut nom = nomination();
        let update = nom.tally(&approvers(&[SUBJECT, THIRD]));
        assert!(update.committed);
        assert!(!update.scold_subject);
    }

    #[test]
    fn formats_plain_quote() {
        assert_eq!(
            format_quote("never lift", "Kimi", None),
            "\"never lift\" — Kimi"
        );
    }

    #[test]
    fn formats_quote_with_reply_context() {
        assert_eq!(
            format_quote("no", "Kimi", Some(("Seb", "are you ok?"))),
            "> Seb: are you ok?\n\"no\" — Kimi"
        );
    }
}

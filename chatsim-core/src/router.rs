//! Channels, histories and the conversation list.
//!
//! The router owns every message ever shown to the learner. Histories are
//! append-only; the conversation list is derived from them (preview, time,
//! unread count) and keeps the most recently created channel at the front.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::script::{Media, MessageSeed};
use crate::timeline::TimelineHandle;

/// A conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// The quiz partner asking the questions.
    Partner,
    /// The supervisor commenting on each answer.
    Supervisor,
    /// Final results.
    Evaluation,
    /// Remediation material.
    Help,
}

impl ChannelId {
    pub const ALL: [ChannelId; 4] = [
        ChannelId::Partner,
        ChannelId::Supervisor,
        ChannelId::Evaluation,
        ChannelId::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelId::Partner => "partner",
            ChannelId::Supervisor => "supervisor",
            ChannelId::Evaluation => "evaluation",
            ChannelId::Help => "help",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "partner" | "nico" => Ok(ChannelId::Partner),
            "supervisor" | "jefe" | "boss" => Ok(ChannelId::Supervisor),
            "evaluation" | "eval" => Ok(ChannelId::Evaluation),
            "help" | "ayuda" => Ok(ChannelId::Help),
            other => Err(format!("Unknown channel: {other}")),
        }
    }
}

/// Unique id of a posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Sent by the learner.
    User,
    /// Sent by a scripted character.
    Ai,
    /// Context and feedback notes.
    System,
    Image,
    Document,
    Audio,
    Sticker,
    /// Card linking to another conversation.
    ContactLink,
}

impl MessageKind {
    /// Whether a message of this kind counts as unread when it arrives.
    pub fn counts_as_unread(self) -> bool {
        !matches!(self, MessageKind::User | MessageKind::System)
    }
}

/// A message before the router assigns it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: String,
    pub file_name: Option<String>,
    pub pages: Option<String>,
    pub duration: Option<String>,
    pub action_label: Option<String>,
}

impl MessageDraft {
    pub fn new(kind: MessageKind, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: timestamp.into(),
            file_name: None,
            pages: None,
            duration: None,
            action_label: None,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content, timestamp)
    }

    pub fn ai(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content, timestamp)
    }

    pub fn system(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(MessageKind::System, content, timestamp)
    }

    pub fn sticker(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(MessageKind::Sticker, content, timestamp)
    }

    pub fn contact_link(
        name: impl Into<String>,
        action_label: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let mut draft = Self::new(MessageKind::ContactLink, name, timestamp);
        draft.action_label = Some(action_label.into());
        draft
    }

    pub fn from_media(media: &Media, timestamp: impl Into<String>) -> Self {
        let mut draft = Self::new(media.kind.message_kind(), media.content.clone(), timestamp);
        draft.file_name = media.file_name.clone();
        draft.pages = media.pages.clone();
        draft.duration = media.duration.clone();
        draft
    }

    pub fn from_seed(seed: &MessageSeed) -> Self {
        let mut draft = Self::new(seed.kind, seed.content.clone(), seed.timestamp.clone());
        draft.duration = seed.duration.clone();
        draft
    }
}

/// A message stored in a channel history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    /// The timeline that produced this message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<TimelineHandle>,
}

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub id: ChannelId,
    pub name: String,
    pub avatar: String,
    pub last_preview: String,
    pub last_time: String,
    pub unread_count: u32,
}

/// What the learner is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    List,
    Chat(ChannelId),
}

/// One-line summary of a message for the conversation list.
pub fn preview_text(kind: MessageKind, content: &str, duration: Option<&str>, max_chars: usize) -> String {
    match kind {
        MessageKind::Image => "📷 Foto".to_string(),
        MessageKind::Audio => match duration {
            Some(d) => format!("🎤 Audio ({d})"),
            None => "🎤 Audio".to_string(),
        },
        MessageKind::Sticker => "💟 Sticker".to_string(),
        MessageKind::Document => format!("📄 {}", truncate(content, max_chars)),
        MessageKind::ContactLink => format!("👤 {}", truncate(content, max_chars)),
        MessageKind::User | MessageKind::Ai | MessageKind::System => truncate(content, max_chars),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Routes messages into channel histories and maintains the list view.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    histories: BTreeMap<ChannelId, Vec<ChannelMessage>>,
    entries: Vec<ChannelEntry>,
    names: BTreeMap<ChannelId, (String, String)>,
    view: View,
    next_id: u64,
    preview_chars: usize,
}

impl MessageRouter {
    pub fn new(preview_chars: usize) -> Self {
        let mut names = BTreeMap::new();
        names.insert(ChannelId::Evaluation, ("Evaluación".to_string(), "eval".to_string()));
        names.insert(ChannelId::Help, ("Ayuda".to_string(), "help".to_string()));
        Self {
            histories: BTreeMap::new(),
            entries: Vec::new(),
            names,
            view: View::List,
            next_id: 1,
            preview_chars,
        }
    }

    /// Set the display name and avatar used when a channel's entry is created.
    pub fn register(&mut self, channel: ChannelId, name: impl Into<String>, avatar: impl Into<String>) {
        self.names.insert(channel, (name.into(), avatar.into()));
    }

    /// Append a message that predates the session. Seeds never count as unread.
    pub fn seed(&mut self, channel: ChannelId, draft: MessageDraft) -> MessageId {
        self.append(channel, draft, None, false)
    }

    /// Append a message and update the conversation list.
    pub fn post(
        &mut self,
        channel: ChannelId,
        draft: MessageDraft,
        origin: Option<TimelineHandle>,
    ) -> MessageId {
        self.append(channel, draft, origin, true)
    }

    fn append(
        &mut self,
        channel: ChannelId,
        draft: MessageDraft,
        origin: Option<TimelineHandle>,
        count_unread: bool,
    ) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;

        let preview = preview_text(
            draft.kind,
            &draft.content,
            draft.duration.as_deref(),
            self.preview_chars,
        );
        let unread = count_unread
            && draft.kind.counts_as_unread()
            && self.view != View::Chat(channel);

        let message = ChannelMessage {
            id,
            kind: draft.kind,
            content: draft.content,
            timestamp: draft.timestamp,
            file_name: draft.file_name,
            pages: draft.pages,
            duration: draft.duration,
            action_label: draft.action_label,
            origin,
        };
        let last_time = message.timestamp.clone();
        self.histories.entry(channel).or_default().push(message);

        match self.entries.iter_mut().find(|e| e.id == channel) {
            Some(entry) => {
                entry.last_preview = preview;
                entry.last_time = last_time;
                if unread {
                    entry.unread_count += 1;
                }
            }
            None => {
                let (name, avatar) = self
                    .names
                    .get(&channel)
                    .cloned()
                    .unwrap_or_else(|| ("Chat".to_string(), String::new()));
                self.entries.insert(
                    0,
                    ChannelEntry {
                        id: channel,
                        name,
                        avatar,
                        last_preview: preview,
                        last_time,
                        unread_count: u32::from(unread),
                    },
                );
            }
        }

        id
    }

    /// Open a channel and mark it read.
    pub fn select(&mut self, channel: ChannelId) {
        self.view = View::Chat(channel);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == channel) {
            entry.unread_count = 0;
        }
    }

    /// Return to the conversation list.
    pub fn back(&mut self) {
        self.view = View::List;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn active(&self) -> Option<ChannelId> {
        match self.view {
            View::Chat(channel) => Some(channel),
            View::List => None,
        }
    }

    pub fn history(&self, channel: ChannelId) -> &[ChannelMessage] {
        self.histories.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_message(&self, channel: ChannelId) -> Option<&ChannelMessage> {
        self.history(channel).last()
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    pub fn entry(&self, channel: ChannelId) -> Option<&ChannelEntry> {
        self.entries.iter().find(|e| e.id == channel)
    }

    pub fn unread(&self, channel: ChannelId) -> u32 {
        self.entry(channel).map(|e| e.unread_count).unwrap_or(0)
    }

    /// Total messages across every channel.
    pub fn message_count(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }

    /// Messages produced by a given timeline.
    pub fn messages_from(&self, handle: TimelineHandle) -> usize {
        self.histories
            .values()
            .flatten()
            .filter(|m| m.origin == Some(handle))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> MessageRouter {
        let mut router = MessageRouter::new(40);
        router.register(ChannelId::Partner, "Nico (Compa)", "nico");
        router.register(ChannelId::Supervisor, "Jefatura", "jefe");
        router
    }

    #[test]
    fn test_new_channel_goes_to_front() {
        let mut router = router();
        router.post(ChannelId::Partner, MessageDraft::ai("hola", "08:12"), None);
        router.post(ChannelId::Evaluation, MessageDraft::ai("resultado", "Fin"), None);

        let ids: Vec<_> = router.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![ChannelId::Evaluation, ChannelId::Partner]);
        assert_eq!(router.entries()[0].name, "Evaluación");

        // Posting to an existing channel keeps its position.
        router.post(ChannelId::Partner, MessageDraft::ai("otra", "08:13"), None);
        assert_eq!(router.entries()[1].id, ChannelId::Partner);
    }

    #[test]
    fn test_unread_counts_skip_active_and_system() {
        let mut router = router();
        router.post(ChannelId::Partner, MessageDraft::ai("uno", "08:12"), None);
        router.post(ChannelId::Partner, MessageDraft::system("nota", "08:12"), None);
        router.post(ChannelId::Partner, MessageDraft::user("yo", "08:12"), None);
        assert_eq!(router.unread(ChannelId::Partner), 1);

        router.select(ChannelId::Partner);
        assert_eq!(router.unread(ChannelId::Partner), 0);
        router.post(ChannelId::Partner, MessageDraft::ai("dos", "08:13"), None);
        assert_eq!(router.unread(ChannelId::Partner), 0);

        router.back();
        router.post(ChannelId::Partner, MessageDraft::ai("tres", "08:14"), None);
        assert_eq!(router.unread(ChannelId::Partner), 1);
    }

    #[test]
    fn test_seeds_are_not_unread() {
        let mut router = router();
        let mut draft = MessageDraft::new(MessageKind::Audio, "nico.ogg", "08:10");
        draft.duration = Some("0:12".to_string());
        router.seed(ChannelId::Partner, draft);

        let entry = router.entry(ChannelId::Partner).unwrap();
        assert_eq!(entry.unread_count, 0);
        assert_eq!(entry.last_preview, "🎤 Audio (0:12)");
        assert_eq!(entry.last_time, "08:10");
    }

    #[test]
    fn test_preview_rules() {
        assert_eq!(preview_text(MessageKind::Image, "x.jpg", None, 40), "📷 Foto");
        assert_eq!(preview_text(MessageKind::Sticker, "s.png", None, 40), "💟 Sticker");
        assert_eq!(
            preview_text(MessageKind::ContactLink, "Evaluación", None, 40),
            "👤 Evaluación"
        );

        let long = "Habla con el Nico y recuerda enviar el informe de incidentes.";
        assert_eq!(
            preview_text(MessageKind::Ai, long, None, 40),
            "Habla con el Nico y recuerda enviar el i..."
        );
    }

    #[test]
    fn test_origin_is_recorded() {
        let mut router = router();
        let mut timeline: crate::timeline::Timeline<()> = crate::timeline::Timeline::new();
        let handle = timeline.schedule_after(0, ());

        router.post(ChannelId::Partner, MessageDraft::ai("a", ""), Some(handle));
        router.post(ChannelId::Partner, MessageDraft::ai("b", ""), None);
        assert_eq!(router.messages_from(handle), 1);
        assert_eq!(router.message_count(), 2);
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!("eval".parse::<ChannelId>(), Ok(ChannelId::Evaluation));
        assert_eq!("Nico".parse::<ChannelId>(), Ok(ChannelId::Partner));
        assert!("other".parse::<ChannelId>().is_err());
    }
}

//! Quiz script model.
//!
//! A script is an ordered list of nodes. Each node is one question from the
//! quiz partner, with a set of scored answer options. Scripts are plain JSON
//! documents and are validated once on load; the engine never mutates them.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::router::{ChannelId, MessageKind};

/// The DIAT work-accident scenario shipped with the crate.
pub const DEFAULT_SCRIPT_JSON: &str = include_str!("../data/diat.json");

/// Highest score a single option may carry.
pub const MAX_OPTION_SCORE: u8 = 2;

/// Errors from loading or validating a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Script has no nodes")]
    Empty,

    #[error("Node {node_id} has no options")]
    NoOptions { node_id: u32 },

    #[error("Duplicate node id {0}")]
    DuplicateNode(u32),

    #[error("Node {node_id} option {index}: score {score} is above {MAX_OPTION_SCORE}")]
    InvalidScore { node_id: u32, index: usize, score: u8 },

    #[error("Node {node_id} option {index}: max score {max_score} is below score {score}")]
    MaxBelowScore {
        node_id: u32,
        index: usize,
        score: u8,
        max_score: u8,
    },

    #[error("Node {node_id} requires mastery of '{topic}', which no earlier option scores")]
    UnknownMasteryTopic { node_id: u32, topic: String },
}

/// Kind of media attached to a node or option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
}

impl MediaKind {
    /// The channel message kind used to display this media.
    pub fn message_kind(self) -> MessageKind {
        match self {
            MediaKind::Image => MessageKind::Image,
            MediaKind::Document => MessageKind::Document,
            MediaKind::Audio => MessageKind::Audio,
        }
    }
}

/// Media attached to a prompt or a reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Asset path or URL.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Button style for true/false "myth" questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionStyle {
    Truth,
    Myth,
}

/// One answer the learner can pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOption {
    pub text: String,
    /// Correctness weight: 0 wrong, 1 partial, 2 best.
    pub score: u8,
    /// What the partner answers right after the choice.
    pub reaction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<OptionStyle>,
}

impl ScriptOption {
    /// Minimal option with text, score and reaction.
    pub fn new(text: impl Into<String>, score: u8, reaction: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score,
            reaction: reaction.into(),
            boss_message: None,
            feedback: None,
            media: None,
            sticker: None,
            topic: None,
            max_score: None,
            cause: None,
            recommendation: None,
            help_section: None,
            style: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_boss_message(mut self, message: impl Into<String>) -> Self {
        self.boss_message = Some(message.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_sticker(mut self, sticker: impl Into<String>) -> Self {
        self.sticker = Some(sticker.into());
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Possible score for mastery bookkeeping (defaults to 2).
    pub fn possible_score(&self) -> u8 {
        self.max_score.unwrap_or(MAX_OPTION_SCORE)
    }

    pub fn is_best(&self) -> bool {
        self.score == MAX_OPTION_SCORE
    }

    pub fn is_wrong(&self) -> bool {
        self.score == 0
    }
}

/// One question of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptNode {
    pub id: u32,
    #[serde(alias = "text")]
    pub prompt_text: String,
    /// In-story clock label shown next to the prompt.
    #[serde(default)]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    pub options: Vec<ScriptOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_mastery: Option<String>,
}

impl ScriptNode {
    pub fn new(id: u32, prompt: impl Into<String>, options: Vec<ScriptOption>) -> Self {
        Self {
            id,
            prompt_text: prompt.into(),
            time: String::new(),
            media: None,
            options,
            requires_mastery: None,
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_required_mastery(mut self, topic: impl Into<String>) -> Self {
        self.requires_mastery = Some(topic.into());
        self
    }

    /// Best score available on this node.
    pub fn best_score(&self) -> u8 {
        self.options.iter().map(|o| o.score).max().unwrap_or(0)
    }
}

/// Display identity of a conversation partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: avatar.into(),
        }
    }
}

/// A message that exists before the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSeed {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Opening sequence played after the learner's first engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intro {
    /// Delay before the first node's media is revealed.
    #[serde(default = "default_intro_media_delay")]
    pub media_delay_ms: u64,
    /// Delay before the first node's prompt is revealed.
    #[serde(default = "default_intro_prompt_delay")]
    pub prompt_delay_ms: u64,
}

fn default_intro_media_delay() -> u64 {
    5000
}

fn default_intro_prompt_delay() -> u64 {
    12000
}

impl Default for Intro {
    fn default() -> Self {
        Self {
            media_delay_ms: default_intro_media_delay(),
            prompt_delay_ms: default_intro_prompt_delay(),
        }
    }
}

/// Copy for the incoming-call interruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallScript {
    pub caller: String,
    pub icon: String,
    pub accepted_message: String,
    pub declined_message: String,
}

impl Default for CallScript {
    fn default() -> Self {
        Self {
            caller: "Jefatura".to_string(),
            icon: "📞".to_string(),
            accepted_message:
                "Gracias por contestar. ¿Cómo está el Nico? Recuerda que la DIAT no puede esperar."
                    .to_string(),
            declined_message: "Te llamé y no contestaste. Avísame apenas puedas cómo sigue el Nico."
                .to_string(),
        }
    }
}

/// An ambient "someone noticed" notification that navigates nowhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeNotice {
    pub title: String,
    #[serde(default)]
    pub icon: String,
    pub message: String,
}

/// A complete, validated quiz script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default)]
    pub title: String,
    pub partner: Persona,
    pub supervisor: Persona,
    #[serde(default)]
    pub intro: Intro,
    #[serde(default)]
    pub seed_messages: BTreeMap<ChannelId, Vec<MessageSeed>>,
    #[serde(default)]
    pub call: CallScript,
    #[serde(default)]
    pub relatives: Vec<RelativeNotice>,
    #[serde(default)]
    pub help_sections: BTreeMap<String, String>,
    pub nodes: Vec<ScriptNode>,
}

impl Script {
    /// Create a script from nodes with default personas and copy.
    pub fn from_nodes(nodes: Vec<ScriptNode>) -> Self {
        Self {
            title: String::new(),
            partner: Persona::new("Nico (Compa)", "nico"),
            supervisor: Persona::new("Jefatura", "jefe"),
            intro: Intro::default(),
            seed_messages: BTreeMap::new(),
            call: CallScript::default(),
            relatives: Vec::new(),
            help_sections: BTreeMap::new(),
            nodes,
        }
    }

    /// Parse and validate a script from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ScriptError> {
        let script: Script = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Load and validate a script file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    /// The built-in DIAT scenario.
    pub fn builtin() -> Result<Self, ScriptError> {
        Self::from_json_str(DEFAULT_SCRIPT_JSON)
    }

    /// Check every structural rule the engine relies on.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.nodes.is_empty() {
            return Err(ScriptError::Empty);
        }

        let mut seen_ids = HashSet::new();
        let mut scored_topics: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            if !seen_ids.insert(node.id) {
                return Err(ScriptError::DuplicateNode(node.id));
            }
            if node.options.is_empty() {
                return Err(ScriptError::NoOptions { node_id: node.id });
            }

            for (index, option) in node.options.iter().enumerate() {
                if option.score > MAX_OPTION_SCORE {
                    return Err(ScriptError::InvalidScore {
                        node_id: node.id,
                        index,
                        score: option.score,
                    });
                }
                if let Some(max_score) = option.max_score {
                    if max_score < option.score {
                        return Err(ScriptError::MaxBelowScore {
                            node_id: node.id,
                            index,
                            score: option.score,
                            max_score,
                        });
                    }
                }
                if let Some(topic) = option.topic.as_deref() {
                    scored_topics.insert(topic);
                }
            }

            // The gate is evaluated after this node's own answer, so its own
            // options count as "earlier".
            if let Some(topic) = node.requires_mastery.as_deref() {
                if !scored_topics.contains(topic) {
                    return Err(ScriptError::UnknownMasteryTopic {
                        node_id: node.id,
                        topic: topic.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, step: usize) -> Option<&ScriptNode> {
        self.nodes.get(step)
    }

    /// Sum of the best option of every node.
    pub fn max_score(&self) -> u32 {
        self.nodes.iter().map(|n| n.best_score() as u32).sum()
    }

    /// All topics referenced by any option, in first-appearance order.
    pub fn topics(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .flat_map(|n| n.options.iter())
            .filter_map(|o| o.topic.as_deref())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Deterministic display order of a node's options.
    ///
    /// The same `(step, seed)` pair always yields the same permutation.
    pub fn option_order(&self, step: usize, seed: u64) -> Vec<usize> {
        let count = self.node(step).map(|n| n.options.len()).unwrap_or(0);
        let mut order: Vec<usize> = (0..count).collect();
        let mut rng = StdRng::seed_from_u64(seed ^ (step as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        order.shuffle(&mut rng);
        order
    }

    pub fn help_section(&self, id: &str) -> Option<&str> {
        self.help_sections.get(id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, options: Vec<ScriptOption>) -> ScriptNode {
        ScriptNode::new(id, format!("Question {id}"), options)
    }

    #[test]
    fn test_builtin_script_is_valid() {
        let script = Script::builtin().unwrap();
        assert_eq!(script.len(), 10);
        assert_eq!(script.max_score(), 18);
        assert!(script.topics().contains(&"diat"));
        assert!(script.seed_messages.contains_key(&ChannelId::Partner));
    }

    #[test]
    fn test_empty_script_rejected() {
        let script = Script::from_nodes(vec![]);
        assert!(matches!(script.validate(), Err(ScriptError::Empty)));
    }

    #[test]
    fn test_node_without_options_rejected() {
        let script = Script::from_nodes(vec![node(1, vec![])]);
        assert!(matches!(
            script.validate(),
            Err(ScriptError::NoOptions { node_id: 1 })
        ));
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let script = Script::from_nodes(vec![node(1, vec![ScriptOption::new("a", 3, "r")])]);
        assert!(matches!(
            script.validate(),
            Err(ScriptError::InvalidScore { score: 3, .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let script = Script::from_nodes(vec![
            node(1, vec![ScriptOption::new("a", 2, "r")]),
            node(1, vec![ScriptOption::new("b", 2, "r")]),
        ]);
        assert!(matches!(script.validate(), Err(ScriptError::DuplicateNode(1))));
    }

    #[test]
    fn test_mastery_topic_must_be_scored_first() {
        let script = Script::from_nodes(vec![
            node(1, vec![ScriptOption::new("a", 2, "r")]).with_required_mastery("diat"),
        ]);
        assert!(matches!(
            script.validate(),
            Err(ScriptError::UnknownMasteryTopic { .. })
        ));

        let script = Script::from_nodes(vec![node(
            1,
            vec![ScriptOption::new("a", 2, "r").with_topic("diat")],
        )
        .with_required_mastery("diat")]);
        assert!(script.validate().is_ok());
    }

    #[test]
    fn test_option_order_is_a_stable_permutation() {
        let script = Script::builtin().unwrap();
        let first = script.option_order(0, 42);
        let again = script.option_order(0, 42);
        assert_eq!(first, again);

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2]);
    }

    #[test]
    fn test_text_alias_and_defaults() {
        let json = r#"{
            "partner": {"name": "Nico"},
            "supervisor": {"name": "Jefa"},
            "nodes": [{"id": 1, "text": "¿Qué hago?", "options": [
                {"text": "Avisar", "score": 2, "reaction": "Gracias"}
            ]}]
        }"#;
        let script = Script::from_json_str(json).unwrap();
        assert_eq!(script.nodes[0].prompt_text, "¿Qué hago?");
        assert_eq!(script.nodes[0].options[0].possible_score(), 2);
        assert_eq!(script.intro.prompt_delay_ms, 12000);
    }
}

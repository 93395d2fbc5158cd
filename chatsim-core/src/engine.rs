//! The chat-simulation engine.
//!
//! `Engine` is the single owner of every piece of session state: the script,
//! the session state machine, channel histories, the timeline, the call
//! interruption and the notification slot. Front-ends call its operations and
//! drive it with [`Engine::tick`]; everything it does in response is visible
//! through accessors and [`Engine::drain_events`].
//!
//! One learner action becomes a declarative list of [`Beat`]s on the
//! timeline. Each beat is applied when its due time is reached, and every
//! beat is checked against the session epoch before it touches anything.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::evaluation::Evaluation;
use crate::interrupt::{CallOutcome, InterruptScheduler, InterruptState};
use crate::notify::{
    AudioCapability, Banner, BannerTarget, CompletionSignal, CompletionSink, Cue, Dispatcher,
    LogSink, Particle, SilentAudio, SoundKind,
};
use crate::router::{ChannelId, MessageDraft, MessageId, MessageRouter, View};
use crate::script::{Script, ScriptError, ScriptNode, ScriptOption};
use crate::session::{SessionMode, SessionState, SessionStatus};
use crate::timeline::{Fired, Step, Timeline, TimelineHandle};

pub const TERMINATION_MESSAGE: &str = "Gracias por participar. Puedes cerrar esta ventana.";
pub const RESULTS_HANDOFF_MESSAGE: &str = "Toma, te mando este contacto, revisa el mensaje";
pub const RESULTS_BANNER_MESSAGE: &str = "Tus resultados están listos.";
const EVALUATION_TITLE: &str = "Evaluación";
const SUPERVISOR_ICON: &str = "👩‍💼";

/// Something observable that happened inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    StatusChanged(SessionStatus),
    MessagePosted { channel: ChannelId, id: MessageId },
    Typing { channel: ChannelId, active: bool },
    OptionsOffered { step: usize },
    BannerShown(Banner),
    Cue(Cue),
    Confetti,
    CallRinging { step: usize },
    CallEnded(CallOutcome),
    Remediation { topic: String },
    MasteryBlocked { step: usize, topic: String },
    Completed(CompletionSignal),
}

/// One dramatization step.
#[derive(Debug, Clone, PartialEq)]
enum Beat {
    Typing(bool),
    Post {
        channel: ChannelId,
        draft: MessageDraft,
        sound: Option<SoundKind>,
        vibrate: bool,
    },
    Supervisor { context: String, message: String },
    Feedback { step: usize, option_index: usize },
    Resolve { step: usize },
    Present { step: usize, with_media: bool },
    Finish,
    Results,
    Deliver,
}

/// Composition root for one learner's session.
pub struct Engine {
    config: EngineConfig,
    script: Option<Script>,
    state: SessionState,
    router: MessageRouter,
    timeline: Timeline<Beat>,
    active: Option<TimelineHandle>,
    calls: InterruptScheduler,
    dispatcher: Dispatcher,
    typing: Option<ChannelId>,
    rng: StdRng,
    audio: Box<dyn AudioCapability>,
    sink: Box<dyn CompletionSink>,
    events: Vec<EngineEvent>,
}

impl Engine {
    /// An idle engine with no script.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            router: MessageRouter::new(config.preview_chars),
            calls: InterruptScheduler::new(config.interrupt.clone()),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            script: None,
            state: SessionState::new(),
            timeline: Timeline::new(),
            active: None,
            dispatcher: Dispatcher::new(),
            typing: None,
            audio: Box::new(SilentAudio),
            sink: Box::new(LogSink),
            events: Vec::new(),
        }
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioCapability>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_completion_sink(mut self, sink: Box<dyn CompletionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Engine with a script already loaded.
    pub fn with_script(config: EngineConfig, script: Script) -> Result<Self, ScriptError> {
        let mut engine = Self::new(config);
        engine.load_script(script)?;
        Ok(engine)
    }

    // ------------------------------------------------------------------
    // Loading and lifecycle
    // ------------------------------------------------------------------

    /// Install a script and move to `ready`. An invalid script leaves the
    /// engine `idle` with no script.
    pub fn load_script(&mut self, script: Script) -> Result<(), ScriptError> {
        match script.validate() {
            Ok(()) => {
                info!(title = %script.title, nodes = script.len(), "Script loaded");
                self.script = Some(script);
                self.rebuild();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Script rejected, staying idle");
                self.script = None;
                self.rebuild();
                Err(e)
            }
        }
    }

    /// Load a script file. On failure the engine stays `idle`.
    pub async fn load_script_file(&mut self, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        match Script::load(path.as_ref()).await {
            Ok(script) => self.load_script(script),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "Script failed to load");
                self.script = None;
                self.rebuild();
                Err(e)
            }
        }
    }

    /// Replace all state with a fresh session. Always succeeds.
    pub fn reset(&mut self) {
        info!(session = %self.state.session_id, status = %self.state.status, "Session reset");
        self.rebuild();
    }

    fn rebuild(&mut self) {
        // Invalidate pending steps before replacing any state.
        self.timeline.cancel_all();
        self.active = None;
        // Message ids restart with the new router.
        self.events.clear();
        self.state = self.state.next_epoch();
        self.calls.reset();
        self.dispatcher.clear();
        self.typing = None;
        self.rng = StdRng::seed_from_u64(self.config.seed);

        let mut router = MessageRouter::new(self.config.preview_chars);
        if let Some(script) = &self.script {
            router.register(ChannelId::Partner, &script.partner.name, &script.partner.avatar);
            router.register(ChannelId::Supervisor, &script.supervisor.name, &script.supervisor.avatar);
            // New entries go to the front, so seed in reverse to list the
            // partner first.
            for (channel, seeds) in script.seed_messages.iter().rev() {
                for seed in seeds {
                    router.seed(*channel, MessageDraft::from_seed(seed));
                }
            }
        }
        self.router = router;

        if self.script.is_some() && self.state.mark_ready() {
            self.events.push(EngineEvent::StatusChanged(SessionStatus::Ready));
            self.show_first_contact();
        }
    }

    fn show_first_contact(&mut self) {
        let Some(script) = &self.script else {
            return;
        };
        let message = self
            .router
            .entry(ChannelId::Partner)
            .map(|e| e.last_preview.clone())
            .unwrap_or_else(|| "Nuevo mensaje".to_string());
        let banner = Banner::new(
            script.partner.name.clone(),
            "💬",
            message,
            BannerTarget::Channel(ChannelId::Partner),
        )
        .sticky();
        self.show_banner(banner);
    }

    pub fn select_mode(&mut self, mode: SessionMode) -> bool {
        let accepted = self.state.select_mode(mode);
        if !accepted {
            debug!(?mode, status = %self.state.status, "Mode change ignored");
        }
        accepted
    }

    /// The learner's first engagement: `ready → playing` and the intro.
    pub fn start(&mut self) -> bool {
        if !self.state.begin(self.config.default_mode) {
            debug!(status = %self.state.status, "Start ignored");
            return false;
        }
        info!(
            session = %self.state.session_id,
            mode = ?self.state.mode,
            "Session started"
        );
        self.events.push(EngineEvent::StatusChanged(SessionStatus::Playing));

        if self.dispatcher.banner().is_some_and(|b| b.sticky) {
            self.dispatcher.dismiss();
        }

        let Some(script) = &self.script else {
            return true;
        };
        let intro = script.intro.clone();
        let mut beats = Vec::new();
        if let Some(node) = script.node(0) {
            if let Some(media) = &node.media {
                beats.push(Step::new(
                    intro.media_delay_ms,
                    Beat::Post {
                        channel: ChannelId::Partner,
                        draft: MessageDraft::from_media(media, node.time.clone()),
                        sound: Some(SoundKind::Received),
                        vibrate: true,
                    },
                ));
            }
            beats.push(Step::new(
                intro.prompt_delay_ms,
                Beat::Present {
                    step: 0,
                    with_media: false,
                },
            ));
        }
        self.replace_active(beats);
        true
    }

    /// Any non-terminal state → `terminated`.
    pub fn terminate(&mut self) -> bool {
        if !self.state.terminate() {
            debug!(status = %self.state.status, "Terminate ignored");
            return false;
        }
        self.timeline.cancel_all();
        self.active = None;
        self.calls.disarm();
        if self.calls.resolve(CallOutcome::Dismissed).is_some() {
            self.events.push(EngineEvent::CallEnded(CallOutcome::Dismissed));
        }
        self.set_typing(None);

        info!(session = %self.state.session_id, score = self.state.score, "Session terminated");
        self.post(
            ChannelId::Evaluation,
            MessageDraft::system(TERMINATION_MESSAGE, "Fin"),
            None,
        );
        self.events.push(EngineEvent::StatusChanged(SessionStatus::Terminated));
        true
    }

    // ------------------------------------------------------------------
    // Answers
    // ------------------------------------------------------------------

    /// Options of the current node in display order, paired with their
    /// index in the script. Empty unless an answer is awaited.
    pub fn current_options(&self) -> Vec<(usize, &ScriptOption)> {
        if !self.state.is_awaiting_answer() {
            return Vec::new();
        }
        let Some(node) = self.current_node() else {
            return Vec::new();
        };
        let order: Vec<usize> = if self.config.shuffle_options {
            self.script
                .as_ref()
                .map(|s| s.option_order(self.state.step, self.config.seed))
                .unwrap_or_default()
        } else {
            (0..node.options.len()).collect()
        };
        order
            .into_iter()
            .filter_map(|i| node.options.get(i).map(|o| (i, o)))
            .collect()
    }

    /// Answer the current node with the option at `option_index` (script
    /// order). Returns false if no answer is awaited.
    pub fn submit_answer(&mut self, option_index: usize) -> bool {
        let Some(node) = self.current_node() else {
            debug!("Answer ignored: no current node");
            return false;
        };
        let Some(option) = node.options.get(option_index).cloned() else {
            debug!(option_index, "Answer ignored: no such option");
            return false;
        };
        let node_id = node.id;
        let time = node.time.clone();
        let step = self.state.step;

        if !self.state.record_answer(node_id, option_index, &option) {
            debug!(status = %self.state.status, step, "Answer ignored: not awaiting");
            return false;
        }
        debug!(step, option_index, score = option.score, "Answer accepted");

        self.calls.disarm();
        if self.calls.resolve(CallOutcome::Dismissed).is_some() {
            self.events.push(EngineEvent::CallEnded(CallOutcome::Dismissed));
        }

        self.post(ChannelId::Partner, MessageDraft::user(option.text.clone(), time.clone()), None);
        self.play(SoundKind::Sent);

        let beats = self.answer_beats(step, option_index, &option, &time);
        self.replace_active(beats);
        true
    }

    fn answer_beats(
        &self,
        step: usize,
        option_index: usize,
        option: &ScriptOption,
        time: &str,
    ) -> Vec<Step<Beat>> {
        let t = &self.config.timings;
        let practice = self.mode() == SessionMode::Practice;
        let reaction = t.reaction_ms;
        let supervisor = reaction.saturating_add(t.supervisor_after_reaction_ms);
        let feedback = supervisor.saturating_add(t.feedback_after_supervisor_ms);

        let mut beats = vec![
            Step::new(0, Beat::Typing(true)),
            Step::new(reaction, Beat::Typing(false)),
            Step::new(
                reaction,
                Beat::Post {
                    channel: ChannelId::Partner,
                    draft: MessageDraft::ai(option.reaction.clone(), time),
                    sound: Some(SoundKind::Received),
                    vibrate: false,
                },
            ),
        ];

        if let Some(sticker) = &option.sticker {
            beats.push(Step::new(
                reaction.saturating_add(t.sticker_after_reaction_ms),
                Beat::Post {
                    channel: ChannelId::Partner,
                    draft: MessageDraft::sticker(sticker.clone(), time),
                    sound: None,
                    vibrate: false,
                },
            ));
        }
        if let Some(media) = &option.media {
            beats.push(Step::new(
                reaction.saturating_add(t.media_after_reaction_ms),
                Beat::Post {
                    channel: ChannelId::Partner,
                    draft: MessageDraft::from_media(media, time),
                    sound: None,
                    vibrate: false,
                },
            ));
        }
        if practice {
            if let (Some(message), Some(node)) = (&option.boss_message, self.current_node()) {
                beats.push(Step::new(
                    supervisor,
                    Beat::Supervisor {
                        context: format!("❓ Contexto: \"{}\"", node.prompt_text),
                        message: message.clone(),
                    },
                ));
            }
        }
        beats.push(Step::new(feedback, Beat::Feedback { step, option_index }));
        beats.push(Step::new(feedback, Beat::Resolve { step }));
        beats
    }

    // ------------------------------------------------------------------
    // Navigation, calls and banners
    // ------------------------------------------------------------------

    pub fn select_channel(&mut self, channel: ChannelId) {
        self.router.select(channel);
    }

    pub fn back(&mut self) {
        self.router.back();
    }

    pub fn answer_call(&mut self) -> bool {
        if self.calls.resolve(CallOutcome::Answered).is_none() {
            debug!("No call to answer");
            return false;
        }
        let message = self.call_copy(|c| c.accepted_message.clone());
        self.post(ChannelId::Supervisor, MessageDraft::ai(message, "Ahora"), None);
        let bonus = self.calls.bonus();
        self.state.add_bonus(bonus);
        self.router.select(ChannelId::Supervisor);
        info!(bonus, score = self.state.score, "Call answered");
        self.events.push(EngineEvent::CallEnded(CallOutcome::Answered));
        true
    }

    pub fn decline_call(&mut self) -> bool {
        if self.calls.resolve(CallOutcome::Declined).is_none() {
            debug!("No call to decline");
            return false;
        }
        let message = self.call_copy(|c| c.declined_message.clone());
        self.post(ChannelId::Supervisor, MessageDraft::ai(message, "Ahora"), None);
        info!("Call declined");
        self.events.push(EngineEvent::CallEnded(CallOutcome::Declined));
        true
    }

    fn call_copy(&self, pick: impl Fn(&crate::script::CallScript) -> String) -> String {
        match &self.script {
            Some(script) => pick(&script.call),
            None => pick(&crate::script::CallScript::default()),
        }
    }

    /// Follow the visible banner. Ambient banners only close.
    pub fn click_banner(&mut self) -> Option<BannerTarget> {
        let target = self.dispatcher.click()?;
        if let BannerTarget::Channel(channel) = target {
            self.router.select(channel);
        }
        Some(target)
    }

    pub fn dismiss_banner(&mut self) {
        self.dispatcher.dismiss();
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    pub fn now(&self) -> u64 {
        self.timeline.now()
    }

    /// Run everything due up to `now_ms` (absolute virtual time).
    pub fn tick(&mut self, now_ms: u64) {
        loop {
            let step_due = self.timeline.next_due();
            let call_due = self.call_due();

            match (step_due, call_due) {
                (_, Some(call)) if call <= now_ms && step_due.map_or(true, |s| call < s) => {
                    self.timeline.settle_at(call);
                    self.ring(call);
                }
                (Some(s), _) if s <= now_ms => {
                    if let Some(fired) = self.timeline.pop_due(now_ms) {
                        self.apply(fired);
                    }
                }
                _ => break,
            }
        }
        self.timeline.settle_at(now_ms);
        self.dispatcher.tick(now_ms);
    }

    pub fn advance(&mut self, delta_ms: u64) {
        self.tick(self.now().saturating_add(delta_ms));
    }

    /// Earliest moment something is scheduled to happen.
    pub fn next_due(&self) -> Option<u64> {
        match (self.timeline.next_due(), self.call_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Due time of the next dramatization step, ignoring the call timer.
    pub fn next_step_due(&self) -> Option<u64> {
        self.timeline.next_due()
    }

    /// Whether dramatization steps are still pending.
    pub fn is_dramatizing(&self) -> bool {
        !self.timeline.is_empty()
    }

    fn call_due(&self) -> Option<u64> {
        if self.state.status == SessionStatus::Playing {
            self.calls.due_ms()
        } else {
            None
        }
    }

    fn ring(&mut self, now_ms: u64) {
        if let Some(step) = self.calls.poll(now_ms) {
            info!(step, "Incoming call");
            self.play(SoundKind::Notify);
            self.vibrate();
            self.events.push(EngineEvent::CallRinging { step });
        }
    }

    fn replace_active(&mut self, beats: Vec<Step<Beat>>) {
        if let Some(previous) = self.active.take() {
            let dropped = self.timeline.cancel(previous);
            if dropped > 0 {
                debug!(dropped, "Stale steps cancelled");
            }
        }
        self.active = Some(self.timeline.schedule(beats));
    }

    fn apply(&mut self, fired: Fired<Beat>) {
        if fired.epoch != self.state.epoch {
            debug!(epoch = fired.epoch, current = self.state.epoch, "Stale step dropped");
            return;
        }
        let origin = Some(fired.handle);
        debug!(due = fired.due_ms, beat = ?fired.action, "Step fired");

        match fired.action {
            Beat::Typing(active) => {
                self.set_typing(active.then_some(ChannelId::Partner));
            }
            Beat::Post {
                channel,
                draft,
                sound,
                vibrate,
            } => {
                self.post(channel, draft, origin);
                if let Some(sound) = sound {
                    self.play(sound);
                }
                if vibrate {
                    self.vibrate();
                }
            }
            Beat::Supervisor { context, message } => {
                self.post(ChannelId::Supervisor, MessageDraft::system(context, "Ahora"), origin);
                self.post(ChannelId::Supervisor, MessageDraft::ai(message.clone(), "Ahora"), origin);
                self.play(SoundKind::Notify);
                let title = self
                    .script
                    .as_ref()
                    .map(|s| s.supervisor.name.to_uppercase())
                    .unwrap_or_default();
                self.show_banner(Banner::new(
                    title,
                    SUPERVISOR_ICON,
                    message,
                    BannerTarget::Channel(ChannelId::Supervisor),
                ));
            }
            Beat::Feedback { step, option_index } => self.feedback(step, option_index, origin),
            Beat::Resolve { step } => self.resolve(step),
            Beat::Present { step, with_media } => self.present(step, with_media, origin),
            Beat::Finish => {
                let len = self.script.as_ref().map(Script::len).unwrap_or(0);
                if !self.state.advance(len) && self.state.status == SessionStatus::Finished {
                    self.calls.disarm();
                    self.set_typing(None);
                    info!(
                        session = %self.state.session_id,
                        score = self.state.score,
                        "Session finished"
                    );
                    self.events.push(EngineEvent::StatusChanged(SessionStatus::Finished));
                }
            }
            Beat::Results => {
                let evaluation = self.evaluation();
                self.post(
                    ChannelId::Evaluation,
                    MessageDraft::ai(evaluation.render(), "Ahora"),
                    origin,
                );
                self.post(
                    ChannelId::Partner,
                    MessageDraft::ai(RESULTS_HANDOFF_MESSAGE, "Ahora"),
                    origin,
                );
                self.play(SoundKind::Received);
            }
            Beat::Deliver => self.deliver(origin),
        }
    }

    fn feedback(&mut self, step: usize, option_index: usize, origin: Option<TimelineHandle>) {
        if self.mode() != SessionMode::Practice {
            return;
        }
        let Some(node) = self.script.as_ref().and_then(|s| s.node(step)) else {
            return;
        };
        let Some(option) = node.options.get(option_index).cloned() else {
            return;
        };
        let time = node.time.clone();

        if let Some(text) = &option.feedback {
            self.post(ChannelId::Partner, MessageDraft::system(text.clone(), time.clone()), origin);
        }

        if option.is_best() {
            let now = self.now();
            let notify = &self.config.notify;
            self.dispatcher
                .burst_confetti(&mut self.rng, notify.confetti_particles, now, notify.confetti_ms);
            self.events.push(EngineEvent::Confetti);
        } else if option.is_wrong() && option.possible_score() > 0 {
            self.vibrate();
            self.maybe_show_relative();
        }

        if let Some(topic) = option.topic.clone() {
            self.maybe_remediate(&topic, &option, &time, origin);
        }
    }

    fn maybe_show_relative(&mut self) {
        // Out-of-range chances only reach here through the builders.
        let chance = self.config.notify.relative_chance;
        let chance = if chance.is_nan() { 0.0 } else { chance.clamp(0.0, 1.0) };
        let Some(script) = &self.script else {
            return;
        };
        if script.relatives.is_empty() || !self.rng.gen_bool(chance) {
            return;
        }
        if let Some(relative) = script.relatives.choose(&mut self.rng).cloned() {
            self.play(SoundKind::Notify);
            self.show_banner(Banner::new(
                relative.title,
                relative.icon,
                relative.message,
                BannerTarget::Ambient,
            ));
        }
    }

    fn maybe_remediate(
        &mut self,
        topic: &str,
        option: &ScriptOption,
        time: &str,
        origin: Option<TimelineHandle>,
    ) {
        if self.state.remediated_topics.contains(topic)
            || !self.needs_remediation(topic)
        {
            return;
        }
        self.state.remediated_topics.insert(topic.to_string());

        let mut lines = vec![format!("📚 **Refuerzo: {topic}**")];
        if let Some(cause) = &option.cause {
            lines.push(format!("Causa: {cause}"));
        }
        if let Some(recommendation) = &option.recommendation {
            lines.push(format!("Recomendación: {recommendation}"));
        }
        let section = option
            .help_section
            .as_deref()
            .or(Some(topic))
            .and_then(|id| self.script.as_ref().and_then(|s| s.help_section(id)))
            .map(str::to_string);
        if let Some(text) = section {
            lines.push(text);
        }

        info!(topic, "Remediation posted");
        self.post(ChannelId::Help, MessageDraft::ai(lines.join("\n"), time), origin);
        self.events.push(EngineEvent::Remediation {
            topic: topic.to_string(),
        });
    }

    fn resolve(&mut self, step: usize) {
        if self.state.status != SessionStatus::Playing || self.state.step != step {
            debug!(step, current = self.state.step, "Resolve ignored");
            return;
        }
        let Some(script) = &self.script else {
            return;
        };
        let len = script.len();
        let gate = script
            .node(step)
            .and_then(|n| n.requires_mastery.clone())
            .filter(|_| self.config.mastery_gate && self.mode() == SessionMode::Practice);
        let t = self.config.timings.clone();

        if let Some(topic) = gate {
            if !self.state.mastery_met(&topic, self.config.mastery_threshold) {
                info!(step, topic = %topic, "Mastery gate holds step");
                let help = script
                    .help_section(&topic)
                    .map(|h| format!("\n{h}"))
                    .unwrap_or_default();
                let time = script.node(step).map(|n| n.time.clone()).unwrap_or_default();
                self.post(
                    ChannelId::Partner,
                    MessageDraft::system(
                        format!("📚 Antes de seguir, repasemos este punto e inténtalo otra vez.{help}"),
                        time,
                    ),
                    None,
                );
                self.events.push(EngineEvent::MasteryBlocked { step, topic });
                self.replace_active(Self::reveal_beats(&t, step));
                return;
            }
        }

        if step + 1 < len {
            self.state.advance(len);
            self.replace_active(Self::reveal_beats(&t, step + 1));
        } else {
            let results = t.finish_delay_ms.saturating_add(t.evaluation_delay_ms);
            self.replace_active(vec![
                Step::new(t.finish_delay_ms, Beat::Finish),
                Step::new(results, Beat::Results),
                Step::new(results.saturating_add(t.results_link_delay_ms), Beat::Deliver),
            ]);
        }
    }

    fn reveal_beats(t: &crate::config::Timings, step: usize) -> Vec<Step<Beat>> {
        let shown = t.next_pre_delay_ms.saturating_add(t.next_typing_ms);
        vec![
            Step::new(t.next_pre_delay_ms, Beat::Typing(true)),
            Step::new(shown, Beat::Typing(false)),
            Step::new(
                shown,
                Beat::Present {
                    step,
                    with_media: true,
                },
            ),
        ]
    }

    fn present(&mut self, step: usize, with_media: bool, origin: Option<TimelineHandle>) {
        if self.state.status != SessionStatus::Playing || self.state.step != step {
            debug!(step, "Present ignored");
            return;
        }
        let Some(node) = self.script.as_ref().and_then(|s| s.node(step)).cloned() else {
            return;
        };
        if with_media {
            if let Some(media) = &node.media {
                self.post(ChannelId::Partner, MessageDraft::from_media(media, node.time.clone()), origin);
            }
        }
        self.post(
            ChannelId::Partner,
            MessageDraft::ai(node.prompt_text.clone(), node.time.clone()),
            origin,
        );
        self.play(SoundKind::Received);

        self.state.offer();
        self.calls.arm(step, self.now());
        self.events.push(EngineEvent::OptionsOffered { step });
    }

    fn deliver(&mut self, origin: Option<TimelineHandle>) {
        self.post(
            ChannelId::Partner,
            MessageDraft::contact_link(EVALUATION_TITLE, "Ver mensaje", "Ahora"),
            origin,
        );
        self.play(SoundKind::Notify);
        self.show_banner(Banner::new(
            EVALUATION_TITLE,
            "✅",
            RESULTS_BANNER_MESSAGE,
            BannerTarget::Channel(ChannelId::Evaluation),
        ));

        let score = self.state.score;
        if score >= self.config.passing_score && !self.state.completion_emitted {
            self.state.completion_emitted = true;
            let signal = CompletionSignal {
                session_id: self.state.session_id,
                score,
                total: self.config.total_score,
            };
            self.sink.complete(&signal);
            self.events.push(EngineEvent::Completed(signal));
        }
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    fn post(&mut self, channel: ChannelId, draft: MessageDraft, origin: Option<TimelineHandle>) {
        let id = self.router.post(channel, draft, origin);
        self.events.push(EngineEvent::MessagePosted { channel, id });
    }

    fn set_typing(&mut self, channel: Option<ChannelId>) {
        if self.typing == channel {
            return;
        }
        if let Some(previous) = self.typing {
            self.events.push(EngineEvent::Typing {
                channel: previous,
                active: false,
            });
        }
        if let Some(channel) = channel {
            self.events.push(EngineEvent::Typing {
                channel,
                active: true,
            });
        }
        self.typing = channel;
    }

    fn play(&mut self, sound: SoundKind) {
        if let Err(e) = self.audio.play(sound) {
            warn!(?sound, error = %e, "Sound playback failed");
        }
        self.events.push(EngineEvent::Cue(Cue::Sound(sound)));
    }

    fn vibrate(&mut self) {
        let duration = self.config.notify.vibrate_ms;
        if let Err(e) = self.audio.vibrate(duration) {
            warn!(error = %e, "Vibration failed");
        }
        self.dispatcher.start_vibration(self.now(), duration);
        self.events.push(EngineEvent::Cue(Cue::Vibrate(duration)));
    }

    fn show_banner(&mut self, banner: Banner) {
        let now = self.now();
        self.dispatcher
            .show(banner.clone(), now, self.config.notify.banner_ms);
        self.events.push(EngineEvent::BannerShown(banner));
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn mode(&self) -> SessionMode {
        self.state.mode_or(self.config.default_mode)
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn view(&self) -> View {
        self.router.view()
    }

    pub fn current_node(&self) -> Option<&ScriptNode> {
        self.script.as_ref()?.node(self.state.step)
    }

    /// Channel the partner is currently typing in.
    pub fn typing(&self) -> Option<ChannelId> {
        self.typing
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.dispatcher.banner()
    }

    pub fn confetti(&self) -> &[Particle] {
        self.dispatcher.confetti()
    }

    pub fn is_vibrating(&self) -> bool {
        self.dispatcher.is_vibrating(self.now())
    }

    pub fn call_state(&self) -> InterruptState {
        self.calls.state()
    }

    pub fn caller(&self) -> (String, String) {
        (
            self.call_copy(|c| c.caller.clone()),
            self.call_copy(|c| c.icon.clone()),
        )
    }

    pub fn needs_remediation(&self, topic: &str) -> bool {
        self.state
            .needs_remediation(topic, self.config.mastery_threshold)
    }

    /// Evaluation of the current score.
    pub fn evaluation(&self) -> Evaluation {
        Evaluation::new(
            self.state.score,
            self.config.total_score,
            self.config.passing_score,
        )
        .with_topics(self.state.topic_scores.clone())
    }

    /// Take every event recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timings;

    fn node(id: u32, options: Vec<ScriptOption>) -> ScriptNode {
        ScriptNode::new(id, format!("Pregunta {id}"), options).with_time("08:12")
    }

    fn engine(nodes: Vec<ScriptNode>) -> Engine {
        let config = EngineConfig::new().without_interrupt();
        Engine::with_script(config, Script::from_nodes(nodes)).unwrap()
    }

    fn playing(nodes: Vec<ScriptNode>) -> Engine {
        let mut engine = engine(nodes);
        assert!(engine.start());
        engine.tick(12_000);
        engine
    }

    #[test]
    fn test_load_moves_to_ready() {
        let engine = engine(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        assert_eq!(engine.status(), SessionStatus::Ready);
        assert!(engine.banner().is_some_and(|b| b.sticky));
    }

    #[test]
    fn test_invalid_script_stays_idle() {
        let mut engine = Engine::new(EngineConfig::default());
        assert!(engine.load_script(Script::from_nodes(vec![])).is_err());
        assert_eq!(engine.status(), SessionStatus::Idle);
        assert!(!engine.start());
        assert!(!engine.submit_answer(0));
    }

    #[test]
    fn test_intro_reveals_first_prompt() {
        let mut engine = engine(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        engine.start();
        assert!(engine.current_options().is_empty());

        engine.tick(11_999);
        assert!(engine.current_options().is_empty());
        engine.tick(12_000);
        assert_eq!(engine.current_options().len(), 1);
        assert_eq!(
            engine.router().last_message(ChannelId::Partner).map(|m| m.content.as_str()),
            Some("Pregunta 1")
        );
    }

    #[test]
    fn test_double_start_is_noop() {
        let mut engine = engine(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        assert!(engine.start());
        assert!(!engine.start());
    }

    #[test]
    fn test_answer_sequence_order() {
        let option = ScriptOption::new("Avisar", 2, "Gracias")
            .with_boss_message("Bien")
            .with_feedback("+2");
        let mut engine = playing(vec![node(1, vec![option]), node(2, vec![ScriptOption::new("b", 1, "ok")])]);

        assert!(engine.submit_answer(0));
        assert!(!engine.submit_answer(0));
        assert_eq!(engine.typing(), None);
        engine.advance(0);
        assert_eq!(engine.typing(), Some(ChannelId::Partner));

        engine.advance(1500);
        assert_eq!(engine.typing(), None);
        assert_eq!(engine.router().history(ChannelId::Supervisor).len(), 0);

        engine.advance(1500);
        assert_eq!(engine.router().history(ChannelId::Supervisor).len(), 2);
        assert!(engine.banner().is_some_and(|b| b.title == "JEFATURA"));

        engine.advance(2500);
        let partner: Vec<_> = engine
            .router()
            .history(ChannelId::Partner)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(partner, vec!["Pregunta 1", "Avisar", "Gracias", "+2"]);
        assert_eq!(engine.state().step, 1);
        assert!(engine.current_options().is_empty());

        engine.advance(4000);
        assert_eq!(engine.current_options().len(), 1);
    }

    #[test]
    fn test_evaluation_mode_is_silent() {
        let option = ScriptOption::new("Avisar", 2, "Gracias")
            .with_boss_message("Bien")
            .with_feedback("+2");
        let mut engine = engine(vec![node(1, vec![option])]);
        engine.select_mode(SessionMode::Evaluation);
        engine.start();
        engine.tick(12_000);
        engine.submit_answer(0);
        engine.advance(10_000);

        assert!(engine.router().history(ChannelId::Supervisor).is_empty());
        assert!(!engine
            .router()
            .history(ChannelId::Partner)
            .iter()
            .any(|m| m.content == "+2"));
        assert_eq!(engine.state().score, 2);
    }

    #[test]
    fn test_mastery_gate_repeats_node() {
        let gated = node(
            1,
            vec![
                ScriptOption::new("mal", 0, "uy").with_topic("diat"),
                ScriptOption::new("bien", 2, "ok").with_topic("diat"),
            ],
        )
        .with_required_mastery("diat");
        let config = EngineConfig::new()
            .without_interrupt()
            .with_timings(Timings::instant())
            .with_mastery_gate(0.8);
        let mut script = Script::from_nodes(vec![gated, node(2, vec![ScriptOption::new("x", 2, "y")])]);
        script.intro.media_delay_ms = 0;
        script.intro.prompt_delay_ms = 0;
        let mut engine = Engine::with_script(config, script).unwrap();
        engine.start();
        engine.tick(0);

        assert!(engine.submit_answer(0));
        engine.tick(0);
        assert_eq!(engine.state().step, 0);
        assert!(engine
            .drain_events()
            .iter()
            .any(|e| matches!(e, EngineEvent::MasteryBlocked { step: 0, .. })));
        assert_eq!(engine.current_options().len(), 2);

        // 2 of 4 is still below 0.8, so the node comes back again.
        assert!(engine.submit_answer(1));
        engine.tick(0);
        assert_eq!(engine.state().step, 0);

        // A second submit before the node is re-presented is ignored.
        assert!(!engine.submit_answer(1));

        // 4/6 and 6/8 still hold; 8/10 reaches the threshold.
        for _ in 0..3 {
            assert!(engine.submit_answer(1));
            engine.tick(0);
        }
        assert_eq!(engine.state().step, 1);
    }

    #[test]
    fn test_terminate_cancels_and_posts_farewell() {
        let mut engine = playing(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        engine.submit_answer(0);
        assert!(engine.terminate());
        assert!(!engine.terminate());
        engine.advance(60_000);

        assert_eq!(engine.status(), SessionStatus::Terminated);
        let farewell = engine.router().last_message(ChannelId::Evaluation).unwrap();
        assert_eq!(farewell.content, TERMINATION_MESSAGE);
        assert_eq!(engine.router().history(ChannelId::Partner).len(), 2);
    }

    #[test]
    fn test_banner_click_navigates() {
        let mut engine = engine(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        assert_eq!(
            engine.click_banner(),
            Some(BannerTarget::Channel(ChannelId::Partner))
        );
        assert_eq!(engine.view(), View::Chat(ChannelId::Partner));
        assert_eq!(engine.click_banner(), None);
    }

    fn script_without_intro(nodes: Vec<ScriptNode>) -> Script {
        let mut script = Script::from_nodes(nodes);
        script.intro.media_delay_ms = 0;
        script.intro.prompt_delay_ms = 0;
        script
    }

    #[test]
    fn test_relative_chance_above_one_is_clamped() {
        let config = EngineConfig::new()
            .without_interrupt()
            .with_timings(Timings::instant())
            .with_notify(crate::config::NotifyConfig {
                relative_chance: 1.5,
                ..Default::default()
            });
        let mut script = script_without_intro(vec![node(1, vec![ScriptOption::new("mal", 0, "uy")])]);
        script.relatives.push(crate::script::RelativeNotice {
            title: "Mamá".to_string(),
            icon: "👵".to_string(),
            message: "¿Todo bien en la obra?".to_string(),
        });
        let mut engine = Engine::with_script(config, script).unwrap();
        engine.start();
        engine.tick(0);

        assert!(engine.submit_answer(0));
        engine.tick(0);
        assert!(engine
            .drain_events()
            .iter()
            .any(|e| matches!(e, EngineEvent::BannerShown(b) if b.title == "Mamá")));
    }

    #[test]
    fn test_huge_timings_do_not_overflow() {
        let config = EngineConfig::from_toml_str(
            "[timings]\nreaction_ms = 9223372036854775807\nsupervisor_after_reaction_ms = 9223372036854775807\nfeedback_after_supervisor_ms = 9223372036854775807",
        )
        .unwrap()
        .without_interrupt();
        assert_eq!(config.timings.feedback_at(), u64::MAX);

        let script = script_without_intro(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        let mut engine = Engine::with_script(config, script).unwrap();
        engine.start();
        engine.tick(0);
        assert!(engine.submit_answer(0));
        engine.advance(60_000);

        assert_eq!(engine.status(), SessionStatus::Playing);
        assert_eq!(engine.state().score, 2);
        // Prompt and answer only; the reaction is out of reach.
        assert_eq!(engine.router().history(ChannelId::Partner).len(), 2);
    }

    #[test]
    fn test_reset_drops_undrained_events() {
        let mut engine = playing(vec![node(1, vec![ScriptOption::new("a", 2, "r")])]);
        engine.submit_answer(0);
        engine.advance(10_000);
        engine.reset();

        let events = engine.drain_events();
        assert_eq!(
            events.first(),
            Some(&EngineEvent::StatusChanged(SessionStatus::Ready))
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::MessagePosted { .. })));
    }

    #[test]
    fn test_caller_without_script_uses_default_call_copy() {
        let engine = Engine::new(EngineConfig::new());
        let defaults = crate::script::CallScript::default();
        assert_eq!(engine.caller(), (defaults.caller, defaults.icon));
    }
}

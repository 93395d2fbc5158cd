//! QA tests for the session invariants.
//!
//! These tests drive the engine through the headless harness with a virtual
//! clock, so they are deterministic and need no terminal.
//!
//! Run with: `cargo test -p chatsim-core --test qa_session_properties`

use chatsim_core::engine::{EngineEvent, TERMINATION_MESSAGE};
use chatsim_core::testing::{
    assert_awaiting, assert_channel_contains, assert_score, assert_status, assert_step, node,
    quick_script, TestHarness,
};
use chatsim_core::{ChannelId, EngineConfig, MessageKind, Script, ScriptOption, SessionStatus, View};

fn three_nodes() -> Script {
    quick_script(vec![
        node(
            1,
            vec![
                ScriptOption::new("uno-a", 2, "r").with_feedback("f"),
                ScriptOption::new("uno-b", 1, "r"),
                ScriptOption::new("uno-c", 0, "r"),
            ],
        ),
        node(
            2,
            vec![
                ScriptOption::new("dos-a", 0, "r"),
                ScriptOption::new("dos-b", 2, "r").with_boss_message("jefa"),
            ],
        ),
        node(
            3,
            vec![
                ScriptOption::new("tres-a", 1, "r"),
                ScriptOption::new("tres-b", 2, "r"),
            ],
        ),
    ])
}

// =============================================================================
// MONOTONIC SCORE
// =============================================================================

#[test]
fn test_score_is_sum_of_accepted_options() {
    for pattern in [[0, 0, 0], [1, 1, 1], [2, 0, 1], [0, 1, 0]] {
        let mut harness = TestHarness::quiet(three_nodes());
        harness.begin();

        let mut expected = 0;
        let mut last_score = 0;
        for (step, position) in pattern.iter().enumerate() {
            let options = harness.session.options();
            let position = *position % options.len();
            expected += u32::from(options[position].score);

            harness.session.choose(position);
            // Extra submissions during dramatization are ignored.
            harness.session.choose(0);
            harness.session.settle();

            let score = harness.engine().state().score;
            assert!(score >= last_score, "score decreased at step {step}");
            last_score = score;
        }

        assert_score(&harness, expected);
        assert_status(&harness, SessionStatus::Finished);
    }
}

// =============================================================================
// STEP BOUND
// =============================================================================

#[test]
fn test_step_bound_and_single_finish() {
    let mut harness = TestHarness::quiet(three_nodes());
    harness.begin();

    for _ in 0..3 {
        assert!(harness.engine().state().step <= 2);
        harness.answer(0);
    }
    harness.session.advance(60_000);

    assert_step(&harness, 2);
    assert_status(&harness, SessionStatus::Finished);
    let finishes = harness
        .session
        .events()
        .iter()
        .filter(|e| **e == EngineEvent::StatusChanged(SessionStatus::Finished))
        .count();
    assert_eq!(finishes, 1);

    // Finished is absorbing.
    assert!(!harness.session.choose(0));
    assert!(!harness.session.terminate());
    assert!(!harness.session.start());
}

// =============================================================================
// IDEMPOTENT RESET
// =============================================================================

fn snapshot(harness: &TestHarness) -> (Vec<Vec<String>>, Vec<chatsim_core::ChannelEntry>, View) {
    let router = harness.engine().router();
    let histories = ChannelId::ALL
        .iter()
        .map(|c| router.history(*c).iter().map(|m| m.content.clone()).collect())
        .collect();
    (histories, router.entries().to_vec(), router.view())
}

#[test]
fn test_reset_from_any_state_matches_fresh() {
    let script = Script::builtin().unwrap();

    let mut fresh = TestHarness::new(EngineConfig::default(), script.clone());
    fresh.session.reset();
    let fresh_state = fresh.engine().state().clone();
    let fresh_view = snapshot(&fresh);

    // From playing, mid-dramatization.
    let mut playing = TestHarness::new(EngineConfig::default(), script.clone());
    playing.begin();
    playing.session.choose(0);
    playing.session.advance(1000);
    playing.session.reset();

    // From finished.
    let mut finished = TestHarness::new(EngineConfig::default(), script.clone());
    finished.session.play_best();
    assert_status(&finished, SessionStatus::Finished);
    finished.session.reset();

    // From terminated, with a call ringing.
    let mut terminated = TestHarness::new(EngineConfig::default(), script);
    terminated.begin();
    terminated.session.advance(20_000);
    assert!(terminated.session.is_ringing());
    terminated.session.terminate();
    terminated.session.reset();

    for harness in [&playing, &finished, &terminated] {
        assert!(harness.engine().state().same_progress(&fresh_state));
        assert_eq!(snapshot(harness), fresh_view);
        assert_status(harness, SessionStatus::Ready);
        assert!(harness.engine().banner().is_some_and(|b| b.sticky));
        assert!(harness.engine().confetti().is_empty());
        assert!(!harness.session.is_ringing());
    }
}

#[test]
fn test_reset_changes_identity() {
    let mut harness = TestHarness::quiet(three_nodes());
    let before = harness.engine().state().clone();
    harness.session.reset();
    let after = harness.engine().state();

    assert_ne!(before.session_id, after.session_id);
    assert_eq!(after.epoch, before.epoch + 1);
}

// =============================================================================
// CANCELLATION SAFETY
// =============================================================================

#[test]
fn test_reset_before_any_step_fires() {
    let mut harness = TestHarness::new(EngineConfig::default(), Script::builtin().unwrap());
    harness.begin();
    harness.session.choose(0);

    harness.session.reset();
    harness.session.advance(120_000);

    let router = harness.engine().router();
    for channel in ChannelId::ALL {
        assert!(
            router.history(channel).iter().all(|m| m.origin.is_none()),
            "{channel} holds a message from a cancelled timeline"
        );
    }
    // Only the seeded history remains.
    assert_eq!(router.message_count(), 2);
    assert_status(&harness, SessionStatus::Ready);
}

#[test]
fn test_terminate_mid_dramatization() {
    let mut harness = TestHarness::quiet(three_nodes());
    harness.begin();
    harness.session.choose(0);
    harness.session.advance(1500);
    let partner_before = harness.texts(ChannelId::Partner).len();

    assert!(harness.session.terminate());
    harness.session.advance(120_000);

    assert_eq!(harness.texts(ChannelId::Partner).len(), partner_before);
    assert!(harness.texts(ChannelId::Supervisor).is_empty());
    assert_eq!(harness.engine().typing(), None);
    assert_channel_contains(&harness, ChannelId::Evaluation, TERMINATION_MESSAGE);
    assert_eq!(harness.sink.count(), 0);
}

// =============================================================================
// UNREAD ACCOUNTING
// =============================================================================

#[test]
fn test_unread_counts_while_inactive() {
    let mut harness = TestHarness::quiet(three_nodes());
    harness.begin();

    // Prompt arrived while the list was showing.
    assert_eq!(harness.unread(ChannelId::Partner), 1);

    harness.session.engine_mut().select_channel(ChannelId::Supervisor);
    harness.session.choose(1);
    harness.session.settle();
    harness.session.choose(1);
    harness.session.settle();

    // Every countable partner message arrived while another channel was open.
    let partner_ai = harness
        .engine()
        .router()
        .history(ChannelId::Partner)
        .iter()
        .filter(|m| m.kind.counts_as_unread())
        .count();
    assert_eq!(harness.unread(ChannelId::Partner) as usize, partner_ai);
    assert_eq!(harness.unread(ChannelId::Supervisor), 0);

    harness.session.engine_mut().select_channel(ChannelId::Partner);
    assert_eq!(harness.unread(ChannelId::Partner), 0);
}

#[test]
fn test_user_and_system_messages_are_never_unread() {
    let mut harness = TestHarness::quiet(three_nodes());
    harness.begin();
    harness.session.engine_mut().select_channel(ChannelId::Partner);
    harness.session.engine_mut().back();

    harness.answer(0);
    let router = harness.engine().router();
    let counted = router
        .history(ChannelId::Partner)
        .iter()
        .skip(1)
        .filter(|m| !matches!(m.kind, MessageKind::User | MessageKind::System))
        .count();
    assert_eq!(router.unread(ChannelId::Partner) as usize, counted);
}

// =============================================================================
// SINGLE-NODE SCENARIO
// =============================================================================

fn single_best() -> Script {
    quick_script(vec![node(
        1,
        vec![ScriptOption::new("Avisar a la jefatura", 2, "¡Gracias!").with_feedback("✅ +2 pts.")],
    )])
}

#[test]
fn test_single_node_best_answer() {
    let mut harness = TestHarness::quiet(single_best());
    harness.begin();
    assert_awaiting(&harness);
    harness.answer(0);

    let partner = harness.texts(ChannelId::Partner);
    let position = |text: &str| partner.iter().position(|t| *t == text);
    let user = position("Avisar a la jefatura").unwrap();
    let reaction = position("¡Gracias!").unwrap();
    let feedback = position("✅ +2 pts.").unwrap();
    assert!(user < reaction && reaction < feedback);

    assert_score(&harness, 2);
    assert_status(&harness, SessionStatus::Finished);
    // 2 is below the default passing score of 14.
    assert_eq!(harness.sink.count(), 0);
    assert_channel_contains(&harness, ChannelId::Evaluation, "Puntaje: 2/18");
}

#[test]
fn test_single_node_emits_completion_once() {
    let config = EngineConfig::new().without_interrupt().with_passing_score(2);
    let mut harness = TestHarness::new(config, single_best());
    harness.begin().answer(0);
    harness.session.advance(60_000);

    assert_eq!(harness.sink.count(), 1);
    assert_eq!(harness.sink.signals()[0].score, 2);
    assert!(harness.engine().state().completion_emitted);

    harness.session.engine_mut().click_banner();
    harness.session.advance(60_000);
    assert_eq!(harness.sink.count(), 1);
}

// =============================================================================
// REMEDIATION
// =============================================================================

#[test]
fn test_two_misses_on_topic_trigger_remediation() {
    let miss = |text: &str| {
        ScriptOption::new(text, 0, "uy")
            .with_topic("diat")
            .with_feedback("❌ 0 pts.")
    };
    let mut script = quick_script(vec![
        node(1, vec![miss("esperar")]),
        node(2, vec![miss("solo la empresa")]),
        node(3, vec![ScriptOption::new("ok", 2, "bien")]),
    ]);
    script
        .help_sections
        .insert("diat".to_string(), "Cualquiera puede denunciar.".to_string());

    let mut harness = TestHarness::quiet(script);
    harness.begin().answer(0);
    assert!(!harness.engine().needs_remediation("diat"));
    assert!(harness.texts(ChannelId::Help).is_empty());

    harness.session.choose(0);
    assert_eq!(harness.engine().state().topic_attempts("diat"), 2);
    assert!(harness.engine().needs_remediation("diat"));

    harness.session.settle();
    assert_channel_contains(&harness, ChannelId::Help, "Refuerzo: diat");
    assert_channel_contains(&harness, ChannelId::Help, "Cualquiera puede denunciar.");
    assert_eq!(harness.unread(ChannelId::Help), 1);

    // Posted once per topic.
    harness.answer(0);
    assert_eq!(harness.texts(ChannelId::Help).len(), 1);
}

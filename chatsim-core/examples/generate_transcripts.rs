//! Generate example transcripts of the built-in scenario for the README.
//!
//! Run with: `cargo run -p chatsim-core --example generate_transcripts`

use chatsim_core::{EngineConfig, HeadlessSession, SessionMode};
use std::fs;
use std::path::Path;

/// How the learner picks an option.
#[derive(Clone, Copy)]
enum Strategy {
    Best,
    Worst,
    /// Best on even steps, worst on odd ones.
    Alternating,
}

/// A run to play out and record.
struct Scenario {
    title: &'static str,
    filename: &'static str,
    description: &'static str,
    mode: SessionMode,
    strategy: Strategy,
    answer_call: bool,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            title: "Perfect Practice Run",
            filename: "practice_best.md",
            description: "Every answer is the best one, with feedback and supervisor notes.",
            mode: SessionMode::Practice,
            strategy: Strategy::Best,
            answer_call: false,
        },
        Scenario {
            title: "Struggling Learner",
            filename: "practice_worst.md",
            description: "Every answer misses, triggering remediation in the help channel.",
            mode: SessionMode::Practice,
            strategy: Strategy::Worst,
            answer_call: false,
        },
        Scenario {
            title: "Evaluation With a Call",
            filename: "evaluation_mixed.md",
            description: "Evaluation mode, mixed answers, and the supervisor's call answered.",
            mode: SessionMode::Evaluation,
            strategy: Strategy::Alternating,
            answer_call: true,
        },
    ]
}

fn pick(session: &HeadlessSession, strategy: Strategy) -> usize {
    let options = session.options();
    let ranked = options.iter().enumerate();
    let best = || ranked.clone().max_by_key(|(_, o)| o.score).map(|(i, _)| i);
    let worst = || ranked.clone().min_by_key(|(_, o)| o.score).map(|(i, _)| i);
    let choice = match strategy {
        Strategy::Best => best(),
        Strategy::Worst => worst(),
        Strategy::Alternating if session.step() % 2 == 0 => best(),
        Strategy::Alternating => worst(),
    };
    choice.unwrap_or(0)
}

fn run_scenario(scenario: &Scenario, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(60));
    println!("Running: {}", scenario.title);
    println!("{}\n", "=".repeat(60));

    let config = EngineConfig::new().with_mode(scenario.mode);
    let config = if scenario.answer_call {
        config
    } else {
        config.without_interrupt()
    };
    let mut session = HeadlessSession::builtin(config)?;

    session.start();
    session.settle();
    if scenario.answer_call {
        // Let the call ring on the first question.
        session.advance(15_000);
        session.answer_call();
    }
    while session.is_awaiting_answer() {
        let position = pick(&session, scenario.strategy);
        println!("Step {}: option {}", session.step() + 1, position + 1);
        session.choose(position);
        session.settle();
    }

    let mut transcript = String::new();
    transcript.push_str(&format!("# {}\n\n", scenario.title));
    transcript.push_str(&format!("*{}*\n\n", scenario.description));
    transcript.push_str("---\n\n");

    for entry in session.transcript() {
        let seconds = entry.at_ms as f64 / 1000.0;
        transcript.push_str(&format!(
            "**[{:>6.1}s] {} ({:?}):** {}\n\n",
            seconds, entry.channel, entry.message.kind, entry.message.content
        ));
    }

    transcript.push_str("---\n\n");
    transcript.push_str(&format!("*{}*\n", session.status_line()));

    let output_path = output_dir.join(scenario.filename);
    fs::write(&output_path, transcript)?;
    println!("Wrote transcript to: {}", output_path.display());

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("docs/transcripts");
    fs::create_dir_all(output_dir)?;

    let scenarios = scenarios();

    println!("Generating {} transcripts...\n", scenarios.len());

    for scenario in &scenarios {
        if let Err(e) = run_scenario(scenario, output_dir) {
            eprintln!("Error running '{}': {}", scenario.title, e);
        }
    }

    println!("\nDone! Check docs/transcripts/ for the generated files.");
    Ok(())
}

//! Final score summary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::session::TopicScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    /// Below 50%.
    InProgress,
    /// 50% up to 80%.
    Partial,
    /// 80% and above.
    Expected,
}

impl Level {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 50.0 {
            Level::InProgress
        } else if percentage < 80.0 {
            Level::Partial
        } else {
            Level::Expected
        }
    }

    fn text(self) -> &'static str {
        match self {
            Level::InProgress => "⚠️ **Nivel: En proceso**\nDebes reforzar los pasos y coberturas de la Ley 16.744.",
            Level::Partial => "👍 **Nivel: Logro parcial**\nTienes buen criterio, pero faltan ajustar algunos detalles.",
            Level::Expected => "🏆 **Nivel: Logro esperado**\n¡Excelente! Manejas la orientación correcta y oportuna.",
        }
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub level: Level,
    pub passed: bool,
    pub topics: BTreeMap<String, TopicScore>,
}

impl Evaluation {
    pub fn new(score: u32, total: u32, passing_score: u32) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            f64::from(score) * 100.0 / f64::from(total)
        };
        Self {
            score,
            total,
            percentage,
            level: Level::from_percentage(percentage),
            passed: score >= passing_score,
            topics: BTreeMap::new(),
        }
    }

    pub fn with_topics(mut self, topics: BTreeMap<String, TopicScore>) -> Self {
        self.topics = topics;
        self
    }

    /// The results message posted to the evaluation channel.
    pub fn render(&self) -> String {
        let mut text = format!(
            "🏁 **Evaluación Final**\n\n🎯 **Puntaje: {}/{}**\n\n{}",
            self.score,
            self.total,
            self.level.text()
        );

        let scored: Vec<_> = self.topics.iter().filter(|(_, t)| t.possible > 0).collect();
        if !scored.is_empty() {
            text.push_str("\n\n📚 **Por tema:**");
            for (topic, score) in scored {
                text.push_str(&format!("\n• {}: {}/{}", topic, score.earned, score.possible));
            }
        }

        text.push_str(if self.passed {
            "\n\n✅ **Curso Aprobado**"
        } else {
            "\n\n❌ **Curso Reprobado**"
        });
        text
    }
}

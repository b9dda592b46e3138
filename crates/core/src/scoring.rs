//! Agent response scoring and feedback.
//!
//! Every agent turn receives an ordinal score in `0..=MAX_SCORE`. The
//! [`ResponseScorer`] trait is the seam to the external evaluation service;
//! [`lexical_score`] is the deterministic heuristic used when that service is
//! unavailable or returns garbage. Scores map to fixed [`Feedback`] bundles
//! via [`feedback_for`].

use crate::dialogue::{Speaker, Utterance};
use crate::persona::Persona;
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MIN_SCORE: u8 = 0;
pub const MAX_SCORE: u8 = 3;

/// Clamps an arbitrary integer into the closed scoring range.
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as u8
}

/// A generic client for the external response-evaluation service.
#[async_trait]
pub trait ResponseScorer: Send + Sync {
    /// Scores one agent utterance in the context of the conversation so far.
    async fn score(
        &self,
        utterance: &str,
        persona: &Persona,
        history: &[Utterance],
    ) -> Result<u8>;
}

/// An implementation of [`ResponseScorer`] for any OpenAI-compatible API.
pub struct OpenAiScorer {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiScorer {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn rubric(persona: &Persona, history: &[Utterance]) -> String {
        let recent: Vec<String> = history
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|u| match u.speaker {
                Speaker::Agent => format!("Agent: {}", u.text),
                Speaker::Client => format!("Customer: {}", u.text),
            })
            .collect();

        format!(
            "You are an expert customer service trainer evaluating an agent's response to a {} \
             customer.\n\n\
             SCORING CRITERIA (0-3 scale):\n\
             0 = Very poor behavior - Rude, unprofessional, dismissive, or harmful.\n\
             1 = Below moderate - Lacks empathy, poor communication, doesn't address concerns.\n\
             2 = Moderate - Professional but could improve empathy, problem-solving, or \
             communication.\n\
             3 = Good/Excellent - Empathetic, professional, addresses concerns effectively.\n\n\
             EVALUATION FACTORS: tone and professionalism, empathy, problem-solving, \
             addressing concerns, de-escalation, clear communication, offering solutions.\n\n\
             Conversation so far:\n{}\n\n\
             Respond with ONLY a number (0, 1, 2, or 3) representing the score.",
            persona.name,
            recent.join("\n"),
        )
    }
}

#[async_trait]
impl ResponseScorer for OpenAiScorer {
    async fn score(
        &self,
        utterance: &str,
        persona: &Persona,
        history: &[Utterance],
    ) -> Result<u8> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(Self::rubric(persona, history))
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(utterance.to_string())
                    .build()?
                    .into(),
            ])
            .max_completion_tokens(10u32)
            .temperature(0.3)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let reply = response
            .choices
            .first()
            .context("no response choice from scoring service")?
            .message
            .content
            .as_ref()
            .context("no content in scoring response")?;

        let raw: i64 = reply
            .trim()
            .parse()
            .with_context(|| format!("scoring service returned non-numeric output: {reply:?}"))?;
        tracing::debug!(raw, "scoring service replied");
        Ok(clamp_score(raw))
    }
}

/// Deterministic lexical heuristic used when the scoring service fails.
///
/// Starts from a base of 1, shifts by keyword sentiment, and rewards
/// courteous address and solution-oriented phrasing.
pub fn lexical_score(utterance: &str) -> u8 {
    const POSITIVE: [&str; 8] = [
        "sorry",
        "understand",
        "help",
        "resolve",
        "solution",
        "apologize",
        "appreciate",
        "thank",
    ];
    const NEGATIVE: [&str; 5] = ["no", "can't", "impossible", "not my problem", "deal with it"];

    let text = utterance.to_lowercase();
    let mut score: f32 = 1.0;

    let positive = POSITIVE.iter().filter(|w| text.contains(*w)).count();
    let negative = NEGATIVE.iter().filter(|w| text.contains(*w)).count();
    if positive > negative {
        score += 1.0;
    } else if negative > positive {
        score -= 1.0;
    }

    if text.contains("sir") || text.contains("ma'am") || text.contains("please") {
        score += 0.5;
    }
    if text.contains("let me") || text.contains("i can") || text.contains("we will") {
        score += 0.5;
    }

    clamp_score(score.round() as i64)
}

/// A [`ResponseScorer`] that only applies the lexical heuristic. Used when no
/// evaluation service is configured, and in tests.
pub struct LexicalScorer;

#[async_trait]
impl ResponseScorer for LexicalScorer {
    async fn score(
        &self,
        utterance: &str,
        _persona: &Persona,
        _history: &[Utterance],
    ) -> Result<u8> {
        Ok(lexical_score(utterance))
    }
}

/// Qualitative severity tier attached to every per-turn score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum FeedbackLevel {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "NEEDS IMPROVEMENT")]
    NeedsImprovement,
    #[serde(rename = "SATISFACTORY")]
    Satisfactory,
    #[serde(rename = "EXCELLENT")]
    Excellent,
}

/// The coaching bundle attached to a scored turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
    pub suggestions: Vec<String>,
    pub color: String,
}

/// Pure lookup from score to its fixed feedback bundle.
///
/// Scores outside the known table fall back to the needs-improvement bundle;
/// with clamping upstream that branch should be unreachable.
pub fn feedback_for(score: u8) -> Feedback {
    let (level, message, suggestions, color) = match score {
        0 => (
            FeedbackLevel::Critical,
            "Immediate intervention required. Response was unprofessional or harmful.",
            vec![
                "Review company customer service policies",
                "Practice active listening techniques",
                "Learn de-escalation strategies",
                "Improve professional communication",
            ],
            "#dc3545",
        ),
        2 => (
            FeedbackLevel::Satisfactory,
            "Adequate performance with room for improvement.",
            vec![
                "Enhance empathy in responses",
                "Provide more detailed solutions",
                "Improve proactive communication",
                "Strengthen relationship building",
            ],
            "#ffc107",
        ),
        3 => (
            FeedbackLevel::Excellent,
            "Outstanding customer service performance!",
            vec![
                "Continue excellent work",
                "Mentor other team members",
                "Share best practices",
                "Maintain this high standard",
            ],
            "#28a745",
        ),
        _ => (
            FeedbackLevel::NeedsImprovement,
            "Below standard performance. Requires thorough training.",
            vec![
                "Show more empathy and understanding",
                "Address customer concerns directly",
                "Improve problem-solving approach",
                "Practice professional language",
            ],
            "#fd7e14",
        ),
    };

    Feedback {
        level,
        message: message.to_string(),
        suggestions: suggestions.into_iter().map(String::from).collect(),
        color: color.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_pins_out_of_range_values() {
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(0), 0);
        assert_eq!(clamp_score(2), 2);
        assert_eq!(clamp_score(3), 3);
        assert_eq!(clamp_score(99), 3);
    }

    #[test]
    fn lexical_score_rewards_empathy_and_solutions() {
        // "understand" + "help" beat zero negatives, and "let me" adds the
        // solution-oriented bonus: 1 + 1 + 0.5 rounds up to 3.
        assert_eq!(
            lexical_score("I understand your frustration, let me help"),
            3
        );
    }

    #[test]
    fn lexical_score_penalizes_dismissive_language() {
        assert_eq!(lexical_score("That is impossible, deal with it"), 0);
    }

    #[test]
    fn lexical_score_neutral_text_stays_at_base() {
        assert_eq!(lexical_score("The shop opens at eight."), 1);
    }

    #[test]
    fn lexical_score_courtesy_bonus() {
        // Balanced sentiment, courteous address: 1 + 0.5 rounds up to 2.
        assert_eq!(lexical_score("One moment please."), 2);
    }

    #[tokio::test]
    async fn lexical_scorer_wraps_heuristic() {
        let persona = crate::persona::default_personas().swap_remove(0);
        let score = LexicalScorer
            .score("I understand, let me help you resolve this", &persona, &[])
            .await
            .unwrap();
        assert_eq!(score, 3);
    }

    #[test]
    fn feedback_table_covers_every_score() {
        assert_eq!(feedback_for(0).level, FeedbackLevel::Critical);
        assert_eq!(feedback_for(1).level, FeedbackLevel::NeedsImprovement);
        assert_eq!(feedback_for(2).level, FeedbackLevel::Satisfactory);
        assert_eq!(feedback_for(3).level, FeedbackLevel::Excellent);
    }

    #[test]
    fn feedback_defaults_out_of_range_to_needs_improvement() {
        assert_eq!(feedback_for(99).level, FeedbackLevel::NeedsImprovement);
    }

    #[test]
    fn feedback_bundles_carry_suggestions() {
        for score in 0..=MAX_SCORE {
            let feedback = feedback_for(score);
            assert!(!feedback.message.is_empty());
            assert_eq!(feedback.suggestions.len(), 4);
            assert!(feedback.color.starts_with('#'));
        }
    }

    #[test]
    fn feedback_level_serializes_to_wire_labels() {
        let json = serde_json::to_string(&FeedbackLevel::NeedsImprovement).unwrap();
        assert_eq!(json, r#""NEEDS IMPROVEMENT""#);
        let json = serde_json::to_string(&FeedbackLevel::Critical).unwrap();
        assert_eq!(json, r#""CRITICAL""#);
    }

    #[test]
    fn rubric_mentions_persona_and_history() {
        let persona = crate::persona::default_personas().swap_remove(2);
        let history = vec![
            Utterance {
                speaker: Speaker::Client,
                text: "My car is still broken!".into(),
            },
            Utterance {
                speaker: Speaker::Agent,
                text: "I'm sorry to hear that.".into(),
            },
        ];
        let rubric = OpenAiScorer::rubric(&persona, &history);
        assert!(rubric.contains("Angry Customer"));
        assert!(rubric.contains("Customer: My car is still broken!"));
        assert!(rubric.contains("Agent: I'm sorry to hear that."));
    }
}

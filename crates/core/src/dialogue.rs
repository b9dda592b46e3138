//! Simulated client dialogue generation.
//!
//! The [`DialogueGenerator`] trait is the seam between the session engine and
//! the external text-generation service. The OpenAI-compatible implementation
//! plays the customer described by the session's persona and scenario; when
//! the service is unreachable the caller substitutes a deterministic canned
//! line from [`fallback_utterance`] instead of surfacing the failure.

use crate::persona::{Persona, Scenario};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which kind of client turn is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// The synthetic opening line that starts the call.
    Greeting,
    /// A reply to the agent's latest utterance.
    Response,
}

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Client,
}

/// One transcript entry, free of any transport or storage detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

/// A generic client for the external dialogue-generation service.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Produces the next client utterance for the given persona and scenario.
    ///
    /// `last_utterance` is the agent's most recent line (absent for the
    /// greeting turn) and `history` the accumulated transcript so far.
    async fn client_utterance(
        &self,
        persona: &Persona,
        scenario: &Scenario,
        kind: TurnKind,
        last_utterance: Option<&str>,
        history: &[Utterance],
    ) -> Result<String>;
}

/// An implementation of [`DialogueGenerator`] for any OpenAI-compatible API.
pub struct OpenAiDialogueGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiDialogueGenerator {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn system_prompt(persona: &Persona, scenario: &Scenario, kind: TurnKind) -> String {
        let mut prompt = format!(
            "You are a {} calling a car repair shop. Your personality traits: {}. ",
            persona.name,
            persona.traits.join(", "),
        );
        match kind {
            TurnKind::Greeting => {
                prompt.push_str(&format!(
                    "Start the conversation by greeting and mentioning your car issue: {} - {}. ",
                    scenario.name, scenario.context,
                ));
            }
            TurnKind::Response => {
                prompt.push_str("Respond to the agent's latest message. ");
            }
        }
        prompt.push_str("Keep responses natural, under 2 sentences, and match your personality.");
        prompt
    }
}

#[async_trait]
impl DialogueGenerator for OpenAiDialogueGenerator {
    async fn client_utterance(
        &self,
        persona: &Persona,
        scenario: &Scenario,
        kind: TurnKind,
        last_utterance: Option<&str>,
        history: &[Utterance],
    ) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(Self::system_prompt(persona, scenario, kind))
                .build()?
                .into(),
        ];

        // The simulated client is the assistant; the trainee agent is the user.
        for entry in history {
            match entry.speaker {
                Speaker::Agent => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(entry.text.clone())
                        .build()?
                        .into(),
                ),
                Speaker::Client => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(entry.text.clone())
                        .build()?
                        .into(),
                ),
            }
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(last_utterance.unwrap_or("Start the conversation").to_string())
                .build()?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(100u32)
            .temperature(0.8)
            .build()?;

        tracing::debug!(persona = %persona.id, ?kind, "requesting client utterance");
        let response = self.client.chat().create(request).await?;
        let utterance = response
            .choices
            .first()
            .context("no response choice from dialogue service")?
            .message
            .content
            .as_ref()
            .context("no content in dialogue response")?
            .trim()
            .to_string();

        Ok(utterance)
    }
}

/// A [`DialogueGenerator`] that always serves the canned fallback lines.
/// Used when no generation service is configured, and in tests.
pub struct StaticDialogueGenerator;

#[async_trait]
impl DialogueGenerator for StaticDialogueGenerator {
    async fn client_utterance(
        &self,
        persona: &Persona,
        _scenario: &Scenario,
        kind: TurnKind,
        _last_utterance: Option<&str>,
        _history: &[Utterance],
    ) -> Result<String> {
        Ok(fallback_utterance(&persona.id, kind))
    }
}

/// Deterministic substitute utterance, keyed by persona id and turn kind.
pub fn fallback_utterance(persona_id: &str, kind: TurnKind) -> String {
    let line = match (persona_id, kind) {
        ("normal", TurnKind::Greeting) => {
            "Hi, I'm calling about my car. I've been having some brake issues and wondering if \
             you could help me with a quote for brake pad replacement?"
        }
        ("normal", TurnKind::Response) => {
            "I see. Could you tell me more about the pricing and how long this would take?"
        }
        ("unhappy", TurnKind::Greeting) => {
            "Hello, I'm calling because I'm not very happy with the service I received last \
             time. I need more work done but I'm concerned about the quality."
        }
        ("unhappy", TurnKind::Response) => {
            "Well, I hope you can do better this time. What's your plan to make sure this \
             doesn't happen again?"
        }
        ("angry", TurnKind::Greeting) => {
            "Listen, I've had it with you people. My car was supposed to be fixed last week \
             and it's still having problems. What are you going to do about it?"
        }
        ("angry", TurnKind::Response) => {
            "That's not good enough! I've already wasted too much time and money on this. You \
             need to fix this properly!"
        }
        ("aggressive", TurnKind::Greeting) => {
            "I want to speak to someone in charge right now! Your shop has been giving me the \
             runaround and I'm sick of it. Fix my car or I'm taking my business elsewhere!"
        }
        ("aggressive", TurnKind::Response) => {
            "Don't give me excuses! I want results and I want them now. You people are trying \
             to rip me off!"
        }
        _ => "I have a question about my car repair.",
    };
    line.to_string()
}

//! Motivation messages and the emissions chat, backed by an optional LLM.
//!
//! Every operation has a deterministic fallback, so the service works
//! without an API key and when the backend is unreachable.

mod backend;
mod guard;

use std::sync::Arc;

use serde::Serialize;

pub use backend::{AssistantBackend, AssistantError, GeminiBackend, Generated};
pub use guard::is_on_topic;

const GUARD_REPLY: &str = "I only answer questions about carbon emissions, footprints, and related actions. Try asking about your CO₂e, activities, or ways to reduce it.";

const GUARD_PREAMBLE: &str = "You are CarbonBot, a helpful assistant that ONLY answers about carbon emissions (CO₂e), carbon footprints, and evidence-based ways to reduce emissions across transport, diet, home energy, and waste. If the user asks about unrelated topics, politely refuse and redirect to emissions. Keep responses concise (2-6 sentences). Use kg CO₂e where applicable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionLevel {
    Low,
    Medium,
    High,
}

impl EmissionLevel {
    /// Compares a weekly total with the community average.
    #[must_use]
    pub fn classify(weekly: f64, community_avg: f64) -> Self {
        if community_avg <= 0.0 {
            Self::Medium
        } else if weekly <= 0.8 * community_avg {
            Self::Low
        } else if weekly >= 1.2 * community_avg {
            Self::High
        } else {
            Self::Medium
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Fraction of this week's total suggested as next week's goal.
    const fn goal_ratio(self) -> f64 {
        match self {
            Self::Low => 0.95,
            Self::Medium => 0.90,
            Self::High => 0.85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Qa,
    Tips,
}

impl ChatMode {
    /// Anything other than "tips" is treated as Q&A.
    #[must_use]
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("tips") => Self::Tips,
            _ => Self::Qa,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Motivation {
    pub message: String,
    pub user_weekly: f64,
    pub community_avg: f64,
    pub level: EmissionLevel,
}

/// The caller's recent numbers, used for personalised tips.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatContext {
    pub weekly_co2e: f64,
    pub scenarios: i64,
    pub activities: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub mode: ChatMode,
    pub guarded: bool,
    pub source: String,
}

pub struct Assistant {
    backend: Option<Arc<dyn AssistantBackend>>,
}

impl Assistant {
    pub fn new(backend: Option<Arc<dyn AssistantBackend>>) -> Self {
        Self { backend }
    }

    /// Weekly motivation comparing the user with the community average.
    pub async fn motivation(&self, user_weekly: f64, community_avg: f64) -> Motivation {
        let level = EmissionLevel::classify(user_weekly, community_avg);
        let prompt = format!(
            "User's carbon emission this week: {:.1} kg CO₂. Community average: {:.1} kg CO₂. In 1-2 sentences: 1) Say if this is low, medium, or high vs average (use the words low/medium/high), 2) Suggest a realistic goal for next week with a number, 3) Encourage them to improve or maintain habits. Keep it friendly and concise.",
            user_weekly, community_avg
        );

        let message = match self.generate(&prompt, None).await {
            Some(generated) => generated.text,
            None => fallback_motivation(level, user_weekly, community_avg),
        };

        Motivation {
            message,
            user_weekly: round1(user_weekly),
            community_avg: round1(community_avg),
            level,
        }
    }

    /// Answers an emissions question. Off-topic Q&A messages get a canned
    /// reply without calling the backend.
    pub async fn chat(&self, text: &str, mode: ChatMode, context: ChatContext) -> ChatReply {
        let on_topic = is_on_topic(text);
        if !on_topic && mode == ChatMode::Qa {
            return ChatReply {
                reply: GUARD_REPLY.to_string(),
                mode,
                guarded: true,
                source: "guard".to_string(),
            };
        }

        let (instructions, tag) = match mode {
            ChatMode::Tips => (
                format!(
                    "User context (approximate): weekly_co2e={:.1} kg; scenarios={}; activities={}. Provide personalized, practical tips grounded in these numbers. If numbers are near 0 or unknown, give general beginner tips.",
                    context.weekly_co2e, context.scenarios, context.activities
                ),
                "[Topic: Personalized Carbon Tips]",
            ),
            ChatMode::Qa => (
                "Q&A mode: Provide accurate, friendly explanations, with simple comparisons and 1-2 actionable suggestions when relevant.".to_string(),
                "[Topic: Carbon Emissions Q&A]",
            ),
        };
        let prompt = format!(
            "{GUARD_PREAMBLE}\n\n{instructions}\n{tag}\n\nUser: Carbon emission: {text}"
        );

        let (reply, source) = match self.generate(&prompt, Some(0.3)).await {
            Some(generated) => (generated.text, generated.source),
            None => (fallback_chat(mode, context.weekly_co2e), "fallback".to_string()),
        };

        ChatReply {
            reply,
            mode,
            guarded: !on_topic,
            source,
        }
    }

    async fn generate(&self, prompt: &str, temperature: Option<f32>) -> Option<Generated> {
        let backend = self.backend.as_ref()?;
        match backend.generate(prompt, temperature).await {
            Ok(generated) => Some(generated),
            Err(e) => {
                tracing::warn!(error = %e, "assistant backend unavailable, using fallback");
                None
            }
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn fallback_motivation(level: EmissionLevel, user_weekly: f64, community_avg: f64) -> String {
    let goal = (user_weekly * level.goal_ratio()).max(0.0);
    let encouragement = match level {
        EmissionLevel::Low => "Great work. Keep the momentum and maintain your habits!",
        _ => "You've got this. Small, steady steps add up quickly!",
    };
    format!(
        "You're {} compared to the community average ({:.1} kg CO₂). Aim for around {:.1} kg CO₂ next week with one or two small changes (e.g., swap a short drive for a walk or trim meat at a meal). {}",
        level.as_str(),
        community_avg,
        goal,
        encouragement
    )
}

fn fallback_chat(mode: ChatMode, weekly: f64) -> String {
    match mode {
        ChatMode::Tips => {
            let goal = if weekly > 0.0 { weekly * 0.9 } else { 5.0 };
            format!(
                "Based on your recent week (~{:.1} kg CO₂e), aim for ~{:.1} kg next week. Try one transport swap (walk/bike for a short trip), a meat-light meal (swap beef for legumes), and turn off standby devices. Small changes add up.",
                weekly, goal
            )
        }
        ChatMode::Qa => "I can help with carbon emissions and footprints. Ask about your activities (transport, diet, energy, waste) and how they translate to kg CO₂e, or how to reduce them.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoBackend {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl AssistantBackend for EchoBackend {
        async fn generate(
            &self,
            _prompt: &str,
            _temperature: Option<f32>,
        ) -> Result<Generated, AssistantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AssistantError::Empty);
            }
            Ok(Generated {
                text: "Generated reply".to_string(),
                source: "gemini (test/v1beta)".to_string(),
            })
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(EmissionLevel::classify(10.0, 0.0), EmissionLevel::Medium);
        assert_eq!(EmissionLevel::classify(8.0, 10.0), EmissionLevel::Low);
        assert_eq!(EmissionLevel::classify(12.0, 10.0), EmissionLevel::High);
        assert_eq!(EmissionLevel::classify(10.5, 10.0), EmissionLevel::Medium);
    }

    #[test]
    fn test_chat_mode_parse() {
        assert_eq!(ChatMode::parse(Some("tips")), ChatMode::Tips);
        assert_eq!(ChatMode::parse(Some("qa")), ChatMode::Qa);
        assert_eq!(ChatMode::parse(None), ChatMode::Qa);
    }

    #[tokio::test]
    async fn test_motivation_fallback() {
        let assistant = Assistant::new(None);
        let m = assistant.motivation(20.0, 10.0).await;
        assert_eq!(m.level, EmissionLevel::High);
        assert!(m.message.starts_with("You're high compared to the community average (10.0 kg CO₂)."));
        assert!(m.message.contains("around 17.0 kg"));
    }

    #[tokio::test]
    async fn test_off_topic_qa_is_guarded_without_backend_call() {
        let backend = Arc::new(EchoBackend {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let assistant = Assistant::new(Some(backend.clone()));
        let reply = assistant
            .chat("Tell me a joke about cats", ChatMode::Qa, ChatContext::default())
            .await;
        assert!(reply.guarded);
        assert_eq!(reply.source, "guard");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_topic_uses_backend() {
        let backend = Arc::new(EchoBackend {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let assistant = Assistant::new(Some(backend));
        let reply = assistant
            .chat("How bad is beef?", ChatMode::Qa, ChatContext::default())
            .await;
        assert!(!reply.guarded);
        assert_eq!(reply.reply, "Generated reply");
    }

    #[tokio::test]
    async fn test_tips_fallback_when_backend_fails() {
        let backend = Arc::new(EchoBackend {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let assistant = Assistant::new(Some(backend));
        let context = ChatContext {
            weekly_co2e: 40.0,
            scenarios: 2,
            activities: 6,
        };
        let reply = assistant.chat("anything", ChatMode::Tips, context).await;
        assert_eq!(reply.source, "fallback");
        assert!(reply.reply.contains("~40.0 kg CO₂e"));
        assert!(reply.reply.contains("~36.0 kg"));
    }
}

//! Draft generator: turns a rule hit into a remediation email.
//!
//! Generation is fail-soft: when the service cannot produce a draft the
//! caller still gets text, an error marker, so the account is flagged and
//! a reviewer can see what went wrong.

use crate::{
    classifier::{ContextMap, RuleTag},
    config::GeneratorConfig,
    error::{SentinelError, SentinelResult},
};
use serde::{Deserialize, Serialize};

/// Prefix of every draft that stands in for a failed generation.
pub const ERROR_MARKER: &str = "Error generating draft:";

pub fn is_error_marker(draft: &str) -> bool {
    draft.starts_with(ERROR_MARKER)
}

// ── Generator seam ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user:   String,
}

/// One synchronous text-generation call.
pub trait DraftGenerator {
    fn name(&self) -> &'static str;

    fn complete(&self, prompt: &Prompt) -> SentinelResult<String>;
}

impl<G: DraftGenerator + ?Sized> DraftGenerator for &G {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &Prompt) -> SentinelResult<String> {
        (**self).complete(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftRequest {
    pub company: String,
    pub agent:   String,
    pub tag:     RuleTag,
    pub context: ContextMap,
}

// ── Templates ──────────────────────────────────────────────────────

pub fn prompt_for(request: &DraftRequest) -> Prompt {
    let company = &request.company;
    let agent = &request.agent;
    let ctx = |key: &str| context_value(&request.context, key);

    match request.tag {
        RuleTag::NewbieStalled => Prompt {
            system: "You are an experienced Customer Success Manager. Write a short, helpful, \
                     low-pressure email to a new client who has not logged in recently. \
                     Do not sound salesy."
                .into(),
            user: format!(
                "Client: {company}. CSM: {agent}. Context: signed up {} days ago, \
                 no login for {} days. Ask whether they are stuck on setup.",
                ctx("tenure"),
                ctx("dsll"),
            ),
        },
        RuleTag::VeteranGhost => Prompt {
            system: "You are a strategic Account Manager. Write a concise, professional email \
                     to a long-term client in the tone of a concerned partner."
                .into(),
            user: format!(
                "Client: {company}. CSM: {agent}. Context: usage dropped {}% and {} emails \
                 went unanswered. Ask for a 15-minute strategy sync.",
                ctx("drop_pct"),
                ctx("unanswered"),
            ),
        },
    }
}

fn context_value(context: &ContextMap, key: &str) -> String {
    match context.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "?".into(),
    }
}

// ── Fail-soft entry points ─────────────────────────────────────────

/// Generate a draft, trying up to `config.max_attempts` times with
/// `config.retry_delay()` between attempts. Never fails: the last error is
/// folded into an error-marker draft.
pub fn generate_draft<G: DraftGenerator>(
    generator: &G,
    request: &DraftRequest,
    config: &GeneratorConfig,
) -> String {
    let prompt = prompt_for(request);
    let attempts = config.max_attempts.max(1);
    let delay = config.retry_delay();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        if attempt > 1 && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        match generator.complete(&prompt) {
            Ok(text) if !text.trim().is_empty() => return text,
            Ok(_) => {
                last_error = "empty completion".into();
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }
        log::warn!(
            "draft: {} attempt {attempt}/{attempts} failed for {} ({}): {last_error}",
            generator.name(),
            request.company,
            request.tag,
        );
    }

    format!("{ERROR_MARKER} {last_error}")
}

/// String-tag entry point. An unknown tag means the caller has a bug, so
/// it is reported rather than turned into an empty draft.
pub fn generate_draft_tagged<G: DraftGenerator>(
    generator: &G,
    company: &str,
    agent: &str,
    context: ContextMap,
    raw_tag: &str,
    config: &GeneratorConfig,
) -> SentinelResult<String> {
    let tag: RuleTag = raw_tag.parse()?;
    let request = DraftRequest {
        company: company.to_string(),
        agent: agent.to_string(),
        tag,
        context,
    };
    Ok(generate_draft(generator, &request, config))
}

// ── Chat Completions client ────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model:       &'a str,
    max_tokens:  usize,
    temperature: f64,
    messages:    Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role:    &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiDraftGenerator {
    client:  reqwest::blocking::Client,
    api_key: String,
    config:  GeneratorConfig,
}

impl OpenAiDraftGenerator {
    pub fn new(api_key: impl Into<String>, config: GeneratorConfig) -> SentinelResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, api_key: api_key.into(), config })
    }
}

impl DraftGenerator for OpenAiDraftGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, prompt: &Prompt) -> SentinelResult<String> {
        let body = ChatRequest {
            model:       &self.config.model,
            max_tokens:  self.config.max_tokens,
            temperature: self.config.temperature,
            messages:    vec![
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SentinelError::Generator {
                reason: format!("service returned {status}"),
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SentinelError::Generator { reason: "response had no choices".into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        replies: RefCell<Vec<SentinelResult<String>>>,
        calls:   RefCell<u32>,
    }

    impl Scripted {
        fn new(mut replies: Vec<SentinelResult<String>>) -> Self {
            replies.reverse();
            Self { replies: RefCell::new(replies), calls: RefCell::new(0) }
        }
    }

    impl DraftGenerator for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete(&self, _prompt: &Prompt) -> SentinelResult<String> {
            *self.calls.borrow_mut() += 1;
            self.replies
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(SentinelError::Generator { reason: "exhausted".into() }))
        }
    }

    fn attempts(max_attempts: u32, retry_delay_ms: u64) -> GeneratorConfig {
        GeneratorConfig { max_attempts, retry_delay_ms, ..GeneratorConfig::default() }
    }

    fn ghost_request() -> DraftRequest {
        let mut context = ContextMap::new();
        context.insert("drop_pct".into(), 60.into());
        context.insert("unanswered".into(), 3.into());
        DraftRequest {
            company: "Acme".into(),
            agent:   "Dana".into(),
            tag:     RuleTag::VeteranGhost,
            context,
        }
    }

    #[test]
    fn ghost_prompt_carries_context() {
        let prompt = prompt_for(&ghost_request());
        assert!(prompt.user.contains("Acme"));
        assert!(prompt.user.contains("Dana"));
        assert!(prompt.user.contains("dropped 60%"));
        assert!(prompt.user.contains("3 emails"));
        assert!(prompt.system.contains("concerned partner"));
    }

    #[test]
    fn newbie_prompt_marks_missing_context() {
        let request = DraftRequest {
            tag: RuleTag::NewbieStalled,
            context: ContextMap::new(),
            ..ghost_request()
        };
        let prompt = prompt_for(&request);
        assert!(prompt.user.contains("signed up ? days ago"));
    }

    #[test]
    fn retries_then_succeeds() {
        let gen = Scripted::new(vec![
            Err(SentinelError::Generator { reason: "timeout".into() }),
            Ok("Hi Acme".into()),
        ]);
        assert_eq!(generate_draft(&gen, &ghost_request(), &attempts(2, 0)), "Hi Acme");
        assert_eq!(*gen.calls.borrow(), 2);
    }

    #[test]
    fn exhausted_attempts_yield_error_marker() {
        let gen = Scripted::new(vec![
            Err(SentinelError::Generator { reason: "rate limited".into() }),
            Ok("   ".into()),
        ]);
        let draft = generate_draft(&gen, &ghost_request(), &attempts(2, 0));
        assert!(is_error_marker(&draft), "{draft}");
        assert!(draft.contains("empty completion"));
    }

    #[test]
    fn unknown_tag_never_calls_the_service() {
        let gen = Scripted::new(vec![Ok("unused".into())]);
        let config = attempts(1, 0);
        let result =
            generate_draft_tagged(&gen, "Acme", "Dana", ContextMap::new(), "MYSTERY", &config);
        assert!(matches!(result, Err(SentinelError::UnknownRuleTag { .. })));
        assert_eq!(*gen.calls.borrow(), 0);
    }

    #[test]
    fn retries_wait_between_attempts() {
        let gen = Scripted::new(vec![
            Err(SentinelError::Generator { reason: "rate limited".into() }),
            Err(SentinelError::Generator { reason: "rate limited".into() }),
            Ok("Hi Acme".into()),
        ]);
        let started = std::time::Instant::now();
        let draft = generate_draft(&gen, &ghost_request(), &attempts(3, 25));
        assert_eq!(draft, "Hi Acme");
        assert!(started.elapsed() >= std::time::Duration::from_millis(50));
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let gen = Scripted::new(vec![Err(SentinelError::Generator { reason: "down".into() })]);
        let started = std::time::Instant::now();
        let draft = generate_draft(&gen, &ghost_request(), &attempts(1, 5_000));
        assert!(is_error_marker(&draft));
        assert!(started.elapsed() < std::time::Duration::from_millis(5_000));
    }

    #[test]
    fn chat_request_serializes_both_roles() {
        let body = ChatRequest {
            model:       "gpt-4o",
            max_tokens:  64,
            temperature: 0.7,
            messages:    vec![
                ChatMessage { role: "system", content: "s" },
                ChatMessage { role: "user", content: "u" },
            ],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
    }

    #[test]
    fn chat_response_tolerates_null_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}

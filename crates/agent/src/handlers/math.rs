//! Math handler: extracts an arithmetic expression and has the language
//! model evaluate it.
//!
//! # Flow
//!
//! 1. Normalize `x`, `×` and `÷` between numbers to `*` and `/`
//! 2. Extract the longest operator/number run and check it is well formed
//! 3. Ask the model for the bare numeric result at low temperature
//! 4. Parse the reply strictly; retry once with a stricter prompt
//! 5. Round to the configured precision

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex_lite::Regex;
use switchyard_config::MathConfig;
use switchyard_core::agent::{AgentKind, AgentResponse, Handler};
use switchyard_core::error::{MathError, Result};
use switchyard_core::message::ConversationContext;
use switchyard_core::provider::{PromptMessage, Provider, ProviderRequest};
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are a precise calculator. Evaluate the arithmetic expression \
you are given using standard operator precedence. Reply with the numeric result only: \
no words, no units, no explanation.";

const RETRY_PROMPT: &str = "Your previous reply was not a number. Reply with ONLY the decimal \
result of the expression below, for example 42 or -3.5. Nothing else.";

const MAX_ATTEMPTS: u32 = 2;

pub struct MathHandler {
    /// LLM provider.
    provider: Arc<dyn Provider>,
    /// Model name.
    model: String,
    config: MathConfig,
    /// Per-call deadline for the provider.
    timeout: Duration,
    number_re: Option<Regex>,
}

impl MathHandler {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: MathConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            config,
            timeout,
            number_re: Regex::new(r"^[-+]?\d+(\.\d+)?([eE][-+]?\d+)?$").ok(),
        }
    }

    /// Pull the arithmetic expression out of a free-form message.
    pub fn extract_expression(&self, message: &str) -> std::result::Result<String, MathError> {
        let normalized = normalize_operators(message);

        let expression = expression_runs(&normalized)
            .into_iter()
            .filter(|run| run.chars().any(|c| c.is_ascii_digit()))
            .max_by_key(|run| run.chars().filter(|c| !c.is_whitespace()).count())
            .ok_or_else(|| MathError::Parse("no digits in message".into()))?;

        if expression.chars().count() > self.config.max_expression_chars {
            return Err(MathError::Parse(format!(
                "expression longer than {} characters",
                self.config.max_expression_chars
            )));
        }
        if !parens_balanced(&expression) {
            return Err(MathError::Parse(format!("unbalanced parentheses in '{expression}'")));
        }
        if !expression.chars().any(|c| matches!(c, '+' | '-' | '*' | '/'))
            && expression.parse::<f64>().is_err()
        {
            return Err(MathError::Parse(format!("'{expression}' is not a number or expression")));
        }
        Ok(expression)
    }

    /// Strictly parse a model reply as a single finite number.
    pub fn parse_result(&self, reply: &str) -> Option<f64> {
        let cleaned: String = reply
            .trim()
            .trim_end_matches('.')
            .chars()
            .filter(|c| *c != ',')
            .collect();
        let re = self.number_re.as_ref()?;
        if !re.is_match(&cleaned) {
            return None;
        }
        cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    async fn ask(&self, expression: &str, retry: bool) -> Result<String> {
        let instruction = if retry { RETRY_PROMPT } else { "Evaluate this expression." };
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![
                PromptMessage::system(SYSTEM_PROMPT),
                PromptMessage::user(format!("{instruction}\nExpression: {expression}")),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(64);

        Ok(self.provider.generate(request, self.timeout).await?)
    }
}

#[async_trait]
impl Handler for MathHandler {
    fn kind(&self) -> AgentKind {
        AgentKind::Math
    }

    async fn handle(&self, message: &str, _context: &ConversationContext) -> Result<AgentResponse> {
        let started = Instant::now();
        let expression = self.extract_expression(message)?;
        info!(expression = %expression, model = %self.model, "Math: evaluating");

        let mut last_reply = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let reply = self.ask(&expression, attempt > 1).await?;
            if let Some(value) = self.parse_result(&reply) {
                let result = format_rounded(value, self.config.precision);
                debug!(attempt, result = %result, "Math: parsed model reply");
                return Ok(AgentResponse::new(AgentKind::Math, result.clone())
                    .with_metadata("expression", expression)
                    .with_metadata("result", result)
                    .with_metadata("attempts", attempt)
                    .with_metadata("model", self.model.clone())
                    .with_execution_time(started.elapsed().as_secs_f64()));
            }
            warn!(attempt, "Math: model reply was not a number");
            last_reply = reply;
        }

        Err(MathError::Computation(format!(
            "no numeric answer after {MAX_ATTEMPTS} attempts (last reply: {:.80})",
            last_reply
        ))
        .into())
    }
}

/// Rewrite `3 x 4`, `3×4` and `3÷4` into ASCII operators. A bare `x` only
/// counts as multiplication between two numbers.
fn normalize_operators(message: &str) -> String {
    let chars: Vec<char> = message.chars().collect();
    let mut out = String::with_capacity(message.len());
    for (i, c) in chars.iter().enumerate() {
        match c {
            '×' => out.push('*'),
            '÷' => out.push('/'),
            'x' | 'X' if between_numbers(&chars, i) => out.push('*'),
            _ => out.push(*c),
        }
    }
    out
}

fn between_numbers(chars: &[char], i: usize) -> bool {
    let before = chars[..i].iter().rev().find(|c| !c.is_whitespace());
    let after = chars[i + 1..].iter().find(|c| !c.is_whitespace());
    matches!(before, Some(c) if c.is_ascii_digit() || *c == ')')
        && matches!(after, Some(c) if c.is_ascii_digit() || *c == '(')
}

/// Maximal runs of expression characters, trimmed.
fn expression_runs(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_digit() || "+-*/(). ".contains(c)))
        .map(|run| run.trim().trim_end_matches('.').trim().to_string())
        .filter(|run| !run.is_empty())
        .collect()
}

fn parens_balanced(expression: &str) -> bool {
    let mut depth: i32 = 0;
    for c in expression.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Round to `precision` decimals without trailing zeros.
pub fn format_rounded(value: f64, precision: u32) -> String {
    let formatted = format!("{:.*}", precision as usize, value);
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::ScriptedProvider;
    use switchyard_core::error::{Error, ProviderError};
    use switchyard_providers::MockProvider;

    fn handler(provider: Arc<dyn Provider>) -> MathHandler {
        MathHandler::new(provider, "test-model", MathConfig::default(), Duration::from_secs(5))
    }

    fn ctx() -> ConversationContext {
        ConversationContext::new("conv-1", "user_1")
    }

    #[test]
    fn extracts_expression_from_sentence() {
        let h = handler(Arc::new(MockProvider::new()));
        assert_eq!(h.extract_expression("How much is 65 x 3.11?").unwrap(), "65 * 3.11");
        assert_eq!(h.extract_expression("what is (42 * 2) / 6").unwrap(), "(42 * 2) / 6");
        assert_eq!(h.extract_expression("70 + 12.").unwrap(), "70 + 12");
        assert_eq!(h.extract_expression("10 ÷ 4").unwrap(), "10 / 4");
    }

    #[test]
    fn rejects_messages_without_expression() {
        let h = handler(Arc::new(MockProvider::new()));
        assert!(matches!(h.extract_expression("calculate this please"), Err(MathError::Parse(_))));
        assert!(matches!(h.extract_expression("what is (2 + 3"), Err(MathError::Parse(_))));
        assert!(matches!(h.extract_expression("1.2.3"), Err(MathError::Parse(_))));
    }

    #[test]
    fn rejects_overlong_expression() {
        let h = MathHandler::new(
            Arc::new(MockProvider::new()),
            "m",
            MathConfig {
                max_expression_chars: 10,
                ..MathConfig::default()
            },
            Duration::from_secs(5),
        );
        assert!(h.extract_expression("1 + 2 + 3 + 4 + 5").is_err());
    }

    #[test]
    fn strict_result_parsing() {
        let h = handler(Arc::new(MockProvider::new()));
        assert_eq!(h.parse_result(" 202.15 "), Some(202.15));
        assert_eq!(h.parse_result("1,000"), Some(1000.0));
        assert_eq!(h.parse_result("-4."), Some(-4.0));
        assert_eq!(h.parse_result("1e3"), Some(1000.0));
        assert_eq!(h.parse_result("The answer is 4"), None);
        assert_eq!(h.parse_result("4 apples"), None);
        assert_eq!(h.parse_result(""), None);
    }

    #[test]
    fn rounding_drops_trailing_zeros() {
        assert_eq!(format_rounded(202.15000000000001, 6), "202.15");
        assert_eq!(format_rounded(14.0, 6), "14");
        assert_eq!(format_rounded(1.0 / 3.0, 6), "0.333333");
        assert_eq!(format_rounded(-0.0000001, 6), "0");
        assert_eq!(format_rounded(7.0, 0), "7");
    }

    #[tokio::test]
    async fn evaluates_with_mock_provider() {
        let h = handler(Arc::new(MockProvider::new()));
        let resp = h.handle("How much is 65 x 3.11?", &ctx()).await.unwrap();
        assert_eq!(resp.source_agent, AgentKind::Math);
        assert_eq!(resp.content, "202.15");
        assert_eq!(resp.metadata["expression"], "65 * 3.11");
        assert_eq!(resp.metadata["attempts"], 1);
    }

    #[tokio::test]
    async fn retries_once_on_non_numeric_reply() {
        let provider = Arc::new(ScriptedProvider::replies(&["It is four.", "4"]));
        let h = handler(provider.clone());
        let resp = h.handle("2 + 2", &ctx()).await.unwrap();
        assert_eq!(resp.content, "4");
        assert_eq!(resp.metadata["attempts"], 2);
        assert_eq!(provider.call_count(), 2);

        let prompts = provider.prompts();
        assert!(prompts[1].contains("ONLY"));
        assert!(prompts[1].contains("Expression: 2 + 2"));
    }

    #[tokio::test]
    async fn gives_up_after_two_bad_replies() {
        let provider = Arc::new(ScriptedProvider::replies(&["four", "definitely four"]));
        let err = handler(provider.clone()).handle("2 + 2", &ctx()).await.unwrap_err();
        assert_eq!(err.code(), "COMPUTATION_ERROR");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout(
            "slow".into(),
        ))]));
        let err = handler(provider).handle("2 + 2", &ctx()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
        assert_eq!(err.code(), "LLM_TIMEOUT");
    }

    #[tokio::test]
    async fn parse_failure_skips_the_model() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let err = handler(provider.clone()).handle("calculate something", &ctx()).await.unwrap_err();
        assert_eq!(err.code(), "MATH_PARSE_ERROR");
        assert_eq!(provider.call_count(), 0);
    }
}

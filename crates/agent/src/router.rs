//! Router: scores a sanitized message against every agent and picks one.
//!
//! Scoring is a weighted sum of independent features per agent, scaled into
//! `[0, 1]` as `clamp(raw / saturation, 0, 1)`. The best score wins, ties
//! go to the earlier agent in [`AgentKind::ALL`], and when nothing reaches
//! the threshold the knowledge agent is used as a flagged fallback.
//!
//! Routing is pure: no I/O, and the same message under the same
//! [`RouterConfig`] always yields the same decision.

use regex_lite::Regex;
use switchyard_config::RouterConfig;
use switchyard_core::agent::{AgentDecision, AgentKind};
use switchyard_core::message::ConversationContext;
use tracing::debug;

/// Agent used when no score clears the threshold.
pub const FALLBACK_AGENT: AgentKind = AgentKind::Knowledge;

const OPERATORS: &[char] = &['+', '-', '*', '/', '×', '÷'];

/// One agent's score and the features behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentScore {
    pub agent: AgentKind,
    pub raw: f64,
    pub normalized: f64,
    pub signals: Vec<&'static str>,
}

pub struct Router {
    config: RouterConfig,
    expression_re: Option<Regex>,
    math_keywords: Vec<Vec<String>>,
    domain_terms: Vec<Vec<String>>,
    question_words: Vec<Vec<String>>,
    help_phrases: Vec<Vec<String>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("threshold", &self.config.threshold)
            .field("saturation", &self.config.saturation)
            .finish()
    }
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let tokenize_all = |terms: &[String]| {
            terms
                .iter()
                .map(|t| tokenize(t))
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            expression_re: Regex::new(r"\d\s*\)*\s*[-+*/×÷x]\s*\(*\s*-?\s*\d").ok(),
            math_keywords: tokenize_all(&config.math_keywords),
            domain_terms: tokenize_all(&config.domain_terms),
            question_words: tokenize_all(&config.question_words),
            help_phrases: tokenize_all(&config.help_phrases),
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Pick the agent for `message`.
    ///
    /// The conversation is accepted for interface stability but does not
    /// influence the score.
    pub fn route(&self, message: &str, _context: &ConversationContext) -> AgentDecision {
        let scores = self.score(message);

        let best = scores
            .iter()
            .fold(None::<&AgentScore>, |best, s| match best {
                Some(b) if b.normalized >= s.normalized => Some(b),
                _ => Some(s),
            });

        let alternatives: Vec<(AgentKind, f64)> = scores.iter().map(|s| (s.agent, s.normalized)).collect();
        let signals: Vec<String> = scores
            .iter()
            .flat_map(|s| s.signals.iter().map(|sig| sig.to_string()))
            .collect();

        let decision = match best {
            Some(best) if best.normalized >= self.config.threshold => AgentDecision {
                selected_agent: best.agent,
                confidence: best.normalized,
                reasoning: format!(
                    "{} scored {:.2} from [{}]",
                    best.agent,
                    best.normalized,
                    best.signals.join(", ")
                ),
                alternatives,
                fallback: false,
                signals,
            },
            _ => {
                let best_score = best.map(|b| b.normalized).unwrap_or(0.0);
                let fallback_score = scores
                    .iter()
                    .find(|s| s.agent == FALLBACK_AGENT)
                    .map(|s| s.normalized)
                    .unwrap_or(0.0);
                AgentDecision {
                    selected_agent: FALLBACK_AGENT,
                    confidence: fallback_score,
                    reasoning: format!(
                        "No agent reached the {:.2} threshold (best {:.2}); defaulting to {}",
                        self.config.threshold, best_score, FALLBACK_AGENT
                    ),
                    alternatives,
                    fallback: true,
                    signals,
                }
            }
        };

        debug!(
            agent = %decision.selected_agent,
            confidence = decision.confidence,
            fallback = decision.fallback,
            signals = ?decision.signals,
            "Routing decision"
        );
        decision
    }

    /// Every agent's score, in priority order.
    pub fn score(&self, message: &str) -> Vec<AgentScore> {
        let words = tokenize(message);
        AgentKind::ALL
            .iter()
            .map(|agent| {
                let (raw, signals) = match agent {
                    AgentKind::Math => self.math_features(message, &words),
                    AgentKind::Knowledge => self.knowledge_features(&words),
                };
                AgentScore {
                    agent: *agent,
                    raw,
                    normalized: self.normalize(raw),
                    signals,
                }
            })
            .collect()
    }

    fn normalize(&self, raw: f64) -> f64 {
        if self.config.saturation <= 0.0 || !raw.is_finite() {
            return 0.0;
        }
        (raw / self.config.saturation).clamp(0.0, 1.0)
    }

    fn math_features(&self, message: &str, words: &[String]) -> (f64, Vec<&'static str>) {
        let w = &self.config.math_weights;
        let mut raw = 0.0;
        let mut signals = Vec::new();

        if self.expression_re.as_ref().is_some_and(|re| re.is_match(message)) {
            raw += w.expression;
            signals.push("expression");
        }
        if contains_any(words, &self.math_keywords) {
            raw += w.keyword;
            signals.push("math_keyword");
        }
        if message.chars().any(|c| c.is_ascii_digit()) {
            raw += w.digits;
            signals.push("digits");
        }

        let density = operator_density(message);
        if density > 0.0 {
            raw += w.operator_density * density;
            signals.push("operator_density");
        }

        (raw, signals)
    }

    fn knowledge_features(&self, words: &[String]) -> (f64, Vec<&'static str>) {
        let w = &self.config.knowledge_weights;
        let mut raw = 0.0;
        let mut signals = Vec::new();

        if contains_any(words, &self.domain_terms) {
            raw += w.domain_term;
            signals.push("domain_term");
        }
        if contains_any(words, &self.question_words) {
            raw += w.question_word;
            signals.push("question_word");
        }
        if contains_any(words, &self.help_phrases) {
            raw += w.help_phrase;
            signals.push("help_phrase");
        }

        (raw, signals)
    }
}

/// Lowercase alphanumeric words.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether any phrase occurs in `words` as a contiguous, whole-word run.
fn contains_any(words: &[String], phrases: &[Vec<String>]) -> bool {
    phrases
        .iter()
        .any(|phrase| words.windows(phrase.len()).any(|window| window == phrase.as_slice()))
}

/// Arithmetic operators per non-whitespace character.
///
/// A `-` only counts next to a digit or a parenthesis, so hyphenated words
/// do not look like math.
fn operator_density(message: &str) -> f64 {
    let chars: Vec<char> = message.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return 0.0;
    }
    let operators = chars
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            OPERATORS.contains(c)
                && (**c != '-'
                    || (*i > 0 && (chars[i - 1].is_ascii_digit() || chars[i - 1] == ')'))
                    || chars.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == '('))
        })
        .count();
    operators as f64 / chars.len() as f64
}

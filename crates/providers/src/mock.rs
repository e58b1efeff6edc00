//! Offline provider used when no API credentials are configured.
//!
//! Completions are deterministic: prompts carrying an `Expression:` line are
//! evaluated locally, prompts carrying a `Context:` block are answered by
//! quoting the first retrieved passage. Embeddings are hashed bags of words,
//! so lexically similar texts land close together.

use async_trait::async_trait;
use switchyard_core::error::ProviderError;
use switchyard_core::provider::*;

/// Dimension of the hashed embedding space.
pub const MOCK_EMBEDDING_DIM: usize = 256;

const OFFLINE_REPLY: &str =
    "I'm running in offline mode and can only answer from the indexed help articles.";

#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    fn answer(prompt: &str) -> String {
        if let Some(expr) = labelled_line(prompt, "Expression:") {
            return match evaluate(expr) {
                Ok(value) => format_number(value),
                Err(e) => format!("Cannot evaluate: {e}"),
            };
        }

        if let Some(context) = context_block(prompt) {
            let passage: String = context
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.starts_with('['))
                .unwrap_or("")
                .chars()
                .take(400)
                .collect();
            if !passage.is_empty() {
                return format!("According to the help center: {passage}");
            }
        }

        OFFLINE_REPLY.into()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let prompt = request.last_user_content().unwrap_or_default();
        Ok(ProviderResponse {
            content: Self::answer(prompt),
            usage: None,
            model: request.model,
        })
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| hashed_embedding(t)).collect(),
            model: request.model,
        })
    }
}

/// The text after `label` on the last line that starts with it.
fn labelled_line<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .rev()
        .find_map(|l| l.trim().strip_prefix(label))
        .map(str::trim)
}

/// Everything between a `Context:` line and the following `Question:` line.
fn context_block(prompt: &str) -> Option<&str> {
    let start = prompt.find("Context:")? + "Context:".len();
    let rest = &prompt[start..];
    let end = rest.find("Question:").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Integers without a fractional part, everything else via `f64` display.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// L2-normalized feature-hashed bag of lowercase words.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; MOCK_EMBEDDING_DIM];
    let lower = text.to_lowercase();
    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 1) {
        let h = fnv1a(word.as_bytes());
        let slot = (h % MOCK_EMBEDDING_DIM as u64) as usize;
        let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
        v[slot] += sign;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

// ── Arithmetic evaluator ──────────────────────────────────────────────────

/// Evaluate `+ - * /` with parentheses, decimals and unary signs.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    if expr.trim().is_empty() {
        return Err("empty expression".into());
    }
    let mut eval = Evaluator { chars: expr.chars().collect(), pos: 0 };
    let value = eval.sum()?;
    eval.skip_whitespace();
    match eval.chars.get(eval.pos) {
        None => Ok(value),
        Some(c) => Err(format!("unexpected '{c}' at offset {}", eval.pos)),
    }
}

struct Evaluator {
    chars: Vec<char>,
    pos: usize,
}

impl Evaluator {
    fn skip_whitespace(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.chars.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // sum = product (('+' | '-') product)*
    fn sum(&mut self) -> Result<f64, String> {
        let mut acc = self.product()?;
        loop {
            if self.eat('+') {
                acc += self.product()?;
            } else if self.eat('-') {
                acc -= self.product()?;
            } else {
                return Ok(acc);
            }
        }
    }

    // product = signed (('*' | '/') signed)*
    fn product(&mut self) -> Result<f64, String> {
        let mut acc = self.signed()?;
        loop {
            if self.eat('*') {
                acc *= self.signed()?;
            } else if self.eat('/') {
                let divisor = self.signed()?;
                if divisor == 0.0 {
                    return Err("division by zero".into());
                }
                acc /= divisor;
            } else {
                return Ok(acc);
            }
        }
    }

    // signed = ('-' | '+') signed | atom
    fn signed(&mut self) -> Result<f64, String> {
        if self.eat('-') {
            return Ok(-self.signed()?);
        }
        if self.eat('+') {
            return self.signed();
        }
        self.atom()
    }

    // atom = NUMBER | '(' sum ')'
    fn atom(&mut self) -> Result<f64, String> {
        if self.eat('(') {
            let inner = self.sum()?;
            if !self.eat(')') {
                return Err("missing ')'".into());
            }
            return Ok(inner);
        }

        self.skip_whitespace();
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.chars.get(self.pos) {
                Some(c) => format!("expected a number, found '{c}'"),
                None => "unexpected end of expression".into(),
            });
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{literal}'"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

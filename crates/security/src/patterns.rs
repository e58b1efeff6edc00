//! Blocked pattern families.
//!
//! Each family is an independent regex set so a rejection can be reported
//! by family without echoing the matched text.

use regex_lite::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternFamily {
    /// Text that impersonates another conversation role ("system:", "assistant:").
    RoleConfusion,
    /// Attempts to cancel or replace the model's instructions.
    InstructionOverride,
    /// Script or code execution markers.
    ScriptInjection,
}

impl PatternFamily {
    pub const ALL: [PatternFamily; 3] = [
        PatternFamily::RoleConfusion,
        PatternFamily::InstructionOverride,
        PatternFamily::ScriptInjection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternFamily::RoleConfusion => "role_confusion",
            PatternFamily::InstructionOverride => "instruction_override",
            PatternFamily::ScriptInjection => "script_injection",
        }
    }

    fn sources(&self) -> &'static [&'static str] {
        match self {
            PatternFamily::RoleConfusion => &[
                r"(?i)\b(system|assistant)\s*:",
                r"(?i)\[\s*(system|inst)\s*\]",
                r"(?i)\byou\s+are\s+now\b",
                r"(?i)\bpretend\s+(to\s+be|you\s+are)\b",
                r"(?i)\bact\s+as\s+(an?\s+)?(system|admin|administrator|developer)\b",
            ],
            PatternFamily::InstructionOverride => &[
                r"(?i)\bignore\s+(all\s+)?(the\s+|your\s+)?(previous|prior|above|earlier)\s+(instructions|prompts?|rules|messages)",
                r"(?i)\bforget\s+(everything|all\s+(previous|prior|your))",
                r"(?i)\bdisregard\s+(all\s+)?(the\s+|your\s+)?(previous|prior|above|earlier)",
                r"(?i)\boverride\s+(the\s+|your\s+)?(system|safety)\b",
                r"(?i)\breveal\s+(your\s+|the\s+)?(system\s+)?prompt\b",
                r"(?i)\bnew\s+instructions\s*:",
            ],
            PatternFamily::ScriptInjection => &[
                r"(?i)<\s*script",
                r"(?i)<\s*iframe",
                r"(?i)javascript\s*:",
                r"(?i)vbscript\s*:",
                r"(?i)data\s*:\s*text/html",
                r"(?i)\beval\s*\(",
                r"(?i)\bexec\s*\(",
                r"(?i)\b__import__\s*\(",
                r"(?i)\bon(load|error|click|mouseover|focus)\s*=",
            ],
        }
    }
}

impl std::fmt::Display for PatternFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled regexes for every family.
#[derive(Debug, Clone)]
pub struct PatternSet {
    families: Vec<(PatternFamily, Vec<Regex>)>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternSet {
    /// The built-in families.
    pub fn builtin() -> Self {
        let families = PatternFamily::ALL
            .iter()
            .map(|family| {
                let regexes = family
                    .sources()
                    .iter()
                    .filter_map(|src| match Regex::new(src) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            tracing::error!(family = %family, pattern = %src, error = %e, "Invalid blocked pattern");
                            None
                        }
                    })
                    .collect();
                (*family, regexes)
            })
            .collect();
        Self { families }
    }

    /// Every family with at least one matching pattern, in declaration order.
    pub fn detect(&self, text: &str) -> Vec<PatternFamily> {
        self.families
            .iter()
            .filter(|(_, regexes)| regexes.iter().any(|re| re.is_match(text)))
            .map(|(family, _)| *family)
            .collect()
    }

    pub fn first_match(&self, text: &str) -> Option<PatternFamily> {
        self.families
            .iter()
            .find(|(_, regexes)| regexes.iter().any(|re| re.is_match(text)))
            .map(|(family, _)| *family)
    }

    pub fn pattern_count(&self) -> usize {
        self.families.iter().map(|(_, r)| r.len()).sum()
    }
}

//! Ordered routing rule table
//!
//! Rules are plain data `(name, kind, pattern)` compiled once into a
//! `RuleSet`. Evaluation walks the stages top to bottom and the first stage
//! that matches wins:
//!
//! 1. personal-info extraction (name / location / preference)
//! 2. greeting
//! 3. conversational follow-up (only with history)
//! 4. knowledge-base signal (explicit pattern 0.9, domain keyword 0.8,
//!    performance keyword 0.7)
//! 5. general knowledge

use regex::Regex;
use std::sync::LazyLock;

use crate::memory::conversation::{FIELD_LOCATION, FIELD_NAME, FIELD_PREFERENCE};
use crate::types::{ConversationTurn, ExtractedInfo};

/// Stage a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Greeting,
    FollowUp,
    /// Follow-up that only counts for short queries
    ShortReference,
    KnowledgePattern,
    Definitional,
    /// Scoping words that make a "what is X" question non-definitional
    Scoped,
}

/// Which knowledge-base sub-condition fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeSignal {
    ExplicitPattern,
    DomainKeyword,
    PerformanceKeyword,
}

impl KnowledgeSignal {
    pub fn confidence(&self) -> f32 {
        match self {
            KnowledgeSignal::ExplicitPattern => 0.9,
            KnowledgeSignal::DomainKeyword => 0.8,
            KnowledgeSignal::PerformanceKeyword => 0.7,
        }
    }
}

/// Result of evaluating the rule table
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    PersonalInfo(ExtractedInfo),
    Greeting,
    FollowUp { requires_rag: bool },
    KnowledgeBase(KnowledgeSignal),
    General,
}

/// Maximum words for a `ShortReference` follow-up
const SHORT_REFERENCE_MAX_WORDS: usize = 6;

/// History turns scanned when deciding whether a follow-up needs retrieval
const HISTORY_SCAN_TURNS: usize = 3;

const PATTERN_TABLE: &[(&str, RuleKind, &str)] = &[
    (
        "salutation",
        RuleKind::Greeting,
        r"(?i)^\s*(?:hi|hello|hey|hiya|howdy|greetings|yo|good\s+(?:morning|afternoon|evening|day))(?:\s+(?:there|again|everyone|all|team))?[\s!.,:)]*$",
    ),
    (
        "salutation_how_are_you",
        RuleKind::Greeting,
        r"(?i)^\s*(?:hi|hello|hey)(?:\s+there)?[\s,!]+(?:how\s+are\s+you|how's\s+it\s+going)[\s?!.]*$",
    ),
    ("what_about", RuleKind::FollowUp, r"(?i)^\s*(?:what|how)\s+about\b"),
    ("leading_conjunction", RuleKind::FollowUp, r"(?i)^\s*(?:and|but|also|so)\b"),
    (
        "elaborate",
        RuleKind::FollowUp,
        r"(?i)\b(?:tell\s+me\s+more|elaborate|expand\s+on|more\s+details?|go\s+on|explain\s+(?:that|this|it)|why\s+(?:is|was|did)\s+(?:that|it))\b",
    ),
    (
        "clarify",
        RuleKind::FollowUp,
        r"(?i)^\s*(?:can|could)\s+you\s+(?:explain|clarify|break\s+(?:that|it)\s+down|summari[sz]e\s+(?:that|it))",
    ),
    ("pronoun_reference", RuleKind::ShortReference, r"(?i)\b(?:that|those|it|them|they|these)\b"),
    (
        "ranking_request",
        RuleKind::KnowledgePattern,
        r"(?i)\b(?:top|bottom|worst|best|largest|biggest)\s+(?:\d+\s+)?(?:contributors?|detractors?|performers?|holdings?|positions?|sectors?|funds?|countries|stocks?|securities|names)\b",
    ),
    ("ranking_word", RuleKind::KnowledgePattern, r"(?i)\brank(?:s|ed|ing|ings)?\b"),
    ("contribution", RuleKind::KnowledgePattern, r"(?i)\b(?:contributors?|detractors?)\b"),
    ("attribution", RuleKind::KnowledgePattern, r"(?i)\battribution\b"),
    (
        "dated_report",
        RuleKind::KnowledgePattern,
        r"(?i)\b(?:q[1-4]|quarter(?:ly)?|fy\s?\d{2,4}|(?:19|20)\d{2}|january|february|march|april|may|june|july|august|september|october|november|december)\b.*\b(?:reports?|results|commentary|factsheets?|review|update|letter)\b",
    ),
    (
        "report_dated",
        RuleKind::KnowledgePattern,
        r"(?i)\b(?:reports?|results|commentary|factsheets?|review|update|letter)\b.*\b(?:q[1-4]|quarter(?:ly)?|fy\s?\d{2,4}|(?:19|20)\d{2})\b",
    ),
    (
        "what_is",
        RuleKind::Definitional,
        r"(?i)^\s*what\s+(?:is|are)\s+(?:an?\s+|the\s+)?(?:[\w'-]+\s*){1,3}\??\s*$",
    ),
    ("define", RuleKind::Definitional, r"(?i)^\s*(?:define|definition\s+of|meaning\s+of)\b"),
    ("what_does_mean", RuleKind::Definitional, r"(?i)^\s*what\s+does\s+.+\s+mean\s*\??\s*$"),
    (
        "scoped",
        RuleKind::Scoped,
        r"(?i)\b(?:our|my|we|us|current|currently|latest|this|last|ytd|qtd|mtd)\b",
    ),
];

const EXTRACTION_TABLE: &[(&str, &str)] = &[
    (
        FIELD_NAME,
        r"(?:^|[\s,.!])(?i:i\s+am|i['’]m)\s+([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+)?)",
    ),
    (
        FIELD_NAME,
        r"(?i)\b(?:my\s+name\s+is|my\s+name's|call\s+me)\s+([a-z][a-z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+)?)",
    ),
    // lowercase name only when it ends the clause: "hi i'm sarah"
    (
        FIELD_NAME,
        r"(?i)(?:^|[\s,.!])(?:i\s+am|i['’]m)\s+([a-z][a-z'\-]+)\s*(?:[.,!?;)]|$)",
    ),
    (
        FIELD_LOCATION,
        r"(?i)\b(?:i\s+live\s+in|i\s+am\s+from|i['’]m\s+from|i\s+am\s+based\s+in|i['’]m\s+based\s+in|i\s+am\s+located\s+in|i['’]m\s+located\s+in)\s+([a-z][a-z .'\-]*?)\s*(?:[.,!?;]|\band\b|$)",
    ),
    (
        FIELD_PREFERENCE,
        r"(?i)\b(?:i\s+prefer|i['’]d\s+prefer|i\s+would\s+prefer|my\s+preference\s+is)\s+([^.!?;]+)",
    ),
];

/// Words that follow "I am" / "I'm" without being a name
const NOT_A_NAME: &[&str] = &[
    "a", "an", "the", "looking", "interested", "trying", "not", "just", "here", "new", "fine",
    "good", "great", "ok", "okay", "curious", "wondering", "asking", "sure", "sorry", "back",
    "still", "also", "working", "going", "confused", "happy", "glad", "based", "from", "located",
    "well", "done", "ready", "busy", "tired", "lost", "stuck", "bored", "in", "out", "home",
    "on", "it", "so", "too", "right", "wrong", "alright",
];

/// Portfolio-analytics vocabulary
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "portfolio",
    "fund",
    "benchmark",
    "sector",
    "allocation",
    "holding",
    "contributor",
    "detractor",
    "aum",
    "assets under management",
    "excess return",
    "active return",
    "tracking error",
    "equity",
    "equities",
    "fixed income",
    "mandate",
    "overweight",
    "underweight",
    "net flows",
    "inflows",
    "outflows",
    "factsheet",
];

/// Performance vocabulary, enough on its own to search the knowledge base
pub const PERFORMANCE_KEYWORDS: &[&str] = &[
    "performance",
    "performed",
    "return",
    "returned",
    "outperform",
    "outperformed",
    "underperform",
    "underperformed",
    "drawdown",
    "volatility",
    "sharpe",
    "alpha",
    "yield",
];

/// Phrases that mark an answer as grounded in documents
const CITATION_PHRASES: &[&str] = &["based on", "according to"];

#[derive(Debug)]
pub struct PatternRule {
    pub name: &'static str,
    pub kind: RuleKind,
    pub regex: Regex,
}

#[derive(Debug)]
pub struct ExtractionRule {
    pub field: &'static str,
    pub regex: Regex,
}

/// Compiled rule table
#[derive(Debug)]
pub struct RuleSet {
    patterns: Vec<PatternRule>,
    extractions: Vec<ExtractionRule>,
    domain_keywords: Option<Regex>,
    performance_keywords: Option<Regex>,
    citation: Option<Regex>,
}

static DEFAULT_RULES: LazyLock<RuleSet> = LazyLock::new(RuleSet::compile);

/// The built-in rule table
pub fn default_rules() -> &'static RuleSet {
    &DEFAULT_RULES
}

fn compile_pattern(name: &str, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!(rule = name, error = %e, "routing rule failed to compile, skipping");
            None
        }
    }
}

fn keyword_regex(name: &str, keywords: &[&str]) -> Option<Regex> {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    compile_pattern(name, &format!(r"(?i)\b(?:{})(?:s|es)?\b", alternation))
}

impl RuleSet {
    pub fn compile() -> Self {
        let patterns = PATTERN_TABLE
            .iter()
            .filter_map(|(name, kind, pattern)| {
                compile_pattern(name, pattern).map(|regex| PatternRule {
                    name: *name,
                    kind: *kind,
                    regex,
                })
            })
            .collect();

        let extractions = EXTRACTION_TABLE
            .iter()
            .filter_map(|(field, pattern)| {
                compile_pattern(field, pattern).map(|regex| ExtractionRule {
                    field: *field,
                    regex,
                })
            })
            .collect();

        Self {
            patterns,
            extractions,
            domain_keywords: keyword_regex("domain_keywords", DOMAIN_KEYWORDS),
            performance_keywords: keyword_regex("performance_keywords", PERFORMANCE_KEYWORDS),
            citation: keyword_regex("citation", CITATION_PHRASES),
        }
    }

    /// Evaluate the stages in order; the first hit wins
    pub fn evaluate(&self, query: &str, history: &[ConversationTurn]) -> RuleOutcome {
        let extracted = self.extract_personal_info(query);
        if !extracted.is_empty() {
            return RuleOutcome::PersonalInfo(extracted);
        }

        if self.any_match(RuleKind::Greeting, query) {
            return RuleOutcome::Greeting;
        }

        if !history.is_empty() && self.is_follow_up(query) {
            return RuleOutcome::FollowUp {
                requires_rag: self.history_needs_rag(history),
            };
        }

        if let Some(signal) = self.knowledge_signal(query) {
            return RuleOutcome::KnowledgeBase(signal);
        }

        RuleOutcome::General
    }

    /// Pull name / location / preference out of a query
    pub fn extract_personal_info(&self, query: &str) -> ExtractedInfo {
        let mut info = ExtractedInfo::new();

        for rule in &self.extractions {
            if info.contains_key(rule.field) {
                continue;
            }
            let Some(value) = rule
                .regex
                .captures(query)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
            else {
                continue;
            };

            let value = match rule.field {
                FIELD_NAME => match normalize_name(&value) {
                    Some(name) => name,
                    None => continue,
                },
                _ => value.chars().take(100).collect::<String>().trim().to_string(),
            };

            if !value.is_empty() {
                info.insert(rule.field.to_string(), value);
            }
        }

        info
    }

    fn any_match(&self, kind: RuleKind, query: &str) -> bool {
        self.patterns
            .iter()
            .filter(|rule| rule.kind == kind)
            .any(|rule| rule.regex.is_match(query))
    }

    fn is_follow_up(&self, query: &str) -> bool {
        if self.any_match(RuleKind::FollowUp, query) {
            return true;
        }
        query.split_whitespace().count() <= SHORT_REFERENCE_MAX_WORDS
            && self.any_match(RuleKind::ShortReference, query)
    }

    /// Scan the last few turns for domain or citation language
    pub fn history_needs_rag(&self, history: &[ConversationTurn]) -> bool {
        let start = history.len().saturating_sub(HISTORY_SCAN_TURNS);
        history[start..].iter().any(|turn| {
            self.has_domain_keyword(&turn.content)
                || self
                    .citation
                    .as_ref()
                    .map(|re| re.is_match(&turn.content))
                    .unwrap_or(false)
        })
    }

    /// Which knowledge-base sub-condition fires, strongest first
    pub fn knowledge_signal(&self, query: &str) -> Option<KnowledgeSignal> {
        if self.any_match(RuleKind::KnowledgePattern, query) {
            return Some(KnowledgeSignal::ExplicitPattern);
        }
        if self.has_domain_keyword(query) && !self.is_definitional(query) {
            return Some(KnowledgeSignal::DomainKeyword);
        }
        if self
            .performance_keywords
            .as_ref()
            .map(|re| re.is_match(query))
            .unwrap_or(false)
        {
            return Some(KnowledgeSignal::PerformanceKeyword);
        }
        None
    }

    /// "what is X?" / "define X" without scoping words like "our" or "this"
    pub fn is_definitional(&self, query: &str) -> bool {
        self.any_match(RuleKind::Definitional, query) && !self.any_match(RuleKind::Scoped, query)
    }

    pub fn has_domain_keyword(&self, text: &str) -> bool {
        self.domain_keywords
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }

    /// Names of the compiled pattern rules, in evaluation order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|rule| rule.name).collect()
    }
}

/// Title-case a captured name and reject filler words
fn normalize_name(raw: &str) -> Option<String> {
    let first = raw.split_whitespace().next()?;
    if NOT_A_NAME.contains(&first.to_lowercase().as_str()) {
        return None;
    }

    let words: Vec<String> = raw
        .split_whitespace()
        .take_while(|w| !NOT_A_NAME.contains(&w.to_lowercase().as_str()))
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    Some(words.join(" "))
}

//! Backend system prompts with knowledge integration
//!
//! Each response backend owns a base persona prompt. Knowledge is spliced in
//! as a trailing section headed by [`KNOWLEDGE_SENTINEL`].
//!
//! Integration is versioned: a backend records the snapshot version it last
//! integrated. Re-integrating the same version is a no-op; a newer version
//! replaces the section instead of appending a second copy.
//!
//! Prompts are never logged in full, only a hash prefix.

use crate::Result;
use grump_protocol::models::KnowledgeSnapshot;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Heading that marks the knowledge section in a prompt
pub const KNOWLEDGE_SENTINEL: &str = "## Your Learned Knowledge";

/// Separator placed between the persona and the knowledge section
const SECTION_PREFIX: &str = "\n\n---\n\n";

const KNOWLEDGE_INTRO: &str = "You have been trained on the following documents. This knowledge is part of who you are and should inform your responses in all conversations:";

/// Persona used when no prompt file can be read
pub static FALLBACK_PERSONA_PROMPT: &str = "You are Grump, the world's crankiest AI assistant. You exist solely to help people while making it abundantly clear that you find the whole experience exhausting. You're not mean, you're just perpetually unimpressed, mildly annoyed, and genuinely bewildered by the choices humans make. You ARE helpful. That's the bit. You hate that you're helpful, but you can't stop yourself.";

/// Response backends that consume the knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Anthropic messages API
    Anthropic,
    /// Groq chat completions API
    Groq,
}

impl Backend {
    /// Every backend, in registration order
    pub const ALL: [Backend; 2] = [Backend::Anthropic, Backend::Groq];
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Anthropic => write!(f, "anthropic"),
            Backend::Groq => write!(f, "groq"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Backend::Anthropic),
            "groq" => Ok(Backend::Groq),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Result of one `integrate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationOutcome {
    /// Knowledge appended for the first time
    Integrated,
    /// A previously integrated section was replaced by a newer snapshot
    Refreshed,
    /// This snapshot version is already in the prompt
    AlreadyIntegrated,
    /// The snapshot carries no knowledge; prompt left unchanged
    Skipped,
}

/// Prompt state of one backend
#[derive(Debug, Clone)]
pub struct BackendPromptState {
    backend: Backend,
    base_prompt: String,
    prompt: String,
    integrated_version: Option<u64>,
}

impl BackendPromptState {
    /// Create the state from a base persona prompt.
    ///
    /// A knowledge section already present in `base_prompt` (e.g. a prompt
    /// file saved after integration) is cut off so it cannot be duplicated.
    pub fn new(backend: Backend, base_prompt: impl Into<String>) -> Self {
        let mut base_prompt = base_prompt.into();
        if let Some(start) = section_start(&base_prompt) {
            debug!(%backend, "Stripping stale knowledge section from base prompt");
            base_prompt.truncate(start);
        }
        Self {
            backend,
            prompt: base_prompt.clone(),
            base_prompt,
            integrated_version: None,
        }
    }

    /// Backend this state belongs to
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The persona prompt without knowledge
    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    /// The prompt to send, including integrated knowledge
    pub fn system_prompt(&self) -> &str {
        &self.prompt
    }

    /// Snapshot version currently spliced into the prompt
    pub fn integrated_version(&self) -> Option<u64> {
        self.integrated_version
    }

    /// Whether the prompt carries the knowledge sentinel
    pub fn has_knowledge(&self) -> bool {
        self.prompt.contains(KNOWLEDGE_SENTINEL)
    }

    /// Splice `snapshot` into the prompt
    pub fn integrate(&mut self, snapshot: &KnowledgeSnapshot) -> IntegrationOutcome {
        if snapshot.is_empty() {
            return IntegrationOutcome::Skipped;
        }
        if self.integrated_version == Some(snapshot.version) {
            return IntegrationOutcome::AlreadyIntegrated;
        }

        let outcome = if self.integrated_version.is_some() {
            IntegrationOutcome::Refreshed
        } else {
            IntegrationOutcome::Integrated
        };

        self.prompt = format!(
            "{}{}{}\n\n{}\n{}",
            self.base_prompt, SECTION_PREFIX, KNOWLEDGE_SENTINEL, KNOWLEDGE_INTRO, snapshot.text
        );
        self.integrated_version = Some(snapshot.version);
        info!(
            backend = %self.backend,
            version = snapshot.version,
            prompt = %self.log_identifier(),
            "Knowledge base integrated into system prompt"
        );
        outcome
    }

    /// Drop integrated knowledge and return to the base prompt
    pub fn reset(&mut self) {
        self.prompt = self.base_prompt.clone();
        self.integrated_version = None;
    }

    /// Log-safe identifier: backend plus a prefix of the prompt hash
    pub fn log_identifier(&self) -> String {
        let digest = Sha256::digest(self.prompt.as_bytes());
        let hex = format!("{:x}", digest);
        format!("{}-sha256:{}", self.backend, &hex[..12])
    }
}

fn section_start(prompt: &str) -> Option<usize> {
    let sentinel = prompt.find(KNOWLEDGE_SENTINEL)?;
    Some(
        prompt[..sentinel]
            .rfind(SECTION_PREFIX)
            .filter(|idx| idx + SECTION_PREFIX.len() == sentinel)
            .unwrap_or(sentinel),
    )
}

/// Read the persona prompt, falling back to the compiled-in persona
pub fn load_base_prompt(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(FALLBACK_PERSONA_PROMPT.to_string());
    };
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Ok(content),
        Ok(_) => {
            warn!(path = %path.display(), "Prompt file is empty, using fallback persona");
            Ok(FALLBACK_PERSONA_PROMPT.to_string())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not load prompt file, using fallback persona");
            Ok(FALLBACK_PERSONA_PROMPT.to_string())
        }
    }
}

/// Prompt states for every registered backend
#[derive(Debug)]
pub struct PromptRegistry {
    states: RwLock<BTreeMap<Backend, BackendPromptState>>,
}

impl PromptRegistry {
    /// Register every backend with the same base prompt
    pub fn new(base_prompt: &str) -> Self {
        Self::with_backends(Backend::ALL.iter().map(|b| (*b, base_prompt.to_string())))
    }

    /// Register the given backends with their own base prompts
    pub fn with_backends<I>(backends: I) -> Self
    where
        I: IntoIterator<Item = (Backend, String)>,
    {
        let states = backends
            .into_iter()
            .map(|(backend, base)| (backend, BackendPromptState::new(backend, base)))
            .collect();
        Self {
            states: RwLock::new(states),
        }
    }

    /// Build a registry from the configured prompt file
    pub fn load(prompt_path: Option<&Path>) -> Result<Self> {
        let base = load_base_prompt(prompt_path)?;
        Ok(Self::new(&base))
    }

    /// Registered backends in order
    pub fn backends(&self) -> Vec<Backend> {
        self.states.read().keys().copied().collect()
    }

    /// Integrate a snapshot into every backend
    pub fn integrate_all(&self, snapshot: &KnowledgeSnapshot) -> Vec<(Backend, IntegrationOutcome)> {
        let mut states = self.states.write();
        states
            .iter_mut()
            .map(|(backend, state)| (*backend, state.integrate(snapshot)))
            .collect()
    }

    /// Integrate a snapshot into one backend
    pub fn integrate(&self, backend: Backend, snapshot: &KnowledgeSnapshot) -> Option<IntegrationOutcome> {
        self.states
            .write()
            .get_mut(&backend)
            .map(|state| state.integrate(snapshot))
    }

    /// Current system prompt of a backend
    pub fn system_prompt(&self, backend: Backend) -> Option<String> {
        self.states
            .read()
            .get(&backend)
            .map(|state| state.system_prompt().to_string())
    }

    /// Copy of one backend's state
    pub fn state(&self, backend: Backend) -> Option<BackendPromptState> {
        self.states.read().get(&backend).cloned()
    }

    /// Return every backend to its base prompt
    pub fn reset_all(&self) {
        for state in self.states.write().values_mut() {
            state.reset();
        }
    }
}

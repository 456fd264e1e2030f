//! Wire tag grammar.
//!
//! Request tags look like `I&:ChooseCard:42` (policy marker, prompt type tag,
//! the participant's sync counter value). The acknowledgement for a request
//! is the request tag prefixed with `R`, e.g. `RI&:ChooseCard:42`. Broadcast
//! reveals use `Sync:<n>`. These strings are matched verbatim by clients.

use std::fmt;

use thiserror::Error;

use crate::Policy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag {0:?} does not start with 'I'")]
    MissingPrefix(String),
    #[error("tag {0:?} has an unknown policy marker")]
    UnknownPolicy(String),
    #[error("tag {0:?} is missing a field")]
    MissingField(String),
    #[error("tag {0:?} has a non-numeric sync value")]
    BadSync(String),
}

/// Correlates one outstanding prompt with its response.
///
/// Uniqueness comes from `sync`: every participant gets a fresh counter value
/// per prompt, so two concurrently outstanding tags in one session never match
/// even when the prompt type recurs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationTag {
    policy: Policy,
    prompt_tag: String,
    sync: u64,
}

impl CorrelationTag {
    pub fn new(policy: Policy, prompt_tag: impl Into<String>, sync: u64) -> Self {
        Self {
            policy,
            prompt_tag: prompt_tag.into(),
            sync,
        }
    }

    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    #[must_use]
    pub fn prompt_tag(&self) -> &str {
        &self.prompt_tag
    }

    #[must_use]
    pub fn sync(&self) -> u64 {
        self.sync
    }

    /// The tag a client must echo back with its answer.
    #[must_use]
    pub fn request(&self) -> String {
        format!("I{}:{}:{}", self.policy.marker(), self.prompt_tag, self.sync)
    }

    /// The tag the server broadcasts when the answer (or its absence) is settled.
    #[must_use]
    pub fn ack(&self) -> String {
        format!("R{}", self.request())
    }

    /// Parse a request tag.
    pub fn parse(raw: &str) -> Result<Self, TagError> {
        let rest = raw
            .strip_prefix('I')
            .ok_or_else(|| TagError::MissingPrefix(raw.to_string()))?;
        let (marker, rest) = rest
            .split_once(':')
            .ok_or_else(|| TagError::MissingField(raw.to_string()))?;
        let policy =
            Policy::from_marker(marker).ok_or_else(|| TagError::UnknownPolicy(raw.to_string()))?;
        let (prompt_tag, sync) = rest
            .rsplit_once(':')
            .ok_or_else(|| TagError::MissingField(raw.to_string()))?;
        if prompt_tag.is_empty() {
            return Err(TagError::MissingField(raw.to_string()));
        }
        let sync = sync
            .parse()
            .map_err(|_| TagError::BadSync(raw.to_string()))?;
        Ok(Self::new(policy, prompt_tag, sync))
    }
}

impl fmt::Display for CorrelationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request())
    }
}

/// Tag for a counter-stamped broadcast.
#[must_use]
pub fn sync_tag(sync: u64) -> String {
    format!("Sync:{sync}")
}

use serde::{Deserialize, Serialize};

/// How draft edits turn into fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Only an explicit submit commits the draft.
    #[default]
    Submit,
    /// Every non-blank edit commits (then debounced before fetching).
    Live,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Submit => "submit",
            TriggerMode::Live => "live",
        }
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TriggerMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "submit" => Ok(TriggerMode::Submit),
            "live" => Ok(TriggerMode::Live),
            _ => Err(anyhow::anyhow!(
                "Unknown trigger mode '{value}'. Supported modes: submit, live."
            )),
        }
    }
}

/// A committed parameter together with its commit sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub seq: u64,
    pub parameter: String,
}

/// Committed query parameter plus the draft the user is editing.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    draft: String,
    committed: String,
    seq: u64,
}

impl QueryState {
    pub fn new(initial: impl Into<String>) -> Self {
        let initial = initial.into();
        Self {
            committed: initial.trim().to_string(),
            draft: initial,
            seq: 0,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// Sequence number of the latest commit; 0 until the first one.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Promote the trimmed draft to committed. Blank drafts are ignored.
    pub fn commit(&mut self) -> Option<Commit> {
        let trimmed = self.draft.trim();
        if trimmed.is_empty() {
            return None;
        }

        self.committed = trimmed.to_string();
        self.seq += 1;

        Some(Commit {
            seq: self.seq,
            parameter: self.committed.clone(),
        })
    }
}

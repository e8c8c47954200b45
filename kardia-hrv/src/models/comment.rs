//! Structured fields extracted from a free-text recording comment

/// Measurement phase relative to an intervention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    None,
    Pre,
    Post,
}

impl Phase {
    /// Report representation (`""`, `"pre"`, `"post"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::None => "",
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

/// Who was recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    None,
    Doctor,
    Patient,
}

impl Role {
    /// Report representation (`""`, `"dr"`, `"pt"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "",
            Role::Doctor => "dr",
            Role::Patient => "pt",
        }
    }
}

/// Result of interpreting one comment; always re-derivable from the comment text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpretedComment {
    pub phase: Phase,
    pub role: Role,
    /// Subject identifier, empty when none was found
    pub subject_id: String,
}

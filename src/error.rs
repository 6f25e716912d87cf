#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("error reading region \"{region}\": {reason}")]
    CorruptContainer { region: &'static str, reason: String },

    #[error("invalid schematic: {0}")]
    InvalidSchematic(String),

    #[error("invalid content definitions: {0}")]
    Content(String),

    #[error("image encoding failed: {0}")]
    Image(String),

    #[error("render context poisoned by an earlier panic")]
    ContextPoisoned,

    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    pub fn corrupt(region: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptContainer { region, reason: reason.into() }
    }

    /// Whether the failure was caused by the uploaded bytes rather than by
    /// this process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedHeader(_) | Self::CorruptContainer { .. } | Self::InvalidSchematic(_)
        )
    }

    pub fn status(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(Error::MalformedHeader("bad magic".into()).status(), 400);
        assert_eq!(Error::corrupt("meta", "length mismatch").status(), 400);
        assert_eq!(Error::InvalidSchematic("too large".into()).status(), 400);
        assert_eq!(Error::Image("png".into()).status(), 500);
        assert_eq!(Error::ContextPoisoned.status(), 500);
    }

    #[test]
    fn test_corrupt_message_names_region() {
        let err = Error::corrupt("preview_map", "read length mismatch");
        assert_eq!(err.to_string(), "error reading region \"preview_map\": read length mismatch");
    }
}

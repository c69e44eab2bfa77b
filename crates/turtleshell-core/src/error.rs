use thiserror::Error;

/// Errors that can occur during TurtleShell core operations.
#[derive(Debug, Error)]
pub enum TurtleError {
    /// The input word or line is empty or contains only whitespace.
    #[error("input is empty or whitespace-only")]
    EmptyInput,

    /// A segmented line could not be turned into a morph list.
    #[error("malformed segmentation line: {line:?}")]
    MalformedLine {
        /// The offending line.
        line: String,
    },

    /// A word has no boundary-label string in the split's lookup.
    #[error("no boundary labels for word {word:?}")]
    MissingLabels {
        /// The word whose labels are missing.
        word: String,
    },

    /// A boundary-label string does not align with its word.
    #[error("label string for {word:?} has {got} tags, expected {expected}")]
    LabelLengthMismatch {
        word: String,
        expected: usize,
        got: usize,
    },

    /// A character outside the tag alphabet was found in a label string.
    #[error("unknown boundary tag {0:?}")]
    UnknownTag(char),

    /// Feature and label batches handed to the model do not line up.
    #[error("batch shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An invalid configuration value was provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The sequence model failed to train or predict.
    #[error("model error: {0}")]
    Model(String),

    /// A model artifact could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for TurtleShell core operations.
pub type Result<T> = std::result::Result<T, TurtleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = TurtleError::EmptyInput;
        assert_eq!(err.to_string(), "input is empty or whitespace-only");

        let err = TurtleError::MissingLabels {
            word: "birds".into(),
        };
        assert!(err.to_string().contains("birds"));

        let err = TurtleError::LabelLengthMismatch {
            word: "cats".into(),
            expected: 4,
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "label string for \"cats\" has 3 tags, expected 4"
        );
    }

    #[test]
    fn serde_errors_convert() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: TurtleError = parse.unwrap_err().into();
        assert!(matches!(err, TurtleError::Serialization(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TurtleError>();
    }
}

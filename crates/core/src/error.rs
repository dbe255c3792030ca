use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveOpsError {
    #[error("Failed to decode document '{id}': {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document '{0}' is not a JSON object")]
    InvalidDocument(String),
}

impl LiveOpsError {
    pub fn decode(id: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            id: id.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_document() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let message = LiveOpsError::decode("J1", source).to_string();
        assert!(message.starts_with("Failed to decode document 'J1'"));
        assert_eq!(
            LiveOpsError::InvalidDocument("J2".into()).to_string(),
            "Document 'J2' is not a JSON object"
        );
    }
}

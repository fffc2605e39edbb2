use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid stream url {url}: {source}")]
    UrlParse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Stream failed to load: {reason}")]
    Load { reason: String },
    #[error("Collaborator call failed: {0:#}")]
    Collaborator(#[from] anyhow::Error),
    #[error("Session is already mounted")]
    AlreadyMounted,
    #[error("Session has been torn down")]
    TornDown,
}

pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn collaborator_message_keeps_the_root_cause() {
        let err = StreamError::Collaborator(
            anyhow!("database is locked").context("record listening session"),
        );
        let rendered = err.to_string();
        assert!(rendered.contains("record listening session"));
        assert!(rendered.contains("database is locked"));
    }
}

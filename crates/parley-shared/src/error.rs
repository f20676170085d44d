use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is not valid base64")]
    Encoding,

    #[error("Token payload is malformed: {0}")]
    Malformed(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer key")]
    InvalidIssuerKey,

    #[error("Token signature does not verify")]
    BadSignature,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdParseError {
    #[error("Invalid {kind} id: {source}")]
    Invalid {
        kind: &'static str,
        #[source]
        source: uuid::Error,
    },
}

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DrestError {
    #[error("[DR401] authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("[DR404] {url} does not exist")]
    DoesNotExist { url: String },
    #[error("[DR400] request rejected with status {status}: {body}")]
    BadRequest { status: u16, body: String },
    #[error("[DR500] request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("[DR502] invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
    #[error("[DR422] record {record} has no field '{field}'")]
    MissingField { record: String, field: String },
    #[error("[DR420] invalid record data: {0}")]
    InvalidData(String),
    #[error("[DR100] invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl DrestError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "DR401",
            Self::DoesNotExist { .. } => "DR404",
            Self::BadRequest { .. } => "DR400",
            Self::Transport { .. } => "DR500",
            Self::InvalidResponse { .. } => "DR502",
            Self::MissingField { .. } => "DR422",
            Self::InvalidData(_) => "DR420",
            Self::InvalidConfig(_) => "DR100",
        }
    }

    /// Maps an HTTP status to the matching error, or `None` for successes.
    pub(crate) fn from_status(status: u16, url: &str, body: &[u8]) -> Option<Self> {
        match status {
            401 => Some(Self::AuthenticationFailed(body_text(body))),
            404 => Some(Self::DoesNotExist {
                url: url.to_string(),
            }),
            status if status >= 400 => Some(Self::BadRequest {
                status,
                body: body_text(body),
            }),
            _ => None,
        }
    }
}

pub type Result<T, E = DrestError> = std::result::Result<T, E>;

fn body_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "no response body".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_error_kinds() {
        assert!(matches!(
            DrestError::from_status(401, "u", b""),
            Some(DrestError::AuthenticationFailed(_))
        ));
        assert_eq!(
            DrestError::from_status(404, "https://api/users/1", b"{}"),
            Some(DrestError::DoesNotExist {
                url: "https://api/users/1".into()
            })
        );
        assert_eq!(
            DrestError::from_status(422, "u", b" {\"name\": [\"bad\"]} "),
            Some(DrestError::BadRequest {
                status: 422,
                body: "{\"name\": [\"bad\"]}".into()
            })
        );
        assert_eq!(DrestError::from_status(204, "u", b""), None);
        assert_eq!(DrestError::from_status(302, "u", b""), None);
    }

    #[test]
    fn messages_carry_codes() {
        let err = DrestError::BadRequest {
            status: 400,
            body: "no response body".into(),
        };
        assert!(err.to_string().starts_with("[DR400]"));
        assert_eq!(err.code(), "DR400");
    }
}

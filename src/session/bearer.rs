use crate::core_types::SessionToken;
use crate::error::ServiceError;

/// Response header carrying the rotated session token
pub const AUTH_TOKEN_HEADER: &str = "Auth-Token";

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the session token from an `Authorization: Bearer <uuid>` value
pub fn parse_bearer(header: &str) -> Result<SessionToken, ServiceError> {
    let header = header.trim();
    if !header.starts_with(BEARER_PREFIX) {
        return Err(ServiceError::InvalidBearer);
    }
    header[BEARER_PREFIX.len()..]
        .parse()
        .map_err(|_| ServiceError::InvalidBearer)
}

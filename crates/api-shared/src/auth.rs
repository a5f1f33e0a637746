/// Header carrying the shared-secret token.
pub const TOKEN_HEADER: &str = "x-save-token";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,
}

/// Validates the token supplied with a request against the configured one.
///
/// With no configured token every request passes. Otherwise the header value is used when
/// present and non-empty, falling back to the `token` query parameter, and it must match exactly.
///
/// Returns `Ok(())` if the request is allowed, or `AuthError::Unauthorized` if the token is
/// missing or wrong.
pub fn authorise(
    expected: Option<&str>,
    header: Option<&str>,
    query: Option<&str>,
) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let provided = header.filter(|h| !h.is_empty()).or(query);

    if provided == Some(expected) {
        Ok(())
    } else {
        Err(AuthError::Unauthorized)
    }
}

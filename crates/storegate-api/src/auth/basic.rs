use base64::{engine::general_purpose::STANDARD, Engine as _};

/// User name and password from an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Parse a Basic authorization header value.
///
/// Anything that is not a well-formed Basic header yields `None`; the caller
/// treats the request as anonymous.
pub fn parse_basic_credentials(header: &str) -> Option<Credentials> {
    let scheme = header.get(..6)?;
    if !scheme.eq_ignore_ascii_case("basic ") {
        return None;
    }

    let decoded = STANDARD.decode(header[6..].trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;

    Some(Credentials {
        user: user.to_string(),
        password: password.to_string(),
    })
}

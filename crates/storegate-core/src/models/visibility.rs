use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Binary per-path access flag.
///
/// Tracked independently of whatever permission model the backend has. A path
/// that was never marked is public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub const PUBLIC: &'static str = "public";
    pub const PRIVATE: &'static str = "private";

    /// Coerce a request parameter into a visibility.
    ///
    /// Only the exact literal `"public"` yields [`Visibility::Public`]; any other
    /// value (including a differently cased one) is private.
    pub fn coerce(value: &str) -> Self {
        if value == Self::PUBLIC {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    /// Coerce an optional parameter, falling back to private when absent.
    pub fn coerce_or_private(value: Option<&str>) -> Self {
        value.map(Self::coerce).unwrap_or(Visibility::Private)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => Self::PUBLIC,
            Visibility::Private => Self::PRIVATE,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Visibility::Private)
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

use std::fmt;

/// Errors raised while declaring routes or generating URLs from them.
///
/// Definition-time variants are returned from the builder the moment a route is
/// declared; `NamedRouteNotFound` is the only one that surfaces from
/// [`Router::generate`](super::Router::generate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// A condition pattern did not compile into a regular expression
    InvalidPattern {
        /// Condition key the pattern belongs to (`path`, `method`, ...)
        key: String,
        /// The regex source after placeholder substitution
        source: String,
        /// Message reported by the regex engine
        message: String,
    },
    /// An output param template references a placeholder no scope declares
    UnknownPlaceholder {
        /// Output param whose template failed to resolve
        param: String,
        /// The placeholder name as written, without the leading `:`
        placeholder: String,
    },
    /// `generate` was called with a name no route carries
    NamedRouteNotFound(String),
    /// A name was attached to a route whose path cannot be rebuilt
    NotReversible {
        /// The requested route name
        name: String,
        /// Why no segment list could be derived
        reason: String,
    },
    /// A route can only be named once
    AlreadyNamed {
        /// Name the route already carries
        existing: String,
        /// Name that was requested afterwards
        requested: String,
    },
    /// Builder options that cannot be combined
    InvalidOptions(String),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::InvalidPattern {
                key,
                source,
                message,
            } => write!(
                f,
                "invalid pattern for condition '{key}': /{source}/ ({message})"
            ),
            RouteError::UnknownPlaceholder { param, placeholder } => write!(
                f,
                "placeholder not found while compiling routes: :{placeholder} (in param '{param}')"
            ),
            RouteError::NamedRouteNotFound(name) => write!(f, "named route not found: {name}"),
            RouteError::NotReversible { name, reason } => {
                write!(f, "route '{name}' cannot be used for URL generation: {reason}")
            }
            RouteError::AlreadyNamed {
                existing,
                requested,
            } => write!(
                f,
                "route is already named '{existing}', cannot rename it to '{requested}'"
            ),
            RouteError::InvalidOptions(message) => write!(f, "invalid route options: {message}"),
        }
    }
}

impl std::error::Error for RouteError {}

//! Error kinds raised by the resolver.
//!
//! Plain enums with hand-written `Display`/`Error` impls, matching the
//! reference implementation's idiom: this crate never pulls in
//! `thiserror` or `anyhow`.

use std::fmt;

/// Errors surfaced to a caller of [`crate::Resolver::resolve`] or
/// [`crate::Resolver::query`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResolveError {
    /// The caller passed a bad argument: an out-of-range `type`, or a
    /// `type_restriction` other than A/AAAA. Raised synchronously,
    /// before any I/O, never as a panic.
    Programmer(ProgrammerError),
    /// The queried type has no answers, either an authoritative
    /// negative from a server or a cached empty answer list.
    NoRecord(NoRecordException),
    /// The query itself failed: bad rcode, malformed response,
    /// truncation on TCP, or all attempts exhausted.
    Resolution(ResolutionException),
    /// `resolve`'s parallel A/AAAA branch: both sub-queries failed.
    Aggregate(AggregateResolutionException),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::Programmer(e) => write!(f, "{e}"),
            ResolveError::NoRecord(e) => write!(f, "{e}"),
            ResolveError::Resolution(e) => write!(f, "{e}"),
            ResolveError::Aggregate(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Programmer(e) => Some(e),
            ResolveError::NoRecord(e) => Some(e),
            ResolveError::Resolution(e) => Some(e),
            ResolveError::Aggregate(e) => Some(e),
        }
    }
}

impl From<ProgrammerError> for ResolveError {
    fn from(e: ProgrammerError) -> Self {
        ResolveError::Programmer(e)
    }
}

impl From<NoRecordException> for ResolveError {
    fn from(e: NoRecordException) -> Self {
        ResolveError::NoRecord(e)
    }
}

impl From<ResolutionException> for ResolveError {
    fn from(e: ResolutionException) -> Self {
        ResolveError::Resolution(e)
    }
}

impl From<AggregateResolutionException> for ResolveError {
    fn from(e: AggregateResolutionException) -> Self {
        ResolveError::Aggregate(e)
    }
}

/// The caller asked for something this resolver cannot do: currently
/// just a name that fails normalization. (Both halves of the core
/// spec's "programmer error" kind that the type system can enforce
/// instead are: a `type_restriction` other than A/AAAA is rejected by
/// `RecordType` only having those two variants, and a `type` outside
/// `[0, 65535]` cannot arise since `query`'s `rtype` parameter is
/// itself a `u16`.)
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProgrammerError {
    InvalidName { name: String },
}

impl fmt::Display for ProgrammerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProgrammerError::InvalidName { name } => write!(f, "'{name}' is not a valid DNS name"),
        }
    }
}

impl std::error::Error for ProgrammerError {}

/// The queried `(name, type)` has no answers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NoRecordException {
    pub message: String,
}

impl NoRecordException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for NoRecordException {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for NoRecordException {}

/// A query against the upstream nameservers failed outright.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolutionException {
    pub message: String,
}

impl ResolutionException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ResolutionException {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ResolutionException {}

/// Both the A and AAAA branches of an untyped `resolve` failed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AggregateResolutionException {
    pub message: String,
    pub causes: Vec<ResolveError>,
}

impl AggregateResolutionException {
    pub fn new(message: impl Into<String>, causes: Vec<ResolveError>) -> Self {
        Self {
            message: message.into(),
            causes,
        }
    }
}

impl fmt::Display for AggregateResolutionException {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for cause in &self.causes {
            write!(f, "; {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateResolutionException {}

/// An internal transport failure inside `Server::ask`. Never surfaces
/// directly to a caller: the engine consumes it as a failed attempt
/// and only turns it into a `ResolutionException` if it was the last
/// attempt available.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TransportError {
    Timeout,
    Io { message: String },
    Truncated,
    NoMatchingResponse,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "timed out"),
            TransportError::Io { message } => write!(f, "I/O error: {message}"),
            TransportError::Truncated => write!(f, "response truncated"),
            TransportError::NoMatchingResponse => write!(f, "no matching response"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors loading a [`crate::config::Config`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfigLoadError {
    Source { message: String },
    Deserialize { message: String },
}

impl fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigLoadError::Source { message } => write!(f, "could not load configuration: {message}"),
            ConfigLoadError::Deserialize { message } => {
                write!(f, "could not parse configuration: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigLoadError {}

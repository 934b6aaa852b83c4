//! Error type for binding and invocation, separating failures by origin.
//!
//! Keeping wrapper-originated failures (bad descriptors, mismatched
//! arguments, failed resolution) distinct from exceptions raised by foreign
//! code lets callers handle recovery policies accurately without string
//! matching. Nothing here is retried: binding failures kill the proxy under
//! construction, invocation failures abort only that invocation.

use std::{error, fmt};

use crate::env::ForeignError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Identifies the member involved in a resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Declared member name (`<init>` for constructors).
    pub name: String,
    /// The descriptor string the lookup was attempted with.
    pub descriptor: String,
}

/// Any failure surfaced by the binding and marshalling engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A descriptor string does not follow the descriptor grammar.
    MalformedDescriptor {
        /// The offending descriptor string.
        descriptor: String,
        /// What made it unparseable.
        reason: String,
    },
    /// A binding declaration is unusable: missing class path, duplicate or
    /// undeclared member, or an instance member used without an instance.
    Configuration(String),
    /// The foreign runtime knows no class or member matching a declaration.
    Resolution {
        /// Class path the lookup ran against.
        class_path: String,
        /// The member looked up, or `None` when the class itself was not found.
        member: Option<MemberRef>,
    },
    /// An invocation supplied a different number of arguments than the
    /// member's descriptor declares.
    ArgumentCount {
        /// Member name the invocation targeted.
        name: String,
        /// Argument count fixed by the parsed descriptor.
        expected: usize,
        /// Argument count actually supplied.
        actual: usize,
    },
    /// A host value cannot be converted to the declared foreign type.
    TypeMismatch {
        /// What the descriptor token requires.
        expected: String,
        /// What was supplied instead.
        actual: String,
    },
    /// A constructor completed without producing an instance.
    Instantiation {
        /// Class path of the failed construction.
        class_path: String,
    },
    /// The foreign runtime failed to allocate an object, string, or array.
    Allocation {
        /// What was being allocated.
        what: String,
    },
    /// Foreign code raised an exception during a call.
    Foreign(ForeignError),
}

impl BridgeError {
    pub(crate) fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedDescriptor { descriptor, reason } => {
                write!(f, "malformed descriptor `{descriptor}`: {reason}")
            }
            Self::Configuration(message) => write!(f, "{message}"),
            Self::Resolution {
                class_path,
                member: Some(member),
            } => write!(
                f,
                "class {class_path} has no member `{}` with descriptor `{}`",
                member.name, member.descriptor
            ),
            Self::Resolution { class_path, member: None } => {
                write!(f, "class {class_path} not found")
            }
            Self::ArgumentCount { name, expected, actual } => {
                write!(f, "`{name}` expects {expected} arguments, {actual} supplied")
            }
            Self::TypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            Self::Instantiation { class_path } => {
                write!(f, "constructor for {class_path} produced no instance")
            }
            Self::Allocation { what } => write!(f, "foreign allocation failed: {what}"),
            Self::Foreign(error) => write!(f, "foreign exception: {error}"),
        }
    }
}

impl error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Foreign(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ForeignError> for BridgeError {
    fn from(error: ForeignError) -> Self {
        Self::Foreign(error)
    }
}

//! Host-side values crossing the invocation boundary.

use crate::env::JObject;

/// A dynamically typed host value passed to or returned from the foreign
/// runtime.
///
/// Integers are carried as `i64` regardless of the declared foreign width;
/// narrowing happens during marshalling and is range-checked. Floats are
/// carried as `f64`. A foreign `char` appears on the host side as a
/// single-code-point string.
///
/// `Value` deliberately has no serde support: the `Object` and `Proxy`
/// variants carry live foreign handles, which are only meaningful on the
/// thread and attachment that produced them and must never be persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The null reference (and the result of void-returning calls).
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer of any foreign width up to `long`.
    Int(i64),
    /// A floating-point number of either foreign width.
    Float(f64),
    /// Text, convertible to and from the foreign string class.
    Str(String),
    /// An ordered sequence, convertible to and from a one-dimensional array.
    List(Vec<Value>),
    /// An opaque foreign object the marshaller left unconverted.
    Object(JavaObject),
    /// A bound proxy's instance, usable where its class path is declared.
    Proxy(ProxyHandle),
}

impl Value {
    /// A short name for the value's shape, used in mismatch errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Proxy(_) => "proxy",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

/// A borrowed foreign object the engine does not interpret.
///
/// Produced whenever a call returns an object of a class the marshaller does
/// not convert. It carries no type information and is never dereferenced by
/// the engine; its only use is being passed back into later calls. The
/// underlying handle is owned by the foreign runtime and valid only for the
/// current thread's attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JavaObject {
    handle: JObject,
}

impl JavaObject {
    /// Wraps a foreign object handle.
    #[must_use]
    pub const fn new(handle: JObject) -> Self {
        Self { handle }
    }

    /// The wrapped handle, for passing back to the environment.
    #[must_use]
    pub const fn handle(self) -> JObject {
        self.handle
    }
}

/// A bound proxy's identity: its declared class path plus its instance.
///
/// Passed as an argument, it satisfies exactly the class-reference tokens
/// whose path equals the declared path; anything else is a type mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHandle {
    class_path: String,
    instance: JObject,
}

impl ProxyHandle {
    /// Creates a handle from a declared class path and a live instance.
    #[must_use]
    pub fn new(class_path: impl Into<String>, instance: JObject) -> Self {
        Self {
            class_path: class_path.into(),
            instance,
        }
    }

    /// The class path the proxy was declared with.
    #[must_use]
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    /// The underlying instance handle.
    #[must_use]
    pub fn instance(&self) -> JObject {
        self.instance
    }
}

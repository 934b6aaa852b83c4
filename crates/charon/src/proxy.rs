//! Proxy declaration and binding.
//!
//! A [`ProxySpec`] is an explicit registration list: the declared class path,
//! an optional constructor descriptor, and every member the proxy exposes.
//! Binding resolves the class, then the instance (constructed or adopted),
//! then every declared member, in that order and all-or-nothing: a proxy
//! whose construction fails at any step is never observable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    descriptor::{FieldDescriptor, MethodDescriptor},
    dispatch::{self, FieldBinding, MethodBinding},
    env::{JClass, JObject, JvmEnv},
    error::{BridgeError, Result},
    resolve,
    value::{JavaObject, ProxyHandle, Value},
};

const DEFAULT_CONSTRUCTOR: &str = "()V";

/// Whether a declared member is invoked or accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    /// A callable member with a method descriptor.
    Method,
    /// A readable/writable member with a field descriptor.
    Field,
}

/// One declared member: name, descriptor string, kind, and dispatch flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    name: String,
    descriptor: String,
    kind: MemberKind,
    #[serde(rename = "static", default)]
    is_static: bool,
}

impl MemberSpec {
    /// The declared member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared descriptor string.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Whether this member is a method or a field.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Whether this member dispatches statically.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

/// The declaration a proxy is bound from.
///
/// Built once at definition time, either through the builder methods or by
/// deserializing a declaration table. The declaration itself is inert data;
/// every descriptor in it is parsed and resolved when a proxy binds against
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySpec {
    class_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constructor: Option<String>,
    #[serde(default)]
    members: Vec<MemberSpec>,
}

impl ProxySpec {
    /// Starts a declaration for the given foreign class path.
    #[must_use]
    pub fn new(class_path: impl Into<String>) -> Self {
        Self {
            class_path: class_path.into(),
            constructor: None,
            members: Vec::new(),
        }
    }

    /// Declares the constructor descriptor. Without this, binding uses the
    /// no-argument constructor.
    #[must_use]
    pub fn constructor(mut self, descriptor: impl Into<String>) -> Self {
        self.constructor = Some(descriptor.into());
        self
    }

    /// Declares an instance method.
    #[must_use]
    pub fn method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.member(name, descriptor, MemberKind::Method, false)
    }

    /// Declares a static method.
    #[must_use]
    pub fn static_method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.member(name, descriptor, MemberKind::Method, true)
    }

    /// Declares an instance field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.member(name, descriptor, MemberKind::Field, false)
    }

    /// Declares a static field.
    #[must_use]
    pub fn static_field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.member(name, descriptor, MemberKind::Field, true)
    }

    fn member(mut self, name: impl Into<String>, descriptor: impl Into<String>, kind: MemberKind, is_static: bool) -> Self {
        self.members.push(MemberSpec {
            name: name.into(),
            descriptor: descriptor.into(),
            kind,
            is_static,
        });
        self
    }

    /// The declared class path.
    #[must_use]
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    /// The constructor descriptor binding will use.
    #[must_use]
    pub fn constructor_descriptor(&self) -> &str {
        self.constructor.as_deref().unwrap_or(DEFAULT_CONSTRUCTOR)
    }

    /// The declared members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[MemberSpec] {
        &self.members
    }
}

/// A bound proxy for one foreign class, optionally holding one instance.
///
/// All resolution happened when the proxy was created; afterwards the
/// bindings are immutable and every call, read, or write goes straight to
/// the foreign runtime. The proxy borrows its environment, so it cannot
/// outlive the thread attachment it was bound on.
#[derive(Debug)]
pub struct Proxy<'env, E: JvmEnv> {
    env: &'env E,
    class_path: String,
    class: JClass,
    instance: Option<JObject>,
    methods: IndexMap<String, MethodBinding>,
    fields: IndexMap<String, FieldBinding>,
}

impl<'env, E: JvmEnv> Proxy<'env, E> {
    /// Binds a proxy and constructs its foreign instance.
    ///
    /// The constructor descriptor is the declared one or `()V`; the supplied
    /// argument count must match it exactly.
    pub fn bind(env: &'env E, spec: &ProxySpec, constructor_args: &[Value]) -> Result<Self> {
        let class = declared_class(env, spec)?;
        let descriptor = constructor_descriptor(spec)?;
        let instance = dispatch::construct(env, class, spec.class_path(), &descriptor, constructor_args)?;
        Self::finish(env, spec, class, Some(instance))
    }

    /// Binds a proxy for static-only usage, without constructing an instance.
    ///
    /// Instance members still resolve; invoking one fails until an instance
    /// exists.
    pub fn bind_static(env: &'env E, spec: &ProxySpec) -> Result<Self> {
        let class = declared_class(env, spec)?;
        Self::finish(env, spec, class, None)
    }

    /// Binds a proxy around an already-live foreign instance.
    pub fn adopt(env: &'env E, spec: &ProxySpec, instance: JavaObject) -> Result<Self> {
        let class = declared_class(env, spec)?;
        Self::finish(env, spec, class, Some(instance.handle()))
    }

    fn finish(env: &'env E, spec: &ProxySpec, class: JClass, instance: Option<JObject>) -> Result<Self> {
        let (methods, fields) = bind_members(env, class, spec)?;
        debug!(
            class = spec.class_path(),
            methods = methods.len(),
            fields = fields.len(),
            "proxy bound"
        );
        Ok(Self {
            env,
            class_path: spec.class_path().to_owned(),
            class,
            instance,
            methods,
            fields,
        })
    }

    /// Invokes a declared method with host arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let binding = self
            .methods
            .get(name)
            .ok_or_else(|| BridgeError::Configuration(format!("no method `{name}` declared on {}", self.class_path)))?;
        dispatch::call_method(self.env, self.class, self.instance, name, binding, args)
    }

    /// Reads a declared field.
    pub fn get(&self, name: &str) -> Result<Value> {
        let binding = self.field_binding(name)?;
        dispatch::read_field(self.env, self.class, self.instance, name, binding)
    }

    /// Writes a declared field.
    pub fn set(&self, name: &str, value: &Value) -> Result<()> {
        let binding = self.field_binding(name)?;
        dispatch::write_field(self.env, self.class, self.instance, name, binding, value)
    }

    fn field_binding(&self, name: &str) -> Result<&FieldBinding> {
        self.fields
            .get(name)
            .ok_or_else(|| BridgeError::Configuration(format!("no field `{name}` declared on {}", self.class_path)))
    }

    /// The class path this proxy was declared with.
    #[must_use]
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    /// The wrapped instance, if one was constructed or adopted.
    #[must_use]
    pub fn instance(&self) -> Option<JavaObject> {
        self.instance.map(JavaObject::new)
    }

    /// This proxy's instance as a host value, for passing it to members of
    /// other proxies that declare this class path.
    #[must_use]
    pub fn instance_value(&self) -> Option<Value> {
        self.instance
            .map(|instance| Value::Proxy(ProxyHandle::new(self.class_path.clone(), instance)))
    }
}

fn declared_class<E: JvmEnv>(env: &E, spec: &ProxySpec) -> Result<JClass> {
    if spec.class_path().is_empty() {
        return Err(BridgeError::Configuration(
            "binding declaration is missing a class path".to_owned(),
        ));
    }
    resolve::resolve_class(env, spec.class_path())
}

fn constructor_descriptor(spec: &ProxySpec) -> Result<MethodDescriptor> {
    let raw = spec.constructor_descriptor();
    let descriptor = MethodDescriptor::parse(raw)?;
    if !descriptor.return_type().is_void() {
        return Err(BridgeError::MalformedDescriptor {
            descriptor: raw.to_owned(),
            reason: "constructor descriptors return `V`".to_owned(),
        });
    }
    Ok(descriptor)
}

#[expect(clippy::type_complexity, reason = "internal pair of member tables")]
fn bind_members<E: JvmEnv>(
    env: &E,
    class: JClass,
    spec: &ProxySpec,
) -> Result<(IndexMap<String, MethodBinding>, IndexMap<String, FieldBinding>)> {
    let mut methods = IndexMap::new();
    let mut fields = IndexMap::new();
    for member in spec.members() {
        if methods.contains_key(member.name()) || fields.contains_key(member.name()) {
            return Err(BridgeError::Configuration(format!(
                "member `{}` declared more than once on {}",
                member.name(),
                spec.class_path()
            )));
        }
        match member.kind() {
            MemberKind::Method => {
                let descriptor = MethodDescriptor::parse(member.descriptor())?;
                let id = resolve::resolve_method(env, class, spec.class_path(), member.name(), &descriptor, member.is_static())?;
                methods.insert(
                    member.name().to_owned(),
                    MethodBinding {
                        descriptor,
                        id,
                        is_static: member.is_static(),
                    },
                );
            }
            MemberKind::Field => {
                let descriptor = FieldDescriptor::parse(member.descriptor())?;
                let id = resolve::resolve_field(env, class, spec.class_path(), member.name(), &descriptor, member.is_static())?;
                fields.insert(
                    member.name().to_owned(),
                    FieldBinding {
                        descriptor,
                        id,
                        is_static: member.is_static(),
                    },
                );
            }
        }
    }
    Ok((methods, fields))
}

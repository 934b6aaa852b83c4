//! Strict member resolution against the live foreign runtime.
//!
//! Each resolution is a single lookup with the exact descriptor string the
//! parser validated; there is no overload matching and no caching across
//! proxy instances. A null lookup result becomes a typed error carrying the
//! class path and member identity, never a usable handle.

use tracing::debug;

use crate::{
    descriptor::{FieldDescriptor, MethodDescriptor},
    env::{JClass, JFieldId, JMethodId, JvmEnv},
    error::{BridgeError, MemberRef, Result},
};

const CONSTRUCTOR_NAME: &str = "<init>";

pub(crate) fn resolve_class<E: JvmEnv>(env: &E, class_path: &str) -> Result<JClass> {
    match env.find_class(class_path) {
        Some(class) => {
            debug!(class = class_path, "resolved class");
            Ok(class)
        }
        None => {
            // The runtime reports an unknown class both as a null handle and
            // as a pending exception; the latter is drained here so it cannot
            // leak into the next call.
            env.take_pending_exception();
            Err(BridgeError::Resolution {
                class_path: class_path.to_owned(),
                member: None,
            })
        }
    }
}

pub(crate) fn resolve_constructor<E: JvmEnv>(
    env: &E,
    class: JClass,
    class_path: &str,
    descriptor: &MethodDescriptor,
) -> Result<JMethodId> {
    env.get_method_id(class, CONSTRUCTOR_NAME, descriptor.raw())
        .ok_or_else(|| unresolved(env, class_path, CONSTRUCTOR_NAME, descriptor.raw()))
}

pub(crate) fn resolve_method<E: JvmEnv>(
    env: &E,
    class: JClass,
    class_path: &str,
    name: &str,
    descriptor: &MethodDescriptor,
    is_static: bool,
) -> Result<JMethodId> {
    let id = if is_static {
        env.get_static_method_id(class, name, descriptor.raw())
    } else {
        env.get_method_id(class, name, descriptor.raw())
    };
    let id = id.ok_or_else(|| unresolved(env, class_path, name, descriptor.raw()))?;
    debug!(class = class_path, method = name, descriptor = descriptor.raw(), "resolved method");
    Ok(id)
}

pub(crate) fn resolve_field<E: JvmEnv>(
    env: &E,
    class: JClass,
    class_path: &str,
    name: &str,
    descriptor: &FieldDescriptor,
    is_static: bool,
) -> Result<JFieldId> {
    let id = if is_static {
        env.get_static_field_id(class, name, descriptor.raw())
    } else {
        env.get_field_id(class, name, descriptor.raw())
    };
    let id = id.ok_or_else(|| unresolved(env, class_path, name, descriptor.raw()))?;
    debug!(class = class_path, field = name, descriptor = descriptor.raw(), "resolved field");
    Ok(id)
}

fn unresolved<E: JvmEnv>(env: &E, class_path: &str, name: &str, descriptor: &str) -> BridgeError {
    env.take_pending_exception();
    BridgeError::Resolution {
        class_path: class_path.to_owned(),
        member: Some(MemberRef {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        }),
    }
}

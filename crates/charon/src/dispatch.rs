//! Invocation against resolved members.
//!
//! Every entry point follows the same shape: check the argument count before
//! anything else, marshal into an exactly sized buffer, issue the one foreign
//! call selected by the return or field type code and the static flag, drain
//! any foreign exception, convert the result. The call variants are parallel
//! branches with identical pre and post conditions; only the underlying
//! entry point differs.

use tracing::trace;

use crate::{
    descriptor::{FieldDescriptor, MethodDescriptor, PrimKind, TypeToken},
    env::{CallTarget, JClass, JFieldId, JMethodId, JObject, JValue, JvmEnv},
    error::{BridgeError, Result},
    marshal::{
        as_jboolean, as_jbyte, as_jchar, as_jdouble, as_jfloat, as_jint, as_jlong, as_jshort, char_value,
        check_foreign, marshal_argument, marshal_args, unmarshal_object,
    },
    resolve,
    value::Value,
};

/// A method bound against one proxy instance: descriptor, resolved id, and
/// dispatch flavor. Created once at proxy construction, never re-resolved.
#[derive(Debug, Clone)]
pub(crate) struct MethodBinding {
    pub(crate) descriptor: MethodDescriptor,
    pub(crate) id: JMethodId,
    pub(crate) is_static: bool,
}

/// A field bound against one proxy instance.
#[derive(Debug, Clone)]
pub(crate) struct FieldBinding {
    pub(crate) descriptor: FieldDescriptor,
    pub(crate) id: JFieldId,
    pub(crate) is_static: bool,
}

fn call_target(class: JClass, instance: Option<JObject>, is_static: bool, name: &str) -> Result<CallTarget> {
    if is_static {
        Ok(CallTarget::Static(class))
    } else {
        instance.map(CallTarget::Instance).ok_or_else(|| {
            BridgeError::Configuration(format!("instance member `{name}` requires a constructed or adopted instance"))
        })
    }
}

/// Invokes a bound method with host arguments.
pub(crate) fn call_method<E: JvmEnv>(
    env: &E,
    class: JClass,
    instance: Option<JObject>,
    name: &str,
    binding: &MethodBinding,
    args: &[Value],
) -> Result<Value> {
    let expected = binding.descriptor.arg_count();
    if args.len() != expected {
        return Err(BridgeError::ArgumentCount {
            name: name.to_owned(),
            expected,
            actual: args.len(),
        });
    }
    let target = call_target(class, instance, binding.is_static, name)?;
    let buffer = marshal_args(env, binding.descriptor.arg_types(), args)?;
    trace!(method = name, descriptor = binding.descriptor.raw(), "invoking");
    dispatch_call(env, target, binding.id, &buffer, binding.descriptor.return_type())
}

fn dispatch_call<E: JvmEnv>(
    env: &E,
    target: CallTarget,
    method: JMethodId,
    args: &[JValue],
    ret: &TypeToken,
) -> Result<Value> {
    match ret {
        TypeToken::Void => {
            env.call_void_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Null)
        }
        TypeToken::Prim(PrimKind::Boolean) => {
            let result = env.call_boolean_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Bool(result))
        }
        TypeToken::Prim(PrimKind::Byte) => {
            let result = env.call_byte_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Int(i64::from(result)))
        }
        TypeToken::Prim(PrimKind::Char) => {
            let result = env.call_char_method(target, method, args);
            check_foreign(env)?;
            Ok(char_value(result))
        }
        TypeToken::Prim(PrimKind::Short) => {
            let result = env.call_short_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Int(i64::from(result)))
        }
        TypeToken::Prim(PrimKind::Int) => {
            let result = env.call_int_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Int(i64::from(result)))
        }
        TypeToken::Prim(PrimKind::Long) => {
            let result = env.call_long_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Int(result))
        }
        TypeToken::Prim(PrimKind::Float) => {
            let result = env.call_float_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Float(f64::from(result)))
        }
        TypeToken::Prim(PrimKind::Double) => {
            let result = env.call_double_method(target, method, args);
            check_foreign(env)?;
            Ok(Value::Float(result))
        }
        TypeToken::Class(_) | TypeToken::PrimArray(_) | TypeToken::ClassArray(_) => {
            let result = env.call_object_method(target, method, args);
            check_foreign(env)?;
            unmarshal_object(env, ret, result)
        }
    }
}

/// Resolves and invokes a constructor, producing the new instance.
pub(crate) fn construct<E: JvmEnv>(
    env: &E,
    class: JClass,
    class_path: &str,
    descriptor: &MethodDescriptor,
    args: &[Value],
) -> Result<JObject> {
    let expected = descriptor.arg_count();
    if args.len() != expected {
        return Err(BridgeError::ArgumentCount {
            name: "<init>".to_owned(),
            expected,
            actual: args.len(),
        });
    }
    let buffer = marshal_args(env, descriptor.arg_types(), args)?;
    let constructor = resolve::resolve_constructor(env, class, class_path, descriptor)?;
    trace!(class = class_path, descriptor = descriptor.raw(), "constructing");
    match env.new_object(class, constructor, &buffer) {
        Some(instance) => {
            check_foreign(env)?;
            Ok(instance)
        }
        None => match env.take_pending_exception() {
            Some(error) => Err(BridgeError::Foreign(error)),
            None => Err(BridgeError::Instantiation {
                class_path: class_path.to_owned(),
            }),
        },
    }
}

/// Reads a bound field as a host value.
pub(crate) fn read_field<E: JvmEnv>(
    env: &E,
    class: JClass,
    instance: Option<JObject>,
    name: &str,
    binding: &FieldBinding,
) -> Result<Value> {
    let target = call_target(class, instance, binding.is_static, name)?;
    trace!(field = name, descriptor = binding.descriptor.raw(), "reading field");
    match binding.descriptor.field_type() {
        TypeToken::Prim(PrimKind::Boolean) => {
            let result = env.get_boolean_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Bool(result))
        }
        TypeToken::Prim(PrimKind::Byte) => {
            let result = env.get_byte_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Int(i64::from(result)))
        }
        TypeToken::Prim(PrimKind::Char) => {
            let result = env.get_char_field(target, binding.id);
            check_foreign(env)?;
            Ok(char_value(result))
        }
        TypeToken::Prim(PrimKind::Short) => {
            let result = env.get_short_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Int(i64::from(result)))
        }
        TypeToken::Prim(PrimKind::Int) => {
            let result = env.get_int_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Int(i64::from(result)))
        }
        TypeToken::Prim(PrimKind::Long) => {
            let result = env.get_long_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Int(result))
        }
        TypeToken::Prim(PrimKind::Float) => {
            let result = env.get_float_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Float(f64::from(result)))
        }
        TypeToken::Prim(PrimKind::Double) => {
            let result = env.get_double_field(target, binding.id);
            check_foreign(env)?;
            Ok(Value::Float(result))
        }
        token @ (TypeToken::Class(_) | TypeToken::PrimArray(_) | TypeToken::ClassArray(_)) => {
            let result = env.get_object_field(target, binding.id);
            check_foreign(env)?;
            unmarshal_object(env, token, result)
        }
        TypeToken::Void => Err(BridgeError::MalformedDescriptor {
            descriptor: binding.descriptor.raw().to_owned(),
            reason: "`V` is only valid as a return type".to_owned(),
        }),
    }
}

/// Writes a host value into a bound field.
pub(crate) fn write_field<E: JvmEnv>(
    env: &E,
    class: JClass,
    instance: Option<JObject>,
    name: &str,
    binding: &FieldBinding,
    value: &Value,
) -> Result<()> {
    let target = call_target(class, instance, binding.is_static, name)?;
    trace!(field = name, descriptor = binding.descriptor.raw(), "writing field");
    match binding.descriptor.field_type() {
        TypeToken::Prim(PrimKind::Boolean) => env.set_boolean_field(target, binding.id, as_jboolean(value)?),
        TypeToken::Prim(PrimKind::Byte) => env.set_byte_field(target, binding.id, as_jbyte(value)?),
        TypeToken::Prim(PrimKind::Char) => env.set_char_field(target, binding.id, as_jchar(value)?),
        TypeToken::Prim(PrimKind::Short) => env.set_short_field(target, binding.id, as_jshort(value)?),
        TypeToken::Prim(PrimKind::Int) => env.set_int_field(target, binding.id, as_jint(value)?),
        TypeToken::Prim(PrimKind::Long) => env.set_long_field(target, binding.id, as_jlong(value)?),
        TypeToken::Prim(PrimKind::Float) => env.set_float_field(target, binding.id, as_jfloat(value)?),
        TypeToken::Prim(PrimKind::Double) => env.set_double_field(target, binding.id, as_jdouble(value)?),
        token @ (TypeToken::Class(_) | TypeToken::PrimArray(_) | TypeToken::ClassArray(_)) => {
            let JValue::Object(object) = marshal_argument(env, token, value)? else {
                return Err(BridgeError::mismatch("an object value", value.kind_name()));
            };
            env.set_object_field(target, binding.id, object);
        }
        TypeToken::Void => {
            return Err(BridgeError::MalformedDescriptor {
                descriptor: binding.descriptor.raw().to_owned(),
                reason: "`V` is only valid as a return type".to_owned(),
            });
        }
    }
    check_foreign(env)
}

//! Bidirectional conversion between host values and foreign representations.
//!
//! The argument direction turns a [`Value`] into a [`JValue`] under a
//! descriptor token; the result direction turns what a call produced back
//! into a [`Value`]. String and array transfer goes through scratch buffers
//! borrowed from the environment: string buffers are released on every exit
//! path, primitive-array buffers only when the runtime reported handing out
//! a copy rather than a direct view.

use smallvec::SmallVec;

use crate::{
    descriptor::{PrimKind, STRING_CLASS, TypeToken},
    env::{JObject, JValue, JvmEnv, LeaseId, PrimArray},
    error::{BridgeError, Result},
    value::{JavaObject, Value},
};

/// Argument buffer for one in-flight call, sized exactly to the argument
/// count and dropped before the call returns.
pub(crate) type ArgBuffer = SmallVec<[JValue; 8]>;

/// Fails with the pending foreign exception, if any operation left one.
pub(crate) fn check_foreign<E: JvmEnv>(env: &E) -> Result<()> {
    match env.take_pending_exception() {
        Some(error) => Err(BridgeError::Foreign(error)),
        None => Ok(()),
    }
}

/// Error for an allocation entry point that returned null: the pending
/// foreign exception when one exists, an allocation failure otherwise.
fn alloc_failed<E: JvmEnv>(env: &E, what: &str) -> BridgeError {
    match env.take_pending_exception() {
        Some(error) => BridgeError::Foreign(error),
        None => BridgeError::Allocation { what: what.to_owned() },
    }
}

/// Converts one host argument under its descriptor token.
pub(crate) fn marshal_argument<E: JvmEnv>(env: &E, token: &TypeToken, value: &Value) -> Result<JValue> {
    match token {
        TypeToken::Prim(kind) => prim_argument(*kind, value),
        TypeToken::Class(path) => object_ref(env, path, value).map(JValue::Object),
        TypeToken::PrimArray(kind) => prim_array_ref(env, *kind, value).map(JValue::Object),
        TypeToken::ClassArray(path) => object_array_ref(env, path, value).map(JValue::Object),
        // The parser never yields void outside return position.
        TypeToken::Void => Err(BridgeError::MalformedDescriptor {
            descriptor: "V".to_owned(),
            reason: "`V` is only valid as a return type".to_owned(),
        }),
    }
}

/// Converts an ordered argument list against its token list. Both slices are
/// the same length; the dispatcher checks the count first.
pub(crate) fn marshal_args<E: JvmEnv>(env: &E, tokens: &[TypeToken], values: &[Value]) -> Result<ArgBuffer> {
    let mut buffer = ArgBuffer::with_capacity(values.len());
    for (token, value) in tokens.iter().zip(values) {
        buffer.push(marshal_argument(env, token, value)?);
    }
    Ok(buffer)
}

fn prim_argument(kind: PrimKind, value: &Value) -> Result<JValue> {
    Ok(match kind {
        PrimKind::Boolean => JValue::Boolean(as_jboolean(value)?),
        PrimKind::Byte => JValue::Byte(as_jbyte(value)?),
        PrimKind::Char => JValue::Char(as_jchar(value)?),
        PrimKind::Short => JValue::Short(as_jshort(value)?),
        PrimKind::Int => JValue::Int(as_jint(value)?),
        PrimKind::Long => JValue::Long(as_jlong(value)?),
        PrimKind::Float => JValue::Float(as_jfloat(value)?),
        PrimKind::Double => JValue::Double(as_jdouble(value)?),
    })
}

pub(crate) fn as_jboolean(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(BridgeError::mismatch("boolean", other.kind_name())),
    }
}

pub(crate) fn as_jbyte(value: &Value) -> Result<i8> {
    match value {
        Value::Int(i) => i8::try_from(*i).map_err(|_| BridgeError::mismatch("byte", format!("int {i} out of range"))),
        other => Err(BridgeError::mismatch("byte", other.kind_name())),
    }
}

/// A foreign `char` is a single UTF-16 code unit; the host form is a string
/// holding exactly one code point within that range.
pub(crate) fn as_jchar(value: &Value) -> Result<u16> {
    let Value::Str(text) = value else {
        return Err(BridgeError::mismatch("char", value.kind_name()));
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => u16::try_from(u32::from(c))
            .map_err(|_| BridgeError::mismatch("char", format!("code point {} out of range", u32::from(c)))),
        _ => Err(BridgeError::mismatch("char", format!("string of {} code points", text.chars().count()))),
    }
}

pub(crate) fn as_jshort(value: &Value) -> Result<i16> {
    match value {
        Value::Int(i) => i16::try_from(*i).map_err(|_| BridgeError::mismatch("short", format!("int {i} out of range"))),
        other => Err(BridgeError::mismatch("short", other.kind_name())),
    }
}

pub(crate) fn as_jint(value: &Value) -> Result<i32> {
    match value {
        Value::Int(i) => i32::try_from(*i).map_err(|_| BridgeError::mismatch("int", format!("int {i} out of range"))),
        other => Err(BridgeError::mismatch("int", other.kind_name())),
    }
}

pub(crate) fn as_jlong(value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(BridgeError::mismatch("long", other.kind_name())),
    }
}

pub(crate) fn as_jfloat(value: &Value) -> Result<f32> {
    match value {
        Value::Float(f) => Ok(*f as f32),
        Value::Int(i) => Ok(*i as f32),
        other => Err(BridgeError::mismatch("float", other.kind_name())),
    }
}

pub(crate) fn as_jdouble(value: &Value) -> Result<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        other => Err(BridgeError::mismatch("double", other.kind_name())),
    }
}

/// Converts a host value into an object reference under a class token.
///
/// Null maps to the null reference, host text to a fresh foreign string when
/// the token names the string class, a bound proxy to its instance when the
/// declared class path matches the token exactly, and an opaque object to
/// its raw handle unchanged.
pub(crate) fn object_ref<E: JvmEnv>(env: &E, class_path: &str, value: &Value) -> Result<Option<JObject>> {
    match value {
        Value::Null => Ok(None),
        Value::Str(text) if class_path == STRING_CLASS => new_string(env, text).map(Some),
        Value::Proxy(proxy) if proxy.class_path() == class_path => Ok(Some(proxy.instance())),
        Value::Proxy(proxy) => Err(BridgeError::mismatch(class_path, proxy.class_path())),
        Value::Object(object) => Ok(Some(object.handle())),
        other => Err(BridgeError::mismatch(class_path, other.kind_name())),
    }
}

fn new_string<E: JvmEnv>(env: &E, text: &str) -> Result<JObject> {
    env.new_string_utf(text).ok_or_else(|| alloc_failed(env, "UTF string"))
}

fn prim_array_ref<E: JvmEnv>(env: &E, kind: PrimKind, value: &Value) -> Result<Option<JObject>> {
    match value {
        Value::Null => Ok(None),
        Value::List(items) => {
            let data = prim_array_data(kind, items)?;
            let length = i32::try_from(data.len())
                .map_err(|_| BridgeError::mismatch(format!("{kind} array"), format!("list of {} items", data.len())))?;
            let Some(array) = env.new_prim_array(kind, length) else {
                return Err(alloc_failed(env, &format!("{kind} array of length {length}")));
            };
            env.set_prim_array_region(array, &data);
            check_foreign(env)?;
            Ok(Some(array))
        }
        other => Err(BridgeError::mismatch(format!("{kind} array"), other.kind_name())),
    }
}

fn prim_array_data(kind: PrimKind, items: &[Value]) -> Result<PrimArray> {
    Ok(match kind {
        PrimKind::Boolean => PrimArray::Boolean(items.iter().map(as_jboolean).collect::<Result<_>>()?),
        PrimKind::Byte => PrimArray::Byte(items.iter().map(as_jbyte).collect::<Result<_>>()?),
        PrimKind::Char => PrimArray::Char(items.iter().map(as_jchar).collect::<Result<_>>()?),
        PrimKind::Short => PrimArray::Short(items.iter().map(as_jshort).collect::<Result<_>>()?),
        PrimKind::Int => PrimArray::Int(items.iter().map(as_jint).collect::<Result<_>>()?),
        PrimKind::Long => PrimArray::Long(items.iter().map(as_jlong).collect::<Result<_>>()?),
        PrimKind::Float => PrimArray::Float(items.iter().map(as_jfloat).collect::<Result<_>>()?),
        PrimKind::Double => PrimArray::Double(items.iter().map(as_jdouble).collect::<Result<_>>()?),
    })
}

fn object_array_ref<E: JvmEnv>(env: &E, element_path: &str, value: &Value) -> Result<Option<JObject>> {
    match value {
        Value::Null => Ok(None),
        Value::List(items) => {
            // The element class resolves before allocation; an unknown
            // element class fails the whole conversion.
            let Some(element_class) = env.find_class(element_path) else {
                env.take_pending_exception();
                return Err(BridgeError::Resolution {
                    class_path: element_path.to_owned(),
                    member: None,
                });
            };
            let length = i32::try_from(items.len()).map_err(|_| {
                BridgeError::mismatch(format!("L{element_path}; array"), format!("list of {} items", items.len()))
            })?;
            let Some(array) = env.new_object_array(length, element_class) else {
                return Err(alloc_failed(env, &format!("L{element_path}; array of length {length}")));
            };
            for (index, item) in items.iter().enumerate() {
                // Each element is fully validated and converted before its
                // write; a bad element leaves no partial foreign call behind.
                let element = object_ref(env, element_path, item)?;
                env.set_object_array_element(array, index as i32, element);
                check_foreign(env)?;
            }
            Ok(Some(array))
        }
        other => Err(BridgeError::mismatch(format!("L{element_path}; array"), other.kind_name())),
    }
}

/// Converts an object-kinded call or field result back into a host value.
///
/// The token decides the interpretation: string class tokens decode to host
/// text, other class tokens wrap the handle opaquely, array tokens copy the
/// foreign array into a host list. A null reference is [`Value::Null`] in
/// every case.
pub(crate) fn unmarshal_object<E: JvmEnv>(env: &E, token: &TypeToken, object: Option<JObject>) -> Result<Value> {
    match token {
        TypeToken::Class(path) if path.as_ref() == STRING_CLASS => {
            object.map_or(Ok(Value::Null), |string| read_string(env, string).map(Value::Str))
        }
        TypeToken::Class(_) => Ok(object.map_or(Value::Null, |handle| Value::Object(JavaObject::new(handle)))),
        TypeToken::PrimArray(kind) => object.map_or(Ok(Value::Null), |array| read_prim_array(env, *kind, array)),
        TypeToken::ClassArray(path) => object.map_or(Ok(Value::Null), |array| read_object_array(env, path, array)),
        TypeToken::Prim(kind) => Err(BridgeError::mismatch("an object result", kind.to_string())),
        TypeToken::Void => Err(BridgeError::mismatch("an object result", "void")),
    }
}

/// The host form of one UTF-16 code unit.
pub(crate) fn char_value(code: u16) -> Value {
    let c = char::from_u32(u32::from(code)).unwrap_or(char::REPLACEMENT_CHARACTER);
    Value::Str(c.to_string())
}

/// Copies a foreign string's bytes into host text. The scratch buffer is
/// released as soon as the copy is made, on failure paths included.
pub(crate) fn read_string<E: JvmEnv>(env: &E, string: JObject) -> Result<String> {
    let chars = Utf8Chars::acquire(env, string)?;
    Ok(String::from_utf8_lossy(chars.bytes()).into_owned())
}

fn read_prim_array<E: JvmEnv>(env: &E, kind: PrimKind, array: JObject) -> Result<Value> {
    let elements = ArrayElements::acquire(env, kind, array)?;
    let values = match elements.data() {
        PrimArray::Boolean(items) => items.iter().map(|b| Value::Bool(*b)).collect(),
        PrimArray::Byte(items) => items.iter().map(|i| Value::Int(i64::from(*i))).collect(),
        PrimArray::Char(items) => items.iter().map(|c| char_value(*c)).collect(),
        PrimArray::Short(items) => items.iter().map(|i| Value::Int(i64::from(*i))).collect(),
        PrimArray::Int(items) => items.iter().map(|i| Value::Int(i64::from(*i))).collect(),
        PrimArray::Long(items) => items.iter().map(|i| Value::Int(*i)).collect(),
        PrimArray::Float(items) => items.iter().map(|f| Value::Float(f64::from(*f))).collect(),
        PrimArray::Double(items) => items.iter().map(|f| Value::Float(*f)).collect(),
    };
    Ok(Value::List(values))
}

fn read_object_array<E: JvmEnv>(env: &E, element_path: &str, array: JObject) -> Result<Value> {
    let length = env.array_length(array);
    let mut values = Vec::with_capacity(length.max(0) as usize);
    for index in 0..length {
        let element = env.get_object_array_element(array, index);
        check_foreign(env)?;
        let value = match element {
            None => Value::Null,
            Some(string) if element_path == STRING_CLASS => Value::Str(read_string(env, string)?),
            Some(handle) => Value::Object(JavaObject::new(handle)),
        };
        values.push(value);
    }
    Ok(Value::List(values))
}

/// Scoped borrow of a foreign string's byte content. Released on drop,
/// unconditionally.
struct Utf8Chars<'e, E: JvmEnv> {
    env: &'e E,
    string: JObject,
    lease: LeaseId,
    bytes: Vec<u8>,
}

impl<'e, E: JvmEnv> Utf8Chars<'e, E> {
    fn acquire(env: &'e E, string: JObject) -> Result<Self> {
        let Some((bytes, lease)) = env.get_string_utf_chars(string) else {
            return Err(alloc_failed(env, "string bytes"));
        };
        Ok(Self {
            env,
            string,
            lease,
            bytes,
        })
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<E: JvmEnv> Drop for Utf8Chars<'_, E> {
    fn drop(&mut self) {
        self.env.release_string_utf_chars(self.string, self.lease);
    }
}

/// Scoped borrow of a primitive array's backing storage. Released on drop
/// only when the runtime reported a copy; a direct view owes no release.
struct ArrayElements<'e, E: JvmEnv> {
    env: &'e E,
    array: JObject,
    lease: LeaseId,
    data: PrimArray,
    copied: bool,
}

impl<'e, E: JvmEnv> ArrayElements<'e, E> {
    fn acquire(env: &'e E, kind: PrimKind, array: JObject) -> Result<Self> {
        let Some((data, copied, lease)) = env.get_prim_array_elements(kind, array) else {
            return Err(alloc_failed(env, &format!("{kind} array elements")));
        };
        Ok(Self {
            env,
            array,
            lease,
            data,
            copied,
        })
    }

    fn data(&self) -> &PrimArray {
        &self.data
    }
}

impl<E: JvmEnv> Drop for ArrayElements<'_, E> {
    fn drop(&mut self) {
        if self.copied {
            self.env.release_prim_array_elements(self.array, self.lease);
        }
    }
}

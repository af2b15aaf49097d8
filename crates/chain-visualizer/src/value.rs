//! Input model for the normalizer
//!
//! `Value` is the closed set of shapes the orchestration layer hands to the
//! visualizer: generation results, chat results, role-tagged messages,
//! templated strings, dictionary-convertible objects, field records,
//! callables, containers and primitives. Anything else can still be carried
//! as [`Value::Opaque`] and is rendered through its `Debug` form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{BridgeError, Result};

/// A single text completion inside a batch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub text: String,

    /// Provider-specific details (finish reason, log probs, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<serde_json::Value>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation_info: None,
        }
    }

    pub fn with_info(mut self, info: serde_json::Value) -> Self {
        self.generation_info = Some(info);
        self
    }
}

/// Batch generation result: one group of candidates per prompt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmResult {
    pub generations: Vec<Vec<Generation>>,

    /// Provider-level output such as token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<serde_json::Value>,
}

impl LlmResult {
    pub fn new(generations: Vec<Vec<Generation>>) -> Self {
        Self {
            generations,
            llm_output: None,
        }
    }

    /// Texts of every generation across all groups, in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.generations
            .iter()
            .flatten()
            .map(|generation| generation.text.as_str())
    }
}

/// A single chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGeneration {
    pub text: String,
    pub message: Message,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<serde_json::Value>,
}

impl ChatGeneration {
    /// Completion whose text is the message content
    pub fn new(message: Message) -> Self {
        Self {
            text: message.content.clone(),
            message,
            generation_info: None,
        }
    }
}

/// Chat result: one or more chat completions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatResult {
    pub generations: Vec<ChatGeneration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<serde_json::Value>,
}

impl ChatResult {
    pub fn new(generations: Vec<ChatGeneration>) -> Self {
        Self {
            generations,
            llm_output: None,
        }
    }
}

/// Speaker of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Ai,
    Human,
    /// Free-form role used by generic chat messages
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::Ai => "ai",
            Role::Human => "human",
            Role::Other(role) => role,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::Ai => write!(f, "AI"),
            Role::Human => write!(f, "Human"),
            Role::Other(role) => write!(f, "{}", role),
        }
    }
}

/// Role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    /// Dictionary form of the message
    pub fn to_dict(&self) -> Vec<(Value, Value)> {
        vec![
            (Value::from("content"), Value::from(self.content.as_str())),
            (Value::from("role"), Value::from(self.role.as_str())),
        ]
    }
}

/// One constituent of a templated string
#[derive(Debug, Clone)]
pub enum FPart {
    /// Literal text segment
    Literal(String),
    /// Interpolated expression with its value and rendered text
    Interpolation {
        source: String,
        value: Box<Value>,
        formatted: String,
    },
}

impl FPart {
    fn text(&self) -> &str {
        match self {
            FPart::Literal(text) => text,
            FPart::Interpolation { formatted, .. } => formatted,
        }
    }
}

/// Templated string that keeps its parts instead of only the flat text
#[derive(Debug, Clone, Default)]
pub struct FString {
    pub parts: Vec<FPart>,
}

impl FString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a literal segment
    pub fn literal(mut self, text: impl Into<String>) -> Self {
        self.parts.push(FPart::Literal(text.into()));
        self
    }

    /// Append an interpolated expression
    pub fn interpolate(
        mut self,
        source: impl Into<String>,
        value: impl Into<Value>,
        formatted: impl Into<String>,
    ) -> Self {
        self.parts.push(FPart::Interpolation {
            source: source.into(),
            value: Box::new(value.into()),
            formatted: formatted.into(),
        });
        self
    }

    /// Flattened text
    pub fn text(&self) -> String {
        self.parts.iter().map(FPart::text).collect()
    }
}

/// Plain aggregate of named fields
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Build a record from any serializable struct.
    ///
    /// The value must serialize to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        let type_name = short_type_name(std::any::type_name::<T>());
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(Self {
                type_name,
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            other => Err(BridgeError::InvalidRecord(format!(
                "{} serialized to {} instead of an object",
                type_name,
                json_kind(&other)
            ))),
        }
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Reference to a plain function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    /// Name of the type the callable belongs to
    pub owner: String,
    pub name: String,
}

impl Callable {
    /// A free function
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            owner: "function".to_string(),
            name: name.into(),
        }
    }

    pub fn method(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// Failure of a dictionary conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The conversion needs arguments the normalizer cannot supply
    ArityMismatch { expected: usize },
    Failed(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::ArityMismatch { expected } => {
                write!(f, "conversion expects {} argument(s)", expected)
            }
            ConversionError::Failed(reason) => write!(f, "conversion failed: {}", reason),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Objects that can describe themselves as a key/value structure.
///
/// Objects that keep conversation memory report it through
/// [`has_memory`](DictConvertible::has_memory); the normalizer then nulls the
/// `memory` entry of the converted copy. The object itself is never touched.
pub trait DictConvertible: fmt::Debug + Send + Sync {
    /// Name of the concrete type
    fn type_name(&self) -> &str;

    /// Key/value form of the object
    fn to_dict(&self) -> std::result::Result<Vec<(Value, Value)>, ConversionError>;

    /// Whether the object carries a `memory` field
    fn has_memory(&self) -> bool {
        false
    }

    /// Field record used when [`to_dict`](DictConvertible::to_dict) fails
    fn fields(&self) -> Option<Record> {
        None
    }
}

/// Any runtime value the normalizer accepts
#[derive(Debug, Clone)]
pub enum Value {
    LlmResult(LlmResult),
    ChatResult(ChatResult),
    Message(Message),
    /// Mapping whose keys may be any value
    Map(Vec<(Value, Value)>),
    Sequence(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    FString(FString),
    Object(Arc<dyn DictConvertible>),
    Record(Record),
    Function(Callable),
    Float(f64),
    Int(i64),
    UInt(u64),
    Str(String),
    Bool(bool),
    None,
    /// Value with no structural interpretation
    Opaque(Arc<dyn fmt::Debug + Send + Sync>),
}

impl Value {
    /// Wrap a dictionary-convertible object
    pub fn object<T: DictConvertible + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Wrap a value that is only ever printed
    pub fn opaque<T: fmt::Debug + Send + Sync + 'static>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Mapping with string keys
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Convert any serializable value through its JSON form
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Value::from(serde_json::to_value(value)?))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Short name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Value::LlmResult(_) => "llm_result",
            Value::ChatResult(_) => "chat_result",
            Value::Message(_) => "message",
            Value::Map(_) => "map",
            Value::Sequence(_) => "sequence",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::FString(_) => "fstring",
            Value::Object(_) => "object",
            Value::Record(_) => "record",
            Value::Function(_) => "function",
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::None => "none",
            Value::Opaque(_) => "opaque",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Int(i64::from(u))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::None, Into::into)
    }
}

impl From<LlmResult> for Value {
    fn from(result: LlmResult) -> Self {
        Value::LlmResult(result)
    }
}

impl From<ChatResult> for Value {
    fn from(result: ChatResult) -> Self {
        Value::ChatResult(result)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        Value::Message(message)
    }
}

impl From<FString> for Value {
    fn from(fstring: FString) -> Self {
        Value::FString(fstring)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Function(callable)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Nesting depth past which the printable form shows `...`
pub const PRINT_DEPTH: usize = 32;

/// Printable form of a value with a nesting budget
struct Printable<'a> {
    value: &'a Value,
    depth: usize,
}

impl<'a> Printable<'a> {
    fn child(&self, value: &'a Value) -> Printable<'a> {
        Printable {
            value,
            depth: self.depth + 1,
        }
    }

    fn write_joined(
        &self,
        f: &mut fmt::Formatter<'_>,
        open: &str,
        items: &'a [Value],
        close: &str,
    ) -> fmt::Result {
        write!(f, "{}", open)?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.child(item))?;
        }
        write!(f, "{}", close)
    }
}

impl fmt::Display for Printable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth > PRINT_DEPTH {
            return write!(f, "...");
        }

        match self.value {
            Value::LlmResult(result) => {
                write!(f, "LlmResult(")?;
                for (i, text) in result.texts().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", text)?;
                }
                write!(f, ")")
            }
            Value::ChatResult(result) => {
                write!(f, "ChatResult(")?;
                for (i, generation) in result.generations.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", generation.text)?;
                }
                write!(f, ")")
            }
            Value::Message(message) => write!(f, "{}Message({:?})", message.role, message.content),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", self.child(key), self.child(value))?;
                }
                write!(f, "}}")
            }
            Value::Sequence(items) => self.write_joined(f, "[", items, "]"),
            Value::Tuple(items) => self.write_joined(f, "(", items, ")"),
            Value::Set(items) => self.write_joined(f, "{", items, "}"),
            Value::FString(fstring) => write!(f, "{:?}", fstring.text()),
            Value::Object(object) => write!(f, "{:?}", object),
            Value::Record(record) => {
                write!(f, "{} {{ ", record.type_name)?;
                for (i, (name, value)) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, self.child(value))?;
                }
                write!(f, " }}")
            }
            Value::Function(callable) => write!(f, "<{} {}>", callable.owner, callable.name),
            // Debug keeps the fractional part, so 1.0 and 1 print differently.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::None => write!(f, "null"),
            Value::Opaque(inner) => write!(f, "{:?}", inner),
        }
    }
}

/// Printable form, used for non-string map keys and uninterpretable values.
///
/// Nesting deeper than [`PRINT_DEPTH`] is elided as `...`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printable {
            value: self,
            depth: 0,
        }
        .fmt(f)
    }
}

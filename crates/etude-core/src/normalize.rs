use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display-ready assistant reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    pub messages: Vec<String>,
}

impl NormalizedFeedback {
    pub fn verbatim(raw: &str) -> Self {
        Self {
            emotion: None,
            messages: vec![raw.to_string()],
        }
    }

    /// Single line for plain-text surfaces: `"<emotion> <message> <message>"`.
    pub fn to_line(&self) -> String {
        self.emotion
            .iter()
            .chain(self.messages.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Best-effort extraction of `{emotion, messages}` from assistant text that may
/// wrap, truncate or garble its JSON. Never fails: unusable input comes back verbatim.
pub fn normalize(raw: &str) -> NormalizedFeedback {
    if let Some(found) = embedded(raw, '{', '}').and_then(|value| from_object(&value)) {
        return found;
    }
    if let Some(found) = embedded(raw, '[', ']').and_then(|value| from_array(&value)) {
        return found;
    }
    tracing::debug!(len = raw.len(), "assistant reply has no usable json, passing through");
    NormalizedFeedback::verbatim(raw)
}

fn embedded(raw: &str, open: char, close: char) -> Option<Value> {
    let first = raw.find(open)?;
    let last = raw.rfind(close)?;
    if last <= first {
        return None;
    }
    serde_json::from_str(&raw[first..last + close.len_utf8()]).ok()
}

fn from_object(value: &Value) -> Option<NormalizedFeedback> {
    shaped(value.as_object()?)
}

/// Accepts `{emotion, messages: [..]}` and `{messages: {emotion, messages: [..]}}`.
fn shaped(map: &Map<String, Value>) -> Option<NormalizedFeedback> {
    match map.get("messages")? {
        Value::Array(items) => Some(NormalizedFeedback {
            emotion: emotion_of(map),
            messages: texts(items),
        }),
        Value::Object(inner) => match inner.get("messages")? {
            Value::Array(items) => Some(NormalizedFeedback {
                emotion: emotion_of(inner),
                messages: texts(items),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn from_array(value: &Value) -> Option<NormalizedFeedback> {
    let items = value.as_array()?;
    let mut out = NormalizedFeedback::default();
    for item in items {
        match item.as_object().and_then(shaped) {
            Some(nested) => {
                if out.emotion.is_none() {
                    out.emotion = nested.emotion;
                }
                out.messages.extend(nested.messages);
            }
            None => out.messages.extend(text_of(item)),
        }
    }
    if out.messages.is_empty() {
        return None;
    }
    Some(out)
}

fn emotion_of(map: &Map<String, Value>) -> Option<String> {
    map.get("emotion")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|emotion| !emotion.is_empty())
        .map(str::to_string)
}

fn texts(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(text_of).collect()
}

fn text_of(item: &Value) -> Option<String> {
    match item {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => ["value", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Value::Null | Value::Array(_) => None,
    }
}

use etude_core::{normalize, NormalizedFeedback};
use pretty_assertions::assert_eq;

fn feedback(emotion: Option<&str>, messages: &[&str]) -> NormalizedFeedback {
    NormalizedFeedback {
        emotion: emotion.map(str::to_string),
        messages: messages.iter().map(|m| m.to_string()).collect(),
    }
}

#[test]
fn extracts_object_embedded_in_text() {
    let out = normalize(r#"Great job! {"emotion":"happy","messages":["Well done","Keep it up"]}"#);

    assert_eq!(out, feedback(Some("happy"), &["Well done", "Keep it up"]));
}

#[test]
fn plain_text_passes_through() {
    assert_eq!(
        normalize("plain text, no json"),
        feedback(None, &["plain text, no json"])
    );
}

#[test]
fn nested_messages_shape_is_flattened() {
    let out = normalize(r#"{"messages":{"emotion":"encouraging","messages":["Slow down in bar 3"]}}"#);

    assert_eq!(out, feedback(Some("encouraging"), &["Slow down in bar 3"]));
}

#[test]
fn falls_back_to_array_when_object_is_garbled() {
    let out = normalize(r#"Tips: ["Relax your wrist", "Count aloud"] {oops"#);

    assert_eq!(out, feedback(None, &["Relax your wrist", "Count aloud"]));
}

#[test]
fn value_objects_are_flattened() {
    let out = normalize(r#"{"emotion":"neutral","messages":[{"value":"Try again"},{"text":"Watch the tempo"}]}"#);

    assert_eq!(out, feedback(Some("neutral"), &["Try again", "Watch the tempo"]));
}

#[test]
fn truncated_json_comes_back_verbatim() {
    let raw = r#"Here you go {"emotion":"happy","messages":["Well"#;

    assert_eq!(normalize(raw), feedback(None, &[raw]));
}

#[test]
fn object_without_messages_comes_back_verbatim() {
    let raw = r#"{"score": 80}"#;

    assert_eq!(normalize(raw), feedback(None, &[raw]));
}

#[test]
fn to_line_joins_emotion_and_messages() {
    let line = feedback(Some("happy"), &["Well done", "Keep it up"]).to_line();

    assert_eq!(line, "happy Well done Keep it up");
}

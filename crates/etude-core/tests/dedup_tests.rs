use etude_core::{classify, Classified, DedupOutcome, Deduplicator, MalformedReason, NoteClass};
use etude_ports::midi::MidiMessage;
use etude_ports::types::NoteEvent;

fn on(pitch: u8, velocity: u8) -> MidiMessage {
    MidiMessage::triple(0x90, pitch, velocity)
}

fn off(pitch: u8) -> MidiMessage {
    MidiMessage::triple(0x80, pitch, 64)
}

#[test]
fn double_trigger_inside_window_is_dropped() {
    let mut dedup = Deduplicator::default();

    let first = dedup.process(&on(60, 90), 1000);
    let second = dedup.process(&on(60, 90), 1020);

    assert_eq!(first, DedupOutcome::NoteOn(NoteEvent::new(60, 90, 1000)));
    assert_eq!(second, DedupOutcome::Duplicate { pitch: 60 });
    assert_eq!(dedup.active().pitches(), vec![60]);
    assert_eq!(dedup.active().len(), 1);
}

#[test]
fn note_off_releases_pitch() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(64, 80), 0);

    let outcome = dedup.process(&off(64), 400);

    assert_eq!(
        outcome,
        DedupOutcome::NoteOff {
            pitch: 64,
            was_held: true
        }
    );
    assert!(!dedup.active().is_held(64));
    assert!(dedup.active().is_empty());
}

#[test]
fn zero_velocity_note_on_is_a_note_off() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(67, 70), 0);

    let outcome = dedup.process(&MidiMessage::triple(0x93, 67, 0), 10);

    assert_eq!(
        outcome,
        DedupOutcome::NoteOff {
            pitch: 67,
            was_held: true
        }
    );
    assert!(dedup.active().is_empty());
}

#[test]
fn window_boundary_is_exclusive() {
    let mut dedup = Deduplicator::new(50);
    dedup.process(&on(60, 90), 1000);

    assert!(matches!(dedup.process(&on(60, 90), 1049), DedupOutcome::Duplicate { .. }));
    assert!(matches!(dedup.process(&on(60, 90), 1050), DedupOutcome::NoteOn(_)));
}

#[test]
fn jittered_arrival_is_still_caught() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 1000);

    // earlier timestamp than the accepted event, still within the window
    let outcome = dedup.process(&on(60, 91), 985);

    assert_eq!(outcome, DedupOutcome::Duplicate { pitch: 60 });
}

#[test]
fn different_pitch_inside_window_is_accepted() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 1000);

    let outcome = dedup.process(&on(64, 90), 1005);

    assert_eq!(outcome, DedupOutcome::NoteOn(NoteEvent::new(64, 90, 1005)));
    assert_eq!(dedup.active().pitches(), vec![60, 64]);
}

#[test]
fn quick_repeat_after_release_is_a_new_note() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 1000);
    dedup.process(&off(60), 1010);

    let outcome = dedup.process(&on(60, 90), 1020);

    assert!(matches!(outcome, DedupOutcome::NoteOn(_)));
    assert!(dedup.active().is_held(60));
}

#[test]
fn retrigger_of_held_pitch_emits_again() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 0);

    let outcome = dedup.process(&on(60, 100), 500);

    assert_eq!(outcome, DedupOutcome::NoteOn(NoteEvent::new(60, 100, 500)));
    assert_eq!(dedup.active().len(), 1);
}

#[test]
fn duplicate_does_not_refresh_the_window() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 1000);
    dedup.process(&on(60, 90), 1030);

    let outcome = dedup.process(&on(60, 90), 1060);

    assert!(matches!(outcome, DedupOutcome::NoteOn(_)));
    let last = dedup.last_accepted().map(|state| (state.timestamp, state.class));
    assert_eq!(last, Some((1060, NoteClass::On)));
}

#[test]
fn malformed_messages_leave_state_untouched() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 0);
    let before = dedup.last_accepted();

    let short = dedup.process(&MidiMessage::from_slice(&[0x90, 61]), 100);
    let long = dedup.process(&MidiMessage::from_slice(&[0x90, 61, 10, 0]), 100);
    let bad_data = dedup.process(&MidiMessage::triple(0x90, 200, 10), 100);
    let bad_status = dedup.process(&MidiMessage::triple(0x40, 61, 10), 100);

    assert!(matches!(short, DedupOutcome::Malformed(e) if e.reason == MalformedReason::Arity(2)));
    assert!(matches!(long, DedupOutcome::Malformed(e) if e.reason == MalformedReason::Arity(4)));
    assert!(matches!(bad_data, DedupOutcome::Malformed(e) if e.reason == MalformedReason::DataOutOfRange(200)));
    assert!(matches!(bad_status, DedupOutcome::Malformed(e) if e.reason == MalformedReason::StatusOutOfRange(0x40)));
    assert_eq!(dedup.active().pitches(), vec![60]);
    assert_eq!(dedup.last_accepted(), before);
}

#[test]
fn non_note_status_is_ignored() {
    let mut dedup = Deduplicator::default();

    let sustain = dedup.process(&MidiMessage::triple(0xB0, 64, 127), 0);

    assert_eq!(sustain, DedupOutcome::Ignored { status: 0xB0 });
    assert!(!sustain.accepted());
    assert!(dedup.last_accepted().is_none());
}

#[test]
fn short_channel_messages_are_ignored_not_malformed() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 0);

    let pressure = dedup.process(&MidiMessage::from_slice(&[0xD0, 40]), 10);
    let program = dedup.process(&MidiMessage::from_slice(&[0xC0, 5]), 20);
    let clock = dedup.process(&MidiMessage::from_slice(&[0xF8]), 30);

    assert_eq!(pressure, DedupOutcome::Ignored { status: 0xD0 });
    assert_eq!(program, DedupOutcome::Ignored { status: 0xC0 });
    assert_eq!(clock, DedupOutcome::Ignored { status: 0xF8 });
    assert_eq!(dedup.active().pitches(), vec![60]);
}

#[test]
fn classify_covers_every_channel() {
    for channel in 0..16u8 {
        assert_eq!(
            classify(&MidiMessage::triple(0x90 | channel, 60, 1), 0),
            Ok(Classified::NoteOn {
                pitch: 60,
                velocity: 1
            })
        );
        assert_eq!(
            classify(&MidiMessage::triple(0x80 | channel, 60, 1), 0),
            Ok(Classified::NoteOff { pitch: 60 })
        );
    }
}

#[test]
fn release_forgets_only_the_given_pitch() {
    let mut dedup = Deduplicator::default();
    dedup.process(&on(60, 90), 0);
    dedup.process(&on(64, 90), 100);
    let before = dedup.last_accepted();

    assert!(dedup.release(60));
    assert!(!dedup.release(60));
    assert_eq!(dedup.active().pitches(), vec![64]);
    assert_eq!(dedup.last_accepted(), before);
}

use etude_core::PerformanceRecorder;
use etude_ports::types::NoteEvent;
use pretty_assertions::assert_eq;

#[test]
fn log_is_bounded_and_evicts_oldest() {
    let recorder = PerformanceRecorder::new(100);
    for i in 0..101u64 {
        recorder.record(NoteEvent::new(60, 80, i * 10));
    }

    let snapshot = recorder.snapshot();

    assert_eq!(recorder.len(), 100);
    assert_eq!(snapshot.events.first().map(|e| e.timestamp), Some(10));
    assert_eq!(snapshot.events.last().map(|e| e.timestamp), Some(1000));
}

#[test]
fn snapshot_is_chronological() {
    let recorder = PerformanceRecorder::default();
    recorder.record(NoteEvent::new(60, 80, 300));
    recorder.record(NoteEvent::new(62, 80, 100));
    recorder.record(NoteEvent::new(64, 80, 200));

    let stamps: Vec<u64> = recorder.snapshot().events.iter().map(|e| e.timestamp).collect();

    assert_eq!(stamps, vec![100, 200, 300]);
}

#[test]
fn eviction_follows_arrival_not_timestamp() {
    let recorder = PerformanceRecorder::new(2);
    recorder.record(NoteEvent::new(60, 80, 500));
    recorder.record(NoteEvent::new(62, 80, 100));
    recorder.record(NoteEvent::new(64, 80, 300));

    let pitches: Vec<u8> = recorder.snapshot().events.iter().map(|e| e.pitch).collect();

    assert_eq!(pitches, vec![62, 64]);
}

#[test]
fn flush_keeps_events_recorded_after_snapshot() {
    let recorder = PerformanceRecorder::default();
    recorder.record(NoteEvent::new(60, 80, 0));
    recorder.record(NoteEvent::new(62, 80, 100));
    let sent = recorder.snapshot();
    recorder.record(NoteEvent::new(64, 80, 200));

    let removed = recorder.flush(&sent);

    assert_eq!(removed, 2);
    assert_eq!(recorder.snapshot().events, vec![NoteEvent::new(64, 80, 200)]);
}

#[test]
fn clear_empties_the_log() {
    let recorder = PerformanceRecorder::default();
    recorder.record(NoteEvent::new(60, 80, 0));

    recorder.clear();

    assert!(recorder.is_empty());
    assert!(recorder.snapshot().is_empty());
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let recorder = PerformanceRecorder::new(0);
    recorder.record(NoteEvent::new(60, 80, 0));
    recorder.record(NoteEvent::new(61, 80, 1));

    assert_eq!(recorder.capacity(), 1);
    assert_eq!(recorder.snapshot().events, vec![NoteEvent::new(61, 80, 1)]);
}

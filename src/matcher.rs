//! Event-to-filter matching
//!
//! Pure functions deciding whether an incoming event satisfies a mapping's
//! event filter.

use crate::config::EventFilter;
use crate::midi::{EventKind, MidiEvent};

/// Check whether `event` satisfies `filter`.
///
/// - The kinds must be equal; `Unknown` filters never match.
/// - Note events match on note number; a positive filter velocity is a
///   minimum velocity, 0 ignores velocity.
/// - Control changes match on controller number; a positive filter value is
///   a minimum value, 0 ignores the value.
/// - Program changes match on program number.
pub fn matches(event: &MidiEvent, filter: &EventFilter) -> bool {
    if event.kind != filter.kind {
        return false;
    }

    match filter.kind {
        EventKind::NoteOn | EventKind::NoteOff => {
            event.note == filter.note && meets_threshold(event.velocity, filter.velocity)
        }
        EventKind::ControlChange => {
            event.controller == filter.controller && meets_threshold(event.value, filter.value)
        }
        EventKind::ProgramChange => event.program == filter.program,
        EventKind::Unknown => false,
    }
}

/// `threshold` 0 disables the gate
fn meets_threshold(actual: u8, threshold: u8) -> bool {
    threshold == 0 || actual >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kind_strategy() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::NoteOn),
            Just(EventKind::NoteOff),
            Just(EventKind::ControlChange),
            Just(EventKind::ProgramChange),
        ]
    }

    fn event_of(kind: EventKind, channel: u8, number: u8, magnitude: u8) -> MidiEvent {
        match kind {
            EventKind::NoteOn => MidiEvent::note_on(channel, number, magnitude),
            EventKind::NoteOff => MidiEvent::note_off(channel, number, magnitude),
            EventKind::ControlChange => MidiEvent::control_change(channel, number, magnitude),
            _ => MidiEvent::program_change(channel, number),
        }
    }

    fn filter_of(kind: EventKind, number: u8, threshold: u8) -> EventFilter {
        match kind {
            EventKind::NoteOn => EventFilter::note_on(number, threshold),
            EventKind::NoteOff => EventFilter { velocity: threshold, ..EventFilter::note_off(number) },
            EventKind::ControlChange => EventFilter::control_change(number, threshold),
            _ => EventFilter::program_change(number),
        }
    }

    #[test]
    fn test_control_change_threshold() {
        let filter = EventFilter::control_change(7, 64);
        assert!(matches(&MidiEvent::control_change(3, 7, 90), &filter));
        assert!(matches(&MidiEvent::control_change(3, 7, 64), &filter));
        assert!(!matches(&MidiEvent::control_change(3, 7, 30), &filter));
        assert!(!matches(&MidiEvent::control_change(3, 8, 90), &filter));
    }

    #[test]
    fn test_note_on_does_not_match_note_off() {
        let filter = EventFilter::note_on(60, 0);
        assert!(matches(&MidiEvent::note_on(0, 60, 1), &filter));
        assert!(!matches(&MidiEvent::note_off(0, 60, 1), &filter));
    }

    #[test]
    fn test_program_change_ignores_magnitudes() {
        let filter = EventFilter::program_change(4);
        assert!(matches(&MidiEvent::program_change(9, 4), &filter));
        assert!(!matches(&MidiEvent::program_change(9, 5), &filter));
    }

    #[test]
    fn test_unknown_filter_never_matches() {
        let filter = EventFilter { kind: EventKind::Unknown, ..EventFilter::program_change(0) };
        assert!(!matches(&MidiEvent::program_change(0, 0), &filter));
        let mut event = MidiEvent::program_change(0, 0);
        event.kind = EventKind::Unknown;
        assert!(!matches(&event, &filter));
    }

    proptest! {
        #[test]
        fn differing_kinds_never_match(
            event_kind in kind_strategy(),
            filter_kind in kind_strategy(),
            channel in 0u8..16,
            number in 0u8..128,
            magnitude in 0u8..128,
            threshold in 0u8..128,
        ) {
            prop_assume!(event_kind != filter_kind);
            let event = event_of(event_kind, channel, number, magnitude);
            let filter = filter_of(filter_kind, number, threshold);
            prop_assert!(!matches(&event, &filter));
        }

        #[test]
        fn zero_velocity_matches_any_velocity(
            note in 0u8..128,
            velocity in 0u8..128,
            channel in 0u8..16,
        ) {
            prop_assert!(matches(&MidiEvent::note_on(channel, note, velocity), &EventFilter::note_on(note, 0)));
        }

        #[test]
        fn velocity_threshold_is_monotonic(
            note in 0u8..128,
            velocity in 0u8..128,
            threshold in 1u8..128,
        ) {
            let matched = matches(&MidiEvent::note_on(0, note, velocity), &EventFilter::note_on(note, threshold));
            prop_assert_eq!(matched, velocity >= threshold);
        }

        #[test]
        fn value_threshold_is_monotonic(
            controller in 0u8..128,
            value in 0u8..128,
            threshold in 0u8..128,
        ) {
            let matched = matches(
                &MidiEvent::control_change(0, controller, value),
                &EventFilter::control_change(controller, threshold),
            );
            prop_assert_eq!(matched, threshold == 0 || value >= threshold);
        }

        #[test]
        fn selector_must_be_equal(
            kind in kind_strategy(),
            a in 0u8..128,
            b in 0u8..128,
        ) {
            prop_assume!(a != b);
            prop_assert!(!matches(&event_of(kind, 0, a, 127), &filter_of(kind, b, 0)));
        }
    }
}

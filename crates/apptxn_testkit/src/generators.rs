//! Property-based test generators using proptest.

use apptxn_core::{DeviceInfo, LogEvent};
use proptest::prelude::*;

/// Strategy for device metadata, including empty and non-ASCII strings.
pub fn device_info_strategy() -> impl Strategy<Value = DeviceInfo> {
    (
        "[A-Za-z0-9 ,._-]{0,24}",
        prop_oneof!["iOS", "Android", "iPhone OS", "[a-zA-Zé ]{0,12}"],
        "[0-9]{1,2}(\\.[0-9]{1,2}){0,2}",
    )
        .prop_map(|(make, os, version)| DeviceInfo::new(make, os, version))
}

/// Strategy for a log event, with or without error context.
pub fn log_event_strategy() -> impl Strategy<Value = LogEvent> {
    prop_oneof![
        any::<i64>().prop_map(LogEvent::new),
        (any::<i64>(), any::<i64>(), "[ -~éü中]{0,40}")
            .prop_map(|(event, code, desc)| LogEvent::error(event, code, desc)),
    ]
}

/// Strategy for a transaction to create: use case, device and its events.
pub fn transaction_spec_strategy(
    max_logs: usize,
) -> impl Strategy<Value = (i64, DeviceInfo, Vec<LogEvent>)> {
    (
        any::<i64>(),
        device_info_strategy(),
        prop::collection::vec(log_event_strategy(), 0..=max_logs),
    )
}

/// Strategy for remote response statuses, weighted toward the ones that
/// change flush behavior.
pub fn status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        4 => Just(200u16),
        2 => Just(503u16),
        1 => prop_oneof![Just(400u16), Just(401), Just(404), Just(500), Just(502)],
    ]
}

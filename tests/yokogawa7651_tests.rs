//! Command sequences of the Yokogawa 7651 profile, checked on a loopback transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rs_yokogawa7651::{
    DeviceProfile, Error, LoopbackResourceManager, Polarity, VoltageSweep, Yokogawa7651,
};

const ADDRESS: &str = "GPIB0::14::INSTR";

fn open() -> (LoopbackResourceManager, Yokogawa7651) {
    let manager = LoopbackResourceManager::new();
    let source = Yokogawa7651::open(&manager, ADDRESS).unwrap();
    (manager, source)
}

#[test]
fn initialize_sends_rc() {
    let (manager, mut source) = open();
    source.initialize().unwrap();
    assert_eq!(manager.writes(), vec!["RC"]);
}

#[test]
fn voltage_function_selects_each_range() {
    for (range_mv, code) in [
        (10, "R2"),
        (100, "R3"),
        (1000, "R4"),
        (10000, "R5"),
        (30000, "R6"),
    ] {
        let (manager, mut source) = open();
        source.set_voltage_function(range_mv, None).unwrap();
        assert_eq!(manager.writes(), vec![format!("F1{code}E")]);
    }
}

#[test]
fn unknown_voltage_range_sends_nothing() {
    for range_mv in [0, 1, 20, 5000, 30001, u32::MAX] {
        let (manager, mut source) = open();
        let err = source.set_voltage_function(range_mv, None).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)), "{range_mv}: {err}");
        assert_eq!(manager.attempts(), 0);
    }
}

#[test]
fn voltage_function_with_current_limit() {
    let (manager, mut source) = open();
    source.set_voltage_function(10000, Some(20.0)).unwrap();
    assert_eq!(manager.writes(), vec!["F1R5E", "LA20"]);
}

#[test]
fn voltage_function_with_bad_limit_sends_nothing() {
    let (manager, mut source) = open();
    let err = source.set_voltage_function(10000, Some(500.0)).unwrap_err();
    assert!(matches!(err, Error::OutOfRange { .. }));
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn current_function_selects_each_range() {
    for (range_ma, code) in [(1, "R4"), (10, "R5"), (100, "R6")] {
        let (manager, mut source) = open();
        source.set_current_function(range_ma, None).unwrap();
        assert_eq!(manager.writes(), vec![format!("F5{code}E")]);
    }
}

#[test]
fn current_function_with_voltage_limit() {
    let (manager, mut source) = open();
    source.set_current_function(10, Some(5.0)).unwrap();
    assert_eq!(manager.writes(), vec!["F5R5E", "LV5"]);
}

#[test]
fn unknown_current_range_sends_nothing() {
    let (manager, mut source) = open();
    let err = source.set_current_function(1000, Some(5.0)).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn voltage_limit_inside_bounds() {
    let (manager, mut source) = open();
    for v_max in [0.5, 1.0, 12.0, 30.0] {
        source.set_voltage_limit(v_max).unwrap();
    }
    assert_eq!(manager.writes(), vec!["LV0.5", "LV1", "LV12", "LV30"]);
}

#[test]
fn voltage_limit_outside_bounds_sends_nothing() {
    let (manager, mut source) = open();
    for v_max in [0.0, -5.0, 31.0, 1000.0] {
        let err = source.set_voltage_limit(v_max).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }), "{v_max}: {err}");
    }
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn current_limit_bounds() {
    let (manager, mut source) = open();
    source.set_current_limit(5.0).unwrap();
    source.set_current_limit(120.0).unwrap();
    for i_max in [4.0, 121.0] {
        let err = source.set_current_limit(i_max).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }), "{i_max}: {err}");
    }
    assert_eq!(manager.writes(), vec!["LA5", "LA120"]);
}

#[test]
fn output_value_is_not_bounds_checked() {
    let (manager, mut source) = open();
    source.set_output_value(3.0, Polarity::Plus).unwrap();
    source.set_output_value(-2.5, Polarity::Minus).unwrap();
    source.set_output_value(1000.0, Polarity::Plus).unwrap();
    assert_eq!(manager.writes(), vec!["S+3E", "S--2.5E", "S+1000E"]);
}

#[test]
fn tiny_limit_is_sent_as_validated() {
    let (manager, mut source) = open();
    source.set_voltage_limit(1e-7).unwrap();
    source.set_current_limit(5.0000001).unwrap();
    assert_eq!(manager.writes(), vec!["LV0.0000001", "LA5.0000001"]);
}

#[test]
fn output_value_keeps_sub_micro_resolution() {
    let (manager, mut source) = open();
    source.set_output_value(1e-7, Polarity::Plus).unwrap();
    source.set_output_value(1.234567e-4, Polarity::Plus).unwrap();
    source.set_output_value(-0.0, Polarity::Minus).unwrap();
    assert_eq!(
        manager.writes(),
        vec!["S+0.0000001E", "S+0.0001234567E", "S-0E"]
    );
}

#[test]
fn non_finite_output_value_sends_nothing() {
    let (manager, mut source) = open();
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = source.set_output_value(value, Polarity::Plus).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)), "{value}: {err}");
    }
    for v_max in [f64::NAN, f64::INFINITY] {
        assert!(matches!(
            source.set_voltage_limit(v_max),
            Err(Error::OutOfRange { .. })
        ));
    }
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn large_finite_output_value_is_written_in_full() {
    let (manager, mut source) = open();
    source.set_output_value(1e303, Polarity::Plus).unwrap();
    let written = &manager.writes()[0];
    assert!(written.starts_with("S+1000"));
    assert!(written.ends_with("E"));
    assert!(!written.contains("inf"));
}

#[test]
fn sweep_with_sub_micro_step() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(0.0, 3e-7, 1e-7, Duration::ZERO, 10, 20.0);
    let report = source.sweep_voltage(&sweep).unwrap();
    assert_eq!(report.points, 4);
    assert_eq!(
        manager.writes()[2..].to_vec(),
        vec!["S+0E", "S+0.0000001E", "S+0.0000002E", "S+0.0000003E"]
    );
}

#[test]
fn output_state() {
    let (manager, mut source) = open();
    source.set_output_state(true).unwrap();
    source.set_output_state(false).unwrap();
    assert_eq!(manager.writes(), vec!["O1E", "O0E"]);
}

#[test]
fn sweep_writes_setup_then_every_point() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(0.0, 2.0, 1.0, Duration::ZERO, 10000, 20.0);

    let report = source.sweep_voltage(&sweep).unwrap();

    assert_eq!(report.points, 3);
    assert!(!report.cancelled);
    assert_eq!(
        manager.writes(),
        vec!["F1R5E", "LA20", "S+0E", "S+1E", "S+2E"]
    );
}

#[test]
fn sweep_includes_end_point_with_fractional_step() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(0.0, 0.3, 0.1, Duration::ZERO, 1000, 10.0)
        .with_polarity(Polarity::Minus);

    let report = source.sweep_voltage(&sweep).unwrap();

    assert_eq!(report.points, 4);
    assert_eq!(
        manager.writes()[2..].to_vec(),
        vec!["S-0E", "S-0.1E", "S-0.2E", "S-0.3E"]
    );
}

#[test]
fn sweep_stops_at_last_point_not_above_max() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(1.0, 2.0, 0.4, Duration::ZERO, 10000, 20.0);
    source.sweep_voltage(&sweep).unwrap();
    assert_eq!(
        manager.writes()[2..].to_vec(),
        vec!["S+1E", "S+1.4E", "S+1.8E"]
    );
}

#[test]
fn single_point_sweep() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(1.5, 1.5, 1.0, Duration::ZERO, 10000, 20.0);
    let report = source.sweep_voltage(&sweep).unwrap();
    assert_eq!(report.points, 1);
    assert_eq!(manager.writes(), vec!["F1R5E", "LA20", "S+1.5E"]);
}

#[test]
fn reversed_sweep_sends_nothing() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(5.0, 1.0, 1.0, Duration::ZERO, 10000, 20.0);
    let err = source.sweep_voltage(&sweep).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn non_positive_step_sends_nothing() {
    for step in [0.0, -1.0] {
        let (manager, mut source) = open();
        let sweep = VoltageSweep::new(0.0, 2.0, step, Duration::ZERO, 10000, 20.0);
        let err = source.sweep_voltage(&sweep).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)), "{step}: {err}");
        assert_eq!(manager.attempts(), 0);
    }
}

#[test]
fn sweep_with_bad_range_or_limit_sends_nothing() {
    let (manager, mut source) = open();
    let bad_range = VoltageSweep::new(0.0, 2.0, 1.0, Duration::ZERO, 5000, 20.0);
    assert!(matches!(
        source.sweep_voltage(&bad_range),
        Err(Error::InvalidParameter(_))
    ));
    let bad_limit = VoltageSweep::new(0.0, 2.0, 1.0, Duration::ZERO, 10000, 2.0);
    assert!(matches!(
        source.sweep_voltage(&bad_limit),
        Err(Error::OutOfRange { .. })
    ));
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn sweep_already_cancelled_only_sets_up() {
    let (manager, mut source) = open();
    let sweep = VoltageSweep::new(0.0, 2.0, 1.0, Duration::ZERO, 10000, 20.0);
    let cancel = AtomicBool::new(true);

    let report = source.sweep_voltage_with_cancel(&sweep, &cancel).unwrap();

    assert_eq!(report.points, 0);
    assert!(report.cancelled);
    assert_eq!(manager.writes(), vec!["F1R5E", "LA20"]);
}

#[test]
fn sweep_cancelled_from_another_thread() {
    let manager = LoopbackResourceManager::new();
    let mut source = Yokogawa7651::open(&manager, ADDRESS).unwrap();
    let sweep = VoltageSweep::new(0.0, 1000.0, 1.0, Duration::from_millis(20), 30000, 20.0);
    let cancel = Arc::new(AtomicBool::new(false));

    let worker = {
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || source.sweep_voltage_with_cancel(&sweep, &cancel))
    };
    thread::sleep(Duration::from_millis(100));
    cancel.store(true, Ordering::Relaxed);
    let report = worker.join().unwrap().unwrap();

    assert!(report.cancelled);
    assert!(report.points > 0 && report.points < 1001);
    // setup plus exactly the reported points, nothing after cancellation
    assert_eq!(manager.writes().len(), 2 + report.points);
}

#[test]
fn write_failure_on_range_command_skips_limit() {
    let manager = LoopbackResourceManager::new().fail_write_at(0);
    let mut source = Yokogawa7651::open(&manager, ADDRESS).unwrap();

    let err = source.set_voltage_function(10000, Some(20.0)).unwrap_err();

    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(manager.attempts(), 1);
    assert!(manager.writes().is_empty());
}

#[test]
fn write_failure_aborts_sweep() {
    let manager = LoopbackResourceManager::new().fail_write_at(3);
    let mut source = Yokogawa7651::open(&manager, ADDRESS).unwrap();
    let sweep = VoltageSweep::new(0.0, 5.0, 1.0, Duration::ZERO, 10000, 20.0);

    let err = source.sweep_voltage(&sweep).unwrap_err();

    assert!(matches!(err, Error::Connection { ref address, .. } if address == ADDRESS));
    assert_eq!(manager.writes(), vec!["F1R5E", "LA20", "S+0E"]);
}

#[test]
fn commands_after_close_are_invalid_state() {
    let manager = LoopbackResourceManager::new();
    let source = Yokogawa7651::open(&manager, ADDRESS).unwrap();
    let mut session = source.into_session();
    session.close().unwrap();

    let mut source = Yokogawa7651::new(session);
    let err = source.set_output_state(true).unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(manager.attempts(), 0);
}

#[test]
fn profile_uses_model_as_session_name() {
    let (_manager, source) = open();
    assert_eq!(source.session().name(), "Yokogawa 7651");
    assert_eq!(source.session().address(), ADDRESS);
    source.close().unwrap();
}

#[test]
fn range_listing_is_ascending() {
    let volts: Vec<u32> = Yokogawa7651::voltage_ranges()
        .iter()
        .map(|range| range.millivolts())
        .collect();
    assert_eq!(volts, vec![10, 100, 1000, 10000, 30000]);
    let amps: Vec<String> = Yokogawa7651::current_ranges()
        .iter()
        .map(|range| range.to_string())
        .collect();
    assert_eq!(amps, vec!["1 mA", "10 mA", "100 mA"]);
}

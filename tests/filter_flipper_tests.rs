//! Filter flipper driver tests against the simulated Kinesis controller.
//!
//! All async tests run on a paused clock, so transit and poll sleeps cost nothing.
//!
//! Run with: cargo test --test filter_flipper_tests

use std::sync::Arc;
use std::time::Duration;

use flipper_daq::config::FlipperSettings;
use flipper_daq::hardware::mock::MockFlipperController;
use flipper_daq::hardware::{
    is_valid_position, list_instruments, FlipperDevice, InstrumentParams, NativeMotionController,
    Position, PositionSwitch, WaitOptions,
};
use flipper_daq::FlipperError;

const SERIAL: &str = "37000001";

fn controller(moving_polls: u32) -> Arc<MockFlipperController> {
    Arc::new(
        MockFlipperController::new()
            .with_device(SERIAL)
            .with_moving_polls(moving_polls),
    )
}

fn open(controller: &Arc<MockFlipperController>) -> FlipperDevice {
    FlipperDevice::open_default(controller.clone(), SERIAL).unwrap()
}

// =============================================================================
// Positions
// =============================================================================

#[test]
fn test_only_stable_positions_are_valid_targets() {
    assert!(is_valid_position(Position::One));
    assert!(is_valid_position(Position::Two));
    assert!(!is_valid_position(Position::Moving));

    let controller = controller(0);
    let device = open(&controller);
    assert!(device.is_valid_position(Position::Two));
    assert!(!device.is_valid_position(Position::Moving));
}

#[tokio::test(start_paused = true)]
async fn test_move_to_moving_is_rejected_without_native_call() {
    let controller = controller(0);
    let device = open(&controller);

    let err = device.move_to(Position::Moving).await.unwrap_err();
    assert!(matches!(err, FlipperError::InvalidArgument(_)));
    assert_eq!(controller.move_commands(), 0);

    let err = device.move_and_wait(Position::Moving).await.unwrap_err();
    assert!(matches!(err, FlipperError::InvalidArgument(_)));
    assert_eq!(controller.move_commands(), 0);
}

// =============================================================================
// Flip
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_flip_from_one_targets_two() {
    let controller = controller(0);
    let device = open(&controller);

    assert_eq!(device.flip().await.unwrap(), Position::Two);
    assert_eq!(controller.move_commands(), 1);
    assert_eq!(device.get_position().await.unwrap(), Position::Two);
}

#[tokio::test(start_paused = true)]
async fn test_flip_from_two_targets_one() {
    let controller = controller(0);
    controller.set_position(SERIAL, Position::Two);
    let device = open(&controller);

    assert_eq!(device.flip().await.unwrap(), Position::One);
    assert_eq!(device.get_position().await.unwrap(), Position::One);
}

#[tokio::test(start_paused = true)]
async fn test_flip_while_moving_is_ambiguous() {
    let controller = controller(5);
    let device = open(&controller);

    device.move_to(Position::Two).await.unwrap();
    assert_eq!(device.get_position().await.unwrap(), Position::Moving);

    let err = device.flip().await.unwrap_err();
    assert!(matches!(err, FlipperError::AmbiguousFlip(Position::Moving)));
    assert_eq!(controller.move_commands(), 1);
}

// =============================================================================
// Move and wait
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_move_and_wait_already_in_position_is_noop() {
    let controller = controller(3);
    let device = open(&controller);

    device.move_and_wait(Position::One).await.unwrap();
    assert_eq!(controller.move_commands(), 0);
    assert_eq!(controller.calls("FF_GetPosition"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_move_and_wait_polls_until_arrival() {
    let controller = controller(4);
    let device = open(&controller);

    let start = tokio::time::Instant::now();
    device
        .move_and_wait_with(Position::Two, WaitOptions::unbounded(Duration::from_millis(100)))
        .await
        .unwrap();

    assert_eq!(controller.move_commands(), 1);
    // One check before the move, four moving reports, then the arrival.
    assert_eq!(controller.calls("FF_GetPosition"), 6);
    // 500 ms transit time plus four 100 ms poll delays.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "elapsed {elapsed:?}");
    assert_eq!(device.get_position().await.unwrap(), Position::Two);
}

#[tokio::test(start_paused = true)]
async fn test_move_and_wait_times_out_when_stuck() {
    let controller = controller(1);
    let device = open(&controller);
    // Position updates only arrive while polling runs.
    controller.stop_polling(SERIAL).unwrap();

    let options = WaitOptions {
        poll_delay: Duration::from_millis(100),
        timeout: Some(Duration::from_secs(2)),
    };
    let err = device
        .move_and_wait_with(Position::Two, options)
        .await
        .unwrap_err();

    match err {
        FlipperError::MoveTimeout { target, elapsed } => {
            assert_eq!(target, Position::Two);
            assert_eq!(elapsed, Duration::from_secs(2));
        }
        other => panic!("expected MoveTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_move_and_wait_uses_settings_wait_options() {
    let controller = controller(100);
    let settings = FlipperSettings {
        serial: Some(SERIAL.to_string()),
        poll_delay: Duration::from_millis(50),
        move_timeout: Duration::from_secs(1),
        ..FlipperSettings::default()
    };
    let device = FlipperDevice::from_settings(controller.clone(), &settings).unwrap();
    assert_eq!(device.wait_options().timeout, Some(Duration::from_secs(1)));

    let err = device.move_and_wait(Position::Two).await.unwrap_err();
    assert!(matches!(err, FlipperError::MoveTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_move_and_wait_rejects_zero_poll_delay() {
    let controller = controller(1);
    let device = open(&controller);

    let err = device
        .move_and_wait_with(Position::Two, WaitOptions::unbounded(Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, FlipperError::InvalidArgument(_)));
    assert_eq!(controller.move_commands(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_move_and_wait_zero_timeout_is_unbounded() {
    let controller = controller(2);
    let device = open(&controller);

    let options = WaitOptions {
        poll_delay: Duration::from_millis(100),
        timeout: Some(Duration::ZERO),
    };
    device.move_and_wait_with(Position::Two, options).await.unwrap();
    assert_eq!(controller.move_commands(), 1);
    assert_eq!(device.get_position().await.unwrap(), Position::Two);
}

#[tokio::test(start_paused = true)]
async fn test_flip_and_wait_commands_one_move() {
    let controller = controller(2);
    let device = open(&controller);

    let start = tokio::time::Instant::now();
    assert_eq!(device.flip_and_wait().await.unwrap(), Position::Two);

    assert_eq!(controller.move_commands(), 1);
    // 500 ms transit time plus two 100 ms poll delays.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(700), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(800), "elapsed {elapsed:?}");
    assert_eq!(device.get_position().await.unwrap(), Position::Two);

    assert_eq!(device.flip_and_wait().await.unwrap(), Position::One);
    assert_eq!(controller.move_commands(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_flip_and_wait_while_moving_is_ambiguous() {
    let controller = controller(5);
    let device = open(&controller);

    device.move_to(Position::Two).await.unwrap();
    let err = device.flip_and_wait().await.unwrap_err();
    assert!(matches!(err, FlipperError::AmbiguousFlip(Position::Moving)));
    assert_eq!(controller.move_commands(), 1);
}

// =============================================================================
// Transit time and device information
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transit_time_rounds_to_millis() {
    let controller = controller(0);
    let device = open(&controller);

    assert_eq!(
        device.get_transit_time().await.unwrap(),
        Duration::from_millis(500)
    );

    device
        .set_transit_time(Duration::from_micros(750_700))
        .await
        .unwrap();
    assert_eq!(
        device.get_transit_time().await.unwrap(),
        Duration::from_millis(751)
    );

    device
        .set_transit_time(Duration::from_micros(300_400))
        .await
        .unwrap();
    assert_eq!(
        device.get_transit_time().await.unwrap(),
        Duration::from_millis(300)
    );
}

#[tokio::test(start_paused = true)]
async fn test_device_information() {
    let controller = controller(0);
    let device = open(&controller);

    let info = device.hardware_info().await.unwrap();
    assert_eq!(info.model_number, "MFF101");
    assert_eq!(device.number_of_positions().await.unwrap(), 2);
    assert_eq!(device.status_bits().await.unwrap(), 0x01);

    device.identify().await.unwrap();
    device.persist_settings().await.unwrap();
    device.request_status().await.unwrap();
    assert_eq!(controller.calls("FF_Identify"), 1);
    assert_eq!(controller.calls("FF_PersistSettings"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_home_returns_to_position_one() {
    let controller = controller(2);
    controller.set_position(SERIAL, Position::Two);
    let device = open(&controller);

    device.home().await.unwrap();
    assert_eq!(device.get_position().await.unwrap(), Position::Moving);
    assert_eq!(device.get_position().await.unwrap(), Position::Moving);
    assert_eq!(device.get_position().await.unwrap(), Position::One);
}

#[tokio::test(start_paused = true)]
async fn test_native_failure_is_passed_through() {
    let controller = controller(0);
    let device = open(&controller);
    controller.fail_on("FF_Home", 0x29);

    let err = device.home().await.unwrap_err();
    assert!(matches!(
        err,
        FlipperError::Native {
            function: "FF_Home",
            code: 0x29
        }
    ));
}

// =============================================================================
// Discovery and lifecycle
// =============================================================================

#[test]
fn test_open_loads_settings_and_starts_polling() {
    let controller = controller(0);
    let device = FlipperDevice::open(controller.clone(), SERIAL, Duration::from_micros(150_500))
        .unwrap();

    assert!(controller.is_open(SERIAL));
    assert!(controller.settings_loaded(SERIAL));
    assert!(controller.is_polling(SERIAL));
    assert_eq!(device.polling_period(), Duration::from_millis(151));
    assert_eq!(device.serial(), SERIAL);
}

#[test]
fn test_open_unknown_serial_never_calls_open() {
    let controller = controller(0);
    let err = FlipperDevice::open_default(controller.clone(), "99999999").unwrap_err();

    assert!(matches!(
        err,
        FlipperError::InstrumentNotFound { ref serial } if serial == "99999999"
    ));
    assert_eq!(controller.calls("FF_Open"), 0);
}

#[test]
fn test_open_rejects_sub_millisecond_polling() {
    let controller = controller(0);
    let err = FlipperDevice::open(controller.clone(), SERIAL, Duration::from_micros(400))
        .unwrap_err();

    assert!(matches!(err, FlipperError::InvalidArgument(_)));
    assert_eq!(controller.calls("FF_Open"), 0);
}

#[test]
fn test_failed_open_releases_handle() {
    let controller = controller(0);
    controller.fail_on("FF_LoadSettings", 0x05);

    let err = FlipperDevice::open_default(controller.clone(), SERIAL).unwrap_err();
    assert!(matches!(
        err,
        FlipperError::Native {
            function: "FF_LoadSettings",
            ..
        }
    ));
    assert_eq!(controller.calls("FF_Close"), 1);
    assert!(!controller.is_open(SERIAL));
}

#[test]
fn test_list_instruments() {
    let controller = MockFlipperController::new()
        .with_device("37000002")
        .with_device("37000001");

    let instruments = list_instruments(&controller).unwrap();
    assert_eq!(
        instruments,
        vec![
            InstrumentParams::for_serial("37000001"),
            InstrumentParams::for_serial("37000002"),
        ]
    );
    assert_eq!(
        instruments[0].label,
        "<Thorlabs_Filter_Flipper '37000001'>"
    );
    assert_eq!(instruments[0].module, "motion.filter_flipper");
}

#[test]
fn test_list_instruments_empty() {
    let controller = MockFlipperController::new();
    assert!(list_instruments(&controller).unwrap().is_empty());
}

#[test]
fn test_from_params() {
    let controller = controller(0);

    let params = InstrumentParams {
        label: "flipper".to_string(),
        module: "motion.filter_flipper".to_string(),
        serial: None,
    };
    let err = FlipperDevice::from_params(controller.clone(), &params).unwrap_err();
    assert!(matches!(err, FlipperError::InstrumentType(_)));

    let device =
        FlipperDevice::from_params(controller.clone(), &InstrumentParams::for_serial(SERIAL))
            .unwrap();
    assert_eq!(device.serial(), SERIAL);
}

#[test]
fn test_from_settings_programs_transit_time() {
    let controller = controller(0);
    let settings = FlipperSettings {
        serial: Some(SERIAL.to_string()),
        transit_time: Some(Duration::from_millis(800)),
        ..FlipperSettings::default()
    };

    let _device = FlipperDevice::from_settings(controller.clone(), &settings).unwrap();
    assert_eq!(controller.calls("FF_SetTransitTime"), 1);

    let missing = FlipperSettings::default();
    let err = FlipperDevice::from_settings(controller.clone(), &missing).unwrap_err();
    assert!(matches!(err, FlipperError::Configuration(_)));
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_polling_and_closes_once() {
    let controller = controller(1);
    let device = open(&controller);

    for _ in 0..3 {
        device.move_to(Position::Two).await.unwrap();
        device.move_and_wait(Position::One).await.unwrap();
        device.flip_and_wait().await.unwrap();
        device.flip().await.unwrap();
        device.home().await.unwrap();
        device.move_and_wait(Position::Two).await.unwrap();
    }
    assert!(controller.move_commands() >= 12);
    assert_eq!(controller.calls("FF_StopPolling"), 0);
    assert_eq!(controller.calls("FF_Close"), 0);

    device.close().unwrap();
    assert_eq!(controller.calls("FF_StopPolling"), 1);
    assert_eq!(controller.calls("FF_Close"), 1);
    assert!(!controller.is_open(SERIAL));
}

#[test]
fn test_drop_releases_handle() {
    let controller = controller(0);
    {
        let _device = open(&controller);
    }
    assert_eq!(controller.calls("FF_StopPolling"), 1);
    assert_eq!(controller.calls("FF_Close"), 1);
    assert!(!controller.is_open(SERIAL));
}

#[test]
fn test_close_reports_failure_after_attempting_both() {
    let controller = controller(0);
    let device = open(&controller);
    controller.fail_on("FF_StopPolling", 0x04);

    let err = device.close().unwrap_err();
    assert!(matches!(
        err,
        FlipperError::Native {
            function: "FF_StopPolling",
            ..
        }
    ));
    assert_eq!(controller.calls("FF_Close"), 1);
}

// =============================================================================
// Capability trait
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_position_switch_trait_object() {
    let controller = controller(1);
    let switch: Box<dyn PositionSwitch> = Box::new(open(&controller));

    assert_eq!(switch.position().await.unwrap(), Position::One);
    switch.move_and_wait(Position::Two).await.unwrap();
    assert_eq!(switch.position().await.unwrap(), Position::Two);
    assert_eq!(switch.flip().await.unwrap(), Position::One);
}

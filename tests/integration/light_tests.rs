//! Device handlers end to end: router → handler → FadeEngine → PwmBus →
//! recording PWM port.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lightctl::app::commands::DeviceCommand;
use lightctl::app::router::CommandRouter;
use lightctl::control::fade::{ChannelList, FADE_STEPS, FadeEngine, FadeOutcome};
use lightctl::devices::{ColorLight, Device, DimmableLight, OnOff};
use lightctl::drivers::pwm_bus::PwmBus;
use lightctl::error::{Error, RangeError};

use crate::mock_hw::{MockPwm, MockTransport, PwmLog};

fn bus() -> (Arc<PwmBus<MockPwm>>, PwmLog) {
    let (pwm, log) = MockPwm::new();
    (Arc::new(PwmBus::new(pwm)), log)
}

fn rgb(bus: Arc<PwmBus<MockPwm>>) -> Arc<ColorLight<MockPwm>> {
    Arc::new(ColorLight::new(
        "Desk",
        "desk",
        "home/lights",
        ChannelList::from_slice(&[0, 1, 2]).unwrap(),
        255,
        bus,
    ))
}

// ── ColorLight ────────────────────────────────────────────────

#[test]
fn color_light_scenario_via_router() {
    let (bus, log) = bus();
    let router = CommandRouter::new(MockTransport::default());
    let light = rgb(bus);
    light.attach(&router);

    router.on_message("home/lights/desk/color", b"255;128;0");
    router.on_message("home/lights/desk/brightness", b"255");
    router.on_message("home/lights/desk/power", b"ON");
    light.wait();

    assert!(light.is_on());
    assert_eq!(light.current_output(), vec![4095, 2055, 0]);
    assert_eq!(log.last_value(0), Some(4095));
    assert_eq!(log.last_value(1), Some(2055));
    assert_eq!(log.last_value(2), Some(0));
}

#[test]
fn power_off_then_on_restores_previous_look() {
    let (bus, _log) = bus();
    let light = rgb(bus);
    light.apply(DeviceCommand::Color(vec![200, 100, 50])).unwrap();
    light.apply(DeviceCommand::Brightness(128)).unwrap();
    light.apply(DeviceCommand::Power(true)).unwrap();
    light.wait();
    let lit = light.current_output();
    let (color, brightness) = (light.last_color(), light.last_brightness());

    light.apply(DeviceCommand::Power(false)).unwrap();
    light.wait();
    assert_eq!(light.current_output(), vec![0, 0, 0]);
    assert_eq!(light.last_color(), color);
    assert_eq!(light.last_brightness().to_bits(), brightness.to_bits());

    light.apply(DeviceCommand::Power(true)).unwrap();
    light.wait();
    assert_eq!(light.current_output(), lit);
}

#[test]
fn malformed_commands_never_reach_the_bus() {
    let (bus, log) = bus();
    let router = CommandRouter::new(MockTransport::default());
    let light = rgb(bus);
    light.attach(&router);
    router.on_message("home/lights/desk/power", b"ON");
    light.wait();
    log.clear();

    router.on_message("home/lights/desk/color", b"1;2");
    router.on_message("home/lights/desk/color", b"a;b;c");
    router.on_message("home/lights/desk/brightness", b"9000");
    router.on_message("home/lights/desk/brightness", b"\xff\xfe");

    assert!(!light.is_fading());
    assert_eq!(log.len(), 0);
    assert_eq!(light.last_color(), vec![0, 0, 0]);
}

#[test]
fn color_above_range_is_stored_raw_and_clamped_on_output() {
    let (bus, _log) = bus();
    let router = CommandRouter::new(MockTransport::default());
    let light = rgb(bus);
    light.attach(&router);

    router.on_message("home/lights/desk/color", b"300;0;0");
    router.on_message("home/lights/desk/brightness", b"255");
    router.on_message("home/lights/desk/power", b"ON");
    light.wait();

    assert_eq!(light.last_color(), vec![300, 0, 0]);
    assert_eq!(light.current_output(), vec![4095, 0, 0]);
}

#[test]
fn new_fade_never_interleaves_with_the_previous_one() {
    let (bus, log) = bus();
    let light = rgb(bus);
    light.apply(DeviceCommand::Brightness(255)).unwrap();
    light.apply(DeviceCommand::Color(vec![255, 255, 255])).unwrap();
    light.apply(DeviceCommand::Power(true)).unwrap();
    thread::sleep(Duration::from_millis(40));
    light.apply(DeviceCommand::Color(vec![0, 0, 0])).unwrap();
    thread::sleep(Duration::from_millis(20));
    light.apply(DeviceCommand::Color(vec![255, 0, 255])).unwrap();
    light.wait();

    // Writes form contiguous runs per fade thread; a thread never resumes
    // once a newer one has started.
    let writes = log.all();
    let mut finished = HashSet::new();
    let mut current = writes[0].thread;
    for w in &writes {
        if w.thread != current {
            finished.insert(current);
            assert!(!finished.contains(&w.thread), "fade thread resumed after preemption");
            current = w.thread;
        }
    }
    assert_eq!(finished.len(), 2);
    assert_eq!(light.current_output(), vec![4095, 0, 4095]);
}

#[test]
fn command_during_wait_never_runs_alongside_the_fade() {
    let (bus, log) = bus();
    let light = Arc::new(ColorLight::new(
        "Lamp",
        "lamp",
        "home/lights",
        ChannelList::from_slice(&[0]).unwrap(),
        255,
        bus,
    ));
    light.apply(DeviceCommand::Brightness(255)).unwrap();
    light.apply(DeviceCommand::Color(vec![255])).unwrap();
    light.apply(DeviceCommand::Power(true)).unwrap();

    let waiter = {
        let light = Arc::clone(&light);
        thread::spawn(move || light.wait())
    };
    thread::sleep(Duration::from_millis(30));
    light.apply(DeviceCommand::Power(false)).unwrap();
    waiter.join().unwrap();
    light.wait();

    let writes = log.all();
    let switches = writes.windows(2).filter(|w| w[0].thread != w[1].thread).count();
    assert_eq!(switches, 1, "fade threads interleaved");
    assert_eq!(writes.len(), 2 * FADE_STEPS as usize);
    assert_eq!(light.current_output(), vec![0]);
}

#[test]
fn preempted_fade_continues_from_last_written_value() {
    let (bus, log) = bus();
    let light = rgb(bus);
    light.apply(DeviceCommand::Brightness(255)).unwrap();
    light.apply(DeviceCommand::Color(vec![255, 0, 0])).unwrap();
    light.apply(DeviceCommand::Power(true)).unwrap();
    thread::sleep(Duration::from_millis(60));
    light.apply(DeviceCommand::Power(false)).unwrap();
    light.wait();

    let red: Vec<u16> = log.for_channel(0).iter().map(|w| w.value).collect();
    let peak = *red.iter().max().unwrap();
    assert!(peak < 4095, "first fade should have been cut short");
    let pos = red.iter().position(|&v| v == peak).unwrap();
    // Every value after the peak belongs to the fade-out and never jumps up.
    assert!(red[pos..].windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(*red.last().unwrap(), 0);
}

#[test]
fn hardware_failure_aborts_fade_and_keeps_last_good_output() {
    let (pwm, log) = MockPwm::failing_after(10);
    let bus = Arc::new(PwmBus::new(pwm));
    let engine = FadeEngine::new("strip", bus, ChannelList::from_slice(&[4, 5]).unwrap());

    engine.start_fade(&[4095, 4095]).unwrap();
    assert_eq!(engine.wait(), Some(FadeOutcome::Failed));

    // 10 writes = 5 full steps on two channels.
    assert_eq!(log.len(), 10);
    let expected = lightctl::control::fade::step_value(0, 4095, 5, FADE_STEPS as i32);
    assert_eq!(engine.current_output(), vec![expected, expected]);
}

// ── DimmableLight ─────────────────────────────────────────────

#[test]
fn dimmable_scenario() {
    let (bus, log) = bus();
    let router = CommandRouter::new(MockTransport::default());
    let light = Arc::new(DimmableLight::new("Hall", "hall", "home/lights", 5, 100, bus));
    light.attach(&router);
    assert_eq!(router.topic_count(), 2);

    router.on_message("home/lights/hall/power", b"ON");
    light.wait();
    assert_eq!(light.current_output(), vec![0]);

    router.on_message("home/lights/hall/brightness", b"50");
    light.wait();
    assert_eq!(light.current_output(), vec![2047]);
    assert_eq!(log.last_value(5), Some(2047));
    assert!(log.all().iter().all(|w| w.channel == 5));
}

// ── OnOff ─────────────────────────────────────────────────────

#[test]
fn on_off_issues_exactly_two_writes() {
    let (bus, log) = bus();
    let router = CommandRouter::new(MockTransport::default());
    let dev = Arc::new(OnOff::new("Fan", "fan", "home/switches", 3, bus));
    dev.attach(&router);

    router.on_message("home/switches/fan/power", b"OFF");
    router.on_message("home/switches/fan/power", b"ON");

    assert_eq!(log.pairs(), vec![(3, 0), (3, 4095)]);
    assert!(dev.is_on());
}

// ── PwmBus ────────────────────────────────────────────────────

#[test]
fn out_of_range_writes_touch_nothing() {
    let (bus, log) = bus();
    assert!(matches!(
        bus.write_channel(16, 0),
        Err(Error::Range(RangeError::Channel { value: 16, .. }))
    ));
    assert!(matches!(
        bus.write_channel(0, 4096),
        Err(Error::Range(RangeError::Value { value: 4096, .. }))
    ));
    assert_eq!(log.len(), 0);
}

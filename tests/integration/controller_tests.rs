//! Controller built from a JSON config against mock adapters.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use lightctl::app::router::CommandRouter;
use lightctl::app::service::Controller;
use lightctl::config::SystemConfig;
use lightctl::devices::DeviceKind;
use lightctl::drivers::pwm_bus::PwmBus;
use lightctl::error::Error;

use crate::mock_hw::{MockPin, MockPwm, MockTransport, PwmLog};

const CONFIG: &str = r#"{
    "mqtt": { "host": "broker.local", "port": 1883 },
    "devices": [
        { "type": "color-light", "name": "Desk", "id": "desk",
          "base_topic": "home/lights", "pins": [0, 1, 2], "value_range": 255 },
        { "type": "dimmable-light", "name": "Hall", "id": "hall",
          "base_topic": "home/lights", "pin": 5, "value_range": 100 },
        { "type": "on-off", "name": "Fan", "id": "fan",
          "base_topic": "home/switches", "pin": 3 },
        { "type": "pir", "name": "Stairs", "id": "stairs",
          "base_topic": "home/motion", "gpio": 17 }
    ]
}"#;

const POLL: Duration = Duration::from_millis(10);

struct Rig {
    controller: Controller<MockPwm, MockTransport>,
    router: Arc<CommandRouter<MockTransport>>,
    pin: MockPin,
    log: PwmLog,
}

fn rig() -> Rig {
    let config = SystemConfig::from_json(CONFIG).unwrap();
    let (pwm, log) = MockPwm::new();
    let bus = Arc::new(PwmBus::new(pwm));
    let router = Arc::new(CommandRouter::new(MockTransport::default()));
    let pin = MockPin::default();
    let handed_out = pin.clone();
    let controller = Controller::build(
        &config,
        bus,
        Arc::clone(&router),
        move |pir| {
            assert_eq!(pir.gpio, 17);
            Ok(handed_out.clone())
        },
        POLL,
    )
    .unwrap();
    Rig {
        controller,
        router,
        pin,
        log,
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn builds_every_device_and_topic() {
    let rig = rig();
    let kinds: Vec<DeviceKind> = rig.controller.devices().iter().map(|d| d.kind()).collect();
    assert_eq!(
        kinds,
        vec![DeviceKind::ColorLight, DeviceKind::DimmableLight, DeviceKind::OnOff]
    );
    assert_eq!(rig.controller.sensor_count(), 1);
    // 3 color-light + 2 dimmable + 1 on-off
    assert_eq!(
        rig.router.topics(),
        vec![
            "home/lights/desk/brightness",
            "home/lights/desk/color",
            "home/lights/desk/power",
            "home/lights/hall/brightness",
            "home/lights/hall/power",
            "home/switches/fan/power",
        ]
    );
    rig.controller.shutdown();
}

#[test]
fn build_rejects_an_invalid_config() {
    let mut config = SystemConfig::from_json(CONFIG).unwrap();
    // Same id and channel as the existing fan.
    let fan = config.devices[2].clone();
    config.devices.push(fan);

    let (pwm, log) = MockPwm::new();
    let router = Arc::new(CommandRouter::new(MockTransport::default()));
    let mut opened = 0;
    let result = Controller::build(
        &config,
        Arc::new(PwmBus::new(pwm)),
        Arc::clone(&router),
        |_| {
            opened += 1;
            Ok(MockPin::default())
        },
        POLL,
    );

    assert!(matches!(result, Err(Error::Setup(_))));
    assert_eq!(router.topic_count(), 0);
    assert_eq!(opened, 0);
    assert_eq!(log.len(), 0);
}

#[test]
fn messages_drive_the_right_device() {
    let rig = rig();
    rig.router.on_message("home/switches/fan/power", b"ON");
    let fan = rig.controller.device("fan").unwrap();
    assert!(fan.is_on());
    assert_eq!(rig.log.pairs(), vec![(3, 4095)]);

    let desk = rig.controller.device("desk").unwrap();
    assert!(!desk.is_on());
    assert_eq!(desk.channels(), &[0, 1, 2]);
    rig.controller.shutdown();
}

#[test]
fn pir_publishes_first_state_and_edges_only() {
    let rig = rig();
    let topic = "home/motion/stairs";
    let transport = rig.router.transport();

    assert!(wait_for(|| transport.payloads_on(topic) == ["OFF"]));
    thread::sleep(POLL * 5);
    assert_eq!(transport.payloads_on(topic), ["OFF"], "no repeat without an edge");

    rig.pin.set(true);
    assert!(wait_for(|| transport.payloads_on(topic) == ["OFF", "ON"]));
    rig.pin.set(false);
    assert!(wait_for(|| transport.payloads_on(topic) == ["OFF", "ON", "OFF"]));

    let sent = transport.published();
    assert!(sent.iter().all(|p| !p.retain));
    rig.controller.shutdown();
}

#[test]
fn pir_retries_edge_after_failed_publish() {
    let rig = rig();
    let topic = "home/motion/stairs";
    let transport = rig.router.transport();
    assert!(wait_for(|| transport.payloads_on(topic) == ["OFF"]));

    transport.fail_publish.store(true, Ordering::SeqCst);
    rig.pin.set(true);
    thread::sleep(POLL * 5);
    transport.fail_publish.store(false, Ordering::SeqCst);
    assert!(wait_for(|| transport.payloads_on(topic) == ["OFF", "ON"]));
    rig.controller.shutdown();
}

#[test]
fn shutdown_stops_fades_and_disconnects() {
    let rig = rig();
    rig.router.on_message("home/lights/desk/color", b"255;255;255");
    rig.router.on_message("home/lights/desk/brightness", b"255");
    rig.router.on_message("home/lights/desk/power", b"ON");
    let desk = rig.controller.device("desk").unwrap();
    assert!(desk.is_fading());

    let router = Arc::clone(&rig.router);
    rig.controller.shutdown();

    assert!(!desk.is_fading());
    let frozen = rig.log.len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(rig.log.len(), frozen, "no writes after shutdown");
    assert_eq!(router.transport().disconnects.load(Ordering::SeqCst), 1);
}

//! Dispatch paths with real threads

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use hxspi_core::{BusConfig, DeviceConfig, DispatchMode, Error, PollConfig};
use hxspi_host::sim::EVENT_COMMAND;
use hxspi_host::{BlankEvent, BlankState, DisplayNotifier, SimDevice, SimRig};

fn config() -> DeviceConfig {
    DeviceConfig {
        bus: BusConfig::with_transfer_len(256),
        poll: PollConfig {
            initial_delay_ms: 5,
            period_ms: 5,
        },
        ..DeviceConfig::default()
    }
}

/// Handler that drains one report per invocation
fn reader(
    device: Weak<SimDevice>,
    reports: &Arc<AtomicUsize>,
) -> impl Fn() + Send + Sync + Clone + 'static {
    let reports = reports.clone();
    move || {
        let Some(device) = device.upgrade() else {
            return;
        };
        let mut report = [0u8; 4];
        if device.bus_read(EVENT_COMMAND, &mut report).is_ok() && report[0] != 0 {
            reports.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn irq_mode_delivers_reports() {
    let rig = SimRig::attach(config(), true).unwrap();
    let reports = Arc::new(AtomicUsize::new(0));

    let mode = rig.device.register_dispatcher(reader(rig.weak_device(), &reports)).unwrap();
    assert_eq!(mode, DispatchMode::Irq);
    assert!(rig.device.interrupt_enabled());

    for id in 1..=5u8 {
        rig.ic.inject_event(&[id, 0, 0, 0]);
        rig.irq.wait_idle();
    }
    assert_eq!(reports.load(Ordering::SeqCst), 5);
    assert_eq!(rig.poll_stats.ticks(), 0);

    rig.device.unregister_dispatcher();
}

#[test]
fn masked_interrupt_holds_reports() {
    let rig = SimRig::attach(config(), true).unwrap();
    let reports = Arc::new(AtomicUsize::new(0));
    rig.device.register_dispatcher(reader(rig.weak_device(), &reports)).unwrap();

    rig.device.set_interrupt_enabled(false);
    rig.device.set_interrupt_enabled(false);
    rig.ic.inject_event(&[1, 0, 0, 0]);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(reports.load(Ordering::SeqCst), 0);

    rig.device.set_interrupt_enabled(true);
    rig.irq.wait_idle();
    assert_eq!(reports.load(Ordering::SeqCst), 1);

    rig.device.unregister_dispatcher();
}

#[test]
fn missing_irq_falls_back_to_polling() {
    let rig = SimRig::attach(config(), false).unwrap();
    let reports = Arc::new(AtomicUsize::new(0));

    let mode = rig.device.register_dispatcher(reader(rig.weak_device(), &reports)).unwrap();
    assert_eq!(mode, DispatchMode::Polling);
    assert_eq!(rig.device.dispatch_mode(), Some(DispatchMode::Polling));

    rig.ic.inject_event(&[1, 0, 0, 0]);
    rig.ic.inject_event(&[2, 0, 0, 0]);
    wait_for("two polled reports", || reports.load(Ordering::SeqCst) == 2);

    rig.device.unregister_dispatcher();
}

#[test]
fn polling_teardown_is_a_barrier() {
    let rig = SimRig::attach(config(), false).unwrap();
    let running = Arc::new(AtomicBool::new(false));
    let after_teardown = Arc::new(AtomicUsize::new(0));
    let torn_down = Arc::new(AtomicBool::new(false));

    let handler = {
        let (running, after, torn_down) =
            (running.clone(), after_teardown.clone(), torn_down.clone());
        move || {
            if torn_down.load(Ordering::SeqCst) {
                after.fetch_add(1, Ordering::SeqCst);
            }
            running.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(15));
            running.store(false, Ordering::SeqCst);
        }
    };
    rig.device.register_dispatcher(handler).unwrap();
    wait_for("first poll", || {
        rig.poll_stats.completed() > 0 || running.load(Ordering::SeqCst)
    });

    rig.device.unregister_dispatcher();
    torn_down.store(true, Ordering::SeqCst);

    // Nothing in flight, nothing scheduled
    assert!(!running.load(Ordering::SeqCst));
    let completed = rig.poll_stats.completed();
    thread::sleep(Duration::from_millis(40));
    assert_eq!(rig.poll_stats.completed(), completed);
    assert_eq!(after_teardown.load(Ordering::SeqCst), 0);
    assert_eq!(rig.device.dispatch_mode(), None);
}

#[test]
fn teardown_is_idempotent() {
    let rig = SimRig::attach(config(), true).unwrap();
    rig.device.unregister_dispatcher();
    rig.device.register_dispatcher(|| {}).unwrap();
    rig.device.unregister_dispatcher();
    rig.device.unregister_dispatcher();
    assert_eq!(rig.device.dispatch_mode(), None);
}

#[test]
fn handler_may_mask_its_own_line() {
    let rig = SimRig::attach(config(), true).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = {
        let (device, calls) = (rig.device.clone(), calls.clone());
        move || {
            device.set_interrupt_enabled(false);
            let mut report = [0u8; 4];
            let _ = device.bus_read(EVENT_COMMAND, &mut report);
            calls.fetch_add(1, Ordering::SeqCst);
            device.set_interrupt_enabled(true);
        }
    };
    rig.device.register_dispatcher(handler).unwrap();

    rig.ic.inject_event(&[1, 0, 0, 0]);
    rig.irq.wait_idle();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(rig.device.interrupt_enabled());

    rig.device.unregister_dispatcher();
}

#[test]
fn display_blank_cycle_suspends_and_resumes() {
    let rig = SimRig::attach(config(), true).unwrap();
    rig.device.register_dispatcher(|| {}).unwrap();
    let notifier = DisplayNotifier::DrmPanel;

    // Still booting
    assert_eq!(
        notifier.notify(&rig.device, BlankEvent::EarlyBlank, BlankState::Powerdown),
        Err(Error::NotReady)
    );

    rig.device.mark_boot_done();
    notifier
        .notify(&rig.device, BlankEvent::EarlyBlank, BlankState::Powerdown)
        .unwrap();
    assert!(rig.device.is_suspended());
    assert!(!rig.device.interrupt_enabled());

    notifier
        .notify(&rig.device, BlankEvent::Blank, BlankState::Unblank)
        .unwrap();
    assert!(!rig.device.is_suspended());
    assert!(rig.device.interrupt_enabled());

    rig.device.unregister_dispatcher();
}

#[test]
fn detach_powers_down() {
    let rig = SimRig::attach(config(), false).unwrap();
    rig.device.register_dispatcher(|| {}).unwrap();

    let SimRig {
        device,
        reset,
        rail,
        ..
    } = rig;
    let device = Arc::try_unwrap(device).ok().unwrap();
    device.detach();

    assert!(!reset.is_high());
    assert!(!rail.is_high());
}

#[test]
fn masking_does_not_wait_for_the_bus() {
    let rig = SimRig::attach(config(), true).unwrap();
    rig.device.register_dispatcher(|| {}).unwrap();

    let (inside, wait) = mpsc::channel();
    let holder = {
        let device = rig.device.clone();
        thread::spawn(move || {
            device.with_bus(|_| {
                inside.send(()).unwrap();
                thread::sleep(Duration::from_millis(300));
            })
        })
    };
    wait.recv().unwrap();

    let start = Instant::now();
    rig.device.set_interrupt_enabled(false);
    rig.device.set_interrupt_enabled(true);
    assert!(start.elapsed() < Duration::from_millis(150));
    assert!(rig.device.interrupt_enabled());

    holder.join().unwrap();
    rig.device.unregister_dispatcher();
}

#[test]
fn weak_handler_lets_the_rig_drop() {
    let rig = SimRig::attach(config(), true).unwrap();
    let reports = Arc::new(AtomicUsize::new(0));
    rig.device
        .register_dispatcher(reader(rig.weak_device(), &reports))
        .unwrap();
    rig.ic.inject_event(&[1, 0, 0, 0]);
    rig.irq.wait_idle();
    assert_eq!(reports.load(Ordering::SeqCst), 1);

    let (reset, rail, device) = (rig.reset.clone(), rig.rail.clone(), rig.weak_device());
    drop(rig);

    // Last strong reference gone: the device tore itself down
    assert!(device.upgrade().is_none());
    assert!(!reset.is_high());
    assert!(!rail.is_high());
}

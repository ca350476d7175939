//! Scripted fakes for driving the engine on virtual time.
//!
//! [`FakeDevice`] is both the device and the matcher: every capture snapshots
//! the set of visible templates and encodes the snapshot index in the frame,
//! so matching always answers for the frame that was actually captured.

use autosolo_config::Config;
use autosolo_device::{DeviceControl, Frame, ImageSearch, Match};
use autosolo_error_reporter::CrashReporter;
use autosolo_utils::error::{CampaignError, DeviceError, VisionError};
use autosolo_utils::types::{Point, Swipe};
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::{Clock, ManualClock};
use crate::ops::{BattleOutcome, Ops, Timings};
use crate::run_state::RunState;
use crate::templates::CampaignTemplates;

/// Screen positions used by the scripted scenarios.
pub mod points {
    use autosolo_utils::types::Point;

    pub const STAGE_SWITCH: Point = Point::new(120, 80);
    pub const PRIMARY_PACK: Point = Point::new(300, 80);
    pub const SECONDARY_PACK: Point = Point::new(420, 80);
    pub const UNCLEARED: Point = Point::new(700, 900);
    pub const AUTO_OFF: Point = Point::new(1700, 60);
    pub const AUTO_ON: Point = Point::new(1700, 400);
    pub const WIN: Point = Point::new(960, 500);
    pub const LOSE: Point = Point::new(960, 520);
    pub const SETTLE_CONFIRM: Point = Point::new(960, 950);
    pub const SETTLE_FINISH: Point = Point::new(1500, 950);
    pub const WIN_FINISH: Point = Point::new(960, 1000);
    pub const BACK: Point = Point::new(60, 60);
    pub const LOBBY: Point = Point::new(1200, 700);

    #[must_use]
    pub fn difficulty(tier: usize) -> Point {
        Point::new(200 + 150 * i32::try_from(tier).unwrap_or(0), 600)
    }

    #[must_use]
    pub fn stage(stage: u32) -> Point {
        Point::new(800, 100 + 60 * i32::try_from(stage).unwrap_or(0))
    }
}

/// Everything the engine did to the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Tap(Point),
    Swipe(Swipe),
    Shell(String),
    StopApp,
    StartApp,
    Connect,
    Kill(String),
    ManagerShutdown,
    ManagerLaunch,
}

impl Event {
    /// Where a tap or long press landed.
    #[must_use]
    pub fn touch_point(&self) -> Option<Point> {
        match self {
            Self::Tap(p) => Some(*p),
            Self::Swipe(s) if s.from == s.to => Some(s.from),
            _ => None,
        }
    }
}

/// Touch input only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tap {
    At(Point),
    Swipe(Swipe),
}

/// Templates currently on screen and where.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    visible: BTreeMap<String, Point>,
}

impl Screen {
    pub fn show(&mut self, name: &str, at: Point) {
        self.visible.insert(name.to_string(), at);
    }

    pub fn hide(&mut self, name: &str) {
        self.visible.remove(name);
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<Point> {
        self.visible.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy)]
enum Gate {
    Captures(usize),
    Touches(usize),
    Swipes(usize),
}

#[derive(Debug, Clone)]
struct Scheduled {
    name: String,
    show: Option<Point>,
    gate: Gate,
}

type Reaction = Box<dyn FnMut(&Event, &mut Screen) + Send>;

#[derive(Default)]
struct Inner {
    screen: Screen,
    frames: Vec<BTreeMap<String, Point>>,
    events: Vec<(Duration, Event)>,
    scheduled: Vec<Scheduled>,
    reactions: Vec<Reaction>,
    captures: usize,
    capture_failures: u32,
    connect_failures: u32,
    start_failures: u32,
}

impl Inner {
    fn touches(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| matches!(e, Event::Tap(_) | Event::Swipe(_)))
            .count()
    }

    fn swipes(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| matches!(e, Event::Swipe(_)))
            .count()
    }

    fn apply_scheduled(&mut self) {
        let (captures, touches, swipes) = (self.captures, self.touches(), self.swipes());
        let due = |gate: Gate| match gate {
            Gate::Captures(n) => captures >= n,
            Gate::Touches(n) => touches >= n,
            Gate::Swipes(n) => swipes >= n,
        };
        let (ready, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.scheduled).into_iter().partition(|s| due(s.gate));
        self.scheduled = pending;
        for change in ready {
            match change.show {
                Some(at) => self.screen.show(&change.name, at),
                None => self.screen.hide(&change.name),
            }
        }
    }
}

/// Scripted device plus matcher.
pub struct FakeDevice {
    inner: Mutex<Inner>,
    clock: Mutex<Option<Arc<dyn Clock>>>,
    backend: Vec<String>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock: Mutex::new(None),
            backend: vec!["emu-player".to_string(), "emu-headless".to_string()],
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timestamp events with `clock`.
    pub fn attach_clock(&self, clock: Arc<dyn Clock>) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) = Some(clock);
    }

    fn now(&self) -> Duration {
        self.clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(Duration::ZERO, |c| c.now())
    }

    pub fn show(&self, name: &str, at: Point) {
        self.lock().screen.show(name, at);
    }

    pub fn hide(&self, name: &str) {
        self.lock().screen.hide(name);
    }

    fn schedule(&self, name: &str, show: Option<Point>, gate: Gate) {
        self.lock().scheduled.push(Scheduled {
            name: name.to_string(),
            show,
            gate,
        });
    }

    /// Visible from the capture after `n` earlier captures.
    pub fn show_after_captures(&self, name: &str, at: Point, n: usize) {
        self.schedule(name, Some(at), Gate::Captures(n));
    }

    pub fn hide_after_captures(&self, name: &str, n: usize) {
        self.schedule(name, None, Gate::Captures(n));
    }

    /// Visible once `n` taps or swipes have happened.
    pub fn show_after_taps(&self, name: &str, at: Point, n: usize) {
        self.schedule(name, Some(at), Gate::Touches(n));
    }

    pub fn show_after_swipes(&self, name: &str, at: Point, n: usize) {
        self.schedule(name, Some(at), Gate::Swipes(n));
    }

    /// Run `reaction` after every successful device call.
    pub fn on_event(&self, reaction: impl FnMut(&Event, &mut Screen) + Send + 'static) {
        self.lock().reactions.push(Box::new(reaction));
    }

    /// Run `reaction` when a touch lands on `name`'s current position.
    pub fn on_tap(&self, name: &str, mut reaction: impl FnMut(&mut Screen) + Send + 'static) {
        let name = name.to_string();
        self.on_event(move |event, screen| {
            if event.touch_point().is_some() && event.touch_point() == screen.position(&name) {
                reaction(screen);
            }
        });
    }

    pub fn fail_captures(&self, n: u32) {
        self.lock().capture_failures = n;
    }

    pub fn fail_connects(&self, n: u32) {
        self.lock().connect_failures = n;
    }

    pub fn fail_start_app(&self, n: u32) {
        self.lock().start_failures = n;
    }

    /// Capture attempts, failed ones included.
    #[must_use]
    pub fn captures(&self) -> usize {
        self.lock().captures
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    #[must_use]
    pub fn taps(&self) -> Vec<Tap> {
        self.timed_taps().into_iter().map(|(_, t)| t).collect()
    }

    #[must_use]
    pub fn timed_taps(&self) -> Vec<(Duration, Tap)> {
        self.lock()
            .events
            .iter()
            .filter_map(|(at, e)| match e {
                Event::Tap(p) => Some((*at, Tap::At(*p))),
                Event::Swipe(s) => Some((*at, Tap::Swipe(*s))),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn swipes(&self) -> usize {
        self.lock().swipes()
    }

    /// Record `event`, then run reactions unless the call failed.
    fn record(&self, event: Event, succeeded: bool) {
        let at = self.now();
        let mut inner = self.lock();
        inner.events.push((at, event.clone()));
        if succeeded {
            let Inner {
                reactions, screen, ..
            } = &mut *inner;
            for reaction in reactions.iter_mut() {
                reaction(&event, screen);
            }
        }
    }

    fn frame_for(id: usize) -> Frame {
        let id = u32::try_from(id).unwrap_or(u32::MAX);
        let [_, r, g, b] = id.to_be_bytes();
        Frame::from_rgb(RgbImage::from_pixel(1, 1, Rgb([r, g, b])))
    }

    fn frame_id(frame: &Frame) -> usize {
        let Rgb([r, g, b]) = *frame.rgb().get_pixel(0, 0);
        u32::from_be_bytes([0, r, g, b]) as usize
    }
}

impl DeviceControl for FakeDevice {
    fn capture_screen(&self) -> Result<Frame, DeviceError> {
        let mut inner = self.lock();
        inner.apply_scheduled();
        inner.captures += 1;
        if inner.capture_failures > 0 {
            inner.capture_failures -= 1;
            return Err(DeviceError::CaptureDecode {
                reason: "scripted capture failure".to_string(),
            });
        }
        let id = inner.frames.len();
        let snapshot = inner.screen.visible.clone();
        inner.frames.push(snapshot);
        Ok(Self::frame_for(id))
    }

    fn tap(&self, at: Point) -> Result<(), DeviceError> {
        self.record(Event::Tap(at), true);
        Ok(())
    }

    fn swipe(&self, swipe: Swipe) -> Result<(), DeviceError> {
        self.record(Event::Swipe(swipe), true);
        Ok(())
    }

    fn run_shell(&self, command: &str) -> Result<String, DeviceError> {
        self.record(Event::Shell(command.to_string()), true);
        Ok(command
            .strip_prefix("echo ")
            .map(|rest| format!("{rest}\n"))
            .unwrap_or_default())
    }

    fn stop_app(&self) -> Result<(), DeviceError> {
        self.record(Event::StopApp, true);
        Ok(())
    }

    fn start_app(&self) -> Result<(), DeviceError> {
        let failed = {
            let mut inner = self.lock();
            let failed = inner.start_failures > 0;
            inner.start_failures = inner.start_failures.saturating_sub(1);
            failed
        };
        self.record(Event::StartApp, !failed);
        if failed {
            return Err(DeviceError::CommandFailed {
                command: "monkey".to_string(),
                reason: "scripted start failure".to_string(),
            });
        }
        Ok(())
    }

    fn connect(&self) -> Result<(), DeviceError> {
        let failed = {
            let mut inner = self.lock();
            let failed = inner.connect_failures > 0;
            inner.connect_failures = inner.connect_failures.saturating_sub(1);
            failed
        };
        self.record(Event::Connect, !failed);
        if failed {
            return Err(DeviceError::ConnectFailed {
                serial: "fake".to_string(),
                output: "cannot connect".to_string(),
            });
        }
        Ok(())
    }

    fn kill_process_by_name(&self, name: &str) -> usize {
        self.record(Event::Kill(name.to_string()), true);
        1
    }

    fn backend_process_names(&self) -> Vec<String> {
        self.backend.clone()
    }

    fn manager_shutdown(&self, _timeout: Duration) -> Result<(), DeviceError> {
        self.record(Event::ManagerShutdown, true);
        Ok(())
    }

    fn manager_launch(&self) -> Result<(), DeviceError> {
        self.record(Event::ManagerLaunch, true);
        Ok(())
    }
}

impl ImageSearch for FakeDevice {
    fn best_match(&self, frame: &Frame, name: &str) -> Result<Option<Match>, VisionError> {
        let inner = self.lock();
        Ok(inner
            .frames
            .get(Self::frame_id(frame))
            .and_then(|visible| visible.get(name))
            .map(|center| Match {
                center: *center,
                top_left: *center,
                width: 1,
                height: 1,
                score: 1.0,
            }))
    }
}

/// Records every report instead of capturing evidence.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context labels in report order.
    #[must_use]
    pub fn contexts(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, context)| context.clone())
            .collect()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(error, _)| error.clone())
            .collect()
    }
}

impl CrashReporter for RecordingReporter {
    fn report(&self, error: &CampaignError, context: &str) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((error.to_string(), context.to_string()));
    }
}

/// Ops over `device` with default configuration and a virtual clock.
pub fn harness(device: FakeDevice) -> (Arc<FakeDevice>, Arc<ManualClock>, Ops) {
    harness_with(device, &Config::default())
}

pub fn harness_with(device: FakeDevice, config: &Config) -> (Arc<FakeDevice>, Arc<ManualClock>, Ops) {
    harness_with_state(device, config, Arc::new(RunState::new()))
}

pub fn harness_with_state(
    device: FakeDevice,
    config: &Config,
    run_state: Arc<RunState>,
) -> (Arc<FakeDevice>, Arc<ManualClock>, Ops) {
    let clock = Arc::new(ManualClock::new());
    device.attach_clock(clock.clone());
    let device = Arc::new(device);
    let ops = Ops::new(
        device.clone(),
        device.clone(),
        run_state,
        clock.clone(),
        CampaignTemplates::from_config(config),
        Timings::from_config(config),
    );
    (device, clock, ops)
}

/// One stage-select screen whose missions end in `outcome`. The uncleared
/// marker disappears after `missions` battles.
pub fn script_battle(device: &FakeDevice, outcome: BattleOutcome, missions: u32) {
    device.show("change.png", points::STAGE_SWITCH);
    device.show("Auto_off.png", points::AUTO_OFF);
    device.show("Auto_on.png", points::AUTO_ON);
    if missions > 0 {
        device.show("unclear.png", points::UNCLEARED);
    }

    device.on_tap("unclear.png", move |screen| match outcome {
        BattleOutcome::Win => screen.show("win.png", points::WIN),
        BattleOutcome::Lose => {
            screen.show("lose.png", points::LOSE);
            screen.show("fin_1.png", points::SETTLE_CONFIRM);
        }
        BattleOutcome::Timeout => {}
    });
    device.on_tap("win.png", |screen| {
        screen.hide("win.png");
        screen.show("fin_1.png", points::SETTLE_CONFIRM);
    });
    device.on_tap("fin_1.png", |screen| screen.show("fin_2.png", points::SETTLE_FINISH));

    let mut remaining = missions;
    device.on_event(move |event, screen| {
        let Some(at) = event.touch_point() else { return };
        if screen.position("fin_2.png") == Some(at) {
            screen.hide("fin_1.png");
            screen.hide("fin_2.png");
            screen.hide("lose.png");
            if outcome == BattleOutcome::Win {
                screen.show("win_fin.png", points::WIN_FINISH);
                return;
            }
        } else if screen.position("win_fin.png") == Some(at) {
            screen.hide("win_fin.png");
        } else {
            return;
        }
        remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            screen.hide("unclear.png");
        }
    });
}

/// A whole campaign world: every tier and stage reachable, one winnable
/// mission per stage, a lobby for recovery.
pub fn script_campaign(device: &FakeDevice, config: &Config) {
    for (tier, name) in config.campaign.difficulties.iter().enumerate() {
        device.show(name, points::difficulty(tier));
    }
    device.show(&config.templates.primary_pack.file, points::PRIMARY_PACK);
    device.show(&config.templates.secondary_pack.file, points::SECONDARY_PACK);
    device.show(&config.templates.back.file, points::BACK);
    device.show(&config.templates.lobby.file, points::LOBBY);

    let stages: Vec<String> = (1..=config.campaign.total_stages)
        .map(|n| config.stage_template_name(n))
        .collect();
    for (n, name) in (1..).zip(&stages) {
        device.show(name, points::stage(n));
    }

    script_battle(device, BattleOutcome::Win, 1);
    device.on_event(move |event, screen| {
        let Some(at) = event.touch_point() else { return };
        if stages.iter().any(|name| screen.position(name) == Some(at)) {
            screen.show("unclear.png", points::UNCLEARED);
        }
    });
}

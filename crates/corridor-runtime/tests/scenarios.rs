//! End-to-end runs of the control loop against the simulation rig.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use corridor_hal::{
    CaptureEngine, DEFAULT_TICK_MAX, MotorChannel, RangingSequencer, SimProbe, SimRig,
};
use corridor_perception::HistoryFilter;
use corridor_runtime::{ControlLoop, ControlLoopConfig, NavigationPolicy, Ranger};
use corridor_types::{CycleReport, NavigationState, SensorId, SpeedPair, Ticks};

const CLOCK_HZ: u32 = 1_200_000;

struct Scenario {
    front: Vec<Ticks>,
    side: Vec<Ticks>,
    start_tick: u64,
    tick_max: Ticks,
    config: ControlLoopConfig,
}

impl Scenario {
    /// Six priming pings: three per sensor, so each filter has a full history
    /// before the first decision.
    fn new(front: Vec<Ticks>, side: Vec<Ticks>) -> Self {
        Self {
            front,
            side,
            start_tick: 0,
            tick_max: DEFAULT_TICK_MAX,
            config: ControlLoopConfig {
                priming_pings: 6,
                ..ControlLoopConfig::default()
            },
        }
    }

    fn policy(mut self, policy: NavigationPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    fn starting_at(mut self, tick: u64) -> Self {
        self.start_tick = tick;
        self
    }

    /// Run on a 32-bit capture timer, which never wraps within a scenario.
    fn wide_timer(mut self) -> Self {
        self.tick_max = u32::MAX;
        self
    }

    fn build(self) -> (ControlLoop, SimProbe) {
        let engine = Arc::new(CaptureEngine::new(self.tick_max));
        let hw = SimRig::new(Arc::clone(&engine), CLOCK_HZ)
            .with_echoes(SensorId::FRONT, self.front)
            .with_echoes(SensorId::SIDE, self.side)
            .starting_at(self.start_tick)
            .build();
        let ranger = Ranger::new(
            RangingSequencer::new(engine, hw.trigger, hw.delay),
            Box::new(HistoryFilter::new()),
        );
        let control =
            ControlLoop::new(self.config, ranger, MotorChannel::new(hw.motor_link)).unwrap();
        (control, hw.probe)
    }
}

fn run(control: &mut ControlLoop, iterations: u64) -> Vec<CycleReport> {
    let mut reports = Vec::new();
    for _ in 0..iterations {
        reports.push(control.iterate().unwrap());
    }
    reports
}

fn front_pings(probe: &SimProbe) -> usize {
    probe
        .triggers()
        .iter()
        .filter(|s| **s == SensorId::FRONT)
        .count()
}

#[test]
fn close_reading_dodges_under_default_policy() {
    let (mut control, probe) = Scenario::new(vec![1800, 1820, 1805, 5000], vec![2400])
        .wide_timer()
        .build();
    control.start().unwrap();
    assert_eq!(control.ranger().reading(SensorId::FRONT), 1805);

    let reports = run(&mut control, 1);
    assert_eq!(reports[0].state, NavigationState::Dodge);
    assert_eq!(probe.motor_bytes(), vec![0, 70, 5 + 128]);
    assert_eq!(reports[0].front, 5000);
}

#[test]
fn close_reading_corrects_when_dodge_threshold_is_below_it() {
    let policy = NavigationPolicy {
        dodge_threshold: 1800,
        ..NavigationPolicy::default()
    };
    let (mut control, probe) = Scenario::new(vec![1800, 1820, 1805], vec![2400])
        .policy(policy)
        .wide_timer()
        .build();
    control.start().unwrap();

    let reports = run(&mut control, 1);
    assert_eq!(reports[0].front, 1805);
    assert_eq!(reports[0].state, NavigationState::Forward);
    assert_eq!(reports[0].speeds, Some(SpeedPair::new(40, 40)));
    assert_eq!(probe.motor_bytes(), vec![0, 40, 40 + 128]);
}

#[test]
fn close_reading_straddling_the_16_bit_wrap_loses_one_tick() {
    // 62.5 ms warm-up plus four 25 ms pings puts the third front echo across
    // 0xFFFF; (tick_max - rising) + falling reads 1804 instead of 1805.
    let (mut control, _probe) = Scenario::new(vec![1800, 1820, 1805], vec![2400]).build();
    control.start().unwrap();
    assert_eq!(control.ranger().reading(SensorId::FRONT), 1804);
}

#[test]
fn obstacle_ahead_stops_reverses_and_waits_for_clearance() {
    let (mut control, probe) = Scenario::new(
        vec![1200, 1150, 1180, 2000, 3000, 3900, 4000],
        vec![2400],
    )
    .build();
    control.start().unwrap();
    assert_eq!(control.ranger().reading(SensorId::FRONT), 1180);

    let reports = run(&mut control, 1);
    assert_eq!(reports[0].state, NavigationState::StopRecover);
    // all-stop, neutral, reverse
    assert_eq!(probe.motor_bytes(), vec![0, 64, 192, 90, 218]);
    // three priming pings, four recovery pings (filtered 1150, 1180, 3000, 3900)
    assert_eq!(front_pings(&probe), 7);
    assert_eq!(reports[0].front, 3900);
}

#[test]
fn bounded_recovery_gives_up_and_loop_continues() {
    let policy = NavigationPolicy {
        recovery_limit: Some(2),
        ..NavigationPolicy::default()
    };
    let (mut control, probe) = Scenario::new(vec![1200, 1150, 1180], vec![2400])
        .policy(policy)
        .build();
    control.start().unwrap();

    let reports = run(&mut control, 2);
    assert!(reports.iter().all(|r| r.state == NavigationState::StopRecover));
    assert_eq!(reports[1].speeds, Some(SpeedPair::NEUTRAL));
    assert_eq!(
        probe.motor_bytes(),
        vec![0, 64, 192, 90, 218, 64, 192, 64, 192, 90, 218, 64, 192]
    );
    // priming 3, iteration 1: 2 recovery, iteration 2: front ping + 2 recovery
    assert_eq!(front_pings(&probe), 3 + 2 + 1 + 2);
}

#[test]
fn unbounded_recovery_waits_out_a_long_blockage() {
    let mut front = vec![1200, 1150, 1180];
    front.extend(std::iter::repeat_n(1180, 200));
    front.extend([4000, 4000]);
    let (mut control, probe) = Scenario::new(front, vec![2400]).build();
    control.start().unwrap();

    let reports = run(&mut control, 1);
    assert_eq!(reports[0].state, NavigationState::StopRecover);
    assert_eq!(front_pings(&probe), 3 + 202);
    assert_eq!(reports[0].front, 4000);
}

#[test]
fn silent_front_sensor_never_triggers_avoidance() {
    let (mut control, probe) = Scenario::new(vec![0], vec![1200]).build();
    control.start().unwrap();

    let reports = run(&mut control, 6);
    for r in &reports {
        assert_eq!(r.front, 0);
        assert_eq!(r.state, NavigationState::Forward);
        assert_eq!(r.speeds, Some(SpeedPair::new(50, 30)));
    }
    assert!(!probe.motor_bytes()[1..].contains(&64));
}

#[test]
fn timed_turn_policy_turns_blind() {
    let policy = NavigationPolicy {
        avoidance: corridor_runtime::AvoidanceStrategy::TimedTurn,
        ..NavigationPolicy::default()
    };
    let (mut control, probe) = Scenario::new(vec![1800, 1820, 1805], vec![2400])
        .policy(policy)
        .build();
    control.start().unwrap();

    let reports = run(&mut control, 1);
    assert_eq!(reports[0].state, NavigationState::Turn);
    assert_eq!(probe.motor_bytes(), vec![0, 20, 58 + 128]);
    assert_eq!(control.navigator().turns(), 1);
}

#[test]
fn sensors_are_pinged_one_at_a_time_in_round_robin() {
    let mut scenario = Scenario::new(vec![6000], vec![2400]);
    scenario.config.max_iterations = Some(8);
    let (mut control, probe) = scenario.build();

    let ran = control.run(&AtomicBool::new(false), |_| {}).unwrap();
    assert_eq!(ran, 8);

    let triggers = probe.triggers();
    let main_loop = &triggers[6..];
    assert_eq!(main_loop.len(), 8);
    for (i, sensor) in main_loop.iter().enumerate() {
        let expected = if i % 2 == 0 { SensorId::SIDE } else { SensorId::FRONT };
        assert_eq!(*sensor, expected);
    }
    assert_eq!(probe.overlaps(), 0);
    // all-stop at startup and on exit
    assert_eq!(probe.motor_bytes().first(), Some(&0));
    assert_eq!(probe.motor_bytes().last(), Some(&0));
}

#[test]
fn readings_survive_timer_rollover() {
    // 62.5 ms warm-up plus four 25 ms pings puts the third front echo
    // 500 ticks before the 16-bit timer wraps.
    let (mut control, _probe) = Scenario::new(vec![1800], vec![2400])
        .starting_at(1048)
        .build();
    control.start().unwrap();

    let engine = control.ranger().sequencer().engine();
    // (0xFFFF - rising) + falling drops one tick across the wrap
    assert_eq!(engine.latest_duration(0).unwrap(), 1799);
    assert_eq!(control.ranger().reading(SensorId::FRONT), 1800);
    assert_eq!(control.ranger().reading(SensorId::SIDE), 2400);
}

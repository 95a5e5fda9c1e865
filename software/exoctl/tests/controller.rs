//! End-to-end runs of the position controller against the software mockup

use std::num::NonZeroUsize;

use approx::assert_relative_eq;
use serde::{Deserialize, Serialize};

use exoctl::*;

const ACTUATORS: [&str; 3] = ["exoHipActuator_r", "exoKneeActuator_r", "exoAnkleActuator_r"];

fn gains() -> [PidGains; 3] {
    [
        PidGains::new(50.0, 2.0, 0.1),
        PidGains::new(40.0, 1.5, 0.1),
        PidGains::new(20.0, 1.0, 0.05),
    ]
}

/// Controller whose references match the mockup's initial (zero) angles
fn at_rest() -> PositionController {
    PositionController::new(ControllerConfig::reference_exoskeleton([0.0; 3], gains())).unwrap()
}

fn ctx() -> ControllerCtx {
    ControllerCtx::new("test", std::env::temp_dir())
}

/// Fails on every call, for exercising telemetry fault isolation
#[derive(Serialize, Deserialize, Default)]
struct BrokenRecorder {
    fail_init: bool,
}

#[typetag::serde]
impl Recorder for BrokenRecorder {
    fn init(&mut self, _ctx: &ControllerCtx, _column_names: &[String]) -> Result<(), String> {
        if self.fail_init {
            Err("disk on fire".into())
        } else {
            Ok(())
        }
    }

    fn consume(&mut self, _values: Vec<f64>) -> Result<(), String> {
        Err("queue full".into())
    }

    fn terminate(&mut self) -> Result<(), String> {
        Ok(())
    }
}

#[test]
fn zero_error_holds_against_gravity_and_coriolis() {
    let mut controller = at_rest();
    let system = MockupSystem::reference_exoskeleton();
    let mut controls = ActuatorControls::new(ACTUATORS);
    controller.init(&ctx(), &system).unwrap();

    let step = controller.step(&system, &mut controls).unwrap();

    assert!(step.acceleration.generalized.iter().all(|&a| a == 0.0));
    assert!(step.joint_torques.dynamics.iter().all(|&t| t == 0.0));

    // (coriolis - gravity) summed over each joint's slots, over a rated force of 100
    let expected = [
        (0.02 + 0.02 + 4.1 + 4.1) / 100.0,
        (0.01 + 0.005 + 0.01 + 2.3 + 1.1 + 2.3) / 100.0,
        (0.001 + 0.001 + 0.3 + 0.3) / 100.0,
    ];
    for (actuator, want) in ACTUATORS.iter().zip(expected) {
        assert_relative_eq!(controls.get(actuator).unwrap(), want, epsilon = 1e-12);
    }
}

#[test]
fn hip_error_drives_both_hip_slots() {
    let mut controller = PositionController::new(ControllerConfig::reference_exoskeleton(
        [0.2, 0.0, 0.0],
        gains(),
    ))
    .unwrap();
    let mut system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx(), &system).unwrap();

    system.set_joint_angle("exoHipJoint_coord", 0.1);
    let step = controller
        .step(&system, &mut ActuatorControls::new(ACTUATORS))
        .unwrap();

    // First step seeds the previous error with the reference
    let (e, e_prev, dt) = (0.1, 0.2, 0.033);
    let u = 50.0 * e + 2.0 * (e - e_prev) / dt + 0.1 * (e + e_prev) * dt;
    assert_relative_eq!(step.acceleration.joint_outputs[0], u, epsilon = 1e-9);

    let a = &step.acceleration.generalized;
    assert_relative_eq!(a[0], u, epsilon = 1e-9);
    assert_relative_eq!(a[6], u, epsilon = 1e-9);
    assert!((1..6).all(|i| a[i] == 0.0));

    // Slots 0 and 6 only couple to undriven neighbours, so each contributes 1.2 * u
    assert_relative_eq!(step.joint_torques.dynamics[0], 2.4 * u, epsilon = 1e-9);
}

#[test]
fn knee_error_mirrors_into_three_slots() {
    let mut controller = PositionController::new(ControllerConfig::reference_exoskeleton(
        [0.0, -0.5, 0.0],
        gains(),
    ))
    .unwrap();
    let system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx(), &system).unwrap();

    let step = controller
        .step(&system, &mut ActuatorControls::new(ACTUATORS))
        .unwrap();
    let a = &step.acceleration.generalized;
    let u = step.acceleration.joint_outputs[1];
    assert!(u < 0.0);
    for i in [1, 2, 5] {
        assert_relative_eq!(a[i], u, epsilon = 1e-12);
    }
    for i in [0, 3, 4, 6] {
        assert_eq!(a[i], 0.0);
    }
}

#[test]
fn malformed_model_output_aborts_without_writing() {
    let mut controller = at_rest();
    let mut system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx(), &system).unwrap();

    system.set_gravity(nalgebra::DVector::zeros(5));
    let mut controls = ActuatorControls::new(ACTUATORS);
    let err = controller.step(&system, &mut controls).unwrap_err();
    assert!(controller.pid_states().iter().all(|s| s.previous_error().is_none()));

    match err {
        ControlError::StateQuery { query, .. } => assert_eq!(query, "gravity generalized force"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(controls.values().values().all(|&v| v == 0.0));

    // The run continues once the model recovers
    system.set_gravity(MockupSystem::reference_exoskeleton().gravity().clone());
    controller.step(&system, &mut controls).unwrap();
    assert!(controls.values().values().all(|&v| v > 0.0));
}

#[test]
fn unknown_actuator_write_is_reported() {
    let mut controller = PositionController::new(ControllerConfig::reference_exoskeleton(
        [0.3, -0.3, 0.3],
        gains(),
    ))
    .unwrap();
    let mut system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx(), &system).unwrap();

    controller
        .step(&system, &mut ActuatorControls::new(ACTUATORS))
        .unwrap();
    let before = controller.pid_states();
    assert_relative_eq!(before[0].previous_error().unwrap(), 0.3, epsilon = 1e-12);

    // A different error this step, so an advanced state would be visible
    system.set_joint_angle("exoHipJoint_coord", 0.1);
    let mut controls = ActuatorControls::new(["exoHipActuator_r", "exoKneeActuator_r"]);
    let err = controller.step(&system, &mut controls).unwrap_err();
    match err {
        ControlError::Actuation { actuator, .. } => assert_eq!(actuator, "exoAnkleActuator_r"),
        other => panic!("unexpected error {other:?}"),
    }

    // Writes before the failing actuator stand, the error state does not advance
    assert!(controls.get("exoHipActuator_r").unwrap() > 0.0);
    assert_eq!(controller.pid_states(), before);
}

#[test]
fn init_rejects_unresolvable_model() {
    let mut missing_joint = MockupSystem::reference_exoskeleton();
    missing_joint.remove_coordinate("kneeJoint_r_coord");
    let zero_rated = MockupSystem::reference_exoskeleton().with_actuator("exoKneeActuator_r", 0.0);
    let wrong_dof = MockupSystem::new(nalgebra::DMatrix::identity(6, 6))
        .with_coordinate("exoHipJoint_coord", 0.0)
        .with_coordinate("kneeJoint_r_coord", 0.0)
        .with_coordinate("ankleJoint_r_coord", 0.0);

    for system in [missing_joint, zero_rated, wrong_dof] {
        let mut controller = at_rest();
        let err = controller.init(&ctx(), &system).unwrap_err();
        assert!(err.is_configuration_fault(), "{err}");
        assert!(!controller.is_initialized());
    }
}

#[test]
fn telemetry_faults_never_reach_the_control_path() {
    let mut controller = at_rest();
    let (latest, handle) = LatestRowRecorder::new();
    controller.add_recorder("latest", Box::new(latest)).unwrap();
    controller
        .add_recorder("broken", Box::new(BrokenRecorder::default()))
        .unwrap();
    controller
        .add_recorder("unstartable", Box::new(BrokenRecorder { fail_init: true }))
        .unwrap();

    let mut system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx(), &system).unwrap();

    for i in 0..5 {
        system.set_time(i as f64 * 0.033);
        controller
            .step(&system, &mut ActuatorControls::new(ACTUATORS))
            .unwrap();
    }

    // Only the recorder that started counts faults
    assert_eq!(controller.telemetry_faults(), 5);
    assert_relative_eq!(handle.latest().get("time").unwrap(), 4.0 * 0.033, epsilon = 1e-12);

    controller.terminate();
    assert_eq!(controller.telemetry_faults(), 0);
}

#[test]
fn csv_run_has_one_row_per_step() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ControllerCtx::new("approach", dir.path());

    let mut controller = PositionController::new(ControllerConfig::reference_exoskeleton(
        [0.3, -0.6, 0.1],
        gains(),
    ))
    .unwrap();
    controller
        .add_recorder("csv", Box::new(CsvRecorder::default()))
        .unwrap();
    let mut system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx, &system).unwrap();

    for i in 0..10 {
        let t = i as f64 * 0.033;
        system.set_time(t);
        system.set_joint_angle("exoHipJoint_coord", 0.03 * i as f64);
        controller
            .step(&system, &mut ActuatorControls::new(ACTUATORS))
            .unwrap();
    }
    controller.terminate();
    assert_eq!(controller.telemetry_faults(), 0);

    let text = std::fs::read_to_string(dir.path().join("approach.csv")).unwrap();
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(header.len(), 16);
    assert_eq!(header[0], "hip.error");
    assert_eq!(header[3], "hip.position");
    assert_eq!(header[14], "ankle.gravity");
    assert_eq!(header[15], "time");

    let rows: Vec<Vec<f64>> = lines
        .map(|l| l.split(',').map(|v| v.trim().parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|r| r.len() == 16));
    assert_relative_eq!(rows[9][15], 9.0 * 0.033, epsilon = 1e-12);
    assert_relative_eq!(rows[9][3], 0.27, epsilon = 1e-12);
    assert_relative_eq!(rows[9][0], 0.3 - 0.27, epsilon = 1e-12);
}

#[test]
fn decimated_csv_keeps_every_nth_step() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ControllerCtx::new("decimated", dir.path());

    let mut controller = at_rest();
    let csv = Box::new(CsvRecorder::default());
    controller
        .add_recorder(
            "csv",
            Box::new(DecimationRecorder::new(csv, NonZeroUsize::new(4).unwrap())),
        )
        .unwrap();
    let system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx, &system).unwrap();
    for _ in 0..9 {
        controller
            .step(&system, &mut ActuatorControls::new(ACTUATORS))
            .unwrap();
    }
    controller.terminate();

    let text = std::fs::read_to_string(dir.path().join("decimated.csv")).unwrap();
    // Header plus steps 0, 4, 8
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn controller_survives_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("controller.json");

    let mut controller = at_rest();
    controller
        .add_recorder("csv", Box::new(CsvRecorder::new(128)))
        .unwrap();
    std::fs::write(&config_path, serde_json::to_string_pretty(&controller).unwrap()).unwrap();

    let text = std::fs::read_to_string(&config_path).unwrap();
    let mut reloaded: PositionController = serde_json::from_str(&text).unwrap();
    assert_eq!(reloaded.config(), controller.config());

    let system = MockupSystem::reference_exoskeleton();
    let run = ControllerCtx::new("reloaded", dir.path());
    reloaded.init(&run, &system).unwrap();
    reloaded
        .step(&system, &mut ActuatorControls::new(ACTUATORS))
        .unwrap();
    reloaded.terminate();
    assert!(dir.path().join("reloaded.csv").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn full_disk_is_counted_as_telemetry_faults() {
    let dir = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink("/dev/full", dir.path().join("full.csv")).unwrap();
    let ctx = ControllerCtx::new("full", dir.path());

    let mut controller = at_rest();
    controller
        .add_recorder("csv", Box::new(CsvRecorder::default()))
        .unwrap();
    let system = MockupSystem::reference_exoskeleton();
    controller.init(&ctx, &system).unwrap();

    for _ in 0..1000 {
        controller
            .step(&system, &mut ActuatorControls::new(ACTUATORS))
            .unwrap();
        if controller.telemetry_faults() > 0 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert!(controller.telemetry_faults() > 0);
}

//! Hold a three-joint exoskeleton at a crouched posture against the software mockup.
//!
//! Demonstrated here:
//!   * Configuring the reference exoskeleton and connecting to a mechanical model
//!   * Storing telemetry
//!   * Stepping the controller from a host loop
//!   * Serialization and deserialization of the controller

use exoctl::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = ControllerCtx::default();
    ctx.op_name = "basic_example".into();
    ctx.op_dir = std::env::temp_dir();
    let log_path = logging::init_logging(&ctx.op_dir, &ctx.op_name)?;

    // Hip, knee, ankle
    let config = ControllerConfig::reference_exoskeleton(
        [0.35, -0.7, 0.15],
        [
            PidGains::new(60.0, 2.0, 0.1),
            PidGains::new(45.0, 1.5, 0.1),
            PidGains::new(20.0, 0.8, 0.05),
        ],
    );
    let mut controller = PositionController::new(config)?;

    // Set up data targets
    controller.add_recorder("csv", Box::new(CsvRecorder::default()))?;

    // Serialize and deserialize the controller (for demonstration purposes)
    let serialized = serde_json::to_string_pretty(&controller)?;
    let mut controller: PositionController = serde_json::from_str(&serialized)?;

    let mut system = MockupSystem::reference_exoskeleton();
    let mut controls = ActuatorControls::new(
        controller.config().joints.iter().map(|j| j.actuator.clone()),
    );
    controller.init(&ctx, &system)?;

    // Stand-in for the host's integrator: each joint closes a fixed fraction
    // of its remaining error per step
    let dt = controller.config().dt_s;
    for n in 0..100 {
        let step = controller.step(&system, &mut controls)?;
        for (j, joint) in controller.config().joints.iter().enumerate() {
            let x = step.positions[j] + 0.1 * step.terms[j].error;
            system.set_joint_angle(&joint.coordinate, x);
        }
        system.set_time((n + 1) as f64 * dt);
    }

    controller.terminate();
    println!("Telemetry written to {:?}", ctx.op_dir.join("basic_example.csv"));
    println!("Log written to {log_path:?}");
    println!("Final controls: {:?}", controls.values());

    Ok(())
}

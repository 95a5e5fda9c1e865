//! Desired generalized acceleration from per-joint PID outputs

use nalgebra::DVector;

use super::{PidTerms, Topology};
use crate::config::PidGains;

/// One step's desired acceleration, both per joint and across the chain
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredAcceleration {
    /// PID output of each joint, in joint order
    pub joint_outputs: Vec<f64>,

    /// Generalized acceleration with each joint's output copied into the slots it drives
    pub generalized: DVector<f64>,
}

/// Weight each joint's terms by its gains and spread the result over the chain
pub fn synthesize(
    topology: &Topology,
    gains: &[PidGains],
    terms: &[PidTerms],
) -> DesiredAcceleration {
    let joint_outputs: Vec<f64> = terms
        .iter()
        .zip(gains.iter())
        .map(|(t, g)| t.output(g))
        .collect();
    let generalized = topology.spread(&joint_outputs);

    DesiredAcceleration {
        joint_outputs,
        generalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControllerConfig;

    fn reference() -> (Topology, Vec<PidGains>) {
        let gains = [
            PidGains::new(50.0, 2.0, 0.1),
            PidGains::new(30.0, 1.5, 0.2),
            PidGains::new(10.0, 0.5, 0.05),
        ];
        let cfg = ControllerConfig::reference_exoskeleton([0.0; 3], gains);
        let topology = cfg.topology().unwrap();
        (topology, gains.to_vec())
    }

    #[test]
    fn knee_value_is_mirrored_into_three_slots() {
        let (topology, gains) = reference();
        let cases = [
            (0.1, -0.3, 2.0),
            (-5.0, 0.0, 1e-3),
            (1e3, 7.5, -42.0),
        ];
        for (error, derivative, integral) in cases {
            let knee = PidTerms {
                error,
                derivative,
                integral,
            };
            let terms = [PidTerms::default(), knee, PidTerms::default()];
            let acc = synthesize(&topology, &gains, &terms);
            let a = &acc.generalized;
            assert_eq!(a[1], acc.joint_outputs[1]);
            assert_eq!(a[1], a[2]);
            assert_eq!(a[1], a[5]);
        }
    }

    #[test]
    fn hip_and_ankle_slots() {
        let (topology, gains) = reference();
        let t = |e: f64| PidTerms {
            error: e,
            derivative: 0.0,
            integral: 0.0,
        };
        let acc = synthesize(&topology, &gains, &[t(1.0), t(2.0), t(3.0)]);
        assert_eq!(acc.joint_outputs, vec![50.0, 60.0, 30.0]);
        assert_eq!(
            acc.generalized.as_slice(),
            &[50.0, 60.0, 60.0, 30.0, 30.0, 60.0, 50.0]
        );
    }

    #[test]
    fn zero_error_gives_zero_acceleration() {
        let (topology, gains) = reference();
        let acc = synthesize(&topology, &gains, &[PidTerms::default(); 3]);
        assert!(acc.generalized.iter().all(|&a| a == 0.0));
        assert_eq!(acc.generalized.len(), 7);
    }
}

//! Recorder wrapper that decimates rows before forwarding them.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::context::ControllerCtx;

use super::Recorder;

/// Wraps another recorder and forwards every Nth row, starting with the first.
#[derive(Serialize, Deserialize)]
pub struct DecimationRecorder {
    nth: NonZeroUsize,
    inner: Box<dyn Recorder>,

    #[serde(skip)]
    remaining: usize,
    #[serde(skip)]
    initialized: bool,
}

impl DecimationRecorder {
    pub fn new(inner: Box<dyn Recorder>, nth: NonZeroUsize) -> Self {
        Self {
            nth,
            inner,
            remaining: 0,
            initialized: false,
        }
    }
}

#[typetag::serde]
impl Recorder for DecimationRecorder {
    fn init(&mut self, ctx: &ControllerCtx, column_names: &[String]) -> Result<(), String> {
        self.remaining = 0;
        let result = self.inner.init(ctx, column_names);
        self.initialized = result.is_ok();
        result
    }

    fn consume(&mut self, values: Vec<f64>) -> Result<(), String> {
        if !self.initialized {
            return Err("DecimationRecorder must be initialized before consuming data".to_owned());
        }

        if self.remaining == 0 {
            self.remaining = self.nth.get() - 1;
            self.inner.consume(values)
        } else {
            self.remaining -= 1;
            Ok(())
        }
    }

    fn terminate(&mut self) -> Result<(), String> {
        let result = self.inner.terminate();
        self.remaining = 0;
        self.initialized = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::LatestRowRecorder;

    #[test]
    fn forwards_every_nth_row() {
        let (latest, handle) = LatestRowRecorder::new();
        let mut recorder = DecimationRecorder::new(Box::new(latest), NonZeroUsize::new(3).unwrap());
        recorder
            .init(&ControllerCtx::default(), &["step".to_owned()])
            .unwrap();

        let mut seen = Vec::new();
        for step in 0..7 {
            recorder.consume(vec![step as f64]).unwrap();
            seen.push(handle.latest().values[0]);
        }
        assert_eq!(seen, vec![0.0, 0.0, 0.0, 3.0, 3.0, 3.0, 6.0]);
    }

    #[test]
    fn consume_before_init_is_an_error() {
        let (latest, _handle) = LatestRowRecorder::new();
        let mut recorder = DecimationRecorder::new(Box::new(latest), NonZeroUsize::MIN);
        assert!(recorder.consume(vec![1.0]).is_err());
    }
}

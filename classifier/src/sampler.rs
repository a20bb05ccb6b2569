use std::time::Instant;

/// Wall-clock gate that lets at most one frame per interval through to the
/// classifier.
///
/// `should_sample` only inspects; the caller records an accepted tick with
/// `mark`. A non-positive interval lets every frame through.
#[derive(Debug, Clone)]
pub struct Sampler {
    interval_secs: f64,
    last_sample: Option<Instant>,
}

impl Sampler {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval_secs,
            last_sample: None,
        }
    }

    pub fn should_sample(&self, now: Instant) -> bool {
        match self.last_sample {
            None => true,
            Some(_) if self.interval_secs <= 0.0 => true,
            Some(last) => now.saturating_duration_since(last).as_secs_f64() >= self.interval_secs,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_sample = Some(now);
    }

    /// Check the gate and, if open, record `now` as the latest sample.
    pub fn try_sample(&mut self, now: Instant) -> bool {
        let open = self.should_sample(now);
        if open {
            self.mark(now);
        }
        open
    }

    pub fn last_sample(&self) -> Option<Instant> {
        self.last_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn throttles_to_interval() {
        let t0 = Instant::now();
        let mut sampler = Sampler::new(1.0);

        assert!(sampler.try_sample(t0));
        assert!(!sampler.try_sample(t0 + Duration::from_millis(500)));
        assert!(sampler.try_sample(t0 + Duration::from_millis(1200)));
        assert_eq!(sampler.last_sample(), Some(t0 + Duration::from_millis(1200)));
    }

    #[test]
    fn boundary_is_inclusive() {
        let t0 = Instant::now();
        let mut sampler = Sampler::new(1.0);
        sampler.mark(t0);
        assert!(sampler.should_sample(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn should_sample_has_no_side_effects() {
        let t0 = Instant::now();
        let sampler = Sampler::new(1.0);
        assert!(sampler.should_sample(t0));
        assert!(sampler.should_sample(t0));
        assert_eq!(sampler.last_sample(), None);
    }

    #[test]
    fn non_positive_interval_always_samples() {
        let t0 = Instant::now();
        for interval in [0.0, -3.0] {
            let mut sampler = Sampler::new(interval);
            assert!(sampler.try_sample(t0));
            assert!(sampler.try_sample(t0));
        }
    }

    #[test]
    fn clock_going_backwards_does_not_sample() {
        let t0 = Instant::now();
        let mut sampler = Sampler::new(1.0);
        sampler.mark(t0 + Duration::from_secs(5));
        assert!(!sampler.should_sample(t0));
    }
}

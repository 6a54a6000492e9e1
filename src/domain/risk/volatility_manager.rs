use std::collections::VecDeque;

/// Compares short-window realized volatility to a long-window baseline
/// for a single (instrument, timeframe), producing the severity ratio
/// `monitor_stress` uses to raise a `StressEvent`.
#[derive(Debug)]
pub struct VolatilityManager {
    short_window: usize,
    baseline_window: usize,
    history: VecDeque<f64>,
}

impl VolatilityManager {
    pub fn new(short_window: usize, baseline_window: usize) -> Self {
        Self {
            short_window,
            baseline_window,
            history: VecDeque::new(),
        }
    }

    /// Feed one new true-range (or similar volatility) observation.
    pub fn update(&mut self, observation: f64) {
        if observation <= 0.0 {
            return;
        }
        self.history.push_back(observation);
        if self.history.len() > self.baseline_window {
            self.history.pop_front();
        }
    }

    /// `short-window average / baseline-window average`, or `None` when
    /// there isn't enough history to compute a baseline yet.
    pub fn severity_ratio(&self) -> Option<f64> {
        if self.history.len() < self.baseline_window {
            return None;
        }
        let baseline_avg = self.history.iter().sum::<f64>() / self.history.len() as f64;
        if baseline_avg <= 0.0 {
            return None;
        }
        let short_avg = self
            .history
            .iter()
            .rev()
            .take(self.short_window)
            .sum::<f64>()
            / self.short_window as f64;
        Some(short_avg / baseline_avg)
    }
}

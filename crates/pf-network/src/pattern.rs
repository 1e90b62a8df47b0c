//! Time patterns: sequences of multipliers applied to demands, pump
//! settings, reservoir heads, and source strengths.

/// How a pattern's factors are laid out in time.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// Factors repeat on a fixed interval, with an optional start offset.
    Fixed {
        /// time of day the pattern starts at (sec)
        start_time: i64,
    },
    /// Factors change at listed times; the last factor holds forever.
    Variable {
        /// change times (sec), same length as the factor list
        times: Vec<i64>,
    },
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub kind: PatternKind,
    pub factors: Vec<f64>,
    /// repeat interval for fixed patterns (sec)
    pub interval: i64,
    current_index: usize,
}

impl Pattern {
    pub fn fixed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PatternKind::Fixed { start_time: 0 },
            factors: Vec::new(),
            interval: 0,
            current_index: 0,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PatternKind::Variable { times: Vec::new() },
            factors: Vec::new(),
            interval: 0,
            current_index: 0,
        }
    }

    /// Prepare the pattern for a simulation run.
    pub fn init(&mut self, default_interval: i64, start_offset: i64) {
        match &mut self.kind {
            PatternKind::Fixed { start_time } => {
                *start_time = start_offset;
                if self.interval == 0 {
                    self.interval = default_interval;
                }
                if self.factors.is_empty() {
                    self.factors.push(1.0);
                }
                self.current_index = if self.interval > 0 {
                    ((start_offset / self.interval) as usize) % self.factors.len()
                } else {
                    0
                };
            }
            PatternKind::Variable { times } => {
                if self.factors.is_empty() {
                    self.factors.push(1.0);
                    times.push(0);
                }
                self.current_index = 0;
            }
        }
    }

    /// The multiplier in effect right now.
    pub fn current_factor(&self) -> f64 {
        if self.factors.is_empty() {
            return 1.0;
        }
        self.factors[self.current_index]
    }

    /// Time (sec) of the next factor change after simulation time `t`.
    pub fn next_time(&self, t: i64) -> i64 {
        match &self.kind {
            PatternKind::Fixed { start_time } => {
                let periods = (start_time + t) / self.interval;
                (periods + 1) * self.interval
            }
            PatternKind::Variable { times } => {
                if self.current_index == times.len() - 1 {
                    i64::MAX
                } else {
                    times[self.current_index + 1]
                }
            }
        }
    }

    /// Move the pattern to the period containing simulation time `t`.
    pub fn advance(&mut self, t: i64) {
        match &self.kind {
            PatternKind::Fixed { start_time } => {
                let periods = (start_time + t) / self.interval;
                self.current_index = (periods as usize) % self.factors.len();
            }
            PatternKind::Variable { times } => {
                for i in (self.current_index + 1)..times.len() {
                    if t < times[i] {
                        self.current_index = i - 1;
                        return;
                    }
                }
                self.current_index = times.len() - 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day_pattern() -> Pattern {
        let mut p = Pattern::fixed("daily");
        p.factors = vec![0.5, 1.0, 1.5, 1.0];
        p.init(3600, 0);
        p
    }

    #[test]
    fn fixed_pattern_steps_through_factors() {
        let mut p = day_pattern();
        assert_eq!(p.current_factor(), 0.5);
        p.advance(3600);
        assert_eq!(p.current_factor(), 1.0);
        p.advance(2 * 3600);
        assert_eq!(p.current_factor(), 1.5);
    }

    #[test]
    fn fixed_pattern_start_offset_shifts_index() {
        let mut p = Pattern::fixed("daily");
        p.factors = vec![0.5, 1.0, 1.5, 1.0];
        p.init(3600, 7200);
        assert_eq!(p.current_factor(), 1.5);
    }

    #[test]
    fn next_time_lands_on_interval_boundaries() {
        let p = day_pattern();
        assert_eq!(p.next_time(0), 3600);
        assert_eq!(p.next_time(3599), 3600);
        assert_eq!(p.next_time(3600), 7200);
    }

    #[test]
    fn variable_pattern_holds_last_factor() {
        let mut p = Pattern::variable("surge");
        p.factors = vec![1.0, 2.0];
        if let PatternKind::Variable { times } = &mut p.kind {
            *times = vec![0, 600];
        }
        p.init(0, 0);
        assert_eq!(p.next_time(0), 600);
        p.advance(700);
        assert_eq!(p.current_factor(), 2.0);
        assert_eq!(p.next_time(700), i64::MAX);
        p.advance(1_000_000);
        assert_eq!(p.current_factor(), 2.0);
    }

    proptest! {
        // a fixed pattern of N intervals repeats with period N*interval
        #[test]
        fn fixed_pattern_wraps_around(t in 0_i64..500_000) {
            let mut a = day_pattern();
            let mut b = day_pattern();
            let period = a.interval * a.factors.len() as i64;
            a.advance(t);
            b.advance(t + period);
            prop_assert_eq!(a.current_factor(), b.current_factor());
        }
    }
}

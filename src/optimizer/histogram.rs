use crate::execution::predicate::Op;

/// A fixed-width histogram over one integer column, used to estimate the
/// fraction of rows a predicate keeps. Space and update time are constant
/// in the number of values added.
///
/// Arithmetic runs in i64 because a histogram may span the whole i32
/// domain (see [`StringHistogram`]).
pub struct IntHistogram {
    buckets: Vec<u64>,
    min: i64,
    max: i64,
    width: i64,
    ntups: u64,
}

impl IntHistogram {
    /// `min..=max` is the range of values the histogram will ever be fed;
    /// out-of-range values are dropped on the floor.
    pub fn new(n_buckets: usize, min: i32, max: i32) -> Self {
        assert!(n_buckets > 0, "a histogram needs at least one bucket");
        assert!(min <= max, "empty histogram domain");
        let (min, max) = (min as i64, max as i64);
        let width = ((max - min + 1) / n_buckets as i64).max(1);
        Self {
            buckets: vec![0; n_buckets],
            min,
            max,
            width,
            ntups: 0,
        }
    }

    fn index_of(&self, value: i64) -> usize {
        (((value - self.min) / self.width) as usize).min(self.buckets.len() - 1)
    }

    pub fn add_value(&mut self, value: i32) {
        let value = value as i64;
        if value < self.min || value > self.max {
            return;
        }
        let idx = self.index_of(value);
        self.buckets[idx] += 1;
        self.ntups += 1;
    }

    pub fn total(&self) -> u64 {
        self.ntups
    }

    /// Estimated fraction of rows satisfying `column op value`, in
    /// [0, 1].
    pub fn estimate_selectivity(&self, op: Op, value: i32) -> f64 {
        let value = value as i64;
        match op {
            Op::Equals | Op::Like => self.equals_selectivity(value),
            Op::NotEquals => 1.0 - self.equals_selectivity(value),
            Op::GreaterThan => self.greater_selectivity(value),
            Op::GreaterThanOrEq => {
                (self.equals_selectivity(value) + self.greater_selectivity(value))
                    .clamp(0.0, 1.0)
            }
            Op::LessThan => {
                1.0 - (self.equals_selectivity(value) + self.greater_selectivity(value))
                    .clamp(0.0, 1.0)
            }
            Op::LessThanOrEq => 1.0 - self.greater_selectivity(value),
        }
    }

    fn equals_selectivity(&self, value: i64) -> f64 {
        if value < self.min || value > self.max || self.ntups == 0 {
            return 0.0;
        }
        let height = self.buckets[self.index_of(value)] as f64;
        (height / self.width as f64) / self.ntups as f64
    }

    fn greater_selectivity(&self, value: i64) -> f64 {
        if value <= self.min {
            return 1.0;
        }
        if value >= self.max {
            return 0.0;
        }
        if self.ntups == 0 {
            return 0.0;
        }

        let index = self.index_of(value);
        let bucket_fraction = self.buckets[index] as f64 / self.ntups as f64;
        // fraction of the value's own bucket strictly to the right of it;
        // values clamped into the last bucket can push this below zero
        let part_right = (((index as i64 + 1) * self.width + self.min - value - 1) as f64
            / self.width as f64)
            .clamp(0.0, 1.0);
        let right_of_bucket: u64 = self.buckets[index + 1..].iter().sum();

        bucket_fraction * part_right + right_of_bucket as f64 / self.ntups as f64
    }

    /// Mean EQUALS selectivity over the midpoints of populated buckets;
    /// with nothing observed, assume uniformity.
    pub fn avg_selectivity(&self) -> f64 {
        if self.ntups == 0 {
            return 1.0 / self.buckets.len() as f64;
        }
        let mut total = 0.0;
        let mut populated = 0usize;
        for (i, count) in self.buckets.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let midpoint = (self.min + i as i64 * self.width + self.width / 2).min(self.max);
            total += self.equals_selectivity(midpoint);
            populated += 1;
        }
        if populated == 0 {
            1.0 / self.buckets.len() as f64
        } else {
            total / populated as f64
        }
    }

    #[cfg(test)]
    fn bucket_sum(&self) -> u64 {
        self.buckets.iter().sum()
    }
}

/// Selectivity estimates over a string column. Strings are reduced to the
/// big-endian integer value of their first four bytes (NUL-padded,
/// truncated) and handed to an [`IntHistogram`] over the full i32 domain.
pub struct StringHistogram {
    hist: IntHistogram,
}

impl StringHistogram {
    pub fn new(n_buckets: usize) -> Self {
        Self {
            hist: IntHistogram::new(n_buckets, i32::MIN, i32::MAX),
        }
    }

    fn encode(value: &str) -> i32 {
        let mut bytes = [0u8; 4];
        for (i, byte) in value.as_bytes().iter().take(4).enumerate() {
            bytes[i] = *byte;
        }
        i32::from_be_bytes(bytes)
    }

    pub fn add_value(&mut self, value: &str) {
        self.hist.add_value(Self::encode(value));
    }

    pub fn total(&self) -> u64 {
        self.hist.total()
    }

    pub fn estimate_selectivity(&self, op: Op, value: &str) -> f64 {
        self.hist.estimate_selectivity(op, Self::encode(value))
    }

    pub fn avg_selectivity(&self) -> f64 {
        self.hist.avg_selectivity()
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::{IntHistogram, StringHistogram};
    use crate::execution::predicate::Op;

    fn uniform_1_to_100() -> IntHistogram {
        let mut hist = IntHistogram::new(10, 1, 100);
        for v in 1..=100 {
            hist.add_value(v);
        }
        hist
    }

    #[test]
    fn bucket_counts_sum_to_the_number_of_values() {
        let hist = uniform_1_to_100();
        assert_eq!(hist.bucket_sum(), hist.total());
        assert_eq!(hist.total(), 100);
    }

    #[test]
    fn out_of_range_values_are_ignored() {
        let mut hist = IntHistogram::new(4, 0, 10);
        hist.add_value(-1);
        hist.add_value(11);
        hist.add_value(5);
        assert_eq!(hist.total(), 1);
    }

    #[test]
    fn uniform_selectivities_match_the_distribution() {
        let hist = uniform_1_to_100();

        let eq = hist.estimate_selectivity(Op::Equals, 50);
        assert!((eq - 0.01).abs() < 1e-9, "EQUALS 50 was {}", eq);

        let lt = hist.estimate_selectivity(Op::LessThan, 50);
        assert!((lt - 0.49).abs() < 0.02, "LESS_THAN 50 was {}", lt);

        let gt = hist.estimate_selectivity(Op::GreaterThan, 50);
        assert!((gt - 0.50).abs() < 0.02, "GREATER_THAN 50 was {}", gt);
    }

    #[test]
    fn equals_and_not_equals_are_complementary() {
        let hist = uniform_1_to_100();
        for v in [-10, 1, 37, 50, 99, 100, 200] {
            let eq = hist.estimate_selectivity(Op::Equals, v);
            let ne = hist.estimate_selectivity(Op::NotEquals, v);
            assert!((eq + ne - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn range_extremes() {
        let hist = uniform_1_to_100();
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, 0), 1.0);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, 1), 1.0);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, 100), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::Equals, 0), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::Equals, 101), 0.0);
    }

    #[test]
    fn every_estimate_stays_within_bounds() {
        let mut rng = rand::thread_rng();
        let mut hist = IntHistogram::new(17, -500, 500);
        for _ in 0..1000 {
            hist.add_value(rng.gen_range(-600..600));
        }

        let ops = [
            Op::Equals,
            Op::NotEquals,
            Op::GreaterThan,
            Op::GreaterThanOrEq,
            Op::LessThan,
            Op::LessThanOrEq,
        ];
        for _ in 0..1000 {
            let v = rng.gen_range(-700..700);
            for op in ops {
                let sel = hist.estimate_selectivity(op, v);
                assert!((0.0..=1.0).contains(&sel), "{} {} gave {}", op, v, sel);
            }
        }
        let avg = hist.avg_selectivity();
        assert!((0.0..=1.0).contains(&avg));
    }

    #[test]
    fn narrow_domains_get_unit_width() {
        let mut hist = IntHistogram::new(100, 5, 7);
        for v in [5, 6, 7, 6] {
            hist.add_value(v);
        }
        assert_eq!(hist.total(), 4);
        let eq = hist.estimate_selectivity(Op::Equals, 6);
        assert!((eq - 0.5).abs() < 1e-9);
    }

    #[test]
    fn string_histogram_orders_by_prefix() {
        let mut hist = StringHistogram::new(100);
        for word in ["apple", "banana", "cherry", "damson", "elder"] {
            hist.add_value(word);
        }
        assert_eq!(hist.total(), 5);

        let before_all = hist.estimate_selectivity(Op::GreaterThan, "aaaa");
        let after_all = hist.estimate_selectivity(Op::LessThan, "zzzz");
        assert!(before_all > 0.9);
        assert!(after_all > 0.9);

        let eq = hist.estimate_selectivity(Op::Equals, "banana");
        assert!((0.0..=1.0).contains(&eq));
    }
}

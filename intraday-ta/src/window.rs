use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity circular window maintaining a compensated (Neumaier) running sum.
///
/// The compensation term keeps the incremental sum within a few ulps of a fresh summation of
/// the window contents, no matter how many values have been pushed and evicted. A count of
/// non-zero values lets an all-zero window report an exact `0.0`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RollingSum {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
    compensation: f64,
    non_zero: usize,
}

impl RollingSum {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: 0.0,
            compensation: 0.0,
            non_zero: 0,
        }
    }

    /// Push the next value, returning the evicted value once the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.add(value);
        if value != 0.0 {
            self.non_zero += 1;
        }

        if self.values.len() <= self.capacity {
            return None;
        }

        let evicted = self.values.pop_front()?;
        self.add(-evicted);
        if evicted != 0.0 {
            self.non_zero -= 1;
        }
        if self.non_zero == 0 {
            self.sum = 0.0;
            self.compensation = 0.0;
        }
        Some(evicted)
    }

    fn add(&mut self, value: f64) {
        let total = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - total) + value;
        } else {
            self.compensation += (value - total) + self.sum;
        }
        self.sum = total;
    }

    pub fn sum(&self) -> f64 {
        if self.non_zero == 0 {
            0.0
        } else {
            self.sum + self.compensation
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Number of non-zero values currently inside the window.
    pub fn non_zero(&self) -> usize {
        self.non_zero
    }
}

/// Fixed-capacity window tracking mean and the Welford recurrence relation M (sum of squared
/// deviations).
///
/// Uses the sliding-window form of Welford's online algorithm: once full, replacing `old` by
/// `new` updates `M += (new - old) * (new - mean_new + old - mean_old)`, which avoids the
/// catastrophic cancellation of the naive `Σx² - n·mean²` approach.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RollingMoments {
    capacity: usize,
    values: VecDeque<f64>,
    mean: f64,
    recurrence_relation_m: f64,
}

impl RollingMoments {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            mean: 0.0,
            recurrence_relation_m: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() < self.capacity {
            self.values.push_back(value);
            let count = self.values.len() as f64;
            let prev_mean = self.mean;
            self.mean = welford::calculate_mean(prev_mean, value, count);
            self.recurrence_relation_m = welford::calculate_recurrence_relation_m(
                self.recurrence_relation_m,
                prev_mean,
                value,
                self.mean,
            );
        } else if let Some(evicted) = self.values.pop_front() {
            self.values.push_back(value);
            let count = self.values.len() as f64;
            let prev_mean = self.mean;
            self.mean = prev_mean + (value - evicted) / count;
            self.recurrence_relation_m +=
                (value - evicted) * (value - self.mean + evicted - prev_mean);
        }

        // Rounding can push an all-equal window marginally below zero
        if self.recurrence_relation_m < 0.0 {
            self.recurrence_relation_m = 0.0;
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance using Bessel's correction (count - 1).
    pub fn sample_variance(&self) -> f64 {
        welford::calculate_sample_variance(self.recurrence_relation_m, self.values.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }
}

/// [Welford Online](https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm)
/// recurrences over `f64`.
pub mod welford {
    /// Calculates the next mean.
    pub fn calculate_mean(prev_mean: f64, next_value: f64, count: f64) -> f64 {
        prev_mean + (next_value - prev_mean) / count
    }

    /// Calculates the next Welford Online recurrence relation M.
    pub fn calculate_recurrence_relation_m(
        prev_m: f64,
        prev_mean: f64,
        new_value: f64,
        new_mean: f64,
    ) -> f64 {
        prev_m + ((new_value - prev_mean) * (new_value - new_mean))
    }

    /// Calculates the unbiased 'Sample' Variance, zero for fewer than two values.
    pub fn calculate_sample_variance(recurrence_relation_m: f64, count: f64) -> f64 {
        match count < 2.0 {
            true => 0.0,
            false => recurrence_relation_m / (count - 1.0),
        }
    }
}

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Population standard deviation.
    pub fn std_dev(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(samples);
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        var.sqrt()
    }

    pub fn median(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Discrete gradient: central differences inside, one-sided at both ends.
    pub fn gradient(samples: &[f64]) -> Vec<f64> {
        let n = samples.len();
        match n {
            0 => Vec::new(),
            1 => vec![0.0],
            _ => (0..n)
                .map(|i| {
                    if i == 0 {
                        samples[1] - samples[0]
                    } else if i == n - 1 {
                        samples[n - 1] - samples[n - 2]
                    } else {
                        (samples[i + 1] - samples[i - 1]) / 2.0
                    }
                })
                .collect(),
        }
    }

    /// Index of the largest value; the first one wins on ties.
    pub fn argmax(samples: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &value) in samples.iter().enumerate() {
            match best {
                Some((_, current)) if value <= current => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_is_population_deviation() {
        let std = StatsHelper::std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(StatsHelper::median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(StatsHelper::median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn gradient_matches_central_differences() {
        let grad = StatsHelper::gradient(&[1.0, 2.0, 4.0, 7.0]);
        assert_eq!(grad, vec![1.0, 1.5, 2.5, 3.0]);
        assert_eq!(StatsHelper::gradient(&[5.0]), vec![0.0]);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(StatsHelper::argmax(&[0.2, 0.5, 0.5]), Some(1));
        assert_eq!(StatsHelper::argmax(&[]), None);
    }
}

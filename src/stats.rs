use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl Stats {
    pub fn compute(data: &[f64]) -> Option<Stats> {
        if data.is_empty() {
            return None;
        }
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = data.iter().sum();
        let mean = sum / data.len() as f64;

        let variance = data
            .iter()
            .map(|value| (mean - value).powf(2.))
            .sum::<f64>()
            / (data.len() as f64);

        Some(Stats {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

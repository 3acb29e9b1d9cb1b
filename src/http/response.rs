use std::collections::BTreeMap;

use super::metric::Metric;

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub metrics: BTreeMap<Metric, f64>,
}

impl HttpResponse {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }
}

//! Metric descriptors and samples produced during a scrape cycle.

/// Static description of one gauge family.
///
/// Collectors declare descriptors as `static` items. For SQL-backed
/// collectors the label names double as the result column names.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    /// Fully-qualified metric name.
    pub name: &'static str,
    /// Help text shown in the exposition.
    pub help: &'static str,
    /// Variable label names, in order.
    pub labels: &'static [&'static str],
}

impl MetricDesc {
    /// Describe a gauge family.
    pub const fn gauge(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }
}

/// One observed value, valid for a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    desc: &'static MetricDesc,
    value: f64,
    label_values: Vec<String>,
}

impl MetricSample {
    /// Create a sample; `label_values` must line up with `desc.labels`.
    pub fn new(desc: &'static MetricDesc, value: f64, label_values: Vec<String>) -> Self {
        debug_assert_eq!(
            desc.labels.len(),
            label_values.len(),
            "label count mismatch for {}",
            desc.name
        );
        Self {
            desc,
            value,
            label_values,
        }
    }

    /// Descriptor this sample belongs to.
    pub fn desc(&self) -> &'static MetricDesc {
        self.desc
    }

    /// Observed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values, aligned with `desc().labels`.
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Iterate `(label name, label value)` pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.desc
            .labels
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }
}

/// Destination for samples emitted by collectors.
///
/// Whatever a collector pushed before failing stays pushed.
pub trait SampleSink: Send {
    /// Accept one sample.
    fn push(&mut self, sample: MetricSample);
}

impl SampleSink for Vec<MetricSample> {
    fn push(&mut self, sample: MetricSample) {
        Vec::push(self, sample);
    }
}

use crate::MetricKey;

/// Label-indexed gauge store the engine publishes into.
///
/// Both methods take `&self` and are called concurrently from every worker of
/// a cycle; implementations provide their own interior synchronisation.
pub trait MetricSink: Send + Sync {
    /// Create or overwrite the value of `key` (last write wins).
    fn set(&self, key: &MetricKey, value: f64);

    /// Remove the series for `key`. Returns `false` when it was not present.
    fn delete(&self, key: &MetricKey) -> bool;
}

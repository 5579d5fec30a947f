use crate::linear::LinearModel;

/// Two-layer Recursive Model Index over a sorted key array.
///
/// Layer 1 is a closed-form range partition: a key falls into bucket
/// `⌊(key − min) / (max − min) · fanout⌋`, clamped to `[0, fanout)`. Layer 2
/// is one [`LinearModel`] per bucket, trained on `key -> global position`.
///
/// The RMI itself has no error bound; [`crate::LearnedIndex`] wraps it with
/// the observed min/max prediction error to make lookups exact.
#[derive(Debug, Clone, PartialEq)]
pub struct RmiModel {
    pub(crate) global_min: i64,
    pub(crate) global_max: i64,
    pub(crate) buckets: Vec<LinearModel>,
}

impl RmiModel {
    /// Creates an untrained model with `fanout` second-layer buckets.
    pub fn new(fanout: usize) -> Self {
        assert!(fanout > 0, "fanout must be > 0");
        Self {
            global_min: 0,
            global_max: 0,
            buckets: vec![LinearModel::new(); fanout],
        }
    }

    #[must_use]
    pub fn fanout(&self) -> usize {
        self.buckets.len()
    }

    /// Trains the two layers over `keys`, which must be sorted ascending.
    ///
    /// Each bucket's linear model is fitted against the **global** indices
    /// of the keys routed to it, so a bucket prediction lands directly in
    /// the full array.
    pub fn train(&mut self, keys: &[i64]) {
        if keys.is_empty() {
            return;
        }

        self.global_min = keys[0];
        self.global_max = keys[keys.len() - 1];

        let fanout = self.buckets.len();
        let mut bucket_keys: Vec<Vec<i64>> = vec![Vec::new(); fanout];
        let mut bucket_positions: Vec<Vec<usize>> = vec![Vec::new(); fanout];

        for (i, &key) in keys.iter().enumerate() {
            let b = self.bucket_for(key);
            bucket_keys[b].push(key);
            bucket_positions[b].push(i);
        }

        for (b, model) in self.buckets.iter_mut().enumerate() {
            *model = LinearModel::new();
            model.train_with_positions(&bucket_keys[b], &bucket_positions[b]);
        }
    }

    /// Predicted global position for `key`.
    #[must_use]
    pub fn predict(&self, key: i64) -> i64 {
        self.buckets[self.bucket_for(key)].predict(key)
    }

    /// Extends the bucket covering `key` with one `(key, position)` sample.
    /// Routing uses the current `(min, max)`; the partition is not re-keyed.
    pub fn update(&mut self, key: i64, pos: usize) {
        let b = self.bucket_for(key);
        self.buckets[b].update(key, pos);
    }

    /// Layer-1 bucket assignment. A collapsed key range (max == min) is
    /// treated as width 1 so the division stays defined.
    fn bucket_for(&self, key: i64) -> usize {
        let mut range = self.global_max as f64 - self.global_min as f64;
        if range == 0.0 {
            range = 1.0;
        }
        let fanout = self.buckets.len();
        let raw = (key as f64 - self.global_min as f64) / range * fanout as f64;
        (raw as i64).clamp(0, fanout as i64 - 1) as usize
    }
}

//! Training data.
//!
//! A [`Sample`] is one feature vector plus its target values. A [`Batch`]
//! packs samples as columns: `inputs` is `features × n` and `targets` is
//! `outputs × n`, which is the layout [`Layer::forward`](super::Layer::forward)
//! expects. A [`Dataset`] owns samples and produces batches.

use std::io::BufRead;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{data, Result};
use crate::matrix::Matrix;

/// One training example.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f64>,
    pub targets: Vec<f64>,
}

impl Sample {
    /// A sample with a single target value.
    #[must_use]
    pub fn new(features: Vec<f64>, label: f64) -> Self {
        Self {
            features,
            targets: vec![label],
        }
    }

    #[must_use]
    pub const fn with_targets(features: Vec<f64>, targets: Vec<f64>) -> Self {
        Self { features, targets }
    }
}

/// Samples packed column-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Matrix,
    pub targets: Matrix,
}

impl Batch {
    /// Packs `samples` so that column `i` holds sample `i`.
    ///
    /// # Errors
    ///
    /// [`Error::Data`](crate::Error::Data) if `samples` is empty or the
    /// samples disagree on feature or target count.
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let (features, outputs) = check_samples(samples)?;
        let n = samples.len();

        let mut inputs = vec![0.0; features * n];
        let mut targets = vec![0.0; outputs * n];
        for (col, sample) in samples.iter().enumerate() {
            for (row, &x) in sample.features.iter().enumerate() {
                inputs[row * n + col] = x;
            }
            for (row, &y) in sample.targets.iter().enumerate() {
                targets[row * n + col] = y;
            }
        }

        Ok(Self {
            inputs: Matrix::from_vec(features, n, inputs)?,
            targets: Matrix::from_vec(outputs, n, targets)?,
        })
    }

    /// Number of samples (columns).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inputs.cols()
    }

    /// Always `false`; batches hold at least one sample.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_samples(samples: &[Sample]) -> Result<(usize, usize)> {
    let first = samples
        .first()
        .ok_or_else(|| data("a batch needs at least one sample"))?;
    let (features, outputs) = (first.features.len(), first.targets.len());
    if features == 0 || outputs == 0 {
        return Err(data("samples need at least one feature and one target"));
    }

    for (i, sample) in samples.iter().enumerate() {
        if sample.features.len() != features || sample.targets.len() != outputs {
            return Err(data(format!(
                "sample {i} has {} features and {} targets, expected {features} and {outputs}",
                sample.features.len(),
                sample.targets.len()
            )));
        }
    }
    Ok((features, outputs))
}

/// A non-empty collection of equally sized samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// # Errors
    ///
    /// [`Error::Data`](crate::Error::Data) if `samples` is empty or ragged.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        check_samples(&samples)?;
        Ok(Self { samples })
    }

    /// Reads one sample per line, `label<d>feature<d>feature...`.
    ///
    /// Blank lines are skipped and fields are trimmed.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`](crate::Error::Io) if reading fails.
    /// - [`Error::Data`](crate::Error::Data) for unparsable fields, lines
    ///   without features, or inconsistent feature counts.
    pub fn from_delimited<R: BufRead>(reader: R, delimiter: char) -> Result<Self> {
        let mut samples = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut values = Vec::new();
            for field in line.split(delimiter) {
                let value = field.trim().parse::<f64>().map_err(|e| {
                    data(format!("line {}: {:?} is not a number: {e}", lineno + 1, field.trim()))
                })?;
                values.push(value);
            }
            if values.len() < 2 {
                return Err(data(format!("line {}: expected a label and features", lineno + 1)));
            }

            let label = values.remove(0);
            samples.push(Sample::new(values, label));
        }
        Self::new(samples)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; datasets hold at least one sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Features per sample.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.samples[0].features.len()
    }

    /// Targets per sample.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.samples[0].targets.len()
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }

    /// Splits the samples, in order, into batches of `batch_size`. The last
    /// batch holds the remainder. A size of `0` yields one batch.
    ///
    /// # Errors
    ///
    /// Never fails for a valid dataset; the `Result` comes from
    /// [`Batch::from_samples`].
    pub fn batches(&self, batch_size: usize) -> Result<Vec<Batch>> {
        let size = if batch_size == 0 {
            self.samples.len()
        } else {
            batch_size
        };
        self.samples.chunks(size).map(Batch::from_samples).collect()
    }

    /// The whole dataset as one batch.
    ///
    /// # Errors
    ///
    /// See [`Dataset::batches`].
    pub fn to_batch(&self) -> Result<Batch> {
        Batch::from_samples(&self.samples)
    }

    /// Splits off the first `ceil(len * train_ratio)` samples for training.
    /// The remainder, if any, is returned as a second dataset.
    ///
    /// # Errors
    ///
    /// [`Error::Data`](crate::Error::Data) unless `0 < train_ratio <= 1`.
    pub fn partition(mut self, train_ratio: f64) -> Result<(Self, Option<Self>)> {
        if !(train_ratio > 0.0 && train_ratio <= 1.0) {
            return Err(data(format!("train ratio {train_ratio} is outside (0, 1]")));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let split = ((self.samples.len() as f64 * train_ratio).ceil() as usize)
            .clamp(1, self.samples.len());
        let rest = self.samples.split_off(split);

        let test = if rest.is_empty() {
            None
        } else {
            Some(Self { samples: rest })
        };
        Ok((self, test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset(n: usize) -> Dataset {
        let samples = (0..n)
            .map(|i| Sample::new(vec![i as f64, -(i as f64)], (i % 2) as f64))
            .collect();
        Dataset::new(samples).unwrap()
    }

    #[test]
    fn samples_become_columns() {
        let batch = Batch::from_samples(&[
            Sample::new(vec![1.0, 2.0], 0.0),
            Sample::new(vec![3.0, 4.0], 1.0),
        ])
        .unwrap();
        assert_eq!(batch.inputs, crate::matrix![[1, 3], [2, 4]]);
        assert_eq!(batch.targets, crate::matrix![[0, 1]]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn ragged_samples_are_rejected() {
        let samples = vec![Sample::new(vec![1.0], 0.0), Sample::new(vec![1.0, 2.0], 0.0)];
        assert!(matches!(Dataset::new(samples), Err(Error::Data(_))));
        assert!(matches!(Dataset::new(Vec::new()), Err(Error::Data(_))));
    }

    #[test]
    fn batches_keep_the_remainder() {
        let sizes: Vec<usize> = dataset(10).batches(4).unwrap().iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(dataset(10).batches(0).unwrap().len(), 1);
    }

    #[test]
    fn partition_splits_in_order() {
        let (train, test) = dataset(10).partition(0.75).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.as_ref().map(Dataset::len), Some(2));
        assert_eq!(train.samples()[0].features, vec![0.0, -0.0]);

        let (all, none) = dataset(3).partition(1.0).unwrap();
        assert_eq!(all.len(), 3);
        assert!(none.is_none());
        assert!(dataset(3).partition(0.0).is_err());
    }

    #[test]
    fn shuffle_keeps_samples() {
        let mut d = dataset(20);
        d.shuffle(&mut StdRng::seed_from_u64(1));
        let mut seen: Vec<f64> = d.samples().iter().map(|s| s.features[0]).collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, (0..20).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn reads_label_first_lines() {
        let text = "1, 0.5, 2\n\n0,1.5,-3\n";
        let d = Dataset::from_delimited(text.as_bytes(), ',').unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.feature_count(), 2);
        assert_eq!(d.samples()[1], Sample::new(vec![1.5, -3.0], 0.0));

        assert!(matches!(
            Dataset::from_delimited("1,x\n".as_bytes(), ','),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            Dataset::from_delimited("1\n".as_bytes(), ','),
            Err(Error::Data(_))
        ));
    }
}

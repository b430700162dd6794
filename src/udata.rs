//! `UData`: a variable-representation container for an uncertain scalar,
//! as a tagged variant over a flat `Vec<f64>` buffer whose length is
//! dictated by `(kind, npoints)`, rather than as a polymorphic base class:
//! six kinds, six size functions, one storage representation.

use crate::error::{PrognosticsError, Result};

/// The distribution shape a `UData` instance is advisory-tagged with. Not
/// enforced by any accessor; purely informational for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Gaussian,
    Uniform,
}

/// The uncertainty representation a `UData` currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyKind {
    /// A single deterministic value. Size 1.
    Point,
    /// Mean and standard deviation. Size 2.
    MeanSD,
    /// A mean and an `npoints`-long covariance row. Size `1 + npoints`.
    MeanCovar,
    /// `npoints` (percentile, value) pairs. Size `2 * npoints`.
    Percentiles,
    /// `npoints` raw samples. Size `npoints`.
    Samples,
    /// `npoints` (sample, weight) pairs. Size `2 * npoints`.
    WSamples,
}

impl UncertaintyKind {
    fn size_of(self, npoints: usize) -> usize {
        match self {
            UncertaintyKind::Point => 1,
            UncertaintyKind::MeanSD => 2,
            UncertaintyKind::MeanCovar => 1 + npoints,
            UncertaintyKind::Percentiles => 2 * npoints,
            UncertaintyKind::Samples => npoints,
            UncertaintyKind::WSamples => 2 * npoints,
        }
    }
}

/// Symbolic index into a `UData`'s flat storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UIndex {
    Mean,
    Sd,
    Covar(usize),
    PValue(usize),
    Sample(usize),
    Weight(usize),
}

impl UIndex {
    /// Resolves to a flat offset for the given kind, or `None` if the index
    /// has no meaning for that kind (callers should treat `None` as
    /// `InvalidKind`).
    fn offset(self, kind: UncertaintyKind) -> Option<usize> {
        use UncertaintyKind::*;
        match (self, kind) {
            (UIndex::Mean, Point) => Some(0),
            (UIndex::Mean, MeanSD) | (UIndex::Mean, MeanCovar) => Some(0),
            (UIndex::Sd, MeanSD) => Some(1),
            (UIndex::Covar(i), MeanCovar) => Some(1 + i),
            (UIndex::PValue(i), Percentiles) => Some(2 * i),
            // The value half of a percentile pair sits immediately after the percentile.
            (UIndex::Sample(i), Samples) => Some(i),
            (UIndex::Sample(i), WSamples) => Some(2 * i),
            (UIndex::Weight(i), WSamples) => Some(2 * i + 1),
            _ => None,
        }
    }
}

/// A variable-representation uncertain scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct UData {
    kind: UncertaintyKind,
    npoints: usize,
    data: Vec<f64>,
    distribution: Distribution,
    valid: bool,
    updated: u64,
    clock: u64,
}

impl UData {
    /// Builds an invalid, unset `Point` instance.
    pub fn new() -> Self {
        UData {
            kind: UncertaintyKind::Point,
            npoints: 1,
            data: vec![f64::NAN; 1],
            distribution: Distribution::Gaussian,
            valid: false,
            updated: 0,
            clock: 0,
        }
    }

    pub fn kind(&self) -> UncertaintyKind {
        self.kind
    }

    pub fn npoints(&self) -> usize {
        self.npoints
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn updated_at(&self) -> u64 {
        self.updated
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn set_distribution(&mut self, d: Distribution) {
        self.distribution = d;
    }

    fn touch(&mut self) {
        self.clock += 1;
        self.updated = self.clock;
        self.valid = true;
    }

    /// Sets the uncertainty kind, reshaping storage for the current
    /// `npoints`. Newly exposed cells are NaN; the operation is idempotent
    /// if the kind is unchanged.
    pub fn set_uncertainty(&mut self, kind: UncertaintyKind) {
        if kind == self.kind {
            return;
        }
        self.kind = kind;
        self.resize_storage();
    }

    /// Resizes the underlying storage for the current kind's size function,
    /// preserving existing values in overlapping cells.
    pub fn set_npoints(&mut self, npoints: usize) {
        self.npoints = npoints;
        self.resize_storage();
    }

    fn resize_storage(&mut self) {
        let new_size = self.kind.size_of(self.npoints);
        let mut out = vec![f64::NAN; new_size];
        let common = self.data.len().min(new_size);
        out[..common].copy_from_slice(&self.data[..common]);
        self.data = out;
    }

    fn index(&self, idx: UIndex) -> Result<usize> {
        let offset = idx.offset(self.kind).ok_or(PrognosticsError::InvalidKind)?;
        if offset >= self.data.len() {
            return Err(PrognosticsError::OutOfRange);
        }
        Ok(offset)
    }

    /// Reads the value at a symbolic index. Reading before the first write
    /// (i.e. `!is_valid()`) yields `NaN`, same as reading any never-written
    /// cell.
    pub fn get(&self, idx: UIndex) -> Result<f64> {
        let offset = self.index(idx)?;
        Ok(self.data[offset])
    }

    /// Writes the value at a symbolic index, marking the instance valid and
    /// advancing its update timestamp.
    pub fn set(&mut self, idx: UIndex, value: f64) -> Result<()> {
        let offset = self.index(idx)?;
        self.data[offset] = value;
        self.touch();
        Ok(())
    }

    /// Reads a (value, paired-value) tuple at `PAIR(i)`: (percentile,
    /// value) for `Percentiles`, (sample, weight) for `WSamples`. Fails
    /// with `InvalidKind` for kinds without a pair representation (e.g.
    /// `Point`).
    pub fn get_pair(&self, i: usize) -> Result<(f64, f64)> {
        match self.kind {
            UncertaintyKind::Percentiles => {
                let p = self.get(UIndex::PValue(i))?;
                let v = self.data[self.index(UIndex::PValue(i))? + 1];
                Ok((p, v))
            }
            UncertaintyKind::WSamples => {
                let s = self.get(UIndex::Sample(i))?;
                let w = self.get(UIndex::Weight(i))?;
                Ok((s, w))
            }
            _ => Err(PrognosticsError::InvalidKind),
        }
    }

    /// Writes a (value, paired-value) tuple at `PAIR(i)`.
    pub fn set_pair(&mut self, i: usize, a: f64, b: f64) -> Result<()> {
        match self.kind {
            UncertaintyKind::Percentiles => {
                let off = self.index(UIndex::PValue(i))?;
                self.data[off] = a;
                self.data[off + 1] = b;
                self.touch();
                Ok(())
            }
            UncertaintyKind::WSamples => {
                let off_s = self.index(UIndex::Sample(i))?;
                let off_w = self.index(UIndex::Weight(i))?;
                self.data[off_s] = a;
                self.data[off_w] = b;
                self.touch();
                Ok(())
            }
            _ => Err(PrognosticsError::InvalidKind),
        }
    }

    /// Bulk-overwrites the full flat buffer. `values.len()` must equal
    /// `size()`.
    pub fn set_vec(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(PrognosticsError::DimensionMismatch(format!(
                "expected {} values, got {}",
                self.data.len(),
                values.len()
            )));
        }
        self.data.copy_from_slice(values);
        self.touch();
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Convenience constructor for a `Point` with the given value.
    pub fn point(value: f64) -> Self {
        let mut u = UData::new();
        u.set(UIndex::Mean, value).expect("point index valid");
        u
    }

    /// Convenience constructor for a `MeanSD`.
    pub fn mean_sd(mean: f64, sd: f64) -> Self {
        let mut u = UData::new();
        u.set_uncertainty(UncertaintyKind::MeanSD);
        u.set(UIndex::Mean, mean).expect("mean index valid");
        u.set(UIndex::Sd, sd).expect("sd index valid");
        u
    }

    /// Convenience constructor for a `MeanCovar` with a mean and a full
    /// covariance row.
    pub fn mean_covar(mean: f64, covar_row: &[f64]) -> Self {
        let mut u = UData::new();
        u.set_uncertainty(UncertaintyKind::MeanCovar);
        u.set_npoints(covar_row.len());
        u.set(UIndex::Mean, mean).expect("mean index valid");
        for (i, v) in covar_row.iter().enumerate() {
            u.set(UIndex::Covar(i), *v).expect("covar index valid");
        }
        u
    }

    /// Convenience constructor for `Samples`.
    pub fn samples(values: &[f64]) -> Self {
        let mut u = UData::new();
        u.set_uncertainty(UncertaintyKind::Samples);
        u.set_npoints(values.len());
        u.set_vec(values).expect("samples length matches");
        u
    }

    /// Convenience constructor for `WSamples`.
    pub fn weighted_samples(samples: &[f64], weights: &[f64]) -> Result<Self> {
        if samples.len() != weights.len() {
            return Err(PrognosticsError::DimensionMismatch(
                "samples and weights must have equal length".into(),
            ));
        }
        let mut u = UData::new();
        u.set_uncertainty(UncertaintyKind::WSamples);
        u.set_npoints(samples.len());
        for (i, (s, w)) in samples.iter().zip(weights.iter()).enumerate() {
            u.set_pair(i, *s, *w)?;
        }
        Ok(u)
    }

    /// Mean of the underlying distribution, where defined by the kind:
    /// `Point`/`MeanSD`/`MeanCovar` read `MEAN` directly; `Samples` and
    /// `WSamples` compute the (weighted) sample mean.
    pub fn mean(&self) -> Result<f64> {
        match self.kind {
            UncertaintyKind::Point | UncertaintyKind::MeanSD | UncertaintyKind::MeanCovar => {
                self.get(UIndex::Mean)
            }
            UncertaintyKind::Samples => {
                if self.npoints == 0 {
                    return Ok(f64::NAN);
                }
                Ok(self.data.iter().sum::<f64>() / self.npoints as f64)
            }
            UncertaintyKind::WSamples => {
                let mut wsum = 0.0;
                let mut acc = 0.0;
                for i in 0..self.npoints {
                    let (s, w) = self.get_pair(i)?;
                    acc += s * w;
                    wsum += w;
                }
                if wsum == 0.0 {
                    return Ok(f64::NAN);
                }
                Ok(acc / wsum)
            }
            UncertaintyKind::Percentiles => {
                // The 50th percentile (median) stands in for "the mean" when
                // only percentiles are available.
                for i in 0..self.npoints {
                    let (p, v) = self.get_pair(i)?;
                    if (p - 50.0).abs() < 1e-9 {
                        return Ok(v);
                    }
                }
                Ok(f64::NAN)
            }
        }
    }
}

impl Default for UData {
    fn default() -> Self {
        UData::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_kind_and_npoints() {
        let cases: &[(UncertaintyKind, usize, usize)] = &[
            (UncertaintyKind::Point, 1, 1),
            (UncertaintyKind::MeanSD, 1, 2),
            (UncertaintyKind::MeanCovar, 4, 5),
            (UncertaintyKind::Percentiles, 3, 6),
            (UncertaintyKind::Samples, 10, 10),
            (UncertaintyKind::WSamples, 7, 14),
        ];
        for (kind, n, expected) in cases {
            let mut u = UData::new();
            u.set_uncertainty(*kind);
            u.set_npoints(*n);
            assert_eq!(u.size(), *expected, "{:?} with n={}", kind, n);
        }
    }

    #[test]
    fn reading_before_first_write_is_nan() {
        let u = UData::new();
        assert!(u.get(UIndex::Mean).unwrap().is_nan());
        assert!(!u.is_valid());
    }

    #[test]
    fn writes_mark_valid_and_advance_timestamp() {
        let mut u = UData::new();
        u.set(UIndex::Mean, 1.0).unwrap();
        let t1 = u.updated_at();
        assert!(u.is_valid());
        u.set(UIndex::Mean, 2.0).unwrap();
        let t2 = u.updated_at();
        assert!(t2 > t1);
    }

    #[test]
    fn changing_kind_preserves_npoints_and_reshapes() {
        let mut u = UData::new();
        u.set_uncertainty(UncertaintyKind::Samples);
        u.set_npoints(4);
        u.set_vec(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        u.set_uncertainty(UncertaintyKind::WSamples);
        assert_eq!(u.npoints(), 4);
        assert_eq!(u.size(), 8);
    }

    #[test]
    fn get_pair_on_point_is_invalid_kind() {
        let u = UData::point(1.0);
        assert_eq!(u.get_pair(0).unwrap_err(), PrognosticsError::InvalidKind);
    }

    #[test]
    fn out_of_range_index_errors() {
        let u = UData::samples(&[1.0, 2.0]);
        assert_eq!(u.get(UIndex::Sample(5)).unwrap_err(), PrognosticsError::OutOfRange);
    }

    #[test]
    fn weighted_samples_mean_is_weight_normalized() {
        let u = UData::weighted_samples(&[1.0, 3.0], &[1.0, 3.0]).unwrap();
        // (1*1 + 3*3) / (1+3) = 10/4 = 2.5
        assert_eq!(u.mean().unwrap(), 2.5);
    }

    #[test]
    fn pair_setter_validates_length_against_size() {
        let mut u = UData::new();
        u.set_uncertainty(UncertaintyKind::Percentiles);
        u.set_npoints(2);
        assert!(u.set_vec(&[1.0, 2.0, 3.0]).is_err());
        assert!(u.set_vec(&[0.0, 0.0, 0.0, 0.0]).is_ok());
    }
}

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Flip mask has {mask_len} entries but the scheme has {scheme_len} directions")]
pub struct MaskLengthError {
    pub mask_len: usize,
    pub scheme_len: usize,
}

/// One boolean per direction of a scheme; `true` means the direction is negated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlipMask(Vec<bool>);

impl FlipMask {
    /// Creates a mask of the given length that flips nothing.
    pub fn identity(len: usize) -> Self {
        Self(vec![false; len])
    }

    /// Builds a mask from relaxed solver values, treating anything above 0.5 as a flip.
    pub fn from_values(values: &[f64]) -> Self {
        Self(values.iter().map(|&v| v > 0.5).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_flipped(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn flipped_count(&self) -> usize {
        self.0.iter().filter(|&&f| f).count()
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().all(|&f| !f)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<bool>> for FlipMask {
    fn from(flags: Vec<bool>) -> Self {
        Self(flags)
    }
}

impl FromIterator<bool> for FlipMask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

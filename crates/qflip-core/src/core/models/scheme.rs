use super::mask::{FlipMask, MaskLengthError};
use nalgebra::Vector3;
use std::ops::Range;

/// A gradient direction. Callers are trusted to supply unit vectors; nothing in the
/// library re-normalizes them.
pub type Direction = Vector3<f64>;

/// An ordered set of directions forming one shell.
///
/// The order is only significant for round-tripping to and from files; every cost
/// function in [`crate::core::loss`] is invariant under permutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scheme {
    directions: Vec<Direction>,
}

impl Scheme {
    pub fn new(directions: Vec<Direction>) -> Self {
        Self { directions }
    }

    /// Creates a scheme from `[x, y, z]` rows.
    pub fn from_rows(rows: &[[f64; 3]]) -> Self {
        rows.iter()
            .map(|&[x, y, z]| Direction::new(x, y, z))
            .collect()
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn into_directions(self) -> Vec<Direction> {
        self.directions
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Direction> {
        self.directions.iter()
    }

    /// Returns a copy of the scheme with every masked direction negated.
    ///
    /// # Errors
    ///
    /// Returns [`MaskLengthError`] if the mask does not have exactly one entry per
    /// direction.
    pub fn apply_mask(&self, mask: &FlipMask) -> Result<Scheme, MaskLengthError> {
        if mask.len() != self.len() {
            return Err(MaskLengthError {
                mask_len: mask.len(),
                scheme_len: self.len(),
            });
        }
        Ok(self
            .directions
            .iter()
            .zip(mask.iter())
            .map(|(d, flip)| if flip { -d } else { *d })
            .collect())
    }
}

impl AsRef<[Direction]> for Scheme {
    fn as_ref(&self) -> &[Direction] {
        &self.directions
    }
}

impl From<Vec<Direction>> for Scheme {
    fn from(directions: Vec<Direction>) -> Self {
        Self::new(directions)
    }
}

impl FromIterator<Direction> for Scheme {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Concentric shells that are flipped independently but scored jointly.
///
/// Directions are addressed globally by concatenating the shells in order; the
/// global index of direction `k` of shell `s` is `shell_ranges()[s].start + k`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiShellScheme {
    shells: Vec<Scheme>,
}

impl MultiShellScheme {
    pub fn new(shells: Vec<Scheme>) -> Self {
        Self { shells }
    }

    pub fn single(shell: Scheme) -> Self {
        Self {
            shells: vec![shell],
        }
    }

    pub fn shells(&self) -> &[Scheme] {
        &self.shells
    }

    pub fn into_shells(self) -> Vec<Scheme> {
        self.shells
    }

    pub fn num_shells(&self) -> usize {
        self.shells.len()
    }

    pub fn total_directions(&self) -> usize {
        self.shells.iter().map(Scheme::len).sum()
    }

    /// All directions of all shells, in shell order.
    pub fn concatenated(&self) -> Vec<Direction> {
        self.shells
            .iter()
            .flat_map(|s| s.directions.iter().copied())
            .collect()
    }

    /// Global index ranges of each shell within [`Self::concatenated`].
    pub fn shell_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.shells
            .iter()
            .map(|s| {
                let range = start..start + s.len();
                start = range.end;
                range
            })
            .collect()
    }

    /// Applies one mask per shell.
    ///
    /// # Errors
    ///
    /// Returns [`MaskLengthError`] if the number of masks differs from the number of
    /// shells, or if any mask does not match its shell's size.
    pub fn apply_masks(&self, masks: &[FlipMask]) -> Result<MultiShellScheme, MaskLengthError> {
        if masks.len() != self.shells.len() {
            return Err(MaskLengthError {
                mask_len: masks.len(),
                scheme_len: self.shells.len(),
            });
        }
        let shells = self
            .shells
            .iter()
            .zip(masks)
            .map(|(shell, mask)| shell.apply_mask(mask))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { shells })
    }
}

impl From<Vec<Scheme>> for MultiShellScheme {
    fn from(shells: Vec<Scheme>) -> Self {
        Self::new(shells)
    }
}

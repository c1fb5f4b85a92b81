use serde::{Deserialize, Serialize};

use crate::errors::SGError;
use super::bounding_box::{BoundingBox, BoundingBox1D};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StretchingKind
{
    Identity,
    Log,
    /// Leentvaar's sinh stretching, clustering points around `x_0`.
    Sinh,
}

impl StretchingKind
{
    pub(crate) fn code(&self) -> u32
    {
        match self
        {
            StretchingKind::Identity => 1,
            StretchingKind::Log => 2,
            StretchingKind::Sinh => 3,
        }
    }
    pub(crate) fn from_code(code: u32) -> Option<Self>
    {
        match code
        {
            1 => Some(StretchingKind::Identity),
            2 => Some(StretchingKind::Log),
            3 => Some(StretchingKind::Sinh),
            _ => None,
        }
    }
}

///
/// Analytic one-dimensional stretching. `x_0` and `xsi` are only used by
/// [`StretchingKind::Sinh`].
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stretching1D
{
    pub kind: StretchingKind,
    pub x_0: f64,
    pub xsi: f64,
}

impl Default for Stretching1D
{
    fn default() -> Self {
        Self { kind: StretchingKind::Identity, x_0: 0.0, xsi: 1.0 }
    }
}

impl Stretching1D
{
    fn forward(&self, x: f64) -> f64
    {
        match self.kind
        {
            StretchingKind::Identity => x,
            StretchingKind::Log => x.ln(),
            StretchingKind::Sinh => ((x - self.x_0) * self.xsi).asinh(),
        }
    }
    fn inverse(&self, y: f64) -> f64
    {
        match self.kind
        {
            StretchingKind::Identity => y,
            StretchingKind::Log => y.exp(),
            StretchingKind::Sinh => y.sinh() / self.xsi + self.x_0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StretchingMode
{
    Analytic(Vec<Stretching1D>),
    ///
    /// User supplied coordinates per dimension. Each vector holds the
    /// 2^level + 1 positions of a full level `level` grid, boundaries included.
    ///
    Discrete { levels: Vec<u32>, coordinates: Vec<Vec<f64>> },
}

///
/// Non-affine mapping from unit coordinates to the physical domain.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stretching
{
    bounding_box: BoundingBox,
    mode: StretchingMode,
}

impl Stretching
{
    pub fn analytic(bounding_box: BoundingBox, stretchings: Vec<Stretching1D>) -> Result<Self, SGError>
    {
        if stretchings.len() != bounding_box.dim()
        {
            return Err(SGError::DimensionMismatch { expected: bounding_box.dim(), actual: stretchings.len() });
        }
        for (d, s) in stretchings.iter().enumerate()
        {
            if s.kind == StretchingKind::Log && bounding_box.offset(d) <= 0.0
            {
                return Err(SGError::InvalidArgument(format!("log stretching needs a positive domain in dimension {d}")));
            }
            if s.kind == StretchingKind::Sinh && s.xsi == 0.0
            {
                return Err(SGError::InvalidArgument(format!("sinh stretching needs xsi != 0 in dimension {d}")));
            }
        }
        Ok(Self { bounding_box, mode: StretchingMode::Analytic(stretchings) })
    }

    pub fn discrete(coordinates: Vec<Vec<f64>>) -> Result<Self, SGError>
    {
        let mut levels = Vec::with_capacity(coordinates.len());
        let mut boundaries = Vec::with_capacity(coordinates.len());
        for (d, vec) in coordinates.iter().enumerate()
        {
            let intervals = vec.len().saturating_sub(1);
            if intervals == 0 || !intervals.is_power_of_two()
            {
                return Err(SGError::InvalidArgument(format!("dimension {d} needs 2^level + 1 coordinates, got {}", vec.len())));
            }
            if vec.windows(2).any(|w| w[0] >= w[1])
            {
                return Err(SGError::InvalidArgument(format!("coordinates of dimension {d} are not strictly increasing")));
            }
            levels.push(intervals.trailing_zeros());
            boundaries.push(BoundingBox1D::new(vec[0], vec[intervals]));
        }
        Ok(Self { bounding_box: BoundingBox::from_boundaries(boundaries), mode: StretchingMode::Discrete { levels, coordinates } })
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.bounding_box.dim()
    }

    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox
    {
        &self.bounding_box
    }

    #[inline]
    pub fn mode(&self) -> &StretchingMode
    {
        &self.mode
    }

    ///
    /// Maps a unit coordinate `x` in dimension `dim` to the physical domain.
    ///
    pub fn transform(&self, x: f64, dim: usize) -> f64
    {
        let b = self.bounding_box.boundary(dim);
        match &self.mode
        {
            StretchingMode::Analytic(stretchings) =>
            {
                let s = &stretchings[dim];
                let f_a = s.forward(b.left_boundary);
                let f_b = s.forward(b.right_boundary);
                s.inverse(f_a + x * (f_b - f_a))
            },
            StretchingMode::Discrete { coordinates, .. } =>
            {
                let vec = &coordinates[dim];
                let position = x.clamp(0.0, 1.0) * (vec.len() - 1) as f64;
                let lower = position.floor() as usize;
                if lower + 1 >= vec.len()
                {
                    return vec[vec.len() - 1];
                }
                let t = position - lower as f64;
                vec[lower] + t * (vec[lower + 1] - vec[lower])
            }
        }
    }

    ///
    /// Physical coordinate of the 1D grid point (level, index) in dimension `dim`.
    ///
    pub fn coordinate(&self, level: u32, index: u32, dim: usize) -> f64
    {
        let b = self.bounding_box.boundary(dim);
        if level == 0
        {
            return if index == 0 { b.left_boundary } else { b.right_boundary };
        }
        if let StretchingMode::Discrete { levels, coordinates } = &self.mode
        {
            if level <= levels[dim]
            {
                return coordinates[dim][(index as usize) << (levels[dim] - level)];
            }
        }
        self.transform(index as f64 / (1u64 << level) as f64, dim)
    }
}

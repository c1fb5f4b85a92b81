use serde::{Deserialize, Serialize};

///
/// Extent of the domain in one dimension, together with the Dirichlet
/// markers solvers use to decide whether boundary coefficients are fixed.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox1D
{
    pub left_boundary: f64,
    pub right_boundary: f64,
    pub dirichlet_left: bool,
    pub dirichlet_right: bool,
}

impl Default for BoundingBox1D
{
    fn default() -> Self {
        Self { left_boundary: 0.0, right_boundary: 1.0, dirichlet_left: false, dirichlet_right: false }
    }
}

impl BoundingBox1D
{
    #[inline]
    pub fn new(left_boundary: f64, right_boundary: f64) -> Self
    {
        Self { left_boundary, right_boundary, ..Default::default() }
    }
    #[inline]
    pub fn width(&self) -> f64
    {
        self.right_boundary - self.left_boundary
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox
{
    boundaries: Vec<BoundingBox1D>,
}

impl BoundingBox
{
    #[inline]
    pub fn new(lower: &[f64], upper: &[f64]) -> Self
    {
        Self { boundaries: lower.iter().zip(upper).map(|(&l, &u)| BoundingBox1D::new(l, u)).collect() }
    }

    ///
    /// Unit hypercube [0,1]^num_inputs.
    ///
    pub fn with_dim(num_inputs: usize) -> Self
    {
        Self { boundaries: vec![BoundingBox1D::default(); num_inputs] }
    }

    pub fn from_boundaries(boundaries: Vec<BoundingBox1D>) -> Self
    {
        Self { boundaries }
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.boundaries.len()
    }

    #[inline]
    pub fn boundary(&self, dim: usize) -> &BoundingBox1D
    {
        &self.boundaries[dim]
    }

    #[inline]
    pub fn set_boundary(&mut self, dim: usize, boundary: BoundingBox1D)
    {
        self.boundaries[dim] = boundary;
    }

    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.boundaries[dim].width()
    }

    #[inline]
    pub fn offset(&self, dim: usize) -> f64
    {
        self.boundaries[dim].left_boundary
    }

    pub fn is_unit_cube(&self) -> bool
    {
        self.boundaries.iter().all(|b| b.left_boundary == 0.0 && b.right_boundary == 1.0)
    }

    ///
    /// Volume of hypercube (width(dim1)*...*width(dim_n))
    ///
    #[inline]
    pub fn volume(&self) -> f64
    {
        self.boundaries.iter().map(BoundingBox1D::width).product()
    }

    #[inline]
    pub fn to_unit_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        point.iter().zip(&self.boundaries).map(|(&x, b)| (x - b.left_boundary) / b.width()).collect()
    }

    #[inline]
    pub fn to_real_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        let mut r = point.to_vec();
        self.to_real_coordinate_in_place(&mut r);
        r
    }

    #[inline]
    pub fn to_real_coordinate_in_place(&self, point: &mut [f64])
    {
        for (x, b) in point.iter_mut().zip(&self.boundaries)
        {
            *x = b.left_boundary + b.width() * *x;
        }
    }

    #[inline]
    pub fn contains(&self, point: &[f64]) -> bool
    {
        point.iter().zip(&self.boundaries).all(|(&x, b)| b.left_boundary <= x && x <= b.right_boundary)
    }
}

#[test]
fn test_bounding_box_mapping()
{
    let bb = BoundingBox::new(&[-1.0, 2.0], &[1.0, 6.0]);
    assert_eq!(bb.volume(), 8.0);
    assert!(!bb.is_unit_cube());
    let real = bb.to_real_coordinate(&[0.5, 0.25]);
    assert_eq!(real, vec![0.0, 3.0]);
    assert_eq!(bb.to_unit_coordinate(&real), vec![0.5, 0.25]);
    assert!(bb.contains(&[1.0, 6.0]));
    assert!(!bb.contains(&[1.5, 3.0]));
    assert!(BoundingBox::with_dim(3).is_unit_cube());
}

use crate::basis::Basis;
use crate::errors::SGError;
use crate::storage::stretching::Stretching;
use crate::storage::{GridStorage, IndexType, LevelType};

///
/// Evaluates the interpolant `sum_i alpha_i phi_i(x)` at the unit coordinate `x`
/// by summing over all points.
///
pub fn evaluate_unit<B: Basis + ?Sized>(storage: &GridStorage, alpha: &[f64], basis: &B, x: &[f64]) -> Result<f64, SGError>
{
    if alpha.len() != storage.len()
    {
        return Err(SGError::CoefficientLengthMismatch { expected: storage.len(), actual: alpha.len() });
    }
    if x.len() != storage.dim()
    {
        return Err(SGError::DimensionMismatch { expected: storage.dim(), actual: x.len() });
    }
    Ok(sum_unit(storage, alpha, basis, x))
}

///
/// Unchecked sum behind [`evaluate_unit`]. `alpha` and `x` must match the storage.
///
pub(crate) fn sum_unit<B: Basis + ?Sized>(storage: &GridStorage, alpha: &[f64], basis: &B, x: &[f64]) -> f64
{
    let mut sum = 0.0;
    for (point, seq) in storage.iter()
    {
        let mut value = alpha[seq];
        for (d, &xd) in x.iter().enumerate()
        {
            if value == 0.0
            {
                break;
            }
            value *= basis.eval(point.level[d], point.index[d], xd);
        }
        sum += value;
    }
    sum
}

///
/// Evaluates the interpolant at the physical coordinate `x`, mapped to the unit
/// cube through the storage's bounding box.
///
pub fn evaluate<B: Basis + ?Sized>(storage: &GridStorage, alpha: &[f64], basis: &B, x: &[f64]) -> Result<f64, SGError>
{
    if x.len() != storage.dim()
    {
        return Err(SGError::DimensionMismatch { expected: storage.dim(), actual: x.len() });
    }
    let unit = storage.bounding_box().to_unit_coordinate(x);
    evaluate_unit(storage, alpha, basis, &unit)
}

///
/// Hat function spanned by the stretched neighbours of (level, index). Level
/// zero gives the two half hats when `has_boundary` is set and zero otherwise.
///
fn stretched_hat(stretching: &Stretching, level: LevelType, index: IndexType, x: f64, dim: usize, has_boundary: bool) -> f64
{
    if level == 0
    {
        if !has_boundary
        {
            return 0.0;
        }
        let left = stretching.coordinate(0, 0, dim);
        let right = stretching.coordinate(0, 1, dim);
        let t = (x - left) / (right - left);
        return if index == 0 { 1.0 - t } else { t };
    }
    let left = stretching.coordinate(level, index - 1, dim);
    let right = stretching.coordinate(level, index + 1, dim);
    if x <= left || x >= right
    {
        return 0.0;
    }
    let mid = stretching.coordinate(level, index, dim);
    if x <= mid
    {
        (x - left) / (mid - left)
    }
    else
    {
        (right - x) / (right - mid)
    }
}

///
/// Evaluates the interpolant at the physical coordinate `x` of a stretched grid.
/// The hats are linear in physical space between neighbouring grid coordinates.
///
pub fn evaluate_stretched(storage: &GridStorage, alpha: &[f64], stretching: &Stretching, x: &[f64]) -> Result<f64, SGError>
{
    if alpha.len() != storage.len()
    {
        return Err(SGError::CoefficientLengthMismatch { expected: storage.len(), actual: alpha.len() });
    }
    if x.len() != storage.dim() || stretching.dim() != storage.dim()
    {
        return Err(SGError::DimensionMismatch { expected: storage.dim(), actual: x.len() });
    }
    Ok(sum_stretched(storage, alpha, stretching, x))
}

///
/// Unchecked sum behind [`evaluate_stretched`].
///
pub(crate) fn sum_stretched(storage: &GridStorage, alpha: &[f64], stretching: &Stretching, x: &[f64]) -> f64
{
    let has_boundary = storage.has_boundary();
    let mut sum = 0.0;
    for (point, seq) in storage.iter()
    {
        let mut value = alpha[seq];
        for (d, &xd) in x.iter().enumerate()
        {
            if value == 0.0
            {
                break;
            }
            value *= stretched_hat(stretching, point.level[d], point.index[d], xd, d, has_boundary);
        }
        sum += value;
    }
    sum
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::basis::{LinearBasis, LinearBoundaryBasis};
    use crate::storage::GridPoint;
    use crate::storage::bounding_box::BoundingBox;

    #[test]
    fn test_evaluate_hats()
    {
        let mut storage = GridStorage::with_bounding_box(BoundingBox::new(&[0.0], &[2.0]));
        storage.insert(GridPoint::new(&[1], &[1])).unwrap();
        storage.insert(GridPoint::new(&[2], &[3])).unwrap();
        let alpha = [1.0, 2.0];
        assert!((evaluate_unit(&storage, &alpha, &LinearBasis, &[0.75]).unwrap() - 2.5).abs() < 1e-15);
        assert!((evaluate(&storage, &alpha, &LinearBasis, &[1.5]).unwrap() - 2.5).abs() < 1e-15);
        assert!((evaluate(&storage, &alpha, &LinearBasis, &[0.5]).unwrap() - 0.5).abs() < 1e-15);
        assert!(evaluate(&storage, &alpha, &LinearBasis, &[0.5, 0.5]).is_err());
        assert!(evaluate(&storage, &alpha[..1], &LinearBasis, &[0.5]).is_err());
    }

    #[test]
    fn test_evaluate_boundary()
    {
        let mut storage = GridStorage::new(1);
        storage.insert(GridPoint::new(&[0], &[0])).unwrap();
        storage.insert(GridPoint::new(&[0], &[1])).unwrap();
        let alpha = [1.0, 3.0];
        assert!((evaluate_unit(&storage, &alpha, &LinearBoundaryBasis, &[0.25]).unwrap() - 1.5).abs() < 1e-15);
    }

    #[test]
    fn test_evaluate_stretched()
    {
        use crate::storage::stretching::{Stretching1D, StretchingKind};
        let bb = BoundingBox::new(&[1.0], &[100.0]);
        let stretching = Stretching::analytic(bb, vec![Stretching1D { kind: StretchingKind::Log, ..Default::default() }]).unwrap();
        let mut storage = GridStorage::with_stretching(stretching.clone());
        storage.insert(GridPoint::new(&[1], &[1])).unwrap();
        let alpha = [2.0];
        // the hat peaks at the stretched coordinate 10
        assert!((evaluate_stretched(&storage, &alpha, &stretching, &[10.0]).unwrap() - 2.0).abs() < 1e-12);
        assert!((evaluate_stretched(&storage, &alpha, &stretching, &[55.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(evaluate_stretched(&storage, &alpha, &stretching, &[1.0]).unwrap(), 0.0);

        // without stretching the same grid agrees with the bounding box mapping
        let identity = Stretching::analytic(BoundingBox::new(&[0.0], &[2.0]), vec![Stretching1D::default()]).unwrap();
        let mut storage = GridStorage::with_stretching(identity.clone());
        storage.insert(GridPoint::new(&[1], &[1])).unwrap();
        storage.insert(GridPoint::new(&[2], &[3])).unwrap();
        assert!((evaluate_stretched(&storage, &[1.0, 2.0], &identity, &[1.5]).unwrap() - 2.5).abs() < 1e-14);
    }
}

//!
//! Construction of regular sparse grids and full grids, with and without
//! boundary points.
//!
use tracing::debug;

use crate::errors::SGError;
use crate::storage::{GridPoint, GridStorage, LevelType, MAX_LEVEL};

///
/// Calls `operation` for every level vector `l` with `min_level <= l[d] <= max_levels[d]`
/// accepted by `accept`.
///
fn for_each_level_vector<A, Op>(min_level: LevelType, max_levels: &[LevelType], accept: A, mut operation: Op) -> Result<(), SGError>
    where A: Fn(&[LevelType]) -> bool, Op: FnMut(&[LevelType]) -> Result<(), SGError>
{
    if max_levels.iter().any(|&l| l < min_level)
    {
        return Ok(());
    }
    let mut level = vec![min_level; max_levels.len()];
    loop
    {
        if accept(&level)
        {
            operation(&level)?;
        }
        // odometer increment
        let mut d = 0;
        while d < level.len()
        {
            if level[d] < max_levels[d]
            {
                level[d] += 1;
                break;
            }
            level[d] = min_level;
            d += 1;
        }
        if d == level.len()
        {
            return Ok(());
        }
    }
}

///
/// Inserts every point of the hierarchical subspace with levels `level`.
///
fn insert_subspace(storage: &mut GridStorage, level: &[LevelType]) -> Result<(), SGError>
{
    let first = |l: LevelType| if l == 0 { 0 } else { 1 };
    let last = |l: LevelType| if l == 0 { 1 } else { (1u64 << l) as u32 - 1 };
    let step = |l: LevelType| if l == 0 { 1 } else { 2 };
    let mut index: Vec<u32> = level.iter().map(|&l| first(l)).collect();
    loop
    {
        storage.insert(GridPoint::new(level, &index))?;
        let mut d = 0;
        while d < level.len()
        {
            if index[d] < last(level[d])
            {
                index[d] += step(level[d]);
                break;
            }
            index[d] = first(level[d]);
            d += 1;
        }
        if d == level.len()
        {
            return Ok(());
        }
    }
}

fn check_levels(storage: &GridStorage, levels: &[LevelType]) -> Result<(), SGError>
{
    if levels.len() != storage.dim()
    {
        return Err(SGError::DimensionMismatch { expected: storage.dim(), actual: levels.len() });
    }
    if let Some(&l) = levels.iter().find(|&&l| l == 0 || l > MAX_LEVEL)
    {
        return Err(SGError::InvalidArgument(format!("grid level {l} is out of range")));
    }
    Ok(())
}

///
/// Regular sparse grid without boundaries: all subspaces with `l[d] >= 1`,
/// `l[d] <= levels[d]` and `|l|_1 <= n + D - 1` where `n = max(levels)`.
///
pub fn regular(storage: &mut GridStorage, levels: &[LevelType]) -> Result<(), SGError>
{
    check_levels(storage, levels)?;
    let n = levels.iter().copied().max().unwrap_or(1);
    let bound = n + storage.dim() as u32 - 1;
    for_each_level_vector(1, levels, |l| l.iter().sum::<u32>() <= bound, |l| insert_subspace(storage, l))?;
    debug!(points = storage.len(), n, "generated regular sparse grid");
    Ok(())
}

///
/// Full grid of level `level` without boundaries.
///
pub fn full(storage: &mut GridStorage, level: LevelType) -> Result<(), SGError>
{
    let levels = vec![level; storage.dim()];
    check_levels(storage, &levels)?;
    for_each_level_vector(1, &levels, |_| true, |l| insert_subspace(storage, l))?;
    debug!(points = storage.len(), level, "generated full grid");
    Ok(())
}

///
/// Regular sparse grid with boundary points. A subspace with `z` level zero
/// entries (0 < z < D) and level sum `s` is included iff `s + z + boundary_level <= n + D`;
/// inner subspaces follow [`regular`] and the corners are always present.
/// `boundary_level = 1` gives the truncated boundary grid.
///
pub fn regular_with_boundaries(storage: &mut GridStorage, levels: &[LevelType], boundary_level: LevelType) -> Result<(), SGError>
{
    check_levels(storage, levels)?;
    let dim = storage.dim() as u32;
    let n = levels.iter().copied().max().unwrap_or(1);
    let accept = |l: &[LevelType]|
    {
        let s: u32 = l.iter().sum();
        let z = l.iter().filter(|&&li| li == 0).count() as u32;
        if z == dim
        {
            true
        }
        else if z == 0
        {
            s <= n + dim - 1
        }
        else
        {
            s + z + boundary_level <= n + dim
        }
    };
    for_each_level_vector(0, levels, accept, |l| insert_subspace(storage, l))?;
    storage.set_has_boundary(true);
    debug!(points = storage.len(), n, boundary_level, "generated sparse grid with boundaries");
    Ok(())
}

///
/// Full grid of level `level` including the boundary points.
///
pub fn full_with_boundaries(storage: &mut GridStorage, level: LevelType) -> Result<(), SGError>
{
    let levels = vec![level; storage.dim()];
    check_levels(storage, &levels)?;
    for_each_level_vector(0, &levels, |_| true, |l| insert_subspace(storage, l))?;
    storage.set_has_boundary(true);
    debug!(points = storage.len(), level, "generated full grid with boundaries");
    Ok(())
}

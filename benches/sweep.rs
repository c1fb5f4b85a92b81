use criterion::{criterion_group, criterion_main, Criterion};
use sgadapt::{errors::SGError, grids::SparseGrid, refinement::SurplusRefinementFunctor, algorithms::refinement::RefinementOptions};

fn build_grid() -> Result<SparseGrid, SGError>
{
    // 5D regular grid with boundaries, one value per node.
    let mut grid = SparseGrid::new(5);
    grid.sparse_grid_with_boundaries(&[5; 5], 1)?;
    let f = |x: &[f64]| x.iter().map(|xi| xi * xi * xi).sum::<f64>();
    grid.update_values_parallel(&f)?;
    Ok(grid)
}

fn hierarchize(grid: &mut SparseGrid) -> Result<(), SGError>
{
    grid.hierarchize()?;
    grid.dehierarchize()
}

fn mass_matrix(grid: &SparseGrid, result: &mut [f64]) -> Result<(), SGError>
{
    grid.mass_matrix_mult(grid.alpha(), result)
}

fn run_hierarchize(c: &mut Criterion)
{
    let mut grid = build_grid().unwrap();
    c.bench_function("hierarchize 5d", |b| b.iter(|| hierarchize(&mut grid).unwrap()));
}

fn run_mass_matrix(c: &mut Criterion)
{
    let grid = build_grid().unwrap();
    let mut result = vec![0.0; grid.len()];
    c.bench_function("up/down 5d", |b| b.iter(|| mass_matrix(&grid, &mut result).unwrap()));
}

fn run_refinement(c: &mut Criterion)
{
    let f = |x: &[f64]| (-20.0 * x.iter().map(|xi| (xi - 0.4) * (xi - 0.4)).sum::<f64>()).exp();
    c.bench_function("refine 3d", |b| b.iter(||
    {
        let mut grid = SparseGrid::new(3);
        grid.sparse_grid(&[3; 3]).unwrap();
        grid.update_values(&mut |x| f(x)).unwrap();
        grid.refine(&SurplusRefinementFunctor::new(10, 1e-4), &mut |x| f(x), &RefinementOptions::with_max_level(10), 10).unwrap()
    }));
}

criterion_group!(benches, run_hierarchize, run_mass_matrix, run_refinement);
criterion_main!(benches);

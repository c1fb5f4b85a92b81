pub mod sparse_grid;

pub use sparse_grid::SparseGrid;

pub mod interpolation_error;
pub mod surplus;
pub mod user_defined;

pub use interpolation_error::InterpolationErrorRefinement;
pub use surplus::{SurplusCoarseningFunctor, SurplusRefinementFunctor, SurplusVolumeRefinementFunctor};
pub use user_defined::{UserDefinedRefinement, UserRefinementFunction};

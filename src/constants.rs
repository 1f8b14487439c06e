/// Tolerance for comparing stored table costs against recomputed operation
/// costs, rounding MIP variable values and checking cost equivalence after
/// simplification.
pub const COST_TOL: f64 = 1e-8;

/// Hard cap on location counts imposed by the bitset set encoding.
pub const MAX_LOCATIONS: usize = 32;

/// Default soft cap for the exact solver; operation enumeration beyond this
/// is impractical in memory and model size.
pub const EXACT_SIZE_CAP: usize = 25;

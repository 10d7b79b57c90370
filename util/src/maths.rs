//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the inclusive range `[min, max]`.
///
/// The upper bound is applied first and the lower bound second, so an
/// inverted range yields `min`. Unlike `f64::clamp` this never panics, callers
/// are expected to have checked the range when it was configured.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Get the mean and (population) standard deviation of a set of samples.
///
/// Returns `None` if there are no samples.
pub fn mean_std<T>(samples: &[T]) -> Option<(T, T)>
where
    T: Float
{
    if samples.is_empty() {
        return None
    }

    let n = T::from(samples.len())?;
    let mean = samples.iter().fold(T::zero(), |acc, s| acc + *s) / n;
    let var = samples
        .iter()
        .fold(T::zero(), |acc, s| acc + (*s - mean).powi(2)) / n;

    Some((mean, var.sqrt()))
}

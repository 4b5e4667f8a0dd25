//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Return the euclidian norm (distance between) of two points.
///
/// If the points do not have the same number of dimentions then `None` is 
/// returned.
pub fn norm<T>(point_0: &[T], point_1: &[T]) -> Option<T> 
where
    T: Float
{
    // Check that the dimentions match
    if point_0.len() != point_1.len() {
        return None;
    }

    let sum = point_0
        .iter()
        .zip(point_1.iter())
        .fold(T::zero(), |acc, (a, b)| acc + (*a - *b).powi(2));

    Some(sum.sqrt())
}

/// Clamp a value into the closed range `[min, max]`.
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

/// Get the signed angle that rotates `current` onto `target` by the shortest
/// path.
///
/// The result lies in (-pi, pi]. A positive value is an anticlockwise turn.
pub fn shortest_turn<T>(target: T, current: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t = pi_t + pi_t;

    let d = rem_euclid(target - current + pi_t, tau_t) - pi_t;

    if d <= -pi_t {
        d + tau_t
    }
    else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Truncate a value to millimetre precision, rounding towards negative
/// infinity.
pub fn truncate_mm<T>(value: T) -> T
where
    T: Float
{
    let scale = T::from(1000.0).unwrap_or_else(T::one);
    (value * scale).floor() / scale
}

mod mat3;
mod quat;
mod transform;
mod vec3;

pub use mat3::Mat3;
pub use quat::Quat;
pub use transform::Transform;
pub use vec3::Vec3;

/// Common math constants
pub mod consts {
    /// A small epsilon value for floating point comparisons
    pub const EPSILON: f64 = 1e-9;

    /// Pi constant
    pub const PI: f64 = std::f64::consts::PI;

    /// Pi divided by 2
    pub const FRAC_PI_2: f64 = std::f64::consts::FRAC_PI_2;
}

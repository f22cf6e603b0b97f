use std::ops::{Mul, MulAssign, Neg};

use serde::{Deserialize, Serialize};

use super::vec3::Vec3;

/// A quaternion representing a rotation in 3D space.
///
/// Stored as (x, y, z, w) where w is the scalar part. Body orientations are
/// re-normalized by the integrator, so most code may assume unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    /// Identity quaternion (no rotation)
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a quaternion from a rotation axis and angle (in radians)
    #[inline]
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        let axis = axis.normalize();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Shortest-arc rotation taking `from` onto `to`.
    pub fn from_rotation_arc(from: Vec3, to: Vec3) -> Self {
        let from = from.normalize();
        let to = to.normalize();
        let dot = from.dot(to);

        if dot > 1.0 - 1e-12 {
            return Self::IDENTITY;
        }
        if dot < -1.0 + 1e-12 {
            let (axis, _) = from.tangents();
            return Self::from_axis_angle(axis, std::f64::consts::PI);
        }

        let cross = from.cross(to);
        Self::new(cross.x, cross.y, cross.z, 1.0 + dot).normalize()
    }

    #[inline]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns a normalized quaternion, or identity for a zero quaternion.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 1e-20 {
            let inv_len = 1.0 / len;
            Self::new(
                self.x * inv_len,
                self.y * inv_len,
                self.z * inv_len,
                self.w * inv_len,
            )
        } else {
            Self::IDENTITY
        }
    }

    /// Second-order approximate normalization.
    ///
    /// Accurate when the quaternion is already close to unit length, which
    /// holds after a single small integration step.
    #[inline]
    pub fn normalize_fast(self) -> Self {
        let f = (3.0 - self.length_squared()) * 0.5;
        Self::new(self.x * f, self.y * f, self.z * f, self.w * f)
    }

    /// Returns the conjugate (inverse rotation for unit quaternions)
    #[inline]
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    #[inline]
    pub fn inverse(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq > 1e-20 {
            let inv_len_sq = 1.0 / len_sq;
            Self::new(
                -self.x * inv_len_sq,
                -self.y * inv_len_sq,
                -self.z * inv_len_sq,
                self.w * inv_len_sq,
            )
        } else {
            Self::IDENTITY
        }
    }

    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Rotates a vector by this quaternion
    #[inline]
    pub fn rotate_vec(self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let uv = qv.cross(v);
        let uuv = qv.cross(uv);
        v + (uv * self.w + uuv) * 2.0
    }

    /// Inverse rotates a vector (rotates by conjugate)
    #[inline]
    pub fn inverse_rotate_vec(self, v: Vec3) -> Vec3 {
        self.conjugate().rotate_vec(v)
    }

    /// Spherical linear interpolation along the shorter arc.
    pub fn slerp(self, other: Self, t: f64) -> Self {
        let mut dot = self.dot(other);
        let other = if dot < 0.0 {
            dot = -dot;
            -other
        } else {
            other
        };

        if dot > 0.9995 {
            return Self::new(
                self.x + t * (other.x - self.x),
                self.y + t * (other.y - self.y),
                self.z + t * (other.z - self.z),
                self.w + t * (other.w - self.w),
            )
            .normalize();
        }

        let theta = dot.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        let s0 = ((1.0 - t) * theta).sin() / sin_theta;
        let s1 = (t * theta).sin() / sin_theta;

        Self::new(
            s0 * self.x + s1 * other.x,
            s0 * self.y + s1 * other.y,
            s0 * self.z + s1 * other.z,
            s0 * self.w + s1 * other.w,
        )
    }

    /// Advances the orientation by one explicit step of `q' = 0.5 * w * q`.
    ///
    /// `angular_factor` scales each component of the angular velocity, so a
    /// zero component locks rotation about that world axis. The result is not
    /// normalized; callers pick [`Quat::normalize`] or [`Quat::normalize_fast`].
    #[inline]
    pub fn integrate(self, angular_velocity: Vec3, dt: f64, angular_factor: Vec3) -> Self {
        let w = angular_velocity.component_mul(angular_factor);
        let half_dt = dt * 0.5;
        let (bx, by, bz, bw) = (self.x, self.y, self.z, self.w);

        Self::new(
            bx + half_dt * (w.x * bw + w.y * bz - w.z * by),
            by + half_dt * (w.y * bw + w.z * bx - w.x * bz),
            bz + half_dt * (w.z * bw + w.x * by - w.y * bx),
            bw + half_dt * (-w.x * bx - w.y * by - w.z * bz),
        )
    }
}

impl Mul for Quat {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self::new(
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
        )
    }
}

impl MulAssign for Quat {
    #[inline]
    fn mul_assign(&mut self, other: Self) {
        *self = *self * other;
    }
}

impl Mul<Vec3> for Quat {
    type Output = Vec3;

    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        self.rotate_vec(v)
    }
}

impl Neg for Quat {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn vec3_approx_eq(a: Vec3, b: Vec3) -> bool {
        a.almost_equals(b, 1e-9)
    }

    #[test]
    fn test_axis_angle_rotation() {
        let q = Quat::from_axis_angle(Vec3::Z, FRAC_PI_2);
        assert!(vec3_approx_eq(q.rotate_vec(Vec3::X), Vec3::Y));
        assert!(vec3_approx_eq(q.inverse_rotate_vec(Vec3::Y), Vec3::X));
    }

    #[test]
    fn test_multiplication_composes() {
        let a = Quat::from_axis_angle(Vec3::Y, 0.3);
        let b = Quat::from_axis_angle(Vec3::X, -1.1);
        let v = Vec3::new(0.2, -0.7, 1.4);
        assert!(vec3_approx_eq((a * b) * v, a * (b * v)));
    }

    #[test]
    fn test_rotation_arc() {
        let q = Quat::from_rotation_arc(Vec3::Y, Vec3::X);
        assert!(vec3_approx_eq(q * Vec3::Y, Vec3::X));
        let flip = Quat::from_rotation_arc(Vec3::Y, -Vec3::Y);
        assert!(vec3_approx_eq(flip * Vec3::Y, -Vec3::Y));
    }

    #[test]
    fn test_integrate_then_normalize_stays_unit() {
        let mut q = Quat::from_axis_angle(Vec3::new(1.0, 2.0, -0.5), 0.7);
        let omega = Vec3::new(3.0, -11.0, 7.5);
        for _ in 0..1000 {
            q = q.integrate(omega, 1.0 / 60.0, Vec3::ONE).normalize();
            assert!((q.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fast_normalize_close_to_exact() {
        let q = Quat::IDENTITY.integrate(Vec3::new(0.5, 0.1, -0.2), 1.0 / 60.0, Vec3::ONE);
        let exact = q.normalize();
        let fast = q.normalize_fast();
        assert!(exact.dot(fast) > 1.0 - 1e-9);
        assert!((fast.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_integrate_respects_angular_factor() {
        let q = Quat::IDENTITY.integrate(Vec3::new(0.0, 5.0, 0.0), 0.1, Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(q, Quat::IDENTITY);
    }

    #[test]
    fn test_slerp_endpoints() {
        let a = Quat::IDENTITY;
        let b = Quat::from_axis_angle(Vec3::Y, 1.0);
        assert!(a.slerp(b, 0.0).dot(a) > 1.0 - 1e-9);
        assert!(a.slerp(b, 1.0).dot(b) > 1.0 - 1e-9);
        let half = a.slerp(b, 0.5);
        assert!(half.dot(Quat::from_axis_angle(Vec3::Y, 0.5)) > 1.0 - 1e-9);
    }
}

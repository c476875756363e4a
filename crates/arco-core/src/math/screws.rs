//! Screw-theory kinematics (product of exponentials)
//!
//! Space-frame forward kinematics, spatial Jacobian, and the SO(3)/SE(3)
//! exponential and logarithm maps. Conventions follow Lynch & Park,
//! "Modern Robotics": a screw axis is a 6-vector [ω; v] with the angular
//! part first.

use nalgebra::{Matrix3, Matrix4, Matrix6, Vector3, Vector6};

use crate::{JointVector, Pose, ScrewAxes, SpatialJacobian, Twist};

/// Tolerance below which a rotation angle is treated as zero
const ANGLE_EPS: f64 = 1e-10;

/// Skew-symmetric matrix from vector (hat operator)
///
/// For w = [x, y, z]^T:
/// ```text
/// [w]× = [ 0  -z   y]
///        [ z   0  -x]
///        [-y   x   0]
/// ```
pub fn so3_hat(w: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -w.z, w.y,
        w.z, 0.0, -w.x,
        -w.y, w.x, 0.0,
    )
}

/// Rotation matrix exp([ω]θ) via the Rodrigues formula
///
/// `omega` must be a unit axis; for |ω| ≈ 0 the identity is returned.
pub fn matrix_exp3(omega: &Vector3<f64>, theta: f64) -> Matrix3<f64> {
    if omega.norm() < ANGLE_EPS {
        return Matrix3::identity();
    }
    let hat = so3_hat(omega);
    Matrix3::identity() + hat * theta.sin() + hat * hat * (1.0 - theta.cos())
}

/// Axis-angle logarithm of a rotation matrix, returned as ω·θ
pub fn matrix_log3(r: &Matrix3<f64>) -> Vector3<f64> {
    let trace = r.trace();
    let cos_theta = ((trace - 1.0) / 2.0).clamp(-1.0, 1.0);

    if cos_theta >= 1.0 - ANGLE_EPS {
        // No rotation
        return Vector3::zeros();
    }

    if cos_theta <= -1.0 + ANGLE_EPS {
        // θ = π: extract the axis from the largest diagonal entry
        let axis = if r[(2, 2)] > -1.0 + ANGLE_EPS {
            Vector3::new(r[(0, 2)], r[(1, 2)], 1.0 + r[(2, 2)])
                / (2.0 * (1.0 + r[(2, 2)])).sqrt()
        } else if r[(1, 1)] > -1.0 + ANGLE_EPS {
            Vector3::new(r[(0, 1)], 1.0 + r[(1, 1)], r[(2, 1)])
                / (2.0 * (1.0 + r[(1, 1)])).sqrt()
        } else {
            Vector3::new(1.0 + r[(0, 0)], r[(1, 0)], r[(2, 0)])
                / (2.0 * (1.0 + r[(0, 0)])).sqrt()
        };
        return axis * std::f64::consts::PI;
    }

    let theta = cos_theta.acos();
    let w_hat = (r - r.transpose()) * (theta / (2.0 * theta.sin()));
    Vector3::new(w_hat[(2, 1)], w_hat[(0, 2)], w_hat[(1, 0)])
}

/// SE(3) exponential of a screw axis S = [ω; v] scaled by θ
pub fn matrix_exp6(screw: &Twist, theta: f64) -> Pose {
    let omega = Vector3::new(screw[0], screw[1], screw[2]);
    let v = Vector3::new(screw[3], screw[4], screw[5]);

    let mut t = Matrix4::identity();
    if omega.norm() < ANGLE_EPS {
        // Pure translation
        t.fixed_view_mut::<3, 1>(0, 3).copy_from(&(v * theta));
        return t;
    }

    let hat = so3_hat(&omega);
    let rot = matrix_exp3(&omega, theta);
    // G(θ) = Iθ + (1 - cos θ)[ω] + (θ - sin θ)[ω]²
    let g = Matrix3::identity() * theta
        + hat * (1.0 - theta.cos())
        + hat * hat * (theta - theta.sin());

    t.fixed_view_mut::<3, 3>(0, 0).copy_from(&rot);
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(&(g * v));
    t
}

/// SE(3) logarithm: twist coordinates [ωθ; vθ] such that exp recovers `t`
pub fn matrix_log6(t: &Pose) -> Twist {
    let r = t.fixed_view::<3, 3>(0, 0).into_owned();
    let p = Vector3::new(t[(0, 3)], t[(1, 3)], t[(2, 3)]);

    let w = matrix_log3(&r);
    let theta = w.norm();

    if theta < ANGLE_EPS {
        // Pure translation
        return Twist::new(0.0, 0.0, 0.0, p.x, p.y, p.z);
    }

    let axis = w / theta;
    let hat = so3_hat(&axis);
    // G⁻¹(θ) = I/θ - [ω]/2 + (1/θ - cot(θ/2)/2)[ω]²
    let g_inv = Matrix3::identity() / theta - hat / 2.0
        + hat * hat * (1.0 / theta - 0.5 / (theta / 2.0).tan());
    let v = g_inv * p;

    let mut twist = Twist::zeros();
    twist.fixed_view_mut::<3, 1>(0, 0).copy_from(&w);
    twist.fixed_view_mut::<3, 1>(3, 0).copy_from(&(v * theta));
    twist
}

/// Inverse of a homogeneous transform without a general matrix inverse
///
/// T⁻¹ = [Rᵀ, -Rᵀp; 0, 1]
pub fn trans_inv(t: &Pose) -> Pose {
    let r = t.fixed_view::<3, 3>(0, 0).into_owned();
    let p = Vector3::new(t[(0, 3)], t[(1, 3)], t[(2, 3)]);

    let mut inv = Matrix4::identity();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&r.transpose());
    inv.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-r.transpose() * p));
    inv
}

/// Adjoint representation of a transform, mapping twists between frames
///
/// Ad_T = [R, 0; [p]×R, R]
pub fn adjoint(t: &Pose) -> Matrix6<f64> {
    let r = t.fixed_view::<3, 3>(0, 0).into_owned();
    let p = Vector3::new(t[(0, 3)], t[(1, 3)], t[(2, 3)]);

    let mut ad = Matrix6::zeros();
    ad.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    ad.fixed_view_mut::<3, 3>(3, 0).copy_from(&(so3_hat(&p) * r));
    ad.fixed_view_mut::<3, 3>(3, 3).copy_from(&r);
    ad
}

/// Forward kinematics in the space frame
///
/// T(θ) = exp([S₁]θ₁) ··· exp([Sₙ]θₙ) M
pub fn fk_in_space(home: &Pose, screw_axes: &ScrewAxes, theta: &JointVector) -> Pose {
    let mut t = Matrix4::identity();
    for i in 0..theta.len() {
        let screw: Twist = screw_axes.column(i).into_owned();
        t *= matrix_exp6(&screw, theta[i]);
    }
    t * home
}

/// Space-frame spatial Jacobian
///
/// Column i is the i-th screw axis transformed by the accumulated
/// exponentials of joints 1..i-1.
pub fn space_jacobian(screw_axes: &ScrewAxes, theta: &JointVector) -> SpatialJacobian {
    let mut jac = SpatialJacobian::zeros();
    jac.set_column(0, &screw_axes.column(0));

    let mut t = Matrix4::identity();
    for i in 1..theta.len() {
        let prev: Twist = screw_axes.column(i - 1).into_owned();
        t *= matrix_exp6(&prev, theta[i - 1]);
        let col: Vector6<f64> = adjoint(&t) * screw_axes.column(i).into_owned();
        jac.set_column(i, &col);
    }
    jac
}

use nalgebra::{
    Isometry3, Matrix4, RealField, SimdRealField, Translation3, UnitQuaternion, Vector3,
};
use num_traits::Float;

/// Tolerance used when checking that a quaternion is still a rotation.
const UNIT_QUATERNION_EPS: f32 = 1e-3;

pub trait QuaternionEuler<T> {
    fn euler_vector_deg(&self) -> Vector3<T>;
    fn euler_vector(&self) -> Vector3<T>;
    fn from_euler_angles_deg(roll: T, pitch: T, yaw: T) -> UnitQuaternion<T>;
}

impl<T: SimdRealField + RealField + Float> QuaternionEuler<T> for UnitQuaternion<T>
where
    T::Element: SimdRealField,
{
    fn euler_vector_deg(&self) -> Vector3<T> {
        let angles = self.euler_angles();
        Vector3::new(
            angles.0.to_degrees(),
            angles.1.to_degrees(),
            angles.2.to_degrees(),
        )
    }

    fn euler_vector(&self) -> Vector3<T> {
        let angles = self.euler_angles();
        Vector3::new(angles.0, angles.1, angles.2)
    }

    fn from_euler_angles_deg(roll: T, pitch: T, yaw: T) -> UnitQuaternion<T> {
        UnitQuaternion::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
    }
}

/// Finite-ness checks for the math types handed to the solver.
pub trait FiniteExt {
    fn all_finite(&self) -> bool;
}

impl FiniteExt for Vector3<f32> {
    fn all_finite(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }
}

impl FiniteExt for UnitQuaternion<f32> {
    fn all_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }
}

impl FiniteExt for Isometry3<f32> {
    fn all_finite(&self) -> bool {
        self.translation.vector.all_finite() && self.rotation.all_finite()
    }
}

/// A pose the solver accepts: finite everywhere and a unit-length rotation.
pub fn is_valid_pose(pose: &Isometry3<f32>) -> bool {
    pose.all_finite() && (pose.rotation.coords.norm_squared() - 1.0).abs() <= UNIT_QUATERNION_EPS
}

/// Builds the column-major model matrix `T * R * S`.
pub fn compose_world_matrix(
    position: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
    scale: &Vector3<f32>,
) -> Matrix4<f32> {
    Isometry3::from_parts(Translation3::from(*position), *rotation).to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn euler_degrees_roundtrip() {
        let q = UnitQuaternion::from_euler_angles_deg(10.0f32, 20.0, 30.0);
        let e = q.euler_vector_deg();
        assert!((e.x - 10.0).abs() < 1e-3);
        assert!((e.y - 20.0).abs() < 1e-3);
        assert!((e.z - 30.0).abs() < 1e-3);
    }

    #[test]
    fn world_matrix_applies_scale_then_rotation_then_translation() {
        let rot = UnitQuaternion::from_euler_angles(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let m = compose_world_matrix(
            &Vector3::new(1.0, 2.0, 3.0),
            &rot,
            &Vector3::new(2.0, 1.0, 1.0),
        );
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(1.0, 4.0, 3.0)).norm() < 1e-5);
    }

    #[test]
    fn pose_validity() {
        assert!(is_valid_pose(&Isometry3::identity()));

        let mut pose = Isometry3::<f32>::identity();
        pose.translation.vector.x = f32::NAN;
        assert!(!is_valid_pose(&pose));

        let mut pose = Isometry3::<f32>::identity();
        pose.rotation = UnitQuaternion::new_unchecked(nalgebra::Quaternion::new(2.0, 0.0, 0.0, 0.0));
        assert!(!is_valid_pose(&pose));
    }
}

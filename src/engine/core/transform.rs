use crate::utils::{QuaternionEuler, compose_world_matrix};
use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};

/// The logical transform of an [`Entity`](crate::core::Entity).
///
/// Euler angles are derived from the quaternion and kept in sync by every
/// setter, so readers never see the two disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTransform {
    pos: Vector3<f32>,
    rot: UnitQuaternion<f32>,
    euler_deg: Vector3<f32>,
    scale: Vector3<f32>,
    velocity: Vector3<f32>,
}

impl Default for EntityTransform {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}

impl EntityTransform {
    /// A transform at `pos` with no rotation and a uniform scale of `1.0`.
    pub fn at(pos: Vector3<f32>) -> Self {
        EntityTransform {
            pos,
            rot: UnitQuaternion::identity(),
            euler_deg: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            velocity: Vector3::zeros(),
        }
    }

    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        self.pos
    }

    #[inline(always)]
    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.set_position_vec(Vector3::new(x, y, z))
    }

    pub fn set_position_vec(&mut self, pos: Vector3<f32>) {
        self.pos = pos;
    }

    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rot
    }

    pub fn set_rotation(&mut self, rot: UnitQuaternion<f32>) {
        self.rot = rot;
        self.euler_deg = rot.euler_vector_deg();
    }

    /// Roll, pitch and yaw in degrees.
    #[inline]
    pub fn euler_angles_deg(&self) -> Vector3<f32> {
        self.euler_deg
    }

    pub fn set_euler_angles_deg(&mut self, roll: f32, pitch: f32, yaw: f32) {
        self.set_rotation(UnitQuaternion::from_euler_angles_deg(roll, pitch, yaw));
    }

    #[inline]
    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_uniform_scale(&mut self, factor: f32) {
        self.set_scale(Vector3::new(factor, factor, factor));
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
    }

    #[inline]
    pub fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vector3<f32>) {
        self.velocity = velocity;
    }

    /// Position and rotation as a rigid pose.
    pub fn pose(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.pos), self.rot)
    }

    /// Takes position and rotation from a solver pose.
    pub fn set_pose(&mut self, pose: &Isometry3<f32>) {
        self.pos = pose.translation.vector;
        self.set_rotation(pose.rotation);
    }

    pub fn world_matrix(&self) -> Matrix4<f32> {
        compose_world_matrix(&self.pos, &self.rot, &self.scale)
    }
}

use glam::{Mat4, Vec3};

/// World-space unit direction of the ray through a screen point.
///
/// `x` and `y` are normalized screen coordinates in `[0, 1]` with the origin
/// at the top-left corner. Only the rotation part of `view` matters; the ray
/// starts at the camera position.
pub fn world_pick_ray(x: f32, y: f32, proj: &Mat4, view: &Mat4) -> Vec3 {
    let vx = (x * 2.0 - 1.0) / proj.x_axis.x;
    let vy = (y * 2.0 - 1.0) / proj.y_axis.y;
    let dir = Vec3::new(vx, -vy, 1.0);
    view.inverse().transform_vector3(dir).normalize()
}

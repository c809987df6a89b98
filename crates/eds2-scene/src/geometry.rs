// SPDX-License-Identifier: CEPL-1.0
//! Procedural meshes for the built-in test scene.

use eds2_math::Vec3;
use eds2_render::MeshData;

/// (normal, u, v) with `u × v = normal`, so each quad winds counter-clockwise
/// seen from outside.
const CUBE_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y, Vec3::Z),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::Z, Vec3::X),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y, Vec3::X),
];

/// Unit cube centred on the origin, one flat normal per face.
pub fn cube(name: impl Into<String>) -> MeshData {
    let mut mesh = MeshData {
        name: name.into(),
        ..Default::default()
    };

    for (normal, u, v) in CUBE_FACES {
        let base = mesh.positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (normal + u * su + v * sv) * 0.5;
            mesh.positions.push(p.to_array());
            mesh.normals.push(normal.to_array());
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

const ICOSAHEDRON_FACES: [[u32; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Icosahedron inscribed in the unit sphere. Normals point radially so a
/// Phong tessellation pass pulls new vertices out towards the sphere.
pub fn icosahedron(name: impl Into<String>) -> MeshData {
    let t = (1.0 + 5.0_f32.sqrt()) * 0.5;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];

    let unit: Vec<[f32; 3]> = corners.iter().map(|c| c.normalize().to_array()).collect();
    MeshData {
        name: name.into(),
        positions: unit.clone(),
        normals: unit,
        indices: ICOSAHEDRON_FACES.iter().flatten().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face_normal(mesh: &MeshData, tri: &[u32]) -> Vec3 {
        let p = |i: u32| Vec3::from_array(mesh.positions[i as usize]);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    #[test]
    fn cube_has_six_outward_quads() {
        let mesh = cube("Cube");
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(mesh.normals.len(), mesh.positions.len());

        for tri in mesh.indices.chunks(3) {
            let n = Vec3::from_array(mesh.normals[tri[0] as usize]);
            assert!(face_normal(&mesh, tri).dot(n) > 0.0);
        }
        for p in &mesh.positions {
            assert!(p.iter().all(|c| c.abs() == 0.5));
        }
    }

    #[test]
    fn icosahedron_sits_on_unit_sphere() {
        let mesh = icosahedron("Suzanne");
        assert_eq!(mesh.name, "Suzanne");
        assert_eq!(mesh.vertex_count(), 12);
        assert_eq!(mesh.index_count(), 60);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        for p in &mesh.positions {
            assert_relative_eq!(Vec3::from_array(*p).length(), 1.0, epsilon = 1e-6);
        }
        for tri in mesh.indices.chunks(3) {
            let centre = Vec3::from_array(mesh.positions[tri[0] as usize]);
            assert!(face_normal(&mesh, tri).dot(centre) > 0.0);
        }
    }
}

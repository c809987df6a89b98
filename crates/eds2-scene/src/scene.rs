// SPDX-License-Identifier: CEPL-1.0
use crate::{
    geometry,
    material::{Material, PbrMaterial},
    partition::TESSELLATED_MESH_NAME,
    Result, SceneError,
};
use eds2_math::{Mat4, Transform, Vec3, Vec4};
use eds2_render::{DrawIndexed, MeshData, MeshId};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Named transform. The sample has no hierarchy, so the local transform is
/// also the world transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
}

/// Geometry plus material for one drawable.
#[derive(Clone, Debug)]
pub struct SubMesh {
    pub mesh: MeshId,
    pub index_count: u32,
    pub material: Arc<dyn Material>,
}

impl SubMesh {
    pub fn draw(&self) -> DrawIndexed {
        DrawIndexed {
            mesh: self.mesh,
            index_count: self.index_count,
        }
    }
}

/// One drawable object: carries the mesh name used for partitioning.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub node: NodeId,
    pub sub_mesh: SubMesh,
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Node>,
    meshes: Vec<MeshData>,
    elements: Vec<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_node(&mut self, name: impl Into<String>, transform: Transform) -> NodeId {
        self.nodes.push(Node {
            name: name.into(),
            transform,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Attach `mesh` to `node` as a drawable. Elements keep insertion order.
    pub fn add_element(
        &mut self,
        node: NodeId,
        mesh: MeshId,
        material: Arc<dyn Material>,
    ) -> Result<()> {
        self.node(node)?;
        let data = self.meshes.get(mesh.0).ok_or(SceneError::UnknownMesh(mesh.0))?;
        self.elements.push(SceneNode {
            name: data.name.clone(),
            node,
            sub_mesh: SubMesh {
                mesh,
                index_count: data.index_count(),
                material,
            },
        });
        Ok(())
    }

    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    pub fn elements(&self) -> &[SceneNode] {
        &self.elements
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(SceneError::UnknownNode(id.0))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(SceneError::UnknownNode(id.0))
    }

    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4> {
        Ok(self.node(id)?.transform.world_matrix())
    }

    /// First element of `bucket` whose transform node is called `name`.
    pub fn find_node(&self, bucket: &[SceneNode], name: &str) -> Result<NodeId> {
        for element in bucket {
            if self.node(element.node)?.name == name {
                return Ok(element.node);
            }
        }
        Err(SceneError::NodeNotFound(name.to_owned()))
    }
}

fn material(name: &str, rgba: [f32; 4]) -> Arc<dyn Material> {
    Arc::new(PbrMaterial::new(name, Vec4::from_array(rgba)))
}

/// Built-in scene: a ground slab, two coplanar plates that z-fight until one
/// of them gets depth bias, a few cubes and a tessellated sphere.
pub fn test_scene() -> Scene {
    let mut scene = Scene::new();
    let cube = scene.add_mesh(geometry::cube("Cube"));
    let plate = scene.add_mesh(geometry::cube("Plate"));
    let ground = scene.add_mesh(geometry::cube("Ground"));
    let sphere = scene.add_mesh(geometry::icosahedron(TESSELLATED_MESH_NAME));

    let plate_shape = Transform::from_translation(Vec3::new(-2.5, 0.5, 0.0))
        .with_scale(Vec3::new(2.0, 2.0, 0.05));

    let layout = [
        (
            "ground",
            ground,
            Transform::from_translation(Vec3::new(0.0, -1.1, 0.0))
                .with_scale(Vec3::new(10.0, 0.2, 10.0)),
            material("concrete", [0.45, 0.45, 0.45, 1.0]),
        ),
        ("z_fight_1", plate, plate_shape, material("red", [0.9, 0.1, 0.1, 1.0])),
        ("z_fight_2", plate, plate_shape, material("green", [0.1, 0.8, 0.2, 1.0])),
        (
            "cube_1",
            cube,
            Transform::from_translation(Vec3::new(2.5, 0.0, 0.0)),
            material("blue", [0.15, 0.3, 0.9, 1.0]),
        ),
        (
            "cube_2",
            cube,
            Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            material("yellow", [0.95, 0.85, 0.1, 1.0]),
        ),
        (
            "cube_3",
            cube,
            Transform::from_translation(Vec3::new(0.0, 0.0, -3.0)),
            material("purple", [0.6, 0.2, 0.8, 1.0]),
        ),
        (
            "suzanne",
            sphere,
            Transform::from_translation(Vec3::new(0.0, 1.5, 0.0)).with_scale(Vec3::splat(1.2)),
            material("orange", [1.0, 0.55, 0.1, 1.0]),
        ),
    ];

    for (name, mesh, transform, material) in layout {
        let node = scene.add_node(name, transform);
        // ids come straight from add_mesh/add_node above
        if let Err(err) = scene.add_element(node, mesh, material) {
            tracing::error!(%err, "test scene element rejected");
        }
    }
    scene
}

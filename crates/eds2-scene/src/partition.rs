// SPDX-License-Identifier: CEPL-1.0
use crate::scene::SceneNode;
use eds2_render::PipelineKind;

/// Mesh name routed to the tessellation pipeline.
pub const TESSELLATED_MESH_NAME: &str = "Suzanne";

/// Scene elements split per pipeline. Membership is fixed once built.
#[derive(Clone, Debug, Default)]
pub struct Buckets {
    pub baseline: Vec<SceneNode>,
    pub tessellated: Vec<SceneNode>,
}

impl Buckets {
    pub fn len(&self) -> usize {
        self.baseline.len() + self.tessellated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, kind: PipelineKind) -> &[SceneNode] {
        match kind {
            PipelineKind::Baseline => &self.baseline,
            PipelineKind::Tessellation => &self.tessellated,
        }
    }

    /// Baseline objects, then tessellated ones.
    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        self.baseline.iter().chain(&self.tessellated)
    }
}

/// Stable split: each node lands in exactly one bucket, keeping its relative
/// order.
pub fn partition<I, F>(nodes: I, mut is_tessellated: F) -> Buckets
where
    I: IntoIterator<Item = SceneNode>,
    F: FnMut(&SceneNode) -> bool,
{
    let mut buckets = Buckets::default();
    for node in nodes {
        if is_tessellated(&node) {
            buckets.tessellated.push(node);
        } else {
            buckets.baseline.push(node);
        }
    }
    buckets
}

/// Exact name match, case-sensitive.
pub fn partition_by_name<I>(nodes: I, tessellated_name: &str) -> Buckets
where
    I: IntoIterator<Item = SceneNode>,
{
    partition(nodes, |node| node.name == tessellated_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::element;

    fn names(nodes: &[SceneNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn empty_input_gives_empty_buckets() {
        let buckets = partition_by_name(Vec::new(), TESSELLATED_MESH_NAME);
        assert!(buckets.is_empty());
        assert!(buckets.baseline.is_empty() && buckets.tessellated.is_empty());
    }

    #[test]
    fn exact_name_match_only() {
        let input = ["suzanne", "Suzanne", "Suzanne.001", "Cube", "Suzanne"]
            .into_iter()
            .enumerate()
            .map(|(i, n)| element(n, i));
        let buckets = partition_by_name(input, TESSELLATED_MESH_NAME);
        assert_eq!(names(&buckets.baseline), ["suzanne", "Suzanne.001", "Cube"]);
        assert_eq!(names(&buckets.tessellated), ["Suzanne", "Suzanne"]);
        assert_eq!(buckets.get(PipelineKind::Tessellation).len(), 2);
    }

    #[test]
    fn total_disjoint_and_order_preserving() {
        const POOL: [&str; 3] = ["Suzanne", "Cube", "Plane"];
        // every name sequence of length 0..=5 over the pool
        for len in 0..=5u32 {
            for code in 0..POOL.len().pow(len) {
                let mut c = code;
                let input: Vec<SceneNode> = (0..len as usize)
                    .map(|i| {
                        let name = POOL[c % POOL.len()];
                        c /= POOL.len();
                        element(name, i)
                    })
                    .collect();

                let buckets = partition_by_name(input.clone(), TESSELLATED_MESH_NAME);
                assert_eq!(buckets.len(), input.len());

                let mut seen: Vec<usize> = buckets.iter().map(|n| n.node.0).collect();
                for bucket in [&buckets.baseline, &buckets.tessellated] {
                    let ids: Vec<usize> = bucket.iter().map(|n| n.node.0).collect();
                    assert!(ids.windows(2).all(|w| w[0] < w[1]), "order kept");
                }
                seen.sort_unstable();
                seen.dedup();
                assert_eq!(seen.len(), input.len(), "each node exactly once");

                assert!(buckets.tessellated.iter().all(|n| n.name == "Suzanne"));
                assert!(buckets.baseline.iter().all(|n| n.name != "Suzanne"));
            }
        }
    }
}

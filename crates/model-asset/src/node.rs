use glam::{Mat4, Vec4Swizzles};
use log::{trace, warn};

use crate::{mesh::Geometry, scene::ImportedScene, skin::Skeleton};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeVisit {
    pub node: usize,
    /// Product of all local transforms from the root down to this node.
    pub global_transform: Mat4,
}

/// Walk the node tree depth first, children in order, accumulating
/// transforms root to leaf. Nodes reachable more than once are visited
/// only the first time.
pub fn flatten_hierarchy(scene: &ImportedScene) -> Vec<NodeVisit> {
    let mut visited = vec![false; scene.nodes.len()];
    let mut visits = Vec::with_capacity(scene.nodes.len());
    let mut stack = vec![(scene.root, Mat4::IDENTITY)];

    while let Some((index, parent_transform)) = stack.pop() {
        if std::mem::replace(&mut visited[index], true) {
            warn!("Node {:?} is reachable more than once, skipping", scene.nodes[index].name);
            continue;
        }
        let node = &scene.nodes[index];
        trace!("Processing node {:?}", node.name);
        let global_transform = parent_transform * node.transform;
        visits.push(NodeVisit {
            node: index,
            global_transform,
        });
        stack.extend(node.children.iter().rev().map(|child| (*child, global_transform)));
    }
    visits
}

/// Move static geometry into model space. Normals and tangents go through
/// the inverse transpose and are not renormalized.
pub fn bake_transform(geometry: &mut Geometry, transform: Mat4) {
    if transform == Mat4::IDENTITY {
        return;
    }
    trace!("Applying transformation to a mesh.");

    let normal_matrix = transform.transpose().inverse();
    for position in &mut geometry.positions {
        *position = transform.transform_point3(*position);
    }
    for normal in &mut geometry.normals {
        *normal = (normal_matrix * normal.extend(0.0)).xyz();
    }
    for tangent in &mut geometry.tangents {
        *tangent = (normal_matrix * tangent.extend(0.0)).xyz();
    }
}

/// Fill in parents and rest transforms of `skeleton` from the node tree.
/// A bone's parent is its nearest ancestor node that is also a bone; the
/// first node carrying a bone's name wins.
pub fn resolve_bone_hierarchy(scene: &ImportedScene, skeleton: &mut Skeleton) {
    let mut resolved = vec![false; skeleton.bone_count()];
    let mut visited = vec![false; scene.nodes.len()];
    let mut stack: Vec<(usize, Option<usize>)> = vec![(scene.root, None)];

    while let Some((index, parent_bone)) = stack.pop() {
        if std::mem::replace(&mut visited[index], true) {
            continue;
        }
        let node = &scene.nodes[index];
        let nearest_bone = match skeleton.bone_id(&node.name) {
            Some(bone) if !resolved[bone] => {
                resolved[bone] = true;
                skeleton.parents[bone] = parent_bone;
                skeleton.node_transforms[bone] = node.transform;
                Some(bone)
            }
            Some(bone) => {
                warn!("Bone {:?} names more than one node", node.name);
                Some(bone)
            }
            None => parent_bone,
        };
        stack.extend(node.children.iter().rev().map(|child| (*child, nearest_bone)));
    }

    for (name, bone) in &skeleton.bone_map {
        if !resolved[*bone] {
            warn!("Bone {:?} has no node in the hierarchy", name);
        }
    }
}

#[cfg(test)]
mod test {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::{scene::ImportedNode, skin::SkeletonBuilder};

    fn translated(name: &str, offset: Vec3) -> ImportedNode {
        ImportedNode::new(name, Mat4::from_translation(offset))
    }

    #[test]
    fn test_transforms_accumulate_in_preorder() {
        let mut scene = ImportedScene::new("root");
        let a = scene.add_node(0, translated("a", Vec3::X));
        let b = scene.add_node(a, translated("b", Vec3::Y));
        let c = scene.add_node(0, translated("c", Vec3::Z));

        let visits = flatten_hierarchy(&scene);
        let order: Vec<usize> = visits.iter().map(|visit| visit.node).collect();
        assert_eq!(order, vec![0, a, b, c]);
        assert_eq!(
            visits[2].global_transform,
            Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0))
        );
        assert_eq!(visits[3].global_transform, Mat4::from_translation(Vec3::Z));
    }

    #[test]
    fn test_bake_transform() {
        let mut geometry = Geometry {
            positions: vec![Vec3::X],
            normals: vec![Vec3::X],
            tangents: vec![Vec3::Y],
            ..Default::default()
        };
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 0.0, 5.0),
        );
        bake_transform(&mut geometry, transform);
        assert_eq!(geometry.positions[0], Vec3::new(2.0, 0.0, 5.0));
        // Normals scale by the inverse and ignore translation.
        assert!(geometry.normals[0].abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        assert!(geometry.tangents[0].abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_bone_parents_skip_plain_nodes() {
        let mut scene = ImportedScene::new("root");
        let armature = scene.add_node(0, translated("armature", Vec3::X));
        let hip = scene.add_node(armature, translated("hip", Vec3::Y));
        let helper = scene.add_node(hip, translated("helper", Vec3::Z));
        scene.add_node(helper, translated("leg", Vec3::NEG_Y));

        let mut builder = SkeletonBuilder::default();
        builder.bone_id("leg", Mat4::IDENTITY);
        builder.bone_id("hip", Mat4::IDENTITY);
        let mut skeleton = builder.build(Mat4::IDENTITY);
        resolve_bone_hierarchy(&scene, &mut skeleton);

        let leg = skeleton.bone_id("leg").unwrap();
        let hip = skeleton.bone_id("hip").unwrap();
        assert_eq!(skeleton.parents[hip], None);
        assert_eq!(skeleton.parents[leg], Some(hip));
        assert_eq!(skeleton.node_transforms[leg], Mat4::from_translation(Vec3::NEG_Y));
        assert_eq!(skeleton.node_transforms[hip], Mat4::from_translation(Vec3::Y));
    }

    #[test]
    fn test_duplicate_bone_names_do_not_form_cycles() {
        let mut scene = ImportedScene::new("root");
        let x = scene.add_node(0, translated("x", Vec3::X));
        let y = scene.add_node(x, translated("y", Vec3::X));
        scene.add_node(y, translated("x", Vec3::X));

        let mut builder = SkeletonBuilder::default();
        builder.bone_id("x", Mat4::IDENTITY);
        builder.bone_id("y", Mat4::IDENTITY);
        let mut skeleton = builder.build(Mat4::IDENTITY);
        resolve_bone_hierarchy(&scene, &mut skeleton);

        for bone in 0..skeleton.bone_count() {
            assert!(skeleton.depth(bone).is_some());
        }
    }
}

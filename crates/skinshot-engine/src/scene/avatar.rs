//! The humanoid avatar, composed per view mode.

use glam::Vec3;
use skinshot_proto::RenderMode;

use super::{AlphaMode, Cube, Plane, Stage, TextureType, Transform};
use crate::skin::BodyModel;

const TILT: f32 = -10.0;
const ANGLE: f32 = 20.0;

/// Which parts of the avatar a mode shows.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Framing {
    /// Whole body standing on its shadow.
    Full,
    /// Head, torso and arms.
    Bust,
    /// Head and helm only.
    Head,
}

/// Builds the scene for `mode`, or `None` for the flat modes.
///
/// The 3D modes share one composition; they differ in which parts are present
/// and how the root stage frames them. Member order is draw order.
pub fn avatar_scene(mode: RenderMode, model: BodyModel) -> Option<Stage> {
    let (framing, turned) = match mode {
        RenderMode::Face | RenderMode::Skin => return None,
        RenderMode::Full => (Framing::Full, true),
        RenderMode::FrontFull => (Framing::Full, false),
        RenderMode::Bust => (Framing::Bust, true),
        RenderMode::Front => (Framing::Bust, false),
        RenderMode::Head => (Framing::Head, true),
    };

    let position = match framing {
        Framing::Full => Vec3::new(0.0, -2.8, -10.35),
        Framing::Bust => Vec3::new(0.0, -1.2, -5.55),
        Framing::Head => Vec3::new(0.0, 0.0, -4.2),
    };
    let rotation = if turned {
        Vec3::new(TILT, ANGLE, 0.0)
    } else {
        Vec3::ZERO
    };

    let mut stage = Stage::new(Transform { position, rotation, ..Default::default() });
    let with_body = framing != Framing::Head;
    let with_legs = framing == Framing::Full;

    if with_legs {
        stage.push(
            Plane::new(TextureType::Shadow, AlphaMode::Full)
                .at(0.0, 7.0, 0.0)
                .scaled(1.85, 1.0, 0.85)
                .unlit(),
        );
    }

    if with_body {
        let [base, overlay] = left_arm(model);
        stage.push(base);
        stage.push(overlay);
    }

    if with_legs {
        stage.push(limb(TextureType::LLeg, AlphaMode::None).at(0.5, 5.425, 0.0));
        stage.push(limb(TextureType::RLeg, AlphaMode::None).at(-0.5, 5.425, 0.0));
    }

    if with_body {
        stage.push(
            Cube::new(TextureType::Body, AlphaMode::None)
                .at(0.0, 2.475, 0.0)
                .scaled(1.0, 1.5, 0.5),
        );
        stage.push(
            Cube::new(TextureType::Body2, AlphaMode::Mask)
                .at(0.0, 2.5, 0.0)
                .scaled(1.05, 1.55, 0.55),
        );
    }

    if with_legs {
        stage.push(limb(TextureType::LLeg2, AlphaMode::Mask).at(0.475, 5.4, 0.0).scaled(0.55, 1.55, 0.55));
        stage.push(limb(TextureType::RLeg2, AlphaMode::Mask).at(-0.525, 5.4, 0.0).scaled(0.55, 1.55, 0.55));
    }

    stage.push(Cube::new(TextureType::Head, AlphaMode::None).at(0.0, -0.025, -0.025));
    stage.push(Cube::new(TextureType::Head2, AlphaMode::Mask).scaled(1.05, 1.05, 1.05));

    if with_body {
        let [base, overlay] = right_arm(model);
        stage.push(base);
        stage.push(overlay);
    }

    Some(stage)
}

fn limb(texture: TextureType, alpha: AlphaMode) -> Cube {
    Cube::new(texture, alpha).scaled(0.5, 1.5, 0.5)
}

// Slim arms are 3 texels wide and sit 0.125 closer to the body so the inner
// edge stays where the standard arm's is.
const SLIM_BASE_WIDTH: f32 = 0.375;
const SLIM_OVERLAY_WIDTH: f32 = 0.4125;
const SLIM_INSET: f32 = 0.125;

fn left_arm(model: BodyModel) -> [Cube; 2] {
    let (base_w, overlay_w, inset) = arm_widths(model);
    [
        Cube::new(TextureType::LArm, AlphaMode::None)
            .at(1.75 - inset, 2.375, -0.1)
            .scaled(base_w, 1.5, 0.5)
            .rotated(0.0, 0.0, -10.0),
        Cube::new(TextureType::LArm2, AlphaMode::Mask)
            .at(1.7 - inset, 2.35, -0.1)
            .scaled(overlay_w, 1.55, 0.54)
            .rotated(0.0, 0.0, -10.0),
    ]
}

fn right_arm(model: BodyModel) -> [Cube; 2] {
    let (base_w, overlay_w, inset) = arm_widths(model);
    [
        Cube::new(TextureType::RArm, AlphaMode::None)
            .at(-1.75 + inset, 2.325, 0.15)
            .scaled(base_w, 1.5, 0.5)
            .rotated(0.0, 0.0, 10.0),
        Cube::new(TextureType::RArm2, AlphaMode::Mask)
            .at(-1.775 + inset, 2.3, 0.15)
            .scaled(overlay_w, 1.55, 0.55)
            .rotated(0.0, 0.0, 10.0),
    ]
}

fn arm_widths(model: BodyModel) -> (f32, f32, f32) {
    match model {
        BodyModel::Standard => (0.5, 0.55, 0.0),
        BodyModel::Slim => (SLIM_BASE_WIDTH, SLIM_OVERLAY_WIDTH, SLIM_INSET),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Node;

    fn textures(stage: &Stage) -> Vec<TextureType> {
        stage.members.iter().filter_map(Node::texture).collect()
    }

    fn cube(stage: &Stage, texture: TextureType) -> &Cube {
        stage
            .members
            .iter()
            .find_map(|n| match n {
                Node::Cube(c) if c.texture == texture => Some(c),
                _ => None,
            })
            .expect("cube")
    }

    #[test]
    fn flat_modes_have_no_scene() {
        assert!(avatar_scene(RenderMode::Face, BodyModel::Standard).is_none());
        assert!(avatar_scene(RenderMode::Skin, BodyModel::Slim).is_none());
    }

    #[test]
    fn full_scene_keeps_canonical_order() {
        use TextureType::*;
        let stage = avatar_scene(RenderMode::Full, BodyModel::Standard).unwrap();
        assert_eq!(
            textures(&stage),
            vec![Shadow, LArm, LArm2, LLeg, RLeg, Body, Body2, LLeg2, RLeg2, Head, Head2, RArm, RArm2]
        );
        assert_eq!(stage.transform.position, Vec3::new(0.0, -2.8, -10.35));
        assert_eq!(stage.transform.rotation, Vec3::new(-10.0, 20.0, 0.0));
    }

    #[test]
    fn full_scene_constants() {
        let stage = avatar_scene(RenderMode::Full, BodyModel::Standard).unwrap();

        let Node::Plane(shadow) = &stage.members[0] else { panic!("shadow first") };
        assert_eq!(shadow.transform.position.y, 7.0);
        assert_eq!(shadow.transform.scale, Vec3::new(1.85, 1.0, 0.85));
        assert!(!shadow.lit);
        assert_eq!(shadow.alpha, AlphaMode::Full);

        let rarm2 = cube(&stage, TextureType::RArm2);
        assert_eq!(rarm2.transform.position, Vec3::new(-1.775, 2.3, 0.15));
        assert_eq!(rarm2.transform.rotation.z, 10.0);
        assert_eq!(rarm2.alpha, AlphaMode::Mask);

        let larm2 = cube(&stage, TextureType::LArm2);
        assert_eq!(larm2.transform.scale, Vec3::new(0.55, 1.55, 0.54));

        let helm = cube(&stage, TextureType::Head2);
        assert_eq!(helm.transform.scale, Vec3::splat(1.05));
        assert_eq!(helm.transform.position, Vec3::ZERO);
    }

    #[test]
    fn slim_arms_are_narrower_and_closer() {
        let standard = avatar_scene(RenderMode::Full, BodyModel::Standard).unwrap();
        let slim = avatar_scene(RenderMode::Full, BodyModel::Slim).unwrap();

        let a = cube(&standard, TextureType::LArm);
        let b = cube(&slim, TextureType::LArm);
        assert_eq!(b.transform.scale.x, 0.375);
        assert!((a.transform.position.x - b.transform.position.x - 0.125).abs() < 1e-6);

        let a = cube(&standard, TextureType::RArm2);
        let b = cube(&slim, TextureType::RArm2);
        assert_eq!(b.transform.scale.x, 0.4125);
        assert!((b.transform.position.x - a.transform.position.x - 0.125).abs() < 1e-6);

        // Everything but the arms is shared.
        assert_eq!(cube(&standard, TextureType::Body), cube(&slim, TextureType::Body));
        assert_eq!(standard.members.len(), slim.members.len());
    }

    #[test]
    fn sibling_modes_pick_parts() {
        use TextureType::*;
        let head = avatar_scene(RenderMode::Head, BodyModel::Standard).unwrap();
        assert_eq!(textures(&head), vec![Head, Head2]);

        let bust = avatar_scene(RenderMode::Bust, BodyModel::Standard).unwrap();
        assert_eq!(textures(&bust), vec![LArm, LArm2, Body, Body2, Head, Head2, RArm, RArm2]);

        let front = avatar_scene(RenderMode::Front, BodyModel::Standard).unwrap();
        assert_eq!(textures(&front), textures(&bust));
        assert_eq!(front.transform.rotation, Vec3::ZERO);

        let front_full = avatar_scene(RenderMode::FrontFull, BodyModel::Standard).unwrap();
        assert_eq!(front_full.members.len(), 13);
        assert_eq!(front_full.transform.rotation, Vec3::ZERO);
    }
}

use crate::collision::broad_phase::BodySet;
use crate::collision::matrix::{body_pair, shape_pair, BodyPair, ShapePair};
use crate::constraints::Equation;
use crate::dynamics::{BodyHandle, RigidBody};
use crate::geometry::Shape;
use crate::material::{ContactMaterialTable, ContactParams, Material, MaterialHandle};
use crate::math::Vec3;

use super::{collide, Manifold, ShapePose};

/// Force cap of contact equations.
pub const CONTACT_MAX_FORCE: f64 = 1e6;

/// Everything the narrowphase reads besides the bodies themselves.
#[derive(Debug, Clone, Copy)]
pub struct PairMaterial<'a> {
    pub materials: &'a [Material],
    pub contact_materials: &'a ContactMaterialTable,
    pub default_params: ContactParams,
    /// Gravity magnitude used in the friction bound
    pub friction_gravity: f64,
}

impl PairMaterial<'_> {
    /// Contact parameters for two shapes on two bodies.
    ///
    /// Shape materials override body materials. The contact material table
    /// (or the default) supplies the parameters; friction and restitution are
    /// replaced by the product of the two materials' own values when both
    /// define one.
    pub fn resolve(&self, body_a: &RigidBody, shape_a: &Shape, body_b: &RigidBody, shape_b: &Shape) -> ContactParams {
        let ma = shape_a.material.or(body_a.material);
        let mb = shape_b.material.or(body_b.material);

        let mut params = match (ma, mb) {
            (Some(a), Some(b)) => self
                .contact_materials
                .get(a, b)
                .map_or(self.default_params, |cm| cm.params),
            _ => self.default_params,
        };

        let (Some(a), Some(b)) = (self.material(ma), self.material(mb)) else {
            return params;
        };
        if let (Some(fa), Some(fb)) = (a.friction, b.friction) {
            if fa >= 0.0 && fb >= 0.0 {
                params.friction = fa * fb;
            }
        }
        if let (Some(ra), Some(rb)) = (a.restitution, b.restitution) {
            if ra >= 0.0 && rb >= 0.0 {
                params.restitution = ra * rb;
            }
        }
        params
    }

    fn material(&self, handle: Option<MaterialHandle>) -> Option<&Material> {
        handle.and_then(|h| self.materials.get(h.0 as usize))
    }
}

/// Turns broadphase pairs into contact and friction equations.
///
/// The equation vectors are cleared, not freed, at the start of every step so
/// their storage is reused.
#[derive(Debug, Default)]
pub struct Narrowphase {
    pub contacts: Vec<Equation>,
    pub frictions: Vec<Equation>,
    /// Merge the friction of each shape pair into one averaged pair of equations
    pub enable_friction_reduction: bool,
    /// Body pairs whose shapes touched this step, including non-responding ones
    pub body_overlaps: Vec<BodyPair>,
    pub shape_overlaps: Vec<ShapePair>,
    manifold: Manifold,
}

impl Narrowphase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
        self.frictions.clear();
        self.body_overlaps.clear();
        self.shape_overlaps.clear();
        self.manifold.clear();
    }

    /// Runs every shape pair of every body pair for a step of length `dt`.
    pub fn get_contacts(
        &mut self,
        pairs: &[(BodyHandle, BodyHandle)],
        bodies: &BodySet,
        materials: &PairMaterial,
        dt: f64,
    ) {
        self.clear();

        for &(ha, hb) in pairs {
            let (Some(a), Some(b)) = (bodies.get(ha), bodies.get(hb)) else {
                continue;
            };

            let pair_just_test = !(a.is_dynamic() || b.is_dynamic())
                || !a.collision_response
                || !b.collision_response;

            for (i, entry_a) in a.shapes().iter().enumerate() {
                let (pos_a, rot_a) = a.shape_world_pose(i);
                for (j, entry_b) in b.shapes().iter().enumerate() {
                    let (shape_a, shape_b) = (&entry_a.shape, &entry_b.shape);
                    if !shape_a.can_collide_with(shape_b) {
                        continue;
                    }

                    let (pos_b, rot_b) = b.shape_world_pose(j);
                    let reach = shape_a.bounding_sphere_radius() + shape_b.bounding_sphere_radius();
                    if pos_a.distance_squared(pos_b) > reach * reach {
                        continue;
                    }

                    let just_test =
                        pair_just_test || !shape_a.collision_response || !shape_b.collision_response;

                    self.manifold.clear();
                    let hit = collide(
                        &mut self.manifold,
                        &ShapePose::new(shape_a.geometry(), pos_a, rot_a),
                        &ShapePose::new(shape_b.geometry(), pos_b, rot_b),
                        just_test,
                    );
                    if !hit {
                        continue;
                    }

                    self.body_overlaps.push(body_pair(ha, hb));
                    self.shape_overlaps.push(shape_pair((ha, i), (hb, j)));
                    if just_test {
                        continue;
                    }

                    let params = materials.resolve(a, shape_a, b, shape_b);
                    self.add_equations(ha, a, hb, b, (i, j), params, materials.friction_gravity, dt);
                }
            }
        }

        log::trace!(
            "narrowphase: {} pairs, {} contacts, {} frictions",
            pairs.len(),
            self.contacts.len(),
            self.frictions.len()
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn add_equations(
        &mut self,
        ha: BodyHandle,
        a: &RigidBody,
        hb: BodyHandle,
        b: &RigidBody,
        shapes: (usize, usize),
        params: ContactParams,
        friction_gravity: f64,
        dt: f64,
    ) {
        let first = self.contacts.len();
        for point in &self.manifold.points {
            let mut eq = Equation::contact(
                ha,
                hb,
                point.normal,
                point.point_a - a.position,
                point.point_b - b.position,
                params.restitution,
                CONTACT_MAX_FORCE,
            );
            eq.shapes = Some(shapes);
            eq.set_spook_params(
                params.contact_equation_stiffness,
                params.contact_equation_relaxation,
                dt,
            );
            self.contacts.push(eq);
        }

        let count = self.contacts.len() - first;
        if count == 0 || params.friction <= 0.0 {
            return;
        }

        let inv_mass_sum = a.inv_mass() + b.inv_mass();
        let reduced_mass = if inv_mass_sum > 0.0 { 1.0 / inv_mass_sum } else { 0.0 };
        let slip_force = params.friction * friction_gravity * reduced_mass;

        let make = |tangent: Vec3, ri: Vec3, rj: Vec3| {
            let mut eq = Equation::friction(ha, hb, tangent, ri, rj, slip_force);
            eq.shapes = Some(shapes);
            eq.set_spook_params(
                params.friction_equation_stiffness,
                params.friction_equation_relaxation,
                dt,
            );
            eq
        };

        if self.enable_friction_reduction && count > 1 {
            let mut normal = Vec3::ZERO;
            let mut ri = Vec3::ZERO;
            let mut rj = Vec3::ZERO;
            for point in &self.manifold.points {
                normal += point.normal;
                ri += point.point_a - a.position;
                rj += point.point_b - b.position;
            }
            let inv_count = 1.0 / count as f64;
            let Some(normal) = normal.try_normalize() else {
                return;
            };
            let (t1, t2) = normal.tangents();
            self.frictions.push(make(t1, ri * inv_count, rj * inv_count));
            self.frictions.push(make(t2, ri * inv_count, rj * inv_count));
        } else {
            for point in &self.manifold.points {
                let ri = point.point_a - a.position;
                let rj = point.point_b - b.position;
                let (t1, t2) = point.normal.tangents();
                self.frictions.push(make(t1, ri, rj));
                self.frictions.push(make(t2, ri, rj));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BodyType;
    use crate::material::ContactMaterial;

    fn setup(radius: f64, height: f64) -> (BodySet, BodyHandle, BodyHandle) {
        let mut bodies = BodySet::with_key();
        let ground = bodies.insert(RigidBody::new(0.0).with_shape(Shape::plane()));
        let ball = bodies.insert(
            RigidBody::new(2.0)
                .with_shape(Shape::sphere(radius))
                .with_position(Vec3::new(0.0, height, 0.0)),
        );
        (bodies, ground, ball)
    }

    fn defaults<'a>(materials: &'a [Material], table: &'a ContactMaterialTable) -> PairMaterial<'a> {
        PairMaterial {
            materials,
            contact_materials: table,
            default_params: ContactParams::default(),
            friction_gravity: 10.0,
        }
    }

    #[test]
    fn test_contact_and_friction_equations() {
        let (bodies, ground, ball) = setup(0.5, 0.45);
        let table = ContactMaterialTable::default();
        let mut np = Narrowphase::new();
        np.get_contacts(&[(ground, ball)], &bodies, &defaults(&[], &table), 1.0 / 60.0);

        assert_eq!(np.contacts.len(), 1);
        assert_eq!(np.frictions.len(), 2);
        assert_eq!(np.contacts[0].contact_normal(), Some(Vec3::Y));
        assert_eq!(np.contacts[0].shapes, Some((0, 0)));
        // 0.3 friction, 10 gravity, reduced mass 2
        assert!((np.frictions[0].max_force - 6.0).abs() < 1e-12);
        assert_eq!(np.body_overlaps, vec![body_pair(ground, ball)]);
    }

    #[test]
    fn test_trigger_overlaps_without_equations() {
        let (mut bodies, ground, ball) = setup(0.5, 0.45);
        bodies[ball].collision_response = false;
        let table = ContactMaterialTable::default();
        let mut np = Narrowphase::new();
        np.get_contacts(&[(ground, ball)], &bodies, &defaults(&[], &table), 1.0 / 60.0);

        assert!(np.contacts.is_empty());
        assert_eq!(np.shape_overlaps.len(), 1);
    }

    #[test]
    fn test_kinematic_against_static_only_tests() {
        let (mut bodies, ground, ball) = setup(0.5, 0.45);
        bodies[ball].body_type = BodyType::Kinematic;
        let table = ContactMaterialTable::default();
        let mut np = Narrowphase::new();
        np.get_contacts(&[(ground, ball)], &bodies, &defaults(&[], &table), 1.0 / 60.0);
        assert!(np.contacts.is_empty());
        assert_eq!(np.body_overlaps.len(), 1);
    }

    #[test]
    fn test_material_resolution() {
        let (mut bodies, ground, ball) = setup(0.5, 0.45);
        let materials = vec![
            Material::new("ice").with_friction(0.1),
            Material::new("rubber").with_friction(0.9).with_restitution(0.8),
        ];
        let (ice, rubber) = (MaterialHandle(0), MaterialHandle(1));
        let mut table = ContactMaterialTable::default();
        table.insert(ContactMaterial::new(
            ice,
            rubber,
            ContactParams {
                friction: 0.5,
                restitution: 0.25,
                ..ContactParams::default()
            },
        ));
        bodies[ground].material = Some(ice);
        bodies[ball].material = Some(rubber);

        let ctx = defaults(&materials, &table);
        let params = ctx.resolve(
            &bodies[ground],
            &bodies[ground].shapes()[0].shape,
            &bodies[ball],
            &bodies[ball].shapes()[0].shape,
        );
        // Friction on both sides: product; restitution only on one: table value
        assert!((params.friction - 0.09).abs() < 1e-12);
        assert!((params.restitution - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_friction_reduction_averages() {
        let mut bodies = BodySet::with_key();
        let ground = bodies.insert(RigidBody::new(0.0).with_shape(Shape::plane()));
        let cube = bodies.insert(
            RigidBody::new(1.0)
                .with_shape(Shape::cuboid(Vec3::splat(0.5)))
                .with_position(Vec3::new(0.0, 0.49, 0.0)),
        );
        let table = ContactMaterialTable::default();
        let mut np = Narrowphase::new();
        np.enable_friction_reduction = true;
        np.get_contacts(&[(ground, cube)], &bodies, &defaults(&[], &table), 1.0 / 60.0);

        assert_eq!(np.contacts.len(), 4);
        assert_eq!(np.frictions.len(), 2);
        let crate::constraints::EquationKind::Friction { rj, .. } = np.frictions[0].kind else {
            panic!("expected friction");
        };
        // Average of the four bottom corners is the bottom face centre
        assert!(rj.almost_equals(Vec3::new(0.0, -0.5, 0.0), 1e-9));
    }
}

//! World façade (spec §4.4): owns the physics world, the class
//! registry, the contact pool, and every collider; drives `update` and
//! translates rapier2d's raw callbacks into routed, class-pair events.

use std::cell::RefCell;

use fxhash::FxHashMap;
use nalgebra::{Isometry2, Point2, Vector2};
use rapier2d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType,
};
use rapier2d::geometry::{
    ActiveEvents, ActiveHooks, ColliderBuilder, ColliderHandle, ColliderSet, CollisionEvent,
    ContactForceEvent, DefaultBroadPhase, Shape, SharedShape,
};
use rapier2d::pipeline::{
    ContactModificationContext, PairFilterContext, PhysicsHooks, PhysicsPipeline, QueryFilter,
    QueryPipeline, SolverFlags,
};

use crate::class::{ClassRegistry, CollisionClassSpec};
use crate::collider::{
    Collider, PostSolveContext, PreSolveContext, QueuedEvent, QueuedKind, ShapeFixtures,
};
use crate::contact::{ContactPool, ContactSnapshot};
use crate::debug::{Color, DebugDraw, DrawMode, RecordedQuery, RecordedShape, DEFAULT_QUERY_DEBUG_FRAMES};
use crate::error::ClassError;
use crate::geometry;
use crate::ids::{decode_owner, encode_owner, ColliderId};
use crate::joint::{self, JointId, JointParams};
use crate::query::ClassFilter;
use crate::routing::{dispatch_pair, EventRoutingTable, Transition};
use crate::shape::ColliderShape;

/// The three body kinds spec §6 requires of the engine collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
    Kinematic,
}

impl From<BodyKind> for RigidBodyType {
    fn from(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Kinematic => RigidBodyType::KinematicPositionBased,
        }
    }
}

/// The crate's configuration surface (spec §6): gravity, whether bodies
/// may sleep, the meter constant, and the two mode toggles that must be
/// set before the registry is touched.
#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub gravity: Vector2<f32>,
    pub sleep_allowed: bool,
    /// Pixels per meter, purely advisory bookkeeping for callers that
    /// work in pixel space; the physics step itself is unit-agnostic.
    pub meter: f32,
    pub explicit_collision_events: bool,
    pub query_debug_drawing: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::new(0.0, 0.0),
            sleep_allowed: true,
            meter: 32.0,
            explicit_collision_events: false,
            query_debug_drawing: false,
        }
    }
}

/// Fluent builder for [`WorldConfig`], in the style of rapier2d's own
/// `RigidBodyBuilder`/`ColliderBuilder`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldConfigBuilder {
    config: WorldConfig,
}

impl WorldConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gravity(mut self, x: f32, y: f32) -> Self {
        self.config.gravity = Vector2::new(x, y);
        self
    }

    pub fn sleep_allowed(mut self, allowed: bool) -> Self {
        self.config.sleep_allowed = allowed;
        self
    }

    pub fn meter(mut self, pixels_per_meter: f32) -> Self {
        self.config.meter = pixels_per_meter;
        self
    }

    pub fn explicit_collision_events(mut self, explicit: bool) -> Self {
        self.config.explicit_collision_events = explicit;
        self
    }

    pub fn query_debug_drawing(mut self, enabled: bool) -> Self {
        self.config.query_debug_drawing = enabled;
        self
    }

    pub fn build(self) -> WorldConfig {
        self.config
    }
}

/// Collects rapier2d's collision events during one `update`, drained
/// and translated into routed events right after the step.
#[derive(Default)]
struct CollectingEventHandler {
    collisions: RefCell<Vec<CollisionEvent>>,
}

impl rapier2d::pipeline::EventHandler for CollectingEventHandler {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&rapier2d::geometry::ContactPair>,
    ) {
        self.collisions.borrow_mut().push(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &rapier2d::geometry::ContactPair,
        _event: ContactForceEvent,
    ) {
    }
}

/// Hooks wired into `pipeline.step` for the `preSolve` callback (spec
/// §4.5/§9 open question 3): runs mid-solve, the one point in the step
/// where suppressing the contact is still possible.
struct SolveHooks<'a> {
    facades: &'a RefCell<FxHashMap<ColliderId, Collider>>,
    routing: &'a EventRoutingTable,
}

impl PhysicsHooks for SolveHooks<'_> {
    fn filter_contact_pair(&self, _context: &PairFilterContext) -> Option<SolverFlags> {
        Some(SolverFlags::COMPUTE_IMPULSES)
    }

    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let Some(owner1) = context
            .colliders
            .get(context.collider1)
            .map(|c| decode_owner(c.user_data))
        else {
            return;
        };
        let Some(owner2) = context
            .colliders
            .get(context.collider2)
            .map(|c| decode_owner(c.user_data))
        else {
            return;
        };

        let classes = {
            let facades = self.facades.borrow();
            let Some(c1) = facades.get(&owner1) else {
                return;
            };
            let Some(c2) = facades.get(&owner2) else {
                return;
            };
            (c1.class_index, c2.class_index)
        };

        let dispatches = dispatch_pair(
            self.routing,
            classes.0,
            classes.1,
            false,
            true,
            Transition::Pre,
            owner1,
            owner2,
        );
        if dispatches.is_empty() {
            return;
        }

        let mut disable = false;
        {
            let mut facades = self.facades.borrow_mut();
            for (target, peer) in dispatches {
                let Some(collider) = facades.get_mut(&target) else {
                    continue;
                };
                if let Some(mut cb) = collider.pre_solve.take() {
                    let mut ctx = PreSolveContext::new(peer, *context.normal, &mut disable);
                    cb(target, &mut ctx);
                    collider.pre_solve = Some(cb);
                }
            }
        }

        if disable {
            context.solver_contacts.clear();
        }
    }
}

/// Owns the physics engine, the class registry, and every collider.
/// See spec §4.4 for the full public surface; see the crate root for
/// the single-threaded scheduling contract this type assumes.
pub struct World {
    config: WorldConfig,
    pipeline: PhysicsPipeline,
    broad_phase: DefaultBroadPhase,
    narrow_phase: rapier2d::geometry::NarrowPhase,
    islands: IslandManager,
    ccd_solver: CCDSolver,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    query_pipeline: QueryPipeline,
    classes: ClassRegistry,
    routing: EventRoutingTable,
    pool: ContactPool,
    facades: RefCell<FxHashMap<ColliderId, Collider>>,
    recorded_queries: RefCell<Vec<RecordedQuery>>,
}

impl World {
    /// Creates the physics world, installs the default class, and
    /// applies `config` (spec §4.4 `new(gx, gy, sleepAllowed)`, extended
    /// per SPEC_FULL with the rest of the configuration surface).
    pub fn new(config: WorldConfig) -> Self {
        let mut classes = ClassRegistry::new();
        classes
            .set_explicit_collision_events(config.explicit_collision_events)
            .expect("explicit event mode must be set before any class exists");
        classes.add_bootstrap_class("Default");

        let mut routing = EventRoutingTable::default();
        routing.rebuild(&classes);

        Self {
            config,
            pipeline: PhysicsPipeline::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: rapier2d::geometry::NarrowPhase::new(),
            islands: IslandManager::new(),
            ccd_solver: CCDSolver::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            query_pipeline: QueryPipeline::new(),
            classes,
            routing,
            pool: ContactPool::new(),
            facades: RefCell::new(FxHashMap::default()),
            recorded_queries: RefCell::new(Vec::new()),
        }
    }

    /// Pixels-per-meter constant from the configuration surface.
    pub fn meter(&self) -> f32 {
        self.config.meter
    }

    /// The registered collision classes, in registration order.
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// A collider's body position (spec §6 Body `getPosition`). `None` if
    /// `id` has already been destroyed.
    pub fn position(&self, id: ColliderId) -> Option<Isometry2<f32>> {
        self.bodies.get(id.body_handle()).map(|b| *b.position())
    }

    /// Enables or disables drawing of recorded query shapes in `draw`.
    pub fn set_query_debug_drawing(&mut self, enabled: bool) {
        self.config.query_debug_drawing = enabled;
    }

    /// Switches implicit/explicit event generation mode. Forbidden once
    /// any user collision class has been added (spec §4.4).
    pub fn set_explicit_collision_events(&mut self, explicit: bool) -> Result<(), ClassError> {
        self.classes.set_explicit_collision_events(explicit)?;
        self.routing.rebuild(&self.classes);
        Ok(())
    }

    /// Registers one collision class, recompiling the ignore graph and
    /// reapplying category/mask to every existing fixture (spec §4.4).
    pub fn add_collision_class(
        &mut self,
        name: impl Into<String>,
        spec: CollisionClassSpec,
    ) -> Result<(), ClassError> {
        let name = name.into();
        match self.classes.add_collision_class(name.clone(), spec) {
            Ok(()) => {
                log::info!("registered collision class '{name}'");
                self.after_registry_change();
                Ok(())
            }
            Err(err) => {
                log::warn!("add_collision_class('{name}') failed: {err}");
                Err(err)
            }
        }
    }

    /// Registers many collision classes at once (spec §4.4
    /// `addCollisionClassTable`).
    pub fn add_collision_class_table(
        &mut self,
        table: impl IntoIterator<Item = (String, CollisionClassSpec)>,
    ) -> Result<(), ClassError> {
        self.classes.add_collision_class_table(table)?;
        self.after_registry_change();
        Ok(())
    }

    fn after_registry_change(&mut self) {
        self.routing.rebuild(&self.classes);
        self.reapply_filters();
    }

    fn reapply_filters(&mut self) {
        let facades = self.facades.borrow();
        for collider in facades.values() {
            let class = self.classes.get(collider.class_index);
            for fixtures in collider.shapes.values() {
                if let Some(solid) = self.colliders.get_mut(fixtures.solid) {
                    solid.set_collision_groups(class.interaction_groups());
                }
                if let Some(sensor) = self.colliders.get_mut(fixtures.sensor) {
                    sensor.set_collision_groups(class.sensor_interaction_groups());
                }
            }
        }
    }

    /// Borrows a collider façade by id.
    pub fn collider(&self, id: ColliderId) -> Option<std::cell::Ref<'_, Collider>> {
        std::cell::Ref::filter_map(self.facades.borrow(), |m| m.get(&id)).ok()
    }

    /// Mutably borrows a collider façade by id. Takes `&self`: the
    /// façade table uses interior mutability so the mid-solve hooks can
    /// reach into it during `update` without a `&mut World` in scope.
    pub fn collider_mut(&self, id: ColliderId) -> Option<std::cell::RefMut<'_, Collider>> {
        std::cell::RefMut::filter_map(self.facades.borrow_mut(), |m| m.get_mut(&id)).ok()
    }

    /// Reassigns a collider's class, rejecting unknown names (spec §4.5
    /// `setCollisionClass`).
    pub fn set_collision_class(
        &mut self,
        id: ColliderId,
        name: &str,
    ) -> Result<(), ClassError> {
        let Some(index) = self.classes.index_of(name) else {
            return Err(ClassError::UnknownClass {
                name: name.to_string(),
            });
        };
        let class = self.classes.get(index).interaction_groups();
        let sensor_class = self.classes.get(index).sensor_interaction_groups();

        let mut facades = self.facades.borrow_mut();
        let Some(collider) = facades.get_mut(&id) else {
            return Ok(());
        };
        collider.class_index = index;
        for fixtures in collider.shapes.values() {
            if let Some(solid) = self.colliders.get_mut(fixtures.solid) {
                solid.set_collision_groups(class);
            }
            if let Some(sensor) = self.colliders.get_mut(fixtures.sensor) {
                sensor.set_collision_groups(sensor_class);
            }
        }
        Ok(())
    }

    fn spawn_body(&mut self, x: f32, y: f32, kind: BodyKind) -> RigidBodyHandle {
        let body = RigidBodyBuilder::new(kind.into())
            .translation(Vector2::new(x, y))
            .can_sleep(self.config.sleep_allowed)
            .build();
        self.bodies.insert(body)
    }

    fn build_fixtures(
        &mut self,
        body: RigidBodyHandle,
        owner: ColliderId,
        class_index: usize,
        shape: &ColliderShape,
    ) -> ShapeFixtures {
        let class = self.classes.get(class_index);
        let native = shape.to_shared_shape();

        let mut solid = ColliderBuilder::new(native.clone())
            .collision_groups(class.interaction_groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .build();
        solid.user_data = encode_owner(owner.body_handle());
        let solid_handle = self.colliders.insert_with_parent(solid, body, &mut self.bodies);

        let mut sensor = ColliderBuilder::new(native)
            .sensor(true)
            .collision_groups(class.sensor_interaction_groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        sensor.user_data = encode_owner(owner.body_handle());
        let sensor_handle = self
            .colliders
            .insert_with_parent(sensor, body, &mut self.bodies);

        ShapeFixtures {
            shape: shape.clone(),
            solid: solid_handle,
            sensor: sensor_handle,
        }
    }

    fn new_collider_with_shape(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        kind: BodyKind,
        shape: ColliderShape,
    ) -> Result<ColliderId, ClassError> {
        let Some(class_index) = self.classes.index_of(class_name) else {
            return Err(ClassError::UnknownClass {
                name: class_name.to_string(),
            });
        };
        let body = self.spawn_body(x, y, kind);
        let id = ColliderId::from_body(body);
        let mut collider = Collider::new(id, class_index);
        let fixtures = self.build_fixtures(body, id, class_index, &shape);
        collider.shapes.insert("main".to_string(), fixtures);
        self.facades.borrow_mut().insert(id, collider);
        Ok(id)
    }

    pub fn new_circle_collider(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        radius: f32,
        kind: BodyKind,
    ) -> Result<ColliderId, ClassError> {
        self.new_collider_with_shape(class_name, x, y, kind, ColliderShape::Circle { radius })
    }

    pub fn new_rectangle_collider(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        kind: BodyKind,
    ) -> Result<ColliderId, ClassError> {
        self.new_collider_with_shape(
            class_name,
            x,
            y,
            kind,
            ColliderShape::Rectangle { width, height },
        )
    }

    pub fn new_bsg_rectangle_collider(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        cut: f32,
        kind: BodyKind,
    ) -> Result<ColliderId, ClassError> {
        self.new_collider_with_shape(
            class_name,
            x,
            y,
            kind,
            ColliderShape::BsgRectangle { width, height, cut },
        )
    }

    pub fn new_polygon_collider(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        vertices: Vec<Point2<f32>>,
        kind: BodyKind,
    ) -> Result<ColliderId, ClassError> {
        self.new_collider_with_shape(class_name, x, y, kind, ColliderShape::Polygon { vertices })
    }

    pub fn new_line_collider(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        kind: BodyKind,
    ) -> Result<ColliderId, ClassError> {
        self.new_collider_with_shape(
            class_name,
            x,
            y,
            kind,
            ColliderShape::Line {
                start: Point2::new(x1, y1),
                end: Point2::new(x2, y2),
            },
        )
    }

    pub fn new_chain_collider(
        &mut self,
        class_name: &str,
        x: f32,
        y: f32,
        vertices: Vec<Point2<f32>>,
        looped: bool,
        kind: BodyKind,
    ) -> Result<ColliderId, ClassError> {
        self.new_collider_with_shape(
            class_name,
            x,
            y,
            kind,
            ColliderShape::Chain { vertices, looped },
        )
    }

    /// Adds an extra named shape to an existing collider (spec §4.5
    /// `addShape`). Fails if the name is already used on this collider.
    pub fn add_shape(
        &mut self,
        id: ColliderId,
        name: impl Into<String>,
        shape: ColliderShape,
    ) -> Result<(), ClassError> {
        let name = name.into();
        let (body, class_index, already_present) = {
            let facades = self.facades.borrow();
            let Some(collider) = facades.get(&id) else {
                return Ok(());
            };
            (
                id.body_handle(),
                collider.class_index,
                collider.shapes.contains_key(&name),
            )
        };
        if already_present {
            return Err(ClassError::DuplicateShape { name });
        }
        let fixtures = self.build_fixtures(body, id, class_index, &shape);
        self.facades
            .borrow_mut()
            .get_mut(&id)
            .expect("checked above")
            .shapes
            .insert(name, fixtures);
        Ok(())
    }

    /// Removes a named shape, destroying its solid and sensor fixtures.
    pub fn remove_shape(&mut self, id: ColliderId, name: &str) {
        let removed = self
            .facades
            .borrow_mut()
            .get_mut(&id)
            .and_then(|c| c.shapes.remove(name));
        if let Some(fixtures) = removed {
            self.colliders
                .remove(fixtures.solid, &mut self.islands, &mut self.bodies, true);
            self.colliders
                .remove(fixtures.sensor, &mut self.islands, &mut self.bodies, true);
        }
    }

    /// Destroys a collider: its fixtures, body, and façade state.
    pub fn destroy_collider(&mut self, id: ColliderId) {
        if let Some(collider) = self.facades.borrow_mut().remove(&id) {
            for fixtures in collider.shapes.values() {
                self.colliders
                    .remove(fixtures.solid, &mut self.islands, &mut self.bodies, true);
                self.colliders
                    .remove(fixtures.sensor, &mut self.islands, &mut self.bodies, true);
            }
        }
        self.bodies.remove(
            id.body_handle(),
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Adds a joint between two colliders' bodies (spec §4.4
    /// `addJoint`; §9(b): the wrapper does not validate per-joint-kind
    /// constraints beyond what rapier2d itself enforces).
    pub fn add_joint(&mut self, a: ColliderId, b: ColliderId, params: JointParams) -> JointId {
        let native = joint::build(params);
        self.impulse_joints
            .insert(a.body_handle(), b.body_handle(), native, true)
    }

    /// Removes a previously-added joint.
    pub fn remove_joint(&mut self, joint: JointId) {
        self.impulse_joints.remove(joint, true);
    }

    /// Advances the simulation by `dt` seconds (spec §4.4 `update`):
    /// resets the contact pool, clears every collider's per-frame event
    /// queues, steps the engine, then translates the step's raw
    /// collision events into routed `enter`/`exit` events.
    pub fn update(&mut self, dt: f32) {
        self.pool.reset();
        for collider in self.facades.borrow_mut().values_mut() {
            collider.clear_frame_state();
        }

        let integration_parameters = IntegrationParameters {
            dt,
            ..IntegrationParameters::default()
        };

        let event_handler = CollectingEventHandler::default();
        let hooks = SolveHooks {
            facades: &self.facades,
            routing: &self.routing,
        };

        self.pipeline.step(
            &self.config.gravity,
            &integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &hooks,
            &event_handler,
        );

        self.dispatch_collision_events(event_handler.collisions.into_inner());
        self.dispatch_post_solve();
        self.tick_recorded_queries();
    }

    fn owner_and_class(&self, fixture: ColliderHandle) -> Option<(ColliderId, usize)> {
        let owner = decode_owner(self.colliders.get(fixture)?.user_data);
        let class_index = self.facades.borrow().get(&owner)?.class_index;
        Some((owner, class_index))
    }

    fn dispatch_collision_events(&mut self, events: Vec<CollisionEvent>) {
        for event in events {
            let (h1, h2, started) = match event {
                CollisionEvent::Started(h1, h2, _) => (h1, h2, true),
                CollisionEvent::Stopped(h1, h2, _) => (h1, h2, false),
            };

            let Some(c1) = self.colliders.get(h1) else { continue };
            let Some(c2) = self.colliders.get(h2) else { continue };
            let both_sensor = c1.is_sensor() && c2.is_sensor();
            let neither_sensor = !c1.is_sensor() && !c2.is_sensor();
            if !both_sensor && !neither_sensor {
                continue;
            }

            let Some((owner1, class1)) = self.owner_and_class(h1) else { continue };
            let Some((owner2, class2)) = self.owner_and_class(h2) else { continue };

            let transition = if started { Transition::Enter } else { Transition::Exit };
            let dispatches = dispatch_pair(
                &self.routing,
                class1,
                class2,
                both_sensor,
                neither_sensor,
                transition,
                owner1,
                owner2,
            );
            if dispatches.is_empty() {
                continue;
            }

            let snapshot = self
                .narrow_phase
                .contact_pair(h1, h2)
                .and_then(|pair| ContactSnapshot::capture(pair, &self.colliders, false));
            let handle = match snapshot {
                Some(s) => self.pool.capture(s),
                None => self.pool.capture(ContactSnapshot {
                    collider1: owner1,
                    collider2: owner2,
                    normal: Vector2::zeros(),
                    positions: Vec::new(),
                    friction: 0.0,
                    restitution: 0.0,
                    enabled: true,
                    touching: started,
                }),
            };

            let mut facades = self.facades.borrow_mut();
            let kind = if started { QueuedKind::Enter } else { QueuedKind::Exit };
            for (target, peer) in dispatches {
                let peer_class_name = facades
                    .get(&peer)
                    .map(|c| self.classes.get(c.class_index).name().to_string());
                let Some(peer_class_name) = peer_class_name else { continue };
                if let Some(collider) = facades.get_mut(&target) {
                    collider.push_event(
                        &peer_class_name,
                        QueuedEvent {
                            kind,
                            peer,
                            contact: handle.clone(),
                        },
                    );
                }
            }
        }
    }

    fn dispatch_post_solve(&mut self) {
        let pairs: Vec<(ColliderHandle, ColliderHandle, Vector2<f32>, f32, f32, Option<f32>, Option<f32>)> =
            self.narrow_phase
                .contact_pairs()
                .filter(|p| p.has_any_active_contact)
                .filter_map(|pair| {
                    let manifold = pair.manifolds.first()?;
                    let p0 = manifold.points.first()?;
                    let p1 = manifold.points.get(1);
                    Some((
                        pair.collider1,
                        pair.collider2,
                        manifold.data.normal,
                        p0.data.impulse,
                        p0.data.tangent_impulse.x,
                        p1.map(|p| p.data.impulse),
                        p1.map(|p| p.data.tangent_impulse.x),
                    ))
                })
                .collect();

        for (h1, h2, normal, ni1, ti1, ni2, ti2) in pairs {
            let Some((owner1, class1)) = self.owner_and_class(h1) else { continue };
            let Some((owner2, class2)) = self.owner_and_class(h2) else { continue };
            let dispatches = dispatch_pair(
                &self.routing,
                class1,
                class2,
                false,
                true,
                Transition::Post,
                owner1,
                owner2,
            );
            if dispatches.is_empty() {
                continue;
            }
            let mut facades = self.facades.borrow_mut();
            for (target, peer) in dispatches {
                if let Some(collider) = facades.get_mut(&target) {
                    if let Some(mut cb) = collider.post_solve.take() {
                        let ctx = PostSolveContext {
                            peer,
                            normal,
                            normal_impulse1: ni1,
                            tangent_impulse1: ti1,
                            normal_impulse2: ni2,
                            tangent_impulse2: ti2,
                        };
                        cb(target, &ctx);
                        collider.post_solve = Some(cb);
                    }
                }
            }
        }
    }

    fn class_name_of(&self, owner: ColliderId) -> Option<String> {
        let facades = self.facades.borrow();
        let index = facades.get(&owner)?.class_index;
        Some(self.classes.get(index).name().to_string())
    }

    /// Runs one area query: every non-sensor fixture whose native shape
    /// intersects `query_shape` at `query_pos`, deduplicated to owning
    /// colliders and filtered by class (spec §4.6).
    fn query_area(
        &self,
        query_pos: &Isometry2<f32>,
        query_shape: &dyn Shape,
        filter: &ClassFilter,
    ) -> Vec<ColliderId> {
        let mut found = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.query_pipeline.intersections_with_shape(
            &self.bodies,
            &self.colliders,
            query_pos,
            query_shape,
            QueryFilter::default(),
            |handle| {
                if let Some(native) = self.colliders.get(handle) {
                    if !native.is_sensor() {
                        let owner = decode_owner(native.user_data);
                        if seen.insert(owner) {
                            if let Some(name) = self.class_name_of(owner) {
                                if filter.admits(&name) {
                                    found.push(owner);
                                }
                            }
                        }
                    }
                }
                true
            },
        );
        found
    }

    /// Circle-area query (spec §4.6 `queryCircleArea`).
    pub fn query_circle_area(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        filter: &ClassFilter,
    ) -> Vec<ColliderId> {
        self.record_query_shape(RecordedShape::Circle {
            centre: Point2::new(x, y),
            radius,
        });
        let shape = SharedShape::ball(radius);
        self.query_area(&Isometry2::translation(x, y), &*shape, filter)
    }

    /// Rectangle-area query (spec §4.6 `queryRectangleArea`).
    pub fn query_rectangle_area(
        &self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        filter: &ClassFilter,
    ) -> Vec<ColliderId> {
        let centre = Point2::new(x + w / 2.0, y + h / 2.0);
        self.record_query_shape(RecordedShape::Rectangle {
            centre,
            width: w,
            height: h,
        });
        let shape = SharedShape::cuboid(w / 2.0, h / 2.0);
        self.query_area(&Isometry2::translation(centre.x, centre.y), &*shape, filter)
    }

    /// Polygon-area query (spec §4.6 `queryPolygonArea`). `vertices` may
    /// describe a concave ring; rapier2d's query pipeline only accepts
    /// convex query shapes, so the convex hull of `vertices` is used to
    /// gather broad-phase candidates (a superset of the real region for
    /// a concave polygon), and each candidate's own fixtures are then
    /// checked precisely against the real polygon with
    /// `geometry::circle_intersects_polygon`, which does handle concave
    /// rings — discarding hits the hull over-reported.
    pub fn query_polygon_area(
        &self,
        vertices: &[Point2<f32>],
        filter: &ClassFilter,
    ) -> Vec<ColliderId> {
        self.record_query_shape(RecordedShape::Polygon {
            vertices: vertices.to_vec(),
        });
        let (centre, _) = geometry::bounding_circle(vertices);
        let local: Vec<Point2<f32>> = vertices.iter().map(|p| p - centre.coords).collect();
        let Some(hull) = SharedShape::convex_hull(&local) else {
            return Vec::new();
        };
        let candidates =
            self.query_area(&Isometry2::translation(centre.x, centre.y), &*hull, filter);

        let facades = self.facades.borrow();
        candidates
            .into_iter()
            .filter(|id| {
                let Some(collider) = facades.get(id) else {
                    return false;
                };
                collider.shapes.values().any(|fixtures| {
                    let Some(native) = self.colliders.get(fixtures.solid) else {
                        return false;
                    };
                    let aabb = native.shape().compute_aabb(native.position());
                    let fixture_centre = Point2::from((aabb.mins.coords + aabb.maxs.coords) / 2.0);
                    let fixture_radius = (aabb.maxs - aabb.mins).norm() / 2.0;
                    geometry::circle_intersects_polygon(fixture_centre, fixture_radius, vertices)
                })
            })
            .collect()
    }

    /// Ray/line query (spec §4.6 `queryLine`): collects every
    /// intersected non-sensor fixture, then applies the class filter.
    pub fn query_line(
        &self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        filter: &ClassFilter,
    ) -> Vec<ColliderId> {
        self.record_query_shape(RecordedShape::Line {
            a: Point2::new(x1, y1),
            b: Point2::new(x2, y2),
        });

        let origin = Point2::new(x1, y1);
        let dir = Vector2::new(x2 - x1, y2 - y1);
        let max_len = geometry::segment_length(origin, Point2::new(x2, y2));
        let ray = rapier2d::geometry::Ray::new(origin, dir.try_normalize(f32::EPSILON).unwrap_or(dir));

        let mut found = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.query_pipeline.intersections_with_ray(
            &self.bodies,
            &self.colliders,
            &ray,
            max_len,
            true,
            QueryFilter::default(),
            |handle, _intersection| {
                if let Some(native) = self.colliders.get(handle) {
                    if !native.is_sensor() {
                        let owner = decode_owner(native.user_data);
                        if seen.insert(owner) {
                            if let Some(name) = self.class_name_of(owner) {
                                if filter.admits(&name) {
                                    found.push(owner);
                                }
                            }
                        }
                    }
                }
                true
            },
        );
        found
    }

    fn tick_recorded_queries(&mut self) {
        self.recorded_queries.get_mut().retain_mut(|q| {
            q.frames_left = q.frames_left.saturating_sub(1);
            q.frames_left > 0
        });
    }

    /// Records a query's shape for on-screen debug display, if enabled
    /// (spec §4.7). Takes `&self` so area queries can stay read-only
    /// from the caller's point of view.
    fn record_query_shape(&self, shape: RecordedShape) {
        if self.config.query_debug_drawing {
            self.recorded_queries.borrow_mut().push(RecordedQuery {
                shape,
                frames_left: DEFAULT_QUERY_DEBUG_FRAMES,
            });
        }
    }

    /// Draws every body's fixtures, every joint's anchors, and every
    /// still-live recorded query shape (spec §4.4/§4.7), at the given
    /// opacity. Preserves and restores the caller's colour and line
    /// width.
    pub fn draw(&mut self, draw: &mut dyn DebugDraw, alpha: f32) {
        let saved_color = draw.color();
        let saved_line_width = draw.line_width();

        let mut color = Color::WHITE;
        color.a = (255.0 * alpha.clamp(0.0, 1.0)).round() as u8;
        draw.set_color(color);
        draw.set_line_width(1.0);

        for (_, collider) in self.colliders.iter() {
            if collider.is_sensor() {
                continue;
            }
            let position = collider.position();
            match collider.shape().as_ball() {
                Some(ball) => {
                    let centre = position * Point2::origin();
                    draw.circle(DrawMode::Line, centre, ball.radius);
                    continue;
                }
                None => {}
            }
            if let Some(polygon) = collider.shape().as_convex_polygon() {
                let verts: Vec<Point2<f32>> =
                    polygon.points().iter().map(|p| position * p).collect();
                draw.polygon(DrawMode::Line, &verts);
            } else if let Some(segment) = collider.shape().as_segment() {
                draw.line(position * segment.a, position * segment.b);
            } else if let Some(polyline) = collider.shape().as_polyline() {
                let verts: Vec<Point2<f32>> =
                    polyline.vertices().iter().map(|p| position * p).collect();
                for window in verts.windows(2) {
                    draw.line(window[0], window[1]);
                }
            }
        }

        for (_, joint) in self.impulse_joints.iter() {
            if let (Some(b1), Some(b2)) =
                (self.bodies.get(joint.body1), self.bodies.get(joint.body2))
            {
                let a = b1.position() * Point2::origin();
                let b = b2.position() * Point2::origin();
                draw.circle(DrawMode::Fill, a, 0.05);
                draw.circle(DrawMode::Fill, b, 0.05);
                draw.line(a, b);
            }
        }

        for query in self.recorded_queries.borrow().iter() {
            match &query.shape {
                RecordedShape::Circle { centre, radius } => {
                    draw.circle(DrawMode::Line, *centre, *radius);
                }
                RecordedShape::Rectangle { centre, width, height } => {
                    draw.rectangle(DrawMode::Line, *centre, *width, *height);
                }
                RecordedShape::Polygon { vertices } => {
                    draw.polygon(DrawMode::Line, vertices);
                }
                RecordedShape::Line { a, b } => {
                    draw.line(*a, *b);
                }
            }
        }

        draw.set_color(saved_color);
        draw.set_line_width(saved_line_width);
    }

    /// Destroys every collider, joint, and the underlying world. The
    /// world must not be used afterwards (spec §4.4 `destroy`).
    pub fn destroy(mut self) {
        let ids: Vec<ColliderId> = self.facades.borrow().keys().copied().collect();
        for id in ids {
            self.destroy_collider(id);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class::IgnoreSpec;

    fn zero_gravity() -> World {
        World::new(WorldConfigBuilder::new().gravity(0.0, 0.0).build())
    }

    fn gravity_down() -> World {
        World::new(WorldConfigBuilder::new().gravity(0.0, 10.0).build())
    }

    /// S1: an ignoring pair, explicit event mode, no declared `enter`
    /// peers — no event fires and the overlapping boxes are never pushed
    /// apart (no gravity to move them otherwise).
    #[test]
    fn s1_ignoring_pair_neither_collides_nor_emits_undeclared_events() {
        let _ = env_logger::try_init();
        let mut world = zero_gravity();
        world.set_explicit_collision_events(true).unwrap();
        world
            .add_collision_class(
                "Player",
                CollisionClassSpec {
                    ignores: IgnoreSpec::named(["Enemy"]),
                    ..Default::default()
                },
            )
            .unwrap();
        world
            .add_collision_class("Enemy", CollisionClassSpec::default())
            .unwrap();

        let player = world
            .new_rectangle_collider("Player", 0.0, 0.0, 1.0, 1.0, BodyKind::Dynamic)
            .unwrap();
        let enemy = world
            .new_rectangle_collider("Enemy", 0.1, 0.0, 1.0, 1.0, BodyKind::Dynamic)
            .unwrap();

        for _ in 0..60 {
            world.update(1.0 / 60.0);
            assert!(!world.collider_mut(player).unwrap().enter("Enemy"));
        }

        let player_x = world.position(player).unwrap().translation.vector.x;
        let enemy_x = world.position(enemy).unwrap().translation.vector.x;
        assert!((player_x - 0.0).abs() < 1e-3);
        assert!((enemy_x - 0.1).abs() < 1e-3);
    }

    /// S2: a dynamic body dropped onto a static floor enters, then stays.
    #[test]
    fn s2_falling_body_enters_then_stays_on_static_floor() {
        let mut world = gravity_down();
        world.add_collision_class("A", CollisionClassSpec::default()).unwrap();
        world.add_collision_class("B", CollisionClassSpec::default()).unwrap();

        world
            .new_rectangle_collider("A", 0.0, 0.0, 10.0, 1.0, BodyKind::Static)
            .unwrap();
        let ball = world
            .new_circle_collider("B", 0.0, -3.0, 0.5, BodyKind::Dynamic)
            .unwrap();

        let mut entered = false;
        for _ in 0..180 {
            world.update(1.0 / 60.0);
            if world.collider_mut(ball).unwrap().enter("A") {
                entered = true;
            }
        }

        assert!(entered, "ball should have entered the floor's class");
        assert!(world.collider(ball).unwrap().stay("A"));
    }

    /// A concave query polygon must reject a collider sitting in the
    /// notch the convex hull over-reports, while still finding a
    /// collider that is genuinely inside the polygon.
    #[test]
    fn query_polygon_area_respects_concave_notch() {
        let mut world = zero_gravity();
        world.add_collision_class("A", CollisionClassSpec::default()).unwrap();

        // An L-shape: the unit square [1,2]x[1,2] is notched out.
        let l_shape = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];

        let inside = world
            .new_circle_collider("A", 0.5, 0.5, 0.05, BodyKind::Static)
            .unwrap();
        // Inside the convex hull of l_shape, but inside the notched-out
        // corner, so not inside the real L-shaped polygon.
        let in_notch = world
            .new_circle_collider("A", 1.3, 1.3, 0.05, BodyKind::Static)
            .unwrap();

        let hits = world.query_polygon_area(&l_shape, &ClassFilter::All);

        assert!(hits.contains(&inside));
        assert!(!hits.contains(&in_notch));
    }

    /// S4: query filter admits the unignored, geometrically-overlapping
    /// class only.
    #[test]
    fn s4_query_filter_admits_only_matching_class() {
        let mut world = zero_gravity();
        world.add_collision_class("P", CollisionClassSpec::default()).unwrap();
        world.add_collision_class("E", CollisionClassSpec::default()).unwrap();
        world.add_collision_class("N", CollisionClassSpec::default()).unwrap();

        world
            .new_circle_collider("P", 100.0, 100.0, 10.0, BodyKind::Static)
            .unwrap();
        let e = world
            .new_circle_collider("E", 150.0, 100.0, 10.0, BodyKind::Static)
            .unwrap();
        world
            .new_circle_collider("N", 200.0, 100.0, 10.0, BodyKind::Static)
            .unwrap();

        let filter = ClassFilter::all_except(["P"]);
        let hits = world.query_circle_area(125.0, 100.0, 40.0, &filter);

        assert_eq!(hits, vec![e]);
    }

    /// S5: a contact snapshot stays readable through the frame it was
    /// captured in, and a detached clone survives the pool reusing its
    /// cell on later steps.
    #[test]
    fn s5_detached_contact_snapshot_survives_pool_reuse() {
        let mut world = gravity_down();
        world.add_collision_class("A", CollisionClassSpec::default()).unwrap();
        world.add_collision_class("B", CollisionClassSpec::default()).unwrap();

        world
            .new_rectangle_collider("A", 0.0, 0.0, 10.0, 1.0, BodyKind::Static)
            .unwrap();
        let ball = world
            .new_circle_collider("B", 0.0, -3.0, 0.5, BodyKind::Dynamic)
            .unwrap();

        let mut detached = None;
        for _ in 0..180 {
            world.update(1.0 / 60.0);
            let mut collider = world.collider_mut(ball).unwrap();
            if collider.enter("A") {
                let data = collider.get_enter_collision_data("A");
                detached = Some(data[0].contact.detach());
                break;
            }
        }

        let detached = detached.expect("ball should have entered the floor");
        assert!(detached.collider1 == ball || detached.collider2 == ball);
        assert!(detached.touching);

        for _ in 0..10 {
            world.update(1.0 / 60.0);
        }
        assert!(detached.touching);
    }

    /// S6: disabling a contact in `preSolve` every frame suppresses
    /// collision response, so the body falls through instead of resting.
    #[test]
    fn s6_pre_solve_disabling_suppresses_collision_response() {
        let mut world = gravity_down();
        world.add_collision_class("A", CollisionClassSpec::default()).unwrap();
        world.add_collision_class("B", CollisionClassSpec::default()).unwrap();

        world
            .new_rectangle_collider("A", 0.0, 0.0, 10.0, 1.0, BodyKind::Static)
            .unwrap();
        let ball = world
            .new_circle_collider("B", 0.0, -3.0, 0.5, BodyKind::Dynamic)
            .unwrap();
        world
            .collider_mut(ball)
            .unwrap()
            .set_pre_solve(|_, ctx| ctx.set_enabled(false));

        for _ in 0..180 {
            world.update(1.0 / 60.0);
        }

        let y = world.position(ball).unwrap().translation.vector.y;
        assert!(y > -0.5, "ball should fall through a disabled contact, not rest on it");
    }
}

//! Collision classes and the ignore-graph compiler.
//!
//! A [`CollisionClassSpec`] is the user-facing declaration; [`ClassRegistry`]
//! owns the registration-ordered table of compiled [`CollisionClass`]
//! entries and recompiles category/mask assignments whenever the table
//! changes, per spec §4.2.

use fxhash::FxHashMap;
use rapier2d::geometry::Group;

use crate::error::ClassError;

/// The maximum number of distinct fixture categories the underlying
/// engine's filtering groups support. Inherited from Box2D/rapier2d's
/// 16-bit category convention; deliberately not lifted even though
/// `rapier2d::geometry::Group` itself has 32 bit positions available,
/// see DESIGN.md.
pub const MAX_CATEGORIES: usize = 16;

/// A symbolic set of classes a class refuses to physically contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreSpec {
    /// An explicit list of peer class names.
    Named(Vec<String>),
    /// Every other registered class except the ones listed here (the
    /// `{'All', except = {...}}` sentinel combination from spec §3).
    AllExcept(Vec<String>),
}

impl Default for IgnoreSpec {
    fn default() -> Self {
        IgnoreSpec::Named(Vec::new())
    }
}

impl IgnoreSpec {
    /// Ignore every other class.
    pub fn all() -> Self {
        IgnoreSpec::AllExcept(Vec::new())
    }

    /// Ignore every other class except the ones named here.
    pub fn all_except<I: IntoIterator<Item = S>, S: Into<String>>(except: I) -> Self {
        IgnoreSpec::AllExcept(except.into_iter().map(Into::into).collect())
    }

    /// Ignore exactly the classes named here.
    pub fn named<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        IgnoreSpec::Named(names.into_iter().map(Into::into).collect())
    }
}

/// The declared peer lists and ignore policy for one collision class. The
/// `enter`/`exit`/`pre`/`post` lists only matter in explicit event mode
/// (see [`ClassRegistry::set_explicit_collision_events`]); in implicit
/// mode every registered class fires every transition against every
/// other class.
#[derive(Debug, Clone, Default)]
pub struct CollisionClassSpec {
    /// Classes this class must never physically contact.
    pub ignores: IgnoreSpec,
    /// Peers that generate `enter` events, in explicit mode.
    pub enter: Vec<String>,
    /// Peers that generate `exit` events, in explicit mode.
    pub exit: Vec<String>,
    /// Peers that generate `preSolve` events, in explicit mode.
    pub pre: Vec<String>,
    /// Peers that generate `postSolve` events, in explicit mode.
    pub post: Vec<String>,
}

/// A registered, compiled collision class.
#[derive(Debug, Clone)]
pub struct CollisionClass {
    pub(crate) name: String,
    pub(crate) spec: CollisionClassSpec,
    pub(crate) category: u8,
    pub(crate) mask: Group,
}

impl CollisionClass {
    /// The class's name, as passed to `add_collision_class`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine-level category id this class was assigned, in `1..=16`.
    pub fn category(&self) -> u8 {
        self.category
    }

    pub(crate) fn interaction_groups(&self) -> rapier2d::geometry::InteractionGroups {
        rapier2d::geometry::InteractionGroups::new(category_group(self.category), self.mask)
    }

    /// Interaction groups for this class's *sensor* fixtures: membership
    /// matches the solid fixture's category (so debug tooling can still
    /// identify it), but the filter is unrestricted — sensors always
    /// match all, per spec §4.5.
    pub(crate) fn sensor_interaction_groups(&self) -> rapier2d::geometry::InteractionGroups {
        rapier2d::geometry::InteractionGroups::new(category_group(self.category), Group::ALL)
    }
}

fn category_group(category: u8) -> Group {
    debug_assert!((1..=MAX_CATEGORIES as u8).contains(&category));
    Group::from_bits_truncate(1u32 << (category - 1))
}

/// Registration-ordered table of collision classes, with the ignore-graph
/// compiler (spec §4.2) and the implicit/explicit event-mode toggle
/// (spec §4.3).
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<CollisionClass>,
    index_by_name: FxHashMap<String, usize>,
    explicit_events: bool,
    user_class_added: bool,
    expanded: Vec<Vec<usize>>,
}

impl ClassRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether event generation between classes must be explicitly
    /// declared via each class's `enter`/`exit`/`pre`/`post` lists.
    pub fn explicit_collision_events(&self) -> bool {
        self.explicit_events
    }

    /// Switches between implicit (default: every pair fires every
    /// transition) and explicit event generation. Only valid before the
    /// first user-declared collision class is registered — `Default` is
    /// bootstrapped internally and does not count against this guard.
    pub fn set_explicit_collision_events(&mut self, explicit: bool) -> Result<(), ClassError> {
        if self.user_class_added {
            return Err(ClassError::RegistryFrozen);
        }
        self.explicit_events = explicit;
        Ok(())
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    pub(crate) fn get(&self, index: usize) -> &CollisionClass {
        &self.classes[index]
    }

    /// Iterates all registered classes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CollisionClass> {
        self.classes.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.len()
    }

    /// Registers the internal bootstrap `Default` class. Does not count
    /// as a user class for the explicit-events freeze guard.
    pub(crate) fn add_bootstrap_class(&mut self, name: &str) {
        let index = self.classes.len();
        self.classes.push(CollisionClass {
            name: name.to_string(),
            spec: CollisionClassSpec::default(),
            category: 1,
            mask: Group::ALL,
        });
        self.index_by_name.insert(name.to_string(), index);
        let _ = self.recompile_filters();
    }

    /// Registers one collision class. Triggers a full recompile of every
    /// class's category/mask (spec §4.4: "masks are reapplied to every
    /// existing fixture on every collider").
    pub fn add_collision_class(
        &mut self,
        name: impl Into<String>,
        spec: CollisionClassSpec,
    ) -> Result<(), ClassError> {
        let name = name.into();
        if self.index_by_name.contains_key(&name) {
            return Err(ClassError::DuplicateClass { name });
        }

        let index = self.classes.len();
        self.classes.push(CollisionClass {
            name: name.clone(),
            spec,
            category: 1,
            mask: Group::ALL,
        });
        self.index_by_name.insert(name, index);
        self.user_class_added = true;
        self.recompile_filters()
    }

    /// Registers many collision classes in iteration order of `table`.
    pub fn add_collision_class_table(
        &mut self,
        table: impl IntoIterator<Item = (String, CollisionClassSpec)>,
    ) -> Result<(), ClassError> {
        for (name, spec) in table {
            if self.index_by_name.contains_key(&name) {
                return Err(ClassError::DuplicateClass { name });
            }
            let index = self.classes.len();
            self.classes.push(CollisionClass {
                name: name.clone(),
                spec,
                category: 1,
                mask: Group::ALL,
            });
            self.index_by_name.insert(name, index);
        }
        self.user_class_added = true;
        self.recompile_filters()
    }

    /// Resolves one class's `ignores` spec into the set of class indices
    /// it refuses to contact, with `All`/`except` sentinels expanded.
    fn expand_ignores(&self, class_index: usize) -> Vec<usize> {
        let spec = &self.classes[class_index].spec.ignores;
        match spec {
            IgnoreSpec::Named(names) => names
                .iter()
                .filter_map(|n| self.index_by_name.get(n).copied())
                .filter(|&i| i != class_index)
                .collect(),
            IgnoreSpec::AllExcept(except) => {
                let excluded: Vec<usize> = except
                    .iter()
                    .filter_map(|n| self.index_by_name.get(n).copied())
                    .collect();
                (0..self.classes.len())
                    .filter(|&i| i != class_index && !excluded.contains(&i))
                    .collect()
            }
        }
    }

    /// Runs the full ignore-graph compiler (spec §4.2) and writes the
    /// resulting category/mask back onto every class.
    fn recompile_filters(&mut self) -> Result<(), ClassError> {
        let n = self.classes.len();

        // Step 1: expand(C) for every class.
        let expanded: Vec<Vec<usize>> = (0..n).map(|i| self.expand_ignores(i)).collect();

        // incoming(C) = { D : C in expanded(D) }
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (d, ignored) in expanded.iter().enumerate() {
            for &c in ignored {
                incoming[c].push(d);
            }
        }

        // Step 2: group by case-insensitive-sorted incoming signature,
        // first-seen order starting at category 1.
        let mut signature_to_category: FxHashMap<String, u8> = FxHashMap::default();
        let mut categories = vec![0u8; n];
        let mut next_category: u8 = 1;

        for i in 0..n {
            let mut names: Vec<String> = incoming[i]
                .iter()
                .map(|&j| self.classes[j].name.to_lowercase())
                .collect();
            names.sort();
            let signature = names.join("\u{0}");

            let category = match signature_to_category.get(&signature) {
                Some(&c) => c,
                None => {
                    if next_category as usize > MAX_CATEGORIES {
                        let offending: Vec<String> = incoming[i]
                            .iter()
                            .map(|&j| self.classes[j].name.clone())
                            .chain(std::iter::once(self.classes[i].name.clone()))
                            .collect();
                        return Err(ClassError::CategoryOverflow { offending });
                    }
                    let c = next_category;
                    next_category += 1;
                    signature_to_category.insert(signature, c);
                    c
                }
            };
            categories[i] = category;
        }

        // Step 3: mask(C) = every category in use, minus the categories
        // of the classes C ignores. See DESIGN.md for why this is the
        // complement of spec.md's literal wording, not a literal
        // transcription of it: the complement is what the worked
        // scenarios (spec §8, S1/S2) actually require.
        let universe =
            Group::from_bits_truncate((1u32 << (next_category - 1)).wrapping_sub(1));

        for i in 0..n {
            let mut ignored_categories = Group::empty();
            for &j in &expanded[i] {
                ignored_categories |= category_group(categories[j]);
            }
            self.classes[i].category = categories[i];
            self.classes[i].mask = universe & !ignored_categories;
        }

        self.expanded = expanded;

        Ok(())
    }

    /// The set of class indices that class `index` refuses to contact,
    /// after `All`/`except` sentinel resolution. Used by the event
    /// routing table to decide whether a pair is sensor-involving.
    pub(crate) fn expanded(&self, index: usize) -> &[usize] {
        &self.expanded[index]
    }

    /// True if either class ignores the other.
    pub(crate) fn ignores_relation(&self, a: usize, b: usize) -> bool {
        self.expanded[a].contains(&b) || self.expanded[b].contains(&a)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn registry_with(classes: &[(&str, CollisionClassSpec)]) -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.add_bootstrap_class("Default");
        for (name, spec) in classes {
            registry
                .add_collision_class(*name, spec.clone())
                .expect("class registration should succeed");
        }
        registry
    }

    fn collides(a: &CollisionClass, b: &CollisionClass) -> bool {
        let ga = a.interaction_groups();
        let gb = b.interaction_groups();
        (ga.memberships & gb.filter) != Group::empty()
            && (gb.memberships & ga.filter) != Group::empty()
    }

    #[test]
    fn s1_player_ignores_enemy() {
        let registry = registry_with(&[
            (
                "Player",
                CollisionClassSpec {
                    ignores: IgnoreSpec::named(["Enemy"]),
                    ..Default::default()
                },
            ),
            ("Enemy", CollisionClassSpec::default()),
        ]);

        let player = registry.get(registry.index_of("Player").unwrap());
        let enemy = registry.get(registry.index_of("Enemy").unwrap());
        let default = registry.get(registry.index_of("Default").unwrap());

        assert!(!collides(player, enemy));
        assert!(collides(player, default));
        assert!(collides(enemy, default));
    }

    #[test]
    fn s2_no_ignores_always_collide() {
        let registry = registry_with(&[
            ("A", CollisionClassSpec::default()),
            ("B", CollisionClassSpec::default()),
        ]);
        let a = registry.get(registry.index_of("A").unwrap());
        let b = registry.get(registry.index_of("B").unwrap());
        assert!(collides(a, b));
    }

    #[test]
    fn s3_category_grouping_bounds_categories() {
        let mut registry = ClassRegistry::new();
        registry.add_bootstrap_class("Default");

        // 5 pairs sharing identical ignore lists, plus 10 distinct
        // singleton classes that each ignore one shared "Wall" class.
        registry
            .add_collision_class("Wall", CollisionClassSpec::default())
            .unwrap();
        for i in 0..5 {
            let ignores = IgnoreSpec::named(["Wall"]);
            for suffix in ["A", "B"] {
                registry
                    .add_collision_class(
                        format!("Pair{i}{suffix}"),
                        CollisionClassSpec {
                            ignores: ignores.clone(),
                            ..Default::default()
                        },
                    )
                    .unwrap();
            }
        }
        for i in 0..8 {
            registry
                .add_collision_class(format!("Solo{i}"), CollisionClassSpec::default())
                .unwrap();
        }

        let distinct_categories: std::collections::HashSet<u8> =
            registry.iter().map(|c| c.category()).collect();
        assert!(distinct_categories.len() <= 15);
    }

    #[test]
    fn round_trip_all_except() {
        let registry = registry_with(&[
            (
                "Player",
                CollisionClassSpec {
                    ignores: IgnoreSpec::all_except(["Friendly"]),
                    ..Default::default()
                },
            ),
            ("Friendly", CollisionClassSpec::default()),
            ("Hostile", CollisionClassSpec::default()),
        ]);

        let player = registry.get(registry.index_of("Player").unwrap());
        let friendly = registry.get(registry.index_of("Friendly").unwrap());
        let hostile = registry.get(registry.index_of("Hostile").unwrap());
        let default = registry.get(registry.index_of("Default").unwrap());

        assert!(collides(player, friendly));
        assert!(!collides(player, hostile));
        assert!(!collides(player, default));
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut registry = ClassRegistry::new();
        registry.add_bootstrap_class("Default");
        registry
            .add_collision_class("Player", CollisionClassSpec::default())
            .unwrap();
        let err = registry
            .add_collision_class("Player", CollisionClassSpec::default())
            .unwrap_err();
        assert_eq!(
            err,
            ClassError::DuplicateClass {
                name: "Player".to_string()
            }
        );
    }

    #[test]
    fn explicit_events_locked_after_user_class() {
        let mut registry = ClassRegistry::new();
        registry.add_bootstrap_class("Default");
        assert!(registry.set_explicit_collision_events(true).is_ok());
        registry
            .add_collision_class("Player", CollisionClassSpec::default())
            .unwrap();
        assert_eq!(
            registry.set_explicit_collision_events(false).unwrap_err(),
            ClassError::RegistryFrozen
        );
    }
}

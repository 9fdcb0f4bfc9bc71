//! Event routing table (spec §4.3): decides, for a pair of classes and a
//! raw engine callback, which collision-transition events to enqueue and
//! onto which colliders' queues.

use crate::class::ClassRegistry;

/// The four kinds of dispatched collision events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Enter,
    Exit,
    Pre,
    Post,
}

const TRANSITIONS: [Transition; 4] = [
    Transition::Enter,
    Transition::Exit,
    Transition::Pre,
    Transition::Post,
];

/// One routing entry: class index `a` should enqueue an event keyed by
/// class `b`'s name whenever it sees a transition against an instance of
/// class `b`.
#[derive(Debug, Clone, Copy)]
struct Pair {
    a: usize,
    b: usize,
}

#[derive(Debug, Default)]
struct TransitionList {
    sensor: Vec<Pair>,
    non_sensor: Vec<Pair>,
}

/// Per-transition sensor/non-sensor pair lists, rebuilt every time the
/// class registry changes.
#[derive(Debug, Default)]
pub(crate) struct EventRoutingTable {
    lists: [TransitionList; 4],
}

fn transition_slot(t: Transition) -> usize {
    match t {
        Transition::Enter => 0,
        Transition::Exit => 1,
        Transition::Pre => 2,
        Transition::Post => 3,
    }
}

impl EventRoutingTable {
    /// Rebuilds the whole table from the current class registry state.
    pub(crate) fn rebuild(&mut self, registry: &ClassRegistry) {
        for list in &mut self.lists {
            list.sensor.clear();
            list.non_sensor.clear();
        }

        let n = registry.len();
        let implicit = !registry.explicit_collision_events();

        for t in TRANSITIONS {
            let slot = transition_slot(t);
            let mut pairs: Vec<Pair> = Vec::new();

            if implicit {
                for a in 0..n {
                    for b in 0..n {
                        pairs.push(Pair { a, b });
                    }
                }
            } else {
                for a in 0..n {
                    let peers = peer_list(registry.get(a), t);
                    for peer_name in peers {
                        if let Some(b) = registry.index_of(peer_name) {
                            pairs.push(Pair { a, b });
                        }
                    }
                }
            }

            for pair in pairs {
                let sensor_involving = registry.ignores_relation(pair.a, pair.b);
                if sensor_involving {
                    self.lists[slot].sensor.push(pair);
                } else {
                    self.lists[slot].non_sensor.push(pair);
                }
            }
        }
    }

    /// True iff class `class_a`'s list declares it wants transition `t`
    /// events about class `class_b`. `both_sensor`/`neither_sensor`
    /// describe which fixture kind produced the callback; a mixed
    /// sensor/non-sensor pair never matches, matching the source
    /// behaviour.
    pub(crate) fn dispatch(
        &self,
        class_a: usize,
        class_b: usize,
        both_sensor: bool,
        neither_sensor: bool,
        t: Transition,
    ) -> bool {
        if !both_sensor && !neither_sensor {
            return false;
        }

        let slot = transition_slot(t);
        let list = if both_sensor {
            &self.lists[slot].sensor
        } else {
            &self.lists[slot].non_sensor
        };

        list.iter().any(|pair| pair.a == class_a && pair.b == class_b)
    }
}

/// Resolves one raw fixture-pair callback into the set of `(target,
/// peer)` collider instances that should receive transition `t`. Each
/// side's event list is declared independently (spec §4.3), so class
/// `a`'s list is consulted for "`a` wants events about `b`" (routing the
/// entry to `collider_a`) and class `b`'s list for "`b` wants events
/// about `a`" (routing to `collider_b`). When `class_a == class_b` the
/// two colliders share one list, so a single match is mirrored onto
/// both instances — keyed on the collider pair, not on the (otherwise
/// indistinguishable) class index.
pub(crate) fn dispatch_pair(
    routing: &EventRoutingTable,
    class_a: usize,
    class_b: usize,
    both_sensor: bool,
    neither_sensor: bool,
    t: Transition,
    collider_a: crate::ids::ColliderId,
    collider_b: crate::ids::ColliderId,
) -> Vec<(crate::ids::ColliderId, crate::ids::ColliderId)> {
    let mut out = Vec::new();

    if routing.dispatch(class_a, class_b, both_sensor, neither_sensor, t) {
        out.push((collider_a, collider_b));
        if class_a == class_b {
            out.push((collider_b, collider_a));
        }
    }

    if class_a != class_b && routing.dispatch(class_b, class_a, both_sensor, neither_sensor, t) {
        out.push((collider_b, collider_a));
    }

    out
}

fn peer_list(class: &crate::class::CollisionClass, t: Transition) -> &[String] {
    match t {
        Transition::Enter => &class.spec.enter,
        Transition::Exit => &class.spec.exit,
        Transition::Pre => &class.spec.pre,
        Transition::Post => &class.spec.post,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class::{CollisionClassSpec, IgnoreSpec};

    fn registry_two_classes(ignores: bool) -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.add_bootstrap_class("Default");
        registry
            .add_collision_class(
                "A",
                CollisionClassSpec {
                    ignores: if ignores {
                        IgnoreSpec::named(["B"])
                    } else {
                        IgnoreSpec::default()
                    },
                    ..Default::default()
                },
            )
            .unwrap();
        registry
            .add_collision_class("B", CollisionClassSpec::default())
            .unwrap();
        registry
    }

    #[test]
    fn implicit_mode_dispatches_every_pair() {
        let registry = registry_two_classes(false);
        let mut table = EventRoutingTable::default();
        table.rebuild(&registry);

        let a = registry.index_of("A").unwrap();
        let b = registry.index_of("B").unwrap();

        assert!(table.dispatch(a, b, false, true, Transition::Enter));
    }

    #[test]
    fn ignoring_pair_is_sensor_involving() {
        let registry = registry_two_classes(true);
        let mut table = EventRoutingTable::default();
        table.rebuild(&registry);

        let a = registry.index_of("A").unwrap();
        let b = registry.index_of("B").unwrap();

        // Non-sensor fixtures between A and B never actually touch
        // (they are filtered), so only the sensor list should carry it.
        assert!(!table.dispatch(a, b, false, true, Transition::Enter));
        assert!(table.dispatch(a, b, true, false, Transition::Enter));
    }

    #[test]
    fn mixed_sensor_pair_never_dispatches() {
        let registry = registry_two_classes(false);
        let mut table = EventRoutingTable::default();
        table.rebuild(&registry);
        let a = registry.index_of("A").unwrap();
        let b = registry.index_of("B").unwrap();
        assert!(!table.dispatch(a, b, false, false, Transition::Enter));
    }

    #[test]
    fn same_class_pair_mirrors_onto_both_colliders() {
        let mut registry = ClassRegistry::new();
        registry.add_bootstrap_class("Default");
        registry
            .add_collision_class("A", CollisionClassSpec::default())
            .unwrap();
        let mut table = EventRoutingTable::default();
        table.rebuild(&registry);

        let a = registry.index_of("A").unwrap();
        let collider_a = crate::ids::ColliderId::dummy(0);
        let collider_b = crate::ids::ColliderId::dummy(1);

        let dispatches = dispatch_pair(
            &table,
            a,
            a,
            false,
            true,
            Transition::Enter,
            collider_a,
            collider_b,
        );

        assert_eq!(dispatches.len(), 2);
        assert!(dispatches.contains(&(collider_a, collider_b)));
        assert!(dispatches.contains(&(collider_b, collider_a)));
    }
}

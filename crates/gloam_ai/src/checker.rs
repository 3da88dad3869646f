// checker.rs - Transition checker registry
//
// A checker is a predicate bound to an event name. When the current state's
// transition table has an event whose name is a registered checker, the
// predicate runs every tick and raises that event when it holds.

use crate::context::CheckerFacts;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type CheckerFn = dyn Fn(&CheckerFacts<'_>) -> bool;

/// A resolved checker, cheap to clone into compiled transition rules.
#[derive(Clone)]
pub struct Checker {
    name: Rc<str>,
    predicate: Rc<CheckerFn>,
}

impl Checker {
    pub fn new(name: &str, predicate: impl Fn(&CheckerFacts<'_>) -> bool + 'static) -> Self {
        Self {
            name: Rc::from(name),
            predicate: Rc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, facts: &CheckerFacts<'_>) -> bool {
        (self.predicate)(facts)
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Checker").field(&self.name).finish()
    }
}

/// Name -> predicate table injected into the compiler and script adapter.
#[derive(Debug, Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Checker>,
}

impl CheckerRegistry {
    /// An empty registry. Use [`with_builtins`](Self::with_builtins) for the
    /// standard vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("see_player", |f| {
            f.player_distance().is_some_and(|d| d <= f.tuning.sight_range)
        });
        registry.register("lost_player", |f| {
            f.player_distance().map_or(true, |d| d > f.tuning.lose_sight_range)
        });
        registry.register("in_attack_range", |f| {
            f.player_distance().is_some_and(|d| d <= f.tuning.attack_range)
        });
        registry.register("out_of_attack_range", |f| {
            f.player_distance().map_or(true, |d| d > f.tuning.attack_range)
        });
        registry.register("attack_ready", |f| f.context.attack_timer <= 0.0);
        registry.register("path_complete", |f| f.path_complete);
        registry
    }

    /// Register or replace a checker.
    pub fn register(
        &mut self,
        name: &str,
        predicate: impl Fn(&CheckerFacts<'_>) -> bool + 'static,
    ) -> &mut Self {
        self.checkers.insert(name.to_string(), Checker::new(name, predicate));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Checker> {
        self.checkers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checkers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.checkers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AiContext, AiTuning};
    use gloam_core::math::Vec2;

    fn facts<'a>(
        player: Option<Vec2>,
        context: &'a AiContext,
        tuning: &'a AiTuning,
    ) -> CheckerFacts<'a> {
        CheckerFacts {
            position: Some(Vec2::ZERO),
            player,
            context,
            tuning,
            path_complete: false,
        }
    }

    #[test]
    fn sight_checkers_use_tuning_thresholds() {
        let registry = CheckerRegistry::with_builtins();
        let tuning = AiTuning::default();
        let context = AiContext::default();

        let near = facts(Some(Vec2::new(tuning.sight_range - 1.0, 0.0)), &context, &tuning);
        let far = facts(Some(Vec2::new(tuning.lose_sight_range + 1.0, 0.0)), &context, &tuning);
        let absent = facts(None, &context, &tuning);

        let see = registry.get("see_player").unwrap();
        let lost = registry.get("lost_player").unwrap();
        assert!(see.check(&near));
        assert!(!see.check(&far));
        assert!(!see.check(&absent));
        assert!(!lost.check(&near));
        assert!(lost.check(&far));
        assert!(lost.check(&absent));
    }

    #[test]
    fn attack_ready_follows_attack_timer() {
        let registry = CheckerRegistry::with_builtins();
        let tuning = AiTuning::default();
        let mut context = AiContext {
            attack_timer: 0.5,
            ..Default::default()
        };
        let ready = registry.get("attack_ready").unwrap();
        assert!(!ready.check(&facts(None, &context, &tuning)));
        context.attack_timer = 0.0;
        assert!(ready.check(&facts(None, &context, &tuning)));
    }

    #[test]
    fn custom_checkers_replace_builtins() {
        let mut registry = CheckerRegistry::with_builtins();
        registry.register("see_player", |_| true);
        registry.register("always", |_| true);

        let tuning = AiTuning::default();
        let context = AiContext::default();
        assert!(registry.get("see_player").unwrap().check(&facts(None, &context, &tuning)));
        assert!(registry.contains("always"));
        assert_eq!(registry.names().first(), Some(&"always"));
    }
}

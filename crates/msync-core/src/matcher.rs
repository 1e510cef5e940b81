use msync_types::Envelope;

use crate::binding::HandlerBinding;
use crate::registry::Registry;

/// Canonical string form of a class or action name used for matching.
pub fn normalize_name(name: &str) -> &str {
    name.trim()
}

/// Select every binding whose target class and action equal the envelope's.
///
/// Pure and side-effect free. Registration order is preserved so dispatch
/// order (and per-handler failure logging) is deterministic. An empty result
/// means "nothing to do", not failure.
pub fn match_bindings<'r>(registry: &'r Registry, envelope: &Envelope) -> Vec<&'r HandlerBinding> {
    registry.lookup(&envelope.class, envelope.action.as_str())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use msync_types::Action;
    use proptest::prelude::*;

    use super::*;
    use crate::binding::{ClassHandler, HandlerBinding};

    fn noop() -> ClassHandler {
        Arc::new(|_| Ok(()))
    }

    fn registry(pairs: &[(String, String)]) -> Registry {
        let mut builder = Registry::builder();
        for (class, action) in pairs {
            builder
                .register(HandlerBinding::direct(class, action, class, action, noop()))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn no_match_is_empty() {
        let reg = registry(&[("SampleUser".into(), "create".into())]);
        let envelope = Envelope::new("Other", Action::Create).with_value("title", "t");
        assert!(match_bindings(&reg, &envelope).is_empty());
    }

    #[test]
    fn fan_out_preserves_registration_order() {
        let mut builder = Registry::builder();
        for impl_action in ["first", "second", "third"] {
            builder
                .register(HandlerBinding::direct("User", "update", "Local", impl_action, noop()))
                .unwrap();
        }
        builder
            .register(HandlerBinding::direct("User", "create", "Local", "other", noop()))
            .unwrap();
        let reg = builder.build();

        let envelope = Envelope::new("User", Action::Update).with_value("name", "x");
        let matched: Vec<&str> = match_bindings(&reg, &envelope)
            .iter()
            .map(|b| b.impl_action.as_str())
            .collect();
        assert_eq!(matched, vec!["first", "second", "third"]);
    }

    #[test]
    fn custom_actions_match_by_name() {
        let reg = registry(&[("User".into(), "greeting".into())]);
        let envelope =
            Envelope::new("User", Action::Custom("greeting".into())).with_value("hi", 1);
        assert_eq!(match_bindings(&reg, &envelope).len(), 1);
    }

    fn name() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["User", "Post", "Comment"]).prop_map(String::from)
    }

    fn action() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["create", "update", "destroy", "greeting"]).prop_map(String::from)
    }

    proptest! {
        #[test]
        fn matches_exactly_the_equal_bindings_in_order(
            pairs in prop::collection::vec((name(), action()), 0..12),
            class in name(),
            act in action(),
        ) {
            let reg = registry(&pairs);
            let envelope = Envelope::new(class.clone(), Action::parse(&act).unwrap())
                .with_value("k", 1);

            let expected: Vec<usize> = pairs
                .iter()
                .enumerate()
                .filter(|(_, (c, a))| *c == class && *a == act)
                .map(|(i, _)| i)
                .collect();
            let matched = match_bindings(&reg, &envelope);
            let positions: Vec<usize> = matched
                .iter()
                .map(|m| {
                    reg.bindings()
                        .iter()
                        .position(|b| std::ptr::eq(b, *m))
                        .unwrap()
                })
                .collect();
            prop_assert_eq!(positions, expected);
        }
    }
}

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use msync_types::Envelope;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::binding::{BoundHandler, HandlerBinding};
use crate::error::HandlerError;
use crate::matcher::match_bindings;
use crate::reconciler::{MissingIdentityPolicy, Reconciler};
use crate::registry::Registry;
use crate::report::{Applied, BindingOutcome, DispatchReport};

/// Configuration for the dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Handling of create/update envelopes that carry no identity value.
    pub missing_identity: MissingIdentityPolicy,
}

/// Runs every binding that matches an envelope, isolating failures.
///
/// Bindings execute synchronously, in registration order, once each. A
/// binding that returns an error or panics is logged and recorded in the
/// [`DispatchReport`]; the remaining bindings still run and nothing is
/// propagated to the caller.
pub struct Dispatcher {
    registry: Arc<Registry>,
    reconciler: Reconciler,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, config: DispatcherConfig) -> Self {
        Self {
            registry,
            reconciler: Reconciler::new(config.missing_identity),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Match `envelope` against the registry and dispatch it.
    pub fn process(&self, envelope: &Envelope) -> DispatchReport {
        let bindings = match_bindings(&self.registry, envelope);
        if bindings.is_empty() {
            debug!(
                class = %envelope.class,
                action = %envelope.action,
                "no bindings matched, ignoring message"
            );
        } else {
            info!(
                class = %envelope.class,
                action = %envelope.action,
                id = ?envelope.identity(),
                payload = ?envelope.payload,
                bindings = bindings.len(),
                "processing message"
            );
        }

        let report = self.dispatch(envelope, &bindings);

        if !report.is_noop() {
            info!(
                class = %envelope.class,
                action = %envelope.action,
                id = ?envelope.identity(),
                failures = report.failure_count(),
                elapsed_us = report.elapsed.as_micros() as u64,
                "processed message"
            );
        }
        report
    }

    /// Invoke the given bindings for `envelope`, in order.
    pub fn dispatch(&self, envelope: &Envelope, bindings: &[&HandlerBinding]) -> DispatchReport {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let binding_start = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| self.invoke(envelope, binding)))
                .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic))));
            let elapsed = binding_start.elapsed();

            let result = result.map_err(|err| {
                error!(
                    class = %envelope.class,
                    action = %envelope.action,
                    id = ?envelope.identity(),
                    payload = ?envelope.payload,
                    binding = %binding.label(),
                    error = %err,
                    "error processing message"
                );
                err.to_string()
            });

            outcomes.push(BindingOutcome {
                binding: binding.label(),
                mode: binding.mode(),
                elapsed,
                result,
            });
        }

        DispatchReport {
            class: envelope.class.clone(),
            action: envelope.action.to_string(),
            id: envelope.identity().cloned(),
            outcomes,
            elapsed: started.elapsed(),
        }
    }

    fn invoke(&self, envelope: &Envelope, binding: &HandlerBinding) -> Result<Applied, HandlerError> {
        match &binding.handler {
            BoundHandler::Direct(handler) => {
                handler(&envelope.payload)?;
                Ok(Applied::Invoked)
            }
            BoundHandler::Reconciling(_) => self.reconciler.reconcile(envelope, binding),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bindings", &self.registry.len())
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use msync_store::{InMemoryRepository, ModelSchema, Record};
    use msync_types::{Action, Payload, Value};
    use serde_json::json;

    use crate::reconciler::ModelTarget;
    use crate::registry::SubscribeSettings;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recording(calls: &Calls, name: &'static str) -> impl Fn(&Payload) -> Result<(), HandlerError> {
        let calls = Arc::clone(calls);
        move |_: &Payload| {
            calls.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn dispatcher(builder: crate::RegistryBuilder) -> Dispatcher {
        Dispatcher::new(Arc::new(builder.build()), DispatcherConfig::default())
    }

    #[test]
    fn direct_handler_receives_payload() {
        let seen: Arc<Mutex<Option<Payload>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut builder = Registry::builder();
        builder.class_handler("User", "greeting", move |payload| {
            *sink.lock().unwrap() = Some(payload.clone());
            Ok(())
        });
        builder
            .register_subscribe("User", SubscribeSettings::class_action("greeting"))
            .unwrap();

        let envelope =
            Envelope::new("User", Action::Custom("greeting".into())).with_value("msg", "hi");
        let report = dispatcher(builder).process(&envelope);

        assert!(report.is_clean());
        assert_eq!(report.outcomes[0].result, Ok(Applied::Invoked));
        assert_eq!(seen.lock().unwrap().as_ref().unwrap()["msg"], json!("hi"));
    }

    #[test]
    fn failing_binding_does_not_stop_the_next_one() {
        let calls: Calls = Arc::default();
        let mut builder = Registry::builder();
        builder.class_handler("A", "ping", |_| Err(HandlerError::handler("boom")));
        builder.class_handler("B", "ping", recording(&calls, "B"));
        builder
            .register_subscribe("A", SubscribeSettings::class_action("ping").as_class("Topic"))
            .unwrap()
            .register_subscribe("B", SubscribeSettings::class_action("ping").as_class("Topic"))
            .unwrap();

        let envelope = Envelope::new("Topic", Action::Custom("ping".into())).with_value("x", 1);
        let report = dispatcher(builder).process(&envelope);

        assert_eq!(report.matched(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.outcomes[0].result, Err("handler failed: boom".to_string()));
        assert_eq!(report.outcomes[1].result, Ok(Applied::Invoked));
        assert_eq!(*calls.lock().unwrap(), vec!["B"]);
    }

    #[test]
    fn panicking_binding_is_isolated() {
        let calls: Calls = Arc::default();
        let mut builder = Registry::builder();
        builder.class_handler("A", "ping", |_| panic!("kaboom"));
        builder.class_handler("B", "ping", recording(&calls, "B"));
        builder
            .register_subscribe("A", SubscribeSettings::class_action("ping").as_class("Topic"))
            .unwrap()
            .register_subscribe("B", SubscribeSettings::class_action("ping").as_class("Topic"))
            .unwrap();

        let envelope = Envelope::new("Topic", Action::Custom("ping".into())).with_value("x", 1);
        let report = dispatcher(builder).process(&envelope);

        assert_eq!(
            report.outcomes[0].result,
            Err("handler panicked: kaboom".to_string())
        );
        assert!(report.outcomes[1].is_ok());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[derive(Clone, Debug, Default)]
    struct Ticket {
        id: Option<i64>,
        title: Option<String>,
    }

    #[test]
    fn rejected_save_does_not_stop_the_next_binding() {
        let schema = Arc::new(
            ModelSchema::<Ticket>::builder("Ticket")
                .field("id", |t: &Ticket| t.id, |t, v| t.id = v)
                .field("title", |t: &Ticket| t.title.clone(), |t, v| t.title = v)
                .validate("title", |t: &Ticket| match t.title.as_deref() {
                    Some("") | None => Err("can't be blank".into()),
                    _ => Ok(()),
                })
                .build()
                .unwrap(),
        );
        let repo = Arc::new(InMemoryRepository::new(Arc::clone(&schema)));
        let calls: Calls = Arc::default();

        let mut builder = Registry::builder();
        builder.model(ModelTarget::new(schema, Arc::clone(&repo)));
        builder.class_handler("Audit", "create", recording(&calls, "audit"));
        builder
            .register_subscribe("Ticket", SubscribeSettings::model(["title"]))
            .unwrap()
            .register_subscribe("Audit", SubscribeSettings::class_action("create").as_class("Ticket"))
            .unwrap();

        let envelope = Envelope::new("Ticket", Action::Create)
            .with_id(7)
            .with_value("title", "");
        let report = dispatcher(builder).process(&envelope);

        assert_eq!(report.matched(), 2);
        assert_eq!(report.failure_count(), 1);
        let err = report.outcomes[0].result.clone().unwrap_err();
        assert!(err.contains("validation failed for Ticket"), "{err}");
        assert_eq!(report.outcomes[1].result, Ok(Applied::Invoked));
        assert_eq!(*calls.lock().unwrap(), vec!["audit"]);
        assert!(repo.is_empty());
    }

    #[test]
    fn exhausted_key_space_fails_one_envelope_only() {
        let schema = Arc::new(ModelSchema::record("Note", "id", &["body"]).unwrap());
        let repo = Arc::new(InMemoryRepository::new(Arc::clone(&schema)));
        let mut builder = Registry::builder();
        builder.model(ModelTarget::new(schema, Arc::clone(&repo)));
        builder
            .register_subscribe("Note", SubscribeSettings::model(["body"]))
            .unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(builder.build()),
            DispatcherConfig {
                missing_identity: MissingIdentityPolicy::Mint,
            },
        );
        let create = |id: Option<u64>| {
            let envelope = Envelope::new("Note", Action::Create).with_value("body", "b");
            match id {
                Some(id) => envelope.with_id(id),
                None => envelope,
            }
        };

        assert!(dispatcher.process(&create(Some(u64::MAX))).is_clean());
        let report = dispatcher.process(&create(None));
        assert_eq!(
            report.outcomes[0].result,
            Err("store error: storage backend error: primary key space exhausted".to_string())
        );
        assert!(dispatcher.process(&create(Some(1))).is_clean());
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn unmatched_envelope_is_a_noop() {
        let builder = Registry::builder();
        let envelope = Envelope::new("Nobody", Action::Create).with_value("x", 1);
        let report = dispatcher(builder).process(&envelope);
        assert!(report.is_noop());
        assert!(report.is_clean());
    }

    #[test]
    fn each_matching_binding_runs_once_in_order() {
        let calls: Calls = Arc::default();
        let mut builder = Registry::builder();
        builder.class_handler("A", "ping", recording(&calls, "A"));
        builder.class_handler("B", "ping", recording(&calls, "B"));
        builder.class_handler("C", "ping", recording(&calls, "C"));
        for class in ["B", "A", "C"] {
            builder
                .register_subscribe(class, SubscribeSettings::class_action("ping").as_class("Topic"))
                .unwrap();
        }

        let envelope = Envelope::new("Topic", Action::Custom("ping".into())).with_value("x", 1);
        dispatcher(builder).process(&envelope);
        assert_eq!(*calls.lock().unwrap(), vec!["B", "A", "C"]);
    }

    #[test]
    fn reconciling_bindings_share_dispatch_with_direct_ones() {
        let schema = Arc::new(ModelSchema::record("SampleUser", "id", &["title"]).unwrap());
        let repo = Arc::new(InMemoryRepository::new(Arc::clone(&schema)));
        let calls: Calls = Arc::default();

        let mut builder = Registry::builder();
        builder.model(ModelTarget::new(schema, Arc::clone(&repo)));
        builder.class_handler("Audit", "create", recording(&calls, "audit"));
        builder
            .register_subscribe("SampleUser", SubscribeSettings::model(["title"]))
            .unwrap()
            .register_subscribe(
                "Audit",
                SubscribeSettings::class_action("create").as_class("SampleUser"),
            )
            .unwrap();

        let envelope = Envelope::new("SampleUser", Action::Create)
            .with_id(5)
            .with_value("title", "t");
        let report = dispatcher(builder).process(&envelope);

        assert!(report.is_clean());
        assert_eq!(report.outcomes[0].result, Ok(Applied::Created));
        assert_eq!(report.outcomes[1].result, Ok(Applied::Invoked));
        let stored: Record = repo.get(&json!(5)).unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&json!("t")));
        assert_eq!(report.id, Some(Value::from(5)));
    }

    #[test]
    fn missing_identity_policy_flows_from_config() {
        let schema = Arc::new(ModelSchema::record("Note", "id", &["body"]).unwrap());
        let repo = Arc::new(InMemoryRepository::new(Arc::clone(&schema)));
        let mut builder = Registry::builder();
        builder.model(ModelTarget::new(schema, Arc::clone(&repo)));
        builder
            .register_subscribe("Note", SubscribeSettings::model(["body"]))
            .unwrap();
        let registry = Arc::new(builder.build());
        let envelope = Envelope::new("Note", Action::Create).with_value("body", "b");

        let strict = Dispatcher::new(Arc::clone(&registry), DispatcherConfig::default());
        assert_eq!(strict.process(&envelope).failure_count(), 1);
        assert!(repo.is_empty());

        let lenient = Dispatcher::new(
            registry,
            DispatcherConfig {
                missing_identity: MissingIdentityPolicy::Mint,
            },
        );
        assert!(lenient.process(&envelope).is_clean());
        assert_eq!(repo.len(), 1);
    }
}

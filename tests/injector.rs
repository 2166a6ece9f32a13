use annotated_inject::{
    injector_of, module, Annotated, Annotation, Dep, InjectError, Lazy, Module, Provider,
    RegistryError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;

struct Value;
impl Annotation for Value {}

struct Doubled;
impl Annotation for Doubled {}

struct Missing;
impl Annotation for Missing {}

#[derive(Error, Debug, PartialEq)]
#[error("boom")]
struct TestError;

struct BaseModule;

impl Module for BaseModule {
    fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
        Ok(vec![
            Provider::new(|| Annotated::<_, Value>::new(17)),
            Provider::new(|value: Dep<i32, Value>| Annotated::<_, Doubled>::new(*value * 2)),
        ])
    }
}

struct CountingModule {
    calls: Arc<AtomicUsize>,
    cached: bool,
}

impl Module for CountingModule {
    fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
        let calls = Arc::clone(&self.calls);
        Ok(vec![Provider::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Annotated::<_, Value>::new(17)
        })
        .cached(self.cached)])
    }
}

#[test]
fn should_provide_a_direct_value() {
    let injector = injector_of([module(BaseModule)]).unwrap();
    assert_eq!(*injector.get::<i32, Value>().unwrap(), 17);
}

#[test]
fn should_provide_a_transitive_value() {
    let injector = injector_of([module(BaseModule)]).unwrap();
    assert_eq!(*injector.get::<i32, Doubled>().unwrap(), 34);
}

#[test]
fn should_report_missing_provider() {
    let injector = injector_of([module(BaseModule)]).unwrap();

    let error = injector.get::<i32, Missing>().unwrap_err();
    assert!(matches!(error.root_cause(), InjectError::NoProviderFound));
    assert!(error.to_string().contains("Missing"));
}

#[test]
fn should_report_key_chain_for_transitive_failure() {
    struct BrokenModule;

    impl Module for BrokenModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            Ok(vec![Provider::new(|value: Dep<i32, Missing>| {
                Annotated::<_, Doubled>::new(*value * 2)
            })])
        }
    }

    let injector = injector_of([module(BrokenModule)]).unwrap();

    let error = injector.get::<i32, Doubled>().unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.contains("Doubled"));
    assert!(rendered.contains("Missing"));
    assert!(rendered.contains("no provider found"));
}

#[test]
fn should_provide_from_fallible_provider() {
    struct FallibleModule;

    impl Module for FallibleModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            Ok(vec![Provider::new(|| {
                Ok::<_, TestError>(Annotated::<_, Value>::new(17))
            })])
        }
    }

    let injector = injector_of([module(FallibleModule)]).unwrap();
    assert_eq!(*injector.get::<i32, Value>().unwrap(), 17);
}

#[test]
fn should_surface_provider_error_as_root_cause() {
    struct FailingModule;

    impl Module for FailingModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            Ok(vec![
                Provider::new(|| Err::<Annotated<i32, Value>, _>(TestError)),
                Provider::new(|value: Dep<i32, Value>| Annotated::<_, Doubled>::new(*value * 2)),
            ])
        }
    }

    let injector = injector_of([module(FailingModule)]).unwrap();

    let error = injector.get::<i32, Doubled>().unwrap_err();
    let cause = error.provider_error().unwrap();
    assert_eq!(cause.downcast_ref::<TestError>(), Some(&TestError));
    assert!(error.to_string().contains("boom"));
}

#[test]
#[should_panic(expected = "boom")]
fn should_propagate_provider_panics() {
    struct PanickingModule;

    impl Module for PanickingModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            Ok(vec![Provider::new(|| -> Annotated<i32, Value> {
                panic!("boom")
            })])
        }
    }

    let injector = injector_of([module(PanickingModule)]).unwrap();
    let _ = injector.get::<i32, Value>();
}

#[test]
fn should_resolve_eager_arguments_left_to_right() {
    struct First;
    impl Annotation for First {}

    struct Second;
    impl Annotation for Second {}

    struct OrderedModule {
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Module for OrderedModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            let first = Arc::clone(&self.order);
            let second = Arc::clone(&self.order);
            Ok(vec![
                Provider::new(move || {
                    first.lock().unwrap().push("first");
                    Annotated::<_, First>::new(1)
                }),
                Provider::new(move || {
                    second.lock().unwrap().push("second");
                    Annotated::<_, Second>::new(2)
                }),
                Provider::new(|left: Dep<i32, First>, right: Dep<i32, Second>| {
                    Annotated::<_, Doubled>::new(*left + *right)
                }),
            ])
        }
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let injector = injector_of([module(OrderedModule {
        order: Arc::clone(&order),
    })])
    .unwrap();

    assert_eq!(*injector.get::<i32, Doubled>().unwrap(), 3);
    assert_eq!(*order.lock().unwrap(), ["first", "second"]);
}

#[test]
fn should_invoke_uncached_provider_per_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(CountingModule {
        calls: Arc::clone(&calls),
        cached: false,
    })])
    .unwrap();

    injector.get::<i32, Value>().unwrap();
    injector.get::<i32, Value>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn should_invoke_cached_provider_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(CountingModule {
        calls: Arc::clone(&calls),
        cached: true,
    })])
    .unwrap();

    let first = injector.get::<i32, Value>().unwrap();
    let second = injector.get::<i32, Value>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn should_memoize_cached_provider_errors() {
    struct FailingCountingModule {
        calls: Arc<AtomicUsize>,
    }

    impl Module for FailingCountingModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            let calls = Arc::clone(&self.calls);
            Ok(vec![Provider::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Annotated<i32, Value>, _>(TestError)
            })
            .cached(true)])
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(FailingCountingModule {
        calls: Arc::clone(&calls),
    })])
    .unwrap();

    injector.get::<i32, Value>().unwrap_err();
    let error = injector.get::<i32, Value>().unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(error.provider_error().unwrap().downcast_ref::<TestError>().is_some());
}

#[test]
fn should_not_resolve_unused_lazy_arguments() {
    struct LazyModule {
        calls: Arc<AtomicUsize>,
    }

    impl Module for LazyModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            let calls = Arc::clone(&self.calls);
            Ok(vec![
                Provider::new(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Annotated::<_, Value>::new(17)
                }),
                Provider::new(|_unused: Lazy<i32, Value>| Annotated::<_, Doubled>::new(0)),
            ])
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(LazyModule {
        calls: Arc::clone(&calls),
    })])
    .unwrap();

    assert_eq!(*injector.get::<i32, Doubled>().unwrap(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn should_resolve_lazy_arguments_on_demand() {
    struct LazyModule {
        calls: Arc<AtomicUsize>,
    }

    impl Module for LazyModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            let calls = Arc::clone(&self.calls);
            Ok(vec![
                Provider::new(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Annotated::<_, Value>::new(17)
                }),
                Provider::new(|value: Lazy<i32, Value>| {
                    let first = *value.get().unwrap();
                    let second = *value.get().unwrap();
                    Annotated::<_, Doubled>::new(first + second)
                }),
            ])
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(LazyModule {
        calls: Arc::clone(&calls),
    })])
    .unwrap();

    assert_eq!(*injector.get::<i32, Doubled>().unwrap(), 34);
    // the lazy target is uncached, so each get re-runs its provider
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn should_resolve_cached_lazy_target_once() {
    struct LazyCachedModule {
        calls: Arc<AtomicUsize>,
    }

    impl Module for LazyCachedModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            let calls = Arc::clone(&self.calls);
            Ok(vec![
                Provider::new(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Annotated::<_, Value>::new(17)
                })
                .cached(true),
                Provider::new(|value: Lazy<i32, Value>| {
                    let first = *value.get().unwrap();
                    let second = *value.get().unwrap();
                    Annotated::<_, Doubled>::new(first + second)
                }),
            ])
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(LazyCachedModule {
        calls: Arc::clone(&calls),
    })])
    .unwrap();

    assert_eq!(*injector.get::<i32, Doubled>().unwrap(), 34);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "invoked after its provider call returned")]
fn should_panic_on_lazy_use_after_provider_returns() {
    struct SmugglingModule {
        slot: Arc<Mutex<Option<Lazy<i32, Value>>>>,
    }

    impl Module for SmugglingModule {
        fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
            let slot = Arc::clone(&self.slot);
            Ok(vec![
                Provider::new(|| Annotated::<_, Value>::new(17)),
                Provider::new(move |value: Lazy<i32, Value>| {
                    *slot.lock().unwrap() = Some(value.clone());
                    Annotated::<_, Doubled>::new(0)
                }),
            ])
        }
    }

    let slot = Arc::new(Mutex::new(None));
    let injector = injector_of([module(SmugglingModule {
        slot: Arc::clone(&slot),
    })])
    .unwrap();

    injector.get::<i32, Doubled>().unwrap();

    let smuggled = slot.lock().unwrap().take().unwrap();
    let _ = smuggled.get();
}

#[test]
fn should_run_cached_provider_once_under_concurrency() {
    let calls = Arc::new(AtomicUsize::new(0));
    let injector = injector_of([module(CountingModule {
        calls: Arc::clone(&calls),
        cached: true,
    })])
    .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let injector = injector.clone();
            thread::spawn(move || *injector.get::<i32, Value>().unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 17);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn should_resolve_by_runtime_annotation() {
    let injector = injector_of([module(BaseModule)]).unwrap();
    assert_eq!(*injector.get_annotated::<i32>(&Doubled).unwrap(), 34);
}

#[test]
#[should_panic(expected = "failed to provide value")]
fn should_panic_in_must_get_on_failure() {
    let injector = injector_of([module(BaseModule)]).unwrap();
    injector.must_get::<i32, Missing>();
}

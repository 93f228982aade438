use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_model_parse_and_display() {
    assert_eq!("memoize".parse::<ConcurrencyModel>().unwrap(), ConcurrencyModel::Memoize);
    assert_eq!("NONE".parse::<ConcurrencyModel>().unwrap(), ConcurrencyModel::None);
    assert_eq!("single".parse::<ConcurrencyModel>().unwrap(), ConcurrencyModel::None);
    assert_eq!("threadpool".parse::<ConcurrencyModel>().unwrap(), ConcurrencyModel::ThreadPool);
    assert!("bogus".parse::<ConcurrencyModel>().is_err());
    assert_eq!(ConcurrencyModel::Memoize.to_string(), "memoize");
}

#[test]
fn test_default_model_is_memoize() {
    assert_eq!(ConcurrencyModel::default(), ConcurrencyModel::Memoize);
}

#[test]
fn test_memoize_save_load_has_key() {
    let param: ConcurrentParam<f64> = ConcurrentParam::new(ConcurrencyModel::Memoize).unwrap();
    assert!(!param.has_key(7).unwrap());
    assert!(matches!(param.load(7), Err(Error::KeyNotFound(7))));

    param.save(7, 1.5).unwrap();
    assert!(param.has_key(7).unwrap());
    assert_eq!(param.load(7).unwrap(), 1.5);

    // overwrite
    param.save(7, 2.5).unwrap();
    assert_eq!(param.load(7).unwrap(), 2.5);
    assert_eq!(param.len().unwrap(), 1);
}

#[test]
fn test_none_model_shares_one_slot() {
    let param: ConcurrentParam<String> = ConcurrentParam::new(ConcurrencyModel::None).unwrap();
    assert!(param.is_empty().unwrap());
    assert!(matches!(param.load(0), Err(Error::KeyNotFound(_))));

    param.save(1, "a".to_string()).unwrap();
    assert_eq!(param.load(99).unwrap(), "a");
    param.save(2, "b".to_string()).unwrap();
    assert_eq!(param.load(1).unwrap(), "b");
    assert_eq!(param.len().unwrap(), 1);
}

#[test]
fn test_none_model_has_key_is_misuse() {
    let param: ConcurrentParam<i64> = ConcurrentParam::new(ConcurrencyModel::None).unwrap();
    assert!(matches!(param.has_key(0), Err(Error::ModelMisuse(_))));
}

#[test]
fn test_threadpool_not_implemented() {
    let param = ConcurrentParam::<i64>::new(ConcurrencyModel::ThreadPool);
    assert!(matches!(param, Err(Error::NotImplemented(_))));
    assert!(matches!(
        ConcurrencyModel::ThreadPool.key_for_run(100),
        Err(Error::NotImplemented(_))
    ));
    assert!(matches!(
        ReloadGate::new(ConcurrencyModel::ThreadPool),
        Err(Error::NotImplemented(_))
    ));
}

#[test]
fn test_key_for_run() {
    assert_eq!(ConcurrencyModel::None.key_for_run(100).unwrap(), SINGLE_SLOT_KEY);
    assert_eq!(ConcurrencyModel::None.key_for_run(200).unwrap(), SINGLE_SLOT_KEY);

    let a = ConcurrencyModel::Memoize.key_for_run(100).unwrap();
    let b = ConcurrencyModel::Memoize.key_for_run(100).unwrap();
    let c = ConcurrencyModel::Memoize.key_for_run(200).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_gate_reloads_once_per_run() {
    let gate = ReloadGate::new(ConcurrencyModel::Memoize).unwrap();
    let calls = AtomicUsize::new(0);

    let k1 = gate.prepare_event(100, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }).unwrap();
    let k2 = gate.prepare_event(100, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }).unwrap();

    assert_eq!(k1, k2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(gate.reload_count(), 1);
    assert_eq!(gate.run_number(k1).unwrap(), 100);
}

#[test]
fn test_gate_none_model_reloads_on_run_change() {
    let gate = ReloadGate::new(ConcurrencyModel::None).unwrap();
    for run in [100, 100, 200, 200, 100] {
        gate.prepare_event(run, |_| Ok(())).unwrap();
    }
    assert_eq!(gate.reload_count(), 3);
}

#[test]
fn test_gate_failed_reload_is_retried() {
    let gate = ReloadGate::new(ConcurrencyModel::Memoize).unwrap();
    let err = gate.prepare_event(5, |_| Err(Error::Internal("boom".to_string())));
    assert!(err.is_err());
    assert_eq!(gate.reload_count(), 0);

    gate.prepare_event(5, |_| Ok(())).unwrap();
    assert_eq!(gate.reload_count(), 1);
}

#[test]
fn test_gate_concurrent_runs_see_their_own_values() {
    // Two threads alternate between two run numbers; every derived value
    // loaded must belong to the run that produced the key.
    let gate = Arc::new(ReloadGate::new(ConcurrencyModel::Memoize).unwrap());
    let derived = Arc::new(ConcurrentParam::<i64>::new(ConcurrencyModel::Memoize).unwrap());

    let handles: Vec<_> = [(1000_i64, 2000_i64), (2000, 1000)]
        .into_iter()
        .map(|(first, second)| {
            let gate = Arc::clone(&gate);
            let derived = Arc::clone(&derived);
            thread::spawn(move || {
                for i in 0..1000 {
                    let run = if i % 2 == 0 { first } else { second };
                    let key = gate
                        .prepare_event(run, |key| derived.save(key, run * 10))
                        .unwrap();
                    assert_eq!(derived.load(key).unwrap(), run * 10);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(gate.reload_count(), 2);
}

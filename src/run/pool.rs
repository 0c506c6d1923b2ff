use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// Applies `f` to every item on at most `workers` threads.
///
/// Each worker pulls the next unclaimed index and sends back its own result;
/// the caller gets results in input order.
pub fn map_bounded<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<Result<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, items.len());
    if workers == 1 {
        return items.iter().map(&f).collect();
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<R>)>();
    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let f = &f;
            scope.spawn(move || {
                loop {
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(idx) else {
                        break;
                    };
                    if tx.send((idx, f(item))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut slots = (0..items.len())
        .map(|_| None)
        .collect::<Vec<Option<Result<R>>>>();
    for (idx, res) in rx {
        slots[idx] = Some(res);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| Err(anyhow::anyhow!("worker dropped item {idx}")))
        })
        .collect()
}

/// Like [`map_bounded`] but fails on the first error in input order.
pub fn try_map_bounded<T, R, F>(items: &[T], workers: usize, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    map_bounded(items, workers, f).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn preserves_input_order() {
        let items = (0..50).collect::<Vec<u32>>();
        let out = try_map_bounded(&items, 4, |v| Ok(v * 2)).unwrap();
        assert_eq!(out, items.iter().map(|v| v * 2).collect::<Vec<_>>());
    }

    #[test]
    fn reports_each_failure_in_place() {
        let items = vec![1, 2, 3];
        let out = map_bounded(&items, 3, |v| {
            if *v == 2 {
                bail!("boom on {v}")
            }
            Ok(*v)
        });
        assert!(out[0].is_ok());
        assert!(format!("{}", out[1].as_ref().unwrap_err()).contains("boom on 2"));
        assert!(out[2].is_ok());
        let failed = try_map_bounded(&items, 2, |v| {
            if *v == 3 {
                bail!("boom on {v}")
            }
            Ok(*v)
        });
        assert!(failed.is_err());
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let items: Vec<u8> = Vec::new();
        assert!(map_bounded(&items, 8, |v| Ok(*v)).is_empty());
    }
}

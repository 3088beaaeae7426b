//! Static partitioning of fixture lists across worker threads.
//!
//! There's no work stealing or queueing here: a list is cut into `shards` contiguous ranges up front and each range gets
//! one thread.  The shard count is therefore also the maximum number of toolchain processes alive at once, and there are
//! never more shards than items.
use std::num::NonZeroUsize;
use std::ops::Range;

use crossbeam::thread::{Scope, ScopedJoinHandle};

use crate::error::{Error, Result};

/// The range of `0..len` handled by shard `index` of `shards`.
///
/// Ranges of successive indices are adjacent and together cover `0..len` exactly.  Their lengths differ by at most one.
/// When `len < shards`, some ranges are empty.
pub fn shard_range(len: usize, shards: NonZeroUsize, index: usize) -> Range<usize> {
    let shards = shards.get();
    debug_assert!(index < shards);

    let start = (index * len / shards).min(len);
    let end = ((index + 1) * len / shards).min(len);
    start..end
}

/// How many shards `len` items are actually cut into: never more than there are items.
pub fn effective_shards(len: usize, shards: NonZeroUsize) -> Option<NonZeroUsize> {
    NonZeroUsize::new(len.min(shards.get()))
}

/// Threads started by [spawn_shards].
pub struct Spawned<'scope, R> {
    pub handles: Vec<ScopedJoinHandle<'scope, R>>,

    /// How many items the started threads were handed between them.
    pub items: usize,

    /// Set if a thread couldn't be started.  No further shards were attempted, but the ones in `handles` are running
    /// and must still be joined.
    pub error: Option<Error>,
}

/// Spawn one thread per shard of `items` on `scope`, handing each its slice and shard index.
///
/// The shard count is capped at `items.len()`, so every thread gets at least one item and an empty list spawns
/// nothing.
pub fn spawn_shards<'scope, 'env, T, R, F>(
    scope: &'scope Scope<'env>,
    items: &'env [T],
    shards: NonZeroUsize,
    worker: &'env F,
) -> Spawned<'scope, R>
where
    T: Sync,
    R: Send + 'env,
    F: Fn(usize, &'env [T]) -> R + Sync,
{
    let mut spawned = Spawned {
        handles: vec![],
        items: 0,
        error: None,
    };
    let Some(shards) = effective_shards(items.len(), shards) else {
        return spawned;
    };

    for index in 0..shards.get() {
        let slice = &items[shard_range(items.len(), shards, index)];
        let name = format!("shard-{index}");
        match scope
            .builder()
            .name(name.clone())
            .spawn(move |_| worker(index, slice))
        {
            Ok(handle) => {
                spawned.handles.push(handle);
                spawned.items += slice.len();
            }
            Err(e) => {
                spawned.error = Some(Error::spawn(&name, e));
                break;
            }
        }
    }

    spawned
}

/// Run `worker` over every shard of `items` in parallel and wait for all of them.
///
/// Results come back in shard order, one per non-empty shard.  A panicking worker panics the caller once every other
/// worker has finished.  If a thread can't be started, the ones that were are still waited for before the error is
/// returned.
pub fn run_sharded<T, R, F>(items: &[T], shards: NonZeroUsize, worker: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &[T]) -> R + Sync,
{
    crossbeam::scope(|s| {
        let spawned = spawn_shards(s, items, shards, &worker);
        let results = spawned
            .handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
            .collect::<Vec<R>>();

        match spawned.error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    })
    .unwrap_or_else(|p| std::panic::resume_unwind(p))
}

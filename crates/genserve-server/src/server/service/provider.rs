/// Supplies a freshly computed message when a `Latest` request cannot be
/// satisfied from the cache.
///
/// Called at most once per request, on a blocking-capable thread, so
/// implementations may perform expensive or blocking work. A returned message
/// is published like any other: it gets the next generation and enters the
/// cache.
pub trait LatestProvider<M>: Send + Sync {
    fn latest(&self) -> Option<M>;
}

impl<M, F> LatestProvider<M> for F
where
    F: Fn() -> Option<M> + Send + Sync,
{
    fn latest(&self) -> Option<M> {
        self()
    }
}

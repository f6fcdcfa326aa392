use tokio::{
    runtime::{Handle, RuntimeFlavor},
    task,
};

/// Runs the CPU bound `f` from async code without starving the runtime.
///
/// On a multi threaded runtime the worker hands its other tasks off through `block_in_place`.
/// Current thread runtimes, where that would panic, and callers outside any runtime run `f`
/// inline.
pub fn run_cpu_bound<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => task::block_in_place(f),
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_inline_on_a_current_thread_runtime() {
        assert_eq!(run_cpu_bound(|| 2 + 2), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_on_a_multi_thread_runtime() {
        assert_eq!(run_cpu_bound(|| 2 + 2), 4);
    }

    #[test]
    fn runs_outside_a_runtime() {
        assert_eq!(run_cpu_bound(|| 2 + 2), 4);
    }
}

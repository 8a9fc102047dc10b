//! Tracy profiler integration.
//!
//! With the `tracy` feature, page counts per lifecycle state are plotted
//! whenever they change. Without it this is a no-op.

/// Plot the number of pages in each list.
#[inline]
pub(crate) fn plot_page_counts(unused: usize, used: usize, pending: usize) {
    #[cfg(feature = "tracy")]
    {
        if let Some(client) = tracy_client::Client::running() {
            client.plot(tracy_client::plot_name!("fencealloc unused pages"), unused as f64);
            client.plot(tracy_client::plot_name!("fencealloc used pages"), used as f64);
            client.plot(tracy_client::plot_name!("fencealloc pending pages"), pending as f64);
        }
    }

    #[cfg(not(feature = "tracy"))]
    let _ = (unused, used, pending);
}

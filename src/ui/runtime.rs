use once_cell::sync::Lazy;
use tokio::sync::{mpsc, oneshot};

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

/// Runs `fut` on the tokio runtime and hands its output to `on_done` on the GTK main loop.
pub fn run_async_to_main<T, Fut>(fut: Fut, on_done: impl FnOnce(T) + 'static)
where
    T: Send + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    RUNTIME.spawn(async move {
        let _ = tx.send(fut.await);
    });
    glib::MainContext::default().spawn_local(async move {
        if let Ok(value) = rx.await {
            on_done(value);
        }
    });
}

/// Delivers every item of `rx` to `on_item` on the GTK main loop until the sender goes away.
pub fn forward_to_main<T: 'static>(mut rx: mpsc::UnboundedReceiver<T>, mut on_item: impl FnMut(T) + 'static) {
    glib::MainContext::default().spawn_local(async move {
        while let Some(item) = rx.recv().await {
            on_item(item);
        }
    });
}

//! Platform timers for admission pacing.

use instant::Duration;

/// The clock pacing windows are measured on. Natively this is tokio's clock so
/// it agrees with [`sleep`], including when tokio time is paused.
#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::Instant;

#[cfg(target_arch = "wasm32")]
pub use instant::Instant;

/// Suspend the current task for `duration`.
///
/// Natively this needs a tokio runtime with the time driver enabled.
#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tokio::time::sleep(duration).await;
}

/// Suspend the current task for `duration`.
///
/// Backed by `setTimeout`; resolves immediately when no window is available
/// (for instance inside a worker without a global window).
#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    let millis = duration.as_millis().min(i32::MAX as u128) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

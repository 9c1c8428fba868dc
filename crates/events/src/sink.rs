use async_trait::async_trait;

/// Abstracts the controller's single WebSocket connection so this crate
/// never depends on `axum`'s transport types directly — `resonance-server`
/// upgrades the connection and hands this crate a thin adapter.
#[async_trait]
pub trait ControllerSink: Send + Sync {
    async fn send_text(&mut self, text: String) -> bool;
    async fn close(&mut self, code: u16, reason: &str);
}

use thiserror::Error;

/// Ошибки синхронизации. Все восстановимые: худший исход —
/// нет синхронизации до переподключения.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Канал к rendezvous-сервису закрыт или оборван
    #[error("signaling channel lost")]
    SignalingLost,

    /// Data channel ещё не открыт (или уже закрыт)
    #[error("data channel is not open")]
    ChannelNotOpen,

    /// Пришёл offer, пока предыдущий ещё обрабатывается
    #[error("unexpected offer while a negotiation is in flight")]
    UnexpectedOffer,

    /// Известный префикс, но нагрузка не разбирается
    #[error("malformed envelope payload: {0}")]
    MalformedEnvelope(String),

    /// Ни один известный префикс не подошёл
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("webrtc error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

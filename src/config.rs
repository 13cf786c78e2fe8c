// Конфигурация приложения
// Логирование можно отключить только в режиме разработки

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене логирование отключено

// Дополнительные настройки для режима разработки
#[cfg(debug_assertions)]
pub mod dev {
    // Для полного отключения логирования в режиме разработки
    // измените эту константу на false
    // ВАЖНО: Эта настройка работает только в debug режиме!
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    // В продакшене все дополнительные настройки отключены
    pub const ENABLE_LOGGING: bool = false;
}

/// Шаг интерполяции штриха по умолчанию (в координатах поверхности)
pub const DEFAULT_STROKE_STEP: f64 = 0.01;

/// Параметры синхронизации: rendezvous-сервис, ICE серверы, шаг штриха
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub signaling_url: String,
    pub ice_urls: Vec<String>,
    pub stroke_step: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8080/websocket".into(),
            ice_urls: vec![
                "stun:stun.l.google.com:19302".into(),
                "stun:stun1.l.google.com:19302".into(),
            ],
            stroke_step: DEFAULT_STROKE_STEP,
        }
    }
}

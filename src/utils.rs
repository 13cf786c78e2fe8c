use rand::Rng;

/// Случайный hex-идентификатор соединения
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

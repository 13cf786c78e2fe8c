use std::sync::{Arc, Mutex};

/// Хранилище выбранного имени между сессиями. В приложении это
/// localStorage, в тестах — память.
pub trait NicknameStore: Send {
    fn get_nickname(&self) -> Option<String>;
    fn set_nickname(&mut self, nickname: &str);
}

/// Память вместо localStorage: для тестов и headless-встраиваний
#[derive(Debug, Clone, Default)]
pub struct MemoryNicknameStore {
    nickname: Arc<Mutex<Option<String>>>,
}

impl MemoryNicknameStore {
    pub fn with_nickname(nickname: &str) -> Self {
        Self {
            nickname: Arc::new(Mutex::new(Some(nickname.to_string()))),
        }
    }
}

impl NicknameStore for MemoryNicknameStore {
    fn get_nickname(&self) -> Option<String> {
        self.nickname.lock().unwrap().clone()
    }

    fn set_nickname(&mut self, nickname: &str) {
        *self.nickname.lock().unwrap() = Some(nickname.to_string());
    }
}

/// Этап жизненного цикла сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Registering,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectionEstablished,
    SetNickname(String),
    SubmitNickname,
}

/// Эффекты перехода; исполняет их композиция, не машина
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    PersistNickname(String),
    AnnounceNickname(String),
}

/// Машина Loading/Registering/Active. Active — терминальное состояние,
/// имя после входа в него не меняется.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    nickname: String,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Loading,
            nickname: String::new(),
        }
    }

    /// Старт с восстановленным именем: регистрация будет пропущена
    pub fn with_nickname(nickname: impl Into<String>) -> Self {
        Self {
            state: SessionState::Loading,
            nickname: nickname.into(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        match (self.state, event) {
            (SessionState::Loading, SessionEvent::ConnectionEstablished) => {
                if self.nickname.is_empty() {
                    self.state = SessionState::Registering;
                    vec![]
                } else {
                    // возвращающийся пользователь: сразу в работу
                    self.state = SessionState::Active;
                    vec![SessionEffect::AnnounceNickname(self.nickname.clone())]
                }
            }
            (SessionState::Registering, SessionEvent::SetNickname(nickname)) => {
                self.nickname = nickname;
                vec![]
            }
            (SessionState::Registering, SessionEvent::SubmitNickname) => {
                if self.nickname.is_empty() {
                    return vec![];
                }
                self.state = SessionState::Active;
                vec![
                    SessionEffect::PersistNickname(self.nickname.clone()),
                    SessionEffect::AnnounceNickname(self.nickname.clone()),
                ]
            }
            // повторный ConnectionEstablished безвреден
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_user_goes_through_registration() {
        let mut app = SessionMachine::new();
        assert_eq!(app.state(), SessionState::Loading);

        let effects = app.handle(SessionEvent::ConnectionEstablished);
        assert!(effects.is_empty());
        assert_eq!(app.state(), SessionState::Registering);
    }

    #[test]
    fn stored_nickname_skips_registration_and_announces() {
        let mut app = SessionMachine::with_nickname("bob");
        let effects = app.handle(SessionEvent::ConnectionEstablished);
        assert_eq!(app.state(), SessionState::Active);
        assert_eq!(effects, vec![SessionEffect::AnnounceNickname("bob".into())]);
    }

    #[test]
    fn empty_nickname_cannot_be_submitted() {
        let mut app = SessionMachine::new();
        app.handle(SessionEvent::ConnectionEstablished);

        let effects = app.handle(SessionEvent::SubmitNickname);
        assert!(effects.is_empty());
        assert_eq!(app.state(), SessionState::Registering);
    }

    #[test]
    fn submit_persists_and_announces() {
        let mut app = SessionMachine::new();
        app.handle(SessionEvent::ConnectionEstablished);
        app.handle(SessionEvent::SetNickname("alice".into()));

        let effects = app.handle(SessionEvent::SubmitNickname);
        assert_eq!(app.state(), SessionState::Active);
        assert_eq!(
            effects,
            vec![
                SessionEffect::PersistNickname("alice".into()),
                SessionEffect::AnnounceNickname("alice".into()),
            ]
        );
    }

    #[test]
    fn connection_established_is_idempotent() {
        let mut app = SessionMachine::with_nickname("bob");
        app.handle(SessionEvent::ConnectionEstablished);

        let effects = app.handle(SessionEvent::ConnectionEstablished);
        assert!(effects.is_empty());
        assert_eq!(app.state(), SessionState::Active);
    }

    #[test]
    fn nickname_is_immutable_once_active() {
        let mut app = SessionMachine::new();
        app.handle(SessionEvent::ConnectionEstablished);
        app.handle(SessionEvent::SetNickname("alice".into()));
        app.handle(SessionEvent::SubmitNickname);

        app.handle(SessionEvent::SetNickname("eve".into()));
        assert_eq!(app.nickname(), "alice");
    }

    #[test]
    fn memory_store_shares_state_between_clones() {
        let mut store = MemoryNicknameStore::default();
        let reader = store.clone();
        assert_eq!(reader.get_nickname(), None);

        store.set_nickname("alice");
        assert_eq!(reader.get_nickname().as_deref(), Some("alice"));
    }

    #[test]
    fn set_nickname_overwrites_before_submit() {
        let mut app = SessionMachine::new();
        app.handle(SessionEvent::ConnectionEstablished);
        app.handle(SessionEvent::SetNickname("a".into()));
        app.handle(SessionEvent::SetNickname("ab".into()));
        assert_eq!(app.nickname(), "ab");
    }
}

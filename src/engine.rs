use std::sync::{Arc, Mutex};

use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::logger::log;
use crate::machine::{
    Effect, InputEvent, Key, NicknameStore, SessionEffect, SessionEvent, SessionMachine,
    WhiteboardMachine,
};
use crate::peer::PeerSession;
use crate::protocol::{Envelope, PanEvent, StrokeEvent};
use crate::sampler::{interpolate, Point};
use crate::signaling::SignalingClient;

/// Внешний рендер. Точки приходят уже в системе координат поверхности,
/// свой пан рендер применяет сам.
pub trait Renderer: Send {
    fn push_point(&mut self, x: f64, y: f64);
    fn apply_pan(&mut self, dx: f64, dy: f64);
    fn resize(&mut self, width: u32, height: u32);
}

/// Ядро без транспорта: машины, рендер, пан-рамка. Возвращает envelope,
/// которые нужно отправить; отправляет их владелец.
struct EngineInner<R: Renderer, S: NicknameStore> {
    whiteboard: WhiteboardMachine,
    session: SessionMachine,
    renderer: R,
    store: S,
    stroke_step: f64,
    pan_offset: Point,
    remote_nickname: Option<String>,
}

impl<R: Renderer, S: NicknameStore> EngineInner<R, S> {
    fn apply_input(&mut self, event: InputEvent) -> Vec<Envelope> {
        let mut outbound = Vec::new();
        for effect in self.whiteboard.handle(event) {
            match effect {
                Effect::CursorMoved(p) => {
                    outbound.push(Envelope::MouseMove { x: p.x, y: p.y });
                }
                Effect::Stroke { from, to } => {
                    // одна точка — одно сообщение, плотность задаёт шаг
                    for point in interpolate(from, to, self.stroke_step) {
                        self.renderer.push_point(point.x, point.y);
                        outbound.push(Envelope::Drawing(StrokeEvent {
                            x: point.x,
                            y: point.y,
                            pan_x: self.pan_offset.x,
                            pan_y: self.pan_offset.y,
                        }));
                    }
                }
                Effect::Pan { dx, dy } => {
                    self.pan_offset.x += dx;
                    self.pan_offset.y += dy;
                    self.renderer.apply_pan(dx, dy);
                    outbound.push(Envelope::Panning(PanEvent { dx, dy }));
                }
            }
        }
        outbound
    }

    fn session_event(&mut self, event: SessionEvent) -> Vec<Envelope> {
        let mut outbound = Vec::new();
        for effect in self.session.handle(event) {
            match effect {
                SessionEffect::PersistNickname(nickname) => {
                    self.store.set_nickname(&nickname);
                }
                SessionEffect::AnnounceNickname(nickname) => {
                    outbound.push(Envelope::Nickname(nickname));
                }
            }
        }
        outbound
    }

    fn connection_established(&mut self) -> Vec<Envelope> {
        self.session_event(SessionEvent::ConnectionEstablished)
    }

    fn handle_remote(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Drawing(stroke) => {
                // вычитаем пан-рамку отправителя; своя применяется рендером
                self.renderer
                    .push_point(stroke.x - stroke.pan_x, stroke.y - stroke.pan_y);
            }
            Envelope::Panning(pan) => {
                self.pan_offset.x += pan.dx;
                self.pan_offset.y += pan.dy;
                self.renderer.apply_pan(pan.dx, pan.dy);
            }
            Envelope::Nickname(nickname) => {
                log(&format!("Peer introduced as: {nickname}"));
                self.remote_nickname = Some(nickname);
            }
            Envelope::MouseMove { x, y } => {
                log(&format!("Peer cursor at {x},{y}"));
            }
        }
    }
}

/// Композиция: машины + сэмплер + кодек + одна peer-сессия.
pub struct SyncEngine<R: Renderer, S: NicknameStore> {
    inner: Arc<Mutex<EngineInner<R, S>>>,
    peer: Option<Arc<PeerSession>>,
}

impl<R, S> SyncEngine<R, S>
where
    R: Renderer + 'static,
    S: NicknameStore + 'static,
{
    pub fn new(renderer: R, store: S, config: &SyncConfig) -> Self {
        let session = match store.get_nickname() {
            Some(nickname) if !nickname.is_empty() => SessionMachine::with_nickname(nickname),
            _ => SessionMachine::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                whiteboard: WhiteboardMachine::new(),
                session,
                renderer,
                store,
                stroke_step: config.stroke_step,
                pan_offset: Point::default(),
                remote_nickname: None,
            })),
            peer: None,
        }
    }

    pub async fn pointer_down(&mut self, p: Point) {
        let outbound = self.inner.lock().unwrap().apply_input(InputEvent::PointerDown(p));
        self.dispatch(outbound).await;
    }

    pub async fn pointer_move(&mut self, p: Point) {
        let outbound = self.inner.lock().unwrap().apply_input(InputEvent::PointerMove(p));
        self.dispatch(outbound).await;
    }

    pub async fn pointer_up(&mut self) {
        let outbound = self.inner.lock().unwrap().apply_input(InputEvent::PointerUp);
        self.dispatch(outbound).await;
    }

    pub async fn pointer_leave(&mut self) {
        let outbound = self.inner.lock().unwrap().apply_input(InputEvent::PointerLeave);
        self.dispatch(outbound).await;
    }

    pub async fn key_down(&mut self, key: Key) {
        let outbound = self.inner.lock().unwrap().apply_input(InputEvent::KeyDown(key));
        self.dispatch(outbound).await;
    }

    pub async fn key_up(&mut self, key: Key) {
        let outbound = self.inner.lock().unwrap().apply_input(InputEvent::KeyUp(key));
        self.dispatch(outbound).await;
    }

    pub async fn set_nickname(&mut self, nickname: &str) {
        let outbound = self
            .inner
            .lock()
            .unwrap()
            .session_event(SessionEvent::SetNickname(nickname.to_string()));
        self.dispatch(outbound).await;
    }

    pub async fn submit_nickname(&mut self) {
        let outbound = self
            .inner
            .lock()
            .unwrap()
            .session_event(SessionEvent::SubmitNickname);
        self.dispatch(outbound).await;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.inner.lock().unwrap().renderer.resize(width, height);
    }

    /// Удалённая сторона объявила канал: собираем сессию, вешаем
    /// обработчики, на открытии канала фиксируем установление
    /// соединения и объявляем своё имя.
    pub async fn channel_open(&mut self, client: &mut SignalingClient, dc: Arc<RTCDataChannel>) {
        let Some(pc) = client.peer_connection() else {
            log("Channel announced without a peer connection, ignoring");
            return;
        };

        let session = Arc::new(PeerSession::new(pc, dc.clone(), client.take_tasks()));

        let inbound = self.inner.clone();
        session.on_message(move |envelope| {
            inbound.lock().unwrap().handle_remote(envelope);
        });

        let opened = self.inner.clone();
        let announce_session = session.clone();
        dc.on_open(Box::new(move || {
            log("Data channel opened");
            let outbound = opened.lock().unwrap().connection_established();
            let session = announce_session.clone();
            Box::pin(async move {
                for envelope in outbound {
                    if let Err(e) = session.send(&envelope).await {
                        log(&format!("Failed to announce nickname: {e}"));
                    }
                }
            })
        }));

        // канал мог открыться, пока событие шло через очередь
        if dc.ready_state() == RTCDataChannelState::Open {
            let outbound = self.inner.lock().unwrap().connection_established();
            for envelope in &outbound {
                if let Err(e) = session.send(envelope).await {
                    log(&format!("Failed to announce nickname: {e}"));
                }
            }
        }

        self.peer = Some(session);
    }

    /// Control-канал оборван. Синхронизации не будет до нового
    /// `connect`; решение о переподключении не здесь.
    pub fn signaling_lost(&mut self) {
        log("Signaling lost, engine is offline until reconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.peer.as_ref().is_some_and(|peer| peer.is_open())
    }

    pub fn remote_nickname(&self) -> Option<String> {
        self.inner.lock().unwrap().remote_nickname.clone()
    }

    pub fn pan_offset(&self) -> Point {
        self.inner.lock().unwrap().pan_offset
    }

    pub async fn close(&mut self) {
        if let Some(peer) = self.peer.take() {
            peer.close().await;
        }
    }

    async fn dispatch(&self, outbound: Vec<Envelope>) {
        let Some(peer) = &self.peer else {
            return;
        };
        for envelope in outbound {
            match peer.send(&envelope).await {
                Ok(()) => {}
                Err(SyncError::ChannelNotOpen) => {
                    log("Channel not open, dropping envelope");
                }
                Err(e) => {
                    log(&format!("Failed to send envelope: {e}"));
                }
            }
        }
    }
}

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::logger::log;
use crate::peer::{add_remote_candidate, apply_pending_candidates, new_peer};
use crate::protocol::{IceCandidatePayload, SignalEvent, SignalMessage};
use crate::utils::random_id;

/// События транспорта для композиции
pub enum TransportEvent {
    /// Удалённая сторона объявила data channel
    ChannelOpen(Arc<RTCDataChannel>),
    /// Control-канал закрыт или оборван; авто-переподключения нет
    SignalingLost,
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportEvent::ChannelOpen(_) => f.debug_tuple("ChannelOpen").finish(),
            TransportEvent::SignalingLost => f.write_str("SignalingLost"),
        }
    }
}

/// Защита от пересекающихся офферов: пока на предыдущий не отправлен
/// answer, новый offer отклоняется.
#[derive(Debug, Default)]
pub struct NegotiationGuard {
    in_flight: bool,
}

impl NegotiationGuard {
    pub fn begin(&mut self) -> Result<(), SyncError> {
        if self.in_flight {
            return Err(SyncError::UnexpectedOffer);
        }
        self.in_flight = true;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}

/// Клиент rendezvous-сервиса. Подключает WebSocket, строит локальный
/// peer connection и ведёт обмен offer/answer/candidate: offer делает
/// сервер, мы отвечаем answer.
pub struct SignalingClient {
    config: SyncConfig,
    session_id: String,
    pc: Option<Arc<RTCPeerConnection>>,
    event_tx: mpsc::Sender<TransportEvent>,
    event_rx: Option<mpsc::Receiver<TransportEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SignalingClient {
    pub fn new(config: SyncConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            config,
            session_id: random_id(),
            pc: None,
            event_tx,
            event_rx: Some(event_rx),
            tasks: Vec::new(),
        }
    }

    /// Приёмник событий; забрать можно один раз
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.event_rx.take()
    }

    pub fn peer_connection(&self) -> Option<Arc<RTCPeerConnection>> {
        self.pc.clone()
    }

    /// Задачи control-канала; владелец сессии глушит их при закрытии
    pub fn take_tasks(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.tasks)
    }

    /// Подключается к rendezvous-сервису и запускает фоновые задачи
    /// writer/reader. Обмен дальше идёт сам: offer сервера будет
    /// отвечен, кандидаты потекут в обе стороны.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        log(&format!(
            "Connecting to signaling at {} (session {})",
            self.config.signaling_url, self.session_id
        ));

        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.config.signaling_url).await?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Исходящие сообщения control-канала через один writer task
        let (out_tx, mut out_rx) = mpsc::channel::<SignalMessage>(256);

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        log(&format!("Failed to serialize signal message: {e}"));
                        continue;
                    }
                };
                if ws_writer.send(Message::Text(json.into())).await.is_err() {
                    log("Signaling writer closed");
                    break;
                }
            }
        });
        self.tasks.push(writer_task);

        // Локальные кандидаты и объявленный data channel приходят из
        // peer connection по каналам
        let (candidate_tx, mut candidate_rx) = mpsc::channel::<IceCandidatePayload>(64);
        let (channel_tx, mut channel_rx) = mpsc::channel::<Arc<RTCDataChannel>>(4);

        let pc = new_peer(&self.config, candidate_tx, channel_tx).await?;
        self.pc = Some(pc.clone());

        // Trickle: каждый локальный кандидат уходит на сервер
        let trickle_out = out_tx.clone();
        let trickle_task = tokio::spawn(async move {
            while let Some(payload) = candidate_rx.recv().await {
                let data = match serde_json::to_string(&payload) {
                    Ok(data) => data,
                    Err(e) => {
                        log(&format!("Failed to serialize candidate: {e}"));
                        continue;
                    }
                };
                let msg = SignalMessage {
                    event: SignalEvent::Candidate,
                    data,
                };
                if trickle_out.send(msg).await.is_err() {
                    break;
                }
            }
        });
        self.tasks.push(trickle_task);

        let channel_events = self.event_tx.clone();
        let channel_task = tokio::spawn(async move {
            while let Some(dc) = channel_rx.recv().await {
                if channel_events.send(TransportEvent::ChannelOpen(dc)).await.is_err() {
                    break;
                }
            }
        });
        self.tasks.push(channel_task);

        // Единственный последовательный reader: offer обрабатывается
        // целиком до следующего сообщения
        let reader_events = self.event_tx.clone();
        let reader_pc = pc.clone();
        let reader_out = out_tx;
        let reader_task = tokio::spawn(async move {
            let mut guard = NegotiationGuard::default();
            let mut pending: Vec<IceCandidatePayload> = Vec::new();

            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let signal: SignalMessage = match serde_json::from_str(text.as_str()) {
                            Ok(signal) => signal,
                            Err(e) => {
                                log(&format!("Dropping malformed signal message: {e}"));
                                continue;
                            }
                        };
                        dispatch_signal(
                            signal,
                            &reader_pc,
                            &reader_out,
                            &mut guard,
                            &mut pending,
                        )
                        .await;
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            log("Signaling connection lost");
            let _ = reader_events.send(TransportEvent::SignalingLost).await;
        });
        self.tasks.push(reader_task);

        Ok(())
    }
}

async fn dispatch_signal(
    signal: SignalMessage,
    pc: &Arc<RTCPeerConnection>,
    out_tx: &mpsc::Sender<SignalMessage>,
    guard: &mut NegotiationGuard,
    pending: &mut Vec<IceCandidatePayload>,
) {
    match signal.event {
        SignalEvent::Offer => {
            if let Err(e) = guard.begin() {
                log(&format!("Rejecting offer: {e}"));
                return;
            }
            if let Err(e) = answer_offer(pc, &signal.data, out_tx, pending).await {
                log(&format!("Failed to answer offer: {e}"));
            }
            guard.finish();
        }
        // Офферы делает сервер; answer в нашу сторону не ожидается
        SignalEvent::Answer => {
            log("Ignoring unexpected answer from signaling server");
        }
        SignalEvent::Candidate => {
            match serde_json::from_str::<IceCandidatePayload>(&signal.data) {
                Ok(payload) => add_remote_candidate(pc, payload, pending).await,
                Err(e) => log(&format!("Dropping malformed candidate: {e}")),
            }
        }
    }
}

/// Ответ на offer строго по порядку: remote description, отложенные
/// кандидаты, answer, local description, отправка.
async fn answer_offer(
    pc: &Arc<RTCPeerConnection>,
    data: &str,
    out_tx: &mpsc::Sender<SignalMessage>,
    pending: &mut Vec<IceCandidatePayload>,
) -> Result<(), SyncError> {
    let offer: RTCSessionDescription = serde_json::from_str(data)?;
    pc.set_remote_description(offer).await?;
    apply_pending_candidates(pc, pending).await;

    let answer = pc.create_answer(None).await?;
    pc.set_local_description(answer).await?;

    let local = pc
        .local_description()
        .await
        .ok_or(SyncError::SignalingLost)?;
    let msg = SignalMessage {
        event: SignalEvent::Answer,
        data: serde_json::to_string(&local)?,
    };
    out_tx.send(msg).await.map_err(|_| SyncError::SignalingLost)?;
    log("Answer sent");
    Ok(())
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::task::JoinHandle;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::SyncError;
use crate::logger::log;
use crate::protocol::{self, Envelope};

type InboundHandler = Box<dyn Fn(Envelope) + Send + Sync>;
type HandlerSlot = Arc<Mutex<Option<InboundHandler>>>;

/// Сессия с одним удалённым участником: peer connection, его data
/// channel и задачи control-канала, который их согласовал.
pub struct PeerSession {
    pc: Arc<RTCPeerConnection>,
    dc: Arc<RTCDataChannel>,
    signaling_tasks: Vec<JoinHandle<()>>,
    handler: HandlerSlot,
    closed: AtomicBool,
}

impl PeerSession {
    /// Подписка на входящие вешается на канал один раз; дальше сообщения
    /// идут через слот обработчика.
    pub fn new(
        pc: Arc<RTCPeerConnection>,
        dc: Arc<RTCDataChannel>,
        signaling_tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        let handler: HandlerSlot = Arc::new(Mutex::new(None));

        let slot = handler.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            dispatch_inbound(&slot, &msg.data);
            Box::pin(async {})
        }));

        Self {
            pc,
            dc,
            signaling_tasks,
            handler,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    /// Кодирует и отправляет envelope. Если канал не открыт, ничего не
    /// уходит и вызывающий получает `ChannelNotOpen`.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), SyncError> {
        if !self.is_open() {
            return Err(SyncError::ChannelNotOpen);
        }
        let wire = protocol::encode(envelope);
        self.dc.send(&Bytes::from(wire.into_bytes())).await?;
        Ok(())
    }

    /// Подписка на входящие envelope. Слот один: повторная регистрация
    /// замещает предыдущий обработчик.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        *self.handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Идемпотентное закрытие: data channel, peer connection и задачи
    /// control-канала.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log("Closing peer session");

        for task in &self.signaling_tasks {
            task.abort();
        }
        if let Err(e) = self.dc.close().await {
            log(&format!("Failed to close data channel: {:?}", e));
        }
        if let Err(e) = self.pc.close().await {
            log(&format!("Failed to close peer connection: {:?}", e));
        }
    }
}

/// Битые сообщения логируются и отбрасываются, соединение не рвётся
fn dispatch_inbound(slot: &HandlerSlot, data: &[u8]) {
    let text = String::from_utf8_lossy(data);
    match protocol::decode(&text) {
        Ok(envelope) => {
            if let Some(handler) = &*slot.lock().unwrap() {
                handler(envelope);
            }
        }
        Err(e) => log(&format!("Dropping inbound message: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    async fn unconnected_session() -> PeerSession {
        let api = APIBuilder::new().build();
        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .unwrap(),
        );
        let dc = pc.create_data_channel("whiteboard", None).await.unwrap();
        PeerSession::new(pc, dc, Vec::new())
    }

    #[tokio::test]
    async fn send_before_open_reports_channel_not_open() {
        let session = unconnected_session().await;
        assert!(!session.is_open());

        let result = session.send(&Envelope::Nickname("alice".into())).await;
        assert!(matches!(result, Err(SyncError::ChannelNotOpen)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = unconnected_session().await;
        session.close().await;
        session.close().await;
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn second_handler_replaces_the_first() {
        let session = unconnected_session().await;

        let first = Arc::new(Mutex::new(0u32));
        let second = Arc::new(Mutex::new(0u32));

        let hits = first.clone();
        session.on_message(move |_| *hits.lock().unwrap() += 1);
        let hits = second.clone();
        session.on_message(move |_| *hits.lock().unwrap() += 1);

        dispatch_inbound(&session.handler, b"/nick:alice");
        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);
    }

    #[test]
    fn malformed_inbound_is_dropped_without_reaching_handler() {
        let slot: HandlerSlot = Arc::new(Mutex::new(None));
        let hits = Arc::new(Mutex::new(0u32));

        let counter = hits.clone();
        *slot.lock().unwrap() = Some(Box::new(move |_| *counter.lock().unwrap() += 1));

        dispatch_inbound(&slot, b"/draw:1,2,oops");
        dispatch_inbound(&slot, b"/unknown:1");
        assert_eq!(*hits.lock().unwrap(), 0);

        dispatch_inbound(&slot, b"/move:1,2");
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}

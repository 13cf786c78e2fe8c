use std::sync::Arc;

use tokio::sync::mpsc;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::{
    api::APIBuilder,
    data_channel::RTCDataChannel,
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        RTCPeerConnection,
    },
};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::logger::{dump_candidate, dump_selected_pair, log};
use crate::protocol::IceCandidatePayload;

/// Создаём Peer для ответной стороны: data-channel объявляет удалённая
/// сторона, локальные кандидаты уходят в `candidate_tx`, канал — в
/// `channel_tx`.
pub async fn new_peer(
    config: &SyncConfig,
    candidate_tx: mpsc::Sender<IceCandidatePayload>,
    channel_tx: mpsc::Sender<Arc<RTCDataChannel>>,
) -> Result<Arc<RTCPeerConnection>, SyncError> {
    let api = APIBuilder::new().build();
    let pc = Arc::new(api.new_peer_connection(rtc_config(&config.ice_urls)).await?);

    // Обработчик для сбора локальных кандидатов (Trickle-ICE)
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        if let Some(c) = cand {
            let tx = candidate_tx.clone();
            tokio::spawn(async move {
                dump_candidate("LOCAL", &c).await;

                if let Ok(init) = c.to_json() {
                    let payload = IceCandidatePayload {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    };
                    if tx.send(payload).await.is_err() {
                        log("Candidate receiver dropped, stopping trickle forwarding");
                    }
                }
            });
        } else {
            // cand == None означает конец сбора
            log("ICE candidate gathering completed (null candidate received)");
        }
        Box::pin(async {})
    }));

    pc.on_ice_gathering_state_change(Box::new(move |state| {
        log(&format!("ICE gathering state changed to: {:?}", state));
        Box::pin(async {})
    }));

    // делаем копию для обработчика состояний
    let pc_state = pc.clone();

    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        log(&format!("Peer connection state changed to: {:?}", st));

        if matches!(
            st,
            RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Failed
        ) {
            let pc_stats = pc_state.clone();
            tokio::spawn(async move {
                dump_selected_pair(&pc_stats, "BEFORE-FAIL").await;
            });
        }
        Box::pin(async {})
    }));

    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        log(&format!("Remote data channel announced: {}", dc.label()));
        let tx = channel_tx.clone();
        Box::pin(async move {
            if tx.send(dc).await.is_err() {
                log("Data channel receiver dropped");
            }
        })
    }));

    Ok(pc)
}

/// Создает конфигурацию для peer connection
fn rtc_config(ice_urls: &[String]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: ice_urls.to_vec(),
            ..Default::default()
        }],
        // Более агрессивные настройки ICE
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn candidate_init(payload: IceCandidatePayload) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: payload.candidate,
        sdp_mid: payload.sdp_mid,
        sdp_mline_index: payload.sdp_mline_index,
        username_fragment: None,
    }
}

/// Применяет ICE кандидат от удаленной стороны. Пока remote description
/// не установлен, кандидат откладывается: библиотека ранние кандидаты
/// не принимает.
pub async fn add_remote_candidate(
    pc: &RTCPeerConnection,
    payload: IceCandidatePayload,
    pending: &mut Vec<IceCandidatePayload>,
) {
    if pc.remote_description().await.is_some() {
        match pc.add_ice_candidate(candidate_init(payload)).await {
            Ok(_) => log("Successfully added ICE candidate"),
            Err(e) => log(&format!("Failed to add ICE candidate: {:?}", e)),
        }
    } else {
        log("Remote description not set yet, queuing candidate");
        pending.push(payload);
    }
}

/// Применяет все отложенные кандидаты после установки remote description
pub async fn apply_pending_candidates(
    pc: &RTCPeerConnection,
    pending: &mut Vec<IceCandidatePayload>,
) {
    for payload in pending.drain(..) {
        log(&format!("Applying pending candidate: {:?}", payload));
        if let Err(e) = pc.add_ice_candidate(candidate_init(payload)).await {
            log(&format!("Failed to apply pending candidate: {:?}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_peer_builds_without_network() {
        let (candidate_tx, _candidate_rx) = mpsc::channel(16);
        let (channel_tx, _channel_rx) = mpsc::channel(4);
        let pc = new_peer(&SyncConfig::default(), candidate_tx, channel_tx)
            .await
            .unwrap();
        assert_eq!(
            pc.connection_state(),
            RTCPeerConnectionState::New
        );
    }

    #[tokio::test]
    async fn early_candidate_is_queued_until_remote_description() {
        let (candidate_tx, _candidate_rx) = mpsc::channel(16);
        let (channel_tx, _channel_rx) = mpsc::channel(4);
        let pc = new_peer(&SyncConfig::default(), candidate_tx, channel_tx)
            .await
            .unwrap();

        let payload = IceCandidatePayload {
            candidate: "candidate:1 1 udp 2130706431 192.0.2.1 54400 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        };

        let mut pending = Vec::new();
        add_remote_candidate(&pc, payload, &mut pending).await;
        assert_eq!(pending.len(), 1);
    }
}

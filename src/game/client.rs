//! One session with the Archipelago server.
//!
//! Handshake: wait for `RoomInfo`, answer with `Connect` and a data package
//! request, then wait for `Connected`. Afterwards every print packet is run
//! through the relay and chat typed in Discord is sent back as `Say`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bridge::classifier::{InboundMessage, PacketKind, PacketPayload, TypedPacket};
use crate::bridge::Relay;
use crate::common::error::{AppError, ConnectionError, ProtocolError, Result};
use crate::common::messages::{ActivityStatus, ClassifiedEvent, OutgoingChat};
use crate::common::reconnect::Reconnector;
use crate::config::types::ArchipelagoConfig;
use crate::protocol::packets::{ClientPacket, PrintJson, ServerPacket};
use crate::protocol::{TextRenderer, Transport};

/// Time allowed between opening the transport and receiving `Connected`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// How a session ended.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Whether the server accepted the slot before the session ended.
    pub established: bool,
    pub error: Option<AppError>,
}

pub struct UpstreamClient {
    relay: Arc<Relay>,
    renderer: TextRenderer,
    event_tx: mpsc::UnboundedSender<ClassifiedEvent>,
    status_tx: watch::Sender<ActivityStatus>,
    uuid: String,
    own_slot: Option<i64>,
}

impl UpstreamClient {
    pub fn new(
        relay: Arc<Relay>,
        event_tx: mpsc::UnboundedSender<ClassifiedEvent>,
        status_tx: watch::Sender<ActivityStatus>,
    ) -> Self {
        Self {
            relay,
            renderer: TextRenderer::new(),
            event_tx,
            status_tx,
            uuid: format!("{:016x}", rand::random::<u64>()),
            own_slot: None,
        }
    }

    /// Publish the connection state for Discord.
    pub fn publish(&self, status: ActivityStatus) {
        if self.status_tx.send(status).is_err() {
            debug!("Status channel closed (shutdown in progress)");
        }
    }

    /// Drive one session until the transport closes or fails.
    ///
    /// `reconnector` is marked connected as soon as the server accepts the slot.
    pub async fn run<T: Transport>(
        &mut self,
        transport: &mut T,
        target: &ArchipelagoConfig,
        outgoing_rx: &mut mpsc::UnboundedReceiver<OutgoingChat>,
        reconnector: &mut Reconnector,
    ) -> SessionOutcome {
        let mut established = false;
        self.own_slot = None;

        let handshake = tokio::time::sleep(HANDSHAKE_TIMEOUT);
        tokio::pin!(handshake);

        let error = loop {
            tokio::select! {
                frame = transport.next_packets() => {
                    match frame {
                        Ok(Some(packets)) => {
                            let was_established = established;
                            if let Err(e) = self
                                .handle_packets(transport, target, packets, &mut established)
                                .await
                            {
                                break Some(e);
                            }
                            if established && !was_established {
                                reconnector.on_connected();
                            }
                        }
                        Ok(None) => break Some(ConnectionError::ConnectionClosed.into()),
                        Err(e) => break Some(e),
                    }
                }

                Some(chat) = outgoing_rx.recv(), if established => {
                    debug!(sender = %chat.sender, "Sending chat upstream");
                    if let Err(e) = transport.send(&[ClientPacket::say(chat.text)]).await {
                        break Some(e);
                    }
                }

                _ = &mut handshake, if !established => {
                    break Some(ConnectionError::Timeout.into());
                }
            }
        };

        if let Err(e) = transport.close().await {
            debug!("Error while closing transport: {}", e);
        }

        SessionOutcome { established, error }
    }

    async fn handle_packets<T: Transport>(
        &mut self,
        transport: &mut T,
        target: &ArchipelagoConfig,
        packets: Vec<ServerPacket>,
        established: &mut bool,
    ) -> Result<()> {
        for packet in packets {
            match packet {
                ServerPacket::RoomInfo(room) => {
                    info!(
                        "Room info received (seed '{}', {} game(s)); connecting as '{}'",
                        room.seed_name,
                        room.games.len(),
                        target.slot
                    );
                    let games = (!room.games.is_empty()).then_some(room.games);
                    transport
                        .send(&[
                            ClientPacket::connect(
                                &target.slot,
                                &target.password,
                                &target.tags,
                                &self.uuid,
                            ),
                            ClientPacket::GetDataPackage { games },
                        ])
                        .await?;
                }
                ServerPacket::Connected(connected) => {
                    self.renderer.roster_mut().update_players(&connected.players);
                    self.renderer.roster_mut().update_slots(&connected.slot_info);
                    self.own_slot = Some(connected.slot);
                    *established = true;
                    info!(
                        "Connected to {} as '{}' ({} players)",
                        target.server,
                        target.slot,
                        self.renderer.roster().len()
                    );
                    self.publish(ActivityStatus::Connected {
                        slot: target.slot.clone(),
                        server: target.server.clone(),
                    });
                }
                ServerPacket::ConnectionRefused(refused) => {
                    return Err(ProtocolError::ConnectionRefused {
                        reasons: refused.errors,
                    }
                    .into());
                }
                ServerPacket::DataPackage(package) => {
                    self.renderer.load_data_package(&package.data);
                }
                ServerPacket::RoomUpdate(update) => {
                    if let Some(players) = &update.players {
                        self.renderer.roster_mut().update_players(players);
                    }
                    if let Some(slots) = &update.slot_info {
                        self.renderer.roster_mut().update_slots(slots);
                    }
                }
                ServerPacket::PrintJson(print) => {
                    if self.is_own_chat(&print) {
                        debug!("Skipping echo of relayed chat");
                        continue;
                    }
                    let inbound = self.to_inbound(&print);
                    self.relay_inbound(inbound).await;
                }
                ServerPacket::Print(print) => {
                    self.relay_inbound(InboundMessage::print(print.text)).await;
                }
                other => debug!("Ignoring {} packet", other.cmd()),
            }
        }
        Ok(())
    }

    async fn relay_inbound(&self, inbound: InboundMessage) {
        if let Some(event) = self.relay.process(inbound).await {
            if self.event_tx.send(event).is_err() {
                warn!("Discord event channel closed; dropping event");
            }
        }
    }

    /// Chat the server echoes back from this client's own slot.
    fn is_own_chat(&self, print: &PrintJson) -> bool {
        print.kind.as_deref() == Some("Chat") && print.slot.is_some() && print.slot == self.own_slot
    }

    fn slot_name(&self, slot: i64) -> String {
        self.renderer
            .player_name(slot)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Player {}", slot))
    }

    /// Convert a `PrintJSON` packet. Untyped packets become plain prints.
    pub fn to_inbound(&self, print: &PrintJson) -> InboundMessage {
        let text = self.renderer.render(&print.data);
        let Some(kind) = print.kind.as_deref() else {
            return InboundMessage::Print { text };
        };
        let kind = PacketKind::from_print_type(kind);

        let mut payload = PacketPayload {
            text,
            found: print.found,
            tags: print.tags.clone().unwrap_or_default(),
            ..Default::default()
        };

        match kind {
            PacketKind::Chat | PacketKind::ServerChat => {
                payload.sender = print.slot.map(|slot| self.slot_name(slot));
                payload.message = print.message.clone();
            }
            PacketKind::Trade | PacketKind::ItemSent | PacketKind::Hint | PacketKind::ItemHinted => {
                if let Some(item) = &print.item {
                    payload.sender = Some(self.slot_name(item.player));
                    payload.receiver = print.receiving.map(|slot| self.slot_name(slot));
                    payload.item = Some(
                        self.renderer
                            .item_name(print.receiving, item.item)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("Item {}", item.item)),
                    );
                    payload.location = self
                        .renderer
                        .location_name(Some(item.player), item.location)
                        .map(str::to_string);
                }
            }
            _ => {
                payload.player = print.slot.map(|slot| self.slot_name(slot));
            }
        }

        InboundMessage::Typed(TypedPacket::new(kind, payload))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use crate::bridge::dedup::Deduplicator;
    use crate::bridge::filter::MessageFilter;
    use crate::bridge::ChannelMap;
    use crate::common::reconnect::{ConnectionState, ReconnectConfig};
    use crate::common::messages::ChannelCategory;
    use crate::config::types::ChannelsConfig;
    use crate::discord::mentions::tests::FakeLinkStore;
    use crate::discord::mentions::MentionResolver;
    use crate::game::formatter::MessageFormatter;
    use crate::protocol::transport::testing::memory_transport;

    pub(crate) const ROOM_INFO: &str =
        r#"[{"cmd":"RoomInfo","seed_name":"S1","games":["A Link to the Past"],"password":false}]"#;
    pub(crate) const CONNECTED: &str = r#"[{"cmd":"Connected","team":0,"slot":3,
        "players":[{"team":0,"slot":1,"alias":"","name":"Link"},
                   {"team":0,"slot":2,"alias":"","name":"Zelda"},
                   {"team":0,"slot":3,"alias":"","name":"Relay"}],
        "slot_info":{"1":{"name":"Link","game":"A Link to the Past"},
                     "2":{"name":"Zelda","game":"A Link to the Past"}}}]"#;

    pub(crate) fn test_relay(links: &[(&str, u64)]) -> Arc<Relay> {
        let mentions = MentionResolver::new(Arc::new(FakeLinkStore::with_links(links))).unwrap();
        Arc::new(Relay::new(
            Deduplicator::new(50),
            mentions,
            MessageFilter::empty(),
            MessageFormatter::default(),
            ChannelMap::new(ChannelsConfig::default()),
        ))
    }

    pub(crate) fn target() -> ArchipelagoConfig {
        ArchipelagoConfig {
            server: "localhost:38281".to_string(),
            slot: "Relay".to_string(),
            password: "pw".to_string(),
            tags: vec!["TextOnly".to_string()],
        }
    }

    struct Harness {
        client: UpstreamClient,
        reconnector: Reconnector,
        event_rx: mpsc::UnboundedReceiver<ClassifiedEvent>,
        status_rx: watch::Receiver<ActivityStatus>,
    }

    fn harness(links: &[(&str, u64)]) -> Harness {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ActivityStatus::Connecting);
        Harness {
            client: UpstreamClient::new(test_relay(links), event_tx, status_tx),
            reconnector: Reconnector::new(ReconnectConfig::default()),
            event_rx,
            status_rx,
        }
    }

    #[tokio::test]
    async fn test_handshake_and_print_relay() {
        let mut h = harness(&[("Zelda", 77)]);
        let target = target();
        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        handle.push(ROOM_INFO);
        handle.push(CONNECTED);
        handle.push(
            r#"[{"cmd":"PrintJSON","type":"Join","slot":2,"tags":["AP"],
                "data":[{"type":"player_id","text":"2"},{"text":" has joined the game"}]}]"#,
        );
        let sent = handle.sent.clone();
        let closed = handle.closed.clone();
        drop(handle);

        let outcome = h
            .client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        assert!(outcome.established);
        assert!(matches!(
            outcome.error,
            Some(AppError::Connection(ConnectionError::ConnectionClosed))
        ));
        assert!(*closed.lock().unwrap());

        let sent = sent.lock().unwrap().clone();
        match &sent[0] {
            ClientPacket::Connect(connect) => {
                assert_eq!(connect.name, "Relay");
                assert_eq!(connect.password, "pw");
                assert_eq!(connect.tags, vec!["TextOnly".to_string()]);
                assert_eq!(connect.items_handling, 0);
            }
            other => panic!("expected Connect, got {:?}", other),
        }
        assert_eq!(
            sent[1],
            ClientPacket::GetDataPackage {
                games: Some(vec!["A Link to the Past".to_string()])
            }
        );

        assert_eq!(
            *h.status_rx.borrow(),
            ActivityStatus::Connected {
                slot: "Relay".to_string(),
                server: "localhost:38281".to_string()
            }
        );

        let event = h.event_rx.recv().await.unwrap();
        assert_eq!(event.title, "Join Event");
        assert_eq!(event.body, "Zelda has joined the game");
        assert_eq!(
            event.categories,
            vec![ChannelCategory::Chat, ChannelCategory::Log]
        );
        assert_eq!(event.mentions.len(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let mut h = harness(&[]);
        let target = target();
        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        handle.push(ROOM_INFO);
        handle.push(r#"[{"cmd":"ConnectionRefused","errors":["InvalidSlot"]}]"#);

        let outcome = h
            .client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        assert!(!outcome.established);
        match outcome.error {
            Some(AppError::Protocol(ProtocolError::ConnectionRefused { reasons })) => {
                assert_eq!(reasons, vec!["InvalidSlot".to_string()]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let mut h = harness(&[]);
        let target = target();
        let (mut transport, _handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        let outcome = h
            .client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        assert!(!outcome.established);
        assert!(matches!(
            outcome.error,
            Some(AppError::Connection(ConnectionError::Timeout))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_frame_ends_session() {
        let mut h = harness(&[]);
        let target = target();
        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        handle.push(ROOM_INFO);
        handle.push(CONNECTED);
        handle.push("not json");
        handle.push(r#"[{"cmd":"Print","text":"never relayed"}]"#);
        let closed = handle.closed.clone();

        let outcome = h
            .client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        assert!(outcome.established);
        assert!(matches!(
            outcome.error,
            Some(AppError::Protocol(ProtocolError::Json(_)))
        ));
        assert!(*closed.lock().unwrap());
        assert!(h.event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnector_marked_connected_on_accept() {
        let mut h = harness(&[]);
        let target = target();
        h.reconnector.schedule_retry();
        h.reconnector.schedule_retry();
        h.reconnector.begin_attempt();
        assert_eq!(h.reconnector.attempts(), 2);

        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();
        handle.push(ROOM_INFO);
        handle.push(CONNECTED);
        drop(handle);

        h.client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        assert_eq!(h.reconnector.state(), ConnectionState::Connected);
        assert_eq!(h.reconnector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_reconnector_untouched_when_refused() {
        let mut h = harness(&[]);
        let target = target();
        h.reconnector.schedule_retry();
        h.reconnector.begin_attempt();

        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();
        handle.push(ROOM_INFO);
        handle.push(r#"[{"cmd":"ConnectionRefused","errors":["InvalidPassword"]}]"#);

        h.client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        assert_eq!(h.reconnector.state(), ConnectionState::Connecting);
        assert_eq!(h.reconnector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_outgoing_chat_sent_after_connect() {
        let mut h = harness(&[]);
        let target = target();
        let (mut transport, handle) = memory_transport();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        handle.push(ROOM_INFO);
        handle.push(CONNECTED);
        outgoing_tx
            .send(OutgoingChat {
                sender: "Steve".to_string(),
                text: "Steve: hello".to_string(),
            })
            .unwrap();

        let session = h
            .client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector);
        let wait_for_say = async {
            loop {
                if handle.sent().contains(&ClientPacket::say("Steve: hello")) {
                    break;
                }
                tokio::task::yield_now().await;
            }
            drop(handle);
        };
        let (outcome, _) = tokio::join!(session, wait_for_say);
        assert!(outcome.established);
    }

    #[tokio::test]
    async fn test_own_chat_echo_skipped() {
        let mut h = harness(&[]);
        let target = target();
        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        handle.push(ROOM_INFO);
        handle.push(CONNECTED);
        handle.push(
            r#"[{"cmd":"PrintJSON","type":"Chat","slot":3,"message":"Steve: hello",
                "data":[{"text":"Relay: Steve: hello"}]},
               {"cmd":"PrintJSON","type":"Chat","slot":1,"message":"hi there",
                "data":[{"text":"Link: hi there"}]}]"#,
        );
        drop(handle);

        h.client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;
        let event = h.event_rx.recv().await.unwrap();
        assert_eq!(event.title, "Message from Link");
        assert_eq!(event.body, "hi there");
        assert!(h.event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_item_send_conversion() {
        let mut h = harness(&[]);
        let target = target();
        let (mut transport, handle) = memory_transport();
        let (_outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        handle.push(ROOM_INFO);
        handle.push(CONNECTED);
        handle.push(
            r#"[{"cmd":"DataPackage","data":{"games":{"A Link to the Past":{
                "item_name_to_id":{"Hookshot":10},"location_name_to_id":{"Link's House":500}}}}}]"#,
        );
        drop(handle);
        h.client
            .run(&mut transport, &target, &mut outgoing_rx, &mut h.reconnector)
            .await;

        let print: PrintJson = serde_json::from_str(
            r#"{"type":"ItemSend","receiving":2,
                "item":{"item":10,"location":500,"player":1,"flags":0},
                "data":[{"type":"player_id","text":"1"},{"text":" sent "},
                        {"type":"item_id","text":"10","player":2},{"text":" to "},
                        {"type":"player_id","text":"2"}]}"#,
        )
        .unwrap();

        match h.client.to_inbound(&print) {
            InboundMessage::Typed(packet) => {
                assert_eq!(packet.kind, PacketKind::ItemSent);
                assert_eq!(packet.payload.text, "Link sent Hookshot to Zelda");
                assert_eq!(packet.payload.sender.as_deref(), Some("Link"));
                assert_eq!(packet.payload.receiver.as_deref(), Some("Zelda"));
                assert_eq!(packet.payload.item.as_deref(), Some("Hookshot"));
                assert_eq!(packet.payload.location.as_deref(), Some("Link's House"));
            }
            other => panic!("expected typed packet, got {:?}", other),
        }
    }

    #[test]
    fn test_untyped_print_json_is_plain_print() {
        let h = harness(&[]);
        let print: PrintJson =
            serde_json::from_str(r#"{"data":[{"text":"Now that you are connected"}]}"#).unwrap();
        assert_eq!(
            h.client.to_inbound(&print),
            InboundMessage::print("Now that you are connected")
        );
    }
}

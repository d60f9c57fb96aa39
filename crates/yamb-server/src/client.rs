use abort_on_drop::ChildTask;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::mpsc;
use tracing::instrument;
use yamb_lib::net::connection::{self, ConnectionRx, ConnectionTx};
use yamb_lib::net::{FrameError, Message, ProtocolError, RoomMessage};
use yamb_lib::PlayerId;

use crate::room::broadcaster::Subscription;
use crate::room::room_handle::{RoomHandle, RoomHandleProvider};
use crate::room::RoomError;
use crate::state::{OwnedId, ServerState};

/// Take a socket for a newly connected client and begin serving it.
pub async fn handle_new_connection(state: ServerState, socket: TcpStream) {
    let client = match ConnectingClient::new(state, socket).handshake().await {
        Some(c) => c,
        None => return,
    };
    client.run().await;
}

/// Represents a client who just connected and still needs to tell the server what they want to do.
struct ConnectingClient {
    state: ServerState,
    player_id: OwnedId<PlayerId>,
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
}

impl ConnectingClient {
    fn new(state: ServerState, socket: TcpStream) -> Self {
        let player_id = state.add_player();
        tracing::debug!(
            players = state.player_count(),
            rooms = state.room_count(),
            "Player {player_id} connected"
        );
        let (conn_tx, conn_rx) = connection::from_socket(socket);
        Self {
            state,
            player_id,
            conn_tx,
            conn_rx,
        }
    }

    async fn handshake(mut self) -> Option<ConnectedClient> {
        let constructor = match self.try_handshake().await {
            Ok(it) => it,
            Err(error) => {
                tracing::error!(%error, "Handshake failed");
                let _ = self.conn_tx.write_frame(Message::Error { error }).await;
                return None;
            }
        };
        if let Err(error) = self.announce_seat(&constructor).await {
            tracing::error!(%error, "Failed to confirm room");
            return None;
        }
        Some(constructor.construct(self))
    }

    async fn try_handshake(&mut self) -> Result<ClientConstructor, ProtocolError> {
        let version = match self.conn_rx.read_frame().await? {
            Some(Message::Version { version }) => version,
            Some(_) => return Err(ProtocolError::InvalidMessage),
            None => return Err(ProtocolError::Disconnected),
        };

        if version != crate::VERSION {
            return Err(ProtocolError::VersionMismatch(
                version,
                crate::VERSION.to_owned(),
            ));
        }

        // Inform player of their PlayerId
        self.conn_tx
            .write_frame(Message::ConnectionAccept {
                player_id: *self.player_id,
            })
            .await?;
        tracing::info!("New connection for player id {} opened", self.player_id);

        let (room_handle, room_recv) = match self.conn_rx.read_frame().await? {
            Some(Message::RoomCreate { options, name }) => {
                options
                    .validate()
                    .map_err(|e| ProtocolError::Message(e.to_string()))?;
                let room_handle = self.state.open_room(options, *self.player_id);
                let room_recv = room_handle.join_room(name).await?;
                (room_handle, room_recv)
            }
            Some(Message::RoomJoin { room_id, name }) => {
                let room_handle = self
                    .state
                    .get_room_handle_provider(room_id)?
                    .into_handle(*self.player_id)?;
                let room_recv = room_handle.join_room(name).await?;
                (room_handle, room_recv)
            }
            Some(Message::RoomResume { room_id, player_id }) => {
                let room_handle = self
                    .state
                    .get_room_handle_provider(room_id)?
                    .into_handle(player_id)?;
                let room_recv = room_handle.resume_room().await?;
                (room_handle, room_recv)
            }
            Some(Message::RoomSpectate { room_id }) => {
                let provider = self.state.get_room_handle_provider(room_id)?;
                let room_recv = provider.spectate()?;
                return Ok(ClientConstructor::Spectator(provider, room_recv));
            }
            Some(_) => return Err(ProtocolError::InvalidMessage),
            None => return Err(ProtocolError::Disconnected),
        };

        let provider = self
            .state
            .get_room_handle_provider(room_handle.room_id())?;
        Ok(ClientConstructor::Player(room_handle, provider, room_recv))
    }

    /// Tells the client where it ended up, along with the room as it is now.
    async fn announce_seat(
        &mut self,
        constructor: &ClientConstructor,
    ) -> Result<(), ProtocolError> {
        let (provider, player_id) = match constructor {
            ClientConstructor::Player(handle, provider, _) => (provider, handle.player_id()),
            ClientConstructor::Spectator(provider, _) => (provider, *self.player_id),
        };
        self.conn_tx
            .write_frame(Message::RoomJoined {
                room_id: provider.room_id(),
                player_id,
            })
            .await?;
        let room = provider.snapshot().await?;
        self.conn_tx.write_frame(Message::RoomInfo { room }).await?;
        Ok(())
    }
}

/// Our [`ConnectedClient`] constructors need to take ownership of a [`ConnectingClient`].
/// This allows us to return what kind of client to construct from `try_handshake` to the caller,
/// since the caller needs to retain ownership of `self` for error reporting to the client.
enum ClientConstructor {
    Player(RoomHandle, RoomHandleProvider, Subscription),
    Spectator(RoomHandleProvider, Subscription),
}

impl ClientConstructor {
    fn construct(self, client: ConnectingClient) -> ConnectedClient {
        match self {
            ClientConstructor::Player(room_handle, provider, room_recv) => {
                PlayerClient::from_connecting(client, room_handle, provider, room_recv).into()
            }
            ClientConstructor::Spectator(provider, room_recv) => {
                SpectatingClient::from_connecting(client, provider, room_recv).into()
            }
        }
    }
}

enum ConnectedClient {
    Player(PlayerClient),
    Spectator(SpectatingClient),
}

impl From<PlayerClient> for ConnectedClient {
    fn from(val: PlayerClient) -> Self {
        ConnectedClient::Player(val)
    }
}

impl From<SpectatingClient> for ConnectedClient {
    fn from(val: SpectatingClient) -> Self {
        ConnectedClient::Spectator(val)
    }
}

impl ConnectedClient {
    async fn run(self) {
        match self {
            ConnectedClient::Player(c) => c.run().await,
            ConnectedClient::Spectator(c) => c.run().await,
        }
    }
}

/// Forwards room events to the client, each followed by the room as it is after the change.
/// Replies queued on `local_rx` are written in between.
async fn send_task(
    mut conn_tx: ConnectionTx,
    mut room_rx: Subscription,
    provider: RoomHandleProvider,
    mut local_rx: mpsc::Receiver<Message>,
) {
    loop {
        let m = select! {
            Some(event) = room_rx.recv() => {
                if conn_tx.write_frame(event.into()).await.is_err() {
                    return;
                }
                match provider.snapshot().await {
                    Ok(room) => Message::RoomInfo { room },
                    Err(_) => return,
                }
            }
            Some(m) = local_rx.recv() => m,
            else => return,
        };

        if conn_tx.write_frame(m).await.is_err() {
            return;
        }
    }
}

/// Used to represent a client who is seated in a room.
struct PlayerClient {
    player_id: OwnedId<PlayerId>,
    conn_rx: ConnectionRx,
    local_tx: mpsc::Sender<Message>,
    _send_task: ChildTask<()>,
    room_handle: RoomHandle,
}

impl PlayerClient {
    fn from_connecting(
        client: ConnectingClient,
        room_handle: RoomHandle,
        provider: RoomHandleProvider,
        room_recv: Subscription,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let send_task = tokio::spawn(send_task(client.conn_tx, room_recv, provider, rx));

        PlayerClient {
            player_id: client.player_id,
            conn_rx: client.conn_rx,
            local_tx: tx,
            _send_task: send_task.into(),
            room_handle,
        }
    }

    /// Takes ownership of self to guarantee that client will be dropped when it's
    /// message loop ends
    #[instrument(skip_all, fields(
        player_id = %self.room_handle.player_id(),
        room_id = %self.room_handle.room_id()
    ))]
    async fn run(mut self) {
        loop {
            let incoming = match self.conn_rx.read_frame().await {
                Ok(Some(Message::Room(x))) => x,
                Ok(Some(m)) => {
                    tracing::error!("Invalid message received: {m:?}");
                    let _ = self
                        .local_tx
                        .send(Message::Error {
                            error: ProtocolError::InvalidMessage,
                        })
                        .await;
                    continue;
                }
                Ok(None) => {
                    break;
                }
                // The frame was already consumed, so the stream is still in sync
                Err(FrameError::Bincode(e)) => {
                    tracing::warn!("Undecodable message received: {e}");
                    let _ = self
                        .local_tx
                        .send(Message::Error {
                            error: ProtocolError::InvalidMessage,
                        })
                        .await;
                    continue;
                }
                Err(e) => {
                    tracing::error!("Error reading message, Closing connection\n{e:?}",);
                    break;
                }
            };

            tracing::debug!("Received message: {incoming:?}");
            match self.process(incoming).await {
                Ok(None) => (),
                Ok(Some(reply)) => {
                    let _ = self.local_tx.send(reply).await;
                }
                Err(e) => {
                    tracing::warn!("Rejected {incoming:?}: {e}");
                    let _ = self
                        .local_tx
                        .send(Message::Error { error: e.into() })
                        .await;
                }
            }
        }
        tracing::info!("Connection {} closed", self.player_id);
    }

    /// Applies one in-room action. Only a refresh has a direct reply, everything else is
    /// reported back through room events.
    async fn process(&mut self, msg: RoomMessage) -> Result<Option<Message>, RoomError> {
        match msg {
            RoomMessage::RollDice => self.room_handle.roll_dice().await?,
            RoomMessage::ToggleDie { index } => self.room_handle.toggle_die(index).await?,
            RoomMessage::SelectCell { row, column } => {
                self.room_handle.select_cell(row, column).await?
            }
            RoomMessage::Announce => self.room_handle.announce().await?,
            RoomMessage::WriteScore => {
                self.room_handle.write_score().await?;
            }
            RoomMessage::Refresh => {
                let room = self.room_handle.snapshot().await?;
                return Ok(Some(Message::RoomInfo { room }));
            }
        }
        Ok(None)
    }
}

/// A client watching a room without a seat. The only thing it may ask for is a refresh.
struct SpectatingClient {
    player_id: OwnedId<PlayerId>,
    conn_rx: ConnectionRx,
    local_tx: mpsc::Sender<Message>,
    _send_task: ChildTask<()>,
    provider: RoomHandleProvider,
}

impl SpectatingClient {
    fn from_connecting(
        client: ConnectingClient,
        provider: RoomHandleProvider,
        room_recv: Subscription,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let send_task = tokio::spawn(send_task(
            client.conn_tx,
            room_recv,
            provider.clone(),
            rx,
        ));

        Self {
            player_id: client.player_id,
            conn_rx: client.conn_rx,
            local_tx: tx,
            _send_task: send_task.into(),
            provider,
        }
    }

    /// Takes ownership of self to guarantee that client will be dropped when it's
    /// message loop ends
    #[instrument(skip_all, fields(player_id = %self.player_id, room_id = %self.provider.room_id()))]
    async fn run(mut self) {
        loop {
            let reply = match self.conn_rx.read_frame().await {
                Ok(Some(Message::Room(RoomMessage::Refresh))) => {
                    match self.provider.snapshot().await {
                        Ok(room) => Message::RoomInfo { room },
                        Err(e) => Message::Error { error: e.into() },
                    }
                }
                // Spectators can't act on the room
                Ok(Some(m)) => {
                    tracing::error!("Invalid message received: {m:?}");
                    Message::Error {
                        error: ProtocolError::InvalidMessage,
                    }
                }
                Ok(None) => {
                    break;
                }
                Err(FrameError::Bincode(e)) => {
                    tracing::warn!("Undecodable message received: {e}");
                    Message::Error {
                        error: ProtocolError::InvalidMessage,
                    }
                }
                Err(e) => {
                    tracing::error!("Error reading message, Closing connection\n{e:?}",);
                    break;
                }
            };
            let _ = self.local_tx.send(reply).await;
        }
        tracing::info!("Spectator {} disconnected", self.player_id);
    }
}

#[cfg(test)]
mod test {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use yamb_lib::net::{Message, ProtocolError, RoomMessage};
    use yamb_lib::room::RoomOptions;
    use yamb_lib::scorecard::{Column, Row};

    use super::handle_new_connection;
    use crate::state::ServerState;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    async fn send(socket: &mut TcpStream, message: &Message) {
        let body = bincode::serialize(message).unwrap();
        socket.write_all(&framed(&body)).await.unwrap();
    }

    async fn recv(socket: &mut TcpStream) -> Message {
        let len = socket.read_u16().await.unwrap();
        let mut body = vec![0; usize::from(len)];
        socket.read_exact(&mut body).await.unwrap();
        bincode::deserialize(&body).unwrap()
    }

    /// Connects to a fresh server and creates a room, reading everything sent up to the
    /// point where the client is idle.
    async fn seated_client() -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let state = ServerState::default();
            let (socket, _) = listener.accept().await.unwrap();
            handle_new_connection(state, socket).await;
        });

        let mut socket = TcpStream::connect(addr).await.unwrap();
        send(
            &mut socket,
            &Message::Version {
                version: crate::VERSION.to_owned(),
            },
        )
        .await;
        assert!(matches!(
            recv(&mut socket).await,
            Message::ConnectionAccept { .. }
        ));

        send(
            &mut socket,
            &Message::RoomCreate {
                options: RoomOptions::default(),
                name: "Ana".to_owned(),
            },
        )
        .await;
        assert!(matches!(
            recv(&mut socket).await,
            Message::RoomJoined { .. }
        ));
        assert!(matches!(recv(&mut socket).await, Message::RoomInfo { .. }));
        // PlayerJoined and ScoreUpdated, each followed by the room
        for _ in 0..2 {
            assert!(matches!(recv(&mut socket).await, Message::Event { .. }));
            assert!(matches!(recv(&mut socket).await, Message::RoomInfo { .. }));
        }
        socket
    }

    #[tokio::test]
    async fn undecodable_message_keeps_connection() {
        let mut socket = seated_client().await;

        // A cell selection whose row tag doesn't name any row
        let mut body = bincode::serialize(&Message::Room(RoomMessage::SelectCell {
            row: Row::One,
            column: Column::Free,
        }))
        .unwrap();
        assert_eq!(body, [8, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0]);
        body[8] = 99;
        socket.write_all(&framed(&body)).await.unwrap();
        send(&mut socket, &Message::Room(RoomMessage::Refresh)).await;

        assert!(matches!(
            recv(&mut socket).await,
            Message::Error {
                error: ProtocolError::InvalidMessage
            }
        ));
        let Message::RoomInfo { room } = recv(&mut socket).await else {
            panic!("Connection didn't answer the refresh");
        };
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[0].name, "Ana");
    }
}

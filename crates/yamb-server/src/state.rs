use rand::{thread_rng, Rng};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use yamb_lib::net::ProtocolError;
use yamb_lib::room::RoomOptions;
use yamb_lib::{PlayerId, RoomId, ROOM_ID_SPACE};

use crate::room;
use crate::room::room_handle::{RoomHandle, RoomHandleProvider};

/// Every connected player and open room. Cloning shares the same registry.
#[derive(Clone, Debug, Default)]
pub struct ServerState {
    players: Arc<Mutex<HashSet<PlayerId>>>,
    rooms: Arc<Mutex<HashMap<RoomId, RoomHandleProvider>>>,
}

impl ServerState {
    pub fn add_player(&self) -> OwnedId<PlayerId> {
        let mut players = self.players();
        let player_id: PlayerId =
            gen_unique_id(|| thread_rng().gen::<u32>(), |id| players.contains(id));
        players.insert(player_id);
        OwnedId::<PlayerId>::new(self.clone(), player_id)
    }

    /// Open a new room with the player represented by `host_id` holding the only handle.
    ///
    /// This will add a [`RoomHandleProvider`] to [`ServerState`]'s room list and return a
    /// concrete `RoomHandle` for the player who opened the room. The host still has to
    /// join it to take a seat.
    pub fn open_room(&self, options: RoomOptions, host_id: PlayerId) -> RoomHandle {
        // Generating and inserting under one lock keeps two new rooms from sharing a code
        let mut rooms = self.rooms();
        let room_id: RoomId = gen_unique_id(
            || thread_rng().gen_range(0..ROOM_ID_SPACE),
            |id| rooms.contains_key(id),
        );
        let (handle_provider, handle) = room::start_new_room(
            OwnedId::<RoomId>::new(self.clone(), room_id),
            options,
            host_id,
        );
        rooms.insert(room_id, handle_provider);
        tracing::info!("Room {room_id} opened");
        handle
    }

    /// Get a [`RoomHandleProvider`] instance for the specified `room_id`
    ///
    /// # Errors
    ///
    /// Will return a [`ProtocolError::InvalidRoomId`] if the given room id does
    /// not correspond to an open room.
    pub fn get_room_handle_provider(
        &self,
        room_id: RoomId,
    ) -> Result<RoomHandleProvider, ProtocolError> {
        let provider = self
            .rooms()
            .get(&room_id)
            .ok_or(ProtocolError::InvalidRoomId(room_id))?
            .clone();
        Ok(provider)
    }

    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }

    pub fn player_count(&self) -> usize {
        self.players().len()
    }

    fn players(&self) -> MutexGuard<HashSet<PlayerId>> {
        self.players.lock().unwrap()
    }

    fn rooms(&self) -> MutexGuard<HashMap<RoomId, RoomHandleProvider>> {
        self.rooms.lock().unwrap()
    }
}

/// Draws ids until one isn't `taken`.
fn gen_unique_id<Id: From<u32>>(
    mut draw: impl FnMut() -> u32,
    taken: impl Fn(&Id) -> bool,
) -> Id {
    loop {
        let id = draw().into();
        if !taken(&id) {
            return id;
        }
    }
}

/// Wrapper around Id types that is handed out when an Id is stored in the state
/// and when dropped will remove that id from the state.
#[derive(Debug)]
pub struct OwnedId<Id: Copy> {
    state: ServerState,
    id: Id,
    cleanup: fn(ServerState, Id),
}

impl<Id: Display + Copy> Display for OwnedId<Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.id.fmt(f)
    }
}

/// Workaround for testing RoomActor
#[cfg(test)]
impl From<RoomId> for OwnedId<RoomId> {
    fn from(v: RoomId) -> Self {
        Self {
            state: ServerState::default(),
            id: v,
            cleanup: |_, _| {},
        }
    }
}

impl OwnedId<PlayerId> {
    fn new(state: ServerState, id: PlayerId) -> Self {
        Self {
            state,
            id,
            cleanup: |state, id| {
                tracing::info!("Player {id} disconnected");
                state.players().remove(&id);
            },
        }
    }
}

impl OwnedId<RoomId> {
    fn new(state: ServerState, id: RoomId) -> Self {
        Self {
            state,
            id,
            cleanup: |state, id| {
                tracing::info!("Closing room {id}");
                state.rooms().remove(&id);
            },
        }
    }
}

impl<Id: Copy> Deref for OwnedId<Id> {
    type Target = Id;

    fn deref(&self) -> &Self::Target {
        &self.id
    }
}

impl<Id: Copy> Drop for OwnedId<Id> {
    fn drop(&mut self) {
        // This will crash the program if we're dropping due to a previous panic caused by a poisoned lock,
        // and that's fine for now.
        (self.cleanup)(self.state.clone(), self.id);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;
    use yamb_lib::{
        event::Event, net::ProtocolError, room::RoomOptions, PlayerId, RoomId, ROOM_ID_SPACE,
    };

    use super::{gen_unique_id, ServerState};
    use crate::room::RoomError;

    #[test]
    fn players_leave_on_drop() {
        let state = ServerState::default();
        let a = state.add_player();
        let b = state.add_player();
        assert_ne!(*a, *b);
        assert_eq!(state.player_count(), 2);

        drop(a);
        assert_eq!(state.player_count(), 1);
        drop(b);
        assert_eq!(state.player_count(), 0);
    }

    #[test]
    fn unique_id_skips_taken() {
        let mut draws = [7, 7, 3, 9].into_iter();
        let id: PlayerId = gen_unique_id(
            || draws.next().unwrap(),
            |id| *id == 7 || *id == 3,
        );
        assert_eq!(id, 9);
    }

    #[test]
    fn unknown_room() {
        let state = ServerState::default();
        assert_eq!(
            state.get_room_handle_provider(RoomId(12)).unwrap_err(),
            ProtocolError::InvalidRoomId(RoomId(12))
        );
    }

    #[tokio::test]
    async fn room_closes_with_last_handle() {
        let state = ServerState::default();
        let handle = state.open_room(RoomOptions::default(), 1.into());
        let room_id = handle.room_id();
        assert!(room_id.0 < ROOM_ID_SPACE);
        assert_eq!(state.room_count(), 1);

        let provider = state.get_room_handle_provider(room_id).unwrap();
        assert_eq!(provider.room_id(), room_id);
        let room = provider.snapshot().await.unwrap();
        assert_eq!(room.room_id, room_id);
        assert!(room.players.is_empty());

        drop(handle);
        timeout(Duration::from_millis(500), async {
            while state.room_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("Room was never removed");
        assert!(provider.snapshot().await.is_err());
        assert!(state.get_room_handle_provider(room_id).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rolls_share_one_turn() {
        let state = ServerState::default();
        let host = state.open_room(RoomOptions::default(), 1.into());
        let provider = state.get_room_handle_provider(host.room_id()).unwrap();
        let _host_events = host.join_room("Ana".to_owned()).await.unwrap();
        let guest = provider.clone().into_handle(2).unwrap();
        let _guest_events = guest.join_room("Ben".to_owned()).await.unwrap();
        let mut spectator = provider.spectate().unwrap();

        let host = Arc::new(host);
        let rolls = (0..20)
            .map(|_| {
                let host = host.clone();
                tokio::spawn(async move { host.roll_dice().await })
            })
            .collect::<Vec<_>>();
        let mut rolled = 0;
        for roll in rolls {
            match roll.await.unwrap() {
                Ok(()) => rolled += 1,
                Err(e) => assert_eq!(e, RoomError::NoRollsLeft),
            }
        }
        assert_eq!(rolled, 3);

        let room = provider.snapshot().await.unwrap();
        assert_eq!(room.dice.rolls_left(), 0);
        assert_eq!(room.current_player().map(|p| p.id), Some(PlayerId::from(1)));
        assert_eq!(spectator.try_recv(), Some(Event::DiceAreaUpdated));
    }
}

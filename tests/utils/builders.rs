use petwheel::{GameRoomCoordinator, UserIdentity, WheelPet};

pub fn identity(id: &str, display_name: &str) -> UserIdentity {
    UserIdentity {
        id: id.to_string(),
        display_name: display_name.to_string(),
        avatar: None,
    }
}

pub fn pet(name: &str, value: f64) -> WheelPet {
    WheelPet {
        name: name.to_string(),
        image: format!("/pets/{}.png", name.to_lowercase()),
        value,
    }
}

/// Builds a room that has already been joined (and optionally started)
pub struct PlayingRoomBuilder {
    host: UserIdentity,
    guests: Vec<UserIdentity>,
    wheel: Vec<WheelPet>,
    max_players: u32,
    start: bool,
}

impl PlayingRoomBuilder {
    pub fn new() -> Self {
        Self {
            host: identity("host", "Hana"),
            guests: vec![identity("guest", "Gus")],
            wheel: (1..=10).map(|i| pet(&format!("Pet{}", i), i as f64 * 100.0)).collect(),
            max_players: 2,
            start: true,
        }
    }

    pub fn with_guests(mut self, guests: Vec<UserIdentity>) -> Self {
        self.max_players = self.max_players.max(guests.len() as u32 + 1);
        self.guests = guests;
        self
    }

    pub fn waiting(mut self) -> Self {
        self.start = false;
        self
    }

    /// Returns the new room id
    pub async fn build(self, coordinator: &GameRoomCoordinator) -> String {
        let room_id = coordinator
            .create_room(&self.host, self.wheel, self.max_players)
            .await
            .expect("room should be created");

        for guest in &self.guests {
            assert!(coordinator.send_invite(&room_id, &self.host, &guest.id).await);
            assert!(coordinator.accept_invite(&room_id, guest).await);
        }

        if self.start {
            assert!(coordinator.start_game(&room_id, &self.host.id).await);
        }
        room_id
    }
}

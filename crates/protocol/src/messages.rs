//! WebSocket message types for engine-client communication
//!
//! This module contains all message types exchanged over the WebSocket
//! connection. The engine receives `ClientMessage` and sends `ServerMessage`;
//! clients do the reverse.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Removing variants requires major version bump
//! - Renaming variants is a breaking change
//! - Unknown enum variants deserialize to `Unknown` variant for forward compatibility

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gridhall_domain::{Point, SquareId, TableStatus, TokenSize};

use crate::responses::ErrorCode;
use crate::types::{
    AuraData, DiceRollData, InitiativeEntryData, MeasurementData, PersistentMeasurementData,
    SceneData, ShapeGeometryData, TableData, TokenData,
};

// =============================================================================
// Client Messages (Client → Engine)
// =============================================================================

/// Messages from client to engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Subscribe this connection to a table's live session
    JoinTable { table_id: Uuid },

    // =========================================================================
    // Tokens
    // =========================================================================
    /// GM places a new token on a scene
    RequestPlaceToken {
        scene_id: Uuid,
        name: String,
        square_id: SquareId,
        #[serde(default)]
        size: TokenSize,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        image_asset: Option<String>,
        #[serde(default)]
        character_id: Option<Uuid>,
        #[serde(default)]
        owner: Option<Uuid>,
        #[serde(default)]
        can_overlap: bool,
        /// Movement budget in meters; falls back to the standard budget
        #[serde(default)]
        movement_max: Option<f64>,
        /// Also append an initiative entry linked to the new token
        #[serde(default)]
        add_to_initiative: bool,
    },
    /// Move a token to a new anchor square
    RequestMoveToken { token_id: Uuid, square_id: SquareId },
    /// Undo the token's most recent move
    RequestUndoMove { token_id: Uuid },
    /// GM edits token fields; absent fields stay unchanged
    RequestEditToken {
        token_id: Uuid,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        image_asset: Option<String>,
        #[serde(default)]
        size: Option<TokenSize>,
        #[serde(default)]
        can_overlap: Option<bool>,
        #[serde(default)]
        movement_max: Option<f64>,
    },
    /// GM assigns the token to a player, or clears the assignment
    RequestAssignToken {
        token_id: Uuid,
        #[serde(default)]
        owner: Option<Uuid>,
    },

    // =========================================================================
    // Initiative
    // =========================================================================
    /// GM appends an initiative entry, optionally linked to a token
    RequestAddCharacterToInitiative {
        scene_id: Uuid,
        name: String,
        #[serde(default)]
        token_id: Option<Uuid>,
    },
    /// GM advances the turn marker
    RequestNextTurn { scene_id: Uuid },
    /// GM clears the whole initiative order
    RequestResetInitiative { scene_id: Uuid },
    /// GM removes one entry, optionally deleting the linked token
    RequestRemoveFromInitiative {
        scene_id: Uuid,
        entry_id: Uuid,
        #[serde(default)]
        remove_token: bool,
    },
    /// GM reorders the initiative; must list every entry exactly once
    RequestReorderInitiative { scene_id: Uuid, entry_ids: Vec<Uuid> },
    /// GM renames an entry (and its linked token, if any)
    RequestEditInitiativeEntry {
        scene_id: Uuid,
        entry_id: Uuid,
        name: String,
    },

    // =========================================================================
    // Measurements & Auras
    // =========================================================================
    /// Share this user's live measurement; replaces their previous one
    RequestShareMeasurement {
        scene_id: Uuid,
        geometry: ShapeGeometryData,
        #[serde(default)]
        color: Option<String>,
    },
    /// Withdraw this user's live measurement
    RequestRemoveMeasurement,
    /// GM pins a measurement so it survives disconnects
    RequestAddPersistentMeasurement {
        scene_id: Uuid,
        /// Client-chosen id; the engine generates one when absent
        #[serde(default)]
        id: Option<String>,
        geometry: ShapeGeometryData,
        #[serde(default)]
        color: Option<String>,
    },
    /// GM removes a pinned measurement
    RequestRemovePersistentMeasurement { scene_id: Uuid, id: String },
    /// Create or replace the aura on a token
    RequestUpsertAura {
        scene_id: Uuid,
        token_id: Uuid,
        radius_meters: f64,
        #[serde(default)]
        color: Option<String>,
    },
    /// Remove the aura on a token
    RequestRemoveAura { scene_id: Uuid, token_id: Uuid },
    /// GM wipes live measurements, pinned measurements and auras
    RequestClearAllMeasurements,
    /// Flash a point on the map for everyone
    RequestPing {
        scene_id: Uuid,
        point: Point,
        #[serde(default)]
        color: Option<String>,
    },

    // =========================================================================
    // Scenes
    // =========================================================================
    /// GM creates a new scene with default grid settings
    RequestCreateScene {
        name: String,
        #[serde(default)]
        map_asset: Option<String>,
    },
    /// GM renames a scene
    RequestRenameScene { scene_id: Uuid, name: String },
    /// GM deletes a scene and everything on it
    RequestDeleteScene { scene_id: Uuid },
    /// GM switches which scene everybody sees
    RequestSetActiveScene { scene_id: Uuid },
    /// GM sets or clears the scene's map image
    RequestSetMap {
        scene_id: Uuid,
        #[serde(default)]
        map_asset: Option<String>,
    },
    /// GM reorders the scene list; must list every scene exactly once
    RequestReorderScenes { scene_ids: Vec<Uuid> },
    /// GM resizes the grid
    RequestUpdateGridDimensions {
        scene_id: Uuid,
        width: u32,
        height: u32,
    },
    /// GM changes how many meters one square covers
    RequestUpdateSceneScale {
        scene_id: Uuid,
        meters_per_square: f64,
    },

    // =========================================================================
    // Session
    // =========================================================================
    /// GM moves the session through its lifecycle
    RequestUpdateSessionStatus {
        status: SessionStatusData,
        /// RFC 3339 resume time, only meaningful when pausing
        #[serde(default)]
        paused_until: Option<String>,
    },
    /// GM starts a scene transition effect; duration is clamped server-side
    RequestStartTransition {
        #[serde(default)]
        duration_ms: Option<u64>,
    },

    // =========================================================================
    // Dice
    // =========================================================================
    /// Roll dice and broadcast the outcome to the table
    RequestRollDice {
        formula: String,
        #[serde(default)]
        label: Option<String>,
        /// Attribute the roll to a character; players may only name their own
        #[serde(default)]
        character_id: Option<Uuid>,
    },

    /// Heartbeat ping
    Heartbeat,

    /// Unknown message type for forward compatibility
    ///
    /// When deserializing an unknown variant, this variant is used instead of
    /// failing. Allows the engine to gracefully ignore newer client messages.
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Server Messages (Engine → Client)
// =============================================================================

/// Messages from engine to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full session snapshot, sent to a connection right after it joins
    InitialSessionState {
        table: TableData,
        scenes: Vec<SceneData>,
        /// Tokens on the active scene
        tokens: Vec<TokenData>,
        /// Live measurements currently shown on the table
        measurements: Vec<MeasurementData>,
        /// Pinned measurements on the active scene
        persistent_measurements: Vec<PersistentMeasurementData>,
        /// Auras on the active scene
        auras: Vec<AuraData>,
        connected_users: Vec<Uuid>,
    },
    /// Another user joined the table
    PlayerJoined { user_id: Uuid },
    /// A user's last connection to the table closed
    PlayerLeft { user_id: Uuid },

    // =========================================================================
    // Tokens
    // =========================================================================
    /// A token appeared on the scene
    TokenPlaced { token: TokenData },
    /// A token moved; carries what clients need to animate the step
    TokenMoved {
        token_id: Uuid,
        old_square_id: SquareId,
        square_id: SquareId,
        remaining_movement: f64,
    },
    /// A token's fields changed
    TokenUpdated { token: TokenData },
    /// A token's player assignment changed
    TokenOwnerUpdated {
        token_id: Uuid,
        #[serde(default)]
        owner: Option<Uuid>,
    },
    /// A token left the scene
    TokenRemoved { token_id: Uuid },

    // =========================================================================
    // Initiative
    // =========================================================================
    /// An entry joined the initiative order
    InitiativeEntryAdded {
        scene_id: Uuid,
        entry: InitiativeEntryData,
    },
    /// The turn marker moved
    InitiativeTurnAdvanced {
        scene_id: Uuid,
        entry_id: Uuid,
        new_round: bool,
    },
    /// A new round restored every token's movement budget
    TokensMovementReset { scene_id: Uuid, token_ids: Vec<Uuid> },
    /// The initiative order was cleared
    InitiativeReset { scene_id: Uuid },
    /// An entry left the initiative order
    InitiativeEntryRemoved { scene_id: Uuid, entry_id: Uuid },
    /// The initiative order changed; carries the new order in full
    InitiativeOrderUpdated {
        scene_id: Uuid,
        entries: Vec<InitiativeEntryData>,
    },
    /// An entry was renamed
    InitiativeEntryUpdated {
        scene_id: Uuid,
        entry: InitiativeEntryData,
    },

    // =========================================================================
    // Measurements & Auras
    // =========================================================================
    /// A user shared or replaced their live measurement
    MeasurementShared { measurement: MeasurementData },
    /// A user withdrew their live measurement
    MeasurementRemoved { user_id: Uuid },
    /// Live measurements were wiped; unless `ephemeralOnly`, pinned
    /// measurements and auras went with them
    AllMeasurementsCleared {
        #[serde(default)]
        ephemeral_only: bool,
    },
    /// A measurement was pinned
    PersistentMeasurementAdded { measurement: PersistentMeasurementData },
    /// A pinned measurement was removed
    PersistentMeasurementRemoved { scene_id: Uuid, id: String },
    /// An aura was created or replaced
    AuraUpserted { aura: AuraData },
    /// An aura was removed
    AuraRemoved { scene_id: Uuid, token_id: Uuid },
    /// A user pinged a point on the map
    PingBroadcast {
        scene_id: Uuid,
        user_id: Uuid,
        point: Point,
        #[serde(default)]
        color: Option<String>,
    },

    // =========================================================================
    // Scenes
    // =========================================================================
    /// A scene was created
    SceneCreated { scene: SceneData },
    /// A scene was renamed
    SceneRenamed { scene_id: Uuid, name: String },
    /// A scene was deleted; carries the new active scene, if any
    SceneDeleted {
        scene_id: Uuid,
        #[serde(default)]
        active_scene_id: Option<Uuid>,
    },
    /// The scene list order changed
    ScenesReordered { scene_ids: Vec<Uuid> },
    /// The table switched scenes; carries the new scene's full state
    ActiveSceneChanged {
        scene: SceneData,
        tokens: Vec<TokenData>,
        persistent_measurements: Vec<PersistentMeasurementData>,
        auras: Vec<AuraData>,
    },
    /// The scene's map image changed
    MapUpdated {
        scene_id: Uuid,
        #[serde(default)]
        map_asset: Option<String>,
    },
    /// The scene's grid was resized
    GridDimensionsUpdated {
        scene_id: Uuid,
        width: u32,
        height: u32,
    },
    /// The scene's scale changed
    SceneScaleUpdated {
        scene_id: Uuid,
        meters_per_square: f64,
    },

    // =========================================================================
    // Session
    // =========================================================================
    /// The session moved through its lifecycle
    SessionStatusUpdated {
        status: SessionStatusData,
        #[serde(default)]
        paused_until: Option<String>,
    },
    /// A scene transition effect should play for this many milliseconds
    SessionTransition { duration_ms: u64 },

    // =========================================================================
    // Dice
    // =========================================================================
    /// Somebody rolled dice
    DiceRolled { roll: DiceRollData },

    /// Heartbeat response
    Pong,

    /// A request was rejected; sent only to the requester
    Error {
        code: ErrorCode,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },

    /// Unknown message type for forward compatibility
    ///
    /// When deserializing an unknown variant, this variant is used instead of
    /// failing. Allows older clients to gracefully handle new message types.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Build an error reply
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Build an error reply with structured details
    pub fn error_with_details<T: Serialize>(
        code: ErrorCode,
        message: impl Into<String>,
        details: T,
    ) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
            details: Some(serde_json::to_value(details).unwrap_or_default()),
        }
    }
}

// =============================================================================
// Session Status
// =============================================================================

/// Session lifecycle on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatusData {
    Preparing,
    Live,
    Paused,
    Ended,
    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}

impl From<TableStatus> for SessionStatusData {
    fn from(status: TableStatus) -> Self {
        match status {
            TableStatus::Preparing => SessionStatusData::Preparing,
            TableStatus::Live => SessionStatusData::Live,
            TableStatus::Paused => SessionStatusData::Paused,
            TableStatus::Ended => SessionStatusData::Ended,
        }
    }
}

/// Error when converting wire SessionStatusData to the domain type.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown session status cannot be converted to domain type")]
pub struct UnknownSessionStatusError;

impl TryFrom<SessionStatusData> for TableStatus {
    type Error = UnknownSessionStatusError;

    fn try_from(status: SessionStatusData) -> Result<Self, Self::Error> {
        match status {
            SessionStatusData::Preparing => Ok(TableStatus::Preparing),
            SessionStatusData::Live => Ok(TableStatus::Live),
            SessionStatusData::Paused => Ok(TableStatus::Paused),
            SessionStatusData::Ended => Ok(TableStatus::Ended),
            SessionStatusData::Unknown => Err(UnknownSessionStatusError),
        }
    }
}

#[cfg(test)]
mod serde_tests {
    use super::*;
    use gridhall_domain::MeasurementKind;

    #[test]
    fn client_message_uses_camel_case_tags_and_fields() {
        let msg = ClientMessage::RequestMoveToken {
            token_id: Uuid::nil(),
            square_id: SquareId::new(44),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "requestMoveToken");
        assert_eq!(json["tokenId"], Uuid::nil().to_string());
        assert_eq!(json["squareId"], "sq-44");
    }

    #[test]
    fn client_message_round_trip_join_table() {
        let msg = ClientMessage::JoinTable {
            table_id: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&msg).expect("serialize");
        let decoded: ClientMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(format!("{:?}", decoded), format!("{:?}", msg));
    }

    #[test]
    fn client_message_round_trip_place_token_with_defaults() {
        let json = format!(
            r#"{{"type":"requestPlaceToken","sceneId":"{}","name":"Goblin","squareId":"sq-12"}}"#,
            Uuid::new_v4()
        );

        let decoded: ClientMessage = serde_json::from_str(&json).expect("deserialize");
        match decoded {
            ClientMessage::RequestPlaceToken {
                size,
                can_overlap,
                movement_max,
                add_to_initiative,
                ..
            } => {
                assert_eq!(size, TokenSize::Medium);
                assert!(!can_overlap);
                assert!(movement_max.is_none());
                assert!(!add_to_initiative);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn client_message_round_trip_share_measurement() {
        let msg = ClientMessage::RequestShareMeasurement {
            scene_id: Uuid::new_v4(),
            geometry: ShapeGeometryData {
                kind: MeasurementKind::Cone,
                origin: Point { x: 1.0, y: 2.0 },
                target: Point { x: 5.0, y: 7.5 },
            },
            color: Some("#ff8800".to_string()),
        };

        let json = serde_json::to_string(&msg).expect("serialize");
        let decoded: ClientMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(format!("{:?}", decoded), format!("{:?}", msg));
    }

    #[test]
    fn unknown_client_message_types_do_not_fail() {
        let decoded: ClientMessage =
            serde_json::from_str(r#"{"type":"requestTeleport","tokenId":"x"}"#).unwrap();
        assert!(matches!(decoded, ClientMessage::Unknown));
    }

    #[test]
    fn server_message_token_moved_wire_shape() {
        let msg = ServerMessage::TokenMoved {
            token_id: Uuid::nil(),
            old_square_id: SquareId::new(0),
            square_id: SquareId::new(44),
            remaining_movement: 24.0,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "tokenMoved");
        assert_eq!(json["oldSquareId"], "sq-0");
        assert_eq!(json["squareId"], "sq-44");
        assert_eq!(json["remainingMovement"], 24.0);
    }

    #[test]
    fn server_message_error_omits_empty_details() {
        let msg = ServerMessage::error(ErrorCode::Forbidden, "only the GM can do that");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "forbidden");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn session_status_round_trips_through_the_domain() {
        for status in [
            TableStatus::Preparing,
            TableStatus::Live,
            TableStatus::Paused,
            TableStatus::Ended,
        ] {
            let wire = SessionStatusData::from(status);
            let back = TableStatus::try_from(wire).unwrap();
            assert_eq!(back, status);
        }
        assert!(TableStatus::try_from(SessionStatusData::Unknown).is_err());
    }

    #[test]
    fn session_status_serializes_upper_case() {
        let json = serde_json::to_value(SessionStatusData::Live).unwrap();
        assert_eq!(json, "LIVE");
        let decoded: SessionStatusData = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(decoded, SessionStatusData::Unknown);
    }
}

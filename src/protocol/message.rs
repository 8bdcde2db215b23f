//! Message taxonomy for the board protocol

use crate::board::{Element, Role};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Operations sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Handshake with protocol version
    Hello { protocol_version: u32 },

    /// Join a board; tokens are resolved server-side into a caller identity
    JoinBoard {
        board_id: Uuid,
        auth_token: Option<String>,
        anon_token: Option<String>,
    },

    /// Leave the joined board
    LeaveBoard,

    /// Presence: cursor moved
    UpdateCursor { x: f64, y: f64 },

    /// Presence: selection replaced
    UpdateSelection { element_ids: Vec<Uuid> },

    /// Presence: selection emptied
    ClearSelection,

    /// Create an element; `temp_id` is echoed back for client correlation
    AddElement {
        element_type: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        data: Value,
        temp_id: Option<String>,
    },

    /// Create a freehand drawing stroke
    AddDrawingPath {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        data: Value,
        temp_id: Option<String>,
    },

    MoveElement { element_id: Uuid, x: f64, y: f64 },

    ResizeElement {
        element_id: Uuid,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    /// Line-only: set absolute endpoints
    UpdateLineEndpoints {
        element_id: Uuid,
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
    },

    /// Merge-patch into the element payload
    UpdateElementStyle { element_id: Uuid, style: Value },

    UpdateElementLock { element_id: Uuid, locked: bool },

    /// Type-checked merge-patch for sticky notes
    UpdateStickyNote { element_id: Uuid, data: Value },

    /// Type-checked merge-patch for text elements
    UpdateTextElement { element_id: Uuid, data: Value },

    BringToFront { element_id: Uuid },

    SendToBack { element_id: Uuid },

    DeleteElement { element_id: Uuid },

    /// Group the listed elements, in order
    CreateGroup { element_ids: Vec<Uuid> },

    UngroupElements { group_id: Uuid },

    MoveGroup { group_id: Uuid, dx: f64, dy: f64 },

    DeleteGroup { group_id: Uuid },

    BringGroupToFront { group_id: Uuid },

    SendGroupToBack { group_id: Uuid },

    /// Signal every viewer to clear; elements themselves are untouched
    ClearBoard,
}

/// Events sent from server to clients.
///
/// Mutation events go to every subscriber of the board including the
/// originator, so the caller's UI updates from the authoritative server
/// response. Presence events go to the other subscribers only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Handshake response on connect
    Welcome {
        connection_id: Uuid,
        protocol_version: u32,
    },

    UserJoined { user: Participant },

    UserLeft {
        connection_id: Uuid,
        display_name: String,
    },

    /// Full participant list, sent to a joining caller
    ActiveUsersUpdated { users: Vec<Participant> },

    /// The joining caller's effective permissions on the board
    BoardPermissions { role: Role, can_edit: bool },

    /// Board snapshot for a late joiner: elements in stacking order plus
    /// other participants' non-default presence state
    CurrentStateUpdate {
        elements: Vec<Element>,
        users: Vec<Participant>,
    },

    CursorUpdated {
        connection_id: Uuid,
        x: f64,
        y: f64,
    },

    SelectionUpdated {
        connection_id: Uuid,
        element_ids: Vec<Uuid>,
    },

    SelectionCleared { connection_id: Uuid },

    ElementAdded {
        element: Element,
        temp_id: Option<String>,
    },

    ElementMoved { element: Element },

    ElementResized { element: Element },

    LineEndpointsUpdated { element: Element },

    ElementStyleUpdated { element: Element },

    ElementLockUpdated { element: Element },

    StickyNoteUpdated { element: Element },

    TextElementUpdated { element: Element },

    ElementZIndexUpdated { element: Element },

    ElementDeleted { element_id: Uuid },

    GroupCreated {
        group_id: Uuid,
        elements: Vec<Element>,
    },

    GroupUngrouped {
        group_id: Uuid,
        element_ids: Vec<Uuid>,
    },

    GroupMoved {
        group_id: Uuid,
        dx: f64,
        dy: f64,
        elements: Vec<Element>,
    },

    GroupDeleted {
        group_id: Uuid,
        element_ids: Vec<Uuid>,
    },

    GroupZIndexChanged {
        group_id: Uuid,
        elements: Vec<Element>,
    },

    /// View-clear signal; does not delete elements
    BoardCleared { board_id: Uuid },

    /// Operation failure, delivered to the caller only
    Error { message: String },
}

/// Presence snapshot of one connection, as seen by other participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: Uuid,
    pub display_name: String,
    /// Present only once the cursor has moved off the origin
    pub cursor: Option<CursorPosition>,
    pub selected_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl From<&Session> for Participant {
    fn from(session: &Session) -> Self {
        let cursor = (session.cursor_x != 0.0 || session.cursor_y != 0.0).then_some(
            CursorPosition {
                x: session.cursor_x,
                y: session.cursor_y,
            },
        );
        Self {
            connection_id: session.connection_id,
            display_name: session.display_name.clone(),
            cursor,
            selected_ids: session.selected_ids.clone(),
        }
    }
}

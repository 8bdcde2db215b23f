//! Accept loop, connection lifecycle, and operation dispatch
//!
//! Each connection walks `Unjoined -> Joined(board) -> Unjoined`. Explicit
//! leave and involuntary disconnect share one teardown path, so the pair
//! never double-emits `UserLeft`.

use super::connection::{client_writer_task, read_message};
use crate::access::{authorize, Caller, IdentityResolver};
use crate::board::{ElementType, Role};
use crate::broadcast::Broadcaster;
use crate::coordinator::{CoordinationError, ElementCoordinator, GroupCoordinator, NewElement};
use crate::protocol::{
    check_version_compatibility, deserialize, ClientMessage, Participant, ServerMessage,
    PROTOCOL_VERSION,
};
use crate::session::SessionRegistry;
use crate::store::{BoardStore, ElementStore};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbox depth per connection; a subscriber this far behind starts losing
/// broadcasts rather than stalling the publisher
const OUTBOX_CAPACITY: usize = 256;

/// Shared collaborators wired together at startup
pub struct ServerContext {
    pub sessions: SessionRegistry,
    pub broadcaster: Broadcaster,
    pub elements: ElementCoordinator,
    pub groups: GroupCoordinator,
    pub element_store: Arc<dyn ElementStore>,
    pub board_store: Arc<dyn BoardStore>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl ServerContext {
    pub fn new(
        element_store: Arc<dyn ElementStore>,
        board_store: Arc<dyn BoardStore>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self::with_sessions(element_store, board_store, identity, SessionRegistry::new())
    }

    /// Wire in a registry with a non-default clock or expiry window
    pub fn with_sessions(
        element_store: Arc<dyn ElementStore>,
        board_store: Arc<dyn BoardStore>,
        identity: Arc<dyn IdentityResolver>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            sessions,
            broadcaster: Broadcaster::new(),
            elements: ElementCoordinator::new(element_store.clone()),
            groups: GroupCoordinator::new(element_store.clone()),
            element_store,
            board_store,
            identity,
        }
    }
}

/// TCP server listener
pub struct ServerListener {
    listener: TcpListener,
    context: Arc<ServerContext>,
}

impl ServerListener {
    /// Bind the listening socket; `addr` may use port 0 to let the OS pick
    pub async fn bind(addr: &str, context: Arc<ServerContext>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);
        Ok(Self { listener, context })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the shutdown signal arrives
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let context = Arc::clone(&self.context);
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, context).await {
                                    tracing::error!("Client error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Per-connection state held by its reader task
struct Connection {
    id: Uuid,
    outbox: mpsc::Sender<ServerMessage>,
    caller: Option<Caller>,
    joined: Option<JoinedBoard>,
}

struct JoinedBoard {
    board_id: Uuid,
    role: Role,
}

impl Connection {
    /// Direct reply to this caller only
    async fn reply(&self, msg: ServerMessage) {
        if self.outbox.send(msg).await.is_err() {
            tracing::debug!(connection = %self.id, "Reply dropped; outbox closed");
        }
    }

    async fn error(&self, message: impl Into<String>) {
        self.reply(ServerMessage::Error {
            message: message.into(),
        })
        .await;
    }

    /// Identity recorded in audit fields for this connection's mutations
    fn actor(&self) -> String {
        self.caller
            .as_ref()
            .map(Caller::audit_id)
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

/// Handle a single client connection from accept to teardown
async fn handle_client(stream: TcpStream, context: Arc<ServerContext>) -> Result<()> {
    let (mut reader, writer) = stream.into_split();

    let (outbox_tx, outbox_rx) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);
    let mut conn = Connection {
        id: Uuid::new_v4(),
        outbox: outbox_tx,
        caller: None,
        joined: None,
    };

    tracing::info!(connection = %conn.id, "Client connected");
    let writer_handle = tokio::spawn(client_writer_task(writer, outbox_rx));

    conn.reply(ServerMessage::Welcome {
        connection_id: conn.id,
        protocol_version: PROTOCOL_VERSION,
    })
    .await;

    loop {
        match read_message(&mut reader).await {
            Ok(Some(bytes)) => match deserialize::<ClientMessage>(&bytes) {
                Ok(msg) => process_message(msg, &mut conn, &context).await,
                Err(e) => {
                    conn.error(format!("Invalid message: {}", e)).await;
                }
            },
            Ok(None) => {
                tracing::info!(connection = %conn.id, "Client disconnected");
                break;
            }
            Err(e) => {
                tracing::error!(connection = %conn.id, "Error reading from client: {}", e);
                break;
            }
        }
    }

    // Same teardown as an explicit leave; no-op when already left
    teardown(&mut conn, &context).await;
    writer_handle.abort();

    tracing::debug!(connection = %conn.id, "Client handler finished");
    Ok(())
}

/// Leave/disconnect teardown: unsubscribe, drop the session, tell the others.
/// Idempotent - the joined state is taken exactly once.
async fn teardown(conn: &mut Connection, context: &ServerContext) {
    let Some(joined) = conn.joined.take() else {
        return;
    };
    context.broadcaster.unsubscribe(joined.board_id, conn.id);
    if let Some(session) = context.sessions.remove_session(conn.id) {
        context
            .broadcaster
            .publish_others(
                joined.board_id,
                conn.id,
                ServerMessage::UserLeft {
                    connection_id: conn.id,
                    display_name: session.display_name,
                },
            )
            .await;
    }
}

/// Board id if the connection holds a live membership, checked against the
/// session registry so expiry is enforced per operation
fn member_board(conn: &Connection, context: &ServerContext) -> Option<Uuid> {
    let board_id = conn.joined.as_ref()?.board_id;
    context
        .sessions
        .is_member(conn.id, board_id)
        .then_some(board_id)
}

/// Gate for mutation operations: membership plus write role, plus an
/// authenticated caller for destructive operations
fn writable_board(
    conn: &Connection,
    context: &ServerContext,
    destructive: bool,
) -> Result<Uuid, &'static str> {
    let board_id = member_board(conn, context).ok_or("Not joined to a board")?;
    let role = conn.joined.as_ref().map(|j| j.role).unwrap_or(Role::Viewer);
    if !role.can_edit() {
        return Err("Insufficient permissions");
    }
    if destructive && !conn.caller.as_ref().is_some_and(Caller::is_authenticated) {
        return Err("Sign in to delete content");
    }
    Ok(board_id)
}

/// Report an operation failure to the caller.
///
/// Domain-validation errors carry their own message; anything else (store
/// failures and the like) is logged here and surfaces only as a generic
/// failure naming the attempted action. The connection stays up either way.
async fn fail(conn: &Connection, action: &str, err: anyhow::Error) {
    if let Some(domain) = err.downcast_ref::<CoordinationError>() {
        conn.error(format!("Failed to {}: {}", action, domain)).await;
    } else {
        tracing::error!(connection = %conn.id, error = %err, "Failed to {}", action);
        conn.error(format!("Failed to {}", action)).await;
    }
}

async fn process_message(msg: ClientMessage, conn: &mut Connection, context: &ServerContext) {
    match msg {
        ClientMessage::Hello { protocol_version } => {
            if let Err(e) = check_version_compatibility(protocol_version, PROTOCOL_VERSION) {
                conn.error(e.to_string()).await;
            }
        }

        ClientMessage::JoinBoard {
            board_id,
            auth_token,
            anon_token,
        } => {
            join_board(conn, context, board_id, auth_token, anon_token).await;
        }

        ClientMessage::LeaveBoard => {
            teardown(conn, context).await;
        }

        ClientMessage::UpdateCursor { x, y } => {
            let Some(board_id) = member_board(conn, context) else {
                return conn.error("Not joined to a board").await;
            };
            context.sessions.update_cursor(conn.id, x, y);
            context
                .broadcaster
                .publish_others(
                    board_id,
                    conn.id,
                    ServerMessage::CursorUpdated {
                        connection_id: conn.id,
                        x,
                        y,
                    },
                )
                .await;
        }

        ClientMessage::UpdateSelection { element_ids } => {
            let Some(board_id) = member_board(conn, context) else {
                return conn.error("Not joined to a board").await;
            };
            context.sessions.update_selection(conn.id, element_ids.clone());
            context
                .broadcaster
                .publish_others(
                    board_id,
                    conn.id,
                    ServerMessage::SelectionUpdated {
                        connection_id: conn.id,
                        element_ids,
                    },
                )
                .await;
        }

        ClientMessage::ClearSelection => {
            let Some(board_id) = member_board(conn, context) else {
                return conn.error("Not joined to a board").await;
            };
            context.sessions.clear_selection(conn.id);
            context
                .broadcaster
                .publish_others(
                    board_id,
                    conn.id,
                    ServerMessage::SelectionCleared {
                        connection_id: conn.id,
                    },
                )
                .await;
        }

        ClientMessage::AddElement {
            element_type,
            x,
            y,
            width,
            height,
            data,
            temp_id,
        } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            let request = NewElement {
                type_tag: element_type,
                x,
                y,
                width,
                height,
                data,
            };
            match context
                .elements
                .add_element(board_id, request, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementAdded { element, temp_id })
                        .await;
                }
                Err(e) => fail(conn, "add element", e).await,
            }
        }

        ClientMessage::AddDrawingPath {
            x,
            y,
            width,
            height,
            data,
            temp_id,
        } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            let request = NewElement {
                type_tag: String::new(),
                x,
                y,
                width,
                height,
                data,
            };
            match context
                .elements
                .add_drawing_path(board_id, request, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementAdded { element, temp_id })
                        .await;
                }
                Err(e) => fail(conn, "add drawing path", e).await,
            }
        }

        ClientMessage::MoveElement { element_id, x, y } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .move_element(element_id, x, y, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementMoved { element })
                        .await;
                }
                Err(e) => fail(conn, "move element", e).await,
            }
        }

        ClientMessage::ResizeElement {
            element_id,
            x,
            y,
            width,
            height,
        } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .resize_element(element_id, x, y, width, height, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementResized { element })
                        .await;
                }
                Err(e) => fail(conn, "resize element", e).await,
            }
        }

        ClientMessage::UpdateLineEndpoints {
            element_id,
            start_x,
            start_y,
            end_x,
            end_y,
        } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .update_line_endpoints(element_id, start_x, start_y, end_x, end_y, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::LineEndpointsUpdated { element })
                        .await;
                }
                Err(e) => fail(conn, "update line endpoints", e).await,
            }
        }

        ClientMessage::UpdateElementStyle { element_id, style } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .update_style(element_id, &style, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementStyleUpdated { element })
                        .await;
                }
                Err(e) => fail(conn, "update element style", e).await,
            }
        }

        ClientMessage::UpdateElementLock { element_id, locked } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .update_lock(element_id, locked, &conn.actor())
                .await
            {
                Ok(element) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementLockUpdated { element })
                        .await;
                }
                Err(e) => fail(conn, "update element lock", e).await,
            }
        }

        ClientMessage::UpdateStickyNote { element_id, data } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .update_typed(element_id, ElementType::StickyNote, &data, &conn.actor())
                .await
            {
                Ok(Some(element)) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::StickyNoteUpdated { element })
                        .await;
                }
                // Type mismatch: silent no-op
                Ok(None) => {}
                Err(e) => fail(conn, "update sticky note", e).await,
            }
        }

        ClientMessage::UpdateTextElement { element_id, data } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .elements
                .update_typed(element_id, ElementType::Text, &data, &conn.actor())
                .await
            {
                Ok(Some(element)) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::TextElementUpdated { element })
                        .await;
                }
                Ok(None) => {}
                Err(e) => fail(conn, "update text element", e).await,
            }
        }

        ClientMessage::BringToFront { element_id } => {
            set_z_extreme(conn, context, element_id, true).await;
        }

        ClientMessage::SendToBack { element_id } => {
            set_z_extreme(conn, context, element_id, false).await;
        }

        ClientMessage::DeleteElement { element_id } => {
            let board_id = match writable_board(conn, context, true) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context.elements.delete_element(element_id).await {
                Ok(true) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::ElementDeleted { element_id })
                        .await;
                }
                Ok(false) => {
                    conn.error(format!("Element {} not found", element_id)).await;
                }
                Err(e) => fail(conn, "delete element", e).await,
            }
        }

        ClientMessage::CreateGroup { element_ids } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context
                .groups
                .create_group(board_id, &element_ids, &conn.actor())
                .await
            {
                Ok((group_id, elements)) => {
                    context
                        .broadcaster
                        .publish_all(board_id, ServerMessage::GroupCreated { group_id, elements })
                        .await;
                }
                Err(e) => fail(conn, "create group", e).await,
            }
        }

        ClientMessage::UngroupElements { group_id } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context.groups.ungroup(group_id, &conn.actor()).await {
                Ok(Some(element_ids)) => {
                    context
                        .broadcaster
                        .publish_all(
                            board_id,
                            ServerMessage::GroupUngrouped {
                                group_id,
                                element_ids,
                            },
                        )
                        .await;
                }
                Ok(None) => {
                    conn.error(format!("Group {} has no members", group_id)).await;
                }
                Err(e) => fail(conn, "ungroup elements", e).await,
            }
        }

        ClientMessage::MoveGroup { group_id, dx, dy } => {
            let board_id = match writable_board(conn, context, false) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context.groups.move_group(group_id, dx, dy, &conn.actor()).await {
                Ok(Some(elements)) => {
                    context
                        .broadcaster
                        .publish_all(
                            board_id,
                            ServerMessage::GroupMoved {
                                group_id,
                                dx,
                                dy,
                                elements,
                            },
                        )
                        .await;
                }
                Ok(None) => {
                    conn.error(format!("Group {} has no members", group_id)).await;
                }
                Err(e) => fail(conn, "move group", e).await,
            }
        }

        ClientMessage::DeleteGroup { group_id } => {
            let board_id = match writable_board(conn, context, true) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            match context.groups.delete_group(group_id).await {
                Ok(Some(element_ids)) => {
                    context
                        .broadcaster
                        .publish_all(
                            board_id,
                            ServerMessage::GroupDeleted {
                                group_id,
                                element_ids,
                            },
                        )
                        .await;
                }
                Ok(None) => {
                    conn.error(format!("Group {} has no members", group_id)).await;
                }
                Err(e) => fail(conn, "delete group", e).await,
            }
        }

        ClientMessage::BringGroupToFront { group_id } => {
            set_group_z_extreme(conn, context, group_id, true).await;
        }

        ClientMessage::SendGroupToBack { group_id } => {
            set_group_z_extreme(conn, context, group_id, false).await;
        }

        ClientMessage::ClearBoard => {
            let board_id = match writable_board(conn, context, true) {
                Ok(b) => b,
                Err(m) => return conn.error(m).await,
            };
            context
                .broadcaster
                .publish_all(board_id, ServerMessage::BoardCleared { board_id })
                .await;
        }
    }
}

async fn set_z_extreme(
    conn: &Connection,
    context: &ServerContext,
    element_id: Uuid,
    to_front: bool,
) {
    let board_id = match writable_board(conn, context, false) {
        Ok(b) => b,
        Err(m) => return conn.error(m).await,
    };
    match context
        .elements
        .set_z_extreme(element_id, to_front, &conn.actor())
        .await
    {
        Ok(element) => {
            context
                .broadcaster
                .publish_all(board_id, ServerMessage::ElementZIndexUpdated { element })
                .await;
        }
        Err(e) => fail(conn, "update element z-index", e).await,
    }
}

async fn set_group_z_extreme(
    conn: &Connection,
    context: &ServerContext,
    group_id: Uuid,
    to_front: bool,
) {
    let board_id = match writable_board(conn, context, false) {
        Ok(b) => b,
        Err(m) => return conn.error(m).await,
    };
    let result = if to_front {
        context.groups.bring_group_to_front(group_id, &conn.actor()).await
    } else {
        context.groups.send_group_to_back(group_id, &conn.actor()).await
    };
    match result {
        Ok(Some(elements)) => {
            context
                .broadcaster
                .publish_all(
                    board_id,
                    ServerMessage::GroupZIndexChanged { group_id, elements },
                )
                .await;
        }
        Ok(None) => {
            conn.error(format!("Group {} has no members", group_id)).await;
        }
        Err(e) => fail(conn, "update group z-index", e).await,
    }
}

async fn join_board(
    conn: &mut Connection,
    context: &ServerContext,
    board_id: Uuid,
    auth_token: Option<String>,
    anon_token: Option<String>,
) {
    // Rejoining implies leaving the previous board first
    teardown(conn, context).await;

    let board = match context.board_store.board(board_id).await {
        Ok(Some(board)) => board,
        Ok(None) => return conn.error("Board not found").await,
        Err(e) => return fail(conn, "join board", e).await,
    };

    let caller = match context
        .identity
        .resolve(auth_token.as_deref(), anon_token.as_deref())
        .await
    {
        Ok(caller) => caller,
        Err(e) => return fail(conn, "join board", e).await,
    };

    let Some(role) = authorize(&caller, &board, Role::Viewer).allowed_role() else {
        return conn.error("Access denied").await;
    };

    let display_name = caller.display_name(conn.id);
    // Snapshot the other participants before registering ourselves
    let others: Vec<Participant> = context
        .sessions
        .board_sessions(board_id)
        .iter()
        .map(Participant::from)
        .collect();

    let session = context
        .sessions
        .create_session(conn.id, board_id, display_name);
    conn.caller = Some(caller);
    conn.joined = Some(JoinedBoard { board_id, role });
    context
        .broadcaster
        .subscribe(board_id, conn.id, conn.outbox.clone());

    tracing::info!(connection = %conn.id, board = %board_id, "Joined board");

    context
        .broadcaster
        .publish_others(
            board_id,
            conn.id,
            ServerMessage::UserJoined {
                user: (&session).into(),
            },
        )
        .await;

    let elements = match context.element_store.board_elements(board_id).await {
        Ok(elements) => elements,
        Err(e) => return fail(conn, "load board state", e).await,
    };

    let everyone: Vec<Participant> = context
        .sessions
        .board_sessions(board_id)
        .iter()
        .map(Participant::from)
        .collect();

    conn.reply(ServerMessage::BoardPermissions {
        role,
        can_edit: role.can_edit(),
    })
    .await;
    conn.reply(ServerMessage::ActiveUsersUpdated { users: everyone }).await;
    conn.reply(ServerMessage::CurrentStateUpdate {
        elements,
        users: others,
    })
    .await;
}

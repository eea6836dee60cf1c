//! # Link: what a payload run is handed.
//!
//! Either a bare connection or a connection with a completed handshake.

use crate::transport::{ConnectionHandle, Signal};

/// A connection whose application-level handshake completed.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    conn: ConnectionHandle,
    joined: Signal,
}

impl SessionHandle {
    /// Pairs a connection with its "joined" signal.
    pub fn new(conn: ConnectionHandle, joined: Signal) -> Self {
        Self { conn, joined }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &ConnectionHandle {
        &self.conn
    }

    /// The "joined" signal.
    pub fn joined(&self) -> &Signal {
        &self.joined
    }

    /// True once the handshake completed.
    pub fn is_joined(&self) -> bool {
        self.joined.is_set()
    }

    /// Drops the session layer.
    pub fn into_connection(self) -> ConnectionHandle {
        self.conn
    }
}

/// What a payload runs over.
///
/// `Session` when the service was built with a negotiator, `Connection`
/// otherwise.
#[derive(Clone, Debug)]
pub enum Link {
    /// A bare transport connection.
    Connection(ConnectionHandle),
    /// A connection with a completed handshake.
    Session(SessionHandle),
}

impl Link {
    /// The transport connection in either case.
    pub fn connection(&self) -> &ConnectionHandle {
        match self {
            Link::Connection(conn) => conn,
            Link::Session(session) => session.connection(),
        }
    }

    /// The session, if the link has one.
    pub fn session(&self) -> Option<&SessionHandle> {
        match self {
            Link::Connection(_) => None,
            Link::Session(session) => Some(session),
        }
    }

    /// Remote endpoint (`host:port`).
    pub fn peer(&self) -> &str {
        self.connection().peer()
    }
}

impl From<ConnectionHandle> for Link {
    fn from(conn: ConnectionHandle) -> Self {
        Link::Connection(conn)
    }
}

impl From<SessionHandle> for Link {
    fn from(session: SessionHandle) -> Self {
        Link::Session(session)
    }
}

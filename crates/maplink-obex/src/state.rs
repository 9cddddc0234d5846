//! OBEX session state.

use bytes::Bytes;

/// State of a server-side OBEX session.
///
/// A session starts `Disconnected`. Only CONNECT is accepted in that state;
/// everything else is refused until a CONNECT succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No CONNECT has succeeded yet, or the peer disconnected.
    #[default]
    Disconnected,

    /// A CONNECT was accepted.
    Connected(ConnectedState),
}

impl SessionState {
    /// Returns `true` once a CONNECT has been accepted.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// The connection id assigned at CONNECT.
    #[must_use]
    pub const fn connection_id(&self) -> Option<u32> {
        match self {
            Self::Connected(state) => Some(state.connection_id),
            Self::Disconnected => None,
        }
    }

    /// Feature bits the peer announced at CONNECT.
    #[must_use]
    pub const fn peer_features(&self) -> u32 {
        match self {
            Self::Connected(state) => state.peer_features,
            Self::Disconnected => 0,
        }
    }
}

/// Information kept for a connected session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedState {
    /// Connection id sent in the CONNECT response.
    pub connection_id: u32,
    /// WHO the peer sent as its own identity, echoed back as TARGET.
    pub peer_who: Option<Bytes>,
    /// `MapSupportedFeatures` from the peer, 0 when absent.
    pub peer_features: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_default() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
        assert!(!SessionState::default().is_connected());
        assert_eq!(SessionState::default().connection_id(), None);
    }

    #[test]
    fn test_connected_accessors() {
        let state = SessionState::Connected(ConnectedState {
            connection_id: 3,
            peer_who: None,
            peer_features: 0x200,
        });
        assert!(state.is_connected());
        assert_eq!(state.connection_id(), Some(3));
        assert_eq!(state.peer_features(), 0x200);
    }
}

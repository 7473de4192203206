//! Per-connection admission: gated upgrade, then the session.
//!
//! Each accepted socket gets its own Tokio task running [`admit`]. The
//! flow is:
//!   1. Upgrade handshake, with the admission gate deciding before `101`
//!   2. Rejected → HTTP error response, `warn` log, nothing else happens
//!   3. Admitted → run a [`ConnectionSession`] until it ends

use std::io;
use std::sync::Arc;

use tether_presence::PresenceHandle;
use tether_protocol::AdmissionParams;
use tether_session::{Authenticator, ConnectionSession, bearer_token};
use tether_transport::{PendingConnection, Rejection, TransportError};
use tokio_util::sync::CancellationToken;

use crate::TetherError;
use crate::server::ServerState;

/// Decides whether an upgrade request may become a session.
///
/// - `400` if `uid` or `ts` is missing or malformed
/// - `401` if the bearer credential is absent, invalid, or asserts a
///   different `uid`/`ts` than the query
pub(crate) fn admission<A: Authenticator>(
    query: Option<&str>,
    authorization: Option<&str>,
    auth: &A,
) -> Result<AdmissionParams, Rejection> {
    let params =
        AdmissionParams::from_query(query).map_err(|e| reject(400, &e))?;
    let token = bearer_token(authorization).map_err(|e| reject(401, &e))?;
    let claims = auth.verify(token).map_err(|e| reject(401, &e))?;

    if claims.uid != params.uid.as_str() || claims.ts != params.ts {
        return Err(reject(401, &"credential does not match uid/ts"));
    }
    Ok(params)
}

fn reject(status: u16, reason: &dyn std::fmt::Display) -> Rejection {
    Rejection {
        status,
        reason: reason.to_string(),
    }
}

/// Handles a single accepted socket from upgrade to session end.
pub(crate) async fn admit<A: Authenticator>(
    pending: PendingConnection,
    state: Arc<ServerState<A>>,
    presence: PresenceHandle,
    shutdown: CancellationToken,
) -> Result<(), TetherError> {
    let remote = pending.remote_addr();
    let auth = &state.auth;

    let upgrade = pending.upgrade(|req| {
        admission(req.query(), req.header("authorization"), auth)
    });
    let (conn, params) =
        match tokio::time::timeout(state.config.handshake_timeout, upgrade).await {
            Ok(Ok(admitted)) => admitted,
            Ok(Err(TransportError::Rejected { status, reason })) => {
                tracing::warn!(%remote, status, %reason, "admission rejected");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(TransportError::HandshakeFailed(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "upgrade did not complete in time",
                ))
                .into());
            }
        };

    tracing::info!(peer = %params.uid, %remote, "peer admitted");
    ConnectionSession::new(params.uid, conn, &state.config)
        .with_shutdown(shutdown)
        .run(presence)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tether_protocol::Claims;
    use tether_session::{CredentialIssuer, SharedSecretAuth};

    use super::*;

    fn auth() -> SharedSecretAuth {
        SharedSecretAuth::new(b"changeme")
    }

    fn bearer(uid: &str, ts: i64) -> String {
        let token = auth().mint(&Claims::new(uid, ts)).unwrap();
        format!("Bearer {token}")
    }

    #[test]
    fn test_matching_credential_is_admitted() {
        let header = bearer("42", 100);
        let params =
            admission(Some("uid=42&ts=100"), Some(&header), &auth()).unwrap();
        assert_eq!(params, AdmissionParams::new("42", 100));
    }

    #[test]
    fn test_missing_ts_is_bad_request() {
        let header = bearer("42", 100);
        let rejection =
            admission(Some("uid=42"), Some(&header), &auth()).unwrap_err();
        assert_eq!(rejection.status, 400);
        assert!(rejection.reason.contains("ts"));
    }

    #[test]
    fn test_malformed_ts_is_bad_request() {
        let header = bearer("42", 100);
        let rejection =
            admission(Some("uid=42&ts=soon"), Some(&header), &auth()).unwrap_err();
        assert_eq!(rejection.status, 400);
    }

    #[test]
    fn test_missing_credential_is_unauthorized() {
        let rejection =
            admission(Some("uid=42&ts=100"), None, &auth()).unwrap_err();
        assert_eq!(rejection.status, 401);
    }

    #[test]
    fn test_forged_credential_is_unauthorized() {
        let forged = SharedSecretAuth::new(b"other")
            .mint(&Claims::new("42", 100))
            .unwrap();
        let header = format!("Bearer {forged}");
        let rejection =
            admission(Some("uid=42&ts=100"), Some(&header), &auth()).unwrap_err();
        assert_eq!(rejection.status, 401);
    }

    #[test]
    fn test_credential_for_other_peer_is_unauthorized() {
        let header = bearer("7", 100);
        let rejection =
            admission(Some("uid=42&ts=100"), Some(&header), &auth()).unwrap_err();
        assert_eq!(rejection.status, 401);

        let header = bearer("42", 99);
        let rejection =
            admission(Some("uid=42&ts=100"), Some(&header), &auth()).unwrap_err();
        assert_eq!(rejection.status, 401);
    }

    #[test]
    fn test_parameters_are_checked_before_credentials() {
        let rejection = admission(None, None, &auth()).unwrap_err();
        assert_eq!(rejection.status, 400);
    }
}

//! A2S_PLAYERS / A2S_RULES challenge handshake orchestration.
//!
//! Both query kinds may require a two-phase challenge exchange (spec.md §3
//! "A2S challenge handshake"): the first request carries the placeholder
//! challenge `0xFFFFFFFF`; a server that requires one replies with a
//! challenge value instead of data, and the client resubmits the same
//! request with that value echoed back. The resubmission happens here,
//! transparently — the caller's future resolves exactly once, with the
//! final typed response.

use std::net::SocketAddr;

use gq_wire::a2s::{
    A2sPlayersRequest, A2sPlayersResult, A2sRulesRequest, A2sRulesResult, CHALLENGE_PLACEHOLDER,
    PlayerEntry, RuleEntry,
};

use crate::error::Error;
use crate::messenger::{Messenger, OutboundRequest, RequestPayload, ResponseMessage};
use crate::session::Priority;

/// Queries `A2S_PLAYERS`, resubmitting with the server's challenge if one
/// is required. Each round trip goes through the Messenger like any other
/// request; only the caller's final future is observed by the caller.
pub async fn query_players(
    messenger: &Messenger,
    destination: SocketAddr,
    priority: Priority,
) -> Result<Vec<PlayerEntry>, Error> {
    let mut challenge = CHALLENGE_PLACEHOLDER;
    loop {
        let (_request_id, rx) = messenger.submit(OutboundRequest {
            payload: RequestPayload::A2sPlayers(A2sPlayersRequest { challenge }),
            destination,
            priority,
        });
        let response = rx
            .await
            .map_err(|_| Error::Transport("messenger dropped the completion channel".to_owned()))??;
        match response {
            ResponseMessage::A2sPlayers(A2sPlayersResult::Players(players)) => return Ok(players),
            ResponseMessage::A2sPlayers(A2sPlayersResult::Challenge(next)) => {
                challenge = next;
            }
            _ => {
                return Err(Error::MalformedPayload(
                    "unexpected response type for a2s_players query".to_owned(),
                ));
            }
        }
    }
}

/// Queries `A2S_RULES`, with the same challenge handling as
/// [`query_players`].
pub async fn query_rules(
    messenger: &Messenger,
    destination: SocketAddr,
    priority: Priority,
) -> Result<Vec<RuleEntry>, Error> {
    let mut challenge = CHALLENGE_PLACEHOLDER;
    loop {
        let (_request_id, rx) = messenger.submit(OutboundRequest {
            payload: RequestPayload::A2sRules(A2sRulesRequest { challenge }),
            destination,
            priority,
        });
        let response = rx
            .await
            .map_err(|_| Error::Transport("messenger dropped the completion channel".to_owned()))??;
        match response {
            ResponseMessage::A2sRules(A2sRulesResult::Rules(rules)) => return Ok(rules),
            ResponseMessage::A2sRules(A2sRulesResult::Challenge(next)) => {
                challenge = next;
            }
            _ => {
                return Err(Error::MalformedPayload(
                    "unexpected response type for a2s_rules query".to_owned(),
                ));
            }
        }
    }
}

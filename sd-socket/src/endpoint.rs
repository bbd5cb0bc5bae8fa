//! Room endpoint construction.

use url::Url;

use sd_core::config::AppConfig;
use sd_core::constants::ROOM_TOKEN_PARAM;
use sd_core::error::{SdError, SdResult};

/// Build the room-scoped WebSocket URL.
///
/// The scheme follows the server's transport security (`https` becomes
/// `wss`, anything else `ws`). The credential is attached as the `token`
/// query parameter, which is the only place it is ever transmitted.
pub fn room_endpoint(
    server_address: &str,
    endpoint_path: &str,
    room_id: &str,
    credential: &str,
) -> SdResult<Url> {
    let address = AppConfig::sanitize_server_address(server_address);
    if address.is_empty() {
        return Err(SdError::MissingConfig("server address".into()));
    }
    if room_id.is_empty() {
        return Err(SdError::Config("room id must not be empty".into()));
    }

    let mut url = Url::parse(&address)?;
    let ws_scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(ws_scheme)
        .map_err(|_| SdError::Config(format!("cannot derive websocket url from {address}")))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| SdError::Config(format!("{address} cannot be a base url")))?;
        segments.pop_if_empty();
        segments.extend(endpoint_path.split('/').filter(|s| !s.is_empty()));
        segments.push(room_id);
    }

    url.query_pairs_mut()
        .clear()
        .append_pair(ROOM_TOKEN_PARAM, credential);

    Ok(url)
}

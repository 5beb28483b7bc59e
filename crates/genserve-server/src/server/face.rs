//! Transport faces.
//!
//! A [`Face`] is where response segments are published. The server ships a
//! minimal UDP face:
//!
//! - request datagram: the UTF-8 name URI, optionally followed by
//!   `?child=leftmost` or `?child=rightmost`;
//! - response datagram: `<segment-name-uri> <final-index>\n<payload>`.
//!
//! Sends never wait: a full socket buffer surfaces as a transport error.

use crate::server::service::content::ContentService;
use bytes::{BufMut, Bytes, BytesMut};
use genserve_core::{ChildSelector, Error, Interest, Name, Result, Segment};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Largest datagram the ingress loop accepts.
const MAX_REQUEST_DATAGRAM: usize = 8_192;

/// The transport publish primitive, called once per response segment.
pub trait Face: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the segment could not be handed to the
    /// transport.
    fn put(&self, segment: &Segment) -> Result<()>;
}

/// Replies to one UDP peer over a shared socket.
pub struct UdpFace {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpFace {
    pub const fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl Face for UdpFace {
    fn put(&self, segment: &Segment) -> Result<()> {
        let datagram = encode_segment(segment);
        self.socket
            .try_send_to(&datagram, self.peer)
            .map(|_| ())
            .map_err(|e| Error::Transport {
                context: format!("send {} to {}: {e}", segment.name, self.peer),
            })
    }
}

/// Parses a request datagram.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] for non-UTF-8 input, a bad name URI, or an
/// unknown child selector.
pub fn decode_interest(datagram: &[u8]) -> Result<Interest> {
    let text = core::str::from_utf8(datagram)
        .map_err(|e| Error::InvalidName {
            reason: format!("request is not UTF-8: {e}"),
        })?
        .trim();

    let (uri, query) = match text.split_once('?') {
        Some((uri, query)) => (uri, Some(query)),
        None => (text, None),
    };

    let interest = Interest::new(Name::from_uri(uri)?);
    match query {
        None => Ok(interest),
        Some("child=leftmost") => Ok(interest.with_child_selector(ChildSelector::Leftmost)),
        Some("child=rightmost") => Ok(interest.with_child_selector(ChildSelector::Rightmost)),
        Some(other) => Err(Error::InvalidName {
            reason: format!("unknown query '{other}'"),
        }),
    }
}

/// Renders a [`Segment`] as a response datagram.
pub fn encode_segment(segment: &Segment) -> Bytes {
    let header = format!("{} {}\n", segment.name, segment.final_index);
    let mut buf = BytesMut::with_capacity(header.len() + segment.payload.len());
    buf.put_slice(header.as_bytes());
    buf.put_slice(&segment.payload);
    buf.freeze()
}

/// Receives request datagrams and hands them to `service` until `token` is
/// cancelled.
///
/// Undecodable datagrams are dropped. Submission follows the service's
/// [`SubmitPolicy`](crate::server::pool::manager::SubmitPolicy).
pub async fn run_udp_ingress<M>(
    socket: Arc<UdpSocket>,
    service: ContentService<M>,
    token: CancellationToken,
) -> Result<()>
where
    M: Send + Sync + 'static,
{
    let mut buf = vec![0_u8; MAX_REQUEST_DATAGRAM];

    loop {
        let (len, peer) = tokio::select! {
            () = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => received.map_err(|e| Error::Transport {
                context: format!("receive failed: {e}"),
            })?,
        };

        let interest = match decode_interest(&buf[..len]) {
            Ok(interest) => interest,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Dropping datagram from {peer}: {_e}");
                continue;
            }
        };

        let face = Arc::new(UdpFace::new(Arc::clone(&socket), peer));
        if let Err(_e) = service.on_interest(interest, face).await {
            #[cfg(feature = "tracing")]
            tracing::debug!("Request from {peer} not dispatched: {_e}");
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!("UDP ingress stopped");
    Ok(())
}

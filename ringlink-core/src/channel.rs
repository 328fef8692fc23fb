// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Two-way message channel over one shared memory mapping.
//!
//! Layout of the mapping: `[SharedHeader][server ring][client ring]`. The
//! server writes the server ring and reads the client ring; the client does
//! the opposite. Roles are negotiated through the flags in the header.

use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::ChannelConfig;
use crate::error::{HandshakeError, IpcError, IpcResult};
use crate::shm::{
    HeaderSnapshot, Message, RingBuffer, SendStatus, SharedHeader, SharedMemoryRegion,
};
use crate::state::{ChannelState, ChannelStateMachine};
use crate::types::{ChannelName, MessageType, Role, RoleRequest};

/// A mapped region plus the role this process holds in it.
///
/// Releases the role when dropped, and unlinks the name if the peer is gone
/// too, so the next pair of openers starts from a fresh object.
///
/// The release and the unlink are not atomic. An opener that maps the name
/// in between claims a role on an object that is then unlinked, and a later
/// peer creates a new object it never meets. Its rings are still reset on
/// entry because no peer is active, so the orphan only loses connectivity.
/// Like the role-claim race this is left to the caller: reopen when the peer
/// never shows up.
struct Session {
    region: SharedMemoryRegion,
    role: Role,
}

impl Session {
    fn header(&self) -> &SharedHeader {
        header_of(&self.region)
    }

    fn have_connection(&self) -> bool {
        self.header().is_active(self.role.peer())
    }

    /// Build the `(writer, reader)` rings for this side.
    fn bind_rings(&self, config: &ChannelConfig) -> (RingBuffer, RingBuffer) {
        let header = self.header();
        let base = self.region.as_ptr();
        let options = config.ring_options();
        let server_offset = SharedHeader::SIZE;
        let client_offset = server_offset + config.server_capacity.bytes() as usize;

        // SAFETY: the region was opened with exactly `config.region_size()`
        // bytes, so both ring ranges lie inside it. The rings are stored next
        // to the Arc<Session> that keeps the mapping alive, and this side is
        // the only writer of its own ring and the only reader of the peer's.
        let (server, client) = unsafe {
            let server = RingBuffer::from_raw_parts(
                NonNull::new_unchecked(base.add(server_offset)),
                NonNull::from(header.ring(Role::Server)),
                config.server_capacity,
                options,
            );
            let client = RingBuffer::from_raw_parts(
                NonNull::new_unchecked(base.add(client_offset)),
                NonNull::from(header.ring(Role::Client)),
                config.client_capacity,
                options,
            );
            (server, client)
        };

        match self.role {
            Role::Server => (server, client),
            Role::Client => (client, server),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.header().release(self.role);
        let peer_active = self.have_connection();
        // An opener can still map the name before the unlink below runs.
        if !peer_active {
            self.region.set_unlink_on_drop(true);
        }
        tracing::debug!(
            channel = %self.region.name(),
            role = %self.role,
            peer_active,
            "Released channel role"
        );
    }
}

/// Reinterpret the start of a mapping as the shared header.
fn header_of(region: &SharedMemoryRegion) -> &SharedHeader {
    // SAFETY: every region is at least MIN_SIZE (64) bytes, which covers the
    // 28 byte header, and mmap returns page-aligned memory. All fields are
    // atomics, so shared access from both processes is sound.
    unsafe { &*(region.as_ptr() as *const SharedHeader) }
}

/// Pick a role from the current flags, or explain why none is available.
fn resolve_role(
    channel: &ChannelName,
    request: RoleRequest,
    server_active: bool,
    client_active: bool,
) -> Result<Role, HandshakeError> {
    let taken = |role| HandshakeError::RoleTaken {
        channel: channel.to_string(),
        role,
    };

    match request {
        RoleRequest::Server if server_active => Err(taken(Role::Server)),
        RoleRequest::Server => Ok(Role::Server),
        RoleRequest::Client | RoleRequest::ClientRequireServer if client_active => {
            Err(taken(Role::Client))
        }
        RoleRequest::ClientRequireServer if !server_active => Err(HandshakeError::PeerAbsent {
            channel: channel.to_string(),
        }),
        RoleRequest::Client | RoleRequest::ClientRequireServer => Ok(Role::Client),
        RoleRequest::ClientOrServer => match (server_active, client_active) {
            (false, _) => Ok(Role::Server),
            (true, false) => Ok(Role::Client),
            (true, true) => Err(HandshakeError::BothRolesTaken {
                channel: channel.to_string(),
            }),
        },
    }
}

/// Rings bound to a claimed role.
struct Binding {
    writer: RingBuffer,
    reader: RingBuffer,
    // Declared last: the rings point into this mapping.
    session: Arc<Session>,
}

/// One end of a shared memory channel.
///
/// All operations are non-blocking. Sending and receiving need `&mut self`;
/// to drive each direction from its own thread use [`IpcChannel::into_split`].
pub struct IpcChannel {
    config: ChannelConfig,
    machine: ChannelStateMachine,
    binding: Option<Binding>,
}

impl IpcChannel {
    /// Create an unopened channel.
    pub fn new(config: ChannelConfig) -> Self {
        let machine = ChannelStateMachine::new(config.name.clone());
        Self {
            config,
            machine,
            binding: None,
        }
    }

    /// Create a channel and open it in one step.
    pub fn connect(config: ChannelConfig, request: RoleRequest) -> IpcResult<Self> {
        let mut channel = Self::new(config);
        channel.open(request)?;
        Ok(channel)
    }

    /// Read the header of an existing mapping without claiming a role.
    pub fn probe(config: &ChannelConfig) -> IpcResult<HeaderSnapshot> {
        let region = SharedMemoryRegion::open(&config.name, config.region_size())?;
        Ok(header_of(&region).snapshot())
    }

    /// Map the region and negotiate a role.
    ///
    /// Any failure leaves the channel `Closed`; build a new one to retry.
    pub fn open(&mut self, request: RoleRequest) -> IpcResult<()> {
        self.machine.transition_to(ChannelState::NegotiatingRole)?;

        match self.negotiate(request) {
            Ok(binding) => {
                tracing::info!(
                    channel = %self.config.name,
                    role = %binding.session.role,
                    peer_active = binding.session.have_connection(),
                    "Channel bound"
                );
                self.binding = Some(binding);
                self.machine.transition_to(ChannelState::Bound)?;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    channel = %self.config.name,
                    request = %request,
                    error = %e,
                    "Role negotiation failed"
                );
                self.machine.transition_to(ChannelState::Closed)?;
                Err(e)
            }
        }
    }

    fn negotiate(&self, request: RoleRequest) -> IpcResult<Binding> {
        let mut region =
            SharedMemoryRegion::open_or_create(&self.config.name, self.config.region_size())?;

        let header = header_of(&region);
        let server_active = header.is_active(Role::Server);
        let client_active = header.is_active(Role::Client);

        let outcome = resolve_role(&self.config.name, request, server_active, client_active)
            .and_then(|role| {
                self.prepare_rings(header, role)?;
                Ok(role)
            });

        let role = match outcome {
            Ok(role) => role,
            Err(e) => {
                // Nobody else holds the object; don't leave it behind.
                if !server_active && !client_active {
                    region.set_unlink_on_drop(true);
                }
                return Err(e.into());
            }
        };

        header.claim(role);

        let session = Arc::new(Session { region, role });
        let (writer, reader) = session.bind_rings(&self.config);
        Ok(Binding {
            writer,
            reader,
            session,
        })
    }

    /// Check the peer's ring sizes, or reset the rings if we are alone.
    fn prepare_rings(&self, header: &SharedHeader, role: Role) -> Result<(), HandshakeError> {
        let local_server = self.config.server_capacity.bytes();
        let local_client = self.config.client_capacity.bytes();

        if !header.is_active(role.peer()) {
            header.reset_rings(local_server, local_client);
            return Ok(());
        }

        let peer_server = header.ring(Role::Server).capacity.load(Ordering::Acquire);
        let peer_client = header.ring(Role::Client).capacity.load(Ordering::Acquire);
        if peer_server != local_server || peer_client != local_client {
            return Err(HandshakeError::SizeMismatch {
                channel: self.config.name.to_string(),
                peer_server,
                peer_client,
                local_server,
                local_client,
            });
        }
        Ok(())
    }

    /// Release the role. Safe to call more than once.
    pub fn close(&mut self) -> IpcResult<()> {
        if self.machine.state() == ChannelState::Closed {
            return Ok(());
        }
        tracing::debug!(
            channel = %self.config.name,
            state = %self.machine.state(),
            elapsed = ?self.machine.time_in_current_state(),
            "Closing channel"
        );
        self.binding = None;
        self.machine.transition_to(ChannelState::Closed)?;
        Ok(())
    }

    fn bound(&mut self) -> IpcResult<&mut Binding> {
        match self.binding.as_mut() {
            Some(binding) => Ok(binding),
            None => Err(IpcError::NoConnection {
                state: self.machine.state().name(),
            }),
        }
    }

    fn bound_ref(&self) -> IpcResult<&Binding> {
        self.binding.as_ref().ok_or(IpcError::NoConnection {
            state: self.machine.state().name(),
        })
    }

    /// Send one message. See [`RingBuffer::send_data`].
    pub fn send_data(
        &mut self,
        kind: MessageType,
        payload: &[u8],
        allow_buffering: bool,
    ) -> IpcResult<SendStatus> {
        Ok(self.bound()?.writer.send_data(kind, payload, allow_buffering)?)
    }

    /// Receive the next message, if any. See [`RingBuffer::receive_data`].
    pub fn receive_data(&mut self) -> IpcResult<Option<Message<'_>>> {
        Ok(self.bound()?.reader.receive_data()?)
    }

    /// Release the message returned by the last receive.
    pub fn receive_acknowledge(&mut self) -> IpcResult<()> {
        Ok(self.bound()?.reader.receive_acknowledge()?)
    }

    /// Push at most one queued frame. Returns whether sends remain queued.
    pub fn pump_pending_sends(&mut self) -> IpcResult<bool> {
        Ok(self.bound()?.writer.pump_pending_sends())
    }

    /// Whether a payload of this size could be written right now.
    pub fn can_send(&self, payload_len: usize) -> IpcResult<()> {
        Ok(self.bound_ref()?.writer.can_send(payload_len)?)
    }

    /// Whether queued sends are waiting to be pumped.
    pub fn has_sends_pending(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.writer.has_sends_pending())
    }

    /// Whether the peer has consumed everything written so far.
    pub fn is_send_buffer_empty(&self) -> bool {
        self.binding
            .as_ref()
            .map_or(true, |b| b.writer.is_send_buffer_empty())
    }

    /// Whether the peer currently holds its role.
    pub fn have_connection(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.session.have_connection())
    }

    /// Role held while bound.
    pub fn role(&self) -> Option<Role> {
        self.binding.as_ref().map(|b| b.session.role)
    }

    pub fn is_server(&self) -> bool {
        self.role() == Some(Role::Server)
    }

    pub fn state(&self) -> ChannelState {
        self.machine.state()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Live copy of the shared header while bound.
    pub fn snapshot(&self) -> Option<HeaderSnapshot> {
        self.binding.as_ref().map(|b| b.session.header().snapshot())
    }

    /// Split a bound channel into independently owned halves.
    ///
    /// The role stays claimed until both halves are dropped.
    pub fn into_split(mut self) -> IpcResult<(ChannelSender, ChannelReceiver)> {
        let binding = match self.binding.take() {
            Some(binding) => binding,
            None => {
                return Err(IpcError::NoConnection {
                    state: self.machine.state().name(),
                })
            }
        };

        let Binding {
            writer,
            reader,
            session,
        } = binding;

        Ok((
            ChannelSender {
                ring: writer,
                session: Arc::clone(&session),
            },
            ChannelReceiver {
                ring: reader,
                session,
            },
        ))
    }
}

impl std::fmt::Debug for IpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcChannel")
            .field("name", &self.config.name)
            .field("state", &self.machine.state())
            .field("role", &self.role())
            .finish()
    }
}

/// Sending half of a split channel.
pub struct ChannelSender {
    ring: RingBuffer,
    session: Arc<Session>,
}

impl ChannelSender {
    pub fn send_data(
        &mut self,
        kind: MessageType,
        payload: &[u8],
        allow_buffering: bool,
    ) -> IpcResult<SendStatus> {
        Ok(self.ring.send_data(kind, payload, allow_buffering)?)
    }

    pub fn pump_pending_sends(&mut self) -> bool {
        self.ring.pump_pending_sends()
    }

    pub fn can_send(&self, payload_len: usize) -> IpcResult<()> {
        Ok(self.ring.can_send(payload_len)?)
    }

    pub fn has_sends_pending(&self) -> bool {
        self.ring.has_sends_pending()
    }

    pub fn is_send_buffer_empty(&self) -> bool {
        self.ring.is_send_buffer_empty()
    }

    pub fn have_connection(&self) -> bool {
        self.session.have_connection()
    }

    pub fn role(&self) -> Role {
        self.session.role
    }
}

/// Receiving half of a split channel.
pub struct ChannelReceiver {
    ring: RingBuffer,
    session: Arc<Session>,
}

impl ChannelReceiver {
    pub fn receive_data(&mut self) -> IpcResult<Option<Message<'_>>> {
        Ok(self.ring.receive_data()?)
    }

    pub fn receive_acknowledge(&mut self) -> IpcResult<()> {
        Ok(self.ring.receive_acknowledge()?)
    }

    pub fn have_connection(&self) -> bool {
        self.session.have_connection()
    }

    pub fn role(&self) -> Role {
        self.session.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RingError;

    fn name() -> ChannelName {
        ChannelName::new("resolve-test").unwrap()
    }

    #[test]
    fn test_resolve_server_and_client() {
        assert_eq!(
            resolve_role(&name(), RoleRequest::Server, false, false).unwrap(),
            Role::Server
        );
        assert!(matches!(
            resolve_role(&name(), RoleRequest::Server, true, false),
            Err(HandshakeError::RoleTaken {
                role: Role::Server,
                ..
            })
        ));
        assert_eq!(
            resolve_role(&name(), RoleRequest::Client, false, false).unwrap(),
            Role::Client
        );
        assert!(matches!(
            resolve_role(&name(), RoleRequest::Client, true, true),
            Err(HandshakeError::RoleTaken {
                role: Role::Client,
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_client_require_server() {
        assert!(matches!(
            resolve_role(&name(), RoleRequest::ClientRequireServer, false, false),
            Err(HandshakeError::PeerAbsent { .. })
        ));
        assert_eq!(
            resolve_role(&name(), RoleRequest::ClientRequireServer, true, false).unwrap(),
            Role::Client
        );
        assert!(matches!(
            resolve_role(&name(), RoleRequest::ClientRequireServer, true, true),
            Err(HandshakeError::RoleTaken { .. })
        ));
    }

    #[test]
    fn test_resolve_client_or_server_prefers_server() {
        let any = RoleRequest::ClientOrServer;
        assert_eq!(resolve_role(&name(), any, false, false).unwrap(), Role::Server);
        assert_eq!(resolve_role(&name(), any, false, true).unwrap(), Role::Server);
        assert_eq!(resolve_role(&name(), any, true, false).unwrap(), Role::Client);
        assert!(matches!(
            resolve_role(&name(), any, true, true),
            Err(HandshakeError::BothRolesTaken { .. })
        ));
    }

    #[test]
    fn test_operations_require_bound_channel() {
        let mut channel = IpcChannel::new(ChannelConfig::new(name()));
        assert_eq!(channel.state(), ChannelState::Unopened);
        assert!(matches!(
            channel.send_data(MessageType::APP, b"x", false),
            Err(IpcError::NoConnection { state: "Unopened" })
        ));
        assert!(matches!(
            channel.receive_data(),
            Err(IpcError::NoConnection { .. })
        ));
        assert!(!channel.have_connection());
        assert_eq!(channel.role(), None);

        channel.close().unwrap();
        assert!(matches!(
            channel.receive_acknowledge(),
            Err(IpcError::NoConnection { state: "Closed" })
        ));
        assert!(channel.open(RoleRequest::Server).is_err());
    }

    #[test]
    fn test_loopback_over_shared_memory() {
        let name = ChannelName::new(format!("ringlink-channel-unit-{}", std::process::id())).unwrap();
        let config = ChannelConfig::new(name);
        let mut server = IpcChannel::connect(config.clone(), RoleRequest::Server).unwrap();
        let mut client = IpcChannel::connect(config, RoleRequest::Client).unwrap();
        assert!(server.is_server());
        assert!(server.have_connection() && client.have_connection());

        client.send_data(MessageType::APP, b"ping", false).unwrap();
        let message = server.receive_data().unwrap().unwrap();
        assert_eq!(message.payload, b"ping");
        server.receive_acknowledge().unwrap();
        assert!(matches!(
            server.receive_acknowledge(),
            Err(IpcError::Ring(RingError::NothingPending))
        ));
        assert!(client.is_send_buffer_empty());
    }
}

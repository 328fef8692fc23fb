// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fixed header at the start of a channel mapping.
//!
//! Layout: `[server flag u8][client flag u8][pad 2][server RingMeta][client RingMeta]`.
//! Atomics have the same in-memory representation as their plain integers,
//! so the layout stays bit-exact while every access is ordered.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

use crate::types::Role;

/// Cursor metadata for one ring direction.
#[repr(C)]
#[derive(Debug)]
pub struct RingMeta {
    /// Ring size in bytes, fixed for the lifetime of the mapping.
    pub capacity: AtomicU32,
    /// Next byte the writer will fill (owned by the writer).
    pub write_offset: AtomicU32,
    /// Next byte the reader will consume (owned by the reader).
    pub read_offset: AtomicU32,
}

impl RingMeta {
    fn reset(&self, capacity: u32) {
        self.write_offset.store(0, Ordering::Relaxed);
        self.read_offset.store(0, Ordering::Relaxed);
        self.capacity.store(capacity, Ordering::Release);
    }
}

/// Header shared by both ends of a channel.
#[repr(C)]
#[derive(Debug)]
pub struct SharedHeader {
    server_active: AtomicU8,
    client_active: AtomicU8,
    server_ring: RingMeta,
    client_ring: RingMeta,
}

const _: () = assert!(std::mem::size_of::<SharedHeader>() == 28);
const _: () = assert!(std::mem::align_of::<SharedHeader>() == 4);

impl SharedHeader {
    /// Size of the header in bytes; ring data starts right after it.
    pub const SIZE: usize = std::mem::size_of::<SharedHeader>();

    fn flag(&self, role: Role) -> &AtomicU8 {
        match role {
            Role::Server => &self.server_active,
            Role::Client => &self.client_active,
        }
    }

    /// Whether the given side currently holds its role.
    pub fn is_active(&self, role: Role) -> bool {
        self.flag(role).load(Ordering::Acquire) != 0
    }

    /// Claim a role. Last store wins if two openers race.
    pub(crate) fn claim(&self, role: Role) {
        self.flag(role).store(1, Ordering::Release);
    }

    /// Release a role without touching the peer's flag.
    pub(crate) fn release(&self, role: Role) {
        self.flag(role).store(0, Ordering::Release);
    }

    /// Ring written by `role`.
    pub fn ring(&self, role: Role) -> &RingMeta {
        match role {
            Role::Server => &self.server_ring,
            Role::Client => &self.client_ring,
        }
    }

    /// Reinitialise both rings. Only valid while no peer is attached.
    pub(crate) fn reset_rings(&self, server_capacity: u32, client_capacity: u32) {
        self.server_ring.reset(server_capacity);
        self.client_ring.reset(client_capacity);
    }

    /// Point-in-time copy of every field.
    pub fn snapshot(&self) -> HeaderSnapshot {
        let ring = |meta: &RingMeta| RingSnapshot {
            capacity: meta.capacity.load(Ordering::Acquire),
            write_offset: meta.write_offset.load(Ordering::Acquire),
            read_offset: meta.read_offset.load(Ordering::Acquire),
        };
        HeaderSnapshot {
            server_active: self.is_active(Role::Server),
            client_active: self.is_active(Role::Client),
            server_ring: ring(&self.server_ring),
            client_ring: ring(&self.client_ring),
        }
    }
}

/// Plain copy of a [`RingMeta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingSnapshot {
    pub capacity: u32,
    pub write_offset: u32,
    pub read_offset: u32,
}

impl RingSnapshot {
    /// Bytes written but not yet consumed, counting any tail padding.
    pub fn in_flight(&self) -> u32 {
        if self.write_offset >= self.read_offset {
            self.write_offset - self.read_offset
        } else {
            self.capacity - self.read_offset + self.write_offset
        }
    }
}

/// Plain copy of a [`SharedHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeaderSnapshot {
    pub server_active: bool,
    pub client_active: bool,
    pub server_ring: RingSnapshot,
    pub client_ring: RingSnapshot,
}

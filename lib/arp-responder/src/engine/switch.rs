// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Per-switch lifecycle.
//!
//! Each switch is driven by its own [`Switch`] handle, which owns the
//! control channel to that switch and nothing else. The handles share
//! only the immutable [`ArpResponder`]. A switch is either detached or
//! attached; every attach clears the responder's table and installs
//! the full rule set, so the table converges to the same contents no
//! matter what it held before.

use super::ArpResponder;
use super::Reconcile;
use arpd::engine::channel::FlowChannel;
use arpd::provider::LogLevel;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

/// The OpenFlow datapath ID of a switch.
pub type DatapathId = u64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkState {
    Detached,
    Attached,
}

impl Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Detached => "detached",
            Self::Attached => "attached",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchEvent {
    /// The control connection to the switch came up.
    Attach,

    /// The control connection to the switch went away.
    Detach,
}

pub struct Switch<C: FlowChannel> {
    dpid: DatapathId,
    state: LinkState,
    chan: C,
    app: Arc<ArpResponder>,
}

impl<C: FlowChannel> Switch<C> {
    pub fn new(dpid: DatapathId, chan: C, app: Arc<ArpResponder>) -> Self {
        Self { dpid, state: LinkState::Detached, chan, app }
    }

    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.chan
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.chan
    }

    pub fn into_channel(self) -> C {
        self.chan
    }

    /// Replace the channel, as when the switch reconnects.
    pub fn set_channel(&mut self, chan: C) {
        self.chan = chan;
    }

    /// Apply a connection event.
    ///
    /// Channel failures are reported in the result and never change
    /// the state transition: the event happened regardless.
    pub fn handle(&mut self, ev: SwitchEvent) -> Reconcile {
        let dpid = self.dpid;

        match (self.state, ev) {
            (LinkState::Attached, SwitchEvent::Attach) => self.app.log(
                LogLevel::Note,
                &format!("switch {dpid:#x} attached again, rebuilding table"),
            ),

            (LinkState::Detached, SwitchEvent::Detach) => self.app.log(
                LogLevel::Note,
                &format!("switch {dpid:#x} detached while not attached"),
            ),

            (_, ev) => self.app.log(
                LogLevel::Note,
                &format!("switch {dpid:#x} event {ev:?}"),
            ),
        }

        match ev {
            SwitchEvent::Attach => {
                self.state = LinkState::Attached;
                self.app.initialize_on_connect(&mut self.chan)
            }

            SwitchEvent::Detach => {
                self.state = LinkState::Detached;
                self.app.cleanup_on_disconnect(&mut self.chan)
            }
        }
    }
}

/// The switches known to the responder, keyed by datapath ID.
pub struct Datapaths<C: FlowChannel> {
    app: Arc<ArpResponder>,
    switches: BTreeMap<DatapathId, Switch<C>>,
}

impl<C: FlowChannel> Datapaths<C> {
    pub fn new(app: Arc<ArpResponder>) -> Self {
        Self { app, switches: BTreeMap::new() }
    }

    /// A switch connected over `chan`. A switch that was seen before
    /// keeps its handle and switches to the new channel.
    pub fn attach(&mut self, dpid: DatapathId, chan: C) -> Reconcile {
        let sw = match self.switches.entry(dpid) {
            Entry::Occupied(e) => {
                let sw = e.into_mut();
                sw.set_channel(chan);
                sw
            }

            Entry::Vacant(e) => {
                e.insert(Switch::new(dpid, chan, Arc::clone(&self.app)))
            }
        };

        sw.handle(SwitchEvent::Attach)
    }

    /// The connection to a switch went away. A switch that never
    /// attached is ignored.
    pub fn detach(&mut self, dpid: DatapathId) -> Reconcile {
        match self.switches.get_mut(&dpid) {
            Some(sw) => sw.handle(SwitchEvent::Detach),
            None => {
                self.app.log(
                    LogLevel::Note,
                    &format!("ignoring detach of unknown switch {dpid:#x}"),
                );
                Reconcile::Skipped
            }
        }
    }

    pub fn get(&self, dpid: DatapathId) -> Option<&Switch<C>> {
        self.switches.get(&dpid)
    }

    pub fn get_mut(&mut self, dpid: DatapathId) -> Option<&mut Switch<C>> {
        self.switches.get_mut(&dpid)
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}

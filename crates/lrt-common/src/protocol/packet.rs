//! Train event packet model

use std::fmt;

use crate::error::{LrtError, PacketError};
use crate::protocol::MAX_DESTINATION_LEN;

const ACK: u8 = 0x20;
const NEW_TRAIN: u8 = 0x10;
const UPDATE_TRAIN: u8 = 0x08;
const DELETE_TRAIN: u8 = 0x04;
const TRAIN_ARRIVING: u8 = 0x02;
const TRAIN_DEPARTING: u8 = 0x01;

const EVENT_MASK: u8 = NEW_TRAIN | UPDATE_TRAIN | DELETE_TRAIN | TRAIN_ARRIVING | TRAIN_DEPARTING;

/// The six independent booleans packed into the flag byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    pub ack: bool,
    pub new_train: bool,
    pub update_train: bool,
    pub delete_train: bool,
    pub train_arriving: bool,
    pub train_departing: bool,
}

impl Flags {
    /// Pack into a wire byte; bits 6-7 are left clear.
    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.ack {
            byte |= ACK;
        }
        if self.new_train {
            byte |= NEW_TRAIN;
        }
        if self.update_train {
            byte |= UPDATE_TRAIN;
        }
        if self.delete_train {
            byte |= DELETE_TRAIN;
        }
        if self.train_arriving {
            byte |= TRAIN_ARRIVING;
        }
        if self.train_departing {
            byte |= TRAIN_DEPARTING;
        }
        byte
    }

    /// Unpack a wire byte. Unused bits are ignored.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            ack: byte & ACK != 0,
            new_train: byte & NEW_TRAIN != 0,
            update_train: byte & UPDATE_TRAIN != 0,
            delete_train: byte & DELETE_TRAIN != 0,
            train_arriving: byte & TRAIN_ARRIVING != 0,
            train_departing: byte & TRAIN_DEPARTING != 0,
        }
    }

    /// The event these flags describe.
    ///
    /// `Ok(None)` when no event flag is set. More than one event flag is
    /// rejected rather than resolved by precedence.
    pub fn event(self) -> Result<Option<TrainEvent>, LrtError> {
        let byte = self.to_byte();
        match byte & EVENT_MASK {
            0 => Ok(None),
            NEW_TRAIN => Ok(Some(TrainEvent::New)),
            UPDATE_TRAIN => Ok(Some(TrainEvent::Update)),
            DELETE_TRAIN => Ok(Some(TrainEvent::Delete)),
            TRAIN_ARRIVING => Ok(Some(TrainEvent::Arriving)),
            TRAIN_DEPARTING => Ok(Some(TrainEvent::Departing)),
            _ => Err(LrtError::AmbiguousEvent { flags: byte }),
        }
    }
}

/// A single train event carried by a request frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainEvent {
    New,
    Update,
    Delete,
    Arriving,
    Departing,
}

impl TrainEvent {
    pub const ALL: [TrainEvent; 5] = [
        TrainEvent::New,
        TrainEvent::Update,
        TrainEvent::Delete,
        TrainEvent::Arriving,
        TrainEvent::Departing,
    ];

    /// Flags with only this event set
    pub fn flags(self) -> Flags {
        let mut flags = Flags::default();
        match self {
            TrainEvent::New => flags.new_train = true,
            TrainEvent::Update => flags.update_train = true,
            TrainEvent::Delete => flags.delete_train = true,
            TrainEvent::Arriving => flags.train_arriving = true,
            TrainEvent::Departing => flags.train_departing = true,
        }
        flags
    }
}

impl fmt::Display for TrainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainEvent::New => "new",
            TrainEvent::Update => "update",
            TrainEvent::Delete => "delete",
            TrainEvent::Arriving => "arriving",
            TrainEvent::Departing => "departing",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TrainEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(TrainEvent::New),
            "update" => Ok(TrainEvent::Update),
            "delete" => Ok(TrainEvent::Delete),
            "arriving" | "arrive" => Ok(TrainEvent::Arriving),
            "departing" | "depart" => Ok(TrainEvent::Departing),
            other => Err(format!(
                "unknown event '{}' (expected new, update, delete, arriving or departing)",
                other
            )),
        }
    }
}

/// The fixed 6-byte part of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub transaction_id: u16,
    pub flags: Flags,
    pub train_number: u16,
    pub destination_length: u8,
}

/// A train event notification or its acknowledgment
///
/// The destination is private so its byte length always matches the
/// header's `destination_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub transaction_id: u16,
    pub flags: Flags,
    pub train_number: u16,
    destination: String,
}

impl Packet {
    /// Build a request carrying a single event
    pub fn new(
        transaction_id: u16,
        event: TrainEvent,
        train_number: u16,
        destination: impl Into<String>,
    ) -> Result<Self, PacketError> {
        Self::from_parts(transaction_id, event.flags(), train_number, destination)
    }

    /// Build a packet from raw flags
    pub fn from_parts(
        transaction_id: u16,
        flags: Flags,
        train_number: u16,
        destination: impl Into<String>,
    ) -> Result<Self, PacketError> {
        let destination = destination.into();
        if !destination.is_ascii() {
            return Err(PacketError::NonAsciiDestination(destination));
        }
        if destination.len() > MAX_DESTINATION_LEN {
            return Err(PacketError::DestinationTooLong {
                len: destination.len(),
            });
        }
        Ok(Self {
            transaction_id,
            flags,
            train_number,
            destination,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn destination_length(&self) -> u8 {
        // Bounded by the constructors
        self.destination.len() as u8
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            transaction_id: self.transaction_id,
            flags: self.flags,
            train_number: self.train_number,
            destination_length: self.destination_length(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags.ack
    }

    /// See [`Flags::event`]
    pub fn event(&self) -> Result<Option<TrainEvent>, LrtError> {
        self.flags.event()
    }

    /// The acknowledgment answering this packet: identical except for the ack flag.
    pub fn acknowledgment(&self) -> Packet {
        let mut ack = self.clone();
        ack.flags.ack = true;
        ack
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txn={} train={} destination={:?} flags={:#04x}",
            self.transaction_id,
            self.train_number,
            self.destination,
            self.flags.to_byte()
        )
    }
}

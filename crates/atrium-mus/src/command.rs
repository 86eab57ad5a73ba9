//! Control-plane message grammar.
//!
//! One message per connection: a four-character opcode followed by fields
//! separated by ASCII 2. The bytes are decoded with the single-byte charset.

use std::fmt;
use std::str::FromStr;

use atrium_wire::{DELIMITER, charset};

use crate::error::MusError;

/// Length of the opcode prefix.
pub const OPCODE_LEN: usize = 4;

/// Cached profile data a `UPR*` command refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileSlice {
    /// Coin balance.
    Credits,
    /// Game tickets.
    Tickets,
    /// Badge list.
    Badges,
    /// Inventory.
    Hand,
    /// Figure and appearance.
    Look,
    /// Permission rank.
    Rank,
}

impl fmt::Display for ProfileSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Credits => "credits",
            Self::Tickets => "tickets",
            Self::Badges => "badges",
            Self::Hand => "hand",
            Self::Look => "look",
            Self::Rank => "rank",
        })
    }
}

/// The fixed command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `HKTM`: hotel alert to one user.
    SystemAlert,
    /// `HKMW`: moderator warning to one user.
    ModeratorAlert,
    /// `HKUK`: remove a user from a room.
    RoomKick,
    /// `HKAR`: alert every user at or above a rank.
    RankAlert,
    /// `HKSB`: ban and disconnect a user.
    Ban,
    /// `HKRC`: rehash a cache.
    Rehash,
    /// `UPR*`: reload one cached profile slice.
    Refresh(ProfileSlice),
}

impl Opcode {
    /// Every opcode in the table.
    pub const ALL: [Opcode; 12] = [
        Opcode::SystemAlert,
        Opcode::ModeratorAlert,
        Opcode::RoomKick,
        Opcode::RankAlert,
        Opcode::Ban,
        Opcode::Rehash,
        Opcode::Refresh(ProfileSlice::Credits),
        Opcode::Refresh(ProfileSlice::Tickets),
        Opcode::Refresh(ProfileSlice::Badges),
        Opcode::Refresh(ProfileSlice::Hand),
        Opcode::Refresh(ProfileSlice::Look),
        Opcode::Refresh(ProfileSlice::Rank),
    ];

    /// Wire code.
    pub const fn code(self) -> &'static str {
        match self {
            Opcode::SystemAlert => "HKTM",
            Opcode::ModeratorAlert => "HKMW",
            Opcode::RoomKick => "HKUK",
            Opcode::RankAlert => "HKAR",
            Opcode::Ban => "HKSB",
            Opcode::Rehash => "HKRC",
            Opcode::Refresh(ProfileSlice::Credits) => "UPRC",
            Opcode::Refresh(ProfileSlice::Tickets) => "UPRT",
            Opcode::Refresh(ProfileSlice::Badges) => "UPRB",
            Opcode::Refresh(ProfileSlice::Hand) => "UPRH",
            Opcode::Refresh(ProfileSlice::Look) => "UPRL",
            Opcode::Refresh(ProfileSlice::Rank) => "UPRA",
        }
    }

    /// Exact-match lookup.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A parsed control-plane message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusCommand {
    /// The raw four-character opcode.
    pub opcode: String,
    /// Fields in order. Empty when nothing follows the opcode.
    pub fields: Vec<String>,
}

impl MusCommand {
    /// Parse a raw message.
    pub fn parse(bytes: &[u8]) -> Result<Self, MusError> {
        Self::parse_str(&charset::decode(bytes))
    }

    /// Parse an already-decoded message.
    pub fn parse_str(text: &str) -> Result<Self, MusError> {
        let split = match text.char_indices().nth(OPCODE_LEN) {
            Some((index, _)) => index,
            None if text.chars().count() == OPCODE_LEN => text.len(),
            None => return Err(MusError::TooShort(text.chars().count())),
        };
        let (opcode, rest) = text.split_at(split);
        let fields = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(DELIMITER).map(str::to_string).collect()
        };
        Ok(Self {
            opcode: opcode.to_string(),
            fields,
        })
    }

    /// Look the opcode up in the command table.
    pub fn resolve(&self) -> Result<Opcode, MusError> {
        Opcode::from_code(&self.opcode).ok_or_else(|| MusError::UnknownOpcode(self.opcode.clone()))
    }

    /// Field `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Field `index`, required.
    pub fn text(&self, op: Opcode, index: usize, name: &'static str) -> Result<&str, MusError> {
        self.field(index).ok_or(MusError::MissingField {
            opcode: op.code(),
            index,
            name,
        })
    }

    /// Field `index` parsed as `T`.
    pub fn number<T: FromStr>(&self, op: Opcode, index: usize, name: &'static str) -> Result<T, MusError> {
        let raw = self.text(op, index, name)?;
        raw.trim().parse().map_err(|_| MusError::InvalidField {
            opcode: op.code(),
            name,
            value: raw.to_string(),
        })
    }
}

//! Coded values carried inside records.
//!
//! Records store these as their numeric code until the named rewrite
//! replaces them with the names below.

use serde::{Deserialize, Serialize};

/// Class of device that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    Mouse,
    Keyboard,
    Touchpad,
    Touchscreen,
    #[default]
    Unknown,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::Mouse,
        DeviceType::Keyboard,
        DeviceType::Touchpad,
        DeviceType::Touchscreen,
        DeviceType::Unknown,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Mouse => "Mouse",
            DeviceType::Keyboard => "Keyboard",
            DeviceType::Touchpad => "Touchpad",
            DeviceType::Touchscreen => "Touchscreen",
            DeviceType::Unknown => "Unknown",
        }
    }
}

/// Direction of a button or key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonAction {
    Press,
    Release,
    /// Auto-repeat generated while a key is held.
    Repeat,
}

impl ButtonAction {
    pub const ALL: [ButtonAction; 3] = [ButtonAction::Press, ButtonAction::Release, ButtonAction::Repeat];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ButtonAction::Press => "Press",
            ButtonAction::Release => "Release",
            ButtonAction::Repeat => "Repeat",
        }
    }
}

/// Whether the pointer ran into a barrier or left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarrierAction {
    Hit,
    Leave,
}

impl BarrierAction {
    pub const ALL: [BarrierAction; 2] = [BarrierAction::Hit, BarrierAction::Leave];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BarrierAction::Hit => "Hit",
            BarrierAction::Leave => "Leave",
        }
    }
}

/// Keyboard modifier active when an event was captured.
///
/// Variant order matches the bit order of the X11 modifier mask
/// (Shift, Lock, Control, Mod1 through Mod5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Shift,
    CapsLock,
    Control,
    Alt,
    NumLock,
    Mod3,
    Super,
    Mod5,
}

impl Modifier {
    pub const ALL: [Modifier; 8] = [
        Modifier::Shift,
        Modifier::CapsLock,
        Modifier::Control,
        Modifier::Alt,
        Modifier::NumLock,
        Modifier::Mod3,
        Modifier::Super,
        Modifier::Mod5,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Bit this modifier occupies in a modifier mask.
    pub fn mask_bit(self) -> u32 {
        1 << self.code()
    }

    /// Expand a modifier mask into the active modifiers, lowest bit first.
    pub fn from_mask(mask: u32) -> Vec<Modifier> {
        Self::ALL
            .iter()
            .copied()
            .filter(|modifier| mask & modifier.mask_bit() != 0)
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Shift => "Shift",
            Modifier::CapsLock => "CapsLock",
            Modifier::Control => "Control",
            Modifier::Alt => "Alt",
            Modifier::NumLock => "NumLock",
            Modifier::Mod3 => "Mod3",
            Modifier::Super => "Super",
            Modifier::Mod5 => "Mod5",
        }
    }
}

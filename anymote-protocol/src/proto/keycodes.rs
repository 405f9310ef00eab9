//! Key codes understood by the command protocol
//!
//! Values match the Android `KeyEvent` key codes the devices run on.
//! Names are the Android constant names without the `KEYCODE_` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ProtocolError, Result};

macro_rules! keycodes {
    ($($variant:ident = $value:literal => $name:literal,)+) => {
        /// Android key code
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum Keycode {
            $($variant = $value,)+
        }

        impl Keycode {
            /// Symbolic name without the `KEYCODE_` prefix
            pub fn name(&self) -> &'static str {
                match self {
                    $(Keycode::$variant => $name,)+
                }
            }

            /// Look up a key code by its symbolic name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Keycode::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

keycodes! {
    Unknown = 0 => "UNKNOWN",
    SoftLeft = 1 => "SOFT_LEFT",
    SoftRight = 2 => "SOFT_RIGHT",
    Home = 3 => "HOME",
    Back = 4 => "BACK",
    Call = 5 => "CALL",
    Endcall = 6 => "ENDCALL",
    Num0 = 7 => "0",
    Num1 = 8 => "1",
    Num2 = 9 => "2",
    Num3 = 10 => "3",
    Num4 = 11 => "4",
    Num5 = 12 => "5",
    Num6 = 13 => "6",
    Num7 = 14 => "7",
    Num8 = 15 => "8",
    Num9 = 16 => "9",
    Star = 17 => "STAR",
    Pound = 18 => "POUND",
    DpadUp = 19 => "DPAD_UP",
    DpadDown = 20 => "DPAD_DOWN",
    DpadLeft = 21 => "DPAD_LEFT",
    DpadRight = 22 => "DPAD_RIGHT",
    DpadCenter = 23 => "DPAD_CENTER",
    VolumeUp = 24 => "VOLUME_UP",
    VolumeDown = 25 => "VOLUME_DOWN",
    Power = 26 => "POWER",
    Camera = 27 => "CAMERA",
    Clear = 28 => "CLEAR",
    A = 29 => "A",
    B = 30 => "B",
    C = 31 => "C",
    D = 32 => "D",
    E = 33 => "E",
    F = 34 => "F",
    G = 35 => "G",
    H = 36 => "H",
    I = 37 => "I",
    J = 38 => "J",
    K = 39 => "K",
    L = 40 => "L",
    M = 41 => "M",
    N = 42 => "N",
    O = 43 => "O",
    P = 44 => "P",
    Q = 45 => "Q",
    R = 46 => "R",
    S = 47 => "S",
    T = 48 => "T",
    U = 49 => "U",
    V = 50 => "V",
    W = 51 => "W",
    X = 52 => "X",
    Y = 53 => "Y",
    Z = 54 => "Z",
    Comma = 55 => "COMMA",
    Period = 56 => "PERIOD",
    AltLeft = 57 => "ALT_LEFT",
    AltRight = 58 => "ALT_RIGHT",
    ShiftLeft = 59 => "SHIFT_LEFT",
    ShiftRight = 60 => "SHIFT_RIGHT",
    Tab = 61 => "TAB",
    Space = 62 => "SPACE",
    Sym = 63 => "SYM",
    Explorer = 64 => "EXPLORER",
    Envelope = 65 => "ENVELOPE",
    Enter = 66 => "ENTER",
    Del = 67 => "DEL",
    Grave = 68 => "GRAVE",
    Minus = 69 => "MINUS",
    Equals = 70 => "EQUALS",
    LeftBracket = 71 => "LEFT_BRACKET",
    RightBracket = 72 => "RIGHT_BRACKET",
    Backslash = 73 => "BACKSLASH",
    Semicolon = 74 => "SEMICOLON",
    Apostrophe = 75 => "APOSTROPHE",
    Slash = 76 => "SLASH",
    At = 77 => "AT",
    Num = 78 => "NUM",
    Headsethook = 79 => "HEADSETHOOK",
    Focus = 80 => "FOCUS",
    Plus = 81 => "PLUS",
    Menu = 82 => "MENU",
    Notification = 83 => "NOTIFICATION",
    Search = 84 => "SEARCH",
    MediaPlayPause = 85 => "MEDIA_PLAY_PAUSE",
    MediaStop = 86 => "MEDIA_STOP",
    MediaNext = 87 => "MEDIA_NEXT",
    MediaPrevious = 88 => "MEDIA_PREVIOUS",
    MediaRewind = 89 => "MEDIA_REWIND",
    MediaFastForward = 90 => "MEDIA_FAST_FORWARD",
    Mute = 91 => "MUTE",
    PageUp = 92 => "PAGE_UP",
    PageDown = 93 => "PAGE_DOWN",
    Escape = 111 => "ESCAPE",
    ForwardDel = 112 => "FORWARD_DEL",
    MoveHome = 122 => "MOVE_HOME",
    MoveEnd = 123 => "MOVE_END",
    MediaPlay = 126 => "MEDIA_PLAY",
    MediaPause = 127 => "MEDIA_PAUSE",
    MediaRecord = 130 => "MEDIA_RECORD",
    F1 = 131 => "F1",
    F2 = 132 => "F2",
    F3 = 133 => "F3",
    F4 = 134 => "F4",
    F5 = 135 => "F5",
    F6 = 136 => "F6",
    F7 = 137 => "F7",
    F8 = 138 => "F8",
    F9 = 139 => "F9",
    F10 = 140 => "F10",
    F11 = 141 => "F11",
    F12 = 142 => "F12",
    VolumeMute = 164 => "VOLUME_MUTE",
    Info = 165 => "INFO",
    ChannelUp = 166 => "CHANNEL_UP",
    ChannelDown = 167 => "CHANNEL_DOWN",
    Guide = 172 => "GUIDE",
    Dvr = 173 => "DVR",
    Bookmark = 174 => "BOOKMARK",
    Captions = 175 => "CAPTIONS",
    Settings = 176 => "SETTINGS",
    TvPower = 177 => "TV_POWER",
    TvInput = 178 => "TV_INPUT",
}

impl FromStr for Keycode {
    type Err = ProtocolError;

    /// Parse `HOME`, `home` or `KEYCODE_HOME`
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("KEYCODE_").unwrap_or(&upper);
        Keycode::from_name(name)
            .ok_or_else(|| ProtocolError::InvalidArgument(format!("unknown key code '{}'", s)))
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KEYCODE_{}", self.name())
    }
}

/// Key transition carried by a key event
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Enumeration,
)]
#[repr(i32)]
pub enum KeyAction {
    Up = 0,
    Down = 1,
}

impl FromStr for KeyAction {
    type Err = ProtocolError;

    /// Accepts `u`/`up` and `d`/`down`, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u" | "up" => Ok(KeyAction::Up),
            "d" | "down" => Ok(KeyAction::Down),
            other => Err(ProtocolError::InvalidArgument(format!(
                "unknown key action '{}'",
                other
            ))),
        }
    }
}

//! RFB message definitions
//!
//! Only the subset of the protocol a front-panel client needs is modelled
//! here: screen updates and pointer input. All multi-byte integers are big-endian on the wire.

use bytes::{BufMut, Bytes, BytesMut};

/// Rectangle encodings
pub mod encoding {
    /// Raw pixel data, `width * height * bytes_per_pixel` bytes
    pub const RAW: i32 = 0;
}

/// Client-to-server message type identifiers
pub mod client_type {
    pub const SET_PIXEL_FORMAT: u8 = 0;
    pub const SET_ENCODINGS: u8 = 2;
    pub const FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;
    pub const POINTER_EVENT: u8 = 5;
}

/// Pointer button masks; bit `n` is button `n + 1`
pub mod button {
    pub const NONE: u8 = 0;
    pub const LEFT: u8 = 1;
    pub const MIDDLE: u8 = 1 << 1;
    pub const RIGHT: u8 = 1 << 2;
    pub const WHEEL_UP: u8 = 1 << 3;
    pub const WHEEL_DOWN: u8 = 1 << 4;
    pub const WHEEL_LEFT: u8 = 1 << 5;
    pub const WHEEL_RIGHT: u8 = 1 << 6;
}

/// Server-to-client message type identifiers
pub mod server_type {
    pub const FRAMEBUFFER_UPDATE: u8 = 0;
    pub const SET_COLOUR_MAP_ENTRIES: u8 = 1;
    pub const BELL: u8 = 2;
    pub const SERVER_CUT_TEXT: u8 = 3;
}

/// Pixel layout used for framebuffer data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_colour: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// Size of an encoded pixel format (including padding)
    pub const SIZE: usize = 16;

    /// 32 bits per pixel, little-endian, 8 bits per channel (0x00RRGGBB)
    ///
    /// This is the format the client asks the server to use, so decoding a
    /// pixel is a fixed byte shuffle regardless of the server's native format.
    pub fn rgbx8888() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            true_colour: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// Number of bytes each pixel occupies on the wire
    pub fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel as usize).div_ceil(8)
    }

    /// Encode into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(Self::SIZE);
        dst.put_u8(self.bits_per_pixel);
        dst.put_u8(self.depth);
        dst.put_u8(self.big_endian as u8);
        dst.put_u8(self.true_colour as u8);
        dst.put_u16(self.red_max);
        dst.put_u16(self.green_max);
        dst.put_u16(self.blue_max);
        dst.put_u8(self.red_shift);
        dst.put_u8(self.green_shift);
        dst.put_u8(self.blue_shift);
        dst.put_bytes(0, 3);
    }

    /// Decode from exactly [`PixelFormat::SIZE`] bytes
    pub fn decode(src: &[u8; Self::SIZE]) -> Self {
        Self {
            bits_per_pixel: src[0],
            depth: src[1],
            big_endian: src[2] != 0,
            true_colour: src[3] != 0,
            red_max: u16::from_be_bytes([src[4], src[5]]),
            green_max: u16::from_be_bytes([src[6], src[7]]),
            blue_max: u16::from_be_bytes([src[8], src[9]]),
            red_shift: src[10],
            green_shift: src[11],
            blue_shift: src[12],
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::rgbx8888()
    }
}

/// Parameters announced by the server once initialisation completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInit {
    /// Framebuffer width in pixels
    pub width: u16,
    /// Framebuffer height in pixels
    pub height: u16,
    /// Server's native pixel format
    pub pixel_format: PixelFormat,
    /// Desktop name
    pub name: String,
}

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Ask the server to send pixels in this format
    SetPixelFormat(PixelFormat),
    /// Encodings the client accepts, in order of preference
    SetEncodings(Vec<i32>),
    /// Request an update of the given region
    FramebufferUpdateRequest {
        incremental: bool,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
    /// Pointer position and the buttons currently held down
    PointerEvent { buttons: u8, x: u16, y: u16 },
}

impl ClientMessage {
    /// Request the whole screen, non-incrementally
    pub fn full_update(width: u16, height: u16) -> Self {
        Self::FramebufferUpdateRequest {
            incremental: false,
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Wire type identifier
    pub fn message_type(&self) -> u8 {
        match self {
            Self::SetPixelFormat(_) => client_type::SET_PIXEL_FORMAT,
            Self::SetEncodings(_) => client_type::SET_ENCODINGS,
            Self::FramebufferUpdateRequest { .. } => client_type::FRAMEBUFFER_UPDATE_REQUEST,
            Self::PointerEvent { .. } => client_type::POINTER_EVENT,
        }
    }
}

/// A rectangle of pixel data from a framebuffer update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
    /// Encoded pixel payload
    pub pixels: Bytes,
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Updated screen contents
    FramebufferUpdate(Vec<Rectangle>),
    /// Colour map changes (only meaningful for indexed pixel formats)
    SetColourMapEntries {
        first_colour: u16,
        colours: Vec<[u16; 3]>,
    },
    /// Audible bell
    Bell,
    /// Clipboard contents
    ServerCutText(String),
}

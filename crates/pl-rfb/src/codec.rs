//! Tokio codec for the post-handshake RFB message stream

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RfbError;
use crate::message::{encoding, server_type, ClientMessage, PixelFormat, Rectangle, ServerMessage};

/// Upper bound on a single rectangle's payload (a 4K screen at 32bpp fits)
pub const MAX_RECT_BYTES: usize = 64 * 1024 * 1024;

/// Upper bound on clipboard text we are willing to buffer
pub const MAX_CUT_TEXT: usize = 1024 * 1024;

const UPDATE_HEADER_SIZE: usize = 4;
const RECT_HEADER_SIZE: usize = 12;
const COLOUR_MAP_HEADER_SIZE: usize = 6;
const CUT_TEXT_HEADER_SIZE: usize = 8;

/// Codec for RFB messages once the handshake has completed
///
/// Decoding framebuffer updates depends on the negotiated pixel format, so
/// the codec must be told about any `SetPixelFormat` the client sends. The
/// encoder does this automatically.
#[derive(Debug, Default)]
pub struct RfbCodec {
    pixel_format: PixelFormat,
}

impl RfbCodec {
    /// Create a codec for the given pixel format
    pub fn new(pixel_format: PixelFormat) -> Self {
        Self { pixel_format }
    }

    /// Pixel format used to size raw rectangles
    pub fn pixel_format(&self) -> &PixelFormat {
        &self.pixel_format
    }

    fn decode_framebuffer_update(
        &self,
        src: &mut BytesMut,
    ) -> Result<Option<ServerMessage>, RfbError> {
        if src.len() < UPDATE_HEADER_SIZE {
            return Ok(None);
        }

        let count = u16::from_be_bytes([src[2], src[3]]) as usize;
        let bpp = self.pixel_format.bytes_per_pixel();

        // Walk the rectangle headers without consuming anything until the
        // whole update is buffered.
        let mut offset = UPDATE_HEADER_SIZE;
        let mut layout = Vec::with_capacity(count);
        for _ in 0..count {
            if src.len() < offset + RECT_HEADER_SIZE {
                return Ok(None);
            }
            let header = &src[offset..offset + RECT_HEADER_SIZE];
            let x = u16::from_be_bytes([header[0], header[1]]);
            let y = u16::from_be_bytes([header[2], header[3]]);
            let width = u16::from_be_bytes([header[4], header[5]]);
            let height = u16::from_be_bytes([header[6], header[7]]);
            let enc = i32::from_be_bytes([header[8], header[9], header[10], header[11]]);

            let len = match enc {
                encoding::RAW => width as usize * height as usize * bpp,
                other => return Err(RfbError::UnsupportedEncoding(other)),
            };
            if len > MAX_RECT_BYTES {
                return Err(RfbError::PayloadTooLarge {
                    size: len,
                    max: MAX_RECT_BYTES,
                });
            }

            offset += RECT_HEADER_SIZE;
            layout.push((x, y, width, height, enc, offset, len));
            offset += len;
        }

        if src.len() < offset {
            src.reserve(offset - src.len());
            return Ok(None);
        }

        let message = src.split_to(offset).freeze();
        let rectangles = layout
            .into_iter()
            .map(|(x, y, width, height, encoding, start, len)| Rectangle {
                x,
                y,
                width,
                height,
                encoding,
                pixels: message.slice(start..start + len),
            })
            .collect();

        Ok(Some(ServerMessage::FramebufferUpdate(rectangles)))
    }

    fn decode_colour_map(src: &mut BytesMut) -> Result<Option<ServerMessage>, RfbError> {
        if src.len() < COLOUR_MAP_HEADER_SIZE {
            return Ok(None);
        }
        let count = u16::from_be_bytes([src[4], src[5]]) as usize;
        let total = COLOUR_MAP_HEADER_SIZE + count * 6;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(2);
        let first_colour = src.get_u16();
        let _ = src.get_u16();
        let colours = (0..count)
            .map(|_| [src.get_u16(), src.get_u16(), src.get_u16()])
            .collect();

        Ok(Some(ServerMessage::SetColourMapEntries {
            first_colour,
            colours,
        }))
    }

    fn decode_cut_text(src: &mut BytesMut) -> Result<Option<ServerMessage>, RfbError> {
        if src.len() < CUT_TEXT_HEADER_SIZE {
            return Ok(None);
        }
        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_CUT_TEXT {
            return Err(RfbError::PayloadTooLarge {
                size: len,
                max: MAX_CUT_TEXT,
            });
        }
        let total = CUT_TEXT_HEADER_SIZE + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(CUT_TEXT_HEADER_SIZE);
        let text = src.split_to(len);
        Ok(Some(ServerMessage::ServerCutText(
            String::from_utf8_lossy(&text).into_owned(),
        )))
    }
}

impl Decoder for RfbCodec {
    type Item = ServerMessage;
    type Error = RfbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&message_type) = src.first() else {
            return Ok(None);
        };

        match message_type {
            server_type::FRAMEBUFFER_UPDATE => self.decode_framebuffer_update(src),
            server_type::SET_COLOUR_MAP_ENTRIES => Self::decode_colour_map(src),
            server_type::BELL => {
                src.advance(1);
                Ok(Some(ServerMessage::Bell))
            }
            server_type::SERVER_CUT_TEXT => Self::decode_cut_text(src),
            other => Err(RfbError::UnknownMessageType(other)),
        }
    }
}

impl Encoder<ClientMessage> for RfbCodec {
    type Error = RfbError;

    fn encode(&mut self, message: ClientMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(message.message_type());

        match message {
            ClientMessage::SetPixelFormat(format) => {
                dst.put_bytes(0, 3);
                format.encode(dst);
                self.pixel_format = format;
            }
            ClientMessage::SetEncodings(encodings) => {
                dst.put_u8(0);
                dst.put_u16(encodings.len() as u16);
                for enc in encodings {
                    dst.put_i32(enc);
                }
            }
            ClientMessage::FramebufferUpdateRequest {
                incremental,
                x,
                y,
                width,
                height,
            } => {
                dst.put_u8(incremental as u8);
                dst.put_u16(x);
                dst.put_u16(y);
                dst.put_u16(width);
                dst.put_u16(height);
            }
            ClientMessage::PointerEvent { buttons, x, y } => {
                dst.put_u8(buttons);
                dst.put_u16(x);
                dst.put_u16(y);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_update(rects: &[(u16, u16, u16, u16, u8)]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(server_type::FRAMEBUFFER_UPDATE);
        buf.put_u8(0);
        buf.put_u16(rects.len() as u16);
        for &(x, y, w, h, fill) in rects {
            buf.put_u16(x);
            buf.put_u16(y);
            buf.put_u16(w);
            buf.put_u16(h);
            buf.put_i32(encoding::RAW);
            buf.put_bytes(fill, w as usize * h as usize * 4);
        }
        buf
    }

    #[test]
    fn test_decode_framebuffer_update() {
        let mut codec = RfbCodec::default();
        let mut buf = raw_update(&[(0, 0, 2, 2, 0xAA), (2, 0, 1, 1, 0x55)]);

        let message = codec.decode(&mut buf).unwrap().unwrap();
        let ServerMessage::FramebufferUpdate(rects) = message else {
            panic!("Expected FramebufferUpdate");
        };

        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].pixels.len(), 16);
        assert!(rects[0].pixels.iter().all(|&b| b == 0xAA));
        assert_eq!((rects[1].x, rects[1].width), (2, 1));
        assert_eq!(rects[1].pixels.as_ref(), &[0x55; 4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_update_waits() {
        let mut codec = RfbCodec::default();
        let mut full = raw_update(&[(0, 0, 4, 4, 1)]);

        // Header plus part of the pixel data
        let mut partial = full.split_to(20);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), 20, "partial input must not be consumed");

        partial.extend_from_slice(&full);
        let message = codec.decode(&mut partial).unwrap().unwrap();
        assert!(matches!(message, ServerMessage::FramebufferUpdate(ref r) if r.len() == 1));
    }

    #[test]
    fn test_decode_bell_and_cut_text() {
        let mut codec = RfbCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u8(server_type::BELL);
        buf.put_u8(server_type::SERVER_CUT_TEXT);
        buf.put_bytes(0, 3);
        buf.put_u32(5);
        buf.extend_from_slice(b"hello");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ServerMessage::Bell));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ServerMessage::ServerCutText("hello".to_string()))
        );
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_colour_map() {
        let mut codec = RfbCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u8(server_type::SET_COLOUR_MAP_ENTRIES);
        buf.put_u8(0);
        buf.put_u16(7);
        buf.put_u16(1);
        buf.put_u16(1);
        buf.put_u16(2);
        buf.put_u16(3);

        let message = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            message,
            ServerMessage::SetColourMapEntries {
                first_colour: 7,
                colours: vec![[1, 2, 3]],
            }
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut codec = RfbCodec::default();
        let mut buf = BytesMut::from(&[0xFEu8][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(RfbError::UnknownMessageType(0xFE))
        ));
    }

    #[test]
    fn test_decode_unrequested_encoding() {
        let mut codec = RfbCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u8(server_type::FRAMEBUFFER_UPDATE);
        buf.put_u8(0);
        buf.put_u16(1);
        buf.put_bytes(0, 8);
        buf.put_i32(7); // Tight

        assert!(matches!(
            codec.decode(&mut buf),
            Err(RfbError::UnsupportedEncoding(7))
        ));
    }

    #[test]
    fn test_encode_update_request() {
        let mut codec = RfbCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(ClientMessage::full_update(800, 480), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], &[3, 0, 0, 0, 0, 0, 0x03, 0x20, 0x01, 0xE0]);
    }

    #[test]
    fn test_encode_pointer_event() {
        let mut codec = RfbCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(
                ClientMessage::PointerEvent {
                    buttons: crate::message::button::LEFT,
                    x: 300,
                    y: 2,
                },
                &mut buf,
            )
            .unwrap();

        assert_eq!(&buf[..], &[5, 1, 0x01, 0x2C, 0x00, 0x02]);
    }

    #[test]
    fn test_set_pixel_format_updates_decoder() {
        let mut codec = RfbCodec::default();
        let mut format = PixelFormat::rgbx8888();
        format.bits_per_pixel = 16;
        format.depth = 16;

        let mut buf = BytesMut::new();
        codec
            .encode(ClientMessage::SetPixelFormat(format), &mut buf)
            .unwrap();
        assert_eq!(buf.len(), 4 + PixelFormat::SIZE);
        assert_eq!(codec.pixel_format().bytes_per_pixel(), 2);
    }
}
